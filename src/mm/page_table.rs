//! Entries of the page directory and page table and their permissions.
//!
//! The translation structure has two levels. A [`PageDirectory`] holds 1024
//! [`Pde`] entries; each entry is either absent, a pointer to a
//! [`PageTable`] of 1024 [`Pte`] entries (the normal path), or a superpage
//! entry directly mapping a 4 MiB physical region. All decoding and encoding
//! of the raw entry bits goes through the accessor methods here, which keep
//! the present/superpage distinction in one place instead of scattering bit
//! masks across call sites.

use crate::addressing::{Pa, SUPERPAGE_MASK, Va};
use core::ops::{Deref, Index, IndexMut};

/// Number of entries in a page directory or page table.
pub const NENTRIES: usize = 1024;

bitflags::bitflags! {
    /// Flags of a page-directory or page-table entry.
    ///
    /// The two levels share one flag layout; [`PteFlags::PS`] is meaningful
    /// only in a directory entry, where it marks the entry as a superpage
    /// mapping.
    pub struct PteFlags: u32 {
        /// Present; must be 1 for the entry to take part in translation.
        const P = 1 << 0;
        /// Writable; if 0, writes through this mapping are not allowed.
        const W = 1 << 1;
        /// User-accessible; if 0, user-mode accesses are not allowed.
        const U = 1 << 2;
        /// Page-level write-through caching.
        const PWT = 1 << 3;
        /// Page-level cache disable.
        const PCD = 1 << 4;
        /// Accessed; set by hardware when the entry is used for translation.
        const A = 1 << 5;
        /// Dirty; set by hardware on a write through the entry.
        const D = 1 << 6;
        /// Page size; marks a directory entry as a 4 MiB superpage mapping.
        const PS = 1 << 7;
        /// Global; the translation survives an address-space switch.
        const G = 1 << 8;
    }
}

impl PteFlags {
    const NAMES: [(PteFlags, &'static str); 9] = [
        (PteFlags::P, "PTE_P"),
        (PteFlags::W, "PTE_W"),
        (PteFlags::U, "PTE_U"),
        (PteFlags::PWT, "PTE_PWT"),
        (PteFlags::PCD, "PTE_PCD"),
        (PteFlags::A, "PTE_A"),
        (PteFlags::D, "PTE_D"),
        (PteFlags::PS, "PTE_PS"),
        (PteFlags::G, "PTE_G"),
    ];
}

/// Renders a flag set as a human-readable token list.
///
/// # Example
/// ```
/// use kmon::mm::page_table::{FlagList, PteFlags};
///
/// let rendered = format!("{}", FlagList(PteFlags::P | PteFlags::W));
/// assert_eq!(rendered, "[ PTE_P PTE_W ]");
/// ```
pub struct FlagList(pub PteFlags);

impl core::fmt::Display for FlagList {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[")?;
        for (flag, name) in PteFlags::NAMES {
            if self.0.contains(flag) {
                write!(f, " {name}")?;
            }
        }
        write!(f, " ]")
    }
}

/// What a page-directory entry currently maps.
///
/// Returned by [`Pde::kind`]. An entry is exactly one of these at a time: a
/// present entry with [`PteFlags::PS`] set is a superpage and its table
/// pointer bits must not be interpreted, and vice versa.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PdeKind {
    /// The entry is absent; no address in its 4 MiB region is mapped by it.
    NotPresent,
    /// The entry points at a page table holding the 4 KiB mappings for the
    /// region.
    Table {
        /// Physical address of the page table.
        table: Pa,
    },
    /// The entry itself maps a 4 MiB physical region.
    Superpage {
        /// 4 MiB-aligned physical base of the region.
        base: Pa,
    },
}

/// Page Directory Entry (PDE).
///
/// First-level entry of the translation structure. A present entry either
/// references a [`PageTable`] or, with [`PteFlags::PS`] set, maps a 4 MiB
/// superpage directly.
#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct Pde(pub u32);

impl Pde {
    /// An absent entry.
    pub const EMPTY: Self = Self(0);

    /// Get the flags associated with this entry.
    #[inline]
    pub const fn flags(&self) -> PteFlags {
        PteFlags::from_bits_truncate(self.0)
    }

    /// Decode the entry, enforcing the present/superpage distinction.
    ///
    /// # Returns
    /// - [`PdeKind::NotPresent`] if the present bit is clear.
    /// - [`PdeKind::Superpage`] with the 4 MiB-aligned base if the entry is
    ///   a superpage mapping.
    /// - [`PdeKind::Table`] with the page-aligned table address otherwise.
    #[inline]
    pub fn kind(&self) -> PdeKind {
        if !self.flags().contains(PteFlags::P) {
            PdeKind::NotPresent
        } else if self.flags().contains(PteFlags::PS) {
            PdeKind::Superpage {
                base: Pa::new(self.0 & !SUPERPAGE_MASK),
            }
        } else {
            PdeKind::Table {
                table: Pa::new(self.0).page_down(),
            }
        }
    }

    /// Point the entry at a page table.
    ///
    /// The table address is masked to 4 KiB alignment and the present bit
    /// is forced on; the [`PteFlags::PS`] bit is forced off so the entry
    /// can never read back as a superpage.
    #[inline]
    pub fn set_table(&mut self, table: Pa, flags: PteFlags) {
        self.0 = table.page_down().into_u32() | ((flags | PteFlags::P) - PteFlags::PS).bits();
    }

    /// Turn the entry into a 4 MiB superpage mapping.
    ///
    /// The physical base is masked to 4 MiB alignment; the present and
    /// superpage bits are forced on.
    #[inline]
    pub fn set_superpage(&mut self, base: Pa, flags: PteFlags) {
        self.0 = base.superpage_down().into_u32() | (flags | PteFlags::P | PteFlags::PS).bits();
    }

    /// Clears the entry, making the whole 4 MiB region absent.
    #[inline]
    pub fn clear(&mut self) {
        self.0 = 0;
    }
}

impl core::fmt::Debug for Pde {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.kind() {
            PdeKind::NotPresent => write!(f, "."),
            PdeKind::Table { table } => write!(f, "Pde(table {:?}, {:?})", table, self.flags()),
            PdeKind::Superpage { base } => write!(f, "Pde(4M {:?}, {:?})", base, self.flags()),
        }
    }
}

/// Page Table Entry (PTE).
///
/// Second-level entry of the translation structure, mapping a single 4 KiB
/// page plus its permission flags.
#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct Pte(pub u32);

impl Pte {
    /// An absent entry.
    pub const EMPTY: Self = Self(0);

    /// Get the physical page mapped by this entry.
    ///
    /// # Returns
    /// - `Some(Pa)` with the 4 KiB-aligned page base if the entry is
    ///   present.
    /// - `None` if the present bit is clear.
    #[inline]
    pub fn pa(&self) -> Option<Pa> {
        if self.flags().contains(PteFlags::P) {
            Some(Pa::new(self.0).page_down())
        } else {
            None
        }
    }

    /// Get the flags associated with this entry.
    #[inline]
    pub const fn flags(&self) -> PteFlags {
        PteFlags::from_bits_truncate(self.0)
    }

    /// Map the entry to a physical page.
    ///
    /// The page address is masked to 4 KiB alignment and the present bit is
    /// forced on.
    #[inline]
    pub fn set(&mut self, pa: Pa, flags: PteFlags) {
        self.0 = pa.page_down().into_u32() | (flags | PteFlags::P).bits();
    }

    /// Clears the entry, making the page absent.
    #[inline]
    pub fn clear(&mut self) {
        self.0 = 0;
    }
}

impl core::fmt::Debug for Pte {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.pa() {
            Some(pa) => write!(f, "Pte({:?}, {:?})", pa, self.flags()),
            None => write!(f, "."),
        }
    }
}

/// A page directory: 1024 [`Pde`] entries, one per 4 MiB of virtual space.
///
/// Indexing is bounds-checked; indices produced by [`Va::dir_index`] are in
/// range by construction.
#[repr(align(4096))]
pub struct PageDirectory([Pde; NENTRIES]);

impl PageDirectory {
    /// Create a directory with every entry absent.
    pub const fn new() -> Self {
        Self([Pde::EMPTY; NENTRIES])
    }

    /// The entry covering the given virtual address.
    #[inline]
    pub fn entry(&self, va: Va) -> Pde {
        self.0[va.dir_index()]
    }
}

impl Default for PageDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for PageDirectory {
    type Target = [Pde; NENTRIES];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Index<usize> for PageDirectory {
    type Output = Pde;
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl IndexMut<usize> for PageDirectory {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

/// A page table: 1024 [`Pte`] entries, one per 4 KiB page of a 4 MiB region.
#[repr(align(4096))]
pub struct PageTable([Pte; NENTRIES]);

impl PageTable {
    /// Create a table with every entry absent.
    pub const fn new() -> Self {
        Self([Pte::EMPTY; NENTRIES])
    }

    /// The entry covering the given virtual address.
    #[inline]
    pub fn entry(&self, va: Va) -> Pte {
        self.0[va.table_index()]
    }
}

impl Default for PageTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for PageTable {
    type Target = [Pte; NENTRIES];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Index<usize> for PageTable {
    type Output = Pte;
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl IndexMut<usize> for PageTable {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

/// Page Table Mapping Error.
///
/// This enum represents errors that can occur when translating an address
/// or editing a mapping through [`AddressSpace`].
///
/// [`AddressSpace`]: crate::mm::AddressSpace
#[derive(Debug, PartialEq, Eq)]
pub enum MappingError {
    /// No mapping covers the requested virtual address.
    NotMapped,
    /// The physical-page allocator could not supply a page-table page.
    NoTableMemory,
    /// A 4 KiB mapping was requested inside a region currently covered by a
    /// superpage entry. A virtual address is mapped by at most one entry at
    /// a time; replace or clear the superpage first.
    SuperpageOverlap,
    /// The mapping window could not produce the directory or table at the
    /// recorded physical address. The translation root is corrupt.
    BadTableAddress,
}

impl core::fmt::Display for MappingError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MappingError::NotMapped => write!(f, "address is not mapped"),
            MappingError::NoTableMemory => write!(f, "out of page-table memory"),
            MappingError::SuperpageOverlap => {
                write!(f, "region is covered by a superpage mapping")
            }
            MappingError::BadTableAddress => write!(f, "translation structure is unreachable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pde_kind_enforces_superpage_bit() {
        let mut pde = Pde::EMPTY;
        assert_eq!(pde.kind(), PdeKind::NotPresent);

        pde.set_table(Pa::new(0x0010_0123), PteFlags::P | PteFlags::W);
        assert_eq!(
            pde.kind(),
            PdeKind::Table {
                table: Pa::new(0x0010_0000)
            }
        );

        pde.set_superpage(Pa::new(0x0012_3456), PteFlags::W);
        assert_eq!(
            pde.kind(),
            PdeKind::Superpage {
                base: Pa::new(0x0000_0000)
            }
        );
        assert!(pde.flags().contains(PteFlags::P | PteFlags::PS));
    }

    #[test]
    fn set_table_strips_ps() {
        let mut pde = Pde::EMPTY;
        pde.set_table(Pa::new(0x0020_0000), PteFlags::PS | PteFlags::W);
        assert!(matches!(pde.kind(), PdeKind::Table { .. }));
    }

    #[test]
    fn pte_masks_to_page_alignment() {
        let mut pte = Pte::EMPTY;
        assert_eq!(pte.pa(), None);
        pte.set(Pa::new(0x0010_0abc), PteFlags::W);
        assert_eq!(pte.pa(), Some(Pa::new(0x0010_0000)));
        assert!(pte.flags().contains(PteFlags::P | PteFlags::W));
        pte.clear();
        assert_eq!(pte.pa(), None);
    }

    #[test]
    fn flag_list_renders_token_names() {
        let rendered = format!("{}", FlagList(PteFlags::P | PteFlags::W | PteFlags::PS));
        assert_eq!(rendered, "[ PTE_P PTE_W PTE_PS ]");
        assert_eq!(format!("{}", FlagList(PteFlags::empty())), "[ ]");
    }
}
