//! Memory inspection and mutation through an explicit translation root.
//!
//! On real hardware the active page-directory base lives in a control
//! register and the tables are addressed through the kernel's fixed
//! physical-memory window. Here both are explicit: [`AddressSpace`]
//! bundles the directory base with a [`PhysMemory`] handle and is threaded
//! through every translate, map, and dump operation. This keeps the monitor
//! core free of ambient state, so it runs unmodified against synthetic
//! in-memory tables.
//!
//! Mutating a mapping through [`AddressSpace::map`] edits live kernel
//! translation state. There is no safety net beyond the alignment masking
//! and the superpage-overlap check: the monitor is a trusted-operator tool,
//! and an incorrect mapping can corrupt the running kernel immediately.

pub mod page_table;

use crate::addressing::{Pa, Va};
use crate::backtrace::ReadMemory;
use page_table::{MappingError, PageDirectory, PageTable, PdeKind, PteFlags};

/// The kernel's window onto physical memory.
///
/// The monitor reaches every byte of physical memory through this trait:
/// the page directory and page tables it walks, the table pages it
/// allocates while installing mappings, and the raw words it dumps. The
/// embedding kernel implements it over its fixed physical mapping window
/// and its page allocator; tests implement it over plain heap structures.
pub trait PhysMemory {
    /// The page directory located at `pa`, or `None` if `pa` does not
    /// address one.
    fn directory(&self, pa: Pa) -> Option<&PageDirectory>;

    /// Mutable access to the page directory located at `pa`.
    fn directory_mut(&mut self, pa: Pa) -> Option<&mut PageDirectory>;

    /// The page table located at `pa`, or `None` if `pa` does not address
    /// one.
    fn table(&self, pa: Pa) -> Option<&PageTable>;

    /// Mutable access to the page table located at `pa`.
    fn table_mut(&mut self, pa: Pa) -> Option<&mut PageTable>;

    /// Allocate a zeroed page-table page, returning its physical address.
    ///
    /// # Returns
    /// - `Some(Pa)` on success; the new table must be reachable through
    ///   [`PhysMemory::table`] afterwards.
    /// - `None` if physical memory is exhausted.
    fn allocate_table(&mut self) -> Option<Pa>;

    /// Read the 32-bit word at physical address `pa`.
    fn read_word(&self, pa: Pa) -> Option<u32>;
}

/// The size class of an installed mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MappingSize {
    /// A normal 4 KiB page mapped by a page-table entry.
    Page,
    /// A 4 MiB superpage mapped directly by a directory entry.
    Superpage,
}

/// The result of translating a virtual address.
///
/// Carries the mapping's physical base, its permission flags, and its size
/// class. The physical address of a particular byte is recovered with
/// [`Translation::pa_of`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Translation {
    /// Physical base of the mapping: 4 KiB-aligned for a normal page,
    /// 4 MiB-aligned for a superpage.
    pub base: Pa,
    /// Permission flags of the entry that produced the translation.
    pub flags: PteFlags,
    /// Whether the translation came from a page-table entry or a superpage
    /// directory entry.
    pub size: MappingSize,
}

impl Translation {
    /// The physical address of `va` under this translation.
    ///
    /// Composes the mapping's physical base with the low 12 (normal page)
    /// or 22 (superpage) bits of the virtual address. Valid for any `va`
    /// inside the mapped region.
    #[inline]
    pub fn pa_of(&self, va: Va) -> Pa {
        match self.size {
            MappingSize::Page => self.base | va.offset(),
            MappingSize::Superpage => self.base | va.superpage_offset(),
        }
    }
}

/// The physical address argument of [`AddressSpace::map`].
#[derive(Clone, Copy, Debug)]
pub enum MapTarget {
    /// Map to the given physical address (masked to the alignment of the
    /// installed entry).
    Phys(Pa),
    /// Keep the physical base of the existing mapping and change only the
    /// permission flags. Fails with [`MappingError::NotMapped`] if the
    /// address has no current mapping.
    KeepCurrent,
}

/// An address space: the active translation root plus the physical-memory
/// window to walk it through.
///
/// This is the handle every monitor operation works on. It never caches
/// any part of the structure; each operation re-walks from the root, so
/// edits made through one call are visible to the next.
pub struct AddressSpace<'a> {
    root: Pa,
    mem: &'a mut dyn PhysMemory,
}

impl<'a> AddressSpace<'a> {
    /// Create a handle for the page directory at `root`.
    pub fn new(root: Pa, mem: &'a mut dyn PhysMemory) -> Self {
        Self { root, mem }
    }

    /// Physical address of the page directory this handle walks.
    pub fn root(&self) -> Pa {
        self.root
    }

    /// Translate a virtual address.
    ///
    /// Walks the directory entry first: an absent entry is `NotMapped`; a
    /// superpage entry finishes the walk without touching any table; a
    /// table entry continues into the page table. The order matters — a
    /// present directory entry is either a superpage or a table pointer,
    /// never meaningfully both, and [`Pde::kind`] enforces that.
    ///
    /// # Returns
    /// - `Ok(Translation)` describing the mapping covering `va`.
    /// - `Err(MappingError::NotMapped)` if no entry covers `va`.
    /// - `Err(MappingError::BadTableAddress)` if the root or a referenced
    ///   table is unreachable through the window.
    ///
    /// [`Pde::kind`]: page_table::Pde::kind
    pub fn translate(&self, va: Va) -> Result<Translation, MappingError> {
        let dir = self
            .mem
            .directory(self.root)
            .ok_or(MappingError::BadTableAddress)?;
        let pde = dir.entry(va);
        match pde.kind() {
            PdeKind::NotPresent => Err(MappingError::NotMapped),
            PdeKind::Superpage { base } => Ok(Translation {
                base,
                flags: pde.flags(),
                size: MappingSize::Superpage,
            }),
            PdeKind::Table { table } => {
                let pt = self.mem.table(table).ok_or(MappingError::BadTableAddress)?;
                let pte = pt.entry(va);
                match pte.pa() {
                    Some(base) => Ok(Translation {
                        base,
                        flags: pte.flags(),
                        size: MappingSize::Page,
                    }),
                    None => Err(MappingError::NotMapped),
                }
            }
        }
    }

    /// Install or replace the mapping for `va`.
    ///
    /// If `flags` contains [`PteFlags::PS`], a single directory entry
    /// covering the containing 4 MiB region is installed and the physical
    /// address is masked to 4 MiB alignment. Otherwise the page table for
    /// the VA's directory slot is located — allocating a zeroed one through
    /// [`PhysMemory::allocate_table`] if the slot is empty — and the single
    /// 4 KiB entry is installed with the address masked to 4 KiB alignment.
    ///
    /// [`MapTarget::KeepCurrent`] first translates the existing mapping and
    /// reuses its physical base, so only the permissions change.
    ///
    /// # Returns
    /// The translation now in effect for `va`, so callers can echo exactly
    /// what was installed.
    pub fn map(
        &mut self,
        va: Va,
        target: MapTarget,
        flags: PteFlags,
    ) -> Result<Translation, MappingError> {
        let base = match target {
            MapTarget::Phys(pa) => pa,
            MapTarget::KeepCurrent => self.translate(va)?.base,
        };
        if flags.contains(PteFlags::PS) {
            let dir = self
                .mem
                .directory_mut(self.root)
                .ok_or(MappingError::BadTableAddress)?;
            dir[va.dir_index()].set_superpage(base, flags);
        } else {
            let pde = {
                let dir = self
                    .mem
                    .directory(self.root)
                    .ok_or(MappingError::BadTableAddress)?;
                dir.entry(va)
            };
            let table = match pde.kind() {
                PdeKind::Table { table } => table,
                PdeKind::NotPresent => {
                    let table = self
                        .mem
                        .allocate_table()
                        .ok_or(MappingError::NoTableMemory)?;
                    let dir = self
                        .mem
                        .directory_mut(self.root)
                        .ok_or(MappingError::BadTableAddress)?;
                    dir[va.dir_index()].set_table(table, PteFlags::P | PteFlags::W | PteFlags::U);
                    table
                }
                PdeKind::Superpage { .. } => return Err(MappingError::SuperpageOverlap),
            };
            let pt = self
                .mem
                .table_mut(table)
                .ok_or(MappingError::BadTableAddress)?;
            pt[va.table_index()].set(base, flags);
        }
        self.translate(va)
    }

    /// Remove the mapping covering `va`.
    ///
    /// Clears whichever entry currently maps the address: the directory
    /// entry for a superpage, the page-table entry for a normal page. The
    /// page table itself stays allocated.
    ///
    /// # Returns
    /// - `Ok(())` once the address no longer translates.
    /// - `Err(MappingError::NotMapped)` if nothing mapped it to begin with.
    pub fn clear(&mut self, va: Va) -> Result<(), MappingError> {
        let pde = {
            let dir = self
                .mem
                .directory(self.root)
                .ok_or(MappingError::BadTableAddress)?;
            dir.entry(va)
        };
        match pde.kind() {
            PdeKind::NotPresent => Err(MappingError::NotMapped),
            PdeKind::Superpage { .. } => {
                let dir = self
                    .mem
                    .directory_mut(self.root)
                    .ok_or(MappingError::BadTableAddress)?;
                dir[va.dir_index()].clear();
                Ok(())
            }
            PdeKind::Table { table } => {
                let pt = self
                    .mem
                    .table_mut(table)
                    .ok_or(MappingError::BadTableAddress)?;
                if pt.entry(va).pa().is_none() {
                    return Err(MappingError::NotMapped);
                }
                pt[va.table_index()].clear();
                Ok(())
            }
        }
    }

    /// Read the word at a physical address through the window.
    ///
    /// Used after a page has been validated with [`AddressSpace::translate`]
    /// so a dump never dereferences an unmapped address.
    #[inline]
    pub fn phys_word(&self, pa: Pa) -> Option<u32> {
        self.mem.read_word(pa)
    }

    /// Translate `va` and read the word it maps to.
    ///
    /// # Returns
    /// `None` if the address is unmapped or the word is unreadable.
    pub fn read_word(&self, va: Va) -> Option<u32> {
        let t = self.translate(va).ok()?;
        self.mem.read_word(t.pa_of(va))
    }
}

impl ReadMemory for AddressSpace<'_> {
    fn read_word(&self, va: Va) -> Option<u32> {
        AddressSpace::read_word(self, va)
    }
}
