//! ELF/DWARF-backed symbol resolution for backtrace annotation.
//!
//! [`DebugInfo`] parses the kernel's own ELF image, loads its DWARF
//! sections, and implements [`SymbolResolver`] over them: file and line
//! come from the DWARF line program, the containing function and its start
//! address from the ELF symbol table. The monitor core only ever sees the
//! trait; an embedder without an image at hand can substitute any other
//! resolver, and the backtrace degrades to placeholders when resolution
//! fails.

use crate::addressing::Va;
use crate::backtrace::{Symbol, SymbolResolver};
use addr2line::Context;
use alloc::{
    borrow::Cow,
    string::{String, ToString},
    sync::Arc,
    vec::Vec,
};
use gimli::{EndianArcSlice, LittleEndian};
use object::{Object, ObjectSection, ObjectSymbol, SymbolKind};

struct FuncSym {
    start: u32,
    end: u32,
    name: String,
}

/// Debug information harvested from a kernel ELF image.
pub struct DebugInfo {
    ctx: Context<EndianArcSlice<LittleEndian>>,
    // Function symbols sorted by start address.
    funcs: Vec<FuncSym>,
}

impl DebugInfo {
    /// Load debugging symbols from a kernel image.
    ///
    /// # Returns
    /// - `Some(DebugInfo)` if the image parses as ELF and its DWARF loads.
    /// - `None` otherwise; the caller typically falls back to running the
    ///   monitor without symbol annotation.
    pub fn parse(image: &[u8]) -> Option<Self> {
        let kernel = object::File::parse(image).ok()?;
        let dwarf = gimli::Dwarf::load(|id| {
            let data = kernel
                .section_by_name(id.name())
                .and_then(|section| section.uncompressed_data().ok())
                .unwrap_or(Cow::Borrowed(&[]));
            let data: Arc<[u8]> = Arc::from(data.as_ref());
            Ok::<_, ()>(EndianArcSlice::new(data, LittleEndian))
        })
        .ok()?;
        let ctx = Context::from_dwarf(dwarf).ok()?;

        let mut funcs: Vec<FuncSym> = kernel
            .symbols()
            .filter(|sym| sym.kind() == SymbolKind::Text)
            .filter_map(|sym| {
                Some(FuncSym {
                    start: sym.address() as u32,
                    end: (sym.address() + sym.size()) as u32,
                    name: sym.name().ok()?.to_string(),
                })
            })
            .collect();
        funcs.sort_by_key(|f| f.start);

        Some(Self { ctx, funcs })
    }

    /// The function symbol containing `addr`, if any.
    fn function_at(&self, addr: u32) -> Option<&FuncSym> {
        let idx = self.funcs.partition_point(|f| f.start <= addr).checked_sub(1)?;
        let func = &self.funcs[idx];
        // A zero-sized symbol still claims addresses up to its successor.
        (func.start == func.end || addr < func.end).then_some(func)
    }
}

impl SymbolResolver for DebugInfo {
    fn resolve(&self, addr: Va) -> Option<Symbol> {
        let func = self.function_at(addr.into_u32())?;
        let name = addr2line::demangle_auto(Cow::Borrowed(func.name.as_str()), None).into_owned();

        let (file, line) = match self.ctx.find_location(addr.into_u32() as u64) {
            Ok(Some(location)) => (
                location.file.unwrap_or("?").to_string(),
                location.line.unwrap_or(0),
            ),
            _ => (String::from("?"), 0),
        };

        Some(Symbol {
            file,
            line,
            name,
            start: Va::new(func.start),
        })
    }
}
