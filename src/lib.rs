//! # kmon: an embeddable kernel debug monitor
//!
//! `kmon` is the interactive debug console of a kernel that has been halted
//! at a breakpoint or single-step trap. While the kernel is stopped, the
//! monitor lets a developer inspect and mutate the virtual-to-physical
//! translation state, dump raw memory through the active translation, and
//! reconstruct the call stack of the halted task from its saved frame
//! pointers.
//!
//! The monitor itself owns no hardware. Everything that touches the machine
//! is reached through a collaborator handle passed in by the embedding
//! kernel:
//!
//! - [`teletype::Teletype`] — the byte console used for the prompt, line
//!   input, and all output.
//! - [`mm::PhysMemory`] — the kernel's fixed mapping window over physical
//!   memory, plus the allocator for fresh page-table pages.
//! - [`backtrace::SymbolResolver`] — maps a return address to file, line,
//!   and function. [`debuginfo::DebugInfo`] is an ELF/DWARF-backed
//!   implementation; embedders may supply their own.
//! - [`trap::Scheduler`] — resumes the halted execution; this transfer is
//!   one-way and never returns to the monitor.
//!
//! Because the translation root is an explicit [`mm::AddressSpace`] handle
//! rather than an ambient register, the whole core runs unmodified against
//! synthetic in-memory page tables, which is how this crate is tested.
//!
//! The monitor runs single-threaded and non-reentrant: it executes only
//! while the kernel is otherwise stopped, so no locking is performed over
//! the page tables or the halted task's stack.

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs, rustdoc::broken_intra_doc_links)]

extern crate alloc;

pub mod addressing;
pub mod backtrace;
pub mod debuginfo;
pub mod mm;
pub mod monitor;
pub mod parse;
pub mod teletype;
pub mod trap;

pub use addressing::{Pa, Va};
pub use monitor::{KernelLayout, Monitor};
