//! The halted execution state and its resumption.
//!
//! A [`TrapContext`] is the snapshot of the execution the kernel halted
//! before entering the monitor. It is owned by the interrupted execution
//! and passed in by mutable reference; the monitor reads it and flips
//! exactly one bit — [`Eflags::TF`] — before handing it back to the
//! [`Scheduler`] for resumption.

use crate::addressing::Va;
use num_enum::{IntoPrimitive, TryFromPrimitive};

bitflags::bitflags! {
    /// CPU flags saved in a [`TrapContext`].
    pub struct Eflags: u32 {
        /// Carry flag.
        const CF = 1 << 0;
        #[doc(hidden)]
        const _1 = 1 << 1;
        /// Parity flag.
        const PF = 1 << 2;
        /// Auxiliary carry flag.
        const AF = 1 << 4;
        /// Zero flag.
        const ZF = 1 << 6;
        /// Sign flag.
        const SF = 1 << 7;
        /// Trap flag; when set, the CPU raises a debug exception after the
        /// next instruction. This is the single bit the monitor mutates.
        const TF = 1 << 8;
        /// Interrupt-enable flag.
        const IF = 1 << 9;
        /// Direction flag.
        const DF = 1 << 10;
        /// Overflow flag.
        const OF = 1 << 11;
    }
}

/// Processor exception numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Trap {
    /// Divide error.
    DivideError = 0,
    /// Debug exception, raised after a single-stepped instruction.
    Debug = 1,
    /// Non-maskable interrupt.
    Nmi = 2,
    /// Breakpoint (`int3`).
    Breakpoint = 3,
    /// Overflow (`into`).
    Overflow = 4,
    /// BOUND range exceeded.
    BoundCheck = 5,
    /// Invalid opcode.
    InvalidOpcode = 6,
    /// Device not available.
    DeviceNotAvailable = 7,
    /// Double fault.
    DoubleFault = 8,
    /// Invalid TSS.
    InvalidTss = 10,
    /// Segment not present.
    SegmentNotPresent = 11,
    /// Stack fault.
    StackFault = 12,
    /// General protection fault.
    GeneralProtection = 13,
    /// Page fault.
    PageFault = 14,
    /// x87 floating-point error.
    FpuError = 16,
    /// Alignment check.
    AlignmentCheck = 17,
    /// Machine check.
    MachineCheck = 18,
    /// SIMD floating-point exception.
    SimdError = 19,
}

impl core::fmt::Display for Trap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Trap::DivideError => "Divide error",
            Trap::Debug => "Debug",
            Trap::Nmi => "Non-Maskable Interrupt",
            Trap::Breakpoint => "Breakpoint",
            Trap::Overflow => "Overflow",
            Trap::BoundCheck => "BOUND Range Exceeded",
            Trap::InvalidOpcode => "Invalid Opcode",
            Trap::DeviceNotAvailable => "Device Not Available",
            Trap::DoubleFault => "Double Fault",
            Trap::InvalidTss => "Invalid TSS",
            Trap::SegmentNotPresent => "Segment Not Present",
            Trap::StackFault => "Stack Fault",
            Trap::GeneralProtection => "General Protection",
            Trap::PageFault => "Page Fault",
            Trap::FpuError => "x87 FPU Floating-Point Error",
            Trap::AlignmentCheck => "Alignment Check",
            Trap::MachineCheck => "Machine-Check",
            Trap::SimdError => "SIMD Floating-Point Exception",
        })
    }
}

/// Snapshot of the halted execution.
///
/// The monitor never copies or reallocates a context; it reads the fields
/// and mutates only the [`Eflags::TF`] bit of `eflags`.
#[derive(Debug)]
pub struct TrapContext {
    /// Raw trap number that halted the execution.
    pub trap: u8,
    /// Instruction pointer at the halt.
    pub eip: Va,
    /// Frame pointer at the halt; the starting point of a backtrace.
    pub ebp: Va,
    /// Saved CPU flags.
    pub eflags: Eflags,
}

impl TrapContext {
    /// Create a context halted at the given trap.
    pub fn new(trap: Trap, eip: Va, ebp: Va, eflags: Eflags) -> Self {
        Self {
            trap: trap.into(),
            eip,
            ebp,
            eflags,
        }
    }

    /// Decode the trap number, or `None` for a number outside the known
    /// exception set.
    pub fn trap(&self) -> Option<Trap> {
        Trap::try_from(self.trap).ok()
    }

    /// Whether this context was halted by the debugger: a breakpoint or a
    /// single-step trap. Only such a context may be resumed or stepped.
    pub fn is_debug_stop(&self) -> bool {
        matches!(self.trap(), Some(Trap::Breakpoint | Trap::Debug))
    }
}

impl core::fmt::Display for TrapContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "halted: trap {} (", self.trap)?;
        match self.trap() {
            Some(trap) => write!(f, "{trap}")?,
            None => write!(f, "Unknown")?,
        }
        write!(
            f,
            "), eip 0x{:08x}, ebp 0x{:08x}, eflags 0x{:08x}",
            self.eip,
            self.ebp,
            self.eflags.bits()
        )
    }
}

/// Resumes a halted execution.
///
/// Resumption is a one-way transfer: control moves to the task described
/// by the context and never comes back to the monitor invocation that
/// called [`Scheduler::resume`].
pub trait Scheduler {
    /// Transfer execution to the given context. Never returns.
    fn resume(&mut self, ctx: &mut TrapContext) -> !;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_stop_accepts_breakpoint_and_debug_only() {
        let bp = TrapContext::new(Trap::Breakpoint, Va::new(0x100), Va::ZERO, Eflags::IF);
        let db = TrapContext::new(Trap::Debug, Va::new(0x100), Va::ZERO, Eflags::IF);
        let pf = TrapContext::new(Trap::PageFault, Va::new(0x100), Va::ZERO, Eflags::IF);
        assert!(bp.is_debug_stop());
        assert!(db.is_debug_stop());
        assert!(!pf.is_debug_stop());
    }

    #[test]
    fn unknown_trap_number_decodes_to_none() {
        let ctx = TrapContext {
            trap: 9,
            eip: Va::ZERO,
            ebp: Va::ZERO,
            eflags: Eflags::empty(),
        };
        assert_eq!(ctx.trap(), None);
        assert!(!ctx.is_debug_stop());
    }

    #[test]
    fn context_summary_names_the_trap() {
        let ctx = TrapContext::new(Trap::Breakpoint, Va::new(0xf010_0042), Va::ZERO, Eflags::IF);
        let line = format!("{ctx}");
        assert!(line.contains("trap 3"));
        assert!(line.contains("Breakpoint"));
        assert!(line.contains("eip 0xf0100042"));
    }
}
