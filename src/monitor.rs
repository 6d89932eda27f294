//! The interactive monitor: command table, dispatcher, and loop.
//!
//! The monitor reads one line at a time, splits it into at most
//! [`MAXARGS`] tokens, matches the first token against a fixed command
//! table, and invokes the handler with the remaining tokens and the halted
//! trap context. Handlers print through the console handle and report
//! failures as [`CommandError`]; the loop prints the error and keeps
//! going. Nothing a command does is hidden from the operator.

use crate::addressing::{PAGE_MASK, PAGE_SIZE, Pa, Va};
use crate::backtrace::{StackWalk, SymbolResolver};
use crate::mm::page_table::{FlagList, MappingError, PteFlags};
use crate::mm::{AddressSpace, MapTarget};
use crate::parse::{ParseError, parse_addr, parse_uint};
use crate::teletype::{CMDBUF_SIZE, Teletype, TtyError, read_line};
use crate::trap::{Eflags, Scheduler, TrapContext};
use crate::{cprint, cprintln};
use arrayvec::ArrayVec;

/// Maximum number of whitespace-separated tokens in one command line.
pub const MAXARGS: usize = 16;

/// What the dispatcher should do after a command.
#[derive(Debug, PartialEq, Eq)]
pub enum Signal {
    /// The command completed; prompt for the next line.
    Handled,
    /// Terminate the monitor loop and return to the caller.
    Exit,
    /// Hand the trap context to the [`Scheduler`]; execution leaves the
    /// monitor and does not come back to this loop iteration.
    Resume,
}

/// A command failed in a way worth telling the operator about.
///
/// Every variant is printed by the loop; none of them terminates it.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandError {
    /// A numeric argument did not parse.
    Parse(ParseError),
    /// The translation structure rejected the operation.
    Mapping(MappingError),
    /// A required argument was not given.
    MissingArgument(&'static str),
}

impl From<ParseError> for CommandError {
    fn from(e: ParseError) -> Self {
        CommandError::Parse(e)
    }
}

impl From<MappingError> for CommandError {
    fn from(e: MappingError) -> Self {
        CommandError::Mapping(e)
    }
}

impl core::fmt::Display for CommandError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CommandError::Parse(e) => write!(f, "bad number: {e}"),
            CommandError::Mapping(e) => write!(f, "{e}"),
            CommandError::MissingArgument(what) => write!(f, "missing argument: {what}"),
        }
    }
}

/// Addresses of the kernel's linker-provided layout symbols, for
/// `kerninfo`.
pub struct KernelLayout {
    /// Virtual base the kernel is linked at; `virt - base` recovers a
    /// physical address for the symbols below.
    pub base: Va,
    /// Physical address of the first instruction executed.
    pub start: Pa,
    /// Virtual entry point.
    pub entry: Va,
    /// End of the text segment.
    pub etext: Va,
    /// End of initialized data.
    pub edata: Va,
    /// End of the kernel image.
    pub end: Va,
}

type Handler =
    fn(&mut Monitor<'_>, &[&str], Option<&mut TrapContext>) -> Result<Signal, CommandError>;

struct Command {
    name: &'static str,
    desc: &'static str,
    run: Handler,
}

static COMMANDS: [Command; 9] = [
    Command {
        name: "help",
        desc: "Display this list of commands",
        run: cmd_help,
    },
    Command {
        name: "kerninfo",
        desc: "Display information about the kernel",
        run: cmd_kerninfo,
    },
    Command {
        name: "showmappings",
        desc: "Display the mappings over a range: showmappings va1 va2",
        run: cmd_showmappings,
    },
    Command {
        name: "setmapping",
        desc: "Install a mapping: setmapping va pa|'n' [perm], perm in binary, 'n' keeps the physical address",
        run: cmd_setmapping,
    },
    Command {
        name: "clearmapping",
        desc: "Remove the mapping of a page: clearmapping va",
        run: cmd_clearmapping,
    },
    Command {
        name: "dump",
        desc: "Dump a range of memory: dump va1 va2",
        run: cmd_dump,
    },
    Command {
        name: "backtrace",
        desc: "Walk the call stack of the halted task",
        run: cmd_backtrace,
    },
    Command {
        name: "continue",
        desc: "Continue from a breakpoint",
        run: cmd_continue,
    },
    Command {
        name: "si",
        desc: "Step a single instruction",
        run: cmd_si,
    },
];

fn arg<'t>(args: &[&'t str], idx: usize, what: &'static str) -> Result<&'t str, CommandError> {
    args.get(idx)
        .copied()
        .ok_or(CommandError::MissingArgument(what))
}

/// The kernel monitor.
///
/// Bundles the collaborator handles for one monitor invocation: the
/// console, the address space under inspection, the symbol resolver, the
/// scheduler for resumption, and the kernel layout for `kerninfo`.
pub struct Monitor<'a> {
    console: &'a mut dyn Teletype,
    space: AddressSpace<'a>,
    resolver: &'a dyn SymbolResolver,
    sched: &'a mut dyn Scheduler,
    layout: KernelLayout,
}

impl<'a> Monitor<'a> {
    /// Assemble a monitor from its collaborators.
    pub fn new(
        console: &'a mut dyn Teletype,
        space: AddressSpace<'a>,
        resolver: &'a dyn SymbolResolver,
        sched: &'a mut dyn Scheduler,
        layout: KernelLayout,
    ) -> Self {
        Self {
            console,
            space,
            resolver,
            sched,
            layout,
        }
    }

    /// Run the monitor loop.
    ///
    /// Prints the banner and, when a halted context is present, a one-line
    /// summary of it; then prompts, reads, and dispatches until a command
    /// signals [`Signal::Exit`] or the console transport dies. A
    /// [`Signal::Resume`] hands the context to the scheduler and never
    /// comes back.
    pub fn run(&mut self, mut ctx: Option<&mut TrapContext>) -> Result<(), TtyError> {
        cprintln!(self.console, "Welcome to the kernel monitor!");
        cprintln!(self.console, "Type 'help' for a list of commands.");
        if let Some(tf) = ctx.as_deref() {
            cprintln!(self.console, "{}", tf);
        }

        let mut buf = [0u8; CMDBUF_SIZE];
        loop {
            let len = read_line(self.console, "K> ", &mut buf)?;
            let Ok(line) = core::str::from_utf8(&buf[..len]) else {
                cprintln!(self.console, "Input is not valid UTF-8");
                continue;
            };
            match self.dispatch(line, ctx.as_deref_mut()) {
                Ok(Signal::Handled) => {}
                Ok(Signal::Exit) => return Ok(()),
                Ok(Signal::Resume) => {
                    if let Some(tf) = ctx.as_deref_mut() {
                        self.sched.resume(tf);
                    }
                }
                Err(e) => cprintln!(self.console, "{}", e),
            }
        }
    }

    /// Tokenize one input line and invoke the matching command.
    ///
    /// Empty input is a no-op; an unknown first token and a token-count
    /// overflow are reported and tolerated.
    pub fn dispatch(
        &mut self,
        line: &str,
        ctx: Option<&mut TrapContext>,
    ) -> Result<Signal, CommandError> {
        let mut tokens: ArrayVec<&str, MAXARGS> = ArrayVec::new();
        for token in line.split_ascii_whitespace() {
            if tokens.try_push(token).is_err() {
                cprintln!(self.console, "Too many arguments (max {})", MAXARGS);
                return Ok(Signal::Handled);
            }
        }
        let Some(&name) = tokens.first() else {
            return Ok(Signal::Handled);
        };
        match COMMANDS.iter().find(|cmd| cmd.name == name) {
            Some(cmd) => (cmd.run)(self, &tokens[1..], ctx),
            None => {
                cprintln!(self.console, "Unknown command '{}'", name);
                Ok(Signal::Handled)
            }
        }
    }

    /// Print the mapping covering `va`, or its absence, as one line.
    fn show_one(&mut self, va: Va) -> Result<(), CommandError> {
        match self.space.translate(va) {
            Ok(t) => cprintln!(
                self.console,
                "0x{:08x}:0x{:08x} {}",
                va,
                t.pa_of(va),
                FlagList(t.flags)
            ),
            Err(MappingError::NotMapped) => {
                cprintln!(self.console, "page not present at 0x{:08x}", va)
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

fn cmd_help(
    mon: &mut Monitor<'_>,
    _args: &[&str],
    _ctx: Option<&mut TrapContext>,
) -> Result<Signal, CommandError> {
    for cmd in &COMMANDS {
        cprintln!(mon.console, "{} - {}", cmd.name, cmd.desc);
    }
    Ok(Signal::Handled)
}

fn cmd_kerninfo(
    mon: &mut Monitor<'_>,
    _args: &[&str],
    _ctx: Option<&mut TrapContext>,
) -> Result<Signal, CommandError> {
    let Monitor {
        ref mut console,
        ref layout,
        ..
    } = *mon;
    let console: &mut dyn Teletype = &mut **console;
    cprintln!(console, "Special kernel symbols:");
    cprintln!(console, "  _start {:08x} (phys)", layout.start);
    cprintln!(
        console,
        "  entry  {:08x} (virt)  {:08x} (phys)",
        layout.entry,
        layout.entry - layout.base
    );
    cprintln!(
        console,
        "  etext  {:08x} (virt)  {:08x} (phys)",
        layout.etext,
        layout.etext - layout.base
    );
    cprintln!(
        console,
        "  edata  {:08x} (virt)  {:08x} (phys)",
        layout.edata,
        layout.edata - layout.base
    );
    cprintln!(
        console,
        "  end    {:08x} (virt)  {:08x} (phys)",
        layout.end,
        layout.end - layout.base
    );
    cprintln!(
        console,
        "Kernel executable memory footprint: {}KB",
        ((layout.end - layout.entry) + 1023) / 1024
    );
    Ok(Signal::Handled)
}

fn cmd_showmappings(
    mon: &mut Monitor<'_>,
    args: &[&str],
    _ctx: Option<&mut TrapContext>,
) -> Result<Signal, CommandError> {
    let left = Va::new(parse_addr(arg(args, 0, "va1")?)?);
    let right = Va::new(parse_addr(arg(args, 1, "va2")?)?);

    // Every page touching [left, right], the first one included.
    let mut page = left.page_down();
    let last = right.page_down();
    loop {
        mon.show_one(page)?;
        if page >= last {
            break;
        }
        match page.checked_add(PAGE_SIZE) {
            Some(next) => page = next,
            None => break,
        }
    }
    Ok(Signal::Handled)
}

fn cmd_setmapping(
    mon: &mut Monitor<'_>,
    args: &[&str],
    _ctx: Option<&mut TrapContext>,
) -> Result<Signal, CommandError> {
    let va = Va::new(parse_addr(arg(args, 0, "va")?)?);
    let target = match arg(args, 1, "pa")? {
        "n" => MapTarget::KeepCurrent,
        token => MapTarget::Phys(Pa::new(parse_addr(token)?)),
    };
    let perm = match args.get(2) {
        Some(token) => PteFlags::from_bits_truncate(parse_uint(token, 2)?),
        None => PteFlags::empty(),
    };
    mon.space.map(va, target, perm | PteFlags::P)?;
    mon.show_one(va)?;
    Ok(Signal::Handled)
}

fn cmd_clearmapping(
    mon: &mut Monitor<'_>,
    args: &[&str],
    _ctx: Option<&mut TrapContext>,
) -> Result<Signal, CommandError> {
    let va = Va::new(parse_addr(arg(args, 0, "va")?)?);
    mon.space.clear(va)?;
    mon.show_one(va)?;
    Ok(Signal::Handled)
}

fn cmd_dump(
    mon: &mut Monitor<'_>,
    args: &[&str],
    _ctx: Option<&mut TrapContext>,
) -> Result<Signal, CommandError> {
    let left = Va::new(parse_addr(arg(args, 0, "va1")?)?);
    let right = Va::new(parse_addr(arg(args, 1, "va2")?)?);

    let mut page = left.page_down();
    let last = right.page_down();
    loop {
        // Validate the page before touching any of its words; an unmapped
        // page is reported and never read.
        match mon.space.translate(page) {
            Err(MappingError::NotMapped) => {
                cprintln!(mon.console, "page not present at 0x{:08x}", page)
            }
            Err(e) => return Err(e.into()),
            Ok(t) => {
                let lo = left.max(page) & !3u32;
                let hi = right.min(page | PAGE_MASK);
                let mut word = lo;
                let mut col = 0;
                while word <= hi {
                    if col == 0 {
                        cprint!(mon.console, "0x{:08x}:", word);
                    }
                    match mon.space.phys_word(t.pa_of(word)) {
                        Some(value) => cprint!(mon.console, " {:08x}", value),
                        None => cprint!(mon.console, " ????????"),
                    }
                    col = (col + 1) % 4;
                    if col == 0 {
                        cprintln!(mon.console);
                    }
                    match word.checked_add(4) {
                        Some(next) => word = next,
                        None => break,
                    }
                }
                if col != 0 {
                    cprintln!(mon.console);
                }
            }
        }
        if page >= last {
            break;
        }
        match page.checked_add(PAGE_SIZE) {
            Some(next) => page = next,
            None => break,
        }
    }
    Ok(Signal::Handled)
}

fn cmd_backtrace(
    mon: &mut Monitor<'_>,
    _args: &[&str],
    ctx: Option<&mut TrapContext>,
) -> Result<Signal, CommandError> {
    let Some(tf) = ctx else {
        cprintln!(mon.console, "No halted context to backtrace.");
        return Ok(Signal::Handled);
    };
    let Monitor {
        ref mut console,
        ref space,
        ref resolver,
        ..
    } = *mon;
    let console: &mut dyn Teletype = &mut **console;
    cprintln!(console, "Stack backtrace:");
    for frame in StackWalk::new(space, tf.ebp) {
        cprint!(console, "  ebp {:08x}  eip {:08x}  args", frame.fp, frame.ret);
        for word in frame.args {
            cprint!(console, " {:08x}", word);
        }
        cprintln!(console);
        match resolver.resolve(frame.ret) {
            Some(sym) => cprintln!(
                console,
                "       {}:{}: {}+{}",
                sym.file,
                sym.line,
                sym.name,
                frame.ret - sym.start
            ),
            None => cprintln!(console, "       ?:?: ?+?"),
        }
    }
    Ok(Signal::Handled)
}

fn cmd_continue(
    mon: &mut Monitor<'_>,
    _args: &[&str],
    ctx: Option<&mut TrapContext>,
) -> Result<Signal, CommandError> {
    match ctx {
        Some(tf) if tf.is_debug_stop() => {
            tf.eflags.remove(Eflags::TF);
            cprintln!(mon.console, "Continuing.");
            Ok(Signal::Resume)
        }
        _ => {
            cprintln!(mon.console, "You are not at a breakpoint.");
            Ok(Signal::Handled)
        }
    }
}

fn cmd_si(
    mon: &mut Monitor<'_>,
    _args: &[&str],
    ctx: Option<&mut TrapContext>,
) -> Result<Signal, CommandError> {
    match ctx {
        Some(tf) if tf.is_debug_stop() => {
            tf.eflags.insert(Eflags::TF);
            cprintln!(mon.console, "Stepping one instruction.");
            Ok(Signal::Resume)
        }
        _ => {
            cprintln!(mon.console, "You are not at a breakpoint.");
            Ok(Signal::Handled)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtrace::Symbol;
    use crate::mm::sim::{DIR_PA, SimMemory};
    use crate::teletype::sim::ScriptTty;
    use crate::trap::Trap;

    /// A scheduler that must never be reached in dispatch-level tests.
    struct NullSched;

    impl Scheduler for NullSched {
        fn resume(&mut self, _ctx: &mut TrapContext) -> ! {
            unreachable!("dispatch-level tests never resume");
        }
    }

    /// Resolves addresses inside a single known function.
    struct OneSymbol;

    impl SymbolResolver for OneSymbol {
        fn resolve(&self, addr: Va) -> Option<Symbol> {
            (addr.into_u32() & !0xff == 0xf010_0000).then(|| Symbol {
                file: String::from("kern/init.c"),
                line: 42,
                name: String::from("i386_init"),
                start: Va::new(0xf010_0000),
            })
        }
    }

    fn layout() -> KernelLayout {
        KernelLayout {
            base: Va::new(0xf000_0000),
            start: Pa::new(0x0010_000c),
            entry: Va::new(0xf010_000c),
            etext: Va::new(0xf010_5000),
            edata: Va::new(0xf011_a000),
            end: Va::new(0xf011_d000),
        }
    }

    /// Dispatch `lines` in order against one fresh monitor and return the
    /// results plus everything printed.
    fn dispatch_all(
        lines: &[&str],
        setup: impl FnOnce(&mut SimMemory),
        mut ctx: Option<&mut TrapContext>,
    ) -> (Vec<Result<Signal, CommandError>>, String) {
        let mut tty = ScriptTty::new("");
        let mut mem = SimMemory::new();
        setup(&mut mem);
        let mut sched = NullSched;
        let resolver = OneSymbol;
        let mut monitor = Monitor::new(
            &mut tty,
            AddressSpace::new(DIR_PA, &mut mem),
            &resolver,
            &mut sched,
            layout(),
        );
        let results = lines
            .iter()
            .map(|line| monitor.dispatch(line, ctx.as_deref_mut()))
            .collect();
        drop(monitor);
        (results, tty.printed())
    }

    fn dispatch_line(
        line: &str,
        setup: impl FnOnce(&mut SimMemory),
        ctx: Option<&mut TrapContext>,
    ) -> (Result<Signal, CommandError>, String) {
        let (mut results, out) = dispatch_all(&[line], setup, ctx);
        (results.remove(0), out)
    }

    #[test]
    fn empty_input_is_a_noop() {
        let (r, out) = dispatch_line("   ", |_| {}, None);
        assert_eq!(r, Ok(Signal::Handled));
        assert!(out.is_empty());
    }

    #[test]
    fn unknown_command_is_reported() {
        let (r, out) = dispatch_line("frobnicate", |_| {}, None);
        assert_eq!(r, Ok(Signal::Handled));
        assert!(out.contains("Unknown command 'frobnicate'"));
    }

    #[test]
    fn too_many_arguments_is_reported() {
        let line = "help a b c d e f g h i j k l m n o p q";
        let (r, out) = dispatch_line(line, |_| {}, None);
        assert_eq!(r, Ok(Signal::Handled));
        assert!(out.contains("Too many arguments"));
    }

    #[test]
    fn help_lists_every_command() {
        let (_, out) = dispatch_line("help", |_| {}, None);
        for cmd in &COMMANDS {
            assert!(out.contains(cmd.name));
        }
    }

    #[test]
    fn kerninfo_prints_layout() {
        let (_, out) = dispatch_line("kerninfo", |_| {}, None);
        assert!(out.contains("Special kernel symbols:"));
        assert!(out.contains("entry  f010000c (virt)  0010000c (phys)"));
        assert!(out.contains("Kernel executable memory footprint: 116KB"));
    }

    #[test]
    fn setmapping_then_showmappings_round_trips() {
        let (results, out) = dispatch_all(
            &[
                "setmapping 0x00400000 0x00100000 10",
                "showmappings 0x00400000 0x00400000",
            ],
            |_| {},
            None,
        );
        assert!(results.iter().all(|r| *r == Ok(Signal::Handled)));
        // Both the install echo and the lookup print the same entry: the
        // physical low bits match the VA's offset bits, the permission list
        // has PTE_P and PTE_W, and no PTE_PS.
        assert_eq!(
            out.matches("0x00400000:0x00100000 [ PTE_P PTE_W ]").count(),
            2
        );
        assert!(!out.contains("PTE_PS"));
    }

    #[test]
    fn setmapping_keep_current_preserves_physical_address() {
        let (results, out) = dispatch_all(
            &[
                "setmapping 0x00400000 0x00100000 10",
                "setmapping 0x00400000 n 01",
            ],
            |_| {},
            None,
        );
        assert!(results.iter().all(|r| *r == Ok(Signal::Handled)));
        // The physical address survives; only the permissions changed.
        assert!(out.contains("0x00400000:0x00100000 [ PTE_P ]"));
    }

    #[test]
    fn clearmapping_reports_the_now_absent_page() {
        let (results, out) = dispatch_all(
            &[
                "setmapping 0x00400000 0x00100000 10",
                "clearmapping 0x00400000",
                "showmappings 0x00400000 0x00400000",
            ],
            |_| {},
            None,
        );
        assert!(results.iter().all(|r| *r == Ok(Signal::Handled)));
        assert_eq!(out.matches("page not present at 0x00400000").count(), 2);
    }

    #[test]
    fn superpage_mapping_shows_pte_ps() {
        let (results, out) = dispatch_all(
            &[
                // 0b10000011 = PTE_PS | PTE_W | PTE_P.
                "setmapping 0x00800000 0x00923456 10000011",
                "showmappings 0x00800000 0x00800000",
            ],
            |_| {},
            None,
        );
        assert!(results.iter().all(|r| *r == Ok(Signal::Handled)));
        // Masked to 4 MiB alignment.
        assert!(out.contains("0x00800000:0x00800000 [ PTE_P PTE_W PTE_PS ]"));
    }

    #[test]
    fn bad_number_is_reported_not_fatal() {
        let (r, out) = dispatch_line("showmappings 0xzz 0x1000", |_| {}, None);
        assert!(matches!(r, Err(CommandError::Parse(_))));
        assert!(out.is_empty());
    }

    #[test]
    fn missing_argument_is_reported() {
        let (r, _) = dispatch_line("dump 0x1000", |_| {}, None);
        assert_eq!(r, Err(CommandError::MissingArgument("va2")));
    }

    #[test]
    fn continue_without_context_is_a_noop() {
        let (r, out) = dispatch_line("continue", |_| {}, None);
        assert_eq!(r, Ok(Signal::Handled));
        assert!(out.contains("You are not at a breakpoint."));
    }

    #[test]
    fn continue_outside_debug_trap_is_a_noop() {
        let mut ctx = TrapContext::new(Trap::PageFault, Va::new(0x100), Va::ZERO, Eflags::TF);
        let (r, out) = dispatch_line("continue", |_| {}, Some(&mut ctx));
        assert_eq!(r, Ok(Signal::Handled));
        assert!(out.contains("You are not at a breakpoint."));
        assert!(ctx.eflags.contains(Eflags::TF));
    }

    #[test]
    fn continue_clears_the_trap_flag_and_resumes() {
        let mut ctx = TrapContext::new(
            Trap::Breakpoint,
            Va::new(0xf010_0042),
            Va::ZERO,
            Eflags::IF | Eflags::TF,
        );
        let (r, _) = dispatch_line("continue", |_| {}, Some(&mut ctx));
        assert_eq!(r, Ok(Signal::Resume));
        assert!(!ctx.eflags.contains(Eflags::TF));
        assert!(ctx.eflags.contains(Eflags::IF));
    }

    #[test]
    fn si_sets_the_trap_flag_and_resumes() {
        let mut ctx = TrapContext::new(Trap::Debug, Va::new(0xf010_0042), Va::ZERO, Eflags::IF);
        let (r, _) = dispatch_line("si", |_| {}, Some(&mut ctx));
        assert_eq!(r, Ok(Signal::Resume));
        assert!(ctx.eflags.contains(Eflags::TF));
    }

    #[test]
    fn backtrace_without_context_is_reported() {
        let (r, out) = dispatch_line("backtrace", |_| {}, None);
        assert_eq!(r, Ok(Signal::Handled));
        assert!(out.contains("No halted context"));
    }

    #[test]
    fn backtrace_walks_and_annotates() {
        // Stack memory lives at va 0x00800000 -> pa 0x00200000; two frames.
        let mut ctx = TrapContext::new(
            Trap::Breakpoint,
            Va::new(0xf010_0042),
            Va::new(0x0080_0100),
            Eflags::IF,
        );
        let (r, out) = dispatch_line(
            "backtrace",
            |mem| {
                let frame = |mem: &mut SimMemory, pa: u32, caller: u32, ret: u32, arg0: u32| {
                    mem.poke(Pa::new(pa), caller);
                    mem.poke(Pa::new(pa + 4), ret);
                    for i in 0..5u32 {
                        mem.poke(Pa::new(pa + 8 + 4 * i), arg0 + i);
                    }
                };
                frame(mem, 0x0020_0100, 0x0080_0200, 0xf010_0040, 10);
                frame(mem, 0x0020_0200, 0, 0xf010_0080, 20);
                let mut space = AddressSpace::new(DIR_PA, mem);
                space
                    .map(
                        Va::new(0x0080_0000),
                        MapTarget::Phys(Pa::new(0x0020_0000)),
                        PteFlags::P | PteFlags::W,
                    )
                    .unwrap();
            },
            Some(&mut ctx),
        );
        assert_eq!(r, Ok(Signal::Handled));
        assert!(out.contains(
            "ebp 00800100  eip f0100040  args 0000000a 0000000b 0000000c 0000000d 0000000e"
        ));
        assert!(out.contains("kern/init.c:42: i386_init+64"));
        assert!(out.contains("ebp 00800200  eip f0100080  args 00000014"));
        assert!(out.contains("i386_init+128"));
    }

    #[test]
    fn dump_skips_unmapped_pages_and_reads_mapped_words() {
        let (r, out) = dispatch_line(
            "dump 0x00400ff8 0x00401008",
            |mem| {
                for off in (0xff8u32..0x1000).step_by(4) {
                    mem.poke(Pa::new(0x0010_0000 + off), 0x1111_0000 | off);
                }
                let mut space = AddressSpace::new(DIR_PA, mem);
                // Only the first page is mapped; 0x00401000 is a hole.
                space
                    .map(
                        Va::new(0x0040_0000),
                        MapTarget::Phys(Pa::new(0x0010_0000)),
                        PteFlags::P,
                    )
                    .unwrap();
            },
            None,
        );
        assert_eq!(r, Ok(Signal::Handled));
        assert!(out.contains("0x00400ff8: 11110ff8 11110ffc"));
        assert!(out.contains("page not present at 0x00401000"));
    }

    #[test]
    fn run_loop_survives_errors_until_the_console_closes() {
        let mut tty = ScriptTty::new("help\nbogus\nshowmappings 0xzz 0x1000\n");
        let mut mem = SimMemory::new();
        let mut sched = NullSched;
        let resolver = OneSymbol;
        let mut monitor = Monitor::new(
            &mut tty,
            AddressSpace::new(DIR_PA, &mut mem),
            &resolver,
            &mut sched,
            layout(),
        );
        // The script has no further input, so the loop ends with a
        // transport error once the last line is handled.
        assert_eq!(monitor.run(None), Err(TtyError));
        drop(monitor);
        let out = tty.printed();
        assert!(out.contains("Welcome to the kernel monitor!"));
        assert!(out.contains("help - Display this list of commands"));
        assert!(out.contains("Unknown command 'bogus'"));
        assert!(out.contains("bad number: invalid digit 'z' for base 16"));
    }
}
