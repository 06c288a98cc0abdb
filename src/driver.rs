//! The two-pass orchestration: reads source lines, maintains the symbol table and program
//! counter across both passes, dispatches pseudo-ops and opcodes, and drives `INCLUDE` recursion.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::addressing;
use crate::backend::{self, Backend};
use crate::buffer::{skip_space, LineBuffer};
use crate::diag::{AssembleError, DiagSink, Diagnostic, Severity, SourceLoc};
use crate::encode;
use crate::expr::{eval, EvalContext};
use crate::label::{can_continue_label, can_start_label, Label};
use crate::opcode;
use crate::pseudo::{self, AsciiMode, ByteKind, OptDirective, PseudoOp};
use crate::symbol::{Binding, SymbolTable};
use crate::testrunner::{Assertion, TestContext, TestReport, TestUnit};

/// Everything needed to assemble one source tree.
pub struct AssembleOptions {
    /// Name the diagnostic channel reports for the entry file.
    pub entry_file: String,
    /// The entry file's text, supplied directly (the CLI reads it from disk first).
    pub entry_source: String,
    /// Directories searched for `INCLUDE`/`INCBIN`, in order, before the entry file's own
    /// directory.
    pub include_dirs: Vec<PathBuf>,
    /// In-memory file contents consulted before the real filesystem; lets tests exercise
    /// `INCLUDE` without touching disk.
    pub virtual_files: HashMap<String, String>,
    /// `-f` back-end name.
    pub backend: String,
    /// Extra `-X value` flags forwarded to the back-end's `cmdline` hook.
    pub backend_flags: Vec<(String, Option<String>)>,
    /// `-d`: print debug diagnostics.
    pub debug: bool,
    /// `-w`: any warning becomes fatal.
    pub fail_on_warning: bool,
    /// `-n Wxxxx,...`: warning tags to suppress.
    pub disabled_warnings: Vec<u16>,
    /// `-t`: run embedded `.TEST` blocks after a clean assembly.
    pub run_tests: bool,
    /// `-T`: emit TAP instead of plain pass/fail text.
    pub tap_output: bool,
    /// `-r`: shuffle test execution order.
    pub shuffle_tests: bool,
    /// `-c <file>`: dump a core image on test failure.
    pub corefile: Option<PathBuf>,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            entry_file: "a.asm".to_string(),
            entry_source: String::new(),
            include_dirs: Vec::new(),
            virtual_files: HashMap::new(),
            backend: "bin".to_string(),
            backend_flags: Vec::new(),
            debug: false,
            fail_on_warning: false,
            disabled_warnings: Vec::new(),
            run_tests: false,
            tap_output: false,
            shuffle_tests: false,
            corefile: None,
        }
    }
}

/// Everything an `assemble()` call produces.
pub struct AssembleOutcome {
    /// The back-end's finished byte image.
    pub image: Vec<u8>,
    /// The final symbol table, for `-l`-style listings.
    pub symbols: SymbolTable,
    /// Every file touched via `INCLUDE`/`INCBIN`, entry file first, for `-M` dependency output.
    pub dependencies: Vec<String>,
    /// Set when `-t` was requested: the embedded test run's result.
    pub test_report: Option<TestReport>,
    /// True if any error was reported, or (under `-w`) any warning was. Assembly otherwise
    /// returns `Ok` even in this case, since warnings don't stop the pass driver on their own;
    /// callers that care about `-w`'s exit-status upgrade must check this explicitly.
    pub warnings_failed: bool,
}

struct Shared<'a> {
    symtab: SymbolTable,
    backend: Box<dyn Backend>,
    diag: DiagSink<std::io::Stderr>,
    dependencies: Vec<String>,
    options: &'a AssembleOptions,
    test_org: u16,
    in_test: Option<TestUnit>,
    asserts: Vec<Assertion>,
    units: Vec<TestUnit>,
    tron_ranges: Vec<(u16, u16)>,
    memory_writes: Vec<(u16, Vec<u8>)>,
}

#[derive(Clone)]
struct LocalState {
    pc: u16,
    dp: u8,
    current_global: String,
    prev_mnemonic: Option<String>,
    /// Whether the previous instruction was an unconditional transfer of control, for
    /// `check_dead_code`: true for `BRA`/`LBRA`/`JMP`/`RTS`/`RTI` and for `PULS`/`PULU` that pull
    /// `PC` or `TFR`/`EXG` into or out of `PC`.
    prev_transfers_control: bool,
}

impl Default for LocalState {
    fn default() -> Self {
        Self {
            pc: 0,
            dp: 0,
            current_global: String::new(),
            prev_mnemonic: None,
            prev_transfers_control: false,
        }
    }
}

/// Run both passes over the entry file and finish the back-end image.
pub fn assemble(options: &AssembleOptions) -> Result<AssembleOutcome, AssembleError> {
    let backend = backend::by_name(&options.backend).ok_or_else(|| {
        AssembleError::from(Diagnostic::new(
            Severity::Error,
            "E0046",
            SourceLoc::none(),
            format!("unknown output format '{}'", options.backend),
        ))
    })?;

    let mut diag = DiagSink::new(std::io::stderr(), options.debug, options.fail_on_warning);
    for &tag in &options.disabled_warnings {
        diag.disable(tag);
    }

    let mut shared = Shared {
        symtab: SymbolTable::new(),
        backend,
        diag,
        dependencies: Vec::new(),
        options,
        test_org: pseudo::DEFAULT_TEST_ORG,
        in_test: None,
        asserts: Vec::new(),
        units: Vec::new(),
        tron_ranges: Vec::new(),
        memory_writes: Vec::new(),
    };
    for (flag, value) in &options.backend_flags {
        shared.backend.cmdline(flag, value.as_deref())?;
    }

    for pass in 1..=2u8 {
        shared.backend.pass_start(pass);
        let mut state = LocalState::default();
        run_file(&options.entry_file, &options.entry_source, pass, &mut shared, &mut state)?;
        shared.backend.pass_end(pass)?;
    }

    let entry_addr = shared.symtab.find(&Label::new("START")).map(|s| s.value);
    shared.backend.end(entry_addr)?;
    let image = shared.backend.fini()?;

    let test_report = if options.run_tests && !shared.units.is_empty() {
        let mut ctx = TestContext::new();
        for (addr, bytes) in &shared.memory_writes {
            ctx.load(*addr, bytes);
        }
        for (start, end) in &shared.tron_ranges {
            ctx.mark_tron(*start, *end);
        }
        ctx.asserts = shared.asserts.clone();
        ctx.units = shared.units.clone();
        Some(crate::testrunner::run_all(&ctx, options.shuffle_tests))
    } else {
        None
    };

    let warnings_failed = shared.diag.failed();
    Ok(AssembleOutcome {
        image,
        symbols: shared.symtab,
        dependencies: shared.dependencies,
        test_report,
        warnings_failed,
    })
}

fn resolve_include(shared: &Shared, name: &str) -> Result<(String, String), AssembleError> {
    if let Some(text) = shared.options.virtual_files.get(name) {
        return Ok((name.to_string(), text.clone()));
    }
    for dir in &shared.options.include_dirs {
        let candidate = dir.join(name);
        if let Ok(text) = std::fs::read_to_string(&candidate) {
            return Ok((candidate.to_string_lossy().into_owned(), text));
        }
    }
    if let Ok(text) = std::fs::read_to_string(name) {
        return Ok((name.to_string(), text));
    }
    Err(Diagnostic::new(Severity::Error, "E0047", SourceLoc::none(), format!("can't find include file '{name}'")).into())
}

fn run_file(file: &str, source: &str, pass: u8, shared: &mut Shared, state: &mut LocalState) -> Result<(), AssembleError> {
    if pass == 1 && !shared.dependencies.iter().any(|d| d == file) {
        shared.dependencies.push(file.to_string());
    }
    for (lineno, raw) in source.lines().enumerate() {
        let line = (lineno + 1) as u32;
        let loc = SourceLoc::at(file.to_string(), line);
        match process_line(raw, file, line, pass, shared, state) {
            Ok(Some(include)) => {
                let (resolved_name, text) = resolve_include(shared, &include)?;
                let saved = state.clone();
                run_file(&resolved_name, &text, pass, shared, state)?;
                *state = saved;
            }
            Ok(None) => {}
            Err(diag) => {
                shared.diag.report(diag_with_loc(diag, &loc))?;
            }
        }
    }
    Ok(())
}

fn diag_with_loc(mut d: Diagnostic, loc: &SourceLoc) -> Diagnostic {
    if d.loc.file.is_none() {
        d.loc = loc.clone();
    }
    d
}

/// Returns `Ok(Some(name))` when the line was an `INCLUDE`, so the caller can recurse outside of
/// this function's own borrow of `shared`/`state`.
fn process_line(
    raw: &str,
    file: &str,
    line: u32,
    pass: u8,
    shared: &mut Shared,
    state: &mut LocalState,
) -> Result<Option<String>, Diagnostic> {
    let loc = SourceLoc::at(file.to_string(), line);
    let mut buf = LineBuffer::new();
    buf.load(raw, loc.clone())?;

    if buf.at_end() {
        return Ok(None);
    }
    let lead = buf.peek();
    if lead == ';' || lead == '*' {
        return Ok(None);
    }

    let label = parse_label(&mut buf)?;
    skip_space(&mut buf);
    buf.unget();
    if buf.at_end() {
        if let Some(label) = label {
            define_label(shared, state, &label, pass, &loc)?;
        }
        return Ok(None);
    }

    let mnemonic = parse_mnemonic(&mut buf);
    if mnemonic.is_empty() {
        if let Some(label) = label {
            define_label(shared, state, &label, pass, &loc)?;
        }
        return Ok(None);
    }

    let ctx = EvalContext {
        symtab: &shared.symtab,
        pass,
        pc: state.pc,
        dp: state.dp,
        current_global: &state.current_global,
        loc: loc.clone(),
    };

    if let Some(pseudo_op) = PseudoOp::parse(&mnemonic) {
        return dispatch_pseudo(pseudo_op, label, &mut buf, &ctx, pass, shared, state, &loc);
    }

    if let Some(desc) = opcode::lookup(&mnemonic) {
        if let Some(label) = &label {
            define_label(shared, state, label, pass, &loc)?;
        }
        check_dead_code(shared, state, &mnemonic, label.is_some(), desc.cycles, &loc);
        let ctx = EvalContext {
            symtab: &shared.symtab,
            pass,
            pc: state.pc,
            dp: state.dp,
            current_global: &state.current_global,
            loc: loc.clone(),
        };
        let encoded = encode::encode(desc, &mut buf, &ctx)?;
        emit(shared, state, &encoded.bytes, ByteKind::Instruction)?;
        for w in encoded.warnings {
            shared.diag.report(w)?;
        }
        let mnemonic_upper = mnemonic.to_ascii_uppercase();
        state.prev_transfers_control = encoded.transfers_control
            || matches!(mnemonic_upper.as_str(), "BRA" | "LBRA" | "JMP" | "RTS" | "RTI");
        state.prev_mnemonic = Some(mnemonic_upper);
        return Ok(None);
    }

    Err(Diagnostic::new(Severity::Error, "E0048", loc, format!("unknown mnemonic '{mnemonic}'")))
}

fn parse_label(buf: &mut LineBuffer) -> Result<Option<Label>, Diagnostic> {
    let c = buf.peek();
    if c == ' ' || c == '\t' || c == '\0' {
        return Ok(None);
    }
    let mut name = String::new();
    loop {
        let c = buf.next();
        if can_continue_label(c) || (name.is_empty() && can_start_label(c)) {
            name.push(c);
        } else {
            buf.unget();
            break;
        }
    }
    if name.is_empty() {
        return Ok(None);
    }
    Label::try_new(name).map(Some).map_err(|overlong| {
        Diagnostic::new(Severity::Error, "E0050", SourceLoc::none(), format!("label '{overlong}' exceeds the maximum length"))
    })
}

fn parse_mnemonic(buf: &mut LineBuffer) -> String {
    let mut s = String::new();
    loop {
        let c = buf.next();
        if c.is_ascii_alphanumeric() || c == '.' {
            s.push(c);
        } else {
            buf.unget();
            break;
        }
    }
    s
}

fn effective_label(state: &LocalState, label: &Label) -> Label {
    if label.is_local() {
        Label::new(label.effective(&state.current_global))
    } else {
        label.clone()
    }
}

fn define_label(shared: &mut Shared, state: &mut LocalState, label: &Label, pass: u8, loc: &SourceLoc) -> Result<(), Diagnostic> {
    let eff = effective_label(state, label);
    if !label.is_local() {
        state.current_global = label.as_str().to_string();
    }
    if pass == 1 {
        shared
            .symtab
            .define(eff, Binding::Address, state.pc, loc.file.as_deref().unwrap_or(""), loc.line.unwrap_or(0), 16)?;
    } else if let Some(sym) = shared.symtab.find_mut(&eff) {
        sym.value = state.pc;
    }
    Ok(())
}

fn emit(shared: &mut Shared, state: &mut LocalState, bytes: &[u8], kind: ByteKind) -> Result<(), AssembleError> {
    shared.backend.write(state.pc, bytes, kind)?;
    if shared.in_test.is_some() {
        shared.memory_writes.push((state.pc, bytes.to_vec()));
    }
    state.pc = state.pc.wrapping_add(bytes.len() as u16);
    Ok(())
}

/// Flags an unconditional transfer of control (`BRA`/`LBRA`/`JMP`/`RTS`/`RTI`, `PULS`/`PULU`
/// pulling `PC`, `TFR`/`EXG` into or out of `PC`) followed by a line that can't actually be
/// reached: not a label (someone could jump here) and not a zero-cycle pseudo-instruction, and
/// that doesn't repeat the same mnemonic (the one exception this assembler allows, for jump
/// tables written as back-to-back identical branches).
fn check_dead_code(
    shared: &mut Shared,
    state: &mut LocalState,
    mnemonic: &str,
    has_label: bool,
    next_cycles: u8,
    loc: &SourceLoc,
) {
    let upper = mnemonic.to_ascii_uppercase();
    let repeats_prev = state.prev_mnemonic.as_deref() == Some(upper.as_str());
    if state.prev_transfers_control && !repeats_prev && !has_label && next_cycles != 0 {
        let _ = shared.diag.report(Diagnostic::new(
            Severity::Warning,
            "W0007",
            loc.clone(),
            "unreachable code after unconditional transfer of control",
        ));
    }
}

fn dispatch_pseudo(
    op: PseudoOp,
    label: Option<Label>,
    buf: &mut LineBuffer,
    ctx: &EvalContext,
    pass: u8,
    shared: &mut Shared,
    state: &mut LocalState,
    loc: &SourceLoc,
) -> Result<Option<String>, Diagnostic> {
    match op {
        PseudoOp::Equ => {
            let label = label.ok_or_else(|| Diagnostic::new(Severity::Error, "E0051", loc.clone(), "EQU requires a label"))?;
            let eff = effective_label(state, &label);
            pseudo::equ(&mut shared.symtab, &eff, buf, ctx)?;
            Ok(None)
        }
        PseudoOp::Set => {
            let label = label.ok_or_else(|| Diagnostic::new(Severity::Error, "E0051", loc.clone(), "SET requires a label"))?;
            let eff = effective_label(state, &label);
            pseudo::set(&mut shared.symtab, &eff, buf, ctx)?;
            Ok(None)
        }
        PseudoOp::Org => {
            if let Some(label) = &label {
                define_label(shared, state, label, pass, loc)?;
            }
            let addr = pseudo::org(buf, ctx)?;
            state.pc = addr;
            shared.backend.org(addr).map_err(to_diag)?;
            Ok(None)
        }
        PseudoOp::Rmb => {
            if let Some(label) = &label {
                define_label(shared, state, label, pass, loc)?;
            }
            let count = pseudo::rmb(buf, ctx)?;
            shared.backend.rmb(state.pc, count).map_err(to_diag)?;
            state.pc = state.pc.wrapping_add(count);
            Ok(None)
        }
        PseudoOp::Align => {
            if let Some(label) = &label {
                define_label(shared, state, label, pass, loc)?;
            }
            let pad = pseudo::align(buf, ctx)?;
            if pad > 0 {
                shared.backend.rmb(state.pc, pad).map_err(to_diag)?;
            }
            state.pc = state.pc.wrapping_add(pad);
            Ok(None)
        }
        PseudoOp::Fcb => {
            if let Some(label) = &label {
                define_label(shared, state, label, pass, loc)?;
            }
            let (bytes, warnings) = pseudo::fcb(buf, ctx)?;
            emit(shared, state, &bytes, ByteKind::Data).map_err(to_diag)?;
            for w in warnings {
                shared.diag.report(w).map_err(to_diag)?;
            }
            Ok(None)
        }
        PseudoOp::Fdb => {
            if let Some(label) = &label {
                define_label(shared, state, label, pass, loc)?;
            }
            let bytes = pseudo::fdb(buf, ctx)?;
            emit(shared, state, &bytes, ByteKind::Data).map_err(to_diag)?;
            Ok(None)
        }
        PseudoOp::Fcc => {
            if let Some(label) = &label {
                define_label(shared, state, label, pass, loc)?;
            }
            let bytes = pseudo::fcc(buf, ctx)?;
            emit(shared, state, &bytes, ByteKind::Data).map_err(to_diag)?;
            Ok(None)
        }
        PseudoOp::Fcs => {
            if let Some(label) = &label {
                define_label(shared, state, label, pass, loc)?;
            }
            let bytes = pseudo::fcs(buf, ctx)?;
            emit(shared, state, &bytes, ByteKind::Data).map_err(to_diag)?;
            Ok(None)
        }
        PseudoOp::Ascii => {
            if let Some(label) = &label {
                define_label(shared, state, label, pass, loc)?;
            }
            let c = skip_space(buf);
            let mode = match c.to_ascii_uppercase() {
                'C' => AsciiMode::CountPrefixed,
                'H' => AsciiMode::HighBitTerminated,
                'Z' => AsciiMode::NullTerminated,
                _ => {
                    buf.unget();
                    AsciiMode::Plain
                }
            };
            let bytes = pseudo::ascii(buf, ctx, mode)?;
            emit(shared, state, &bytes, ByteKind::Data).map_err(to_diag)?;
            Ok(None)
        }
        PseudoOp::Include => {
            let name = read_filename(buf)?;
            Ok(Some(name))
        }
        PseudoOp::Incbin => {
            let name = read_filename(buf)?;
            let (_, bytes_text) = resolve_include(shared, &name).map_err(to_diag_simple)?;
            let bytes = bytes_text.into_bytes();
            emit(shared, state, &bytes, ByteKind::Data).map_err(to_diag)?;
            Ok(None)
        }
        PseudoOp::Setdp => {
            state.dp = pseudo::setdp(buf, ctx)?;
            Ok(None)
        }
        PseudoOp::Extdp => {
            let label = pseudo::extern_decl(&mut shared.symtab, buf, ctx, 8)?;
            let _ = label;
            Ok(None)
        }
        PseudoOp::Extern => {
            let label = pseudo::extern_decl(&mut shared.symtab, buf, ctx, 16)?;
            let _ = label;
            Ok(None)
        }
        PseudoOp::Public => {
            let label = label.ok_or_else(|| Diagnostic::new(Severity::Error, "E0051", loc.clone(), "PUBLIC requires a label"))?;
            let eff = effective_label(state, &label);
            pseudo::public(&mut shared.symtab, &eff)?;
            Ok(None)
        }
        PseudoOp::End => {
            let c = skip_space(buf);
            if c != '\0' {
                buf.unget();
                let v = eval(buf, ctx)?;
                shared.symtab.define(Label::new("START"), Binding::Address, v.value, "", 0, 16).ok();
            }
            Ok(None)
        }
        PseudoOp::Opt => {
            let text = buf.as_str()[buf.ridx..].to_string();
            let directive = pseudo::parse_opt(&text, ctx)?;
            match directive {
                OptDirective::Warning { tag, enable } => {
                    if enable {
                        shared.diag.enable(tag);
                    } else {
                        shared.diag.disable(tag);
                    }
                }
                OptDirective::Obj(_) => {}
                OptDirective::TestOrg(addr) => shared.test_org = addr,
                OptDirective::BackendSpecific(rest) => {
                    let mut parts = rest.splitn(2, char::is_whitespace);
                    if let Some(flag) = parts.next() {
                        let value = parts.next().map(|s| s.trim().to_string());
                        shared.backend.cmdline(flag, value.as_deref()).map_err(to_diag)?;
                    }
                }
            }
            Ok(None)
        }
        PseudoOp::Test => {
            let c = skip_space(buf);
            let name = if c != '\0' {
                buf.unget();
                read_filename(buf).unwrap_or_default()
            } else {
                String::new()
            };
            let addr = if shared.test_org != 0 { shared.test_org } else { state.pc };
            state.pc = addr;
            shared.backend.org(addr).map_err(to_diag)?;
            shared.in_test = Some(TestUnit {
                name: if name.is_empty() { format!("test@{addr:04X}") } else { name },
                entry: addr,
            });
            Ok(None)
        }
        PseudoOp::Endtst => {
            if let Some(unit) = shared.in_test.take() {
                shared.units.push(unit);
            }
            Ok(None)
        }
        PseudoOp::Assert => {
            let program = crate::assert::compile(buf, loc)?;
            shared.asserts.push(Assertion { addr: state.pc, program });
            Ok(None)
        }
        PseudoOp::Tron => {
            shared.tron_ranges.push((state.pc, state.pc));
            Ok(None)
        }
        PseudoOp::Troff => {
            if let Some(last) = shared.tron_ranges.last_mut() {
                last.1 = state.pc;
            }
            Ok(None)
        }
    }
}

fn to_diag(e: AssembleError) -> Diagnostic {
    match e {
        AssembleError::Diagnostic(d) => *d,
        AssembleError::Io(e) => Diagnostic::new(Severity::Error, "E0052", SourceLoc::none(), e.to_string()),
        AssembleError::Internal(s) => Diagnostic::new(Severity::Error, "E0001", SourceLoc::none(), s),
    }
}

fn to_diag_simple(e: AssembleError) -> Diagnostic {
    to_diag(e)
}

fn read_filename(buf: &mut LineBuffer) -> Result<String, Diagnostic> {
    let c = skip_space(buf);
    let mut name = String::new();
    if c == '"' || c == '\'' {
        loop {
            let c = buf.next();
            if c == '\0' || c == '"' || c == '\'' {
                break;
            }
            name.push(c);
        }
    } else {
        buf.unget();
        loop {
            let c = buf.next();
            if c == '\0' || c == ' ' || c == '\t' {
                buf.unget();
                break;
            }
            name.push(c);
        }
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> AssembleOutcome {
        let options = AssembleOptions {
            entry_source: source.to_string(),
            ..AssembleOptions::default()
        };
        assemble(&options).unwrap()
    }

    #[test]
    fn assembles_a_trivial_program() {
        let outcome = run("        ORG $1000\nSTART   LDA #$42\n        STA $2000\n        RTS\n        END START\n");
        assert_eq!(outcome.image, vec![0x86, 0x42, 0xB7, 0x20, 0x00, 0x39]);
    }

    #[test]
    fn defines_and_uses_a_forward_label() {
        let outcome = run("        ORG $0\n        BRA TARGET\nTARGET  RTS\n");
        assert_eq!(outcome.image, &[0x20, 0x00, 0x39]);
    }

    #[test]
    fn equ_symbol_is_visible_to_later_code() {
        let outcome = run("FOO     EQU $10\n        ORG $0\n        LDA #FOO\n");
        assert_eq!(outcome.image, &[0x86, 0x10]);
    }

    #[test]
    fn extern_symbol_does_not_abort_pass_two() {
        let outcome = run("        EXTERN FOO\n        ORG $0\n        LDA #0\n");
        assert_eq!(outcome.image, &[0x86, 0x00]);
    }

    fn run_with_warnings(source: &str) -> AssembleOutcome {
        let options = AssembleOptions {
            entry_source: source.to_string(),
            fail_on_warning: true,
            ..AssembleOptions::default()
        };
        assemble(&options).unwrap()
    }

    #[test]
    fn unreachable_code_after_bra_warns() {
        let outcome = run_with_warnings("        ORG $0\n        BRA DONE\n        NOP\nDONE    RTS\n");
        assert!(outcome.warnings_failed);
    }

    #[test]
    fn labeled_line_after_bra_does_not_warn() {
        let outcome = run_with_warnings("        ORG $0\n        BRA DONE\nDONE    RTS\n");
        assert!(!outcome.warnings_failed);
    }

    #[test]
    fn repeated_branch_after_bra_does_not_warn() {
        let outcome = run_with_warnings("        ORG $0\n        BRA L1\n        BRA L2\nL1      NOP\nL2      RTS\n");
        assert!(!outcome.warnings_failed);
    }

    #[test]
    fn tfr_to_pc_marks_dead_code_after_it() {
        let outcome = run_with_warnings("        ORG $0\n        TFR X,PC\n        NOP\n");
        assert!(outcome.warnings_failed);
    }

    #[test]
    fn unknown_mnemonic_is_an_error() {
        let options = AssembleOptions {
            entry_source: "        BOGUS\n".to_string(),
            ..AssembleOptions::default()
        };
        let err = assemble(&options).unwrap_err();
        assert!(matches!(err, AssembleError::Diagnostic(d) if d.code == "E0048"));
    }
}
