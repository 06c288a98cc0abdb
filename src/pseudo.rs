//! Pseudo-op semantics: everything that isn't a CPU instruction.

use crate::buffer::{skip_space, LineBuffer};
use crate::diag::{Diagnostic, Severity, SourceLoc};
use crate::expr::{eval, EvalContext};
use crate::label::Label;
use crate::symbol::Binding;

/// One data or directive byte-producing result, distinguished by kind for the back-end's
/// `write(bytes, kind)` hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteKind {
    Instruction,
    Data,
}

/// The bucket of pseudo-ops recognized by the assembler, named after the mnemonic they handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoOp {
    Equ,
    Set,
    Org,
    Rmb,
    Align,
    Fcb,
    Fdb,
    Fcc,
    Fcs,
    Ascii,
    Include,
    Incbin,
    Setdp,
    Extdp,
    Extern,
    Public,
    End,
    Opt,
    Test,
    Endtst,
    Assert,
    Tron,
    Troff,
}

impl PseudoOp {
    /// Case-insensitive mnemonic lookup.
    pub fn parse(mnemonic: &str) -> Option<PseudoOp> {
        Some(match mnemonic.to_ascii_uppercase().as_str() {
            "EQU" => PseudoOp::Equ,
            "SET" => PseudoOp::Set,
            "ORG" => PseudoOp::Org,
            "RMB" => PseudoOp::Rmb,
            "ALIGN" => PseudoOp::Align,
            "FCB" => PseudoOp::Fcb,
            "FDB" => PseudoOp::Fdb,
            "FCC" => PseudoOp::Fcc,
            "FCS" => PseudoOp::Fcs,
            "ASCII" => PseudoOp::Ascii,
            "INCLUDE" => PseudoOp::Include,
            "INCBIN" => PseudoOp::Incbin,
            "SETDP" => PseudoOp::Setdp,
            "EXTDP" => PseudoOp::Extdp,
            "EXTERN" => PseudoOp::Extern,
            "PUBLIC" => PseudoOp::Public,
            "END" => PseudoOp::End,
            "OPT" => PseudoOp::Opt,
            ".TEST" => PseudoOp::Test,
            ".ENDTST" => PseudoOp::Endtst,
            ".ASSERT" => PseudoOp::Assert,
            ".TRON" => PseudoOp::Tron,
            ".TROFF" => PseudoOp::Troff,
            _ => return None,
        })
    }
}

fn err(ctx: &EvalContext, code: &'static str, msg: impl Into<String>) -> Diagnostic {
    Diagnostic::new(Severity::Error, code, ctx.loc.clone(), msg)
}

/// `EQU`: fix a label's value; promotes the implicit `Address` symbol to `Equate`.
///
/// Like `driver::define_label`, this only inserts into the symbol table on pass 1; pass 2
/// re-running the same `EQU` line just refreshes the value in place (the expression may resolve
/// differently once every symbol is known), rather than re-`define`-ing into an binding the table
/// would otherwise treat as an illegal redefinition.
pub fn equ(
    symtab: &mut crate::symbol::SymbolTable,
    label: &Label,
    buf: &mut LineBuffer,
    ctx: &EvalContext,
) -> Result<u16, Diagnostic> {
    let v = eval(buf, ctx)?;
    if ctx.pass == 1 {
        symtab.define(label.clone(), Binding::Equate, v.value, &ctx.loc.file.clone().unwrap_or_default(), ctx.loc.line.unwrap_or(0), 0)?;
    } else if let Some(sym) = symtab.find_mut(label) {
        sym.value = v.value;
    }
    Ok(v.value)
}

/// `SET`: create or redefine a `Set` symbol.
pub fn set(
    symtab: &mut crate::symbol::SymbolTable,
    label: &Label,
    buf: &mut LineBuffer,
    ctx: &EvalContext,
) -> Result<u16, Diagnostic> {
    let v = eval(buf, ctx)?;
    symtab.define(label.clone(), Binding::Set, v.value, &ctx.loc.file.clone().unwrap_or_default(), ctx.loc.line.unwrap_or(0), 0)?;
    Ok(v.value)
}

/// `ORG`: evaluate the new program counter.
pub fn org(buf: &mut LineBuffer, ctx: &EvalContext) -> Result<u16, Diagnostic> {
    Ok(eval(buf, ctx)?.value)
}

/// `RMB <n>`: reserve n bytes; zero is rejected.
pub fn rmb(buf: &mut LineBuffer, ctx: &EvalContext) -> Result<u16, Diagnostic> {
    let v = eval(buf, ctx)?;
    if v.value == 0 {
        return Err(err(ctx, "E0037", "RMB of zero bytes is not allowed"));
    }
    Ok(v.value)
}

/// `ALIGN <n>`: advance PC to the next multiple of n.
pub fn align(buf: &mut LineBuffer, ctx: &EvalContext) -> Result<u16, Diagnostic> {
    let v = eval(buf, ctx)?;
    if !v.defined {
        return Err(err(ctx, "E0038", "ALIGN boundary must be known on pass 1"));
    }
    if v.value == 0 {
        return Err(err(ctx, "E0038", "ALIGN boundary of zero is not allowed"));
    }
    let n = v.value;
    let rem = ctx.pc % n;
    Ok(if rem == 0 { 0 } else { n - rem })
}

/// `FCB a, b, c`: comma-separated byte list, truncated with a warning if out of 8-bit range.
pub fn fcb(buf: &mut LineBuffer, ctx: &EvalContext) -> Result<(Vec<u8>, Vec<Diagnostic>), Diagnostic> {
    let mut bytes = Vec::new();
    let mut warnings = Vec::new();
    loop {
        let v = eval(buf, ctx)?;
        if v.defined && !(-128..=255).contains(&(v.value as i16)) {
            warnings.push(Diagnostic::new(Severity::Warning, "W0006", ctx.loc.clone(), "value truncated to 8 bits"));
        }
        bytes.push(v.value as u8);
        let c = skip_space(buf);
        if c != ',' {
            buf.unget();
            break;
        }
    }
    Ok((bytes, warnings))
}

/// `FDB a, b, c`: comma-separated big-endian word list.
pub fn fdb(buf: &mut LineBuffer, ctx: &EvalContext) -> Result<Vec<u8>, Diagnostic> {
    let mut bytes = Vec::new();
    loop {
        let v = eval(buf, ctx)?;
        bytes.extend_from_slice(&v.value.to_be_bytes());
        let c = skip_space(buf);
        if c != ',' {
            buf.unget();
            break;
        }
    }
    Ok(bytes)
}

/// `FCC <delim>text<delim>`: emit the delimited text literally.
pub fn fcc(buf: &mut LineBuffer, ctx: &EvalContext) -> Result<Vec<u8>, Diagnostic> {
    let delim = skip_space(buf);
    let mut bytes = Vec::new();
    loop {
        let c = buf.next();
        if c == delim {
            break;
        }
        if c == '\0' {
            return Err(err(ctx, "E0039", "unterminated FCC string"));
        }
        bytes.push(c as u8);
    }
    Ok(bytes)
}

/// `FCS`: `FCC` with the high bit of the final byte set.
pub fn fcs(buf: &mut LineBuffer, ctx: &EvalContext) -> Result<Vec<u8>, Diagnostic> {
    let mut bytes = fcc(buf, ctx)?;
    if let Some(last) = bytes.last_mut() {
        *last |= 0x80;
    }
    Ok(bytes)
}

/// How to terminate an `ASCII` literal, selected by its trailing `C`/`H`/`Z` suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsciiMode {
    /// No suffix: emit the text as-is.
    Plain,
    /// `C`: prepend a length byte.
    CountPrefixed,
    /// `H`: set the high bit of the final byte.
    HighBitTerminated,
    /// `Z`: append a trailing null byte.
    NullTerminated,
}

/// `ASCII '…'[C|H|Z]`: C-style escapes, with a length/terminator suffix.
pub fn ascii(buf: &mut LineBuffer, ctx: &EvalContext, mode: AsciiMode) -> Result<Vec<u8>, Diagnostic> {
    let delim = skip_space(buf);
    let mut text = Vec::new();
    loop {
        let c = buf.next();
        if c == delim {
            break;
        }
        if c == '\0' {
            return Err(err(ctx, "E0039", "unterminated ASCII string"));
        }
        if c == '\\' {
            let e = buf.next();
            text.push(match e {
                'n' => b'\n',
                't' => b'\t',
                'r' => b'\r',
                '0' => 0,
                '\\' => b'\\',
                other => other as u8,
            });
        } else {
            text.push(c as u8);
        }
    }
    match mode {
        AsciiMode::Plain => {}
        AsciiMode::CountPrefixed => {
            if text.len() > 255 {
                return Err(err(ctx, "E0040", "ASCII/C string longer than 255 bytes"));
            }
            text.insert(0, text.len() as u8);
        }
        AsciiMode::HighBitTerminated => {
            if let Some(last) = text.last_mut() {
                *last |= 0x80;
            }
        }
        AsciiMode::NullTerminated => text.push(0),
    }
    Ok(text)
}

/// `SETDP <n>`: set the direct-page comparison value for the direct-vs-extended tie-break.
pub fn setdp(buf: &mut LineBuffer, ctx: &EvalContext) -> Result<u8, Diagnostic> {
    Ok(eval(buf, ctx)?.value as u8)
}

/// `EXTERN name` / `EXTDP name`: declare an external symbol, 16- or 8-bit respectively.
///
/// Pass-1-only insert, like [`equ`]: pass 2 re-running the same declaration must not hit the
/// table's "already defined" check against the `Extern` binding pass 1 left behind.
pub fn extern_decl(
    symtab: &mut crate::symbol::SymbolTable,
    buf: &mut LineBuffer,
    ctx: &EvalContext,
    bits: u8,
) -> Result<Label, Diagnostic> {
    let mut name = String::new();
    loop {
        let c = buf.next();
        if crate::label::can_continue_label(c) {
            name.push(c);
        } else {
            buf.unget();
            break;
        }
    }
    let label = Label::new(name);
    if ctx.pass == 1 {
        symtab.define(label.clone(), Binding::Extern, 0, &ctx.loc.file.clone().unwrap_or_default(), ctx.loc.line.unwrap_or(0), bits)?;
    }
    Ok(label)
}

/// `PUBLIC`: re-kind the current label as `Public`.
pub fn public(symtab: &mut crate::symbol::SymbolTable, label: &Label) -> Result<(), Diagnostic> {
    if let Some(sym) = symtab.find_mut(label) {
        sym.binding = Binding::Public;
    }
    Ok(())
}

/// `OPT` sub-directive, parsed from the remainder of the line after the leading `*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptDirective {
    /// `*DISABLE Wxxxx` / `*ENABLE Wxxxx`.
    Warning { tag: u16, enable: bool },
    /// `*OBJ TRUE|FALSE`.
    Obj(bool),
    /// `*TEST ORG <addr>`.
    TestOrg(u16),
    /// Anything else: routed to the back-end's `cmdline`-equivalent `opt` hook verbatim.
    BackendSpecific(String),
}

/// Parse an `OPT` line's directive text (after the mnemonic, not including the `*`).
pub fn parse_opt(text: &str, ctx: &EvalContext) -> Result<OptDirective, Diagnostic> {
    let text = text.trim().trim_start_matches('*').trim_start();
    let mut parts = text.split_whitespace();
    match parts.next() {
        Some("DISABLE") | Some("ENABLE") => {
            let enable = text.starts_with("ENABLE");
            let tag_str = parts.next().ok_or_else(|| err(ctx, "E0041", "OPT warning directive needs a Wxxxx tag"))?;
            let digits = tag_str.trim_start_matches('W');
            let tag: u16 = digits
                .parse()
                .map_err(|_| err(ctx, "E0041", "malformed warning tag"))?;
            Ok(OptDirective::Warning { tag, enable })
        }
        Some("OBJ") => {
            let v = parts.next().unwrap_or("");
            Ok(OptDirective::Obj(v.eq_ignore_ascii_case("TRUE")))
        }
        Some("TEST") => {
            let next = parts.next();
            if next != Some("ORG") {
                return Err(err(ctx, "E0041", "OPT *TEST expects ORG <addr>"));
            }
            let addr_str = parts.next().ok_or_else(|| err(ctx, "E0041", "OPT *TEST ORG needs an address"))?;
            let addr = parse_addr_literal(addr_str).ok_or_else(|| err(ctx, "E0041", "malformed address"))?;
            Ok(OptDirective::TestOrg(addr))
        }
        _ => Ok(OptDirective::BackendSpecific(text.to_string())),
    }
}

fn parse_addr_literal(s: &str) -> Option<u16> {
    if let Some(hex) = s.strip_prefix('$') {
        u16::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

/// Default `.TEST` region base, per `OPT *TEST ORG`'s documented default.
pub const DEFAULT_TEST_ORG: u16 = 0xE000;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolTable;

    fn ctx(t: &SymbolTable) -> EvalContext<'_> {
        ctx_for_pass(t, 2)
    }

    fn ctx_for_pass(t: &SymbolTable, pass: u8) -> EvalContext<'_> {
        EvalContext {
            symtab: t,
            pass,
            pc: 0x100,
            dp: 0,
            current_global: "",
            loc: SourceLoc::at("a.asm".to_string(), 1),
        }
    }

    #[test]
    fn equ_promotes_to_equate_binding() {
        let mut t = SymbolTable::new();
        let c = ctx_for_pass(&t, 1);
        let mut buf = LineBuffer::new();
        buf.load("5", SourceLoc::none()).unwrap();
        equ(&mut t, &Label::new("FOO"), &mut buf, &c).unwrap();
        assert_eq!(t.find(&Label::new("FOO")).unwrap().binding, Binding::Equate);
    }

    #[test]
    fn equ_on_pass_two_updates_value_without_redefining() {
        let mut t = SymbolTable::new();
        let c1 = ctx_for_pass(&t, 1);
        let mut buf = LineBuffer::new();
        buf.load("5", SourceLoc::none()).unwrap();
        equ(&mut t, &Label::new("FOO"), &mut buf, &c1).unwrap();

        let c2 = ctx_for_pass(&t, 2);
        let mut buf = LineBuffer::new();
        buf.load("7", SourceLoc::none()).unwrap();
        equ(&mut t, &Label::new("FOO"), &mut buf, &c2).unwrap();
        assert_eq!(t.find(&Label::new("FOO")).unwrap().value, 7);
    }

    #[test]
    fn extern_decl_on_pass_two_does_not_redefine() {
        let mut t = SymbolTable::new();
        let c1 = ctx_for_pass(&t, 1);
        let mut buf = LineBuffer::new();
        buf.load("FOO", SourceLoc::none()).unwrap();
        extern_decl(&mut t, &mut buf, &c1, 16).unwrap();
        assert_eq!(t.find(&Label::new("FOO")).unwrap().binding, Binding::Extern);

        let c2 = ctx_for_pass(&t, 2);
        let mut buf = LineBuffer::new();
        buf.load("FOO", SourceLoc::none()).unwrap();
        extern_decl(&mut t, &mut buf, &c2, 16).unwrap();
    }

    #[test]
    fn rmb_zero_is_rejected() {
        let t = SymbolTable::new();
        let c = ctx(&t);
        let mut buf = LineBuffer::new();
        buf.load("0", SourceLoc::none()).unwrap();
        let e = rmb(&mut buf, &c).unwrap_err();
        assert_eq!(e.code, "E0037");
    }

    #[test]
    fn align_computes_padding() {
        let t = SymbolTable::new();
        let c = ctx(&t);
        let mut buf = LineBuffer::new();
        buf.load("16", SourceLoc::none()).unwrap();
        assert_eq!(align(&mut buf, &c).unwrap(), 0x10 - 0x00);
    }

    #[test]
    fn fcc_reads_delimited_text() {
        let t = SymbolTable::new();
        let c = ctx(&t);
        let mut buf = LineBuffer::new();
        buf.load("\"hi\"", SourceLoc::none()).unwrap();
        assert_eq!(fcc(&mut buf, &c).unwrap(), b"hi".to_vec());
    }

    #[test]
    fn ascii_count_prefixed_prepends_length() {
        let t = SymbolTable::new();
        let c = ctx(&t);
        let mut buf = LineBuffer::new();
        buf.load("'hi'", SourceLoc::none()).unwrap();
        let bytes = ascii(&mut buf, &c, AsciiMode::CountPrefixed).unwrap();
        assert_eq!(bytes, vec![2, b'h', b'i']);
    }

    #[test]
    fn opt_test_org_parses_hex_address() {
        let t = SymbolTable::new();
        let c = ctx(&t);
        let d = parse_opt("*TEST ORG $C000", &c).unwrap();
        assert_eq!(d, OptDirective::TestOrg(0xC000));
    }

    #[test]
    fn opt_disable_parses_warning_tag() {
        let t = SymbolTable::new();
        let c = ctx(&t);
        let d = parse_opt("*DISABLE W0001", &c).unwrap();
        assert_eq!(d, OptDirective::Warning { tag: 1, enable: false });
    }
}
