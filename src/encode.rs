//! Per-handler-shape encoders: turn a parsed [`Operand`] plus an [`OpcodeDescriptor`] into the
//! instruction's byte sequence.

use crate::addressing::{self, IndexMode, Indexed, Operand, OffsetWidth};
use crate::buffer::{skip_space, LineBuffer};
use crate::diag::{Diagnostic, Severity, SourceLoc};
use crate::expr::{eval, EvalContext, Value};
use crate::opcode::{HandlerShape, OpcodeDescriptor, Register};

/// An encoded instruction: its bytes and, for branch instructions, the referenced target (so
/// the pass driver can do dead-code analysis against the next line).
#[derive(Debug, Clone)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub warnings: Vec<Diagnostic>,
    /// True for `PULS`/`PULU` that pull `PC`, and `TFR`/`EXG` into or out of `PC` — these hand
    /// control to a computed address as surely as a `JMP`, for dead-code analysis purposes.
    pub transfers_control: bool,
}

fn err(ctx: &EvalContext, code: &'static str, msg: impl Into<String>) -> Diagnostic {
    Diagnostic::new(Severity::Error, code, ctx.loc.clone(), msg)
}

fn warn(ctx: &EvalContext, code: &'static str, msg: impl Into<String>) -> Diagnostic {
    Diagnostic::new(Severity::Warning, code, ctx.loc.clone(), msg)
}

/// Encode one instruction. `buf` is positioned just past the mnemonic. PC-relative indexed
/// offsets (`,PCR`) are resolved against the post-instruction PC using the byte count already
/// accumulated in `out` at the point the indexed postbyte is emitted — see `encode_indexed`.
pub fn encode(
    desc: &OpcodeDescriptor,
    buf: &mut LineBuffer,
    ctx: &EvalContext,
) -> Result<Encoded, Diagnostic> {
    let mut out = Vec::new();
    let mut warnings = Vec::new();
    let mut transfers_control = false;

    match desc.shape {
        HandlerShape::Inherent => {
            push_page(&mut out, desc);
            out.push(desc.base);
        }
        HandlerShape::AccumOp { wide } => {
            push_page(&mut out, desc);
            let operand = addressing::parse_general(buf, ctx)?;
            encode_accum(desc, wide, operand, ctx, &mut out, &mut warnings)?;
        }
        HandlerShape::DieOp => {
            push_page(&mut out, desc);
            let operand = addressing::parse_general(buf, ctx)?;
            encode_die(desc, operand, ctx, &mut out, &mut warnings)?;
        }
        HandlerShape::Lea => {
            push_page(&mut out, desc);
            out.push(desc.base);
            let operand = addressing::parse_general(buf, ctx)?;
            match operand {
                Operand::Indexed(idx) => encode_indexed(&idx, ctx, &mut out, &mut warnings)?,
                _ => return Err(err(ctx, "E0030", "LEA requires an indexed operand")),
            }
        }
        HandlerShape::ShortBranch => {
            let target = eval(buf, ctx)?;
            let post_pc = ctx.pc.wrapping_add(2);
            let delta = (target.value.wrapping_sub(post_pc)) as i16;
            if target.defined && !(-128..=127).contains(&delta) {
                return Err(err(ctx, "E0031", "target exceeds 8-bit branch range"));
            }
            if delta == 0 && desc.mnemonic != "BRN" {
                warnings.push(warn(ctx, "W0001", "branch to next location"));
            }
            out.push(desc.base);
            out.push(delta as i8 as u8);
        }
        HandlerShape::LongBranch => {
            let target = eval(buf, ctx)?;
            let len = if desc.page.is_none() { 3 } else { 4 };
            let post_pc = ctx.pc.wrapping_add(len);
            let delta = target.value.wrapping_sub(post_pc) as i16;
            if target.defined && (-128..=127).contains(&delta) {
                warnings.push(warn(ctx, "W0002", "an 8-bit branch would suffice here"));
            }
            push_page(&mut out, desc);
            out.push(desc.base);
            out.extend_from_slice(&delta.to_be_bytes());
        }
        HandlerShape::PshPul => {
            let mask = parse_register_list(desc, buf, ctx)?;
            if matches!(desc.base, 0x35 | 0x37) && mask & Register::Pc.push_pull_bit() != 0 {
                transfers_control = true;
            }
            out.push(desc.base);
            out.push(mask);
        }
        HandlerShape::ExgTfr => {
            let (a, b) = parse_register_pair(buf, ctx)?;
            if a.is_16bit() != b.is_16bit() {
                warnings.push(warn(ctx, "W0003", "exchange/transfer between mismatched register sizes"));
            }
            if a == Register::Pc || b == Register::Pc {
                transfers_control = true;
            }
            out.push(desc.base);
            out.push((a.exg_code() << 4) | b.exg_code());
        }
        HandlerShape::AndCc => {
            let mask = parse_cc_mask(buf, ctx)?;
            out.push(desc.base);
            out.push(!mask);
        }
        HandlerShape::OrCc => {
            let mask = parse_cc_mask(buf, ctx)?;
            out.push(desc.base);
            out.push(mask);
        }
        HandlerShape::Cwai => {
            let mask = parse_cc_mask(buf, ctx)?;
            out.push(desc.base);
            out.push(!mask);
        }
    }

    Ok(Encoded { bytes: out, warnings, transfers_control })
}

fn push_page(out: &mut Vec<u8>, desc: &OpcodeDescriptor) {
    if let Some(p) = desc.page {
        out.push(p);
    }
}

fn encode_accum(
    desc: &OpcodeDescriptor,
    wide: bool,
    operand: Operand,
    ctx: &EvalContext,
    out: &mut Vec<u8>,
    warnings: &mut Vec<Diagnostic>,
) -> Result<(), Diagnostic> {
    match operand {
        Operand::Immediate(v) => {
            out.push(desc.base);
            push_operand_bytes(out, &v, wide);
        }
        Operand::Direct(v) => {
            out.push(desc.base + 0x10);
            out.push(v.value as u8);
        }
        Operand::Extended(v) => {
            if !v.defined {
                warnings.push(warn(ctx, "W0004", "value could be direct-page but was unknown in pass 1"));
            }
            out.push(desc.base + 0x30);
            out.extend_from_slice(&v.value.to_be_bytes());
        }
        Operand::Indexed(idx) => {
            out.push(desc.base + 0x20);
            encode_indexed(&idx, ctx, out, warnings)?;
        }
        Operand::ExtendedIndirect(v) => {
            out.push(desc.base + 0x20);
            out.push(0x9F);
            out.extend_from_slice(&v.value.to_be_bytes());
        }
        Operand::Branch(_) | Operand::Inherent => {
            return Err(err(ctx, "E0032", "addressing mode not valid for this instruction"));
        }
    }
    Ok(())
}

fn encode_die(
    desc: &OpcodeDescriptor,
    operand: Operand,
    ctx: &EvalContext,
    out: &mut Vec<u8>,
    warnings: &mut Vec<Diagnostic>,
) -> Result<(), Diagnostic> {
    let (idx_off, ext_off) = if desc.base < 0x80 { (0x60, 0x70) } else { (0x10, 0x20) };
    match operand {
        Operand::Immediate(_) => Err(err(ctx, "E0029", "this instruction has no immediate mode")),
        Operand::Direct(v) => {
            out.push(desc.base);
            out.push(v.value as u8);
            Ok(())
        }
        Operand::Extended(v) => {
            if !v.defined {
                warnings.push(warn(ctx, "W0004", "value could be direct-page but was unknown in pass 1"));
            }
            out.push(desc.base + ext_off);
            out.extend_from_slice(&v.value.to_be_bytes());
            Ok(())
        }
        Operand::Indexed(idx) => {
            out.push(desc.base + idx_off);
            encode_indexed(&idx, ctx, out, warnings)
        }
        Operand::ExtendedIndirect(v) => {
            out.push(desc.base + idx_off);
            out.push(0x9F);
            out.extend_from_slice(&v.value.to_be_bytes());
            Ok(())
        }
        Operand::Branch(_) | Operand::Inherent => {
            Err(err(ctx, "E0032", "addressing mode not valid for this instruction"))
        }
    }
}

fn push_operand_bytes(out: &mut Vec<u8>, v: &Value, wide: bool) {
    if wide {
        out.extend_from_slice(&v.value.to_be_bytes());
    } else {
        out.push(v.value as u8);
    }
}

fn encode_indexed(
    idx: &Indexed,
    ctx: &EvalContext,
    out: &mut Vec<u8>,
    warnings: &mut Vec<Diagnostic>,
) -> Result<(), Diagnostic> {
    let reg_bits = idx.register.index_bits().unwrap_or(0) << 5;

    match idx.mode {
        IndexMode::Offset { value, width } => match width {
            OffsetWidth::None => out.push(0x84 | reg_bits | indirect_bit(idx.indirect)),
            OffsetWidth::Bits5 => {
                if idx.indirect {
                    warnings.push(warn(ctx, "W0005", "5-bit indexed offset promoted to 8 bits for indirection"));
                    out.push(0x88 | reg_bits | 0x10);
                    out.push(value.value as u8);
                } else {
                    out.push(reg_bits | ((value.value as i16 as i8 as u8) & 0x1F));
                }
            }
            OffsetWidth::Bits8 => {
                out.push(0x88 | reg_bits | indirect_bit(idx.indirect));
                out.push(value.value as u8);
            }
            OffsetWidth::Bits16 => {
                out.push(0x89 | reg_bits | indirect_bit(idx.indirect));
                out.extend_from_slice(&value.value.to_be_bytes());
            }
        },
        IndexMode::AccumOffset(accum) => {
            out.push(accum.accum_offset_postbyte().unwrap() | reg_bits | indirect_bit(idx.indirect));
        }
        IndexMode::PostInc1 => out.push(0x80 | reg_bits),
        IndexMode::PostInc2 => out.push(0x81 | reg_bits | indirect_bit(idx.indirect)),
        IndexMode::PreDec1 => out.push(0x82 | reg_bits),
        IndexMode::PreDec2 => out.push(0x83 | reg_bits | indirect_bit(idx.indirect)),
        IndexMode::PcRelative { value, width } => {
            // `out` already holds every byte this instruction will emit before the postbyte
            // (page prefix and/or opcode byte); add the postbyte itself plus however many offset
            // bytes we're about to choose to get the post-instruction PC the delta is taken
            // against.
            let prefix_len = out.len() as u16;
            let use_16bit = match width {
                OffsetWidth::Bits16 => true,
                OffsetWidth::Bits8 | OffsetWidth::Bits5 => false,
                OffsetWidth::None => {
                    if !value.defined {
                        true
                    } else {
                        let post_pc = ctx.pc.wrapping_add(prefix_len).wrapping_add(2);
                        let delta = value.value.wrapping_sub(post_pc) as i16;
                        !(-128..=127).contains(&delta)
                    }
                }
            };
            if use_16bit {
                let post_pc = ctx.pc.wrapping_add(prefix_len).wrapping_add(3);
                let delta = value.value.wrapping_sub(post_pc) as i16;
                out.push(0x8D | indirect_bit(idx.indirect));
                out.extend_from_slice(&delta.to_be_bytes());
            } else {
                let post_pc = ctx.pc.wrapping_add(prefix_len).wrapping_add(2);
                let delta = value.value.wrapping_sub(post_pc) as i16;
                out.push(0x8C | indirect_bit(idx.indirect));
                out.push(delta as i8 as u8);
            }
        }
    }
    Ok(())
}

fn indirect_bit(indirect: bool) -> u8 {
    if indirect {
        0x10
    } else {
        0
    }
}

fn parse_register_list(
    desc: &OpcodeDescriptor,
    buf: &mut LineBuffer,
    ctx: &EvalContext,
) -> Result<u8, Diagnostic> {
    let mut mask = 0u8;
    loop {
        let mut name = String::new();
        loop {
            let c = skip_space(buf);
            if c.is_ascii_alphabetic() {
                name.push(c);
            } else {
                buf.unget();
                break;
            }
        }
        let reg = Register::parse(&name).ok_or_else(|| err(ctx, "E0033", format!("'{name}' is not a register")))?;
        let own_stack = match desc.base {
            0x34 | 0x35 => Register::S,
            0x36 | 0x37 => Register::U,
            _ => unreachable!(),
        };
        if std::mem::discriminant(&reg) == std::mem::discriminant(&own_stack) {
            return Err(err(ctx, "E0034", "cannot push/pull a stack pointer onto its own stack"));
        }
        mask |= reg.push_pull_bit();
        let c = skip_space(buf);
        if c != ',' {
            buf.unget();
            break;
        }
    }
    Ok(mask)
}

fn parse_register_pair(buf: &mut LineBuffer, ctx: &EvalContext) -> Result<(Register, Register), Diagnostic> {
    let a = parse_one_register(buf, ctx)?;
    let c = skip_space(buf);
    if c != ',' {
        return Err(err(ctx, "E0035", "expected ',' between register operands"));
    }
    let b = parse_one_register(buf, ctx)?;
    Ok((a, b))
}

fn parse_one_register(buf: &mut LineBuffer, ctx: &EvalContext) -> Result<Register, Diagnostic> {
    let mut name = String::new();
    loop {
        let c = skip_space(buf);
        if c.is_ascii_alphabetic() {
            name.push(c);
        } else {
            buf.unget();
            break;
        }
    }
    Register::parse(&name).ok_or_else(|| err(ctx, "E0033", format!("'{name}' is not a register")))
}

/// `{C V Z N I H F E}` flag-letter syntax, or a plain expression.
fn parse_cc_mask(buf: &mut LineBuffer, ctx: &EvalContext) -> Result<u8, Diagnostic> {
    let c = skip_space(buf);
    if c != '{' {
        buf.unget();
        let v = eval(buf, ctx)?;
        return Ok(v.value as u8);
    }
    let mut mask = 0u8;
    loop {
        let c = skip_space(buf);
        match c.to_ascii_uppercase() {
            'C' => mask |= 0x01,
            'V' => mask |= 0x02,
            'Z' => mask |= 0x04,
            'N' => mask |= 0x08,
            'I' => mask |= 0x10,
            'H' => mask |= 0x20,
            'F' => mask |= 0x40,
            'E' => mask |= 0x80,
            '}' => break,
            ' ' => continue,
            _ => {
                return Err(err(ctx, "E0036", format!("'{c}' is not a valid condition-code flag letter")))
            }
        }
    }
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::SourceLoc;
    use crate::opcode::lookup;
    use crate::symbol::SymbolTable;

    fn ctx(t: &SymbolTable, pc: u16) -> EvalContext<'_> {
        EvalContext {
            symtab: t,
            pass: 2,
            pc,
            dp: 0,
            current_global: "",
            loc: SourceLoc::none(),
        }
    }

    fn run(mnemonic: &str, operand: &str, pc: u16) -> Vec<u8> {
        let t = SymbolTable::new();
        let c = ctx(&t, pc);
        let desc = lookup(mnemonic).unwrap();
        let mut buf = LineBuffer::new();
        buf.load(operand, SourceLoc::none()).unwrap();
        encode(desc, &mut buf, &c).unwrap().bytes
    }

    #[test]
    fn lda_immediate() {
        assert_eq!(run("LDA", "#$42", 0), vec![0x86, 0x42]);
    }

    #[test]
    fn lda_extended() {
        assert_eq!(run("LDA", "$1234", 0), vec![0xB6, 0x12, 0x34]);
    }

    #[test]
    fn lda_direct_when_dp_matches() {
        let t = SymbolTable::new();
        let mut c = ctx(&t, 0);
        c.dp = 0x10;
        let desc = lookup("LDA").unwrap();
        let mut buf = LineBuffer::new();
        buf.load("$1042", SourceLoc::none()).unwrap();
        let bytes = encode(desc, &mut buf, &c).unwrap().bytes;
        assert_eq!(bytes, vec![0x96, 0x42]);
    }

    #[test]
    fn sta_has_no_immediate_mode() {
        let t = SymbolTable::new();
        let c = ctx(&t, 0);
        let desc = lookup("STA").unwrap();
        let mut buf = LineBuffer::new();
        buf.load("#5", SourceLoc::none()).unwrap();
        let e = encode(desc, &mut buf, &c).unwrap_err();
        assert_eq!(e.code, "E0029");
    }

    #[test]
    fn bra_offset_zero_warns() {
        let t = SymbolTable::new();
        let c = ctx(&t, 0x200);
        let desc = lookup("BRA").unwrap();
        let mut buf = LineBuffer::new();
        buf.load("$202", SourceLoc::none()).unwrap();
        let enc = encode(desc, &mut buf, &c).unwrap();
        assert_eq!(enc.bytes, vec![0x20, 0x00]);
        assert_eq!(enc.warnings.len(), 1);
    }

    #[test]
    fn bra_out_of_range_errors() {
        let t = SymbolTable::new();
        let c = ctx(&t, 0);
        let desc = lookup("BRA").unwrap();
        let mut buf = LineBuffer::new();
        buf.load("$200", SourceLoc::none()).unwrap();
        let e = encode(desc, &mut buf, &c).unwrap_err();
        assert_eq!(e.code, "E0031");
    }

    #[test]
    fn indexed_no_offset() {
        assert_eq!(run("LDA", ",X", 0), vec![0xA6, 0x84]);
    }

    #[test]
    fn indexed_post_increment_two() {
        assert_eq!(run("LDA", ",X++", 0), vec![0xA6, 0x81]);
    }

    #[test]
    fn pshs_rejects_own_stack_register() {
        let t = SymbolTable::new();
        let c = ctx(&t, 0);
        let desc = lookup("PSHS").unwrap();
        let mut buf = LineBuffer::new();
        buf.load("A,S", SourceLoc::none()).unwrap();
        let e = encode(desc, &mut buf, &c).unwrap_err();
        assert_eq!(e.code, "E0034");
    }

    #[test]
    fn exg_mismatched_sizes_warns() {
        let t = SymbolTable::new();
        let c = ctx(&t, 0);
        let desc = lookup("EXG").unwrap();
        let mut buf = LineBuffer::new();
        buf.load("A,X", SourceLoc::none()).unwrap();
        let enc = encode(desc, &mut buf, &c).unwrap();
        assert_eq!(enc.warnings.len(), 1);
    }

    #[test]
    fn andcc_stores_complement() {
        assert_eq!(run("ANDCC", "#$0F", 0), vec![0x1C, 0xF0]);
    }

    #[test]
    fn pcr_offset_is_relative_to_post_instruction_pc() {
        assert_eq!(run("LDA", "$110,PCR", 0x100), vec![0xA6, 0x8C, 0x0D]);
    }

    #[test]
    fn pcr_offset_honors_explicit_16bit_width() {
        assert_eq!(run("LDA", ">$110,PCR", 0x100), vec![0xA6, 0x8D, 0x00, 0x0C]);
    }

    #[test]
    fn tfr_into_pc_transfers_control() {
        let t = SymbolTable::new();
        let c = ctx(&t, 0);
        let desc = lookup("TFR").unwrap();
        let mut buf = LineBuffer::new();
        buf.load("X,PC", SourceLoc::none()).unwrap();
        assert!(encode(desc, &mut buf, &c).unwrap().transfers_control);
    }

    #[test]
    fn puls_without_pc_does_not_transfer_control() {
        let t = SymbolTable::new();
        let c = ctx(&t, 0);
        let desc = lookup("PULS").unwrap();
        let mut buf = LineBuffer::new();
        buf.load("A,B", SourceLoc::none()).unwrap();
        assert!(!encode(desc, &mut buf, &c).unwrap().transfers_control);
    }

    #[test]
    fn puls_pc_transfers_control() {
        let t = SymbolTable::new();
        let c = ctx(&t, 0);
        let desc = lookup("PULS").unwrap();
        let mut buf = LineBuffer::new();
        buf.load("PC", SourceLoc::none()).unwrap();
        assert!(encode(desc, &mut buf, &c).unwrap().transfers_control);
    }
}
