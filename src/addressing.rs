//! Operand parser: decides among the six 6809 addressing modes and builds the fields an encoder
//! needs (value, postbyte, offset width), per the architecture's indexed-postbyte layout
//! (bit 7 set, bits 6-5 register, bits 4-0 mode).

use crate::buffer::{skip_space, LineBuffer};
use crate::diag::{Diagnostic, Severity, SourceLoc};
use crate::expr::{eval, EvalContext, Value};
use crate::opcode::Register;

/// Width an indexed/offset field was encoded at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetWidth {
    /// No offset byte at all (`,R` or a register-only postbyte).
    None,
    /// 5-bit offset folded into the postbyte itself.
    Bits5,
    /// One extra offset byte.
    Bits8,
    /// Two extra offset bytes.
    Bits16,
}

/// The indexed sub-modes, named after the architecture reference's postbyte mode field.
#[derive(Debug, Clone, Copy)]
pub enum IndexMode {
    /// `,R` with a constant offset (possibly zero).
    Offset { value: Value, width: OffsetWidth },
    /// `A,R` / `B,R` / `D,R`.
    AccumOffset(Register),
    /// `,R+` (post-increment by one; never legal indirect).
    PostInc1,
    /// `,R++` (post-increment by two).
    PostInc2,
    /// `,-R` (pre-decrement by one; never legal indirect).
    PreDec1,
    /// `,--R` (pre-decrement by two).
    PreDec2,
    /// `expr,PCR`.
    PcRelative { value: Value, width: OffsetWidth },
}

/// An indexed operand: register plus sub-mode plus the indirect flag.
#[derive(Debug, Clone, Copy)]
pub struct Indexed {
    pub register: Register,
    pub mode: IndexMode,
    pub indirect: bool,
}

/// A fully parsed operand, addressing-mode tagged.
#[derive(Debug, Clone, Copy)]
pub enum Operand {
    Inherent,
    Immediate(Value),
    Direct(Value),
    Extended(Value),
    /// `[addr]`, extended indirect: postbyte `0x9F` with a 16-bit field and no index register.
    ExtendedIndirect(Value),
    Indexed(Indexed),
    Branch(Value),
}

fn err(ctx: &EvalContext, code: &'static str, msg: impl Into<String>) -> Diagnostic {
    Diagnostic::new(Severity::Error, code, ctx.loc.clone(), msg)
}

/// Parse the operand field of an instruction that supports the full I/D/X/E mode set.
pub fn parse_general(buf: &mut LineBuffer, ctx: &EvalContext) -> Result<Operand, Diagnostic> {
    let save = buf.ridx;
    let c = skip_space(buf);

    if c == '#' {
        let v = eval(buf, ctx)?;
        return Ok(Operand::Immediate(v));
    }

    if c == '[' {
        return parse_indexed_or_extended_indirect(buf, ctx, true);
    }

    if c == ',' {
        buf.unget();
        return Ok(Operand::Indexed(parse_index_tail(buf, ctx, false)?));
    }

    // Accumulator-offset indexing: a single letter A/B/D followed by `,`.
    if matches!(c, 'A' | 'B' | 'D' | 'a' | 'b' | 'd') && buf.peek() == ',' {
        let reg = Register::parse(&c.to_string()).unwrap();
        buf.next(); // consume ','
        let register = parse_index_register(buf, ctx)?;
        return Ok(Operand::Indexed(Indexed {
            register,
            mode: IndexMode::AccumOffset(reg),
            indirect: false,
        }));
    }

    buf.ridx = save;
    parse_indexed_or_extended_indirect(buf, ctx, false)
}

fn parse_indexed_or_extended_indirect(
    buf: &mut LineBuffer,
    ctx: &EvalContext,
    bracketed: bool,
) -> Result<Operand, Diagnostic> {
    if bracketed {
        let c = skip_space(buf);
        if c == ',' {
            buf.unget();
            let idx = parse_index_tail(buf, ctx, true)?;
            let c = skip_space(buf);
            if c != ']' {
                return Err(err(ctx, "E0024", "missing close bracket"));
            }
            return Ok(Operand::Indexed(idx));
        }
        buf.unget();
    }

    let v = eval(buf, ctx)?;
    let c = skip_space(buf);
    match (bracketed, c) {
        (true, ']') => Ok(Operand::ExtendedIndirect(v)),
        (false, ',') => {
            let register = parse_index_register(buf, ctx)?;
            Ok(Operand::Indexed(Indexed {
                register,
                mode: indexed_mode_for(register, v),
                indirect: false,
            }))
        }
        (true, ',') => {
            let register = parse_index_register(buf, ctx)?;
            let c2 = skip_space(buf);
            if c2 != ']' {
                return Err(err(ctx, "E0024", "missing close bracket"));
            }
            Ok(Operand::Indexed(Indexed {
                register,
                mode: indexed_mode_for(register, v),
                indirect: true,
            }))
        }
        (false, _) => {
            buf.unget();
            Ok(direct_or_extended(v, ctx))
        }
        (true, _) => Err(err(ctx, "E0024", "missing close bracket")),
    }
}

fn direct_or_extended(v: Value, ctx: &EvalContext) -> Operand {
    let tie = match v.width {
        crate::expr::Width::Bits16 => false,
        crate::expr::Width::Bits8 | crate::expr::Width::Bits5 => true,
        crate::expr::Width::Unspecified => {
            v.defined && (v.value >> 8) as u8 == ctx.dp
        }
    };
    if tie {
        Operand::Direct(v)
    } else {
        Operand::Extended(v)
    }
}

/// `expr,R` builds a plain constant-offset index unless `R` is `PC`, in which case the offset
/// is relative to the post-instruction PC rather than a raw constant — see `encode_indexed`.
fn indexed_mode_for(register: Register, v: Value) -> IndexMode {
    if register == Register::Pc {
        IndexMode::PcRelative { value: v, width: width_for_pcr(&v) }
    } else {
        IndexMode::Offset { value: v, width: width_for(&v) }
    }
}

/// Like `width_for`, but for `,PCR`: only an explicit size prefix can be honored at parse time,
/// since the real range check is on the delta from PC, not on `v`'s raw value. `width: None`
/// tells the encoder to decide once the instruction's length up to the postbyte is known.
fn width_for_pcr(v: &Value) -> OffsetWidth {
    match v.width {
        crate::expr::Width::Bits16 => OffsetWidth::Bits16,
        crate::expr::Width::Bits8 | crate::expr::Width::Bits5 => OffsetWidth::Bits8,
        crate::expr::Width::Unspecified => OffsetWidth::None,
    }
}

fn width_for(v: &Value) -> OffsetWidth {
    match v.width {
        crate::expr::Width::Bits5 => OffsetWidth::Bits5,
        crate::expr::Width::Bits8 => OffsetWidth::Bits8,
        crate::expr::Width::Bits16 => OffsetWidth::Bits16,
        crate::expr::Width::Unspecified => {
            if !v.defined {
                OffsetWidth::Bits16
            } else if v.value == 0 {
                OffsetWidth::None
            } else if (v.value as i16) >= -16 && (v.value as i16) <= 15 {
                OffsetWidth::Bits5
            } else if (v.value as i16) >= -128 && (v.value as i16) <= 127 {
                OffsetWidth::Bits8
            } else {
                OffsetWidth::Bits16
            }
        }
    }
}

fn parse_index_register(buf: &mut LineBuffer, ctx: &EvalContext) -> Result<Register, Diagnostic> {
    let mut s = String::new();
    loop {
        let c = buf.peek();
        if c.is_ascii_alphabetic() {
            s.push(buf.next());
        } else {
            break;
        }
    }
    if s.eq_ignore_ascii_case("PCR") {
        return Ok(Register::Pc);
    }
    match Register::parse(&s) {
        Some(r @ (Register::X | Register::Y | Register::U | Register::S | Register::Pc)) => Ok(r),
        _ => Err(err(ctx, "E0025", format!("'{s}' is not a valid index register"))),
    }
}

/// Parse the tail after a leading comma: `,R`, `,R+`, `,R++`, `,-R`, `,--R`, or `expr,PCR`.
fn parse_index_tail(buf: &mut LineBuffer, ctx: &EvalContext, indirect: bool) -> Result<Indexed, Diagnostic> {
    let c = buf.next();
    debug_assert_eq!(c, ',');

    let c = buf.peek();
    if c == '-' {
        buf.next();
        let two = buf.peek() == '-';
        if two {
            buf.next();
        }
        let register = parse_index_register(buf, ctx)?;
        return Ok(Indexed {
            register,
            mode: if two { IndexMode::PreDec2 } else { IndexMode::PreDec1 },
            indirect,
        });
    }

    // Could be `,PCR` with no preceding expression (rare) or a bare register with post-inc.
    let register = parse_index_register(buf, ctx)?;
    let c = buf.peek();
    if c == '+' {
        buf.next();
        let two = buf.peek() == '+';
        if two {
            buf.next();
        }
        if indirect && !two {
            return Err(err(ctx, "E0021", "indirect auto-increment-by-one is not a legal mode"));
        }
        return Ok(Indexed {
            register,
            mode: if two { IndexMode::PostInc2 } else { IndexMode::PostInc1 },
            indirect,
        });
    }

    if register == Register::Pc {
        return Ok(Indexed {
            register,
            mode: IndexMode::PcRelative {
                value: Value::zero(),
                width: OffsetWidth::Bits16,
            },
            indirect,
        });
    }

    Ok(Indexed {
        register,
        mode: IndexMode::Offset { value: Value::zero(), width: OffsetWidth::None },
        indirect,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::SourceLoc;
    use crate::symbol::SymbolTable;

    fn ctx(t: &SymbolTable) -> EvalContext {
        EvalContext {
            symtab: t,
            pass: 2,
            pc: 0,
            dp: 0,
            current_global: "",
            loc: SourceLoc::none(),
        }
    }

    fn run(src: &str) -> Operand {
        let t = SymbolTable::new();
        let c = ctx(&t);
        let mut buf = LineBuffer::new();
        buf.load(src, SourceLoc::none()).unwrap();
        parse_general(&mut buf, &c).unwrap()
    }

    #[test]
    fn immediate_mode() {
        assert!(matches!(run("#5"), Operand::Immediate(v) if v.value == 5));
    }

    #[test]
    fn no_offset_indexed() {
        match run(",X") {
            Operand::Indexed(i) => {
                assert_eq!(i.register, Register::X);
                assert!(matches!(i.mode, IndexMode::Offset { width: OffsetWidth::None, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn post_increment_by_two() {
        match run(",X++") {
            Operand::Indexed(i) => assert!(matches!(i.mode, IndexMode::PostInc2)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn indirect_post_increment_by_one_is_illegal() {
        let t = SymbolTable::new();
        let c = ctx(&t);
        let mut buf = LineBuffer::new();
        buf.load("[,X+]", SourceLoc::none()).unwrap();
        let err = parse_general(&mut buf, &c).unwrap_err();
        assert_eq!(err.code, "E0021");
    }

    #[test]
    fn indirect_post_increment_by_two_is_legal() {
        let t = SymbolTable::new();
        let c = ctx(&t);
        let mut buf = LineBuffer::new();
        buf.load("[,X++]", SourceLoc::none()).unwrap();
        let op = parse_general(&mut buf, &c).unwrap();
        assert!(matches!(op, Operand::Indexed(Indexed { mode: IndexMode::PostInc2, indirect: true, .. })));
    }

    #[test]
    fn accumulator_offset_indexing() {
        match run("B,Y") {
            Operand::Indexed(i) => {
                assert_eq!(i.register, Register::Y);
                assert!(matches!(i.mode, IndexMode::AccumOffset(Register::B)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn extended_indirect() {
        assert!(matches!(run("[$1234]"), Operand::ExtendedIndirect(v) if v.value == 0x1234));
    }

    #[test]
    fn expr_pcr_is_pc_relative_not_plain_offset() {
        match run("LOOP,PCR") {
            Operand::Indexed(i) => {
                assert_eq!(i.register, Register::Pc);
                assert!(matches!(i.mode, IndexMode::PcRelative { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bare_pcr_is_pc_relative() {
        match run(",PCR") {
            Operand::Indexed(i) => {
                assert_eq!(i.register, Register::Pc);
                assert!(matches!(i.mode, IndexMode::PcRelative { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn explicit_width_prefix_on_pcr_is_honored() {
        match run("<LOOP,PCR") {
            Operand::Indexed(i) => {
                assert!(matches!(i.mode, IndexMode::PcRelative { width: OffsetWidth::Bits8, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
