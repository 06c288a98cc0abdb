//! Float expression evaluator: a reduced shunting-yard grammar over `f64`, recovered from the
//! original `fexpr.c` (supplemental — the distilled spec only names *which* encoding each
//! back-end selects, not how a float literal is parsed).

use crate::buffer::{skip_space, LineBuffer};
use crate::diag::{Diagnostic, Severity, SourceLoc};
use crate::expr::{eval, EvalContext};

/// A parsed float value; `is_double` tracks whether the literal used double-only syntax
/// (an explicit exponent or enough precision) so callers choosing a 5-byte DECB encoding can
/// warn when a double is narrowed to single precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FValue {
    /// The parsed value.
    pub value: f64,
    /// Whether the source literal was unambiguously a double.
    pub is_double: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl FOp {
    fn priority(self) -> u16 {
        match self {
            FOp::Pow => 1000,
            FOp::Mul | FOp::Div => 900,
            FOp::Add | FOp::Sub => 800,
        }
    }

    fn right_assoc(self) -> bool {
        matches!(self, FOp::Pow)
    }

    fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            FOp::Add => lhs + rhs,
            FOp::Sub => lhs - rhs,
            FOp::Mul => lhs * rhs,
            FOp::Div => lhs / rhs,
            FOp::Pow => lhs.powf(rhs),
        }
    }
}

/// Evaluate a float expression starting at the buffer's read cursor.
pub fn feval(buf: &mut LineBuffer, ctx: &EvalContext) -> Result<FValue, Diagnostic> {
    let mut values = Vec::new();
    let mut ops = Vec::new();

    values.push(ffactor(buf, ctx)?);

    loop {
        let save = buf.ridx;
        let c = skip_space(buf);
        let op = match c {
            '+' => Some(FOp::Add),
            '-' => Some(FOp::Sub),
            '*' => {
                if buf.peek() == '*' {
                    buf.next();
                    Some(FOp::Pow)
                } else {
                    Some(FOp::Mul)
                }
            }
            '/' => Some(FOp::Div),
            _ => None,
        };
        let op = match op {
            Some(op) => op,
            None => {
                buf.ridx = save;
                break;
            }
        };
        while let Some(&top) = ops.last() {
            let reduce = if op.right_assoc() {
                top_priority(top) > op.priority()
            } else {
                top_priority(top) >= op.priority()
            };
            if !reduce {
                break;
            }
            reduce_top(&mut values, &mut ops);
        }
        ops.push(op);
        let rhs = ffactor(buf, ctx)?;
        values.push(rhs);
    }

    while !ops.is_empty() {
        reduce_top(&mut values, &mut ops);
    }

    values.pop().ok_or_else(|| {
        Diagnostic::new(Severity::Error, "E0001", ctx.loc.clone(), "internal error: float stack empty")
    })
}

fn top_priority(op: FOp) -> u16 {
    op.priority()
}

fn reduce_top(values: &mut Vec<FValue>, ops: &mut Vec<FOp>) {
    let op = ops.pop().unwrap();
    let rhs = values.pop().unwrap();
    let lhs = values.pop().unwrap();
    values.push(FValue {
        value: op.apply(lhs.value, rhs.value),
        is_double: lhs.is_double || rhs.is_double,
    });
}

fn ffactor(buf: &mut LineBuffer, ctx: &EvalContext) -> Result<FValue, Diagnostic> {
    let c = skip_space(buf);
    let mut v = match c {
        '-' => {
            let inner = ffactor(buf, ctx)?;
            FValue { value: -inner.value, ..inner }
        }
        '+' => ffactor(buf, ctx)?,
        '(' => {
            let inner = feval(buf, ctx)?;
            let c = skip_space(buf);
            if c != ')' {
                return Err(Diagnostic::new(
                    Severity::Error,
                    "E0024",
                    ctx.loc.clone(),
                    "missing close parenthesis",
                ));
            }
            inner
        }
        c if c.is_ascii_digit() || c == '.' => {
            buf.unget();
            fliteral(buf, ctx)?
        }
        _ => {
            buf.unget();
            // Fall back to an integer sub-expression promoted to float (e.g. a symbol or `*`).
            let iv = eval(buf, ctx)?;
            FValue { value: iv.value as f64, is_double: false }
        }
    };
    // Postfix factorial, recovered from `fexpr.c`; binds tighter than any binary operator.
    loop {
        let save = buf.ridx;
        let c = skip_space(buf);
        if c == '!' {
            v = FValue { value: factorial(v.value), is_double: v.is_double };
        } else {
            buf.ridx = save;
            break;
        }
    }
    Ok(v)
}

fn factorial(n: f64) -> f64 {
    let mut acc = 1f64;
    let mut i = 2u32;
    let n = n.max(0.0).round() as u32;
    while i <= n {
        acc *= i as f64;
        i += 1;
    }
    acc
}

fn fliteral(buf: &mut LineBuffer, ctx: &EvalContext) -> Result<FValue, Diagnostic> {
    let mut s = String::new();
    let mut saw_dot = false;
    let mut saw_exp = false;
    loop {
        let c = buf.next();
        match c {
            '0'..='9' | '_' => {
                if c != '_' {
                    s.push(c);
                }
            }
            '.' if !saw_dot && !saw_exp => {
                saw_dot = true;
                s.push(c);
            }
            'e' | 'E' if !saw_exp => {
                saw_exp = true;
                s.push('e');
                if buf.peek() == '+' || buf.peek() == '-' {
                    s.push(buf.next());
                }
            }
            _ => {
                buf.unget();
                break;
            }
        }
    }
    if s.is_empty() {
        return Err(Diagnostic::new(
            Severity::Error,
            "E0027",
            ctx.loc.clone(),
            "malformed floating point literal",
        ));
    }
    let value: f64 = s
        .parse()
        .map_err(|_| Diagnostic::new(Severity::Error, "E0027", ctx.loc.clone(), "malformed floating point literal"))?;
    Ok(FValue {
        value,
        is_double: saw_dot || saw_exp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolTable;

    fn run(src: &str) -> FValue {
        let t = SymbolTable::new();
        let ctx = EvalContext {
            symtab: &t,
            pass: 2,
            pc: 0,
            dp: 0,
            current_global: "",
            loc: SourceLoc::none(),
        };
        let mut buf = LineBuffer::new();
        buf.load(src, SourceLoc::none()).unwrap();
        feval(&mut buf, &ctx).unwrap()
    }

    #[test]
    fn basic_arithmetic() {
        assert_eq!(run("1.5+2.5").value, 4.0);
        assert_eq!(run("2.0**3.0").value, 8.0);
    }

    #[test]
    fn factorial_postfix() {
        assert_eq!(run("5!").value, 120.0);
    }

    #[test]
    fn negative_literal() {
        assert_eq!(run("-1.0").value, -1.0);
    }
}
