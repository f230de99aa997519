//! Output operations: print, printf
//!
//! `print` writes its arguments back to back followed by a newline.
//! `printf` supports a C-style subset of directives: `%d %s %x %X %o
//! %b %c %f %%` with optional zero-flag and width, and a precision for
//! `%f`. Mismatches between directives and arguments are evaluation
//! errors.

use crate::builtins::{expect_min_arity, expect_string, BuiltinTable};
use crate::error::EvalError;
use crate::eval::Evaluator;
use crate::value::{Operator, Value};

pub fn builtin_print(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    let evaluated = ev.eval_args(args)?;
    let line: String = evaluated.iter().map(|v| v.to_display_string()).collect();
    println!("{}", line);
    Ok(Value::Unit)
}

pub fn builtin_printf(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_min_arity("printf", args, 1)?;
    let format = expect_string("printf", &ev.eval(&args[0])?)?;
    let values = ev.eval_args(&args[1..])?;
    let text =
        format_directives(&format, &values).map_err(|msg| EvalError::runtime("printf", msg))?;
    print!("{}", text);
    Ok(Value::Unit)
}

fn int_arg(value: &Value) -> Result<i64, String> {
    match value {
        Value::Int(n) => Ok(*n),
        other => Err(format!("expected an int argument, got {}", other.type_name())),
    }
}

fn pad(text: String, width: usize, zero: bool) -> String {
    if text.len() >= width {
        return text;
    }
    let fill = if zero { '0' } else { ' ' };
    let padding: String = std::iter::repeat(fill).take(width - text.len()).collect();
    if zero && (text.starts_with('-') || text.starts_with('+')) {
        let (sign, rest) = text.split_at(1);
        format!("{}{}{}", sign, padding, rest)
    } else {
        format!("{}{}", padding, text)
    }
}

/// Expands `%`-directives in `format` against `values`. Leftover or
/// missing arguments are errors.
pub(crate) fn format_directives(format: &str, values: &[Value]) -> Result<String, String> {
    let mut out = String::new();
    let mut chars = format.chars().peekable();
    let mut next_arg = 0usize;

    let mut take = |next_arg: &mut usize| -> Result<Value, String> {
        let value = values
            .get(*next_arg)
            .cloned()
            .ok_or_else(|| "not enough arguments for format string".to_string())?;
        *next_arg += 1;
        Ok(value)
    };

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }

        let mut zero = false;
        if chars.peek() == Some(&'0') {
            zero = true;
            chars.next();
        }
        let mut width = 0usize;
        while let Some(d) = chars.peek().copied().filter(|c| c.is_ascii_digit()) {
            width = width * 10 + d.to_digit(10).unwrap_or(0) as usize;
            chars.next();
        }
        let mut precision = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut p = 0usize;
            while let Some(d) = chars.peek().copied().filter(|c| c.is_ascii_digit()) {
                p = p * 10 + d.to_digit(10).unwrap_or(0) as usize;
                chars.next();
            }
            precision = Some(p);
        }

        let directive = chars
            .next()
            .ok_or_else(|| "format string ends in a bare %".to_string())?;
        let rendered = match directive {
            'd' | 'i' => int_arg(&take(&mut next_arg)?)?.to_string(),
            'x' => format!("{:x}", int_arg(&take(&mut next_arg)?)?),
            'X' => format!("{:X}", int_arg(&take(&mut next_arg)?)?),
            'o' => format!("{:o}", int_arg(&take(&mut next_arg)?)?),
            'b' => format!("{:b}", int_arg(&take(&mut next_arg)?)?),
            's' => take(&mut next_arg)?.to_display_string(),
            'c' => {
                let n = int_arg(&take(&mut next_arg)?)?;
                let c = u32::try_from(n)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| format!("{} is not a character", n))?;
                c.to_string()
            }
            'f' => {
                let value = take(&mut next_arg)?;
                let f = match value {
                    Value::Float(f) => f,
                    Value::Int(n) => n as f64,
                    other => {
                        return Err(format!(
                            "expected a number argument, got {}",
                            other.type_name()
                        ))
                    }
                };
                format!("{:.*}", precision.unwrap_or(6), f)
            }
            other => return Err(format!("unknown format directive %{}", other)),
        };
        out.push_str(&pad(rendered, width, zero));
    }

    if next_arg < values.len() {
        return Err("not all arguments converted by format string".to_string());
    }
    Ok(out)
}

pub fn register(table: &mut BuiltinTable) {
    table.insert(Operator::Print, builtin_print as crate::eval::BuiltinFn);
    table.insert(Operator::Printf, builtin_printf);
}
