//! Type predicates and conversions: atom?, symbol?, string?, int?,
//! list?, defined?, convert/bin, string->int, string->symbol,
//! symbol->string, int->string, bits->sint
//!
//! Predicates are n-ary and hold when every argument satisfies them.

use crate::builtins::{expect_arity, expect_arity_range, expect_int, expect_string, expect_symbol, BuiltinTable};
use crate::error::EvalError;
use crate::eval::Evaluator;
use crate::value::{Operator, Symbol, Value};

fn predicate(
    ev: &mut Evaluator,
    args: &[Value],
    test: fn(&Value) -> bool,
) -> Result<Value, EvalError> {
    let evaluated = ev.eval_args(args)?;
    Ok(Value::Bool(evaluated.iter().all(test)))
}

pub fn builtin_is_atom(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    predicate(ev, args, |v| {
        matches!(
            v,
            Value::Int(_)
                | Value::Float(_)
                | Value::Str(_)
                | Value::Bool(_)
                | Value::Symbol(_)
                | Value::Operator(_)
        )
    })
}

pub fn builtin_is_symbol(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    predicate(ev, args, |v| matches!(v, Value::Symbol(_)))
}

pub fn builtin_is_string(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    predicate(ev, args, |v| matches!(v, Value::Str(_)))
}

pub fn builtin_is_int(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    predicate(ev, args, |v| matches!(v, Value::Int(_)))
}

pub fn builtin_is_list(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    predicate(ev, args, |v| matches!(v, Value::List(_)))
}

/// `(defined? name)`: whether the unevaluated symbol is bound somewhere
/// in the environment chain.
pub fn builtin_is_defined(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("defined?", args, 1)?;
    let sym = expect_symbol("defined?", &args[0])?;
    Ok(Value::Bool(ev.env.is_defined(&sym.name).is_some()))
}

/// Renders an integer in binary, zero-padded to `width`. The sign
/// counts toward the width, matching `(string->int s 2)` round trips.
fn to_binary(value: i64, width: usize) -> String {
    let digits = format!("{:b}", value.unsigned_abs());
    let sign = if value < 0 { "-" } else { "" };
    let body_width = width.saturating_sub(sign.len());
    if digits.len() < body_width {
        format!("{}{}{}", sign, "0".repeat(body_width - digits.len()), digits)
    } else {
        format!("{}{}", sign, digits)
    }
}

pub fn builtin_convert_binary(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity_range("convert/bin", args, 1, 2)?;
    let evaluated = ev.eval_args(args)?;
    let value = expect_int("convert/bin", &evaluated[0])?;
    let width = if evaluated.len() == 2 {
        expect_int("convert/bin", &evaluated[1])?.max(0) as usize
    } else {
        0
    };
    Ok(Value::Str(to_binary(value, width)))
}

/// `(string->int s base?)`, base 10 by default.
pub fn builtin_string_to_int(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity_range("string->int", args, 1, 2)?;
    let evaluated = ev.eval_args(args)?;
    let text = expect_string("string->int", &evaluated[0])?;
    let base = if evaluated.len() == 2 {
        let base = expect_int("string->int", &evaluated[1])?;
        if !(2..=36).contains(&base) {
            return Err(EvalError::runtime("string->int", "base must be in 2..36"));
        }
        base as u32
    } else {
        10
    };
    i64::from_str_radix(text.trim(), base)
        .map(Value::Int)
        .map_err(|_| {
            EvalError::runtime(
                "string->int",
                format!("\"{}\" is not an integer in base {}", text, base),
            )
        })
}

pub fn builtin_string_to_symbol(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("string->symbol", args, 1)?;
    let text = expect_string("string->symbol", &ev.eval(&args[0])?)?;
    Ok(Value::Symbol(Symbol::new(text)))
}

pub fn builtin_symbol_to_string(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("symbol->string", args, 1)?;
    let sym = expect_symbol("symbol->string", &ev.eval(&args[0])?)?;
    Ok(Value::Str(sym.name))
}

pub fn builtin_int_to_string(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("int->string", args, 1)?;
    let n = expect_int("int->string", &ev.eval(&args[0])?)?;
    Ok(Value::Str(n.to_string()))
}

/// Interprets a bit string as a two's complement signed integer:
/// `(bits->sint "1111")` is -1.
pub fn builtin_bits_to_sint(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("bits->sint", args, 1)?;
    let bits = expect_string("bits->sint", &ev.eval(&args[0])?)?;
    if bits.is_empty() || !bits.bytes().all(|b| b == b'0' || b == b'1') {
        return Err(EvalError::runtime(
            "bits->sint",
            format!("\"{}\" is not a bit string", bits),
        ));
    }
    if bits.len() > 64 {
        return Err(EvalError::runtime(
            "bits->sint",
            "bit strings wider than 64 are not supported",
        ));
    }
    let unsigned = u64::from_str_radix(&bits, 2)
        .map_err(|_| EvalError::runtime("bits->sint", "bad bit string"))?;
    // shift the sign bit up to bit 63, then sign-extend back down
    let shift = 64 - bits.len() as u32;
    let signed = ((unsigned << shift) as i64) >> shift;
    Ok(Value::Int(signed))
}

pub fn register(table: &mut BuiltinTable) {
    table.insert(Operator::IsAtom, builtin_is_atom as crate::eval::BuiltinFn);
    table.insert(Operator::IsSymbol, builtin_is_symbol);
    table.insert(Operator::IsString, builtin_is_string);
    table.insert(Operator::IsInt, builtin_is_int);
    table.insert(Operator::IsList, builtin_is_list);
    table.insert(Operator::IsDefined, builtin_is_defined);
    table.insert(Operator::ConvertBinary, builtin_convert_binary);
    table.insert(Operator::StringToInt, builtin_string_to_int);
    table.insert(Operator::StringToSymbol, builtin_string_to_symbol);
    table.insert(Operator::SymbolToString, builtin_symbol_to_string);
    table.insert(Operator::IntToString, builtin_int_to_string);
    table.insert(Operator::BitsToSint, builtin_bits_to_sint);
}
