//! Arithmetic operations: +, -, *, /, **, floor, ceil, round, mod
//!
//! `+` is overloaded: all-numeric arguments sum, any string argument
//! concatenates, any list argument concatenates lists (lists win over
//! strings). Integer arithmetic is checked; overflow is an evaluation
//! error, division is exact-or-float and never silently produces NaN.

use crate::builtins::{expect_arity, expect_min_arity, BuiltinTable};
use crate::error::{ErrorKind, EvalError};
use crate::eval::Evaluator;
use crate::value::{Operator, Value};

#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn to_value(self) -> Value {
        match self {
            Num::Int(n) => Value::Int(n),
            Num::Float(f) => Value::Float(f),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(f) => f,
        }
    }
}

fn number(function: &str, value: &Value) -> Result<Num, EvalError> {
    match value {
        Value::Int(n) => Ok(Num::Int(*n)),
        Value::Float(f) => Ok(Num::Float(*f)),
        other => Err(EvalError::kind_error(function, "number", other)),
    }
}

fn checked(function: &str, result: Option<i64>) -> Result<Num, EvalError> {
    result
        .map(Num::Int)
        .ok_or_else(|| EvalError::new(ErrorKind::Overflow(function.to_string())))
}

fn add(function: &str, a: Num, b: Num) -> Result<Num, EvalError> {
    match (a, b) {
        (Num::Int(a), Num::Int(b)) => checked(function, a.checked_add(b)),
        _ => Ok(Num::Float(a.as_f64() + b.as_f64())),
    }
}

fn sub(function: &str, a: Num, b: Num) -> Result<Num, EvalError> {
    match (a, b) {
        (Num::Int(a), Num::Int(b)) => checked(function, a.checked_sub(b)),
        _ => Ok(Num::Float(a.as_f64() - b.as_f64())),
    }
}

fn mul(function: &str, a: Num, b: Num) -> Result<Num, EvalError> {
    match (a, b) {
        (Num::Int(a), Num::Int(b)) => checked(function, a.checked_mul(b)),
        _ => Ok(Num::Float(a.as_f64() * b.as_f64())),
    }
}

/// Sum, string concatenation or list concatenation depending on the
/// argument kinds. `(+)` is 0.
pub fn builtin_add(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    let evaluated = ev.eval_args(args)?;

    if evaluated.iter().any(|v| matches!(v, Value::List(_))) {
        let mut items = Vec::new();
        for value in evaluated {
            match value {
                Value::List(list) => items.extend(list.items),
                other => items.push(other),
            }
        }
        return Ok(Value::list(items));
    }

    if evaluated.iter().any(|v| matches!(v, Value::Str(_))) {
        let joined: String = evaluated.iter().map(|v| v.to_display_string()).collect();
        return Ok(Value::Str(joined));
    }

    let mut sum = Num::Int(0);
    for value in &evaluated {
        sum = add("+", sum, number("+", value)?)?;
    }
    Ok(sum.to_value())
}

/// Subtraction; a single argument negates.
pub fn builtin_sub(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_min_arity("-", args, 1)?;
    let evaluated = ev.eval_args(args)?;
    let first = number("-", &evaluated[0])?;

    if evaluated.len() == 1 {
        return sub("-", Num::Int(0), first).map(Num::to_value);
    }
    let mut result = first;
    for value in &evaluated[1..] {
        result = sub("-", result, number("-", value)?)?;
    }
    Ok(result.to_value())
}

pub fn builtin_mul(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_min_arity("*", args, 1)?;
    let evaluated = ev.eval_args(args)?;
    let mut result = Num::Int(1);
    for value in &evaluated {
        result = mul("*", result, number("*", value)?)?;
    }
    Ok(result.to_value())
}

/// Division: exact integer division stays an integer, anything else is
/// a float. A zero divisor is always an error.
pub fn builtin_div(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("/", args, 2)?;
    let evaluated = ev.eval_args(args)?;
    let dividend = number("/", &evaluated[0])?;
    let divisor = number("/", &evaluated[1])?;

    if divisor.as_f64() == 0.0 {
        return Err(EvalError::new(ErrorKind::DivideByZero));
    }
    match (dividend, divisor) {
        (Num::Int(a), Num::Int(b)) if a % b == 0 => Ok(Value::Int(a / b)),
        _ => Ok(Value::Float(dividend.as_f64() / divisor.as_f64())),
    }
}

pub fn builtin_exp(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("**", args, 2)?;
    let evaluated = ev.eval_args(args)?;
    let base = number("**", &evaluated[0])?;
    let exponent = number("**", &evaluated[1])?;

    match (base, exponent) {
        (Num::Int(b), Num::Int(e)) if e >= 0 => {
            let e = u32::try_from(e)
                .map_err(|_| EvalError::new(ErrorKind::Overflow("**".to_string())))?;
            checked("**", b.checked_pow(e)).map(Num::to_value)
        }
        _ => Ok(Value::Float(base.as_f64().powf(exponent.as_f64()))),
    }
}

pub fn builtin_floor(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("floor", args, 1)?;
    match number("floor", &ev.eval(&args[0])?)? {
        Num::Int(n) => Ok(Value::Int(n)),
        Num::Float(f) => Ok(Value::Int(f.floor() as i64)),
    }
}

pub fn builtin_ceil(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("ceil", args, 1)?;
    match number("ceil", &ev.eval(&args[0])?)? {
        Num::Int(n) => Ok(Value::Int(n)),
        Num::Float(f) => Ok(Value::Int(f.ceil() as i64)),
    }
}

pub fn builtin_round(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("round", args, 1)?;
    match number("round", &ev.eval(&args[0])?)? {
        Num::Int(n) => Ok(Value::Int(n)),
        Num::Float(f) => Ok(Value::Int(f.round() as i64)),
    }
}

/// Remainder with the sign of the divisor, so counters that wrap with
/// `mod` behave the same for negative offsets.
pub fn builtin_mod(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("mod", args, 2)?;
    let evaluated = ev.eval_args(args)?;
    let a = number("mod", &evaluated[0])?;
    let b = number("mod", &evaluated[1])?;
    if b.as_f64() == 0.0 {
        return Err(EvalError::new(ErrorKind::DivideByZero));
    }
    match (a, b) {
        (Num::Int(a), Num::Int(b)) => Ok(Value::Int(((a % b) + b) % b)),
        _ => {
            let (a, b) = (a.as_f64(), b.as_f64());
            Ok(Value::Float(((a % b) + b) % b))
        }
    }
}

pub fn register(table: &mut BuiltinTable) {
    table.insert(Operator::Add, builtin_add as crate::eval::BuiltinFn);
    table.insert(Operator::Sub, builtin_sub);
    table.insert(Operator::Mul, builtin_mul);
    table.insert(Operator::Div, builtin_div);
    table.insert(Operator::Exp, builtin_exp);
    table.insert(Operator::Floor, builtin_floor);
    table.insert(Operator::Ceil, builtin_ceil);
    table.insert(Operator::Round, builtin_round);
    table.insert(Operator::Mod, builtin_mod);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_sexpr;

    fn eval(code: &str) -> Result<Value, EvalError> {
        let mut ev = Evaluator::new();
        ev.eval_toplevel(&read_sexpr(code, "test").unwrap())
    }

    #[test]
    fn test_add_overloading() {
        assert_eq!(eval("(+ 1 2 3)").unwrap(), Value::Int(6));
        assert_eq!(eval("(+)").unwrap(), Value::Int(0));
        assert_eq!(eval("(+ \"a\" \"b\")").unwrap(), Value::string("ab"));
        assert_eq!(eval("(+ 5 \"hi\")").unwrap(), Value::string("5hi"));
        assert_eq!(
            eval("(+ '(1 2) '(3))").unwrap(),
            Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
        assert_eq!(
            eval("(+ '(1 2) 3)").unwrap(),
            Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
    }

    #[test]
    fn test_sub() {
        assert_eq!(eval("(- 5)").unwrap(), Value::Int(-5));
        assert_eq!(eval("(- 10 3 2)").unwrap(), Value::Int(5));
        assert!(eval("(- 1 \"x\")").is_err());
        assert!(eval("(-)").is_err());
    }

    #[test]
    fn test_div_exact_and_float() {
        assert_eq!(eval("(/ 22 2)").unwrap(), Value::Int(11));
        assert_eq!(eval("(/ 10 4)").unwrap(), Value::Float(2.5));
        assert!(matches!(
            eval("(/ 1 0)").unwrap_err().kind,
            ErrorKind::DivideByZero
        ));
        assert!(eval("(/ 1)").is_err());
    }

    #[test]
    fn test_exp() {
        assert_eq!(eval("(** 2 10)").unwrap(), Value::Int(1024));
        assert_eq!(eval("(** 2 -1)").unwrap(), Value::Float(0.5));
        assert!(eval("(** 1)").is_err());
    }

    #[test]
    fn test_overflow_detected() {
        assert!(matches!(
            eval("(+ 9223372036854775807 1)").unwrap_err().kind,
            ErrorKind::Overflow(_)
        ));
        assert!(matches!(
            eval("(** 2 127)").unwrap_err().kind,
            ErrorKind::Overflow(_)
        ));
    }

    #[test]
    fn test_mod_sign_follows_divisor() {
        assert_eq!(eval("(mod 17 5)").unwrap(), Value::Int(2));
        assert_eq!(eval("(mod -7 3)").unwrap(), Value::Int(2));
        assert_eq!(eval("(mod 7 -3)").unwrap(), Value::Int(-2));
        assert!(eval("(mod 1 0)").is_err());
    }

    #[test]
    fn test_rounding() {
        assert_eq!(eval("(floor 2.7)").unwrap(), Value::Int(2));
        assert_eq!(eval("(ceil 2.1)").unwrap(), Value::Int(3));
        assert_eq!(eval("(round 2.5)").unwrap(), Value::Int(3));
        assert_eq!(eval("(floor 4)").unwrap(), Value::Int(4));
    }
}
