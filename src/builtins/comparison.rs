//! Comparison and logic operations: =, !=, >, <, >=, <=, &&, ||, !
//!
//! Equality is structural and n-ary; the orderings take exactly two
//! numeric operands. `&&` and `||` short-circuit over their unevaluated
//! argument forms.

use crate::builtins::{expect_arity, expect_min_arity, BuiltinTable};
use crate::error::EvalError;
use crate::eval::Evaluator;
use crate::value::{Operator, Value};

/// True when every argument equals the first.
pub fn builtin_eq(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_min_arity("=", args, 2)?;
    let evaluated = ev.eval_args(args)?;
    Ok(Value::Bool(evaluated[1..].iter().all(|v| *v == evaluated[0])))
}

pub fn builtin_neq(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_min_arity("!=", args, 2)?;
    let evaluated = ev.eval_args(args)?;
    Ok(Value::Bool(
        !evaluated[1..].iter().all(|v| *v == evaluated[0]),
    ))
}

fn ordering(function: &str, ev: &mut Evaluator, args: &[Value]) -> Result<(f64, f64), EvalError> {
    expect_arity(function, args, 2)?;
    let evaluated = ev.eval_args(args)?;
    let as_f64 = |value: &Value| -> Result<f64, EvalError> {
        match value {
            Value::Int(n) => Ok(*n as f64),
            Value::Float(f) => Ok(*f),
            other => Err(EvalError::kind_error(function, "number", other)),
        }
    };
    Ok((as_f64(&evaluated[0])?, as_f64(&evaluated[1])?))
}

pub fn builtin_larger(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    let (a, b) = ordering(">", ev, args)?;
    Ok(Value::Bool(a > b))
}

pub fn builtin_smaller(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    let (a, b) = ordering("<", ev, args)?;
    Ok(Value::Bool(a < b))
}

pub fn builtin_larger_equal(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    let (a, b) = ordering(">=", ev, args)?;
    Ok(Value::Bool(a >= b))
}

pub fn builtin_smaller_equal(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    let (a, b) = ordering("<=", ev, args)?;
    Ok(Value::Bool(a <= b))
}

/// Short-circuiting conjunction over truthiness.
pub fn builtin_and(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_min_arity("&&", args, 1)?;
    for arg in args {
        if !ev.eval(arg)?.is_truthy() {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

/// Short-circuiting disjunction over truthiness.
pub fn builtin_or(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_min_arity("||", args, 1)?;
    for arg in args {
        if ev.eval(arg)?.is_truthy() {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

/// True when no argument is truthy.
pub fn builtin_not(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_min_arity("!", args, 1)?;
    let evaluated = ev.eval_args(args)?;
    Ok(Value::Bool(!evaluated.iter().any(Value::is_truthy)))
}

pub fn register(table: &mut BuiltinTable) {
    table.insert(Operator::Eq, builtin_eq as crate::eval::BuiltinFn);
    table.insert(Operator::Neq, builtin_neq);
    table.insert(Operator::Larger, builtin_larger);
    table.insert(Operator::Smaller, builtin_smaller);
    table.insert(Operator::LargerEqual, builtin_larger_equal);
    table.insert(Operator::SmallerEqual, builtin_smaller_equal);
    table.insert(Operator::And, builtin_and);
    table.insert(Operator::Or, builtin_or);
    table.insert(Operator::Not, builtin_not);
}
