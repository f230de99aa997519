//! Bitwise operations: bor, band, bxor
//!
//! All three are n-ary folds over integer arguments; a single argument
//! is returned unchanged.

use crate::builtins::{expect_int, expect_min_arity, BuiltinTable};
use crate::error::EvalError;
use crate::eval::Evaluator;
use crate::value::{Operator, Value};

fn reduce_bits(
    function: &str,
    ev: &mut Evaluator,
    args: &[Value],
    f: fn(i64, i64) -> i64,
) -> Result<Value, EvalError> {
    expect_min_arity(function, args, 1)?;
    let evaluated = ev.eval_args(args)?;
    let mut result = expect_int(function, &evaluated[0])?;
    for value in &evaluated[1..] {
        result = f(result, expect_int(function, value)?);
    }
    Ok(Value::Int(result))
}

pub fn builtin_bor(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    reduce_bits("bor", ev, args, |a, b| a | b)
}

pub fn builtin_band(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    reduce_bits("band", ev, args, |a, b| a & b)
}

pub fn builtin_bxor(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    reduce_bits("bxor", ev, args, |a, b| a ^ b)
}

pub fn register(table: &mut BuiltinTable) {
    table.insert(Operator::Bor, builtin_bor as crate::eval::BuiltinFn);
    table.insert(Operator::Band, builtin_band);
    table.insert(Operator::Bxor, builtin_bxor);
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
    fn test_bitwise_and() {
        let cases = [
            ("(band 1234)", 1234),
            ("(band 838051 700310)", 559490),
            ("(band 20952 525113 600227 740493 318875)", 0),
        ];
        for (program, expected) in cases {
            assert_eq!(eval(program).unwrap(), Value::Int(expected), "program: {}", program);
        }
    }

    #[test]
    fn test_bitwise_or() {
        let cases = [
            ("(bor 1234)", 1234),
            ("(bor 838051 700310)", 978871),
            ("(bor 20952 525113 600227 740493 318875)", 1048575),
        ];
        for (program, expected) in cases {
            assert_eq!(eval(program).unwrap(), Value::Int(expected), "program: {}", program);
        }
    }

    #[test]
    fn test_bitwise_xor() {
        let cases = [
            ("(bxor 1234)", 1234),
            ("(bxor 838051 700310)", 419381),
            ("(bxor 20952 525113 600227 740493 318875)", 977748),
        ];
        for (program, expected) in cases {
            assert_eq!(eval(program).unwrap(), Value::Int(expected), "program: {}", program);
        }
    }

    #[test]
    fn test_bitwise_kind_errors() {
        assert!(eval("(bor)").is_err());
        assert!(eval("(band 1 \"a\")").is_err());
        assert!(eval("(bxor 1.5 1)").is_err());
    }
}
