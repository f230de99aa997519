//! Array operations: array, seta, geta, dela, mapa
//!
//! Arrays are string-keyed mappings with interior mutability; several
//! key arguments are joined with `-` into one compound key, so
//! `(geta counts "read" 3)` addresses the key `read-3`.

use crate::builtins::{expect_arity, expect_min_arity, BuiltinTable};
use crate::error::EvalError;
use crate::eval::Evaluator;
use crate::value::{Operator, Value};

/// Joins key parts into the canonical compound key.
pub(crate) fn compound_key(function: &str, parts: &[Value]) -> Result<String, EvalError> {
    let mut out = Vec::with_capacity(parts.len());
    for part in parts {
        match part {
            Value::Int(n) => out.push(n.to_string()),
            Value::Str(s) => out.push(s.clone()),
            Value::Symbol(sym) => out.push(sym.name.clone()),
            other => {
                return Err(EvalError::kind_error(
                    function,
                    "int, string or symbol key",
                    other,
                ))
            }
        }
    }
    Ok(out.join("-"))
}

/// `(array (k v)+)` builds a fresh array from key/value pairs.
pub fn builtin_array(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    let array = Value::array();
    let Value::Array(map) = &array else { unreachable!() };
    for arg in args {
        let Value::List(pair) = arg else {
            return Err(EvalError::kind_error("array", "(key value) pair", arg));
        };
        if pair.len() != 2 {
            return Err(EvalError::runtime("array", "arguments must be (key value) pairs"));
        }
        let key = ev.eval(&pair[0])?;
        let value = ev.eval(&pair[1])?;
        map.borrow_mut()
            .insert(compound_key("array", &[key])?, value);
    }
    Ok(array.clone())
}

pub fn builtin_seta(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_min_arity("seta", args, 3)?;
    let array = ev.eval(&args[0])?;
    let Value::Array(map) = &array else {
        return Err(EvalError::kind_error("seta", "array", &array));
    };
    let keys = ev.eval_args(&args[1..args.len() - 1])?;
    let key = compound_key("seta", &keys)?;
    let value = ev.eval(&args[args.len() - 1])?;
    map.borrow_mut().insert(key, value);
    Ok(array.clone())
}

/// Reads a key; a missing key is created with value 0, which makes
/// counting idioms like `(seta c k (+ 1 (geta c k)))` work unseeded.
pub fn builtin_geta(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_min_arity("geta", args, 2)?;
    let array = ev.eval(&args[0])?;
    let Value::Array(map) = &array else {
        return Err(EvalError::kind_error("geta", "array", &array));
    };
    let keys = ev.eval_args(&args[1..])?;
    let key = compound_key("geta", &keys)?;
    let mut map = map.borrow_mut();
    Ok(map.entry(key).or_insert(Value::Int(0)).clone())
}

pub fn builtin_dela(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_min_arity("dela", args, 2)?;
    let array = ev.eval(&args[0])?;
    let Value::Array(map) = &array else {
        return Err(EvalError::kind_error("dela", "array", &array));
    };
    let keys = ev.eval_args(&args[1..])?;
    let key = compound_key("dela", &keys)?;
    map.borrow_mut().remove(&key);
    Ok(array.clone())
}

/// `(mapa f arr)` applies `f` to each (key, value) pair, in key order.
pub fn builtin_mapa(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("mapa", args, 2)?;
    let f = ev.eval(&args[0])?;
    let array = ev.eval(&args[1])?;
    let Value::Array(map) = &array else {
        return Err(EvalError::kind_error("mapa", "array", &array));
    };
    let entries: Vec<(String, Value)> = map
        .borrow()
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let mut out = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        out.push(ev.apply(&f, vec![Value::Str(key), value])?);
    }
    Ok(Value::list(out))
}

pub fn register(table: &mut BuiltinTable) {
    table.insert(Operator::Array, builtin_array as crate::eval::BuiltinFn);
    table.insert(Operator::Seta, builtin_seta);
    table.insert(Operator::Geta, builtin_geta);
    table.insert(Operator::Dela, builtin_dela);
    table.insert(Operator::Mapa, builtin_mapa);
}
