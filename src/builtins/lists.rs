//! List operations: list, first, second, last, rest, in, map, max, min,
//! average, zip, length, fold, range
//!
//! `map` and `fold` accept closures, built-in operators and user
//! operators as their function argument.

use crate::builtins::{expect_arity, expect_arity_range, expect_int, expect_list, expect_min_arity, BuiltinTable};
use crate::error::EvalError;
use crate::eval::Evaluator;
use crate::value::{Operator, Value};

pub fn builtin_list(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    Ok(Value::list(ev.eval_args(args)?))
}

pub fn builtin_first(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("first", args, 1)?;
    let list = expect_list("first", &ev.eval(&args[0])?)?;
    list.first()
        .cloned()
        .ok_or_else(|| EvalError::runtime("first", "empty list"))
}

pub fn builtin_second(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("second", args, 1)?;
    let list = expect_list("second", &ev.eval(&args[0])?)?;
    list.get(1)
        .cloned()
        .ok_or_else(|| EvalError::runtime("second", "list has fewer than two elements"))
}

pub fn builtin_last(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("last", args, 1)?;
    let list = expect_list("last", &ev.eval(&args[0])?)?;
    list.last()
        .cloned()
        .ok_or_else(|| EvalError::runtime("last", "empty list"))
}

pub fn builtin_rest(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("rest", args, 1)?;
    let list = expect_list("rest", &ev.eval(&args[0])?)?;
    if list.len() > 1 {
        Ok(Value::list(list[1..].to_vec()))
    } else {
        Ok(Value::list(vec![]))
    }
}

/// `(in v1 v2 ... seq)`: membership in a list, or key presence in an
/// array with the values joined to a compound key.
pub fn builtin_in(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_min_arity("in", args, 2)?;
    let evaluated = ev.eval_args(args)?;
    let (needles, haystack) = evaluated.split_at(evaluated.len() - 1);
    match &haystack[0] {
        Value::List(list) => Ok(Value::Bool(
            needles.iter().all(|needle| list.iter().any(|v| v == needle)),
        )),
        Value::Array(map) => {
            let key = super::arrays::compound_key("in", needles)?;
            Ok(Value::Bool(map.borrow().contains_key(&key)))
        }
        other => Err(EvalError::kind_error("in", "list or array", other)),
    }
}

pub fn builtin_map(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("map", args, 2)?;
    let f = ev.eval(&args[0])?;
    let list = expect_list("map", &ev.eval(&args[1])?)?;
    let mut out = Vec::with_capacity(list.len());
    for element in list.iter() {
        out.push(ev.apply(&f, vec![element.clone()])?);
    }
    Ok(Value::list(out))
}

pub fn builtin_zip(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("zip", args, 2)?;
    let evaluated = ev.eval_args(args)?;
    let a = expect_list("zip", &evaluated[0])?;
    let b = expect_list("zip", &evaluated[1])?;
    Ok(Value::list(
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| Value::list(vec![x.clone(), y.clone()]))
            .collect(),
    ))
}

fn numeric(function: &str, value: &Value) -> Result<f64, EvalError> {
    match value {
        Value::Int(n) => Ok(*n as f64),
        Value::Float(f) => Ok(*f),
        other => Err(EvalError::kind_error(function, "number", other)),
    }
}

fn extremum(
    function: &str,
    ev: &mut Evaluator,
    args: &[Value],
    pick_larger: bool,
) -> Result<Value, EvalError> {
    expect_arity(function, args, 1)?;
    let list = expect_list(function, &ev.eval(&args[0])?)?;
    let mut best: Option<(f64, Value)> = None;
    for element in list.iter() {
        let key = numeric(function, element)?;
        let replace = match &best {
            Some((current, _)) => {
                if pick_larger {
                    key > *current
                } else {
                    key < *current
                }
            }
            None => true,
        };
        if replace {
            best = Some((key, element.clone()));
        }
    }
    best.map(|(_, v)| v)
        .ok_or_else(|| EvalError::runtime(function, "empty list"))
}

pub fn builtin_max(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    extremum("max", ev, args, true)
}

pub fn builtin_min(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    extremum("min", ev, args, false)
}

pub fn builtin_average(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("average", args, 1)?;
    let list = expect_list("average", &ev.eval(&args[0])?)?;
    if list.is_empty() {
        return Err(EvalError::runtime("average", "empty list"));
    }
    let mut sum = 0.0;
    for element in list.iter() {
        sum += numeric("average", element)?;
    }
    Ok(Value::Float(sum / list.len() as f64))
}

pub fn builtin_length(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("length", args, 1)?;
    match ev.eval(&args[0])? {
        Value::List(list) => Ok(Value::Int(list.len() as i64)),
        Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
        other => Err(EvalError::kind_error("length", "list or string", &other)),
    }
}

pub fn builtin_fold(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("fold", args, 3)?;
    let f = ev.eval(&args[0])?;
    let mut acc = ev.eval(&args[1])?;
    let list = expect_list("fold", &ev.eval(&args[2])?)?;
    for element in list.iter() {
        acc = ev.apply(&f, vec![acc, element.clone()])?;
    }
    Ok(acc)
}

/// `(range end)`, `(range start end)` or `(range start end step)`.
pub fn builtin_range(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity_range("range", args, 1, 3)?;
    let evaluated = ev.eval_args(args)?;
    let mut ints = Vec::with_capacity(evaluated.len());
    for value in &evaluated {
        ints.push(expect_int("range", value)?);
    }
    let (start, end, step) = match ints.as_slice() {
        [end] => (0, *end, 1),
        [start, end] => (*start, *end, 1),
        [start, end, step] => (*start, *end, *step),
        _ => unreachable!(),
    };
    if step == 0 {
        return Err(EvalError::runtime("range", "step must not be zero"));
    }
    let mut out = Vec::new();
    let mut current = start;
    while (step > 0 && current < end) || (step < 0 && current > end) {
        out.push(Value::Int(current));
        current += step;
    }
    Ok(Value::list(out))
}

pub fn register(table: &mut BuiltinTable) {
    table.insert(Operator::List, builtin_list as crate::eval::BuiltinFn);
    table.insert(Operator::First, builtin_first);
    table.insert(Operator::Second, builtin_second);
    table.insert(Operator::Last, builtin_last);
    table.insert(Operator::Rest, builtin_rest);
    table.insert(Operator::In, builtin_in);
    table.insert(Operator::Map, builtin_map);
    table.insert(Operator::Max, builtin_max);
    table.insert(Operator::Min, builtin_min);
    table.insert(Operator::Average, builtin_average);
    table.insert(Operator::Zip, builtin_zip);
    table.insert(Operator::Length, builtin_length);
    table.insert(Operator::Fold, builtin_fold);
    table.insert(Operator::Range, builtin_range);
}
