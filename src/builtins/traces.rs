//! Trace navigation: load, unload, step, find, find/g, whenever,
//! fold/signal, reval, signal-width, sample-at, loaded-traces, signal?
//!
//! The iteration combinators displace trace indices while they run and
//! restore them on every exit path, errors included. Each one pushes an
//! index snapshot, runs its body, and pops the snapshot before
//! returning the body's result.

use crate::builtins::{expect_arity, expect_arity_range, expect_int, expect_list, expect_min_arity, expect_name, expect_string, expect_symbol, BuiltinTable};
use crate::error::EvalError;
use crate::eval::Evaluator;
use crate::value::{Operator, Value};

const DEFAULT_TRACE_ID: &str = "DEFAULT";

/// `(load "file.vcd" id?)`: the id defaults to DEFAULT.
pub fn builtin_load(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity_range("load", args, 1, 2)?;
    let filename = expect_string("load", &ev.eval(&args[0])?)?;
    let tid = if args.len() == 2 {
        expect_name("load", &args[1])?
    } else {
        DEFAULT_TRACE_ID.to_string()
    };
    ev.traces.load(&filename, &tid)?;
    Ok(Value::Unit)
}

pub fn builtin_unload(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity_range("unload", args, 0, 1)?;
    let tid = if args.len() == 1 {
        expect_name("unload", &args[0])?
    } else {
        DEFAULT_TRACE_ID.to_string()
    };
    ev.traces.unload(&tid);
    Ok(Value::Unit)
}

/// Argument forms: `(step)` all traces +1; `(step k)` all +k;
/// `(step id)` one trace +1; `(step id1 id2 k)` named traces +k.
/// True when no trace ran off its range.
pub fn builtin_step(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    if ev.traces.is_empty() {
        return Err(EvalError::runtime("step", "no traces loaded"));
    }
    let ended = if args.is_empty() {
        ev.traces.step(1, None)?
    } else if args.len() == 1 {
        match &args[0] {
            // a symbol naming a loaded trace steps that trace; anything
            // else must evaluate to a step count
            Value::Symbol(sym) if ev.traces.get(&sym.name).is_some() => {
                let tid = sym.name.clone();
                ev.traces.step(1, Some(&tid))?
            }
            Value::Str(tid) => {
                let tid = tid.clone();
                ev.traces.step(1, Some(&tid))?
            }
            expr => {
                let steps = expect_int("step", &ev.eval(expr)?)?;
                ev.traces.step(steps, None)?
            }
        }
    } else {
        let steps = expect_int("step", &ev.eval(&args[args.len() - 1])?)?;
        let mut ended = Vec::new();
        for arg in &args[..args.len() - 1] {
            let tid = expect_name("step", arg)?;
            ended.extend(ev.traces.step(steps, Some(&tid))?);
        }
        ended
    };
    Ok(Value::Bool(ended.is_empty()))
}

fn find_body(ev: &mut Evaluator, condition: &Value) -> Result<Value, EvalError> {
    let mut found: Vec<i64> = Vec::new();
    for tid in ev.traces.ids() {
        let start = match ev.traces.get(&tid) {
            Some(trace) => trace.index,
            None => continue,
        };
        if let Some(trace) = ev.traces.get_mut(&tid) {
            trace.set(0);
        }
        loop {
            if ev.eval(condition)?.is_truthy() {
                if let Some(trace) = ev.traces.get(&tid) {
                    found.push(trace.index as i64);
                }
            }
            let ended = match ev.traces.get_mut(&tid) {
                Some(trace) => trace.step(1).is_some(),
                None => true,
            };
            if ended {
                break;
            }
        }
        if let Some(trace) = ev.traces.get_mut(&tid) {
            trace.set(start);
        }
    }
    found.sort_unstable();
    found.dedup();
    Ok(Value::list(found.into_iter().map(Value::Int).collect()))
}

/// `(find cond)`: all indices at which the condition holds, scanning
/// each trace independently from index 0.
pub fn builtin_find(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("find", args, 1)?;
    if ev.traces.is_empty() {
        return Err(EvalError::runtime("find", "no traces loaded"));
    }
    ev.traces.store_indices();
    let result = find_body(ev, &args[0]);
    ev.traces.restore_indices();
    result
}

/// The current position of all traces as a value: a bare index with one
/// trace, an id-keyed array with several.
fn indices_value(ev: &Evaluator) -> Value {
    let indices = ev.traces.indices();
    if indices.len() == 1 {
        return Value::Int(indices[0].1 as i64);
    }
    let array = Value::array();
    if let Value::Array(map) = &array {
        for (tid, index) in indices {
            map.borrow_mut().insert(tid, Value::Int(index as i64));
        }
    }
    array
}

fn find_g_body(ev: &mut Evaluator, condition: &Value) -> Result<Value, EvalError> {
    let mut found = Vec::new();
    loop {
        if ev.eval(condition)?.is_truthy() {
            found.push(indices_value(ev));
        }
        if !ev.traces.step(1, None)?.is_empty() {
            break;
        }
    }
    Ok(Value::list(found))
}

/// `(find/g cond)`: like `find` but steps all traces synchronously from
/// their current positions.
pub fn builtin_find_g(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("find/g", args, 1)?;
    if ev.traces.is_empty() {
        return Err(EvalError::runtime("find/g", "no traces loaded"));
    }
    ev.traces.store_indices();
    let result = find_g_body(ev, &args[0]);
    ev.traces.restore_indices();
    result
}

fn whenever_body(ev: &mut Evaluator, condition: &Value, body: &[Value]) -> Result<Value, EvalError> {
    let mut result = Value::Unit;
    loop {
        if ev.eval(condition)?.is_truthy() {
            for expr in body {
                result = ev.eval(expr)?;
            }
        }
        if !ev.traces.step(1, None)?.is_empty() {
            break;
        }
    }
    Ok(result)
}

/// `(whenever cond body+)`: evaluates the body at every step where the
/// condition holds; returns the last body value.
pub fn builtin_whenever(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_min_arity("whenever", args, 2)?;
    if ev.traces.is_empty() {
        return Err(EvalError::runtime("whenever", "no traces loaded"));
    }
    ev.traces.store_indices();
    let result = whenever_body(ev, &args[0], &args[1..]);
    ev.traces.restore_indices();
    result
}

fn fold_signal_body(
    ev: &mut Evaluator,
    f: &Value,
    mut acc: Value,
    stop: &Value,
    signal: &Value,
) -> Result<Value, EvalError> {
    loop {
        if ev.eval(stop)?.is_truthy() {
            break;
        }
        let sample = ev.eval(signal)?;
        acc = ev.apply(f, vec![acc, sample])?;
        if !ev.traces.step(1, None)?.is_empty() {
            break;
        }
    }
    Ok(acc)
}

/// `(fold/signal f init stop signal)`: folds the signal's values from
/// the current position until `stop` holds or a trace ends.
pub fn builtin_fold_signal(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("fold/signal", args, 4)?;
    let signal = expect_symbol("fold/signal", &args[3])?;
    if !ev.traces.contains(&signal.name) {
        return Err(EvalError::runtime(
            "fold/signal",
            format!("{} is not a signal", signal.name),
        ));
    }
    let f = ev.eval(&args[0])?;
    let init = ev.eval(&args[1])?;

    ev.traces.store_indices();
    let result = fold_signal_body(ev, &f, init, &args[2], &args[3]);
    ev.traces.restore_indices();
    result
}

/// `(reval expr offset)`: evaluates `expr` with every trace shifted by
/// `offset`. An offset that would leave any trace's range
/// short-circuits to false.
pub fn builtin_reval(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("reval", args, 2)?;
    let offset = expect_int("reval", &ev.eval(&args[1])?)?;

    for trace in ev.traces.iter() {
        let target = trace.index as i64 + offset;
        if target < 0 || target > trace.max_index as i64 {
            return Ok(Value::Bool(false));
        }
    }

    ev.traces.store_indices();
    let result = match ev.traces.step(offset, None) {
        Ok(_) => ev.eval(&args[0]),
        Err(e) => Err(e),
    };
    ev.traces.restore_indices();
    result
}

pub fn builtin_signal_width(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("signal-width", args, 1)?;
    let name = match &args[0] {
        Value::Symbol(sym) => sym.name.clone(),
        expr => expect_name("signal-width", &ev.eval(expr)?)?,
    };
    Ok(Value::Int(ev.traces.signal_width(&name)? as i64))
}

/// `(sample-at indices)`: restricts every trace's sampling to the given
/// positions and invalidates virtual-signal caches.
pub fn builtin_sample_at(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("sample-at", args, 1)?;
    let list = expect_list("sample-at", &ev.eval(&args[0])?)?;
    let mut indices = Vec::with_capacity(list.len());
    for value in list.iter() {
        let index = expect_int("sample-at", value)?;
        if index < 0 {
            return Err(EvalError::runtime("sample-at", "indices must not be negative"));
        }
        indices.push(index as usize);
    }
    for trace in ev.traces.iter_mut() {
        trace.set_sampling_points(&indices)?;
    }
    Ok(Value::Unit)
}

pub fn builtin_loaded_traces(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    if !args.is_empty() {
        return Err(EvalError::arity("loaded-traces", "0", args.len()));
    }
    Ok(Value::list(
        ev.traces.ids().into_iter().map(Value::Str).collect(),
    ))
}

/// `(signal? name)`: whether any loaded trace contains the name.
pub fn builtin_is_signal(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("signal?", args, 1)?;
    let name = match &args[0] {
        Value::Symbol(sym) => sym.name.clone(),
        expr => expect_name("signal?", &ev.eval(expr)?)?,
    };
    Ok(Value::Bool(ev.traces.contains(&name)))
}

pub fn register(table: &mut BuiltinTable) {
    table.insert(Operator::Load, builtin_load as crate::eval::BuiltinFn);
    table.insert(Operator::Unload, builtin_unload);
    table.insert(Operator::Step, builtin_step);
    table.insert(Operator::Find, builtin_find);
    table.insert(Operator::FindG, builtin_find_g);
    table.insert(Operator::Whenever, builtin_whenever);
    table.insert(Operator::FoldSignal, builtin_fold_signal);
    table.insert(Operator::RelEval, builtin_reval);
    table.insert(Operator::SignalWidth, builtin_signal_width);
    table.insert(Operator::SampleAt, builtin_sample_at);
    table.insert(Operator::LoadedTraces, builtin_loaded_traces);
    table.insert(Operator::IsSignal, builtin_is_signal);
}
