//! Virtual signals and traces: defsig, new-trace, dump-trace
//!
//! `defsig` registers a named expression against the current scope or
//! group; its value is computed on demand and cached per timestamp.
//! `new-trace` creates an empty trace to hang virtual signals on, and
//! `dump-trace` writes such a trace out as VCD.

use crate::builtins::{expect_arity, expect_min_arity, expect_symbol, BuiltinTable};
use crate::error::{ErrorKind, EvalError};
use crate::eval::Evaluator;
use crate::value::{Operator, Symbol, Value, WList};
use std::io::Write;

/// Replaces `~x` and `#x` resolver calls with the full signal names
/// they mean under the current scope and group, so the stored body does
/// not depend on the scope at read time.
fn freeze_resolvers(expr: &Value, scope: &str, group: &str) -> Value {
    match expr {
        Value::List(list) => {
            if list.len() == 2 {
                if let (Value::Operator(op), Value::Symbol(sym)) = (&list[0], &list[1]) {
                    match op {
                        Operator::ResolveScope => {
                            return Value::Symbol(Symbol::new(format!("{}{}", scope, sym.name)))
                        }
                        Operator::ResolveGroup => {
                            return Value::Symbol(Symbol::new(format!("{}{}", group, sym.name)))
                        }
                        _ => {}
                    }
                }
            }
            let items = list
                .iter()
                .map(|item| freeze_resolvers(item, scope, group))
                .collect();
            Value::List(WList::with_span(items, list.span.clone()))
        }
        other => other.clone(),
    }
}

/// `(defsig name body+)`: registers a virtual signal named under the
/// current scope or group.
pub fn builtin_defsig(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_min_arity("defsig", args, 2)?;
    let sym = expect_symbol("defsig", &args[0])?;

    let mut scope = if ev.scope.is_empty() {
        String::new()
    } else {
        format!("{}.", ev.scope)
    };
    let group = ev.group.clone();
    if !group.is_empty() {
        // group prefixes already include their scope
        scope.clear();
    }
    let name = format!("{}{}{}", scope, group, sym.name);

    let exprs: Vec<Value> = args[1..]
        .iter()
        .map(|expr| freeze_resolvers(expr, &scope, &group))
        .collect();
    let handle = ev.traces.add_virtual_signal(&name, exprs)?;
    Ok(Value::Signal(handle))
}

/// `(new-trace id max-index)`: an empty trace with synthetic
/// timestamps.
pub fn builtin_new_trace(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("new-trace", args, 2)?;
    let sym = expect_symbol("new-trace", &args[0])?;
    let max_index = match ev.eval(&args[1])? {
        Value::Int(n) if n >= 0 => n as usize,
        other => return Err(EvalError::kind_error("new-trace", "non-negative int", &other)),
    };
    ev.traces.new_virtual(&sym.name, max_index)?;
    Ok(Value::Unit)
}

/// `(dump-trace id)`: writes the trace's virtual signals to `id.vcd`.
pub fn builtin_dump_trace(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("dump-trace", args, 1)?;
    let sym = expect_symbol("dump-trace", &args[0])?;
    let tid = sym.name;

    let (max_index, signals, multi) = {
        let trace = ev
            .traces
            .get(&tid)
            .ok_or_else(|| EvalError::runtime("dump-trace", format!("no trace with id {}", tid)))?;
        let mut signals: Vec<String> = trace.virtual_signals.keys().cloned().collect();
        signals.sort();
        (trace.max_index, signals, ev.traces.len() > 1)
    };
    let separator = ev.traces.separator;

    let path = format!("{}.vcd", tid);
    let file = std::fs::File::create(&path)
        .map_err(|e| EvalError::new(ErrorKind::Io(format!("{}: {}", path, e))))?;
    let mut out = std::io::BufWriter::new(file);
    let io_err = |e: std::io::Error| EvalError::new(ErrorKind::Io(format!("{}: {}", path, e)));

    writeln!(out, "$version\n    WAL\n$end").map_err(io_err)?;
    writeln!(out, "$timescale\n    1ps\n$end").map_err(io_err)?;
    for signal in &signals {
        writeln!(out, "$var reg 32 {} {} [31:0] $end", signal, signal).map_err(io_err)?;
    }
    writeln!(out, "$enddefinitions $end").map_err(io_err)?;

    let saved_index = ev.traces.get(&tid).map(|t| t.index).unwrap_or(0);
    let mut last_values: std::collections::HashMap<String, i64> = std::collections::HashMap::new();
    let mut failure = None;

    'dump: for index in 0..=max_index {
        if let Some(trace) = ev.traces.get_mut(&tid) {
            trace.set(index);
        }
        if let Err(e) = writeln!(out, "#{}", index).map_err(io_err) {
            failure = Some(e);
            break;
        }
        if index == 0 {
            if let Err(e) = writeln!(out, "$dumpvars").map_err(io_err) {
                failure = Some(e);
                break;
            }
        }
        for signal in &signals {
            let qualified = if multi {
                format!("{}{}{}", tid, separator, signal)
            } else {
                signal.clone()
            };
            let value = match ev.signal_value(&qualified) {
                Ok(Value::Int(n)) => n,
                Ok(other) => {
                    failure = Some(EvalError::kind_error("dump-trace", "int", &other));
                    break 'dump;
                }
                Err(e) => {
                    failure = Some(e);
                    break 'dump;
                }
            };
            if last_values.get(signal) != Some(&value) {
                last_values.insert(signal.clone(), value);
                if let Err(e) = writeln!(out, "b{:032b} {}", value, signal).map_err(io_err) {
                    failure = Some(e);
                    break 'dump;
                }
            }
        }
    }

    if let Some(trace) = ev.traces.get_mut(&tid) {
        trace.set(saved_index);
    }
    match failure {
        Some(e) => Err(e),
        None => {
            out.flush().map_err(io_err)?;
            Ok(Value::Unit)
        }
    }
}

pub fn register(table: &mut BuiltinTable) {
    table.insert(Operator::Defsig, builtin_defsig as crate::eval::BuiltinFn);
    table.insert(Operator::NewTrace, builtin_new_trace);
    table.insert(Operator::DumpTrace, builtin_dump_trace);
}
