//! Binding and control flow: define, let, set, alias, unalias, if,
//! case, do, while
//!
//! `define` creates a binding in the current frame and refuses
//! duplicates; `set` mutates the nearest existing binding and fails on
//! unbound names. `let` binds all pairs simultaneously in a fresh frame.

use crate::builtins::{
    expect_arity, expect_arity_range, expect_list, expect_min_arity, expect_symbol, BuiltinTable,
};
use crate::env::Environment;
use crate::error::{ErrorKind, EvalError};
use crate::eval::Evaluator;
use crate::value::{Operator, Value};

pub fn builtin_define(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("define", args, 2)?;
    let sym = expect_symbol("define", &args[0])?;
    let value = ev.eval(&args[1])?;
    if let Value::Closure(closure) = &value {
        // an anonymous fn defined under a name takes that name
        if *closure.name.borrow() == "lambda" {
            *closure.name.borrow_mut() = sym.name.clone();
        }
    }
    ev.env
        .define(&sym.name, value)
        .map_err(|e| e.with_span(sym.span.clone()))?;
    Ok(Value::Unit)
}

/// `(let ([a e1] [b e2]) body+)`: the binding expressions are evaluated
/// in the enclosing environment, so bindings do not see each other.
pub fn builtin_let(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_min_arity("let", args, 2)?;
    let bindings = expect_list("let", &args[0])?;

    let mut evaluated = Vec::with_capacity(bindings.len());
    for binding in bindings.iter() {
        let pair = expect_list("let", binding)?;
        if pair.len() != 2 {
            return Err(EvalError::runtime("let", "bindings must be (name expr) pairs"));
        }
        let sym = expect_symbol("let", &pair[0])?;
        evaluated.push((sym.name.clone(), ev.eval(&pair[1])?));
    }

    let frame = Environment::with_parent(ev.env.clone());
    for (name, value) in evaluated {
        frame.define(&name, value)?;
    }

    let saved = std::mem::replace(&mut ev.env, frame);
    let mut result = Ok(Value::Unit);
    for expr in &args[1..] {
        result = ev.eval(expr);
        if result.is_err() {
            break;
        }
    }
    ev.env = saved;
    result
}

/// `(set (name expr)+)`: writes through to the nearest binding.
pub fn builtin_set(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_min_arity("set", args, 1)?;
    let mut result = Value::Unit;
    for arg in args {
        let pair = expect_list("set", arg)?;
        if pair.len() != 2 {
            return Err(EvalError::runtime("set", "arguments must be (name expr) pairs"));
        }
        let sym = expect_symbol("set", &pair[0])?;
        result = ev.eval(&pair[1])?;
        ev.env
            .write(&sym.name, result.clone())
            .map_err(|e| e.with_span(sym.span.clone()))?;
    }
    Ok(result)
}

pub fn builtin_if(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity_range("if", args, 2, 3)?;
    if ev.eval(&args[0])?.is_truthy() {
        ev.eval(&args[1])
    } else if args.len() == 3 {
        ev.eval(&args[2])
    } else {
        Ok(Value::Unit)
    }
}

/// `(case key (k consequents+)+)`: literal equality against the clause
/// head; a `default` clause matches when nothing else did. Duplicate
/// keys are compared structurally and rejected.
pub fn builtin_case(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_min_arity("case", args, 1)?;
    let keyform = ev.eval(&args[0])?;

    let mut clauses = Vec::with_capacity(args.len() - 1);
    for clause in &args[1..] {
        let clause = expect_list("case", clause)?;
        if clause.len() < 2 {
            return Err(EvalError::runtime(
                "case",
                "clauses must be (key consequent+) lists",
            ));
        }
        clauses.push(clause);
    }

    for (i, clause) in clauses.iter().enumerate() {
        for other in &clauses[i + 1..] {
            if clause[0] == other[0] {
                return Err(EvalError::new(ErrorKind::DuplicateCaseKey(format!(
                    "{}",
                    clause[0]
                ))));
            }
        }
    }

    let is_default =
        |key: &Value| matches!(key, Value::Symbol(sym) if sym.name == "default");

    for clause in &clauses {
        if is_default(&clause[0]) {
            continue;
        }
        if keyform == clause[0] {
            let mut result = Value::Unit;
            for expr in &clause[1..] {
                result = ev.eval(expr)?;
            }
            return Ok(result);
        }
    }
    for clause in &clauses {
        if is_default(&clause[0]) {
            let mut result = Value::Unit;
            for expr in &clause[1..] {
                result = ev.eval(expr)?;
            }
            return Ok(result);
        }
    }
    Ok(Value::Unit)
}

pub fn builtin_do(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_min_arity("do", args, 1)?;
    let mut result = Value::Unit;
    for expr in args {
        result = ev.eval(expr)?;
    }
    Ok(result)
}

pub fn builtin_while(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_min_arity("while", args, 2)?;
    let mut result = Value::Unit;
    while ev.eval(&args[0])?.is_truthy() {
        for expr in &args[1..] {
            result = ev.eval(expr)?;
        }
    }
    Ok(result)
}

/// `(alias new old ...)`: rewrites `new` to `old` at lookup time.
pub fn builtin_alias(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_min_arity("alias", args, 2)?;
    if args.len() % 2 != 0 {
        return Err(EvalError::arity("alias", "an even number of", args.len()));
    }
    for pair in args.chunks(2) {
        let from = expect_symbol("alias", &pair[0])?;
        let to = expect_symbol("alias", &pair[1])?;
        ev.aliases.insert(from.name, to.name);
    }
    Ok(Value::Unit)
}

pub fn builtin_unalias(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("unalias", args, 1)?;
    let sym = expect_symbol("unalias", &args[0])?;
    if ev.aliases.remove(&sym.name).is_none() {
        return Err(EvalError::runtime(
            "unalias",
            format!("no alias {} known", sym.name),
        ));
    }
    Ok(Value::Unit)
}

pub fn register(table: &mut BuiltinTable) {
    table.insert(Operator::Define, builtin_define as crate::eval::BuiltinFn);
    table.insert(Operator::Let, builtin_let);
    table.insert(Operator::Set, builtin_set);
    table.insert(Operator::If, builtin_if);
    table.insert(Operator::Case, builtin_case);
    table.insert(Operator::Do, builtin_do);
    table.insert(Operator::While, builtin_while);
    table.insert(Operator::Alias, builtin_alias);
    table.insert(Operator::Unalias, builtin_unalias);
}
