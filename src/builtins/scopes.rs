//! Scope and group resolution: in-scope, all-scopes, resolve-scope,
//! set-scope, unset-scope, groups, in-group, in-groups, resolve-group
//!
//! The current scope is a dotted path prefix; `~x` resolves to
//! `scope.x`. Groups are inferred prefixes derived from suffix
//! patterns; `#x` resolves to `group + x`. The `CS` and `CG` bindings
//! mirror both.

use crate::builtins::{expect_arity, expect_min_arity, expect_name, expect_string, expect_symbol, BuiltinTable};
use crate::error::EvalError;
use crate::eval::Evaluator;
use crate::value::{Operator, Value};
use std::collections::BTreeSet;

/// `(in-scope S expr)`: evaluates `expr` with the scope temporarily set.
pub fn builtin_in_scope(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("in-scope", args, 2)?;
    let scope = expect_name("in-scope", &ev.eval(&args[0])?)?;
    let previous = ev.scope.clone();

    ev.set_scope(scope)?;
    let result = ev.eval(&args[1]);
    ev.set_scope(previous)?;
    result
}

/// `(all-scopes expr)`: evaluates `expr` once per scope, returning the
/// list of results.
pub fn builtin_all_scopes(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("all-scopes", args, 1)?;
    let previous = ev.scope.clone();
    let scopes = ev.traces.scopes();

    let mut results = Vec::with_capacity(scopes.len());
    let mut failure = None;
    for scope in scopes {
        if let Err(e) = ev.set_scope(scope) {
            failure = Some(e);
            break;
        }
        match ev.eval(&args[0]) {
            Ok(value) => results.push(value),
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }
    ev.set_scope(previous)?;
    match failure {
        Some(e) => Err(e),
        None => Ok(Value::list(results)),
    }
}

/// `(resolve-scope name)`: reads `scope.name` (or `scope + name` when
/// the current "scope" is really a group prefix) as a signal.
pub fn builtin_resolve_scope(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("resolve-scope", args, 1)?;
    let sym = expect_symbol("resolve-scope", &args[0])?;
    let name = ev.aliases.get(&sym.name).cloned().unwrap_or(sym.name);

    let qualified = if ev.traces.scopes().contains(&ev.scope) {
        format!("{}.{}", ev.scope, name)
    } else {
        format!("{}{}", ev.scope, name)
    };
    if ev.traces.contains(&qualified) {
        return ev.signal_value(&qualified);
    }
    Ok(Value::Unit)
}

pub fn builtin_set_scope(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("set-scope", args, 1)?;
    let sym = expect_symbol("set-scope", &args[0])?;
    if !ev.traces.scopes().contains(&sym.name) {
        return Err(EvalError::runtime(
            "set-scope",
            format!("{} is not a valid scope", sym.name),
        ));
    }
    ev.set_scope(sym.name)?;
    Ok(Value::Unit)
}

pub fn builtin_unset_scope(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    if !args.is_empty() {
        return Err(EvalError::arity("unset-scope", "0", args.len()));
    }
    ev.set_scope(String::new())?;
    Ok(Value::Unit)
}

/// `(groups pat0 pat1 ...)`: every prefix P such that P+pat0 is a
/// signal and so is P+pati for every further pattern, sorted.
pub fn builtin_groups(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_min_arity("groups", args, 1)?;
    let mut patterns = Vec::with_capacity(args.len());
    for arg in args {
        patterns.push(expect_string("groups", arg)?);
    }
    let first = &patterns[0];
    let scope = ev.scope.clone();

    let mut groups = BTreeSet::new();
    for signal in ev.traces.signals() {
        let matches = if scope.is_empty() {
            signal.ends_with(first.as_str())
        } else {
            match signal.strip_prefix(&format!("{}.", scope)) {
                Some(rest) => {
                    rest.ends_with(first.as_str())
                        && rest.len() > first.len()
                        && !rest[..rest.len() - first.len()].contains('.')
                }
                None => false,
            }
        };
        if !matches {
            continue;
        }
        let prefix = &signal[..signal.len() - first.len()];
        if patterns[1..]
            .iter()
            .all(|p| ev.traces.contains(&format!("{}{}", prefix, p)))
        {
            groups.insert(prefix.to_string());
        }
    }
    Ok(Value::list(groups.into_iter().map(Value::Str).collect()))
}

fn eval_in_group(ev: &mut Evaluator, group: String, body: &Value) -> Result<Value, EvalError> {
    let previous_group = ev.group.clone();
    let previous_scope = ev.scope.clone();

    // the group prefix carries its scope; everything up to the last dot
    let scope = match group.rfind('.') {
        Some(i) => group[..i + 1].to_string(),
        None => previous_scope.clone(),
    };
    ev.set_group(group)?;
    ev.set_scope(scope)?;

    let result = ev.eval(body);

    ev.set_group(previous_group)?;
    ev.set_scope(previous_scope)?;
    result
}

/// `(in-group G expr)`: evaluates `expr` with the group (and derived
/// scope) temporarily set; `CG` tracks the group.
pub fn builtin_in_group(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("in-group", args, 2)?;
    let group = expect_name("in-group", &ev.eval(&args[0])?)?;
    eval_in_group(ev, group, &args[1])
}

/// `(in-groups Gs expr)`: evaluates `expr` once per group, returning
/// the last result.
pub fn builtin_in_groups(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("in-groups", args, 2)?;
    let groups = ev.eval(&args[0])?;
    let Value::List(groups) = groups else {
        return Err(EvalError::kind_error("in-groups", "list", &groups));
    };
    if groups.is_empty() {
        return Err(EvalError::runtime("in-groups", "no groups specified"));
    }
    let mut result = Value::Unit;
    for group in groups.iter() {
        let name = expect_name("in-groups", group)?;
        result = eval_in_group(ev, name, &args[1])?;
    }
    Ok(result)
}

/// `(resolve-group name)`: reads `group + name` as a signal.
pub fn builtin_resolve_group(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("resolve-group", args, 1)?;
    let sym = expect_symbol("resolve-group", &args[0])?;
    let name = ev.aliases.get(&sym.name).cloned().unwrap_or(sym.name);

    let qualified = format!("{}{}", ev.group, name);
    if ev.traces.contains(&qualified) {
        return ev.signal_value(&qualified);
    }
    Ok(Value::Unit)
}

pub fn register(table: &mut BuiltinTable) {
    table.insert(Operator::InScope, builtin_in_scope as crate::eval::BuiltinFn);
    table.insert(Operator::AllScopes, builtin_all_scopes);
    table.insert(Operator::ResolveScope, builtin_resolve_scope);
    table.insert(Operator::SetScope, builtin_set_scope);
    table.insert(Operator::UnsetScope, builtin_unset_scope);
    table.insert(Operator::Groups, builtin_groups);
    table.insert(Operator::InGroup, builtin_in_group);
    table.insert(Operator::InGroups, builtin_in_groups);
    table.insert(Operator::ResolveGroup, builtin_resolve_group);
}
