//! # Built-in Operators
//!
//! Native implementations of every WAL operator, organized by category.
//! Each sub-module registers its operators into the dispatch table the
//! evaluator consults; all builtins receive the evaluator and their
//! unevaluated argument forms.
//!
//! - **[arithmetic]**: `+ - * / ** floor ceil round mod`
//! - **[bitwise]**: `bor band bxor`
//! - **[comparison]**: `= != > < >= <= && || !`
//! - **[control]**: `if case do while define let set alias unalias`
//! - **[functions]**: `fn defmacro macroexpand gensym quote quasiquote eval parse`
//! - **[lists]**: `list first second last rest in map max min average zip length fold range`
//! - **[arrays]**: `array seta geta dela mapa`
//! - **[types]**: predicates and conversions
//! - **[console]**: `print printf`
//! - **[scopes]**: scope and group resolution
//! - **[traces]**: trace loading, stepping and the iteration combinators
//! - **[virtual_signals]**: `defsig new-trace dump-trace`
//! - **[system]**: `exit require eval-file repl slice`

use crate::error::EvalError;
use crate::eval::BuiltinFn;
use crate::value::{Operator, Symbol, Value, WList};
use std::collections::HashMap;

pub mod arithmetic;
pub mod arrays;
pub mod bitwise;
pub mod comparison;
pub mod console;
pub mod control;
pub mod functions;
pub mod lists;
pub mod scopes;
pub mod system;
pub mod traces;
pub mod types;
pub mod virtual_signals;

pub type BuiltinTable = HashMap<Operator, BuiltinFn>;

/// Assembles the full dispatch table.
pub fn build_table() -> BuiltinTable {
    let mut table = BuiltinTable::new();
    arithmetic::register(&mut table);
    bitwise::register(&mut table);
    comparison::register(&mut table);
    control::register(&mut table);
    functions::register(&mut table);
    lists::register(&mut table);
    arrays::register(&mut table);
    types::register(&mut table);
    console::register(&mut table);
    scopes::register(&mut table);
    traces::register(&mut table);
    virtual_signals::register(&mut table);
    system::register(&mut table);
    table
}

// ============================================================================
// Shared argument validation helpers
// ============================================================================

pub(crate) fn expect_arity(function: &str, args: &[Value], expected: usize) -> Result<(), EvalError> {
    if args.len() != expected {
        return Err(EvalError::arity(function, &expected.to_string(), args.len()));
    }
    Ok(())
}

pub(crate) fn expect_min_arity(
    function: &str,
    args: &[Value],
    minimum: usize,
) -> Result<(), EvalError> {
    if args.len() < minimum {
        return Err(EvalError::arity(
            function,
            &format!("at least {}", minimum),
            args.len(),
        ));
    }
    Ok(())
}

pub(crate) fn expect_arity_range(
    function: &str,
    args: &[Value],
    minimum: usize,
    maximum: usize,
) -> Result<(), EvalError> {
    if args.len() < minimum || args.len() > maximum {
        return Err(EvalError::arity(
            function,
            &format!("{}-{}", minimum, maximum),
            args.len(),
        ));
    }
    Ok(())
}

pub(crate) fn expect_int(function: &str, value: &Value) -> Result<i64, EvalError> {
    match value {
        Value::Int(n) => Ok(*n),
        other => Err(EvalError::kind_error(function, "int", other)),
    }
}

pub(crate) fn expect_string(function: &str, value: &Value) -> Result<String, EvalError> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        other => Err(EvalError::kind_error(function, "string", other)),
    }
}

pub(crate) fn expect_symbol(function: &str, value: &Value) -> Result<Symbol, EvalError> {
    match value {
        Value::Symbol(sym) => Ok(sym.clone()),
        other => Err(EvalError::kind_error(function, "symbol", other)),
    }
}

pub(crate) fn expect_list(function: &str, value: &Value) -> Result<WList, EvalError> {
    match value {
        Value::List(list) => Ok(list.clone()),
        other => Err(EvalError::kind_error(function, "list", other)),
    }
}

/// A symbol or string naming something (a trace id, a scope, a signal).
pub(crate) fn expect_name(function: &str, value: &Value) -> Result<String, EvalError> {
    match value {
        Value::Symbol(sym) => Ok(sym.name.clone()),
        Value::Str(s) => Ok(s.clone()),
        other => Err(EvalError::kind_error(function, "symbol or string", other)),
    }
}
