//! Functions and macros: fn, defmacro, macroexpand, gensym, quote,
//! quasiquote, eval, parse
//!
//! A parameter list of symbols gives fixed arity; a bare symbol collects
//! all arguments (variadic). Multiple body forms are wrapped in an
//! implicit `do`.

use crate::builtins::{expect_arity, expect_arity_range, expect_min_arity, expect_string, expect_symbol, BuiltinTable};
use crate::error::EvalError;
use crate::eval::Evaluator;
use crate::value::{Closure, MacroDef, Operator, Params, Symbol, Value};
use std::cell::RefCell;
use std::rc::Rc;

fn read_params(function: &str, spec: &Value) -> Result<Params, EvalError> {
    match spec {
        Value::Symbol(sym) => Ok(Params::Variadic(sym.clone())),
        Value::List(params) => {
            let mut symbols = Vec::with_capacity(params.len());
            for param in params.iter() {
                symbols.push(expect_symbol(function, param)?);
            }
            Ok(Params::Fixed(symbols))
        }
        other => Err(EvalError::kind_error(
            function,
            "parameter list or symbol",
            other,
        )),
    }
}

fn read_body(body: &[Value]) -> Value {
    if body.len() == 1 {
        body[0].clone()
    } else {
        let mut items = vec![Value::Operator(Operator::Do)];
        items.extend(body.iter().cloned());
        Value::list(items)
    }
}

pub fn builtin_fn(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_min_arity("fn", args, 2)?;
    let params = read_params("fn", &args[0])?;
    Ok(Value::Closure(Rc::new(Closure {
        name: RefCell::new("lambda".to_string()),
        env: ev.env.clone(),
        params,
        body: read_body(&args[1..]),
    })))
}

pub fn builtin_defmacro(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_min_arity("defmacro", args, 3)?;
    let name = expect_symbol("defmacro", &args[0])?;
    let params = read_params("defmacro", &args[1])?;
    let mac = Value::Macro(Rc::new(MacroDef {
        name: name.name.clone(),
        params,
        body: read_body(&args[2..]),
    }));
    ev.env
        .define(&name.name, mac)
        .map_err(|e| e.with_span(name.span.clone()))?;
    Ok(Value::Unit)
}

/// Expands macros in an expression without evaluating the result.
pub fn builtin_macroexpand(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("macroexpand", args, 1)?;
    let form = ev.eval(&args[0])?;
    crate::passes::expand(ev, form)
}

/// Fresh symbols for macro hygiene.
pub fn builtin_gensym(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity_range("gensym", args, 0, 1)?;
    let prefix = if args.is_empty() {
        "gensym".to_string()
    } else {
        expect_string("gensym", &ev.eval(&args[0])?)?
    };
    ev.gensym_counter += 1;
    Ok(Value::Symbol(Symbol::new(format!(
        "{}-{}",
        prefix, ev.gensym_counter
    ))))
}

pub fn builtin_quote(_ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("quote", args, 1)?;
    Ok(args[0].clone())
}

pub fn builtin_quasiquote(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("quasiquote", args, 1)?;
    ev.eval_quasiquote(&args[0])
}

pub fn builtin_unquote(_ev: &mut Evaluator, _args: &[Value]) -> Result<Value, EvalError> {
    Err(EvalError::runtime("unquote", "unquote outside of quasiquote"))
}

pub fn builtin_unquote_splice(_ev: &mut Evaluator, _args: &[Value]) -> Result<Value, EvalError> {
    Err(EvalError::runtime(
        "unquote-splice",
        "unquote-splice outside of quasiquote",
    ))
}

/// Evaluates the value of its argument: `(eval '(+ 1 2))` is 3.
pub fn builtin_eval(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("eval", args, 1)?;
    let form = ev.eval(&args[0])?;
    ev.eval(&form)
}

/// Reads a string into an expression without evaluating it.
pub fn builtin_parse(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("parse", args, 1)?;
    let text = expect_string("parse", &ev.eval(&args[0])?)?;
    crate::reader::read_sexpr(&text, "<parse>")
        .map_err(|e| EvalError::runtime("parse", e.to_string()))
}

pub fn register(table: &mut BuiltinTable) {
    table.insert(Operator::Fn, builtin_fn as crate::eval::BuiltinFn);
    table.insert(Operator::Defmacro, builtin_defmacro);
    table.insert(Operator::Macroexpand, builtin_macroexpand);
    table.insert(Operator::Gensym, builtin_gensym);
    table.insert(Operator::Quote, builtin_quote);
    table.insert(Operator::Quasiquote, builtin_quasiquote);
    table.insert(Operator::Unquote, builtin_unquote);
    table.insert(Operator::UnquoteSplice, builtin_unquote_splice);
    table.insert(Operator::Eval, builtin_eval);
    table.insert(Operator::Parse, builtin_parse);
}
