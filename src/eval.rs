// ABOUTME: Evaluator executing WAL expression trees against loaded traces

use crate::builtins::{self, BuiltinTable};
use crate::env::Environment;
use crate::error::{ErrorKind, EvalError};
use crate::trace::{SignalRead, TraceContainer};
use crate::value::{Closure, MacroDef, Operator, Params, Symbol, Value, WList};
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

/// Bound on recursive macro expansion; a macro that expands into itself
/// forever hits this instead of blowing the stack.
pub const MAX_EXPANSION_DEPTH: usize = 10_000;

pub type BuiltinFn = fn(&mut Evaluator, &[Value]) -> Result<Value, EvalError>;
pub type UserOpFn = Rc<dyn Fn(&mut Evaluator, &[Value]) -> Result<Value, EvalError>>;

/// The tree-walking evaluator. Owns the trace container, the environment
/// chain and all per-session state (aliases, scope, group, counters).
pub struct Evaluator {
    pub traces: TraceContainer,
    pub global: Rc<Environment>,
    pub env: Rc<Environment>,
    pub aliases: HashMap<String, String>,
    pub scope: String,
    pub group: String,
    pub gensym_counter: u64,
    pub expansion_depth: usize,
    pub library_paths: Vec<PathBuf>,
    dispatch: BuiltinTable,
    user_dispatch: HashMap<String, UserOpFn>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        let global = Environment::new();
        let mut evaluator = Evaluator {
            traces: TraceContainer::new(),
            global: global.clone(),
            env: global,
            aliases: HashMap::new(),
            scope: String::new(),
            group: String::new(),
            gensym_counter: 0,
            expansion_depth: 0,
            library_paths: Vec::new(),
            dispatch: builtins::build_table(),
            user_dispatch: HashMap::new(),
        };
        evaluator.init_globals();
        evaluator
    }

    fn init_globals(&mut self) {
        // a fresh frame cannot hold these names yet
        self.global
            .define("CS", Value::string(""))
            .expect("fresh global environment");
        self.global
            .define("CG", Value::string(""))
            .expect("fresh global environment");
        self.global
            .define("args", Value::list(vec![]))
            .expect("fresh global environment");
    }

    /// Returns the evaluator to a clean slate: fresh environments, no
    /// aliases, macros or virtual signals, scope and group unset, every
    /// loaded trace back at index 0. Registered user operators and
    /// library paths survive.
    pub fn reset(&mut self) {
        self.traces.reset();
        let global = Environment::new();
        self.global = global.clone();
        self.env = global;
        self.aliases.clear();
        self.scope.clear();
        self.group.clear();
        self.gensym_counter = 0;
        self.expansion_depth = 0;
        self.init_globals();
    }

    /// Registers a host operator callable from WAL programs. Built-in
    /// operator names cannot be taken over.
    pub fn register_operator(
        &mut self,
        name: &str,
        f: impl Fn(&mut Evaluator, &[Value]) -> Result<Value, EvalError> + 'static,
    ) -> Result<(), EvalError> {
        if Operator::from_name(name).is_some() {
            return Err(EvalError::runtime(
                "register-operator",
                format!("redefining {} is not allowed", name),
            ));
        }
        self.user_dispatch.insert(name.to_string(), Rc::new(f));
        Ok(())
    }

    pub fn has_user_operator(&self, name: &str) -> bool {
        self.user_dispatch.contains_key(name)
    }

    /// Updates the current scope and its `CS` mirror binding.
    pub fn set_scope(&mut self, scope: String) -> Result<(), EvalError> {
        self.scope = scope.clone();
        self.global.write("CS", Value::Str(scope))
    }

    /// Updates the current group and its `CG` mirror binding.
    pub fn set_group(&mut self, group: String) -> Result<(), EvalError> {
        self.group = group.clone();
        self.global.write("CG", Value::Str(group))
    }

    pub fn eval_args(&mut self, args: &[Value]) -> Result<Vec<Value>, EvalError> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            out.push(self.eval(arg)?);
        }
        Ok(out)
    }

    /// Main eval dispatch on the expression's runtime kind.
    pub fn eval(&mut self, expr: &Value) -> Result<Value, EvalError> {
        match expr {
            Value::Symbol(sym) => self.eval_symbol(sym),
            Value::List(list) => self.eval_list(list),
            Value::Unquote(_) | Value::UnquoteSplice(_) => Err(EvalError::runtime(
                "unquote",
                "unquote outside of quasiquote",
            )),
            // everything else is self-evaluating
            _ => Ok(expr.clone()),
        }
    }

    /// Reads a signal, computing and caching virtual signals per
    /// timestamp.
    pub fn signal_value(&mut self, name: &str) -> Result<Value, EvalError> {
        let scope = self.scope.clone();
        match self.traces.signal_value(name, 0, &scope)? {
            SignalRead::Value(v) => Ok(v),
            SignalRead::Virtual(vs, ts) => {
                if let Some(hit) = vs.cache.borrow().get(&ts) {
                    return Ok(hit.clone());
                }
                let mut result = Value::Unit;
                for expr in &vs.exprs {
                    result = self.eval(expr)?;
                }
                vs.cache.borrow_mut().insert(ts, result.clone());
                Ok(result)
            }
        }
    }

    fn eval_symbol(&mut self, sym: &Symbol) -> Result<Value, EvalError> {
        // aliases rewrite the looked-up name, nothing else
        if let Some(target) = self.aliases.get(&sym.name).cloned() {
            if self.traces.contains(&target) {
                return self.signal_value(&target);
            }
            return self
                .env
                .read(&target)
                .map_err(|e| e.with_span(sym.span.clone()));
        }

        if let Some(steps) = sym.steps {
            let mut env = self.env.clone();
            for _ in 0..steps {
                env = match env.parent() {
                    Some(parent) => parent.clone(),
                    None => break,
                };
            }
            return env
                .read(&sym.name)
                .map_err(|e| e.with_span(sym.span.clone()));
        }

        if self.traces.contains(&sym.name) {
            return self.signal_value(&sym.name);
        }
        match self.env.read(&sym.name) {
            Ok(value) => Ok(value),
            // registered host operators are first-class values
            Err(_) if self.user_dispatch.contains_key(&sym.name) => {
                Ok(Value::UserOp(sym.name.clone()))
            }
            Err(e) => Err(e.with_span(sym.span.clone())),
        }
    }

    fn eval_list(&mut self, list: &WList) -> Result<Value, EvalError> {
        if list.is_empty() {
            return Ok(Value::List(list.clone()));
        }
        let head = &list[0];
        let tail = &list[1..];
        let result = match head {
            Value::Operator(op) => self.eval_dispatch(*op, tail),
            Value::Closure(closure) => self.eval_closure(closure, tail),
            Value::Macro(mac) => {
                let mac = mac.clone();
                self.expansion_depth += 1;
                let result = if self.expansion_depth > MAX_EXPANSION_DEPTH {
                    Err(EvalError::runtime(
                        &mac.name,
                        "macro expansion too deep, possibly a non-terminating macro",
                    ))
                } else {
                    match self.expand_macro_call(&mac, tail) {
                        Ok(expanded) => self.eval(&expanded),
                        Err(e) => Err(e),
                    }
                };
                self.expansion_depth -= 1;
                result
            }
            Value::UserOp(name) => {
                let name = name.clone();
                self.call_user_op(&name, tail)
            }
            Value::Symbol(sym) if self.user_dispatch.contains_key(&sym.name) => {
                let name = sym.name.clone();
                self.call_user_op(&name, tail)
            }
            Value::Int(_) | Value::Str(_) => Err(EvalError::new(ErrorKind::NotCallable(
                format!("{}", Value::List(list.clone())),
            ))),
            _ => {
                let func = self.eval(head)?;
                let mut items = Vec::with_capacity(list.len());
                items.push(func);
                items.extend(tail.iter().cloned());
                self.eval_list(&WList::new(items))
            }
        };
        result.map_err(|e| e.with_span(list.span.clone()))
    }

    pub fn eval_dispatch(&mut self, op: Operator, args: &[Value]) -> Result<Value, EvalError> {
        let f = self
            .dispatch
            .get(&op)
            .copied()
            .ok_or_else(|| EvalError::runtime(op.name(), "not implemented"))?;
        f(self, args)
    }

    fn call_user_op(&mut self, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        let f = self
            .user_dispatch
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::new(ErrorKind::UndefinedSymbol(name.to_string())))?;
        f(self, args)
    }

    /// Applies a closure to unevaluated argument forms: the forms are
    /// evaluated in the caller's environment first.
    pub fn eval_closure(
        &mut self,
        closure: &Rc<Closure>,
        args: &[Value],
    ) -> Result<Value, EvalError> {
        let values = self.eval_args(args)?;
        self.apply_closure(closure, values)
    }

    /// Applies a closure to already-evaluated values. The body runs in a
    /// fresh frame whose parent is the captured environment; the caller's
    /// environment is restored on every exit path.
    pub fn apply_closure(
        &mut self,
        closure: &Rc<Closure>,
        values: Vec<Value>,
    ) -> Result<Value, EvalError> {
        let frame = Environment::with_parent(closure.env.clone());
        match &closure.params {
            Params::Variadic(sym) => frame.define(&sym.name, Value::list(values))?,
            Params::Fixed(params) => {
                if params.len() != values.len() {
                    return Err(EvalError::arity(
                        &closure.name.borrow(),
                        &params.len().to_string(),
                        values.len(),
                    ));
                }
                for (param, value) in params.iter().zip(values) {
                    frame.define(&param.name, value)?;
                }
            }
        }
        let saved = std::mem::replace(&mut self.env, frame);
        let result = self.eval(&closure.body);
        self.env = saved;
        result.map_err(|mut e| {
            e.push_frame(closure.name.borrow().clone());
            e
        })
    }

    /// Runs a macro body against its unevaluated arguments, producing the
    /// replacement expression. Callers track `expansion_depth` around the
    /// whole replacement chain; this only does one step.
    pub fn expand_macro_call(
        &mut self,
        mac: &Rc<MacroDef>,
        args: &[Value],
    ) -> Result<Value, EvalError> {
        let frame = Environment::with_parent(self.global.clone());
        match &mac.params {
            Params::Variadic(sym) => frame.define(&sym.name, Value::list(args.to_vec()))?,
            Params::Fixed(params) => {
                if params.len() != args.len() {
                    return Err(EvalError::arity(
                        &mac.name,
                        &params.len().to_string(),
                        args.len(),
                    ));
                }
                for (param, arg) in params.iter().zip(args) {
                    frame.define(&param.name, arg.clone())?;
                }
            }
        }

        let saved = std::mem::replace(&mut self.env, frame);
        let result = self.eval(&mac.body);
        self.env = saved;
        result.map_err(|mut e| {
            e.push_frame(mac.name.clone());
            e
        })
    }

    /// Applies any callable (closure, operator, user operator) to
    /// already-evaluated values. Used by `map`, `fold` and friends.
    pub fn apply(&mut self, f: &Value, values: Vec<Value>) -> Result<Value, EvalError> {
        match f {
            Value::Closure(closure) => self.apply_closure(closure, values),
            Value::Operator(op) => {
                let quoted = quote_values(values);
                self.eval_dispatch(*op, &quoted)
            }
            Value::UserOp(name) => {
                let name = name.clone();
                let quoted = quote_values(values);
                self.call_user_op(&name, &quoted)
            }
            other => Err(EvalError::new(ErrorKind::NotCallable(format!("{}", other)))),
        }
    }

    /// Quasiquote walker: `unquote` nodes evaluate, `unquote-splice`
    /// nodes evaluate to a list spliced in place, nested quasiquotes are
    /// left untouched.
    pub fn eval_quasiquote(&mut self, expr: &Value) -> Result<Value, EvalError> {
        match expr {
            Value::Unquote(inner) => self.eval(inner),
            Value::List(list) => {
                if !list.is_empty() {
                    if let Value::Operator(Operator::Quasiquote) = list[0] {
                        return Ok(expr.clone());
                    }
                    if list.len() == 2 {
                        if let Value::Operator(Operator::Unquote) = list[0] {
                            return self.eval(&list[1]);
                        }
                    }
                }
                let mut out = Vec::with_capacity(list.len());
                for item in list.iter() {
                    match item {
                        Value::UnquoteSplice(inner) => self.splice_into(inner, &mut out)?,
                        Value::List(l)
                            if l.len() == 2
                                && matches!(
                                    l[0],
                                    Value::Operator(Operator::UnquoteSplice)
                                ) =>
                        {
                            self.splice_into(&l[1], &mut out)?
                        }
                        _ => out.push(self.eval_quasiquote(item)?),
                    }
                }
                Ok(Value::List(WList::with_span(out, list.span.clone())))
            }
            _ => Ok(expr.clone()),
        }
    }

    fn splice_into(&mut self, expr: &Value, out: &mut Vec<Value>) -> Result<(), EvalError> {
        match self.eval(expr)? {
            Value::List(items) => {
                out.extend(items.items);
                Ok(())
            }
            other => Err(EvalError::kind_error("unquote-splice", "list", &other)),
        }
    }

    /// Reads, expands, optimizes, resolves and evaluates a whole source
    /// text, returning the last top-level value.
    pub fn eval_source(&mut self, code: &str, file: &str) -> Result<Value, EvalError> {
        let exprs = crate::reader::read_sexprs(code, file)
            .map_err(|e| EvalError::runtime("parse", e.to_string()))?;
        let mut result = Value::Unit;
        for expr in exprs {
            result = self.eval_toplevel(&expr)?;
        }
        Ok(result)
    }

    /// Runs one expression through all passes and evaluates it.
    pub fn eval_toplevel(&mut self, expr: &Value) -> Result<Value, EvalError> {
        self.expansion_depth = 0;
        let expanded = crate::passes::expand(self, expr.clone())?;
        let optimized = crate::passes::optimize(expanded);
        let resolved = crate::passes::resolve(optimized);
        self.eval(&resolved)
    }
}

fn quote_values(values: Vec<Value>) -> Vec<Value> {
    values
        .into_iter()
        .map(|v| Value::list(vec![Value::Operator(Operator::Quote), v]))
        .collect()
}
