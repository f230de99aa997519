// ABOUTME: Expression passes run before evaluation: expand, optimize, resolve

use crate::error::EvalError;
use crate::eval::{Evaluator, MAX_EXPANSION_DEPTH};
use crate::value::{Operator, Symbol, Value, WList};
use std::collections::HashSet;

/// Macro expansion pass. Forms whose head symbol is bound to a macro are
/// replaced by the result of running the macro body against the
/// unevaluated arguments; expansion recurses on the result. `quote` and
/// `quasiquote` stop descent.
pub fn expand(ev: &mut Evaluator, mut expr: Value) -> Result<Value, EvalError> {
    // expand the head position iteratively; a macro expanding into
    // another macro call keeps replacing in place
    loop {
        let Value::List(list) = &expr else {
            return Ok(expr);
        };
        if list.is_empty() {
            return Ok(expr);
        }
        if matches!(
            list[0],
            Value::Operator(Operator::Quote) | Value::Operator(Operator::Quasiquote)
        ) {
            return Ok(expr);
        }

        let mac = match &list[0] {
            Value::Symbol(head) => match ev.env.is_defined(&head.name) {
                Some(frame) => match frame.read(&head.name) {
                    Ok(Value::Macro(mac)) => Some(mac),
                    _ => None,
                },
                None => None,
            },
            _ => None,
        };
        let Some(mac) = mac else { break };

        // cumulative budget per top-level form, reset by the caller
        ev.expansion_depth += 1;
        if ev.expansion_depth > MAX_EXPANSION_DEPTH {
            return Err(EvalError::runtime(
                &mac.name,
                "macro expansion too deep, possibly a non-terminating macro",
            ));
        }
        let span = expr.span();
        let Value::List(list) = &expr else { unreachable!() };
        let expanded = ev.expand_macro_call(&mac, &list[1..])?;
        // the replacement inherits the call site location
        expr = match expanded {
            Value::List(mut l) => {
                if l.span.is_none() {
                    l.span = span;
                }
                Value::List(l)
            }
            other => other,
        };
    }

    let Value::List(list) = expr else {
        return Ok(expr);
    };
    let span = list.span.clone();
    let items = list
        .items
        .into_iter()
        .map(|item| expand(ev, item))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::List(WList::with_span(items, span)))
}

/// Truth value of a literal, or None for anything that is not a literal.
fn literal_truth(value: &Value) -> Option<bool> {
    match value {
        Value::Int(n) => Some(*n != 0),
        Value::Float(f) => Some(*f != 0.0),
        Value::Str(s) => Some(!s.is_empty()),
        Value::Bool(b) => Some(*b),
        _ => None,
    }
}

fn optimize_children(list: WList) -> WList {
    let span = list.span.clone();
    let items = list.items.into_iter().map(optimize).collect();
    WList::with_span(items, span)
}

/// Sum of numeric literals; None when any argument is not numeric or an
/// integer fold would overflow.
fn fold_sum(args: &[Value]) -> Option<Value> {
    let mut int_sum: i64 = 0;
    let mut float_sum = 0.0;
    let mut saw_float = false;
    for arg in args {
        match arg {
            Value::Int(n) => int_sum = int_sum.checked_add(*n)?,
            Value::Float(f) => {
                saw_float = true;
                float_sum += f;
            }
            _ => return None,
        }
    }
    if saw_float {
        Some(Value::Float(float_sum + int_sum as f64))
    } else {
        Some(Value::Int(int_sum))
    }
}

fn fold_product(args: &[Value]) -> Option<Value> {
    let mut int_product: i64 = 1;
    let mut float_product = 1.0;
    let mut saw_float = false;
    for arg in args {
        match arg {
            Value::Int(n) => int_product = int_product.checked_mul(*n)?,
            Value::Float(f) => {
                saw_float = true;
                float_product *= f;
            }
            _ => return None,
        }
    }
    if saw_float {
        Some(Value::Float(float_product * int_product as f64))
    } else {
        Some(Value::Int(int_product))
    }
}

/// Optimization pass: pure rewrites that cannot change observable
/// behavior. Applied recursively; `quote` and `quasiquote` are left
/// alone.
pub fn optimize(expr: Value) -> Value {
    let Value::List(list) = expr else {
        return expr;
    };
    if list.is_empty() {
        return Value::List(list);
    }
    let op = match &list[0] {
        Value::Operator(op) => Some(*op),
        _ => None,
    };
    match op {
        Some(Operator::Quote) | Some(Operator::Quasiquote) => Value::List(list),

        // a literal condition picks its branch at compile time
        Some(Operator::If) => {
            let list = optimize_children(list);
            if list.len() >= 3 {
                if let Some(truthy) = literal_truth(&list[1]) {
                    if truthy {
                        return list[2].clone();
                    }
                    if list.len() > 3 {
                        return list[3].clone();
                    }
                }
            }
            Value::List(list)
        }

        // (do x) => x
        Some(Operator::Do) => {
            let mut list = optimize_children(list);
            if list.len() == 2 {
                return list.items.remove(1);
            }
            Value::List(list)
        }

        Some(Operator::Add) => {
            let list = optimize_children(list);
            if let Some(folded) = fold_sum(&list[1..]) {
                return folded;
            }
            if !list[1..].is_empty() && list[1..].iter().all(|a| matches!(a, Value::Str(_))) {
                let joined: String = list[1..]
                    .iter()
                    .map(|a| match a {
                        Value::Str(s) => s.as_str(),
                        _ => unreachable!(),
                    })
                    .collect();
                return Value::Str(joined);
            }
            Value::List(list)
        }

        Some(Operator::Mul) => {
            let list = optimize_children(list);
            if list[1..]
                .iter()
                .any(|a| matches!(a, Value::Int(0)) || matches!(a, Value::Float(f) if *f == 0.0))
            {
                return Value::Int(0);
            }
            if !list[1..].is_empty() {
                if let Some(folded) = fold_product(&list[1..]) {
                    return folded;
                }
            }
            Value::List(list)
        }

        Some(Operator::And) => {
            let mut list = optimize_children(list);
            if list.len() == 2 {
                return list.items.remove(1);
            }
            let truths: Vec<Option<bool>> = list[1..].iter().map(literal_truth).collect();
            if truths.iter().any(|t| *t == Some(false)) {
                return Value::Bool(false);
            }
            if !truths.is_empty() && truths.iter().all(|t| *t == Some(true)) {
                return Value::Bool(true);
            }
            Value::List(list)
        }

        Some(Operator::Or) => {
            let mut list = optimize_children(list);
            if list.len() == 2 {
                return list.items.remove(1);
            }
            let truths: Vec<Option<bool>> = list[1..].iter().map(literal_truth).collect();
            if truths.iter().any(|t| *t == Some(true)) {
                return Value::Bool(true);
            }
            if !truths.is_empty() && truths.iter().all(|t| *t == Some(false)) {
                return Value::Bool(false);
            }
            Value::List(list)
        }

        _ => Value::List(optimize_children(list)),
    }
}

/// Resolve pass: annotates locally bound symbols with the number of
/// lexical frames between use and binding. Unknown names stay
/// unresolved; they may be signals or late-bound globals.
pub fn resolve(expr: Value) -> Value {
    resolve_with(expr, &HashSet::new())
}

pub fn resolve_with(expr: Value, start: &HashSet<String>) -> Value {
    let mut scopes: Vec<HashSet<String>> = vec![start.clone()];
    resolve_vars(expr, &mut scopes)
}

fn resolve_vars(expr: Value, scopes: &mut Vec<HashSet<String>>) -> Value {
    match expr {
        Value::List(list) if !list.is_empty() => {
            let op = match &list[0] {
                Value::Operator(op) => Some(*op),
                _ => None,
            };
            match op {
                // the body is resolved before the name becomes visible,
                // so (define x x) leaves the inner x unresolved
                Some(Operator::Define)
                    if list.len() == 3 && matches!(list[1], Value::Symbol(_)) =>
                {
                    let span = list.span.clone();
                    let mut items = list.items.into_iter();
                    let head = items.next().expect("checked length");
                    let name = items.next().expect("checked length");
                    let body = resolve_vars(items.next().expect("checked length"), scopes);
                    if let Value::Symbol(sym) = &name {
                        if let Some(top) = scopes.last_mut() {
                            top.insert(sym.name.clone());
                        }
                    }
                    Value::List(WList::with_span(vec![head, name, body], span))
                }

                // binding names open a fresh scope over the body only;
                // the binding expressions are left untouched
                Some(Operator::Let) if list.len() >= 2 && matches!(list[1], Value::List(_)) => {
                    let mut frame = HashSet::new();
                    if let Value::List(bindings) = &list[1] {
                        for binding in bindings.iter() {
                            if let Value::List(pair) = binding {
                                if let Some(Value::Symbol(sym)) = pair.first() {
                                    frame.insert(sym.name.clone());
                                }
                            }
                        }
                    }
                    scopes.push(frame);
                    let span = list.span.clone();
                    let mut items = list.items.into_iter();
                    let head = items.next().expect("checked length");
                    let bindings = items.next().expect("checked length");
                    let mut out = vec![head, bindings];
                    for sub in items {
                        out.push(resolve_vars(sub, scopes));
                    }
                    scopes.pop();
                    Value::List(WList::with_span(out, span))
                }

                Some(Operator::Fn) if list.len() >= 2 => {
                    let mut frame = HashSet::new();
                    match &list[1] {
                        Value::List(params) => {
                            for param in params.iter() {
                                if let Value::Symbol(sym) = param {
                                    frame.insert(sym.name.clone());
                                }
                            }
                        }
                        Value::Symbol(sym) => {
                            frame.insert(sym.name.clone());
                        }
                        _ => {}
                    }
                    scopes.push(frame);
                    let span = list.span.clone();
                    let mut items = list.items.into_iter();
                    let head = items.next().expect("checked length");
                    let params = items.next().expect("checked length");
                    let mut out = vec![head, params];
                    for sub in items {
                        out.push(resolve_vars(sub, scopes));
                    }
                    scopes.pop();
                    Value::List(WList::with_span(out, span))
                }

                Some(Operator::Defmacro) => {
                    if let Some(Value::Symbol(sym)) = list.get(1) {
                        if let Some(top) = scopes.last_mut() {
                            top.insert(sym.name.clone());
                        }
                    }
                    Value::List(list)
                }

                Some(Operator::Quote) | Some(Operator::Quasiquote) | Some(Operator::Alias) => {
                    Value::List(list)
                }

                _ => {
                    let span = list.span.clone();
                    let items = list
                        .items
                        .into_iter()
                        .map(|item| resolve_vars(item, scopes))
                        .collect();
                    Value::List(WList::with_span(items, span))
                }
            }
        }
        Value::Symbol(sym) => {
            for (steps, frame) in scopes.iter().rev().enumerate() {
                if frame.contains(&sym.name) {
                    return Value::Symbol(Symbol {
                        name: sym.name,
                        steps: Some(steps),
                        span: sym.span,
                    });
                }
            }
            Value::Symbol(sym)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_sexpr;

    fn opt(code: &str) -> Value {
        optimize(read_sexpr(code, "test").unwrap())
    }

    fn res(code: &str) -> Value {
        resolve(read_sexpr(code, "test").unwrap())
    }

    #[test]
    fn test_optimize_if_literal_condition() {
        assert_eq!(opt("(if 1 2 3)"), Value::Int(2));
        assert_eq!(opt("(if 0 2 3)"), Value::Int(3));
        assert_eq!(opt("(if \"\" 2 3)"), Value::Int(3));
        // falsy condition with no else keeps the form
        assert!(matches!(opt("(if 0 2)"), Value::List(_)));
        // non-literal condition keeps the form
        assert!(matches!(opt("(if x 2 3)"), Value::List(_)));
    }

    #[test]
    fn test_optimize_do() {
        assert_eq!(opt("(do 5)"), Value::Int(5));
        assert!(matches!(opt("(do 1 2)"), Value::List(_)));
        // recursion reaches nested forms
        assert_eq!(opt("(do (if 1 7 8))"), Value::Int(7));
    }

    #[test]
    fn test_optimize_add() {
        assert_eq!(opt("(+ 1 2 3)"), Value::Int(6));
        assert_eq!(opt("(+ 1.5 2)"), Value::Float(3.5));
        assert_eq!(opt("(+ \"a\" \"b\")"), Value::string("ab"));
        assert!(matches!(opt("(+ 1 x)"), Value::List(_)));
    }

    #[test]
    fn test_optimize_mul() {
        assert_eq!(opt("(* 2 3 4)"), Value::Int(24));
        assert_eq!(opt("(* x 0)"), Value::Int(0));
        assert!(matches!(opt("(* 2 x)"), Value::List(_)));
    }

    #[test]
    fn test_optimize_logic() {
        assert_eq!(opt("(&& x)"), Value::symbol("x"));
        assert_eq!(opt("(&& 1 0 x)"), Value::Bool(false));
        assert_eq!(opt("(&& 1 2 3)"), Value::Bool(true));
        assert!(matches!(opt("(&& 1 x)"), Value::List(_)));

        assert_eq!(opt("(|| x)"), Value::symbol("x"));
        assert_eq!(opt("(|| 0 1 x)"), Value::Bool(true));
        assert_eq!(opt("(|| 0 0)"), Value::Bool(false));
        assert!(matches!(opt("(|| 0 x)"), Value::List(_)));
    }

    #[test]
    fn test_optimize_leaves_quote_alone() {
        let quoted = opt("'(+ 1 2)");
        let Value::List(list) = &quoted else { panic!() };
        assert_eq!(list[0], Value::Operator(Operator::Quote));
        assert!(matches!(&list[1], Value::List(_)));
    }

    #[test]
    fn test_resolve_define_then_use() {
        let resolved = res("(do (define x 5) x)");
        let Value::List(list) = &resolved else { panic!() };
        let Value::Symbol(sym) = &list[2] else { panic!() };
        assert_eq!(sym.steps, Some(0));
    }

    #[test]
    fn test_resolve_define_body_unresolved() {
        let resolved = res("(define x x)");
        let Value::List(list) = &resolved else { panic!() };
        let Value::Symbol(sym) = &list[2] else { panic!() };
        assert_eq!(sym.steps, None);
    }

    #[test]
    fn test_resolve_let() {
        let resolved = res("(let ([x 5]) (let ([y 2]) (+ y x)))");
        let Value::List(outer) = &resolved else { panic!() };
        let Value::List(inner) = &outer[2] else { panic!() };
        let Value::List(add) = &inner[2] else { panic!() };
        let Value::Symbol(y) = &add[1] else { panic!() };
        let Value::Symbol(x) = &add[2] else { panic!() };
        assert_eq!(y.steps, Some(0));
        assert_eq!(x.steps, Some(1));
    }

    #[test]
    fn test_resolve_fn_params() {
        let resolved = res("(fn [x y] (fn [y] y))");
        let Value::List(outer) = &resolved else { panic!() };
        let Value::List(inner) = &outer[2] else { panic!() };
        let Value::Symbol(y) = &inner[2] else { panic!() };
        assert_eq!(y.steps, Some(0));

        let resolved = res("(fn [x y] (fn [z] y))");
        let Value::List(outer) = &resolved else { panic!() };
        let Value::List(inner) = &outer[2] else { panic!() };
        let Value::Symbol(y) = &inner[2] else { panic!() };
        assert_eq!(y.steps, Some(1));
    }

    #[test]
    fn test_resolve_unknown_symbol_stays_unresolved() {
        let Value::Symbol(sym) = res("some.signal") else { panic!() };
        assert_eq!(sym.steps, None);
    }

    #[test]
    fn test_resolve_skips_quote() {
        let resolved = res("(do (define x 1) '(x))");
        let Value::List(list) = &resolved else { panic!() };
        let Value::List(quoted) = &list[2] else { panic!() };
        let Value::List(inner) = &quoted[1] else { panic!() };
        let Value::Symbol(sym) = &inner[0] else { panic!() };
        assert_eq!(sym.steps, None);
    }

    #[test]
    fn test_expand_simple_macro() {
        let mut ev = Evaluator::new();
        ev.eval_source("(defmacro twice [e] `(+ ,e ,e))", "test").unwrap();
        let expr = read_sexpr("(twice 4)", "test").unwrap();
        let expanded = expand(&mut ev, expr).unwrap();
        assert_eq!(
            expanded,
            Value::list(vec![
                Value::Operator(Operator::Add),
                Value::Int(4),
                Value::Int(4)
            ])
        );
    }

    #[test]
    fn test_expand_variadic_macro() {
        let mut ev = Evaluator::new();
        ev.eval_source("(defmacro firstarg es `(quote ,(first es)))", "test")
            .unwrap();
        let expr = read_sexpr("(firstarg a b c)", "test").unwrap();
        let expanded = expand(&mut ev, expr).unwrap();
        assert_eq!(
            expanded,
            Value::list(vec![Value::Operator(Operator::Quote), Value::symbol("a")])
        );
    }

    #[test]
    fn test_expand_stops_at_quote() {
        let mut ev = Evaluator::new();
        ev.eval_source("(defmacro zero [] 0)", "test").unwrap();
        let expr = read_sexpr("'(zero)", "test").unwrap();
        let expanded = expand(&mut ev, expr.clone()).unwrap();
        assert_eq!(expanded, expr);
    }

    #[test]
    fn test_nonterminating_macro_is_caught() {
        let mut ev = Evaluator::new();
        ev.eval_source("(defmacro loopy [] '(loopy))", "test").unwrap();
        let expr = read_sexpr("(loopy)", "test").unwrap();
        assert!(expand(&mut ev, expr).is_err());
    }
}
