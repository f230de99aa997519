// ABOUTME: Integration tests for the expand, optimize and resolve passes

use wal::eval::Evaluator;
use wal::passes::{optimize, resolve};
use wal::reader::read_sexpr;
use wal::value::{Operator, Symbol, Value};
use wal::Wal;

fn res(code: &str) -> Value {
    resolve(read_sexpr(code, "test").unwrap())
}

fn sym(name: &str) -> Value {
    Value::Symbol(Symbol::new(name))
}

fn rsym(name: &str, steps: usize) -> Value {
    Value::Symbol(Symbol::with_steps(name, steps))
}

fn op(o: Operator) -> Value {
    Value::Operator(o)
}

// ============================================================================
// Resolve pass on trees
// ============================================================================

#[test]
fn test_resolve_atoms() {
    assert_eq!(res("1"), Value::Int(1));
    assert_eq!(res("-5"), Value::Int(-5));
    assert_eq!(res("1.2"), Value::Float(1.2));
    assert_eq!(res("0xff123"), Value::Int(0xff123));
}

#[test]
fn test_use_after_define() {
    assert_eq!(
        res("(do (define x 5) x)"),
        Value::list(vec![
            op(Operator::Do),
            Value::list(vec![op(Operator::Define), sym("x"), Value::Int(5)]),
            rsym("x", 0),
        ])
    );
}

#[test]
fn test_use_in_let() {
    assert_eq!(
        res("(let ([x 5] [y 2]) (+ y x))"),
        Value::list(vec![
            op(Operator::Let),
            Value::list(vec![
                Value::list(vec![sym("x"), Value::Int(5)]),
                Value::list(vec![sym("y"), Value::Int(2)]),
            ]),
            Value::list(vec![op(Operator::Add), rsym("y", 0), rsym("x", 0)]),
        ])
    );
}

#[test]
fn test_nested_let_counts_frames() {
    let resolved = res("(let ([x 5]) (let ([y 2]) (+ y x)))");
    let Value::List(outer) = &resolved else { panic!() };
    let Value::List(inner) = &outer[2] else { panic!() };
    let Value::List(add) = &inner[2] else { panic!() };
    assert_eq!(add[1], rsym("y", 0));
    assert_eq!(add[2], rsym("x", 1));
}

#[test]
fn test_use_after_let_is_unresolved() {
    let resolved = res("(do (let ([x 5]) x) x)");
    let Value::List(list) = &resolved else { panic!() };
    // inside the let: resolved; after it: not
    let Value::List(let_form) = &list[1] else { panic!() };
    assert_eq!(let_form[2], rsym("x", 0));
    assert_eq!(list[2], sym("x"));
}

#[test]
fn test_undefined_symbols_stay_symbols() {
    assert_eq!(res("x"), sym("x"));
    assert_eq!(
        res("(define x x)"),
        Value::list(vec![op(Operator::Define), sym("x"), sym("x")])
    );
}

#[test]
fn test_fn_resolution() {
    assert_eq!(
        res("(fn [x] x)"),
        Value::list(vec![
            op(Operator::Fn),
            Value::list(vec![sym("x")]),
            rsym("x", 0)
        ])
    );
    assert_eq!(
        res("(fn [x] y)"),
        Value::list(vec![op(Operator::Fn), Value::list(vec![sym("x")]), sym("y")])
    );
    let resolved = res("(fn [x] (fn [y] x))");
    let Value::List(outer) = &resolved else { panic!() };
    let Value::List(inner) = &outer[2] else { panic!() };
    assert_eq!(inner[2], rsym("x", 1));
}

#[test]
fn test_set_resolution() {
    let resolved = res("(do (define x 0) (set [x 5]))");
    let Value::List(list) = &resolved else { panic!() };
    let Value::List(set_form) = &list[2] else { panic!() };
    let Value::List(pair) = &set_form[1] else { panic!() };
    assert_eq!(pair[0], rsym("x", 0));
}

// ============================================================================
// Resolved trees evaluate correctly
// ============================================================================

#[test]
fn test_resolved_evaluation() {
    let mut w = Wal::new();
    assert_eq!(w.run_str("(do (define x 5) x)").unwrap(), Value::Int(5));
    assert_eq!(w.run_str("((fn [x] x) 5)").unwrap(), Value::Int(5));
    assert_eq!(
        w.run_str("((fn [x y] ((fn [y] y) (+ x y))) 22 33)").unwrap(),
        Value::Int(55)
    );
    assert_eq!(
        w.run_str("((fn [x y] ((fn [z] y) 0)) 22 33)").unwrap(),
        Value::Int(33)
    );
    assert_eq!(
        w.run_str("(do (define y 5) ((fn [x] y) 2))").unwrap(),
        Value::Int(5)
    );
    assert!(w.run_str("(do (let ([x 5]) x) x)").is_err());
    assert!(w.run_str("(set [q 5])").is_err());
}

// ============================================================================
// Optimize is semantics-preserving
// ============================================================================

#[test]
fn test_optimize_preserves_pure_program_results() {
    let programs = [
        "(+ 1 2 3)",
        "(+ \"a\" \"b\" \"c\")",
        "(* 2 3 4)",
        "(* 7 0)",
        "(if 1 (+ 2 3) 9)",
        "(if 0 1 (* 3 3))",
        "(do (+ 1 1))",
        "(do 1 2 3)",
        "(if (> 2 1) (do 5) 6)",
        "(let ([a (+ 1 2)]) (* a a))",
        "(first '(1 2 3))",
        "(length (range 4))",
        "(slice 0b1100 3 2)",
    ];
    for program in programs {
        let expr = read_sexpr(program, "test").unwrap();

        let mut plain = Evaluator::new();
        let raw = plain.eval(&resolve(expr.clone())).unwrap();

        let mut opt = Evaluator::new();
        let optimized = opt.eval(&resolve(optimize(expr))).unwrap();

        assert_eq!(raw, optimized, "program: {}", program);
    }
}

// ============================================================================
// Expansion happens before evaluation
// ============================================================================

#[test]
fn test_macros_expand_during_toplevel_eval() {
    let mut w = Wal::new();
    w.eval_str("(defmacro swap-args [f a b] `(,f ,b ,a))").unwrap();
    assert_eq!(w.eval_str("(swap-args - 10 2)").unwrap(), Value::Int(-8));
}

#[test]
fn test_macro_chain() {
    let mut w = Wal::new();
    w.eval_str("(defmacro inner [a] `(+ ,a 1))").unwrap();
    w.eval_str("(defmacro outer [a] `(inner ,a))").unwrap();
    assert_eq!(w.eval_str("(outer 41)").unwrap(), Value::Int(42));
}

#[test]
fn test_nonterminating_macro_reports_error() {
    let mut w = Wal::new();
    w.eval_str("(defmacro loopy [] '(loopy))").unwrap();
    assert!(w.eval_str("(loopy)").is_err());
}
