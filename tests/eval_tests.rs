// ABOUTME: Integration tests for evaluator and built-in operator semantics

use wal::error::{ErrorKind, WalError};
use wal::{Value, Wal};

fn setup() -> Wal {
    let mut wal = Wal::new();
    wal.eval_str("(define x 5)").unwrap();
    wal.eval_str("(define y 10)").unwrap();
    wal.eval_str("(define z 0)").unwrap();
    wal
}

fn check(wal: &mut Wal, code: &str, expected: Value) {
    assert_eq!(wal.eval_str(code).unwrap(), expected, "program: {}", code);
}

fn check_error(wal: &mut Wal, code: &str) {
    assert!(wal.eval_str(code).is_err(), "expected an error: {}", code);
}

// ============================================================================
// Arithmetic
// ============================================================================

#[test]
fn test_add() {
    let mut w = setup();
    check(&mut w, "(+ 1 2)", Value::Int(3));
    check(&mut w, "(+ x y)", Value::Int(15));
    check(&mut w, "(+ x -1)", Value::Int(4));
    check(&mut w, "(+ (+ 1 1) (+ 2 2))", Value::Int(6));
    check(&mut w, "(+ 1)", Value::Int(1));
    check(&mut w, "(+)", Value::Int(0));
    // mixed kinds
    check(&mut w, "(+ x \"hi\")", Value::string("5hi"));
    check(&mut w, "(+ \"hi\" \"ho\")", Value::string("hiho"));
    check(
        &mut w,
        "(+ '(1 2) '(3 4))",
        Value::list(vec![
            Value::Int(1),
            Value::Int(2),
            Value::Int(3),
            Value::Int(4),
        ]),
    );
    check(
        &mut w,
        "(+ '(1 2) 3)",
        Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
    );
}

#[test]
fn test_sub() {
    let mut w = setup();
    check(&mut w, "(- 5)", Value::Int(-5));
    check(&mut w, "(- 2 1)", Value::Int(1));
    check(&mut w, "(- 1 2)", Value::Int(-1));
    check(&mut w, "(- y x)", Value::Int(5));
    check(&mut w, "(- 10 (- 4 2))", Value::Int(8));
    check(&mut w, "(- (- 10 10) (- 4 2))", Value::Int(-2));
    check_error(&mut w, "(- x 1 \"test\")");
}

#[test]
fn test_mul_and_div() {
    let mut w = setup();
    check(&mut w, "(* 2 2)", Value::Int(4));
    check(&mut w, "(* x y)", Value::Int(50));
    check(&mut w, "(* x y z)", Value::Int(0));
    check(&mut w, "(/ 22 2)", Value::Int(11));
    check(&mut w, "(/ y x)", Value::Int(2));
    check(&mut w, "(/ 5 2)", Value::Float(2.5));
    check_error(&mut w, "(/ 5 0)");
    check_error(&mut w, "(/ 1)");
    check_error(&mut w, "(/ 1 \"a\")");
}

#[test]
fn test_exp() {
    let mut w = setup();
    check(&mut w, "(** 2 10)", Value::Int(1024));
    check(&mut w, "(** x 2)", Value::Int(25));
    check_error(&mut w, "(** 1)");
    check_error(&mut w, "(** 1 \"a\")");
    check_error(&mut w, "(** 1 2 3)");
}

#[test]
fn test_floor_ceil_round_mod() {
    let mut w = setup();
    check(&mut w, "(floor 2.9)", Value::Int(2));
    check(&mut w, "(ceil 2.1)", Value::Int(3));
    check(&mut w, "(round 2.4)", Value::Int(2));
    check(&mut w, "(mod 17 5)", Value::Int(2));
    check(&mut w, "(mod y 3)", Value::Int(1));
    check_error(&mut w, "(mod 1 0)");
}

// ============================================================================
// Comparison and logic
// ============================================================================

#[test]
fn test_equality() {
    let mut w = setup();
    check(&mut w, "(= 3 3)", Value::Bool(true));
    check(&mut w, "(= 3 3 3)", Value::Bool(true));
    check(&mut w, "(= \"a\" \"a\")", Value::Bool(true));
    check(&mut w, "(= 3 3 \"a\")", Value::Bool(false));
    check(&mut w, "(= x y)", Value::Bool(false));
    check(&mut w, "(= (+ 2 2) (* 2 2))", Value::Bool(true));

    check(&mut w, "(!= 3 3)", Value::Bool(false));
    check(&mut w, "(!= 3 3 \"a\")", Value::Bool(true));
    check(&mut w, "(!= x y)", Value::Bool(true));
}

#[test]
fn test_orderings() {
    let mut w = setup();
    check(&mut w, "(> 1 0)", Value::Bool(true));
    check(&mut w, "(> -1 0)", Value::Bool(false));
    check(&mut w, "(< x y)", Value::Bool(true));
    check(&mut w, "(>= 0 0)", Value::Bool(true));
    check(&mut w, "(<= -2 -1)", Value::Bool(true));
    check(&mut w, "(> 1.5 1)", Value::Bool(true));

    check_error(&mut w, "(> 3)");
    check_error(&mut w, "(> 3 4 5)");
    check_error(&mut w, "(> '(1 2) 3)");
    check_error(&mut w, "(<= 3 '(3))");
}

#[test]
fn test_logic() {
    let mut w = setup();
    check(&mut w, "(&& 1 1 2)", Value::Bool(true));
    check(&mut w, "(&& 1 \"a\")", Value::Bool(true));
    check(&mut w, "(&& 1 '(1 2 3))", Value::Bool(true));
    check(&mut w, "(&& 1 z)", Value::Bool(false));
    check(&mut w, "(|| z 1)", Value::Bool(true));
    check(&mut w, "(|| z z)", Value::Bool(false));
    check(&mut w, "(! 1)", Value::Bool(false));
    check(&mut w, "(! z)", Value::Bool(true));
    check_error(&mut w, "(!)");
}

#[test]
fn test_logic_short_circuits() {
    let mut w = setup();
    // the undefined symbol is never reached
    check(&mut w, "(|| 1 nonexistent)", Value::Bool(true));
    check(&mut w, "(&& 0 nonexistent)", Value::Bool(false));
}

// ============================================================================
// Bindings
// ============================================================================

#[test]
fn test_define_and_set() {
    let mut w = setup();
    check(&mut w, "x", Value::Int(5));
    w.eval_str("(set (x 6))").unwrap();
    check(&mut w, "x", Value::Int(6));
    w.eval_str("(set (x (+ x x)))").unwrap();
    check(&mut w, "x", Value::Int(12));
    // set returns the last written value
    check(&mut w, "(set (x 1) (y 2))", Value::Int(2));
    check(&mut w, "y", Value::Int(2));

    check_error(&mut w, "(set (5 5))");
    check_error(&mut w, "(set (unbound 5))");
    // duplicate define in the same frame
    check_error(&mut w, "(define x 1)");
}

#[test]
fn test_let() {
    let mut w = Wal::new();
    check(&mut w, "(let ([a 5]) a)", Value::Int(5));
    check(&mut w, "(let ([a 5] [b 2]) (+ b a))", Value::Int(7));
    check(
        &mut w,
        "(let ([a 5]) (let ([b 2]) (+ b a)))",
        Value::Int(7),
    );
    // bindings do not leak
    check_error(&mut w, "a");
    // simultaneous binding: b must not see a
    check_error(&mut w, "(let ([a 1] [b a]) b)");
}

#[test]
fn test_shadowing_does_not_leak() {
    let mut w = Wal::new();
    check(
        &mut w,
        "(do (define x 2) (let ([x 5]) x) x)",
        Value::Int(2),
    );
}

#[test]
fn test_alias() {
    let mut w = setup();
    w.eval_str("(alias abc x)").unwrap();
    check(&mut w, "abc", Value::Int(5));
    w.eval_str("(alias abc x def y)").unwrap();
    check(&mut w, "def", Value::Int(10));

    check_error(&mut w, "(alias)");
    check_error(&mut w, "(alias a 1 b)");

    w.eval_str("(unalias abc)").unwrap();
    check_error(&mut w, "abc");
    check_error(&mut w, "(unalias abc)");
    check_error(&mut w, "(unalias 1)");
}

// ============================================================================
// Control flow
// ============================================================================

#[test]
fn test_if() {
    let mut w = setup();
    check(&mut w, "(if 1 2 3)", Value::Int(2));
    check(&mut w, "(if z 2 3)", Value::Int(3));
    check(&mut w, "(if (> x y) 2 3)", Value::Int(3));
    check(&mut w, "(if (! (> x y)) 2 3)", Value::Int(2));
    check(&mut w, "(if 1 2)", Value::Int(2));
    check(&mut w, "(if z 2)", Value::Unit);
    check_error(&mut w, "(if)");
    check_error(&mut w, "(if 1)");
}

#[test]
fn test_case() {
    let mut w = Wal::new();
    w.eval_str("(define a 2)").unwrap();
    check(
        &mut w,
        "(case a (1 \"a\") (2 \"b\") (3 \"c\"))",
        Value::string("b"),
    );
    w.eval_str("(set (a 9))").unwrap();
    check(&mut w, "(case a (1 \"a\") (2 \"b\") (3 \"c\"))", Value::Unit);
    check(
        &mut w,
        "(case a (1 \"a\") (default \"dflt\"))",
        Value::string("dflt"),
    );

    // complex keys match structurally
    w.eval_str("(set (a '(1 1)))").unwrap();
    check(
        &mut w,
        "(case a ((1 1) \"a\") ((1 2) \"b\"))",
        Value::string("a"),
    );

    // duplicate keys are rejected before any clause runs
    let err = w.eval_str("(case 1 (1 \"a\") (2 \"b\") (1 \"c\"))").unwrap_err();
    match err {
        WalError::Eval(e) => assert!(matches!(e.kind, ErrorKind::DuplicateCaseKey(_))),
        other => panic!("unexpected error {:?}", other),
    }
    // keys that merely print alike are not duplicates
    check(
        &mut w,
        "(case 1 (1 \"int\") (\"1\" \"str\"))",
        Value::string("int"),
    );
    check_error(&mut w, "(case)");
}

#[test]
fn test_do_and_while() {
    let mut w = Wal::new();
    check(&mut w, "(do 1 2)", Value::Int(2));
    check(&mut w, "(do (+ 1 2) (+ 2 2))", Value::Int(4));
    check(
        &mut w,
        "(do (define i 0) (while (< i 5) (set (i (+ i 1)))) i)",
        Value::Int(5),
    );
    check(&mut w, "(while (< 1 0) 1)", Value::Unit);
    check_error(&mut w, "(while 1)");
}

// ============================================================================
// Functions and macros
// ============================================================================

#[test]
fn test_lambdas() {
    let mut w = Wal::new();
    check(&mut w, "((fn (n) (+ n 1)) 1)", Value::Int(2));
    w.eval_str("(define foo (fn (n) (* n 2)))").unwrap();
    check(&mut w, "(foo 5)", Value::Int(10));
    // closures capture their definition environment
    w.eval_str("(define make-adder (fn (n) (fn (m) (+ n m))))")
        .unwrap();
    check(&mut w, "((make-adder 3) 4)", Value::Int(7));
    // wrong argument counts
    check_error(&mut w, "(foo)");
    check_error(&mut w, "(foo 1 2)");
    check_error(&mut w, "(fn (n))");
}

#[test]
fn test_recursion() {
    let mut w = Wal::new();
    w.eval_str("(define fac (fn (n) (if (> n 1) (* n (fac (- n 1))) 1)))")
        .unwrap();
    check(&mut w, "(fac 10)", Value::Int(3628800));
}

#[test]
fn test_quote_and_eval() {
    let mut w = Wal::new();
    check(&mut w, "(quote sym)", Value::symbol("sym"));
    check(&mut w, "'sym", Value::symbol("sym"));
    check(&mut w, "(eval '(+ 1 2))", Value::Int(3));
    check(&mut w, "(eval (parse \"(* 6 7)\"))", Value::Int(42));
    check_error(&mut w, "(quote)");
    check_error(&mut w, "(quote a b)");
    check_error(&mut w, "(parse \"(\")");
}

#[test]
fn test_defmacro() {
    let mut w = Wal::new();
    w.eval_str("(defmacro my-unless [c body] `(if ,c 0 ,body))")
        .unwrap();
    check(&mut w, "(my-unless 0 42)", Value::Int(42));
    check(&mut w, "(my-unless 1 42)", Value::Int(0));

    // variadic macro collects all argument forms
    w.eval_str("(defmacro count-args forms (length forms))")
        .unwrap();
    check(&mut w, "(count-args a b c)", Value::Int(3));
}

#[test]
fn test_macroexpand_and_gensym() {
    let mut w = Wal::new();
    w.eval_str("(defmacro twice [e] `(+ ,e ,e))").unwrap();
    check(
        &mut w,
        "(macroexpand '(twice 4))",
        Value::list(vec![
            Value::Operator(wal::value::Operator::Add),
            Value::Int(4),
            Value::Int(4),
        ]),
    );
    let a = w.eval_str("(gensym)").unwrap();
    let b = w.eval_str("(gensym)").unwrap();
    assert_ne!(a, b);
}

// ============================================================================
// Lists
// ============================================================================

#[test]
fn test_list_accessors() {
    let mut w = Wal::new();
    check(&mut w, "(first '(1 2 3))", Value::Int(1));
    check(&mut w, "(second '(1 2 3))", Value::Int(2));
    check(&mut w, "(last '(1 2 3))", Value::Int(3));
    check(
        &mut w,
        "(rest '(1 2 3))",
        Value::list(vec![Value::Int(2), Value::Int(3)]),
    );
    check(&mut w, "(rest '(1))", Value::list(vec![]));
    check(&mut w, "(length '(1 2 3))", Value::Int(3));
    check(&mut w, "(length \"abc\")", Value::Int(3));
    check_error(&mut w, "(first '())");
    check_error(&mut w, "(first 5)");
}

#[test]
fn test_list_higher_order() {
    let mut w = Wal::new();
    check(
        &mut w,
        "(map (fn (n) (* n n)) '(1 2 3))",
        Value::list(vec![Value::Int(1), Value::Int(4), Value::Int(9)]),
    );
    // operators are callable too
    check(&mut w, "(fold + 0 '(1 2 3 4))", Value::Int(10));
    check(&mut w, "(fold (fn (a b) (+ a b)) 100 '(1 2))", Value::Int(103));
    check(
        &mut w,
        "(zip '(1 2) '(3 4))",
        Value::list(vec![
            Value::list(vec![Value::Int(1), Value::Int(3)]),
            Value::list(vec![Value::Int(2), Value::Int(4)]),
        ]),
    );
}

#[test]
fn test_list_aggregates() {
    let mut w = Wal::new();
    check(&mut w, "(max '(3 1 2))", Value::Int(3));
    check(&mut w, "(min '(3 1 2))", Value::Int(1));
    check(&mut w, "(average '(1 2 3))", Value::Float(2.0));
    check(&mut w, "(in 2 '(1 2 3))", Value::Bool(true));
    check(&mut w, "(in 9 '(1 2 3))", Value::Bool(false));
    check(&mut w, "(in 1 2 '(1 2 3))", Value::Bool(true));
    check_error(&mut w, "(max '())");
}

#[test]
fn test_range() {
    let mut w = Wal::new();
    check(
        &mut w,
        "(range 3)",
        Value::list(vec![Value::Int(0), Value::Int(1), Value::Int(2)]),
    );
    check(
        &mut w,
        "(range 2 5)",
        Value::list(vec![Value::Int(2), Value::Int(3), Value::Int(4)]),
    );
    check(
        &mut w,
        "(range 5 0 -2)",
        Value::list(vec![Value::Int(5), Value::Int(3), Value::Int(1)]),
    );
    check_error(&mut w, "(range 0 5 0)");
}

// ============================================================================
// Arrays
// ============================================================================

#[test]
fn test_arrays() {
    let mut w = Wal::new();
    w.eval_str("(define arr (array (\"k\" 1) (2 \"two\")))").unwrap();
    check(&mut w, "(geta arr \"k\")", Value::Int(1));
    check(&mut w, "(geta arr 2)", Value::string("two"));
    // missing keys appear as 0
    check(&mut w, "(geta arr \"nope\")", Value::Int(0));
    check(&mut w, "(in \"k\" arr)", Value::Bool(true));

    w.eval_str("(seta arr \"k\" 5)").unwrap();
    check(&mut w, "(geta arr \"k\")", Value::Int(5));
    // compound keys join with -
    w.eval_str("(seta arr \"a\" 1 99)").unwrap();
    check(&mut w, "(geta arr \"a-1\")", Value::Int(99));

    w.eval_str("(dela arr \"k\")").unwrap();
    check(&mut w, "(in \"k\" arr)", Value::Bool(false));
}

#[test]
fn test_mapa() {
    let mut w = Wal::new();
    w.eval_str("(define arr (array (\"a\" 1) (\"b\" 2)))").unwrap();
    check(
        &mut w,
        "(mapa (fn (k v) v) arr)",
        Value::list(vec![Value::Int(1), Value::Int(2)]),
    );
}

// ============================================================================
// Types and conversions
// ============================================================================

#[test]
fn test_predicates() {
    let mut w = Wal::new();
    check(&mut w, "(atom? 1)", Value::Bool(true));
    check(&mut w, "(atom? \"1\")", Value::Bool(true));
    check(&mut w, "(atom? (+ 1 2))", Value::Bool(true));
    check(&mut w, "(atom? '(+ 1 2))", Value::Bool(false));
    check(&mut w, "(symbol? 'a)", Value::Bool(true));
    check(&mut w, "(symbol? \"a\")", Value::Bool(false));
    check(&mut w, "(string? (+ \"hi\" 1))", Value::Bool(true));
    check(&mut w, "(int? (+ 1 2))", Value::Bool(true));
    check(&mut w, "(int? 1.5)", Value::Bool(false));
    check(&mut w, "(list? (range 10))", Value::Bool(true));
    check(&mut w, "(list? (array))", Value::Bool(false));

    w.eval_str("(define known 1)").unwrap();
    check(&mut w, "(defined? known)", Value::Bool(true));
    check(&mut w, "(defined? unknown)", Value::Bool(false));
}

#[test]
fn test_conversions() {
    let mut w = Wal::new();
    check(&mut w, "(convert/bin 5 8)", Value::string("00000101"));
    check(&mut w, "(convert/bin 0)", Value::string("0"));
    check(&mut w, "(convert/bin (+ 1 2))", Value::string("11"));
    check(&mut w, "(string->int \"101\")", Value::Int(101));
    check(&mut w, "(string->int \"101\" 2)", Value::Int(5));
    check(&mut w, "(string->int \"-1\")", Value::Int(-1));
    check(&mut w, "(string->int \"ff\" 16)", Value::Int(255));
    check(&mut w, "(bits->sint \"1111\")", Value::Int(-1));
    check(&mut w, "(bits->sint \"0111\")", Value::Int(7));
    check(&mut w, "(symbol->string 'a)", Value::string("a"));
    check(&mut w, "(string->symbol \"a\")", Value::symbol("a"));
    check(&mut w, "(int->string -12)", Value::string("-12"));

    check_error(&mut w, "(convert/bin \"hi\")");
    check_error(&mut w, "(string->int 1)");
    check_error(&mut w, "(bits->sint \"12\")");
}

#[test]
fn test_slice() {
    let mut w = Wal::new();
    check(&mut w, "(slice 0b1010 3 1)", Value::Int(0b101));
    check(&mut w, "(slice 0b1010 1)", Value::Int(1));
    check(&mut w, "(slice \"abcd\" 2)", Value::string("c"));
    check(&mut w, "(slice '(1 2 3) 0)", Value::Int(1));
}

// ============================================================================
// Files
// ============================================================================

#[test]
fn test_eval_file_and_require() {
    let dir = tempfile::tempdir().unwrap();
    let module = dir.path().join("util.wal");
    std::fs::write(&module, "(define util-answer 42)\n").unwrap();
    let script = dir.path().join("script.wal");
    std::fs::write(&script, "(define from-file 7)\nfrom-file\n").unwrap();

    let mut w = Wal::new();
    w.append_library_path(dir.path());

    let result = w
        .eval_str(&format!("(eval-file \"{}\")", script.display()))
        .unwrap();
    assert_eq!(result, Value::Int(7));
    check(&mut w, "from-file", Value::Int(7));

    w.eval_str("(require util)").unwrap();
    check(&mut w, "util-answer", Value::Int(42));
    check_error(&mut w, "(require no-such-module)");
}

#[test]
fn test_run_compiled_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("program.wo");
    let exprs = wal::reader::read_sexprs("(define a 20) (+ a 1)", "program.wal").unwrap();
    wal::wo::write_file(&path, &exprs).unwrap();

    let mut w = Wal::new();
    assert_eq!(w.run_file(&path).unwrap(), Value::Int(21));
}

// ============================================================================
// Error reporting
// ============================================================================

#[test]
fn test_error_spans_point_at_source() {
    let mut w = Wal::new();
    let err = w.eval_str("(do 1\n   (undefined-op 1))").unwrap_err();
    let WalError::Eval(e) = err else { panic!() };
    let span = e.span.expect("error should carry a span");
    assert_eq!(span.line, 2);
}

#[test]
fn test_printf_mismatch_is_an_error() {
    let mut w = Wal::new();
    check_error(&mut w, "(printf \"%d\")");
    check_error(&mut w, "(printf \"%d\" \"nope\")");
    check_error(&mut w, "(printf 5 5)");
    check(&mut w, "(printf \"\")", Value::Unit);
}
