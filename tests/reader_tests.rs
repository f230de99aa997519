// ABOUTME: Integration tests for the reader, printing and round trips

use wal::reader::{read_sexpr, read_sexprs};
use wal::value::{Operator, Value};

/// Reading the printed form of a parsed program yields the same tree
/// (up to span metadata, which equality already ignores).
#[test]
fn test_print_read_round_trip() {
    let programs = [
        "42",
        "-17",
        "2.5",
        "true",
        "false",
        "\"a string with \\\"quotes\\\" and \\n\"",
        "symbol-name",
        "tb.dut.reg<3>",
        "(+ 1 2 3)",
        "(define f (fn (x) (* x x)))",
        "'(quoted list)",
        "`(a ,b ,@c)",
        "(let ((x 5) (y 2)) (+ x y))",
        "(slice data 7 0)",
        "clk@-1",
        "(case x (1 \"one\") (default \"other\"))",
        "(find (&& (= clk 1) (> counter 5)))",
        "(resolve-scope clk)",
    ];
    for program in programs {
        let once = read_sexpr(program, "test").unwrap();
        let printed = format!("{}", once);
        let twice = read_sexpr(&printed, "test").unwrap();
        assert_eq!(once, twice, "program: {} printed as: {}", program, printed);
    }
}

#[test]
fn test_numbers() {
    assert_eq!(read_sexpr("0x1f", "t").unwrap(), Value::Int(31));
    assert_eq!(read_sexpr("0b101", "t").unwrap(), Value::Int(5));
    assert_eq!(read_sexpr("-0", "t").unwrap(), Value::Int(0));
    assert_eq!(read_sexpr("3.", "t").unwrap(), Value::Float(3.0));
}

#[test]
fn test_sigils_expand_to_resolver_calls() {
    assert_eq!(
        read_sexpr("~clk", "t").unwrap(),
        Value::list(vec![
            Value::Operator(Operator::ResolveScope),
            Value::symbol("clk")
        ])
    );
    assert_eq!(
        read_sexpr("#ready", "t").unwrap(),
        Value::list(vec![
            Value::Operator(Operator::ResolveGroup),
            Value::symbol("ready")
        ])
    );
}

#[test]
fn test_postfix_forms_nest() {
    // slice of a timed read: innermost binds first
    assert_eq!(
        read_sexpr("data[3]@1", "t").unwrap(),
        Value::list(vec![
            Value::Operator(Operator::RelEval),
            Value::list(vec![
                Value::Operator(Operator::Slice),
                Value::symbol("data"),
                Value::Int(3)
            ]),
            Value::Int(1)
        ])
    );
}

#[test]
fn test_bracket_styles_are_interchangeable() {
    let a = read_sexpr("(let ([x 5]) {+ x 1})", "t").unwrap();
    let b = read_sexpr("(let ((x 5)) (+ x 1))", "t").unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_shebang_and_comments() {
    let exprs = read_sexprs(
        "#!/usr/bin/env wal\n; a program\n(define x 1) ; trailing\nx\n",
        "t",
    )
    .unwrap();
    assert_eq!(exprs.len(), 2);
}

#[test]
fn test_parse_error_reports_position() {
    let err = read_sexpr("(+ 1\n   ]", "t").unwrap_err();
    assert!(err.message.contains("line 2"), "message: {}", err.message);
    assert!(err.context.contains('^'));
}

#[test]
fn test_empty_program() {
    assert!(read_sexprs("", "t").unwrap().is_empty());
    assert!(read_sexprs("; only comments\n", "t").unwrap().is_empty());
    assert!(read_sexpr("", "t").is_err());
}
