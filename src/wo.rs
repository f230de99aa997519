// ABOUTME: Reader and writer for compiled .wo expression dumps

use crate::error::{ErrorKind, EvalError};
use crate::value::{Operator, Symbol, Value, WList};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Wire mirror of the static expression subset. Runtime-only values
/// (closures, macros, arrays, signal handles) never appear in compiled
/// programs. Operators travel by name so dumps survive reordering of
/// the operator enum.
#[derive(Debug, Serialize, Deserialize)]
enum WireExpr {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Symbol { name: String, steps: Option<usize> },
    Operator(String),
    List(Vec<WireExpr>),
    Unquote(Box<WireExpr>),
    UnquoteSplice(Box<WireExpr>),
    Unit,
}

fn to_wire(value: &Value) -> Result<WireExpr, EvalError> {
    Ok(match value {
        Value::Int(n) => WireExpr::Int(*n),
        Value::Float(f) => WireExpr::Float(*f),
        Value::Str(s) => WireExpr::Str(s.clone()),
        Value::Bool(b) => WireExpr::Bool(*b),
        Value::Symbol(sym) => WireExpr::Symbol {
            name: sym.name.clone(),
            steps: sym.steps,
        },
        Value::Operator(op) => WireExpr::Operator(op.name().to_string()),
        Value::List(list) => WireExpr::List(
            list.iter()
                .map(to_wire)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Unquote(inner) => WireExpr::Unquote(Box::new(to_wire(inner)?)),
        Value::UnquoteSplice(inner) => WireExpr::UnquoteSplice(Box::new(to_wire(inner)?)),
        Value::Unit => WireExpr::Unit,
        other => {
            return Err(EvalError::runtime(
                "compile",
                format!("cannot compile a {} value", other.type_name()),
            ))
        }
    })
}

fn from_wire(wire: WireExpr) -> Result<Value, EvalError> {
    Ok(match wire {
        WireExpr::Int(n) => Value::Int(n),
        WireExpr::Float(f) => Value::Float(f),
        WireExpr::Str(s) => Value::Str(s),
        WireExpr::Bool(b) => Value::Bool(b),
        WireExpr::Symbol { name, steps } => Value::Symbol(Symbol {
            name,
            steps,
            span: None,
        }),
        WireExpr::Operator(name) => {
            let op = Operator::from_name(&name).ok_or_else(|| {
                EvalError::runtime("decode", format!("unknown operator {}", name))
            })?;
            Value::Operator(op)
        }
        WireExpr::List(items) => Value::List(WList::new(
            items
                .into_iter()
                .map(from_wire)
                .collect::<Result<Vec<_>, _>>()?,
        )),
        WireExpr::Unquote(inner) => Value::Unquote(Box::new(from_wire(*inner)?)),
        WireExpr::UnquoteSplice(inner) => Value::UnquoteSplice(Box::new(from_wire(*inner)?)),
        WireExpr::Unit => Value::Unit,
    })
}

pub fn encode(exprs: &[Value]) -> Result<Vec<u8>, EvalError> {
    let wire = exprs.iter().map(to_wire).collect::<Result<Vec<_>, _>>()?;
    bincode::serialize(&wire)
        .map_err(|e| EvalError::new(ErrorKind::Io(format!("encoding failed: {}", e))))
}

pub fn decode(bytes: &[u8]) -> Result<Vec<Value>, EvalError> {
    let wire: Vec<WireExpr> = bincode::deserialize(bytes)
        .map_err(|e| EvalError::new(ErrorKind::Io(format!("not a valid .wo file: {}", e))))?;
    wire.into_iter().map(from_wire).collect()
}

pub fn write_file(path: &Path, exprs: &[Value]) -> Result<(), EvalError> {
    let bytes = encode(exprs)?;
    std::fs::write(path, bytes)
        .map_err(|e| EvalError::new(ErrorKind::Io(format!("{}: {}", path.display(), e))))
}

pub fn read_file(path: &Path) -> Result<Vec<Value>, EvalError> {
    let bytes = std::fs::read(path)
        .map_err(|e| EvalError::new(ErrorKind::Io(format!("{}: {}", path.display(), e))))?;
    decode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_sexprs;

    #[test]
    fn test_round_trip() {
        let program = "(define f (fn (x) (+ x 1))) (f 41) 'sym `(a ,b ,@c) 1.5 true";
        let exprs = read_sexprs(program, "test").unwrap();
        let decoded = decode(&encode(&exprs).unwrap()).unwrap();
        assert_eq!(decoded, exprs);
    }

    #[test]
    fn test_resolved_steps_survive() {
        let exprs = vec![crate::passes::resolve(
            read_sexprs("(do (define x 1) x)", "test").unwrap().remove(0),
        )];
        let decoded = decode(&encode(&exprs).unwrap()).unwrap();
        assert_eq!(decoded, exprs);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(decode(b"not a wo file").is_err());
    }
}
