//! System operations and slicing: exit, require, eval-file, repl, slice
//!
//! `require` loads `<name>.wal` modules from the library search paths;
//! `slice` extracts bits from integers and elements or ranges from
//! strings and lists.

use crate::builtins::{expect_arity, expect_arity_range, expect_int, expect_min_arity, expect_string, expect_symbol, BuiltinTable};
use crate::error::{ErrorKind, EvalError};
use crate::eval::Evaluator;
use crate::value::{Operator, Value};
use std::path::PathBuf;

pub fn builtin_exit(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity_range("exit", args, 0, 1)?;
    let code = if args.is_empty() {
        0
    } else {
        expect_int("exit", &ev.eval(&args[0])?)?
    };
    std::process::exit(code as i32);
}

fn find_module(ev: &Evaluator, name: &str) -> Option<PathBuf> {
    let filename = format!("{}.wal", name);
    for dir in &ev.library_paths {
        let candidate = dir.join(&filename);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    let local = PathBuf::from(&filename);
    local.is_file().then_some(local)
}

/// `(require module+)`: evaluates each module file once into the
/// current session.
pub fn builtin_require(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_min_arity("require", args, 1)?;
    for arg in args {
        let sym = expect_symbol("require", arg)?;
        let path = find_module(ev, &sym.name).ok_or_else(|| {
            EvalError::runtime(
                "require",
                format!("no module {}.wal on the library path", sym.name),
            )
        })?;
        let code = std::fs::read_to_string(&path)
            .map_err(|e| EvalError::new(ErrorKind::Io(format!("{}: {}", path.display(), e))))?;
        ev.eval_source(&code, &path.display().to_string())?;
    }
    Ok(Value::Unit)
}

pub fn builtin_eval_file(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity("eval-file", args, 1)?;
    let path = expect_string("eval-file", &ev.eval(&args[0])?)?;
    let code = std::fs::read_to_string(&path)
        .map_err(|e| EvalError::new(ErrorKind::Io(format!("{}: {}", path, e))))?;
    ev.eval_source(&code, &path)
}

pub fn builtin_repl(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    if !args.is_empty() {
        return Err(EvalError::arity("repl", "0", args.len()));
    }
    crate::repl::run(ev);
    Ok(Value::Unit)
}

fn bad_index(index: i64) -> EvalError {
    EvalError::new(ErrorKind::BadIndex {
        function: "slice".to_string(),
        index,
    })
}

fn element_index(index: i64, len: usize) -> Result<usize, EvalError> {
    if index < 0 || index as usize >= len {
        return Err(bad_index(index));
    }
    Ok(index as usize)
}

fn range_indices(a: i64, b: i64, len: usize) -> Result<(usize, usize), EvalError> {
    if a < 0 || b < a {
        return Err(bad_index(b));
    }
    if b as usize > len {
        return Err(bad_index(b));
    }
    Ok((a as usize, b as usize))
}

/// Bit slicing on integers, element and sub-range access on strings
/// and lists. `(slice n i)` is bit i of n; `(slice n hi lo)` the
/// inclusive bit field; `(slice xs a b)` the half-open element range.
pub fn builtin_slice(ev: &mut Evaluator, args: &[Value]) -> Result<Value, EvalError> {
    expect_arity_range("slice", args, 2, 3)?;
    let evaluated = ev.eval_args(args)?;

    match &evaluated[0] {
        Value::Int(n) => {
            if evaluated.len() == 2 {
                let index = expect_int("slice", &evaluated[1])?;
                if !(0..64).contains(&index) {
                    return Err(bad_index(index));
                }
                Ok(Value::Int((*n >> index) & 1))
            } else {
                let hi = expect_int("slice", &evaluated[1])?;
                let lo = expect_int("slice", &evaluated[2])?;
                if lo < 0 || hi < lo || hi >= 64 {
                    return Err(bad_index(hi));
                }
                let width = (hi - lo + 1) as u32;
                let mask = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };
                let field = ((*n as u64) >> lo) & mask;
                if field > i64::MAX as u64 {
                    return Err(EvalError::new(ErrorKind::Overflow("slice".to_string())));
                }
                Ok(Value::Int(field as i64))
            }
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            if evaluated.len() == 2 {
                let index = element_index(expect_int("slice", &evaluated[1])?, chars.len())?;
                Ok(Value::Str(chars[index].to_string()))
            } else {
                let a = expect_int("slice", &evaluated[1])?;
                let b = expect_int("slice", &evaluated[2])?;
                let (a, b) = range_indices(a, b, chars.len())?;
                Ok(Value::Str(chars[a..b].iter().collect()))
            }
        }
        Value::List(list) => {
            if evaluated.len() == 2 {
                let index = element_index(expect_int("slice", &evaluated[1])?, list.len())?;
                Ok(list[index].clone())
            } else {
                let a = expect_int("slice", &evaluated[1])?;
                let b = expect_int("slice", &evaluated[2])?;
                let (a, b) = range_indices(a, b, list.len())?;
                Ok(Value::list(list[a..b].to_vec()))
            }
        }
        other => Err(EvalError::kind_error("slice", "int, string or list", other)),
    }
}

pub fn register(table: &mut BuiltinTable) {
    table.insert(Operator::Exit, builtin_exit as crate::eval::BuiltinFn);
    table.insert(Operator::Require, builtin_require);
    table.insert(Operator::EvalFile, builtin_eval_file);
    table.insert(Operator::Repl, builtin_repl);
    table.insert(Operator::Slice, builtin_slice);
}
