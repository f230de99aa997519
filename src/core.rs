// ABOUTME: Embedding API wrapping the evaluator for host applications

use crate::error::{EvalError, WalError};
use crate::eval::Evaluator;
use crate::reader::{read_sexpr, read_sexprs};
use crate::value::Value;
use std::path::Path;

/// The main entry point for embedding WAL: owns an evaluator and its
/// traces, and exposes loading, stepping and evaluation.
///
/// ```
/// use wal::Wal;
///
/// let mut wal = Wal::new();
/// let result = wal.eval_str("(+ 1 2)").unwrap();
/// assert_eq!(result, wal::Value::Int(3));
/// ```
pub struct Wal {
    pub evaluator: Evaluator,
}

impl Default for Wal {
    fn default() -> Self {
        Self::new()
    }
}

impl Wal {
    pub fn new() -> Self {
        Wal {
            evaluator: Evaluator::new(),
        }
    }

    /// Loads a trace file under the given id.
    pub fn load(&mut self, file: &str, tid: &str) -> Result<(), EvalError> {
        self.evaluator.traces.load(file, tid)
    }

    /// Loads a VCD trace from an in-memory string.
    pub fn load_vcd_str(&mut self, data: &str, tid: &str) -> Result<(), EvalError> {
        self.evaluator.traces.load_vcd_str(data, tid)
    }

    /// Loads a CSV trace from an in-memory string.
    pub fn load_csv_str(&mut self, data: &str, tid: &str) -> Result<(), EvalError> {
        self.evaluator.traces.load_csv_str(data, tid)
    }

    pub fn unload(&mut self, tid: &str) {
        self.evaluator.traces.unload(tid);
    }

    /// Steps one trace or all traces; returns the ids of traces that
    /// could not move.
    pub fn step(&mut self, steps: i64, tid: Option<&str>) -> Result<Vec<String>, EvalError> {
        self.evaluator.traces.step(steps, tid)
    }

    /// Evaluates one expression tree through all passes.
    pub fn eval(&mut self, expr: &Value) -> Result<Value, EvalError> {
        self.evaluator.eval_toplevel(expr)
    }

    /// Reads and evaluates a single expression.
    pub fn eval_str(&mut self, code: &str) -> Result<Value, WalError> {
        let expr = read_sexpr(code, "<eval>")?;
        Ok(self.evaluator.eval_toplevel(&expr)?)
    }

    /// Like `eval_str`, with named arguments bound at top level for the
    /// duration of the call.
    pub fn eval_str_with_args(
        &mut self,
        code: &str,
        args: &[(&str, Value)],
    ) -> Result<Value, WalError> {
        let expr = read_sexpr(code, "<eval>")?;
        for (name, value) in args {
            self.evaluator.global.define(name, value.clone())?;
        }
        let result = self.evaluator.eval_toplevel(&expr);
        for (name, _) in args {
            let _ = self.evaluator.global.undefine(name);
        }
        Ok(result?)
    }

    /// Resets the evaluator, then reads and evaluates a whole program,
    /// returning its last value.
    pub fn run_str(&mut self, code: &str) -> Result<Value, WalError> {
        self.evaluator.reset();
        let exprs = read_sexprs(code, "<run>")?;
        let mut result = Value::Unit;
        for expr in exprs {
            result = self.evaluator.eval_toplevel(&expr)?;
        }
        Ok(result)
    }

    /// Runs a `.wal` source file or a compiled `.wo` dump.
    pub fn run_file(&mut self, path: &Path) -> Result<Value, WalError> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if extension == "wo" {
            let exprs = crate::wo::read_file(path)?;
            let mut result = Value::Unit;
            for expr in exprs {
                result = self.evaluator.eval_toplevel(&expr)?;
            }
            return Ok(result);
        }
        let code = std::fs::read_to_string(path).map_err(|e| {
            WalError::Eval(EvalError::runtime(
                "run",
                format!("{}: {}", path.display(), e),
            ))
        })?;
        let exprs = read_sexprs(&code, &path.display().to_string())?;
        let mut result = Value::Unit;
        for expr in exprs {
            result = self.evaluator.eval_toplevel(&expr)?;
        }
        Ok(result)
    }

    /// Registers a host operator callable from WAL programs.
    pub fn register_operator(
        &mut self,
        name: &str,
        f: impl Fn(&mut Evaluator, &[Value]) -> Result<Value, EvalError> + 'static,
    ) -> Result<(), EvalError> {
        self.evaluator.register_operator(name, f)
    }

    /// Adds a directory to the `require` search path.
    pub fn append_library_path(&mut self, path: impl Into<std::path::PathBuf>) {
        self.evaluator.library_paths.push(path.into());
    }

    /// Returns the evaluator to a clean slate; loaded traces stay but
    /// snap back to index 0.
    pub fn reset(&mut self) {
        self.evaluator.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_str() {
        let mut wal = Wal::new();
        assert_eq!(wal.eval_str("(+ 1 2)").unwrap(), Value::Int(3));
    }

    #[test]
    fn test_named_args_are_temporary() {
        let mut wal = Wal::new();
        let result = wal
            .eval_str_with_args("(* n n)", &[("n", Value::Int(7))])
            .unwrap();
        assert_eq!(result, Value::Int(49));
        assert!(wal.eval_str("n").is_err());
    }

    #[test]
    fn test_run_str_resets() {
        let mut wal = Wal::new();
        wal.eval_str("(define x 1)").unwrap();
        assert!(wal.run_str("x").is_err());
        assert_eq!(wal.run_str("(do (define x 2) x)").unwrap(), Value::Int(2));
    }
}
