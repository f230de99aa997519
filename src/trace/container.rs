// ABOUTME: Container routing signal queries to the right loaded trace

use crate::error::EvalError;
use crate::trace::{csv, vcd, virt, SignalRead, Trace};
use crate::value::VirtualSignal;
use std::path::Path;
use std::rc::Rc;

/// Separator between a trace id and a signal name in qualified lookups
/// such as `t0^top.clk`. Distinct from the `;` comment character.
pub const DEFAULT_SEPARATOR: char = '^';

/// Holds every loaded trace and a stack of index snapshots used by the
/// iteration combinators for their transactional index changes.
pub struct TraceContainer {
    traces: Vec<(String, Trace)>,
    pub separator: char,
    index_stack: Vec<Vec<(String, usize)>>,
}

impl Default for TraceContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceContainer {
    pub fn new() -> Self {
        TraceContainer {
            traces: Vec::new(),
            separator: DEFAULT_SEPARATOR,
            index_stack: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.traces.iter().map(|(tid, _)| tid.clone()).collect()
    }

    pub fn get(&self, tid: &str) -> Option<&Trace> {
        self.traces
            .iter()
            .find(|(id, _)| id == tid)
            .map(|(_, t)| t)
    }

    pub fn get_mut(&mut self, tid: &str) -> Option<&mut Trace> {
        self.traces
            .iter_mut()
            .find(|(id, _)| id == tid)
            .map(|(_, t)| t)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trace> {
        self.traces.iter().map(|(_, t)| t)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Trace> {
        self.traces.iter_mut().map(|(_, t)| t)
    }

    pub fn insert(&mut self, tid: &str, trace: Trace) -> Result<(), EvalError> {
        if self.get(tid).is_some() {
            return Err(EvalError::runtime(
                "load",
                format!("trace id {} already in use", tid),
            ));
        }
        self.traces.push((tid.to_string(), trace));
        Ok(())
    }

    /// Loads a trace from a file, picking the backend by extension.
    pub fn load(&mut self, file: &str, tid: &str) -> Result<(), EvalError> {
        let extension = Path::new(file)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        let trace = match extension {
            "vcd" => {
                let data = std::fs::read_to_string(file)
                    .map_err(|e| EvalError::runtime("load", format!("{}: {}", file, e)))?;
                vcd::parse_vcd(&data, tid, file)?
            }
            "csv" => {
                let data = std::fs::read_to_string(file)
                    .map_err(|e| EvalError::runtime("load", format!("{}: {}", file, e)))?;
                csv::parse_csv(&data, tid, file)?
            }
            #[cfg(feature = "fst")]
            "fst" => crate::trace::fst::open_fst(file, tid)?,
            #[cfg(not(feature = "fst"))]
            "fst" => {
                return Err(EvalError::runtime(
                    "load",
                    "fst support is not compiled in; rebuild with the \"fst\" feature",
                ))
            }
            other => {
                return Err(EvalError::runtime(
                    "load",
                    format!("file extension \"{}\" not supported", other),
                ))
            }
        };
        self.insert(tid, trace)
    }

    /// Loads a VCD trace from an in-memory string.
    pub fn load_vcd_str(&mut self, data: &str, tid: &str) -> Result<(), EvalError> {
        let trace = vcd::parse_vcd(data, tid, "<string>")?;
        self.insert(tid, trace)
    }

    /// Loads a CSV trace from an in-memory string.
    pub fn load_csv_str(&mut self, data: &str, tid: &str) -> Result<(), EvalError> {
        let trace = csv::parse_csv(data, tid, "<string>")?;
        self.insert(tid, trace)
    }

    /// Creates an empty virtual trace holding only virtual signals.
    pub fn new_virtual(&mut self, tid: &str, max_index: usize) -> Result<(), EvalError> {
        let trace = virt::new_virtual(tid, max_index)?;
        self.insert(tid, trace)
    }

    pub fn unload(&mut self, tid: &str) {
        self.traces.retain(|(id, _)| id != tid);
    }

    /// Splits a possibly qualified name into trace and bare signal name.
    /// Without a separator the single loaded trace is used; anything else
    /// is refused.
    fn route<'n>(&self, name: &'n str) -> Result<(&Trace, &'n str), EvalError> {
        if let Some(pos) = name.find(self.separator) {
            let (tid, rest) = (&name[..pos], &name[pos + 1..]);
            return match self.get(tid) {
                Some(trace) => Ok((trace, rest)),
                None => Err(EvalError::runtime(
                    "trace",
                    format!("no trace with id {}", tid),
                )),
            };
        }
        match self.traces.len() {
            0 => Err(EvalError::runtime("trace", "no traces loaded")),
            1 => Ok((&self.traces[0].1, name)),
            _ => Err(EvalError::runtime(
                "trace",
                format!(
                    "{} is ambiguous with several traces loaded; qualify it as id{}name",
                    name, self.separator
                ),
            )),
        }
    }

    pub fn signal_value(
        &self,
        name: &str,
        offset: i64,
        scope: &str,
    ) -> Result<SignalRead, EvalError> {
        let multi = self.traces.len() > 1;
        let (trace, bare) = self.route(name)?;
        trace.signal_value(bare, offset, scope, multi)
    }

    pub fn signal_width(&self, name: &str) -> Result<u32, EvalError> {
        let (trace, bare) = self.route(name)?;
        trace.signal_width(bare)
    }

    pub fn contains(&self, name: &str) -> bool {
        match self.route(name) {
            Ok((trace, bare)) => trace.contains(bare),
            Err(_) => false,
        }
    }

    /// Steps one trace (by id) or all traces. Returns the ids of traces
    /// that would have run off their range and therefore did not move.
    pub fn step(&mut self, steps: i64, tid: Option<&str>) -> Result<Vec<String>, EvalError> {
        let mut ended = Vec::new();
        match tid {
            Some(tid) => {
                let trace = self.get_mut(tid).ok_or_else(|| {
                    EvalError::runtime("step", format!("no trace with id {}", tid))
                })?;
                if let Some(id) = trace.step(steps) {
                    ended.push(id);
                }
            }
            None => {
                for (_, trace) in self.traces.iter_mut() {
                    if let Some(id) = trace.step(steps) {
                        ended.push(id);
                    }
                }
            }
        }
        Ok(ended)
    }

    /// All scopes; qualified by trace id when several traces are loaded.
    pub fn scopes(&self) -> Vec<String> {
        let multi = self.traces.len() > 1;
        let mut out = Vec::new();
        for (tid, trace) in &self.traces {
            for scope in &trace.scopes {
                if multi {
                    out.push(format!("{}{}{}", tid, self.separator, scope));
                } else {
                    out.push(scope.clone());
                }
            }
        }
        out
    }

    /// All signal names; qualified by trace id when several traces are
    /// loaded.
    pub fn signals(&self) -> Vec<String> {
        let multi = self.traces.len() > 1;
        let mut out = Vec::new();
        for (tid, trace) in &self.traces {
            for signal in trace.get_all_signals() {
                if multi {
                    out.push(format!("{}{}{}", tid, self.separator, signal));
                } else {
                    out.push(signal);
                }
            }
        }
        out
    }

    pub fn indices(&self) -> Vec<(String, usize)> {
        self.traces
            .iter()
            .map(|(tid, trace)| (tid.clone(), trace.index))
            .collect()
    }

    /// Pushes the current index of every trace onto the snapshot stack.
    pub fn store_indices(&mut self) {
        let snapshot = self.indices();
        self.index_stack.push(snapshot);
    }

    /// Pops the topmost snapshot and restores every recorded index.
    pub fn restore_indices(&mut self) {
        if let Some(snapshot) = self.index_stack.pop() {
            for (tid, index) in snapshot {
                if let Some(trace) = self.get_mut(&tid) {
                    trace.set(index);
                }
            }
        }
    }

    /// Registers a virtual signal and returns its handle. A qualified
    /// name picks the trace explicitly, otherwise the single loaded
    /// trace is used.
    pub fn add_virtual_signal(
        &mut self,
        name: &str,
        exprs: Vec<crate::value::Value>,
    ) -> Result<Rc<VirtualSignal>, EvalError> {
        let separator = self.separator;
        if let Some(pos) = name.find(separator) {
            let tid = name[..pos].to_string();
            let bare = name[pos + 1..].to_string();
            let trace = self.get_mut(&tid).ok_or_else(|| {
                EvalError::runtime("defsig", format!("no trace with id {}", tid))
            })?;
            let vs = Rc::new(VirtualSignal::new(bare, exprs));
            trace.add_virtual_signal(vs.clone());
            return Ok(vs);
        }
        match self.traces.len() {
            0 => Err(EvalError::runtime("defsig", "no traces loaded")),
            1 => {
                let trace = &mut self.traces[0].1;
                let vs = Rc::new(VirtualSignal::new(name, exprs));
                trace.add_virtual_signal(vs.clone());
                Ok(vs)
            }
            _ => Err(EvalError::runtime(
                "defsig",
                format!(
                    "{} is ambiguous with several traces loaded; qualify it as id{}name",
                    name, separator
                ),
            )),
        }
    }

    /// Snaps every trace back to index 0 and drops all virtual signals,
    /// as part of an evaluator reset.
    pub fn reset(&mut self) {
        self.index_stack.clear();
        for (_, trace) in self.traces.iter_mut() {
            trace.set(0);
            trace.clear_virtual_signals();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    const VCD: &str = "\
$timescale 1ns $end
$scope module top $end
$var wire 1 ! clk $end
$var wire 8 \" counter $end
$upscope $end
$enddefinitions $end
#0
0!
b00000000 \"
#10
1!
b00000001 \"
#20
0!
b00000010 \"
";

    fn value(read: SignalRead) -> Value {
        match read {
            SignalRead::Value(v) => v,
            SignalRead::Virtual(..) => panic!("expected plain value"),
        }
    }

    #[test]
    fn test_single_trace_routing() {
        let mut container = TraceContainer::new();
        container.load_vcd_str(VCD, "t0").unwrap();
        assert!(container.contains("top.clk"));
        assert!(container.contains("t0^top.clk"));
        assert!(!container.contains("top.missing"));
        assert_eq!(
            value(container.signal_value("top.counter", 0, "").unwrap()),
            Value::Int(0)
        );
    }

    #[test]
    fn test_multi_trace_requires_qualified_names() {
        let mut container = TraceContainer::new();
        container.load_vcd_str(VCD, "a").unwrap();
        container.load_vcd_str(VCD, "b").unwrap();
        assert!(container.signal_value("top.clk", 0, "").is_err());
        assert_eq!(
            value(container.signal_value("b^top.clk", 0, "").unwrap()),
            Value::Int(0)
        );
        assert!(container.signals().contains(&"a^top.clk".to_string()));
    }

    #[test]
    fn test_duplicate_trace_id_refused() {
        let mut container = TraceContainer::new();
        container.load_vcd_str(VCD, "t0").unwrap();
        assert!(container.load_vcd_str(VCD, "t0").is_err());
    }

    #[test]
    fn test_store_restore_indices() {
        let mut container = TraceContainer::new();
        container.load_vcd_str(VCD, "t0").unwrap();
        container.store_indices();
        container.step(2, None).unwrap();
        assert_eq!(container.get("t0").unwrap().index, 2);
        container.restore_indices();
        assert_eq!(container.get("t0").unwrap().index, 0);
    }

    #[test]
    fn test_step_reports_ended_traces() {
        let mut container = TraceContainer::new();
        container.load_vcd_str(VCD, "t0").unwrap();
        assert_eq!(container.step(2, None).unwrap(), Vec::<String>::new());
        assert_eq!(container.step(1, None).unwrap(), vec!["t0".to_string()]);
    }
}
