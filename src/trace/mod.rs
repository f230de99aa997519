// ABOUTME: Uniform waveform model shared by the VCD, CSV and FST backends

pub mod container;
pub mod csv;
#[cfg(feature = "fst")]
pub mod fst;
pub mod vcd;
pub mod virt;

pub use container::TraceContainer;

use crate::error::{ErrorKind, EvalError};
use crate::value::{Value, VirtualSignal};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Names resolved by every trace instead of its signal table.
pub const SPECIAL_SIGNALS: [&str; 9] = [
    "SIGNALS",
    "LOCAL-SIGNALS",
    "INDEX",
    "MAX-INDEX",
    "TS",
    "TRACE-NAME",
    "TRACE-FILE",
    "SCOPES",
    "LOCAL-SCOPES",
];

pub fn is_special(name: &str) -> bool {
    SPECIAL_SIGNALS.contains(&name)
}

/// Result of a signal lookup. Virtual signals are computed by the
/// evaluator, so the trace layer hands back the handle and the timestamp
/// to cache under instead of a value.
pub enum SignalRead {
    Value(Value),
    Virtual(Rc<VirtualSignal>, u64),
}

/// Normalizes an instance name the way all backends agree on:
/// `reg[3]` and `reg(3)` become `reg<3>` so sub-indices cannot collide
/// with language operators, and a trailing `[hi:lo]` width is dropped.
pub fn normalize_name(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '[' || c == '(' {
            let close = if c == '[' { ']' } else { ')' };
            let mut j = i + 1;
            let mut digits = String::new();
            while j < chars.len() && chars[j].is_ascii_digit() {
                digits.push(chars[j]);
                j += 1;
            }
            if !digits.is_empty() && j < chars.len() && chars[j] == close {
                out.push('<');
                out.push_str(&digits);
                out.push('>');
                i = j + 1;
                continue;
            }
            if c == '[' && !digits.is_empty() && j < chars.len() && chars[j] == ':' {
                let mut k = j + 1;
                let mut any = false;
                while k < chars.len() && chars[k].is_ascii_digit() {
                    any = true;
                    k += 1;
                }
                if any && k < chars.len() && chars[k] == ']' {
                    while out.ends_with(' ') {
                        out.pop();
                    }
                    i = k + 1;
                    continue;
                }
            }
        }
        out.push(c);
        i += 1;
    }
    out
}

/// Where a concrete backend keeps its decoded values. VCD and CSV hold
/// everything in memory; FST looks values up per call.
pub enum SignalSource {
    Vcd { data: HashMap<String, Vec<String>> },
    Csv { data: HashMap<String, Vec<String>> },
    #[cfg(feature = "fst")]
    Fst(fst::FstSource),
    Virtual,
}

impl SignalSource {
    fn raw(&self, name: &str, index: usize, timestamp: u64) -> Option<String> {
        match self {
            SignalSource::Vcd { data } | SignalSource::Csv { data } => {
                data.get(name).and_then(|values| values.get(index).cloned())
            }
            #[cfg(feature = "fst")]
            SignalSource::Fst(source) => source.value_at(name, index, timestamp),
            SignalSource::Virtual => {
                let _ = (name, index, timestamp);
                None
            }
        }
    }
}

/// One loaded waveform: an index-addressed, scoped, width-aware value
/// store with a movable current index.
pub struct Trace {
    pub tid: String,
    pub filename: String,
    pub timescale: Option<String>,
    all_timestamps: Vec<u64>,
    pub timestamps: Vec<u64>,
    lookup: Option<Vec<usize>>,
    pub index: usize,
    pub max_index: usize,
    pub scopes: Vec<String>,
    pub rawsignals: Vec<String>,
    widths: HashMap<String, u32>,
    signals: HashSet<String>,
    pub virtual_signals: HashMap<String, Rc<VirtualSignal>>,
    source: SignalSource,
}

impl Trace {
    pub(crate) fn from_parts(
        tid: &str,
        filename: &str,
        timescale: Option<String>,
        timestamps: Vec<u64>,
        scopes: Vec<String>,
        rawsignals: Vec<String>,
        widths: HashMap<String, u32>,
        source: SignalSource,
    ) -> Result<Trace, EvalError> {
        if timestamps.is_empty() {
            return Err(EvalError::runtime(
                "load",
                format!("trace {} contains no samples", filename),
            ));
        }
        let max_index = timestamps.len() - 1;
        let signals = rawsignals.iter().cloned().collect();
        Ok(Trace {
            tid: tid.to_string(),
            filename: filename.to_string(),
            timescale,
            all_timestamps: timestamps.clone(),
            timestamps,
            lookup: None,
            index: 0,
            max_index,
            scopes,
            rawsignals,
            widths,
            signals,
            virtual_signals: HashMap::new(),
            source,
        })
    }

    pub fn set(&mut self, index: usize) {
        self.index = index.min(self.max_index);
    }

    /// Moves the index by `steps`. Returns the trace id when the move
    /// would leave `[0, max_index]`; the index is unchanged in that case.
    pub fn step(&mut self, steps: i64) -> Option<String> {
        let target = self.index as i64 + steps;
        if target < 0 || target > self.max_index as i64 {
            return Some(self.tid.clone());
        }
        self.index = target as usize;
        None
    }

    /// Current timestamp.
    pub fn ts(&self) -> u64 {
        self.timestamps[self.index]
    }

    pub fn contains(&self, name: &str) -> bool {
        self.signals.contains(name) || is_special(name)
    }

    pub fn get_all_signals(&self) -> Vec<String> {
        let mut all = self.rawsignals.clone();
        let mut virtuals: Vec<String> = self.virtual_signals.keys().cloned().collect();
        virtuals.sort();
        all.extend(virtuals);
        all
    }

    pub fn signal_width(&self, name: &str) -> Result<u32, EvalError> {
        match self.widths.get(name) {
            Some(width) => Ok(*width),
            None => {
                if let Some(vs) = self.virtual_signals.get(name) {
                    return Ok(vs.width);
                }
                Err(EvalError::runtime(
                    "signal-width",
                    format!("no signal {} in trace {}", name, self.tid),
                ))
            }
        }
    }

    fn access(&self, name: &str, index: usize) -> Result<String, EvalError> {
        let physical = match &self.lookup {
            Some(lookup) => *lookup.get(index).unwrap_or(&index),
            None => index,
        };
        let ts = self.timestamps.get(index).copied().unwrap_or(0);
        self.source.raw(name, physical, ts).ok_or_else(|| {
            EvalError::new(ErrorKind::UndefinedSymbol(format!(
                "{} (trace {})",
                name, self.tid
            )))
        })
    }

    fn decode(raw: String) -> Value {
        // clean binary vectors become integers; x/z values stay strings
        match i64::from_str_radix(&raw, 2) {
            Ok(n) => Value::Int(n),
            Err(_) => Value::Str(raw),
        }
    }

    fn special_value(&self, name: &str, scope: &str, multi: bool) -> Value {
        match name {
            "SIGNALS" => {
                let mut all = self.get_all_signals();
                if multi {
                    all = all
                        .into_iter()
                        .map(|s| format!("{}{}{}", self.tid, container::DEFAULT_SEPARATOR, s))
                        .collect();
                }
                Value::list(all.into_iter().map(Value::Str).collect())
            }
            "LOCAL-SIGNALS" => {
                let locals: Vec<String> = if scope.is_empty() {
                    self.get_all_signals()
                        .into_iter()
                        .filter(|s| !s.contains('.'))
                        .collect()
                } else {
                    let prefix = format!("{}.", scope);
                    self.get_all_signals()
                        .into_iter()
                        .filter(|s| {
                            s.starts_with(&prefix) && !s[prefix.len()..].contains('.')
                        })
                        .collect()
                };
                Value::list(locals.into_iter().map(Value::Str).collect())
            }
            "INDEX" => Value::Int(self.index as i64),
            "MAX-INDEX" => Value::Int(self.max_index as i64),
            "TS" => Value::Int(self.ts() as i64),
            "TRACE-NAME" => Value::string(&self.tid),
            "TRACE-FILE" => Value::string(&self.filename),
            "SCOPES" => Value::list(self.scopes.iter().cloned().map(Value::Str).collect()),
            "LOCAL-SCOPES" => {
                let prefix = if scope.is_empty() {
                    String::new()
                } else {
                    format!("{}.", scope)
                };
                let locals: Vec<String> = self
                    .scopes
                    .iter()
                    .filter(|s| {
                        s.starts_with(&prefix)
                            && !s[(prefix.len() + 1).min(s.len())..].contains('.')
                    })
                    .cloned()
                    .collect();
                Value::list(locals.into_iter().map(Value::Str).collect())
            }
            _ => Value::Unit,
        }
    }

    /// The value of `name` at the current index plus `offset`. Reads past
    /// the end clamp to the last sample; negative positions are an error.
    pub fn signal_value(
        &self,
        name: &str,
        offset: i64,
        scope: &str,
        multi: bool,
    ) -> Result<SignalRead, EvalError> {
        let rel = self.index as i64 + offset;
        if rel >= 0 && rel <= self.max_index as i64 {
            let rel = rel as usize;
            if is_special(name) {
                return Ok(SignalRead::Value(self.special_value(name, scope, multi)));
            }
            if let Some(vs) = self.virtual_signals.get(name) {
                return Ok(SignalRead::Virtual(vs.clone(), self.timestamps[rel]));
            }
            return Ok(SignalRead::Value(Self::decode(self.access(name, rel)?)));
        }
        if rel > self.max_index as i64 {
            return Ok(SignalRead::Value(Self::decode(
                self.access(name, self.max_index)?,
            )));
        }
        Err(EvalError::new(ErrorKind::BadIndex {
            function: "signal-value".to_string(),
            index: rel,
        }))
    }

    /// Restricts sampling to the given positions of the original
    /// timestamp sequence. Resets the index and drops every virtual
    /// signal cache.
    pub fn set_sampling_points(&mut self, indices: &[usize]) -> Result<(), EvalError> {
        for &i in indices {
            if i >= self.all_timestamps.len() {
                return Err(EvalError::new(ErrorKind::BadIndex {
                    function: "sample-at".to_string(),
                    index: i as i64,
                }));
            }
        }
        if indices.is_empty() {
            return Err(EvalError::runtime("sample-at", "no sampling points given"));
        }
        let mut seen = HashSet::new();
        self.timestamps = indices
            .iter()
            .map(|&i| self.all_timestamps[i])
            .filter(|ts| seen.insert(*ts))
            .collect();
        self.lookup = Some(indices.to_vec());
        self.index = 0;
        self.max_index = self.timestamps.len() - 1;
        for vs in self.virtual_signals.values() {
            vs.cache.borrow_mut().clear();
        }
        Ok(())
    }

    pub fn add_virtual_signal(&mut self, vs: Rc<VirtualSignal>) {
        self.signals.insert(vs.name.clone());
        self.virtual_signals.insert(vs.name.clone(), vs);
    }

    pub fn clear_virtual_signals(&mut self) {
        for name in self.virtual_signals.keys() {
            self.signals.remove(name);
        }
        self.virtual_signals.clear();
    }
}
