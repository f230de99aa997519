// ABOUTME: FST trace backend decoding values per call through fstapi

use crate::error::EvalError;
use crate::trace::{normalize_name, SignalSource, Trace};
use fstapi::Reader;
use std::cell::RefCell;
use std::collections::HashMap;

/// How many decoded (signal, index) values are kept before the oldest
/// entries are evicted.
const CACHE_CAPACITY: usize = 4096;

/// FST values are decoded on demand through the reader's handle lookup;
/// a bounded cache keeps the most recently used decodes.
pub struct FstSource {
    reader: RefCell<Reader>,
    handles: HashMap<String, fstapi::Handle>,
    timestamps: Vec<u64>,
    cache: RefCell<ValueCache>,
}

struct ValueCache {
    entries: HashMap<(String, usize), String>,
    order: std::collections::VecDeque<(String, usize)>,
}

impl ValueCache {
    fn new() -> Self {
        ValueCache {
            entries: HashMap::new(),
            order: std::collections::VecDeque::new(),
        }
    }

    fn get(&self, key: &(String, usize)) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: (String, usize), value: String) {
        if self.entries.len() >= CACHE_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        if self.entries.insert(key.clone(), value).is_none() {
            self.order.push_back(key);
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

impl FstSource {
    pub(crate) fn value_at(&self, name: &str, index: usize, timestamp: u64) -> Option<String> {
        let _ = index;
        let handle = *self.handles.get(name)?;
        let key = (name.to_string(), timestamp as usize);
        if let Some(hit) = self.cache.borrow().get(&key) {
            return Some(hit);
        }
        let mut reader = self.reader.borrow_mut();
        let value = reader
            .get_value_from_handle_at_time(timestamp, handle)
            .ok()?;
        self.cache.borrow_mut().put(key, value.clone());
        Some(value)
    }

    pub(crate) fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    pub(crate) fn timestamps(&self) -> &[u64] {
        &self.timestamps
    }
}

fn fst_error(message: impl std::fmt::Display) -> EvalError {
    EvalError::runtime("load", format!("fst: {}", message))
}

/// Opens an FST file, collecting scopes, normalized signal names and the
/// handle table used for per-call value decoding.
pub fn open_fst(file: &str, tid: &str) -> Result<Trace, EvalError> {
    let mut reader = Reader::open(file).map_err(fst_error)?;

    let mut scopes = Vec::new();
    let mut rawsignals = Vec::new();
    let mut widths = HashMap::new();
    let mut handles = HashMap::new();

    for var in reader.vars() {
        let (name, var) = var.map_err(fst_error)?;
        if var.is_alias() {
            continue;
        }
        let name = normalize_name(&name);
        widths.insert(name.clone(), var.length().unwrap_or(1));
        handles.insert(name.clone(), var.handle());
        rawsignals.push(name);
    }
    for scope in reader.scopes().map_err(fst_error)? {
        scopes.push(normalize_name(&scope));
    }

    let timestamps: Vec<u64> = reader.timestamps().map_err(fst_error)?;

    let source = FstSource {
        reader: RefCell::new(reader),
        handles,
        timestamps: timestamps.clone(),
        cache: RefCell::new(ValueCache::new()),
    };

    Trace::from_parts(
        tid,
        file,
        None,
        timestamps,
        scopes,
        rawsignals,
        widths,
        SignalSource::Fst(source),
    )
}
