// ABOUTME: User-created virtual traces that hold only virtual signals

use crate::error::EvalError;
use crate::trace::{SignalSource, Trace};
use std::collections::HashMap;

/// Creates an empty trace with synthetic timestamps `0..=max_index`.
/// Signals are added later with `defsig`.
pub fn new_virtual(tid: &str, max_index: usize) -> Result<Trace, EvalError> {
    let timestamps: Vec<u64> = (0..=max_index as u64).collect();
    Trace::from_parts(
        tid,
        "virtual",
        None,
        timestamps,
        Vec::new(),
        Vec::new(),
        HashMap::new(),
        SignalSource::Virtual,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Value, VirtualSignal};
    use std::rc::Rc;

    #[test]
    fn test_new_virtual_trace() {
        let trace = new_virtual("v", 9).unwrap();
        assert_eq!(trace.max_index, 9);
        assert_eq!(trace.timestamps.len(), 10);
        assert!(trace.rawsignals.is_empty());
    }

    #[test]
    fn test_virtual_signal_lookup() {
        let mut trace = new_virtual("v", 3).unwrap();
        trace.add_virtual_signal(Rc::new(VirtualSignal::new("ramp", vec![Value::Int(1)])));
        assert!(trace.contains("ramp"));
        assert!(matches!(
            trace.signal_value("ramp", 0, "", false).unwrap(),
            crate::trace::SignalRead::Virtual(..)
        ));
    }
}
