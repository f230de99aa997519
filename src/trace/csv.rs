// ABOUTME: CSV trace backend for logic-analyzer exports

use crate::error::EvalError;
use crate::trace::{normalize_name, SignalSource, Trace};
use std::collections::HashMap;

const TIME_COLUMN: &str = "Time [s]";

fn csv_error(message: impl Into<String>) -> EvalError {
    EvalError::runtime("load", message.into())
}

/// Converts a decimal seconds string like `1.5` to integer nanoseconds.
fn seconds_to_ns(text: &str) -> Result<u64, EvalError> {
    let (whole, frac) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text, ""),
    };
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(csv_error(format!("bad timestamp \"{}\"", text)));
    }
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(csv_error(format!("bad timestamp \"{}\"", text)));
    }
    let mut padded = frac.to_string();
    padded.truncate(9);
    while padded.len() < 9 {
        padded.push('0');
    }
    let combined = format!("{}{}", whole, padded);
    combined
        .parse()
        .map_err(|_| csv_error(format!("timestamp \"{}\" out of range", text)))
}

/// Parses a CSV export: a header row with one `Time [s]` column plus one
/// column per signal. Values are stored verbatim as strings and parsed
/// at use.
pub fn parse_csv(data: &str, tid: &str, filename: &str) -> Result<Trace, EvalError> {
    let mut lines = data.trim().lines();
    let header_line = lines.next().ok_or_else(|| csv_error("empty CSV file"))?;
    let header: Vec<&str> = header_line.split(',').map(str::trim).collect();
    let time_idx = header
        .iter()
        .position(|h| *h == TIME_COLUMN)
        .ok_or_else(|| csv_error(format!("no \"{}\" column in CSV header", TIME_COLUMN)))?;

    // spaces become underscores, bracketed indices are normalized
    let names: Vec<String> = header
        .iter()
        .map(|h| normalize_name(&h.replace(' ', "_")))
        .collect();

    let mut rawsignals = Vec::new();
    let mut widths = HashMap::new();
    let mut columns: HashMap<String, Vec<String>> = HashMap::new();
    for (i, name) in names.iter().enumerate() {
        if i == time_idx {
            continue;
        }
        rawsignals.push(name.clone());
        widths.insert(name.clone(), 1);
        columns.insert(name.clone(), Vec::new());
    }

    let mut timestamps = Vec::new();
    for line in lines {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != header.len() {
            return Err(csv_error(format!("ragged CSV row \"{}\"", line)));
        }
        timestamps.push(seconds_to_ns(fields[time_idx])?);
        for (i, field) in fields.iter().enumerate() {
            if i == time_idx {
                continue;
            }
            if let Some(column) = columns.get_mut(&names[i]) {
                column.push(field.to_string());
            }
        }
    }

    Trace::from_parts(
        tid,
        filename,
        None,
        timestamps,
        Vec::new(),
        rawsignals,
        widths,
        SignalSource::Csv { data: columns },
    )
}
