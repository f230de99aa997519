// ABOUTME: VCD trace backend with a hand-rolled token scanner

use crate::error::EvalError;
use crate::trace::{normalize_name, SignalSource, Trace};
use std::collections::HashMap;

const SKIPPED_HEADER_COMMANDS: [&str; 3] = ["$comment", "$version", "$date"];

fn vcd_error(message: impl Into<String>) -> EvalError {
    EvalError::runtime("load", message.into())
}

/// Parses the text VCD format into a trace.
///
/// The header section recognises `$scope`, `$var`, `$upscope`,
/// `$timescale` and `$enddefinitions` and skips comment-like sections.
/// In the body every `#time` marker appends a row that repeats each
/// signal's previous value, and the value changes that follow overwrite
/// the current row.
pub fn parse_vcd(data: &str, tid: &str, filename: &str) -> Result<Trace, EvalError> {
    let tokens: Vec<&str> = data.split_whitespace().collect();
    let mut i = 0;
    let at = |i: usize| -> Result<&str, EvalError> {
        tokens
            .get(i)
            .copied()
            .ok_or_else(|| vcd_error("unexpected end of VCD header"))
    };

    let mut scope_stack: Vec<String> = Vec::new();
    let mut scopes: Vec<String> = Vec::new();
    let mut rawsignals: Vec<String> = Vec::new();
    let mut name_to_id: HashMap<String, String> = HashMap::new();
    let mut widths: HashMap<String, u32> = HashMap::new();
    let mut ids: Vec<String> = Vec::new();
    let mut timescale = None;

    // header section
    loop {
        match at(i)? {
            "$scope" => {
                let name = normalize_name(at(i + 2)?);
                scope_stack.push(name);
                scopes.push(scope_stack.join("."));
                i += 4;
            }
            "$var" => {
                let width_str = at(i + 2)?;
                let width: u32 = width_str
                    .parse()
                    .map_err(|_| vcd_error(format!("bad $var width {}", width_str)))?;
                let id = at(i + 3)?.to_string();
                let name = normalize_name(at(i + 4)?);
                let fullname = if scope_stack.is_empty() {
                    name
                } else {
                    format!("{}.{}", scope_stack.join("."), name)
                };

                if !name_to_id.contains_key(&fullname) {
                    ids.push(id.clone());
                    rawsignals.push(fullname.clone());
                    widths.insert(fullname.clone(), width);
                    name_to_id.insert(fullname, id);
                }

                if at(i + 5)? == "$end" {
                    i += 6;
                } else if at(i + 5)?.starts_with('[') {
                    i += 7;
                } else {
                    return Err(vcd_error(format!("malformed $var near {}", at(i + 4)?)));
                }
            }
            "$upscope" => {
                scope_stack.pop();
                i += 2;
            }
            "$enddefinitions" => {
                i += 2;
                break;
            }
            "$timescale" => {
                if at(i + 3)? == "$end" {
                    timescale = Some(format!("{}{}", at(i + 1)?, at(i + 2)?));
                    i += 4;
                } else if at(i + 2)? == "$end" {
                    timescale = Some(at(i + 1)?.to_string());
                    i += 3;
                } else {
                    return Err(vcd_error("malformed $timescale"));
                }
            }
            cmd if SKIPPED_HEADER_COMMANDS.contains(&cmd) => {
                while at(i)? != "$end" {
                    i += 1;
                }
                i += 1;
            }
            _ => i += 1,
        }
    }

    // dump section: every id starts with an 'x' placeholder row that is
    // dropped once the first timestamp has materialized real rows
    let mut data_by_id: HashMap<&str, Vec<String>> =
        ids.iter().map(|id| (id.as_str(), vec!["x".to_string()])).collect();
    let mut timestamps: Vec<u64> = Vec::new();

    while i < tokens.len() {
        let token = tokens[i];
        if let Some(time) = token.strip_prefix('#') {
            let time: u64 = time
                .parse()
                .map_err(|_| vcd_error(format!("bad timestamp {}", token)))?;
            for values in data_by_id.values_mut() {
                let last = values.last().cloned().unwrap_or_else(|| "x".to_string());
                values.push(last);
            }
            timestamps.push(time);
            i += 1;
        } else if let Some(bits) = token.strip_prefix('b') {
            let id = at(i + 1)?;
            if let Some(values) = data_by_id.get_mut(id) {
                if let Some(last) = values.last_mut() {
                    *last = bits.to_string();
                }
            }
            i += 2;
        } else if token.starts_with(['0', '1', 'x', 'z', 'X', 'Z']) {
            let (value, id) = token.split_at(1);
            if let Some(values) = data_by_id.get_mut(id) {
                if let Some(last) = values.last_mut() {
                    *last = value.to_lowercase();
                }
            }
            i += 1;
        } else if token == "$comment" {
            while at(i)? != "$end" {
                i += 1;
            }
            i += 1;
        } else {
            // $dumpvars, $dumpall, $dumpoff, $dumpon, $end: keep reading
            // the value changes that follow
            i += 1;
        }
    }

    for values in data_by_id.values_mut() {
        values.remove(0);
    }

    // store by signal name, dropping the indirection through ids
    let data: HashMap<String, Vec<String>> = rawsignals
        .iter()
        .map(|name| {
            let id = name_to_id[name].as_str();
            (name.clone(), data_by_id[id].clone())
        })
        .collect();

    Trace::from_parts(
        tid,
        filename,
        timescale,
        timestamps,
        scopes,
        rawsignals,
        widths,
        SignalSource::Vcd { data },
    )
}
