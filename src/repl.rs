// ABOUTME: Interactive shell built on rustyline

use crate::config::{PROMPT, PROMPT_CONTINUE, VERSION, WELCOME_MESSAGE};
use crate::eval::Evaluator;
use crate::value::Value;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// Counts bracket nesting outside strings and comments, so expressions
/// can span lines until they balance.
fn balanced(code: &str) -> bool {
    let mut depth: i64 = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut in_comment = false;
    for c in code.chars() {
        if in_comment {
            if c == '\n' {
                in_comment = false;
            }
            continue;
        }
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            ';' => in_comment = true,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
    }
    depth <= 0 && !in_string
}

/// Runs the read-eval-print loop until EOF.
pub fn run(ev: &mut Evaluator) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("could not start the repl: {}", e);
            return;
        }
    };
    println!("{} v{}", WELCOME_MESSAGE, VERSION);

    let mut buffer = String::new();
    loop {
        let prompt = if buffer.is_empty() { PROMPT } else { PROMPT_CONTINUE };
        match editor.readline(prompt) {
            Ok(line) => {
                buffer.push_str(&line);
                buffer.push('\n');
                if !balanced(&buffer) {
                    continue;
                }
                let code = std::mem::take(&mut buffer);
                if code.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(code.trim());
                match ev.eval_source(&code, "<repl>") {
                    Ok(Value::Unit) => {}
                    Ok(value) => println!("{}", value),
                    Err(e) => {
                        eprintln!("{}", e);
                        let backtrace = e.render_backtrace();
                        if !backtrace.is_empty() {
                            eprint!("{}", backtrace);
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                buffer.clear();
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("repl error: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced() {
        assert!(balanced("(+ 1 2)"));
        assert!(balanced("42"));
        assert!(!balanced("(let ([x 1])"));
        assert!(balanced("(print \"(((\")"));
        assert!(!balanced("\"open string"));
        assert!(balanced("(+ 1 2) ; (comment"));
    }
}
