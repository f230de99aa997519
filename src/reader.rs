// ABOUTME: Reader module turning WAL program text into expression trees

use nom::{
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit0, digit1, multispace1},
    combinator::{opt, recognize},
    IResult, Parser,
};

use crate::error::ParseError;
use crate::value::{Operator, Span, Symbol, Value, WList};
use std::rc::Rc;

/// Characters that may start a base symbol.
fn symbol_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '.'
}

/// Characters that may continue a base symbol. The class is wide on
/// purpose: signal names normalized from waveforms contain `<3>`, `$`,
/// `:` and similar, and they must read back as one token.
fn symbol_char(c: char) -> bool {
    c.is_alphanumeric() || "._$/:=?%^!~+<>|,-".contains(c)
}

/// Skip whitespace and `;` line comments.
fn ws(input: &str) -> IResult<&str, ()> {
    let mut rest = input;
    loop {
        if let Ok((r, _)) = multispace1::<_, nom::error::Error<_>>(rest) {
            rest = r;
            continue;
        }
        if rest.starts_with(';') {
            let (r, _) = take_while::<_, _, nom::error::Error<_>>(|c| c != '\n')(rest)?;
            rest = r;
            continue;
        }
        break;
    }
    Ok((rest, ()))
}

/// Operator tokens, longest first so `**`, `&&`, `>=` win over their
/// one-character prefixes.
const OPERATOR_TOKENS: [&str; 14] = [
    "**", "&&", "||", "!=", ">=", "<=", "+", "-", "*", "/", "=", ">", "<", "!",
];

fn fail(input: &str) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Fail))
}

fn unrecoverable(input: &str) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Fail))
}

/// Parse an integer literal: decimal (signed), `0x…` hex or `0b…` binary.
/// Floats (`-?\d+\.\d*`) are recognised here too so the shared prefix is
/// only scanned once.
fn parse_number(input: &str) -> IResult<&str, Value> {
    if let Ok((rest, _)) = tag::<_, _, nom::error::Error<_>>("0x")(input) {
        let (rest, digits) = take_while1(|c: char| c.is_ascii_hexdigit())(rest)?;
        let n = i64::from_str_radix(digits, 16).map_err(|_| unrecoverable(input))?;
        return Ok((rest, Value::Int(n)));
    }
    if let Ok((rest, _)) = tag::<_, _, nom::error::Error<_>>("0b")(input) {
        let (rest, digits) = take_while1(|c: char| c == '0' || c == '1')(rest)?;
        let n = i64::from_str_radix(digits, 2).map_err(|_| unrecoverable(input))?;
        return Ok((rest, Value::Int(n)));
    }

    // float first: -?digits '.' digits*
    if let Ok((rest, text)) = recognize((opt(char::<_, nom::error::Error<_>>('-')), digit1, char('.'), digit0))
        .parse(input)
    {
        let x: f64 = text.parse().map_err(|_| unrecoverable(input))?;
        return Ok((rest, Value::Float(x)));
    }

    let (rest, text) =
        recognize((opt(char::<_, nom::error::Error<_>>('-')), digit1)).parse(input)?;
    let n: i64 = text.parse().map_err(|_| unrecoverable(input))?;
    Ok((rest, Value::Int(n)))
}

/// Parse a string literal with C-style escapes.
fn parse_string(input: &str) -> IResult<&str, Value> {
    let (rest, _) = char('"')(input)?;
    let mut out = String::new();
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((&rest[i + 1..], Value::Str(out))),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, '0')) => out.push('\0'),
                Some((_, '\\')) => out.push('\\'),
                Some((_, '"')) => out.push('"'),
                Some((_, '\'')) => out.push('\''),
                Some((_, other)) => {
                    out.push('\\');
                    out.push(other);
                }
                None => return Err(unrecoverable(input)),
            },
            _ => out.push(c),
        }
    }
    // ran off the end without a closing quote
    Err(unrecoverable(input))
}

/// Parse `[INT]` or `[hi:lo]` immediately following an expression.
/// Returns None when the brackets hold anything else, in which case the
/// `[` opens an ordinary bracket list instead.
fn slice_indices(input: &str) -> Option<(&str, i64, Option<i64>)> {
    let rest = input.strip_prefix('[')?;
    let end = rest.find(|c: char| !c.is_ascii_digit())?;
    if end == 0 {
        return None;
    }
    let hi: i64 = rest[..end].parse().ok()?;
    let rest = &rest[end..];
    if let Some(rest) = rest.strip_prefix(']') {
        return Some((rest, hi, None));
    }
    let rest = rest.strip_prefix(':')?;
    let end = rest.find(|c: char| !c.is_ascii_digit())?;
    if end == 0 {
        return None;
    }
    let lo: i64 = rest[..end].parse().ok()?;
    let rest = rest[end..].strip_prefix(']')?;
    Some((rest, hi, Some(lo)))
}

pub struct Reader<'a> {
    src: &'a str,
    file: Rc<str>,
}

impl<'a> Reader<'a> {
    pub fn new(src: &'a str, file: &str) -> Self {
        Reader {
            src,
            file: Rc::from(file),
        }
    }

    fn offset(&self, rest: &str) -> usize {
        self.src.len() - rest.len()
    }

    fn position(&self, offset: usize) -> (u32, u32) {
        let before = &self.src[..offset.min(self.src.len())];
        let line = before.bytes().filter(|b| *b == b'\n').count() as u32 + 1;
        let column = match before.rfind('\n') {
            Some(nl) => (before.len() - nl) as u32,
            None => before.len() as u32 + 1,
        };
        (line, column)
    }

    fn span(&self, start: usize, end: usize) -> Span {
        let (line, column) = self.position(start);
        let (end_line, end_column) = self.position(end);
        Span {
            file: self.file.clone(),
            line,
            column,
            end_line,
            end_column,
        }
    }

    /// The source line containing `offset`, with a caret underneath.
    fn excerpt(&self, offset: usize) -> String {
        let offset = offset.min(self.src.len());
        let start = self.src[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let end = self.src[offset..]
            .find('\n')
            .map(|i| offset + i)
            .unwrap_or(self.src.len());
        let line = &self.src[start..end];
        let caret = " ".repeat(offset - start) + "^";
        format!("{}\n{}", line, caret)
    }

    fn parse_error(&self, rest: &str) -> ParseError {
        let offset = self.offset(rest);
        let (line, column) = self.position(offset);
        let message = match rest.chars().next() {
            Some(c) => format!("Unexpected \"{}\" at line {}:{}", c, line, column),
            None => format!(
                "Unexpected end of file at line {}:{}.\nDid you forget a closing )?",
                line, column
            ),
        };
        ParseError::new(self.excerpt(offset), message)
    }

    fn expr<'b>(&self, input: &'b str) -> IResult<&'b str, Value> {
        let (input, _) = ws(input)?;
        let start = self.offset(input);
        let first = match input.chars().next() {
            Some(c) => c,
            None => return Err(fail(input)),
        };

        let (rest, value) = match first {
            '\'' => {
                let (rest, inner) = self.expr(&input[1..])?;
                let span = self.span(start, self.offset(rest));
                (
                    rest,
                    Value::List(WList::with_span(
                        vec![Value::Operator(Operator::Quote), inner],
                        Some(span),
                    )),
                )
            }
            '`' => {
                let (rest, inner) = self.expr(&input[1..])?;
                let span = self.span(start, self.offset(rest));
                (
                    rest,
                    Value::List(WList::with_span(
                        vec![Value::Operator(Operator::Quasiquote), inner],
                        Some(span),
                    )),
                )
            }
            ',' => {
                if let Some(after) = input[1..].strip_prefix('@') {
                    let (rest, inner) = self.expr(after)?;
                    (rest, Value::UnquoteSplice(Box::new(inner)))
                } else {
                    let (rest, inner) = self.expr(&input[1..])?;
                    (rest, Value::Unquote(Box::new(inner)))
                }
            }
            '(' | '[' | '{' => self.list(input)?,
            '"' => parse_string(input)?,
            '~' => self.sigil(input, Operator::ResolveScope)?,
            '#' => self.sigil(input, Operator::ResolveGroup)?,
            c if c.is_ascii_digit() => parse_number(input)?,
            '-' if input[1..].starts_with(|c: char| c.is_ascii_digit()) => parse_number(input)?,
            c if symbol_start(c) => self.symbol(input)?,
            _ => self.operator_token(input)?,
        };

        self.postfix(rest, value, start)
    }

    /// `~name` and `#name` expand to their resolver call.
    fn sigil<'b>(&self, input: &'b str, op: Operator) -> IResult<&'b str, Value> {
        let start = self.offset(input);
        let rest = &input[1..];
        if !rest.starts_with(symbol_start) {
            return Err(fail(input));
        }
        let (rest, sym) = self.symbol(rest)?;
        let span = self.span(start, self.offset(rest));
        Ok((
            rest,
            Value::List(WList::with_span(
                vec![Value::Operator(op), sym],
                Some(span),
            )),
        ))
    }

    /// Base symbols; `true`/`false` and operator names are recognised here.
    fn symbol<'b>(&self, input: &'b str) -> IResult<&'b str, Value> {
        let start = self.offset(input);
        let (rest, name) = take_while1(symbol_char)(input)?;
        let value = match name {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => match Operator::from_name(name) {
                Some(op) => Value::Operator(op),
                None => {
                    let span = self.span(start, self.offset(rest));
                    Value::Symbol(Symbol::new(name).with_span(Some(span)))
                }
            },
        };
        Ok((rest, value))
    }

    fn operator_token<'b>(&self, input: &'b str) -> IResult<&'b str, Value> {
        for tok in OPERATOR_TOKENS {
            if let Some(rest) = input.strip_prefix(tok) {
                let op = Operator::from_name(tok).expect("token table matches operator names");
                return Ok((rest, Value::Operator(op)));
            }
        }
        Err(fail(input))
    }

    fn list<'b>(&self, input: &'b str) -> IResult<&'b str, Value> {
        let start = self.offset(input);
        let close = match input.chars().next() {
            Some('(') => ')',
            Some('[') => ']',
            Some('{') => '}',
            _ => return Err(fail(input)),
        };
        let mut rest = &input[1..];
        let mut items = Vec::new();
        loop {
            let (r, _) = ws(rest)?;
            if let Some(r) = r.strip_prefix(close) {
                let span = self.span(start, self.offset(r));
                return Ok((r, Value::List(WList::with_span(items, Some(span)))));
            }
            if r.is_empty() {
                return Err(unrecoverable(r));
            }
            let (r, item) = self.expr(r)?;
            items.push(item);
            rest = r;
        }
    }

    /// Postfix forms bind tighter than anything else and may stack:
    /// `x[3]`, `x[7:0]`, `x@-1`, `x[0]@2`.
    fn postfix<'b>(
        &self,
        mut input: &'b str,
        mut value: Value,
        start: usize,
    ) -> IResult<&'b str, Value> {
        loop {
            if input.starts_with('[') {
                match slice_indices(input) {
                    Some((rest, hi, lo)) => {
                        let span = self.span(start, self.offset(rest));
                        let mut items =
                            vec![Value::Operator(Operator::Slice), value, Value::Int(hi)];
                        if let Some(lo) = lo {
                            items.push(Value::Int(lo));
                        }
                        value = Value::List(WList::with_span(items, Some(span)));
                        input = rest;
                    }
                    // not a slice; the bracket starts a separate list
                    None => break,
                }
            } else if let Some(rest) = input.strip_prefix('@') {
                let (rest, text) =
                    recognize((opt(char::<_, nom::error::Error<_>>('-')), digit1)).parse(rest)?;
                let offset: i64 = text.parse().map_err(|_| unrecoverable(input))?;
                let span = self.span(start, self.offset(rest));
                value = Value::List(WList::with_span(
                    vec![Value::Operator(Operator::RelEval), value, Value::Int(offset)],
                    Some(span),
                ));
                input = rest;
            } else {
                break;
            }
        }
        Ok((input, value))
    }
}

/// Read a single expression. Trailing input other than whitespace and
/// comments is an error.
pub fn read_sexpr(code: &str, file: &str) -> Result<Value, ParseError> {
    let reader = Reader::new(code, file);
    let (rest, value) = reader.expr(code).map_err(|e| match e {
        nom::Err::Error(e) | nom::Err::Failure(e) => reader.parse_error(e.input),
        nom::Err::Incomplete(_) => reader.parse_error(""),
    })?;
    let (rest, _) = ws(rest).unwrap_or((rest, ()));
    if !rest.is_empty() {
        return Err(reader.parse_error(rest));
    }
    Ok(value)
}

/// Read a whole program: any number of expressions. A `#!` line at the
/// very start is ignored.
pub fn read_sexprs(code: &str, file: &str) -> Result<Vec<Value>, ParseError> {
    let reader = Reader::new(code, file);
    let mut rest = code;
    if rest.starts_with("#!") {
        rest = match rest.find('\n') {
            Some(i) => &rest[i + 1..],
            None => "",
        };
    }
    let mut exprs = Vec::new();
    loop {
        let (r, _) = ws(rest).unwrap_or((rest, ()));
        if r.is_empty() {
            return Ok(exprs);
        }
        let (r, expr) = reader.expr(r).map_err(|e| match e {
            nom::Err::Error(e) | nom::Err::Failure(e) => reader.parse_error(e.input),
            nom::Err::Incomplete(_) => reader.parse_error(""),
        })?;
        exprs.push(expr);
        rest = r;
    }
}
