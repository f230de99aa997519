// ABOUTME: Value types representing WAL data, expressions and runtime objects

use crate::env::Environment;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

/// Source location of a token or form, kept for diagnostics only.
/// Equality of values never looks at spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub file: Rc<str>,
    pub line: u32,
    pub column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

macro_rules! define_operators {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Tags for every built-in operation the evaluator dispatches on.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Operator {
            $($variant),+
        }

        impl Operator {
            pub fn name(self) -> &'static str {
                match self {
                    $(Operator::$variant => $name),+
                }
            }

            pub fn from_name(name: &str) -> Option<Operator> {
                match name {
                    $($name => Some(Operator::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

define_operators! {
    // arithmetic
    Add => "+",
    Sub => "-",
    Mul => "*",
    Div => "/",
    Exp => "**",
    Floor => "floor",
    Ceil => "ceil",
    Round => "round",
    Mod => "mod",
    // bitwise
    Bor => "bor",
    Band => "band",
    Bxor => "bxor",
    // comparison and logic
    Eq => "=",
    Neq => "!=",
    Larger => ">",
    Smaller => "<",
    LargerEqual => ">=",
    SmallerEqual => "<=",
    And => "&&",
    Or => "||",
    Not => "!",
    // binding
    Define => "define",
    Let => "let",
    Set => "set",
    Alias => "alias",
    Unalias => "unalias",
    // control
    If => "if",
    Case => "case",
    Do => "do",
    While => "while",
    // functions and macros
    Fn => "fn",
    Defmacro => "defmacro",
    Macroexpand => "macroexpand",
    Gensym => "gensym",
    Quote => "quote",
    Quasiquote => "quasiquote",
    Unquote => "unquote",
    UnquoteSplice => "unquote-splice",
    Eval => "eval",
    Parse => "parse",
    // I/O
    Print => "print",
    Printf => "printf",
    // lists
    List => "list",
    First => "first",
    Second => "second",
    Last => "last",
    Rest => "rest",
    In => "in",
    Map => "map",
    Max => "max",
    Min => "min",
    Average => "average",
    Zip => "zip",
    Length => "length",
    Fold => "fold",
    Range => "range",
    // arrays
    Array => "array",
    Seta => "seta",
    Geta => "geta",
    Dela => "dela",
    Mapa => "mapa",
    // types and conversion
    IsAtom => "atom?",
    IsSymbol => "symbol?",
    IsString => "string?",
    IsInt => "int?",
    IsList => "list?",
    IsDefined => "defined?",
    ConvertBinary => "convert/bin",
    StringToInt => "string->int",
    StringToSymbol => "string->symbol",
    SymbolToString => "symbol->string",
    IntToString => "int->string",
    BitsToSint => "bits->sint",
    // scopes and groups
    InScope => "in-scope",
    AllScopes => "all-scopes",
    ResolveScope => "resolve-scope",
    SetScope => "set-scope",
    UnsetScope => "unset-scope",
    Groups => "groups",
    InGroup => "in-group",
    InGroups => "in-groups",
    ResolveGroup => "resolve-group",
    // trace navigation
    Load => "load",
    Unload => "unload",
    Step => "step",
    Find => "find",
    FindG => "find/g",
    Whenever => "whenever",
    FoldSignal => "fold/signal",
    RelEval => "reval",
    SignalWidth => "signal-width",
    SampleAt => "sample-at",
    LoadedTraces => "loaded-traces",
    IsSignal => "signal?",
    // virtual signals
    Defsig => "defsig",
    NewTrace => "new-trace",
    DumpTrace => "dump-trace",
    // system
    Exit => "exit",
    Require => "require",
    EvalFile => "eval-file",
    Repl => "repl",
    // slicing
    Slice => "slice",
}

/// A symbol with an optional lexical resolution.
///
/// `steps` is attached by the resolve pass and counts the environment
/// frames between the use site and the binding frame (0 = innermost).
/// Symbols that may refer to waveform signals stay unresolved.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub steps: Option<usize>,
    pub span: Option<Span>,
}

impl Symbol {
    pub fn new(name: impl Into<String>) -> Self {
        Symbol {
            name: name.into(),
            steps: None,
            span: None,
        }
    }

    pub fn with_steps(name: impl Into<String>, steps: usize) -> Self {
        Symbol {
            name: name.into(),
            steps: Some(steps),
            span: None,
        }
    }

    pub fn with_span(mut self, span: Option<Span>) -> Self {
        self.span = span;
        self
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.steps == other.steps
    }
}

/// A list node. Carries the source span of its brackets when it came from
/// the reader; lists built at runtime have no span but evaluate the same.
#[derive(Debug, Clone)]
pub struct WList {
    pub items: Vec<Value>,
    pub span: Option<Span>,
}

impl WList {
    pub fn new(items: Vec<Value>) -> Self {
        WList { items, span: None }
    }

    pub fn with_span(items: Vec<Value>, span: Option<Span>) -> Self {
        WList { items, span }
    }
}

impl PartialEq for WList {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl Deref for WList {
    type Target = Vec<Value>;

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

impl DerefMut for WList {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.items
    }
}

impl From<Vec<Value>> for WList {
    fn from(items: Vec<Value>) -> Self {
        WList::new(items)
    }
}

/// Formal parameters of a closure or macro. A bare symbol collects the
/// whole argument list (variadic).
#[derive(Debug, Clone)]
pub enum Params {
    Fixed(Vec<Symbol>),
    Variadic(Symbol),
}

/// A function value: captured environment, parameters and a body expression.
#[derive(Debug)]
pub struct Closure {
    pub name: RefCell<String>,
    pub env: Rc<Environment>,
    pub params: Params,
    pub body: Value,
}

/// Like a closure but applied at expansion time; its body produces a new
/// expression that replaces the call site.
#[derive(Debug)]
pub struct MacroDef {
    pub name: String,
    pub params: Params,
    pub body: Value,
}

/// A named expression evaluated on demand against a trace, cached per
/// timestamp. The cache is dropped when the trace's sampling changes.
#[derive(Debug)]
pub struct VirtualSignal {
    pub name: String,
    pub width: u32,
    pub exprs: Vec<Value>,
    pub cache: RefCell<HashMap<u64, Value>>,
}

impl VirtualSignal {
    pub fn new(name: impl Into<String>, exprs: Vec<Value>) -> Self {
        VirtualSignal {
            name: name.into(),
            width: 32,
            exprs,
            cache: RefCell::new(HashMap::new()),
        }
    }
}

pub type ArrayRef = Rc<RefCell<BTreeMap<String, Value>>>;

#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Symbol(Symbol),
    Operator(Operator),
    List(WList),
    Array(ArrayRef),
    Closure(Rc<Closure>),
    Macro(Rc<MacroDef>),
    UserOp(String),
    Unquote(Box<Value>),
    UnquoteSplice(Box<Value>),
    Signal(Rc<VirtualSignal>),
    Unit,
}

impl Value {
    pub fn symbol(name: impl Into<String>) -> Value {
        Value::Symbol(Symbol::new(name))
    }

    pub fn string(s: impl Into<String>) -> Value {
        Value::Str(s.into())
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(WList::new(items))
    }

    pub fn array() -> Value {
        Value::Array(Rc::new(RefCell::new(BTreeMap::new())))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
            Value::Symbol(_) => "symbol",
            Value::Operator(_) => "operator",
            Value::List(_) => "list",
            Value::Array(_) => "array",
            Value::Closure(_) => "function",
            Value::Macro(_) => "macro",
            Value::UserOp(_) => "user-operator",
            Value::Unquote(_) => "unquote",
            Value::UnquoteSplice(_) => "unquote-splice",
            Value::Signal(_) => "virtual-signal",
            Value::Unit => "unit",
        }
    }

    /// Truthiness used by `if`, `while`, `&&`, `||` and the iteration
    /// combinators: false, 0, 0.0, "", () and unit are falsey.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Unit => false,
            _ => true,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Value::Symbol(s) => s.span.clone(),
            Value::List(l) => l.span.clone(),
            _ => None,
        }
    }

    /// Rendering for `print`: strings appear without quotes, everything
    /// else as in `Display`.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Unit => String::new(),
            other => format!("{}", other),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Operator(a), Value::Operator(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => *a.borrow() == *b.borrow(),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Macro(a), Value::Macro(b)) => Rc::ptr_eq(a, b),
            (Value::UserOp(a), Value::UserOp(b)) => a == b,
            (Value::Unquote(a), Value::Unquote(b)) => a == b,
            (Value::UnquoteSplice(a), Value::UnquoteSplice(b)) => a == b,
            (Value::Signal(a), Value::Signal(b)) => a.name == b.name,
            (Value::Unit, Value::Unit) => true,
            _ => false,
        }
    }
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            // {:?} keeps a trailing ".0" so floats read back as floats
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "\"{}\"", escape_string(s)),
            Value::Bool(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Value::Symbol(s) => write!(f, "{}", s.name),
            Value::Operator(op) => write!(f, "{}", op.name()),
            Value::List(items) => {
                // sugared forms print the way they are written
                if items.len() == 2 {
                    if let Value::Operator(Operator::Quote) = items[0] {
                        return write!(f, "'{}", items[1]);
                    }
                    if let Value::Operator(Operator::Quasiquote) = items[0] {
                        return write!(f, "`{}", items[1]);
                    }
                }
                if items.len() == 3 {
                    if let (Value::Operator(Operator::RelEval), Value::Int(off)) =
                        (&items[0], &items[2])
                    {
                        return write!(f, "{}@{}", items[1], off);
                    }
                }
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Value::Array(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "(\"{}\" {})", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Closure(c) => write!(f, "#<fn {}>", c.name.borrow()),
            Value::Macro(m) => write!(f, "#<macro {}>", m.name),
            Value::UserOp(name) => write!(f, "#<operator {}>", name),
            Value::Unquote(inner) => write!(f, ",{}", inner),
            Value::UnquoteSplice(inner) => write!(f, ",@{}", inner),
            Value::Signal(sig) => write!(f, "#<signal {}>", sig.name),
            Value::Unit => write!(f, "none"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_names_round_trip() {
        for op in [
            Operator::Add,
            Operator::FindG,
            Operator::ConvertBinary,
            Operator::StringToInt,
            Operator::ResolveScope,
            Operator::FoldSignal,
        ] {
            assert_eq!(Operator::from_name(op.name()), Some(op));
        }
        assert_eq!(Operator::from_name("no-such-op"), None);
    }

    #[test]
    fn test_symbol_equality_ignores_span() {
        let span = Span {
            file: "test.wal".into(),
            line: 1,
            column: 1,
            end_line: 1,
            end_column: 2,
        };
        let a = Symbol::new("x").with_span(Some(span));
        let b = Symbol::new("x");
        assert_eq!(a, b);
        assert_ne!(Symbol::with_steps("x", 0), Symbol::new("x"));
    }

    #[test]
    fn test_list_display() {
        let list = Value::list(vec![
            Value::Operator(Operator::Add),
            Value::Int(1),
            Value::list(vec![Value::Int(2), Value::Int(3)]),
        ]);
        assert_eq!(format!("{}", list), "(+ 1 (2 3))");
    }

    #[test]
    fn test_quote_and_reval_display() {
        let quoted = Value::list(vec![Value::Operator(Operator::Quote), Value::symbol("x")]);
        assert_eq!(format!("{}", quoted), "'x");

        let timed = Value::list(vec![
            Value::Operator(Operator::RelEval),
            Value::symbol("clk"),
            Value::Int(-1),
        ]);
        assert_eq!(format!("{}", timed), "clk@-1");
    }

    #[test]
    fn test_float_display_reads_back_as_float() {
        assert_eq!(format!("{}", Value::Float(5.0)), "5.0");
        assert_eq!(format!("{}", Value::Float(-2.5)), "-2.5");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(!Value::list(vec![]).is_truthy());
        assert!(!Value::Unit.is_truthy());
        assert!(Value::Int(-1).is_truthy());
        assert!(Value::string("a").is_truthy());
    }

    #[test]
    fn test_numeric_equality_promotes() {
        assert_eq!(Value::Int(3), Value::Float(3.0));
        assert_ne!(Value::Int(3), Value::Float(3.5));
        assert_ne!(Value::Int(1), Value::Bool(true));
    }
}
