//! Script error taxonomy.
//!
//! Every failure in the scripting core is fatal to the evaluation call that
//! raised it.  Errors carry the source [`Position`] of the token or node that
//! caused them so the host can report `line:col` context.

use std::fmt;

use thiserror::Error;

/// A 1-based source position.  Columns count code points, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(line: usize, col: usize) -> Self {
        Position { line, col }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position { line: 1, col: 1 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("{pos}: unexpected character {ch:?}")]
    UnexpectedChar { ch: char, pos: Position },
    #[error("{pos}: unterminated string literal")]
    UnterminatedString { pos: Position },
    #[error("{pos}: integer literal {text} does not fit in 64 bits")]
    IntegerOverflow { text: String, pos: Position },
}

impl LexError {
    pub fn position(&self) -> Position {
        match self {
            LexError::UnexpectedChar { pos, .. }
            | LexError::UnterminatedString { pos }
            | LexError::IntegerOverflow { pos, .. } => *pos,
        }
    }
}

// ── Parser ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{pos}: expected {expected}, found {found}")]
pub struct ParseError {
    pub expected: String,
    pub found: String,
    pub pos: Position,
}

impl ParseError {
    pub fn new(expected: impl Into<String>, found: impl Into<String>, pos: Position) -> Self {
        ParseError {
            expected: expected.into(),
            found: found.into(),
            pos,
        }
    }
}

// ── Runtime ───────────────────────────────────────────────────────────────────

/// What went wrong during evaluation, independent of where.
///
/// Native functions return this directly; the interpreter wraps it in a
/// [`RuntimeError`] carrying the position of the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("variable [{0}] not defined")]
    UndefinedVariable(String),
    #[error("function [{0}] not defined")]
    UndefinedFunction(String),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("{name}: expected {expected} argument(s), got {found}")]
    ArityMismatch {
        name: String,
        expected: String,
        found: usize,
    },
    #[error("division by zero")]
    DivideByZero,
    #[error("integer overflow")]
    Overflow,
    #[error("index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: i64, len: usize },
    /// An `import` the host did not splice in.
    #[error("not implemented: {0}")]
    NotImplemented(String),
    #[error("assertion failed")]
    AssertionFailed,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("[{0}] used outside of a loop")]
    MisplacedControl(&'static str),
    #[error("function [{0}] already registered")]
    DuplicateFunction(String),
}

impl ErrorKind {
    pub fn at(self, pos: Position) -> RuntimeError {
        RuntimeError { kind: self, pos }
    }

    pub(crate) fn type_mismatch(msg: impl Into<String>) -> Self {
        ErrorKind::TypeMismatch(msg.into())
    }

    pub(crate) fn arity(name: &str, expected: impl Into<String>, found: usize) -> Self {
        ErrorKind::ArityMismatch {
            name: name.to_owned(),
            expected: expected.into(),
            found,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{pos}: {kind}")]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub pos: Position,
}

// ── Umbrella ──────────────────────────────────────────────────────────────────

/// Any error the lex → parse → evaluate pipeline can produce.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("lex error at {0}")]
    Lex(#[from] LexError),
    #[error("parse error at {0}")]
    Parse(#[from] ParseError),
    #[error("runtime error at {0}")]
    Runtime(#[from] RuntimeError),
}

impl ScriptError {
    pub fn position(&self) -> Position {
        match self {
            ScriptError::Lex(e) => e.position(),
            ScriptError::Parse(e) => e.pos,
            ScriptError::Runtime(e) => e.pos,
        }
    }

    /// The runtime error kind, if this is a runtime failure.
    pub fn kind(&self) -> Option<&ErrorKind> {
        match self {
            ScriptError::Runtime(e) => Some(&e.kind),
            _ => None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
