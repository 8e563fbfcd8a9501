//! The pica scripting language.
//!
//! A small dynamically-typed language for describing API checks:
//!
//! - Integers, strings, booleans, lists and records (`{ key = value }`)
//! - Binary arithmetic and comparison with conventional precedence
//! - Field access `a.b`, `a['X-Key']` and method calls `a.f()` with `this`
//! - `if` / `else`, `for i, v in xs`, user functions with `return`
//! - Built-ins (`echo`, `base64encode`, `assert`, …) plus host-registered
//!   functions via [`Interpreter::register_function`]
//!
//! # Quick start
//!
//! ```rust
//! use pica::script::{Interpreter, Value};
//!
//! let mut interp = Interpreter::new();
//! interp.run_source("x = 6\necholn(x * 7)").unwrap();
//! assert_eq!(interp.output, vec!["42"]);
//! assert_eq!(interp.get("x"), Some(&Value::Int(6)));
//! ```

pub mod ast;
pub mod builtins;
pub mod error;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod value;

pub use ast::{format_block, Block, Stmt, StmtKind};
pub use error::{ErrorKind, LexError, ParseError, Position, RuntimeError, ScriptError};
pub use interp::{ControlFlow, Interpreter, NativeFn};
pub use value::{Record, Value};

/// Lex and parse a whole source string.
pub fn parse(src: &str) -> Result<Block, ScriptError> {
    let tokens = lexer::tokenize(src)?;
    Ok(parser::Parser::new(tokens).parse()?)
}

/// Parse and re-serialize source in canonical form.
pub fn format_source(src: &str) -> Result<String, ScriptError> {
    Ok(format_block(&parse(src)?))
}
