//! Pica: an API test runner driven by a small scripting language.
//!
//! The language lives in [`script`]; everything else turns a script into
//! HTTP requests and checks the responses.

pub mod cli;
pub mod commands;
pub mod config;
pub mod convert;
pub mod error;
pub mod fake;
pub mod http;
pub mod output;
pub mod runner;
pub mod script;

pub use error::{Error, Result};
