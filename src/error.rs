//! Error types. The parser latches a single error; the executor never
//! errors (it only returns `success: false`).

use thiserror::Error;

/// A syntax or structural error raised while parsing a pattern. Carries the
/// byte offset into the source where the error was detected, matching the
/// original's latched `errorMsg_` plus `pc_` position.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("regexp syntax error at byte {offset}: {message}")]
pub struct ParseError {
    pub offset: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        ParseError { offset, message: message.into() }
    }
}

/// The flag-string parse error surfaced by [`crate::flags::Flags::parse`],
/// wrapped so callers of the top-level [`crate::parse`] entry point have a
/// single error type to match on.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unknown or duplicate regexp flag {0:?}")]
pub struct FlagError(pub char);
