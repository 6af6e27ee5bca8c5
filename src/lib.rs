//! A bytecode compiler and backtracking executor for ECMAScript regular
//! expressions.
//!
//! [`parse`] turns a pattern source and flag string into a [`Program`]: a
//! compact bytecode image plus the named-capture table resolved while
//! parsing. [`Program::exec`] runs that bytecode against a subject string
//! from a given start index, backtracking through alternatives, quantifiers
//! and lookaround the way the `RegExp.prototype.exec` algorithm does.
//!
//! ```
//! use ecma_regexp::Program;
//!
//! let program = Program::compile(r"(\d{4})-(\d{2})-(\d{2})", "").unwrap();
//! let m = program.exec("2024-11-07", 0).unwrap();
//! assert_eq!(m.range(), (0, 10));
//! assert_eq!(m.group(1), Some("2024"));
//! assert_eq!(m.group(2), Some("11"));
//! ```

mod buffer;
mod emit;
mod error;
mod exec;
mod flags;
mod image;
mod interval;
mod opcode;
#[cfg(feature = "trace")]
mod opcode_dump;
pub mod parser;
mod tables;

pub use error::{FlagError, ParseError};
pub use exec::{Capture, MatchResult};
pub use flags::Flags;
pub use image::{BytecodeImage, Header};
pub use interval::RangeSet;
pub use parser::ParsedRegExp;

use exec::{Executor, Utf16Input};

/// A compiled pattern: the bytecode image plus the named-capture table,
/// ready to execute against any number of subject strings.
#[derive(Clone, Debug)]
pub struct Program {
    image: BytecodeImage,
    group_names: Vec<(String, u32)>,
}

/// One successful match against a specific subject, keeping the UTF-16 view
/// alive so [`Match::group`] can report capture text.
pub struct Match<'p, 's> {
    program: &'p Program,
    input: Utf16Input,
    result: MatchResult,
    _subject: &'s str,
}

impl Program {
    /// Parse `source` under the one-letter `flags` (any of `gimsuy`) into a
    /// runnable program. This is the `parse` half of the public surface:
    /// syntax and flag errors are reported here, never at match time.
    pub fn compile(source: &str, flags: &str) -> Result<Program, CompileError> {
        let flags = Flags::parse(flags).map_err(FlagError)?;
        let parsed = parser::parse(source, flags)?;
        Ok(Program { image: parsed.image, group_names: parsed.group_names })
    }

    pub fn header(&self) -> Header {
        self.image.header()
    }

    /// The names of every named capture group, in capture-index order.
    pub fn group_names(&self) -> &[(String, u32)] {
        &self.group_names
    }

    /// Try to match against `subject`, starting no earlier than code-unit
    /// offset `start_index`. This is the `execute` half of the public
    /// surface. Returns `None` when no match is found; the executor itself
    /// never errors.
    pub fn exec<'p, 's>(&'p self, subject: &'s str, start_index: usize) -> Option<Match<'p, 's>> {
        let input = Utf16Input::new(subject);
        let executor = Executor::new(&self.image, &input);
        let result = executor.exec(start_index)?;
        Some(Match { program: self, input, result, _subject: subject })
    }

    #[cfg(feature = "trace")]
    pub fn dump(&self) -> String {
        self.image.dump()
    }
}

impl<'p, 's> Match<'p, 's> {
    /// Code-unit offsets of the whole match (capture 0).
    pub fn range(&self) -> (usize, usize) {
        self.result.range()
    }

    /// Code-unit offsets of capture group `index`, or `None` if that group
    /// didn't participate in the match.
    pub fn group_range(&self, index: usize) -> Option<(usize, usize)> {
        self.result.captures.get(index).copied().flatten()
    }

    /// The substring a capture group matched, or `None` if it didn't
    /// participate. Byte offsets are recovered from the UTF-16 index kept
    /// alongside the match.
    pub fn group(&self, index: usize) -> Option<&'s str> {
        let (start, end) = self.group_range(index)?;
        let byte_start = self.input.byte_offset(start);
        let byte_end = self.input.byte_offset(end);
        Some(&self._subject[byte_start..byte_end])
    }

    /// The substring matched by a named capture group.
    pub fn named_group(&self, name: &str) -> Option<&'s str> {
        let index = self.program.group_names.iter().find(|(n, _)| n == name)?.1;
        self.group(index as usize)
    }

    pub fn captures_len(&self) -> usize {
        self.result.captures.len()
    }
}

/// Either half of [`Program::compile`] can fail: an unknown/duplicate flag
/// letter, or a pattern syntax error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Flag(#[from] FlagError),
    #[error(transparent)]
    Syntax(#[from] ParseError),
}

/// Parse a pattern directly into a [`ParsedRegExp`] (bytecode image + group
/// names), without wrapping it in [`Program`]. Exposed for callers that want
/// the lower-level pieces (e.g. to dump the bytecode or reuse the image
/// across a custom executor wrapper).
pub fn parse(source: &str, flags: Flags) -> Result<ParsedRegExp, ParseError> {
    parser::parse(source, flags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_and_matches() {
        let program = Program::compile(r"(\w+)@(\w+)\.com", "").unwrap();
        let m = program.exec("contact: alice@example.com today", 0).unwrap();
        assert_eq!(m.group(0), Some("alice@example.com"));
        assert_eq!(m.group(1), Some("alice"));
        assert_eq!(m.group(2), Some("example"));
    }

    #[test]
    fn named_groups_are_reachable_by_name() {
        let program = Program::compile(r"(?<user>\w+)@(?<host>\w+)", "").unwrap();
        let m = program.exec("bob@example", 0).unwrap();
        assert_eq!(m.named_group("user"), Some("bob"));
        assert_eq!(m.named_group("host"), Some("example"));
    }

    #[test]
    fn no_match_returns_none() {
        let program = Program::compile("xyz", "").unwrap();
        assert!(program.exec("abc", 0).is_none());
    }

    #[test]
    fn bad_flags_are_rejected() {
        assert!(Program::compile("a", "q").is_err());
    }

    #[test]
    fn bad_syntax_is_rejected() {
        assert!(Program::compile("(a", "").is_err());
    }

    #[test]
    fn header_reports_program_shape() {
        let program = Program::compile("(a)(b)", "").unwrap();
        let header = program.header();
        assert_eq!(header.num_captures, 3); // whole match + 2 groups
    }
}
