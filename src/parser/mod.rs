//! The recursive-descent RegExp parser (component D). Grounded on
//! `RegExpParser::Parse`/`ParseDisjunction`/`ParseAlternative`/
//! `ParseAssertionCapture`/`ParseQuantifier`/`ParseAtomEscape`/
//! `ParseCharacterEscape`/`ParseClassRanges` in
//! `ecmascript/regexp/regexp_parser.cpp`: same grammar, same emission
//! strategy (insert-before-body for alternation/quantifiers, rotate-to-front
//! for backward/lookbehind emission), ported from the original's raw
//! `pc_`/`c0_` byte pointer onto [`lexer::Lexer`]'s codepoint-level cursor.
//!
//! Differences from the original, each a deliberate simplification rather
//! than a semantic change (see `DESIGN.md`):
//! - One Unicode scalar value of lookahead instead of one byte, so no
//!   special-casing is needed to decode pattern characters above `0x7F`.
//! - Checkpoint/restore (a position+lookahead snapshot) instead of raw
//!   pointer rewinding for the handful of speculative parses (`{`-quantifier
//!   lookahead, `\u{...}`).
//! - `\k<Name>`/`(?<Name>` group-name lexing reads directly off the shared
//!   cursor instead of the original's detour through a second raw pointer.

pub mod lexer;
pub mod unicode;

use crate::buffer::Buffer;
use crate::error::ParseError;
use crate::flags::Flags;
use crate::image::BytecodeImage;
use crate::interval::RangeSet;
use crate::opcode::Op;
use crate::tables;
use crate::{emit, opcode};
use lexer::{Lexer, EOF};

/// Successful parse: the finished bytecode image plus the named-capture
/// table resolved during parsing. Named-capture lookup is only needed while
/// parsing `\k<Name>`, so the table is handed back to the caller rather than
/// persisted in the bytecode image.
#[derive(Clone, Debug)]
pub struct ParsedRegExp {
    pub image: BytecodeImage,
    pub group_names: Vec<(String, u32)>,
}

enum AtomEscape {
    /// A single code point to emit as `CHAR`/`CHAR32` (or a case-folded
    /// `RANGE` under `iu`), still pending canonicalization by the caller.
    Literal(u32),
    /// The opcode(s) were already emitted (backreference, shorthand class,
    /// or a latched error).
    Handled,
}

enum ClassAtom {
    Char(u32),
    /// `\d \D \s \S \w \W` (or a no-op `\p{...}`): a whole set rather than a
    /// single code point, so a following `-` may not start a range (the
    /// original's `CLASS_RANGE_BASE` sentinel).
    Shorthand(RangeSet),
}

fn insert_class_atom(result: &mut RangeSet, atom: ClassAtom) {
    match atom {
        ClassAtom::Char(c) => result.insert(c, c),
        ClassAtom::Shorthand(set) => result.insert_set(&set),
    }
}

pub struct Parser<'s> {
    lexer: Lexer<'s>,
    buf: Buffer,
    flags: Flags,
    capture_count: u32,
    stack_count: u32,
    group_names: Vec<(String, u32)>,
    error: Option<ParseError>,
    total_capture_count: Option<u32>,
}

pub fn parse(source: &str, flags: Flags) -> Result<ParsedRegExp, ParseError> {
    let parser = Parser::new(source, flags);
    parser.run()
}

impl<'s> Parser<'s> {
    fn new(source: &'s str, flags: Flags) -> Self {
        Parser {
            lexer: Lexer::new(source.as_bytes()),
            buf: Buffer::new(),
            flags,
            capture_count: 0,
            stack_count: 0,
            group_names: Vec::new(),
            error: None,
            total_capture_count: None,
        }
    }

    fn c0(&self) -> u32 {
        self.lexer.c0
    }

    fn advance(&mut self) {
        self.lexer.advance();
    }

    fn failed(&self) -> bool {
        self.error.is_some()
    }

    fn fail(&mut self, message: impl Into<String>) {
        if self.error.is_none() {
            self.error = Some(ParseError::new(self.lexer.c0_offset, message));
        }
    }

    fn is_unicode(&self) -> bool {
        self.flags.unicode()
    }

    fn is_ignore_case(&self) -> bool {
        self.flags.ignore_case()
    }

    /// Top-level entry: `Pattern[U, N] ::= Disjunction`, wrapped in the
    /// implicit whole-match capture and the 16-byte header.
    fn run(mut self) -> Result<ParsedRegExp, ParseError> {
        self.buf.emit_u32(0);
        self.buf.emit_u32(0);
        self.buf.emit_u32(0);
        self.buf.emit_u32(0);

        let capture_index = self.capture_count;
        self.capture_count += 1;
        emit::save_start(&mut self.buf, capture_index as u8);
        self.parse_disjunction(false);
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.c0() != EOF {
            self.fail("extraneous characters at the end");
            return Err(self.error.unwrap());
        }
        emit::save_end(&mut self.buf, capture_index as u8);
        emit::match_end(&mut self.buf);

        let size = self.buf.size() as u32;
        self.buf.put_u32(0, size);
        self.buf.put_u32(4, self.capture_count);
        self.buf.put_u32(8, self.stack_count);
        self.buf.put_u32(12, self.flags.bits());

        Ok(ParsedRegExp { image: BytecodeImage::from_buffer(self.buf), group_names: self.group_names })
    }

    // ---- Disjunction / Alternative -------------------------------------

    fn parse_disjunction(&mut self, backward: bool) {
        let start = self.buf.size();
        self.parse_alternative(backward);
        if self.failed() {
            return;
        }
        while self.c0() == '|' as u32 {
            let len = self.buf.size() - start;
            let goto_size = Op::Goto.fixed_size();
            let offset_at = emit::insert_split(&mut self.buf, start, Op::SplitNext);
            self.buf.put_i32(offset_at, (len + goto_size) as i32);
            self.advance();

            let goto_pc = self.buf.size();
            let goto_operand = emit::goto_placeholder(&mut self.buf);
            self.parse_alternative(backward);
            let patched = (self.buf.size() - goto_pc - goto_size) as i32;
            self.buf.put_i32(goto_operand, patched);

            if self.failed() {
                return;
            }
        }
    }

    fn parse_alternative(&mut self, backward: bool) {
        let start = self.buf.size();
        while self.c0() != '|' as u32 && self.c0() != EOF && self.c0() != ')' as u32 {
            if self.failed() {
                return;
            }
            let atom_start = self.buf.size();
            let (is_atom, capture_index) = self.parse_term(backward);
            if self.failed() {
                return;
            }
            if is_atom {
                self.parse_quantifier(atom_start, capture_index, self.capture_count.saturating_sub(1));
                if self.failed() {
                    return;
                }
            }
            if backward {
                let end = self.buf.size();
                self.buf.rotate_to_front(start, atom_start, end);
            }
        }
    }

    /// One `Term`: an `Assertion` or an `Atom Quantifier?`. Returns whether
    /// it was an atom (eligible for a following quantifier) and, if it was
    /// itself a capturing group, that group's capture index. 0 means "not a
    /// capturing group", mirroring the original's sentinel: index 0 is the
    /// whole-match group and never reused.
    fn parse_term(&mut self, backward: bool) -> (bool, u32) {
        match self.c0() {
            c if c == '^' as u32 => {
                emit::line_start(&mut self.buf);
                self.advance();
                (false, 0)
            }
            c if c == '$' as u32 => {
                emit::line_end(&mut self.buf);
                self.advance();
                (false, 0)
            }
            c if c == '\\' as u32 => {
                self.advance();
                match self.c0() {
                    b if b == 'b' as u32 => {
                        emit::word_boundary(&mut self.buf, false);
                        self.advance();
                        (false, 0)
                    }
                    b if b == 'B' as u32 => {
                        emit::word_boundary(&mut self.buf, true);
                        self.advance();
                        (false, 0)
                    }
                    _ => {
                        match self.parse_atom_escape(backward) {
                            AtomEscape::Literal(value) => self.emit_literal_atom_escape(value, backward),
                            AtomEscape::Handled => {}
                        }
                        (true, 0)
                    }
                }
            }
            c if c == '(' as u32 => {
                self.advance();
                let (is_atom, capture_index) = self.parse_assertion_capture(backward);
                self.advance();
                (is_atom, capture_index)
            }
            c if c == '.' as u32 => {
                if backward {
                    emit::prev(&mut self.buf);
                }
                if self.flags.dot_all() {
                    emit::all(&mut self.buf);
                } else {
                    emit::dots(&mut self.buf);
                }
                if backward {
                    emit::prev(&mut self.buf);
                }
                self.advance();
                (true, 0)
            }
            c if c == '[' as u32 => {
                self.advance();
                if backward {
                    emit::prev(&mut self.buf);
                }
                let mut invert = false;
                if self.c0() == '^' as u32 {
                    invert = true;
                    self.advance();
                }
                let Some(mut set) = self.parse_class_ranges() else { return (true, 0) };
                if invert {
                    set.invert(self.is_unicode());
                }
                emit::range(&mut self.buf, &set);
                if backward {
                    emit::prev(&mut self.buf);
                }
                (true, 0)
            }
            c if c == '*' as u32 || c == '+' as u32 || c == '?' as u32 => {
                self.fail("nothing to repeat");
                (false, 0)
            }
            c if c == '{' as u32 => {
                let checkpoint = self.lexer.save();
                if self.try_parse_interval_quantifier().is_some() {
                    self.fail("nothing to repeat");
                    return (false, 0);
                }
                self.lexer.restore(checkpoint);
                if self.is_unicode() {
                    self.fail("Lone quantifier brackets");
                    return (false, 0);
                }
                self.parse_pattern_character(backward)
            }
            c if c == '}' as u32 || c == ']' as u32 => {
                if self.is_unicode() {
                    self.fail("syntax error");
                    return (false, 0);
                }
                self.parse_pattern_character(backward)
            }
            EOF => (false, 0),
            _ => self.parse_pattern_character(backward),
        }
    }

    fn parse_pattern_character(&mut self, backward: bool) -> (bool, u32) {
        if backward {
            emit::prev(&mut self.buf);
        }
        let mut value = self.c0();
        if self.is_ignore_case() {
            value = tables::canonicalize(value, self.is_unicode());
        }
        emit::any_char(&mut self.buf, value);
        if backward {
            emit::prev(&mut self.buf);
        }
        self.advance();
        (true, 0)
    }

    fn emit_literal_atom_escape(&mut self, value: u32, backward: bool) {
        if backward {
            emit::prev(&mut self.buf);
        }
        if self.is_ignore_case() {
            if !self.is_unicode() {
                let folded = tables::canonicalize(value, false);
                emit::any_char(&mut self.buf, folded);
            } else {
                let set = case_fold_closure(value);
                emit::range(&mut self.buf, &set);
            }
        } else {
            emit::any_char(&mut self.buf, value);
        }
        if backward {
            emit::prev(&mut self.buf);
        }
    }

    // ---- Groups, assertions, lookaround ---------------------------------

    /// `GroupOrAssert` inside `(...)`: non-capturing, lookaround, named or
    /// plain capturing. Called with `(` already consumed; leaves the cursor
    /// at the matching `)`, not consumed, same as the original (the caller
    /// advances past it).
    fn parse_assertion_capture(&mut self, backward: bool) -> (bool, u32) {
        let mut is_atom;
        let mut capture_index = 0u32;
        loop {
            if self.c0() == '?' as u32 {
                self.advance();
                match self.c0() {
                    c if c == '=' as u32 => {
                        self.advance();
                        self.emit_lookaround(backward, false);
                        is_atom = true;
                    }
                    c if c == '!' as u32 => {
                        self.advance();
                        self.emit_lookaround(backward, true);
                        is_atom = true;
                    }
                    c if c == '<' as u32 => {
                        self.advance();
                        if self.c0() == '=' as u32 {
                            self.advance();
                            self.emit_lookaround(true, false);
                            is_atom = true;
                        } else if self.c0() == '!' as u32 {
                            self.advance();
                            self.emit_lookaround(true, true);
                            is_atom = true;
                        } else {
                            let Some(name) = self.parse_group_specifier() else {
                                self.fail("GroupName Syntax error.");
                                return (false, 0);
                            };
                            if self.find_group_name(&name).is_some() {
                                self.fail("Duplicate GroupName error.");
                                return (false, 0);
                            }
                            is_atom = true;
                            capture_index = self.emit_capturing_group(backward, Some(name));
                        }
                    }
                    c if c == ':' as u32 => {
                        self.advance();
                        is_atom = true;
                        self.parse_disjunction(backward);
                    }
                    _ => {
                        self.advance();
                        self.fail("? Syntax error.");
                        return (false, 0);
                    }
                }
            } else {
                is_atom = true;
                capture_index = self.emit_capturing_group(backward, None);
            }
            if self.c0() == ')' as u32 || self.c0() == EOF {
                break;
            }
        }
        if self.c0() != ')' as u32 {
            self.fail("capture syntax error");
            return (false, 0);
        }
        (is_atom, capture_index)
    }

    fn emit_lookaround(&mut self, backward: bool, negative: bool) {
        let start = self.buf.size();
        self.parse_disjunction(backward);
        emit::match_now(&mut self.buf);
        let len = self.buf.size() - start;
        let op = if negative { Op::NegativeMatchAhead } else { Op::MatchAhead };
        let offset_at = emit::insert_split(&mut self.buf, start, op);
        self.buf.put_i32(offset_at, len as i32);
    }

    fn emit_capturing_group(&mut self, backward: bool, name: Option<String>) -> u32 {
        let capture_index = self.capture_count;
        self.capture_count += 1;
        if let Some(name) = name {
            self.group_names.push((name, capture_index));
        }
        if backward {
            emit::save_end(&mut self.buf, capture_index as u8);
        } else {
            emit::save_start(&mut self.buf, capture_index as u8);
        }
        self.parse_disjunction(backward);
        if backward {
            emit::save_start(&mut self.buf, capture_index as u8);
        } else {
            emit::save_end(&mut self.buf, capture_index as u8);
        }
        capture_index
    }

    /// Read a `GroupName` (`(?<Name>` or `\k<Name>`) with the cursor already
    /// past the opening `<`. Consumes through and including the closing `>`.
    fn parse_group_specifier(&mut self) -> Option<String> {
        let mut name = String::new();
        loop {
            let c = if self.c0() == '\\' as u32 {
                self.advance();
                if self.c0() != 'u' as u32 {
                    return None;
                }
                self.advance();
                let mut value = 0u32;
                if !self.parse_unicode_escape(&mut value) {
                    return None;
                }
                value
            } else if self.c0() == '>' as u32 {
                break;
            } else if self.c0() == EOF {
                return None;
            } else {
                let c = self.c0();
                self.advance();
                c
            };
            if name.is_empty() {
                if !unicode::is_id_start(c) {
                    return None;
                }
            } else if !unicode::is_id_continue(c) {
                return None;
            }
            name.push(char::from_u32(c)?);
        }
        self.advance(); // consume '>'
        Some(name)
    }

    fn find_group_name(&self, name: &str) -> Option<u32> {
        self.group_names.iter().find(|(n, _)| n == name).map(|(_, idx)| *idx)
    }

    // ---- Quantifiers ------------------------------------------------------

    fn parse_quantifier(&mut self, atom_start: usize, capture_start: u32, capture_end: u32) {
        let mut greedy = true;
        let bounds = match self.c0() {
            c if c == '*' as u32 => {
                self.advance();
                Some((0u32, u32::MAX))
            }
            c if c == '+' as u32 => {
                self.advance();
                Some((1u32, u32::MAX))
            }
            c if c == '?' as u32 => {
                self.advance();
                Some((0u32, 1u32))
            }
            c if c == '{' as u32 => {
                let checkpoint = self.lexer.save();
                match self.try_parse_interval_quantifier() {
                    Some((min, max)) => {
                        if min > max {
                            self.fail("Invalid repetition count");
                            return;
                        }
                        Some((min, max))
                    }
                    None => {
                        self.lexer.restore(checkpoint);
                        None
                    }
                }
            }
            _ => None,
        };
        let Some((min, max)) = bounds else { return };

        if self.c0() == '?' as u32 {
            greedy = false;
            self.advance();
        } else if matches!(self.c0(), c if c == '?' as u32 || c == '+' as u32 || c == '*' as u32 || c == '{' as u32)
        {
            self.fail("nothing to repeat");
            return;
        }

        self.stack_count += 1;
        emit::insert_push(&mut self.buf, atom_start);
        let cursor = atom_start + Op::Push.fixed_size();

        if capture_start != 0 {
            emit::insert_save_reset(&mut self.buf, cursor, capture_start as u8, capture_end as u8);
        }

        // The loop jumps back to body_start on each iteration, so PUSH_CHAR
        // and SAVE_RESET both land inside the repeated body: PUSH_CHAR keeps
        // its CHECK_CHAR counterpart balanced every pass, and SAVE_RESET
        // clears the quantified atom's captures on every pass, the way
        // RepeatMatcher resets them before each iteration.
        let body_start = cursor;

        if max == u32::MAX {
            self.stack_count += 1;
            emit::insert_push_char(&mut self.buf, cursor);
            emit::check_char(&mut self.buf, opcode::Op::Loop.fixed_size() as u32);
        }

        let loop_pc_end = self.buf.size() + Op::Loop.fixed_size();
        let back_offset = (body_start as i64 - loop_pc_end as i64) as i32;
        emit::loop_(&mut self.buf, greedy, min, max, back_offset);

        if min == 0 {
            let skip = self.buf.size() - body_start;
            let op = if greedy { Op::SplitNext } else { Op::SplitFirst };
            let offset_at = emit::insert_split(&mut self.buf, body_start, op);
            self.buf.put_i32(offset_at, skip as i32);
        }

        emit::pop(&mut self.buf);
    }

    fn try_parse_interval_quantifier(&mut self) -> Option<(u32, u32)> {
        self.advance(); // consume '{'
        let min = self.parse_decimal_digits();
        let mut max = min;
        if self.c0() == ',' as u32 {
            self.advance();
            if self.c0() == '}' as u32 {
                max = u32::MAX;
                self.advance();
            } else {
                max = self.parse_decimal_digits();
                if self.c0() == '}' as u32 {
                    self.advance();
                } else {
                    return None;
                }
            }
        } else if self.c0() == '}' as u32 {
            self.advance();
        } else {
            self.advance();
            return None;
        }
        Some((min, max))
    }

    fn parse_decimal_digits(&mut self) -> u32 {
        let mut result: u64 = 0;
        while self.c0() >= '0' as u32 && self.c0() <= '9' as u32 {
            result = result * 10 + (self.c0() - '0' as u32) as u64;
            if result > u32::MAX as u64 {
                result = u32::MAX as u64;
            }
            self.advance();
        }
        result as u32
    }

    // ---- Escapes ----------------------------------------------------------

    fn parse_atom_escape(&mut self, backward: bool) -> AtomEscape {
        match self.c0() {
            EOF => {
                self.fail("unexpected end");
                AtomEscape::Handled
            }
            c if ('1' as u32..='9' as u32).contains(&c) => {
                let capture = self.parse_decimal_digits();
                if capture > self.capture_count.saturating_sub(1) && capture > self.total_capture_count().saturating_sub(1)
                {
                    self.fail("invalid backreference count");
                    return AtomEscape::Handled;
                }
                emit::backreference(&mut self.buf, capture as u8, backward);
                AtomEscape::Handled
            }
            c if c == 'd' as u32 => {
                self.emit_range_escape(tables::RANGE_DIGIT.clone(), backward);
                AtomEscape::Handled
            }
            c if c == 'D' as u32 => {
                let mut set = tables::RANGE_DIGIT.clone();
                set.invert(self.is_unicode());
                self.emit_range_escape(set, backward);
                AtomEscape::Handled
            }
            c if c == 's' as u32 => {
                self.emit_range_escape(tables::RANGE_SPACE.clone(), backward);
                AtomEscape::Handled
            }
            c if c == 'S' as u32 => {
                let mut set = tables::RANGE_SPACE.clone();
                set.invert(self.is_unicode());
                self.emit_range_escape(set, backward);
                AtomEscape::Handled
            }
            c if c == 'w' as u32 => {
                self.emit_range_escape(tables::RANGE_WORD.clone(), backward);
                AtomEscape::Handled
            }
            c if c == 'W' as u32 => {
                let mut set = tables::RANGE_WORD.clone();
                set.invert(self.is_unicode());
                self.emit_range_escape(set, backward);
                AtomEscape::Handled
            }
            c if c == 'p' as u32 || c == 'P' as u32 => {
                self.advance();
                self.parse_unicode_property_escape();
                AtomEscape::Handled
            }
            c if c == 'k' as u32 => {
                self.advance();
                if self.c0() != '<' as u32 && (!self.is_unicode() || !self.group_names.is_empty()) {
                    self.fail("expecting group name.");
                    return AtomEscape::Handled;
                }
                self.advance();
                let Some(name) = self.parse_group_specifier() else {
                    self.fail("GroupName Syntax error.");
                    return AtomEscape::Handled;
                };
                let position = match self.find_group_name(&name) {
                    Some(p) => p,
                    None => {
                        let Some(p) = self.scan_capture_index_for_name(&name) else {
                            if !self.is_unicode() || !self.group_names.is_empty() {
                                self.fail("group name not defined");
                            }
                            return AtomEscape::Handled;
                        };
                        p
                    }
                };
                emit::backreference(&mut self.buf, position as u8, backward);
                AtomEscape::Handled
            }
            _ => match self.parse_character_escape() {
                Some(value) => AtomEscape::Literal(value),
                None => AtomEscape::Handled,
            },
        }
    }

    fn emit_range_escape(&mut self, set: RangeSet, backward: bool) {
        if backward {
            emit::prev(&mut self.buf);
        }
        emit::range(&mut self.buf, &set);
        if backward {
            emit::prev(&mut self.buf);
        }
        self.advance();
    }

    /// `\p{...}` / `\P{...}`: syntactically consumed per ES2015, no
    /// semantic effect on the emitted program.
    fn parse_unicode_property_escape(&mut self) {
        if self.c0() != '{' as u32 {
            return;
        }
        self.advance();
        while self.c0() != '}' as u32 && self.c0() != EOF {
            self.advance();
        }
        if self.c0() == '}' as u32 {
            self.advance();
        }
    }

    fn parse_character_escape(&mut self) -> Option<u32> {
        match self.c0() {
            c if c == 'f' as u32 => {
                self.advance();
                Some(0x0C)
            }
            c if c == 'n' as u32 => {
                self.advance();
                Some(0x0A)
            }
            c if c == 'r' as u32 => {
                self.advance();
                Some(0x0D)
            }
            c if c == 't' as u32 => {
                self.advance();
                Some(0x09)
            }
            c if c == 'v' as u32 => {
                self.advance();
                Some(0x0B)
            }
            c if c == 'c' as u32 => {
                self.advance();
                let letter = self.c0();
                if (('A' as u32..='Z' as u32).contains(&letter)) || (('a' as u32..='z' as u32).contains(&letter)) {
                    self.advance();
                    Some(letter & 0x1f)
                } else if !self.is_unicode() {
                    Some('\\' as u32)
                } else {
                    self.fail("Invalid control letter");
                    None
                }
            }
            c if c == '0' as u32 => {
                let next_is_digit = matches!(self.lexer.peek_byte(), Some(b) if b.is_ascii_digit());
                if self.is_unicode() && !next_is_digit {
                    self.advance();
                    Some(0)
                } else if self.is_unicode() {
                    self.fail("Invalid class escape");
                    None
                } else {
                    Some(self.parse_octal_literal())
                }
            }
            c if ('1' as u32..='7' as u32).contains(&c) => {
                if self.is_unicode() {
                    self.fail("Invalid class escape");
                    None
                } else {
                    Some(self.parse_octal_literal())
                }
            }
            c if c == 'x' as u32 => {
                self.advance();
                let mut value = 0u32;
                if self.parse_hex_escape(2, &mut value) {
                    return Some(value);
                }
                if self.is_unicode() {
                    self.fail("Invalid class escape");
                    None
                } else {
                    Some('x' as u32)
                }
            }
            c if c == 'u' as u32 => {
                self.advance();
                let mut value = 0u32;
                if self.parse_unicode_escape(&mut value) {
                    return Some(value);
                }
                if self.is_unicode() {
                    self.fail("Invalid unicode escape");
                    None
                } else {
                    Some('u' as u32)
                }
            }
            c @ (0x24 | 0x28 | 0x29 | 0x2A | 0x2B | 0x2E | 0x2F | 0x3F | 0x5B | 0x5C | 0x5D | 0x5E | 0x7B | 0x7C
            | 0x7D) => {
                // IdentityEscape: $ ( ) * + . / ? [ \ ] ^ { | }
                self.advance();
                Some(c)
            }
            EOF => {
                self.fail("unexpected end");
                None
            }
            c => {
                if self.is_unicode() {
                    self.fail("Invalid unicode escape");
                    None
                } else {
                    self.advance();
                    Some(c)
                }
            }
        }
    }

    /// Legacy octal escape (Annex B): up to three octal digits below 256.
    /// `parse_character_escape` never reaches here under the `u` flag, where
    /// any octal escape is a syntax error instead.
    fn parse_octal_literal(&mut self) -> u32 {
        let mut value = self.c0() - '0' as u32;
        self.advance();
        if self.c0() >= '0' as u32 && self.c0() <= '7' as u32 {
            value = value * 8 + (self.c0() - '0' as u32);
            self.advance();
            if value < 32 && self.c0() >= '0' as u32 && self.c0() <= '7' as u32 {
                value = value * 8 + (self.c0() - '0' as u32);
                self.advance();
            }
        }
        value
    }

    fn parse_hex_escape(&mut self, length: u32, value: &mut u32) -> bool {
        let checkpoint = self.lexer.save();
        let mut val = 0u32;
        for _ in 0..length {
            let Some(d) = hex_value(self.c0()) else {
                self.lexer.restore(checkpoint);
                return false;
            };
            val = val * 16 + d;
            self.advance();
        }
        *value = val;
        true
    }

    fn parse_unlimited_length_hex_number(&mut self, max_value: u32, value: &mut u32) -> bool {
        let Some(mut d) = hex_value(self.c0()) else { return false };
        let mut x: u32 = 0;
        loop {
            if x > (u32::MAX - d) / 16 {
                return false;
            }
            x = x * 16 + d;
            if x > max_value {
                return false;
            }
            self.advance();
            match hex_value(self.c0()) {
                Some(next) => d = next,
                None => break,
            }
        }
        *value = x;
        true
    }

    /// `RegExpUnicodeEscapeSequence`: `\uXXXX` or, under `u`, `\u{X...X}`.
    /// `\u` has already been consumed; positioned at what follows it.
    fn parse_unicode_escape(&mut self, value: &mut u32) -> bool {
        if self.c0() == '{' as u32 && self.is_unicode() {
            let checkpoint = self.lexer.save();
            self.advance();
            if self.parse_unlimited_length_hex_number(0x10FFFF, value) && self.c0() == '}' as u32 {
                self.advance();
                return true;
            }
            self.lexer.restore(checkpoint);
            return false;
        }
        let result = self.parse_hex_escape(4, value);
        if result && self.is_unicode() && (0xD800..=0xDBFF).contains(value) && self.c0() == '\\' as u32 {
            let checkpoint = self.lexer.save();
            self.advance();
            if self.c0() == 'u' as u32 {
                self.advance();
                let mut trail = 0u32;
                if self.parse_hex_escape(4, &mut trail) && (0xDC00..=0xDFFF).contains(&trail) {
                    *value = 0x10000 + ((*value - 0xD800) << 10) + (trail - 0xDC00);
                    return true;
                }
            }
            self.lexer.restore(checkpoint);
        }
        result
    }

    // ---- Character classes --------------------------------------------

    fn parse_class_ranges(&mut self) -> Option<RangeSet> {
        let mut result = RangeSet::new();
        while self.c0() != ']' as u32 {
            if self.c0() == EOF {
                self.fail("unterminated character class");
                return None;
            }
            let a = self.parse_class_atom()?;
            let next_is_close = self.lexer.peek_byte() == Some(b']');
            if self.c0() == '-' as u32 && !next_is_close {
                if matches!(a, ClassAtom::Shorthand(_)) {
                    if self.is_unicode() {
                        self.fail("invalid class range");
                        return None;
                    }
                    insert_class_atom(&mut result, a);
                    result.insert(b'-' as u32, b'-' as u32);
                    continue;
                }
                self.advance();
                let b = self.parse_class_atom()?;
                if let (ClassAtom::Char(c1), ClassAtom::Char(c2)) = (&a, &b) {
                    let (mut c1, mut c2) = (*c1, *c2);
                    if c1 > c2 {
                        self.fail("invalid class range");
                        return None;
                    }
                    if self.is_ignore_case() {
                        c1 = tables::canonicalize(c1, self.is_unicode());
                        c2 = tables::canonicalize(c2, self.is_unicode());
                    }
                    result.insert(c1, c2);
                } else {
                    if self.is_unicode() {
                        self.fail("invalid class range");
                        return None;
                    }
                    insert_class_atom(&mut result, a);
                    result.insert(b'-' as u32, b'-' as u32);
                    insert_class_atom(&mut result, b);
                }
            } else {
                insert_class_atom(&mut result, a);
            }
        }
        self.advance();
        Some(result)
    }

    fn parse_class_atom(&mut self) -> Option<ClassAtom> {
        if self.c0() == '\\' as u32 {
            self.advance();
            return self.parse_class_escape();
        }
        if self.c0() == EOF {
            self.fail("unterminated character class");
            return None;
        }
        let mut value = self.c0();
        self.advance();
        if self.is_ignore_case() {
            value = tables::canonicalize(value, self.is_unicode());
        }
        Some(ClassAtom::Char(value))
    }

    fn parse_class_escape(&mut self) -> Option<ClassAtom> {
        match self.c0() {
            c if c == 'b' as u32 => {
                self.advance();
                Some(ClassAtom::Char(0x08))
            }
            c if c == '-' as u32 => {
                self.advance();
                Some(ClassAtom::Char('-' as u32))
            }
            c if c == 'd' as u32 || c == 'D' as u32 => {
                let negate = self.c0() == 'D' as u32;
                self.advance();
                Some(self.push_shorthand(tables::RANGE_DIGIT.clone(), negate))
            }
            c if c == 's' as u32 || c == 'S' as u32 => {
                let negate = self.c0() == 'S' as u32;
                self.advance();
                Some(self.push_shorthand(tables::RANGE_SPACE.clone(), negate))
            }
            c if c == 'w' as u32 || c == 'W' as u32 => {
                let negate = self.c0() == 'W' as u32;
                self.advance();
                Some(self.push_shorthand(tables::RANGE_WORD.clone(), negate))
            }
            c if c == 'p' as u32 || c == 'P' as u32 => {
                self.advance();
                self.parse_unicode_property_escape();
                Some(ClassAtom::Shorthand(RangeSet::new()))
            }
            _ => {
                let value = self.parse_character_escape()?;
                let value =
                    if self.is_ignore_case() { tables::canonicalize(value, self.is_unicode()) } else { value };
                Some(ClassAtom::Char(value))
            }
        }
    }

    fn push_shorthand(&mut self, mut set: RangeSet, negate: bool) -> ClassAtom {
        if negate {
            set.invert(self.is_unicode());
        }
        ClassAtom::Shorthand(set)
    }

    // ---- Forward-reference capture counting ----------------------------

    fn total_capture_count(&mut self) -> u32 {
        if let Some(n) = self.total_capture_count {
            return n;
        }
        let n = scan_total_captures(self.lexer.source());
        self.total_capture_count = Some(n);
        n
    }

    fn scan_capture_index_for_name(&self, name: &str) -> Option<u32> {
        scan_capture_index_for_name(self.lexer.source(), name)
    }
}

/// `Canonicalize`-aware Unicode case-fold closure for a single escaped
/// literal under `iu` flags. Approximates ICU's `UnicodeSet::closeOver`
/// (unavailable without an ICU binding) with simple-case upper/lower
/// mapping, which covers the common ASCII/Latin-1/Greek/Cyrillic cases.
fn case_fold_closure(c: u32) -> RangeSet {
    let mut set = RangeSet::single(c);
    if let Some(ch) = char::from_u32(c) {
        for upper in ch.to_uppercase() {
            set.insert(upper as u32, upper as u32);
        }
        for lower in ch.to_lowercase() {
            set.insert(lower as u32, lower as u32);
        }
    }
    set
}

fn hex_value(c: u32) -> Option<u32> {
    match c {
        c if (b'0' as u32..=b'9' as u32).contains(&c) => Some(c - b'0' as u32),
        c if (b'a' as u32..=b'f' as u32).contains(&c) => Some(c - b'a' as u32 + 10),
        c if (b'A' as u32..=b'F' as u32).contains(&c) => Some(c - b'A' as u32 + 10),
        _ => None,
    }
}

/// Scan the whole source for the total number of capturing groups (as
/// `1 + count`, matching `capture_count`'s own convention of starting at 1
/// for the implicit whole-match group). Grounded on
/// `RegExpParser::ParseCaptureCount(nullptr)`: a bracket/escape-aware
/// left-to-right scan, used only to validate a backreference to a capture
/// that hasn't been parsed yet (a forward reference).
fn scan_total_captures(source: &[u8]) -> u32 {
    let mut capture_index = 1u32;
    let mut i = 0usize;
    while i < source.len() {
        match source[i] {
            b'(' => {
                if source.get(i + 1) == Some(&b'?') {
                    if source.get(i + 2) == Some(&b'<')
                        && !matches!(source.get(i + 3), Some(b'=') | Some(b'!'))
                    {
                        capture_index += 1;
                        i += 3;
                        while i < source.len() && source[i] != b'>' {
                            i += 1;
                        }
                    }
                } else {
                    capture_index += 1;
                }
                i += 1;
            }
            b'\\' => i += 2,
            b'[' => {
                i += 1;
                while i < source.len() && source[i] != b']' {
                    if source[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    capture_index
}

fn scan_capture_index_for_name(source: &[u8], target: &str) -> Option<u32> {
    let mut capture_index = 1u32;
    let mut i = 0usize;
    while i < source.len() {
        match source[i] {
            b'(' => {
                if source.get(i + 1) == Some(&b'?') {
                    if source.get(i + 2) == Some(&b'<')
                        && !matches!(source.get(i + 3), Some(b'=') | Some(b'!'))
                    {
                        let name_start = i + 3;
                        let mut j = name_start;
                        while j < source.len() && source[j] != b'>' {
                            j += 1;
                        }
                        if j < source.len() && &source[name_start..j] == target.as_bytes() {
                            return Some(capture_index);
                        }
                        capture_index += 1;
                        i = j;
                    }
                } else {
                    capture_index += 1;
                }
                i += 1;
            }
            b'\\' => i += 2,
            b'[' => {
                i += 1;
                while i < source.len() && source[i] != b']' {
                    if source[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{Executor, Utf16Input};

    fn run(pattern: &str, flags_str: &str, input: &str, start: usize) -> Option<Vec<Option<(usize, usize)>>> {
        let flags = Flags::parse(flags_str).unwrap();
        let parsed = parse(pattern, flags).unwrap();
        let utf16 = Utf16Input::new(input);
        let executor = Executor::new(&parsed.image, &utf16);
        executor.exec(start).map(|r| r.captures)
    }

    #[test]
    fn ascii_literal_round_trip() {
        let captures = run("abc", "", "abc", 0).unwrap();
        assert_eq!(captures[0], Some((0, 3)));
    }

    #[test]
    fn alternation_prefers_first_alternative() {
        assert_eq!(run("a|ab", "", "abc", 0).unwrap()[0], Some((0, 1)));
        assert_eq!(run("ab|a", "", "abc", 0).unwrap()[0], Some((0, 2)));
    }

    #[test]
    fn quantifier_identities() {
        assert_eq!(run(".*", "", "abc", 0).unwrap()[0], Some((0, 3)));
        assert_eq!(run(".{0,}", "", "abc", 0).unwrap()[0], Some((0, 3)));
        assert!(run(".+", "", "", 0).is_none());
        assert_eq!(run(".*?", "", "abc", 0).unwrap()[0], Some((0, 0)));
    }

    #[test]
    fn zero_width_group_terminates() {
        assert_eq!(run("(?:)*", "", "xyz", 0).unwrap()[0], Some((0, 0)));
    }

    #[test]
    fn quantified_group_resets_captures_each_iteration() {
        let captures = run("((a)|b)*", "", "ab", 0).unwrap();
        assert_eq!(captures[0], Some((0, 2)));
        assert_eq!(captures[1], Some((1, 2)));
        assert_eq!(captures[2], None);
    }

    #[test]
    fn lone_quantifier_brace_is_literal_without_u_but_an_error_with_u() {
        assert_eq!(run("a{", "", "a{", 0).unwrap()[0], Some((0, 2)));
        assert!(parse("a{", Flags::parse("u").unwrap()).is_err());
    }

    #[test]
    fn class_inversion_involution() {
        let flags = Flags::parse("").unwrap();
        let mut set = RangeSet::from_ranges([(0x61, 0x7A)]);
        let original = set.clone();
        set.invert(flags.unicode());
        set.invert(flags.unicode());
        assert_eq!(set, original);
    }

    #[test]
    fn backreference_identity() {
        let captures = run("(a+)\\1", "", "aaaa", 0).unwrap();
        assert_eq!(captures[0], Some((0, 4)));
        assert_eq!(captures[1], Some((0, 2)));
        assert!(run("(a+)\\1", "", "ab", 0).is_none());
    }

    #[test]
    fn lookaround_does_not_consume() {
        let captures = run("(?=ab)a", "", "ab", 0).unwrap();
        assert_eq!(captures[0], Some((0, 1)));
    }

    #[test]
    fn sticky_flag_disables_retry() {
        assert!(run("(?:\\d+)", "y", "abc123", 0).is_none());
        assert_eq!(run("(?:\\d+)", "y", "abc123", 3).unwrap()[0], Some((3, 6)));
    }

    #[test]
    fn named_captures_resolve() {
        let flags = Flags::parse("").unwrap();
        let parsed = parse("(?<year>\\d{4})-(?<m>\\d{2})", flags).unwrap();
        assert_eq!(parsed.group_names, vec![("year".to_string(), 1), ("m".to_string(), 2)]);
        let utf16 = Utf16Input::new("2024-11");
        let executor = Executor::new(&parsed.image, &utf16);
        let result = executor.exec(0).unwrap();
        assert_eq!(result.captures[1], Some((0, 4)));
        assert_eq!(result.captures[2], Some((5, 7)));
    }

    #[test]
    fn lookbehind_matches_without_consuming_prefix() {
        let captures = run("(?<=\\$)\\d+", "", "price $42", 0).unwrap();
        assert_eq!(captures[0], Some((7, 9)));
    }

    #[test]
    fn multiline_anchors() {
        // `$` matches right before the line terminator, `^` right after it.
        assert_eq!(run("$", "m", "a\nb", 0).unwrap()[0], Some((1, 1)));
        assert_eq!(run("^", "m", "a\nb", 1).unwrap()[0], Some((2, 2)));
    }

    #[test]
    fn header_invariants_hold() {
        let flags = Flags::parse("").unwrap();
        let parsed = parse("a(b)c", flags).unwrap();
        let header = parsed.image.header();
        assert_eq!(header.size, parsed.image.as_bytes().len() as u32);
        assert!(header.num_captures >= 1);
    }

    #[test]
    fn duplicate_group_names_are_rejected() {
        let flags = Flags::parse("").unwrap();
        assert!(parse("(?<a>x)(?<a>y)", flags).is_err());
    }

    #[test]
    fn unmatched_paren_is_a_syntax_error() {
        let flags = Flags::parse("").unwrap();
        assert!(parse("(a", flags).is_err());
    }

    #[test]
    fn sticky_start_index_past_input_fails() {
        let flags = Flags::parse("y").unwrap();
        let parsed = parse("a", flags).unwrap();
        let utf16 = Utf16Input::new("a");
        let executor = Executor::new(&parsed.image, &utf16);
        assert!(executor.exec(5).is_none());
    }

    /// Shrinks a `Vec<u8>` down to a lowercase-letters-only string, so the
    /// result never contains a regex metacharacter.
    fn lowercase_letters(bytes: Vec<u8>) -> String {
        bytes.into_iter().map(|b| (b'a' + b % 26) as char).collect()
    }

    #[quickcheck_macros::quickcheck]
    fn literal_ascii_strings_match_themselves(bytes: Vec<u8>) -> bool {
        let s = lowercase_letters(bytes);
        if s.is_empty() {
            return true;
        }
        match run(&s, "", &s, 0) {
            Some(captures) => captures[0] == Some((0, s.len())),
            None => false,
        }
    }

    #[quickcheck_macros::quickcheck]
    fn matching_is_deterministic(bytes: Vec<u8>) -> bool {
        let s = lowercase_letters(bytes);
        if s.len() < 2 {
            return true;
        }
        let pattern = format!("{}+", &s[0..1]);
        let flags = Flags::parse("").unwrap();
        let Ok(parsed) = parse(&pattern, flags) else { return true };
        let utf16 = Utf16Input::new(&s);
        let first = Executor::new(&parsed.image, &utf16).exec(0);
        let second = Executor::new(&parsed.image, &utf16).exec(0);
        first == second
    }
}
