//! One-code-point lookahead over the pattern source. Grounded on
//! `RegExpParser`'s `pc_`/`c0_`/`Advance`/`Prev` in `regexp_parser.h`: same
//! one-lookahead-codepoint shape, but decoding a full UTF-8 scalar value per
//! step instead of the original's byte-at-a-time `c0_` (which only decodes
//! multi-byte sequences on specific escape/pattern-character paths). This
//! target's source is guaranteed well-formed UTF-8 (`&str`), so decoding
//! whole code points uniformly is simpler and behaviourally equivalent.
//!
//! The original rewinds `pc_` by raw pointer arithmetic to retry a
//! tentative parse (e.g. `\u{...}` that turns out malformed). Here that
//! becomes [`Lexer::save`]/[`Lexer::restore`], a plain position snapshot.

pub const EOF: u32 = u32::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checkpoint {
    pos: usize,
    c0: u32,
}

/// Decodes a pattern source one Unicode scalar value at a time.
pub struct Lexer<'s> {
    source: &'s [u8],
    /// Byte offset of the first byte *not yet* consumed into `c0`.
    pos: usize,
    /// The lookahead code point, or [`EOF`] past the end of input.
    pub c0: u32,
    /// Byte offset where `c0` starts (used for error reporting and for the
    /// backward-emission pointer-rewind paths that need "where did the
    /// current atom begin").
    pub c0_offset: usize,
}

impl<'s> Lexer<'s> {
    pub fn new(source: &'s [u8]) -> Self {
        let mut lexer = Lexer { source, pos: 0, c0: EOF, c0_offset: 0 };
        lexer.advance();
        lexer
    }

    pub fn save(&self) -> Checkpoint {
        Checkpoint { pos: self.pos, c0: self.c0 }
    }

    pub fn restore(&mut self, checkpoint: Checkpoint) {
        self.pos = checkpoint.pos;
        self.c0 = checkpoint.c0;
    }

    pub fn is_eof(&self) -> bool {
        self.c0 == EOF
    }

    /// Decode the next scalar value at `pos` into `c0`, advancing `pos`
    /// past it. Invalid UTF-8 cannot occur since the parser's public entry
    /// point requires a `&str` source.
    pub fn advance(&mut self) {
        self.c0_offset = self.pos;
        if self.pos >= self.source.len() {
            self.c0 = EOF;
            return;
        }
        let rest = &self.source[self.pos..];
        let width = utf8_char_width(rest[0]);
        let s = std::str::from_utf8(&rest[..width]).expect("source is valid UTF-8");
        self.c0 = s.chars().next().unwrap() as u32;
        self.pos += width;
    }

    /// Peek at the raw next byte without consuming it (used for lookahead
    /// that the grammar needs without committing, e.g. `-` at a class
    /// boundary). Returns `None` at end of input.
    pub fn peek_byte(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    /// The byte offset the lexer has fully consumed through (i.e. the
    /// start of whatever comes after `c0`).
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn source(&self) -> &'s [u8] {
        self.source
    }
}

fn utf8_char_width(first_byte: u8) -> usize {
    match first_byte {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_through_ascii() {
        let mut lexer = Lexer::new(b"ab");
        assert_eq!(lexer.c0, 'a' as u32);
        lexer.advance();
        assert_eq!(lexer.c0, 'b' as u32);
        lexer.advance();
        assert!(lexer.is_eof());
    }

    #[test]
    fn decodes_multibyte_scalar() {
        let mut lexer = Lexer::new("\u{1F600}x".as_bytes());
        assert_eq!(lexer.c0, 0x1F600);
        lexer.advance();
        assert_eq!(lexer.c0, 'x' as u32);
    }

    #[test]
    fn checkpoint_restores_position() {
        let mut lexer = Lexer::new(b"abc");
        let checkpoint = lexer.save();
        lexer.advance();
        lexer.advance();
        assert_eq!(lexer.c0, 'c' as u32);
        lexer.restore(checkpoint);
        assert_eq!(lexer.c0, 'a' as u32);
    }
}
