//! Static character classes used by `\d \s \w` and their negations, plus the
//! ASCII identifier-start/continue sets used when lexing named capture
//! groups. Exact values lifted from the static `g_rangeD`/`g_rangeS`/
//! `g_rangeW`/`g_regexpIdentifyStart`/`g_regexpIdentifyContinue` tables in
//! `ecmascript/regexp/regexp_parser.cpp`.

use crate::interval::RangeSet;
use once_cell::sync::Lazy;

/// `\d`, i.e. `[0-9]`.
pub static RANGE_DIGIT: Lazy<RangeSet> = Lazy::new(|| RangeSet::from_ranges([(0x30, 0x39)]));

/// `\s`: ECMAScript `WhiteSpace` and `LineTerminator` code points.
pub static RANGE_SPACE: Lazy<RangeSet> = Lazy::new(|| {
    RangeSet::from_ranges([
        (0x0009, 0x000D),
        (0x0020, 0x0020),
        (0x00A0, 0x00A0),
        (0x1680, 0x1680),
        (0x2000, 0x200A),
        (0x2028, 0x2029),
        (0x202F, 0x202F),
        (0x205F, 0x205F),
        (0x3000, 0x3000),
        (0xFEFF, 0xFEFF),
    ])
});

/// `\w`, i.e. `[A-Za-z0-9_]`, ASCII only.
pub static RANGE_WORD: Lazy<RangeSet> =
    Lazy::new(|| RangeSet::from_ranges([(0x30, 0x39), (0x41, 0x5A), (0x5F, 0x5F), (0x61, 0x7A)]));

/// First character of a named capture group's `RegExpIdentifierName`: `$`,
/// `A-Z`, `_`, `a-z` (plus, per the original's `IsIdentFirst`, any
/// `u_isIDStart` code point above the ASCII range; astral identifier
/// starts are left to [`crate::parser::unicode::is_id_start`]). Matches the
/// original's `ID_START_TABLE_ASCII` bitmap exactly, not the separate,
/// unused `g_regexpIdentifyStart` table it also declares.
pub static IDENTIFY_START: Lazy<RangeSet> =
    Lazy::new(|| RangeSet::from_ranges([(0x24, 0x24), (0x41, 0x5A), (0x5F, 0x5F), (0x61, 0x7A)]));

/// Continuation character of a named capture group's identifier: `$`,
/// `0-9`, `A-Z`, `_`, `a-z`. The original instead calls ICU's `u_isIDPart`
/// directly for continuation characters (which omits `$`); we keep `$`
/// here to match ECMA-262's `RegExpIdentifierPart` grammar, which the
/// original's own omission appears to violate.
pub static IDENTIFY_CONTINUE: Lazy<RangeSet> = Lazy::new(|| {
    RangeSet::from_ranges([(0x24, 0x24), (0x30, 0x39), (0x41, 0x5A), (0x5F, 0x5F), (0x61, 0x7A)])
});

pub fn is_word_char(c: u32) -> bool {
    RANGE_WORD.contains(c)
}

/// `\n`, `\r`, U+2028, U+2029: terminate a line for `^`/`$`/`.`/`\s`
/// purposes.
pub fn is_line_terminator(c: u32) -> bool {
    matches!(c, 0x0A | 0x0D | 0x2028 | 0x2029)
}

/// ECMAScript case folding: ASCII letters always fold; above ASCII, folding
/// only happens in Unicode (`u`-flag) mode, using simple uppercase mapping.
/// Mirrors `RegExpParser::Canonicalize`.
pub fn canonicalize(c: u32, is_unicode: bool) -> u32 {
    if c < 128 {
        if (b'a' as u32..=b'z' as u32).contains(&c) {
            return c - (b'a' as u32 - b'A' as u32);
        }
        return c;
    }
    if !is_unicode {
        return c;
    }
    char::from_u32(c)
        .map(|ch| ch.to_uppercase().next().unwrap_or(ch) as u32)
        .unwrap_or(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_letters_fold_regardless_of_unicode_flag() {
        assert_eq!(canonicalize('a' as u32, false), 'A' as u32);
        assert_eq!(canonicalize('a' as u32, true), 'A' as u32);
        assert_eq!(canonicalize('Z' as u32, false), 'Z' as u32);
    }

    #[test]
    fn non_ascii_only_folds_under_unicode_flag() {
        let sigma = 0x03C3; // greek small sigma
        assert_eq!(canonicalize(sigma, false), sigma);
        assert_ne!(canonicalize(sigma, true), sigma);
    }

    #[test]
    fn word_digit_space_tables_match_original() {
        assert!(is_word_char('_' as u32));
        assert!(!is_word_char('-' as u32));
        assert!(RANGE_DIGIT.contains('5' as u32));
        assert!(RANGE_SPACE.contains(0xFEFF));
        assert!(is_line_terminator(0x2028));
    }
}
