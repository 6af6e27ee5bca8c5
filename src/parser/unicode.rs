//! Identifier-character predicates used when lexing `GroupName`s (named
//! captures, `\k<Name>`). Grounded on `RegExpParser::IsIdentFirst`'s ASCII
//! bitmap fast path (`ID_START_TABLE_ASCII` in `regexp_parser.cpp`) with a
//! fallback to ICU's `u_isIDStart`/`u_isIDPart` above the ASCII range; this
//! target has no ICU binding, so the fallback instead asks `char`'s own
//! Unicode tables (`is_alphabetic`/`is_alphanumeric`), which is a reasonable
//! stand-in for the same `ID_Start`/`ID_Continue` properties ICU exposes.

use crate::tables::{IDENTIFY_CONTINUE, IDENTIFY_START};

pub fn is_id_start(c: u32) -> bool {
    if c < 128 {
        return IDENTIFY_START.contains(c);
    }
    char::from_u32(c).map(|ch| ch.is_alphabetic() || ch == '_').unwrap_or(false)
}

pub fn is_id_continue(c: u32) -> bool {
    if c < 128 {
        return IDENTIFY_CONTINUE.contains(c);
    }
    char::from_u32(c).map(|ch| ch.is_alphanumeric() || ch == '_' || ch == '\u{200C}' || ch == '\u{200D}').unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_dollar_and_underscore_start_identifiers() {
        assert!(is_id_start('$' as u32));
        assert!(is_id_start('_' as u32));
        assert!(is_id_start('A' as u32));
        assert!(!is_id_start('0' as u32));
    }

    #[test]
    fn astral_letters_start_identifiers() {
        assert!(is_id_start(0x03B1)); // greek alpha
    }
}
