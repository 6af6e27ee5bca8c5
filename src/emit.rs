//! Bytecode emission helpers shared by the parser. Grounded on the per-opcode
//! `EmitOpCode`/`InsertOpCode` methods in `ecmascript/regexp/regexp_opcode.cpp`
//! (`SaveStartOpCode::EmitOpCode`, `RangeOpCode::InsertOpCode`, and so on):
//! each original `*OpCode` class becomes one free function here taking the
//! shared [`Buffer`] instead of a member-function receiver.

use crate::buffer::Buffer;
use crate::interval::RangeSet;
use crate::opcode::Op;

pub fn save_start(buf: &mut Buffer, capture_index: u8) {
    buf.emit_u8(Op::SaveStart as u8);
    buf.emit_u8(capture_index);
}

pub fn save_end(buf: &mut Buffer, capture_index: u8) {
    buf.emit_u8(Op::SaveEnd as u8);
    buf.emit_u8(capture_index);
}

pub fn char16(buf: &mut Buffer, c: u16) {
    buf.emit_u8(Op::Char as u8);
    buf.emit_u16(c);
}

pub fn char32(buf: &mut Buffer, c: u32) {
    buf.emit_u8(Op::Char32 as u8);
    buf.emit_u32(c);
}

pub fn any_char(buf: &mut Buffer, c: u32) {
    if c > 0xFFFF {
        char32(buf, c);
    } else {
        char16(buf, c as u16);
    }
}

/// Emit at the current write head, reserving the offset operand as a
/// placeholder patched later via [`Buffer::put_u32`].
pub fn goto_placeholder(buf: &mut Buffer) -> usize {
    buf.emit_u8(Op::Goto as u8);
    let offset_at = buf.size();
    buf.emit_u32(0);
    offset_at
}

pub fn match_end(buf: &mut Buffer) {
    buf.emit_u8(Op::MatchEnd as u8);
}

pub fn prev(buf: &mut Buffer) {
    buf.emit_u8(Op::Prev as u8);
}

pub fn line_start(buf: &mut Buffer) {
    buf.emit_u8(Op::LineStart as u8);
}

pub fn line_end(buf: &mut Buffer) {
    buf.emit_u8(Op::LineEnd as u8);
}

pub fn word_boundary(buf: &mut Buffer, negate: bool) {
    buf.emit_u8(if negate { Op::NotWordBoundary as u8 } else { Op::WordBoundary as u8 });
}

pub fn all(buf: &mut Buffer) {
    buf.emit_u8(Op::All as u8);
}

pub fn dots(buf: &mut Buffer) {
    buf.emit_u8(Op::Dots as u8);
}

pub fn pop(buf: &mut Buffer) {
    buf.emit_u8(Op::Pop as u8);
}

/// A bare `MATCH`, used as the inner success marker at the end of a
/// lookaround's sub-pattern (distinct from `MATCH_END`, which ends the
/// whole program).
pub fn match_now(buf: &mut Buffer) {
    buf.emit_u8(Op::Match as u8);
}

/// `CHECK_CHAR` emitted directly with a known skip distance. `ParseQuantifier`
/// always skips exactly one `LOOP`/`LOOP_GREEDY` instruction (their shared
/// fixed size), so the offset is known up front and no patch is needed.
pub fn check_char(buf: &mut Buffer, skip: u32) {
    buf.emit_u8(Op::CheckChar as u8);
    buf.emit_u32(skip);
}

/// `back_offset` is relative to the *start* of this instruction, unlike
/// `GOTO`/`SPLIT_*`, which are relative to their end. It is the byte
/// distance from the `LOOP`/`LOOP_GREEDY` opcode back to the first
/// instruction of the loop body it repeats, and is always negative since
/// the body always precedes its own trailer.
pub fn loop_(buf: &mut Buffer, greedy: bool, min: u32, max: u32, back_offset: i32) {
    buf.emit_u8(if greedy { Op::LoopGreedy as u8 } else { Op::Loop as u8 });
    buf.emit_u32(min);
    buf.emit_u32(max);
    buf.emit_i32(back_offset);
}

pub fn backreference(buf: &mut Buffer, capture_index: u8, backward: bool) {
    buf.emit_u8(if backward { Op::BackwardBackReference as u8 } else { Op::BackReference as u8 });
    buf.emit_u8(capture_index);
}

fn range_set_common(buf: &mut Buffer, set: &RangeSet) -> bool {
    let fits_bmp = set.fits_in_bmp();
    let ranges = set.ranges();
    buf.emit_u8(if fits_bmp { Op::Range as u8 } else { Op::Range32 as u8 });
    buf.emit_u16(ranges.len() as u16);
    for &(lo, hi) in ranges {
        if fits_bmp {
            buf.emit_u16(lo as u16);
            buf.emit_u16(hi as u16);
        } else {
            buf.emit_u32(lo);
            buf.emit_u32(hi);
        }
    }
    fits_bmp
}

/// Emit `RANGE`/`RANGE32` (picked by whether every interval fits in the BMP).
pub fn range(buf: &mut Buffer, set: &RangeSet) {
    range_set_common(buf, set);
}

/// Reserve space for a `SPLIT_NEXT`/`SPLIT_FIRST`/`MATCH_AHEAD`/
/// `NEGATIVE_MATCH_AHEAD` instruction *before* already-emitted bytes, the
/// insert-then-patch pattern `ParseDisjunction`/`ParseAssertionCapture` use
/// for alternation and lookaround. Returns the offset operand's position.
pub fn insert_split(buf: &mut Buffer, at: usize, op: Op) -> usize {
    let inserted_at = buf.insert(at, 5);
    buf.put_u8(inserted_at, op as u8);
    inserted_at + 1
}

pub fn insert_push(buf: &mut Buffer, at: usize) {
    let inserted_at = buf.insert(at, 1);
    buf.put_u8(inserted_at, Op::Push as u8);
}

pub fn insert_push_char(buf: &mut Buffer, at: usize) {
    let inserted_at = buf.insert(at, 1);
    buf.put_u8(inserted_at, Op::PushChar as u8);
}

pub fn insert_save_reset(buf: &mut Buffer, at: usize, start: u8, end: u8) {
    let inserted_at = buf.insert(at, 3);
    buf.put_u8(inserted_at, Op::SaveReset as u8);
    buf.put_u8(inserted_at + 1, start);
    buf.put_u8(inserted_at + 2, end);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_picks_16_or_32_bit_encoding() {
        let mut buf = Buffer::new();
        range(&mut buf, &RangeSet::from_ranges([(0, 10)]));
        assert_eq!(buf.get_u8(0), Op::Range as u8);

        let mut buf = Buffer::new();
        range(&mut buf, &RangeSet::from_ranges([(0, 0x1_0000)]));
        assert_eq!(buf.get_u8(0), Op::Range32 as u8);
    }

    #[test]
    fn insert_split_writes_opcode_before_body() {
        let mut buf = Buffer::new();
        buf.emit_u8(0xAA);
        let offset_at = insert_split(&mut buf, 0, Op::SplitNext);
        assert_eq!(buf.get_u8(0), Op::SplitNext as u8);
        assert_eq!(offset_at, 1);
        assert_eq!(buf.as_slice()[5], 0xAA);
    }
}
