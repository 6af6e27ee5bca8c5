//! The backtracking executor. Grounded on `RegExpExecutor` in
//! `ecmascript/regexp/regexp_executor.{h,cpp}`: an explicit frame stack
//! standing in for the original's `RegExpState` stack (tagged `STATE_SPLIT`/
//! `STATE_MATCH_AHEAD`/`STATE_NEGATIVE_MATCH_AHEAD`), a parallel numeric
//! stack for `PUSH`/`POP`/`PUSH_CHAR`/`CHECK_CHAR`/loop counters, and a
//! `MatchFailed` unwind loop that walks the frame stack looking for the
//! nearest choice point a given `(pc, is_matched)` pair resolves.
//!
//! Input is held as UTF-16 code units throughout, matching ECMAScript string
//! semantics (and the original's `isWideChar_` "wide" mode): [`Utf16Input`]
//! transcodes a `&str` once up front and keeps a code-unit-to-byte index so
//! results can be reported back in both units.

use crate::image::BytecodeImage;
use crate::opcode;
use crate::opcode::Op;
use crate::tables;

/// A UTF-16 view over a `&str`, with a lookup table back to byte offsets.
pub struct Utf16Input {
    units: Vec<u16>,
    /// `unit_to_byte[i]` is the byte offset in the original string of code
    /// unit `i`; `unit_to_byte[len]` is the string's total byte length.
    unit_to_byte: Vec<usize>,
}

impl Utf16Input {
    pub fn new(s: &str) -> Self {
        let mut units = Vec::with_capacity(s.len());
        let mut unit_to_byte = Vec::with_capacity(s.len() + 1);
        for (byte_offset, ch) in s.char_indices() {
            let mut buf = [0u16; 2];
            for unit in ch.encode_utf16(&mut buf) {
                unit_to_byte.push(byte_offset);
                units.push(*unit);
            }
        }
        unit_to_byte.push(s.len());
        Utf16Input { units, unit_to_byte }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn byte_offset(&self, unit_index: usize) -> usize {
        self.unit_to_byte[unit_index.min(self.unit_to_byte.len() - 1)]
    }

    fn unit_at(&self, pos: usize) -> Option<u16> {
        self.units.get(pos).copied()
    }

    /// Read the code point starting at `pos`, combining a surrogate pair
    /// when `unicode` is set. Returns `(code point, width in code units)`.
    fn char_at(&self, pos: usize, unicode: bool) -> Option<(u32, usize)> {
        let lead = self.unit_at(pos)?;
        if unicode && (0xD800..=0xDBFF).contains(&lead) {
            if let Some(trail) = self.unit_at(pos + 1) {
                if (0xDC00..=0xDFFF).contains(&trail) {
                    let c = 0x10000 + ((lead as u32 - 0xD800) << 10) + (trail as u32 - 0xDC00);
                    return Some((c, 2));
                }
            }
        }
        Some((lead as u32, 1))
    }

    /// Read the code point ending at `pos` (i.e. the one immediately before
    /// it), combining a surrogate pair when `unicode` is set.
    fn char_before(&self, pos: usize, unicode: bool) -> Option<(u32, usize)> {
        if pos == 0 {
            return None;
        }
        let trail = self.unit_at(pos - 1)?;
        if unicode && pos >= 2 && (0xDC00..=0xDFFF).contains(&trail) {
            if let Some(lead) = self.unit_at(pos - 2) {
                if (0xD800..=0xDBFF).contains(&lead) {
                    let c = 0x10000 + ((lead as u32 - 0xD800) << 10) + (trail as u32 - 0xDC00);
                    return Some((c, 2));
                }
            }
        }
        Some((trail as u32, 1))
    }
}

/// One capture group's bounds, in code-unit offsets into the subject. `None`
/// until `SAVE_START`/`SAVE_END` fill it in; reset back to `None` by
/// `SAVE_RESET` when a group is re-entered by a loop.
pub type Capture = Option<(usize, usize)>;

/// The result of a successful match: capture 0 is always the whole match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchResult {
    pub captures: Vec<Capture>,
}

impl MatchResult {
    pub fn range(&self) -> (usize, usize) {
        self.captures[0].expect("capture 0 always set on a successful match")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FrameKind {
    Split,
    MatchAhead,
    NegativeMatchAhead,
}

#[derive(Clone, Debug)]
struct Frame {
    kind: FrameKind,
    pc: usize,
    pos: usize,
    captures: Vec<Capture>,
    numeric_stack_len: usize,
}

/// A single attempt to match `program` against `input`, starting no earlier
/// than `start_index`. One `Executor` is built per top-level `exec()` call;
/// it owns no state usable across calls.
pub struct Executor<'a> {
    program: &'a [u8],
    input: &'a Utf16Input,
    flags_unicode: bool,
    flags_ignore_case: bool,
    flags_multiline: bool,
    flags_dot_all: bool,
    flags_sticky: bool,
    pc: usize,
    pos: usize,
    frames: Vec<Frame>,
    numeric_stack: Vec<usize>,
    captures: Vec<Capture>,
}

const OP_START_OFFSET: usize = 0;

enum Step {
    Continue,
    Matched,
    Failed,
}


impl<'a> Executor<'a> {
    pub fn new(image: &'a BytecodeImage, input: &'a Utf16Input) -> Self {
        let header = image.header();
        Executor {
            program: image.instructions(),
            input,
            flags_unicode: header.flags.unicode(),
            flags_ignore_case: header.flags.ignore_case(),
            flags_multiline: header.flags.multiline(),
            flags_dot_all: header.flags.dot_all(),
            flags_sticky: header.flags.sticky(),
            pc: OP_START_OFFSET,
            pos: 0,
            frames: Vec::new(),
            numeric_stack: Vec::with_capacity(header.num_stack as usize),
            captures: vec![None; header.num_captures.max(1) as usize],
        }
    }

    /// Try to find a match starting at or after `start_index` (a code-unit
    /// offset). Mirrors `RegExpExecutor::Execute`: pushes the initial
    /// "try again one position later" choice point up front unless the
    /// pattern is sticky.
    pub fn exec(mut self, start_index: usize) -> Option<MatchResult> {
        if start_index > self.input.len() {
            return None;
        }
        self.pos = start_index;
        if !self.flags_sticky {
            self.push_frame(FrameKind::Split, OP_START_OFFSET);
        }
        if self.run() {
            Some(MatchResult { captures: self.captures })
        } else {
            None
        }
    }

    fn push_frame(&mut self, kind: FrameKind, pc: usize) {
        self.frames.push(Frame {
            kind,
            pc,
            pos: self.pos,
            captures: self.captures.clone(),
            numeric_stack_len: self.numeric_stack.len(),
        });
    }

    fn restore(&mut self, frame: Frame, restore_captures: bool) {
        self.pc = frame.pc;
        self.pos = frame.pos;
        self.numeric_stack.truncate(frame.numeric_stack_len);
        if restore_captures {
            self.captures = frame.captures;
        }
    }

    /// Unwind the frame stack looking for the nearest choice point that
    /// `is_matched` resolves. Returns `true` when the whole attempt is out
    /// of choice points (overall failure).
    fn match_failed(&mut self, is_matched: bool) -> bool {
        loop {
            let Some(top) = self.frames.last() else { return true };
            let top_kind = top.kind;
            if top_kind == FrameKind::Split {
                if !is_matched {
                    let frame = self.frames.pop().unwrap();
                    self.restore(frame, true);
                    return false;
                }
            } else {
                let success = (top_kind == FrameKind::MatchAhead && is_matched)
                    || (top_kind == FrameKind::NegativeMatchAhead && !is_matched);
                if success {
                    let frame = self.frames.pop().unwrap();
                    let restore_captures = top_kind == FrameKind::NegativeMatchAhead;
                    self.restore(frame, restore_captures);
                    return false;
                }
            }
            self.frames.pop();
        }
    }

    /// Search-mode retry: when we're back at the program's first
    /// instruction with an empty frame stack, either give up (input
    /// exhausted) or slide the start position forward by one unit.
    fn handle_first_split(&mut self) -> bool {
        if self.pc == OP_START_OFFSET && self.frames.is_empty() && !self.flags_sticky {
            if self.pos >= self.input.len() {
                return !self.match_failed(false);
            }
            self.pos += 1;
            self.push_frame(FrameKind::Split, OP_START_OFFSET);
        }
        true
    }

    fn is_word_boundary_context(&self) -> (bool, bool) {
        let before = if self.pos == 0 {
            false
        } else {
            self.input.char_before(self.pos, false).map(|(c, _)| tables::is_word_char(c)).unwrap_or(false)
        };
        let after =
            self.input.char_at(self.pos, false).map(|(c, _)| tables::is_word_char(c)).unwrap_or(false);
        (before, after)
    }

    fn run(&mut self) -> bool {
        loop {
            if !self.handle_first_split() {
                return false;
            }
            if self.pc >= self.program.len() {
                return true;
            }
            let op = Op::from_byte(self.program[self.pc]).expect("malformed bytecode: unknown opcode");
            match self.step(op) {
                Step::Continue => {}
                Step::Matched => return true,
                Step::Failed => return false,
            }
        }
    }

    fn u8_at(&self, offset: usize) -> u8 {
        self.program[self.pc + offset]
    }

    fn u16_at(&self, offset: usize) -> u16 {
        u16::from_le_bytes(self.program[self.pc + offset..self.pc + offset + 2].try_into().unwrap())
    }

    fn u32_at(&self, offset: usize) -> u32 {
        u32::from_le_bytes(self.program[self.pc + offset..self.pc + offset + 4].try_into().unwrap())
    }

    fn i32_at(&self, offset: usize) -> i32 {
        i32::from_le_bytes(self.program[self.pc + offset..self.pc + offset + 4].try_into().unwrap())
    }

    fn canonicalize(&self, c: u32) -> u32 {
        if self.flags_ignore_case {
            tables::canonicalize(c, self.flags_unicode)
        } else {
            c
        }
    }

    fn cont_or_fail(&mut self, is_matched: bool) -> Step {
        if self.match_failed(is_matched) { Step::Failed } else { Step::Continue }
    }

    /// Execute one instruction.
    fn step(&mut self, op: Op) -> Step {
        match op {
            Op::SaveStart => {
                let idx = self.u8_at(1) as usize;
                self.captures[idx] = Some((self.pos, self.captures[idx].map(|(_, e)| e).unwrap_or(self.pos)));
                self.pc += Op::SaveStart.fixed_size();
                Step::Continue
            }
            Op::SaveEnd => {
                let idx = self.u8_at(1) as usize;
                let start = self.captures[idx].map(|(s, _)| s).unwrap_or(self.pos);
                self.captures[idx] = Some((start, self.pos));
                self.pc += Op::SaveEnd.fixed_size();
                Step::Continue
            }
            Op::SaveReset => {
                let start = self.u8_at(1) as usize;
                let end = self.u8_at(2) as usize;
                for i in start..=end {
                    self.captures[i] = None;
                }
                self.pc += Op::SaveReset.fixed_size();
                Step::Continue
            }
            Op::Goto => {
                let offset = self.u32_at(1);
                self.pc = self.pc + Op::Goto.fixed_size() + offset as usize;
                Step::Continue
            }
            Op::SplitNext | Op::MatchAhead | Op::NegativeMatchAhead => {
                let offset = self.u32_at(1);
                let after = self.pc + Op::SplitNext.fixed_size();
                let kind = match op {
                    Op::SplitNext => FrameKind::Split,
                    Op::MatchAhead => FrameKind::MatchAhead,
                    _ => FrameKind::NegativeMatchAhead,
                };
                self.pc = after;
                self.push_frame(kind, after + offset as usize);
                Step::Continue
            }
            Op::SplitFirst => {
                let offset = self.u32_at(1);
                let after = self.pc + Op::SplitFirst.fixed_size();
                self.pc = after;
                self.push_frame(FrameKind::Split, self.pc);
                self.pc = after + offset as usize;
                Step::Continue
            }
            Op::Match => self.cont_or_fail(true),
            Op::MatchEnd => Step::Matched,
            Op::Prev => match self.input.char_before(self.pos, self.flags_unicode) {
                None => self.cont_or_fail(false),
                Some((_, width)) => {
                    self.pos -= width;
                    self.pc += Op::Prev.fixed_size();
                    Step::Continue
                }
            },
            Op::Push => {
                self.numeric_stack.push(0);
                self.pc += Op::Push.fixed_size();
                Step::Continue
            }
            Op::Pop => {
                self.numeric_stack.pop();
                self.pc += Op::Pop.fixed_size();
                Step::Continue
            }
            Op::PushChar => {
                self.numeric_stack.push(self.pos);
                self.pc += Op::PushChar.fixed_size();
                Step::Continue
            }
            Op::CheckChar => {
                let offset = self.u32_at(1);
                let marked = self.numeric_stack.pop().unwrap_or(self.pos);
                if marked != self.pos {
                    self.pc += Op::CheckChar.fixed_size();
                } else {
                    self.pc = self.pc + Op::CheckChar.fixed_size() + offset as usize;
                }
                Step::Continue
            }
            Op::Loop | Op::LoopGreedy => {
                let min = self.u32_at(1);
                let max = self.u32_at(5);
                let back_offset = self.i32_at(9);
                self.pc += Op::Loop.fixed_size();
                let loop_pc_end = self.pc;
                let loop_pc_start = loop_pc_end.wrapping_add_signed(back_offset as isize);
                let greedy = op == Op::LoopGreedy;
                let loop_max = if greedy { max } else { min } as usize;
                let count = self.numeric_stack.last_mut().expect("LOOP without a counter slot");
                *count += 1;
                let count = *count;
                if count < loop_max {
                    if count >= min as usize {
                        self.push_frame(FrameKind::Split, loop_pc_end);
                    }
                    self.pc = loop_pc_start;
                } else if !greedy && count < max as usize {
                    self.push_frame(FrameKind::Split, loop_pc_start);
                }
                Step::Continue
            }
            Op::LineStart => {
                let at_start = self.pos == 0
                    || (self.flags_multiline
                        && self.input.char_before(self.pos, false).map(|(c, _)| c == '\n' as u32).unwrap_or(false));
                if at_start {
                    self.pc += Op::LineStart.fixed_size();
                    Step::Continue
                } else {
                    self.cont_or_fail(false)
                }
            }
            Op::LineEnd => {
                let at_end = self.pos >= self.input.len()
                    || (self.flags_multiline
                        && self.input.char_at(self.pos, false).map(|(c, _)| c == '\n' as u32).unwrap_or(false));
                if at_end {
                    self.pc += Op::LineEnd.fixed_size();
                    Step::Continue
                } else {
                    self.cont_or_fail(false)
                }
            }
            Op::WordBoundary | Op::NotWordBoundary => {
                let (before, after) = self.is_word_boundary_context();
                let is_boundary = before != after;
                let wants_boundary = op == Op::WordBoundary;
                if is_boundary == wants_boundary {
                    self.pc += Op::WordBoundary.fixed_size();
                    Step::Continue
                } else {
                    self.cont_or_fail(false)
                }
            }
            Op::All | Op::Dots => match self.input.char_at(self.pos, self.flags_unicode) {
                None => self.cont_or_fail(false),
                Some((c, width)) => {
                    if op == Op::Dots && !self.flags_dot_all && tables::is_line_terminator(c) {
                        self.cont_or_fail(false)
                    } else {
                        self.pos += width;
                        self.pc += Op::All.fixed_size();
                        Step::Continue
                    }
                }
            },
            Op::Char | Op::Char32 => {
                let expected = if op == Op::Char32 { self.u32_at(1) } else { self.u16_at(1) as u32 };
                match self.input.char_at(self.pos, self.flags_unicode) {
                    None => self.cont_or_fail(false),
                    Some((c, width)) => {
                        if self.canonicalize(c) == self.canonicalize(expected) {
                            self.pos += width;
                            self.pc += op.fixed_size();
                            Step::Continue
                        } else {
                            self.cont_or_fail(false)
                        }
                    }
                }
            }
            Op::Range | Op::Range32 => {
                type RangeReader = fn(&Executor, usize) -> (u32, u32);

                let got = self.input.char_at(self.pos, self.flags_unicode);
                let count = self.u16_at(1) as usize;
                let (size, read_lo_hi): (usize, RangeReader) = if op == Op::Range {
                    (opcode::range_size(count), |e: &Executor, i| {
                        let base = 3 + i * 4;
                        (e.u16_at(base) as u32, e.u16_at(base + 2) as u32)
                    })
                } else {
                    (opcode::range32_size(count), |e: &Executor, i| {
                        let base = 3 + i * 8;
                        (e.u32_at(base), e.u32_at(base + 4))
                    })
                };
                match got {
                    None => self.cont_or_fail(false),
                    Some((c, width)) => {
                        let c = self.canonicalize(c);
                        let found = (0..count).any(|i| {
                            let (lo, hi) = read_lo_hi(self, i);
                            c >= lo && c <= hi
                        });
                        if found {
                            self.pos += width;
                            self.pc += size;
                            Step::Continue
                        } else {
                            self.cont_or_fail(false)
                        }
                    }
                }
            }
            Op::BackReference | Op::BackwardBackReference => {
                let idx = self.u8_at(1) as usize;
                let size = Op::BackReference.fixed_size();
                let Some((start, end)) = self.captures.get(idx).copied().flatten() else {
                    self.pc += size;
                    return Step::Continue;
                };
                let backward = op == Op::BackwardBackReference;
                let mut matched = true;
                if !backward {
                    let mut src = start;
                    while src < end {
                        let Some((c1, w1)) = self.input.char_at(src, self.flags_unicode) else {
                            matched = false;
                            break;
                        };
                        let Some((c2, w2)) = self.input.char_at(self.pos, self.flags_unicode) else {
                            matched = false;
                            break;
                        };
                        if self.canonicalize(c1) != self.canonicalize(c2) {
                            matched = false;
                            break;
                        }
                        src += w1;
                        self.pos += w2;
                    }
                } else {
                    let mut src = end;
                    while src > start {
                        if self.pos == 0 {
                            matched = false;
                            break;
                        }
                        let Some((c1, w1)) = self.input.char_before(src, self.flags_unicode) else {
                            matched = false;
                            break;
                        };
                        let Some((c2, w2)) = self.input.char_before(self.pos, self.flags_unicode) else {
                            matched = false;
                            break;
                        };
                        if self.canonicalize(c1) != self.canonicalize(c2) {
                            matched = false;
                            break;
                        }
                        src -= w1;
                        self.pos -= w2;
                    }
                }
                if matched {
                    self.pc += size;
                    Step::Continue
                } else {
                    self.cont_or_fail(false)
                }
            }
        }
    }
}

