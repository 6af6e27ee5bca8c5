//! Textual disassembly of a [`BytecodeImage`], gated behind the `trace`
//! feature. Grounded on `RegExpOpCode::DumpRegExpOpCode` and the per-opcode
//! `DumpOpCode` overrides in `ecmascript/regexp/regexp_opcode.cpp`: one line
//! per instruction, `offset:\tmnemonic\toperands`.

use std::fmt::Write as _;

use crate::image::{BytecodeImage, HEADER_SIZE};
use crate::opcode::Op;

pub fn dump(image: &BytecodeImage) -> String {
    let bytes = image.as_bytes();
    let mut out = String::new();
    let _ = writeln!(out, "OpCode:");
    let mut pc = HEADER_SIZE;
    while pc < bytes.len() {
        let op = Op::from_byte(bytes[pc]).expect("malformed bytecode: unknown opcode");
        let u16_at = |o: usize| u16::from_le_bytes(bytes[pc + o..pc + o + 2].try_into().unwrap());
        let u32_at = |o: usize| u32::from_le_bytes(bytes[pc + o..pc + o + 4].try_into().unwrap());
        let i32_at = |o: usize| i32::from_le_bytes(bytes[pc + o..pc + o + 4].try_into().unwrap());
        let (mnemonic, operands, size) = match op {
            Op::SaveStart => ("save_start", format!("{}", bytes[pc + 1]), op.fixed_size()),
            Op::SaveEnd => ("save_end", format!("{}", bytes[pc + 1]), op.fixed_size()),
            Op::SaveReset => {
                ("save_reset", format!("{} {}", bytes[pc + 1], bytes[pc + 2]), op.fixed_size())
            }
            Op::Char => ("char", format!("{:#x}", u16_at(1)), op.fixed_size()),
            Op::Char32 => ("char32", format!("{:#x}", u32_at(1)), op.fixed_size()),
            Op::Goto => ("goto", format!("{}", i32_at(1)), op.fixed_size()),
            Op::SplitFirst => ("split_first", format!("{}", i32_at(1)), op.fixed_size()),
            Op::SplitNext => ("split_next", format!("{}", i32_at(1)), op.fixed_size()),
            Op::MatchAhead => ("match_ahead", format!("{}", i32_at(1)), op.fixed_size()),
            Op::NegativeMatchAhead => {
                ("negative_match_ahead", format!("{}", i32_at(1)), op.fixed_size())
            }
            Op::Match => ("match", String::new(), op.fixed_size()),
            Op::MatchEnd => ("match_end", String::new(), op.fixed_size()),
            Op::Loop | Op::LoopGreedy => (
                if op == Op::Loop { "loop" } else { "loop_greedy" },
                format!("back={} min={} max={}", i32_at(9), u32_at(1), u32_at(5)),
                op.fixed_size(),
            ),
            Op::Push => ("push", String::new(), op.fixed_size()),
            Op::PushChar => ("push_char", String::new(), op.fixed_size()),
            Op::CheckChar => ("check_char", format!("{}", u32_at(1)), op.fixed_size()),
            Op::Pop => ("pop", String::new(), op.fixed_size()),
            Op::LineStart => ("line_start", String::new(), op.fixed_size()),
            Op::LineEnd => ("line_end", String::new(), op.fixed_size()),
            Op::WordBoundary => ("word_boundary", String::new(), op.fixed_size()),
            Op::NotWordBoundary => ("not_word_boundary", String::new(), op.fixed_size()),
            Op::All => ("all", String::new(), op.fixed_size()),
            Op::Dots => ("dots", String::new(), op.fixed_size()),
            Op::Prev => ("prev", String::new(), op.fixed_size()),
            Op::BackReference => ("backreference", format!("{}", bytes[pc + 1]), op.fixed_size()),
            Op::BackwardBackReference => {
                ("backward_backreference", format!("{}", bytes[pc + 1]), op.fixed_size())
            }
            Op::Range | Op::Range32 => {
                let count = u16_at(1) as usize;
                let entry = if op == Op::Range { 4 } else { 8 };
                let mut ranges = String::new();
                for i in 0..count {
                    let base = 3 + i * entry;
                    let (lo, hi) = if op == Op::Range {
                        (u16_at(base) as u32, u16_at(base + 2) as u32)
                    } else {
                        (u32_at(base), u32_at(base + 4))
                    };
                    if i > 0 {
                        ranges.push(',');
                    }
                    let _ = write!(ranges, "[{lo:#x}-{hi:#x}]");
                }
                (if op == Op::Range { "range" } else { "range32" }, ranges, 3 + entry * count)
            }
        };
        let _ = writeln!(out, "{pc}:\t{mnemonic}\t{operands}");
        pc += size;
    }
    out
}
