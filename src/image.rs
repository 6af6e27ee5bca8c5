//! The bytecode image: a 16-byte header followed by instructions. Grounded
//! on how `RegExpParser::Parse` writes `GetOriginBuffer()`'s
//! `size`/`captureCount`/`stackCount`/`flags_` fields at fixed offsets
//! before handing the buffer to `RegExpExecutor::Execute`.

use crate::buffer::Buffer;
use crate::flags::Flags;

pub const HEADER_SIZE: usize = 16;

const OFFSET_SIZE: usize = 0;
const OFFSET_NUM_CAPTURES: usize = 4;
const OFFSET_NUM_STACK: usize = 8;
const OFFSET_FLAGS: usize = 12;

/// The 16-byte prefix read by the executor before it sizes its per-call
/// allocations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub size: u32,
    pub num_captures: u32,
    pub num_stack: u32,
    pub flags: Flags,
}

/// A finished, immutable bytecode program. Safe to share across concurrent
/// executors: nothing in it is mutated after [`crate::parser::Parser::finish`]
/// writes the header.
#[derive(Clone, Debug)]
pub struct BytecodeImage {
    bytes: Vec<u8>,
}

impl BytecodeImage {
    /// Wrap a finished buffer. The caller (the parser) is responsible for
    /// having written the 16-byte header already.
    pub(crate) fn from_buffer(buffer: Buffer) -> Self {
        BytecodeImage { bytes: buffer.into_vec() }
    }

    pub fn header(&self) -> Header {
        Header {
            size: u32::from_le_bytes(self.bytes[OFFSET_SIZE..OFFSET_SIZE + 4].try_into().unwrap()),
            num_captures: u32::from_le_bytes(
                self.bytes[OFFSET_NUM_CAPTURES..OFFSET_NUM_CAPTURES + 4].try_into().unwrap(),
            ),
            num_stack: u32::from_le_bytes(
                self.bytes[OFFSET_NUM_STACK..OFFSET_NUM_STACK + 4].try_into().unwrap(),
            ),
            flags: Flags::from_bits(u32::from_le_bytes(
                self.bytes[OFFSET_FLAGS..OFFSET_FLAGS + 4].try_into().unwrap(),
            )),
        }
    }

    /// The instructions, starting right after the header. Execution always
    /// begins at byte offset [`HEADER_SIZE`] of the full image.
    pub fn instructions(&self) -> &[u8] {
        &self.bytes[HEADER_SIZE..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[cfg(feature = "trace")]
    pub fn dump(&self) -> String {
        crate::opcode_dump::dump(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips_through_buffer() {
        let mut buffer = Buffer::new();
        buffer.emit_u32(0); // placeholder size
        buffer.emit_u32(1); // num_captures
        buffer.emit_u32(3); // num_stack
        buffer.emit_u32(crate::flags::IGNORE_CASE);
        buffer.emit_u8(crate::opcode::Op::MatchEnd as u8);
        let size = buffer.size() as u32;
        buffer.put_u32(0, size);
        let image = BytecodeImage::from_buffer(buffer);
        let header = image.header();
        assert_eq!(header.size, size);
        assert_eq!(header.num_captures, 1);
        assert_eq!(header.num_stack, 3);
        assert!(header.flags.ignore_case());
        assert_eq!(image.instructions().len(), 1);
    }
}
