//! Append-only byte buffer with grow-on-demand capacity, in-place patch of
//! fixed-size encodings, and mid-buffer insertion for the parser's
//! alternation/quantifier emission strategy. Grounded on `DynChunk` in
//! `ecmascript/regexp/dyn_chunk.{h,cpp}`: same `Insert`/`Emit*`/`PutU*`/
//! `GetU*` surface, reworked onto `Vec<u8>` instead of a raw `Chunk`
//! allocator.

const ALLOCATE_MIN_SIZE: usize = 64;

/// A growable byte buffer that the parser emits bytecode into.
///
/// Every operation that would overflow capacity grows the buffer first,
/// via `Vec`'s own doubling.
#[derive(Clone, Debug, Default)]
pub struct Buffer {
    bytes: Vec<u8>,
}

impl Buffer {
    pub fn new() -> Self {
        Buffer { bytes: Vec::with_capacity(ALLOCATE_MIN_SIZE) }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }

    pub fn emit_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn emit_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn emit_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn emit_i32(&mut self, value: i32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn emit_bytes(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    /// Patch a fixed-size field at a known offset, written earlier as a
    /// placeholder. Used to resolve forward `GOTO`/`SPLIT_*` targets once
    /// the jump destination is known.
    pub fn put_u8(&mut self, offset: usize, value: u8) {
        self.bytes[offset] = value;
    }

    pub fn put_u32(&mut self, offset: usize, value: u32) {
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn put_i32(&mut self, offset: usize, value: i32) {
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn get_u8(&self, offset: usize) -> u8 {
        self.bytes[offset]
    }

    pub fn get_u32(&self, offset: usize) -> u32 {
        u32::from_le_bytes(self.bytes[offset..offset + 4].try_into().unwrap())
    }

    /// Shift `[offset..end]` forward by `len` bytes, zeroing the gap, and
    /// return the offset the caller should now fill. Used to reserve space
    /// for a `SPLIT_NEXT`/`PUSH`/`SAVE_RESET` at the *start* of
    /// already-emitted bytes (alternation and quantifier emission both
    /// insert before the body they wrap, rather than emitting in order).
    pub fn insert(&mut self, offset: usize, len: usize) -> usize {
        self.bytes.splice(offset..offset, std::iter::repeat(0u8).take(len));
        offset
    }

    /// Rotate `[start..end]` so the bytes written most recently (i.e. the
    /// tail of the region) land at `start`, shifting everything before them
    /// rightward. Used by backward-emission mode (lookbehind) to reverse
    /// term order after each term is emitted in its normal left-to-right
    /// shape.
    pub fn rotate_to_front(&mut self, start: usize, mid: usize, end: usize) {
        debug_assert!(start <= mid && mid <= end && end <= self.bytes.len());
        self.bytes[start..end].rotate_left(mid - start);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_little_endian() {
        let mut buf = Buffer::new();
        buf.emit_u32(0x0102_0304);
        assert_eq!(buf.as_slice(), &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn insert_shifts_and_zeroes() {
        let mut buf = Buffer::new();
        buf.emit_bytes(&[1, 2, 3, 4]);
        let at = buf.insert(1, 2);
        assert_eq!(at, 1);
        assert_eq!(buf.as_slice(), &[1, 0, 0, 2, 3, 4]);
    }

    #[test]
    fn patch_round_trips() {
        let mut buf = Buffer::new();
        buf.emit_u32(0);
        buf.put_u32(0, 42);
        assert_eq!(buf.get_u32(0), 42);
    }
}
