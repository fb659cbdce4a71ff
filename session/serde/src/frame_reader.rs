use crate::error::SerdeErr;

/// Sequential reader over a received frame.
///
/// All multi-byte integers on the wire are little-endian. Every read
/// advances the cursor; reading past the end returns [`SerdeErr`].
pub struct FrameReader<'a> {
    buffer: &'a [u8],
    cursor: usize,
}

impl<'a> FrameReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, cursor: 0 }
    }

    /// Total length of the underlying frame, including consumed bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Current cursor position from the start of the frame.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// The bytes not yet consumed.
    pub fn remaining(&self) -> &'a [u8] {
        &self.buffer[self.cursor..]
    }

    /// Advance the cursor without reading.
    pub fn skip(&mut self, amount: usize) {
        self.cursor = (self.cursor + amount).min(self.buffer.len());
    }

    pub fn read_u8(&mut self) -> Result<u8, SerdeErr> {
        let [b] = self.read_array::<1>()?;
        Ok(b)
    }

    pub fn read_u16(&mut self) -> Result<u16, SerdeErr> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, SerdeErr> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Read a fixed-size blob, e.g. a 16-byte UUID.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], SerdeErr> {
        let end = self.cursor.checked_add(N).ok_or(SerdeErr)?;
        if end > self.buffer.len() {
            return Err(SerdeErr);
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buffer[self.cursor..end]);
        self.cursor = end;
        Ok(out)
    }
}
