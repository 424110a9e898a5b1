use crate::Error;

/// Bit-level cursor over a byte slice.
///
/// Yields unsigned fields of 1..=8 bits, most-significant-bit first within
/// each byte, advancing across byte boundaries. All reads are bounds-checked
/// against the end of the slice.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BitReader<'a> {
  data: &'a [u8],
  pos: usize, // in bits from the start of `data`
}

impl<'a> BitReader<'a> {
  /// Cursor over `data`, starting `start_bit` bits in.
  #[inline]
  pub const fn new(data: &'a [u8], start_bit: usize) -> Self {
    Self { data, pos: start_bit }
  }

  /// Current position in bits from the start of the slice.
  #[inline]
  pub const fn bit_pos(&self) -> usize {
    self.pos
  }

  /// Move the cursor to an absolute bit position.
  #[inline]
  pub fn seek(&mut self, bit: usize) {
    self.pos = bit;
  }

  /// Align the cursor up to the next byte boundary (no-op if already aligned).
  #[inline]
  pub fn skip_to_byte(&mut self) {
    self.pos = (self.pos + 7) & !7;
  }

  /// Consume the next `width` bits (1..=8) as an unsigned value.
  pub fn take(&mut self, width: u8) -> Result<u8, Error> {
    debug_assert!(width >= 1 && width <= 8, "field width out of range");
    let end = self.pos + width as usize;
    if end > self.data.len() * 8 {
      return Err(Error::OutOfBounds);
    }
    let byte = self.pos / 8;
    let bit = self.pos % 8;
    // Window of up to 16 bits; bit + width <= 15 always holds.
    let hi = self.data[byte] as u16;
    let lo = if byte + 1 < self.data.len() { self.data[byte + 1] as u16 } else { 0 };
    let window = (hi << 8) | lo;
    let shift = 16 - bit - width as usize;
    let mask = (1u16 << width) - 1;
    self.pos = end;
    Ok(((window >> shift) & mask) as u8)
  }
}
