#![cfg_attr(not(test), no_std)]

//! Minimal no_std reader & streaming renderer for RLF bitmap fonts.
//!
//! File format (little-endian):
//! - Header "RLF1", version=1: global bbox w/h, ascent, descent, default
//!   advance, run-length bit widths, glyph count, range count
//! - Range table: 9 bytes/record → u24 start_cp, u16 len, u32 offset
//! - Glyph blocks: 7-byte prefix (u8 w, u8 h, i8 x_offset, i8 y_offset,
//!   u8 advance, u16 data_len) followed by `data_len` bytes of run-length
//!   bitstream (MSB-first, alternating unset/set run lengths)
//!
//! Glyph bitmaps are never expanded: decoding walks the packed runs and
//! emits horizontal pixel spans straight into a caller-supplied sink, so
//! cost is proportional to the number of runs, not the glyph area. The font
//! blob is only borrowed; wrap it in whatever owner the host prefers.
//!
//! This module is `no_std` (uses only `core`).

mod bits;
mod glyph;
mod style;
mod text;

pub use bits::BitReader;
pub use style::RleTextStyle;
pub use text::{Fallback, TextDim};

const MAGIC: &[u8; 4] = b"RLF1";
const VERSION: u8 = 1;

/// Fixed header bytes before the range table starts.
const HDR_LEN: usize = 0x11;
/// Range table record: u24 start_cp, u16 len, u32 offset.
const RANGE_REC_LEN: usize = 9;
/// Glyph block prefix: u8 w, u8 h, i8 x_offset, i8 y_offset, u8 advance, u16 data_len.
const GLYPH_PREFIX_LEN: usize = 7;

/// Parsing/validation/rendering errors
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
  /// Header failed validation, buffer truncated, table inconsistent, or a
  /// glyph's run-length data is corrupt. Fatal for the whole font.
  MalformedFont,
  /// Code point not covered by any charset range. Recoverable; string
  /// rendering substitutes the configured [`Fallback`].
  GlyphNotFound,
  /// A bit-level read would cross the end of the buffer.
  OutOfBounds,
}

/// Per-glyph placement data, decoded from a glyph block's 7-byte prefix.
///
/// `y_offset` is the height of the glyph's top row above the baseline
/// (positive up); a glyph sitting on the baseline has `y_offset == height`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GlyphEntry {
  pub width: u8,
  pub height: u8,
  pub x_offset: i8,
  pub y_offset: i8,
  pub advance: u8,
  /// Byte offset of the glyph's run-length bitstream within the font blob.
  pub data_off: usize,
  pub data_len: u16,
}

/// Font-wide vertical metrics; `line_height == ascent - descent`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FontMetrics {
  pub ascent: i32,
  /// Stored negative (pixels below the baseline).
  pub descent: i32,
  pub line_height: i32,
}

/// Parsed RLF font view over the provided bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RleFont<'a> {
  data: &'a [u8],

  // Header metrics
  bbox_w: u8,
  bbox_h: u8,
  ascent: i8,
  descent: i8,
  default_advance: u8,
  bits_per_unset: u8,
  bits_per_set: u8,

  // Counts
  glyph_count: u16,
  range_count: u16,

  /// First byte after the range table (start of glyph blocks).
  glyph_base: usize,

  fallback: Fallback,
}

impl<'a> RleFont<'a> {
  /// Parse and validate a font from bytes. The sole load entry point.
  pub fn new(data: &'a [u8]) -> Result<Self, Error> {
    // ---- Fixed header (17 bytes) ----
    if data.len() < HDR_LEN {
      return Err(Error::MalformedFont);
    }
    if &data[0..4] != MAGIC {
      return Err(Error::MalformedFont);
    }
    if data[4] != VERSION {
      return Err(Error::MalformedFont);
    }
    let _flags = data[5];
    let bbox_w = data[6];
    let bbox_h = data[7];
    let ascent = data[8] as i8;
    let descent = data[9] as i8;
    let default_advance = data[10];
    let bits_per_unset = data[11];
    let bits_per_set = data[12];
    let glyph_count = le_u16_at(data, 13);
    let range_count = le_u16_at(data, 15);

    if bits_per_unset < 1 || bits_per_unset > 8 || bits_per_set < 1 || bits_per_set > 8 {
      return Err(Error::MalformedFont);
    }
    if ascent < 0 || descent > 0 {
      return Err(Error::MalformedFont);
    }
    if glyph_count == 0 || range_count == 0 {
      return Err(Error::MalformedFont);
    }

    let glyph_base = HDR_LEN + RANGE_REC_LEN * range_count as usize;
    if glyph_base >= data.len() {
      return Err(Error::MalformedFont);
    }

    // ---- Range table ----
    // Ranges must be sorted, disjoint, non-empty, cover exactly glyph_count
    // glyphs, and point (non-decreasingly) into the glyph block area.
    let mut prev_end = 0u32;
    let mut prev_off = glyph_base;
    let mut covered = 0u32;
    for i in 0..range_count as usize {
      let rec = HDR_LEN + RANGE_REC_LEN * i;
      let start = le_u24_at(data, rec);
      let len = le_u16_at(data, rec + 3);
      let off = le_u32_at(data, rec + 5) as usize;
      if len == 0 {
        return Err(Error::MalformedFont);
      }
      if i > 0 && start < prev_end {
        return Err(Error::MalformedFont);
      }
      if off < prev_off || off >= data.len() {
        return Err(Error::MalformedFont);
      }
      prev_end = start + len as u32;
      prev_off = off;
      covered += len as u32;
    }
    if covered != glyph_count as u32 {
      return Err(Error::MalformedFont);
    }

    Ok(Self {
      data,
      bbox_w,
      bbox_h,
      ascent,
      descent,
      default_advance,
      bits_per_unset,
      bits_per_set,
      glyph_count,
      range_count,
      glyph_base,
      fallback: Fallback::Skip,
    })
  }

  /// Same view with a different missing-glyph policy (default: [`Fallback::Skip`]).
  #[inline]
  pub fn with_fallback(mut self, fallback: Fallback) -> Self {
    self.fallback = fallback;
    self
  }

  /// Font-wide vertical metrics; touches no glyph data.
  #[inline]
  pub fn metrics(&self) -> FontMetrics {
    FontMetrics {
      ascent: self.ascent as i32,
      descent: self.descent as i32,
      line_height: self.ascent as i32 - self.descent as i32,
    }
  }

  /// Global bounding box (w, h) declared by the font.
  #[inline]
  pub fn bbox(&self) -> (u8, u8) {
    (self.bbox_w, self.bbox_h)
  }

  /// Pen delta used for code points the font does not cover.
  #[inline]
  pub fn default_advance(&self) -> u8 {
    self.default_advance
  }

  #[inline]
  pub fn glyph_count(&self) -> u16 {
    self.glyph_count
  }

  /// Range table record `i` as (start_cp, len, offset).
  #[inline]
  fn range(&self, i: usize) -> (u32, u16, usize) {
    let rec = HDR_LEN + RANGE_REC_LEN * i;
    (
      le_u24_at(self.data, rec),
      le_u16_at(self.data, rec + 3),
      le_u32_at(self.data, rec + 5) as usize,
    )
  }

  /// Map a code point to its glyph entry.
  ///
  /// Binary search over the ordered range table, then a short walk over the
  /// variable-length glyph blocks of the matching range. Uncovered code
  /// points return [`Error::GlyphNotFound`].
  pub fn lookup(&self, ch: char) -> Result<GlyphEntry, Error> {
    let cp = ch as u32;

    // Last range with start_cp <= cp.
    let mut lo = 0usize;
    let mut hi = self.range_count as usize;
    while lo < hi {
      let mid = (lo + hi) / 2;
      if self.range(mid).0 <= cp { lo = mid + 1 } else { hi = mid }
    }
    if lo == 0 {
      return Err(Error::GlyphNotFound);
    }
    let (start, len, off) = self.range(lo - 1);
    if cp >= start + len as u32 {
      return Err(Error::GlyphNotFound);
    }

    // Glyphs of a range are stored back to back; skip via data_len.
    let mut entry = self.glyph_at(off)?;
    for _ in 0..cp - start {
      entry = self.glyph_at(entry.data_off + entry.data_len as usize)?;
    }
    Ok(entry)
  }

  /// Decode the glyph block prefix at byte offset `off`.
  fn glyph_at(&self, off: usize) -> Result<GlyphEntry, Error> {
    if off < self.glyph_base || off + GLYPH_PREFIX_LEN > self.data.len() {
      return Err(Error::MalformedFont);
    }
    let d = self.data;
    let data_len = le_u16_at(d, off + 5);
    let data_off = off + GLYPH_PREFIX_LEN;
    if data_off + data_len as usize > d.len() {
      return Err(Error::MalformedFont);
    }
    Ok(GlyphEntry {
      width: d[off],
      height: d[off + 1],
      x_offset: d[off + 2] as i8,
      y_offset: d[off + 3] as i8,
      advance: d[off + 4],
      data_off,
      data_len,
    })
  }

  #[inline]
  pub(crate) fn data(&self) -> &'a [u8] {
    self.data
  }

  #[inline]
  pub(crate) fn run_widths(&self) -> (u8, u8) {
    (self.bits_per_unset, self.bits_per_set)
  }

  #[inline]
  pub(crate) fn fallback(&self) -> Fallback {
    self.fallback
  }
}

#[inline]
const fn le_u16_at(b: &[u8], off: usize) -> u16 {
  (b[off] as u16) | ((b[off + 1] as u16) << 8)
}

#[inline]
const fn le_u24_at(b: &[u8], off: usize) -> u32 {
  (b[off] as u32) | ((b[off + 1] as u32) << 8) | ((b[off + 2] as u32) << 16)
}

#[inline]
const fn le_u32_at(b: &[u8], off: usize) -> u32 {
  (b[off] as u32) | ((b[off + 1] as u32) << 8) | ((b[off + 2] as u32) << 16) | ((b[off + 3] as u32) << 24)
}
