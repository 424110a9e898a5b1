//! RLF font container builder and serializer.
//!
//! Assembles the runtime binary the `rlefont` reader consumes, from a JSON
//! description of glyph bitmaps and metrics.
//!
//! # Binary container layout (little-endian)
//! ```text
//! 0x00  4   MAGIC = b"RLF1"
//! 0x04  1   VERSION = 1
//! 0x05  1   FLAGS (reserved, 0)
//! 0x06  1   bbox_w (u8)               // global bounding box
//! 0x07  1   bbox_h (u8)
//! 0x08  1   ascent (i8, >= 0)
//! 0x09  1   descent (i8, <= 0)
//! 0x0A  1   default_advance (u8)      // pen delta for uncovered code points
//! 0x0B  1   bits_per_unset (u8, 1..=8)
//! 0x0C  1   bits_per_set (u8, 1..=8)
//! 0x0D  2   glyph_count (u16)
//! 0x0F  2   range_count (u16)
//! 0x11  ..  range_table[range_count]  // u24 start_cp, u16 len, u32 offset
//! ...   ..  glyph blocks, one per glyph, in code-point order:
//!           u8 w, u8 h, i8 x_offset, i8 y_offset, u8 advance, u16 data_len,
//!           then data_len bytes of run-length bitstream
//! ```
//!
//! The bitstream alternates unset/set run lengths (MSB-first bit packing),
//! starting with an unset run; a leading zero-length run lets a glyph open
//! with a set pixel. Runs longer than a field can hold are split by
//! interleaving zero-length runs of the opposite state, so narrow field
//! widths stay legal for any bitmap.

use anyhow::{Context, Result, bail};

const MAGIC: &[u8; 4] = b"RLF1";
const VERSION: u8 = 1;

/// Fixed header bytes before the range table starts.
const HDR_LEN: usize = 0x11;
/// Range table record: u24 start_cp, u16 len, u32 offset.
const RANGE_REC_LEN: usize = 9;
/// Glyph block prefix ahead of the bitstream.
const GLYPH_PREFIX_LEN: usize = 7;

// ──────────────────────────────────────────────────────────────────────────────
// metadata types (JSON schema)
// ──────────────────────────────────────────────────────────────────────────────

/// JSON schema for a font description.
///
/// Example:
/// ```json
/// {
///   "ascent": 6, "descent": -2,
///   "glyphs": [
///     {"ch": "A", "advance": 4, "rows": ["###", "#.#", "#.#", "#.#", "###"]}
///   ]
/// }
/// ```
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct Metadata {
  pub ascent: i8,
  pub descent: i8,
  /// Pen delta for code points the font does not cover; defaults to bbox_w.
  #[serde(default)]
  pub default_advance: Option<u8>,
  /// Run-length field widths; derived from the longest runs when omitted.
  #[serde(default)]
  pub bits_per_unset: Option<u8>,
  #[serde(default)]
  pub bits_per_set: Option<u8>,
  pub glyphs: Vec<Glyph>,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct Glyph {
  /// Single Unicode scalar, e.g. "A" (alternative to `cp`).
  #[serde(default)]
  pub ch: Option<String>,
  /// Raw code point (alternative to `ch`).
  #[serde(default)]
  pub cp: Option<u32>,
  /// Left side bearing.
  #[serde(default)]
  pub x_offset: i8,
  /// Height of the glyph's top row above the baseline; defaults to the row
  /// count, i.e. the glyph sits on the baseline.
  #[serde(default)]
  pub y_offset: Option<i8>,
  /// Pen delta to the next glyph; defaults to width + 1.
  #[serde(default)]
  pub advance: Option<u8>,
  /// Bitmap rows, `#` = set, `.` or space = unset; all rows equal length.
  /// Empty list = pixel-less glyph (space).
  #[serde(default)]
  pub rows: Vec<String>,
}

impl Glyph {
  fn code_point(&self) -> Result<u32> {
    match (&self.ch, self.cp) {
      (Some(s), None) => {
        let mut it = s.chars();
        let c = it.next().ok_or_else(|| anyhow::anyhow!("empty \"ch\""))?;
        if it.next().is_some() {
          bail!("\"ch\" must be a single scalar: {s:?}");
        }
        Ok(c as u32)
      }
      (None, Some(cp)) => {
        if char::from_u32(cp).is_none() {
          bail!("cp {cp:#X} is not a Unicode scalar value");
        }
        Ok(cp)
      }
      (Some(_), Some(_)) => bail!("give either \"ch\" or \"cp\", not both"),
      (None, None) => bail!("glyph needs \"ch\" or \"cp\""),
    }
  }

  /// Flatten `rows` to (width, height, row-major cells).
  fn bitmap(&self) -> Result<(u8, u8, Vec<bool>)> {
    if self.rows.is_empty() {
      return Ok((0, 0, Vec::new()));
    }
    let width = self.rows[0].chars().count();
    if width == 0 || width > 255 || self.rows.len() > 255 {
      bail!("bitmap must be 1..=255 x 1..=255, got {}x{}", width, self.rows.len());
    }
    let mut cells = Vec::with_capacity(width * self.rows.len());
    for (i, row) in self.rows.iter().enumerate() {
      if row.chars().count() != width {
        bail!("row {i} is {} chars, expected {width}", row.chars().count());
      }
      for c in row.chars() {
        match c {
          '#' => cells.push(true),
          '.' | ' ' => cells.push(false),
          other => bail!("row {i}: unexpected {other:?} (use '#', '.' or ' ')"),
        }
      }
    }
    Ok((width as u8, self.rows.len() as u8, cells))
  }
}

// ──────────────────────────────────────────────────────────────────────────────
// run-length encoding
// ──────────────────────────────────────────────────────────────────────────────

/// MSB-first bit packer; mirror of the reader's `BitReader`.
#[derive(Default)]
struct BitWriter {
  out: Vec<u8>,
  cur: u8,
  nbits: u8,
}

impl BitWriter {
  fn put(&mut self, value: u32, width: u8) {
    debug_assert!(width >= 1 && width <= 8 && value < (1 << width));
    for i in (0..width).rev() {
      self.cur = (self.cur << 1) | ((value >> i) & 1) as u8;
      self.nbits += 1;
      if self.nbits == 8 {
        self.out.push(self.cur);
        self.cur = 0;
        self.nbits = 0;
      }
    }
  }

  fn finish(mut self) -> Vec<u8> {
    if self.nbits > 0 {
      self.out.push(self.cur << (8 - self.nbits));
    }
    self.out
  }
}

/// Maximal same-state runs in scan order, alternating unset/set and always
/// starting with an unset run (zero-length when the first pixel is set).
fn natural_runs(cells: &[bool]) -> Vec<u32> {
  let mut runs = Vec::new();
  let mut state = false;
  let mut i = 0;
  while i < cells.len() {
    let n = cells[i..].iter().take_while(|&&c| c == state).count();
    runs.push(n as u32);
    i += n;
    state = !state;
  }
  runs
}

/// Encode alternating runs with fixed field widths. Runs exceeding a field's
/// range are split by emitting a zero-length run of the opposite state in
/// between, which keeps the decoder's strict alternation intact.
fn encode_stream(runs: &[u32], bits_per_unset: u8, bits_per_set: u8) -> Vec<u8> {
  let mut w = BitWriter::default();
  for (k, &run) in runs.iter().enumerate() {
    let (bits, other) = if k % 2 == 0 {
      (bits_per_unset, bits_per_set)
    } else {
      (bits_per_set, bits_per_unset)
    };
    let cap = (1u32 << bits) - 1;
    let mut n = run;
    loop {
      let chunk = n.min(cap);
      w.put(chunk, bits);
      n -= chunk;
      if n == 0 {
        break;
      }
      w.put(0, other);
    }
  }
  w.finish()
}

/// Smallest legal field width that holds `max_run` (capped at 8 bits; longer
/// runs are split at encode time).
fn field_width(max_run: u32) -> u8 {
  let capped = max_run.min(255).max(1);
  (32 - capped.leading_zeros()) as u8
}

// ──────────────────────────────────────────────────────────────────────────────
// assembly
// ──────────────────────────────────────────────────────────────────────────────

struct PackedGlyph {
  cp: u32,
  width: u8,
  height: u8,
  x_offset: i8,
  y_offset: i8,
  advance: u8,
  runs: Vec<u32>,
}

impl PackedGlyph {
  fn build(g: &Glyph) -> Result<Self> {
    let cp = g.code_point()?;
    let (width, height, cells) = g
      .bitmap()
      .with_context(|| format!("glyph U+{cp:04X}"))?;
    Ok(Self {
      cp,
      width,
      height,
      x_offset: g.x_offset,
      y_offset: g.y_offset.unwrap_or(height as i8),
      advance: g.advance.unwrap_or(width.saturating_add(1)),
      runs: natural_runs(&cells),
    })
  }
}

/// Build the complete RLF blob from a font description.
pub fn assemble(meta: &Metadata) -> Result<Vec<u8>> {
  if meta.ascent < 0 {
    bail!("ascent must be >= 0, got {}", meta.ascent);
  }
  if meta.descent > 0 {
    bail!("descent must be <= 0 (stored negative), got {}", meta.descent);
  }
  if meta.glyphs.is_empty() {
    bail!("font needs at least one glyph");
  }
  if meta.glyphs.len() > u16::MAX as usize {
    bail!("too many glyphs ({})", meta.glyphs.len());
  }

  let mut packed = meta.glyphs.iter().map(PackedGlyph::build).collect::<Result<Vec<_>>>()?;
  packed.sort_by_key(|g| g.cp);
  for pair in packed.windows(2) {
    if pair[0].cp == pair[1].cp {
      bail!("duplicate glyph for U+{:04X}", pair[0].cp);
    }
  }

  // Font-global run-length field widths: derived from the longest runs
  // unless pinned in the metadata.
  let mut max_unset = 0u32;
  let mut max_set = 0u32;
  for g in &packed {
    for (k, &run) in g.runs.iter().enumerate() {
      if k % 2 == 0 {
        max_unset = max_unset.max(run);
      } else {
        max_set = max_set.max(run);
      }
    }
  }
  let bits_per_unset = resolve_width(meta.bits_per_unset, max_unset, "bits_per_unset")?;
  let bits_per_set = resolve_width(meta.bits_per_set, max_set, "bits_per_set")?;

  let bbox_w = packed.iter().map(|g| g.width).max().unwrap_or(0);
  let bbox_h = packed.iter().map(|g| g.height).max().unwrap_or(0);
  let default_advance = meta.default_advance.unwrap_or(bbox_w.max(1));

  // Encode all blocks up front so range offsets are plain prefix sums.
  let mut blocks: Vec<Vec<u8>> = Vec::with_capacity(packed.len());
  for g in &packed {
    let data = encode_stream(&g.runs, bits_per_unset, bits_per_set);
    if data.len() > u16::MAX as usize {
      bail!("glyph U+{:04X}: bitstream {} bytes exceeds u16", g.cp, data.len());
    }
    let mut block = Vec::with_capacity(GLYPH_PREFIX_LEN + data.len());
    block.push(g.width);
    block.push(g.height);
    block.push(g.x_offset as u8);
    block.push(g.y_offset as u8);
    block.push(g.advance);
    block.extend_from_slice(&(data.len() as u16).to_le_bytes());
    block.extend_from_slice(&data);
    blocks.push(block);
  }

  // Coalesce consecutive code points into ranges.
  let mut ranges: Vec<(u32, u16, usize)> = Vec::new(); // (start_cp, len, first glyph index)
  for (i, g) in packed.iter().enumerate() {
    match ranges.last_mut() {
      Some((start, len, _)) if *start + *len as u32 == g.cp => *len += 1,
      _ => ranges.push((g.cp, 1, i)),
    }
  }
  if ranges.len() > u16::MAX as usize {
    bail!("too many charset ranges ({})", ranges.len());
  }

  let glyph_base = HDR_LEN + RANGE_REC_LEN * ranges.len();
  let mut block_offsets = Vec::with_capacity(blocks.len());
  let mut off = glyph_base;
  for block in &blocks {
    block_offsets.push(off as u32);
    off += block.len();
  }

  // ---- Serialize ----
  let mut out = Vec::with_capacity(off);
  out.extend_from_slice(MAGIC);
  out.push(VERSION);
  out.push(0); // flags
  out.push(bbox_w);
  out.push(bbox_h);
  out.push(meta.ascent as u8);
  out.push(meta.descent as u8);
  out.push(default_advance);
  out.push(bits_per_unset);
  out.push(bits_per_set);
  out.extend_from_slice(&(packed.len() as u16).to_le_bytes());
  out.extend_from_slice(&(ranges.len() as u16).to_le_bytes());
  for &(start, len, first) in &ranges {
    if start > 0xFF_FFFF {
      bail!("code point U+{start:04X} does not fit the u24 range field");
    }
    out.extend_from_slice(&start.to_le_bytes()[..3]);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&block_offsets[first].to_le_bytes());
  }
  for block in &blocks {
    out.extend_from_slice(block);
  }

  debug_assert_eq!(out.len(), off);
  Ok(out)
}

fn resolve_width(pinned: Option<u8>, max_run: u32, what: &str) -> Result<u8> {
  match pinned {
    Some(w) if (1..=8).contains(&w) => Ok(w),
    Some(w) => bail!("{what} must be 1..=8, got {w}"),
    None => Ok(field_width(max_run)),
  }
}

#[cfg(test)]
mod tests {
  use super::{Glyph, Metadata, assemble, field_width, natural_runs};
  use rlefont::{Error, Fallback, RleFont};

  fn glyph(ch: char, rows: &[&str]) -> Glyph {
    Glyph {
      ch: Some(ch.to_string()),
      cp: None,
      x_offset: 0,
      y_offset: None,
      advance: None,
      rows: rows.iter().map(|s| s.to_string()).collect(),
    }
  }

  fn meta(glyphs: Vec<Glyph>) -> Metadata {
    Metadata {
      ascent: 6,
      descent: -2,
      default_advance: None,
      bits_per_unset: None,
      bits_per_set: None,
      glyphs,
    }
  }

  fn render(font: &RleFont, ch: char) -> Result<Vec<(i32, i32, u32)>, Error> {
    let entry = font.lookup(ch)?;
    let mut runs = Vec::new();
    font.draw_glyph(&entry, 0, 0, &mut |x, y, len| runs.push((x, y, len)))?;
    Ok(runs)
  }

  /// Reconstruct a row-major bitmap from emitted runs, for equality checks
  /// against the source rows.
  fn rasterize(font: &RleFont, ch: char) -> Vec<String> {
    let entry = font.lookup(ch).unwrap();
    let (w, h) = (entry.width as i32, entry.height as i32);
    let mut grid = vec![vec![b'.'; w as usize]; h as usize];
    let mut sink = |x: i32, y: i32, len: u32| {
      let row = y + entry.y_offset as i32; // pen at (0,0)
      for i in 0..len as i32 {
        grid[row as usize][(x - entry.x_offset as i32 + i) as usize] = b'#';
      }
    };
    font.draw_glyph(&entry, 0, 0, &mut sink).unwrap();
    grid.into_iter().map(|r| String::from_utf8(r).unwrap()).collect()
  }

  #[test]
  fn box_glyph_round_trip() {
    let rows = ["###", "#.#", "#.#", "#.#", "###"];
    let blob = assemble(&meta(vec![glyph('A', &rows)])).unwrap();
    let font = RleFont::new(&blob).unwrap();

    assert_eq!(font.bbox(), (3, 5));
    let entry = font.lookup('A').unwrap();
    assert_eq!((entry.width, entry.height, entry.y_offset, entry.advance), (3, 5, 5, 4));

    // Same literal triples as the hand-assembled reader fixture.
    assert_eq!(
      render(&font, 'A').unwrap(),
      [
        (0, -5, 3),
        (0, -4, 1),
        (2, -4, 1),
        (0, -3, 1),
        (2, -3, 1),
        (0, -2, 1),
        (2, -2, 1),
        (0, -1, 3),
      ]
    );
    assert_eq!(rasterize(&font, 'A'), rows);
  }

  #[test]
  fn every_glyph_survives_round_trip() {
    let glyphs = vec![
      glyph('!', &["#", "#", "#", ".", "#"]),
      glyph('-', &["###"]),
      glyph('0', &[".##.", "#..#", "#..#", "#..#", ".##."]),
      glyph('1', &[".#", "##", ".#", ".#", ".#"]),
      glyph(' ', &[]),
    ];
    let sources: Vec<_> = glyphs.iter().map(|g| g.rows.clone()).collect();
    let blob = assemble(&meta(glyphs)).unwrap();
    let font = RleFont::new(&blob).unwrap();
    assert_eq!(font.glyph_count(), 5);

    for (ch, rows) in [('!', &sources[0]), ('-', &sources[1]), ('0', &sources[2]), ('1', &sources[3])] {
      assert_eq!(&rasterize(&font, ch), rows, "{ch:?}");
    }
    // The pixel-less space still advances.
    assert!(render(&font, ' ').unwrap().is_empty());
    assert_eq!(font.lookup(' ').unwrap().advance, 1);
  }

  #[test]
  fn derives_minimal_field_widths() {
    assert_eq!(field_width(0), 1);
    assert_eq!(field_width(1), 1);
    assert_eq!(field_width(3), 2);
    assert_eq!(field_width(4), 3);
    assert_eq!(field_width(255), 8);
    assert_eq!(field_width(10_000), 8);

    // Box glyph: longest unset run 1, longest set run 4 → widths 1 and 3.
    let blob = assemble(&meta(vec![glyph('A', &["###", "#.#", "#.#", "#.#", "###"])])).unwrap();
    assert_eq!((blob[11], blob[12]), (1, 3));
  }

  #[test]
  fn runs_alternate_and_start_unset() {
    let cells = |s: &str| s.chars().map(|c| c == '#').collect::<Vec<_>>();
    assert_eq!(natural_runs(&cells("..##.")), [2, 2, 1]);
    // A leading set pixel still yields an unset run first, zero-length.
    assert_eq!(natural_runs(&cells("#..")), [0, 1, 2]);
    assert!(natural_runs(&[]).is_empty());
  }

  #[test]
  fn splits_runs_wider_than_pinned_fields() {
    // 8x4 solid block forced through 2-bit fields: the 32-cell set run must
    // be split with zero-length unset runs and still decode identically.
    let mut m = meta(vec![glyph('#', &["########"; 4])]);
    m.bits_per_unset = Some(2);
    m.bits_per_set = Some(2);
    let blob = assemble(&m).unwrap();
    let font = RleFont::new(&blob).unwrap();
    assert_eq!(rasterize(&font, '#'), vec!["########"; 4]);
    // Splitting chops the emission into capped spans but never loses cells.
    let total: u32 = render(&font, '#').unwrap().iter().map(|r| r.2).sum();
    assert_eq!(total, 32);
  }

  #[test]
  fn glyph_starting_with_set_pixel() {
    // First pixel set forces the leading zero-length unset run.
    let blob = assemble(&meta(vec![glyph('/', &["#.", ".#"])])).unwrap();
    let font = RleFont::new(&blob).unwrap();
    assert_eq!(render(&font, '/').unwrap(), [(0, -2, 1), (1, -1, 1)]);
  }

  #[test]
  fn ranges_coalesce_and_lookup_works() {
    let glyphs: Vec<_> = ('0'..='9').chain('A'..='C').map(|c| glyph(c, &["##", "##"])).collect();
    let blob = assemble(&meta(glyphs)).unwrap();
    // Two ranges: 0x0F = range_count lo byte.
    assert_eq!(blob[15], 2);
    let font = RleFont::new(&blob).unwrap();
    for c in ('0'..='9').chain('A'..='C') {
      assert!(font.lookup(c).is_ok(), "{c:?}");
    }
    assert_eq!(font.lookup(':').err(), Some(Error::GlyphNotFound));
    assert_eq!(font.lookup('D').err(), Some(Error::GlyphNotFound));
  }

  #[test]
  fn layout_through_built_font() {
    let glyphs = vec![
      glyph('H', &["#.#", "#.#", "###", "#.#", "#.#"]),
      glyph('i', &["#", ".", "#", "#", "#"]),
    ];
    let blob = assemble(&meta(glyphs)).unwrap();
    let font = RleFont::new(&blob).unwrap().with_fallback(Fallback::Replace('i'));

    let d = font.dim("Hi!").unwrap();
    assert_eq!(d.width, 4 + 2 + 2); // 'i' substitutes for '!'
    assert_eq!((d.ascent, d.height), (6, 8));

    let mut n = 0usize;
    let advance = font.text(0, 0, "Hi", &mut |_, _, _| n += 1).unwrap();
    assert_eq!(advance, 6);
    assert!(n > 0);
  }

  #[test]
  fn rejects_bad_metadata() {
    assert!(assemble(&meta(vec![])).is_err());

    let mut m = meta(vec![glyph('A', &["#"])]);
    m.ascent = -1;
    assert!(assemble(&m).is_err());

    let m = meta(vec![glyph('A', &["#"]), glyph('A', &["#"])]);
    assert!(assemble(&m).unwrap_err().to_string().contains("duplicate"));

    let m = meta(vec![glyph('A', &["##", "#"])]); // ragged rows
    assert!(assemble(&m).is_err());

    let mut m = meta(vec![glyph('A', &["#"])]);
    m.bits_per_set = Some(9);
    assert!(assemble(&m).is_err());

    let m = meta(vec![Glyph { ch: None, cp: Some(0xD800), ..glyph('A', &["#"]) }]);
    assert!(assemble(&m).is_err());
  }
}
