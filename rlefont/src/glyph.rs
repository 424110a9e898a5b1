use crate::{BitReader, Error, GlyphEntry, RleFont};

impl<'a> RleFont<'a> {
  /// Decode one glyph's packed bitmap, emitting horizontal pixel runs.
  ///
  /// `sink(x, y, len)` receives device coordinates: `pen_y` is the baseline
  /// and y grows downward, so row `r` of the glyph lands at
  /// `pen_y - y_offset + r`. Runs are read with a fresh [`BitReader`] on
  /// every call; no bitmap is materialized and nothing is cached, so cost is
  /// proportional to the number of runs in the glyph.
  ///
  /// The stream alternates unset/set run lengths starting with an unset run
  /// (possibly zero-length, for glyphs whose first pixel is set) and ends
  /// once `width * height` cells are accounted for. A run overshooting that
  /// total means the data is corrupt: [`Error::MalformedFont`].
  pub fn draw_glyph<F>(&self, entry: &GlyphEntry, pen_x: i32, pen_y: i32, sink: &mut F) -> Result<(), Error>
  where
    F: FnMut(i32, i32, u32) + ?Sized,
  {
    let w = entry.width as u32;
    let total = w * entry.height as u32;
    if total == 0 {
      // Pixel-less glyph (space); only its advance matters.
      return Ok(());
    }

    let (bits_per_unset, bits_per_set) = self.run_widths();
    let stream = &self.data()[entry.data_off..entry.data_off + entry.data_len as usize];
    let mut bits = BitReader::new(stream, 0);

    let x0 = pen_x + entry.x_offset as i32;
    let y0 = pen_y - entry.y_offset as i32;

    // `filled` doubles as the flat cell index of the next undecoded pixel.
    let mut filled = 0u32;
    loop {
      let unset = bits.take(bits_per_unset).map_err(|_| Error::MalformedFont)? as u32;
      if unset > total - filled {
        return Err(Error::MalformedFont);
      }
      filled += unset;
      if filled == total {
        break;
      }

      let set = bits.take(bits_per_set).map_err(|_| Error::MalformedFont)? as u32;
      if set > total - filled {
        return Err(Error::MalformedFont);
      }
      // Split the set run at row edges: one horizontal span per row.
      let mut run = set;
      while run > 0 {
        let col = filled % w;
        let span = run.min(w - col);
        sink(x0 + col as i32, y0 + (filled / w) as i32, span);
        filled += span;
        run -= span;
      }
      if filled == total {
        break;
      }
    }
    Ok(())
  }
}
