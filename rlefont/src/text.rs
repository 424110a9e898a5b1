use crate::{Error, GlyphEntry, RleFont};

/// Policy applied when a code point has no glyph in the font.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fallback {
  /// Draw nothing, advance the pen by the font's default advance.
  #[default]
  Skip,
  /// Substitute another glyph; skipped if that one is missing too.
  Replace(char),
  /// Draw a `default_advance x ascent` outline box on the baseline.
  Box,
}

/// String measurement from [`RleFont::dim`].
///
/// `width` is the summed advance of every resolved code point; `ascent` and
/// `height` (`== ascent - descent`) come from the font header and do not
/// depend on the string.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TextDim {
  pub width: i32,
  pub ascent: i32,
  pub height: i32,
}

impl<'a> RleFont<'a> {
  /// Render `s` left-to-right with its baseline at `pen_y` and the pen
  /// starting at `pen_x`. Returns the total advance.
  ///
  /// Missing glyphs never abort the string: they resolve through the
  /// configured [`Fallback`] and still move the pen. Corrupt glyph data does
  /// abort, with [`Error::MalformedFont`].
  pub fn text<F>(&self, pen_x: i32, pen_y: i32, s: &str, sink: &mut F) -> Result<i32, Error>
  where
    F: FnMut(i32, i32, u32) + ?Sized,
  {
    let mut x = pen_x;
    for ch in s.chars() {
      match self.resolve(ch)? {
        Some(entry) => {
          self.draw_glyph(&entry, x, pen_y, sink)?;
          x += entry.advance as i32;
        }
        None => {
          if self.fallback() == Fallback::Box {
            self.draw_missing_box(x, pen_y, sink);
          }
          x += self.default_advance() as i32;
        }
      }
    }
    Ok(x - pen_x)
  }

  /// Measure `s` without rendering: same code-point resolution as
  /// [`RleFont::text`], no sink. An empty string is a zero-width result.
  pub fn dim(&self, s: &str) -> Result<TextDim, Error> {
    let mut width = 0i32;
    for ch in s.chars() {
      width += match self.resolve(ch)? {
        Some(entry) => entry.advance as i32,
        None => self.default_advance() as i32,
      };
    }
    let m = self.metrics();
    Ok(TextDim { width, ascent: m.ascent, height: m.line_height })
  }

  /// Resolve a code point through the fallback policy. `Ok(None)` means
  /// "nothing to draw, use the default advance"; real font corruption still
  /// propagates as an error.
  fn resolve(&self, ch: char) -> Result<Option<GlyphEntry>, Error> {
    match self.lookup(ch) {
      Ok(entry) => Ok(Some(entry)),
      Err(Error::GlyphNotFound) => match self.fallback() {
        Fallback::Replace(sub) => match self.lookup(sub) {
          Ok(entry) => Ok(Some(entry)),
          Err(Error::GlyphNotFound) => Ok(None),
          Err(e) => Err(e),
        },
        _ => Ok(None),
      },
      Err(e) => Err(e),
    }
  }

  /// The classic missing-glyph tofu: an outline box sitting on the baseline.
  fn draw_missing_box<F>(&self, pen_x: i32, pen_y: i32, sink: &mut F)
  where
    F: FnMut(i32, i32, u32) + ?Sized,
  {
    let w = self.default_advance() as i32;
    let h = self.metrics().ascent;
    if w < 2 || h < 2 {
      return;
    }
    let top = pen_y - h;
    sink(pen_x, top, w as u32);
    for y in top + 1..pen_y - 1 {
      sink(pen_x, y, 1);
      sink(pen_x + w - 1, y, 1);
    }
    sink(pen_x, pen_y - 1, w as u32);
  }
}
