use crate::RleFont;

use embedded_graphics::text::{Baseline, renderer::*};
use embedded_graphics_core::{prelude::*, primitives::Rectangle};

/// [`TextRenderer`] over an [`RleFont`] for use with `embedded_graphics`
/// text primitives. Pixels are 1-bit: set runs are filled with `color`,
/// background is left untouched (transparent).
#[derive(Copy, Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct RleTextStyle<'a, C: PixelColor> {
  pub color: C,
  pub font: &'a RleFont<'a>,
}

impl<'a, C: PixelColor> RleTextStyle<'a, C> {
  /// Creates a text style with transparent background.
  pub const fn new(font: &'a RleFont<'a>, color: C) -> Self {
    Self { color, font }
  }

  /// Vertical offset (in px) from the provided position to the baseline.
  #[inline]
  fn baseline_offset(&self, baseline: Baseline) -> i32 {
    let m = self.font.metrics();
    match baseline {
      Baseline::Top => m.ascent,
      Baseline::Bottom => m.descent,
      Baseline::Middle => m.ascent - m.line_height / 2,
      Baseline::Alphabetic => 0,
    }
  }
}

impl<C: PixelColor> TextRenderer for RleTextStyle<'_, C> {
  type Color = C;

  /// Draws `text` with the glyph runs filled via [`DrawTarget::fill_solid`].
  ///
  /// The `TextRenderer` contract has no channel for font errors: if a
  /// glyph's run data turns out corrupt the string stops at that glyph and
  /// the pen position reached so far is returned.
  fn draw_string<D>(&self, text: &str, position: Point, baseline: Baseline, target: &mut D) -> Result<Point, D::Error>
  where
    D: DrawTarget<Color = Self::Color>,
  {
    let pen_y = position.y + self.baseline_offset(baseline);

    let mut draw_err: Option<D::Error> = None;
    let mut advance = 0;
    {
      let mut sink = |x: i32, y: i32, len: u32| {
        if draw_err.is_some() {
          return;
        }
        let area = Rectangle::new(Point::new(x, y), Size::new(len, 1));
        if let Err(e) = target.fill_solid(&area, self.color) {
          draw_err = Some(e);
        }
      };
      if let Ok(dx) = self.font.text(position.x, pen_y, text, &mut sink) {
        advance = dx;
      }
    }
    if let Some(e) = draw_err {
      return Err(e);
    }

    Ok(Point::new(position.x + advance, position.y))
  }

  fn draw_whitespace<D>(
    &self,
    width: u32,
    position: Point,
    _baseline: Baseline,
    _target: &mut D,
  ) -> Result<Point, D::Error>
  where
    D: DrawTarget<Color = Self::Color>,
  {
    // Transparent background: nothing to draw, just move the pen.
    Ok(Point::new(position.x + width as i32, position.y))
  }

  fn measure_string(&self, text: &str, position: Point, baseline: Baseline) -> TextMetrics {
    let m = self.font.metrics();
    let pen_y = position.y + self.baseline_offset(baseline);
    let width = self.font.dim(text).map(|d| d.width).unwrap_or(0);

    TextMetrics {
      bounding_box: Rectangle::new(
        Point::new(position.x, pen_y - m.ascent),
        Size::new(width.max(0) as u32, m.line_height.max(0) as u32),
      ),
      next_position: position + Point::new(width, 0),
    }
  }

  fn line_height(&self) -> u32 {
    self.font.metrics().line_height.max(0) as u32
  }
}
