mod font;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::{fs, path::Path, path::PathBuf};

// ---------------------------------------------
// rlefont: RLF font builder CLI
// Builds the runtime binary (magic+header+range table+RLE glyph blocks)
// from a JSON glyph description, and can render a preview string through
// the actual reader crate to prove the blob decodes.
// ---------------------------------------------
#[derive(Parser, Debug)]
#[command(name = "rlefont", author, version, about = "rlefont: build an RLF bitmap font from a JSON description", long_about = None)]
struct Cli {
  /// Font description JSON path
  #[arg(short, long)]
  json: PathBuf,

  /// Output file (.rlf)
  #[arg(short, long)]
  output: PathBuf,

  /// Also render this sample text with the built font into
  /// <output>.preview.png (via the `rlefont` reader, not the builder)
  #[arg(long)]
  preview: Option<String>,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let json_text = fs::read_to_string(&cli.json).with_context(|| format!("read json {:?}", cli.json))?;
  let meta: font::Metadata = serde_json::from_str(&json_text).context("parse font description")?;
  let blob = font::assemble(&meta).context("assemble font")?;

  fs::write(&cli.output, &blob).with_context(|| format!("write {:?}", cli.output))?;
  eprintln!("wrote {} bytes to {}", blob.len(), cli.output.display());

  if let Some(sample) = &cli.preview {
    write_preview(&blob, sample, &cli.output)?;
  }
  Ok(())
}

/// Round-trip the fresh blob through the reader and rasterize `sample` into
/// a grayscale PNG next to the output file.
fn write_preview(blob: &[u8], sample: &str, output: &Path) -> Result<()> {
  let font = rlefont::RleFont::new(blob).map_err(|e| anyhow!("reader rejected the built blob: {e:?}"))?;
  let font = font.with_fallback(rlefont::Fallback::Box);

  let dim = font.dim(sample).map_err(|e| anyhow!("measure preview text: {e:?}"))?;
  let m = font.metrics();
  let (w, h) = (dim.width.max(1) as u32, dim.height.max(1) as u32);

  let mut img = image::GrayImage::new(w, h);
  let mut clipped = 0u32;
  {
    let mut sink = |x: i32, y: i32, len: u32| {
      for i in 0..len as i32 {
        let (px, py) = (x + i, y);
        if px >= 0 && py >= 0 && (px as u32) < w && (py as u32) < h {
          img.put_pixel(px as u32, py as u32, image::Luma([0xFF]));
        } else {
          clipped += 1;
        }
      }
    };
    font
      .text(0, m.ascent, sample, &mut sink)
      .map_err(|e| anyhow!("render preview text: {e:?}"))?;
  }
  if clipped > 0 {
    eprintln!("preview: {clipped} pixels fell outside the line box (check glyph offsets)");
  }

  let path = output.with_extension("preview.png");
  img.save(&path).with_context(|| format!("write {path:?}"))?;
  eprintln!("wrote preview to {}", path.display());
  Ok(())
}
