use anyhow::{Context, Result, anyhow, bail};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use color_quant::NeuQuant;
use image::{DynamicImage, imageops::FilterType};
use ratatui::{
  buffer::Buffer,
  layout::Rect,
  style::{Color, Style},
  widgets::Widget,
};
use std::collections::HashMap;
use std::io::{Stdout, Write};
use std::marker::PhantomData;
use tracing::debug;

use crate::decode::DecodedImage;
use crate::display::DisplayMode;
use crate::image_cache::{TextureId, TextureUploader};

// --- Renderer ---

/// Owns every poster the terminal knows about.
///
/// Kitty keeps uploaded pixels terminal-side and places them by id; the
/// other modes keep a CPU copy here and draw from it. The struct is `!Send`,
/// so uploads can only happen on the thread that drives the terminal.
pub struct Renderer<W: Write = Stdout> {
  mode: DisplayMode,
  out: W,
  next_id: u32,
  textures: HashMap<TextureId, DynamicImage>,
  placed: Option<(TextureId, Rect)>,
  fitted: Option<(TextureId, Rect, DynamicImage)>,
  _not_send: PhantomData<*const ()>,
}

impl Renderer<Stdout> {
  pub fn new(mode: DisplayMode) -> Self {
    Self::with_writer(mode, std::io::stdout())
  }
}

impl<W: Write> Renderer<W> {
  pub fn with_writer(mode: DisplayMode, out: W) -> Self {
    Self {
      mode,
      out,
      next_id: 1,
      textures: HashMap::new(),
      placed: None,
      fitted: None,
      _not_send: PhantomData,
    }
  }

  pub fn mode(&self) -> DisplayMode {
    self.mode
  }

  #[cfg(test)]
  pub fn writer(&self) -> &W {
    &self.out
  }

  /// Draw `id` over `area` with a terminal graphics protocol. Nothing is
  /// emitted while the texture and area stay the same.
  pub fn place(&mut self, id: TextureId, area: Rect) -> Result<()> {
    if area.is_empty() || self.placed == Some((id, area)) {
      return Ok(());
    }
    match self.mode {
      DisplayMode::Kitty => {
        if let Some((old, _)) = self.placed
          && old != id
        {
          kitty_delete_placement(&mut self.out, old)?;
        }
        kitty_place(&mut self.out, id, area)?;
      }
      DisplayMode::Sixel => {
        let image = self.textures.get(&id).ok_or_else(|| anyhow!("unknown texture {}", id.0))?;
        let data = sixel_encode(image, area);
        write!(self.out, "\x1B[{};{}H{}", area.y.saturating_add(1), area.x.saturating_add(1), data)
          .context("Failed to write sixel image")?;
        self.out.flush().context("Failed to flush sixel image")?;
      }
      DisplayMode::Direct | DisplayMode::Ascii => return Ok(()),
    }
    self.placed = Some((id, area));
    Ok(())
  }

  /// Remove whatever `place` drew. Uploaded textures stay resident.
  pub fn clear(&mut self) -> Result<()> {
    if let Some((id, _)) = self.placed.take()
      && self.mode == DisplayMode::Kitty
    {
      kitty_delete_placement(&mut self.out, id)?;
    }
    Ok(())
  }

  /// Drop every terminal-side image. Called once on exit.
  pub fn delete_all(&mut self) -> Result<()> {
    self.placed = None;
    if self.mode == DisplayMode::Kitty {
      kitty_delete_all(&mut self.out)?;
    }
    Ok(())
  }

  /// The texture scaled to fit `area` in cells, for the half-block and ASCII widgets.
  pub fn fitted(&mut self, id: TextureId, area: Rect) -> Option<&DynamicImage> {
    let stale = !matches!(&self.fitted, Some((fid, farea, _)) if *fid == id && *farea == area);
    if stale {
      let image = self.textures.get(&id)?;
      let rows_per_cell = if self.mode == DisplayMode::Direct { 2 } else { 1 };
      let target_h = (area.height as u32 * rows_per_cell).max(1);
      let resized = image.resize(area.width.max(1) as u32, target_h, FilterType::Lanczos3);
      self.fitted = Some((id, area, resized));
    }
    self.fitted.as_ref().map(|(_, _, image)| image)
  }
}

impl<W: Write> TextureUploader for Renderer<W> {
  fn upload(&mut self, image: &DecodedImage) -> Result<TextureId> {
    let id = TextureId(self.next_id);
    match self.mode {
      DisplayMode::Kitty => kitty_transmit(&mut self.out, id, image)?,
      DisplayMode::Sixel | DisplayMode::Direct | DisplayMode::Ascii => {
        let dynamic = image.to_dynamic().ok_or_else(|| anyhow!("pixel buffer does not match {}x{}", image.width, image.height))?;
        self.textures.insert(id, dynamic);
      }
    }
    self.next_id += 1;
    debug!(id = id.0, width = image.width, height = image.height, mode = self.mode.label(), "graphics: texture uploaded");
    Ok(id)
  }
}

// --- Poster Widget ---

/// Cell-buffer rendering for terminals without a graphics protocol.
pub struct PosterWidget<'a> {
  pub image: &'a DynamicImage,
  pub display_mode: DisplayMode,
}

const ASCII_CHARS: [&str; 10] = [" ", ".", ":", "-", "=", "+", "*", "#", "%", "@"];

impl Widget for PosterWidget<'_> {
  fn render(self, area: Rect, buf: &mut Buffer) {
    if area.is_empty() {
      return;
    }
    match self.display_mode {
      DisplayMode::Direct => render_direct(self.image, area, buf),
      DisplayMode::Ascii => render_ascii(self.image, area, buf),
      DisplayMode::Kitty | DisplayMode::Sixel => {}
    }
  }
}

fn cell(origin: u16, offset: u32, i: u32) -> u16 {
  origin.saturating_add(offset.min(u16::MAX as u32) as u16).saturating_add(i.min(u16::MAX as u32) as u16)
}

fn render_direct(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  let rgb = image.to_rgb8();
  let img_w = rgb.width().min(area.width as u32);
  let img_h = rgb.height();
  let cell_h = img_h.div_ceil(2);
  let offset_x = (area.width as u32).saturating_sub(img_w) / 2;
  let offset_y = (area.height as u32).saturating_sub(cell_h) / 2;

  for y in 0..cell_h.min(area.height as u32) {
    for x in 0..img_w {
      let upper = rgb.get_pixel(x, y * 2);
      let lower_y = y * 2 + 1;
      let fg = Color::Rgb(upper[0], upper[1], upper[2]);
      let bg = if lower_y < img_h {
        let lower = rgb.get_pixel(x, lower_y);
        Color::Rgb(lower[0], lower[1], lower[2])
      } else {
        Color::Reset
      };
      buf.set_string(cell(area.x, offset_x, x), cell(area.y, offset_y, y), "▀", Style::default().fg(fg).bg(bg));
    }
  }
}

fn render_ascii(image: &DynamicImage, area: Rect, buf: &mut Buffer) {
  let luma = image.to_luma8();
  let img_w = luma.width().min(area.width as u32);
  let img_h = luma.height().min(area.height as u32);
  let offset_x = (area.width as u32).saturating_sub(img_w) / 2;
  let offset_y = (area.height as u32).saturating_sub(img_h) / 2;

  for y in 0..img_h {
    for x in 0..img_w {
      let pixel = luma.get_pixel(x, y)[0];
      let idx = ((pixel as f32 / 255.0) * (ASCII_CHARS.len() - 1) as f32).round() as usize;
      let idx = idx.min(ASCII_CHARS.len() - 1);
      buf.set_string(cell(area.x, offset_x, x), cell(area.y, offset_y, y), ASCII_CHARS[idx], Style::default());
    }
  }
}

// --- Kitty Graphics Protocol ---
//
// Posters are transmitted once as raw pixels and then placed by id:
//
//   Transmit:  \x1B_G a=t,f=24|32,s=<w>,v=<h>,i=<id>,q=2,m=1;<base64 chunk>\x1B\\
//   Continue:  \x1B_G m=1;<base64 chunk>\x1B\\
//   Last:      \x1B_G m=0;<base64 chunk>\x1B\\
//   Place:     \x1B_G a=p,i=<id>,p=1,c=<cols>,r=<rows>,q=2\x1B\\
//   Delete placement: \x1B_G a=d,d=i,i=<id>,q=2\x1B\\   (image data kept)
//   Delete all:       \x1B_G a=d,d=A,q=2\x1B\\          (image data freed)
//
// f=24 is packed RGB, f=32 packed RGBA. Payloads go out in <=4096-byte chunks.

const KITTY_CHUNK_SIZE: usize = 4096;

pub fn kitty_transmit(out: &mut impl Write, id: TextureId, image: &DecodedImage) -> Result<()> {
  if image.pixels.is_empty() {
    bail!("refusing to transmit an empty image");
  }
  let format = if image.has_alpha() { 32 } else { 24 };
  let b64 = BASE64.encode(&image.pixels);
  let chunks: Vec<&[u8]> = b64.as_bytes().chunks(KITTY_CHUNK_SIZE).collect();
  let last = chunks.len().saturating_sub(1);

  for (i, chunk) in chunks.iter().enumerate() {
    let data = std::str::from_utf8(chunk).context("base64 chunk was not valid UTF-8")?;
    let more = if i < last { 1 } else { 0 };
    if i == 0 {
      write!(
        out,
        "\x1B_Ga=t,f={},s={},v={},i={},q=2,m={};{}\x1B\\",
        format, image.width, image.height, id.0, more, data
      )
      .context("Failed to write kitty transmit header chunk")?;
    } else {
      write!(out, "\x1B_Gm={};{}\x1B\\", more, data).context("Failed to write kitty transmit continuation chunk")?;
    }
  }
  out.flush().context("Failed to flush kitty transmit")?;
  Ok(())
}

pub fn kitty_place(out: &mut impl Write, id: TextureId, area: Rect) -> Result<()> {
  write!(out, "\x1B[{};{}H", area.y.saturating_add(1), area.x.saturating_add(1))
    .context("Failed to position cursor for kitty placement")?;
  write!(out, "\x1B_Ga=p,i={},p=1,c={},r={},q=2\x1B\\", id.0, area.width, area.height)
    .context("Failed to write kitty placement")?;
  out.flush().context("Failed to flush kitty placement")?;
  Ok(())
}

pub fn kitty_delete_placement(out: &mut impl Write, id: TextureId) -> Result<()> {
  write!(out, "\x1B_Ga=d,d=i,i={},q=2\x1B\\", id.0).context("Failed to write kitty delete placement")?;
  out.flush().context("Failed to flush kitty delete placement")?;
  Ok(())
}

pub fn kitty_delete_all(out: &mut impl Write) -> Result<()> {
  write!(out, "\x1B_Ga=d,d=A,q=2\x1B\\").context("Failed to write kitty delete all")?;
  out.flush().context("Failed to flush kitty delete all")?;
  Ok(())
}

// --- Sixel Graphics Protocol ---
//
// Sixel encodes images at pixel resolution directly in the terminal stream.
// Each sixel "row" represents 6 vertical pixels. Colors are defined via
// registers and then pixels are emitted as characters in the range 0x3F–0x7E.
//
//   DCS q <data> ST        DCS = \x1BP,  ST = \x1B\\
//   Color register:  #<n>;2;<r%>;<g%>;<b%>
//   $ rewinds to the start of the current sixel row, - advances to the next.
//
// Colors are quantized with NeuQuant from `color_quant`.

const SIXEL_MAX_COLORS: usize = 256;
const SIXEL_CELL_W: u32 = 8;
const SIXEL_CELL_H: u32 = 16;

/// Scale `image` to fit `area` and encode it as a complete sixel sequence.
pub fn sixel_encode(image: &DynamicImage, area: Rect) -> String {
  let pixel_w = (area.width as u32 * SIXEL_CELL_W).max(1);
  let pixel_h = (area.height as u32 * SIXEL_CELL_H).max(1);
  let resized = image.resize(pixel_w, pixel_h, FilterType::Lanczos3).into_rgb8();
  let (w, h) = (resized.width() as usize, resized.height() as usize);

  let rgba_pixels: Vec<u8> = resized.pixels().flat_map(|p| [p[0], p[1], p[2], 255]).collect();
  let nq = NeuQuant::new(3, SIXEL_MAX_COLORS, &rgba_pixels);
  let color_map = nq.color_map_rgb();
  let palette: Vec<[u8; 3]> = color_map.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();
  let indices: Vec<u8> =
    resized.pixels().map(|p| nq.index_of(&[p[0], p[1], p[2], 255]).min(u8::MAX as usize) as u8).collect();

  let mut out = String::with_capacity(w * h);
  out.push_str("\x1BPq");
  out.push_str(&format!("\"1;1;{};{}", w, h));

  for (i, c) in palette.iter().enumerate() {
    let r_pct = (c[0] as u32 * 100) / 255;
    let g_pct = (c[1] as u32 * 100) / 255;
    let b_pct = (c[2] as u32 * 100) / 255;
    out.push_str(&format!("#{};2;{};{};{}", i, r_pct, g_pct, b_pct));
  }

  for y_base in (0..h).step_by(6) {
    for color_idx in 0..palette.len() {
      let color = color_idx as u8;
      let mut has_pixels = false;
      let row_data: Vec<u8> = (0..w)
        .map(|x| {
          let mut sixel_val = 0u8;
          for bit in 0..6 {
            let y = y_base + bit;
            if y < h && indices.get(y * w + x) == Some(&color) {
              sixel_val |= 1 << bit;
              has_pixels = true;
            }
          }
          sixel_val
        })
        .collect();

      if !has_pixels {
        continue;
      }

      out.push_str(&format!("#{}", color_idx));
      let mut i = 0;
      while i < row_data.len() {
        let val = row_data[i];
        let ch = (val + 0x3F) as char;
        let mut run = 1usize;
        while i + run < row_data.len() && row_data[i + run] == val {
          run += 1;
        }
        if run > 3 {
          out.push_str(&format!("!{}{}", run, ch));
        } else {
          out.extend(std::iter::repeat_n(ch, run));
        }
        i += run;
      }
      out.push('$');
    }
    out.push('-');
  }

  out.push_str("\x1B\\");
  out
}
