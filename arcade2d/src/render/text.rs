use std::collections::HashMap;

use ab_glyph::{Font, FontArc, GlyphId, PxScale, ScaleFont};
use anyhow::{anyhow, Result};

use crate::math::Vec2;
use crate::render::TextureHandle;

/// A font loaded and ready for text rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FontHandle(pub(crate) u32);

/// A rasterized glyph texture and where it sits relative to the pen on the baseline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphCacheEntry {
    pub texture: TextureHandle,
    pub size: Vec2,
    /// Offset from the pen position (on the baseline) to the bitmap's top-left.
    pub bearing: Vec2,
}

/// A glyph positioned relative to the top-left corner of a line of text.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacedGlyph {
    pub texture: TextureHandle,
    pub top_left: Vec2,
    pub size: Vec2,
}

/// Glyphs are cached per font, glyph and exact pixel size. Glyphs without an outline
/// (spaces) are cached as `None`.
type GlyphKey = (FontHandle, GlyphId, u32);

/// Owns loaded fonts and the glyph textures rasterized from them.
#[derive(Default)]
pub struct TextRenderer {
    fonts: HashMap<FontHandle, FontArc>,
    next_font_id: u32,
    glyphs: HashMap<GlyphKey, Option<GlyphCacheEntry>>,
}

impl TextRenderer {
    pub fn new() -> Self {
        Self {
            next_font_id: 1,
            ..Self::default()
        }
    }

    /// Parse a TTF/OTF font.
    pub fn load_font_from_bytes(&mut self, bytes: &[u8]) -> Result<FontHandle> {
        let font = FontArc::try_from_vec(bytes.to_vec()).map_err(|e| anyhow!("invalid font data: {e}"))?;
        let handle = FontHandle(self.next_font_id);
        self.next_font_id += 1;
        self.fonts.insert(handle, font);
        Ok(handle)
    }

    pub fn has_font(&self, font: FontHandle) -> bool {
        self.fonts.contains_key(&font)
    }

    /// Number of distinct glyph/size combinations rasterized so far.
    pub fn cached_glyphs(&self) -> usize {
        self.glyphs.len()
    }

    /// Lay out one line of text at `size` pixels, uploading glyphs not seen before.
    ///
    /// `upload` turns a white RGBA8 coverage bitmap into a texture; colour comes from
    /// the draw tint. Positions include kerning and are relative to the line's
    /// top-left corner.
    pub fn layout(
        &mut self,
        font: FontHandle,
        text: &str,
        size: f32,
        mut upload: impl FnMut(&[u8], u32, u32) -> Result<TextureHandle>,
    ) -> Result<Vec<PlacedGlyph>> {
        let face = self
            .fonts
            .get(&font)
            .cloned()
            .ok_or_else(|| anyhow!("unknown font handle {font:?}"))?;
        let scale = PxScale::from(size);
        let scaled = face.as_scaled(scale);
        let baseline = scaled.ascent();

        let mut placed = Vec::with_capacity(text.len());
        let mut pen = 0.0;
        let mut previous: Option<GlyphId> = None;
        for ch in text.chars() {
            let id = scaled.glyph_id(ch);
            if let Some(prev) = previous {
                pen += scaled.kern(prev, id);
            }

            let key = (font, id, size.to_bits());
            let entry = match self.glyphs.get(&key) {
                Some(entry) => *entry,
                None => {
                    let entry = match rasterize(&face, id, scale) {
                        Some((pixels, width, height, bearing)) => Some(GlyphCacheEntry {
                            texture: upload(&pixels, width, height)?,
                            size: Vec2::new(width as f32, height as f32),
                            bearing,
                        }),
                        None => None,
                    };
                    self.glyphs.insert(key, entry);
                    entry
                }
            };

            if let Some(glyph) = entry {
                placed.push(PlacedGlyph {
                    texture: glyph.texture,
                    top_left: Vec2::new(pen + glyph.bearing.x, baseline + glyph.bearing.y),
                    size: glyph.size,
                });
            }
            pen += scaled.h_advance(id);
            previous = Some(id);
        }
        Ok(placed)
    }
}

/// White coverage bitmap of one glyph with its pixel size and bearing, or `None` when
/// the glyph has no visible outline.
fn rasterize(font: &FontArc, id: GlyphId, scale: PxScale) -> Option<(Vec<u8>, u32, u32, Vec2)> {
    let outlined = font.outline_glyph(id.with_scale(scale))?;
    let bounds = outlined.px_bounds();
    let (width, height) = (bounds.width().ceil() as u32, bounds.height().ceil() as u32);
    if width == 0 || height == 0 {
        return None;
    }

    let mut pixels = vec![0u8; (width * height * 4) as usize];
    outlined.draw(|x, y, coverage| {
        if x < width && y < height {
            let i = ((y * width + x) * 4) as usize;
            pixels[i..i + 4].copy_from_slice(&[255, 255, 255, (coverage.clamp(0.0, 1.0) * 255.0) as u8]);
        }
    });
    Some((pixels, width, height, Vec2::new(bounds.min.x, bounds.min.y)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_not_a_font() {
        let mut text = TextRenderer::new();
        assert!(text.load_font_from_bytes(b"definitely not a font").is_err());
    }

    #[test]
    fn layout_needs_a_loaded_font() {
        let mut text = TextRenderer::new();
        let result = text.layout(FontHandle(7), "Score: 0", 32.0, |_, _, _| Ok(TextureHandle::MISSING));
        assert!(result.is_err());
        assert!(!text.has_font(FontHandle(7)));
        assert_eq!(text.cached_glyphs(), 0);
    }
}
