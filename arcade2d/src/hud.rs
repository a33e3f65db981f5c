use anyhow::Result;

use crate::{
    math::{Camera2D, Vec2},
    render::{FontHandle, Frame, Renderer, WHITE},
};

/// Outline drawn around HUD text.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextStroke {
    pub color: [f32; 4],
    pub thickness: f32,
}

/// Text element drawn in screen-space HUD coordinates (pixels).
#[derive(Clone, Debug, PartialEq)]
pub struct HudText {
    pub text: String,
    pub size: f32,
    /// Screen-space pixels (0,0 = top-left).
    pub position: Vec2,
    pub color: [f32; 4],
    pub stroke: Option<TextStroke>,
    pub visible: bool,
}

impl HudText {
    pub fn new(text: impl Into<String>, position: Vec2, size: f32) -> Self {
        Self {
            text: text.into(),
            size,
            position,
            color: WHITE,
            stroke: None,
            visible: true,
        }
    }

    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.color = color;
        self
    }

    pub fn with_stroke(mut self, color: [f32; 4], thickness: f32) -> Self {
        self.stroke = Some(TextStroke { color, thickness });
        self
    }
}

/// A single text draw produced by [`HudLayer::passes`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextPass<'a> {
    pub text: &'a str,
    pub size: f32,
    pub position: Vec2,
    pub color: [f32; 4],
}

/// Addressable HUD text entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HudTextId(u32);

/// Camera-pinned overlay drawn on top of the world.
#[derive(Clone, Debug, Default)]
pub struct HudLayer {
    texts: Vec<(HudTextId, HudText)>,
    next_id: u32,
}

impl HudLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all HUD elements.
    pub fn clear(&mut self) {
        self.texts.clear();
    }

    pub fn add_text(&mut self, text: HudText) -> HudTextId {
        let id = HudTextId(self.next_id);
        self.next_id += 1;
        self.texts.push((id, text));
        id
    }

    /// Replace the string of an existing entry. Returns false for unknown ids.
    pub fn set_text(&mut self, id: HudTextId, text: impl Into<String>) -> bool {
        match self.get_mut(id) {
            Some(entry) => {
                entry.text = text.into();
                true
            }
            None => false,
        }
    }

    pub fn text(&self, id: HudTextId) -> Option<&str> {
        self.get(id).map(|t| t.text.as_str())
    }

    pub fn get(&self, id: HudTextId) -> Option<&HudText> {
        self.texts.iter().find(|(i, _)| *i == id).map(|(_, t)| t)
    }

    pub fn get_mut(&mut self, id: HudTextId) -> Option<&mut HudText> {
        self.texts.iter_mut().find(|(i, _)| *i == id).map(|(_, t)| t)
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// Screen-space camera the HUD is drawn with. It sits at the origin whatever the
    /// world camera is doing.
    pub fn camera(viewport: Vec2) -> Camera2D {
        Camera2D::new(Vec2::ZERO, viewport)
    }

    /// Text draws in submission order: each visible entry's stroke ring, then its fill.
    pub fn passes(&self) -> Vec<TextPass<'_>> {
        let mut passes = Vec::new();
        for (_, t) in self.texts.iter().filter(|(_, t)| t.visible) {
            if let Some(stroke) = t.stroke {
                passes.extend(stroke_offsets(stroke.thickness).into_iter().map(|offset| TextPass {
                    text: &t.text,
                    size: t.size,
                    position: t.position + offset,
                    color: stroke.color,
                }));
            }
            passes.push(TextPass {
                text: &t.text,
                size: t.size,
                position: t.position,
                color: t.color,
            });
        }
        passes
    }

    /// Draw all HUD elements with `camera`, normally [`HudLayer::camera`].
    /// Without a font there is nothing to draw text with, so text is skipped.
    pub fn draw(
        &self,
        renderer: &mut Renderer,
        frame: &mut Frame,
        font: Option<FontHandle>,
        camera: &Camera2D,
    ) -> Result<()> {
        let Some(font) = font else {
            return Ok(());
        };
        for pass in self.passes() {
            renderer.draw_text(frame, pass.text, font, pass.size, pass.position, pass.color, camera)?;
        }
        Ok(())
    }
}

/// Eight compass offsets at half the stroke width; a centred stroke of width `w`
/// extends `w / 2` past the glyph edge.
fn stroke_offsets(thickness: f32) -> Vec<Vec2> {
    let r = thickness * 0.5;
    if r <= 0.0 {
        return Vec::new();
    }
    let d = r * std::f32::consts::FRAC_1_SQRT_2;
    vec![
        Vec2::new(-r, 0.0),
        Vec2::new(r, 0.0),
        Vec2::new(0.0, -r),
        Vec2::new(0.0, r),
        Vec2::new(-d, -d),
        Vec2::new(d, -d),
        Vec2::new(-d, d),
        Vec2::new(d, d),
    ]
}
