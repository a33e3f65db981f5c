mod animation;
mod sprite;
mod text;
mod wgpu_backend;

pub use animation::{generate_frame_numbers, AnimationClip, AnimationRegistry, AnimationState, Repeat};
pub use sprite::{rgb, Sprite, TextureHandle, WHITE};
pub use text::{FontHandle, GlyphCacheEntry, PlacedGlyph, TextRenderer};
pub use wgpu_backend::{Frame, QuadDraw, Renderer};
