use crate::math::{Transform2D, Vec2};

/// Opaque handle used to reference textures owned by the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub(crate) u32);

impl TextureHandle {
    /// Magenta/black checkerboard substituted for textures that failed to load.
    pub const MISSING: TextureHandle = TextureHandle(0);
}

pub const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// Convert a `0xRRGGBB` colour into an opaque RGBA tint.
pub fn rgb(hex: u32) -> [f32; 4] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
        1.0,
    ]
}

/// Visual component of a game object.
#[derive(Clone, Debug, PartialEq)]
pub struct Sprite {
    /// Asset key the texture was registered under.
    pub texture_key: String,
    pub texture: TextureHandle,
    pub transform: Transform2D,
    /// Normalized pivot `transform.position` refers to; (0.5, 0.5) is the centre.
    pub origin: Vec2,
    /// Multiplicative tint applied to the sampled texture color.
    pub tint: [f32; 4],
    pub flip_x: bool,
    /// Spritesheet cell to draw. Ignored for plain images.
    pub frame: u32,
    /// Draw order; lower depths are drawn first.
    pub depth: i32,
    pub visible: bool,
}

impl Sprite {
    pub fn new(texture_key: impl Into<String>, texture: TextureHandle) -> Self {
        Self {
            texture_key: texture_key.into(),
            texture,
            transform: Transform2D::default(),
            origin: Vec2::new(0.5, 0.5),
            tint: WHITE,
            flip_x: false,
            frame: 0,
            depth: 0,
            visible: true,
        }
    }

    pub fn with_position(mut self, position: Vec2) -> Self {
        self.transform.position = position;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.transform.scale = Vec2::splat(scale);
        self
    }

    pub fn with_origin(mut self, origin: Vec2) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_depth(mut self, depth: i32) -> Self {
        self.depth = depth;
        self
    }

    pub fn is_tinted(&self) -> bool {
        self.tint != WHITE
    }
}
