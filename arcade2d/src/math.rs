use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// 2D vector type used throughout Arcade2D.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };
    pub const ONE: Self = Self { x: 1.0, y: 1.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Vector with both components set to `v`.
    pub const fn splat(v: f32) -> Self {
        Self { x: v, y: v }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Component-wise product.
    pub fn mul_elem(self, rhs: Self) -> Self {
        Self::new(self.x * rhs.x, self.y * rhs.y)
    }
}

impl From<(f32, f32)> for Vec2 {
    fn from(value: (f32, f32)) -> Self {
        Self {
            x: value.0,
            y: value.1,
        }
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl std::ops::Div<f32> for Vec2 {
    type Output = Self;

    fn div(self, rhs: f32) -> Self::Output {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

impl std::ops::Neg for Vec2 {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y)
    }
}

/// Axis-aligned rectangle, stored as top-left corner plus size (y grows downwards).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }
}

/// Transform describing 2D position, scale, and rotation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform2D {
    pub position: Vec2,
    pub scale: Vec2,
    /// Rotation in radians around the Z axis.
    pub rotation: f32,
}

impl Transform2D {
    pub fn new(position: Vec2, scale: Vec2, rotation: f32) -> Self {
        Self {
            position,
            scale,
            rotation,
        }
    }

    pub fn identity() -> Self {
        Self {
            position: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
        }
    }

    /// Model matrix for a unit quad spanning [-0.5, 0.5].
    ///
    /// `origin` is the normalized pivot that `position` refers to ((0.5, 0.5) is the
    /// centre, (0, 0) the top-left corner). `flip_x` mirrors the quad around the pivot.
    pub fn to_matrix(&self, base_size: Vec2, origin: Vec2, flip_x: bool) -> Mat4 {
        let size = base_size.mul_elem(self.scale);
        let pivot = Vec3::new(
            (0.5 - origin.x) * size.x,
            (0.5 - origin.y) * size.y,
            0.0,
        );
        let translation = Mat4::from_translation(Vec3::new(self.position.x, self.position.y, 0.0));
        let rotation = Mat4::from_rotation_z(self.rotation);
        let flip = if flip_x { -1.0 } else { 1.0 };
        let scale = Mat4::from_scale(Vec3::new(size.x * flip, size.y, 1.0));

        translation * rotation * Mat4::from_translation(pivot) * scale
    }
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::identity()
    }
}

/// Camera representing a scrolling 2D view.
///
/// `position` is the world coordinate shown at the top-left of the viewport
/// (the "scroll" of the camera).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera2D {
    pub position: Vec2,
    pub zoom: f32,
    /// Visible area in world units at zoom 1.
    pub viewport: Vec2,
    /// Region the camera may never scroll outside of.
    pub bounds: Option<Rect>,
}

impl Camera2D {
    pub fn new(position: Vec2, viewport: Vec2) -> Self {
        Self {
            position,
            zoom: 1.0,
            viewport,
            bounds: None,
        }
    }

    pub fn set_bounds(&mut self, bounds: Rect) {
        self.bounds = Some(bounds);
        self.clamp_to_bounds();
    }

    /// Keep the visible area inside `bounds`. When the bounds are smaller than the
    /// viewport along an axis, the camera pins to the bounds' start on that axis.
    pub fn clamp_to_bounds(&mut self) {
        let Some(bounds) = self.bounds else {
            return;
        };
        let visible = self.viewport / self.zoom;
        let max_x = (bounds.right() - visible.x).max(bounds.left());
        let max_y = (bounds.bottom() - visible.y).max(bounds.top());
        self.position.x = self.position.x.clamp(bounds.left(), max_x);
        self.position.y = self.position.y.clamp(bounds.top(), max_y);
    }

    /// Centre the view on `point`, respecting bounds.
    pub fn center_on(&mut self, point: Vec2) {
        self.position = point - self.viewport / (2.0 * self.zoom);
        self.clamp_to_bounds();
    }

    pub fn view_projection(&self, width: u32, height: u32) -> Mat4 {
        let projection = Mat4::orthographic_rh_gl(0.0, width as f32, height as f32, 0.0, -1.0, 1.0);

        let translation =
            Mat4::from_translation(Vec3::new(-self.position.x, -self.position.y, 0.0));
        let zoom = Mat4::from_scale(Vec3::new(self.zoom, self.zoom, 1.0));

        projection * zoom * translation
    }
}

impl Default for Camera2D {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            zoom: 1.0,
            viewport: Vec2::new(800.0, 600.0),
            bounds: None,
        }
    }
}
