//! Arcade2D - a small 2D game framework for side-scrolling arcade games.
//!
//! Scenes declare their textures, build sprites with arcade physics bodies and react
//! to overlaps and timers. The engine owns the window, input and wgpu renderer.

pub mod assets;
pub mod engine;
pub mod fonts;
pub mod hud;
pub mod input;
pub mod math;
pub mod physics;
pub mod render;
pub mod scene;
pub mod timer;
pub mod world;

pub use crate::assets::{AssetError, AssetManager, AssetManifest, TextureCatalog, TextureInfo};
pub use crate::engine::{Engine, EngineConfig, EngineContext, Game};
pub use crate::hud::{HudLayer, HudText, HudTextId};
pub use crate::input::{InputMap, InputState};
pub use crate::math::{Camera2D, Rect, Transform2D, Vec2};
pub use crate::physics::{Body, BodyKind, GroupId, OverlapEvent, PhysicsWorld, Touching};
pub use crate::render::{
    generate_frame_numbers, rgb, AnimationClip, Frame, Renderer, Repeat, Sprite, TextureHandle, WHITE,
};
pub use crate::scene::{GroupConfig, Scene, SceneContext, SceneRunner, Trigger, FIXED_STEP};
pub use crate::timer::TimerHandle;
pub use crate::world::EntityId;
pub use winit::keyboard::KeyCode;
