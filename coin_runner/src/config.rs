//! Game tuning, loadable from an optional JSON file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use arcade2d::Vec2;
use serde::{Deserialize, Serialize};

/// File looked up in the working directory by the binary.
pub const DEFAULT_CONFIG_FILE: &str = "coin_runner.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Coin Runner".into(),
            width: 800,
            height: 600,
            vsync: true,
        }
    }
}

/// Size of the simulated world and its downward gravity in px/s².
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub width: f32,
    pub height: f32,
    pub gravity: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 1600.0,
            height: 600.0,
            gravity: 1200.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub spawn: Vec2,
    pub bounce: f32,
    pub run_speed: f32,
    pub jump_speed: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            spawn: Vec2::new(100.0, 450.0),
            bounce: 0.1,
            run_speed: 300.0,
            jump_speed: 600.0,
        }
    }
}

/// Placement of the level's fixed objects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub ground_y: f32,
    pub ground_x: Vec<f32>,
    pub obstacles: Vec<Vec2>,
    pub coins: Vec<Vec2>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            ground_y: 580.0,
            ground_x: (0..5).map(|i| 200.0 + 400.0 * i as f32).collect(),
            obstacles: vec![
                Vec2::new(500.0, 530.0),
                Vec2::new(800.0, 530.0),
                Vec2::new(850.0, 530.0),
            ],
            coins: vec![
                Vec2::new(300.0, 450.0),
                Vec2::new(350.0, 450.0),
                Vec2::new(1100.0, 450.0),
            ],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub window: WindowConfig,
    pub world: WorldConfig,
    pub player: PlayerConfig,
    pub layout: LayoutConfig,
    pub coin_value: u32,
    pub restart_delay_ms: u64,
    pub asset_root: PathBuf,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            world: WorldConfig::default(),
            player: PlayerConfig::default(),
            layout: LayoutConfig::default(),
            coin_value: 10,
            restart_delay_ms: 2000,
            asset_root: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/assets")),
        }
    }
}

impl GameConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid game config")
    }

    /// Read `path` if it exists. A missing file means defaults; a broken one is
    /// reported and also falls back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Self::default();
        }
        let loaded = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))
            .and_then(|json| Self::from_json(&json));
        match loaded {
            Ok(config) => {
                log::info!("loaded config from {}", path.display());
                config
            }
            Err(err) => {
                log::warn!("{err:#}; using defaults");
                Self::default()
            }
        }
    }
}
