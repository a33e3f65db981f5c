//! Coin Runner: a one-level side-scrolling platformer built on `arcade2d`.

pub mod config;
pub mod scene;

pub use config::GameConfig;
pub use scene::{CoinRunnerScene, Event, Level, Session};
