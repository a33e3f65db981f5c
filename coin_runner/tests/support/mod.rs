#![allow(dead_code)]

use std::time::Duration;

use arcade2d::{InputState, KeyCode, SceneRunner, TextureCatalog, TextureHandle, TextureInfo, Vec2, FIXED_STEP};
use coin_runner::{
    scene::{BACKGROUND, COIN, GROUND, OBSTACLE, PLAYER},
    CoinRunnerScene, GameConfig,
};

pub const FRAME: Duration = FIXED_STEP;

/// Texture sizes matching the shipped PNGs.
pub fn catalog() -> TextureCatalog {
    let mut textures = TextureCatalog::new();
    textures.insert(BACKGROUND, TextureInfo::image(TextureHandle::MISSING, 800, 600));
    textures.insert(GROUND, TextureInfo::image(TextureHandle::MISSING, 400, 32));
    textures.insert(OBSTACLE, TextureInfo::image(TextureHandle::MISSING, 32, 32));
    textures.insert(COIN, TextureInfo::image(TextureHandle::MISSING, 24, 24));
    textures.insert(PLAYER, TextureInfo::spritesheet(TextureHandle::MISSING, 256, 48, 32, 48));
    textures
}

pub fn start(config: GameConfig) -> SceneRunner<CoinRunnerScene> {
    SceneRunner::headless(CoinRunnerScene::new(config), catalog(), Vec2::new(800.0, 600.0))
        .expect("scene should start")
}

pub fn start_default() -> SceneRunner<CoinRunnerScene> {
    start(GameConfig::default())
}

pub fn keys(held: &[KeyCode]) -> InputState {
    let mut input = InputState::new();
    for &key in held {
        input.press(key);
    }
    input
}

pub fn run(runner: &mut SceneRunner<CoinRunnerScene>, input: &InputState, frames: usize) {
    for _ in 0..frames {
        runner.tick(input, FRAME).expect("tick");
    }
}

/// Idle until the player has landed on the ground.
pub fn settle(runner: &mut SceneRunner<CoinRunnerScene>) {
    run(runner, &InputState::new(), 60);
}

pub fn player(runner: &SceneRunner<CoinRunnerScene>) -> arcade2d::EntityId {
    runner.scene().level().expect("level built").player
}

pub fn player_pos(runner: &SceneRunner<CoinRunnerScene>) -> Vec2 {
    runner.context().position(player(runner)).expect("player alive")
}

pub fn player_vel(runner: &SceneRunner<CoinRunnerScene>) -> Vec2 {
    runner.context().velocity(player(runner)).expect("player alive")
}

pub fn positions_of(runner: &SceneRunner<CoinRunnerScene>, group: arcade2d::GroupId) -> Vec<Vec2> {
    let ctx = runner.context();
    ctx.group_members(group)
        .iter()
        .filter_map(|&e| ctx.position(e))
        .collect()
}

/// Solver output settles within half a pixel of the analytic answer.
pub fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 0.5
}
