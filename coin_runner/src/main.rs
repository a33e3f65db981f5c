use anyhow::Result;
use arcade2d::{Engine, SceneRunner};
use coin_runner::{config::DEFAULT_CONFIG_FILE, CoinRunnerScene, GameConfig};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = GameConfig::load_or_default(DEFAULT_CONFIG_FILE);
    let window = config.window.clone();

    Engine::new()
        .with_title(window.title)
        .with_size(window.width, window.height)
        .with_vsync(window.vsync)
        .with_clear_color([0.39, 0.58, 0.93, 1.0])
        .run(SceneRunner::new(CoinRunnerScene::new(config)))
}
