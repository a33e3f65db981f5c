//! The single Coin Runner scene: run right, grab coins, avoid the spikes.

use std::time::Duration;

use anyhow::Result;
use arcade2d::{
    generate_frame_numbers, rgb, AnimationClip, AssetManifest, EntityId, GroupConfig, GroupId,
    HudText, HudTextId, InputMap, Rect, Scene, SceneContext, TimerHandle, Trigger, Vec2, WHITE,
};

use crate::config::GameConfig;

pub const BACKGROUND: &str = "background";
pub const GROUND: &str = "ground";
pub const OBSTACLE: &str = "obstacle";
pub const COIN: &str = "coin";
pub const PLAYER: &str = "player";

pub const RUN: &str = "run";
pub const IDLE: &str = "idle";

const PLAYER_FRAME: (u32, u32) = (32, 48);
const IDLE_FRAME: u32 = 4;
const DEATH_TINT: u32 = 0xff0000;

/// Tags carried by the scene's overlap rules and timers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    ObstacleHit,
    CoinCollect,
    Restart,
}

/// State that outlives a single life.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Session {
    pub score: u32,
    pub game_over: bool,
}

/// Handles to everything `create` built for the current life.
#[derive(Debug)]
pub struct Level {
    pub player: EntityId,
    pub background: EntityId,
    pub ground: GroupId,
    pub obstacles: GroupId,
    pub coins: GroupId,
    pub score_text: HudTextId,
    pub controls: InputMap,
    pub restart_timer: Option<TimerHandle>,
}

pub struct CoinRunnerScene {
    config: GameConfig,
    session: Session,
    level: Option<Level>,
}

impl CoinRunnerScene {
    pub fn new(config: GameConfig) -> Self {
        Self {
            config,
            session: Session::default(),
            level: None,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn session(&self) -> Session {
        self.session
    }

    pub fn level(&self) -> Option<&Level> {
        self.level.as_ref()
    }

    fn score_label(&self) -> String {
        format!("Score: {}", self.session.score)
    }

    fn hit_obstacle(&mut self, ctx: &mut SceneContext<Event>, player: EntityId) -> Result<()> {
        if self.session.game_over {
            return Ok(());
        }
        ctx.pause_physics();
        ctx.set_tint(player, rgb(DEATH_TINT));
        ctx.pause_animation(player);
        self.session.game_over = true;

        let delay = Duration::from_millis(self.config.restart_delay_ms);
        let timer = ctx.delayed_call(delay, Event::Restart);
        if let Some(level) = self.level.as_mut() {
            level.restart_timer = Some(timer);
        }
        log::info!(
            "player hit an obstacle with score {}; restarting in {:?}",
            self.session.score,
            delay
        );
        Ok(())
    }

    fn collect_coin(&mut self, ctx: &mut SceneContext<Event>, coin: EntityId) -> Result<()> {
        if !ctx.destroy(coin) {
            return Ok(());
        }
        self.session.score += self.config.coin_value;
        let label = self.score_label();
        if let Some(level) = &self.level {
            ctx.set_text(level.score_text, label);
        }
        log::debug!("coin collected, score {}", self.session.score);
        Ok(())
    }

    fn restart_level(&mut self, ctx: &mut SceneContext<Event>) -> Result<()> {
        self.session = Session::default();
        if let Some(level) = self.level.as_mut() {
            level.restart_timer = None;
        }
        ctx.restart();
        Ok(())
    }
}

impl Default for CoinRunnerScene {
    fn default() -> Self {
        Self::new(GameConfig::default())
    }
}

impl Scene for CoinRunnerScene {
    type Event = Event;

    fn preload(&self, assets: &mut AssetManifest) {
        assets.set_root(&self.config.asset_root);
        assets
            .image(BACKGROUND, "background.png")
            .image(GROUND, "ground.png")
            .image(OBSTACLE, "obstacle.png")
            .image(COIN, "coin.png")
            .spritesheet(PLAYER, "player_sheet.png", PLAYER_FRAME.0, PLAYER_FRAME.1);
    }

    fn create(&mut self, ctx: &mut SceneContext<Event>) -> Result<()> {
        let world = Rect::new(0.0, 0.0, self.config.world.width, self.config.world.height);
        ctx.set_gravity(Vec2::new(0.0, self.config.world.gravity));
        ctx.set_world_bounds(world);

        let background = ctx.add_image(0.0, 0.0, BACKGROUND)?;
        ctx.set_origin(background, Vec2::ZERO);
        ctx.set_scale(background, 2.0);
        ctx.set_depth(background, -1);

        let ground = ctx.create_group(GroupConfig::new().without_gravity().immovable());
        let layout = &self.config.layout;
        for &x in &layout.ground_x {
            let tile = ctx.add_static(x, layout.ground_y, GROUND)?;
            ctx.set_scale(tile, 2.0);
            ctx.refresh_body(tile);
            ctx.add_to_group(ground, tile);
        }

        let tuning = &self.config.player;
        let player = ctx.add_sprite(tuning.spawn.x, tuning.spawn.y, PLAYER)?;
        ctx.set_bounce(player, tuning.bounce);
        ctx.set_collide_world_bounds(player, true);

        ctx.start_follow(player);
        ctx.set_camera_bounds(world);

        // Animations are global; after a restart these are no-ops.
        ctx.create_animation(
            AnimationClip::new(RUN, PLAYER, generate_frame_numbers(0, 7), 10.0).looping(),
        );
        ctx.create_animation(AnimationClip::new(IDLE, PLAYER, vec![IDLE_FRAME], 20.0));

        let obstacles = ctx.create_group(GroupConfig::new().without_gravity().immovable());
        for pos in &layout.obstacles {
            ctx.group_create(obstacles, pos.x, pos.y, OBSTACLE)?;
        }
        let coins = ctx.create_group(GroupConfig::new().without_gravity());
        for pos in &layout.coins {
            ctx.group_create(coins, pos.x, pos.y, COIN)?;
        }

        ctx.collider(player, ground);
        ctx.overlap(player, obstacles, Event::ObstacleHit);
        ctx.overlap(player, coins, Event::CoinCollect);

        let score_text = ctx.add_text(
            HudText::new(self.score_label(), Vec2::new(16.0, 16.0), 32.0)
                .with_color(WHITE)
                .with_stroke(rgb(0x000000), 4.0),
        );

        log::info!(
            "level built: {} ground tiles, {} obstacles, {} coins",
            layout.ground_x.len(),
            layout.obstacles.len(),
            layout.coins.len()
        );

        self.level = Some(Level {
            player,
            background,
            ground,
            obstacles,
            coins,
            score_text,
            controls: InputMap::cursor_keys(),
            restart_timer: None,
        });
        Ok(())
    }

    fn update(&mut self, ctx: &mut SceneContext<Event>) -> Result<()> {
        if self.session.game_over {
            return Ok(());
        }
        let Some(level) = &self.level else {
            return Ok(());
        };
        let input = ctx.input();
        let left = level.controls.action_down(input, InputMap::LEFT);
        let right = level.controls.action_down(input, InputMap::RIGHT);
        let jump = level.controls.action_down(input, InputMap::UP)
            || level.controls.action_down(input, InputMap::SPACE);

        let player = level.player;
        let speed = self.config.player.run_speed;
        if left {
            ctx.set_velocity_x(player, -speed);
            ctx.set_flip_x(player, true);
            ctx.play(player, RUN, true);
        } else if right {
            ctx.set_velocity_x(player, speed);
            ctx.set_flip_x(player, false);
            ctx.play(player, RUN, true);
        } else {
            ctx.set_velocity_x(player, 0.0);
            ctx.play(player, IDLE, false);
        }

        if jump && ctx.touching(player).down {
            ctx.set_velocity_y(player, -self.config.player.jump_speed);
        }
        Ok(())
    }

    fn handle(&mut self, ctx: &mut SceneContext<Event>, trigger: Trigger<Event>) -> Result<()> {
        match trigger {
            Trigger::Overlap {
                event: Event::ObstacleHit,
                a,
                ..
            } => self.hit_obstacle(ctx, a),
            Trigger::Overlap {
                event: Event::CoinCollect,
                b,
                ..
            } => self.collect_coin(ctx, b),
            Trigger::Timer {
                event: Event::Restart,
                ..
            } => self.restart_level(ctx),
            other => {
                log::debug!("ignoring {other:?}");
                Ok(())
            }
        }
    }
}
