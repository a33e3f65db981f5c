mod support;

use arcade2d::{InputState, KeyCode, Rect, Vec2};
use coin_runner::{
    scene::{IDLE, RUN},
    GameConfig,
};
use support::*;

#[test]
fn create_builds_the_stock_level() {
    let runner = start_default();
    let ctx = runner.context();
    let level = runner.scene().level().unwrap();

    assert_eq!(player_pos(&runner), Vec2::new(100.0, 450.0));
    assert_eq!(
        positions_of(&runner, level.obstacles),
        vec![Vec2::new(500.0, 530.0), Vec2::new(800.0, 530.0), Vec2::new(850.0, 530.0)]
    );
    assert_eq!(
        positions_of(&runner, level.coins),
        vec![Vec2::new(300.0, 450.0), Vec2::new(350.0, 450.0), Vec2::new(1100.0, 450.0)]
    );

    let tiles = ctx.group_members(level.ground);
    assert_eq!(tiles.len(), 5);
    for (i, &tile) in tiles.iter().enumerate() {
        let body = ctx.physics().body(tile).unwrap();
        assert_eq!(body.position(), Vec2::new(200.0 + 400.0 * i as f32, 580.0));
        assert_eq!(body.size(), Vec2::new(800.0, 64.0));
    }

    assert_eq!(ctx.physics().bounds(), Rect::new(0.0, 0.0, 1600.0, 600.0));
    assert_eq!(ctx.camera().bounds, Some(Rect::new(0.0, 0.0, 1600.0, 600.0)));
    assert_eq!(ctx.camera().position, Vec2::ZERO);
    let score = ctx.hud().get(level.score_text).unwrap();
    assert_eq!(score.text, "Score: 0");
    assert_eq!(score.position, Vec2::new(16.0, 16.0));
    assert_eq!(score.size, 32.0);

    // Background first, then everything else in creation order.
    let draws = ctx.draw_list();
    assert_eq!(draws.len(), 1 + 5 + 1 + 3 + 3);
    assert_eq!(draws[0].transform.position, Vec2::ZERO);
    assert_eq!(draws[0].transform.scale, Vec2::splat(2.0));
    assert_eq!(draws[0].origin, Vec2::ZERO);
    assert!(ctx.physics().body(level.background).is_none());
}

#[test]
fn player_lands_on_the_ground_and_idles() {
    let mut runner = start_default();
    settle(&mut runner);

    let pos = player_pos(&runner);
    assert!(approx(pos.x, 100.0));
    assert!(approx(pos.y, 524.0), "resting at {pos:?}");
    let vel = player_vel(&runner);
    assert!(approx(vel.x, 0.0) && vel.y.abs() < 5.0, "resting velocity {vel:?}");

    let ctx = runner.context();
    let player = player(&runner);
    assert!(ctx.touching(player).down);
    assert_eq!(ctx.current_animation(player), Some(IDLE));
    assert_eq!(ctx.sprite(player).unwrap().frame, 4);
}

#[test]
fn left_wins_over_right() {
    let mut runner = start_default();
    settle(&mut runner);
    let player = player(&runner);

    runner.tick(&keys(&[KeyCode::ArrowLeft, KeyCode::ArrowRight]), FRAME).unwrap();
    assert!(approx(player_vel(&runner).x, -300.0));
    assert!(runner.context().sprite(player).unwrap().flip_x);
    assert_eq!(runner.context().current_animation(player), Some(RUN));

    runner.tick(&keys(&[KeyCode::ArrowRight]), FRAME).unwrap();
    assert!(approx(player_vel(&runner).x, 300.0));
    assert!(!runner.context().sprite(player).unwrap().flip_x);

    runner.tick(&InputState::new(), FRAME).unwrap();
    assert!(approx(player_vel(&runner).x, 0.0));
    assert_eq!(runner.context().current_animation(player), Some(IDLE));
}

#[test]
fn run_animation_cycles_through_eight_frames() {
    let mut runner = start_default();
    settle(&mut runner);
    let player = player(&runner);

    let right = keys(&[KeyCode::ArrowRight]);
    let mut seen = std::collections::BTreeSet::new();
    for _ in 0..60 {
        runner.tick(&right, FRAME).unwrap();
        seen.insert(runner.context().sprite(player).unwrap().frame);
    }
    // 10 fps over one second covers the whole 0..=7 strip.
    assert_eq!(seen.into_iter().collect::<Vec<_>>(), (0..8).collect::<Vec<_>>());
}

#[test]
fn jump_only_from_the_ground() {
    let mut runner = start_default();

    // Still falling from the spawn point.
    runner.tick(&keys(&[KeyCode::ArrowUp]), FRAME).unwrap();
    assert!(player_vel(&runner).y > 0.0);

    settle(&mut runner);
    runner.tick(&keys(&[KeyCode::Space]), FRAME).unwrap();
    // -600 after one fixed step of gravity.
    let launch = player_vel(&runner).y;
    assert!(approx(launch, -580.0), "launch {launch}");

    // Holding jump in the air never re-applies the impulse.
    let up = keys(&[KeyCode::ArrowUp]);
    let mut previous = launch;
    for _ in 0..10 {
        runner.tick(&up, FRAME).unwrap();
        let vy = player_vel(&runner).y;
        assert!(vy > previous);
        previous = vy;
    }
    assert!(player_pos(&runner).y < 524.0);
}

#[test]
fn camera_follows_the_player_within_the_world() {
    let mut config = GameConfig::default();
    config.layout.obstacles.clear();
    let mut runner = start(config);
    settle(&mut runner);
    assert_eq!(runner.context().camera().position.x, 0.0);

    let right = keys(&[KeyCode::ArrowRight]);
    run(&mut runner, &right, 120);
    let x = player_pos(&runner).x;
    assert!((x - 700.0).abs() < 1.0, "player at {x}");
    assert!((runner.context().camera().position.x - 300.0).abs() < 1.0);

    run(&mut runner, &right, 300);
    assert!(approx(player_pos(&runner).x, 1584.0));
    assert_eq!(runner.context().camera().position.x, 800.0);
    assert_eq!(runner.context().camera().position.y, 0.0);
}

#[test]
fn score_stays_pinned_while_the_world_scrolls() {
    let mut config = GameConfig::default();
    config.layout.obstacles.clear();
    let mut runner = start(config);
    settle(&mut runner);
    run(&mut runner, &keys(&[KeyCode::ArrowRight]), 200);

    let ctx = runner.context();
    assert!(ctx.camera().position.x > 0.0);

    let hud_camera = ctx.hud_camera();
    assert_eq!(hud_camera.position, Vec2::ZERO);
    assert_eq!(hud_camera.viewport, ctx.camera().viewport);

    let label = runner.scene().level().unwrap().score_text;
    let passes = ctx.hud().passes();
    // The fill is drawn last, over its stroke ring.
    let fill = passes.last().unwrap();
    assert!(fill.text.starts_with("Score:"));
    assert_eq!(fill.position, Vec2::new(16.0, 16.0));
    assert_eq!(ctx.hud().get(label).unwrap().position, Vec2::new(16.0, 16.0));
}
