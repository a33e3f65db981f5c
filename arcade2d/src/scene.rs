//! Scene lifecycle: a game scene declares assets, builds its objects, reacts to
//! input every frame and to engine callbacks (overlaps and timers).
//!
//! [`SceneRunner`] owns the scene and its [`SceneContext`] and drives one frame at a
//! time. It implements [`Game`] for the windowed engine and also exposes
//! [`SceneRunner::tick`] so a scene can be stepped without a window.

use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;

use anyhow::Result;

use crate::assets::{AssetError, AssetManifest, TextureCatalog, TextureInfo};
use crate::engine::{EngineContext, Game};
use crate::hud::{HudLayer, HudText, HudTextId};
use crate::input::InputState;
use crate::math::{Camera2D, Rect, Vec2};
use crate::physics::{BodyConfig, BodyKind, GroupId, OverlapEvent, OverlapRuleId, PhysicsWorld, Target, Touching};
use crate::render::{AnimationClip, AnimationRegistry, AnimationState, QuadDraw, Sprite};
use crate::timer::{TimerHandle, Timers};
use crate::world::{EntityId, World};

/// Physics runs at this fixed rate regardless of frame rate.
pub const FIXED_STEP: Duration = Duration::from_nanos(16_666_667);

/// Upper bound on physics steps per frame so a long stall can't snowball.
const MAX_STEPS_PER_TICK: u32 = 5;

/// Engine-to-scene callback carrying the scene's own event tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger<E> {
    /// Bodies `a` and `b` of an overlap rule started to intersect. `a` is from the
    /// rule's first target.
    Overlap { event: E, a: EntityId, b: EntityId },
    /// A delayed call scheduled with [`SceneContext::delayed_call`] came due.
    Timer { event: E, timer: TimerHandle },
}

/// A game scene.
pub trait Scene {
    /// Tag attached to overlap rules and timers so callbacks can be told apart.
    type Event: Copy + Debug + 'static;

    /// Declare the textures the scene needs. Called once before the first `create`.
    fn preload(&self, _assets: &mut AssetManifest) {}

    /// Build the scene. Called on start and again after every restart, each time on a
    /// freshly cleared context.
    fn create(&mut self, ctx: &mut SceneContext<Self::Event>) -> Result<()>;

    /// Per-frame logic, run before physics.
    fn update(&mut self, ctx: &mut SceneContext<Self::Event>) -> Result<()>;

    /// React to an overlap or timer callback.
    fn handle(
        &mut self,
        ctx: &mut SceneContext<Self::Event>,
        trigger: Trigger<Self::Event>,
    ) -> Result<()>;
}

/// Default physics settings for members of a group.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GroupConfig {
    pub allow_gravity: bool,
    pub immovable: bool,
}

impl GroupConfig {
    pub fn new() -> Self {
        Self {
            allow_gravity: true,
            immovable: false,
        }
    }

    pub fn without_gravity(mut self) -> Self {
        self.allow_gravity = false;
        self
    }

    pub fn immovable(mut self) -> Self {
        self.immovable = true;
        self
    }
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a scene can touch: game objects, physics, animations, camera, HUD,
/// timers and the current input snapshot.
pub struct SceneContext<E> {
    world: World,
    physics: PhysicsWorld,
    animations: AnimationRegistry,
    camera: Camera2D,
    follow: Option<EntityId>,
    hud: HudLayer,
    timers: Timers<E>,
    textures: TextureCatalog,
    group_configs: HashMap<GroupId, GroupConfig>,
    overlap_events: HashMap<OverlapRuleId, E>,
    input: InputState,
    delta: Duration,
    restart_requested: bool,
}

impl<E: Copy + Debug + 'static> SceneContext<E> {
    pub fn new(textures: TextureCatalog, viewport: Vec2) -> Self {
        Self {
            world: World::new(),
            physics: PhysicsWorld::new(),
            animations: AnimationRegistry::new(),
            camera: Camera2D::new(Vec2::ZERO, viewport),
            follow: None,
            hud: HudLayer::new(),
            timers: Timers::new(),
            textures,
            group_configs: HashMap::new(),
            overlap_events: HashMap::new(),
            input: InputState::new(),
            delta: Duration::ZERO,
            restart_requested: false,
        }
    }

    /// Tear down everything `create` builds. Animations are global and survive.
    fn reset(&mut self) {
        self.world.clear();
        self.physics.clear();
        let viewport = self.camera.viewport;
        self.camera = Camera2D::new(Vec2::ZERO, viewport);
        self.follow = None;
        self.hud.clear();
        self.timers.clear();
        self.group_configs.clear();
        self.overlap_events.clear();
        self.restart_requested = false;
    }

    // ------------------------------
    // Accessors
    // ------------------------------

    pub fn input(&self) -> &InputState {
        &self.input
    }

    /// Length of the frame being processed.
    pub fn delta(&self) -> Duration {
        self.delta
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn animations(&self) -> &AnimationRegistry {
        &self.animations
    }

    pub fn camera(&self) -> &Camera2D {
        &self.camera
    }

    pub fn hud(&self) -> &HudLayer {
        &self.hud
    }

    /// Camera the HUD is drawn with; the same viewport as the world camera, never scrolled.
    pub fn hud_camera(&self) -> Camera2D {
        HudLayer::camera(self.camera.viewport)
    }

    pub fn timers(&self) -> &Timers<E> {
        &self.timers
    }

    pub fn textures(&self) -> &TextureCatalog {
        &self.textures
    }

    pub fn restart_requested(&self) -> bool {
        self.restart_requested
    }

    // ------------------------------
    // Game objects
    // ------------------------------

    fn spawn_sprite(&mut self, x: f32, y: f32, key: &str) -> Result<(EntityId, TextureInfo), AssetError> {
        let info = *self.textures.get(key)?;
        let entity = self.world.spawn();
        self.world.insert(
            entity,
            Sprite::new(key, info.handle).with_position(Vec2::new(x, y)),
        );
        Ok((entity, info))
    }

    /// Decorative image with no physics body.
    pub fn add_image(&mut self, x: f32, y: f32, key: &str) -> Result<EntityId, AssetError> {
        self.spawn_sprite(x, y, key).map(|(entity, _)| entity)
    }

    /// Image with a static body sized to the unscaled texture. Call
    /// [`SceneContext::refresh_body`] after changing its scale or origin.
    pub fn add_static(&mut self, x: f32, y: f32, key: &str) -> Result<EntityId, AssetError> {
        let (entity, info) = self.spawn_sprite(x, y, key)?;
        self.physics
            .create_body(entity, BodyConfig::fixed(info.frame_size()), Vec2::new(x, y));
        Ok(entity)
    }

    /// Sprite with a dynamic body the size of one frame, affected by gravity.
    pub fn add_sprite(&mut self, x: f32, y: f32, key: &str) -> Result<EntityId, AssetError> {
        let (entity, info) = self.spawn_sprite(x, y, key)?;
        self.physics
            .create_body(entity, BodyConfig::dynamic(info.frame_size()), Vec2::new(x, y));
        Ok(entity)
    }

    /// New physics group whose members get `config` applied on creation.
    pub fn create_group(&mut self, config: GroupConfig) -> GroupId {
        let group = self.physics.create_group();
        self.group_configs.insert(group, config);
        group
    }

    /// Create a dynamic sprite inside `group`.
    pub fn group_create(&mut self, group: GroupId, x: f32, y: f32, key: &str) -> Result<EntityId, AssetError> {
        let config = self.group_configs.get(&group).copied().unwrap_or_default();
        let (entity, info) = self.spawn_sprite(x, y, key)?;
        self.physics.create_body(
            entity,
            BodyConfig::dynamic(info.frame_size())
                .with_gravity(config.allow_gravity)
                .with_immovable(config.immovable),
            Vec2::new(x, y),
        );
        self.physics.add_to_group(group, entity);
        Ok(entity)
    }

    /// Add an existing physics object to `group` without touching its body settings.
    pub fn add_to_group(&mut self, group: GroupId, entity: EntityId) {
        self.physics.add_to_group(group, entity);
    }

    pub fn group_members(&self, group: GroupId) -> &[EntityId] {
        self.physics.group_members(group)
    }

    /// Remove a game object with its sprite, body and animation. Returns false if it
    /// was already gone.
    pub fn destroy(&mut self, entity: EntityId) -> bool {
        if !self.world.despawn(entity) {
            return false;
        }
        self.physics.remove_body(entity);
        true
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.world.is_alive(entity)
    }

    pub fn sprite(&self, entity: EntityId) -> Option<&Sprite> {
        self.world.get::<Sprite>(entity)
    }

    fn sprite_mut(&mut self, entity: EntityId) -> Option<&mut Sprite> {
        self.world.get_mut::<Sprite>(entity)
    }

    /// Body centre for physics objects, sprite position otherwise.
    pub fn position(&self, entity: EntityId) -> Option<Vec2> {
        self.physics
            .body_position(entity)
            .or_else(|| self.sprite(entity).map(|s| s.transform.position))
    }

    pub fn velocity(&self, entity: EntityId) -> Option<Vec2> {
        self.physics.linear_velocity(entity)
    }

    pub fn set_scale(&mut self, entity: EntityId, scale: f32) {
        let Some(sprite) = self.sprite_mut(entity) else {
            return;
        };
        sprite.transform.scale = Vec2::splat(scale);
        let key = sprite.texture_key.clone();
        // Dynamic bodies follow their sprite's scale; static ones wait for refresh_body.
        let is_dynamic = self
            .physics
            .body(entity)
            .is_some_and(|b| b.kind() == BodyKind::Dynamic);
        if is_dynamic {
            if let Ok(info) = self.textures.get(&key) {
                self.physics.refresh_body(entity, info.frame_size() * scale);
            }
        }
    }

    pub fn set_origin(&mut self, entity: EntityId, origin: Vec2) {
        if let Some(sprite) = self.sprite_mut(entity) {
            sprite.origin = origin;
        }
    }

    pub fn set_depth(&mut self, entity: EntityId, depth: i32) {
        if let Some(sprite) = self.sprite_mut(entity) {
            sprite.depth = depth;
        }
    }

    pub fn set_tint(&mut self, entity: EntityId, tint: [f32; 4]) {
        if let Some(sprite) = self.sprite_mut(entity) {
            sprite.tint = tint;
        }
    }

    pub fn set_flip_x(&mut self, entity: EntityId, flip: bool) {
        if let Some(sprite) = self.sprite_mut(entity) {
            sprite.flip_x = flip;
        }
    }

    /// Resize and re-centre a body to match its sprite's current scale and origin.
    pub fn refresh_body(&mut self, entity: EntityId) {
        let Some(sprite) = self.sprite(entity) else {
            return;
        };
        let Ok(info) = self.textures.get(&sprite.texture_key) else {
            return;
        };
        let display = info.frame_size().mul_elem(sprite.transform.scale);
        let center = display_center(sprite, display);
        self.physics.refresh_body(entity, display);
        self.physics.set_body_position(entity, center);
    }

    // ------------------------------
    // Bodies
    // ------------------------------

    pub fn set_velocity_x(&mut self, entity: EntityId, vx: f32) {
        self.physics.set_velocity_x(entity, vx);
    }

    pub fn set_velocity_y(&mut self, entity: EntityId, vy: f32) {
        self.physics.set_velocity_y(entity, vy);
    }

    pub fn set_bounce(&mut self, entity: EntityId, bounce: f32) {
        self.physics.set_bounce(entity, bounce);
    }

    pub fn set_collide_world_bounds(&mut self, entity: EntityId, collide: bool) {
        self.physics.set_collide_world_bounds(entity, collide);
    }

    pub fn touching(&self, entity: EntityId) -> Touching {
        self.physics.touching(entity)
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.physics.set_gravity(gravity);
    }

    pub fn set_world_bounds(&mut self, bounds: Rect) {
        self.physics.set_bounds(bounds);
    }

    /// Solid collision between two targets.
    pub fn collider(&mut self, a: impl Into<Target>, b: impl Into<Target>) {
        self.physics.collider(a, b);
    }

    /// Report to the scene as `Trigger::Overlap` carrying `event` whenever a body of
    /// `a` starts to intersect a body of `b`.
    pub fn overlap(&mut self, a: impl Into<Target>, b: impl Into<Target>, event: E) -> OverlapRuleId {
        let rule = self.physics.overlap(a, b);
        self.overlap_events.insert(rule, event);
        rule
    }

    pub fn pause_physics(&mut self) {
        self.physics.pause();
    }

    pub fn physics_paused(&self) -> bool {
        self.physics.is_paused()
    }

    // ------------------------------
    // Animation
    // ------------------------------

    /// Register a global animation. Returns false if the key already exists.
    pub fn create_animation(&mut self, clip: AnimationClip) -> bool {
        self.animations.create(clip)
    }

    /// Play animation `key` on `entity`. Returns true if playback (re)started.
    pub fn play(&mut self, entity: EntityId, key: &str, ignore_if_playing: bool) -> bool {
        let Some(clip) = self.animations.get(key) else {
            log::warn!("play: unknown animation '{key}'");
            return false;
        };
        if !self.world.is_alive(entity) {
            return false;
        }
        if self.world.get::<AnimationState>(entity).is_none() {
            self.world.insert(entity, AnimationState::new());
        }
        let started = match self.world.get_mut::<AnimationState>(entity) {
            Some(state) => state.play(clip, ignore_if_playing),
            None => false,
        };
        if started {
            let first = clip.frames.first().copied();
            let sheet = clip.texture_key.clone();
            let sheet_handle = self.textures.get(&sheet).ok().map(|i| i.handle);
            if let Some(sprite) = self.world.get_mut::<Sprite>(entity) {
                if let Some(frame) = first {
                    sprite.frame = frame;
                }
                if let Some(handle) = sheet_handle {
                    sprite.texture_key = sheet;
                    sprite.texture = handle;
                }
            }
        }
        started
    }

    /// Freeze the entity's animation on its current frame.
    pub fn pause_animation(&mut self, entity: EntityId) {
        if let Some(state) = self.world.get_mut::<AnimationState>(entity) {
            state.pause();
        }
    }

    pub fn animation_state(&self, entity: EntityId) -> Option<&AnimationState> {
        self.world.get::<AnimationState>(entity)
    }

    pub fn current_animation(&self, entity: EntityId) -> Option<&str> {
        self.animation_state(entity)?.current_key()
    }

    // ------------------------------
    // Camera & HUD
    // ------------------------------

    /// Keep `entity` centred in view, clamped to the camera bounds.
    pub fn start_follow(&mut self, entity: EntityId) {
        self.follow = Some(entity);
    }

    pub fn set_camera_bounds(&mut self, bounds: Rect) {
        self.camera.set_bounds(bounds);
    }

    pub fn add_text(&mut self, text: HudText) -> HudTextId {
        self.hud.add_text(text)
    }

    pub fn set_text(&mut self, id: HudTextId, text: impl Into<String>) -> bool {
        self.hud.set_text(id, text)
    }

    // ------------------------------
    // Timers & lifecycle
    // ------------------------------

    /// Deliver `Trigger::Timer { event, .. }` once after `delay` of scene time.
    pub fn delayed_call(&mut self, delay: Duration, event: E) -> TimerHandle {
        self.timers.delayed_call(delay, event)
    }

    pub fn cancel_timer(&mut self, handle: TimerHandle) -> bool {
        self.timers.cancel(handle)
    }

    /// Tear the scene down and run `create` again once the current frame finishes.
    pub fn restart(&mut self) {
        self.restart_requested = true;
    }

    // ------------------------------
    // Drawing
    // ------------------------------

    /// Visible sprites as draw commands, back to front (depth, then creation order).
    pub fn draw_list(&self) -> Vec<QuadDraw> {
        let mut sprites: Vec<&Sprite> = self
            .world
            .query::<Sprite>()
            .map(|(_, s)| s)
            .filter(|s| s.visible)
            .collect();
        sprites.sort_by_key(|s| s.depth);

        sprites
            .into_iter()
            .filter_map(|sprite| {
                let info = self.textures.get(&sprite.texture_key).ok()?;
                Some(QuadDraw {
                    texture: sprite.texture,
                    uv_rect: Some(info.frame_uv(sprite.frame)),
                    base_size: info.frame_size(),
                    transform: sprite.transform,
                    origin: sprite.origin,
                    flip_x: sprite.flip_x,
                    tint: sprite.tint,
                })
            })
            .collect()
    }
}

/// World-space centre of a sprite drawn at `display` size.
fn display_center(sprite: &Sprite, display: Vec2) -> Vec2 {
    sprite.transform.position + (Vec2::splat(0.5) - sprite.origin).mul_elem(display)
}

/// Owns a scene and drives its frame loop.
pub struct SceneRunner<S: Scene> {
    scene: S,
    ctx: SceneContext<S::Event>,
    accumulator: Duration,
    started: bool,
    restarts: u32,
}

impl<S: Scene> SceneRunner<S> {
    /// Runner for the windowed engine; textures are loaded in `Game::init`.
    pub fn new(scene: S) -> Self {
        Self {
            scene,
            ctx: SceneContext::new(TextureCatalog::new(), Vec2::new(800.0, 600.0)),
            accumulator: Duration::ZERO,
            started: false,
            restarts: 0,
        }
    }

    /// Start `scene` without a window, using `textures` instead of loading files.
    pub fn headless(scene: S, textures: TextureCatalog, viewport: Vec2) -> Result<Self> {
        let mut runner = Self {
            scene,
            ctx: SceneContext::new(textures, viewport),
            accumulator: Duration::ZERO,
            started: false,
            restarts: 0,
        };
        runner.start()?;
        Ok(runner)
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn context(&self) -> &SceneContext<S::Event> {
        &self.ctx
    }

    /// Number of restarts performed so far.
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// The scene's asset declarations.
    pub fn manifest(&self) -> AssetManifest {
        let mut manifest = AssetManifest::default();
        self.scene.preload(&mut manifest);
        manifest
    }

    fn start(&mut self) -> Result<()> {
        self.scene.create(&mut self.ctx)?;
        self.started = true;
        self.sync_sprites();
        self.follow_camera();
        Ok(())
    }

    fn restart(&mut self) -> Result<()> {
        self.ctx.reset();
        self.accumulator = Duration::ZERO;
        self.restarts += 1;
        log::info!("scene restart #{}", self.restarts);
        self.start()
    }

    /// Advance the scene by one frame of length `dt` with `input` held.
    ///
    /// Order: due timers, `update`, fixed physics steps (overlap callbacks after each
    /// step), animations, sprite/body sync, camera, then any requested restart.
    pub fn tick(&mut self, input: &InputState, dt: Duration) -> Result<()> {
        if !self.started {
            self.start()?;
        }
        self.ctx.input = input.clone();
        self.ctx.delta = dt;

        for (timer, event) in self.ctx.timers.tick(dt) {
            self.scene
                .handle(&mut self.ctx, Trigger::Timer { event, timer })?;
        }
        if self.ctx.restart_requested {
            return self.restart();
        }

        self.scene.update(&mut self.ctx)?;

        self.accumulator += dt;
        let mut steps = 0;
        while self.accumulator >= FIXED_STEP {
            self.accumulator -= FIXED_STEP;
            steps += 1;
            if steps > MAX_STEPS_PER_TICK {
                self.accumulator = Duration::ZERO;
                break;
            }
            self.ctx.physics.step(FIXED_STEP.as_secs_f32());
            self.dispatch_physics_events()?;
        }

        self.advance_animations(dt.as_secs_f32());
        self.sync_sprites();
        self.follow_camera();

        if self.ctx.restart_requested {
            self.restart()?;
        }
        Ok(())
    }

    fn dispatch_physics_events(&mut self) -> Result<()> {
        for event in self.ctx.physics.drain_events() {
            let OverlapEvent { rule, a, b } = event;
            // An earlier callback in this step may have destroyed one side.
            if !self.ctx.is_alive(a) || !self.ctx.is_alive(b) {
                continue;
            }
            let Some(&event) = self.ctx.overlap_events.get(&rule) else {
                continue;
            };
            self.scene
                .handle(&mut self.ctx, Trigger::Overlap { event, a, b })?;
        }
        Ok(())
    }

    fn advance_animations(&mut self, dt: f32) {
        let mut frames = Vec::new();
        for (entity, state) in self.ctx.world.query_mut::<AnimationState>() {
            let Some(key) = state.current_key() else {
                continue;
            };
            let Some(clip) = self.ctx.animations.get(key) else {
                continue;
            };
            state.advance(clip, dt);
            if let Some(frame) = state.current_frame(clip) {
                frames.push((entity, frame));
            }
        }
        for (entity, frame) in frames {
            if let Some(sprite) = self.ctx.world.get_mut::<Sprite>(entity) {
                sprite.frame = frame;
            }
        }
    }

    /// Move sprites to where their bodies are.
    fn sync_sprites(&mut self) {
        for entity in self.ctx.physics.all_entities_with_bodies() {
            let Some(center) = self.ctx.physics.body_position(entity) else {
                continue;
            };
            let Some(sprite) = self.ctx.world.get_mut::<Sprite>(entity) else {
                continue;
            };
            let Ok(info) = self.ctx.textures.get(&sprite.texture_key) else {
                continue;
            };
            let display = info.frame_size().mul_elem(sprite.transform.scale);
            sprite.transform.position =
                center - (Vec2::splat(0.5) - sprite.origin).mul_elem(display);
        }
    }

    fn follow_camera(&mut self) {
        let Some(follow) = self.ctx.follow else {
            return;
        };
        match self.ctx.position(follow) {
            Some(target) => self.ctx.camera.center_on(target),
            None => self.ctx.follow = None,
        }
    }
}

impl<S: Scene> Game for SceneRunner<S> {
    fn init(&mut self, engine: &mut EngineContext<'_>) -> Result<()> {
        let manifest = self.manifest();
        self.ctx.textures = engine.load_manifest(&manifest)?;
        let config = engine.config();
        self.ctx.camera = Camera2D::new(
            Vec2::ZERO,
            Vec2::new(config.width as f32, config.height as f32),
        );
        log::info!("loaded {} textures", self.ctx.textures.len());
        self.start()
    }

    fn update(&mut self, engine: &mut EngineContext<'_>) -> Result<()> {
        let dt = engine.delta_time();
        let input = engine.input().clone();
        self.tick(&input, dt)
    }

    fn draw(&mut self, engine: &mut EngineContext<'_>) -> Result<()> {
        let clear_color = engine.config().clear_color;
        let font = engine.hud_font();
        let hud_camera = self.ctx.hud_camera();

        let renderer = engine.renderer();
        let mut frame = renderer.begin_frame()?;
        renderer.clear(&mut frame, clear_color)?;
        for quad in self.ctx.draw_list() {
            renderer.draw_quad(&mut frame, &quad, &self.ctx.camera)?;
        }
        self.ctx.hud.draw(renderer, &mut frame, font, &hud_camera)?;
        renderer.end_frame(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::TextureHandle;
    use winit::keyboard::KeyCode;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Ev {
        Touch,
        Ring,
    }

    #[derive(Default)]
    struct Probe {
        creates: u32,
        touches: Vec<(EntityId, EntityId)>,
        rings: u32,
        box_entity: Option<EntityId>,
        pad: Option<EntityId>,
        frames_seen: u32,
    }

    impl Scene for Probe {
        type Event = Ev;

        fn preload(&self, assets: &mut AssetManifest) {
            assets.image("box", "box.png");
        }

        fn create(&mut self, ctx: &mut SceneContext<Ev>) -> Result<()> {
            self.creates += 1;
            ctx.set_gravity(Vec2::new(0.0, 1000.0));
            ctx.set_world_bounds(Rect::new(0.0, 0.0, 800.0, 600.0));
            let b = ctx.add_sprite(100.0, 100.0, "box")?;
            let pads = ctx.create_group(GroupConfig::new().without_gravity().immovable());
            let pad = ctx.group_create(pads, 100.0, 300.0, "box")?;
            ctx.overlap(b, pads, Ev::Touch);
            ctx.delayed_call(Duration::from_millis(100), Ev::Ring);
            self.box_entity = Some(b);
            self.pad = Some(pad);
            Ok(())
        }

        fn update(&mut self, ctx: &mut SceneContext<Ev>) -> Result<()> {
            self.frames_seen += 1;
            if ctx.input().is_key_down(KeyCode::KeyR) {
                ctx.restart();
            }
            Ok(())
        }

        fn handle(&mut self, ctx: &mut SceneContext<Ev>, trigger: Trigger<Ev>) -> Result<()> {
            match trigger {
                Trigger::Overlap { a, b, .. } => {
                    self.touches.push((a, b));
                    ctx.pause_physics();
                }
                Trigger::Timer { event, .. } => {
                    assert_eq!(event, Ev::Ring);
                    self.rings += 1;
                }
            }
            Ok(())
        }
    }

    fn catalog() -> TextureCatalog {
        let mut textures = TextureCatalog::new();
        textures.insert("box", TextureInfo::image(TextureHandle(1), 32, 32));
        textures
    }

    fn runner() -> SceneRunner<Probe> {
        SceneRunner::headless(Probe::default(), catalog(), Vec2::new(800.0, 600.0)).unwrap()
    }

    #[test]
    fn overlap_callbacks_arrive_and_pause_freezes_the_world() {
        let mut runner = runner();
        let idle = InputState::new();
        for _ in 0..120 {
            runner.tick(&idle, FIXED_STEP).unwrap();
        }
        let scene = runner.scene();
        assert_eq!(scene.touches.len(), 1);
        assert_eq!(scene.touches[0], (scene.box_entity.unwrap(), scene.pad.unwrap()));
        assert!(runner.context().physics_paused());
        // The pad is gravity-free and immovable.
        assert_eq!(runner.context().position(scene.pad.unwrap()), Some(Vec2::new(100.0, 300.0)));
    }

    #[test]
    fn timers_fire_on_scene_time() {
        let mut runner = runner();
        let idle = InputState::new();
        for _ in 0..6 {
            runner.tick(&idle, FIXED_STEP).unwrap();
        }
        assert_eq!(runner.scene().rings, 1);
        runner.tick(&idle, Duration::from_secs(1)).unwrap();
        assert_eq!(runner.scene().rings, 1);
    }

    #[test]
    fn restart_rebuilds_from_a_clean_context() {
        let mut runner = runner();
        let mut input = InputState::new();
        input.press(KeyCode::KeyR);
        runner.tick(&input, FIXED_STEP).unwrap();

        assert_eq!(runner.restarts(), 1);
        assert_eq!(runner.scene().creates, 2);
        let ctx = runner.context();
        assert_eq!(ctx.world().len(), 2);
        assert_eq!(ctx.timers().len(), 1);
        assert!(!ctx.restart_requested());
    }

    #[test]
    fn draw_list_orders_by_depth_then_creation() {
        let mut runner = runner();
        let pad = runner.scene().pad.unwrap();
        runner.ctx.set_depth(pad, -1);
        let draws = runner.context().draw_list();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].transform.position, Vec2::new(100.0, 300.0));
    }

    #[test]
    fn unknown_texture_keys_are_reported() {
        let mut ctx: SceneContext<Ev> = SceneContext::new(TextureCatalog::new(), Vec2::new(800.0, 600.0));
        assert!(matches!(ctx.add_image(0.0, 0.0, "ghost"), Err(AssetError::UnknownKey(_))));
        assert!(ctx.world().is_empty());
    }

    #[test]
    fn refresh_body_matches_scaled_sprite() {
        let mut ctx: SceneContext<Ev> = SceneContext::new(catalog(), Vec2::new(800.0, 600.0));
        let wall = ctx.add_static(200.0, 580.0, "box").unwrap();
        ctx.set_scale(wall, 2.0);
        assert_eq!(ctx.physics().body(wall).unwrap().size(), Vec2::new(32.0, 32.0));
        ctx.refresh_body(wall);
        let body = ctx.physics().body(wall).unwrap();
        assert_eq!(body.size(), Vec2::new(64.0, 64.0));
        assert_eq!(body.position(), Vec2::new(200.0, 580.0));

        let sign = ctx.add_static(0.0, 0.0, "box").unwrap();
        ctx.set_origin(sign, Vec2::ZERO);
        ctx.refresh_body(sign);
        assert_eq!(ctx.physics().body(sign).unwrap().position(), Vec2::new(16.0, 16.0));
    }
}
