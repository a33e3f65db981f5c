//! Arcade physics on top of rapier.
//!
//! Bodies are axis-aligned boxes positioned by their centre, with rotation locked.
//! Pairs of bodies only interact through explicit rules: collider rules make two
//! targets solid to each other, overlap rules report when two targets start to
//! intersect. Everything else passes straight through.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::math::{Rect, Vec2};
use crate::world::EntityId;

// Rapier is a private implementation detail: do NOT re-export it.
use rapier2d::prelude::*;

/// Thickness of the walls that hold bodies inside the world bounds.
const WALL_THICKNESS: f32 = 256.0;

/// User data of the world-bounds walls. Entity colliders store `id + 1`.
const WALL_TAG: u128 = 0;

/// How far a contact normal may lean off an axis and still count as that face.
const FACE_NORMAL: f32 = 0.5;

/// Engine-facing body type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyKind {
    Dynamic,
    Static,
}

/// Which faces of a body are in contact with something.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Touching {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl Touching {
    pub fn none(&self) -> bool {
        !(self.up || self.down || self.left || self.right)
    }

    /// Record a contact whose normal points out of the body towards the other side.
    fn mark(&mut self, normal: Vec2) {
        if normal.y >= FACE_NORMAL {
            self.down = true;
        } else if normal.y <= -FACE_NORMAL {
            self.up = true;
        }
        if normal.x >= FACE_NORMAL {
            self.right = true;
        } else if normal.x <= -FACE_NORMAL {
            self.left = true;
        }
    }
}

/// Creation parameters for a body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyConfig {
    pub kind: BodyKind,
    pub size: Vec2,
    pub allow_gravity: bool,
    /// Dynamic bodies that are immovable keep their velocity through contacts.
    pub immovable: bool,
    pub bounce: f32,
    pub collide_world_bounds: bool,
}

impl BodyConfig {
    pub fn dynamic(size: Vec2) -> Self {
        Self {
            kind: BodyKind::Dynamic,
            size,
            allow_gravity: true,
            immovable: false,
            bounce: 0.0,
            collide_world_bounds: false,
        }
    }

    pub fn fixed(size: Vec2) -> Self {
        Self {
            kind: BodyKind::Static,
            size,
            allow_gravity: false,
            immovable: true,
            bounce: 0.0,
            collide_world_bounds: false,
        }
    }

    pub fn with_gravity(mut self, allow: bool) -> Self {
        self.allow_gravity = allow;
        self
    }

    pub fn with_immovable(mut self, immovable: bool) -> Self {
        self.immovable = immovable;
        self
    }

    pub fn with_bounce(mut self, bounce: f32) -> Self {
        self.bounce = bounce.max(0.0);
        self
    }

    pub fn with_world_bounds(mut self, collide: bool) -> Self {
        self.collide_world_bounds = collide;
        self
    }

    fn rigid_body_type(&self) -> RigidBodyType {
        match (self.kind, self.immovable) {
            (BodyKind::Static, _) => RigidBodyType::Fixed,
            (BodyKind::Dynamic, true) => RigidBodyType::KinematicVelocityBased,
            (BodyKind::Dynamic, false) => RigidBodyType::Dynamic,
        }
    }
}

/// Snapshot of a body as of the last step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Body {
    config: BodyConfig,
    position: Vec2,
    velocity: Vec2,
    touching: Touching,
    blocked: Touching,
}

impl Body {
    pub fn kind(&self) -> BodyKind {
        self.config.kind
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn size(&self) -> Vec2 {
        self.config.size
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn allows_gravity(&self) -> bool {
        self.config.allow_gravity
    }

    pub fn is_immovable(&self) -> bool {
        self.config.immovable
    }

    pub fn bounce(&self) -> f32 {
        self.config.bounce
    }

    /// Contacts with other bodies during the last step.
    pub fn touching(&self) -> Touching {
        self.touching
    }

    /// Contacts with the world bounds during the last step.
    pub fn blocked(&self) -> Touching {
        self.blocked
    }
}

/// Named set of bodies that rules can target as a whole.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(u32);

/// Identifies an overlap rule in the events it produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverlapRuleId(u32);

/// One side of a collide/overlap rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    Entity(EntityId),
    Group(GroupId),
}

impl From<EntityId> for Target {
    fn from(value: EntityId) -> Self {
        Target::Entity(value)
    }
}

impl From<GroupId> for Target {
    fn from(value: GroupId) -> Self {
        Target::Group(value)
    }
}

/// Two bodies under an overlap rule started to intersect. `a` belongs to the rule's
/// first target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverlapEvent {
    pub rule: OverlapRuleId,
    pub a: EntityId,
    pub b: EntityId,
}

/// Engine-side bookkeeping for one rapier body.
struct BodyEntry {
    config: BodyConfig,
    handle: RigidBodyHandle,
    solid: ColliderHandle,
    sensor: ColliderHandle,
    touching: Touching,
    blocked: Touching,
}

fn entity_tag(entity: EntityId) -> u128 {
    u128::from(entity.to_u32()) + 1
}

fn tagged_entity(tag: u128) -> Option<EntityId> {
    if tag == WALL_TAG {
        return None;
    }
    u32::try_from(tag - 1).ok().map(EntityId::from_u32)
}

/// Lets solid contacts through only for pairs under a collider rule, and for bodies
/// that collide with the world bounds against the walls.
struct RuleFilter {
    solid: HashSet<(EntityId, EntityId)>,
    bounded: HashSet<EntityId>,
}

impl PhysicsHooks for RuleFilter {
    fn filter_contact_pair(&self, context: &PairFilterContext) -> Option<SolverFlags> {
        let tag1 = context.colliders.get(context.collider1)?.user_data;
        let tag2 = context.colliders.get(context.collider2)?.user_data;
        let allowed = match (tagged_entity(tag1), tagged_entity(tag2)) {
            (Some(a), Some(b)) => self.solid.contains(&(a, b)),
            (Some(e), None) | (None, Some(e)) => self.bounded.contains(&e),
            (None, None) => false,
        };
        allowed.then_some(SolverFlags::COMPUTE_IMPULSES)
    }
}

pub struct PhysicsWorld {
    // --- rapier internals ---
    pipeline: PhysicsPipeline,
    integration_parameters: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: BroadPhase,
    narrow_phase: NarrowPhase,
    rigid_bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,

    // Event channels
    event_recv_collision: crossbeam_channel::Receiver<CollisionEvent>,
    _event_recv_contact_force: crossbeam_channel::Receiver<ContactForceEvent>,
    event_handler: ChannelEventCollector,

    // --- arcade layer ---
    bodies: BTreeMap<EntityId, BodyEntry>,
    groups: BTreeMap<GroupId, Vec<EntityId>>,
    collide_rules: Vec<(Target, Target)>,
    overlap_rules: Vec<(OverlapRuleId, Target, Target)>,
    next_group: u32,
    next_rule: u32,

    gravity: Vec2,
    bounds: Rect,
    walls: Option<RigidBodyHandle>,
    paused: bool,

    pending_events: Vec<OverlapEvent>,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    pub fn new() -> Self {
        let (send_col, recv_col) = crossbeam_channel::unbounded();
        let (send_force, recv_force) = crossbeam_channel::unbounded();
        let event_handler = ChannelEventCollector::new(send_col, send_force);

        let mut world = Self {
            pipeline: PhysicsPipeline::new(),
            integration_parameters: IntegrationParameters::default(),
            island_manager: IslandManager::new(),
            broad_phase: BroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),

            event_recv_collision: recv_col,
            _event_recv_contact_force: recv_force,
            event_handler,

            bodies: BTreeMap::new(),
            groups: BTreeMap::new(),
            collide_rules: Vec::new(),
            overlap_rules: Vec::new(),
            next_group: 1,
            next_rule: 1,

            gravity: Vec2::ZERO,
            bounds: Rect::new(0.0, 0.0, 800.0, 600.0),
            walls: None,
            paused: false,

            pending_events: Vec::new(),
        };
        world.build_walls();
        world
    }

    pub fn with_gravity(gravity: Vec2) -> Self {
        let mut w = Self::new();
        w.gravity = gravity;
        w
    }

    /// Remove all bodies, groups, rules and events and resume simulation.
    /// Gravity and world bounds are kept.
    pub fn clear(&mut self) {
        let bounds = self.bounds;
        *self = Self::with_gravity(self.gravity);
        self.set_bounds(bounds);
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.gravity = gravity;
    }

    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    pub fn set_bounds(&mut self, bounds: Rect) {
        self.bounds = bounds;
        self.build_walls();
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Freeze the simulation: `step` becomes a no-op and no events are produced.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // ------------------------------
    // Bodies
    // ------------------------------

    /// Create/replace the body of an entity, centred on `position`.
    pub fn create_body(&mut self, entity: EntityId, config: BodyConfig, position: Vec2) {
        // Keeps invariant 1 body per entity.
        self.remove_rapier_body(entity);

        let body_type = config.rigid_body_type();
        let body = RigidBodyBuilder::new(body_type)
            .translation(vector![position.x, position.y])
            .gravity_scale(if config.allow_gravity { 1.0 } else { 0.0 })
            .lock_rotations()
            .ccd_enabled(body_type == RigidBodyType::Dynamic)
            .build();
        let handle = self.rigid_bodies.insert(body);

        let half = config.size * 0.5;
        let solid = ColliderBuilder::cuboid(half.x, half.y)
            .friction(0.0)
            .restitution(config.bounce)
            .restitution_combine_rule(CoefficientCombineRule::Max)
            .active_hooks(ActiveHooks::FILTER_CONTACT_PAIRS)
            .user_data(entity_tag(entity))
            .build();
        let sensor = ColliderBuilder::cuboid(half.x, half.y)
            .sensor(true)
            .density(0.0)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .active_collision_types(ActiveCollisionTypes::all())
            .user_data(entity_tag(entity))
            .build();
        let solid = self
            .colliders
            .insert_with_parent(solid, handle, &mut self.rigid_bodies);
        let sensor = self
            .colliders
            .insert_with_parent(sensor, handle, &mut self.rigid_bodies);

        self.bodies.insert(
            entity,
            BodyEntry {
                config,
                handle,
                solid,
                sensor,
                touching: Touching::default(),
                blocked: Touching::default(),
            },
        );
    }

    /// Remove a body and its group memberships. Returns whether one existed.
    pub fn remove_body(&mut self, entity: EntityId) -> bool {
        for members in self.groups.values_mut() {
            members.retain(|&e| e != entity);
        }
        self.remove_rapier_body(entity)
    }

    pub fn has_body(&self, entity: EntityId) -> bool {
        self.bodies.contains_key(&entity)
    }

    pub fn body(&self, entity: EntityId) -> Option<Body> {
        let entry = self.bodies.get(&entity)?;
        let rb = self.rigid_bodies.get(entry.handle)?;
        let (t, v) = (rb.translation(), rb.linvel());
        Some(Body {
            config: entry.config,
            position: Vec2::new(t.x, t.y),
            velocity: Vec2::new(v.x, v.y),
            touching: entry.touching,
            blocked: entry.blocked,
        })
    }

    pub fn all_entities_with_bodies(&self) -> Vec<EntityId> {
        self.bodies.keys().copied().collect()
    }

    pub fn body_position(&self, entity: EntityId) -> Option<Vec2> {
        let b = self.rigid_body(entity)?;
        let t = b.translation();
        Some(Vec2::new(t.x, t.y))
    }

    /// Teleport a body.
    pub fn set_body_position(&mut self, entity: EntityId, position: Vec2) {
        if let Some(b) = self.rigid_body_mut(entity) {
            b.set_translation(vector![position.x, position.y], true);
        }
    }

    /// Resize a body, keeping its centre (e.g. after scaling the sprite it belongs to).
    pub fn refresh_body(&mut self, entity: EntityId, size: Vec2) {
        let Some(entry) = self.bodies.get_mut(&entity) else {
            return;
        };
        entry.config.size = size;
        let half = size * 0.5;
        for handle in [entry.solid, entry.sensor] {
            if let Some(collider) = self.colliders.get_mut(handle) {
                collider.set_shape(SharedShape::cuboid(half.x, half.y));
            }
        }
    }

    pub fn linear_velocity(&self, entity: EntityId) -> Option<Vec2> {
        let v = self.rigid_body(entity)?.linvel();
        Some(Vec2::new(v.x, v.y))
    }

    pub fn set_linear_velocity(&mut self, entity: EntityId, velocity: Vec2) {
        if let Some(b) = self.moving_body_mut(entity) {
            b.set_linvel(vector![velocity.x, velocity.y], true);
        }
    }

    pub fn set_velocity_x(&mut self, entity: EntityId, vx: f32) {
        if let Some(b) = self.moving_body_mut(entity) {
            let vy = b.linvel().y;
            b.set_linvel(vector![vx, vy], true);
        }
    }

    pub fn set_velocity_y(&mut self, entity: EntityId, vy: f32) {
        if let Some(b) = self.moving_body_mut(entity) {
            let vx = b.linvel().x;
            b.set_linvel(vector![vx, vy], true);
        }
    }

    pub fn set_bounce(&mut self, entity: EntityId, bounce: f32) {
        let Some(entry) = self.bodies.get_mut(&entity) else {
            return;
        };
        entry.config.bounce = bounce.max(0.0);
        if let Some(collider) = self.colliders.get_mut(entry.solid) {
            collider.set_restitution(entry.config.bounce);
        }
    }

    pub fn set_collide_world_bounds(&mut self, entity: EntityId, collide: bool) {
        if let Some(entry) = self.bodies.get_mut(&entity) {
            entry.config.collide_world_bounds = collide;
        }
    }

    /// Contacts from the last step; all false for unknown entities.
    pub fn touching(&self, entity: EntityId) -> Touching {
        self.bodies
            .get(&entity)
            .map(|e| e.touching)
            .unwrap_or_default()
    }

    // ------------------------------
    // Groups and rules
    // ------------------------------

    pub fn create_group(&mut self) -> GroupId {
        let id = GroupId(self.next_group);
        self.next_group += 1;
        self.groups.insert(id, Vec::new());
        id
    }

    pub fn add_to_group(&mut self, group: GroupId, entity: EntityId) {
        let members = self.groups.entry(group).or_default();
        if !members.contains(&entity) {
            members.push(entity);
        }
    }

    /// Members of a group in insertion order.
    pub fn group_members(&self, group: GroupId) -> &[EntityId] {
        self.groups.get(&group).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Make bodies of `a` and `b` solid to each other.
    pub fn collider(&mut self, a: impl Into<Target>, b: impl Into<Target>) {
        self.collide_rules.push((a.into(), b.into()));
    }

    /// Report when bodies of `a` and `b` start to intersect, without affecting motion.
    pub fn overlap(&mut self, a: impl Into<Target>, b: impl Into<Target>) -> OverlapRuleId {
        let id = OverlapRuleId(self.next_rule);
        self.next_rule += 1;
        self.overlap_rules.push((id, a.into(), b.into()));
        id
    }

    // ------------------------------
    // Simulation
    // ------------------------------

    /// Step simulation by dt (seconds).
    pub fn step(&mut self, dt: f32) {
        if self.paused || dt <= 0.0 {
            return;
        }
        self.integration_parameters.dt = dt;

        let gravity = vector![self.gravity.x, self.gravity.y];
        let hooks = self.rule_filter();

        self.pipeline.step(
            &gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            &hooks,
            &self.event_handler,
        );

        self.update_contacts();
        self.collect_events();
    }

    /// Drain overlap events collected since last drain.
    pub fn drain_events(&mut self) -> Vec<OverlapEvent> {
        std::mem::take(&mut self.pending_events)
    }

    // ------------------------------
    // Private helpers
    // ------------------------------

    fn rigid_body(&self, entity: EntityId) -> Option<&RigidBody> {
        let entry = self.bodies.get(&entity)?;
        self.rigid_bodies.get(entry.handle)
    }

    fn rigid_body_mut(&mut self, entity: EntityId) -> Option<&mut RigidBody> {
        let entry = self.bodies.get(&entity)?;
        self.rigid_bodies.get_mut(entry.handle)
    }

    /// Static bodies never take a velocity.
    fn moving_body_mut(&mut self, entity: EntityId) -> Option<&mut RigidBody> {
        let entry = self.bodies.get(&entity)?;
        if entry.config.kind == BodyKind::Static {
            return None;
        }
        self.rigid_bodies.get_mut(entry.handle)
    }

    fn remove_rapier_body(&mut self, entity: EntityId) -> bool {
        let Some(entry) = self.bodies.remove(&entity) else {
            return false;
        };
        self.rigid_bodies.remove(
            entry.handle,
            &mut self.island_manager,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        true
    }

    /// Replace the four walls around `bounds`.
    fn build_walls(&mut self) {
        if let Some(old) = self.walls.take() {
            self.rigid_bodies.remove(
                old,
                &mut self.island_manager,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            );
        }
        let handle = self.rigid_bodies.insert(RigidBodyBuilder::fixed().build());

        let b = self.bounds;
        let t = WALL_THICKNESS * 0.5;
        let center = b.center();
        let (span_x, span_y) = (b.width * 0.5 + WALL_THICKNESS, b.height * 0.5 + WALL_THICKNESS);
        let walls = [
            (Vec2::new(b.left() - t, center.y), Vec2::new(t, span_y)),
            (Vec2::new(b.right() + t, center.y), Vec2::new(t, span_y)),
            (Vec2::new(center.x, b.top() - t), Vec2::new(span_x, t)),
            (Vec2::new(center.x, b.bottom() + t), Vec2::new(span_x, t)),
        ];
        for (at, half) in walls {
            let wall = ColliderBuilder::cuboid(half.x, half.y)
                .translation(vector![at.x, at.y])
                .friction(0.0)
                .active_hooks(ActiveHooks::FILTER_CONTACT_PAIRS)
                .user_data(WALL_TAG)
                .build();
            self.colliders
                .insert_with_parent(wall, handle, &mut self.rigid_bodies);
        }
        self.walls = Some(handle);
    }

    fn members(&self, target: Target) -> Vec<EntityId> {
        match target {
            Target::Entity(e) if self.bodies.contains_key(&e) => vec![e],
            Target::Entity(_) => Vec::new(),
            Target::Group(g) => self
                .group_members(g)
                .iter()
                .copied()
                .filter(|e| self.bodies.contains_key(e))
                .collect(),
        }
    }

    fn in_target(&self, entity: EntityId, target: Target) -> bool {
        match target {
            Target::Entity(e) => e == entity,
            Target::Group(g) => self.group_members(g).contains(&entity),
        }
    }

    fn rule_filter(&self) -> RuleFilter {
        let mut solid = HashSet::new();
        for &(a, b) in &self.collide_rules {
            let rhs = self.members(b);
            for ea in self.members(a) {
                for &eb in rhs.iter().filter(|&&eb| eb != ea) {
                    solid.insert((ea, eb));
                    solid.insert((eb, ea));
                }
            }
        }
        let bounded = self
            .bodies
            .iter()
            .filter(|(_, e)| e.config.collide_world_bounds)
            .map(|(&entity, _)| entity)
            .collect();
        RuleFilter { solid, bounded }
    }

    /// Rebuild `touching`/`blocked` from the contact normals rapier produced.
    fn update_contacts(&mut self) {
        for entry in self.bodies.values_mut() {
            entry.touching = Touching::default();
            entry.blocked = Touching::default();
            for pair in self.narrow_phase.contacts_with(entry.solid) {
                if !pair.has_any_active_contact {
                    continue;
                }
                let (other, flip) = if pair.collider1 == entry.solid {
                    (pair.collider2, 1.0)
                } else {
                    (pair.collider1, -1.0)
                };
                let against_wall = self
                    .colliders
                    .get(other)
                    .is_some_and(|c| c.user_data == WALL_TAG);
                for manifold in &pair.manifolds {
                    if manifold.data.solver_contacts.is_empty() {
                        continue;
                    }
                    let n = manifold.data.normal * flip;
                    let side = if against_wall {
                        &mut entry.blocked
                    } else {
                        &mut entry.touching
                    };
                    side.mark(Vec2::new(n.x, n.y));
                }
            }
        }
    }

    /// Turn sensor intersections that just started into overlap events.
    fn collect_events(&mut self) {
        let mut started = Vec::new();
        while let Ok(ev) = self.event_recv_collision.try_recv() {
            if let CollisionEvent::Started(c1, c2, _) = ev {
                if let Some(pair) = self.map_pair(c1, c2) {
                    started.push(pair);
                }
            }
        }

        // Solid and sensor colliders can both report the same pair.
        let mut seen = HashSet::new();
        for (e1, e2) in started {
            for &(rule, ta, tb) in &self.overlap_rules {
                let (a, b) = if self.in_target(e1, ta) && self.in_target(e2, tb) {
                    (e1, e2)
                } else if self.in_target(e2, ta) && self.in_target(e1, tb) {
                    (e2, e1)
                } else {
                    continue;
                };
                if seen.insert((rule, a, b)) {
                    self.pending_events.push(OverlapEvent { rule, a, b });
                }
            }
        }
    }

    fn map_pair(&self, c1: ColliderHandle, c2: ColliderHandle) -> Option<(EntityId, EntityId)> {
        let e1 = tagged_entity(self.colliders.get(c1)?.user_data)?;
        let e2 = tagged_entity(self.colliders.get(c2)?.user_data)?;
        (e1 != e2 && self.bodies.contains_key(&e1) && self.bodies.contains_key(&e2))
            .then_some((e1, e2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::World;

    const DT: f32 = 1.0 / 60.0;

    fn ground_and_player() -> (World, PhysicsWorld, EntityId, EntityId) {
        let mut world = World::new();
        let mut physics = PhysicsWorld::with_gravity(Vec2::new(0.0, 1200.0));
        physics.set_bounds(Rect::new(0.0, 0.0, 1600.0, 600.0));

        let ground = world.spawn();
        physics.create_body(ground, BodyConfig::fixed(Vec2::new(800.0, 64.0)), Vec2::new(400.0, 580.0));
        let player = world.spawn();
        physics.create_body(
            player,
            BodyConfig::dynamic(Vec2::new(32.0, 48.0))
                .with_bounce(0.1)
                .with_world_bounds(true),
            Vec2::new(100.0, 450.0),
        );
        physics.collider(player, ground);
        (world, physics, player, ground)
    }

    #[test]
    fn falling_body_comes_to_rest_on_static_ground() {
        let (_, mut physics, player, _) = ground_and_player();
        for _ in 0..120 {
            physics.step(DT);
        }
        let pos = physics.body_position(player).unwrap();
        assert!((pos.y - 524.0).abs() < 0.5, "resting centre was {}", pos.y);
        assert!(physics.linear_velocity(player).unwrap().y.abs() < 5.0);
        assert!(physics.touching(player).down);
        assert!(physics.body(player).unwrap().blocked().none());
    }

    #[test]
    fn landing_rebound_never_exceeds_the_bounce_factor() {
        let (_, mut physics, player, _) = ground_and_player();
        physics.set_body_position(player, Vec2::new(100.0, 300.0));
        let mut impact = 0.0f32;
        let mut landed = false;
        for _ in 0..120 {
            let before = physics.linear_velocity(player).unwrap().y;
            physics.step(DT);
            if physics.touching(player).down && !landed {
                landed = true;
                impact = before + 1200.0 * DT;
                let after = physics.linear_velocity(player).unwrap().y;
                assert!(after <= 0.5, "still falling at {after}");
                assert!(-after <= impact * 0.1 + 1.0, "rebound {after} from {impact}");
            }
        }
        assert!(landed, "player never landed");
        assert!(impact > 500.0);
    }

    #[test]
    fn walking_across_overlapping_tiles_keeps_contact() {
        let (mut world, mut physics, player, _) = ground_and_player();
        let second_tile = world.spawn();
        physics.create_body(second_tile, BodyConfig::fixed(Vec2::new(800.0, 64.0)), Vec2::new(800.0, 580.0));
        physics.collider(player, second_tile);

        for _ in 0..60 {
            physics.step(DT);
        }
        for _ in 0..120 {
            physics.set_velocity_x(player, 300.0);
            physics.step(DT);
            assert!(physics.touching(player).down);
            assert!(!physics.touching(player).right);
        }
        let pos = physics.body_position(player).unwrap();
        assert!((pos.x - 700.0).abs() < 1.0, "x was {}", pos.x);
        assert!((pos.y - 524.0).abs() < 0.5);
    }

    #[test]
    fn world_bounds_block_dynamic_bodies() {
        let (_, mut physics, player, _) = ground_and_player();
        physics.set_bounce(player, 0.0);
        physics.set_velocity_x(player, -600.0);
        for _ in 0..30 {
            physics.step(DT);
        }
        let body = physics.body(player).unwrap();
        assert!((body.position().x - 16.0).abs() < 0.5, "x was {}", body.position().x);
        assert!(body.velocity().x.abs() < 1.0);
        assert!(body.blocked().left);
    }

    #[test]
    fn bodies_without_a_collider_rule_pass_through() {
        let mut world = World::new();
        let mut physics = PhysicsWorld::with_gravity(Vec2::new(0.0, 1200.0));
        physics.set_bounds(Rect::new(0.0, 0.0, 800.0, 2000.0));
        let ground = world.spawn();
        physics.create_body(ground, BodyConfig::fixed(Vec2::new(800.0, 64.0)), Vec2::new(400.0, 580.0));
        let rock = world.spawn();
        physics.create_body(rock, BodyConfig::dynamic(Vec2::new(32.0, 32.0)), Vec2::new(100.0, 450.0));

        for _ in 0..60 {
            physics.step(DT);
        }
        assert!(physics.body_position(rock).unwrap().y > 700.0);
        assert!(physics.touching(rock).none());
    }

    #[test]
    fn immovable_bodies_hold_their_ground() {
        let (mut world, mut physics, player, _) = ground_and_player();
        let crate_box = world.spawn();
        physics.create_body(
            crate_box,
            BodyConfig::dynamic(Vec2::new(32.0, 32.0))
                .with_gravity(false)
                .with_immovable(true),
            Vec2::new(200.0, 532.0),
        );
        physics.collider(player, crate_box);

        for _ in 0..90 {
            physics.set_velocity_x(player, 300.0);
            physics.step(DT);
        }
        assert_eq!(physics.body_position(crate_box), Some(Vec2::new(200.0, 532.0)));
        let x = physics.body_position(player).unwrap().x;
        assert!((x - 168.0).abs() < 1.0, "x was {x}");
        assert!(physics.touching(player).right);
    }

    #[test]
    fn overlaps_report_once_and_do_not_push() {
        let mut world = World::new();
        let mut physics = PhysicsWorld::with_gravity(Vec2::new(0.0, 1200.0));
        let player = world.spawn();
        physics.create_body(player, BodyConfig::dynamic(Vec2::new(32.0, 48.0)).with_gravity(false), Vec2::new(100.0, 100.0));
        let coins = physics.create_group();
        let coin = world.spawn();
        physics.create_body(coin, BodyConfig::dynamic(Vec2::new(24.0, 24.0)).with_gravity(false), Vec2::new(105.0, 100.0));
        physics.add_to_group(coins, coin);
        let rule = physics.overlap(player, coins);

        physics.step(DT);
        assert_eq!(physics.drain_events(), vec![OverlapEvent { rule, a: player, b: coin }]);
        for _ in 0..3 {
            physics.step(DT);
            assert!(physics.drain_events().is_empty());
        }
        assert_eq!(physics.body_position(player), Some(Vec2::new(100.0, 100.0)));
        assert_eq!(physics.body_position(coin), Some(Vec2::new(105.0, 100.0)));
    }

    #[test]
    fn overlap_events_name_the_first_target_first() {
        let mut world = World::new();
        let mut physics = PhysicsWorld::new();
        let spikes = physics.create_group();
        let spike = world.spawn();
        physics.create_body(spike, BodyConfig::fixed(Vec2::new(32.0, 32.0)), Vec2::new(50.0, 50.0));
        physics.add_to_group(spikes, spike);
        let player = world.spawn();
        physics.create_body(player, BodyConfig::dynamic(Vec2::new(32.0, 48.0)).with_gravity(false), Vec2::new(60.0, 50.0));
        let rule = physics.overlap(player, spikes);

        physics.step(DT);
        assert_eq!(physics.drain_events(), vec![OverlapEvent { rule, a: player, b: spike }]);
    }

    #[test]
    fn removed_bodies_leave_their_groups() {
        let mut world = World::new();
        let mut physics = PhysicsWorld::new();
        let group = physics.create_group();
        let a = world.spawn();
        let b = world.spawn();
        for e in [a, b] {
            physics.create_body(e, BodyConfig::fixed(Vec2::ONE), Vec2::ZERO);
            physics.add_to_group(group, e);
        }
        assert!(physics.remove_body(a));
        assert_eq!(physics.group_members(group), &[b]);
        assert!(!physics.remove_body(a));
        assert!(physics.body(a).is_none());
    }

    #[test]
    fn refresh_body_resizes_in_place() {
        let (_, mut physics, _, ground) = ground_and_player();
        physics.refresh_body(ground, Vec2::new(1600.0, 64.0));
        let body = physics.body(ground).unwrap();
        assert_eq!(body.size(), Vec2::new(1600.0, 64.0));
        assert_eq!(body.position(), Vec2::new(400.0, 580.0));
    }

    #[test]
    fn paused_world_is_frozen() {
        let (_, mut physics, player, _) = ground_and_player();
        physics.set_velocity_x(player, 300.0);
        physics.pause();
        for _ in 0..10 {
            physics.step(DT);
        }
        assert_eq!(physics.body_position(player), Some(Vec2::new(100.0, 450.0)));
        assert!(physics.drain_events().is_empty());

        physics.resume();
        physics.step(DT);
        assert!(physics.body_position(player).unwrap().x > 100.0);
    }

    #[test]
    fn clearing_keeps_gravity_and_bounds() {
        let (_, mut physics, player, _) = ground_and_player();
        physics.pause();
        physics.clear();
        assert!(!physics.has_body(player));
        assert!(!physics.is_paused());
        assert_eq!(physics.gravity(), Vec2::new(0.0, 1200.0));
        assert_eq!(physics.bounds(), Rect::new(0.0, 0.0, 1600.0, 600.0));
    }

    #[test]
    fn static_bodies_ignore_velocity_and_gravity() {
        let (_, mut physics, _, ground) = ground_and_player();
        physics.set_linear_velocity(ground, Vec2::new(100.0, 100.0));
        physics.step(DT);
        assert_eq!(physics.body_position(ground), Some(Vec2::new(400.0, 580.0)));
        assert_eq!(physics.linear_velocity(ground), Some(Vec2::ZERO));
    }
}
