//! The simulation world.
//!
//! [`PhysicsWorld`] owns a fixed-capacity set of bodies and advances them once
//! per frame. Each frame integrates every body once with the full time step and
//! then runs a number of collision substeps for it against every other body,
//! in insertion order. Results are order dependent: corrections made for an
//! earlier pair are visible to later pairs of the same substep.
//!
//! Collision listeners may remove or spawn bodies through [`WorldCommands`].
//! Both are deferred to the end of [`PhysicsWorld::update`], so iteration is
//! never invalidated. A body queued for removal keeps taking part in the
//! substeps that are still running.

use alloc::vec::Vec;
use nalgebra::Vector3;

use crate::body::{BodyId, RigidBody};
use crate::collider::{test_collision, CollisionData, CollisionKind};

/// Reference number of collision substeps per frame.
pub const DEFAULT_SUBSTEPS: u32 = 4;

/// World-wide simulation settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldConfig {
    /// Acceleration applied to every body with gravity enabled.
    pub gravity: Vector3<f32>,
    /// Collision substeps per frame. Values below 1 are treated as 1.
    pub substeps: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vector3::new(0.0, -9.81, 0.0),
            substeps: DEFAULT_SUBSTEPS,
        }
    }
}

impl WorldConfig {
    pub fn with_gravity(mut self, gravity: Vector3<f32>) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_substeps(mut self, substeps: u32) -> Self {
        self.substeps = substeps;
        self
    }
}

/// Deferred structural changes requested while the world is updating.
///
/// Collision listeners receive this; the world applies the queued removals and
/// then the queued spawns when [`PhysicsWorld::update`] finishes.
#[derive(Debug, Default)]
pub struct WorldCommands {
    next_id: usize,
    removals: Vec<BodyId>,
    spawns: Vec<(BodyId, RigidBody)>,
}

impl WorldCommands {
    /// Queue `id` for removal. Returns `false` if it was already queued.
    pub fn remove_body(&mut self, id: BodyId) -> bool {
        if self.removals.contains(&id) {
            return false;
        }
        self.removals.push(id);
        true
    }

    pub fn is_pending_removal(&self, id: BodyId) -> bool {
        self.removals.contains(&id)
    }

    /// Queue `body` for insertion and return the id it will have.
    ///
    /// The body joins the world after the current update. If the world is full
    /// at that point it is dropped with a warning.
    pub fn spawn(&mut self, body: RigidBody) -> BodyId {
        let id = self.allocate_id();
        self.spawns.push((id, body));
        id
    }

    fn allocate_id(&mut self) -> BodyId {
        let id = BodyId(self.next_id);
        self.next_id += 1;
        id
    }
}

#[derive(Debug)]
struct Slot {
    id: BodyId,
    body: RigidBody,
}

/// The physics simulation world.
///
/// # Type Parameters
/// * `N` - Maximum number of bodies (compile-time capacity).
///
/// # Example
/// ```
/// use physixx::{PhysicsWorld, RigidBody};
/// use nalgebra::Vector3;
///
/// let mut world = PhysicsWorld::<8>::new();
/// let floor = world
///     .add_body(RigidBody::new_box(10.0, Vector3::new(20.0, 1.0, 20.0)).with_simulated(false))
///     .unwrap();
/// let crate_box = world.add_box(1.0, Vector3::new(1.0, 1.0, 1.0), Vector3::new(0.0, 3.0, 0.0)).unwrap();
///
/// for _ in 0..10 {
///     world.update(1.0 / 60.0);
/// }
/// assert!(world.body(crate_box).unwrap().position().y < 3.0);
/// assert_eq!(world.body(floor).unwrap().position(), Vector3::zeros());
/// ```
#[derive(Debug)]
pub struct PhysicsWorld<const N: usize> {
    slots: heapless::Vec<Slot, N>,
    commands: WorldCommands,
    config: WorldConfig,
}

impl<const N: usize> Default for PhysicsWorld<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> PhysicsWorld<N> {
    /// Create an empty world with [`WorldConfig::default`].
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    pub fn with_config(config: WorldConfig) -> Self {
        Self {
            slots: heapless::Vec::new(),
            commands: WorldCommands::default(),
            config,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn set_gravity(&mut self, gravity: Vector3<f32>) {
        self.config.gravity = gravity;
    }

    pub fn gravity(&self) -> Vector3<f32> {
        self.config.gravity
    }

    pub fn set_substeps(&mut self, substeps: u32) {
        self.config.substeps = substeps;
    }

    /// Effective substep count, at least 1.
    pub fn substeps(&self) -> u32 {
        self.config.substeps.max(1)
    }

    /// Add a body to the world. Returns its [`BodyId`], or `None` if at capacity.
    pub fn add_body(&mut self, body: RigidBody) -> Option<BodyId> {
        if self.slots.is_full() {
            return None;
        }
        let id = self.commands.allocate_id();
        self.slots.push(Slot { id, body }).ok()?;
        log::debug!("added body {:?} ({} live)", id, self.slots.len());
        Some(id)
    }

    /// Add a box of full extents `size` at `position`.
    pub fn add_box(&mut self, mass: f32, size: Vector3<f32>, position: Vector3<f32>) -> Option<BodyId> {
        self.add_body(RigidBody::new_box(mass, size).with_position(position))
    }

    /// Mark a body for removal at the end of the next (or current) update.
    ///
    /// Returns `false` if the id is unknown or already pending.
    pub fn remove_body(&mut self, id: BodyId) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.commands.remove_body(id)
    }

    pub fn is_pending_removal(&self, id: BodyId) -> bool {
        self.commands.is_pending_removal(id)
    }

    /// Whether `id` is in the live collection (pending removals included).
    pub fn contains(&self, id: BodyId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn body(&self, id: BodyId) -> Option<&RigidBody> {
        self.index_of(id).map(|i| &self.slots[i].body)
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        let index = self.index_of(id)?;
        Some(&mut self.slots[index].body)
    }

    /// Number of live bodies, including those pending removal.
    pub fn body_count(&self) -> usize {
        self.slots.len()
    }

    /// Iterate over all bodies in insertion order.
    pub fn bodies(&self) -> impl Iterator<Item = (BodyId, &RigidBody)> {
        self.slots.iter().map(|slot| (slot.id, &slot.body))
    }

    /// Iterate over all bodies mutably in insertion order.
    pub fn bodies_mut(&mut self) -> impl Iterator<Item = (BodyId, &mut RigidBody)> {
        self.slots.iter_mut().map(|slot| (slot.id, &mut slot.body))
    }

    fn index_of(&self, id: BodyId) -> Option<usize> {
        self.slots.iter().position(|slot| slot.id == id)
    }

    // -- Parenting --

    /// Attach `child` to `parent`, or detach it with `None`.
    ///
    /// A parented body's world pose is derived from its parent's pose and its
    /// own local pose: `position = frame(parent.rotation) · local_position +
    /// parent.position`, `rotation = local_rotation * parent.rotation`. The pose
    /// is derived immediately and again on every [`sync_parented`](Self::sync_parented).
    ///
    /// Returns `false` for unknown ids, self-parenting and cycles.
    pub fn set_parent(&mut self, child: BodyId, parent: Option<BodyId>) -> bool {
        let Some(child_index) = self.index_of(child) else {
            return false;
        };

        let Some(parent) = parent else {
            self.slots[child_index].body.set_parent_id(None);
            return true;
        };

        let Some(parent_index) = self.index_of(parent) else {
            log::warn!("cannot parent {:?} to unknown body {:?}", child, parent);
            return false;
        };
        if self.is_ancestor(child, parent) {
            log::warn!("parenting {:?} to {:?} would form a cycle", child, parent);
            return false;
        }

        let parent_body = &self.slots[parent_index].body;
        let (position, rotation) = (parent_body.position(), parent_body.rotation());
        let child_body = &mut self.slots[child_index].body;
        child_body.set_parent_id(Some(parent));
        child_body.follow(position, rotation);
        true
    }

    /// Whether `ancestor` is `id` itself or any body up its parent chain.
    fn is_ancestor(&self, ancestor: BodyId, mut id: BodyId) -> bool {
        for _ in 0..=self.slots.len() {
            if id == ancestor {
                return true;
            }
            match self.body(id).and_then(RigidBody::parent) {
                Some(parent) => id = parent,
                None => return false,
            }
        }
        true
    }

    /// Re-derive the world pose of every parented body, in insertion order.
    pub fn sync_parented(&mut self) {
        for i in 0..self.slots.len() {
            let Some(parent) = self.slots[i].body.parent() else {
                continue;
            };
            let Some(parent_index) = self.index_of(parent) else {
                continue;
            };
            let parent_body = &self.slots[parent_index].body;
            let (position, rotation) = (parent_body.position(), parent_body.rotation());
            self.slots[i].body.follow(position, rotation);
        }
    }

    // -- Simulation --

    /// Advance the world by `dt` seconds.
    ///
    /// For each body in insertion order: integrate it once with `dt`, then for
    /// every substep test it against every other body and resolve each contact.
    /// Deferred removals and spawns are applied last.
    pub fn update(&mut self, dt: f32) {
        let substeps = self.substeps();
        let gravity = self.config.gravity;
        log::trace!(
            "update dt={} substeps={} step_delta={} bodies={}",
            dt,
            substeps,
            dt / substeps as f32,
            self.slots.len()
        );

        self.sync_parented();

        for i in 0..self.slots.len() {
            self.slots[i].body.update(dt, gravity);

            for _ in 0..substeps {
                for j in 0..self.slots.len() {
                    if i == j {
                        continue;
                    }
                    let other_id = self.slots[j].id;
                    if let Some(data) = test_collision(&self.slots[i].body, &self.slots[j].body, other_id) {
                        self.resolve_contact(i, j, &data);
                    }
                }
            }
        }

        self.sync_parented();
        self.flush_commands();
    }

    /// Notify and resolve one contact reported for body `i` against body `j`.
    fn resolve_contact(&mut self, i: usize, j: usize, data: &CollisionData) {
        let (slot_i, slot_j) = pair_mut(&mut self.slots, i, j);
        let commands = &mut self.commands;
        log::trace!(
            "contact {:?} <- {:?} mtv={} overlapping={}",
            slot_i.id,
            slot_j.id,
            data.mtv,
            data.is_overlapping
        );

        if data.is_overlapping {
            slot_i.body.notify_collision(CollisionKind::Overlap, data, commands);
            let mirrored = data.with_other(slot_i.id);
            slot_j.body.notify_collision(CollisionKind::Overlap, &mirrored, commands);
        } else {
            slot_i.body.notify_collision(CollisionKind::Touch, data, commands);
        }

        if !slot_i.body.is_simulated() {
            return;
        }

        if data.is_overlapping {
            slot_i.body.bounce(data.position, data.normal, &slot_j.body);
            slot_j.body.bounce(data.position, -data.normal, &slot_i.body);
        } else {
            slot_i.body.mult_velocity(Vector3::repeat(1.0) - data.normal);
        }

        slot_i.body.move_by(data.normal * (data.mtv * 2.0));
    }

    /// Apply queued removals, then queued spawns.
    fn flush_commands(&mut self) {
        let removals = core::mem::take(&mut self.commands.removals);
        let spawns = core::mem::take(&mut self.commands.spawns);

        if !removals.is_empty() {
            let before = self.slots.len();
            self.slots.retain(|slot| !removals.contains(&slot.id));
            for slot in self.slots.iter_mut() {
                if slot.body.parent().is_some_and(|parent| removals.contains(&parent)) {
                    slot.body.set_parent_id(None);
                }
            }
            log::debug!("removed {} bodies", before - self.slots.len());
        }

        for (id, body) in spawns {
            if removals.contains(&id) {
                continue;
            }
            if self.slots.push(Slot { id, body }).is_err() {
                log::warn!("world is full, dropping spawned body {:?}", id);
            } else {
                log::debug!("spawned body {:?}", id);
            }
        }
    }
}

/// Borrow two distinct elements mutably.
fn pair_mut<T>(items: &mut [T], i: usize, j: usize) -> (&mut T, &mut T) {
    debug_assert_ne!(i, j);
    if i < j {
        let (head, tail) = items.split_at_mut(j);
        (&mut head[i], &mut tail[0])
    } else {
        let (head, tail) = items.split_at_mut(i);
        (&mut tail[0], &mut head[j])
    }
}
