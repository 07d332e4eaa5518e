//! Rigid body state and integration.
//!
//! A [`RigidBody`] carries the kinematic and dynamic state of one simulated
//! object. Position is advanced with a Verlet step paired with a trapezoidal
//! velocity update, orientation with a small-angle Euler step, and a quadratic
//! drag term is recomputed from the velocity at the end of every frame.
//!
//! The integration constants below are part of the observable behaviour: the
//! same inputs always produce the same trajectory.
//!
//! # Forces persist for one step
//! [`RigidBody::update`] consumes the force accumulator and then *replaces* it
//! with the drag force (or zero). A force added once with
//! [`RigidBody::add_force`] therefore acts for exactly one integration step;
//! a continuous force such as a thruster must be re-applied every frame.

use nalgebra::{Quaternion, UnitQuaternion, Vector3};

// ComplexField provides sin()/cos()/abs() for f32 in no_std via libm
#[allow(unused_imports)]
use nalgebra::ComplexField;

use crate::collider::{test_collision, Collider, CollisionData, CollisionKind};
use crate::events::{ListenerToken, Observers};
use crate::world::WorldCommands;

/// Air density used by the drag model (kg/m³).
pub const AIR_DENSITY: f32 = 1.1455;
/// Fraction of angular velocity removed per second: `ω -= ω * dt * rate`.
pub const ANGULAR_DECAY_RATE: f32 = 10.0;
/// Angular speed below which no rotation step is applied.
pub const ANGULAR_VELOCITY_THRESHOLD: f32 = 1e-4;
/// Squared speed below which drag is skipped and the force is cleared.
pub const SPEED_SQ_THRESHOLD: f32 = 1e-6;
/// [`RigidBody::add_force_at`] only adds torque above this squared lever magnitude.
pub const FORCE_TORQUE_THRESHOLD_SQ: f32 = 0.05;
/// Angle passed to [`RigidBody::add_torque`] by [`RigidBody::add_force_at`].
pub const FORCE_TORQUE_ANGLE: f32 = 0.03;
/// Scale of the lever arm impulse in [`RigidBody::add_impulse_at`].
pub const IMPULSE_TORQUE_SCALE: f32 = 0.05;
/// Multiplier of the bounce force strength.
pub const BOUNCE_STRENGTH_SCALE: f32 = 80.0;
/// Angle passed to [`RigidBody::add_torque`] by [`RigidBody::bounce`].
pub const BOUNCE_TORQUE_ANGLE: f32 = 0.05;

const DEFAULT_DRAG_COEFFICIENT: f32 = 10.0;
const DEFAULT_BOUNCINESS: f32 = 1.0;

/// Unique identifier for a rigid body within a [`PhysicsWorld`](crate::PhysicsWorld).
///
/// Identifiers are never reused, so a stale id simply stops resolving once its
/// body has been removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub(crate) usize);

/// Listener for world-position changes.
pub type PositionListener = dyn FnMut(&Vector3<f32>);
/// Listener for world-rotation changes.
pub type RotationListener = dyn FnMut(&UnitQuaternion<f32>);
/// Listener for collision notifications. The [`WorldCommands`] argument allows
/// removing or spawning bodies; both take effect when the current update ends.
pub type CollisionListener = dyn FnMut(&CollisionData, &mut WorldCommands);

/// A rigid body with linear and angular dynamics.
#[derive(Debug)]
pub struct RigidBody {
    // -- Pose --
    position: Vector3<f32>,
    rotation: UnitQuaternion<f32>,
    local_position: Vector3<f32>,
    local_rotation: UnitQuaternion<f32>,
    forward: Vector3<f32>,
    right: Vector3<f32>,
    up: Vector3<f32>,
    parent: Option<BodyId>,

    // -- Motion --
    velocity: Vector3<f32>,
    angular_velocity: Vector3<f32>,
    acceleration: Vector3<f32>,
    force: Vector3<f32>,
    torque: Vector3<f32>,

    // -- Physical properties --
    mass: f32,
    /// Diagonal rotational inertia.
    inertia: Vector3<f32>,
    bounciness: f32,
    drag_coefficient: f32,
    /// Cross-sectional area facing each local axis.
    frontal_area: Vector3<f32>,
    collider: Option<Collider>,

    // -- Flags --
    has_gravity: bool,
    can_collide: bool,
    is_simulated: bool,
    can_rotate: bool,

    on_position: Observers<PositionListener>,
    on_rotation: Observers<RotationListener>,
    on_overlap: Observers<CollisionListener>,
    on_touch: Observers<CollisionListener>,
}

impl RigidBody {
    /// Create a body with the given mass and diagonal inertia and no collider.
    ///
    /// # Panics
    /// Panics if `mass` or any inertia component is not positive and finite.
    pub fn new(mass: f32, inertia: Vector3<f32>) -> Self {
        assert!(mass > 0.0 && mass.is_finite(), "mass must be positive and finite");
        assert!(
            inertia.iter().all(|i| *i > 0.0 && i.is_finite()),
            "inertia components must be positive and finite"
        );
        Self::with_mass_properties(mass, inertia)
    }

    /// Create a box body of full extents `size`.
    ///
    /// Inertia is that of a solid box,
    /// `(m/12·(y²+z²), m/12·(x²+z²), m/12·(x²+y²))`, and the frontal area is
    /// the face area across each axis, `(y·z, x·z, x·y)`.
    ///
    /// # Panics
    /// Panics if `mass` is not positive and finite.
    pub fn new_box(mass: f32, size: Vector3<f32>) -> Self {
        assert!(mass > 0.0 && mass.is_finite(), "mass must be positive and finite");
        let k = 1.0 / 12.0 * mass;
        let inertia = Vector3::new(
            k * (size.y * size.y + size.z * size.z),
            k * (size.x * size.x + size.z * size.z),
            k * (size.y * size.y + size.x * size.x),
        );
        let mut body = Self::with_mass_properties(mass, inertia);
        body.frontal_area = Vector3::new(size.y * size.z, size.x * size.z, size.x * size.y);
        body.collider = Some(Collider::Box { size });
        body
    }

    fn with_mass_properties(mass: f32, inertia: Vector3<f32>) -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            local_position: Vector3::zeros(),
            local_rotation: UnitQuaternion::identity(),
            forward: Vector3::new(0.0, 0.0, -1.0),
            right: Vector3::new(1.0, 0.0, 0.0),
            up: Vector3::new(0.0, 1.0, 0.0),
            parent: None,
            velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            acceleration: Vector3::zeros(),
            force: Vector3::zeros(),
            torque: Vector3::zeros(),
            mass,
            inertia,
            bounciness: DEFAULT_BOUNCINESS,
            drag_coefficient: DEFAULT_DRAG_COEFFICIENT,
            frontal_area: Vector3::zeros(),
            collider: None,
            has_gravity: true,
            can_collide: true,
            is_simulated: true,
            can_rotate: true,
            on_position: Observers::new(),
            on_rotation: Observers::new(),
            on_overlap: Observers::new(),
            on_touch: Observers::new(),
        }
    }

    /// Builder: set initial world position.
    pub fn with_position(mut self, position: Vector3<f32>) -> Self {
        self.position = position;
        self
    }

    /// Builder: set initial world rotation.
    pub fn with_rotation(mut self, rotation: UnitQuaternion<f32>) -> Self {
        self.set_rotation(rotation);
        self
    }

    /// Builder: set initial velocity.
    pub fn with_velocity(mut self, velocity: Vector3<f32>) -> Self {
        self.velocity = velocity;
        self
    }

    /// Builder: enable or disable gravity.
    pub fn with_gravity(mut self, has_gravity: bool) -> Self {
        self.has_gravity = has_gravity;
        self
    }

    /// Builder: enable or disable collision tests.
    pub fn with_colliding(mut self, can_collide: bool) -> Self {
        self.can_collide = can_collide;
        self
    }

    /// Builder: a body that is not simulated does not integrate or bounce, but
    /// still acts as a collision target.
    pub fn with_simulated(mut self, is_simulated: bool) -> Self {
        self.is_simulated = is_simulated;
        self
    }

    /// Builder: enable or disable torque accumulation.
    pub fn with_can_rotate(mut self, can_rotate: bool) -> Self {
        self.can_rotate = can_rotate;
        self
    }

    /// Builder: set the bounce strength multiplier.
    pub fn with_bounciness(mut self, bounciness: f32) -> Self {
        self.bounciness = bounciness;
        self
    }

    /// Builder: set the drag coefficient.
    pub fn with_drag_coefficient(mut self, drag_coefficient: f32) -> Self {
        self.drag_coefficient = drag_coefficient;
        self
    }

    /// Builder: set the per-axis frontal area used by drag.
    pub fn with_frontal_area(mut self, area: Vector3<f32>) -> Self {
        self.frontal_area = area;
        self
    }

    // -- Forces --

    /// Accumulate `direction * strength`. The direction is not normalized.
    #[inline]
    pub fn add_force(&mut self, direction: Vector3<f32>, strength: f32) {
        self.force += direction * strength;
    }

    /// Accumulate `axis * -angle` into the torque. No-op when rotation is disabled.
    #[inline]
    pub fn add_torque(&mut self, axis: Vector3<f32>, angle: f32) {
        if self.can_rotate {
            self.torque += axis * -angle;
        }
    }

    /// Apply a force at a world-space point.
    ///
    /// The torque contribution uses a fixed angle of [`FORCE_TORQUE_ANGLE`] and
    /// is skipped when the squared lever cross product does not exceed
    /// [`FORCE_TORQUE_THRESHOLD_SQ`].
    pub fn add_force_at(&mut self, point: Vector3<f32>, direction: Vector3<f32>, strength: f32) {
        self.add_force(direction, strength);
        let lever = point - self.position;
        let axis = lever.cross(&(direction * strength));
        if axis.norm_squared() > FORCE_TORQUE_THRESHOLD_SQ {
            self.add_torque(axis, FORCE_TORQUE_ANGLE);
        }
    }

    /// Apply an instantaneous impulse at a world-space point.
    pub fn add_impulse_at(&mut self, point: Vector3<f32>, direction: Vector3<f32>) {
        self.velocity += direction / self.mass;
        let lever = point - self.position;
        self.angular_velocity += lever
            .cross(&(direction * IMPULSE_TORQUE_SCALE))
            .component_div(&self.inertia);
    }

    /// Overwrite the velocity.
    #[inline]
    pub fn set_velocity(&mut self, velocity: Vector3<f32>) {
        self.velocity = velocity;
    }

    /// Scale the velocity component-wise.
    #[inline]
    pub fn mult_velocity(&mut self, mult: Vector3<f32>) {
        self.velocity.component_mul_assign(&mult);
    }

    /// Advance this body by `dt` seconds.
    ///
    /// Bodies that are not simulated only discard their accumulated force and
    /// torque.
    pub fn update(&mut self, dt: f32, gravity: Vector3<f32>) {
        if !self.is_simulated {
            self.force = Vector3::zeros();
            self.torque = Vector3::zeros();
            return;
        }

        // --- Linear: Verlet position, trapezoidal velocity ---
        let dt_sq = dt * dt;
        self.position = self.position + self.velocity * dt + self.acceleration * (dt_sq * 0.5);
        let gravity_scale = if self.has_gravity { 1.0 } else { 0.0 };
        let acceleration = self.force / self.mass + gravity * gravity_scale;
        self.velocity = self.velocity + (acceleration + self.acceleration) * (dt * 0.5);
        self.acceleration = acceleration;

        if self.velocity.norm() > 0.0 {
            self.notify_position();
        }

        // --- Angular: Euler ---
        self.angular_velocity += self.torque.component_div(&self.inertia);

        if self.angular_velocity.norm() > ANGULAR_VELOCITY_THRESHOLD {
            let step = self.rotation * self.angular_velocity * dt * dt;
            let length = step.norm();
            if length > 0.0 {
                let half = length * 0.5;
                let (sin, cos) = (half.sin(), half.cos());
                let offset = Quaternion::new(length * cos, step.x * sin, step.y * sin, step.z * sin);
                self.rotate_by(offset);
            }
        }

        self.angular_velocity -= self.angular_velocity * (dt * ANGULAR_DECAY_RATE);
        self.torque = Vector3::zeros();

        // --- Drag replaces the consumed force ---
        let speed_sq = self.velocity.norm_squared();
        if speed_sq > SPEED_SQ_THRESHOLD {
            let world_area = (self.rotation * self.frontal_area).map(|a| a.abs());
            let drag = world_area * (0.5 * AIR_DENSITY * speed_sq * self.drag_coefficient);
            self.force = (drag * (dt * 2.0)).component_mul(&-self.velocity.normalize());
        } else {
            self.force = Vector3::zeros();
        }
    }

    /// Respond to an overlapping contact.
    ///
    /// Pushes along `normal` with a strength proportional to the combined mass
    /// and current speed, adds a matching torque around the contact point, then
    /// zeroes velocity and angular velocity on every axis where `normal` is 1.
    /// No-op for bodies that are not simulated.
    pub fn bounce(&mut self, contact_point: Vector3<f32>, normal: Vector3<f32>, other: &RigidBody) {
        if !self.is_simulated {
            return;
        }
        let speed = self.velocity.norm();
        let lever = contact_point - self.position;

        let strength = (self.mass + other.mass) * speed * BOUNCE_STRENGTH_SCALE * self.bounciness;
        self.add_force(normal, strength);
        self.add_torque(lever.cross(&(normal * strength)), BOUNCE_TORQUE_ANGLE);

        let keep = Vector3::repeat(1.0) - normal;
        self.velocity.component_mul_assign(&keep);
        self.angular_velocity.component_mul_assign(&keep);
    }

    /// Test this body against `other`, labelling the result with `other_id`.
    ///
    /// See [`test_collision`].
    pub fn check_collision(&self, other: &RigidBody, other_id: BodyId) -> Option<CollisionData> {
        test_collision(self, other, other_id)
    }

    // -- Pose --

    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.position = position;
        self.notify_position();
    }

    /// Translate by `offset` in world space.
    pub fn move_by(&mut self, offset: Vector3<f32>) {
        self.position += offset;
        self.notify_position();
    }

    pub fn local_position(&self) -> Vector3<f32> {
        self.local_position
    }

    pub fn set_local_position(&mut self, position: Vector3<f32>) {
        self.local_position = position;
    }

    pub fn move_local(&mut self, offset: Vector3<f32>) {
        self.local_position += offset;
    }

    pub fn rotation(&self) -> UnitQuaternion<f32> {
        self.rotation
    }

    /// Set the world rotation. The quaternion is renormalized.
    pub fn set_rotation(&mut self, rotation: UnitQuaternion<f32>) {
        self.rotation = UnitQuaternion::new_normalize(rotation.into_inner());
        self.update_axes();
        self.notify_rotation();
    }

    /// Compose `offset` before the current rotation: `rotation = offset * rotation`.
    pub fn rotate(&mut self, offset: UnitQuaternion<f32>) {
        self.rotate_by(offset.into_inner());
    }

    fn rotate_by(&mut self, offset: Quaternion<f32>) {
        self.rotation = UnitQuaternion::new_normalize(offset * self.rotation.into_inner());
        self.update_axes();
        self.notify_rotation();
    }

    pub fn local_rotation(&self) -> UnitQuaternion<f32> {
        self.local_rotation
    }

    pub fn set_local_rotation(&mut self, rotation: UnitQuaternion<f32>) {
        self.local_rotation = UnitQuaternion::new_normalize(rotation.into_inner());
    }

    pub fn rotate_local(&mut self, offset: UnitQuaternion<f32>) {
        self.local_rotation = offset * self.local_rotation;
    }

    /// Unit forward axis, `-z` of the body frame.
    pub fn forward(&self) -> Vector3<f32> {
        self.forward
    }

    pub fn right(&self) -> Vector3<f32> {
        self.right
    }

    pub fn up(&self) -> Vector3<f32> {
        self.up
    }

    /// Map a body-frame vector into world space.
    ///
    /// This is the transform used for the derived axes, box corners and
    /// parent offsets. It applies the inverse of `rotation`, so it is *not* the
    /// same as `rotation * v`.
    #[inline]
    pub fn frame_transform(&self, v: &Vector3<f32>) -> Vector3<f32> {
        self.rotation.inverse_transform_vector(v)
    }

    fn update_axes(&mut self) {
        self.right = self.frame_transform(&Vector3::x()).normalize();
        self.up = self.frame_transform(&Vector3::y()).normalize();
        self.forward = -self.frame_transform(&Vector3::z()).normalize();
    }

    pub fn parent(&self) -> Option<BodyId> {
        self.parent
    }

    pub(crate) fn set_parent_id(&mut self, parent: Option<BodyId>) {
        self.parent = parent;
    }

    /// Derive the world pose from a parent pose and this body's local pose.
    /// Notifications fire only for values that changed.
    pub(crate) fn follow(&mut self, parent_position: Vector3<f32>, parent_rotation: UnitQuaternion<f32>) {
        let position = parent_rotation.inverse_transform_vector(&self.local_position) + parent_position;
        if position != self.position {
            self.set_position(position);
        }
        let rotation = UnitQuaternion::new_normalize((self.local_rotation * parent_rotation).into_inner());
        if rotation != self.rotation {
            self.rotation = rotation;
            self.update_axes();
            self.notify_rotation();
        }
    }

    // -- Properties --

    pub fn velocity(&self) -> Vector3<f32> {
        self.velocity
    }

    pub fn angular_velocity(&self) -> Vector3<f32> {
        self.angular_velocity
    }

    /// Acceleration computed by the last integration step.
    pub fn acceleration(&self) -> Vector3<f32> {
        self.acceleration
    }

    /// Force that the next [`update`](Self::update) will consume.
    pub fn force(&self) -> Vector3<f32> {
        self.force
    }

    pub fn torque(&self) -> Vector3<f32> {
        self.torque
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn inertia(&self) -> Vector3<f32> {
        self.inertia
    }

    pub fn bounciness(&self) -> f32 {
        self.bounciness
    }

    pub fn set_bounciness(&mut self, bounciness: f32) {
        self.bounciness = bounciness;
    }

    pub fn drag_coefficient(&self) -> f32 {
        self.drag_coefficient
    }

    pub fn set_drag_coefficient(&mut self, drag_coefficient: f32) {
        self.drag_coefficient = drag_coefficient;
    }

    pub fn frontal_area(&self) -> Vector3<f32> {
        self.frontal_area
    }

    pub fn set_frontal_area(&mut self, area: Vector3<f32>) {
        self.frontal_area = area;
    }

    pub fn collider(&self) -> Option<&Collider> {
        self.collider.as_ref()
    }

    /// Full extents of the box collider, if any.
    pub fn size(&self) -> Option<Vector3<f32>> {
        match self.collider {
            Some(Collider::Box { size }) => Some(size),
            None => None,
        }
    }

    pub fn has_gravity(&self) -> bool {
        self.has_gravity
    }

    pub fn set_has_gravity(&mut self, value: bool) {
        self.has_gravity = value;
    }

    pub fn can_collide(&self) -> bool {
        self.can_collide
    }

    pub fn set_colliding(&mut self, value: bool) {
        self.can_collide = value;
    }

    pub fn is_simulated(&self) -> bool {
        self.is_simulated
    }

    pub fn set_simulated(&mut self, value: bool) {
        self.is_simulated = value;
    }

    pub fn can_rotate(&self) -> bool {
        self.can_rotate
    }

    pub fn set_can_rotate(&mut self, value: bool) {
        self.can_rotate = value;
    }

    // -- Notifications --

    /// Subscribe to world-position changes. The listener receives the new position.
    pub fn subscribe_position(&mut self, listener: impl FnMut(&Vector3<f32>) + 'static) -> ListenerToken {
        self.on_position.subscribe(listener)
    }

    pub fn unsubscribe_position(&mut self, token: ListenerToken) -> bool {
        self.on_position.unsubscribe(token)
    }

    /// Subscribe to world-rotation changes. The listener receives the new rotation.
    pub fn subscribe_rotation(
        &mut self,
        listener: impl FnMut(&UnitQuaternion<f32>) + 'static,
    ) -> ListenerToken {
        self.on_rotation.subscribe(listener)
    }

    pub fn unsubscribe_rotation(&mut self, token: ListenerToken) -> bool {
        self.on_rotation.unsubscribe(token)
    }

    /// Subscribe to collisions of the given kind.
    pub fn subscribe_collision(
        &mut self,
        kind: CollisionKind,
        listener: impl FnMut(&CollisionData, &mut WorldCommands) + 'static,
    ) -> ListenerToken {
        self.collision_observers(kind).subscribe(listener)
    }

    pub fn unsubscribe_collision(&mut self, kind: CollisionKind, token: ListenerToken) -> bool {
        self.collision_observers(kind).unsubscribe(token)
    }

    pub(crate) fn notify_collision(
        &mut self,
        kind: CollisionKind,
        data: &CollisionData,
        commands: &mut WorldCommands,
    ) {
        self.collision_observers(kind).emit(data, commands);
    }

    fn collision_observers(&mut self, kind: CollisionKind) -> &mut Observers<CollisionListener> {
        match kind {
            CollisionKind::Overlap => &mut self.on_overlap,
            CollisionKind::Touch => &mut self.on_touch,
        }
    }

    fn notify_position(&mut self) {
        let position = self.position;
        self.on_position.emit(&position);
    }

    fn notify_rotation(&mut self) {
        let rotation = self.rotation;
        self.on_rotation.emit(&rotation);
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::RefCell;
    use core::f32::consts::FRAC_PI_2;

    const EPSILON: f32 = 1e-4;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn approx_vec_eq(a: &Vector3<f32>, b: &Vector3<f32>) -> bool {
        approx_eq(a.x, b.x) && approx_eq(a.y, b.y) && approx_eq(a.z, b.z)
    }

    fn approx_rot_eq(a: &UnitQuaternion<f32>, b: &UnitQuaternion<f32>) -> bool {
        // q and -q are the same rotation
        (a.coords - b.coords).norm() < 1e-5 || (a.coords + b.coords).norm() < 1e-5
    }

    fn unit_body() -> RigidBody {
        RigidBody::new(1.0, Vector3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn test_body_defaults() {
        let body = RigidBody::new(5.0, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(body.mass(), 5.0);
        assert!(body.has_gravity());
        assert!(body.can_collide());
        assert!(body.is_simulated());
        assert!(body.can_rotate());
        assert_eq!(body.drag_coefficient(), 10.0);
        assert_eq!(body.bounciness(), 1.0);
        assert!(body.collider().is_none());
        assert!(approx_vec_eq(&body.forward(), &Vector3::new(0.0, 0.0, -1.0)));
        assert!(approx_vec_eq(&body.right(), &Vector3::new(1.0, 0.0, 0.0)));
        assert!(approx_vec_eq(&body.up(), &Vector3::new(0.0, 1.0, 0.0)));
    }

    #[test]
    #[should_panic]
    fn test_body_zero_mass_panics() {
        RigidBody::new(0.0, Vector3::new(1.0, 1.0, 1.0));
    }

    #[test]
    #[should_panic]
    fn test_box_negative_mass_panics() {
        RigidBody::new_box(-1.0, Vector3::new(1.0, 1.0, 1.0));
    }

    #[test]
    #[should_panic]
    fn test_body_zero_inertia_panics() {
        RigidBody::new(1.0, Vector3::new(1.0, 0.0, 1.0));
    }

    #[test]
    fn test_box_mass_properties() {
        let body = RigidBody::new_box(12.0, Vector3::new(1.0, 2.0, 3.0));
        // I = m/12 * (..)
        assert!(approx_vec_eq(&body.inertia(), &Vector3::new(13.0, 10.0, 5.0)));
        assert!(approx_vec_eq(&body.frontal_area(), &Vector3::new(6.0, 3.0, 2.0)));
        assert_eq!(body.size(), Some(Vector3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn test_builder_pattern() {
        let body = unit_body()
            .with_position(Vector3::new(1.0, 2.0, 3.0))
            .with_velocity(Vector3::new(0.0, 5.0, 0.0))
            .with_bounciness(0.5)
            .with_drag_coefficient(2.0)
            .with_gravity(false)
            .with_simulated(false);

        assert!(approx_vec_eq(&body.position(), &Vector3::new(1.0, 2.0, 3.0)));
        assert!(approx_vec_eq(&body.velocity(), &Vector3::new(0.0, 5.0, 0.0)));
        assert_eq!(body.bounciness(), 0.5);
        assert_eq!(body.drag_coefficient(), 2.0);
        assert!(!body.has_gravity());
        assert!(!body.is_simulated());
    }

    #[test]
    fn test_add_force_is_not_normalized() {
        let mut body = unit_body();
        body.add_force(Vector3::new(3.0, 4.0, 0.0), 2.0);
        body.add_force(Vector3::new(0.0, 0.0, 1.0), 1.0);
        assert!(approx_vec_eq(&body.force(), &Vector3::new(6.0, 8.0, 1.0)));
    }

    #[test]
    fn test_add_torque_negates_angle() {
        let mut body = unit_body();
        body.add_torque(Vector3::new(0.0, 1.0, 0.0), 2.0);
        assert!(approx_vec_eq(&body.torque(), &Vector3::new(0.0, -2.0, 0.0)));
    }

    #[test]
    fn test_add_torque_ignored_when_rotation_disabled() {
        let mut body = unit_body().with_can_rotate(false);
        body.add_torque(Vector3::new(0.0, 1.0, 0.0), 2.0);
        assert!(approx_vec_eq(&body.torque(), &Vector3::zeros()));
    }

    #[test]
    fn test_add_force_at_small_lever_adds_no_torque() {
        let mut body = unit_body();
        // |(0.1,0,0) x (0,1,0)|² = 0.01 < 0.05
        body.add_force_at(Vector3::new(0.1, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0), 1.0);
        assert!(approx_vec_eq(&body.force(), &Vector3::new(0.0, 1.0, 0.0)));
        assert!(approx_vec_eq(&body.torque(), &Vector3::zeros()));
    }

    #[test]
    fn test_add_force_at_large_lever_adds_scaled_torque() {
        let mut body = unit_body();
        // (1,0,0) x (0,2,0) = (0,0,2) -> torque = (0,0,2) * -0.03
        body.add_force_at(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0), 2.0);
        assert!(approx_vec_eq(&body.force(), &Vector3::new(0.0, 2.0, 0.0)));
        assert!(approx_vec_eq(&body.torque(), &Vector3::new(0.0, 0.0, -0.06)));
    }

    #[test]
    fn test_add_impulse_at() {
        let mut body = RigidBody::new(2.0, Vector3::new(1.0, 1.0, 0.5));
        body.add_impulse_at(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 4.0, 0.0));
        assert!(approx_vec_eq(&body.velocity(), &Vector3::new(0.0, 2.0, 0.0)));
        // (1,0,0) x (0,0.2,0) = (0,0,0.2), divided by inertia z = 0.5
        assert!(approx_vec_eq(&body.angular_velocity(), &Vector3::new(0.0, 0.0, 0.4)));
    }

    #[test]
    fn test_set_and_mult_velocity() {
        let mut body = unit_body();
        body.set_velocity(Vector3::new(1.0, 2.0, 3.0));
        body.mult_velocity(Vector3::new(0.0, 1.0, 2.0));
        assert!(approx_vec_eq(&body.velocity(), &Vector3::new(0.0, 2.0, 6.0)));
    }

    #[test]
    fn test_not_simulated_body_is_immobile() {
        let mut body = unit_body()
            .with_simulated(false)
            .with_position(Vector3::new(1.0, 1.0, 1.0));
        body.add_force(Vector3::new(10.0, 0.0, 0.0), 1.0);
        body.add_torque(Vector3::new(0.0, 1.0, 0.0), 1.0);

        body.update(0.1, Vector3::new(0.0, -9.81, 0.0));

        assert!(approx_vec_eq(&body.position(), &Vector3::new(1.0, 1.0, 1.0)));
        assert_eq!(body.rotation(), UnitQuaternion::identity());
        assert!(approx_vec_eq(&body.force(), &Vector3::zeros()));
        assert!(approx_vec_eq(&body.torque(), &Vector3::zeros()));
    }

    #[test]
    fn test_gravity_follows_verlet_trajectory() {
        let mut body = unit_body();
        let gravity = Vector3::new(0.0, -10.0, 0.0);
        let dt = 0.1;
        let frames = 10;

        for _ in 0..frames {
            body.update(dt, gravity);
        }

        // Starting from rest with zero stored acceleration:
        // y_n = g dt² n(n-1)/2, v_n = g dt (n - 1/2)
        let n = frames as f32;
        let expected_y = -10.0 * dt * dt * n * (n - 1.0) / 2.0;
        let expected_v = -10.0 * dt * (n - 0.5);
        assert!((body.position().y - expected_y).abs() < 1e-3);
        assert!((body.velocity().y - expected_v).abs() < 1e-3);
        assert!(approx_vec_eq(&body.acceleration(), &gravity));
    }

    #[test]
    fn test_gravity_disabled() {
        let mut body = unit_body().with_gravity(false);
        body.update(0.1, Vector3::new(0.0, -10.0, 0.0));
        body.update(0.1, Vector3::new(0.0, -10.0, 0.0));
        assert!(approx_vec_eq(&body.position(), &Vector3::zeros()));
        assert!(approx_vec_eq(&body.velocity(), &Vector3::zeros()));
    }

    #[test]
    fn test_force_acts_for_one_step() {
        let mut body = unit_body();
        body.add_force(Vector3::new(1.0, 0.0, 0.0), 10.0);
        body.update(0.1, Vector3::zeros());
        // a = 10, v = 0.5 * (10 + 0) * 0.1
        assert!(approx_eq(body.velocity().x, 0.5));
        // no frontal area, so no drag either
        assert!(approx_vec_eq(&body.force(), &Vector3::zeros()));

        body.update(0.1, Vector3::zeros());
        // a drops back to 0: v += 0.5 * (0 + 10) * 0.1
        assert!(approx_eq(body.velocity().x, 1.0));
        assert!(approx_vec_eq(&body.acceleration(), &Vector3::zeros()));
    }

    #[test]
    fn test_drag_replaces_force() {
        let mut body = RigidBody::new_box(1.0, Vector3::new(1.0, 1.0, 1.0))
            .with_gravity(false)
            .with_velocity(Vector3::new(1.0, 0.0, 0.0));
        body.update(0.1, Vector3::zeros());

        // drag = 0.5 * 1.1455 * 1 * 10 * area(1) ; force = 0.2 * drag * -x
        assert!(approx_vec_eq(&body.force(), &Vector3::new(-1.1455, 0.0, 0.0)));
    }

    #[test]
    fn test_slow_body_has_no_drag() {
        let mut body = RigidBody::new_box(1.0, Vector3::new(1.0, 1.0, 1.0))
            .with_gravity(false)
            .with_velocity(Vector3::new(1e-4, 0.0, 0.0));
        body.add_force(Vector3::new(0.0, 0.0, 1e-9), 1.0);
        body.update(0.01, Vector3::zeros());
        assert_eq!(body.force(), Vector3::zeros());
    }

    #[test]
    fn test_torque_rotates_and_decays() {
        let mut body = unit_body();
        body.add_torque(Vector3::new(0.0, 1.0, 0.0), -1.0);
        body.update(0.01, Vector3::zeros());

        // ω = torque / inertia = (0,1,0), then decays by dt * 10
        assert!(approx_vec_eq(&body.angular_velocity(), &Vector3::new(0.0, 0.9, 0.0)));
        assert!(body.rotation().angle() > 0.0);
        assert!(approx_eq(body.rotation().into_inner().norm(), 1.0));
        assert!(approx_vec_eq(&body.torque(), &Vector3::zeros()));
    }

    #[test]
    fn test_angular_step_uses_world_rotation() {
        let start = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.7);
        let mut body = unit_body().with_gravity(false).with_rotation(start);
        body.add_torque(Vector3::new(0.0, 0.0, 1.0), -2.0);
        let dt = 0.1;
        body.update(dt, Vector3::zeros());

        // ω = (0,0,2): turn by |ω|·dt² about rotation·ω̂, composed before the start pose
        let axis = nalgebra::Unit::new_normalize(start * Vector3::z());
        let expected = UnitQuaternion::from_axis_angle(&axis, 2.0 * dt * dt) * start;
        assert!(approx_rot_eq(&body.rotation(), &expected));
    }

    #[test]
    fn test_drag_area_follows_world_rotation() {
        // frontal area (6, 3, 2), turned 120° about z
        let turn = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 2.0 * core::f32::consts::FRAC_PI_3);
        let mut body = RigidBody::new_box(1.0, Vector3::new(1.0, 2.0, 3.0))
            .with_gravity(false)
            .with_rotation(turn)
            .with_velocity(Vector3::new(2.0, 0.0, 0.0));
        body.update(0.1, Vector3::zeros());

        // |6·cos120° - 3·sin120°| = 5.598076, drag scale 0.5 * 1.1455 * 4 * 10 * 0.2 = 4.582
        let expected = Vector3::new(-5.598076 * 4.582, 0.0, 0.0);
        assert!((body.force() - expected).norm() < 1e-3);
    }

    #[test]
    fn test_follow_renormalizes_rotation() {
        let mut body = unit_body();
        let scaled_parent = UnitQuaternion::new_unchecked(Quaternion::new(0.0, 0.0, 2.0, 0.0));
        body.follow(Vector3::zeros(), scaled_parent);

        assert!(approx_eq(body.rotation().into_inner().norm(), 1.0));
        let half_turn = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), core::f32::consts::PI);
        assert!(approx_rot_eq(&body.rotation(), &half_turn));
    }

    #[test]
    fn test_tiny_angular_velocity_does_not_rotate() {
        let mut body = unit_body();
        body.add_torque(Vector3::new(0.0, 1.0, 0.0), -1e-5);
        body.update(0.01, Vector3::zeros());
        assert_eq!(body.rotation(), UnitQuaternion::identity());
    }

    #[test]
    fn test_bounce_zeroes_velocity_along_normal() {
        let mut a = unit_body().with_velocity(Vector3::new(3.0, 1.0, 0.0));
        let mut b = unit_body().with_velocity(Vector3::new(-2.0, 0.0, 0.0));
        let normal = Vector3::new(1.0, 0.0, 0.0);
        let contact = Vector3::new(0.5, 0.0, 0.0);

        let speed = a.velocity().norm();
        a.bounce(contact, normal, &b);
        b.bounce(contact, -normal, &a);

        assert!(approx_eq(a.velocity().x, 0.0));
        assert!(approx_eq(a.velocity().y, 1.0));
        // mirrored side keeps 1 - (-1) = 2 along x
        assert!(approx_eq(b.velocity().x, -4.0));
        // strength = (1 + 1) * |v| * 80 * 1
        assert!(approx_eq(a.force().x, 2.0 * speed * 80.0));
        assert!(b.force().x < 0.0);
    }

    #[test]
    fn test_bounce_ignored_when_not_simulated() {
        let mut a = unit_body()
            .with_simulated(false)
            .with_velocity(Vector3::new(3.0, 0.0, 0.0));
        let b = unit_body();
        a.bounce(Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0), &b);
        assert!(approx_vec_eq(&a.velocity(), &Vector3::new(3.0, 0.0, 0.0)));
        assert!(approx_vec_eq(&a.force(), &Vector3::zeros()));
    }

    #[test]
    fn test_rotation_is_renormalized() {
        let mut body = unit_body();
        let scaled = UnitQuaternion::new_unchecked(Quaternion::new(2.0, 0.0, 0.0, 0.0));
        body.set_rotation(scaled);
        assert!(approx_eq(body.rotation().into_inner().norm(), 1.0));
        assert_eq!(body.rotation(), UnitQuaternion::identity());
    }

    #[test]
    fn test_axes_follow_frame_transform() {
        let body = unit_body().with_rotation(UnitQuaternion::from_axis_angle(&Vector3::y_axis(), FRAC_PI_2));
        assert!(approx_vec_eq(&body.right(), &Vector3::new(0.0, 0.0, 1.0)));
        assert!(approx_vec_eq(&body.up(), &Vector3::new(0.0, 1.0, 0.0)));
        assert!(approx_vec_eq(&body.forward(), &Vector3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_rotate_composes_before_current() {
        let mut body = unit_body();
        let about_x = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), FRAC_PI_2);
        let about_y = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), FRAC_PI_2);
        body.set_rotation(about_x);
        body.rotate(about_y);
        assert!(approx_rot_eq(&body.rotation(), &(about_y * about_x)));
    }

    #[test]
    fn test_local_pose_accessors() {
        let mut body = unit_body();
        body.set_local_position(Vector3::new(1.0, 0.0, 0.0));
        body.move_local(Vector3::new(0.0, 2.0, 0.0));
        assert!(approx_vec_eq(&body.local_position(), &Vector3::new(1.0, 2.0, 0.0)));

        let about_z = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.3);
        body.set_local_rotation(about_z);
        body.rotate_local(about_z);
        assert!(approx_eq(body.local_rotation().angle(), 0.6));
        // local pose never touches the world pose
        assert!(approx_vec_eq(&body.position(), &Vector3::zeros()));
    }

    #[test]
    fn test_position_listener_receives_new_value() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut body = unit_body();
        let sink = seen.clone();
        let token = body.subscribe_position(move |p| sink.borrow_mut().push(*p));

        body.set_position(Vector3::new(1.0, 0.0, 0.0));
        body.move_by(Vector3::new(0.0, 1.0, 0.0));
        assert!(body.unsubscribe_position(token));
        body.move_by(Vector3::new(0.0, 1.0, 0.0));

        assert_eq!(
            *seen.borrow(),
            [Vector3::new(1.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 0.0)]
        );
    }

    #[test]
    fn test_update_notifies_position_only_when_moving() {
        let count = Rc::new(RefCell::new(0));
        let mut body = unit_body().with_gravity(false);
        let sink = count.clone();
        body.subscribe_position(move |_| *sink.borrow_mut() += 1);

        body.update(0.1, Vector3::zeros());
        assert_eq!(*count.borrow(), 0);

        body.set_velocity(Vector3::new(1.0, 0.0, 0.0));
        body.update(0.1, Vector3::zeros());
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_rotation_listener_receives_new_value() {
        let seen = Rc::new(RefCell::new(None));
        let mut body = unit_body();
        let sink = seen.clone();
        body.subscribe_rotation(move |q| *sink.borrow_mut() = Some(*q));

        let about_z = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.5);
        body.set_rotation(about_z);
        let received = seen.borrow().expect("rotation listener was not called");
        assert!(approx_rot_eq(&received, &about_z));
    }
}
