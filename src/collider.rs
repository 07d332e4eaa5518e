//! Collision shapes and narrow-phase tests.
//!
//! Shapes form a closed set ([`Collider`]). [`test_collision`] selects the
//! routine for a pair of shapes; adding a shape means adding a variant and
//! the matching arms.
//!
//! Box pairs use the Separating Axis Theorem over 15 candidate axes: the three
//! axes of each box and the nine cross products between them.

use nalgebra::{UnitQuaternion, Vector3};

// ComplexField provides abs() for f32 in no_std via libm
#[allow(unused_imports)]
use nalgebra::ComplexField;

use crate::body::{BodyId, RigidBody};

/// Separations at or below this magnitude count as touching, not overlapping.
pub const OVERLAP_EPSILON: f32 = 0.0005;

/// Candidate axes with every component at or below this magnitude are skipped.
/// Guards the cross products of near-parallel axes.
pub const DEGENERATE_AXIS_EPSILON: f32 = 0.01;

/// A collision shape attached to a [`RigidBody`], centered on its position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Collider {
    /// An oriented box of full extents `size` along the body's right, up and
    /// backward axes.
    Box { size: Vector3<f32> },
}

/// Which collision notification a listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollisionKind {
    /// The bodies interpenetrate by more than [`OVERLAP_EPSILON`].
    Overlap,
    /// The bodies touch or graze.
    Touch,
}

/// Result of a narrow-phase test between a body and `other`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionData {
    /// Signed separation along the axis of least penetration.
    pub mtv: f32,
    /// Unit contact normal pointing from `other` toward the tested body.
    pub normal: Vector3<f32>,
    /// Estimated contact point: the tested box's corner selected by `normal`.
    pub position: Vector3<f32>,
    pub is_overlapping: bool,
    /// The body on the other side of the contact.
    pub other: BodyId,
}

impl CollisionData {
    /// Copy of this contact labelled with a different `other`.
    ///
    /// The normal is kept as is.
    pub fn with_other(mut self, other: BodyId) -> Self {
        self.other = other;
        self
    }

    pub fn kind(&self) -> CollisionKind {
        if self.is_overlapping {
            CollisionKind::Overlap
        } else {
            CollisionKind::Touch
        }
    }
}

/// Test `body` against `other` and describe the contact, labelled with
/// `other_id`.
///
/// Returns `None` when either body has collisions disabled or has no collider,
/// or when a separating axis exists. A result with `is_overlapping == false`
/// means the bodies touch within [`OVERLAP_EPSILON`].
pub fn test_collision(body: &RigidBody, other: &RigidBody, other_id: BodyId) -> Option<CollisionData> {
    if !body.can_collide() || !other.can_collide() {
        return None;
    }

    match (body.collider()?, other.collider()?) {
        (Collider::Box { size: tested }, Collider::Box { size: reference }) => collide_box_box(
            &OrientedBox::new(other, reference),
            &OrientedBox::new(body, tested),
            other_id,
        ),
    }
}

/// World-space description of a box collider.
#[derive(Debug, Clone, Copy)]
struct OrientedBox {
    center: Vector3<f32>,
    rotation: UnitQuaternion<f32>,
    right: Vector3<f32>,
    up: Vector3<f32>,
    forward: Vector3<f32>,
    half_extents: Vector3<f32>,
}

impl OrientedBox {
    fn new(body: &RigidBody, size: &Vector3<f32>) -> Self {
        Self {
            center: body.position(),
            rotation: body.rotation(),
            right: body.right(),
            up: body.up(),
            forward: body.forward(),
            half_extents: size * 0.5,
        }
    }

    /// Local axes scaled by the half extents.
    fn half_axes(&self) -> [Vector3<f32>; 3] {
        [
            self.right * self.half_extents.x,
            self.up * self.half_extents.y,
            self.forward * self.half_extents.z,
        ]
    }

    /// Corner chosen by the sign of each axis against `normal`.
    ///
    /// The comparators differ per axis (`<`, `>`, `>=`); reported contact
    /// points depend on that exact choice.
    fn contact_corner(&self, normal: &Vector3<f32>) -> Vector3<f32> {
        let mut vertex = self.half_extents;
        if self.right.dot(normal) < 0.0 {
            vertex.x = -vertex.x;
        }
        if self.up.dot(normal) > 0.0 {
            vertex.y = -vertex.y;
        }
        if self.forward.dot(normal) >= 0.0 {
            vertex.z = -vertex.z;
        }
        self.rotation.inverse_transform_vector(&vertex) + self.center
    }
}

/// SAT between two oriented boxes.
///
/// `reference` is the body the contact is reported against (`other`), `tested`
/// the body the normal points toward and whose corner gives the contact point.
fn collide_box_box(reference: &OrientedBox, tested: &OrientedBox, other: BodyId) -> Option<CollisionData> {
    let offset = tested.center - reference.center;

    let axes = [
        reference.right,
        reference.up,
        reference.forward,
        tested.right,
        tested.up,
        tested.forward,
        reference.right.cross(&tested.right),
        reference.right.cross(&tested.up),
        reference.right.cross(&tested.forward),
        reference.up.cross(&tested.right),
        reference.up.cross(&tested.up),
        reference.up.cross(&tested.forward),
        reference.forward.cross(&tested.right),
        reference.forward.cross(&tested.up),
        reference.forward.cross(&tested.forward),
    ];

    let mut data = CollisionData {
        mtv: f32::INFINITY,
        normal: Vector3::zeros(),
        position: Vector3::zeros(),
        is_overlapping: false,
        other,
    };

    for axis in &axes {
        if is_separating_axis(&offset, axis, reference, tested, &mut data) {
            return None;
        }
    }

    // Every axis degenerate: only possible with non-finite input.
    data.mtv.is_finite().then_some(data)
}

/// Project both boxes onto `axis`. Returns `true` if the projections are
/// disjoint; otherwise records the axis in `data` if it has the smallest
/// separation so far.
fn is_separating_axis(
    offset: &Vector3<f32>,
    axis: &Vector3<f32>,
    reference: &OrientedBox,
    tested: &OrientedBox,
    data: &mut CollisionData,
) -> bool {
    if axis.x.abs() <= DEGENERATE_AXIS_EPSILON
        && axis.y.abs() <= DEGENERATE_AXIS_EPSILON
        && axis.z.abs() <= DEGENERATE_AXIS_EPSILON
    {
        return false;
    }

    let projection = reference
        .half_axes()
        .iter()
        .chain(tested.half_axes().iter())
        .fold(0.0, |sum, half_axis| sum + half_axis.dot(axis).abs());
    let along = offset.dot(axis);
    let distance = along.abs();

    let separation = projection - distance;
    if separation.abs() < data.mtv.abs() {
        data.mtv = separation;
        let oriented = if along < 0.0 { -axis } else { *axis };
        data.normal = if oriented.norm() != 0.0 {
            oriented.normalize()
        } else {
            Vector3::zeros()
        };
        data.position = tested.contact_corner(&data.normal);
        data.is_overlapping = separation.abs() > OVERLAP_EPSILON;
    }

    distance > projection
}
