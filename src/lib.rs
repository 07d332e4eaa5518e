#![no_std]
//! A small real-time rigid-body engine.
//!
//! Bodies are integrated with a Verlet position step and a trapezoidal
//! velocity step, boxes are tested against each other with the separating axis
//! theorem, and overlaps are resolved by a bounce force plus a positional
//! correction repeated over a few substeps per frame.
//!
//! ```
//! use physixx::{CollisionKind, PhysicsWorld, RigidBody};
//! use nalgebra::Vector3;
//!
//! let mut world = PhysicsWorld::<16>::new();
//! world
//!     .add_body(RigidBody::new_box(100.0, Vector3::new(10.0, 1.0, 10.0)).with_simulated(false))
//!     .unwrap();
//! // sinks 0.1 into the floor
//! let cube = world
//!     .add_box(1.0, Vector3::new(1.0, 1.0, 1.0), Vector3::new(0.0, 0.9, 0.0))
//!     .unwrap();
//!
//! world
//!     .body_mut(cube)
//!     .unwrap()
//!     .subscribe_collision(CollisionKind::Overlap, |data, _| {
//!         assert!(data.is_overlapping);
//!     });
//!
//! world.update(1.0 / 60.0);
//! let cube = world.body(cube).unwrap();
//! assert!(cube.position().y > 1.0);
//! assert_eq!(cube.velocity().y, 0.0);
//! ```

extern crate alloc;

pub mod body;
pub mod collider;
pub mod events;
pub mod world;

pub use body::{
    BodyId, CollisionListener, PositionListener, RigidBody, RotationListener, AIR_DENSITY,
    ANGULAR_DECAY_RATE, ANGULAR_VELOCITY_THRESHOLD, BOUNCE_STRENGTH_SCALE, BOUNCE_TORQUE_ANGLE,
    FORCE_TORQUE_ANGLE, FORCE_TORQUE_THRESHOLD_SQ, IMPULSE_TORQUE_SCALE, SPEED_SQ_THRESHOLD,
};
pub use collider::{
    test_collision, Collider, CollisionData, CollisionKind, DEGENERATE_AXIS_EPSILON, OVERLAP_EPSILON,
};
pub use events::{ListenerToken, Observers};
pub use world::{PhysicsWorld, WorldCommands, WorldConfig, DEFAULT_SUBSTEPS};
