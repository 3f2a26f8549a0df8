//! Reference rigid-body engine consumed by the handle layer.
//!
//! The binding layer in [`crate::core`] treats this module as an opaque
//! collaborator: it owns authoritative body and joint state, advances it in
//! [`Space::step`], and removes bodies that leave the kill bounds without
//! telling anyone. Collision detection and response are not implemented.

pub mod body;
pub mod joint;
pub mod shape;
pub mod space;

pub use body::{BodyKind, Material, RigidBody};
pub use joint::{Constraint, ConstraintKind, DistanceJoint};
pub use shape::Shape;
pub use space::{BodyKey, GridConfig, JointKey, Space};

/// Version string of the engine implementation.
pub const ENGINE_VERSION: &str = "0.1.0";
