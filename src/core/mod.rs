//! Handle lifecycle and state synchronization over the engine.
//!
//! Handles ([`Body`], [`DistanceJoint`]) never own engine state once
//! registered; they hold a generational key plus a weak link to the
//! [`World`]'s space. [`World::step`] refreshes every registered handle and
//! retires the ones whose engine body disappeared.

mod checks;

pub mod body;
pub mod constraint;
pub mod event;
pub mod shape;
pub mod world;

pub use body::Body;
pub use constraint::{ConstraintSnapshot, DistanceJoint};
pub use event::WorldEvent;
pub use shape::{ShapeDescriptor, ShapeTag, MIN_POLYGON_VERTICES};
pub use world::{StepStats, World, WorldConfig};

pub use crate::engine::{BodyKind, ConstraintKind, GridConfig, Material};
pub use crate::math::{Aabb, Vector};
