//! rigidsim: identity-stable handles over a 2D rigid-body engine.
//!
//! - [`core`]: bodies, joints and the [`World`] that keeps handle caches in
//!   step with the engine.
//! - [`engine`]: the engine itself (arena storage, integration, joint solver,
//!   kill bounds).
//! - `python` feature: a Python extension module exposing the same surface.

pub mod core;
pub mod engine;
pub mod error;
pub mod math;

#[cfg(feature = "python")]
mod python;

pub use crate::core::{
    Body, BodyKind, ConstraintSnapshot, DistanceJoint, Material, ShapeDescriptor, ShapeTag,
    StepStats, World, WorldConfig, WorldEvent,
};
pub use crate::engine::{GridConfig, ENGINE_VERSION};
pub use crate::error::{Error, Result, ValidationError};
pub use crate::math::{Aabb, Vector};

/// Body-kind code of static bodies.
pub const STATIC: i64 = 0;
/// Body-kind code of dynamic bodies.
pub const DYNAMIC: i64 = 1;
/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_constants_match_codes() {
        assert_eq!(BodyKind::from_code(STATIC), Some(BodyKind::Static));
        assert_eq!(BodyKind::from_code(DYNAMIC), Some(BodyKind::Dynamic));
        assert_eq!(BodyKind::Dynamic.code(), DYNAMIC);
        assert!(!VERSION.is_empty());
    }
}
