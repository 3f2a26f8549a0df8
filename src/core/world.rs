//! The simulation world: engine space plus the registry of body handles.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use tracing::{debug, trace};

use crate::core::body::Body;
use crate::core::checks;
use crate::core::constraint::{ConstraintSnapshot, DistanceJoint};
use crate::core::event::WorldEvent;
use crate::engine::space::{DEFAULT_GRAVITY, DEFAULT_KILL_BOUNDS};
use crate::engine::{Constraint, GridConfig, Space};
use crate::error::{Error, Result};
use crate::math::{Aabb, Vector};

/// World-level configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldConfig {
    pub gravity: Vector,
    /// Bodies outside this box are removed by the engine at the end of a step.
    pub kill_bounds: Aabb,
    /// Spatial hash layout, forwarded to the engine as-is.
    pub grid: GridConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: DEFAULT_GRAVITY,
            kill_bounds: DEFAULT_KILL_BOUNDS,
            grid: GridConfig::default(),
        }
    }
}

impl WorldConfig {
    /// Finite gravity, well-formed boxes and positive grid cells.
    pub fn validate(&self) -> Result<()> {
        if !self.gravity.is_finite() {
            return Err(Error::InvalidValue("gravity must be finite".into()));
        }
        validate_bounds(&self.kill_bounds, "kill bounds")?;
        validate_grid(&self.grid)
    }
}

/// Timing and counts of the last completed step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepStats {
    pub dt: f64,
    pub substeps: u32,
    /// Registered bodies after reconciliation.
    pub bodies: usize,
    pub constraints: usize,
    /// Handles retired because the engine dropped their body.
    pub removed: usize,
    pub elapsed_ms: f64,
}

/// Owns the engine space and the handles registered with it.
///
/// The world holds the only strong reference to its space. Dropping the
/// world invalidates every handle; their operations then fail with
/// `NotRegistered`.
#[derive(Debug)]
pub struct World {
    space: Rc<RefCell<Space>>,
    registry: Vec<Body>,
    events: Vec<WorldEvent>,
    last_stats: Option<StepStats>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Empty world with [`WorldConfig::default`].
    pub fn new() -> Self {
        let space = Space::new();
        Self {
            space: Rc::new(RefCell::new(space)),
            registry: Vec::new(),
            events: Vec::new(),
            last_stats: None,
        }
    }

    /// Empty world with a validated configuration.
    ///
    /// Errors: `InvalidValue` when `config` fails [`WorldConfig::validate`].
    pub fn with_config(config: WorldConfig) -> Result<Self> {
        config.validate()?;
        let world = Self::new();
        {
            let mut space = world.space.borrow_mut();
            space.gravity = config.gravity;
            space.kill_bounds = config.kill_bounds;
            space.grid = config.grid;
        }
        Ok(world)
    }

    /// Current gravity, kill bounds and grid layout.
    pub fn config(&self) -> WorldConfig {
        let space = self.space.borrow();
        WorldConfig {
            gravity: space.gravity,
            kill_bounds: space.kill_bounds,
            grid: space.grid,
        }
    }

    // ============ Bodies ============

    /// Hand `body` to the engine and return its identity.
    ///
    /// Errors: `AlreadyRegistered` if the handle was ever added before,
    /// including to another world or after being removed.
    pub fn add(&mut self, body: &Body) -> Result<u16> {
        let id = body.register(&self.space)?;
        self.registry.push(body.clone());
        debug!(identity = id, "body added");
        Ok(id)
    }

    /// Remove `body` from the engine and the registry. The handle is retired.
    pub fn remove(&mut self, body: &Body) -> Result<()> {
        let key = body
            .key_in(&self.space)
            .ok_or(Error::NotRegistered("remove"))?;
        let idx = self
            .registry
            .iter()
            .position(|b| b == body)
            .ok_or(Error::NotRegistered("remove"))?;
        self.space.borrow_mut().remove_body(key);
        self.registry.remove(idx);
        body.retire();
        debug!(identity = ?body.identity(), "body removed");
        Ok(())
    }

    /// Registered bodies in engine iteration order.
    pub fn bodies(&self) -> &[Body] {
        &self.registry
    }

    /// Owned copy of [`World::bodies`].
    pub fn get_bodies(&self) -> Vec<Body> {
        self.registry.clone()
    }

    /// Number of registered bodies.
    pub fn body_count(&self) -> usize {
        self.registry.len()
    }

    /// Remove every body and constraint. Every registered handle is retired.
    pub fn clear(&mut self) {
        let n = self.registry.len();
        self.space.borrow_mut().clear();
        for body in self.registry.drain(..) {
            body.retire();
        }
        if n > 0 {
            debug!(bodies = n, "world cleared");
        }
    }

    // ============ Constraints ============

    /// Move an already-built joint into the engine.
    pub fn add_constraint(&mut self, joint: &DistanceJoint) -> Result<()> {
        joint.attach(&self.space)?;
        debug!(length = joint.length(), "constraint added");
        Ok(())
    }

    /// Take a live joint out of the engine. The handle stays inert afterwards.
    pub fn remove_constraint(&mut self, joint: &DistanceJoint) -> Result<()> {
        joint.detach(&self.space)?;
        debug!("constraint removed");
        Ok(())
    }

    /// World-space anchors of every live constraint.
    pub fn constraints(&self) -> Vec<ConstraintSnapshot> {
        let space = self.space.borrow();
        let snapshots = space
            .constraints()
            .filter_map(|(_, c)| match c {
                Constraint::Distance(j) => {
                    let a = space.body(j.a)?;
                    let b = space.body(j.b)?;
                    Some(ConstraintSnapshot {
                        kind: c.kind(),
                        anchor_a: j.anchor_a.rotate(a.angle) + a.position,
                        anchor_b: j.anchor_b.rotate(b.angle) + b.position,
                    })
                }
            })
            .collect();
        snapshots
    }

    /// Number of joints the engine currently holds.
    pub fn constraint_count(&self) -> usize {
        self.space.borrow().constraint_count()
    }

    // ============ Stepping ============

    /// Advance the simulation and reconcile every registered handle.
    ///
    /// Iteration counts are forwarded to the engine unchanged. After the
    /// engine step, each handle either has its cached pose refreshed from the
    /// engine or, if the engine dropped its body, is retired and reported as
    /// [`WorldEvent::BodyRemoved`].
    ///
    /// Errors: `InvalidValue` if `dt` is negative or not finite, or
    /// `substeps` is zero. Nothing is advanced in that case.
    pub fn step(
        &mut self,
        dt: f64,
        velocity_iters: u32,
        position_iters: u32,
        constraint_iters: u32,
        substeps: u32,
    ) -> Result<()> {
        let dt = checks::non_negative(dt, "dt")?;
        if substeps == 0 {
            return Err(Error::InvalidValue("substeps must be at least 1".into()));
        }
        let start = Instant::now();

        let mut space = self.space.borrow_mut();
        space.step(dt, velocity_iters, position_iters, constraint_iters, substeps);

        let events = &mut self.events;
        let before = self.registry.len();
        self.registry.retain(|body| {
            if body.sync_from(&space) {
                return true;
            }
            if let Some(identity) = body.identity() {
                debug!(identity, "body dropped by engine");
                events.push(WorldEvent::BodyRemoved { identity });
            }
            false
        });

        let stats = StepStats {
            dt,
            substeps,
            bodies: self.registry.len(),
            constraints: space.constraint_count(),
            removed: before - self.registry.len(),
            elapsed_ms: start.elapsed().as_secs_f64() * 1e3,
        };
        trace!(
            bodies = stats.bodies,
            constraints = stats.constraints,
            removed = stats.removed,
            elapsed_ms = stats.elapsed_ms,
            "step"
        );
        self.last_stats = Some(stats);
        Ok(())
    }

    /// Stats of the most recent successful step.
    pub fn last_step_stats(&self) -> Option<StepStats> {
        self.last_stats
    }

    /// Take the events accumulated since the last call.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    // ============ Configuration ============

    /// Gravity applied to dynamic bodies each step.
    pub fn gravity(&self) -> Vector {
        self.space.borrow().gravity
    }

    /// Errors: `InvalidValue` for non-finite components.
    pub fn set_gravity(&mut self, gravity: Vector) -> Result<()> {
        if !gravity.is_finite() {
            return Err(Error::InvalidValue("gravity must be finite".into()));
        }
        self.space.borrow_mut().gravity = gravity;
        Ok(())
    }

    /// Current kill region.
    pub fn kill_bounds(&self) -> Aabb {
        self.space.borrow().kill_bounds
    }

    /// Region outside which the engine silently drops bodies during a step.
    /// This is the source of implicit handle retirement.
    pub fn set_kill_bounds(&mut self, bounds: Aabb) -> Result<()> {
        validate_bounds(&bounds, "kill bounds")?;
        self.space.borrow_mut().kill_bounds = bounds;
        Ok(())
    }

    /// Broad-phase grid layout, as last configured.
    pub fn grid_config(&self) -> GridConfig {
        self.space.borrow().grid
    }

    /// Replace the grid layout. Cells must be positive and bounds well formed.
    pub fn set_grid_config(&mut self, grid: GridConfig) -> Result<()> {
        validate_grid(&grid)?;
        self.space.borrow_mut().grid = grid;
        Ok(())
    }
}

// ============ Internal helpers ============

fn validate_bounds(bounds: &Aabb, what: &str) -> Result<()> {
    if !bounds.is_well_formed() {
        return Err(Error::InvalidValue(format!(
            "{what} must be finite with min <= max, got {:?}",
            bounds.to_tuple()
        )));
    }
    Ok(())
}

fn validate_grid(grid: &GridConfig) -> Result<()> {
    validate_bounds(&grid.bounds, "grid bounds")?;
    for (v, what) in [(grid.cell_width, "cell width"), (grid.cell_height, "cell height")] {
        if checks::non_negative(v, what)? == 0.0 {
            return Err(Error::InvalidValue(format!("{what} must be positive")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BodyKind, Material};

    fn ball(world: &mut World, x: f64) -> Body {
        let b = Body::circle(BodyKind::Dynamic, Vector::new(x, 0.0), 0.0, Material::default(), 1.0);
        world.add(&b).unwrap();
        b
    }

    #[test]
    fn default_config_matches_engine_defaults() {
        let w = World::new();
        assert_eq!(w.config(), WorldConfig::default());
        assert_eq!(w.gravity(), Vector::new(0.0, 9.81));
        assert_eq!(w.grid_config().cell_width, 3.0);
    }

    #[test]
    fn bad_config_is_rejected() {
        let mut cfg = WorldConfig::default();
        cfg.grid.cell_width = 0.0;
        assert!(matches!(World::with_config(cfg), Err(Error::InvalidValue(_))));

        let cfg = WorldConfig {
            kill_bounds: Aabb::new(1.0, 0.0, -1.0, 0.0),
            ..WorldConfig::default()
        };
        assert!(World::with_config(cfg).is_err());
    }

    #[test]
    fn add_assigns_unique_identities() -> Result<()> {
        let mut w = World::new();
        let a = ball(&mut w, 0.0);
        let b = ball(&mut w, 1.0);
        assert_ne!(a.identity(), b.identity());
        assert!(matches!(w.add(&a), Err(Error::AlreadyRegistered(_))));
        assert_eq!(w.body_count(), 2);
        Ok(())
    }

    #[test]
    fn remove_retires_the_handle() -> Result<()> {
        let mut w = World::new();
        let a = ball(&mut w, 0.0);
        w.remove(&a)?;
        assert_eq!(w.body_count(), 0);
        assert!(matches!(a.apply_force(Vector::ZERO), Err(Error::NotRegistered(_))));
        assert!(matches!(w.remove(&a), Err(Error::NotRegistered(_))));
        assert!(matches!(w.add(&a), Err(Error::AlreadyRegistered(_))));
        Ok(())
    }

    #[test]
    fn step_rejects_bad_arguments_without_advancing() -> Result<()> {
        let mut w = World::new();
        let a = ball(&mut w, 0.0);
        for (dt, sub) in [(-1.0, 1), (f64::NAN, 1), (f64::INFINITY, 1), (0.1, 0)] {
            assert!(matches!(w.step(dt, 1, 1, 1, sub), Err(Error::InvalidValue(_))));
        }
        assert_eq!(a.position(), Vector::ZERO);
        assert!(w.last_step_stats().is_none());
        Ok(())
    }

    #[test]
    fn step_syncs_cached_pose() -> Result<()> {
        let mut w = World::new();
        let a = ball(&mut w, 0.0);
        w.step(0.1, 1, 1, 1, 1)?;
        assert!(a.position().y > 0.0);
        let stats = w.last_step_stats().unwrap();
        assert_eq!(stats.bodies, 1);
        assert_eq!(stats.removed, 0);
        Ok(())
    }

    #[test]
    fn cached_pose_equals_engine_pose_after_each_step() -> Result<()> {
        let mut w = World::new();
        let a = ball(&mut w, 0.0);
        let r = Body::rect(BodyKind::Dynamic, Vector::new(5.0, 0.0), 0.3, Material::default(), 2.0, 1.0);
        w.add(&r)?;
        a.set_angular_velocity(1.5)?;
        r.set_angular_velocity(-0.7)?;
        r.set_linear_velocity(Vector::new(3.0, -2.0))?;

        for _ in 0..20 {
            a.apply_torque(0.25)?;
            w.step(1.0 / 30.0, 2, 2, 2, 3)?;
            let space = w.space.borrow();
            for b in w.bodies() {
                let key = b.key_in(&w.space).unwrap();
                let engine = space.body(key).unwrap();
                assert_eq!(b.position(), engine.position);
                assert_eq!(b.angle(), engine.angle);
                assert_eq!(b.radius(), engine.radius());
            }
        }
        assert_ne!(a.angle(), 0.0);
        assert_ne!(r.angle(), 0.3);
        Ok(())
    }

    #[test]
    fn killed_bodies_are_reported_once() -> Result<()> {
        let mut w = World::new();
        w.set_gravity(Vector::ZERO)?;
        w.set_kill_bounds(Aabb::new(-10.0, -10.0, 10.0, 10.0))?;
        let a = ball(&mut w, 0.0);
        let id = a.identity().unwrap();
        a.set_linear_velocity(Vector::new(100.0, 0.0))?;
        w.step(1.0, 1, 1, 1, 1)?;
        assert_eq!(w.body_count(), 0);
        assert_eq!(w.drain_events(), vec![WorldEvent::BodyRemoved { identity: id }]);
        assert!(w.drain_events().is_empty());
        Ok(())
    }

    #[test]
    fn constraint_snapshots_are_in_world_space() -> Result<()> {
        let mut w = World::new();
        w.set_gravity(Vector::ZERO)?;
        let a = ball(&mut w, 0.0);
        let b = ball(&mut w, 4.0);
        b.set_angle(std::f64::consts::FRAC_PI_2)?;
        let j = DistanceJoint::new(&a, &b, Vector::new(1.0, 0.0), Vector::new(1.0, 0.0), 2.0)?;
        assert!(w.constraints().is_empty());
        w.add_constraint(&j)?;
        let snaps = w.constraints();
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].anchor_a, Vector::new(1.0, 0.0));
        assert!((snaps[0].anchor_b.x - 4.0).abs() < 1e-12);
        assert!((snaps[0].anchor_b.y - 1.0).abs() < 1e-12);
        w.remove_constraint(&j)?;
        assert_eq!(w.constraint_count(), 0);
        Ok(())
    }

    #[test]
    fn clear_is_idempotent() {
        let mut w = World::new();
        w.clear();
        assert!(w.get_bodies().is_empty());
        let a = ball(&mut w, 0.0);
        w.clear();
        w.clear();
        assert!(w.bodies().is_empty());
        assert!(!a.is_registered());
    }
}
