//! Host-side rigid body handle.
//!
//! A [`Body`] is created detached: it owns its engine body outright and can be
//! configured freely. [`World::add`](crate::core::World::add) moves the engine
//! body into the world's arena and leaves the handle with a non-owning
//! `(space, key)` link. Cached pose fields are refreshed by every step.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use crate::core::checks;
use crate::core::shape::{ShapeDescriptor, ShapeTag};
use crate::engine::{BodyKey, BodyKind, Material, RigidBody, Space};
use crate::error::{Error, Result};
use crate::math::{Aabb, Vector};

/// Where the authoritative engine body lives.
#[derive(Debug)]
enum EngineLink {
    /// Not yet added; the handle owns the engine body.
    Detached(Box<RigidBody>),
    /// Owned by a world's space. The weak pointer dies with the world.
    Live {
        space: Weak<RefCell<Space>>,
        key: BodyKey,
    },
    /// Removed explicitly, cleared, or dropped by the engine. Inert forever.
    Retired,
}

#[derive(Debug)]
struct BodyState {
    link: EngineLink,
    kind: BodyKind,
    shape: ShapeTag,
    position: Vector,
    angle: f64,
    radius: f64,
    identity: Option<u16>,
}

/// Shared handle to a rigid body.
///
/// Cloning yields another handle to the same body; equality is identity of
/// the underlying body, not of its fields.
#[derive(Clone)]
pub struct Body {
    state: Rc<RefCell<BodyState>>,
}

impl Body {
    // ============ Construction ============

    /// Build a detached body. The cached pose is taken from the arguments.
    pub fn new(
        kind: BodyKind,
        shape: ShapeDescriptor,
        position: Vector,
        angle: f64,
        material: Material,
    ) -> Self {
        let tag = shape.tag();
        let engine_body = RigidBody::new(kind, shape.into_engine_shape(), position, angle, material);
        let radius = engine_body.radius();
        Self {
            state: Rc::new(RefCell::new(BodyState {
                link: EngineLink::Detached(Box::new(engine_body)),
                kind,
                shape: tag,
                position,
                angle,
                radius,
                identity: None,
            })),
        }
    }

    /// Circle body. The radius is handed to the engine unchecked.
    pub fn circle(
        kind: BodyKind,
        position: Vector,
        angle: f64,
        material: Material,
        radius: f64,
    ) -> Self {
        Self::new(kind, ShapeDescriptor::circle(radius), position, angle, material)
    }

    /// Box body centered on `position`.
    pub fn rect(
        kind: BodyKind,
        position: Vector,
        angle: f64,
        material: Material,
        width: f64,
        height: f64,
    ) -> Self {
        Self::new(kind, ShapeDescriptor::rect(width, height), position, angle, material)
    }

    /// Polygon body from a local-space vertex ring.
    ///
    /// With `use_hull` the convex hull of `vertices` is used instead of the
    /// ring itself. Fails with a validation error before any engine body
    /// exists when fewer than three vertices are given.
    pub fn polygon<V: Into<Vector>>(
        kind: BodyKind,
        position: Vector,
        angle: f64,
        material: Material,
        vertices: impl IntoIterator<Item = V>,
        use_hull: bool,
    ) -> Result<Self> {
        let shape = if use_hull {
            ShapeDescriptor::convex_hull(vertices)?
        } else {
            ShapeDescriptor::polygon(vertices)?
        };
        Ok(Self::new(kind, shape, position, angle, material))
    }

    // ============ Cached state ============

    /// Static or dynamic, fixed at creation.
    pub fn kind(&self) -> BodyKind {
        self.state.borrow().kind
    }

    /// Shape family the body was built from.
    pub fn shape(&self) -> ShapeTag {
        self.state.borrow().shape
    }

    /// Position as of the last step or write.
    pub fn position(&self) -> Vector {
        self.state.borrow().position
    }

    /// Angle in radians as of the last step or write.
    pub fn angle(&self) -> f64 {
        self.state.borrow().angle
    }

    /// Circle radius, 0 for polygons.
    pub fn radius(&self) -> f64 {
        self.state.borrow().radius
    }

    /// Engine-assigned identity; `None` until the body is added to a world.
    pub fn identity(&self) -> Option<u16> {
        self.state.borrow().identity
    }

    /// True while the body lives in a world that still exists.
    pub fn is_registered(&self) -> bool {
        match &self.state.borrow().link {
            EngineLink::Live { space, key } => space
                .upgrade()
                .is_some_and(|s| s.borrow().contains_body(*key)),
            _ => false,
        }
    }

    // ============ Motion (registered only) ============

    /// Accumulate a force through the center of mass for the next step.
    pub fn apply_force(&self, force: Vector) -> Result<()> {
        self.with_live("apply_force", |b| b.apply_force(force))
    }

    /// Force applied at `point`, an offset from the body's center in world orientation.
    pub fn apply_force_at(&self, force: Vector, point: Vector) -> Result<()> {
        self.with_live("apply_force_at", |b| b.apply_force_at(force, point))
    }

    /// Immediate velocity change from `impulse` applied at offset `point`.
    pub fn apply_impulse(&self, impulse: Vector, point: Vector) -> Result<()> {
        self.with_live("apply_impulse", |b| b.apply_impulse(impulse, point))
    }

    /// Accumulate torque for the next step.
    pub fn apply_torque(&self, torque: f64) -> Result<()> {
        self.with_live("apply_torque", |b| b.apply_torque(torque))
    }

    // ============ Properties (detached or registered) ============

    /// Move the body. The cached position is updated immediately.
    pub fn set_position(&self, position: Vector) -> Result<()> {
        self.with_engine("set_position", |b| b.position = position)?;
        self.state.borrow_mut().position = position;
        Ok(())
    }

    /// Rotate the body. The cached angle is updated immediately.
    pub fn set_angle(&self, angle: f64) -> Result<()> {
        self.with_engine("set_angle", |b| b.angle = angle)?;
        self.state.borrow_mut().angle = angle;
        Ok(())
    }

    /// Engine mass; zero means immovable.
    pub fn mass(&self) -> Result<f64> {
        self.with_engine("mass", |b| b.mass())
    }

    /// Zero means immovable. Negative or non-finite values are rejected.
    pub fn set_mass(&self, mass: f64) -> Result<()> {
        let mass = checks::non_negative(mass, "mass")?;
        self.with_engine("set_mass", |b| b.set_mass(mass))
    }

    /// Moment of inertia about the body origin.
    pub fn inertia(&self) -> Result<f64> {
        self.with_engine("inertia", |b| b.inertia())
    }

    /// Zero means the body cannot rotate. Negative or non-finite values are rejected.
    pub fn set_inertia(&self, inertia: f64) -> Result<()> {
        let inertia = checks::non_negative(inertia, "inertia")?;
        self.with_engine("set_inertia", |b| b.set_inertia(inertia))
    }

    /// Current engine velocity, not cached.
    pub fn linear_velocity(&self) -> Result<Vector> {
        self.with_engine("linear_velocity", |b| b.linear_velocity)
    }

    pub fn set_linear_velocity(&self, velocity: Vector) -> Result<()> {
        self.with_engine("set_linear_velocity", |b| b.linear_velocity = velocity)
    }

    /// Current engine angular velocity in radians per second.
    pub fn angular_velocity(&self) -> Result<f64> {
        self.with_engine("angular_velocity", |b| b.angular_velocity)
    }

    pub fn set_angular_velocity(&self, velocity: f64) -> Result<()> {
        self.with_engine("set_angular_velocity", |b| b.angular_velocity = velocity)
    }

    /// Toggle collision participation. Stored on the engine body.
    pub fn enable_collision(&self, enabled: bool) -> Result<()> {
        self.with_engine("enable_collision", |b| b.collision_enabled = enabled)
    }

    pub fn collision_enabled(&self) -> Result<bool> {
        self.with_engine("collision_enabled", |b| b.collision_enabled)
    }

    /// Collision filter group stored on the engine body.
    pub fn collision_group(&self) -> Result<u32> {
        self.with_engine("collision_group", |b| b.collision_group)
    }

    pub fn set_collision_group(&self, group: u32) -> Result<()> {
        self.with_engine("set_collision_group", |b| b.collision_group = group)
    }

    /// World-space vertices recomputed from the current pose. Empty for circles.
    pub fn vertices(&self) -> Result<Vec<Vector>> {
        self.with_engine("vertices", |b| b.world_vertices())
    }

    /// Bounding box recomputed from the current pose.
    pub fn aabb(&self) -> Result<Aabb> {
        self.with_engine("aabb", |b| b.aabb())
    }

    // ============ World plumbing ============

    /// Move the engine body into `space` and take the assigned identity.
    ///
    /// On failure the handle is left exactly as it was.
    pub(crate) fn register(&self, space: &Rc<RefCell<Space>>) -> Result<u16> {
        let mut state = self.state.borrow_mut();
        let engine_body = match std::mem::replace(&mut state.link, EngineLink::Retired) {
            EngineLink::Detached(body) => body,
            other => {
                state.link = other;
                return Err(Error::AlreadyRegistered("body was already added to a world"));
            }
        };
        match space.borrow_mut().add_body(*engine_body) {
            Ok((key, id)) => {
                state.link = EngineLink::Live {
                    space: Rc::downgrade(space),
                    key,
                };
                state.identity = Some(id);
                Ok(id)
            }
            Err(engine_body) => {
                state.link = EngineLink::Detached(Box::new(engine_body));
                Err(Error::InvalidValue("no free body identity left in this world".into()))
            }
        }
    }

    /// Arena key, if this handle is live in `space`.
    pub(crate) fn key_in(&self, space: &Rc<RefCell<Space>>) -> Option<BodyKey> {
        match &self.state.borrow().link {
            EngineLink::Live { space: weak, key } if Weak::as_ptr(weak) == Rc::as_ptr(space) => {
                Some(*key)
            }
            _ => None,
        }
    }

    /// Live link of this handle, regardless of which world it belongs to.
    pub(crate) fn live_link(&self) -> Option<(Rc<RefCell<Space>>, BodyKey)> {
        match &self.state.borrow().link {
            EngineLink::Live { space, key } => space.upgrade().map(|s| (s, *key)),
            _ => None,
        }
    }

    /// Refresh the cached pose from `space`.
    ///
    /// Returns `false` and retires the handle when the engine no longer has
    /// the body.
    pub(crate) fn sync_from(&self, space: &Space) -> bool {
        let mut state = self.state.borrow_mut();
        let key = match state.link {
            EngineLink::Live { key, .. } => key,
            _ => return false,
        };
        match space.body(key) {
            Some(b) => {
                state.position = b.position;
                state.angle = b.angle;
                state.radius = b.radius();
                true
            }
            None => {
                state.link = EngineLink::Retired;
                false
            }
        }
    }

    pub(crate) fn retire(&self) {
        self.state.borrow_mut().link = EngineLink::Retired;
    }

    // ============ Internal helpers ============

    fn with_live<R>(&self, op: &'static str, f: impl FnOnce(&mut RigidBody) -> R) -> Result<R> {
        let state = self.state.borrow();
        match &state.link {
            EngineLink::Live { space, key } => {
                let space = space.upgrade().ok_or(Error::NotRegistered(op))?;
                let mut space = space.borrow_mut();
                let body = space.body_mut(*key).ok_or(Error::NotRegistered(op))?;
                Ok(f(body))
            }
            _ => Err(Error::NotRegistered(op)),
        }
    }

    fn with_engine<R>(&self, op: &'static str, f: impl FnOnce(&mut RigidBody) -> R) -> Result<R> {
        {
            let mut state = self.state.borrow_mut();
            if let EngineLink::Detached(body) = &mut state.link {
                return Ok(f(&mut **body));
            }
        }
        self.with_live(op, f)
    }
}

impl PartialEq for Body {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl Eq for Body {}

impl Hash for Body {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.state).hash(state);
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.state.borrow();
        let link = match s.link {
            EngineLink::Detached(_) => "detached",
            EngineLink::Live { .. } => "live",
            EngineLink::Retired => "retired",
        };
        f.debug_struct("Body")
            .field("identity", &s.identity)
            .field("kind", &s.kind)
            .field("shape", &s.shape)
            .field("position", &s.position)
            .field("angle", &s.angle)
            .field("link", &link)
            .finish()
    }
}
