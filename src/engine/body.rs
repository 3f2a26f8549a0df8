use crate::engine::shape::Shape;
use crate::math::{Aabb, Vector};

/// Whether the engine integrates a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyKind {
    Static,
    Dynamic,
}

impl BodyKind {
    /// Integer code exposed to hosts (`STATIC = 0`, `DYNAMIC = 1`).
    pub fn code(self) -> i64 {
        match self {
            BodyKind::Static => 0,
            BodyKind::Dynamic => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(BodyKind::Static),
            1 => Some(BodyKind::Dynamic),
            _ => None,
        }
    }
}

/// Surface and bulk material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub density: f64,
    pub restitution: f64,
    pub friction: f64,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            density: 1.0,
            restitution: 0.1,
            friction: 0.4,
        }
    }
}

/// Authoritative engine-side body state.
///
/// Zero mass or inertia means "infinite": the matching inverse is zero and the
/// body does not respond along that degree of freedom.
#[derive(Debug, Clone)]
pub struct RigidBody {
    pub kind: BodyKind,
    pub shape: Shape,
    pub material: Material,
    pub position: Vector,
    pub angle: f64,
    pub linear_velocity: Vector,
    pub angular_velocity: f64,
    pub force: Vector,
    pub torque: f64,
    pub collision_enabled: bool,
    pub collision_group: u32,
    mass: f64,
    inv_mass: f64,
    inertia: f64,
    inv_inertia: f64,
}

impl RigidBody {
    /// Create a body and derive mass and inertia from `shape` and `material.density`.
    pub fn new(
        kind: BodyKind,
        shape: Shape,
        position: Vector,
        angle: f64,
        material: Material,
    ) -> Self {
        let mass = material.density * shape.area();
        let inertia = shape.inertia(mass);
        let mut body = Self {
            kind,
            shape,
            material,
            position,
            angle,
            linear_velocity: Vector::ZERO,
            angular_velocity: 0.0,
            force: Vector::ZERO,
            torque: 0.0,
            collision_enabled: true,
            collision_group: 0,
            mass: 0.0,
            inv_mass: 0.0,
            inertia: 0.0,
            inv_inertia: 0.0,
        };
        body.set_mass(mass);
        body.set_inertia(inertia);
        body
    }

    #[inline]
    pub fn mass(&self) -> f64 {
        self.mass
    }

    #[inline]
    pub fn inv_mass(&self) -> f64 {
        self.inv_mass
    }

    #[inline]
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    #[inline]
    pub fn inv_inertia(&self) -> f64 {
        self.inv_inertia
    }

    /// Set mass; `0` means infinite. Static bodies keep a zero inverse.
    pub fn set_mass(&mut self, mass: f64) {
        self.mass = mass;
        self.inv_mass = match self.kind {
            BodyKind::Dynamic if mass > 0.0 => 1.0 / mass,
            _ => 0.0,
        };
    }

    /// Set inertia; `0` means infinite. Static bodies keep a zero inverse.
    pub fn set_inertia(&mut self, inertia: f64) {
        self.inertia = inertia;
        self.inv_inertia = match self.kind {
            BodyKind::Dynamic if inertia > 0.0 => 1.0 / inertia,
            _ => 0.0,
        };
    }

    /// Accumulate a force through the center of mass for the next step.
    #[inline]
    pub fn apply_force(&mut self, force: Vector) {
        self.force = self.force + force;
    }

    /// Accumulate a force applied at `offset` from the center of mass.
    #[inline]
    pub fn apply_force_at(&mut self, force: Vector, offset: Vector) {
        self.force = self.force + force;
        self.torque += offset.cross(force);
    }

    #[inline]
    pub fn apply_torque(&mut self, torque: f64) {
        self.torque += torque;
    }

    /// Instantaneous velocity change from `impulse` applied at `offset` from the center of mass.
    #[inline]
    pub fn apply_impulse(&mut self, impulse: Vector, offset: Vector) {
        self.linear_velocity = self.linear_velocity + impulse * self.inv_mass;
        self.angular_velocity += offset.cross(impulse) * self.inv_inertia;
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        self.shape.radius()
    }

    /// Current world-space polygon vertices; empty for circles.
    pub fn world_vertices(&self) -> Vec<Vector> {
        self.shape.world_vertices(self.position, self.angle)
    }

    pub fn aabb(&self) -> Aabb {
        self.shape.aabb(self.position, self.angle)
    }

    #[inline]
    pub(crate) fn is_integrated(&self) -> bool {
        self.kind == BodyKind::Dynamic
    }

    pub(crate) fn integrate_velocity(&mut self, gravity: Vector, h: f64) {
        if !self.is_integrated() {
            return;
        }
        if self.inv_mass > 0.0 {
            self.linear_velocity = self.linear_velocity + (gravity + self.force * self.inv_mass) * h;
        }
        self.angular_velocity += self.torque * self.inv_inertia * h;
    }

    pub(crate) fn integrate_position(&mut self, h: f64) {
        if !self.is_integrated() {
            return;
        }
        self.position = self.position + self.linear_velocity * h;
        self.angle += self.angular_velocity * h;
    }

    #[inline]
    pub(crate) fn clear_forces(&mut self) {
        self.force = Vector::ZERO;
        self.torque = 0.0;
    }
}
