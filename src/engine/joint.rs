use slotmap::SlotMap;

use crate::engine::body::RigidBody;
use crate::engine::space::BodyKey;
use crate::math::Vector;

/// Anchors closer than this are treated as coincident and skipped by the solver.
const MIN_SEPARATION: f64 = 1e-9;

/// Discriminates constraint types in snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    Distance,
}

impl ConstraintKind {
    /// Integer code exposed to hosts.
    pub fn code(self) -> i64 {
        match self {
            ConstraintKind::Distance => 1,
        }
    }
}

/// Keeps two anchor points (each in its body's local frame) at `length` apart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceJoint {
    pub a: BodyKey,
    pub b: BodyKey,
    pub anchor_a: Vector,
    pub anchor_b: Vector,
    pub length: f64,
}

/// Engine-side constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constraint {
    Distance(DistanceJoint),
}

impl Constraint {
    pub fn kind(&self) -> ConstraintKind {
        match self {
            Constraint::Distance(_) => ConstraintKind::Distance,
        }
    }

    /// The two bodies this constraint binds.
    pub fn bodies(&self) -> (BodyKey, BodyKey) {
        match self {
            Constraint::Distance(j) => (j.a, j.b),
        }
    }

    pub(crate) fn solve_velocity(&self, bodies: &mut SlotMap<BodyKey, RigidBody>) {
        match self {
            Constraint::Distance(j) => j.solve_velocity(bodies),
        }
    }

    pub(crate) fn solve_position(&self, bodies: &mut SlotMap<BodyKey, RigidBody>) {
        match self {
            Constraint::Distance(j) => j.solve_position(bodies),
        }
    }
}

/// Snapshot of the state one side of a joint needs.
#[derive(Clone, Copy)]
struct Side {
    r: Vector,
    position: Vector,
    velocity: Vector,
    angular_velocity: f64,
    inv_mass: f64,
    inv_inertia: f64,
}

impl Side {
    fn read(body: &RigidBody, anchor: Vector) -> Self {
        Self {
            r: anchor.rotate(body.angle),
            position: body.position,
            velocity: body.linear_velocity,
            angular_velocity: body.angular_velocity,
            inv_mass: body.inv_mass(),
            inv_inertia: body.inv_inertia(),
        }
    }

    #[inline]
    fn anchor_world(&self) -> Vector {
        self.position + self.r
    }

    #[inline]
    fn point_velocity(&self) -> Vector {
        self.velocity + self.r.perp() * self.angular_velocity
    }

    #[inline]
    fn effective_mass(&self, n: Vector) -> f64 {
        let rn = self.r.cross(n);
        self.inv_mass + self.inv_inertia * rn * rn
    }
}

impl DistanceJoint {
    fn sides(&self, bodies: &SlotMap<BodyKey, RigidBody>) -> Option<(Side, Side)> {
        if self.a == self.b {
            return None;
        }
        let a = Side::read(bodies.get(self.a)?, self.anchor_a);
        let b = Side::read(bodies.get(self.b)?, self.anchor_b);
        Some((a, b))
    }

    /// Axis from anchor A to anchor B, current separation and combined effective mass.
    fn axis(a: &Side, b: &Side) -> Option<(Vector, f64, f64)> {
        let delta = b.anchor_world() - a.anchor_world();
        let dist = delta.len();
        if dist < MIN_SEPARATION {
            return None;
        }
        let n = delta / dist;
        let k = a.effective_mass(n) + b.effective_mass(n);
        if k <= 0.0 {
            return None;
        }
        Some((n, dist, k))
    }

    /// Remove relative anchor velocity along the joint axis.
    fn solve_velocity(&self, bodies: &mut SlotMap<BodyKey, RigidBody>) {
        let Some((a, b)) = self.sides(bodies) else {
            return;
        };
        let Some((n, _, k)) = Self::axis(&a, &b) else {
            return;
        };
        let vn = (b.point_velocity() - a.point_velocity()).dot(n);
        let p = n * (-vn / k);

        if let Some(body) = bodies.get_mut(self.a) {
            body.linear_velocity = body.linear_velocity - p * a.inv_mass;
            body.angular_velocity -= a.inv_inertia * a.r.cross(p);
        }
        if let Some(body) = bodies.get_mut(self.b) {
            body.linear_velocity = body.linear_velocity + p * b.inv_mass;
            body.angular_velocity += b.inv_inertia * b.r.cross(p);
        }
    }

    /// Project positions so the anchors sit `length` apart.
    fn solve_position(&self, bodies: &mut SlotMap<BodyKey, RigidBody>) {
        let Some((a, b)) = self.sides(bodies) else {
            return;
        };
        let Some((n, dist, k)) = Self::axis(&a, &b) else {
            return;
        };
        let c = dist - self.length;
        let p = n * (-c / k);

        if let Some(body) = bodies.get_mut(self.a) {
            body.position = body.position - p * a.inv_mass;
            body.angle -= a.inv_inertia * a.r.cross(p);
        }
        if let Some(body) = bodies.get_mut(self.b) {
            body.position = body.position + p * b.inv_mass;
            body.angle += b.inv_inertia * b.r.cross(p);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::body::{BodyKind, Material};
    use crate::engine::shape::Shape;

    fn pair(b_pos: Vector) -> (SlotMap<BodyKey, RigidBody>, DistanceJoint) {
        let mut bodies = SlotMap::with_key();
        let a = bodies.insert(RigidBody::new(
            BodyKind::Static,
            Shape::circle(0.5),
            Vector::ZERO,
            0.0,
            Material::default(),
        ));
        let b = bodies.insert(RigidBody::new(
            BodyKind::Dynamic,
            Shape::circle(0.5),
            b_pos,
            0.0,
            Material::default(),
        ));
        let joint = DistanceJoint {
            a,
            b,
            anchor_a: Vector::ZERO,
            anchor_b: Vector::ZERO,
            length: 5.0,
        };
        (bodies, joint)
    }

    #[test]
    fn position_projection_restores_length_against_static_body() {
        let (mut bodies, joint) = pair(Vector::new(7.0, 0.0));
        joint.solve_position(&mut bodies);
        let b = &bodies[joint.b];
        assert!((b.position.x - 5.0).abs() < 1e-12);
        assert_eq!(bodies[joint.a].position, Vector::ZERO);
    }

    #[test]
    fn velocity_solve_removes_axial_velocity() {
        let (mut bodies, joint) = pair(Vector::new(5.0, 0.0));
        bodies[joint.b].linear_velocity = Vector::new(3.0, 2.0);
        joint.solve_velocity(&mut bodies);
        let v = bodies[joint.b].linear_velocity;
        assert!(v.x.abs() < 1e-12, "axial component removed, got {v:?}");
        assert!((v.y - 2.0).abs() < 1e-12, "tangential component kept");
    }

    #[test]
    fn coincident_anchors_are_skipped() {
        let (mut bodies, joint) = pair(Vector::ZERO);
        joint.solve_position(&mut bodies);
        assert_eq!(bodies[joint.b].position, Vector::ZERO);
    }

    #[test]
    fn kind_code_matches_host_constant() {
        let (_, joint) = pair(Vector::new(1.0, 0.0));
        assert_eq!(Constraint::Distance(joint).kind().code(), 1);
    }
}
