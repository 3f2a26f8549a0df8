use std::collections::HashSet;

use slotmap::{new_key_type, SlotMap};

use crate::engine::body::RigidBody;
use crate::engine::joint::Constraint;
use crate::math::{Aabb, Vector};

new_key_type! {
    /// Generational key of a body inside a [`Space`].
    pub struct BodyKey;
    /// Generational key of a constraint inside a [`Space`].
    pub struct JointKey;
}

/// Standard gravity along +y (screen space, y grows downward).
pub const DEFAULT_GRAVITY: Vector = Vector::new(0.0, 9.81);

/// Default region outside which bodies are removed.
pub const DEFAULT_KILL_BOUNDS: Aabb = Aabb::new(-1e4, -1e4, 1e4, 1e4);

/// Broad-phase spatial hash grid layout. Stored and reported; the reference
/// engine has no broad phase that reads it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridConfig {
    pub bounds: Aabb,
    pub cell_width: f64,
    pub cell_height: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            bounds: Aabb::new(0.0, 0.0, 128.0, 72.0),
            cell_width: 3.0,
            cell_height: 3.0,
        }
    }
}

/// Simulation space: authoritative store of bodies and constraints.
///
/// Bodies and constraints are iterated in insertion order. Bodies leaving
/// [`Space::kill_bounds`] are dropped at the end of [`Space::step`] together
/// with every constraint attached to them; nothing is reported back.
#[derive(Debug)]
pub struct Space {
    bodies: SlotMap<BodyKey, RigidBody>,
    body_order: Vec<BodyKey>,
    live_ids: HashSet<u16>,
    ids: slotmap::SecondaryMap<BodyKey, u16>,
    next_id: u16,
    joints: SlotMap<JointKey, Constraint>,
    joint_order: Vec<JointKey>,
    pub gravity: Vector,
    pub kill_bounds: Aabb,
    pub grid: GridConfig,
}

impl Default for Space {
    fn default() -> Self {
        Self::new()
    }
}

impl Space {
    pub fn new() -> Self {
        Self {
            bodies: SlotMap::with_key(),
            body_order: Vec::new(),
            live_ids: HashSet::new(),
            ids: slotmap::SecondaryMap::new(),
            next_id: 1,
            joints: SlotMap::with_key(),
            joint_order: Vec::new(),
            gravity: DEFAULT_GRAVITY,
            kill_bounds: DEFAULT_KILL_BOUNDS,
            grid: GridConfig::default(),
        }
    }

    // ============ Bodies ============

    /// Take ownership of `body` and assign it a 16-bit identity unique among live bodies.
    ///
    /// Hands the body back if every identity is in use.
    pub fn add_body(&mut self, body: RigidBody) -> Result<(BodyKey, u16), RigidBody> {
        let Some(id) = self.allocate_id() else {
            return Err(body);
        };
        let key = self.bodies.insert(body);
        self.body_order.push(key);
        self.ids.insert(key, id);
        Ok((key, id))
    }

    /// Remove a body and every constraint attached to it.
    pub fn remove_body(&mut self, key: BodyKey) -> Option<RigidBody> {
        let body = self.bodies.remove(key)?;
        self.body_order.retain(|&k| k != key);
        self.release_id(key);
        self.drop_joints_of(|k| k == key);
        Some(body)
    }

    #[inline]
    pub fn contains_body(&self, key: BodyKey) -> bool {
        self.bodies.contains_key(key)
    }

    #[inline]
    pub fn body(&self, key: BodyKey) -> Option<&RigidBody> {
        self.bodies.get(key)
    }

    #[inline]
    pub fn body_mut(&mut self, key: BodyKey) -> Option<&mut RigidBody> {
        self.bodies.get_mut(key)
    }

    /// Identity assigned at insertion.
    pub fn body_id(&self, key: BodyKey) -> Option<u16> {
        self.ids.get(key).copied()
    }

    /// Live bodies in insertion order.
    pub fn bodies(&self) -> impl Iterator<Item = (BodyKey, &RigidBody)> + '_ {
        self.body_order
            .iter()
            .filter_map(move |&k| self.bodies.get(k).map(|b| (k, b)))
    }

    #[inline]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    // ============ Constraints ============

    /// Insert a constraint. Hands it back if either body is not in this space.
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<JointKey, Constraint> {
        let (a, b) = constraint.bodies();
        if !self.contains_body(a) || !self.contains_body(b) {
            return Err(constraint);
        }
        let key = self.joints.insert(constraint);
        self.joint_order.push(key);
        Ok(key)
    }

    pub fn remove_constraint(&mut self, key: JointKey) -> Option<Constraint> {
        let c = self.joints.remove(key)?;
        self.joint_order.retain(|&k| k != key);
        Some(c)
    }

    #[inline]
    pub fn contains_constraint(&self, key: JointKey) -> bool {
        self.joints.contains_key(key)
    }

    #[inline]
    pub fn constraint(&self, key: JointKey) -> Option<&Constraint> {
        self.joints.get(key)
    }

    /// Live constraints in insertion order.
    pub fn constraints(&self) -> impl Iterator<Item = (JointKey, &Constraint)> + '_ {
        self.joint_order
            .iter()
            .filter_map(move |&k| self.joints.get(k).map(|c| (k, c)))
    }

    #[inline]
    pub fn constraint_count(&self) -> usize {
        self.joints.len()
    }

    /// Remove every body and constraint. Identities start over.
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.body_order.clear();
        self.ids.clear();
        self.live_ids.clear();
        self.next_id = 1;
        self.joints.clear();
        self.joint_order.clear();
    }

    // ============ Stepping ============

    /// Advance the space by `dt`, split into `substeps` equal substeps.
    ///
    /// Per substep: integrate forces and gravity into velocities, solve
    /// constraints at velocity level `constraint_iters` times, integrate
    /// positions, then project constraint positions `position_iters` times.
    /// `velocity_iters` drives the contact solver, which this engine does not
    /// have. Accumulated forces are cleared afterwards and bodies outside the
    /// kill bounds are removed.
    pub fn step(
        &mut self,
        dt: f64,
        velocity_iters: u32,
        position_iters: u32,
        constraint_iters: u32,
        substeps: u32,
    ) {
        let _ = velocity_iters;
        let substeps = substeps.max(1);
        let h = dt / f64::from(substeps);

        for _ in 0..substeps {
            for &key in &self.body_order {
                if let Some(body) = self.bodies.get_mut(key) {
                    body.integrate_velocity(self.gravity, h);
                }
            }

            for _ in 0..constraint_iters {
                for &key in &self.joint_order {
                    if let Some(c) = self.joints.get(key) {
                        c.solve_velocity(&mut self.bodies);
                    }
                }
            }

            for &key in &self.body_order {
                if let Some(body) = self.bodies.get_mut(key) {
                    body.integrate_position(h);
                }
            }

            for _ in 0..position_iters {
                for &key in &self.joint_order {
                    if let Some(c) = self.joints.get(key) {
                        c.solve_position(&mut self.bodies);
                    }
                }
            }
        }

        for body in self.bodies.values_mut() {
            body.clear_forces();
        }

        self.kill_out_of_bounds();
    }

    // ============ Internal helpers ============

    fn kill_out_of_bounds(&mut self) {
        let bounds = self.kill_bounds;
        let doomed: HashSet<BodyKey> = self
            .body_order
            .iter()
            .copied()
            .filter(|&k| {
                self.bodies
                    .get(k)
                    .is_some_and(|b| !bounds.collide_point(b.position))
            })
            .collect();
        if doomed.is_empty() {
            return;
        }
        self.body_order.retain(|k| !doomed.contains(k));
        for &key in &doomed {
            self.bodies.remove(key);
            self.release_id(key);
        }
        self.drop_joints_of(|k| doomed.contains(&k));
    }

    fn drop_joints_of(&mut self, dead: impl Fn(BodyKey) -> bool) {
        let joints = &mut self.joints;
        self.joint_order.retain(|&jk| {
            let attached = joints.get(jk).is_some_and(|c| {
                let (a, b) = c.bodies();
                dead(a) || dead(b)
            });
            if attached {
                joints.remove(jk);
            }
            !attached
        });
    }

    fn allocate_id(&mut self) -> Option<u16> {
        // 0 is never handed out.
        if self.live_ids.len() >= usize::from(u16::MAX) {
            return None;
        }
        loop {
            let id = self.next_id;
            self.next_id = match self.next_id.wrapping_add(1) {
                0 => 1,
                n => n,
            };
            if self.live_ids.insert(id) {
                return Some(id);
            }
        }
    }

    fn release_id(&mut self, key: BodyKey) {
        if let Some(id) = self.ids.remove(key) {
            self.live_ids.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::body::{BodyKind, Material};
    use crate::engine::joint::DistanceJoint;
    use crate::engine::shape::Shape;

    fn circle_at(kind: BodyKind, x: f64, y: f64) -> RigidBody {
        RigidBody::new(kind, Shape::circle(1.0), Vector::new(x, y), 0.0, Material::default())
    }

    #[test]
    fn ids_are_unique_and_nonzero() {
        let mut space = Space::new();
        let (k1, id1) = space.add_body(circle_at(BodyKind::Dynamic, 0.0, 0.0)).unwrap();
        let (_, id2) = space.add_body(circle_at(BodyKind::Dynamic, 1.0, 0.0)).unwrap();
        assert_ne!(id1, 0);
        assert_ne!(id1, id2);
        assert_eq!(space.body_id(k1), Some(id1));
        space.remove_body(k1);
        assert!(!space.contains_body(k1));
        assert_eq!(space.body_id(k1), None);
    }

    #[test]
    fn stale_key_misses_after_slot_reuse() {
        let mut space = Space::new();
        let (k1, _) = space.add_body(circle_at(BodyKind::Dynamic, 0.0, 0.0)).unwrap();
        space.remove_body(k1);
        let (k2, _) = space.add_body(circle_at(BodyKind::Dynamic, 0.0, 0.0)).unwrap();
        assert_ne!(k1, k2);
        assert!(space.body(k1).is_none());
        assert!(space.body(k2).is_some());
    }

    #[test]
    fn gravity_moves_dynamic_bodies_only() {
        let mut space = Space::new();
        let (dk, _) = space.add_body(circle_at(BodyKind::Dynamic, 0.0, 0.0)).unwrap();
        let (sk, _) = space.add_body(circle_at(BodyKind::Static, 5.0, 0.0)).unwrap();
        space.step(1.0 / 60.0, 8, 4, 4, 1);
        assert!(space.body(dk).unwrap().position.y > 0.0);
        assert_eq!(space.body(sk).unwrap().position, Vector::new(5.0, 0.0));
    }

    #[test]
    fn forces_are_cleared_after_step() {
        let mut space = Space::new();
        space.gravity = Vector::ZERO;
        let (k, _) = space.add_body(circle_at(BodyKind::Dynamic, 0.0, 0.0)).unwrap();
        space.body_mut(k).unwrap().apply_force(Vector::new(10.0, 0.0));
        space.step(0.1, 1, 1, 1, 1);
        let v1 = space.body(k).unwrap().linear_velocity;
        assert!(v1.x > 0.0);
        space.step(0.1, 1, 1, 1, 1);
        assert_eq!(space.body(k).unwrap().linear_velocity, v1);
    }

    #[test]
    fn kill_bounds_remove_bodies_and_their_joints() {
        let mut space = Space::new();
        space.gravity = Vector::ZERO;
        space.kill_bounds = Aabb::new(-10.0, -10.0, 10.0, 10.0);
        let (a, _) = space.add_body(circle_at(BodyKind::Static, 0.0, 0.0)).unwrap();
        let (b, _) = space.add_body(circle_at(BodyKind::Dynamic, 9.5, 0.0)).unwrap();
        space
            .add_constraint(Constraint::Distance(DistanceJoint {
                a,
                b,
                anchor_a: Vector::ZERO,
                anchor_b: Vector::ZERO,
                length: 9.5,
            }))
            .unwrap();
        space.body_mut(b).unwrap().linear_velocity = Vector::new(0.0, 100.0);
        space.step(1.0, 1, 0, 0, 1);
        assert!(space.contains_body(a));
        assert!(!space.contains_body(b));
        assert_eq!(space.body_count(), 1);
        assert_eq!(space.constraint_count(), 0);
        assert_eq!(space.bodies().count(), 1);
    }

    #[test]
    fn mass_kill_keeps_survivors_in_order() {
        let mut space = Space::new();
        space.gravity = Vector::ZERO;
        space.kill_bounds = Aabb::new(-10.0, -10.0, 10.0, 10.0);
        let keys: Vec<BodyKey> = (0..200)
            .map(|_| space.add_body(circle_at(BodyKind::Dynamic, 0.0, 0.0)).unwrap().0)
            .collect();
        for pair in keys.windows(2) {
            space
                .add_constraint(Constraint::Distance(DistanceJoint {
                    a: pair[0],
                    b: pair[1],
                    anchor_a: Vector::ZERO,
                    anchor_b: Vector::ZERO,
                    length: 0.0,
                }))
                .unwrap();
        }
        for (i, &k) in keys.iter().enumerate() {
            if i % 3 != 0 {
                space.body_mut(k).unwrap().linear_velocity = Vector::new(50.0, 0.0);
            }
        }
        space.step(1.0, 0, 0, 0, 1);

        let survivors: Vec<BodyKey> = space.bodies().map(|(k, _)| k).collect();
        let expected: Vec<BodyKey> = keys.iter().copied().step_by(3).collect();
        assert_eq!(survivors, expected);
        // every joint touched at least one killed body
        assert_eq!(space.constraint_count(), 0);
        let mut ids: Vec<u16> = survivors.iter().filter_map(|&k| space.body_id(k)).collect();
        ids.dedup();
        assert_eq!(ids.len(), expected.len());
    }

    #[test]
    fn constraint_requires_both_bodies() {
        let mut space = Space::new();
        let (a, _) = space.add_body(circle_at(BodyKind::Static, 0.0, 0.0)).unwrap();
        let (b, _) = space.add_body(circle_at(BodyKind::Dynamic, 1.0, 0.0)).unwrap();
        space.remove_body(b);
        let joint = Constraint::Distance(DistanceJoint {
            a,
            b,
            anchor_a: Vector::ZERO,
            anchor_b: Vector::ZERO,
            length: 1.0,
        });
        assert!(space.add_constraint(joint).is_err());
    }

    #[test]
    fn clear_restarts_identities() {
        let mut space = Space::new();
        let (_, id) = space.add_body(circle_at(BodyKind::Dynamic, 0.0, 0.0)).unwrap();
        space.clear();
        assert_eq!(space.body_count(), 0);
        let (_, id_again) = space.add_body(circle_at(BodyKind::Dynamic, 0.0, 0.0)).unwrap();
        assert_eq!(id, id_again);
    }

    #[test]
    fn insertion_order_is_preserved() {
        let mut space = Space::new();
        let keys: Vec<BodyKey> = (0..5)
            .map(|i| space.add_body(circle_at(BodyKind::Dynamic, i as f64, 0.0)).unwrap().0)
            .collect();
        space.remove_body(keys[2]);
        let order: Vec<BodyKey> = space.bodies().map(|(k, _)| k).collect();
        assert_eq!(order, vec![keys[0], keys[1], keys[3], keys[4]]);
    }
}
