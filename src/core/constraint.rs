use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::core::body::Body;
use crate::engine::{self, Constraint, ConstraintKind, JointKey, Space};
use crate::error::{Error, Result};
use crate::math::Vector;

#[derive(Debug)]
enum JointLink {
    /// Built but not yet handed to the world that owns both bodies.
    Pending {
        joint: Constraint,
        space: Weak<RefCell<Space>>,
    },
    Live {
        space: Weak<RefCell<Space>>,
        key: JointKey,
    },
    Removed,
}

#[derive(Debug)]
struct JointState {
    link: JointLink,
    anchor_a: Vector,
    anchor_b: Vector,
    length: f64,
}

/// Handle to a distance joint between two registered bodies.
///
/// Anchors and rest length are fixed at creation and never re-read from the
/// engine. The joint is live only between `World::add_constraint` and either
/// `World::remove_constraint`, `World::clear`, or the engine dropping one of
/// its bodies.
#[derive(Debug, Clone)]
pub struct DistanceJoint {
    state: Rc<RefCell<JointState>>,
}

impl DistanceJoint {
    /// Build the engine-side joint between `a` and `b`.
    ///
    /// Both bodies must be registered with the same live world. Anchors are
    /// in each body's local frame.
    pub fn new(a: &Body, b: &Body, anchor_a: Vector, anchor_b: Vector, length: f64) -> Result<Self> {
        let (space_a, key_a) = a
            .live_link()
            .ok_or(Error::NotRegistered("make_distance_joint"))?;
        let (space_b, key_b) = b
            .live_link()
            .ok_or(Error::NotRegistered("make_distance_joint"))?;
        if !Rc::ptr_eq(&space_a, &space_b) {
            return Err(Error::InvalidValue(
                "joint bodies belong to different worlds".into(),
            ));
        }
        let joint = Constraint::Distance(engine::DistanceJoint {
            a: key_a,
            b: key_b,
            anchor_a,
            anchor_b,
            length,
        });
        Ok(Self {
            state: Rc::new(RefCell::new(JointState {
                link: JointLink::Pending {
                    joint,
                    space: Rc::downgrade(&space_a),
                },
                anchor_a,
                anchor_b,
                length,
            })),
        })
    }

    /// Always [`ConstraintKind::Distance`].
    pub fn kind(&self) -> ConstraintKind {
        ConstraintKind::Distance
    }

    /// Rest length given at creation.
    pub fn length(&self) -> f64 {
        self.state.borrow().length
    }

    /// Anchor on the first body, in its local frame.
    pub fn anchor_a(&self) -> Vector {
        self.state.borrow().anchor_a
    }

    /// Anchor on the second body, in its local frame.
    pub fn anchor_b(&self) -> Vector {
        self.state.borrow().anchor_b
    }

    /// True while the engine still holds the joint.
    pub fn is_live(&self) -> bool {
        match &self.state.borrow().link {
            JointLink::Live { space, key } => space
                .upgrade()
                .is_some_and(|s| s.borrow().contains_constraint(*key)),
            _ => false,
        }
    }

    // ============ World plumbing ============

    pub(crate) fn attach(&self, space: &Rc<RefCell<Space>>) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let (joint, owner) = match std::mem::replace(&mut state.link, JointLink::Removed) {
            JointLink::Pending { joint, space } => (joint, space),
            other => {
                state.link = other;
                return Err(Error::AlreadyRegistered("constraint was already added"));
            }
        };
        if Weak::as_ptr(&owner) != Rc::as_ptr(space) {
            state.link = JointLink::Pending { joint, space: owner };
            return Err(Error::InvalidValue(
                "constraint bodies belong to a different world".into(),
            ));
        }
        match space.borrow_mut().add_constraint(joint) {
            Ok(key) => {
                state.link = JointLink::Live { space: owner, key };
                Ok(())
            }
            Err(joint) => {
                state.link = JointLink::Pending { joint, space: owner };
                Err(Error::NotRegistered("add_constraint"))
            }
        }
    }

    pub(crate) fn detach(&self, space: &Rc<RefCell<Space>>) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let key = match &state.link {
            JointLink::Live { space: weak, key } if Weak::as_ptr(weak) == Rc::as_ptr(space) => *key,
            _ => return Err(Error::NotRegistered("remove_constraint")),
        };
        state.link = JointLink::Removed;
        space
            .borrow_mut()
            .remove_constraint(key)
            .map(|_| ())
            .ok_or(Error::NotRegistered("remove_constraint"))
    }
}

impl PartialEq for DistanceJoint {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

/// World-space view of a live constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintSnapshot {
    pub kind: ConstraintKind,
    pub anchor_a: Vector,
    pub anchor_b: Vector,
}
