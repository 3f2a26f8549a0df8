//! Value types shared by the binding layer and the engine.

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// 2D vector with `f64` components.
///
/// Plain value type: every operation returns a new vector. Division by zero
/// follows IEEE-754 (±inf / NaN) and is not guarded.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
}

impl Vector {
    pub const ZERO: Vector = Vector { x: 0.0, y: 0.0 };

    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn to_tuple(self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// Rotate counter-clockwise by `angle` radians.
    #[inline]
    pub fn rotate(self, angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self::new(c * self.x - s * self.y, s * self.x + c * self.y)
    }

    /// Left perpendicular `(-y, x)`.
    #[inline]
    pub fn perp(self) -> Self {
        Self::new(-self.y, self.x)
    }

    /// Right perpendicular `(y, -x)`.
    #[inline]
    pub fn perpr(self) -> Self {
        Self::new(self.y, -self.x)
    }

    #[inline]
    pub fn len2(self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    #[inline]
    pub fn len(self) -> f64 {
        self.len2().sqrt()
    }

    #[inline]
    pub fn dot(self, other: Vector) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Scalar 2D cross product (z component of the 3D cross product).
    #[inline]
    pub fn cross(self, other: Vector) -> f64 {
        self.x * other.y - self.y * other.x
    }

    #[inline]
    pub fn dist2(self, other: Vector) -> f64 {
        (other - self).len2()
    }

    #[inline]
    pub fn dist(self, other: Vector) -> f64 {
        self.dist2(other).sqrt()
    }

    /// Unit vector in the same direction. The zero vector normalizes to NaN components.
    #[inline]
    pub fn normalize(self) -> Self {
        self / self.len()
    }

    #[inline]
    pub fn lerp(self, other: Vector, t: f64) -> Self {
        Self::new(
            (1.0 - t) * self.x + t * other.x,
            (1.0 - t) * self.y + t * other.y,
        )
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vector {
    type Output = Vector;
    #[inline]
    fn add(self, rhs: Vector) -> Vector {
        Vector::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector {
    type Output = Vector;
    #[inline]
    fn sub(self, rhs: Vector) -> Vector {
        Vector::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vector {
    type Output = Vector;
    #[inline]
    fn mul(self, s: f64) -> Vector {
        Vector::new(self.x * s, self.y * s)
    }
}

impl Div<f64> for Vector {
    type Output = Vector;
    #[inline]
    fn div(self, s: f64) -> Vector {
        Vector::new(self.x / s, self.y / s)
    }
}

impl Neg for Vector {
    type Output = Vector;
    #[inline]
    fn neg(self) -> Vector {
        Vector::new(-self.x, -self.y)
    }
}

impl From<(f64, f64)> for Vector {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

impl From<[f64; 2]> for Vector {
    fn from([x, y]: [f64; 2]) -> Self {
        Self::new(x, y)
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let round3 = |v: f64| (v * 1000.0).round() / 1000.0;
        write!(f, "<Vector({}, {})>", round3(self.x), round3(self.y))
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aabb {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Aabb {
    #[inline]
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// `(min_x, min_y, max_x, max_y)`
    #[inline]
    pub fn to_tuple(self) -> (f64, f64, f64, f64) {
        (self.min_x, self.min_y, self.max_x, self.max_y)
    }

    /// Overlap test; touching edges do not count.
    pub fn collide_aabb(&self, other: &Aabb) -> bool {
        !(self.max_x <= other.min_x
            || other.max_x <= self.min_x
            || self.max_y <= other.min_y
            || other.max_y <= self.min_y)
    }

    /// Containment test; points on the boundary are inside.
    pub fn collide_point(&self, p: Vector) -> bool {
        self.min_x <= p.x && p.x <= self.max_x && self.min_y <= p.y && p.y <= self.max_y
    }

    /// Smallest box containing every point. Empty input gives `None`.
    pub fn from_points<I: IntoIterator<Item = Vector>>(points: I) -> Option<Self> {
        let mut it = points.into_iter();
        let first = it.next()?;
        let init = Aabb::new(first.x, first.y, first.x, first.y);
        Some(it.fold(init, |b, p| Aabb {
            min_x: b.min_x.min(p.x),
            min_y: b.min_y.min(p.y),
            max_x: b.max_x.max(p.x),
            max_y: b.max_y.max(p.y),
        }))
    }

    pub(crate) fn is_well_formed(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && self.min_x <= self.max_x
            && self.min_y <= self.max_y
    }
}
