use crate::math::{Aabb, Vector};

/// Collision geometry in body-local coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Circle centered on the body origin.
    Circle { radius: f64 },
    /// Polygon given as a vertex ring around the body origin.
    Polygon { vertices: Vec<Vector> },
}

impl Shape {
    /// Radius is taken as given; positivity is not checked here.
    pub fn circle(radius: f64) -> Self {
        Shape::Circle { radius }
    }

    /// Use `vertices` verbatim as the polygon ring.
    pub fn polygon(vertices: Vec<Vector>) -> Self {
        Shape::Polygon { vertices }
    }

    /// Polygon from the convex hull of `points` (counter-clockwise, no collinear points).
    ///
    /// Fully collinear input collapses to its two extreme points.
    pub fn convex_hull(points: &[Vector]) -> Self {
        Shape::Polygon {
            vertices: hull_vertices(points),
        }
    }

    /// Circle radius; polygons report 0.
    pub fn radius(&self) -> f64 {
        match self {
            Shape::Circle { radius } => *radius,
            Shape::Polygon { .. } => 0.0,
        }
    }

    pub fn area(&self) -> f64 {
        match self {
            Shape::Circle { radius } => std::f64::consts::PI * radius * radius,
            Shape::Polygon { vertices } => signed_area(vertices).abs(),
        }
    }

    /// Moment of inertia about the body origin for the given mass.
    pub fn inertia(&self, mass: f64) -> f64 {
        match self {
            Shape::Circle { radius } => 0.5 * mass * radius * radius,
            Shape::Polygon { vertices } => {
                let n = vertices.len();
                let mut num = 0.0;
                let mut den = 0.0;
                for i in 0..n {
                    let a = vertices[i];
                    let b = vertices[(i + 1) % n];
                    let c = a.cross(b).abs();
                    num += c * (a.dot(a) + a.dot(b) + b.dot(b));
                    den += c;
                }
                if den == 0.0 {
                    0.0
                } else {
                    mass * num / (6.0 * den)
                }
            }
        }
    }

    /// Local vertices moved to world space by `position` and `angle`. Circles have none.
    pub fn world_vertices(&self, position: Vector, angle: f64) -> Vec<Vector> {
        match self {
            Shape::Circle { .. } => Vec::new(),
            Shape::Polygon { vertices } => vertices
                .iter()
                .map(|v| v.rotate(angle) + position)
                .collect(),
        }
    }

    pub fn aabb(&self, position: Vector, angle: f64) -> Aabb {
        match self {
            Shape::Circle { radius } => Aabb::new(
                position.x - radius,
                position.y - radius,
                position.x + radius,
                position.y + radius,
            ),
            Shape::Polygon { .. } => Aabb::from_points(self.world_vertices(position, angle))
                .unwrap_or(Aabb::new(position.x, position.y, position.x, position.y)),
        }
    }
}

fn signed_area(vertices: &[Vector]) -> f64 {
    let n = vertices.len();
    let twice: f64 = (0..n)
        .map(|i| vertices[i].cross(vertices[(i + 1) % n]))
        .sum();
    0.5 * twice
}

/// Andrew's monotone chain.
/// Counter-clockwise convex hull of `points` without collinear vertices.
///
/// Degenerate input (fewer than three distinct points, or all collinear)
/// yields fewer than three vertices.
pub fn hull_vertices(points: &[Vector]) -> Vec<Vector> {
    let mut pts: Vec<Vector> = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let turn = |o: Vector, a: Vector, b: Vector| (a - o).cross(b - o);
    let mut hull: Vec<Vector> = Vec::with_capacity(pts.len() * 2);

    for &p in &pts {
        while hull.len() >= 2 && turn(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len && turn(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0
        {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    hull
}
