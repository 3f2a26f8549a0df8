use crate::engine;
use crate::error::{Result, ValidationError};
use crate::math::Vector;

/// Smallest vertex count accepted for polygon and hull input.
pub const MIN_POLYGON_VERTICES: usize = 3;

/// Which shape family a body was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeTag {
    Circle,
    Polygon,
}

impl ShapeTag {
    /// Integer code exposed to hosts (`0` circle, `1` polygon).
    pub fn code(self) -> i64 {
        match self {
            ShapeTag::Circle => 0,
            ShapeTag::Polygon => 1,
        }
    }
}

/// Geometry input for body creation.
///
/// Polygon and hull variants are only constructible through [`ShapeDescriptor::polygon`]
/// and [`ShapeDescriptor::convex_hull`], which enforce the vertex-count minimum.
/// Circle radius positivity is not checked here: the engine receives the
/// radius as given.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeDescriptor {
    Circle { radius: f64 },
    Polygon { vertices: Vec<Vector> },
    /// Hull already computed from the input points.
    ConvexHull { hull: Vec<Vector> },
}

impl ShapeDescriptor {
    /// Circle of `radius`, handed to the engine unchecked.
    pub fn circle(radius: f64) -> Self {
        ShapeDescriptor::Circle { radius }
    }

    /// Exact polygon ring.
    ///
    /// Errors: `ValidationError::TooFewVertices` for fewer than 3 vertices.
    pub fn polygon<V: Into<Vector>>(vertices: impl IntoIterator<Item = V>) -> Result<Self> {
        let vertices = collect_ring(vertices)?;
        Ok(ShapeDescriptor::Polygon { vertices })
    }

    /// Polygon derived from the convex hull of `points`.
    ///
    /// Errors: `ValidationError::TooFewVertices` for fewer than 3 points, or
    /// when the hull itself has fewer than 3 vertices (duplicate or collinear
    /// input).
    pub fn convex_hull<V: Into<Vector>>(points: impl IntoIterator<Item = V>) -> Result<Self> {
        let points = collect_ring(points)?;
        let hull = engine::shape::hull_vertices(&points);
        if hull.len() < MIN_POLYGON_VERTICES {
            return Err(ValidationError::TooFewVertices {
                got: hull.len(),
                min: MIN_POLYGON_VERTICES,
            }
            .into());
        }
        Ok(ShapeDescriptor::ConvexHull { hull })
    }

    /// Axis-aligned `width` x `height` box centered on the body origin.
    pub fn rect(width: f64, height: f64) -> Self {
        let (w, h) = (width / 2.0, height / 2.0);
        ShapeDescriptor::Polygon {
            vertices: vec![
                Vector::new(-w, -h),
                Vector::new(w, -h),
                Vector::new(w, h),
                Vector::new(-w, h),
            ],
        }
    }

    /// Shape family of this descriptor.
    pub fn tag(&self) -> ShapeTag {
        match self {
            ShapeDescriptor::Circle { .. } => ShapeTag::Circle,
            ShapeDescriptor::Polygon { .. } | ShapeDescriptor::ConvexHull { .. } => {
                ShapeTag::Polygon
            }
        }
    }

    /// Radius cached on the handle: the circle radius, 0 for polygons.
    pub fn radius(&self) -> f64 {
        match self {
            ShapeDescriptor::Circle { radius } => *radius,
            _ => 0.0,
        }
    }

    /// Local vertex ring: the polygon as given, or the computed hull. Empty for circles.
    pub fn vertices(&self) -> &[Vector] {
        match self {
            ShapeDescriptor::Circle { .. } => &[],
            ShapeDescriptor::Polygon { vertices } => vertices,
            ShapeDescriptor::ConvexHull { hull } => hull,
        }
    }

    pub(crate) fn into_engine_shape(self) -> engine::Shape {
        match self {
            ShapeDescriptor::Circle { radius } => engine::Shape::circle(radius),
            ShapeDescriptor::Polygon { vertices } => engine::Shape::polygon(vertices),
            ShapeDescriptor::ConvexHull { hull } => engine::Shape::polygon(hull),
        }
    }
}

fn collect_ring<V: Into<Vector>>(input: impl IntoIterator<Item = V>) -> Result<Vec<Vector>> {
    let ring: Vec<Vector> = input.into_iter().map(Into::into).collect();
    if ring.len() < MIN_POLYGON_VERTICES {
        return Err(ValidationError::TooFewVertices {
            got: ring.len(),
            min: MIN_POLYGON_VERTICES,
        }
        .into());
    }
    Ok(ring)
}
