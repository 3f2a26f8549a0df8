//! Python extension module.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use numpy::ndarray::Array2;
use numpy::{IntoPyArray, PyArray2};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PySequence, PyString};

use crate::core::{Body, BodyKind, DistanceJoint, Material, WorldEvent};
use crate::engine::GridConfig;
use crate::error::{Error, ValidationError};
use crate::math::{Aabb, Vector};
use crate::World;

mod exceptions {
    use pyo3::create_exception;
    use pyo3::exceptions::PyValueError;

    create_exception!(rigidsim, RigidSimError, PyValueError, "Base class of rigidsim errors.");
    create_exception!(rigidsim, ValidationError, RigidSimError, "Malformed geometry input.");
    create_exception!(rigidsim, TypeMismatchError, RigidSimError, "Wrong value kind.");
    create_exception!(rigidsim, NotRegisteredError, RigidSimError, "Body is not in a live world.");
    create_exception!(rigidsim, AlreadyRegisteredError, RigidSimError, "Handle was already added.");
    create_exception!(rigidsim, InvalidValueError, RigidSimError, "Out-of-domain scalar.");
}

fn py_err(e: Error) -> PyErr {
    let msg = e.to_string();
    match e {
        Error::Validation(_) => exceptions::ValidationError::new_err(msg),
        Error::TypeMismatch(_) => exceptions::TypeMismatchError::new_err(msg),
        Error::NotRegistered(_) => exceptions::NotRegisteredError::new_err(msg),
        Error::AlreadyRegistered(_) => exceptions::AlreadyRegisteredError::new_err(msg),
        Error::InvalidValue(_) => exceptions::InvalidValueError::new_err(msg),
    }
}

// ============ Argument extraction ============

fn vector_arg(obj: &Bound<'_, PyAny>, what: &str) -> PyResult<Vector> {
    obj.extract::<PyVector>()
        .map(|v| v.inner)
        .map_err(|_| py_err(Error::TypeMismatch(format!("{what} must be a Vector"))))
}

fn body_arg(obj: &Bound<'_, PyAny>, what: &str) -> PyResult<Body> {
    obj.extract::<PyRef<'_, PyBody>>()
        .map(|b| b.inner.clone())
        .map_err(|_| py_err(Error::TypeMismatch(format!("{what} must be a Body"))))
}

fn kind_arg(kind: i64) -> PyResult<BodyKind> {
    BodyKind::from_code(kind).ok_or_else(|| {
        py_err(Error::InvalidValue(format!(
            "kind must be STATIC (0) or DYNAMIC (1), got {kind}"
        )))
    })
}

fn iters_arg(value: i64, what: &str) -> PyResult<u32> {
    u32::try_from(value).map_err(|_| {
        py_err(Error::InvalidValue(format!(
            "{what} must fit an unsigned 32-bit integer, got {value}"
        )))
    })
}

/// Sequence of `Vector`s or number pairs.
fn vertices_arg(obj: &Bound<'_, PyAny>) -> PyResult<Vec<Vector>> {
    let not_a_sequence = || py_err(ValidationError::NotASequence.into());
    if obj.is_instance_of::<PyString>() {
        return Err(not_a_sequence());
    }
    let seq = obj.downcast::<PySequence>().map_err(|_| not_a_sequence())?;
    let n = seq.len()?;
    let mut out = Vec::with_capacity(n);
    for index in 0..n {
        let item = seq.get_item(index)?;
        let v = match item.extract::<PyVector>() {
            Ok(v) => v.inner,
            Err(_) => item
                .extract::<[f64; 2]>()
                .map(Vector::from)
                .map_err(|_| py_err(ValidationError::NotANumberPair { index }.into()))?,
        };
        out.push(v);
    }
    Ok(out)
}

fn bounds_tuple(b: Aabb) -> (f64, f64, f64, f64) {
    b.to_tuple()
}

// ============ Vector ============

/// Immutable 2D vector.
#[pyclass(name = "Vector", module = "rigidsim", frozen)]
#[derive(Clone, Copy)]
pub struct PyVector {
    inner: Vector,
}

impl From<Vector> for PyVector {
    fn from(inner: Vector) -> Self {
        Self { inner }
    }
}

#[pymethods]
impl PyVector {
    #[new]
    #[pyo3(signature = (x=0.0, y=0.0))]
    fn new(x: f64, y: f64) -> Self {
        Vector::new(x, y).into()
    }

    #[getter]
    fn x(&self) -> f64 {
        self.inner.x
    }

    #[getter]
    fn y(&self) -> f64 {
        self.inner.y
    }

    fn __add__(&self, other: PyRef<'_, Self>) -> Self {
        (self.inner + other.inner).into()
    }

    fn __sub__(&self, other: PyRef<'_, Self>) -> Self {
        (self.inner - other.inner).into()
    }

    fn __mul__(&self, k: f64) -> Self {
        (self.inner * k).into()
    }

    fn __rmul__(&self, k: f64) -> Self {
        (self.inner * k).into()
    }

    fn __truediv__(&self, k: f64) -> Self {
        (self.inner / k).into()
    }

    fn __neg__(&self) -> Self {
        (-self.inner).into()
    }

    fn __eq__(&self, other: PyRef<'_, Self>) -> bool {
        self.inner == other.inner
    }

    fn __repr__(&self) -> String {
        self.inner.to_string()
    }

    fn rotate(&self, angle: f64) -> Self {
        self.inner.rotate(angle).into()
    }

    fn perp(&self) -> Self {
        self.inner.perp().into()
    }

    fn perpr(&self) -> Self {
        self.inner.perpr().into()
    }

    fn len(&self) -> f64 {
        self.inner.len()
    }

    fn len2(&self) -> f64 {
        self.inner.len2()
    }

    fn dot(&self, other: PyRef<'_, Self>) -> f64 {
        self.inner.dot(other.inner)
    }

    fn cross(&self, other: PyRef<'_, Self>) -> f64 {
        self.inner.cross(other.inner)
    }

    fn dist(&self, other: PyRef<'_, Self>) -> f64 {
        self.inner.dist(other.inner)
    }

    fn dist2(&self, other: PyRef<'_, Self>) -> f64 {
        self.inner.dist2(other.inner)
    }

    fn normalize(&self) -> Self {
        self.inner.normalize().into()
    }

    fn lerp(&self, other: PyRef<'_, Self>, t: f64) -> Self {
        self.inner.lerp(other.inner, t).into()
    }

    fn to_tuple(&self) -> (f64, f64) {
        self.inner.to_tuple()
    }
}

// ============ Body ============

/// Handle to a rigid body. Unregistered until passed to `World.add`.
#[pyclass(name = "Body", module = "rigidsim", unsendable)]
pub struct PyBody {
    inner: Body,
}

#[pymethods]
impl PyBody {
    #[getter]
    fn kind(&self) -> i64 {
        self.inner.kind().code()
    }

    #[getter]
    fn shape(&self) -> i64 {
        self.inner.shape().code()
    }

    #[getter]
    fn identity(&self) -> Option<u16> {
        self.inner.identity()
    }

    #[getter]
    fn position(&self) -> PyVector {
        self.inner.position().into()
    }

    #[getter]
    fn radius(&self) -> f64 {
        self.inner.radius()
    }

    #[getter]
    fn angle(&self) -> f64 {
        self.inner.angle()
    }

    #[setter(angle)]
    fn set_angle_prop(&self, angle: f64) -> PyResult<()> {
        self.inner.set_angle(angle).map_err(py_err)
    }

    #[getter]
    fn mass(&self) -> PyResult<f64> {
        self.inner.mass().map_err(py_err)
    }

    #[setter]
    fn set_mass(&self, mass: f64) -> PyResult<()> {
        self.inner.set_mass(mass).map_err(py_err)
    }

    #[getter]
    fn linear_velocity(&self) -> PyResult<PyVector> {
        self.inner.linear_velocity().map(Into::into).map_err(py_err)
    }

    #[setter]
    fn set_linear_velocity(&self, v: &Bound<'_, PyAny>) -> PyResult<()> {
        let v = vector_arg(v, "linear_velocity")?;
        self.inner.set_linear_velocity(v).map_err(py_err)
    }

    #[getter]
    fn angular_velocity(&self) -> PyResult<f64> {
        self.inner.angular_velocity().map_err(py_err)
    }

    #[setter]
    fn set_angular_velocity(&self, w: f64) -> PyResult<()> {
        self.inner.set_angular_velocity(w).map_err(py_err)
    }

    fn is_registered(&self) -> bool {
        self.inner.is_registered()
    }

    fn apply_force(&self, force: &Bound<'_, PyAny>) -> PyResult<()> {
        let force = vector_arg(force, "force")?;
        self.inner.apply_force(force).map_err(py_err)
    }

    fn apply_force_at(&self, force: &Bound<'_, PyAny>, point: &Bound<'_, PyAny>) -> PyResult<()> {
        let force = vector_arg(force, "force")?;
        let point = vector_arg(point, "point")?;
        self.inner.apply_force_at(force, point).map_err(py_err)
    }

    fn apply_impulse(&self, force: &Bound<'_, PyAny>, point: &Bound<'_, PyAny>) -> PyResult<()> {
        let force = vector_arg(force, "impulse")?;
        let point = vector_arg(point, "point")?;
        self.inner.apply_impulse(force, point).map_err(py_err)
    }

    fn apply_torque(&self, torque: f64) -> PyResult<()> {
        self.inner.apply_torque(torque).map_err(py_err)
    }

    fn set_position(&self, position: &Bound<'_, PyAny>) -> PyResult<()> {
        let position = vector_arg(position, "position")?;
        self.inner.set_position(position).map_err(py_err)
    }

    fn get_inertia(&self) -> PyResult<f64> {
        self.inner.inertia().map_err(py_err)
    }

    fn set_inertia(&self, inertia: f64) -> PyResult<()> {
        self.inner.set_inertia(inertia).map_err(py_err)
    }

    fn enable_collision(&self, enabled: bool) -> PyResult<()> {
        self.inner.enable_collision(enabled).map_err(py_err)
    }

    fn get_collision_group(&self) -> PyResult<u32> {
        self.inner.collision_group().map_err(py_err)
    }

    fn set_collision_group(&self, group: u32) -> PyResult<()> {
        self.inner.set_collision_group(group).map_err(py_err)
    }

    /// World-space vertices; empty list for circles.
    fn get_vertices(&self) -> PyResult<Vec<PyVector>> {
        let verts = self.inner.vertices().map_err(py_err)?;
        Ok(verts.into_iter().map(PyVector::from).collect())
    }

    /// (min_x, min_y, max_x, max_y) from the current pose.
    fn get_aabb(&self) -> PyResult<(f64, f64, f64, f64)> {
        self.inner.aabb().map(bounds_tuple).map_err(py_err)
    }

    fn __eq__(&self, other: PyRef<'_, Self>) -> bool {
        self.inner == other.inner
    }

    /// Consistent with `__eq__`: handles to the same body hash alike.
    fn __hash__(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.inner.hash(&mut hasher);
        hasher.finish()
    }

    fn __repr__(&self) -> String {
        format!("{:?}", self.inner)
    }
}

// ============ DistanceJoint ============

#[pyclass(name = "DistanceJoint", module = "rigidsim", unsendable)]
pub struct PyDistanceJoint {
    inner: DistanceJoint,
}

#[pymethods]
impl PyDistanceJoint {
    #[getter]
    fn kind(&self) -> i64 {
        self.inner.kind().code()
    }

    #[getter]
    fn length(&self) -> f64 {
        self.inner.length()
    }

    #[getter]
    fn anchor_a(&self) -> PyVector {
        self.inner.anchor_a().into()
    }

    #[getter]
    fn anchor_b(&self) -> PyVector {
        self.inner.anchor_b().into()
    }

    fn is_live(&self) -> bool {
        self.inner.is_live()
    }
}

// ============ World ============

/// Simulation world. Must outlive every handle that uses it.
#[pyclass(name = "World", module = "rigidsim", unsendable)]
pub struct PyWorld {
    inner: World,
}

#[pymethods]
impl PyWorld {
    #[new]
    fn new() -> Self {
        Self {
            inner: World::new(),
        }
    }

    /// Register `body` and return its identity.
    fn add(&mut self, body: &Bound<'_, PyAny>) -> PyResult<u16> {
        let body = body_arg(body, "body")?;
        self.inner.add(&body).map_err(py_err)
    }

    fn remove(&mut self, body: &Bound<'_, PyAny>) -> PyResult<()> {
        let body = body_arg(body, "body")?;
        self.inner.remove(&body).map_err(py_err)
    }

    fn add_constraint(&mut self, constraint: &Bound<'_, PyAny>) -> PyResult<()> {
        let joint = constraint
            .extract::<PyRef<'_, PyDistanceJoint>>()
            .map_err(|_| py_err(Error::TypeMismatch("constraint must be a DistanceJoint".into())))?;
        self.inner.add_constraint(&joint.inner).map_err(py_err)
    }

    fn remove_constraint(&mut self, constraint: &Bound<'_, PyAny>) -> PyResult<()> {
        let joint = constraint
            .extract::<PyRef<'_, PyDistanceJoint>>()
            .map_err(|_| py_err(Error::TypeMismatch("constraint must be a DistanceJoint".into())))?;
        self.inner.remove_constraint(&joint.inner).map_err(py_err)
    }

    fn clear(&mut self) {
        self.inner.clear();
    }

    /// Advance by `dt` seconds and refresh every registered body.
    ///
    /// Bodies dropped by the engine (kill bounds) disappear from `get_bodies()`.
    #[pyo3(signature = (dt, velocity_iters=10, position_iters=10, constraint_iters=10, substeps=1))]
    fn step(
        &mut self,
        dt: f64,
        velocity_iters: i64,
        position_iters: i64,
        constraint_iters: i64,
        substeps: i64,
    ) -> PyResult<()> {
        let v = iters_arg(velocity_iters, "velocity_iters")?;
        let p = iters_arg(position_iters, "position_iters")?;
        let c = iters_arg(constraint_iters, "constraint_iters")?;
        let s = iters_arg(substeps, "substeps")?;
        self.inner.step(dt, v, p, c, s).map_err(py_err)
    }

    fn get_bodies(&self) -> Vec<PyBody> {
        self.inner
            .bodies()
            .iter()
            .map(|b| PyBody { inner: b.clone() })
            .collect()
    }

    /// List of (kind, world_anchor_a, world_anchor_b).
    fn get_constraints(&self) -> Vec<(i64, PyVector, PyVector)> {
        self.inner
            .constraints()
            .into_iter()
            .map(|c| (c.kind.code(), c.anchor_a.into(), c.anchor_b.into()))
            .collect()
    }

    /// Return registered body positions as a NumPy array of shape (N, 2), dtype=float64.
    fn get_positions<'py>(&self, py: Python<'py>) -> PyResult<Py<PyArray2<f64>>> {
        let bodies = self.inner.bodies();
        let mut arr = Array2::<f64>::zeros((bodies.len(), 2));
        for (i, b) in bodies.iter().enumerate() {
            let p = b.position();
            arr[[i, 0]] = p.x;
            arr[[i, 1]] = p.y;
        }
        Ok(arr.into_pyarray(py).unbind())
    }

    fn body_count(&self) -> usize {
        self.inner.body_count()
    }

    fn constraint_count(&self) -> usize {
        self.inner.constraint_count()
    }

    fn __len__(&self) -> usize {
        self.inner.body_count()
    }

    /// Spatial hash config: bounds (min_x, min_y, max_x, max_y) and cell size.
    fn set_shg(&mut self, bounds: (f64, f64, f64, f64), cell_w: f64, cell_h: f64) -> PyResult<()> {
        let (x0, y0, x1, y1) = bounds;
        self.inner
            .set_grid_config(GridConfig {
                bounds: Aabb::new(x0, y0, x1, y1),
                cell_width: cell_w,
                cell_height: cell_h,
            })
            .map_err(py_err)
    }

    fn get_shg(&self) -> ((f64, f64, f64, f64), f64, f64) {
        let g = self.inner.grid_config();
        (bounds_tuple(g.bounds), g.cell_width, g.cell_height)
    }

    /// Bodies leaving this box are removed by the engine during `step`.
    fn set_kill_bounds(&mut self, bounds: (f64, f64, f64, f64)) -> PyResult<()> {
        let (x0, y0, x1, y1) = bounds;
        self.inner
            .set_kill_bounds(Aabb::new(x0, y0, x1, y1))
            .map_err(py_err)
    }

    fn get_kill_bounds(&self) -> (f64, f64, f64, f64) {
        bounds_tuple(self.inner.kill_bounds())
    }

    #[getter]
    fn gravity(&self) -> PyVector {
        self.inner.gravity().into()
    }

    #[setter]
    fn set_gravity(&mut self, gravity: &Bound<'_, PyAny>) -> PyResult<()> {
        let g = vector_arg(gravity, "gravity")?;
        self.inner.set_gravity(g).map_err(py_err)
    }

    /// Events since the last call, as ("body_removed", identity) tuples.
    fn drain_events(&mut self) -> Vec<(&'static str, u16)> {
        self.inner
            .drain_events()
            .into_iter()
            .map(|e| match e {
                WorldEvent::BodyRemoved { identity } => ("body_removed", identity),
            })
            .collect()
    }

    /// Stats of the last step as a dict, or None before the first step.
    fn last_step_stats<'py>(&self, py: Python<'py>) -> PyResult<Option<Py<PyDict>>> {
        let Some(s) = self.inner.last_step_stats() else {
            return Ok(None);
        };
        let out = PyDict::new(py);
        out.set_item("dt", s.dt)?;
        out.set_item("substeps", s.substeps)?;
        out.set_item("bodies", s.bodies)?;
        out.set_item("constraints", s.constraints)?;
        out.set_item("removed", s.removed)?;
        out.set_item("elapsed_ms", s.elapsed_ms)?;
        Ok(Some(out.unbind()))
    }
}

// ============ Factories ============

#[pyfunction]
fn make_vector(x: f64, y: f64) -> PyVector {
    Vector::new(x, y).into()
}

#[pyfunction]
#[allow(clippy::too_many_arguments)]
fn make_circle_body(
    kind: i64,
    x: f64,
    y: f64,
    angle: f64,
    density: f64,
    restitution: f64,
    friction: f64,
    radius: f64,
) -> PyResult<PyBody> {
    let material = Material {
        density,
        restitution,
        friction,
    };
    let inner = Body::circle(kind_arg(kind)?, Vector::new(x, y), angle, material, radius);
    Ok(PyBody { inner })
}

#[pyfunction]
#[allow(clippy::too_many_arguments)]
fn make_rect_body(
    kind: i64,
    x: f64,
    y: f64,
    angle: f64,
    density: f64,
    restitution: f64,
    friction: f64,
    width: f64,
    height: f64,
) -> PyResult<PyBody> {
    let material = Material {
        density,
        restitution,
        friction,
    };
    let inner = Body::rect(kind_arg(kind)?, Vector::new(x, y), angle, material, width, height);
    Ok(PyBody { inner })
}

#[pyfunction]
#[pyo3(signature = (kind, x, y, angle, density, restitution, friction, vertices, use_hull=false))]
#[allow(clippy::too_many_arguments)]
fn make_polygon_body(
    kind: i64,
    x: f64,
    y: f64,
    angle: f64,
    density: f64,
    restitution: f64,
    friction: f64,
    vertices: &Bound<'_, PyAny>,
    use_hull: bool,
) -> PyResult<PyBody> {
    let kind = kind_arg(kind)?;
    let vertices = vertices_arg(vertices)?;
    let material = Material {
        density,
        restitution,
        friction,
    };
    let inner = Body::polygon(kind, Vector::new(x, y), angle, material, vertices, use_hull)
        .map_err(py_err)?;
    Ok(PyBody { inner })
}

#[pyfunction]
fn make_distance_joint(
    body_a: &Bound<'_, PyAny>,
    body_b: &Bound<'_, PyAny>,
    anchor_a: &Bound<'_, PyAny>,
    anchor_b: &Bound<'_, PyAny>,
    length: f64,
) -> PyResult<PyDistanceJoint> {
    let a = body_arg(body_a, "body_a")?;
    let b = body_arg(body_b, "body_b")?;
    let anchor_a = vector_arg(anchor_a, "anchor_a")?;
    let anchor_b = vector_arg(anchor_b, "anchor_b")?;
    let inner = DistanceJoint::new(&a, &b, anchor_a, anchor_b, length).map_err(py_err)?;
    Ok(PyDistanceJoint { inner })
}

/// The rigidsim Python module entry point.
#[pymodule]
fn rigidsim(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let py = m.py();
    m.add_class::<PyVector>()?;
    m.add_class::<PyBody>()?;
    m.add_class::<PyDistanceJoint>()?;
    m.add_class::<PyWorld>()?;

    m.add_function(wrap_pyfunction!(make_vector, m)?)?;
    m.add_function(wrap_pyfunction!(make_circle_body, m)?)?;
    m.add_function(wrap_pyfunction!(make_rect_body, m)?)?;
    m.add_function(wrap_pyfunction!(make_polygon_body, m)?)?;
    m.add_function(wrap_pyfunction!(make_distance_joint, m)?)?;

    m.add("RigidSimError", py.get_type::<exceptions::RigidSimError>())?;
    m.add("ValidationError", py.get_type::<exceptions::ValidationError>())?;
    m.add("TypeMismatchError", py.get_type::<exceptions::TypeMismatchError>())?;
    m.add("NotRegisteredError", py.get_type::<exceptions::NotRegisteredError>())?;
    m.add("AlreadyRegisteredError", py.get_type::<exceptions::AlreadyRegisteredError>())?;
    m.add("InvalidValueError", py.get_type::<exceptions::InvalidValueError>())?;

    m.add("STATIC", crate::STATIC)?;
    m.add("DYNAMIC", crate::DYNAMIC)?;
    m.add("VERSION", crate::VERSION)?;
    m.add("ENGINE_VERSION", crate::ENGINE_VERSION)?;
    Ok(())
}
