use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rigidsim::{Body, BodyKind, Error, Material, ValidationError, Vector, World};

/// A circle's cached pose equals its creation parameters before any step.
#[test]
fn circle_pose_round_trip() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..200 {
        let x = rng.random_range(-1e3..1e3);
        let y = rng.random_range(-1e3..1e3);
        let angle = rng.random_range(-10.0..10.0);
        let radius = rng.random_range(0.01..50.0);
        let b = Body::circle(BodyKind::Dynamic, Vector::new(x, y), angle, Material::default(), radius);
        assert_eq!(b.position(), Vector::new(x, y));
        assert_eq!(b.angle(), angle);
        assert_eq!(b.radius(), radius);
    }
}

/// Identities are unassigned until `add` and unique among registered bodies,
/// including after interleaved removals.
#[test]
fn identities_stay_unique_under_churn() -> rigidsim::Result<()> {
    let mut rng = StdRng::seed_from_u64(7);
    let mut world = World::new();
    let mut live: Vec<Body> = Vec::new();

    for _ in 0..500 {
        if !live.is_empty() && rng.random_bool(0.4) {
            let idx = rng.random_range(0..live.len());
            let b = live.swap_remove(idx);
            world.remove(&b)?;
        } else {
            let b = Body::circle(
                BodyKind::Dynamic,
                Vector::new(rng.random_range(-50.0..50.0), 0.0),
                0.0,
                Material::default(),
                1.0,
            );
            assert_eq!(b.identity(), None);
            let id = world.add(&b)?;
            assert_eq!(b.identity(), Some(id));
            live.push(b);
        }

        let mut ids: Vec<u16> = world.bodies().iter().filter_map(Body::identity).collect();
        let n = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), n);
        assert_eq!(n, live.len());
    }
    Ok(())
}

/// Polygon input with fewer than three vertices fails and leaves the world untouched.
#[test]
fn short_polygons_never_reach_the_world() {
    let world = World::new();
    for verts in [vec![], vec![(0.0, 0.0)], vec![(0.0, 0.0), (1.0, 0.0)]] {
        for use_hull in [false, true] {
            let res = Body::polygon(
                BodyKind::Static,
                Vector::ZERO,
                0.0,
                Material::default(),
                verts.clone(),
                use_hull,
            );
            assert!(matches!(
                res,
                Err(Error::Validation(ValidationError::TooFewVertices { .. }))
            ));
        }
    }
    assert_eq!(world.body_count(), 0);
}

/// Convex hull mode drops interior points; plain mode keeps the ring as given.
#[test]
fn hull_mode_changes_the_vertex_ring() -> rigidsim::Result<()> {
    let pts = [(0.0, 0.0), (4.0, 0.0), (2.0, 1.0), (4.0, 4.0), (0.0, 4.0)];
    let plain = Body::polygon(BodyKind::Static, Vector::ZERO, 0.0, Material::default(), pts, false)?;
    let hull = Body::polygon(BodyKind::Static, Vector::ZERO, 0.0, Material::default(), pts, true)?;
    assert_eq!(plain.vertices()?.len(), 5);
    assert_eq!(hull.vertices()?.len(), 4);
    Ok(())
}

/// Hull input whose hull collapses below three vertices is rejected
/// instead of producing a massless body.
#[test]
fn degenerate_hull_input_is_rejected() {
    let inputs: [Vec<(f64, f64)>; 3] = [
        vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)],
        vec![(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0)],
        vec![(5.0, 5.0), (5.0, 5.0), (5.0, 5.0)],
    ];
    for pts in inputs {
        let res = Body::polygon(BodyKind::Dynamic, Vector::ZERO, 0.0, Material::default(), pts, true);
        assert!(matches!(
            res,
            Err(Error::Validation(ValidationError::TooFewVertices { got, min: 3 })) if got < 3
        ));
    }
}

/// Removing a body makes its motion operations fail and forbids re-adding.
#[test]
fn removed_handles_are_inert() -> rigidsim::Result<()> {
    let mut world = World::new();
    let b = Body::rect(BodyKind::Dynamic, Vector::new(1.0, 1.0), 0.0, Material::default(), 2.0, 2.0);
    world.add(&b)?;
    b.apply_force(Vector::new(1.0, 0.0))?;
    world.remove(&b)?;

    assert!(world.get_bodies().is_empty());
    assert!(matches!(b.apply_force(Vector::new(1.0, 0.0)), Err(Error::NotRegistered(_))));
    assert!(matches!(b.set_position(Vector::ZERO), Err(Error::NotRegistered(_))));
    assert!(matches!(world.add(&b), Err(Error::AlreadyRegistered(_))));
    assert_eq!(b.position(), Vector::new(1.0, 1.0));
    Ok(())
}

/// `clear` on an empty world is a no-op; on a populated one it retires every handle.
#[test]
fn clear_is_idempotent() -> rigidsim::Result<()> {
    let mut world = World::new();
    world.clear();
    assert!(world.get_bodies().is_empty());

    let a = Body::circle(BodyKind::Dynamic, Vector::ZERO, 0.0, Material::default(), 1.0);
    let b = Body::circle(BodyKind::Static, Vector::new(3.0, 0.0), 0.0, Material::default(), 1.0);
    world.add(&a)?;
    world.add(&b)?;
    world.clear();
    world.clear();
    assert!(world.get_bodies().is_empty());
    assert_eq!(world.constraint_count(), 0);
    assert!(matches!(a.apply_torque(1.0), Err(Error::NotRegistered(_))));

    // identities restart after a clear
    let c = Body::circle(BodyKind::Dynamic, Vector::ZERO, 0.0, Material::default(), 1.0);
    assert_eq!(world.add(&c)?, 1);
    Ok(())
}

/// Dropping the world invalidates every handle instead of leaving it dangling.
#[test]
fn dropped_world_invalidates_handles() -> rigidsim::Result<()> {
    let b = Body::circle(BodyKind::Dynamic, Vector::new(2.0, 3.0), 0.0, Material::default(), 1.0);
    {
        let mut world = World::new();
        world.add(&b)?;
        assert!(b.is_registered());
    }
    assert!(!b.is_registered());
    assert!(matches!(b.apply_force(Vector::ZERO), Err(Error::NotRegistered(_))));
    assert!(matches!(b.mass(), Err(Error::NotRegistered(_))));
    assert_eq!(b.position(), Vector::new(2.0, 3.0));
    Ok(())
}
