//! Stateless geometric predicates
//!
//! Pure functions over bare coordinates: orientation, the in-circle test,
//! and circumcenters in 2D and 3D. No shared state, no allocation.
//!
//! # Sign conventions
//!
//! `orient2d` is positive for counter-clockwise triples, and `in_circle` is
//! positive when the query point lies strictly inside the circumcircle of a
//! counter-clockwise triple. The two conventions are paired: reversing the
//! orientation of the triple flips the sign of both, so legality decisions
//! made from one are always consistent with the other.

use glam::{Vec2, Vec3};

/// Denominators smaller than this are treated as degenerate
const DEGENERACY_EPSILON: f32 = 1e-12;

/// Signed area of the parallelogram spanned by (b - a) and (c - a)
///
/// Positive when (a, b, c) wind counter-clockwise, negative when clockwise,
/// zero when collinear.
#[inline]
pub fn orient2d(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Returns true if (a, b, c) wind counter-clockwise
#[inline]
pub fn is_ccw(a: Vec2, b: Vec2, c: Vec2) -> bool {
    orient2d(a, b, c) > 0.0
}

/// Lifted-paraboloid in-circle determinant
///
/// For a counter-clockwise triple (a, b, c), the result is positive exactly
/// when `d` lies strictly inside the circumcircle of the triple, negative
/// when outside, and zero when all four points are cocircular. Reversing
/// the orientation of (a, b, c) flips the sign.
pub fn in_circle(a: Vec2, b: Vec2, c: Vec2, d: Vec2) -> f32 {
    let adx = a.x - d.x;
    let ady = a.y - d.y;
    let bdx = b.x - d.x;
    let bdy = b.y - d.y;
    let cdx = c.x - d.x;
    let cdy = c.y - d.y;

    let ab_det = adx * bdy - bdx * ady;
    let bc_det = bdx * cdy - cdx * bdy;
    let ca_det = cdx * ady - adx * cdy;

    let a_lift = adx * adx + ady * ady;
    let b_lift = bdx * bdx + bdy * bdy;
    let c_lift = cdx * cdx + cdy * cdy;

    a_lift * bc_det + b_lift * ca_det + c_lift * ab_det
}

/// Returns true if `d` lies strictly inside the circumcircle of the
/// counter-clockwise triple (a, b, c)
#[inline]
pub fn in_circumcircle(a: Vec2, b: Vec2, c: Vec2, d: Vec2) -> bool {
    in_circle(a, b, c, d) > 0.0
}

/// Circumcenter of a 2D triangle
///
/// The point equidistant from all three vertices. Returns `None` when the
/// triangle is degenerate (collinear vertices make the denominator vanish).
pub fn circumcenter2(a: Vec2, b: Vec2, c: Vec2) -> Option<Vec2> {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d.abs() < DEGENERACY_EPSILON {
        return None;
    }

    let a2 = a.length_squared();
    let b2 = b.length_squared();
    let c2 = c.length_squared();

    let ux = (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d;
    let uy = (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d;
    Some(Vec2::new(ux, uy))
}

/// Circumcenter of a triangle embedded in 3D
///
/// Computed via the vector formula using cross products of the triangle's
/// edge vectors, added to one vertex. Returns `None` when the triangle is
/// degenerate (zero-area cross product).
pub fn circumcenter3(a: Vec3, b: Vec3, c: Vec3) -> Option<Vec3> {
    let ab = b - a;
    let ac = c - a;
    let normal = ab.cross(ac);
    let n2 = normal.length_squared();
    if n2 < DEGENERACY_EPSILON {
        return None;
    }

    let offset = (ac.length_squared() * normal.cross(ab) + ab.length_squared() * ac.cross(normal))
        / (2.0 * n2);
    Some(a + offset)
}

/// Face normal of a 3D triangle (not normalized)
///
/// The cross product of the triangle's edge vectors; its direction follows
/// the right-hand rule over the vertex order. Callers only use the sign of
/// dot products against it, so the magnitude is left as-is.
#[inline]
pub fn triangle_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    (b - a).cross(c - a)
}
