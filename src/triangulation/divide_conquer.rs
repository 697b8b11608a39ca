//! Divide-and-conquer Delaunay triangulation
//!
//! Bulk construction over a sorted 2D point set using the half-edge rotation
//! system. Points are sorted by (x, then y) and recursively split around the
//! median; halves are merged by finding the lower common tangent of the two
//! hulls and then repeatedly connecting the candidate edge that keeps the
//! merge Delaunay, deleting edges the in-circle test flags as illegal.
//!
//! The candidate-deletion loop runs on an explicit bounded work budget per
//! merge. If a pathological region exhausts its budget, that merge is
//! abandoned (the triangulation is still structurally valid, but may be
//! locally non-Delaunay) and the condition is reported through
//! [`Triangulation::abandoned_regions`].

use glam::Vec2;
use std::collections::HashSet;

use crate::error::{MeshError, Result};
use crate::geometry::{in_circle, orient2d};
use crate::topology::half_edge::{sym, EdgeIdx, HalfEdgeMesh};

/// Work budget multiplier per merge region (times the region's point count)
const MERGE_BUDGET_PER_POINT: usize = 64;

/// Result of a divide-and-conquer triangulation
///
/// Owns the half-edge scratch mesh. The two hull edges returned by the
/// recursion bound the convex hull at the left and right extremes; every
/// triangle is recoverable from face traversal via [`Triangulation::triangles`].
pub struct Triangulation {
    mesh: HalfEdgeMesh,
    /// Sorted positions the arena's point indices refer to
    positions: Vec<Vec2>,
    /// Original input index for each sorted slot
    original: Vec<usize>,
    /// Counter-clockwise hull edge out of the leftmost point
    left: EdgeIdx,
    /// Clockwise hull edge out of the rightmost point
    right: EdgeIdx,
    abandoned: usize,
}

impl Triangulation {
    /// The two half-edges bounding the convex hull at the extremes
    pub fn hull(&self) -> (EdgeIdx, EdgeIdx) {
        (self.left, self.right)
    }

    /// The underlying half-edge mesh
    pub fn mesh(&self) -> &HalfEdgeMesh {
        &self.mesh
    }

    /// Number of merge regions abandoned after exhausting their work budget
    ///
    /// Nonzero means the result may be locally non-Delaunay; it is still a
    /// structurally valid triangulation.
    pub fn abandoned_regions(&self) -> usize {
        self.abandoned
    }

    /// Extract every bounded triangular face
    ///
    /// Walks each live half-edge once and follows `Lnext` three times; a
    /// closed walk over three distinct origins is recorded under its sorted
    /// triple so each face appears exactly once. Output triples are indices
    /// into the original (pre-sort) input and wind counter-clockwise.
    pub fn triangles(&self) -> Vec<[usize; 3]> {
        let mut seen: HashSet<[u32; 3]> = HashSet::new();
        let mut out = Vec::new();

        for e in self.mesh.live_edges() {
            let e2 = self.mesh.lnext(e);
            let e3 = self.mesh.lnext(e2);
            if self.mesh.lnext(e3) != e {
                continue;
            }
            let a = self.mesh.org(e);
            let b = self.mesh.org(e2);
            let c = self.mesh.org(e3);
            if a == b || b == c || a == c {
                continue;
            }
            let mut key = [a, b, c];
            key.sort_unstable();
            if !seen.insert(key) {
                continue;
            }

            let pa = self.positions[a as usize];
            let pb = self.positions[b as usize];
            let pc = self.positions[c as usize];
            let area = orient2d(pa, pb, pc);
            if area == 0.0 {
                continue;
            }
            // Flip walks that came from the wrong side so output is CCW
            let (i, j, k) = if area > 0.0 { (a, b, c) } else { (a, c, b) };
            out.push([
                self.original[i as usize],
                self.original[j as usize],
                self.original[k as usize],
            ]);
        }
        out
    }
}

/// Triangulate a set of distinct 2D points
///
/// # Errors
///
/// Returns `InvalidInput` for fewer than 3 points or non-finite
/// coordinates. A fully collinear input is not an error: it degrades to the
/// open-chain hull edges with zero triangles.
pub fn triangulate(points: &[Vec2]) -> Result<Triangulation> {
    if points.len() < 3 {
        return Err(MeshError::InvalidInput(format!(
            "triangulation needs at least 3 points (got {})",
            points.len()
        )));
    }
    if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(MeshError::InvalidInput(
            "triangulation input contains non-finite coordinates".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&i, &j| {
        let (a, b) = (points[i], points[j]);
        a.x.partial_cmp(&b.x)
            .unwrap()
            .then(a.y.partial_cmp(&b.y).unwrap())
    });
    let positions: Vec<Vec2> = order.iter().map(|&i| points[i]).collect();

    let mut builder = Builder {
        mesh: HalfEdgeMesh::with_capacity(points.len() * 3),
        positions: &positions,
        abandoned: 0,
    };
    let (left, right) = builder.build(0, positions.len());
    let Builder {
        mesh, abandoned, ..
    } = builder;

    Ok(Triangulation {
        mesh,
        positions,
        original: order,
        left,
        right,
        abandoned,
    })
}

struct Builder<'a> {
    mesh: HalfEdgeMesh,
    positions: &'a [Vec2],
    abandoned: usize,
}

impl<'a> Builder<'a> {
    #[inline]
    fn pos(&self, point: u32) -> Vec2 {
        self.positions[point as usize]
    }

    /// True if `point` lies strictly left of the directed edge `e`
    #[inline]
    fn left_of(&self, point: u32, e: EdgeIdx) -> bool {
        orient2d(
            self.pos(point),
            self.pos(self.mesh.org(e)),
            self.pos(self.mesh.dst(e)),
        ) > 0.0
    }

    /// True if `point` lies strictly right of the directed edge `e`
    #[inline]
    fn right_of(&self, point: u32, e: EdgeIdx) -> bool {
        orient2d(
            self.pos(point),
            self.pos(self.mesh.dst(e)),
            self.pos(self.mesh.org(e)),
        ) > 0.0
    }

    /// A merge candidate is usable while its far endpoint stays above the
    /// base edge
    #[inline]
    fn valid(&self, e: EdgeIdx, basel: EdgeIdx) -> bool {
        self.right_of(self.mesh.dst(e), basel)
    }

    #[inline]
    fn in_circle_pts(&self, a: u32, b: u32, c: u32, d: u32) -> bool {
        in_circle(self.pos(a), self.pos(b), self.pos(c), self.pos(d)) > 0.0
    }

    /// Triangulate the sorted slot range `[lo, hi)`; returns the
    /// counter-clockwise hull edge out of the leftmost point and the
    /// clockwise hull edge out of the rightmost point
    fn build(&mut self, lo: usize, hi: usize) -> (EdgeIdx, EdgeIdx) {
        let n = hi - lo;
        debug_assert!(n >= 2);

        if n == 2 {
            let e = self.mesh.make_edge(lo as u32, (lo + 1) as u32);
            return (e, sym(e));
        }

        if n == 3 {
            let (p0, p1, p2) = (lo as u32, (lo + 1) as u32, (lo + 2) as u32);
            let a = self.mesh.make_edge(p0, p1);
            let b = self.mesh.make_edge(p1, p2);
            self.mesh.splice(sym(a), b);

            let ct = orient2d(self.pos(p0), self.pos(p1), self.pos(p2));
            if ct > 0.0 {
                self.mesh.connect(b, a);
                return (a, sym(b));
            } else if ct < 0.0 {
                let c = self.mesh.connect(b, a);
                return (sym(c), c);
            }
            // Collinear triple: open chain, no triangle
            return (a, sym(b));
        }

        let mid = lo + n / 2;
        let (mut ldo, mut ldi) = self.build(lo, mid);
        let (mut rdi, mut rdo) = self.build(mid, hi);

        // Lower common tangent of the two hulls
        loop {
            if self.left_of(self.mesh.org(rdi), ldi) {
                ldi = self.mesh.lnext(ldi);
            } else if self.right_of(self.mesh.org(ldi), rdi) {
                rdi = self.mesh.rprev(rdi);
            } else {
                break;
            }
        }

        let mut basel = self.mesh.connect(sym(rdi), ldi);
        if self.mesh.org(ldi) == self.mesh.org(ldo) {
            ldo = sym(basel);
        }
        if self.mesh.org(rdi) == self.mesh.org(rdo) {
            rdo = basel;
        }

        // Rising-bubble merge with a bounded work budget
        let mut budget = MERGE_BUDGET_PER_POINT * n;
        loop {
            // First candidate on the left side; delete edges that fail the
            // in-circle test against the next candidate out
            let mut lcand = self.mesh.onext(sym(basel));
            if self.valid(lcand, basel) {
                while self.in_circle_pts(
                    self.mesh.dst(basel),
                    self.mesh.org(basel),
                    self.mesh.dst(lcand),
                    self.mesh.dst(self.mesh.onext(lcand)),
                ) {
                    if budget == 0 {
                        break;
                    }
                    budget -= 1;
                    let next = self.mesh.onext(lcand);
                    self.mesh.delete_edge(lcand);
                    lcand = next;
                }
            }

            // Symmetrically on the right side
            let mut rcand = self.mesh.oprev(basel);
            if self.valid(rcand, basel) {
                while self.in_circle_pts(
                    self.mesh.dst(basel),
                    self.mesh.org(basel),
                    self.mesh.dst(rcand),
                    self.mesh.dst(self.mesh.oprev(rcand)),
                ) {
                    if budget == 0 {
                        break;
                    }
                    budget -= 1;
                    let next = self.mesh.oprev(rcand);
                    self.mesh.delete_edge(rcand);
                    rcand = next;
                }
            }

            let l_valid = self.valid(lcand, basel);
            let r_valid = self.valid(rcand, basel);
            if !l_valid && !r_valid {
                break;
            }
            if budget == 0 {
                self.abandoned += 1;
                break;
            }
            budget -= 1;

            // Pick the side whose candidate survives the cross in-circle
            // comparison and advance the base edge across it
            if !l_valid
                || (r_valid
                    && self.in_circle_pts(
                        self.mesh.dst(lcand),
                        self.mesh.org(lcand),
                        self.mesh.org(rcand),
                        self.mesh.dst(rcand),
                    ))
            {
                basel = self.mesh.connect(rcand, sym(basel));
            } else {
                basel = self.mesh.connect(sym(basel), sym(lcand));
            }
        }

        (ldo, rdo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use std::collections::HashSet;

    /// Boundary edges appear in exactly one triangle; their endpoint count
    /// is the hull point count for a triangulated general-position set.
    fn hull_point_count(triangles: &[[usize; 3]]) -> usize {
        let mut edge_uses: std::collections::HashMap<(usize, usize), usize> =
            std::collections::HashMap::new();
        for t in triangles {
            for (i, j) in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
                let key = (i.min(j), i.max(j));
                *edge_uses.entry(key).or_insert(0) += 1;
            }
        }
        let mut hull_points = HashSet::new();
        for ((i, j), uses) in edge_uses {
            assert!(uses <= 2, "edge ({}, {}) used {} times", i, j, uses);
            if uses == 1 {
                hull_points.insert(i);
                hull_points.insert(j);
            }
        }
        hull_points.len()
    }

    /// 5x6 grid with deterministic tangential jitter: general position,
    /// comfortably separated points
    fn jittered_grid() -> Vec<Vec2> {
        let mut points = Vec::new();
        for i in 0..5 {
            for j in 0..6 {
                // Pseudo-jitter from a small LCG so the layout is fixed
                let h = (i * 31 + j * 17 + 7) % 13;
                let dx = (h as f32 / 13.0 - 0.5) * 0.4;
                let dy = ((h * 5 % 11) as f32 / 11.0 - 0.5) * 0.4;
                points.push(Vec2::new(i as f32 + dx, j as f32 + dy));
            }
        }
        points
    }

    #[test]
    fn test_three_points_one_ccw_triangle() {
        let points = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
        ];
        let tri = triangulate(&points).unwrap();
        let faces = tri.triangles();

        assert_eq!(faces.len(), 1);
        let [a, b, c] = faces[0];
        assert!(orient2d(points[a], points[b], points[c]) > 0.0);
        assert_eq!(tri.abandoned_regions(), 0);
        assert!(tri.mesh().check().is_empty());
    }

    #[test]
    fn test_two_points_is_invalid_input() {
        let points = vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0)];
        assert!(matches!(
            triangulate(&points),
            Err(MeshError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_collinear_points_give_zero_triangles() {
        let points = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(2.0, 0.0),
        ];
        let tri = triangulate(&points).unwrap();
        assert!(tri.triangles().is_empty());
    }

    #[test]
    fn test_many_collinear_points_give_zero_triangles() {
        let points: Vec<Vec2> = (0..9).map(|i| Vec2::new(i as f32, 2.0 * i as f32)).collect();
        let tri = triangulate(&points).unwrap();
        assert!(tri.triangles().is_empty());
        assert!(tri.mesh().check().is_empty());
    }

    #[test]
    fn test_square_gives_two_triangles() {
        let points = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        let tri = triangulate(&points).unwrap();
        let faces = tri.triangles();

        assert_eq!(faces.len(), 2);
        // Both triangles wind CCW and every edge bounds at most two
        for t in &faces {
            assert!(orient2d(points[t[0]], points[t[1]], points[t[2]]) > 0.0);
        }
        assert_eq!(hull_point_count(&faces), 4);
    }

    #[test]
    fn test_quad_picks_in_circle_diagonal() {
        // Not cocircular: the in-circle test forces the diagonal from the
        // wide corner (0, 0) to (1.5, 1.0)
        let points = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(1.5, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        let tri = triangulate(&points).unwrap();
        let faces = tri.triangles();
        assert_eq!(faces.len(), 2);

        let mut edges = HashSet::new();
        for t in &faces {
            for (i, j) in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
                edges.insert((i.min(j), i.max(j)));
            }
        }
        assert!(edges.contains(&(0, 2)), "expected diagonal 0-2, got {:?}", edges);
        assert!(!edges.contains(&(1, 3)));
    }

    #[test]
    fn test_square_plus_center_gives_four_triangles() {
        let points = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(0.5, 0.5),
        ];
        let tri = triangulate(&points).unwrap();
        let faces = tri.triangles();

        assert_eq!(faces.len(), 4);
        assert_eq!(hull_point_count(&faces), 4);
        // Every triangle uses the center point
        for t in &faces {
            assert!(t.contains(&4), "triangle {:?} misses the center", t);
        }
    }

    #[test]
    fn test_euler_count_on_jittered_grid() {
        let points = jittered_grid();
        let tri = triangulate(&points).unwrap();
        let faces = tri.triangles();

        let n = points.len();
        let h = hull_point_count(&faces);
        assert_eq!(
            faces.len(),
            2 * n - 2 - h,
            "n={} h={} triangles={}",
            n,
            h,
            faces.len()
        );
        assert_eq!(tri.abandoned_regions(), 0);
        assert!(tri.mesh().check().is_empty());
    }

    #[test]
    fn test_delaunay_empty_circumcircle_property() {
        let points = jittered_grid();
        let tri = triangulate(&points).unwrap();
        let faces = tri.triangles();

        for t in &faces {
            let (a, b, c) = (points[t[0]], points[t[1]], points[t[2]]);
            for (i, &d) in points.iter().enumerate() {
                if t.contains(&i) {
                    continue;
                }
                let det = in_circle(a, b, c, d);
                assert!(
                    det < 1e-2,
                    "point {} inside circumcircle of {:?} (det {})",
                    i,
                    t,
                    det
                );
            }
        }
    }

    #[test]
    fn test_order_independence() {
        let points = jittered_grid();
        let mut shuffled = points.clone();
        shuffled.reverse();
        shuffled.swap(3, 11);
        shuffled.swap(7, 23);

        let tris_a = triangulate(&points).unwrap().triangles();
        let tris_b = triangulate(&shuffled).unwrap().triangles();

        let canonical = |faces: &[[usize; 3]], pts: &[Vec2]| -> HashSet<String> {
            faces
                .iter()
                .map(|t| {
                    let mut coords: Vec<(i64, i64)> = t
                        .iter()
                        .map(|&i| {
                            ((pts[i].x * 1e4).round() as i64, (pts[i].y * 1e4).round() as i64)
                        })
                        .collect();
                    coords.sort_unstable();
                    format!("{:?}", coords)
                })
                .collect()
        };

        assert_eq!(canonical(&tris_a, &points), canonical(&tris_b, &shuffled));
    }

    #[test]
    fn test_non_finite_input_rejected() {
        let points = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(f32::NAN, 0.0),
            Vec2::new(0.0, 1.0),
        ];
        assert!(triangulate(&points).is_err());
    }
}
