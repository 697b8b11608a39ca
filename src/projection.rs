//! Tangent-plane projection for near-planar 3D clusters
//!
//! Maps a cluster of roughly co-planar 3D points (typically the
//! circumcenters of all triangles around one base vertex) into 2D via a
//! locally constructed orthonormal basis, triangulates the 2D set with the
//! divide-and-conquer engine, then lifts the result back to the original
//! 3D points with winding made consistent against the supplied reference
//! normal.

use glam::{Vec2, Vec3};

use crate::error::{MeshError, Result};
use crate::geometry::triangle_normal;
use crate::triangulation::divide_conquer;

/// Build an orthonormal basis (u, v) spanning the plane perpendicular to
/// `normal`
///
/// `u` is derived from whichever axis is safely non-parallel to the normal,
/// `v` completes the right-handed frame.
pub fn tangent_basis(normal: Vec3) -> (Vec3, Vec3) {
    let reference = if normal.x.abs() > 0.5 {
        Vec3::new(0.0, 1.0, 0.0)
    } else {
        Vec3::new(1.0, 0.0, 0.0)
    };
    let u = reference.cross(normal).normalize();
    let v = normal.cross(u).normalize();
    (u, v)
}

/// Triangulate a near-planar 3D cluster in its tangent plane
///
/// Projects every point to (u, v) coordinates relative to the first point,
/// merges near-duplicates within `tolerance`, runs the divide-and-conquer
/// engine on the 2D set, and lifts the triangles back to indices into the
/// input slice. Output triangles are wound so their 3D face normal agrees
/// with `normal` (any triangle disagreeing by more than 90 degrees has its
/// vertex order flipped).
///
/// # Errors
///
/// Returns `InvalidInput` when the reference normal is degenerate or fewer
/// than 3 distinct points remain after merging near-duplicates. A fully
/// collinear cluster is not an error: it produces zero triangles.
pub fn triangulate_cluster(
    points: &[Vec3],
    normal: Vec3,
    tolerance: f32,
) -> Result<Vec<[usize; 3]>> {
    if points.len() < 3 {
        return Err(MeshError::InvalidInput(format!(
            "tangent-plane cluster needs at least 3 points (got {})",
            points.len()
        )));
    }
    let normal = normal.normalize_or_zero();
    if normal == Vec3::ZERO {
        return Err(MeshError::InvalidInput(
            "tangent-plane reference normal is degenerate".to_string(),
        ));
    }

    let (u, v) = tangent_basis(normal);
    let origin = points[0];
    let projected: Vec<Vec2> = points
        .iter()
        .map(|&p| {
            let rel = p - origin;
            Vec2::new(rel.dot(u), rel.dot(v))
        })
        .collect();

    // Merge near-duplicate projections onto a representative. Clusters are
    // small (one per incident triangle of a base vertex), so the quadratic
    // scan is fine.
    let mut kept: Vec<Vec2> = Vec::new();
    let mut kept_original: Vec<usize> = Vec::new();
    for (i, &p) in projected.iter().enumerate() {
        if !kept.iter().any(|&q| q.distance(p) <= tolerance) {
            kept.push(p);
            kept_original.push(i);
        }
    }
    if kept.len() < 3 {
        return Err(MeshError::InvalidInput(format!(
            "tangent-plane cluster collapses to {} distinct point(s)",
            kept.len()
        )));
    }

    let triangulation = divide_conquer::triangulate(&kept)?;
    let mut out = Vec::new();
    for tri in triangulation.triangles() {
        let [i, j, k] = [
            kept_original[tri[0]],
            kept_original[tri[1]],
            kept_original[tri[2]],
        ];
        let face = triangle_normal(points[i], points[j], points[k]);
        if face.dot(normal) < 0.0 {
            out.push([i, k, j]);
        } else {
            out.push([i, j, k]);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basis_is_orthonormal() {
        for normal in [Vec3::X, Vec3::Y, Vec3::Z, Vec3::new(1.0, 2.0, -0.5).normalize()] {
            let (u, v) = tangent_basis(normal);
            assert!(u.dot(normal).abs() < 1e-6);
            assert!(v.dot(normal).abs() < 1e-6);
            assert!(u.dot(v).abs() < 1e-6);
            assert!((u.length() - 1.0).abs() < 1e-6);
            assert!((v.length() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_planar_square_gives_two_triangles() {
        let points = vec![
            Vec3::new(0.0, 0.0, 2.0),
            Vec3::new(1.0, 0.0, 2.0),
            Vec3::new(1.0, 1.0, 2.0),
            Vec3::new(0.0, 1.0, 2.0),
        ];
        let triangles = triangulate_cluster(&points, Vec3::Z, 1e-5).unwrap();
        assert_eq!(triangles.len(), 2);
        for t in &triangles {
            let n = triangle_normal(points[t[0]], points[t[1]], points[t[2]]);
            assert!(n.dot(Vec3::Z) > 0.0, "triangle {:?} winds against normal", t);
        }
    }

    #[test]
    fn test_winding_follows_reference_normal() {
        let points = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        // Same cluster, opposite reference normals
        let up = triangulate_cluster(&points, Vec3::Z, 1e-5).unwrap();
        let down = triangulate_cluster(&points, -Vec3::Z, 1e-5).unwrap();

        let n_up = triangle_normal(points[up[0][0]], points[up[0][1]], points[up[0][2]]);
        let n_down = triangle_normal(points[down[0][0]], points[down[0][1]], points[down[0][2]]);
        assert!(n_up.z > 0.0);
        assert!(n_down.z < 0.0);
    }

    #[test]
    fn test_tilted_cluster_triangulates() {
        // Hexagon in a tilted plane plus its center
        let normal = Vec3::new(1.0, 1.0, 1.0).normalize();
        let (u, v) = tangent_basis(normal);
        let center = normal * 5.0;
        let mut points = vec![center];
        for i in 0..6 {
            let angle = i as f32 * std::f32::consts::TAU / 6.0;
            points.push(center + u * angle.cos() + v * angle.sin());
        }

        let triangles = triangulate_cluster(&points, normal, 1e-5).unwrap();
        assert_eq!(triangles.len(), 6);
        for t in &triangles {
            let n = triangle_normal(points[t[0]], points[t[1]], points[t[2]]);
            assert!(n.dot(normal) > 0.0);
        }
    }

    #[test]
    fn test_near_duplicates_are_merged() {
        let points = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 1e-7, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let triangles = triangulate_cluster(&points, Vec3::Z, 1e-5).unwrap();
        assert_eq!(triangles.len(), 1);
    }

    #[test]
    fn test_collapsed_cluster_is_invalid_input() {
        let points = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1e-7, 0.0, 0.0),
            Vec3::new(0.0, 1e-7, 0.0),
        ];
        assert!(triangulate_cluster(&points, Vec3::Z, 1e-5).is_err());
    }

    #[test]
    fn test_collinear_cluster_gives_zero_triangles() {
        let points = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
        ];
        let triangles = triangulate_cluster(&points, Vec3::Z, 1e-5).unwrap();
        assert!(triangles.is_empty());
    }

    #[test]
    fn test_too_few_points_rejected() {
        let points = vec![Vec3::ZERO, Vec3::X];
        assert!(triangulate_cluster(&points, Vec3::Z, 1e-5).is_err());
    }

    #[test]
    fn test_zero_normal_rejected() {
        let points = vec![Vec3::ZERO, Vec3::X, Vec3::Y];
        assert!(triangulate_cluster(&points, Vec3::ZERO, 1e-5).is_err());
    }
}
