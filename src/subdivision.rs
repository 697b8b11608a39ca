//! Geodesic subdivision of the icosahedron
//!
//! Builds the base mesh that seeds the topology store: a regular
//! icosahedron whose faces are repeatedly split into a barycentric grid of
//! smaller triangles, with a configurable (not necessarily doubling) number
//! of new vertices per edge per level and a pluggable spacing strategy.
//!
//! Points shared between adjacent faces are generated in a canonical edge
//! direction and deduplicated by position lookup through the store, so the
//! resulting mesh is crack-free.

use glam::Vec3;
use std::time::Instant;

use crate::config::{PointDistribution, SubdivisionLevel};
use crate::error::{MeshError, Result};
use crate::geometry::triangle_normal;
use crate::topology::{PointId, TopologyStore};

/// Golden ratio φ = (1 + √5) / 2
const PHI: f32 = 1.618033988749895;

/// Face index table of the regular icosahedron (counter-clockwise viewed
/// from outside)
pub const ICOSAHEDRON_FACES: [[usize; 3]; 20] = [
    [0, 11, 5],
    [0, 5, 1],
    [0, 1, 7],
    [0, 7, 10],
    [0, 10, 11],
    [1, 5, 9],
    [5, 11, 4],
    [11, 10, 2],
    [10, 7, 6],
    [7, 1, 8],
    [3, 9, 4],
    [3, 4, 2],
    [3, 2, 6],
    [3, 6, 8],
    [3, 8, 9],
    [4, 9, 5],
    [2, 4, 11],
    [6, 2, 10],
    [8, 6, 7],
    [9, 8, 1],
];

/// The 12 vertices of a regular icosahedron scaled to `radius`
pub fn icosahedron_points(radius: f32) -> Vec<Vec3> {
    let raw = [
        Vec3::new(-1.0, PHI, 0.0),
        Vec3::new(1.0, PHI, 0.0),
        Vec3::new(-1.0, -PHI, 0.0),
        Vec3::new(1.0, -PHI, 0.0),
        Vec3::new(0.0, -1.0, PHI),
        Vec3::new(0.0, 1.0, PHI),
        Vec3::new(0.0, -1.0, -PHI),
        Vec3::new(0.0, 1.0, -PHI),
        Vec3::new(PHI, 0.0, -1.0),
        Vec3::new(PHI, 0.0, 1.0),
        Vec3::new(-PHI, 0.0, -1.0),
        Vec3::new(-PHI, 0.0, 1.0),
    ];
    raw.iter().map(|v| v.normalize() * radius).collect()
}

/// Parameter fractions along one edge for `segments` segments
///
/// Returns `segments + 1` values from 0 to 1 inclusive. Linear spacing is
/// even; geometric spacing makes each segment `ratio` times the previous
/// one (a ratio of 1 degenerates to linear).
fn edge_fractions(segments: usize, distribution: PointDistribution) -> Vec<f32> {
    let n = segments as f32;
    match distribution {
        PointDistribution::Geometric { ratio } if (ratio - 1.0).abs() > 1e-6 => {
            let total = (ratio.powi(segments as i32) - 1.0) / (ratio - 1.0);
            (0..=segments)
                .map(|k| (ratio.powi(k as i32) - 1.0) / (ratio - 1.0) / total)
                .collect()
        }
        _ => (0..=segments).map(|k| k as f32 / n).collect(),
    }
}

/// Build the subdivided base mesh into the store
///
/// Registers the icosahedron's points, applies each subdivision level to
/// every current face, and registers the final faces (edges and triangles)
/// through the store facade with counter-clockwise winding as seen from
/// outside the sphere.
///
/// # Errors
///
/// Returns `InvalidInput` for a non-positive radius or an empty schedule;
/// registration errors from the store propagate unchanged.
pub fn build_base_mesh(
    store: &TopologyStore,
    radius: f32,
    levels: &[SubdivisionLevel],
) -> Result<()> {
    if radius <= 0.0 {
        return Err(MeshError::InvalidInput(format!(
            "subdivision radius must be positive (got {})",
            radius
        )));
    }
    if levels.is_empty() {
        return Err(MeshError::InvalidInput(
            "subdivision schedule must have at least one level".to_string(),
        ));
    }

    let start = Instant::now();
    let corner_ids: Vec<PointId> = icosahedron_points(radius)
        .into_iter()
        .map(|p| store.get_or_create_point(p).id)
        .collect();
    let mut faces: Vec<[PointId; 3]> = ICOSAHEDRON_FACES
        .iter()
        .map(|f| [corner_ids[f[0]], corner_ids[f[1]], corner_ids[f[2]]])
        .collect();

    for (index, level) in levels.iter().enumerate() {
        let level_start = Instant::now();
        let segments = level.vertices_per_edge + 1;
        let fractions = edge_fractions(segments, level.distribution);

        let mut next_faces = Vec::with_capacity(faces.len() * segments * segments);
        for face in &faces {
            subdivide_face(store, radius, *face, &fractions, &mut next_faces)?;
        }
        faces = next_faces;

        eprintln!(
            "[Subdivide] Level {}/{}: {} face(s), {} point(s), {:?}",
            index + 1,
            levels.len(),
            faces.len(),
            store.point_count(),
            level_start.elapsed()
        );
    }

    for face in faces {
        store.add_triangle(orient_outward(store, face)?)?;
    }

    eprintln!(
        "[Subdivide] Finished: {} point(s), {} edge(s), {} triangle(s), {:?}",
        store.point_count(),
        store.edge_count(),
        store.triangle_count(),
        start.elapsed()
    );
    Ok(())
}

/// Split one face into a barycentric grid and append the child faces
fn subdivide_face(
    store: &TopologyStore,
    radius: f32,
    face: [PointId; 3],
    fractions: &[f32],
    out: &mut Vec<[PointId; 3]>,
) -> Result<()> {
    let segments = fractions.len() - 1;
    let [a, b, c] = face;
    let pa = corner_position(store, a)?;
    let pb = corner_position(store, b)?;
    let pc = corner_position(store, c)?;

    let ab = edge_point_ids(store, radius, (a, pa), (b, pb), fractions);
    let ac = edge_point_ids(store, radius, (a, pa), (c, pc), fractions);
    let bc = edge_point_ids(store, radius, (b, pb), (c, pc), fractions);

    // Row i runs from the a-b edge point to the a-c edge point at the same
    // depth; interior slots are filled with barycentric interpolation.
    let mut rows: Vec<Vec<PointId>> = Vec::with_capacity(segments + 1);
    rows.push(vec![a]);
    for i in 1..segments {
        let ti = fractions[i];
        let left = pa.lerp(pb, ti);
        let right = pa.lerp(pc, ti);
        let mut row = Vec::with_capacity(i + 1);
        row.push(ab[i - 1]);
        for j in 1..i {
            let w = fractions[j] / ti;
            let position = left.lerp(right, w).normalize() * radius;
            row.push(store.get_or_create_point(position).id);
        }
        row.push(ac[i - 1]);
        rows.push(row);
    }
    let mut bottom = Vec::with_capacity(segments + 1);
    bottom.push(b);
    bottom.extend_from_slice(&bc);
    bottom.push(c);
    rows.push(bottom);

    for i in 0..segments {
        for j in 0..=i {
            out.push([rows[i][j], rows[i + 1][j], rows[i + 1][j + 1]]);
        }
        for j in 0..i {
            out.push([rows[i][j], rows[i + 1][j + 1], rows[i][j + 1]]);
        }
    }
    Ok(())
}

fn corner_position(store: &TopologyStore, id: PointId) -> Result<Vec3> {
    store
        .point(id)
        .map(|p| p.position)
        .ok_or_else(|| MeshError::TopologyError(format!("face corner {} not registered", id)))
}

/// Interior points along one edge, in the face's traversal direction
///
/// Points are generated in the canonical direction (smaller point identity
/// first) so adjacent faces produce bit-identical positions, then reversed
/// when the face traverses the edge the other way. Deduplication happens in
/// the store's position lookup.
fn edge_point_ids(
    store: &TopologyStore,
    radius: f32,
    from: (PointId, Vec3),
    to: (PointId, Vec3),
    fractions: &[f32],
) -> Vec<PointId> {
    let segments = fractions.len() - 1;
    let flip = from.0 > to.0;
    let (lo, hi) = if flip {
        (to.1, from.1)
    } else {
        (from.1, to.1)
    };

    let mut ids: Vec<PointId> = (1..segments)
        .map(|k| {
            let position = lo.lerp(hi, fractions[k]).normalize() * radius;
            store.get_or_create_point(position).id
        })
        .collect();
    if flip {
        ids.reverse();
    }
    ids
}

/// Orient a face counter-clockwise as seen from outside the sphere
fn orient_outward(store: &TopologyStore, face: [PointId; 3]) -> Result<[PointId; 3]> {
    let pa = corner_position(store, face[0])?;
    let pb = corner_position(store, face[1])?;
    let pc = corner_position(store, face[2])?;
    let outward = (pa + pb + pc) / 3.0;
    if triangle_normal(pa, pb, pc).dot(outward) < 0.0 {
        Ok([face[0], face[2], face[1]])
    } else {
        Ok(face)
    }
}
