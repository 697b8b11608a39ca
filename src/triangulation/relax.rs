//! Incremental flip-based mesh relaxation
//!
//! Smooths an existing base mesh in place: sampled points have their
//! incident edges examined for a bounded-distortion diagonal swap, then a
//! few Laplacian passes pull every point toward the centroid of its
//! incident triangles. Used to even out the geodesic base mesh, not for
//! bulk construction.
//!
//! Work is sharded into a small number of scoped worker threads, each
//! processing a disjoint slice of the cycle's point sample. Every registry
//! mutation funnels through the topology store's lock; a flip is atomic
//! because the store holds the lock for the whole remove-then-add sequence.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{HashSet, VecDeque};
use std::time::Instant;

use crate::config::RelaxOptions;
use crate::error::{MeshError, Result};
use crate::topology::{EdgeKey, PointId, TopologyStore};

/// Per-point work-list cap multiplier (times the initial queue length)
const FLIP_BUDGET_PER_EDGE: usize = 64;

/// Summary of one relaxation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelaxReport {
    /// Total edge flips performed across all cycles
    pub flips: usize,
    /// Point neighborhoods whose flip work-list hit its cap and were
    /// abandoned (discoverable via the store's validate pass)
    pub abandoned: usize,
    /// Smoothing passes applied
    pub smoothing_passes: usize,
}

/// Relax a base mesh with edge flips and Laplacian smoothing
///
/// Per cycle, a seeded sample of points is split between `options.workers`
/// scoped threads; each worker walks its points' incident edges and flips
/// the shared diagonal of edge-adjacent triangle pairs when the opposite
/// diagonal's length stays within `options.length_tolerance` of the
/// original (a deliberate deviation from the pure in-circle legality test,
/// to bound distortion). After all cycles, `options.smoothing_passes`
/// Laplacian sweeps move every point a shrinking `1 / pass` fraction toward
/// the centroid of its incident triangles' centroids, re-normalized onto
/// the sphere.
///
/// # Errors
///
/// Returns `InvalidInput` if `radius` is not positive.
pub fn relax(
    store: &TopologyStore,
    options: &RelaxOptions,
    radius: f32,
    seed: u32,
) -> Result<RelaxReport> {
    if radius <= 0.0 {
        return Err(MeshError::InvalidInput(format!(
            "relaxation radius must be positive (got {})",
            radius
        )));
    }

    let total_start = Instant::now();
    let mut rng = ChaCha8Rng::seed_from_u64(seed as u64);
    let all_ids: Vec<PointId> = store.points().iter().map(|p| p.id).collect();
    let workers = options.workers.max(1);

    eprintln!(
        "[Relax] Starting: {} points, {} cycles of {} samples, {} workers, tolerance {:.3}",
        all_ids.len(),
        options.cycles,
        options.samples_per_cycle,
        workers,
        options.length_tolerance
    );

    let mut report = RelaxReport::default();

    for cycle in 0..options.cycles {
        let cycle_start = Instant::now();
        let sample: Vec<PointId> = all_ids
            .choose_multiple(&mut rng, options.samples_per_cycle.min(all_ids.len()))
            .copied()
            .collect();

        let chunk_len = sample.len().div_ceil(workers).max(1);
        let (flips, abandoned) = std::thread::scope(|scope| {
            let handles: Vec<_> = sample
                .chunks(chunk_len)
                .map(|chunk| scope.spawn(move || relax_points(store, chunk, options)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("relaxation worker panicked"))
                .fold((0, 0), |(f, a), (wf, wa)| (f + wf, a + wa))
        });

        report.flips += flips;
        report.abandoned += abandoned;
        eprintln!(
            "[Relax] Cycle {}/{}: {} point(s), {} flip(s), {} abandoned, {:?}",
            cycle + 1,
            options.cycles,
            sample.len(),
            flips,
            abandoned,
            cycle_start.elapsed()
        );
    }

    for pass in 1..=options.smoothing_passes {
        let pass_start = Instant::now();
        let moved = smooth_pass(store, &all_ids, radius, pass);
        report.smoothing_passes += 1;
        eprintln!(
            "[Relax] Smoothing {}/{}: {} point(s) moved, {:?}",
            pass,
            options.smoothing_passes,
            moved,
            pass_start.elapsed()
        );
    }

    eprintln!(
        "[Relax] Finished: {} flip(s), {} abandoned, total={:?}",
        report.flips,
        report.abandoned,
        total_start.elapsed()
    );
    Ok(report)
}

/// Flip pass over one worker's slice of the point sample
///
/// Runs an explicit bounded work-list per point: seeded with the point's
/// incident edges, extended with the surrounding edges of each flipped
/// quadrilateral, and capped so pathological neighborhoods are abandoned
/// instead of looping.
fn relax_points(
    store: &TopologyStore,
    points: &[PointId],
    options: &RelaxOptions,
) -> (usize, usize) {
    let mut flips = 0;
    let mut abandoned = 0;

    for &point in points {
        let mut queue: VecDeque<EdgeKey> =
            store.incident_edges(point).iter().map(|e| e.key()).collect();
        let mut visited: HashSet<EdgeKey> = queue.iter().copied().collect();
        let mut budget = FLIP_BUDGET_PER_EDGE * queue.len().max(1);

        while let Some(key) = queue.pop_front() {
            if budget == 0 {
                abandoned += 1;
                break;
            }
            budget -= 1;

            if let Some(diagonal) = try_flip(store, key, options.length_tolerance) {
                flips += 1;
                // Re-examine the quadrilateral's outer edges
                for endpoint in [diagonal.a(), diagonal.b()] {
                    for edge in store.incident_edges(endpoint) {
                        let k = edge.key();
                        if k != diagonal && visited.insert(k) {
                            queue.push_back(k);
                        }
                    }
                }
            }
        }
    }
    (flips, abandoned)
}

/// Attempt a bounded-distortion flip of one undirected edge
///
/// Returns the new diagonal when the edge had exactly two incident
/// triangles, the opposite diagonal's length stayed within `tolerance` of
/// the original, and the store accepted the flip (another worker may have
/// restructured the neighborhood since the snapshot was taken; such flips
/// are simply skipped).
fn try_flip(store: &TopologyStore, key: EdgeKey, tolerance: f32) -> Option<EdgeKey> {
    let triangles = store.triangles_by_edge(key);
    if triangles.len() != 2 {
        return None;
    }
    let c = triangles[0].points.iter().copied().find(|p| !key.contains(*p))?;
    let d = triangles[1].points.iter().copied().find(|p| !key.contains(*p))?;
    if c == d {
        return None;
    }

    let pa = store.point(key.a())?.position;
    let pb = store.point(key.b())?.position;
    let pc = store.point(c)?.position;
    let pd = store.point(d)?.position;

    let old_len = pa.distance(pb);
    let new_len = pc.distance(pd);
    if old_len <= 0.0 || (new_len - old_len).abs() > tolerance * old_len {
        return None;
    }

    store.flip_edge(key).ok()
}

/// One Laplacian smoothing sweep over every point
///
/// Averages the centroids of the point's incident triangles and moves the
/// point a `1 / pass` fraction toward that average, then projects back to
/// the sphere surface. Returns the number of points moved.
fn smooth_pass(store: &TopologyStore, ids: &[PointId], radius: f32, pass: usize) -> usize {
    let factor = 1.0 / pass as f32;
    let mut moved = 0;

    for &id in ids {
        let triangles = store.incident_triangles(id);
        if triangles.is_empty() {
            continue;
        }
        let point = match store.point(id) {
            Some(p) => p,
            None => continue,
        };

        let mut average = glam::Vec3::ZERO;
        let mut count = 0;
        for tri in &triangles {
            let mut centroid = glam::Vec3::ZERO;
            let mut complete = true;
            for &p in &tri.points {
                match store.point(p) {
                    Some(q) => centroid += q.position,
                    None => complete = false,
                }
            }
            if complete {
                average += centroid / 3.0;
                count += 1;
            }
        }
        if count == 0 {
            continue;
        }
        average /= count as f32;

        let target = point.position + (average - point.position) * factor;
        let projected = target.normalize_or_zero() * radius;
        if projected == glam::Vec3::ZERO {
            continue;
        }
        if store.update_point(id, projected).is_ok() {
            moved += 1;
        }
    }
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    /// Octahedron on the unit sphere: 6 points, 8 triangles, every edge
    /// bounded by exactly two triangles
    fn octahedron_store() -> TopologyStore {
        let store = TopologyStore::default();
        let px = store.get_or_create_point(Vec3::X).id;
        let nx = store.get_or_create_point(-Vec3::X).id;
        let py = store.get_or_create_point(Vec3::Y).id;
        let ny = store.get_or_create_point(-Vec3::Y).id;
        let pz = store.get_or_create_point(Vec3::Z).id;
        let nz = store.get_or_create_point(-Vec3::Z).id;

        for tri in [
            [px, py, pz],
            [py, nx, pz],
            [nx, ny, pz],
            [ny, px, pz],
            [py, px, nz],
            [nx, py, nz],
            [ny, nx, nz],
            [px, ny, nz],
        ] {
            store.add_triangle(tri).unwrap();
        }
        store
    }

    #[test]
    fn test_relax_requires_positive_radius() {
        let store = octahedron_store();
        let options = RelaxOptions::default();
        assert!(relax(&store, &options, 0.0, 1).is_err());
        assert!(relax(&store, &options, -1.0, 1).is_err());
    }

    #[test]
    fn test_relax_terminates_and_preserves_invariants() {
        let store = octahedron_store();
        let options = RelaxOptions {
            cycles: 3,
            samples_per_cycle: 6,
            length_tolerance: 0.5,
            smoothing_passes: 2,
            workers: 2,
        };

        let report = relax(&store, &options, 1.0, 42).unwrap();
        assert_eq!(report.smoothing_passes, 2);
        assert!(store.validate("relaxed").is_empty());
        assert_eq!(store.triangle_count(), 8);
    }

    #[test]
    fn test_zero_tolerance_never_flips_octahedron() {
        // Octahedron edges have length sqrt(2) but every opposite diagonal
        // is an antipodal pair of length 2, far outside a zero tolerance
        let store = octahedron_store();
        let options = RelaxOptions {
            cycles: 2,
            samples_per_cycle: 6,
            length_tolerance: 0.0,
            smoothing_passes: 0,
            workers: 1,
        };

        let report = relax(&store, &options, 1.0, 7).unwrap();
        assert_eq!(report.flips, 0);
    }

    #[test]
    fn test_smoothing_keeps_points_on_sphere() {
        let store = octahedron_store();
        let options = RelaxOptions {
            cycles: 0,
            samples_per_cycle: 0,
            length_tolerance: 0.0,
            smoothing_passes: 3,
            workers: 1,
        };

        relax(&store, &options, 1.0, 42).unwrap();
        for point in store.points() {
            let r = point.position.length();
            assert!((r - 1.0).abs() < 1e-5, "point {} off sphere: {}", point.id, r);
        }
    }

    #[test]
    fn test_relax_is_deterministic() {
        let run = |seed: u32| {
            let store = octahedron_store();
            let options = RelaxOptions {
                cycles: 2,
                samples_per_cycle: 4,
                length_tolerance: 0.5,
                smoothing_passes: 2,
                workers: 1,
            };
            relax(&store, &options, 1.0, seed).unwrap();
            store.points()
        };

        let a = run(1234);
        let b = run(1234);
        assert_eq!(a.len(), b.len());
        for (p, q) in a.iter().zip(b.iter()) {
            assert_eq!(p.id, q.id);
            assert!((p.position - q.position).length() < 1e-6);
        }
    }

    #[test]
    fn test_zero_cycles_skips_flip_phase() {
        let store = octahedron_store();
        let options = RelaxOptions {
            cycles: 0,
            samples_per_cycle: 100,
            length_tolerance: 1.0,
            smoothing_passes: 0,
            workers: 4,
        };

        let report = relax(&store, &options, 1.0, 9).unwrap();
        assert_eq!(report, RelaxReport::default());
    }
}
