//! GeodesicMesh main structure
//!
//! The per-run driver that owns the topology stores and orchestrates the
//! generation pipeline: subdivide the icosahedron, relax the base mesh,
//! then build the dual (Voronoi) triangulation around every base point.
//! Downstream consumers (rendering, biome, stress layers) read the finished
//! point and triangle collections through this facade only.

use glam::Vec3;
use std::time::Instant;

use crate::config::MeshConfig;
use crate::error::{MeshError, Result};
use crate::geometry::circumcenter3;
use crate::projection::triangulate_cluster;
use crate::subdivision::build_base_mesh;
use crate::topology::{Edge, Issue, Point, PointId, Triangle, TopologyStore};
use crate::triangulation::{relax, RelaxReport};

#[cfg(feature = "spatial-index")]
use crate::spatial::SpatialIndex;

/// Aggregate statistics over a generated mesh
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshStats {
    /// Registered base points
    pub points: usize,
    /// Registered base edges
    pub edges: usize,
    /// Registered base triangles
    pub triangles: usize,
    /// Registered dual (Voronoi) points
    pub dual_points: usize,
    /// Registered dual (Voronoi) triangles
    pub dual_triangles: usize,
    /// Shortest base edge length
    pub min_edge_length: f32,
    /// Longest base edge length
    pub max_edge_length: f32,
    /// Mean base edge length
    pub mean_edge_length: f32,
}

/// A complete generated geodesic mesh
///
/// Holds the base (subdivided, relaxed) triangulation and the dual
/// triangulation built from circumcenters around each base point. The
/// topology stores are rebuilt from the configuration on every generation
/// pass; nothing is persisted.
///
/// # Examples
///
/// ```no_run
/// use geodesic_mesh::*;
///
/// let config = MeshConfigBuilder::new()
///     .seed(42)
///     .mesh_size(MeshSize::Tiny)
///     .build()
///     .unwrap();
///
/// let mesh = GeodesicMesh::generate(config).unwrap();
/// println!("{} points, {} triangles", mesh.point_count(), mesh.triangle_count());
/// ```
pub struct GeodesicMesh {
    /// Configuration used to generate this mesh
    config: MeshConfig,
    /// Sphere radius in world units
    radius: f32,
    /// Base triangulation registries
    base: TopologyStore,
    /// Dual (Voronoi) triangulation registries
    dual: TopologyStore,
    /// Summary of the relaxation pass
    relax_report: RelaxReport,
    /// Base points whose dual cluster was too degenerate to triangulate
    skipped_duals: usize,

    #[cfg(feature = "spatial-index")]
    spatial_index: SpatialIndex,
}

impl GeodesicMesh {
    /// Generate a mesh from a configuration
    ///
    /// Runs the full pipeline: icosahedron subdivision, invariant
    /// validation, flip-based relaxation with Laplacian smoothing, and the
    /// per-point dual triangulation. Validation passes are diagnostic; their
    /// findings are logged and kept available via [`GeodesicMesh::validate`],
    /// they do not abort generation.
    pub fn generate(config: MeshConfig) -> Result<Self> {
        let start = Instant::now();
        let radius = config.radius();
        let dedup_tolerance = radius * 1e-5;

        let base = TopologyStore::new(dedup_tolerance);
        build_base_mesh(&base, radius, &config.levels())?;
        base.validate("base");

        let relax_report = relax(&base, &config.relax, radius, config.seed)?;
        base.validate("relaxed");

        let dual = TopologyStore::new(dedup_tolerance);
        let skipped_duals = build_dual(&base, &dual, radius, dedup_tolerance)?;
        dual.validate("dual");

        #[cfg(feature = "spatial-index")]
        let spatial_index = SpatialIndex::new(&base.points());

        eprintln!(
            "[Mesh] Generated {} ({} base triangle(s), {} dual triangle(s)) in {:?}",
            config.mesh_size.name(),
            base.triangle_count(),
            dual.triangle_count(),
            start.elapsed()
        );

        Ok(Self {
            config,
            radius,
            base,
            dual,
            relax_report,
            skipped_duals,
            #[cfg(feature = "spatial-index")]
            spatial_index,
        })
    }

    /// Get the configuration used to generate this mesh
    #[inline]
    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    /// Get the sphere radius
    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Read-only access to the base topology store
    #[inline]
    pub fn base(&self) -> &TopologyStore {
        &self.base
    }

    /// Read-only access to the dual topology store
    #[inline]
    pub fn dual(&self) -> &TopologyStore {
        &self.dual
    }

    /// Summary of the relaxation pass
    #[inline]
    pub fn relax_report(&self) -> RelaxReport {
        self.relax_report
    }

    /// Number of base points whose dual cluster was skipped as degenerate
    #[inline]
    pub fn skipped_duals(&self) -> usize {
        self.skipped_duals
    }

    /// Number of base points
    pub fn point_count(&self) -> usize {
        self.base.point_count()
    }

    /// Number of base triangles
    pub fn triangle_count(&self) -> usize {
        self.base.triangle_count()
    }

    /// Number of dual triangles
    pub fn dual_triangle_count(&self) -> usize {
        self.dual.triangle_count()
    }

    /// Snapshot of all base points, sorted by identity
    pub fn points(&self) -> Vec<Point> {
        self.base.points()
    }

    /// Snapshot of all base triangles
    pub fn triangles(&self) -> Vec<Triangle> {
        self.base.triangles()
    }

    /// Snapshot of all dual triangles
    pub fn dual_triangles(&self) -> Vec<Triangle> {
        self.dual.triangles()
    }

    /// Look up a base point by identity
    pub fn point(&self, id: PointId) -> Option<Point> {
        self.base.point(id)
    }

    /// Edges incident to a base point
    pub fn incident_edges(&self, id: PointId) -> Vec<Edge> {
        self.base.incident_edges(id)
    }

    /// Triangles incident to a base point
    pub fn incident_triangles(&self, id: PointId) -> Vec<Triangle> {
        self.base.incident_triangles(id)
    }

    /// Set a base point's elevation attribute (downstream layers only)
    pub fn set_elevation(&self, id: PointId, elevation: f32) -> Result<()> {
        self.base.set_elevation(id, elevation)
    }

    /// Set a base point's stress attribute (downstream layers only)
    pub fn set_stress(&self, id: PointId, stress: f32) -> Result<()> {
        self.base.set_stress(id, stress)
    }

    /// Run the invariant checks over both stores
    ///
    /// Returns all violations found; an empty list means every registry
    /// invariant holds in both the base and dual meshes.
    pub fn validate(&self) -> Vec<Issue> {
        let mut issues = self.base.validate("base");
        issues.extend(self.dual.validate("dual"));
        issues
    }

    /// Compute aggregate statistics over the generated mesh
    pub fn stats(&self) -> MeshStats {
        let points = self.base.points();
        let mut min_len = f32::INFINITY;
        let mut max_len: f32 = 0.0;
        let mut total = 0.0;
        let mut count = 0usize;

        for point in &points {
            for edge in self.base.incident_edges(point.id) {
                // Each edge is visited from both endpoints; count it once
                if edge.key().a() != point.id {
                    continue;
                }
                if let Some(len) = edge.length(&self.base) {
                    min_len = min_len.min(len);
                    max_len = max_len.max(len);
                    total += len;
                    count += 1;
                }
            }
        }

        MeshStats {
            points: points.len(),
            edges: self.base.edge_count(),
            triangles: self.base.triangle_count(),
            dual_points: self.dual.point_count(),
            dual_triangles: self.dual.triangle_count(),
            min_edge_length: if count == 0 { 0.0 } else { min_len },
            max_edge_length: max_len,
            mean_edge_length: if count == 0 { 0.0 } else { total / count as f32 },
        }
    }

    /// Find the base point nearest a position (requires spatial-index)
    #[cfg(feature = "spatial-index")]
    pub fn find_point_at(&self, position: Vec3) -> PointId {
        self.spatial_index.find_nearest(position)
    }
}

/// Build the dual (Voronoi) triangulation into the dual store
///
/// For every base point: gather the circumcenters of its incident
/// triangles (projected onto the sphere surface), triangulate them in the
/// tangent plane of the point's outward normal, and register the resulting
/// triangles. Degenerate clusters (fewer than three distinct circumcenters)
/// are skipped and counted rather than failing the run.
fn build_dual(
    base: &TopologyStore,
    dual: &TopologyStore,
    radius: f32,
    merge_tolerance: f32,
) -> Result<usize> {
    let start = Instant::now();
    let mut skipped = 0usize;
    let mut rejected_triangles = 0usize;

    for point in base.points() {
        let incident = base.incident_triangles(point.id);
        let mut circumcenters = Vec::with_capacity(incident.len());
        for tri in &incident {
            let a = match base.point(tri.points[0]) {
                Some(p) => p.position,
                None => continue,
            };
            let b = match base.point(tri.points[1]) {
                Some(p) => p.position,
                None => continue,
            };
            let c = match base.point(tri.points[2]) {
                Some(p) => p.position,
                None => continue,
            };
            if let Some(cc) = circumcenter3(a, b, c) {
                let on_sphere = cc.normalize_or_zero() * radius;
                if on_sphere != Vec3::ZERO {
                    circumcenters.push(on_sphere);
                }
            }
        }
        if circumcenters.len() < 3 {
            skipped += 1;
            continue;
        }

        let normal = point.position.normalize_or_zero();
        if normal == Vec3::ZERO {
            skipped += 1;
            continue;
        }

        let triangles = match triangulate_cluster(&circumcenters, normal, merge_tolerance) {
            Ok(t) => t,
            // Clusters that collapse below three distinct points are a
            // local degeneracy, not a generation failure
            Err(MeshError::InvalidInput(_)) => {
                skipped += 1;
                continue;
            }
            Err(err) => return Err(err),
        };

        for tri in triangles {
            let ids = [
                dual.get_or_create_point(circumcenters[tri[0]]).id,
                dual.get_or_create_point(circumcenters[tri[1]]).id,
                dual.get_or_create_point(circumcenters[tri[2]]).id,
            ];
            if ids[0] == ids[1] || ids[1] == ids[2] || ids[0] == ids[2] {
                rejected_triangles += 1;
                continue;
            }
            if dual.add_triangle(ids).is_err() {
                // Best effort: a conflicting sliver is dropped and left to
                // the validation report
                rejected_triangles += 1;
            }
        }
    }

    eprintln!(
        "[Dual] Finished: {} triangle(s), {} skipped point(s), {} rejected triangle(s), {:?}",
        dual.triangle_count(),
        skipped,
        rejected_triangles,
        start.elapsed()
    );
    Ok(skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MeshConfigBuilder, MeshSize, SubdivisionLevel};

    fn tiny_config(seed: u32) -> MeshConfig {
        MeshConfigBuilder::new()
            .seed(seed)
            .mesh_size(MeshSize::Custom {
                levels: vec![SubdivisionLevel::linear(1)],
                radius: 1.0,
            })
            .relax_cycles(1)
            .samples_per_cycle(16)
            .smoothing_passes(2)
            .workers(1)
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_generate_builds_base_and_dual() {
        let mesh = GeodesicMesh::generate(tiny_config(42)).unwrap();

        assert_eq!(mesh.point_count(), 42);
        assert_eq!(mesh.triangle_count(), 80);
        assert!(mesh.dual_triangle_count() > 0);
        assert_eq!(mesh.skipped_duals(), 0);
        assert!(mesh.validate().is_empty());
    }

    #[test]
    fn test_dual_triangle_count_matches_cluster_sizes() {
        // No relaxation so the icosphere stays symmetric; each point's
        // convex circumcenter polygon of k vertices triangulates to k - 2
        let config = MeshConfigBuilder::new()
            .seed(1)
            .mesh_size(MeshSize::Custom {
                levels: vec![SubdivisionLevel::linear(1)],
                radius: 1.0,
            })
            .relax_cycles(0)
            .smoothing_passes(0)
            .build()
            .unwrap();
        let mesh = GeodesicMesh::generate(config).unwrap();

        let expected: usize = mesh
            .points()
            .iter()
            .map(|p| mesh.incident_triangles(p.id).len().saturating_sub(2))
            .sum();
        assert_eq!(mesh.dual_triangle_count(), expected);
    }

    #[test]
    fn test_dual_winding_faces_outward() {
        let mesh = GeodesicMesh::generate(tiny_config(7)).unwrap();
        for tri in mesh.dual_triangles() {
            let pa = mesh.dual().point(tri.points[0]).unwrap().position;
            let pb = mesh.dual().point(tri.points[1]).unwrap().position;
            let pc = mesh.dual().point(tri.points[2]).unwrap().position;
            let outward = (pa + pb + pc) / 3.0;
            assert!(
                crate::geometry::triangle_normal(pa, pb, pc).dot(outward) > 0.0,
                "dual triangle {:?} winds inward",
                tri.points
            );
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = GeodesicMesh::generate(tiny_config(1234)).unwrap();
        let b = GeodesicMesh::generate(tiny_config(1234)).unwrap();

        let pa = a.points();
        let pb = b.points();
        assert_eq!(pa.len(), pb.len());
        for (p, q) in pa.iter().zip(pb.iter()) {
            assert_eq!(p.id, q.id);
            assert!((p.position - q.position).length() < 1e-6);
        }
        assert_eq!(a.triangle_count(), b.triangle_count());
        assert_eq!(a.dual_triangle_count(), b.dual_triangle_count());
    }

    #[test]
    fn test_attributes_flow_through_facade() {
        let mesh = GeodesicMesh::generate(tiny_config(5)).unwrap();
        mesh.set_elevation(0, 2.5).unwrap();
        mesh.set_stress(0, -0.5).unwrap();

        let p = mesh.point(0).unwrap();
        assert_eq!(p.elevation, 2.5);
        assert_eq!(p.stress, -0.5);
        assert!(mesh.set_elevation(9999, 1.0).is_err());
    }

    #[test]
    fn test_stats_are_consistent() {
        let mesh = GeodesicMesh::generate(tiny_config(9)).unwrap();
        let stats = mesh.stats();

        assert_eq!(stats.points, 42);
        assert_eq!(stats.triangles, 80);
        assert_eq!(stats.edges, 120);
        assert!(stats.min_edge_length > 0.0);
        assert!(stats.min_edge_length <= stats.mean_edge_length);
        assert!(stats.mean_edge_length <= stats.max_edge_length);
    }

    #[cfg(feature = "spatial-index")]
    #[test]
    fn test_find_point_at_returns_nearest() {
        let mesh = GeodesicMesh::generate(tiny_config(3)).unwrap();
        let target = mesh.point(0).unwrap().position;
        assert_eq!(mesh.find_point_at(target), 0);
    }
}
