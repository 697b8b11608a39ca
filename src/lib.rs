//! Delaunay-refined geodesic sphere meshes
//!
//! A standalone library for building triangulated, topologically-consistent
//! meshes over a sphere, used as the substructure for planet and terrain
//! generators. The pipeline subdivides an icosahedron into a near-uniform
//! base mesh, relaxes it with bounded-distortion edge flips and Laplacian
//! smoothing, and builds the dual (Voronoi) triangulation from the
//! circumcenters around each base point.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use geodesic_mesh::*;
//!
//! // Generate a mesh
//! let config = MeshConfigBuilder::new()
//!     .seed(42)
//!     .mesh_size(MeshSize::Small)
//!     .build().unwrap();
//!
//! let mesh = GeodesicMesh::generate(config).unwrap();
//! println!("Generated {} triangles", mesh.triangle_count());
//!
//! // Read-only traversal for rendering or terrain layers
//! for triangle in mesh.triangles() {
//!     // Three point identities with consistent outward winding
//!     let _ids = triangle.points;
//! }
//! ```
//!
//! # Features
//!
//! - `spatial-index` (default): O(log n) position-to-point lookups using a KD-tree
//! - `serde`: serialization support for configuration types

// Modules
pub mod error;
pub mod config;
pub mod geometry;
pub mod topology;
pub mod triangulation;
pub mod projection;
pub mod subdivision;
pub mod sphere;

#[cfg(feature = "spatial-index")]
pub mod spatial;

// Re-export core types for convenience
pub use error::{MeshError, Result};
pub use config::{
    MeshConfig, MeshConfigBuilder, MeshSize, PointDistribution, RelaxOptions, SubdivisionLevel,
};
pub use topology::{Edge, EdgeKey, Issue, Point, PointId, Triangle, TriKey, TopologyStore};
pub use triangulation::{relax, triangulate, RelaxReport, Triangulation};
pub use projection::{tangent_basis, triangulate_cluster};
pub use subdivision::{build_base_mesh, icosahedron_points, ICOSAHEDRON_FACES};
pub use sphere::{GeodesicMesh, MeshStats};

#[cfg(feature = "spatial-index")]
pub use spatial::SpatialIndex;

// Re-export glam::Vec3 for convenience
pub use glam::Vec3;
