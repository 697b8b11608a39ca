//! Mesh generation configuration and builder
//!
//! This module provides configuration types for deterministic geodesic mesh
//! generation: subdivision schedules, relaxation options, and size presets.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{MeshError, Result};

/// Strategy for placing new points along a face edge during subdivision
///
/// Controls how the configured number of new vertices is distributed along
/// each icosahedron face edge.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointDistribution {
    /// Evenly spaced interpolation between the edge endpoints
    Linear,
    /// Ratio-biased spacing: each segment is `ratio` times the previous one
    ///
    /// A ratio of 1.0 degenerates to `Linear`. Ratios above 1.0 cluster
    /// points toward the edge start, below 1.0 toward the edge end.
    Geometric {
        /// Length ratio between consecutive segments (must be positive)
        ratio: f32,
    },
}

impl Default for PointDistribution {
    fn default() -> Self {
        PointDistribution::Linear
    }
}

/// One subdivision pass over every current face of the mesh
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubdivisionLevel {
    /// Number of new vertices inserted along each face edge
    ///
    /// Not forced to a power of two: a face with `v` new vertices per edge
    /// is split into `(v + 1)^2` smaller triangles.
    pub vertices_per_edge: usize,
    /// How the new vertices are spaced along each edge
    pub distribution: PointDistribution,
}

impl SubdivisionLevel {
    /// Create a level with linear (even) spacing
    pub fn linear(vertices_per_edge: usize) -> Self {
        Self {
            vertices_per_edge,
            distribution: PointDistribution::Linear,
        }
    }

    /// Create a level with geometric (ratio-biased) spacing
    pub fn geometric(vertices_per_edge: usize, ratio: f32) -> Self {
        Self {
            vertices_per_edge,
            distribution: PointDistribution::Geometric { ratio },
        }
    }
}

/// Options for the incremental flip-based relaxation pass
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelaxOptions {
    /// Number of relaxation cycles to run
    pub cycles: usize,
    /// Number of points sampled per cycle (split between workers)
    pub samples_per_cycle: usize,
    /// Maximum allowed relative length deviation for an edge flip
    ///
    /// A shared edge is flipped only when the opposite diagonal's length
    /// stays within `length_tolerance` of the original edge length
    /// (as a fraction of it). This bounds distortion instead of applying
    /// the pure in-circle legality test.
    pub length_tolerance: f32,
    /// Number of Laplacian smoothing passes run after the flip cycles
    ///
    /// Each pass moves every point a `1 / pass_index` fraction of the way
    /// toward the centroid of its incident triangles' centroids.
    pub smoothing_passes: usize,
    /// Number of parallel worker tasks per cycle
    ///
    /// Each worker processes a disjoint slice of the cycle's point sample;
    /// all registry mutations go through the topology store's lock.
    pub workers: usize,
}

impl Default for RelaxOptions {
    fn default() -> Self {
        Self {
            cycles: 2,
            samples_per_cycle: 256,
            length_tolerance: 0.35,
            smoothing_passes: 3,
            workers: 4,
        }
    }
}

/// Mesh size presets mapping to subdivision schedules
///
/// Each size maps to a fixed schedule and sphere radius for consistent
/// triangle density across presets.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum MeshSize {
    /// ~162 points, 320 base triangles, radius 10
    Tiny,
    /// ~642 points, 1,280 base triangles, radius 20
    Small,
    /// ~2,562 points, 5,120 base triangles, radius 40
    Medium,
    /// ~10,242 points, 20,480 base triangles, radius 80 (default)
    Large,
    /// Custom subdivision schedule and radius
    Custom {
        /// Subdivision passes applied in order to the base icosahedron
        levels: Vec<SubdivisionLevel>,
        /// Sphere radius in world units
        radius: f32,
    },
}

impl MeshSize {
    /// Get the subdivision schedule for this size
    pub fn levels(&self) -> Vec<SubdivisionLevel> {
        match self {
            MeshSize::Tiny => vec![SubdivisionLevel::linear(3)],
            MeshSize::Small => vec![SubdivisionLevel::linear(7)],
            MeshSize::Medium => {
                vec![SubdivisionLevel::linear(7), SubdivisionLevel::linear(1)]
            }
            MeshSize::Large => {
                vec![SubdivisionLevel::linear(7), SubdivisionLevel::linear(3)]
            }
            MeshSize::Custom { levels, .. } => levels.clone(),
        }
    }

    /// Get the sphere radius for this size
    ///
    /// The radius scales roughly with sqrt(point count) to keep triangle
    /// edge lengths comparable across presets.
    pub fn sphere_radius(&self) -> f32 {
        match self {
            MeshSize::Tiny => 10.0,
            MeshSize::Small => 20.0,
            MeshSize::Medium => 40.0,
            MeshSize::Large => 80.0,
            MeshSize::Custom { radius, .. } => *radius,
        }
    }

    /// Get a human-readable name for this size
    pub fn name(&self) -> &'static str {
        match self {
            MeshSize::Tiny => "Tiny",
            MeshSize::Small => "Small",
            MeshSize::Medium => "Medium",
            MeshSize::Large => "Large",
            MeshSize::Custom { .. } => "Custom",
        }
    }
}

impl Default for MeshSize {
    fn default() -> Self {
        MeshSize::Large
    }
}

/// Configuration for deterministic geodesic mesh generation
///
/// Subdivision is fully determined by the schedule and relaxation sampling
/// is driven by a seeded RNG, so a configuration with a single relaxation
/// worker always produces the identical mesh. With multiple workers the
/// relative order of flips in overlapping neighborhoods is unspecified.
///
/// # Example
///
/// ```rust
/// use geodesic_mesh::*;
///
/// let config = MeshConfigBuilder::new()
///     .seed(42)
///     .mesh_size(MeshSize::Small)
///     .build()
///     .unwrap();
/// assert_eq!(config.seed, 42);
/// ```
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct MeshConfig {
    /// Random seed for relaxation sampling
    pub seed: u32,

    /// Mesh size preset (determines subdivision schedule and radius)
    pub mesh_size: MeshSize,

    /// Relaxation pass options
    pub relax: RelaxOptions,

    /// Override the sphere radius from the mesh_size preset
    pub radius_override: Option<f32>,
}

impl MeshConfig {
    /// Get the subdivision schedule for this configuration
    #[inline]
    pub fn levels(&self) -> Vec<SubdivisionLevel> {
        self.mesh_size.levels()
    }

    /// Get the sphere radius for this configuration
    ///
    /// Returns the radius_override if set, otherwise the preset radius.
    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius_override
            .unwrap_or_else(|| self.mesh_size.sphere_radius())
    }
}

impl Default for MeshConfig {
    fn default() -> Self {
        MeshConfigBuilder::new().build().unwrap()
    }
}

/// Builder for creating MeshConfig with validation
///
/// # Example
///
/// ```rust
/// use geodesic_mesh::*;
///
/// let config = MeshConfigBuilder::new()
///     .seed(12345)
///     .mesh_size(MeshSize::Tiny)
///     .relax_cycles(1)
///     .length_tolerance(0.25)
///     .unwrap()
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct MeshConfigBuilder {
    seed: Option<u32>,
    mesh_size: MeshSize,
    relax: RelaxOptions,
    radius_override: Option<f32>,
}

impl MeshConfigBuilder {
    /// Create a new builder with default values
    ///
    /// Defaults:
    /// - seed: Random (generated from thread_rng)
    /// - mesh_size: Large
    /// - relax: 2 cycles, 256 samples, 0.35 tolerance, 3 smoothing passes, 4 workers
    /// - radius_override: None
    pub fn new() -> Self {
        Self {
            seed: None,
            mesh_size: MeshSize::default(),
            relax: RelaxOptions::default(),
            radius_override: None,
        }
    }

    /// Set the random seed for relaxation sampling
    pub fn seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the mesh size preset
    pub fn mesh_size(mut self, size: MeshSize) -> Self {
        self.mesh_size = size;
        self
    }

    /// Set the number of relaxation cycles
    ///
    /// 0 disables the flip pass entirely (smoothing still runs).
    pub fn relax_cycles(mut self, cycles: usize) -> Self {
        self.relax.cycles = cycles;
        self
    }

    /// Set the number of points sampled per relaxation cycle
    pub fn samples_per_cycle(mut self, samples: usize) -> Self {
        self.relax.samples_per_cycle = samples;
        self
    }

    /// Set the edge-flip length deviation tolerance
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the tolerance is negative
    pub fn length_tolerance(mut self, tolerance: f32) -> Result<Self> {
        if tolerance < 0.0 {
            return Err(MeshError::InvalidConfig(format!(
                "length tolerance must be >= 0 (got {})",
                tolerance
            )));
        }
        self.relax.length_tolerance = tolerance;
        Ok(self)
    }

    /// Set the number of Laplacian smoothing passes
    pub fn smoothing_passes(mut self, passes: usize) -> Self {
        self.relax.smoothing_passes = passes;
        self
    }

    /// Set the number of parallel relaxation workers
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if workers is 0
    pub fn workers(mut self, workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(MeshError::InvalidConfig(
                "worker count must be >= 1".to_string(),
            ));
        }
        self.relax.workers = workers;
        Ok(self)
    }

    /// Override the sphere radius
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if radius <= 0.0
    pub fn radius_override(mut self, radius: f32) -> Result<Self> {
        if radius <= 0.0 {
            return Err(MeshError::InvalidConfig(format!(
                "radius override must be positive (got {})",
                radius
            )));
        }
        self.radius_override = Some(radius);
        Ok(self)
    }

    /// Build the configuration
    ///
    /// Validates the subdivision schedule: at least one level, at most 64
    /// new vertices per edge, geometric ratios positive. If no seed was
    /// provided, generates a random seed using thread_rng.
    pub fn build(self) -> Result<MeshConfig> {
        let levels = self.mesh_size.levels();
        if levels.is_empty() {
            return Err(MeshError::InvalidConfig(
                "subdivision schedule must have at least one level".to_string(),
            ));
        }
        for (i, level) in levels.iter().enumerate() {
            if level.vertices_per_edge > 64 {
                return Err(MeshError::InvalidConfig(format!(
                    "level {}: vertices per edge must be <= 64 (got {})",
                    i, level.vertices_per_edge
                )));
            }
            if let PointDistribution::Geometric { ratio } = level.distribution {
                if ratio <= 0.0 {
                    return Err(MeshError::InvalidConfig(format!(
                        "level {}: geometric ratio must be positive (got {})",
                        i, ratio
                    )));
                }
            }
        }
        if let MeshSize::Custom { radius, .. } = &self.mesh_size {
            if *radius <= 0.0 {
                return Err(MeshError::InvalidConfig(format!(
                    "custom radius must be positive (got {})",
                    radius
                )));
            }
        }

        let seed = self.seed.unwrap_or_else(|| rand::random());

        Ok(MeshConfig {
            seed,
            mesh_size: self.mesh_size,
            relax: self.relax,
            radius_override: self.radius_override,
        })
    }
}

impl Default for MeshConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
