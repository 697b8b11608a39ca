//! Spatial indexing for fast position-to-point lookups
//!
//! This module is only available with the `spatial-index` feature.

#[cfg(feature = "spatial-index")]
use kiddo::immutable::float::kdtree::ImmutableKdTree;
#[cfg(feature = "spatial-index")]
use kiddo::SquaredEuclidean;
#[cfg(feature = "spatial-index")]
use glam::Vec3;

#[cfg(feature = "spatial-index")]
use crate::topology::{Point, PointId};

/// Wrapper around a KD-tree for nearest-point queries
///
/// Provides O(log n) nearest-neighbor lookups to convert 3D positions
/// (from raycasting, cursor picks, entity placement) into mesh point
/// identities. Built once from the finished mesh's point positions.
#[cfg(feature = "spatial-index")]
#[derive(Clone)]
pub struct SpatialIndex {
    tree: ImmutableKdTree<f32, usize, 3, 32>,
    ids: Vec<PointId>,
}

#[cfg(feature = "spatial-index")]
impl SpatialIndex {
    /// Build a spatial index from registered points
    ///
    /// # Arguments
    ///
    /// * `points` - The mesh points to index (position and identity)
    pub fn new(points: &[Point]) -> Self {
        let positions: Vec<[f32; 3]> = points
            .iter()
            .map(|p| [p.position.x, p.position.y, p.position.z])
            .collect();

        Self {
            tree: ImmutableKdTree::new_from_slice(&positions),
            ids: points.iter().map(|p| p.id).collect(),
        }
    }

    /// Find the point nearest to a position
    ///
    /// # Arguments
    ///
    /// * `position` - 3D position to query
    ///
    /// # Returns
    ///
    /// Identity of the nearest registered point
    pub fn find_nearest(&self, position: Vec3) -> PointId {
        let query = [position.x, position.y, position.z];
        let result = self.tree.nearest_one::<SquaredEuclidean>(&query);
        self.ids[result.item as usize]
    }
}

#[cfg(test)]
#[cfg(feature = "spatial-index")]
mod tests {
    use super::*;

    fn point(id: PointId, position: Vec3) -> Point {
        Point {
            id,
            position,
            elevation: 0.0,
            stress: 0.0,
        }
    }

    #[test]
    fn test_spatial_index_basic() {
        let points = vec![
            point(0, Vec3::new(1.0, 0.0, 0.0)),
            point(1, Vec3::new(0.0, 1.0, 0.0)),
            point(2, Vec3::new(0.0, 0.0, 1.0)),
            point(3, Vec3::new(-1.0, 0.0, 0.0)),
        ];

        let index = SpatialIndex::new(&points);

        assert_eq!(index.find_nearest(Vec3::new(0.9, 0.1, 0.0)), 0);
        assert_eq!(index.find_nearest(Vec3::new(0.0, 0.95, 0.0)), 1);
        assert_eq!(index.find_nearest(Vec3::new(0.0, 0.1, 0.9)), 2);
        assert_eq!(index.find_nearest(Vec3::new(-0.8, 0.0, 0.0)), 3);
    }

    #[test]
    fn test_spatial_index_exact_match() {
        let points = vec![
            point(0, Vec3::new(10.0, 0.0, 0.0)),
            point(1, Vec3::new(0.0, 10.0, 0.0)),
        ];

        let index = SpatialIndex::new(&points);

        assert_eq!(index.find_nearest(points[0].position), 0);
        assert_eq!(index.find_nearest(points[1].position), 1);
    }
}
