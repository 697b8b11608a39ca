//! Canonical mesh topology registries
//!
//! The [`TopologyStore`] is the single source of truth for points, undirected
//! edges, and triangles during a generation run. It enforces the structural
//! invariants of the mesh:
//!
//! 1. Points are unique by identity.
//! 2. An undirected edge is incident to at most two triangles.
//! 3. Incident-edge sets per point and edge-to-triangle sets are mutually
//!    consistent with the triangles that reference them.
//! 4. No two triangles share the same sorted point-identity triple.
//!
//! Every mutating operation takes the store-wide lock for its whole duration
//! and unlinks old entries from every registry before linking replacements,
//! so registries are never observable in a partially-mutated state.
//! [`TopologyStore::validate`] is a non-mutating diagnostic that reports
//! violations instead of panicking.

pub mod half_edge;

use glam::Vec3;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use crate::error::{MeshError, Result};
use crate::geometry::triangle_normal;

/// Stable integer identity of a registered point
pub type PointId = usize;

/// A registered mesh point
///
/// Identity is immutable; the position may be replaced during relaxation.
/// The auxiliary scalars are written by downstream terrain layers and never
/// touched by the core pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Stable identity assigned at creation
    pub id: PointId,
    /// Position in world units
    pub position: Vec3,
    /// Elevation attribute, set by downstream layers
    pub elevation: f32,
    /// Tectonic stress attribute, set by downstream layers
    pub stress: f32,
}

/// Canonical direction-agnostic identity for an undirected edge
///
/// The two point identities are normalized so the smaller precedes the
/// larger; both directed half-edges between the same points map to the same
/// key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey(PointId, PointId);

impl EdgeKey {
    /// Create a normalized key for the undirected edge between `a` and `b`
    #[inline]
    pub fn new(a: PointId, b: PointId) -> Self {
        if a < b {
            EdgeKey(a, b)
        } else {
            EdgeKey(b, a)
        }
    }

    /// Smaller point identity
    #[inline]
    pub fn a(&self) -> PointId {
        self.0
    }

    /// Larger point identity
    #[inline]
    pub fn b(&self) -> PointId {
        self.1
    }

    /// Returns true if `p` is one of the two endpoints
    #[inline]
    pub fn contains(&self, p: PointId) -> bool {
        self.0 == p || self.1 == p
    }

    /// The endpoint that is not `p`
    #[inline]
    pub fn other(&self, p: PointId) -> PointId {
        if self.0 == p {
            self.1
        } else {
            self.0
        }
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

/// A registered directed edge record
///
/// Registered under its normalized [`EdgeKey`]; the `origin`/`target` order
/// preserves the direction the edge was first created with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    /// Creation index of this edge record
    pub index: usize,
    /// Point the edge was created from
    pub origin: PointId,
    /// Point the edge was created toward
    pub target: PointId,
}

impl Edge {
    /// Canonical undirected identity of this edge
    #[inline]
    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(self.origin, self.target)
    }

    /// Euclidean length given the store's current positions
    pub fn length(&self, store: &TopologyStore) -> Option<f32> {
        let p = store.point(self.origin)?;
        let q = store.point(self.target)?;
        Some(p.position.distance(q.position))
    }
}

/// Deduplication identity of a triangle: its sorted point triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriKey(PointId, PointId, PointId);

impl TriKey {
    /// Create the sorted key for a triangle over the given points
    pub fn new(points: [PointId; 3]) -> Self {
        let mut p = points;
        p.sort_unstable();
        TriKey(p[0], p[1], p[2])
    }

    /// The sorted point identities
    #[inline]
    pub fn points(&self) -> [PointId; 3] {
        [self.0, self.1, self.2]
    }
}

impl fmt::Display for TriKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.0, self.1, self.2)
    }
}

/// A registered triangle
///
/// Vertex order carries the winding; the three bounding edges are stored in
/// vertex order (`p0-p1`, `p1-p2`, `p2-p0`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// The three point identities in winding order
    pub points: [PointId; 3],
    /// The three bounding undirected edges in vertex order
    pub edges: [EdgeKey; 3],
}

impl Triangle {
    fn from_points(points: [PointId; 3]) -> Self {
        Self {
            points,
            edges: [
                EdgeKey::new(points[0], points[1]),
                EdgeKey::new(points[1], points[2]),
                EdgeKey::new(points[2], points[0]),
            ],
        }
    }

    /// Deduplication identity (sorted point triple)
    #[inline]
    pub fn key(&self) -> TriKey {
        TriKey::new(self.points)
    }
}

/// A violated invariant reported by [`TopologyStore::validate`]
///
/// Carries enough identity context to diagnose the violation; validation
/// reports issues instead of panicking, and callers decide whether any of
/// them is fatal for their use case.
#[derive(Debug, Clone, PartialEq)]
pub enum Issue {
    /// An edge references a point that is not registered
    MissingEdgeEndpoint {
        /// The offending edge
        edge: EdgeKey,
        /// The unregistered endpoint
        point: PointId,
    },
    /// An edge is incident to more than two triangles
    EdgeOverloaded {
        /// The offending edge
        edge: EdgeKey,
        /// Number of incident triangles observed
        count: usize,
    },
    /// An edge lists a triangle that does not reference it back (or the
    /// triangle is missing entirely)
    EdgeTriangleMismatch {
        /// The offending edge
        edge: EdgeKey,
        /// The triangle in question
        triangle: TriKey,
    },
    /// A point's incident-edge set disagrees with the edge registry
    PointEdgeMismatch {
        /// The offending point
        point: PointId,
        /// The edge in question
        edge: EdgeKey,
    },
    /// A triangle references a point that is not registered
    MissingTrianglePoint {
        /// The offending triangle
        triangle: TriKey,
        /// The unregistered point
        point: PointId,
    },
    /// A triangle's bounding edge is missing from the edge registry or does
    /// not list the triangle as incident
    TriangleEdgeMismatch {
        /// The offending triangle
        triangle: TriKey,
        /// The edge in question
        edge: EdgeKey,
    },
    /// A triangle has fewer than three distinct points
    DegenerateTriangle {
        /// The offending triangle
        triangle: TriKey,
    },
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::MissingEdgeEndpoint { edge, point } => {
                write!(f, "edge {} references unregistered point {}", edge, point)
            }
            Issue::EdgeOverloaded { edge, count } => {
                write!(f, "edge {} is incident to {} triangles", edge, count)
            }
            Issue::EdgeTriangleMismatch { edge, triangle } => {
                write!(f, "edge {} lists triangle {} inconsistently", edge, triangle)
            }
            Issue::PointEdgeMismatch { point, edge } => {
                write!(f, "point {} and edge {} disagree on incidence", point, edge)
            }
            Issue::MissingTrianglePoint { triangle, point } => {
                write!(f, "triangle {} references unregistered point {}", triangle, point)
            }
            Issue::TriangleEdgeMismatch { triangle, edge } => {
                write!(f, "triangle {} and edge {} disagree on incidence", triangle, edge)
            }
            Issue::DegenerateTriangle { triangle } => {
                write!(f, "triangle {} has duplicate points", triangle)
            }
        }
    }
}

/// Registries shared behind the store lock
#[derive(Debug, Default)]
struct Registries {
    points: HashMap<PointId, Point>,
    /// Quantized position -> point id, for position deduplication
    position_index: HashMap<[i64; 3], PointId>,
    next_point_id: PointId,
    next_edge_index: usize,
    edges: HashMap<EdgeKey, Edge>,
    point_edges: HashMap<PointId, Vec<EdgeKey>>,
    triangles: HashMap<TriKey, Triangle>,
    edge_triangles: HashMap<EdgeKey, Vec<TriKey>>,
    point_triangles: HashMap<PointId, Vec<TriKey>>,
}

impl Registries {
    fn quantize(&self, position: Vec3, tolerance: f32) -> [i64; 3] {
        [
            (position.x / tolerance).round() as i64,
            (position.y / tolerance).round() as i64,
            (position.z / tolerance).round() as i64,
        ]
    }

    /// Look up a registered point within `tolerance` of `position`
    ///
    /// Scans the 3x3x3 neighborhood of the quantized cell so points that
    /// straddle a cell boundary are still found.
    fn find_near(&self, position: Vec3, tolerance: f32) -> Option<PointId> {
        let cell = self.quantize(position, tolerance);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let key = [cell[0] + dx, cell[1] + dy, cell[2] + dz];
                    if let Some(&id) = self.position_index.get(&key) {
                        if let Some(p) = self.points.get(&id) {
                            if p.position.distance(position) <= tolerance {
                                return Some(id);
                            }
                        }
                    }
                }
            }
        }
        None
    }

    fn unlink_triangle(&mut self, key: TriKey) -> Option<Triangle> {
        let tri = self.triangles.remove(&key)?;
        for edge in tri.edges {
            if let Some(list) = self.edge_triangles.get_mut(&edge) {
                list.retain(|&t| t != key);
            }
        }
        for point in tri.points {
            if let Some(list) = self.point_triangles.get_mut(&point) {
                list.retain(|&t| t != key);
            }
        }
        Some(tri)
    }

    fn unlink_edge(&mut self, key: EdgeKey) -> Option<Edge> {
        let edge = self.edges.remove(&key)?;
        for endpoint in [key.a(), key.b()] {
            if let Some(list) = self.point_edges.get_mut(&endpoint) {
                list.retain(|&k| k != key);
            }
        }
        self.edge_triangles.remove(&key);
        Some(edge)
    }

    fn link_edge(&mut self, key: EdgeKey, edge: Edge) {
        self.edges.insert(key, edge);
        self.point_edges.entry(key.a()).or_default().push(key);
        self.point_edges.entry(key.b()).or_default().push(key);
    }

    /// Insert a triangle, creating missing edges, after checking that none
    /// of its edges would exceed two incident triangles. The caller has
    /// already verified the points exist and the triple is new.
    fn link_triangle(&mut self, points: [PointId; 3]) -> Result<Triangle> {
        let tri = Triangle::from_points(points);
        let key = tri.key();

        for edge in tri.edges {
            let incident = self.edge_triangles.get(&edge).map_or(0, |l| l.len());
            if incident >= 2 {
                return Err(MeshError::EdgeSaturated {
                    a: edge.a(),
                    b: edge.b(),
                });
            }
        }

        for edge in tri.edges {
            if !self.edges.contains_key(&edge) {
                let record = Edge {
                    index: self.next_edge_index,
                    origin: edge.a(),
                    target: edge.b(),
                };
                self.next_edge_index += 1;
                self.link_edge(edge, record);
            }
            self.edge_triangles.entry(edge).or_default().push(key);
        }
        for point in points {
            self.point_triangles.entry(point).or_default().push(key);
        }
        self.triangles.insert(key, tri);
        Ok(tri)
    }

    /// Orient `points` counter-clockwise as seen from outside the sphere
    /// (positive dot of face normal with the outward centroid direction)
    fn orient_outward(&self, points: [PointId; 3]) -> [PointId; 3] {
        let a = self.points[&points[0]].position;
        let b = self.points[&points[1]].position;
        let c = self.points[&points[2]].position;
        let outward = (a + b + c) / 3.0;
        if triangle_normal(a, b, c).dot(outward) < 0.0 {
            [points[0], points[2], points[1]]
        } else {
            points
        }
    }
}

/// The canonical registry of points, edges, and triangles
///
/// One store is created per generation run and threaded through every call;
/// its single lock is an internal detail. Mutating facade operations hold
/// the lock for their whole duration so each is atomic; accessor methods
/// return snapshot copies that may be stale by the time the caller looks at
/// them, which is acceptable for diagnostics.
#[derive(Debug)]
pub struct TopologyStore {
    inner: Mutex<Registries>,
    dedup_tolerance: f32,
}

impl Default for TopologyStore {
    fn default() -> Self {
        Self::new(1e-4)
    }
}

impl TopologyStore {
    /// Create an empty store with the given position-deduplication tolerance
    pub fn new(dedup_tolerance: f32) -> Self {
        Self {
            inner: Mutex::new(Registries::default()),
            dedup_tolerance,
        }
    }

    fn registries(&self) -> MutexGuard<'_, Registries> {
        self.inner.lock().expect("topology store lock poisoned")
    }

    /// The position-deduplication tolerance this store was created with
    #[inline]
    pub fn dedup_tolerance(&self) -> f32 {
        self.dedup_tolerance
    }

    /// Return the registered point at `position`, creating it if absent
    ///
    /// Positions within the dedup tolerance of an existing point return
    /// that point instead of creating a near-duplicate.
    pub fn get_or_create_point(&self, position: Vec3) -> Point {
        let mut reg = self.registries();
        if let Some(id) = reg.find_near(position, self.dedup_tolerance) {
            return reg.points[&id];
        }
        let id = reg.next_point_id;
        reg.next_point_id += 1;
        let point = Point {
            id,
            position,
            elevation: 0.0,
            stress: 0.0,
        };
        let cell = reg.quantize(position, self.dedup_tolerance);
        reg.points.insert(id, point);
        reg.position_index.insert(cell, id);
        point
    }

    /// Look up a point by identity
    pub fn point(&self, id: PointId) -> Option<Point> {
        self.registries().points.get(&id).copied()
    }

    /// Number of registered points
    pub fn point_count(&self) -> usize {
        self.registries().points.len()
    }

    /// Snapshot of all registered points, sorted by identity
    pub fn points(&self) -> Vec<Point> {
        let reg = self.registries();
        let mut points: Vec<Point> = reg.points.values().copied().collect();
        points.sort_by_key(|p| p.id);
        points
    }

    /// Replace a point's position, keeping its identity
    ///
    /// # Errors
    ///
    /// Returns `TopologyError` if the point is not registered.
    pub fn update_point(&self, id: PointId, position: Vec3) -> Result<()> {
        let mut reg = self.registries();
        let old = reg
            .points
            .get(&id)
            .copied()
            .ok_or_else(|| MeshError::TopologyError(format!("point {} not registered", id)))?;

        let old_cell = reg.quantize(old.position, self.dedup_tolerance);
        if reg.position_index.get(&old_cell) == Some(&id) {
            reg.position_index.remove(&old_cell);
        }
        let new_cell = reg.quantize(position, self.dedup_tolerance);
        reg.position_index.insert(new_cell, id);
        if let Some(p) = reg.points.get_mut(&id) {
            p.position = position;
        }
        Ok(())
    }

    /// Set a point's elevation attribute
    pub fn set_elevation(&self, id: PointId, elevation: f32) -> Result<()> {
        let mut reg = self.registries();
        match reg.points.get_mut(&id) {
            Some(p) => {
                p.elevation = elevation;
                Ok(())
            }
            None => Err(MeshError::TopologyError(format!(
                "point {} not registered",
                id
            ))),
        }
    }

    /// Set a point's stress attribute
    pub fn set_stress(&self, id: PointId, stress: f32) -> Result<()> {
        let mut reg = self.registries();
        match reg.points.get_mut(&id) {
            Some(p) => {
                p.stress = stress;
                Ok(())
            }
            None => Err(MeshError::TopologyError(format!(
                "point {} not registered",
                id
            ))),
        }
    }

    /// Return the edge between `a` and `b`, creating it if absent
    ///
    /// A new edge is registered under its [`EdgeKey`] and in both points'
    /// incident-edge sets. `explicit_index` pins the directed record's
    /// creation index; `None` assigns the next one.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a zero-length edge (`a == b`) and
    /// `TopologyError` when either endpoint is not registered.
    pub fn get_or_create_edge(
        &self,
        a: PointId,
        b: PointId,
        explicit_index: Option<usize>,
    ) -> Result<Edge> {
        if a == b {
            return Err(MeshError::InvalidInput(format!(
                "degenerate edge from point {} to itself",
                a
            )));
        }
        let mut reg = self.registries();
        for endpoint in [a, b] {
            if !reg.points.contains_key(&endpoint) {
                return Err(MeshError::TopologyError(format!(
                    "point {} not registered",
                    endpoint
                )));
            }
        }
        let key = EdgeKey::new(a, b);
        if let Some(edge) = reg.edges.get(&key) {
            return Ok(*edge);
        }
        let index = match explicit_index {
            Some(i) => i,
            None => {
                let i = reg.next_edge_index;
                reg.next_edge_index += 1;
                i
            }
        };
        let edge = Edge {
            index,
            origin: a,
            target: b,
        };
        reg.link_edge(key, edge);
        Ok(edge)
    }

    /// Look up an edge by key
    pub fn edge(&self, key: EdgeKey) -> Option<Edge> {
        self.registries().edges.get(&key).copied()
    }

    /// Number of registered edges
    pub fn edge_count(&self) -> usize {
        self.registries().edges.len()
    }

    /// Snapshot of the edges incident to a point
    pub fn incident_edges(&self, point: PointId) -> Vec<Edge> {
        let reg = self.registries();
        reg.point_edges
            .get(&point)
            .map(|keys| keys.iter().filter_map(|k| reg.edges.get(k)).copied().collect())
            .unwrap_or_default()
    }

    /// Register a triangle over three existing points
    ///
    /// Creates any missing bounding edges and links the triangle into the
    /// incident sets of its edges and points. The vertex order is stored
    /// as given and carries the winding.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the points are not distinct
    /// - `TopologyError` if a point is unregistered or the triple is
    ///   already registered
    /// - `EdgeSaturated` if any bounding edge already has two triangles
    pub fn add_triangle(&self, points: [PointId; 3]) -> Result<Triangle> {
        let key = TriKey::new(points);
        if points[0] == points[1] || points[1] == points[2] || points[0] == points[2] {
            return Err(MeshError::InvalidInput(format!(
                "triangle {} has duplicate points",
                key
            )));
        }
        let mut reg = self.registries();
        for point in points {
            if !reg.points.contains_key(&point) {
                return Err(MeshError::TopologyError(format!(
                    "point {} not registered",
                    point
                )));
            }
        }
        if reg.triangles.contains_key(&key) {
            return Err(MeshError::TopologyError(format!(
                "triangle {} already registered",
                key
            )));
        }
        reg.link_triangle(points)
    }

    /// Look up a triangle by its sorted triple
    pub fn triangle(&self, key: TriKey) -> Option<Triangle> {
        self.registries().triangles.get(&key).copied()
    }

    /// Number of registered triangles
    pub fn triangle_count(&self) -> usize {
        self.registries().triangles.len()
    }

    /// Snapshot of all registered triangles, sorted by key
    pub fn triangles(&self) -> Vec<Triangle> {
        let reg = self.registries();
        let mut tris: Vec<Triangle> = reg.triangles.values().copied().collect();
        tris.sort_by_key(|t| t.key());
        tris
    }

    /// Snapshot of the triangles incident to an edge
    pub fn triangles_by_edge(&self, key: EdgeKey) -> Vec<Triangle> {
        let reg = self.registries();
        reg.edge_triangles
            .get(&key)
            .map(|keys| {
                keys.iter()
                    .filter_map(|k| reg.triangles.get(k))
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Snapshot of the triangles incident to a point
    pub fn incident_triangles(&self, point: PointId) -> Vec<Triangle> {
        let reg = self.registries();
        reg.point_triangles
            .get(&point)
            .map(|keys| {
                keys.iter()
                    .filter_map(|k| reg.triangles.get(k))
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Remove a triangle, unlinking it from every registry
    ///
    /// # Errors
    ///
    /// Returns `TopologyError` if the triangle is not registered.
    pub fn remove_triangle(&self, key: TriKey) -> Result<Triangle> {
        let mut reg = self.registries();
        reg.unlink_triangle(key)
            .ok_or_else(|| MeshError::TopologyError(format!("triangle {} not registered", key)))
    }

    /// Atomically replace a triangle with one over different points
    ///
    /// The old entry is unlinked from every registry before the replacement
    /// is linked; both happen under one lock acquisition.
    pub fn update_triangle(&self, old: TriKey, new_points: [PointId; 3]) -> Result<Triangle> {
        let new_key = TriKey::new(new_points);
        let mut reg = self.registries();
        if !reg.triangles.contains_key(&old) {
            return Err(MeshError::TopologyError(format!(
                "triangle {} not registered",
                old
            )));
        }
        if new_key != old && reg.triangles.contains_key(&new_key) {
            return Err(MeshError::TopologyError(format!(
                "triangle {} already registered",
                new_key
            )));
        }
        for point in new_points {
            if !reg.points.contains_key(&point) {
                return Err(MeshError::TopologyError(format!(
                    "point {} not registered",
                    point
                )));
            }
        }
        let removed = reg.unlink_triangle(old).expect("checked above");
        match reg.link_triangle(new_points) {
            Ok(tri) => Ok(tri),
            Err(err) => {
                // Roll the old triangle back so the registries stay whole
                reg.link_triangle(removed.points)
                    .expect("relink of removed triangle cannot saturate its own edges");
                Err(err)
            }
        }
    }

    /// Remove an edge that bounds no triangles
    ///
    /// # Errors
    ///
    /// Returns `TopologyError` if the edge is not registered or still has
    /// incident triangles.
    pub fn remove_edge(&self, key: EdgeKey) -> Result<Edge> {
        let mut reg = self.registries();
        let incident = reg.edge_triangles.get(&key).map_or(0, |l| l.len());
        if incident > 0 {
            return Err(MeshError::TopologyError(format!(
                "edge {} still bounds {} triangle(s)",
                key, incident
            )));
        }
        reg.unlink_edge(key)
            .ok_or_else(|| MeshError::TopologyError(format!("edge {} not registered", key)))
    }

    /// Atomically replace an unused edge with one between different points
    ///
    /// Only edges with no incident triangles can be replaced; the old record
    /// is unlinked from both endpoint sets before the new one is linked.
    pub fn update_edge(&self, old: EdgeKey, a: PointId, b: PointId) -> Result<Edge> {
        if a == b {
            return Err(MeshError::InvalidInput(format!(
                "degenerate edge from point {} to itself",
                a
            )));
        }
        let mut reg = self.registries();
        let incident = reg.edge_triangles.get(&old).map_or(0, |l| l.len());
        if incident > 0 {
            return Err(MeshError::TopologyError(format!(
                "edge {} still bounds {} triangle(s)",
                old, incident
            )));
        }
        for endpoint in [a, b] {
            if !reg.points.contains_key(&endpoint) {
                return Err(MeshError::TopologyError(format!(
                    "point {} not registered",
                    endpoint
                )));
            }
        }
        let new_key = EdgeKey::new(a, b);
        if new_key != old && reg.edges.contains_key(&new_key) {
            return Err(MeshError::TopologyError(format!(
                "edge {} already registered",
                new_key
            )));
        }
        let removed = reg
            .unlink_edge(old)
            .ok_or_else(|| MeshError::TopologyError(format!("edge {} not registered", old)))?;
        let edge = Edge {
            index: removed.index,
            origin: a,
            target: b,
        };
        reg.link_edge(new_key, edge);
        Ok(edge)
    }

    /// Flip the shared edge of two adjacent triangles to the opposite
    /// diagonal
    ///
    /// The whole remove-then-add sequence runs under one lock acquisition:
    /// both triangles and the shared edge are unlinked, the opposite
    /// diagonal is registered, and two replacement triangles (oriented
    /// against the outward radial direction) are linked. Returns the new
    /// diagonal's key.
    ///
    /// # Errors
    ///
    /// Returns `TopologyError` when the edge does not have exactly two
    /// incident triangles, the opposite diagonal already exists, or a
    /// replacement triangle would duplicate an existing one.
    pub fn flip_edge(&self, key: EdgeKey) -> Result<EdgeKey> {
        let mut reg = self.registries();
        let incident: Vec<TriKey> = reg.edge_triangles.get(&key).cloned().unwrap_or_default();
        if incident.len() != 2 {
            return Err(MeshError::TopologyError(format!(
                "edge {} bounds {} triangle(s), cannot flip",
                key,
                incident.len()
            )));
        }
        let tri_a = reg.triangles[&incident[0]];
        let tri_b = reg.triangles[&incident[1]];

        let opposite = |tri: &Triangle| {
            tri.points
                .iter()
                .copied()
                .find(|p| !key.contains(*p))
                .ok_or_else(|| {
                    MeshError::TopologyError(format!(
                        "triangle {} has no point off edge {}",
                        tri.key(),
                        key
                    ))
                })
        };
        let c = opposite(&tri_a)?;
        let d = opposite(&tri_b)?;
        if c == d {
            return Err(MeshError::TopologyError(format!(
                "triangles across edge {} share all points",
                key
            )));
        }
        let diagonal = EdgeKey::new(c, d);
        if reg.edges.contains_key(&diagonal) {
            return Err(MeshError::TopologyError(format!(
                "diagonal {} already registered, cannot flip {}",
                diagonal, key
            )));
        }
        let new_a = reg.orient_outward([c, d, key.a()]);
        let new_b = reg.orient_outward([d, c, key.b()]);
        for new_points in [new_a, new_b] {
            if reg.triangles.contains_key(&TriKey::new(new_points)) {
                return Err(MeshError::TopologyError(format!(
                    "triangle {} already registered, cannot flip {}",
                    TriKey::new(new_points),
                    key
                )));
            }
        }

        reg.unlink_triangle(incident[0]);
        reg.unlink_triangle(incident[1]);
        reg.unlink_edge(key);

        let index = reg.next_edge_index;
        reg.next_edge_index += 1;
        reg.link_edge(
            diagonal,
            Edge {
                index,
                origin: c,
                target: d,
            },
        );
        reg.link_triangle(new_a)
            .expect("flip target edges verified unsaturated");
        reg.link_triangle(new_b)
            .expect("flip target edges verified unsaturated");
        Ok(diagonal)
    }

    /// Non-mutating invariant check
    ///
    /// Walks every registry cross-reference and reports violations as a
    /// list of [`Issue`]s with enough identity context to diagnose them.
    /// Never panics; an empty list means all invariants hold.
    pub fn validate(&self, stage: &str) -> Vec<Issue> {
        let reg = self.registries();
        let mut issues = Vec::new();

        for (&key, _) in &reg.edges {
            for endpoint in [key.a(), key.b()] {
                if !reg.points.contains_key(&endpoint) {
                    issues.push(Issue::MissingEdgeEndpoint {
                        edge: key,
                        point: endpoint,
                    });
                }
                let listed = reg
                    .point_edges
                    .get(&endpoint)
                    .map_or(false, |l| l.contains(&key));
                if !listed {
                    issues.push(Issue::PointEdgeMismatch {
                        point: endpoint,
                        edge: key,
                    });
                }
            }
        }

        for (&point, keys) in &reg.point_edges {
            for key in keys {
                let valid = reg.edges.contains_key(key) && key.contains(point);
                if !valid {
                    issues.push(Issue::PointEdgeMismatch {
                        point,
                        edge: *key,
                    });
                }
            }
        }

        for (&edge, tri_keys) in &reg.edge_triangles {
            if tri_keys.len() > 2 {
                issues.push(Issue::EdgeOverloaded {
                    edge,
                    count: tri_keys.len(),
                });
            }
            for tri_key in tri_keys {
                let consistent = reg
                    .triangles
                    .get(tri_key)
                    .map_or(false, |t| t.edges.contains(&edge));
                if !consistent {
                    issues.push(Issue::EdgeTriangleMismatch {
                        edge,
                        triangle: *tri_key,
                    });
                }
            }
        }

        for (&tri_key, tri) in &reg.triangles {
            let p = tri.points;
            if p[0] == p[1] || p[1] == p[2] || p[0] == p[2] {
                issues.push(Issue::DegenerateTriangle { triangle: tri_key });
            }
            for point in p {
                if !reg.points.contains_key(&point) {
                    issues.push(Issue::MissingTrianglePoint {
                        triangle: tri_key,
                        point,
                    });
                }
                let listed = reg
                    .point_triangles
                    .get(&point)
                    .map_or(false, |l| l.contains(&tri_key));
                if !listed {
                    issues.push(Issue::MissingTrianglePoint {
                        triangle: tri_key,
                        point,
                    });
                }
            }
            for edge in tri.edges {
                let back_ref = reg
                    .edge_triangles
                    .get(&edge)
                    .map_or(false, |l| l.contains(&tri_key));
                if !reg.edges.contains_key(&edge) || !back_ref {
                    issues.push(Issue::TriangleEdgeMismatch {
                        triangle: tri_key,
                        edge,
                    });
                }
            }
        }

        eprintln!("[Validate] {}: {} issue(s)", stage, issues.len());
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_square() -> (TopologyStore, [PointId; 4]) {
        let store = TopologyStore::default();
        let a = store.get_or_create_point(Vec3::new(0.0, 0.0, 1.0)).id;
        let b = store.get_or_create_point(Vec3::new(1.0, 0.0, 1.0)).id;
        let c = store.get_or_create_point(Vec3::new(1.0, 1.0, 1.0)).id;
        let d = store.get_or_create_point(Vec3::new(0.0, 1.0, 1.0)).id;
        (store, [a, b, c, d])
    }

    #[test]
    fn test_point_dedup_within_tolerance() {
        let store = TopologyStore::new(1e-3);
        let p1 = store.get_or_create_point(Vec3::new(1.0, 2.0, 3.0));
        let p2 = store.get_or_create_point(Vec3::new(1.0, 2.0, 3.0 + 1e-4));
        let p3 = store.get_or_create_point(Vec3::new(1.0, 2.0, 3.1));

        assert_eq!(p1.id, p2.id);
        assert_ne!(p1.id, p3.id);
        assert_eq!(store.point_count(), 2);
    }

    #[test]
    fn test_point_ids_are_stable_and_sequential() {
        let store = TopologyStore::default();
        let p0 = store.get_or_create_point(Vec3::X);
        let p1 = store.get_or_create_point(Vec3::Y);
        assert_eq!(p0.id, 0);
        assert_eq!(p1.id, 1);
        assert_eq!(store.point(0).unwrap().position, Vec3::X);
    }

    #[test]
    fn test_edge_key_is_direction_agnostic() {
        assert_eq!(EdgeKey::new(3, 7), EdgeKey::new(7, 3));
        assert_eq!(EdgeKey::new(3, 7).a(), 3);
        assert_eq!(EdgeKey::new(3, 7).other(3), 7);
    }

    #[test]
    fn test_get_or_create_edge_dedups_by_key() {
        let (store, [a, b, _, _]) = store_with_square();
        let e1 = store.get_or_create_edge(a, b, None).unwrap();
        let e2 = store.get_or_create_edge(b, a, None).unwrap();
        assert_eq!(e1, e2);
        assert_eq!(store.edge_count(), 1);
        assert_eq!(store.incident_edges(a).len(), 1);
    }

    #[test]
    fn test_degenerate_edge_rejected() {
        let (store, [a, _, _, _]) = store_with_square();
        assert!(store.get_or_create_edge(a, a, None).is_err());
    }

    #[test]
    fn test_edge_requires_registered_endpoints() {
        let store = TopologyStore::default();
        let a = store.get_or_create_point(Vec3::X).id;
        assert!(store.get_or_create_edge(a, 99, None).is_err());
    }

    #[test]
    fn test_explicit_edge_index_is_kept() {
        let (store, [a, b, _, _]) = store_with_square();
        let e = store.get_or_create_edge(a, b, Some(42)).unwrap();
        assert_eq!(e.index, 42);
    }

    #[test]
    fn test_add_triangle_links_incidence() {
        let (store, [a, b, c, _]) = store_with_square();
        let tri = store.add_triangle([a, b, c]).unwrap();

        assert_eq!(store.triangle_count(), 1);
        assert_eq!(store.edge_count(), 3);
        assert_eq!(store.incident_triangles(a), vec![tri]);
        assert_eq!(store.triangles_by_edge(EdgeKey::new(a, b)), vec![tri]);
        assert!(store.validate("add_triangle").is_empty());
    }

    #[test]
    fn test_edge_saturation_is_an_error() {
        let (store, [a, b, c, d]) = store_with_square();
        let e = store.get_or_create_point(Vec3::new(0.5, 0.5, 2.0)).id;
        store.add_triangle([a, b, c]).unwrap();
        store.add_triangle([a, b, d]).unwrap();

        // Third triangle on edge (a, b) must be rejected
        let result = store.add_triangle([a, b, e]);
        assert_eq!(
            result,
            Err(MeshError::EdgeSaturated {
                a: a.min(b),
                b: a.max(b)
            })
        );
        // The failed insert left no partial links behind
        assert_eq!(store.triangle_count(), 2);
        assert!(store.validate("saturation").is_empty());
    }

    #[test]
    fn test_duplicate_triangle_rejected() {
        let (store, [a, b, c, _]) = store_with_square();
        store.add_triangle([a, b, c]).unwrap();
        assert!(store.add_triangle([c, a, b]).is_err());
        assert_eq!(store.triangle_count(), 1);
    }

    #[test]
    fn test_remove_triangle_unlinks_everything() {
        let (store, [a, b, c, _]) = store_with_square();
        let tri = store.add_triangle([a, b, c]).unwrap();
        store.remove_triangle(tri.key()).unwrap();

        assert_eq!(store.triangle_count(), 0);
        assert!(store.incident_triangles(a).is_empty());
        assert!(store.triangles_by_edge(EdgeKey::new(a, b)).is_empty());
        assert!(store.validate("remove_triangle").is_empty());
    }

    #[test]
    fn test_update_triangle_is_atomic_replace() {
        let (store, [a, b, c, d]) = store_with_square();
        let tri = store.add_triangle([a, b, c]).unwrap();
        let replaced = store.update_triangle(tri.key(), [a, c, d]).unwrap();

        assert_eq!(store.triangle_count(), 1);
        assert_eq!(replaced.key(), TriKey::new([a, c, d]));
        assert!(store.triangles_by_edge(EdgeKey::new(a, b)).is_empty());
        assert!(store.validate("update_triangle").is_empty());
    }

    #[test]
    fn test_remove_edge_refuses_bound_edges() {
        let (store, [a, b, c, _]) = store_with_square();
        store.add_triangle([a, b, c]).unwrap();
        assert!(store.remove_edge(EdgeKey::new(a, b)).is_err());

        store.remove_triangle(TriKey::new([a, b, c])).unwrap();
        assert!(store.remove_edge(EdgeKey::new(a, b)).is_ok());
        assert_eq!(store.edge_count(), 2);
    }

    #[test]
    fn test_update_edge_replaces_unused_record() {
        let (store, [a, b, c, d]) = store_with_square();
        store.get_or_create_edge(a, b, None).unwrap();
        let edge = store.update_edge(EdgeKey::new(a, b), c, d).unwrap();

        assert_eq!(edge.key(), EdgeKey::new(c, d));
        assert!(store.edge(EdgeKey::new(a, b)).is_none());
        assert!(store.validate("update_edge").is_empty());
    }

    #[test]
    fn test_flip_edge_swaps_diagonal() {
        let (store, [a, b, c, d]) = store_with_square();
        // Quadrilateral a-b-c-d triangulated along diagonal (a, c)
        store.add_triangle([a, b, c]).unwrap();
        store.add_triangle([a, c, d]).unwrap();

        let diagonal = store.flip_edge(EdgeKey::new(a, c)).unwrap();
        assert_eq!(diagonal, EdgeKey::new(b, d));

        assert_eq!(store.triangle_count(), 2);
        assert!(store.edge(EdgeKey::new(a, c)).is_none());
        assert_eq!(store.triangles_by_edge(diagonal).len(), 2);
        assert!(store.validate("flip").is_empty());
    }

    #[test]
    fn test_flip_requires_two_triangles() {
        let (store, [a, b, c, _]) = store_with_square();
        store.add_triangle([a, b, c]).unwrap();
        assert!(store.flip_edge(EdgeKey::new(a, b)).is_err());
    }

    #[test]
    fn test_update_point_keeps_identity() {
        let store = TopologyStore::default();
        let id = store.get_or_create_point(Vec3::X).id;
        store.update_point(id, Vec3::new(2.0, 0.0, 0.0)).unwrap();

        let p = store.point(id).unwrap();
        assert_eq!(p.id, id);
        assert_eq!(p.position, Vec3::new(2.0, 0.0, 0.0));
        assert!(store.update_point(99, Vec3::ZERO).is_err());
    }

    #[test]
    fn test_attributes_are_settable() {
        let store = TopologyStore::default();
        let id = store.get_or_create_point(Vec3::X).id;
        store.set_elevation(id, 3.5).unwrap();
        store.set_stress(id, -1.25).unwrap();

        let p = store.point(id).unwrap();
        assert_eq!(p.elevation, 3.5);
        assert_eq!(p.stress, -1.25);
    }

    #[test]
    fn test_validate_reports_clean_store() {
        let (store, [a, b, c, d]) = store_with_square();
        store.add_triangle([a, b, c]).unwrap();
        store.add_triangle([a, c, d]).unwrap();
        assert!(store.validate("clean").is_empty());
    }
}
