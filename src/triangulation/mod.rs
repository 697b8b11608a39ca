//! Delaunay triangulation engine
//!
//! Two interchangeable strategies over the geometric kernel and the
//! topology layer: a divide-and-conquer builder for bulk construction from
//! a point set, and an incremental flip-based relaxer for local
//! optimization of an existing mesh.

pub mod divide_conquer;
pub mod relax;

pub use divide_conquer::{triangulate, Triangulation};
pub use relax::{relax, RelaxReport};
