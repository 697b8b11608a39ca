//! Error types for mesh generation and topology mutation

use std::fmt;

/// Errors that can occur during mesh generation or topology mutation
#[derive(Debug, Clone, PartialEq)]
pub enum MeshError {
    /// Configuration validation failed
    InvalidConfig(String),
    /// A triangulation or projection call received malformed input
    InvalidInput(String),
    /// An undirected edge would gain a third incident triangle
    EdgeSaturated {
        /// Smaller point identity of the edge
        a: usize,
        /// Larger point identity of the edge
        b: usize,
    },
    /// A registry lookup or replacement referenced a missing entry
    TopologyError(String),
}

impl fmt::Display for MeshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            MeshError::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            MeshError::EdgeSaturated { a, b } => {
                write!(f, "edge ({}, {}) already bounds two triangles", a, b)
            }
            MeshError::TopologyError(msg) => write!(f, "topology error: {}", msg),
        }
    }
}

impl std::error::Error for MeshError {}

/// Result type alias for mesh operations
pub type Result<T> = std::result::Result<T, MeshError>;
