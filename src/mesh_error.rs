//! MeshError: unified error type for mesh and data model APIs
//!
//! Every fallible mesh operation returns this type instead of panicking, so
//! collaborators building meshes can surface bad input to the coupling loop.

use thiserror::Error;

use crate::mesh::{DataId, VertexId};

/// Unified error type for mesh construction, mutation and lookup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshError {
    /// Meshes are either planar or spatial.
    #[error("mesh dimension must be 2 or 3, got {0}")]
    InvalidDimensions(usize),
    /// Coordinates passed for a vertex do not match the mesh dimension.
    #[error("coordinate length mismatch: mesh has dimension {expected}, got {found} values")]
    CoordinateLength { expected: usize, found: usize },
    /// A vertex id that the mesh does not (or no longer) contain.
    #[error("unknown vertex `{0}`")]
    UnknownVertex(VertexId),
    /// An edge or triangle that repeats one of its corners.
    #[error("degenerate element: vertex `{0}` appears more than once")]
    DegenerateElement(VertexId),
    /// A data id that does not belong to this mesh.
    #[error("unknown data id `{0}`")]
    UnknownData(DataId),
    /// The same field passed as both source and target of an action.
    #[error("data `{0}` cannot be both source and target")]
    AliasedData(DataId),
    /// A data name that does not belong to this mesh.
    #[error("mesh `{mesh}` has no data named `{name}`")]
    UnknownDataName { mesh: String, name: String },
    /// Data dimensions must be at least one.
    #[error("data `{0}` must have at least one component per vertex")]
    ZeroDataDimensions(String),
    /// A data or group name used twice on the same mesh.
    #[error("mesh `{mesh}` already has an entry named `{name}`")]
    DuplicateName { mesh: String, name: String },
    /// A group name that the mesh does not contain.
    #[error("mesh `{mesh}` has no group named `{name}`")]
    UnknownGroup { mesh: String, name: String },
    /// A data buffer whose length does not match the vertex extent.
    #[error("data `{name}` holds {found} values, expected {expected}")]
    DataLength {
        name: String,
        expected: usize,
        found: usize,
    },
    /// The same vertex id appears twice in the mesh.
    #[error("duplicate vertex id `{0}`")]
    DuplicateVertex(VertexId),
    /// The id to slot index is out of sync with vertex storage.
    #[error("vertex index is stale for vertex `{0}`")]
    StaleVertexIndex(VertexId),
}
