#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-coupling
//!
//! mesh-coupling is the participant-side mesh layer of a partitioned
//! multi-physics coupling library. It stores the coupling meshes of one
//! participant (vertices, edges, triangles, named vertex groups and
//! per-vertex data fields) and offers two ways to work with them:
//!
//! ## Features
//! - Read-only query handles ([`handle::MeshHandle`]) over the vertices,
//!   edges and triangles of a mesh or one of its groups, with cursors that
//!   behave like both C++-style iterators and Rust [`Iterator`]s
//! - Timing-gated actions ([`action::Action`]) that transform data fields
//!   at fixed points of the coupling loop, registered in an
//!   [`action::ActionRegistry`] and built from serde configuration
//! - Native actions for timestep and area scaling
//! - Python actions (feature `python`, on by default) that hand data fields
//!   to a user module as arrays aliasing the mesh's memory
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! mesh-coupling = "0.3"
//! # Without an embedded interpreter:
//! # mesh-coupling = { version = "0.3", default-features = false }
//! ```
//!
//! ## Invariant checks
//! Structural invariants of [`mesh::Mesh`] are validated after mutating
//! operations in debug builds, or in release builds with the
//! `check-invariants` feature. See [`DebugInvariants`].

pub mod action;
pub mod debug_invariants;
pub mod handle;
pub mod mesh;
pub mod mesh_error;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    #[cfg(feature = "python")]
    pub use crate::action::PythonAction;
    pub use crate::action::{
        Action, ActionConfig, ActionError, ActionRegistry, AreaScaling, ClosureAction, DtScaling,
        ScaleByAreaAction, ScaleByDtAction, StepInfo, Timing,
    };
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::handle::{
        EdgeHandle, EdgeItem, EdgeIterator, MeshHandle, TriangleHandle, TriangleItem,
        TriangleIterator, VertexHandle, VertexItem, VertexIterator,
    };
    pub use crate::mesh::{
        ActionFields, Coords, Data, DataId, GroupRef, Mesh, SharedMesh, VertexId,
    };
    pub use crate::mesh_error::MeshError;
}
