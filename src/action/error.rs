//! ActionError: failures raised while building or performing actions.
//!
//! Every variant is fatal for the coupling run: a half-applied transform must
//! never reach the next timestep, so nothing here is retried.

use thiserror::Error;

use crate::mesh_error::MeshError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ActionError {
    /// The Python module could not be imported.
    #[error("python module `{module}` could not be imported from `{path}`: {message}")]
    ModuleNotFound {
        module: String,
        path: String,
        message: String,
    },
    /// The module lacks a mandatory entry point.
    #[error("python module `{module}` does not define mandatory function `{function}`")]
    MissingHook { module: String, function: String },
    /// A data buffer could not be handed to the foreign runtime or taken back.
    #[error("cannot marshal data `{data}` for python module `{module}`: {reason}")]
    Marshal {
        module: String,
        data: String,
        reason: String,
    },
    /// A hook raised an exception.
    #[error("function `{function}` of python module `{module}` failed: {message}")]
    Foreign {
        module: String,
        function: String,
        message: String,
    },
    /// The interpreter could not be started or reset.
    #[error("python runtime error: {0}")]
    Runtime(String),
    /// The action's mesh is borrowed elsewhere while the action runs.
    #[error("mesh `{0}` is already borrowed while an action runs on it")]
    MeshBusy(String),
    /// Source and target data do not fit the action.
    #[error("action `{action}` cannot use the configured data: {reason}")]
    Incompatible { action: String, reason: String },
    /// Failure reported by a native closure action.
    #[error("native action `{action}` failed: {message}")]
    Native { action: String, message: String },
    #[error(transparent)]
    Mesh(#[from] MeshError),
}
