//! Timing-gated actions that transform per-vertex data during coupling.
//!
//! An [`Action`] is built once at configuration time with a [`Timing`], the
//! mesh it applies to, and optional source/target data. The coupling loop
//! then calls [`Action::perform_action`] once per occurrence of that timing,
//! through an [`ActionRegistry`] that preserves registration order.
//!
//! Implementations:
//! - [`ScaleByDtAction`]: target = source scaled by a timestep ratio.
//! - [`ScaleByAreaAction`]: target scaled by the area around each vertex.
//! - [`ClosureAction`]: any native closure.
//! - `PythonAction` (feature `python`): user logic in an embedded interpreter.

pub mod closure;
pub mod config;
pub mod error;
#[cfg(feature = "python")]
pub mod python;
pub mod registry;
pub mod scale_by_area;
pub mod scale_by_dt;

use std::cell::RefMut;
use std::fmt;

use crate::mesh::{Mesh, SharedMesh};

pub use closure::{ClosureAction, StepInfo};
pub use config::ActionConfig;
pub use error::ActionError;
#[cfg(feature = "python")]
pub use python::PythonAction;
pub use registry::ActionRegistry;
pub use scale_by_area::{AreaScaling, ScaleByAreaAction};
pub use scale_by_dt::{DtScaling, ScaleByDtAction};

/// Point of the coupling timestep at which an action runs.
///
/// The coupling scheme owns the schedule; actions only store one of these
/// values and the registry matches it by equality.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Timing {
    /// Before every advance, whether or not data is exchanged.
    RegularPrior,
    /// After every advance, whether or not data is exchanged.
    RegularPost,
    /// Before data is exchanged with the other participants.
    OnExchangePrior,
    /// After data has been received from the other participants.
    OnExchangePost,
    /// After a timestep (and all its coupling iterations) has converged.
    OnTimestepCompletePost,
}

impl Timing {
    /// All timings in the order the coupling loop reaches them.
    pub const ALL: [Timing; 5] = [
        Timing::RegularPrior,
        Timing::OnExchangePrior,
        Timing::OnExchangePost,
        Timing::OnTimestepCompletePost,
        Timing::RegularPost,
    ];

    /// Configuration name of the timing.
    pub fn as_str(&self) -> &'static str {
        match self {
            Timing::RegularPrior => "regular-prior",
            Timing::RegularPost => "regular-post",
            Timing::OnExchangePrior => "on-exchange-prior",
            Timing::OnExchangePost => "on-exchange-post",
            Timing::OnTimestepCompletePost => "on-timestep-complete-post",
        }
    }
}

impl fmt::Display for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation run by the coupling loop at a fixed [`Timing`].
///
/// `perform_action` is called once per timing occurrence and must be safe
/// to call when there is nothing to do. It must not change the action's
/// timing. Errors are fatal for the run.
pub trait Action {
    /// Timing fixed at construction.
    fn timing(&self) -> Timing;

    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Mesh the action applies to.
    fn mesh(&self) -> &SharedMesh;

    /// Runs the action for the current timestep.
    ///
    /// `dt` is the timestep just computed, `computed_part_full_dt` the part of
    /// the coupling window computed so far and `full_dt` the window length.
    fn perform_action(
        &mut self,
        time: f64,
        dt: f64,
        computed_part_full_dt: f64,
        full_dt: f64,
    ) -> Result<(), ActionError>;
}

/// Takes the exclusive borrow an action needs while it runs.
pub(crate) fn borrow_mesh(mesh: &SharedMesh) -> Result<RefMut<'_, Mesh>, ActionError> {
    mesh.try_borrow_mut().map_err(|_| {
        let name = mesh
            .try_borrow()
            .map(|m| m.name().to_string())
            .unwrap_or_else(|_| "<mutably borrowed>".to_string());
        ActionError::MeshBusy(name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_names_match_serde() {
        for timing in Timing::ALL {
            let json = serde_json::to_string(&timing).unwrap();
            assert_eq!(json, format!("\"{}\"", timing.as_str()));
            let back: Timing = serde_json::from_str(&json).unwrap();
            assert_eq!(back, timing);
        }
    }

    #[test]
    fn busy_mesh_is_an_error() {
        let mesh = Mesh::new("Busy", 2).unwrap().into_shared();
        let reader = mesh.borrow();
        assert_eq!(
            borrow_mesh(&mesh).unwrap_err(),
            ActionError::MeshBusy("Busy".into())
        );
        drop(reader);
        assert!(borrow_mesh(&mesh).is_ok());
    }
}
