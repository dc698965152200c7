//! Native action backed by a closure.

use std::fmt;

use crate::action::{Action, ActionError, Timing, borrow_mesh};
use crate::mesh::{ActionFields, DataId, SharedMesh};

/// Timestep arguments of one `perform_action` call.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StepInfo {
    pub time: f64,
    pub dt: f64,
    pub computed_part_full_dt: f64,
    pub full_dt: f64,
}

type ActionFn = dyn FnMut(ActionFields<'_>, StepInfo) -> Result<(), ActionError>;

/// Runs a native closure over the action's source and target data.
pub struct ClosureAction {
    name: String,
    timing: Timing,
    mesh: SharedMesh,
    source: Option<DataId>,
    target: Option<DataId>,
    op: Box<ActionFn>,
}

impl ClosureAction {
    pub fn new<F>(
        name: impl Into<String>,
        timing: Timing,
        mesh: SharedMesh,
        source: Option<DataId>,
        target: Option<DataId>,
        op: F,
    ) -> Self
    where
        F: FnMut(ActionFields<'_>, StepInfo) -> Result<(), ActionError> + 'static,
    {
        ClosureAction {
            name: name.into(),
            timing,
            mesh,
            source,
            target,
            op: Box::new(op),
        }
    }
}

impl fmt::Debug for ClosureAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureAction")
            .field("name", &self.name)
            .field("timing", &self.timing)
            .field("source", &self.source)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl Action for ClosureAction {
    fn timing(&self) -> Timing {
        self.timing
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn mesh(&self) -> &SharedMesh {
        &self.mesh
    }

    fn perform_action(
        &mut self,
        time: f64,
        dt: f64,
        computed_part_full_dt: f64,
        full_dt: f64,
    ) -> Result<(), ActionError> {
        let mut mesh = borrow_mesh(&self.mesh)?;
        let fields = mesh.action_fields(self.source, self.target)?;
        let step = StepInfo {
            time,
            dt,
            computed_part_full_dt,
            full_dt,
        };
        (self.op)(fields, step)
    }
}
