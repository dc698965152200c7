//! Scales source data by a timestep ratio into target data.

use crate::action::{Action, ActionError, Timing, borrow_mesh};
use crate::mesh::{DataId, SharedMesh};

/// Factor applied by [`ScaleByDtAction`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DtScaling {
    /// `dt / full_dt`.
    ByComputedDtRatio,
    /// `dt`.
    ByDt,
    /// `computed_part_full_dt / full_dt`.
    ByComputedDtPartRatio,
}

impl DtScaling {
    fn factor(self, dt: f64, computed_part_full_dt: f64, full_dt: f64) -> f64 {
        match self {
            DtScaling::ByComputedDtRatio => dt / full_dt,
            DtScaling::ByDt => dt,
            DtScaling::ByComputedDtPartRatio => computed_part_full_dt / full_dt,
        }
    }
}

/// Writes `target = factor * source`, element-wise.
#[derive(Debug)]
pub struct ScaleByDtAction {
    timing: Timing,
    mesh: SharedMesh,
    source: DataId,
    target: DataId,
    scaling: DtScaling,
}

impl ScaleByDtAction {
    pub fn new(
        timing: Timing,
        mesh: SharedMesh,
        source: DataId,
        target: DataId,
        scaling: DtScaling,
    ) -> Self {
        ScaleByDtAction {
            timing,
            mesh,
            source,
            target,
            scaling,
        }
    }

    #[inline]
    pub fn scaling(&self) -> DtScaling {
        self.scaling
    }
}

impl Action for ScaleByDtAction {
    fn timing(&self) -> Timing {
        self.timing
    }

    fn name(&self) -> &str {
        "scale-by-dt"
    }

    fn mesh(&self) -> &SharedMesh {
        &self.mesh
    }

    fn perform_action(
        &mut self,
        _time: f64,
        dt: f64,
        computed_part_full_dt: f64,
        full_dt: f64,
    ) -> Result<(), ActionError> {
        let mut mesh = borrow_mesh(&self.mesh)?;
        let fields = mesh.action_fields(Some(self.source), Some(self.target))?;
        let (Some(source), Some(target)) = (fields.source, fields.target) else {
            return Ok(());
        };
        if source.dimensions() != target.dimensions() {
            return Err(ActionError::Incompatible {
                action: self.name().to_string(),
                reason: format!(
                    "source `{}` has {} components, target `{}` has {}",
                    source.name(),
                    source.dimensions(),
                    target.name(),
                    target.dimensions()
                ),
            });
        }
        let factor = self.scaling.factor(dt, computed_part_full_dt, full_dt);
        log::trace!(
            "scale-by-dt: {} = {} * {}",
            target.name(),
            factor,
            source.name()
        );
        for (t, s) in target.values_mut().iter_mut().zip(source.values()) {
            *t = factor * s;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh;

    fn setup(target_dims: usize) -> (SharedMesh, DataId, DataId) {
        let mut mesh = Mesh::new("M", 2).unwrap();
        mesh.create_vertex(&[0.0, 0.0]).unwrap();
        mesh.create_vertex(&[1.0, 0.0]).unwrap();
        let s = mesh.create_data("S", 1).unwrap();
        let t = mesh.create_data("T", target_dims).unwrap();
        mesh.allocate_data_values();
        mesh.data_mut(s).unwrap().values_mut().copy_from_slice(&[2.0, 4.0]);
        (mesh.into_shared(), s, t)
    }

    fn run(scaling: DtScaling) -> Vec<f64> {
        let (mesh, s, t) = setup(1);
        let mut action = ScaleByDtAction::new(Timing::RegularPost, mesh.clone(), s, t, scaling);
        action.perform_action(0.0, 0.25, 0.5, 1.0).unwrap();
        let out = mesh.borrow().data(t).unwrap().values().to_vec();
        out
    }

    #[test]
    fn computed_dt_ratio() {
        assert_eq!(run(DtScaling::ByComputedDtRatio), vec![0.5, 1.0]);
    }

    #[test]
    fn by_dt() {
        assert_eq!(run(DtScaling::ByDt), vec![0.5, 1.0]);
    }

    #[test]
    fn computed_dt_part_ratio() {
        assert_eq!(run(DtScaling::ByComputedDtPartRatio), vec![1.0, 2.0]);
    }

    #[test]
    fn mismatched_dimensions_rejected() {
        let (mesh, s, t) = setup(2);
        let mut action = ScaleByDtAction::new(Timing::RegularPost, mesh, s, t, DtScaling::ByDt);
        let err = action.perform_action(0.0, 1.0, 1.0, 1.0).unwrap_err();
        assert!(matches!(err, ActionError::Incompatible { .. }));
    }
}
