//! Serializable action descriptions.
//!
//! Parsing configuration files is left to the embedding application; it
//! deserializes [`ActionConfig`] values with whatever serde format it uses
//! and turns them into live actions with [`ActionConfig::build`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::action::{
    Action, ActionError, AreaScaling, DtScaling, ScaleByAreaAction, ScaleByDtAction, Timing,
};
use crate::mesh::{DataId, SharedMesh};

/// One configured action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "kebab-case")]
pub enum ActionConfig {
    ScaleByDt {
        timing: Timing,
        mesh: String,
        source: String,
        target: String,
        scaling: DtScaling,
    },
    ScaleByArea {
        timing: Timing,
        mesh: String,
        target: String,
        scaling: AreaScaling,
    },
    Python {
        timing: Timing,
        mesh: String,
        /// Directory searched for the module; empty means the working directory.
        #[serde(default)]
        module_path: PathBuf,
        module: String,
        #[serde(default)]
        source: Option<String>,
        #[serde(default)]
        target: Option<String>,
    },
}

impl ActionConfig {
    /// Configuration tag of the action kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ActionConfig::ScaleByDt { .. } => "scale-by-dt",
            ActionConfig::ScaleByArea { .. } => "scale-by-area",
            ActionConfig::Python { .. } => "python",
        }
    }

    pub fn timing(&self) -> Timing {
        match self {
            ActionConfig::ScaleByDt { timing, .. }
            | ActionConfig::ScaleByArea { timing, .. }
            | ActionConfig::Python { timing, .. } => *timing,
        }
    }

    /// Name of the mesh the action applies to.
    pub fn mesh(&self) -> &str {
        match self {
            ActionConfig::ScaleByDt { mesh, .. }
            | ActionConfig::ScaleByArea { mesh, .. }
            | ActionConfig::Python { mesh, .. } => mesh,
        }
    }

    /// Resolves data names against `mesh` and builds the action.
    pub fn build(&self, mesh: SharedMesh) -> Result<Box<dyn Action>, ActionError> {
        let lookup = |name: &str| -> Result<DataId, ActionError> {
            let m = mesh
                .try_borrow()
                .map_err(|_| ActionError::MeshBusy(self.mesh().to_string()))?;
            Ok(m.data_id(name)?)
        };
        let action: Box<dyn Action> = match self {
            ActionConfig::ScaleByDt {
                timing,
                source,
                target,
                scaling,
                ..
            } => {
                let source = lookup(source)?;
                let target = lookup(target)?;
                Box::new(ScaleByDtAction::new(*timing, mesh, source, target, *scaling))
            }
            ActionConfig::ScaleByArea {
                timing,
                target,
                scaling,
                ..
            } => {
                let target = lookup(target)?;
                Box::new(ScaleByAreaAction::new(*timing, mesh, target, *scaling))
            }
            ActionConfig::Python {
                timing,
                module_path,
                module,
                source,
                target,
                ..
            } => {
                let source = source.as_deref().map(lookup).transpose()?;
                let target = target.as_deref().map(lookup).transpose()?;
                build_python(*timing, module_path, module, mesh, target, source)?
            }
        };
        Ok(action)
    }
}

#[cfg(feature = "python")]
fn build_python(
    timing: Timing,
    module_path: &std::path::Path,
    module: &str,
    mesh: SharedMesh,
    target: Option<DataId>,
    source: Option<DataId>,
) -> Result<Box<dyn Action>, ActionError> {
    Ok(Box::new(crate::action::PythonAction::new(
        timing,
        module_path,
        module,
        mesh,
        target,
        source,
    )))
}

#[cfg(not(feature = "python"))]
fn build_python(
    _timing: Timing,
    _module_path: &std::path::Path,
    module: &str,
    _mesh: SharedMesh,
    _target: Option<DataId>,
    _source: Option<DataId>,
) -> Result<Box<dyn Action>, ActionError> {
    Err(ActionError::Runtime(format!(
        "cannot load python module `{module}`: built without the `python` feature"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh;
    use crate::mesh_error::MeshError;

    fn mesh() -> SharedMesh {
        let mut mesh = Mesh::new("Fluid", 2).unwrap();
        mesh.create_vertex(&[0.0, 0.0]).unwrap();
        mesh.create_data("Velocities", 1).unwrap();
        mesh.create_data("Forces", 1).unwrap();
        mesh.allocate_data_values();
        mesh.into_shared()
    }

    #[test]
    fn parses_tagged_json() {
        let json = r#"[
            {"type": "scale-by-dt", "timing": "on-exchange-post", "mesh": "Fluid",
             "source": "Forces", "target": "Velocities", "scaling": "by-computed-dt-ratio"},
            {"type": "python", "timing": "regular-prior", "mesh": "Fluid",
             "module-path": "actions", "module": "damping", "target": "Forces"}
        ]"#;
        let configs: Vec<ActionConfig> = serde_json::from_str(json).unwrap();
        assert_eq!(configs[0].kind(), "scale-by-dt");
        assert_eq!(configs[1].timing(), Timing::RegularPrior);
        match &configs[1] {
            ActionConfig::Python { source, target, module_path, .. } => {
                assert_eq!(source, &None);
                assert_eq!(target.as_deref(), Some("Forces"));
                assert_eq!(module_path, &PathBuf::from("actions"));
            }
            other => panic!("unexpected config {:?}", other),
        }
    }

    #[test]
    fn build_resolves_data_names() {
        let config = ActionConfig::ScaleByArea {
            timing: Timing::OnExchangePost,
            mesh: "Fluid".into(),
            target: "Forces".into(),
            scaling: AreaScaling::MultiplyingByArea,
        };
        let action = config.build(mesh()).unwrap();
        assert_eq!(action.timing(), Timing::OnExchangePost);
        assert_eq!(action.name(), "scale-by-area");
    }

    #[test]
    fn unknown_data_is_a_configuration_error() {
        let config = ActionConfig::ScaleByDt {
            timing: Timing::RegularPost,
            mesh: "Fluid".into(),
            source: "Pressure".into(),
            target: "Forces".into(),
            scaling: DtScaling::ByDt,
        };
        let err = config.build(mesh()).err().unwrap();
        assert!(matches!(
            err,
            ActionError::Mesh(MeshError::UnknownDataName { .. })
        ));
    }
}
