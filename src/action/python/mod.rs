//! Actions implemented by a user-supplied Python module.
//!
//! The module is imported lazily, on the first [`Action::perform_action`]
//! call, from a directory appended to `sys.path`. It must define
//!
//! ```python
//! def performAction(time, dt, computedPartFullDt, fullDt, source, target): ...
//! ```
//!
//! where `source` and `target` are only passed when the action was configured
//! with them. Two hooks are optional: `vertexCallback(id, coords,
//! sourceValue, targetValue)` runs once per vertex after `performAction` and
//! may return a new target value, and `postAction()` runs once at the end.
//!
//! Data buffers are passed as arrays aliasing the mesh's memory; see
//! [`marshal`] for the exact contract. A module that keeps one of them after
//! `performAction` returns disables the action: the field is moved to fresh
//! memory and every later call fails with the same error.

mod marshal;
pub mod runtime;

pub use runtime::{RuntimeGuard, generation, is_initialized, live_users};

use std::fmt;
use std::path::{Path, PathBuf};

use hashbrown::HashSet;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyModule, PyTuple};

use crate::action::closure::StepInfo;
use crate::action::{Action, ActionError, Timing, borrow_mesh};
use crate::mesh::{ActionFields, DataId, Mesh, SharedMesh};
use crate::mesh_error::MeshError;
use marshal::ArrayView;

const PERFORM_HOOK: &str = "performAction";
const VERTEX_HOOK: &str = "vertexCallback";
const POST_HOOK: &str = "postAction";

/// Action delegating to a Python module.
pub struct PythonAction {
    timing: Timing,
    module_path: PathBuf,
    module_name: String,
    mesh: SharedMesh,
    source: Option<DataId>,
    target: Option<DataId>,
    state: ModuleState,
}

enum ModuleState {
    Unloaded,
    Ready(LoadedModule),
    /// First-use initialization failed; the error is returned on every call.
    Failed(ActionError),
}

/// Imported module plus the runtime share that keeps it alive.
struct LoadedModule {
    hooks: Option<Hooks>,
    _runtime: RuntimeGuard,
}

struct Hooks {
    perform: Py<PyAny>,
    vertex: Option<Py<PyAny>>,
    post: Option<Py<PyAny>>,
    numpy: Option<Py<PyModule>>,
    _module: Py<PyModule>,
}

impl PythonAction {
    /// Stores the configuration. Nothing is imported until the action first runs.
    ///
    /// An empty `module_path` means the current working directory.
    pub fn new(
        timing: Timing,
        module_path: impl AsRef<Path>,
        module_name: impl Into<String>,
        mesh: SharedMesh,
        target: Option<DataId>,
        source: Option<DataId>,
    ) -> Self {
        PythonAction {
            timing,
            module_path: module_path.as_ref().to_path_buf(),
            module_name: module_name.into(),
            mesh,
            source,
            target,
            state: ModuleState::Unloaded,
        }
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn module_path(&self) -> &Path {
        &self.module_path
    }

    pub fn source(&self) -> Option<DataId> {
        self.source
    }

    pub fn target(&self) -> Option<DataId> {
        self.target
    }

    /// True once the module has been imported successfully.
    pub fn is_loaded(&self) -> bool {
        matches!(self.state, ModuleState::Ready(_))
    }

    /// The error that poisoned this action, if initialization failed.
    pub fn failure(&self) -> Option<&ActionError> {
        match &self.state {
            ModuleState::Failed(e) => Some(e),
            _ => None,
        }
    }

    fn search_dir(&self) -> PathBuf {
        let dir = if self.module_path.as_os_str().is_empty() {
            Path::new(".")
        } else {
            self.module_path.as_path()
        };
        std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf())
    }

    fn loaded(&mut self) -> Result<&Hooks, ActionError> {
        if let ModuleState::Unloaded = self.state {
            let dir = self.search_dir();
            self.state = match LoadedModule::load(&self.module_name, &dir) {
                Ok(module) => ModuleState::Ready(module),
                Err(e) => {
                    log::error!("python action `{}` disabled: {}", self.module_name, e);
                    ModuleState::Failed(e)
                }
            };
        }
        match &self.state {
            ModuleState::Ready(LoadedModule { hooks: Some(hooks), .. }) => Ok(hooks),
            ModuleState::Failed(e) => Err(e.clone()),
            _ => Err(ActionError::Runtime(format!(
                "python module `{}` is not loaded",
                self.module_name
            ))),
        }
    }
}

impl LoadedModule {
    fn load(module_name: &str, dir: &Path) -> Result<Self, ActionError> {
        let runtime = runtime::acquire()?;
        let hooks = Python::with_gil(|py| Hooks::resolve(py, &runtime, module_name, dir))?;
        log::info!(
            "loaded python module `{}` from {} (vertexCallback: {}, postAction: {})",
            module_name,
            dir.display(),
            hooks.vertex.is_some(),
            hooks.post.is_some()
        );
        Ok(LoadedModule {
            hooks: Some(hooks),
            _runtime: runtime,
        })
    }
}

impl Drop for LoadedModule {
    fn drop(&mut self) {
        if let Some(hooks) = self.hooks.take() {
            Python::with_gil(|_py| drop(hooks));
        }
    }
}

impl Hooks {
    fn resolve(
        py: Python<'_>,
        runtime: &RuntimeGuard,
        module_name: &str,
        dir: &Path,
    ) -> Result<Self, ActionError> {
        let not_found = |message: String| ActionError::ModuleNotFound {
            module: module_name.to_string(),
            path: dir.display().to_string(),
            message,
        };
        runtime
            .add_search_path(py, dir)
            .map_err(|e| not_found(e.to_string()))?;
        let before = module_names(py).map_err(|e| ActionError::Runtime(e.to_string()))?;
        let imported = py.import_bound(module_name);
        match session_modules(py, &before, dir, module_name) {
            Ok(names) => runtime.track_modules(names),
            Err(e) => {
                log::warn!("cannot list modules imported by `{}`: {}", module_name, e);
                runtime.track_modules([module_name.to_string()]);
            }
        }
        let module = imported.map_err(|e| not_found(describe(py, e)))?;

        let hook = |name: &str| {
            module
                .getattr(name)
                .ok()
                .filter(|f| f.is_callable())
                .map(Bound::unbind)
        };
        let perform = hook(PERFORM_HOOK).ok_or_else(|| ActionError::MissingHook {
            module: module_name.to_string(),
            function: PERFORM_HOOK.to_string(),
        })?;
        let numpy = match py.import_bound("numpy") {
            Ok(np) => Some(np.unbind()),
            Err(e) => {
                log::debug!("numpy unavailable, passing memoryviews: {}", e);
                None
            }
        };
        Ok(Hooks {
            perform,
            vertex: hook(VERTEX_HOOK),
            post: hook(POST_HOOK),
            numpy,
            _module: module.unbind(),
        })
    }

    /// Runs the hooks for one step against `mesh`.
    fn run(
        &self,
        py: Python<'_>,
        module: &str,
        mesh: &mut Mesh,
        source: Option<DataId>,
        target: Option<DataId>,
        step: StepInfo,
    ) -> Result<(), CallFailure> {
        let fields = mesh
            .action_fields(source, target)
            .map_err(|e| fields_error(module, e))?;
        let (outcome, retained) = self.perform(py, module, fields, step);
        if !retained.is_empty() {
            for id in retained {
                if let Ok(data) = mesh.data_mut(id) {
                    data.detach_values();
                }
            }
            let error = outcome.err().unwrap_or_else(|| {
                ActionError::Runtime(format!("python module `{module}` kept a data buffer"))
            });
            return Err(CallFailure {
                error,
                poisons: true,
            });
        }
        outcome?;

        let fields = mesh
            .action_fields(source, target)
            .map_err(|e| fields_error(module, e))?;
        self.callbacks(py, module, fields)?;
        Ok(())
    }

    /// Calls `performAction` with aliased buffers, then releases them.
    ///
    /// Also returns the fields whose memory the module still references.
    fn perform(
        &self,
        py: Python<'_>,
        module: &str,
        fields: ActionFields<'_>,
        step: StepInfo,
    ) -> (Result<(), ActionError>, Vec<DataId>) {
        let ActionFields { source, target, .. } = fields;
        let source_meta = source.map(|d| (d.id(), d.name().to_string()));
        let target_meta = target.as_deref().map(|d| (d.id(), d.name().to_string()));
        let marshal_error = |meta: &Option<(DataId, String)>, reason: String| ActionError::Marshal {
            module: module.to_string(),
            data: meta.as_ref().map(|(_, name)| name.clone()).unwrap_or_default(),
            reason,
        };
        let numpy = self.numpy.as_ref().map(|np| np.bind(py));

        let source_view = match source {
            Some(data) => match ArrayView::read_only(py, data.values(), data.dimensions(), numpy) {
                Ok(view) => Some(view),
                Err(r) => return (Err(marshal_error(&source_meta, r)), Vec::new()),
            },
            None => None,
        };
        let target_view = match target {
            Some(data) => {
                let dims = data.dimensions();
                match ArrayView::writable(py, data.values_mut(), dims, numpy) {
                    Ok(view) => Some(view),
                    Err(r) => return (Err(marshal_error(&target_meta, r)), Vec::new()),
                }
            }
            None => None,
        };

        let mut args: Vec<PyObject> = vec![
            step.time.into_py(py),
            step.dt.into_py(py),
            step.computed_part_full_dt.into_py(py),
            step.full_dt.into_py(py),
        ];
        args.extend(source_view.iter().map(|v| v.object().unbind()));
        args.extend(target_view.iter().map(|v| v.object().unbind()));
        let outcome = self
            .perform
            .bind(py)
            .call1(PyTuple::new_bound(py, args))
            .map(drop)
            .map_err(|e| ActionError::Foreign {
                module: module.to_string(),
                function: PERFORM_HOOK.to_string(),
                message: describe(py, e),
            });

        let mut retained = Vec::new();
        let mut retention = None;
        let mut copy_back = None;
        for (view, meta) in [(source_view, &source_meta), (target_view, &target_meta)] {
            let Some(view) = view else { continue };
            let Err(e) = view.finish() else { continue };
            let error = marshal_error(meta, e.to_string());
            if e.is_retained() {
                retained.extend(meta.as_ref().map(|(id, _)| *id));
                retention.get_or_insert(error);
            } else {
                copy_back.get_or_insert(error);
            }
        }
        let result = match (retention, outcome, copy_back) {
            (Some(e), _, _) | (None, Err(e), _) | (None, Ok(()), Some(e)) => Err(e),
            (None, Ok(()), None) => Ok(()),
        };
        (result, retained)
    }

    /// Runs `vertexCallback` for every vertex, then `postAction`.
    fn callbacks(
        &self,
        py: Python<'_>,
        module: &str,
        fields: ActionFields<'_>,
    ) -> Result<(), ActionError> {
        let ActionFields {
            vertices,
            source,
            mut target,
        } = fields;
        let foreign_error = |function: &str, message: String| ActionError::Foreign {
            module: module.to_string(),
            function: function.to_string(),
            message,
        };

        if let Some(callback) = &self.vertex {
            let callback = callback.bind(py);
            for (slot, vertex) in vertices.iter().enumerate() {
                let coords = PyTuple::new_bound(py, vertex.coords().iter());
                let source_value = entry(py, source.and_then(|d| d.vertex_values(slot)));
                let target_value =
                    entry(py, target.as_deref().and_then(|d| d.vertex_values(slot)));
                let returned = callback
                    .call1((vertex.id().get(), coords, source_value, target_value))
                    .map_err(|e| foreign_error(VERTEX_HOOK, describe(py, e)))?;
                if returned.is_none() {
                    continue;
                }
                let Some(data) = target.as_deref_mut() else {
                    return Err(foreign_error(
                        VERTEX_HOOK,
                        format!(
                            "returned a value for vertex {} but the action has no target data",
                            vertex.id()
                        ),
                    ));
                };
                let name = data.name().to_string();
                let values = data.vertex_values_mut(slot).ok_or_else(|| ActionError::Marshal {
                    module: module.to_string(),
                    data: name.clone(),
                    reason: format!("no values for vertex {}", vertex.id()),
                })?;
                store_entry(&returned, values).map_err(|r| ActionError::Marshal {
                    module: module.to_string(),
                    data: name,
                    reason: format!("vertex {}: {}", vertex.id(), r),
                })?;
            }
        }

        if let Some(post) = &self.post {
            post.bind(py)
                .call0()
                .map_err(|e| foreign_error(POST_HOOK, describe(py, e)))?;
        }
        Ok(())
    }
}

/// A failed call. Poisoning failures leave native memory reachable from the
/// module, so its hooks must not run again.
struct CallFailure {
    error: ActionError,
    poisons: bool,
}

impl From<ActionError> for CallFailure {
    fn from(error: ActionError) -> Self {
        CallFailure {
            error,
            poisons: false,
        }
    }
}

/// Per-vertex value as passed to `vertexCallback`.
fn entry(py: Python<'_>, values: Option<&[f64]>) -> PyObject {
    match values {
        None => py.None(),
        Some([value]) => (*value).into_py(py),
        Some(values) => PyTuple::new_bound(py, values.iter()).into_any().unbind(),
    }
}

fn store_entry(returned: &Bound<'_, PyAny>, values: &mut [f64]) -> Result<(), String> {
    if let [value] = values {
        if let Ok(v) = returned.extract::<f64>() {
            *value = v;
            return Ok(());
        }
    }
    let new: Vec<f64> = returned
        .extract()
        .map_err(|e| format!("returned value is not numeric ({e})"))?;
    if new.len() != values.len() {
        return Err(format!(
            "returned {} components, expected {}",
            new.len(),
            values.len()
        ));
    }
    values.copy_from_slice(&new);
    Ok(())
}

/// Renders an exception with its traceback, consuming it.
fn describe(py: Python<'_>, err: PyErr) -> String {
    let traceback = err
        .traceback_bound(py)
        .and_then(|tb| tb.format().ok())
        .unwrap_or_default();
    format!("{err}\n{traceback}").trim_end().to_string()
}

fn module_names(py: Python<'_>) -> PyResult<HashSet<String>> {
    let modules = py.import_bound("sys")?.getattr("modules")?.downcast_into::<PyDict>()?;
    modules.keys().iter().map(|k| k.extract::<String>()).collect()
}

/// Modules added to `sys.modules` by importing `module_name`: the module
/// itself and everything loaded from `dir`.
fn session_modules(
    py: Python<'_>,
    before: &HashSet<String>,
    dir: &Path,
    module_name: &str,
) -> PyResult<Vec<String>> {
    let modules = py.import_bound("sys")?.getattr("modules")?.downcast_into::<PyDict>()?;
    let mut names = Vec::new();
    for (key, value) in modules.iter() {
        let name: String = key.extract()?;
        if before.contains(&name) {
            continue;
        }
        let from_dir = value
            .getattr("__file__")
            .ok()
            .and_then(|f| f.extract::<String>().ok())
            .is_some_and(|f| Path::new(&f).starts_with(dir));
        if name == module_name || from_dir {
            names.push(name);
        }
    }
    Ok(names)
}

fn fields_error(module: &str, err: MeshError) -> ActionError {
    match err {
        MeshError::DataLength { ref name, .. } => ActionError::Marshal {
            module: module.to_string(),
            data: name.clone(),
            reason: err.to_string(),
        },
        other => other.into(),
    }
}

impl Action for PythonAction {
    fn timing(&self) -> Timing {
        self.timing
    }

    fn name(&self) -> &str {
        &self.module_name
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
        let shared = self.mesh.clone();
        let (source, target) = (self.source, self.target);
        let module = self.module_name.clone();
        let hooks = self.loaded()?;
        let mut guard = borrow_mesh(&shared)?;
        let mesh: &mut Mesh = &mut guard;
        let step = StepInfo {
            time,
            dt,
            computed_part_full_dt,
            full_dt,
        };
        let result = Python::with_gil(|py| hooks.run(py, &module, mesh, source, target, step));
        drop(guard);
        match result {
            Ok(()) => Ok(()),
            Err(CallFailure { error, poisons }) => {
                if poisons {
                    log::error!("python action `{}` disabled: {}", module, error);
                    self.state = ModuleState::Failed(error.clone());
                }
                Err(error)
            }
        }
    }
}

impl fmt::Debug for PythonAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PythonAction")
            .field("timing", &self.timing)
            .field("module_path", &self.module_path)
            .field("module_name", &self.module_name)
            .field("source", &self.source)
            .field("target", &self.target)
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}
