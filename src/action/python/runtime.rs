//! Process-wide Python runtime with reference-counted sessions.
//!
//! Every [`PythonAction`](super::PythonAction) holds a [`RuntimeGuard`] once
//! it has loaded its module. The first guard in the process starts a
//! session, the last one dropped tears it down, guards in between only move
//! the counter. Each rank is a separate process and therefore owns its own
//! interpreter; nothing here is shared across ranks.
//!
//! The interpreter itself stays resident once started: embedding layers
//! cannot safely re-initialize CPython after `Py_Finalize`. Teardown instead
//! returns the interpreter to its pristine state: it drops every module the
//! session imported from its search paths, removes the search paths it added,
//! and collects garbage, so the next session imports user modules from
//! scratch.

use std::path::Path;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use crate::action::ActionError;

#[derive(Debug, Default)]
struct RuntimeState {
    /// Live guards.
    users: usize,
    /// Number of sessions started so far.
    generation: u64,
    /// Entries this session appended to `sys.path`.
    search_paths: Vec<String>,
    /// Entries this session added to `sys.modules`.
    modules: Vec<String>,
}

static STATE: Lazy<Mutex<RuntimeState>> = Lazy::new(|| Mutex::new(RuntimeState::default()));

/// Scoped share of the process-wide runtime.
///
/// Dropping the last guard tears the session down.
#[derive(Debug)]
pub struct RuntimeGuard {
    _private: (),
}

/// Joins the current session, starting one if none is live.
///
/// The state lock is never held while waiting for the GIL: callers holding
/// the GIL take the lock too.
pub fn acquire() -> Result<RuntimeGuard, ActionError> {
    if STATE.lock().users == 0 {
        pyo3::prepare_freethreaded_python();
        Python::with_gil(|py| py.import_bound("sys").map(|_| ()))
            .map_err(|e| ActionError::Runtime(format!("interpreter failed to start: {e}")))?;
    }
    let mut state = STATE.lock();
    if state.users == 0 {
        state.generation += 1;
        log::info!("python runtime session {} started", state.generation);
    }
    state.users += 1;
    log::debug!("python runtime acquired, {} live users", state.users);
    Ok(RuntimeGuard { _private: () })
}

/// True while at least one guard is alive.
pub fn is_initialized() -> bool {
    STATE.lock().users > 0
}

/// Number of live guards.
pub fn live_users() -> usize {
    STATE.lock().users
}

/// Number of sessions started in this process.
pub fn generation() -> u64 {
    STATE.lock().generation
}

impl RuntimeGuard {
    /// Appends `dir` to `sys.path` for the rest of the session.
    ///
    /// Entries that are already present are left alone and not removed at
    /// teardown.
    pub(crate) fn add_search_path(&self, py: Python<'_>, dir: &Path) -> PyResult<()> {
        let entry = dir.to_string_lossy().into_owned();
        let path = py.import_bound("sys")?.getattr("path")?.downcast_into::<PyList>()?;
        if !path.contains(&entry)? {
            path.append(&entry)?;
            STATE.lock().search_paths.push(entry);
        }
        Ok(())
    }

    /// Records modules imported during the session so teardown can drop them.
    pub(crate) fn track_modules<I>(&self, names: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut state = STATE.lock();
        for name in names {
            if !state.modules.contains(&name) {
                state.modules.push(name);
            }
        }
    }
}

impl Drop for RuntimeGuard {
    fn drop(&mut self) {
        let (search_paths, modules, generation) = {
            let mut state = STATE.lock();
            state.users = state.users.saturating_sub(1);
            log::debug!("python runtime released, {} live users", state.users);
            if state.users > 0 {
                return;
            }
            (
                std::mem::take(&mut state.search_paths),
                std::mem::take(&mut state.modules),
                state.generation,
            )
        };
        if let Err(e) = Python::with_gil(|py| reset(py, &search_paths, &modules)) {
            log::error!("python runtime session {} teardown failed: {}", generation, e);
        } else {
            log::info!("python runtime session {} torn down", generation);
        }
    }
}

fn reset(py: Python<'_>, search_paths: &[String], modules: &[String]) -> PyResult<()> {
    let sys = py.import_bound("sys")?;
    let loaded = sys.getattr("modules")?.downcast_into::<PyDict>()?;
    for name in modules {
        if loaded.contains(name)? {
            loaded.del_item(name)?;
        }
    }
    let path = sys.getattr("path")?.downcast_into::<PyList>()?;
    for entry in search_paths {
        if path.contains(entry)? {
            path.call_method1("remove", (entry,))?;
        }
    }
    py.import_bound("importlib")?.call_method0("invalidate_caches")?;
    py.import_bound("gc")?.call_method0("collect")?;
    Ok(())
}
