//! Ordered container of actions, dispatched by timing.

use std::fmt;

use crate::action::config::ActionConfig;
use crate::action::{Action, ActionError, Timing};
use crate::mesh::SharedMesh;

/// Actions in registration order.
///
/// [`ActionRegistry::perform`] runs every action of one timing, in the order
/// the actions were registered, and stops at the first failure.
#[derive(Default)]
pub struct ActionRegistry {
    actions: Vec<Box<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from configuration entries, in entry order.
    ///
    /// `resolve_mesh` maps a mesh name to the shared mesh it denotes.
    pub fn from_configs<'c, I, F>(configs: I, mut resolve_mesh: F) -> Result<Self, ActionError>
    where
        I: IntoIterator<Item = &'c ActionConfig>,
        F: FnMut(&str) -> Option<SharedMesh>,
    {
        let mut registry = Self::new();
        for config in configs {
            let mesh = resolve_mesh(config.mesh()).ok_or_else(|| ActionError::Incompatible {
                action: config.kind().to_string(),
                reason: format!("unknown mesh `{}`", config.mesh()),
            })?;
            registry.register(config.build(mesh)?);
        }
        Ok(registry)
    }

    /// Appends an action; it runs after every action registered before it.
    pub fn register(&mut self, action: Box<dyn Action>) {
        log::debug!(
            "registered action `{}` at timing {}",
            action.name(),
            action.timing()
        );
        self.actions.push(action);
    }

    /// Runs all actions registered for `timing`.
    pub fn perform(
        &mut self,
        timing: Timing,
        time: f64,
        dt: f64,
        computed_part_full_dt: f64,
        full_dt: f64,
    ) -> Result<(), ActionError> {
        for action in self.actions.iter_mut().filter(|a| a.timing() == timing) {
            log::debug!("performing action `{}` ({}) at t = {}", action.name(), timing, time);
            action
                .perform_action(time, dt, computed_part_full_dt, full_dt)
                .inspect_err(|e| log::error!("action `{}` failed: {}", action.name(), e))?;
        }
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Number of actions registered for `timing`.
    pub fn count_for(&self, timing: Timing) -> usize {
        self.actions.iter().filter(|a| a.timing() == timing).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Action> {
        self.actions.iter().map(|a| a.as_ref())
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.actions.iter().map(|a| (a.name(), a.timing())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::action::ClosureAction;
    use crate::mesh::Mesh;

    fn recorder(
        mesh: &SharedMesh,
        log: &Rc<RefCell<Vec<&'static str>>>,
        name: &'static str,
        timing: Timing,
        fail: bool,
    ) -> Box<dyn Action> {
        let log = log.clone();
        Box::new(ClosureAction::new(name, timing, mesh.clone(), None, None, move |_, _| {
            log.borrow_mut().push(name);
            if fail {
                return Err(ActionError::Native {
                    action: name.into(),
                    message: "requested failure".into(),
                });
            }
            Ok(())
        }))
    }

    #[test]
    fn same_timing_runs_in_registration_order() {
        let mesh = Mesh::new("M", 2).unwrap().into_shared();
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = ActionRegistry::new();
        registry.register(recorder(&mesh, &log, "a", Timing::OnExchangePost, false));
        registry.register(recorder(&mesh, &log, "other", Timing::RegularPrior, false));
        registry.register(recorder(&mesh, &log, "b", Timing::OnExchangePost, false));
        registry.register(recorder(&mesh, &log, "c", Timing::OnExchangePost, false));

        registry.perform(Timing::OnExchangePost, 0.0, 1.0, 1.0, 1.0).unwrap();
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
        assert_eq!(registry.count_for(Timing::OnExchangePost), 3);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn stops_at_first_failure() {
        let mesh = Mesh::new("M", 2).unwrap().into_shared();
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = ActionRegistry::new();
        registry.register(recorder(&mesh, &log, "ok", Timing::RegularPost, false));
        registry.register(recorder(&mesh, &log, "bad", Timing::RegularPost, true));
        registry.register(recorder(&mesh, &log, "never", Timing::RegularPost, false));

        let err = registry.perform(Timing::RegularPost, 0.0, 1.0, 1.0, 1.0).unwrap_err();
        assert!(matches!(err, ActionError::Native { .. }));
        assert_eq!(*log.borrow(), vec!["ok", "bad"]);
    }

    #[test]
    fn no_matching_actions_is_fine() {
        let mut registry = ActionRegistry::new();
        assert!(registry.is_empty());
        registry.perform(Timing::RegularPrior, 0.0, 1.0, 1.0, 1.0).unwrap();
    }
}
