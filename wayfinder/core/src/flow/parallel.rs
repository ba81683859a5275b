//! Parallel controller - several branches alive, one selected
//!
//! Each branch is itself a flow controller (typically a stack). Branches are
//! created lazily the first time they are selected and stay alive until the
//! parallel controller is torn down or the branch finishes on its own.
//!
//! # Branch Events
//!
//! ```text
//!  branch "B" ── ScreenChanged ──► forwarded only if B is selected and active
//!  branch "B" ── Finished ───────► B removed + destroyed, selection reverts
//!                                  to the root branch
//!  root       ── Finished ───────► the parallel controller finishes
//! ```

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::container::{StateContainer, StateValue};
use crate::screen::ScreenHandle;

use super::{
    advance, warn_destroyed, FlowController, FlowError, FlowEvent, FlowLifecycle, FlowListener,
    FlowState, ListenerHandle, ListenerSet,
};

const CONTROLLER: &str = "parallel";

/// Creates (and restores) the branches of a [`ParallelController`]
pub trait BranchFactory<V> {
    /// Create a fresh branch. `None` means no branch exists under `key`.
    fn create_branch(&self, key: &str) -> Option<Rc<dyn FlowController<V>>>;

    /// Rebuild a branch from the state it saved
    ///
    /// # Errors
    ///
    /// Returns whatever error the branch's own restore reports.
    fn restore_branch(
        &self,
        key: &str,
        saved: &StateContainer,
    ) -> Result<Rc<dyn FlowController<V>>, FlowError>;
}

struct Branch<V> {
    key: String,
    controller: Rc<dyn FlowController<V>>,
    subscription: ListenerHandle,
}

struct Branches<V> {
    selected: String,
    /// Creation order
    entries: Vec<Branch<V>>,
}

impl<V> Branches<V> {
    fn find(&self, key: &str) -> Option<&Rc<dyn FlowController<V>>> {
        self.entries
            .iter()
            .find(|branch| branch.key == key)
            .map(|branch| &branch.controller)
    }

    fn into_state(self, active: bool) -> FlowState<Self> {
        if active {
            FlowState::Active(self)
        } else {
            FlowState::Inactive(self)
        }
    }
}

enum BranchEffect<V> {
    Start(Rc<dyn FlowController<V>>),
    Stop(Rc<dyn FlowController<V>>),
    Destroy(Rc<dyn FlowController<V>>),
    Dispose(ListenerHandle),
    Emit(FlowEvent<V>),
}

/// Flow controller holding several concurrently alive branches
///
/// Only the selected branch is started while the controller is active, and
/// only its screen changes reach this controller's listeners.
pub struct ParallelController<V> {
    root: String,
    factory: Box<dyn BranchFactory<V>>,
    state: RefCell<FlowState<Branches<V>>>,
    listeners: ListenerSet<V>,
    self_ref: Weak<Self>,
}

impl<V: 'static> ParallelController<V> {
    /// Create an inactive controller with the root branch selected
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::UnknownBranch`] if the factory cannot create the
    /// root branch.
    pub fn new(root: impl Into<String>, factory: Box<dyn BranchFactory<V>>) -> Result<Rc<Self>, FlowError> {
        let root = root.into();
        let controller = factory
            .create_branch(&root)
            .ok_or_else(|| FlowError::UnknownBranch { key: root.clone() })?;
        let selected = root.clone();
        Ok(Self::assemble(root, factory, vec![(selected.clone(), controller)], selected))
    }

    /// Rebuild a controller from its saved state
    ///
    /// Every saved branch is restored through the factory. A selection that
    /// no longer matches a branch falls back to the root.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::MissingKey`] for incomplete state, or any error
    /// the factory reports.
    pub fn restore(
        saved: &StateContainer,
        factory: Box<dyn BranchFactory<V>>,
    ) -> Result<Rc<Self>, FlowError> {
        let root = required_str(saved, "root")?;
        let mut selected = required_str(saved, "selected")?;
        let keys = saved.get_list("branches").ok_or(FlowError::MissingKey {
            key: "branches".to_string(),
        })?;

        let mut branches = Vec::with_capacity(keys.len());
        for value in keys {
            let StateValue::Str(key) = value else {
                tracing::warn!(kind = value.kind(), "Skipping non-string branch key");
                continue;
            };
            let slot = format!("branch_{key}");
            let state = saved
                .get_container(&slot)
                .ok_or(FlowError::MissingKey { key: slot.clone() })?;
            branches.push((key.clone(), factory.restore_branch(key, state)?));
        }

        if !branches.iter().any(|(key, _)| *key == root) {
            let controller = factory
                .create_branch(&root)
                .ok_or_else(|| FlowError::UnknownBranch { key: root.clone() })?;
            branches.insert(0, (root.clone(), controller));
        }
        if !branches.iter().any(|(key, _)| *key == selected) {
            tracing::warn!(selected = %selected, "Saved selection has no branch, selecting root");
            selected = root.clone();
        }

        Ok(Self::assemble(root, factory, branches, selected))
    }

    fn assemble(
        root: String,
        factory: Box<dyn BranchFactory<V>>,
        branches: Vec<(String, Rc<dyn FlowController<V>>)>,
        selected: String,
    ) -> Rc<Self> {
        Rc::new_cyclic(|weak| {
            let entries = branches
                .into_iter()
                .map(|(key, controller)| Self::subscribe(weak, key, controller))
                .collect();
            Self {
                root,
                factory,
                state: RefCell::new(FlowState::Inactive(Branches { selected, entries })),
                listeners: ListenerSet::new(),
                self_ref: weak.clone(),
            }
        })
    }

    fn subscribe(weak: &Weak<Self>, key: String, controller: Rc<dyn FlowController<V>>) -> Branch<V> {
        let parent = weak.clone();
        let branch_key = key.clone();
        let subscription = controller.add_listener(Box::new(move |event| {
            if let Some(parent) = parent.upgrade() {
                parent.on_branch_event(&branch_key, event);
            }
        }));
        Branch {
            key,
            controller,
            subscription,
        }
    }

    /// Key of the root branch
    #[must_use]
    pub fn root_key(&self) -> &str {
        &self.root
    }

    /// Key of the selected branch, `None` once destroyed
    #[must_use]
    pub fn selected(&self) -> Option<String> {
        self.state.borrow().items().map(|b| b.selected.clone())
    }

    /// Keys of the live branches in creation order
    #[must_use]
    pub fn branch_keys(&self) -> Vec<String> {
        self.state
            .borrow()
            .items()
            .map(|b| b.entries.iter().map(|branch| branch.key.clone()).collect())
            .unwrap_or_default()
    }

    /// Controller of a live branch
    #[must_use]
    pub fn branch(&self, key: &str) -> Option<Rc<dyn FlowController<V>>> {
        self.state.borrow().items().and_then(|b| b.find(key).cloned())
    }

    /// Select a branch, creating it through the factory if needed
    ///
    /// While active, the previously selected branch is stopped and the new
    /// one started (which reports its current screen). While inactive only
    /// the selection changes.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::UnknownBranch`] if the branch does not exist and
    /// the factory cannot create it.
    pub fn select(&self, key: &str) -> Result<(), FlowError> {
        let exists = match self.state.borrow().items() {
            None => {
                warn_destroyed(CONTROLLER, "select");
                return Ok(());
            }
            Some(branches) if branches.selected == key => return Ok(()),
            Some(branches) => branches.find(key).is_some(),
        };

        let created = if exists {
            None
        } else {
            let controller = self
                .factory
                .create_branch(key)
                .ok_or_else(|| FlowError::UnknownBranch { key: key.to_string() })?;
            tracing::debug!(controller = CONTROLLER, branch = key, "Branch created");
            Some(Self::subscribe(&self.self_ref, key.to_string(), controller))
        };

        let effects = advance(&self.state, |state| {
            let (mut branches, active) = match state {
                FlowState::Destroyed => {
                    let effects = created
                        .map(|branch| {
                            vec![
                                BranchEffect::Dispose(branch.subscription),
                                BranchEffect::Destroy(branch.controller),
                            ]
                        })
                        .unwrap_or_default();
                    return (FlowState::Destroyed, effects);
                }
                FlowState::Inactive(branches) => (branches, false),
                FlowState::Active(branches) => (branches, true),
            };
            let mut effects = Vec::new();
            if let Some(branch) = created {
                if branches.find(key).is_none() {
                    branches.entries.push(branch);
                } else {
                    effects.push(BranchEffect::Dispose(branch.subscription));
                    effects.push(BranchEffect::Destroy(branch.controller));
                }
            }

            let previous = std::mem::replace(&mut branches.selected, key.to_string());
            tracing::info!(controller = CONTROLLER, from = %previous, to = key, "Branch selected");
            if active && previous != key {
                if let Some(old) = branches.find(&previous) {
                    effects.push(BranchEffect::Stop(Rc::clone(old)));
                }
                if let Some(new) = branches.find(key) {
                    effects.push(BranchEffect::Start(Rc::clone(new)));
                }
            }
            (branches.into_state(active), effects)
        });
        self.run(effects);
        Ok(())
    }

    fn on_branch_event(&self, key: &str, event: &FlowEvent<V>) {
        match event {
            FlowEvent::ScreenChanged { .. } => {
                let forward = matches!(
                    &*self.state.borrow(),
                    FlowState::Active(branches) if branches.selected == key
                );
                if forward {
                    self.listeners.emit(event);
                }
            }
            FlowEvent::Finished if key == self.root => {
                tracing::info!(controller = CONTROLLER, "Root branch finished");
                if !self.is_destroyed() {
                    self.finish();
                }
            }
            FlowEvent::Finished => self.branch_finished(key),
        }
    }

    fn branch_finished(&self, key: &str) {
        let root = self.root.clone();
        let effects = advance(&self.state, |state| {
            let (mut branches, active) = match state {
                FlowState::Destroyed => return (FlowState::Destroyed, Vec::new()),
                FlowState::Inactive(branches) => (branches, false),
                FlowState::Active(branches) => (branches, true),
            };
            let mut effects = Vec::new();
            if let Some(index) = branches.entries.iter().position(|b| b.key == key) {
                let branch = branches.entries.remove(index);
                tracing::info!(controller = CONTROLLER, branch = key, "Branch finished, removing");
                effects.push(BranchEffect::Dispose(branch.subscription));
                effects.push(BranchEffect::Destroy(branch.controller));
            }
            if branches.selected == key {
                branches.selected.clone_from(&root);
                if active {
                    if let Some(root_branch) = branches.find(&root) {
                        effects.push(BranchEffect::Start(Rc::clone(root_branch)));
                    }
                }
            }
            (branches.into_state(active), effects)
        });
        self.run(effects);
    }

    fn teardown(&self, emit_finished: bool, operation: &'static str) {
        let effects = advance(&self.state, |state| {
            let (branches, was_active) = match state {
                FlowState::Destroyed => {
                    warn_destroyed(CONTROLLER, operation);
                    return (FlowState::Destroyed, Vec::new());
                }
                FlowState::Inactive(branches) => (branches, false),
                FlowState::Active(branches) => (branches, true),
            };
            let mut effects = Vec::with_capacity(branches.entries.len() * 2 + 2);
            if was_active {
                if let Some(selected) = branches.find(&branches.selected) {
                    effects.push(BranchEffect::Stop(Rc::clone(selected)));
                }
            }
            let mut controllers = Vec::with_capacity(branches.entries.len());
            for branch in branches.entries {
                effects.push(BranchEffect::Dispose(branch.subscription));
                controllers.push(branch.controller);
            }
            effects.extend(controllers.into_iter().rev().map(BranchEffect::Destroy));
            if emit_finished {
                tracing::info!(controller = CONTROLLER, "Finishing");
                effects.push(BranchEffect::Emit(FlowEvent::Finished));
            }
            (FlowState::Destroyed, effects)
        });
        self.run(effects);
    }

    fn run(&self, effects: Vec<BranchEffect<V>>) {
        for effect in effects {
            match effect {
                BranchEffect::Start(branch) => branch.on_start(),
                // A branch that finished on its own is already torn down
                BranchEffect::Stop(branch) => {
                    if !branch.is_destroyed() {
                        branch.on_stop();
                    }
                }
                BranchEffect::Destroy(branch) => {
                    if !branch.is_destroyed() {
                        branch.on_destroy();
                    }
                }
                BranchEffect::Dispose(subscription) => subscription.dispose(),
                BranchEffect::Emit(event) => self.listeners.emit(&event),
            }
        }
    }

    fn selected_branch(&self) -> Option<Rc<dyn FlowController<V>>> {
        self.state
            .borrow()
            .items()
            .and_then(|branches| branches.find(&branches.selected).cloned())
    }
}

fn required_str(saved: &StateContainer, key: &str) -> Result<String, FlowError> {
    saved
        .get_str(key)
        .map(str::to_string)
        .ok_or_else(|| FlowError::MissingKey { key: key.to_string() })
}

impl<V: 'static> FlowController<V> for ParallelController<V> {
    fn on_start(&self) {
        let effects = advance(&self.state, |state| match state {
            FlowState::Inactive(branches) => {
                tracing::debug!(controller = CONTROLLER, selected = %branches.selected, "Started");
                let effects = branches
                    .find(&branches.selected)
                    .map(|branch| vec![BranchEffect::Start(Rc::clone(branch))])
                    .unwrap_or_default();
                (FlowState::Active(branches), effects)
            }
            FlowState::Destroyed => {
                warn_destroyed(CONTROLLER, "on_start");
                (FlowState::Destroyed, Vec::new())
            }
            active @ FlowState::Active(_) => (active, Vec::new()),
        });
        self.run(effects);
    }

    fn on_stop(&self) {
        let effects = advance(&self.state, |state| match state {
            FlowState::Active(branches) => {
                tracing::debug!(controller = CONTROLLER, "Stopped");
                let effects = branches
                    .find(&branches.selected)
                    .map(|branch| vec![BranchEffect::Stop(Rc::clone(branch))])
                    .unwrap_or_default();
                (FlowState::Inactive(branches), effects)
            }
            FlowState::Destroyed => {
                warn_destroyed(CONTROLLER, "on_stop");
                (FlowState::Destroyed, Vec::new())
            }
            inactive @ FlowState::Inactive(_) => (inactive, Vec::new()),
        });
        self.run(effects);
    }

    fn on_destroy(&self) {
        self.teardown(false, "on_destroy");
    }

    fn on_back_pressed(&self) -> bool {
        self.selected_branch()
            .is_some_and(|branch| branch.on_back_pressed())
    }

    fn finish(&self) {
        self.teardown(true, "finish");
    }

    fn add_listener(&self, listener: FlowListener<V>) -> ListenerHandle {
        let (handle, listener) = self.listeners.add(listener);
        if self.lifecycle() == FlowLifecycle::Active {
            if let Some(screen) = self.current_screen() {
                listener(&FlowEvent::screen_changed(screen, None));
            }
        }
        handle
    }

    fn lifecycle(&self) -> FlowLifecycle {
        self.state.borrow().lifecycle()
    }

    fn current_screen(&self) -> Option<ScreenHandle<V>> {
        self.selected_branch()?.current_screen()
    }

    fn save_state(&self) -> StateContainer {
        let (selected, branches) = match self.state.borrow().items() {
            Some(branches) => (
                branches.selected.clone(),
                branches
                    .entries
                    .iter()
                    .map(|b| (b.key.clone(), Rc::clone(&b.controller)))
                    .collect::<Vec<_>>(),
            ),
            None => return StateContainer::new(),
        };

        let mut container = StateContainer::new()
            .with("root", self.root.as_str())
            .with("selected", selected);
        let keys: Vec<StateValue> = branches
            .iter()
            .map(|(key, _)| StateValue::from(key.as_str()))
            .collect();
        container.insert("branches", keys);
        for (key, controller) in branches {
            container.insert(format!("branch_{key}"), controller.save_state());
        }
        container
    }
}
