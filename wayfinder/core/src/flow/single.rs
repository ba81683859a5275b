//! Single-screen controller
//!
//! Holds exactly one screen for its whole life. Back navigation finishes the
//! flow. [`ReplacingController`](super::ReplacingController) shares the same
//! one-screen core and adds `replace`.

use std::cell::RefCell;

use crate::container::StateContainer;
use crate::screen::ScreenHandle;

use super::{
    advance, restore_screen, run_effects, save_screen, teardown_effects, warn_destroyed, Effect,
    FlowController, FlowError, FlowEvent, FlowLifecycle, FlowListener, FlowState, ListenerHandle,
    ListenerSet, ScreenFactory,
};

/// Lifecycle core shared by the one-screen controllers
pub(super) struct OneScreen<V> {
    name: &'static str,
    state: RefCell<FlowState<ScreenHandle<V>>>,
    listeners: ListenerSet<V>,
}

impl<V: 'static> OneScreen<V> {
    pub(super) fn new(name: &'static str, screen: ScreenHandle<V>) -> Self {
        Self {
            name,
            state: RefCell::new(FlowState::Inactive(screen)),
            listeners: ListenerSet::new(),
        }
    }

    pub(super) fn restore(
        name: &'static str,
        saved: &StateContainer,
        factory: &dyn ScreenFactory<V>,
    ) -> Result<Self, FlowError> {
        let screen = restore_screen(saved, "", factory)?;
        Ok(Self::new(name, screen))
    }

    pub(super) fn replace(&self, screen: ScreenHandle<V>) {
        let name = self.name;
        let effects = advance(&self.state, |state| match state {
            FlowState::Destroyed => {
                warn_destroyed(name, "replace");
                (FlowState::Destroyed, Vec::new())
            }
            FlowState::Inactive(old) => (FlowState::Inactive(screen), vec![Effect::Destroy(old)]),
            FlowState::Active(old) => {
                let effects = vec![
                    Effect::Stop(old.clone()),
                    Effect::Destroy(old),
                    Effect::Start(screen.clone()),
                    Effect::Emit(FlowEvent::screen_changed(screen.clone(), None)),
                ];
                (FlowState::Active(screen), effects)
            }
        });
        run_effects(effects, &self.listeners);
    }

    pub(super) fn start(&self) {
        let name = self.name;
        let effects = advance(&self.state, |state| match state {
            FlowState::Inactive(screen) => {
                tracing::debug!(controller = name, screen = %screen.key(), "Started");
                let effects = vec![
                    Effect::Start(screen.clone()),
                    Effect::Emit(FlowEvent::screen_changed(screen.clone(), None)),
                ];
                (FlowState::Active(screen), effects)
            }
            FlowState::Destroyed => {
                warn_destroyed(name, "on_start");
                (FlowState::Destroyed, Vec::new())
            }
            active @ FlowState::Active(_) => (active, Vec::new()),
        });
        run_effects(effects, &self.listeners);
    }

    pub(super) fn stop(&self) {
        let name = self.name;
        let effects = advance(&self.state, |state| match state {
            FlowState::Active(screen) => {
                tracing::debug!(controller = name, "Stopped");
                (FlowState::Inactive(screen.clone()), vec![Effect::Stop(screen)])
            }
            FlowState::Destroyed => {
                warn_destroyed(name, "on_stop");
                (FlowState::Destroyed, Vec::new())
            }
            inactive @ FlowState::Inactive(_) => (inactive, Vec::new()),
        });
        run_effects(effects, &self.listeners);
    }

    pub(super) fn teardown(&self, emit_finished: bool, operation: &'static str) {
        let name = self.name;
        let effects = advance(&self.state, |state| {
            let (screen, was_active) = match state {
                FlowState::Destroyed => {
                    warn_destroyed(name, operation);
                    return (FlowState::Destroyed, Vec::new());
                }
                FlowState::Inactive(screen) => (screen, false),
                FlowState::Active(screen) => (screen, true),
            };
            let mut effects = teardown_effects(vec![screen], was_active);
            if emit_finished {
                tracing::info!(controller = name, "Finishing");
                effects.push(Effect::Emit(FlowEvent::Finished));
            }
            (FlowState::Destroyed, effects)
        });
        run_effects(effects, &self.listeners);
    }

    pub(super) fn back(&self) -> bool {
        if self.lifecycle() == FlowLifecycle::Destroyed {
            return false;
        }
        self.teardown(true, "on_back_pressed");
        true
    }

    pub(super) fn add_listener(&self, listener: FlowListener<V>) -> ListenerHandle {
        let (handle, listener) = self.listeners.add(listener);
        let replay = match &*self.state.borrow() {
            FlowState::Active(screen) => Some(screen.clone()),
            _ => None,
        };
        if let Some(screen) = replay {
            listener(&FlowEvent::screen_changed(screen, None));
        }
        handle
    }

    pub(super) fn lifecycle(&self) -> FlowLifecycle {
        self.state.borrow().lifecycle()
    }

    pub(super) fn current(&self) -> Option<ScreenHandle<V>> {
        self.state.borrow().items().cloned()
    }

    pub(super) fn save_state(&self) -> StateContainer {
        let mut container = StateContainer::new();
        if let Some(screen) = self.current() {
            save_screen(&mut container, "", &screen);
        }
        container
    }
}

/// Flow controller showing one fixed screen
pub struct SingleController<V> {
    core: OneScreen<V>,
}

impl<V: 'static> SingleController<V> {
    /// Create an inactive controller around `screen`
    #[must_use]
    pub fn new(screen: ScreenHandle<V>) -> Self {
        Self {
            core: OneScreen::new("single", screen),
        }
    }

    /// Rebuild a controller from its saved state
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::MissingKey`] or [`FlowError::UnrestorableScreen`].
    pub fn restore(saved: &StateContainer, factory: &dyn ScreenFactory<V>) -> Result<Self, FlowError> {
        Ok(Self {
            core: OneScreen::restore("single", saved, factory)?,
        })
    }
}

impl<V: 'static> FlowController<V> for SingleController<V> {
    fn on_start(&self) {
        self.core.start();
    }

    fn on_stop(&self) {
        self.core.stop();
    }

    fn on_destroy(&self) {
        self.core.teardown(false, "on_destroy");
    }

    fn on_back_pressed(&self) -> bool {
        self.core.back()
    }

    fn finish(&self) {
        self.core.teardown(true, "finish");
    }

    fn add_listener(&self, listener: FlowListener<V>) -> ListenerHandle {
        self.core.add_listener(listener)
    }

    fn lifecycle(&self) -> FlowLifecycle {
        self.core.lifecycle()
    }

    fn current_screen(&self) -> Option<ScreenHandle<V>> {
        self.core.current()
    }

    fn save_state(&self) -> StateContainer {
        self.core.save_state()
    }
}
