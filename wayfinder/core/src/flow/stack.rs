//! Stack controller - push/pop navigation history
//!
//! The stack is never empty while alive: popping the last screen destroys the
//! controller and emits `Finished`.
//!
//! Two teardown orders coexist on purpose and tests depend on both:
//! - `pop`/`replace` stop and destroy the old top *before* starting the new one
//! - `on_destroy`/`finish` stop the top, then destroy every screen from the
//!   most recently pushed down to the bottom

use std::cell::RefCell;

use crate::container::StateContainer;
use crate::screen::ScreenHandle;
use crate::transition::TransitionMeta;

use super::{
    advance, restore_screen, run_effects, save_screen, teardown_effects, warn_destroyed, Effect,
    FlowController, FlowError, FlowEvent, FlowLifecycle, FlowListener, FlowState, ListenerHandle,
    ListenerSet, ScreenFactory,
};

const CONTROLLER: &str = "stack";

type Stack<V> = Vec<ScreenHandle<V>>;

/// Flow controller keeping a navigation history
pub struct StackController<V> {
    state: RefCell<FlowState<Stack<V>>>,
    listeners: ListenerSet<V>,
}

impl<V: 'static> StackController<V> {
    /// Create an inactive controller with the given stack (bottom first)
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::EmptyStack`] if `initial` is empty.
    pub fn new(initial: Vec<ScreenHandle<V>>) -> Result<Self, FlowError> {
        if initial.is_empty() {
            return Err(FlowError::EmptyStack);
        }
        Ok(Self {
            state: RefCell::new(FlowState::Inactive(initial)),
            listeners: ListenerSet::new(),
        })
    }

    /// Rebuild a controller from [`save_state`](FlowController::save_state)
    ///
    /// The restored controller is inactive.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::MissingKey`] for malformed state and
    /// [`FlowError::UnrestorableScreen`] for unknown screen types.
    pub fn restore(saved: &StateContainer, factory: &dyn ScreenFactory<V>) -> Result<Self, FlowError> {
        let size = saved.get_int("size").ok_or_else(|| FlowError::MissingKey {
            key: "size".to_string(),
        })?;

        let screens = (0..size.max(0))
            .map(|i| restore_screen(saved, &format!("{i}_"), factory))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(size = screens.len(), "Restored stack controller");
        Self::new(screens)
    }

    /// Push a screen on top of the stack
    pub fn push(&self, screen: ScreenHandle<V>) {
        let effects = advance(&self.state, |state| match state {
            FlowState::Destroyed => {
                warn_destroyed(CONTROLLER, "push");
                (FlowState::Destroyed, Vec::new())
            }
            FlowState::Inactive(mut stack) => {
                stack.push(screen);
                (FlowState::Inactive(stack), Vec::new())
            }
            FlowState::Active(mut stack) => {
                let mut effects = Vec::with_capacity(3);
                if let Some(old_top) = stack.last() {
                    effects.push(Effect::Stop(old_top.clone()));
                }
                effects.push(Effect::Start(screen.clone()));
                effects.push(Effect::Emit(FlowEvent::screen_changed(
                    screen.clone(),
                    Some(TransitionMeta::forward()),
                )));
                stack.push(screen);
                (FlowState::Active(stack), effects)
            }
        });
        run_effects(effects, &self.listeners);
    }

    /// Pop the top screen. Popping the last screen finishes the flow.
    pub fn pop(&self) {
        let effects = advance(&self.state, |state| match state {
            FlowState::Destroyed => {
                warn_destroyed(CONTROLLER, "pop");
                (FlowState::Destroyed, Vec::new())
            }
            FlowState::Inactive(mut stack) => {
                let mut effects = Vec::new();
                if let Some(popped) = stack.pop() {
                    effects.push(Effect::Destroy(popped));
                }
                if stack.is_empty() {
                    tracing::info!(controller = CONTROLLER, "Last screen popped, finishing");
                    effects.push(Effect::Emit(FlowEvent::Finished));
                    (FlowState::Destroyed, effects)
                } else {
                    (FlowState::Inactive(stack), effects)
                }
            }
            FlowState::Active(mut stack) => {
                let mut effects = Vec::new();
                if let Some(popped) = stack.pop() {
                    effects.push(Effect::Stop(popped.clone()));
                    effects.push(Effect::Destroy(popped));
                }
                match stack.last() {
                    Some(new_top) => {
                        effects.push(Effect::Start(new_top.clone()));
                        effects.push(Effect::Emit(FlowEvent::screen_changed(
                            new_top.clone(),
                            Some(TransitionMeta::backward()),
                        )));
                        (FlowState::Active(stack), effects)
                    }
                    None => {
                        tracing::info!(controller = CONTROLLER, "Last screen popped, finishing");
                        effects.push(Effect::Emit(FlowEvent::Finished));
                        (FlowState::Destroyed, effects)
                    }
                }
            }
        });
        run_effects(effects, &self.listeners);
    }

    /// Replace the top screen
    pub fn replace(&self, screen: ScreenHandle<V>) {
        let effects = advance(&self.state, |state| match state {
            FlowState::Destroyed => {
                warn_destroyed(CONTROLLER, "replace");
                (FlowState::Destroyed, Vec::new())
            }
            FlowState::Inactive(mut stack) => {
                let effects: Vec<Effect<V>> = stack.pop().map(Effect::Destroy).into_iter().collect();
                stack.push(screen);
                (FlowState::Inactive(stack), effects)
            }
            FlowState::Active(mut stack) => {
                let mut effects = Vec::with_capacity(4);
                if let Some(old_top) = stack.pop() {
                    effects.push(Effect::Stop(old_top.clone()));
                    effects.push(Effect::Destroy(old_top));
                }
                effects.push(Effect::Start(screen.clone()));
                effects.push(Effect::Emit(FlowEvent::screen_changed(
                    screen.clone(),
                    Some(TransitionMeta::forward()),
                )));
                stack.push(screen);
                (FlowState::Active(stack), effects)
            }
        });
        run_effects(effects, &self.listeners);
    }

    /// Number of screens on the stack (0 once destroyed)
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.borrow().items().map_or(0, Vec::len)
    }

    /// Whether the stack holds no screens, which only happens once destroyed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the stack, bottom first
    #[must_use]
    pub fn screens(&self) -> Vec<ScreenHandle<V>> {
        self.state.borrow().items().cloned().unwrap_or_default()
    }

    fn teardown(&self, emit_finished: bool, operation: &'static str) {
        let effects = advance(&self.state, |state| {
            let (stack, was_active) = match state {
                FlowState::Destroyed => {
                    warn_destroyed(CONTROLLER, operation);
                    return (FlowState::Destroyed, Vec::new());
                }
                FlowState::Inactive(stack) => (stack, false),
                FlowState::Active(stack) => (stack, true),
            };
            let mut effects = teardown_effects(stack, was_active);
            if emit_finished {
                effects.push(Effect::Emit(FlowEvent::Finished));
            }
            (FlowState::Destroyed, effects)
        });
        run_effects(effects, &self.listeners);
    }
}

impl<V: 'static> FlowController<V> for StackController<V> {
    fn on_start(&self) {
        let effects = advance(&self.state, |state| match state {
            FlowState::Inactive(stack) => {
                let effects = match stack.last() {
                    Some(top) => vec![
                        Effect::Start(top.clone()),
                        Effect::Emit(FlowEvent::screen_changed(top.clone(), None)),
                    ],
                    None => Vec::new(),
                };
                tracing::debug!(controller = CONTROLLER, size = stack.len(), "Started");
                (FlowState::Active(stack), effects)
            }
            FlowState::Destroyed => {
                warn_destroyed(CONTROLLER, "on_start");
                (FlowState::Destroyed, Vec::new())
            }
            active @ FlowState::Active(_) => (active, Vec::new()),
        });
        run_effects(effects, &self.listeners);
    }

    fn on_stop(&self) {
        let effects = advance(&self.state, |state| match state {
            FlowState::Active(stack) => {
                let effects: Vec<Effect<V>> =
                    stack.last().cloned().map(Effect::Stop).into_iter().collect();
                tracing::debug!(controller = CONTROLLER, "Stopped");
                (FlowState::Inactive(stack), effects)
            }
            FlowState::Destroyed => {
                warn_destroyed(CONTROLLER, "on_stop");
                (FlowState::Destroyed, Vec::new())
            }
            inactive @ FlowState::Inactive(_) => (inactive, Vec::new()),
        });
        run_effects(effects, &self.listeners);
    }

    fn on_destroy(&self) {
        self.teardown(false, "on_destroy");
    }

    fn on_back_pressed(&self) -> bool {
        if self.is_destroyed() {
            return false;
        }
        self.pop();
        true
    }

    fn finish(&self) {
        self.teardown(true, "finish");
    }

    fn add_listener(&self, listener: FlowListener<V>) -> ListenerHandle {
        let (handle, listener) = self.listeners.add(listener);
        let replay = match &*self.state.borrow() {
            FlowState::Active(stack) => stack.last().cloned(),
            _ => None,
        };
        if let Some(top) = replay {
            listener(&FlowEvent::screen_changed(top, None));
        }
        handle
    }

    fn lifecycle(&self) -> FlowLifecycle {
        self.state.borrow().lifecycle()
    }

    fn current_screen(&self) -> Option<ScreenHandle<V>> {
        self.state.borrow().items().and_then(|stack| stack.last().cloned())
    }

    fn save_state(&self) -> StateContainer {
        let screens = self.screens();
        let mut container = StateContainer::new();
        container.insert("size", i64::try_from(screens.len()).unwrap_or(i64::MAX));
        for (i, screen) in screens.iter().enumerate() {
            save_screen(&mut container, &format!("{i}_"), screen);
        }
        container
    }
}
