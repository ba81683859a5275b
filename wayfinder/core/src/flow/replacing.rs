//! Replacing controller - one screen at a time, no history

use crate::container::StateContainer;
use crate::screen::ScreenHandle;

use super::single::OneScreen;
use super::{FlowController, FlowError, FlowLifecycle, FlowListener, ListenerHandle, ScreenFactory};

const CONTROLLER: &str = "replacing";

/// Flow controller whose single screen can be swapped out
///
/// `replace` destroys the previous screen outright; back navigation finishes
/// the flow since there is nothing to go back to.
pub struct ReplacingController<V> {
    core: OneScreen<V>,
}

impl<V: 'static> ReplacingController<V> {
    /// Create an inactive controller showing `initial`
    #[must_use]
    pub fn new(initial: ScreenHandle<V>) -> Self {
        Self {
            core: OneScreen::new(CONTROLLER, initial),
        }
    }

    /// Rebuild a controller from its saved state
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::MissingKey`] or [`FlowError::UnrestorableScreen`].
    pub fn restore(saved: &StateContainer, factory: &dyn ScreenFactory<V>) -> Result<Self, FlowError> {
        Ok(Self {
            core: OneScreen::restore(CONTROLLER, saved, factory)?,
        })
    }

    /// Replace the current screen
    ///
    /// While active the old screen is stopped and destroyed before the new one
    /// starts; the change is reported without a direction.
    pub fn replace(&self, screen: ScreenHandle<V>) {
        self.core.replace(screen);
    }
}

impl<V: 'static> FlowController<V> for ReplacingController<V> {
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
