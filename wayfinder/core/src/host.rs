//! Navigation Host - One Root Flow, One Orchestrator
//!
//! Glue between the host UI's lifecycle and the two state machines. The host
//! subscribes to its root flow controller and turns every screen change into
//! a [`Destination`] for the orchestrator.
//!
//! # Architecture
//!
//! ```text
//!   host UI ── on_start / on_stop / on_destroy / on_back_pressed ──► root flow
//!      │                                                               │
//!      │                                            ScreenChanged / Finished
//!      │                                                               ▼
//!      └──────────── ui_visible / ui_not_visible ──────────► TransitionOrchestrator
//! ```
//!
//! Destination changes arrive inside flow listener callbacks, which cannot
//! return errors. A presentation failure raised there is parked and returned
//! by the host call that triggered it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::config::NavigationConfig;
use crate::container::StateContainer;
use crate::flow::{FlowController, FlowEvent, ListenerHandle};
use crate::orchestrator::TransitionOrchestrator;
use crate::transition::{
    Destination, ImmediateTransitions, SurfaceProvider, TransitionError, TransitionFactory,
};

/// Host-side entry point wiring a root flow controller to an orchestrator
pub struct NavigationHost<V, P> {
    root: Rc<dyn FlowController<V>>,
    orchestrator: TransitionOrchestrator<V, P>,
    subscription: ListenerHandle,
    finished: Rc<Cell<bool>>,
    pending: Rc<RefCell<Option<TransitionError>>>,
}

impl<V: Clone + 'static, P: Clone + 'static> NavigationHost<V, P> {
    /// Create a host with the default configuration
    pub fn new(
        root: Rc<dyn FlowController<V>>,
        provider: Rc<dyn SurfaceProvider<V, P>>,
        parent: P,
        transitions: Box<dyn TransitionFactory<V, P>>,
    ) -> Self {
        Self::with_config(root, provider, parent, transitions, &NavigationConfig::default())
    }

    /// Create a host honouring `config`
    ///
    /// With transitions disabled every change swaps surfaces instantly,
    /// whatever `transitions` would have picked.
    pub fn with_config(
        root: Rc<dyn FlowController<V>>,
        provider: Rc<dyn SurfaceProvider<V, P>>,
        parent: P,
        transitions: Box<dyn TransitionFactory<V, P>>,
        config: &NavigationConfig,
    ) -> Self {
        let transitions: Box<dyn TransitionFactory<V, P>> = if config.transitions_enabled {
            transitions
        } else {
            tracing::debug!(source = %config.source(), "Transitions disabled, swapping instantly");
            Box::new(ImmediateTransitions)
        };
        let orchestrator = TransitionOrchestrator::new(parent, transitions);
        orchestrator.set_cache_surfaces(config.cache_surfaces);

        let finished = Rc::new(Cell::new(false));
        let pending: Rc<RefCell<Option<TransitionError>>> = Rc::new(RefCell::new(None));

        let listener = {
            let orchestrator = orchestrator.clone();
            let finished = Rc::clone(&finished);
            let pending = Rc::clone(&pending);
            move |event: &FlowEvent<V>| match event {
                FlowEvent::ScreenChanged { screen, transition } => {
                    let destination =
                        Destination::new(screen.clone(), Rc::clone(&provider), *transition);
                    if let Err(err) = orchestrator.with_destination(destination) {
                        tracing::error!(screen = %screen.key(), %err, "Failed to present screen");
                        let mut slot = pending.borrow_mut();
                        if slot.is_none() {
                            *slot = Some(err);
                        }
                    }
                }
                FlowEvent::Finished => {
                    tracing::info!("Root flow finished");
                    finished.set(true);
                    orchestrator.without_destination();
                }
            }
        };
        let subscription = root.add_listener(Box::new(listener));

        Self {
            root,
            orchestrator,
            subscription,
            finished,
            pending,
        }
    }

    fn take_pending(&self) -> Result<(), TransitionError> {
        match self.pending.borrow_mut().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Host started
    ///
    /// # Errors
    ///
    /// Returns the first presentation failure caused by the call.
    pub fn on_start(&self) -> Result<(), TransitionError> {
        self.root.on_start();
        self.take_pending()
    }

    /// Host stopped
    ///
    /// # Errors
    ///
    /// Returns the first presentation failure caused by the call.
    pub fn on_stop(&self) -> Result<(), TransitionError> {
        self.root.on_stop();
        self.take_pending()
    }

    /// Host destroyed: detach the current surface and tear the flow down
    pub fn on_destroy(&self) {
        self.orchestrator.without_destination();
        self.root.on_destroy();
        self.subscription.dispose();
    }

    /// Back navigation. Returns whether the flow handled it.
    ///
    /// # Errors
    ///
    /// Returns the first presentation failure caused by the call.
    pub fn on_back_pressed(&self) -> Result<bool, TransitionError> {
        let handled = self.root.on_back_pressed();
        self.take_pending()?;
        Ok(handled)
    }

    /// Host UI became visible
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::NoSurface`] if the current screen cannot
    /// get a surface.
    pub fn ui_visible(&self) -> Result<(), TransitionError> {
        self.orchestrator.ui_visible()?;
        self.take_pending()
    }

    /// Host UI no longer visible
    pub fn ui_not_visible(&self) {
        self.orchestrator.ui_not_visible();
    }

    /// Snapshot of the root flow controller
    #[must_use]
    pub fn save_state(&self) -> StateContainer {
        self.root.save_state()
    }

    /// Whether the root flow finished
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished.get()
    }

    /// Root flow controller
    #[must_use]
    pub fn root(&self) -> &Rc<dyn FlowController<V>> {
        &self.root
    }

    /// Orchestrator presenting the root's screens
    #[must_use]
    pub fn orchestrator(&self) -> &TransitionOrchestrator<V, P> {
        &self.orchestrator
    }
}
