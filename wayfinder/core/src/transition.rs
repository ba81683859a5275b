//! Transitions - Destinations, Surfaces and Animators
//!
//! Types that sit at the boundary between the core and the host's rendering
//! layer. The core never draws anything: it asks a [`SurfaceProvider`] for
//! surfaces and hands transitions to a [`TransitionAnimator`], which reports
//! back through a [`TransitionCallback`].
//!
//! # Animator Contract
//!
//! An animator receives a [`TransitionRequest`] and a callback. It may call
//! [`TransitionCallback::attach`] any number of times and must eventually call
//! [`TransitionCallback::on_complete`] exactly once. Either call may happen
//! synchronously inside `execute` or much later. Calls that arrive after the
//! orchestrator moved on are dropped silently.

use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::orchestrator::OrchestratorInner;
use crate::screen::{ScreenHandle, ScreenKey};

// =============================================================================
// Error Types
// =============================================================================

/// Errors raised while presenting a destination
#[derive(Debug, Error)]
pub enum TransitionError {
    /// The surface provider could not build a surface
    #[error("No surface could be created for screen '{screen}': {reason}")]
    NoSurface {
        /// Key of the screen that needed a surface
        screen: ScreenKey,
        /// Provider supplied reason
        reason: String,
    },
}

// =============================================================================
// Metadata and Destinations
// =============================================================================

/// Hint used to pick a transition animation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransitionMeta {
    /// Navigation went back in history
    pub backwards: bool,
}

impl TransitionMeta {
    /// Forward navigation
    #[must_use]
    pub fn forward() -> Self {
        Self { backwards: false }
    }

    /// Backward navigation
    #[must_use]
    pub fn backward() -> Self {
        Self { backwards: true }
    }
}

/// Supplies render surfaces for screens
pub trait SurfaceProvider<V, P> {
    /// Build a surface for `screen` inside `parent`
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::NoSurface`] if no surface can be created.
    fn provide(&self, screen: &ScreenHandle<V>, parent: &P) -> Result<V, TransitionError>;

    /// The orchestrator no longer needs `surface`
    fn release(&self, _surface: V, _parent: &P) {}
}

/// What should be shown next
pub struct Destination<V, P> {
    /// Target screen
    pub screen: ScreenHandle<V>,
    /// Provider used to build the target's surface
    pub provider: Rc<dyn SurfaceProvider<V, P>>,
    /// Transition hint
    pub transition: Option<TransitionMeta>,
}

impl<V, P> Destination<V, P> {
    /// Create a destination
    pub fn new(
        screen: ScreenHandle<V>,
        provider: Rc<dyn SurfaceProvider<V, P>>,
        transition: Option<TransitionMeta>,
    ) -> Self {
        Self {
            screen,
            provider,
            transition,
        }
    }
}

impl<V, P> Clone for Destination<V, P> {
    fn clone(&self) -> Self {
        Self {
            screen: self.screen.clone(),
            provider: Rc::clone(&self.provider),
            transition: self.transition,
        }
    }
}

impl<V, P> fmt::Debug for Destination<V, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Destination")
            .field("screen", self.screen.key())
            .field("transition", &self.transition)
            .finish()
    }
}

// =============================================================================
// Animators
// =============================================================================

/// Everything an animator needs to move from one surface to the next
pub struct TransitionRequest<V, P> {
    /// Render parent
    pub parent: P,
    /// Screen being left
    pub from: ScreenHandle<V>,
    /// Screen being entered
    pub to: ScreenHandle<V>,
    /// Surface of the screen being left, already detached from it
    pub outgoing: Option<V>,
    /// Transition hint
    pub transition: Option<TransitionMeta>,
    provider: Rc<dyn SurfaceProvider<V, P>>,
}

impl<V, P> TransitionRequest<V, P> {
    pub(crate) fn new(
        parent: P,
        from: ScreenHandle<V>,
        outgoing: Option<V>,
        destination: &Destination<V, P>,
    ) -> Self {
        Self {
            parent,
            from,
            to: destination.screen.clone(),
            outgoing,
            transition: destination.transition,
            provider: Rc::clone(&destination.provider),
        }
    }

    /// Build the incoming screen's surface with the destination's provider
    ///
    /// # Errors
    ///
    /// Propagates [`TransitionError::NoSurface`] from the provider.
    pub fn provide_incoming(&self) -> Result<V, TransitionError> {
        self.provider.provide(&self.to, &self.parent)
    }

    /// Hand the outgoing surface back to the provider
    pub fn release_outgoing(&mut self) {
        if let Some(surface) = self.outgoing.take() {
            self.provider.release(surface, &self.parent);
        }
    }
}

/// A visual effect moving from one surface to the next
pub trait TransitionAnimator<V, P> {
    /// Run the transition, reporting through `callback`
    ///
    /// # Errors
    ///
    /// Returns an error if the incoming surface cannot be built.
    fn execute(
        self: Box<Self>,
        request: TransitionRequest<V, P>,
        callback: TransitionCallback<V, P>,
    ) -> Result<(), TransitionError>;
}

/// Picks the animator for a destination change
pub trait TransitionFactory<V, P> {
    /// Animator for moving from `from` to `to`
    fn transition_for(
        &self,
        from: &ScreenHandle<V>,
        to: &ScreenHandle<V>,
        transition: Option<TransitionMeta>,
    ) -> Box<dyn TransitionAnimator<V, P>>;
}

/// Animator that swaps surfaces instantly
#[derive(Clone, Copy, Debug, Default)]
pub struct ImmediateTransition;

impl<V: Clone + 'static, P: Clone + 'static> TransitionAnimator<V, P> for ImmediateTransition {
    fn execute(
        self: Box<Self>,
        mut request: TransitionRequest<V, P>,
        callback: TransitionCallback<V, P>,
    ) -> Result<(), TransitionError> {
        request.release_outgoing();
        let surface = request.provide_incoming()?;
        callback.on_complete(surface)
    }
}

/// Factory that always picks [`ImmediateTransition`]
#[derive(Clone, Copy, Debug, Default)]
pub struct ImmediateTransitions;

impl<V: Clone + 'static, P: Clone + 'static> TransitionFactory<V, P> for ImmediateTransitions {
    fn transition_for(
        &self,
        _from: &ScreenHandle<V>,
        _to: &ScreenHandle<V>,
        _transition: Option<TransitionMeta>,
    ) -> Box<dyn TransitionAnimator<V, P>> {
        Box::new(ImmediateTransition)
    }
}

// =============================================================================
// Callback
// =============================================================================

/// Single-use token an animator reports through
///
/// The token stays live until `on_complete` runs or the orchestrator leaves
/// the transition behind (visibility lost, destination cleared). Calls on a
/// dead token do nothing.
pub struct TransitionCallback<V, P> {
    orchestrator: Weak<OrchestratorInner<V, P>>,
    token: u64,
}

impl<V, P> TransitionCallback<V, P> {
    pub(crate) fn new(orchestrator: Weak<OrchestratorInner<V, P>>, token: u64) -> Self {
        Self {
            orchestrator,
            token,
        }
    }

    /// Token identifying the transition this callback belongs to
    #[must_use]
    pub fn token(&self) -> u64 {
        self.token
    }
}

impl<V: Clone + 'static, P: Clone + 'static> TransitionCallback<V, P> {
    /// The incoming surface is ready; attach it to the incoming screen
    ///
    /// Only the first call per token attaches.
    pub fn attach(&self, surface: V) {
        match self.orchestrator.upgrade() {
            Some(inner) => inner.transition_attached(self.token, surface),
            None => tracing::debug!(token = self.token, "Orchestrator gone, dropping attach"),
        }
    }

    /// The transition finished
    ///
    /// Attaches `surface` if no earlier `attach` did, then starts the next
    /// scheduled destination if there is one.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduled destination cannot be presented.
    pub fn on_complete(&self, surface: V) -> Result<(), TransitionError> {
        match self.orchestrator.upgrade() {
            Some(inner) => inner.transition_completed(self.token, surface),
            None => {
                tracing::debug!(token = self.token, "Orchestrator gone, dropping completion");
                Ok(())
            }
        }
    }
}

impl<V, P> fmt::Debug for TransitionCallback<V, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionCallback")
            .field("token", &self.token)
            .finish()
    }
}
