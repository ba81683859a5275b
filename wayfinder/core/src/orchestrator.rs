//! Transition Orchestrator - Surfaces, Visibility and In-Flight Animations
//!
//! Reconciles two input streams: host visibility (`ui_visible` /
//! `ui_not_visible`) and destination changes (`with_destination` /
//! `without_destination`). At most one transition animation runs at a time.
//!
//! # State Machine
//!
//! ```text
//!                      with_destination
//!   NotVisible ─────────────────────────────► NotVisibleWithDestination
//!      │  ▲                                        │  ▲   (cached surface)
//!      │  │ ui_not_visible          ui_visible     │  │ ui_not_visible
//!      ▼  │                                        ▼  │
//!    Visible ─────────────────────────────────► VisibleWithDestination
//!             with_destination (present)            (surface, in-flight,
//!                                                    scheduled)
//! ```
//!
//! # Transition Serialization
//!
//! A destination change while a transition is in flight only overwrites the
//! scheduled slot (last write wins). When the in-flight transition completes,
//! the scheduled destination, if any, starts next. Leaving
//! `VisibleWithDestination` kills the in-flight token: later animator calls
//! for it are dropped.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::screen::ScreenHandle;
use crate::transition::{
    Destination, SurfaceProvider, TransitionCallback, TransitionError, TransitionFactory,
    TransitionRequest,
};

// =============================================================================
// State
// =============================================================================

/// Coarse view of the orchestrator state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentationPhase {
    /// Host not visible, nothing to show
    NotVisible,
    /// Host not visible, a destination is waiting
    NotVisibleWithDestination,
    /// Host visible, nothing to show
    Visible,
    /// Host visible and showing (or transitioning to) a destination
    VisibleWithDestination,
}

impl fmt::Display for PresentationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotVisible => "not-visible",
            Self::NotVisibleWithDestination => "not-visible-with-destination",
            Self::Visible => "visible",
            Self::VisibleWithDestination => "visible-with-destination",
        };
        write!(f, "{label}")
    }
}

#[derive(Clone, Copy, Debug)]
struct InFlight {
    token: u64,
    attached: bool,
}

enum PresentationState<V, P> {
    NotVisible,
    NotVisibleWithDestination {
        destination: Destination<V, P>,
        cached: Option<V>,
    },
    Visible,
    VisibleWithDestination {
        destination: Destination<V, P>,
        surface: Option<V>,
        in_flight: Option<InFlight>,
        scheduled: Option<Destination<V, P>>,
    },
}

impl<V, P> PresentationState<V, P> {
    fn phase(&self) -> PresentationPhase {
        match self {
            Self::NotVisible => PresentationPhase::NotVisible,
            Self::NotVisibleWithDestination { .. } => PresentationPhase::NotVisibleWithDestination,
            Self::Visible => PresentationPhase::Visible,
            Self::VisibleWithDestination { .. } => PresentationPhase::VisibleWithDestination,
        }
    }
}

enum PresentationEffect<V, P> {
    Attach(ScreenHandle<V>, V),
    Detach(ScreenHandle<V>, V),
    Release(Rc<dyn SurfaceProvider<V, P>>, V),
    Present(Destination<V, P>),
    Animate {
        from: ScreenHandle<V>,
        outgoing: V,
        destination: Destination<V, P>,
        token: u64,
    },
}

type Step<V, P> = (PresentationState<V, P>, Vec<PresentationEffect<V, P>>);

// =============================================================================
// Inner
// =============================================================================

pub(crate) struct OrchestratorInner<V, P> {
    parent: P,
    transitions: Box<dyn TransitionFactory<V, P>>,
    cache_surfaces: Cell<bool>,
    state: RefCell<PresentationState<V, P>>,
    next_token: Cell<u64>,
}

impl<V: Clone + 'static, P: Clone + 'static> OrchestratorInner<V, P> {
    fn step(
        &self,
        transition: impl FnOnce(&Self, PresentationState<V, P>) -> Step<V, P>,
    ) -> Vec<PresentationEffect<V, P>> {
        let mut state = self.state.borrow_mut();
        let current = std::mem::replace(&mut *state, PresentationState::NotVisible);
        let (next, effects) = transition(self, current);
        tracing::trace!(phase = %next.phase(), effects = effects.len(), "Presentation step");
        *state = next;
        effects
    }

    fn issue_token(&self) -> u64 {
        let token = self.next_token.get();
        self.next_token.set(token + 1);
        token
    }

    fn ui_visible(self: &Rc<Self>) -> Result<(), TransitionError> {
        let effects = self.step(|_, state| match state {
            PresentationState::NotVisible => (PresentationState::Visible, Vec::new()),
            PresentationState::NotVisibleWithDestination {
                destination,
                cached: Some(surface),
            } => {
                tracing::debug!(screen = %destination.screen.key(), "Reusing cached surface");
                let effects = vec![PresentationEffect::Attach(
                    destination.screen.clone(),
                    surface.clone(),
                )];
                (
                    PresentationState::VisibleWithDestination {
                        destination,
                        surface: Some(surface),
                        in_flight: None,
                        scheduled: None,
                    },
                    effects,
                )
            }
            PresentationState::NotVisibleWithDestination {
                destination,
                cached: None,
            } => {
                let effects = vec![PresentationEffect::Present(destination.clone())];
                (
                    PresentationState::VisibleWithDestination {
                        destination,
                        surface: None,
                        in_flight: None,
                        scheduled: None,
                    },
                    effects,
                )
            }
            visible => (visible, Vec::new()),
        });
        self.run(effects)
    }

    fn ui_not_visible(self: &Rc<Self>) {
        let effects = self.step(|inner, state| match state {
            PresentationState::Visible => (PresentationState::NotVisible, Vec::new()),
            PresentationState::VisibleWithDestination {
                destination,
                surface,
                in_flight,
                scheduled,
            } => {
                if let Some(flight) = in_flight {
                    tracing::debug!(token = flight.token, "Visibility lost, cancelling transition");
                }
                let mut effects = Vec::new();
                let mut cached = None;
                if let Some(surface) = surface {
                    effects.push(PresentationEffect::Detach(
                        destination.screen.clone(),
                        surface.clone(),
                    ));
                    if scheduled.is_none() && inner.cache_surfaces.get() {
                        cached = Some(surface);
                    } else {
                        effects.push(PresentationEffect::Release(
                            Rc::clone(&destination.provider),
                            surface,
                        ));
                    }
                }
                let next = PresentationState::NotVisibleWithDestination {
                    destination: scheduled.unwrap_or(destination),
                    cached,
                };
                (next, effects)
            }
            hidden => (hidden, Vec::new()),
        });
        self.run_infallible(effects);
    }

    fn with_destination(self: &Rc<Self>, destination: Destination<V, P>) -> Result<(), TransitionError> {
        let effects = self.step(|inner, state| inner.route(state, destination));
        self.run(effects)
    }

    fn route(&self, state: PresentationState<V, P>, next: Destination<V, P>) -> Step<V, P> {
        match state {
            PresentationState::NotVisible => (
                PresentationState::NotVisibleWithDestination {
                    destination: next,
                    cached: None,
                },
                Vec::new(),
            ),
            PresentationState::NotVisibleWithDestination {
                destination,
                cached,
            } => {
                let mut effects = Vec::new();
                let cached = match cached {
                    Some(surface) if destination.screen == next.screen => Some(surface),
                    Some(surface) => {
                        effects.push(PresentationEffect::Release(destination.provider, surface));
                        None
                    }
                    None => None,
                };
                (
                    PresentationState::NotVisibleWithDestination {
                        destination: next,
                        cached,
                    },
                    effects,
                )
            }
            PresentationState::Visible => {
                let effects = vec![PresentationEffect::Present(next.clone())];
                (
                    PresentationState::VisibleWithDestination {
                        destination: next,
                        surface: None,
                        in_flight: None,
                        scheduled: None,
                    },
                    effects,
                )
            }
            PresentationState::VisibleWithDestination {
                destination,
                surface,
                in_flight: Some(flight),
                scheduled,
            } => {
                if let Some(dropped) = &scheduled {
                    tracing::debug!(
                        dropped = %dropped.screen.key(),
                        scheduled = %next.screen.key(),
                        "Collapsing scheduled destination"
                    );
                } else {
                    tracing::debug!(
                        token = flight.token,
                        scheduled = %next.screen.key(),
                        "Transition in flight, scheduling destination"
                    );
                }
                (
                    PresentationState::VisibleWithDestination {
                        destination,
                        surface,
                        in_flight: Some(flight),
                        scheduled: Some(next),
                    },
                    Vec::new(),
                )
            }
            PresentationState::VisibleWithDestination {
                destination,
                surface: Some(surface),
                in_flight: None,
                scheduled,
            } if destination.screen == next.screen => {
                tracing::debug!(screen = %next.screen.key(), "Destination already shown");
                (
                    PresentationState::VisibleWithDestination {
                        destination,
                        surface: Some(surface),
                        in_flight: None,
                        scheduled,
                    },
                    Vec::new(),
                )
            }
            PresentationState::VisibleWithDestination {
                destination,
                surface: Some(surface),
                in_flight: None,
                ..
            } => {
                let token = self.issue_token();
                tracing::debug!(
                    token,
                    from = %destination.screen.key(),
                    to = %next.screen.key(),
                    "Starting transition"
                );
                let effects = vec![
                    PresentationEffect::Detach(destination.screen.clone(), surface.clone()),
                    PresentationEffect::Animate {
                        from: destination.screen,
                        outgoing: surface,
                        destination: next.clone(),
                        token,
                    },
                ];
                (
                    PresentationState::VisibleWithDestination {
                        destination: next,
                        surface: None,
                        in_flight: Some(InFlight {
                            token,
                            attached: false,
                        }),
                        scheduled: None,
                    },
                    effects,
                )
            }
            PresentationState::VisibleWithDestination {
                surface: None,
                in_flight: None,
                ..
            } => {
                let effects = vec![PresentationEffect::Present(next.clone())];
                (
                    PresentationState::VisibleWithDestination {
                        destination: next,
                        surface: None,
                        in_flight: None,
                        scheduled: None,
                    },
                    effects,
                )
            }
        }
    }

    fn without_destination(self: &Rc<Self>) {
        let effects = self.step(|_, state| match state {
            PresentationState::NotVisibleWithDestination {
                destination,
                cached,
            } => {
                let effects = cached
                    .map(|surface| vec![PresentationEffect::Release(destination.provider, surface)])
                    .unwrap_or_default();
                (PresentationState::NotVisible, effects)
            }
            PresentationState::VisibleWithDestination {
                destination,
                surface,
                in_flight,
                ..
            } => {
                if let Some(flight) = in_flight {
                    tracing::debug!(token = flight.token, "Destination cleared, cancelling transition");
                }
                let effects = surface
                    .map(|surface| {
                        vec![
                            PresentationEffect::Detach(destination.screen.clone(), surface.clone()),
                            PresentationEffect::Release(destination.provider, surface),
                        ]
                    })
                    .unwrap_or_default();
                (PresentationState::Visible, effects)
            }
            idle => (idle, Vec::new()),
        });
        self.run_infallible(effects);
    }

    pub(crate) fn transition_attached(self: &Rc<Self>, token: u64, surface: V) {
        let screen = {
            let mut state = self.state.borrow_mut();
            match &mut *state {
                PresentationState::VisibleWithDestination {
                    destination,
                    surface: slot,
                    in_flight: Some(flight),
                    ..
                } if flight.token == token => {
                    if flight.attached {
                        tracing::debug!(token, "Surface already attached, ignoring");
                        None
                    } else {
                        flight.attached = true;
                        *slot = Some(surface.clone());
                        Some(destination.screen.clone())
                    }
                }
                _ => {
                    tracing::debug!(token, "Dropping stale attach");
                    None
                }
            }
        };
        if let Some(screen) = screen {
            screen.attach(&surface);
        }
    }

    pub(crate) fn transition_completed(
        self: &Rc<Self>,
        token: u64,
        surface: V,
    ) -> Result<(), TransitionError> {
        let (attach, scheduled) = {
            let mut state = self.state.borrow_mut();
            match &mut *state {
                PresentationState::VisibleWithDestination {
                    destination,
                    surface: slot,
                    in_flight,
                    scheduled,
                } if in_flight.is_some_and(|flight| flight.token == token) => {
                    let attached = in_flight.take().is_some_and(|flight| flight.attached);
                    tracing::debug!(token, screen = %destination.screen.key(), "Transition complete");
                    let attach = if attached {
                        None
                    } else {
                        *slot = Some(surface.clone());
                        Some(destination.screen.clone())
                    };
                    (attach, scheduled.take())
                }
                _ => {
                    tracing::debug!(token, "Dropping stale completion");
                    return Ok(());
                }
            }
        };
        if let Some(screen) = attach {
            screen.attach(&surface);
        }
        match scheduled {
            Some(next) => self.with_destination(next),
            None => Ok(()),
        }
    }

    fn transition_failed(self: &Rc<Self>, token: u64) {
        let scheduled = {
            let mut state = self.state.borrow_mut();
            match &mut *state {
                PresentationState::VisibleWithDestination {
                    in_flight,
                    scheduled,
                    ..
                } if in_flight.is_some_and(|flight| flight.token == token) => {
                    *in_flight = None;
                    scheduled.take()
                }
                _ => None,
            }
        };
        if let Some(next) = scheduled {
            if let Err(err) = self.with_destination(next) {
                tracing::warn!(%err, "Scheduled destination failed after transition failure");
            }
        }
    }

    /// Store a freshly provided surface if the destination is still waiting for it
    fn accept_presented(&self, destination: &Destination<V, P>, surface: &V) -> bool {
        let mut state = self.state.borrow_mut();
        match &mut *state {
            PresentationState::VisibleWithDestination {
                destination: current,
                surface: slot,
                in_flight: None,
                ..
            } if slot.is_none() && current.screen == destination.screen => {
                *slot = Some(surface.clone());
                true
            }
            _ => false,
        }
    }

    fn run(self: &Rc<Self>, effects: Vec<PresentationEffect<V, P>>) -> Result<(), TransitionError> {
        for effect in effects {
            match effect {
                PresentationEffect::Attach(screen, surface) => screen.attach(&surface),
                PresentationEffect::Detach(screen, surface) => {
                    // Screens popped off a stack are destroyed before the change arrives
                    if !screen.is_destroyed() {
                        screen.detach(&surface);
                    }
                }
                PresentationEffect::Release(provider, surface) => {
                    provider.release(surface, &self.parent);
                }
                PresentationEffect::Present(destination) => {
                    let surface = destination.provider.provide(&destination.screen, &self.parent)?;
                    if self.accept_presented(&destination, &surface) {
                        tracing::debug!(screen = %destination.screen.key(), "Presented");
                        destination.screen.attach(&surface);
                    } else {
                        destination.provider.release(surface, &self.parent);
                    }
                }
                PresentationEffect::Animate {
                    from,
                    outgoing,
                    destination,
                    token,
                } => {
                    let animator =
                        self.transitions
                            .transition_for(&from, &destination.screen, destination.transition);
                    let request =
                        TransitionRequest::new(self.parent.clone(), from, Some(outgoing), &destination);
                    let callback = TransitionCallback::new(Rc::downgrade(self), token);
                    if let Err(err) = animator.execute(request, callback) {
                        self.transition_failed(token);
                        return Err(err);
                    }
                }
            }
        }
        Ok(())
    }

    fn run_infallible(self: &Rc<Self>, effects: Vec<PresentationEffect<V, P>>) {
        if let Err(err) = self.run(effects) {
            tracing::error!(%err, "Teardown effects failed");
        }
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Drives surfaces and transition animations for one render parent
///
/// Cheap to clone; clones share the same state.
pub struct TransitionOrchestrator<V, P> {
    inner: Rc<OrchestratorInner<V, P>>,
}

impl<V, P> Clone for TransitionOrchestrator<V, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<V: Clone + 'static, P: Clone + 'static> TransitionOrchestrator<V, P> {
    /// Create an orchestrator in the `NotVisible` state
    #[must_use]
    pub fn new(parent: P, transitions: Box<dyn TransitionFactory<V, P>>) -> Self {
        Self {
            inner: Rc::new(OrchestratorInner {
                parent,
                transitions,
                cache_surfaces: Cell::new(true),
                state: RefCell::new(PresentationState::NotVisible),
                next_token: Cell::new(1),
            }),
        }
    }

    /// Keep the detached surface across `ui_not_visible` (default `true`)
    pub fn set_cache_surfaces(&self, enabled: bool) {
        self.inner.cache_surfaces.set(enabled);
    }

    /// The host became visible
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::NoSurface`] if the waiting destination
    /// cannot get a surface.
    pub fn ui_visible(&self) -> Result<(), TransitionError> {
        self.inner.ui_visible()
    }

    /// The host is no longer visible. Cancels any in-flight transition.
    pub fn ui_not_visible(&self) {
        self.inner.ui_not_visible();
    }

    /// Show `destination` next
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::NoSurface`] if a surface is needed right
    /// away and the provider (or animator) cannot build one.
    pub fn with_destination(&self, destination: Destination<V, P>) -> Result<(), TransitionError> {
        self.inner.with_destination(destination)
    }

    /// Nothing to show any more. Cancels any in-flight transition.
    pub fn without_destination(&self) {
        self.inner.without_destination();
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> PresentationPhase {
        self.inner.state.borrow().phase()
    }

    /// Whether a transition animation is in flight
    #[must_use]
    pub fn is_transitioning(&self) -> bool {
        matches!(
            &*self.inner.state.borrow(),
            PresentationState::VisibleWithDestination {
                in_flight: Some(_),
                ..
            }
        )
    }

    /// Screen of the current destination
    #[must_use]
    pub fn current_screen(&self) -> Option<ScreenHandle<V>> {
        match &*self.inner.state.borrow() {
            PresentationState::NotVisibleWithDestination { destination, .. }
            | PresentationState::VisibleWithDestination { destination, .. } => {
                Some(destination.screen.clone())
            }
            PresentationState::NotVisible | PresentationState::Visible => None,
        }
    }

    /// Screen waiting for the in-flight transition to finish
    #[must_use]
    pub fn scheduled_screen(&self) -> Option<ScreenHandle<V>> {
        match &*self.inner.state.borrow() {
            PresentationState::VisibleWithDestination {
                scheduled: Some(next),
                ..
            } => Some(next.screen.clone()),
            _ => None,
        }
    }

    /// Surface attached to the current destination (or cached for it)
    #[must_use]
    pub fn current_surface(&self) -> Option<V> {
        match &*self.inner.state.borrow() {
            PresentationState::NotVisibleWithDestination { cached, .. } => cached.clone(),
            PresentationState::VisibleWithDestination { surface, .. } => surface.clone(),
            PresentationState::NotVisible | PresentationState::Visible => None,
        }
    }
}
