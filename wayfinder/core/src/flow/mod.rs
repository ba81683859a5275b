//! Flow Controllers - Which Screen Is Current
//!
//! A flow controller owns one or more [`Screen`](crate::screen::Screen)s,
//! decides which one is current, and drives their lifecycle. It mirrors the
//! screen lifecycle itself (`on_start`/`on_stop`/`on_destroy`) and reports
//! two kinds of events to its listeners: the current screen changed, and the
//! flow finished.
//!
//! # State Machine
//!
//! ```text
//!            on_start                on_destroy / finish / last pop
//!  Inactive ─────────► Active ───────────────────────────────► Destroyed
//!      ▲                  │                                         ▲
//!      └──────────────────┘                                         │
//!            on_stop                                                │
//!      └────────────────────────────────────────────────────────────┘
//!                         on_destroy / finish / last pop
//! ```
//!
//! Every variant stores its items inside a single [`FlowState`] slot. Each
//! operation reads the slot, computes the next state plus a list of
//! [`Effect`]s, writes the slot back, and only then runs the effects (screen
//! lifecycle calls and listener notifications). Listeners may therefore call
//! straight back into the controller.
//!
//! # Variants
//!
//! - [`SingleController`]: exactly one screen
//! - [`ReplacingController`]: one screen, replaceable, no history
//! - [`StackController`]: push/pop history
//! - [`ParallelController`]: several concurrently alive branches, one selected

pub mod listeners;
pub mod parallel;
pub mod replacing;
pub mod single;
pub mod stack;

pub use listeners::{ListenerHandle, ListenerSet};
pub use parallel::{BranchFactory, ParallelController};
pub use replacing::ReplacingController;
pub use single::SingleController;
pub use stack::StackController;

use std::cell::RefCell;
use std::fmt;

use thiserror::Error;

use crate::container::{StateContainer, StateError};
use crate::screen::ScreenHandle;
use crate::transition::TransitionMeta;

// =============================================================================
// Error Types
// =============================================================================

/// Errors raised while building or restoring flow controllers
#[derive(Debug, Error)]
pub enum FlowError {
    /// A stack controller needs at least one screen
    #[error("A stack controller cannot be created without screens")]
    EmptyStack,

    /// Saved state names a screen type nobody can reconstruct
    #[error("No screen can be restored for type '{type_tag}'")]
    UnrestorableScreen {
        /// The recorded type identifier
        type_tag: String,
    },

    /// Saved state is missing a required key
    #[error("Saved state is missing key '{key}'")]
    MissingKey {
        /// The missing key
        key: String,
    },

    /// A parallel controller was asked for a branch it cannot create
    #[error("Unknown branch '{key}'")]
    UnknownBranch {
        /// The requested branch key
        key: String,
    },

    /// State container failure
    #[error(transparent)]
    State(#[from] StateError),
}

// =============================================================================
// Lifecycle
// =============================================================================

/// Coarse lifecycle of a flow controller
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowLifecycle {
    /// Alive, not started
    Inactive,
    /// Started, its current screen is started too
    Active,
    /// Terminal
    Destroyed,
}

impl fmt::Display for FlowLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Destroyed => "destroyed",
        };
        write!(f, "{label}")
    }
}

/// State slot of a flow controller, generic over the items it holds
#[derive(Debug)]
pub enum FlowState<T> {
    /// Alive, not started
    Inactive(T),
    /// Started
    Active(T),
    /// Terminal, items released
    Destroyed,
}

impl<T> FlowState<T> {
    /// Lifecycle of this state
    #[must_use]
    pub fn lifecycle(&self) -> FlowLifecycle {
        match self {
            Self::Inactive(_) => FlowLifecycle::Inactive,
            Self::Active(_) => FlowLifecycle::Active,
            Self::Destroyed => FlowLifecycle::Destroyed,
        }
    }

    /// Items held by a live state
    #[must_use]
    pub fn items(&self) -> Option<&T> {
        match self {
            Self::Inactive(items) | Self::Active(items) => Some(items),
            Self::Destroyed => None,
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// Event delivered to flow listeners
pub enum FlowEvent<V> {
    /// A new screen became current
    ScreenChanged {
        /// The current screen
        screen: ScreenHandle<V>,
        /// Transition hint, `None` when the change is not a navigation
        /// (e.g. the controller was started)
        transition: Option<TransitionMeta>,
    },
    /// The flow has nothing left to show
    Finished,
}

impl<V> FlowEvent<V> {
    /// Screen-changed event
    #[must_use]
    pub fn screen_changed(screen: ScreenHandle<V>, transition: Option<TransitionMeta>) -> Self {
        Self::ScreenChanged { screen, transition }
    }
}

impl<V> Clone for FlowEvent<V> {
    fn clone(&self) -> Self {
        match self {
            Self::ScreenChanged { screen, transition } => Self::ScreenChanged {
                screen: screen.clone(),
                transition: *transition,
            },
            Self::Finished => Self::Finished,
        }
    }
}

impl<V> fmt::Debug for FlowEvent<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScreenChanged { screen, transition } => f
                .debug_struct("ScreenChanged")
                .field("screen", screen.key())
                .field("transition", transition)
                .finish(),
            Self::Finished => write!(f, "Finished"),
        }
    }
}

/// Listener callback registered on a flow controller
pub type FlowListener<V> = Box<dyn Fn(&FlowEvent<V>)>;

// =============================================================================
// Controller Contract
// =============================================================================

/// Common contract of every flow controller variant
///
/// All methods take `&self`: controllers are shared (`Rc`) between their
/// owner, their parent controller and listener closures, and must tolerate
/// re-entrant calls from inside listener callbacks.
pub trait FlowController<V> {
    /// Host started: start the current screen
    fn on_start(&self);

    /// Host stopped: stop the current screen
    fn on_stop(&self);

    /// Host destroyed: tear down every screen. Does not emit `Finished`.
    fn on_destroy(&self);

    /// Back navigation. Returns whether the controller handled it.
    fn on_back_pressed(&self) -> bool;

    /// Tear down every screen and emit `Finished`
    fn finish(&self);

    /// Register a listener. While active, the current screen is replayed to
    /// the new listener immediately.
    fn add_listener(&self, listener: FlowListener<V>) -> ListenerHandle;

    /// Current lifecycle
    fn lifecycle(&self) -> FlowLifecycle;

    /// The screen that is current (or would be, once started)
    fn current_screen(&self) -> Option<ScreenHandle<V>>;

    /// Snapshot the controller's state
    fn save_state(&self) -> StateContainer;

    /// Whether the controller reached its terminal state
    fn is_destroyed(&self) -> bool {
        self.lifecycle() == FlowLifecycle::Destroyed
    }
}

/// Reconstructs screens from their saved state
pub trait ScreenFactory<V> {
    /// Rebuild a screen of the given type. `None` means the type is unknown.
    fn restore_screen(
        &self,
        type_tag: &str,
        state: Option<&StateContainer>,
    ) -> Option<ScreenHandle<V>>;
}

// =============================================================================
// Effects
// =============================================================================

/// Side effect computed by a screen-owning controller transition
pub(crate) enum Effect<V> {
    Start(ScreenHandle<V>),
    Stop(ScreenHandle<V>),
    Destroy(ScreenHandle<V>),
    Emit(FlowEvent<V>),
}

/// Replace the state in `slot` with the result of `transition`, returning the
/// effects to run once the slot is released
pub(crate) fn advance<T, E>(
    slot: &RefCell<FlowState<T>>,
    transition: impl FnOnce(FlowState<T>) -> (FlowState<T>, Vec<E>),
) -> Vec<E> {
    let mut state = slot.borrow_mut();
    let current = std::mem::replace(&mut *state, FlowState::Destroyed);
    let (next, effects) = transition(current);
    *state = next;
    effects
}

pub(crate) fn run_effects<V: 'static>(effects: Vec<Effect<V>>, listeners: &ListenerSet<V>) {
    for effect in effects {
        match effect {
            Effect::Start(screen) => screen.start(),
            Effect::Stop(screen) => screen.stop(),
            Effect::Destroy(screen) => screen.destroy(),
            Effect::Emit(event) => listeners.emit(&event),
        }
    }
}

/// Stop the top screen (when active) and destroy every screen, most recent first
pub(crate) fn teardown_effects<V>(
    screens: Vec<ScreenHandle<V>>,
    was_active: bool,
) -> Vec<Effect<V>> {
    let mut effects = Vec::with_capacity(screens.len() + 1);
    if was_active {
        if let Some(top) = screens.last() {
            effects.push(Effect::Stop(top.clone()));
        }
    }
    effects.extend(screens.into_iter().rev().map(Effect::Destroy));
    effects
}

pub(crate) fn warn_destroyed(controller: &'static str, operation: &'static str) {
    tracing::warn!(controller, operation, "Ignoring operation on destroyed flow controller");
}

/// Save one screen as `<prefix>type` plus optional `<prefix>state`
pub(crate) fn save_screen<V>(container: &mut StateContainer, prefix: &str, screen: &ScreenHandle<V>) {
    container.insert(format!("{prefix}type"), screen.type_tag());
    if let Some(state) = screen.save_state() {
        container.insert(format!("{prefix}state"), state);
    }
}

/// Inverse of [`save_screen`]
pub(crate) fn restore_screen<V>(
    container: &StateContainer,
    prefix: &str,
    factory: &dyn ScreenFactory<V>,
) -> Result<ScreenHandle<V>, FlowError> {
    let type_key = format!("{prefix}type");
    let type_tag = container
        .get_str(&type_key)
        .ok_or(FlowError::MissingKey { key: type_key })?;
    let state = container.get_container(&format!("{prefix}state"));
    factory
        .restore_screen(type_tag, state)
        .ok_or_else(|| FlowError::UnrestorableScreen {
            type_tag: type_tag.to_string(),
        })
}
