//! Screens - Units of Presentable Content
//!
//! A [`Screen`] is what a flow controller puts on its stack. It has a
//! start/stop/destroy lifecycle and binds to a render surface through
//! `attach`/`detach`. Screens never decide when any of that happens; the
//! owning controller and the transition orchestrator do.
//!
//! Controllers and the orchestrator share screens through [`ScreenHandle`],
//! which also guards the lifecycle: once a screen is destroyed no further
//! call reaches it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::container::StateContainer;

/// Stable key identifying a screen
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenKey(pub String);

impl ScreenKey {
    /// Create a key from a string
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScreenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ScreenKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Lifecycle phase of a screen
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScreenPhase {
    /// Created, never started
    NotStarted,
    /// Started and current
    Started,
    /// Stopped, may be started again
    Stopped,
    /// Destroyed (terminal)
    Destroyed,
}

impl ScreenPhase {
    /// Whether the phase is terminal
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Destroyed)
    }
}

impl fmt::Display for ScreenPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotStarted => "not-started",
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Destroyed => "destroyed",
        };
        write!(f, "{label}")
    }
}

/// A unit of presentable content
///
/// `V` is the surface type the host renders into. Every method except
/// [`key`](Screen::key), [`type_tag`](Screen::type_tag), `attach` and
/// `detach` has a no-op default.
pub trait Screen<V> {
    /// Stable key of this screen
    fn key(&self) -> ScreenKey;

    /// Type identifier used to reconstruct the screen from saved state
    fn type_tag(&self) -> &'static str;

    /// The screen became current
    fn on_start(&mut self) {}

    /// The screen is no longer current
    fn on_stop(&mut self) {}

    /// The screen was removed by its owner
    fn on_destroy(&mut self) {}

    /// Bind a surface to this screen
    fn attach(&mut self, surface: &V);

    /// Unbind a surface previously attached
    fn detach(&mut self, surface: &V);

    /// Save the screen's own state, if it opts in
    fn save_state(&self) -> Option<StateContainer> {
        None
    }
}

struct ScreenCell<V> {
    key: ScreenKey,
    type_tag: &'static str,
    phase: Cell<ScreenPhase>,
    screen: RefCell<Box<dyn Screen<V>>>,
}

/// Shared, lifecycle-guarded handle to a screen
///
/// Cloning the handle shares the screen. Equality is identity: two handles
/// are equal when they point at the same screen instance.
pub struct ScreenHandle<V> {
    inner: Rc<ScreenCell<V>>,
}

impl<V> Clone for ScreenHandle<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<V> PartialEq for ScreenHandle<V> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<V> Eq for ScreenHandle<V> {}

impl<V> fmt::Debug for ScreenHandle<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScreenHandle")
            .field("key", &self.inner.key)
            .field("type_tag", &self.inner.type_tag)
            .field("phase", &self.inner.phase.get())
            .finish()
    }
}

impl<V> ScreenHandle<V> {
    /// Wrap a screen in a new handle
    pub fn new<S: Screen<V> + 'static>(screen: S) -> Self {
        Self::from_boxed(Box::new(screen))
    }

    /// Wrap an already boxed screen
    #[must_use]
    pub fn from_boxed(screen: Box<dyn Screen<V>>) -> Self {
        Self {
            inner: Rc::new(ScreenCell {
                key: screen.key(),
                type_tag: screen.type_tag(),
                phase: Cell::new(ScreenPhase::NotStarted),
                screen: RefCell::new(screen),
            }),
        }
    }

    /// Key of the screen
    #[must_use]
    pub fn key(&self) -> &ScreenKey {
        &self.inner.key
    }

    /// Type tag of the screen
    #[must_use]
    pub fn type_tag(&self) -> &'static str {
        self.inner.type_tag
    }

    /// Current lifecycle phase
    #[must_use]
    pub fn phase(&self) -> ScreenPhase {
        self.inner.phase.get()
    }

    /// Whether the screen was destroyed
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.phase().is_terminal()
    }

    /// Start the screen. Idempotent while started.
    pub fn start(&self) {
        match self.phase() {
            ScreenPhase::Started => {}
            ScreenPhase::Destroyed => self.warn_destroyed("start"),
            ScreenPhase::NotStarted | ScreenPhase::Stopped => {
                self.inner.phase.set(ScreenPhase::Started);
                tracing::debug!(screen = %self.inner.key, "Screen started");
                self.inner.screen.borrow_mut().on_start();
            }
        }
    }

    /// Stop the screen if it is started
    pub fn stop(&self) {
        match self.phase() {
            ScreenPhase::Started => {
                self.inner.phase.set(ScreenPhase::Stopped);
                tracing::debug!(screen = %self.inner.key, "Screen stopped");
                self.inner.screen.borrow_mut().on_stop();
            }
            ScreenPhase::Destroyed => self.warn_destroyed("stop"),
            ScreenPhase::NotStarted | ScreenPhase::Stopped => {}
        }
    }

    /// Destroy the screen. Terminal.
    pub fn destroy(&self) {
        if self.is_destroyed() {
            self.warn_destroyed("destroy");
            return;
        }
        self.inner.phase.set(ScreenPhase::Destroyed);
        tracing::debug!(screen = %self.inner.key, "Screen destroyed");
        self.inner.screen.borrow_mut().on_destroy();
    }

    /// Attach a surface
    pub fn attach(&self, surface: &V) {
        if self.is_destroyed() {
            self.warn_destroyed("attach");
            return;
        }
        self.inner.screen.borrow_mut().attach(surface);
    }

    /// Detach a surface
    pub fn detach(&self, surface: &V) {
        if self.is_destroyed() {
            self.warn_destroyed("detach");
            return;
        }
        self.inner.screen.borrow_mut().detach(surface);
    }

    /// Ask the screen for its saved state
    #[must_use]
    pub fn save_state(&self) -> Option<StateContainer> {
        self.inner.screen.borrow().save_state()
    }

    fn warn_destroyed(&self, operation: &'static str) {
        tracing::warn!(
            screen = %self.inner.key,
            operation,
            "Ignoring call on destroyed screen"
        );
    }
}
