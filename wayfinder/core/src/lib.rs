//! Wayfinder Core - Screen Navigation and Presentation Orchestration
//!
//! This crate decides which logical screen is current, drives screen
//! lifecycles, and coordinates handing a render surface from the outgoing
//! screen to the incoming one, including transition animations that may
//! still be running when the next navigation arrives. It never draws
//! anything: surfaces and animations belong to the host's rendering layer.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Host UI                                  │
//! │   on_start / on_stop / on_destroy / on_back_pressed               │
//! │   ui_visible / ui_not_visible                                     │
//! └───────────────┬─────────────────────────────────┬────────────────┘
//!                 │                                 │
//! ┌───────────────┼─────────────────────────────────┼────────────────┐
//! │               ▼        WAYFINDER CORE           ▼                │
//! │  ┌──────────────────────────┐  ScreenChanged  ┌────────────────┐ │
//! │  │      Flow Controller     │ ──────────────► │  Transition    │ │
//! │  │ stack / single / replace │    Finished     │  Orchestrator  │ │
//! │  │        / parallel        │ ──────────────► │                │ │
//! │  └────────────┬─────────────┘                 └───────┬────────┘ │
//! │               │ start / stop / destroy                │ attach   │
//! │               ▼                                       ▼ detach   │
//! │         ┌──────────┐                     ┌──────────────────────┐│
//! │         │ Screens  │ ◄────────────────── │ SurfaceProvider /    ││
//! │         └──────────┘                     │ TransitionAnimator   ││
//! │                                          └──────────────────────┘│
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Screen`] / [`ScreenHandle`]: a unit of presentable content
//! - [`FlowController`]: owns screens and decides which one is current
//! - [`TransitionOrchestrator`]: reconciles visibility, destinations and
//!   in-flight animations
//! - [`NavigationHost`]: wires one root flow to one orchestrator
//! - [`StateContainer`]: serializable snapshot used by `save_state`/`restore`
//!
//! # Threading
//!
//! Everything runs on the single UI thread. Types use `Rc` and `RefCell`
//! and are neither `Send` nor `Sync`. Listener callbacks may call straight
//! back into the controller that notified them.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod container;
pub mod flow;
pub mod host;
pub mod orchestrator;
pub mod screen;
pub mod transition;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-exports for convenience
pub use container::{StateContainer, StateEntry, StateError, StateValue};
pub use flow::{
    BranchFactory, FlowController, FlowError, FlowEvent, FlowLifecycle, FlowListener, FlowState,
    ListenerHandle, ParallelController, ReplacingController, ScreenFactory, SingleController,
    StackController,
};
pub use host::NavigationHost;
pub use orchestrator::{PresentationPhase, TransitionOrchestrator};
pub use screen::{Screen, ScreenHandle, ScreenKey, ScreenPhase};
pub use transition::{
    Destination, ImmediateTransition, ImmediateTransitions, SurfaceProvider, TransitionAnimator,
    TransitionCallback, TransitionError, TransitionFactory, TransitionMeta, TransitionRequest,
};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, NavigationConfig, NavigationToml,
};
