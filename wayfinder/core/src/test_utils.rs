//! Test doubles shared by the unit tests
//!
//! Surfaces are plain `u32` ids and the render parent is `()`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::container::StateContainer;
use crate::flow::{FlowController, FlowEvent, ScreenFactory};
use crate::screen::{Screen, ScreenHandle, ScreenKey};
use crate::transition::{
    SurfaceProvider, TransitionAnimator, TransitionCallback, TransitionError, TransitionFactory,
    TransitionMeta, TransitionRequest,
};

// ============================================================================
// Screens
// ============================================================================

/// Observable screen call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Start(String),
    Stop(String),
    Destroy(String),
    Attach(String, u32),
    Detach(String, u32),
}

/// Shared, ordered log of screen calls
#[derive(Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<Call>>>);

impl CallLog {
    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn attach_count(&self, key: &str) -> usize {
        self.0
            .borrow()
            .iter()
            .filter(|c| matches!(c, Call::Attach(k, _) if k == key))
            .count()
    }

    fn push(&self, call: Call) {
        self.0.borrow_mut().push(call);
    }
}

pub struct RecordingScreen {
    key: String,
    log: CallLog,
    saved: Option<i64>,
}

impl RecordingScreen {
    pub const TYPE_TAG: &'static str = "recording";

    pub fn new(key: &str) -> (Self, CallLog) {
        let log = CallLog::default();
        (Self::with_log(key, &log), log)
    }

    pub fn with_log(key: &str, log: &CallLog) -> Self {
        Self {
            key: key.to_string(),
            log: log.clone(),
            saved: None,
        }
    }

    /// Opt into saved state
    pub fn saving(mut self, value: i64) -> Self {
        self.saved = Some(value);
        self
    }
}

impl Screen<u32> for RecordingScreen {
    fn key(&self) -> ScreenKey {
        ScreenKey::new(self.key.clone())
    }

    fn type_tag(&self) -> &'static str {
        Self::TYPE_TAG
    }

    fn on_start(&mut self) {
        self.log.push(Call::Start(self.key.clone()));
    }

    fn on_stop(&mut self) {
        self.log.push(Call::Stop(self.key.clone()));
    }

    fn on_destroy(&mut self) {
        self.log.push(Call::Destroy(self.key.clone()));
    }

    fn attach(&mut self, surface: &u32) {
        self.log.push(Call::Attach(self.key.clone(), *surface));
    }

    fn detach(&mut self, surface: &u32) {
        self.log.push(Call::Detach(self.key.clone(), *surface));
    }

    fn save_state(&self) -> Option<StateContainer> {
        self.saved.map(|value| {
            StateContainer::new()
                .with("key", self.key.as_str())
                .with("value", value)
        })
    }
}

pub fn screen(key: &str, log: &CallLog) -> ScreenHandle<u32> {
    ScreenHandle::new(RecordingScreen::with_log(key, log))
}

/// Restores [`RecordingScreen`]s, logging into a shared log
pub struct RecordingFactory {
    log: CallLog,
}

impl RecordingFactory {
    pub fn new(log: &CallLog) -> Self {
        Self { log: log.clone() }
    }
}

impl ScreenFactory<u32> for RecordingFactory {
    fn restore_screen(
        &self,
        type_tag: &str,
        state: Option<&StateContainer>,
    ) -> Option<ScreenHandle<u32>> {
        if type_tag != RecordingScreen::TYPE_TAG {
            return None;
        }
        let key = state.and_then(|s| s.get_str("key")).unwrap_or("restored");
        let mut screen = RecordingScreen::with_log(key, &self.log);
        screen.saved = state.and_then(|s| s.get_int("value"));
        Some(ScreenHandle::new(screen))
    }
}

// ============================================================================
// Flow events
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recorded {
    Changed(String, Option<TransitionMeta>),
    Finished,
}

/// Subscribe to a controller and record everything it emits
pub fn record_events<C: FlowController<u32> + ?Sized>(controller: &C) -> Rc<RefCell<Vec<Recorded>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    let _handle = controller.add_listener(Box::new(move |event| {
        let recorded = match event {
            FlowEvent::ScreenChanged { screen, transition } => {
                Recorded::Changed(screen.key().to_string(), *transition)
            }
            FlowEvent::Finished => Recorded::Finished,
        };
        sink.borrow_mut().push(recorded);
    }));
    events
}

// ============================================================================
// Surfaces and transitions
// ============================================================================

/// Hands out increasing surface ids starting at 1
#[derive(Default)]
pub struct CountingProvider {
    next: Cell<u32>,
    released: RefCell<Vec<u32>>,
    failing: Cell<bool>,
}

impl CountingProvider {
    pub fn released(&self) -> Vec<u32> {
        self.released.borrow().clone()
    }

    pub fn provided(&self) -> u32 {
        self.next.get()
    }

    pub fn fail(&self) {
        self.failing.set(true);
    }
}

impl SurfaceProvider<u32, ()> for CountingProvider {
    fn provide(&self, screen: &ScreenHandle<u32>, _parent: &()) -> Result<u32, TransitionError> {
        if self.failing.get() {
            return Err(TransitionError::NoSurface {
                screen: screen.key().clone(),
                reason: "provider failing".to_string(),
            });
        }
        let id = self.next.get() + 1;
        self.next.set(id);
        Ok(id)
    }

    fn release(&self, surface: u32, _parent: &()) {
        self.released.borrow_mut().push(surface);
    }
}

/// A transition that was started and is waiting for the test to drive it
pub struct PendingTransition {
    pub from: String,
    pub to: String,
    pub outgoing: Option<u32>,
    pub transition: Option<TransitionMeta>,
    pub callback: TransitionCallback<u32, ()>,
}

/// Transition factory whose animators never finish on their own
#[derive(Clone, Default)]
pub struct ManualTransitions {
    pending: Rc<RefCell<Vec<PendingTransition>>>,
}

impl ManualTransitions {
    pub fn started(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Take the oldest transition not yet taken
    pub fn take(&self) -> PendingTransition {
        self.pending.borrow_mut().remove(0)
    }
}

struct ManualAnimator {
    pending: Rc<RefCell<Vec<PendingTransition>>>,
}

impl TransitionAnimator<u32, ()> for ManualAnimator {
    fn execute(
        self: Box<Self>,
        request: TransitionRequest<u32, ()>,
        callback: TransitionCallback<u32, ()>,
    ) -> Result<(), TransitionError> {
        self.pending.borrow_mut().push(PendingTransition {
            from: request.from.key().to_string(),
            to: request.to.key().to_string(),
            outgoing: request.outgoing,
            transition: request.transition,
            callback,
        });
        Ok(())
    }
}

impl TransitionFactory<u32, ()> for ManualTransitions {
    fn transition_for(
        &self,
        _from: &ScreenHandle<u32>,
        _to: &ScreenHandle<u32>,
        _transition: Option<TransitionMeta>,
    ) -> Box<dyn TransitionAnimator<u32, ()>> {
        Box::new(ManualAnimator {
            pending: Rc::clone(&self.pending),
        })
    }
}
