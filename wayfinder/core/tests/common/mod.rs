//! Shared doubles for the integration tests
//!
//! Surfaces are `String`s (`"<screen>#<n>"`) so assertions read naturally.
//! The render parent is a `&'static str` naming the host window.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wayfinder_core::{
    FlowController, FlowEvent, Screen, ScreenFactory, ScreenHandle, ScreenKey, StateContainer,
    SurfaceProvider, TransitionAnimator, TransitionCallback, TransitionError, TransitionFactory,
    TransitionMeta, TransitionRequest,
};

pub type Surface = String;
pub type Parent = &'static str;

/// Install a fmt subscriber once; set `RUST_LOG=wayfinder_core=debug` to see
/// the state machines at work
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// Screens
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Start(String),
    Stop(String),
    Destroy(String),
    Attach(String, Surface),
    Detach(String, Surface),
}

#[derive(Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<Event>>>);

impl Journal {
    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn count(&self, wanted: &Event) -> usize {
        self.0.borrow().iter().filter(|e| *e == wanted).count()
    }

    pub fn attaches(&self, key: &str) -> Vec<Surface> {
        self.0
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::Attach(k, surface) if k == key => Some(surface.clone()),
                _ => None,
            })
            .collect()
    }

    /// Screens currently in the started phase, according to the journal
    pub fn started(&self) -> Vec<String> {
        let mut started: Vec<String> = Vec::new();
        for event in self.0.borrow().iter() {
            match event {
                Event::Start(key) => started.push(key.clone()),
                Event::Stop(key) | Event::Destroy(key) => started.retain(|k| k != key),
                Event::Attach(..) | Event::Detach(..) => {}
            }
        }
        started
    }

    fn push(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }
}

pub struct NoteScreen {
    key: String,
    journal: Journal,
    draft: Option<String>,
}

impl NoteScreen {
    pub const TYPE_TAG: &'static str = "note";

    pub fn handle(key: &str, journal: &Journal) -> ScreenHandle<Surface> {
        ScreenHandle::new(Self {
            key: key.to_string(),
            journal: journal.clone(),
            draft: None,
        })
    }

    pub fn with_draft(key: &str, draft: &str, journal: &Journal) -> ScreenHandle<Surface> {
        ScreenHandle::new(Self {
            key: key.to_string(),
            journal: journal.clone(),
            draft: Some(draft.to_string()),
        })
    }
}

impl Screen<Surface> for NoteScreen {
    fn key(&self) -> ScreenKey {
        ScreenKey::new(self.key.clone())
    }

    fn type_tag(&self) -> &'static str {
        Self::TYPE_TAG
    }

    fn on_start(&mut self) {
        self.journal.push(Event::Start(self.key.clone()));
    }

    fn on_stop(&mut self) {
        self.journal.push(Event::Stop(self.key.clone()));
    }

    fn on_destroy(&mut self) {
        self.journal.push(Event::Destroy(self.key.clone()));
    }

    fn attach(&mut self, surface: &Surface) {
        self.journal.push(Event::Attach(self.key.clone(), surface.clone()));
    }

    fn detach(&mut self, surface: &Surface) {
        self.journal.push(Event::Detach(self.key.clone(), surface.clone()));
    }

    fn save_state(&self) -> Option<StateContainer> {
        let mut state = StateContainer::new().with("key", self.key.as_str());
        if let Some(draft) = &self.draft {
            state.insert("draft", draft.as_str());
        }
        Some(state)
    }
}

pub struct NoteFactory {
    pub journal: Journal,
}

impl ScreenFactory<Surface> for NoteFactory {
    fn restore_screen(
        &self,
        type_tag: &str,
        state: Option<&StateContainer>,
    ) -> Option<ScreenHandle<Surface>> {
        if type_tag != NoteScreen::TYPE_TAG {
            return None;
        }
        let state = state?;
        let key = state.get_str("key")?;
        Some(match state.get_str("draft") {
            Some(draft) => NoteScreen::with_draft(key, draft, &self.journal),
            None => NoteScreen::handle(key, &self.journal),
        })
    }
}

// =============================================================================
// Flow events
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Seen {
    Changed(String, Option<TransitionMeta>),
    Finished,
}

pub fn watch<C: FlowController<Surface> + ?Sized>(controller: &C) -> Rc<RefCell<Vec<Seen>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let _handle = controller.add_listener(Box::new(move |event| {
        sink.borrow_mut().push(match event {
            FlowEvent::ScreenChanged { screen, transition } => {
                Seen::Changed(screen.key().to_string(), *transition)
            }
            FlowEvent::Finished => Seen::Finished,
        });
    }));
    seen
}

// =============================================================================
// Surfaces and animations
// =============================================================================

#[derive(Default)]
pub struct SurfacePool {
    issued: Cell<u32>,
    released: RefCell<Vec<Surface>>,
}

impl SurfacePool {
    pub fn released(&self) -> Vec<Surface> {
        self.released.borrow().clone()
    }

    pub fn issued(&self) -> u32 {
        self.issued.get()
    }
}

impl SurfaceProvider<Surface, Parent> for SurfacePool {
    fn provide(
        &self,
        screen: &ScreenHandle<Surface>,
        parent: &Parent,
    ) -> Result<Surface, TransitionError> {
        if parent.is_empty() {
            return Err(TransitionError::NoSurface {
                screen: screen.key().clone(),
                reason: "no window".to_string(),
            });
        }
        let n = self.issued.get() + 1;
        self.issued.set(n);
        Ok(format!("{}#{n}", screen.key()))
    }

    fn release(&self, surface: Surface, _parent: &Parent) {
        self.released.borrow_mut().push(surface);
    }
}

/// An animation waiting for the test to play it
pub struct Running {
    pub request: TransitionRequest<Surface, Parent>,
    pub callback: TransitionCallback<Surface, Parent>,
}

impl Running {
    /// Build the incoming surface the way a real animator would
    pub fn incoming(&self) -> Surface {
        self.request
            .provide_incoming()
            .unwrap_or_else(|err| panic!("incoming surface: {err}"))
    }
}

/// Animator factory whose animations only advance when the test says so
#[derive(Clone, Default)]
pub struct Stage {
    running: Rc<RefCell<Vec<Running>>>,
}

impl Stage {
    pub fn count(&self) -> usize {
        self.running.borrow().len()
    }

    pub fn next(&self) -> Running {
        self.running.borrow_mut().remove(0)
    }
}

struct StagedAnimation {
    running: Rc<RefCell<Vec<Running>>>,
}

impl TransitionAnimator<Surface, Parent> for StagedAnimation {
    fn execute(
        self: Box<Self>,
        request: TransitionRequest<Surface, Parent>,
        callback: TransitionCallback<Surface, Parent>,
    ) -> Result<(), TransitionError> {
        self.running.borrow_mut().push(Running { request, callback });
        Ok(())
    }
}

impl TransitionFactory<Surface, Parent> for Stage {
    fn transition_for(
        &self,
        _from: &ScreenHandle<Surface>,
        _to: &ScreenHandle<Surface>,
        _transition: Option<TransitionMeta>,
    ) -> Box<dyn TransitionAnimator<Surface, Parent>> {
        Box::new(StagedAnimation {
            running: Rc::clone(&self.running),
        })
    }
}
