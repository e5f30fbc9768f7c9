//! Thread-safe id → recorder registry.
//!
//! The OS-level event tap delivers on its own thread through a raw callback;
//! the callback looks its target up here by id instead of touching recorder
//! state through globals. The active-target pointer is mutex-guarded because
//! concurrent tool invocations can race with target switches.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::event_recorder::EventRecorder;

pub type RecorderId = u64;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);
static RECORDERS: Lazy<Mutex<HashMap<RecorderId, Arc<EventRecorder>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));
static ACTIVE: Lazy<Mutex<Option<RecorderId>>> = Lazy::new(|| Mutex::new(None));

/// Register a recorder and make it the active target.
pub fn register(recorder: Arc<EventRecorder>) -> RecorderId {
    let id = NEXT_ID.fetch_add(1, Ordering::SeqCst);
    RECORDERS.lock().unwrap().insert(id, recorder);
    *ACTIVE.lock().unwrap() = Some(id);
    id
}

pub fn unregister(id: RecorderId) {
    RECORDERS.lock().unwrap().remove(&id);
    let mut active = ACTIVE.lock().unwrap();
    if *active == Some(id) {
        *active = None;
    }
}

pub fn lookup(id: RecorderId) -> Option<Arc<EventRecorder>> {
    RECORDERS.lock().unwrap().get(&id).cloned()
}

/// The recorder events should currently be delivered to.
pub fn active() -> Option<Arc<EventRecorder>> {
    let id = (*ACTIVE.lock().unwrap())?;
    lookup(id)
}
