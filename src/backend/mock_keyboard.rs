//! Mock keyboard backend for testing.
//!
//! This backend logs keyboard events instead of injecting them and keeps a
//! record of every event it accepted, so tests can check exactly what was
//! sent. Clones share the same record.

use super::{BackendError, KeyEvent, KeyStroke, KeyboardBackend};
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Mock keyboard backend that logs and records events instead of sending them.
#[derive(Clone, Debug, Default)]
pub struct MockKeyboardBackend {
    events: Arc<Mutex<Vec<KeyEvent>>>,
    fail_down: Arc<AtomicBool>,
    fail_up: Arc<AtomicBool>,
}

impl MockKeyboardBackend {
    /// Create a new mock keyboard backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent key down events fail
    pub fn fail_presses(&self, fail: bool) {
        self.fail_down.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent key up events fail
    pub fn fail_releases(&self, fail: bool) {
        self.fail_up.store(fail, Ordering::SeqCst);
    }

    /// Events accepted so far, oldest first
    pub fn events(&self) -> Vec<KeyEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn record(&self, pressed: bool, stroke: &KeyStroke) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(KeyEvent {
                pressed,
                stroke: stroke.clone(),
            });
    }
}

impl KeyboardBackend for MockKeyboardBackend {
    fn key_down(&self, stroke: &KeyStroke) -> Result<(), BackendError> {
        if self.fail_down.load(Ordering::SeqCst) {
            return Err(BackendError::Operation(format!("key down {:#06x} refused", stroke.code)));
        }
        info!("[MOCK KEYBOARD] Key DOWN: {} code {:#06x} -> key {:#06x}", stroke.device, stroke.code, stroke.key);
        self.record(true, stroke);
        Ok(())
    }

    fn key_up(&self, stroke: &KeyStroke) -> Result<(), BackendError> {
        if self.fail_up.load(Ordering::SeqCst) {
            return Err(BackendError::Operation(format!("key up {:#06x} refused", stroke.code)));
        }
        info!("[MOCK KEYBOARD] Key UP: {} code {:#06x} -> key {:#06x}", stroke.device, stroke.code, stroke.key);
        self.record(false, stroke);
        Ok(())
    }
}
