//! Backend abstraction for key event injection
//!
//! This module provides a unified interface for handing translated key
//! events to whatever delivers them to the system.

pub mod channel_keyboard;
pub mod mock_keyboard;

pub use channel_keyboard::ChannelKeyboardBackend;
pub use mock_keyboard::MockKeyboardBackend;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend operation failed: {0}")]
    Operation(String),

    #[error("Event receiver disconnected")]
    Disconnected,
}

/// A translated key, ready to be injected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStroke {
    /// Device the scan code came from
    pub device: String,
    /// Raw scan code
    pub code: u16,
    /// Logical key from the device's key map
    pub key: u32,
    /// Modifier mask from the device's key map
    pub modifiers: u16,
}

/// A key going down (`pressed`) or up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub pressed: bool,
    pub stroke: KeyStroke,
}

/// Unified backend interface for keyboard operations
pub trait KeyboardBackend {
    /// Press a key (key down event)
    fn key_down(&self, stroke: &KeyStroke) -> Result<(), BackendError>;

    /// Release a key (key up event)
    fn key_up(&self, stroke: &KeyStroke) -> Result<(), BackendError>;

    /// Press and release a key. The release is skipped if the press fails.
    fn key_press(&self, stroke: &KeyStroke) -> Result<(), BackendError> {
        self.key_down(stroke)?;
        self.key_up(stroke)?;
        Ok(())
    }
}
