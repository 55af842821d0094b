//! Keyboard backend that forwards events over a channel.
//!
//! Used by the standalone server: the RPC side produces events and a
//! dedicated thread consumes them.

use super::{BackendError, KeyEvent, KeyStroke, KeyboardBackend};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::trace;

#[derive(Clone, Debug)]
pub struct ChannelKeyboardBackend {
    sender: Sender<KeyEvent>,
}

impl ChannelKeyboardBackend {
    /// Create a backend and the receiving end of its bounded queue
    pub fn new(capacity: usize) -> (Self, Receiver<KeyEvent>) {
        let (sender, receiver) = bounded(capacity);
        (Self { sender }, receiver)
    }

    fn forward(&self, pressed: bool, stroke: &KeyStroke) -> Result<(), BackendError> {
        trace!("forwarding {} for {} code {:#06x}", if pressed { "down" } else { "up" }, stroke.device, stroke.code);
        self.sender
            .send(KeyEvent {
                pressed,
                stroke: stroke.clone(),
            })
            .map_err(|_| BackendError::Disconnected)
    }
}

impl KeyboardBackend for ChannelKeyboardBackend {
    fn key_down(&self, stroke: &KeyStroke) -> Result<(), BackendError> {
        self.forward(true, stroke)
    }

    fn key_up(&self, stroke: &KeyStroke) -> Result<(), BackendError> {
        self.forward(false, stroke)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order() {
        let (backend, receiver) = ChannelKeyboardBackend::new(4);
        let stroke = KeyStroke {
            device: "IR".to_string(),
            code: 1,
            key: 2,
            modifiers: 0,
        };

        backend.key_press(&stroke).unwrap();
        assert!(receiver.recv().unwrap().pressed);
        assert!(!receiver.recv().unwrap().pressed);
    }

    #[test]
    fn test_disconnected_receiver() {
        let (backend, receiver) = ChannelKeyboardBackend::new(1);
        drop(receiver);

        let stroke = KeyStroke {
            device: "IR".to_string(),
            code: 1,
            key: 2,
            modifiers: 0,
        };
        assert!(matches!(backend.key_down(&stroke), Err(BackendError::Disconnected)));
    }
}
