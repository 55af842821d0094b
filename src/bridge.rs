//! Message bridge between a scripting context and a media-player library
//!
//! The player exchanges opaque strings with the page: one outbound call to
//! send a message, and one listener that the player invokes for every
//! message it produces. Only the first listener registration takes effect.

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Callback receiving messages from the player
pub type Listener = Box<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("Player library is not available")]
    LibraryUnavailable,

    #[error("A message listener is already registered")]
    AlreadyRegistered,

    #[error("Player library rejected the listener")]
    Rejected,
}

/// Entry points exported by a player library
pub trait PlayerLibrary: Send + Sync {
    /// Install the callback for player-originated messages
    fn register_message_listener(&self, listener: Listener) -> bool;

    /// Hand a message to the player and return its reply
    fn send_message(&self, message: &str) -> String;
}

/// Forwards strings between the page and a player library
pub struct MessageBridge<L: PlayerLibrary> {
    library: Option<L>,
    registered: AtomicBool,
}

impl<L: PlayerLibrary> MessageBridge<L> {
    /// `None` stands for a library that failed to load
    pub fn new(library: Option<L>) -> Self {
        if library.is_none() {
            error!("Player library failed to load, messages will be dropped");
        }
        Self {
            library,
            registered: AtomicBool::new(false),
        }
    }

    pub fn is_available(&self) -> bool {
        self.library.is_some()
    }

    /// Register the page's listener. Later registrations are refused.
    pub fn register_listener(&self, listener: Listener) -> Result<(), BridgeError> {
        let library = self.library.as_ref().ok_or(BridgeError::LibraryUnavailable)?;

        if self.registered.swap(true, Ordering::SeqCst) {
            debug!("Ignoring second message listener");
            return Err(BridgeError::AlreadyRegistered);
        }

        if !library.register_message_listener(listener) {
            self.registered.store(false, Ordering::SeqCst);
            return Err(BridgeError::Rejected);
        }

        info!("Message listener registered");
        Ok(())
    }

    /// Forward a message to the player
    pub fn send(&self, message: &str) -> Result<String, BridgeError> {
        let library = self.library.as_ref().ok_or(BridgeError::LibraryUnavailable)?;
        debug!("Sending {} byte message to player", message.len());
        Ok(library.send_message(message))
    }
}

/// Loopback player backed by channels.
///
/// Messages sent by the page are queued on [`outbound`](Self::outbound);
/// [`deliver`](Self::deliver) plays the role of the player emitting a message.
#[derive(Clone)]
pub struct ChannelPlayer {
    sender: Sender<String>,
    receiver: Receiver<String>,
    listener: Arc<Mutex<Option<Listener>>>,
}

impl ChannelPlayer {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            listener: Arc::new(Mutex::new(None)),
        }
    }

    /// Messages the page has sent, in order
    pub fn outbound(&self) -> &Receiver<String> {
        &self.receiver
    }

    /// Emit a message towards the page. Returns false without a listener.
    pub fn deliver(&self, message: &str) -> bool {
        let guard = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(listener) => {
                listener(message);
                true
            }
            None => false,
        }
    }
}

impl Default for ChannelPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerLibrary for ChannelPlayer {
    fn register_message_listener(&self, listener: Listener) -> bool {
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(listener);
        true
    }

    fn send_message(&self, message: &str) -> String {
        match self.sender.send(message.to_string()) {
            Ok(()) => String::new(),
            Err(e) => e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RefusingPlayer;

    impl PlayerLibrary for RefusingPlayer {
        fn register_message_listener(&self, _listener: Listener) -> bool {
            false
        }

        fn send_message(&self, _message: &str) -> String {
            String::new()
        }
    }

    #[test]
    fn test_messages_flow_both_ways() {
        let player = ChannelPlayer::new();
        let bridge = MessageBridge::new(Some(player.clone()));

        let (tx, rx) = unbounded();
        bridge
            .register_listener(Box::new(move |msg: &str| {
                let _ = tx.send(msg.to_string());
            }))
            .unwrap();

        bridge.send("{\"cmd\":\"play\"}").unwrap();
        assert_eq!(player.outbound().try_recv().unwrap(), "{\"cmd\":\"play\"}");

        assert!(player.deliver("state:playing"));
        assert_eq!(rx.try_recv().unwrap(), "state:playing");
    }

    #[test]
    fn test_only_first_listener_is_kept() {
        let bridge = MessageBridge::new(Some(ChannelPlayer::new()));
        assert!(bridge.register_listener(Box::new(|_: &str| {})).is_ok());
        assert_eq!(bridge.register_listener(Box::new(|_: &str| {})), Err(BridgeError::AlreadyRegistered));
    }

    #[test]
    fn test_missing_library() {
        let bridge: MessageBridge<ChannelPlayer> = MessageBridge::new(None);
        assert!(!bridge.is_available());
        assert_eq!(bridge.send("x"), Err(BridgeError::LibraryUnavailable));
        assert_eq!(bridge.register_listener(Box::new(|_: &str| {})), Err(BridgeError::LibraryUnavailable));
    }

    #[test]
    fn test_rejected_listener_can_retry() {
        let bridge = MessageBridge::new(Some(RefusingPlayer));
        assert_eq!(bridge.register_listener(Box::new(|_: &str| {})), Err(BridgeError::Rejected));
        assert_eq!(bridge.register_listener(Box::new(|_: &str| {})), Err(BridgeError::Rejected));
    }

    #[test]
    fn test_deliver_without_listener() {
        assert!(!ChannelPlayer::new().deliver("ignored"));
    }
}
