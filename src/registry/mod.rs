//! Device registry abstraction
//!
//! Physical remotes are owned by a device administrator outside this crate.
//! The remote-control surface only needs a small capability set from it,
//! which is captured by [`DeviceRegistry`].

pub mod memory;

pub use memory::InMemoryRegistry;

use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Device not found: {0}")]
    NotFound(String),

    #[error("Device '{device}' reported an error: {reason}")]
    Device { device: String, reason: String },

    #[error("Pairing failed for '{device}': {reason}")]
    Pairing { device: String, reason: String },
}

/// A physical input producer known to the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Producer {
    pub name: String,
    /// Free-form description supplied by the driver
    pub metadata: String,
}

/// Capabilities required from the device administrator
pub trait DeviceRegistry: Send + Sync {
    /// All registered physical producers
    fn producers(&self) -> Vec<Producer>;

    /// Current error state of a producer
    fn error(&self, device: &str) -> Result<(), RegistryError>;

    /// Start pairing a producer with a new remote
    fn pair(&self, device: &str) -> Result<(), RegistryError>;

    /// Remove the binding identified by `binding_id`
    fn unpair(&self, device: &str, binding_id: &str) -> Result<(), RegistryError>;

    /// Whether a producer with this name is registered
    fn contains(&self, device: &str) -> bool {
        self.producers().iter().any(|p| p.name == device)
    }
}

impl<T: DeviceRegistry + ?Sized> DeviceRegistry for Arc<T> {
    fn producers(&self) -> Vec<Producer> {
        (**self).producers()
    }

    fn error(&self, device: &str) -> Result<(), RegistryError> {
        (**self).error(device)
    }

    fn pair(&self, device: &str) -> Result<(), RegistryError> {
        (**self).pair(device)
    }

    fn unpair(&self, device: &str, binding_id: &str) -> Result<(), RegistryError> {
        (**self).unpair(device, binding_id)
    }

    fn contains(&self, device: &str) -> bool {
        (**self).contains(device)
    }
}
