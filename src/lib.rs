//! remote-control-rs: JSON-RPC remote control surface
//!
//! This library maps raw remote-control scan codes to logical keys per
//! device, injects key events, pairs physical remotes and persists key maps,
//! all behind a JSON-RPC method table.

pub mod backend;
pub mod bridge;
pub mod config;
pub mod control;
pub mod keymap;
pub mod registry;
pub mod rpc;

// Re-export commonly used items
pub use backend::{KeyboardBackend, MockKeyboardBackend};
pub use config::Config;
pub use control::{ErrorCode, RemoteControl};
pub use keymap::{KeyMap, KeyTables, Modifier};
pub use registry::{DeviceRegistry, InMemoryRegistry};
pub use rpc::JsonRpcDispatcher;
