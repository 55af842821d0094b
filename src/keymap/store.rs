//! Shared storage for the key maps of all devices

use super::KeyMap;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Key maps indexed by device name.
///
/// Tables are created empty on first access, so every known device always
/// has a map to operate on.
#[derive(Debug, Default)]
pub struct KeyTables {
    tables: Mutex<HashMap<String, KeyMap>>,
}

impl KeyTables {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, KeyMap>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` on the map of `device` while holding the table lock
    pub fn with_table<R, F>(&self, device: &str, f: F) -> R
    where
        F: FnOnce(&mut KeyMap) -> R,
    {
        let mut tables = self.lock();
        let map = tables.entry(device.to_string()).or_default();
        f(map)
    }

    /// Copy of the current map of `device`
    pub fn snapshot(&self, device: &str) -> KeyMap {
        self.with_table(device, |map| map.clone())
    }

    /// Swap in a complete map for `device`
    pub fn replace(&self, device: &str, map: KeyMap) {
        self.lock().insert(device.to_string(), map);
    }
}
