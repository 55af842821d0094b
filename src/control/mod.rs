//! Remote-control surface
//!
//! [`RemoteControl`] validates requests, classifies the addressed device as
//! virtual or physical, and translates key map, registry and backend
//! outcomes into the small [`ErrorCode`] taxonomy. It keeps no state of its
//! own beyond the virtual device names and the persistence directory.

pub mod params;

pub use params::{DeviceInfo, DeviceParams, KeyActionParams, KeyInfo, KeyParams, UnpairParams};

use crate::backend::{BackendError, KeyStroke, KeyboardBackend};
use crate::config::Config;
use crate::keymap::{modifiers, KeyMap, KeyTables};
use crate::registry::DeviceRegistry;
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Outcome of a failed operation, with the host framework's error numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ErrorCode {
    #[error("General error")]
    General,

    #[error("Unavailable item")]
    Unavailable,

    #[error("Opening failed")]
    OpeningFailed,

    #[error("Unknown key")]
    UnknownKey,

    #[error("Bad request")]
    BadRequest,
}

impl ErrorCode {
    pub fn code(self) -> i32 {
        match self {
            ErrorCode::General => 1,
            ErrorCode::Unavailable => 2,
            ErrorCode::OpeningFailed => 6,
            ErrorCode::UnknownKey => 22,
            ErrorCode::BadRequest => 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceKind {
    Virtual,
    Physical,
}

/// Remote-control adapter over a device registry, a key event backend and
/// the shared key tables
pub struct RemoteControl<R, K>
where
    R: DeviceRegistry,
    K: KeyboardBackend,
{
    registry: R,
    keyboard: K,
    tables: Arc<KeyTables>,
    virtual_devices: Vec<String>,
    persistent_path: Option<PathBuf>,
}

impl<R, K> RemoteControl<R, K>
where
    R: DeviceRegistry,
    K: KeyboardBackend,
{
    /// Create an adapter with its own, empty key tables
    pub fn new(registry: R, keyboard: K, virtual_devices: Vec<String>, persistent_path: Option<PathBuf>) -> Self {
        Self {
            registry,
            keyboard,
            tables: Arc::new(KeyTables::new()),
            virtual_devices,
            persistent_path,
        }
    }

    /// Create an adapter from the virtual devices and persistence settings of `config`
    pub fn from_config(config: &Config, registry: R, keyboard: K) -> Self {
        Self::new(
            registry,
            keyboard,
            config.virtual_names(),
            config.settings.persistent_path.clone(),
        )
    }

    pub fn tables(&self) -> &Arc<KeyTables> {
        &self.tables
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn keyboard(&self) -> &K {
        &self.keyboard
    }

    /// Load the initial key map of every known device.
    ///
    /// A persisted map wins over the configured map file. Devices without
    /// either keep an empty map. Returns the number of maps loaded.
    pub fn initialize(&self, config: &Config) -> usize {
        let mut loaded = 0;

        for device in self.devices() {
            let source = self
                .persisted_file(&device)
                .filter(|path| path.is_file())
                .or_else(|| config.mapfile_for(&device).map(Path::to_path_buf));

            let Some(path) = source else {
                debug!("No key map for '{}'", device);
                continue;
            };

            let mut map = KeyMap::new();
            match map.load(&path) {
                Ok(_) => {
                    self.tables.replace(&device, map);
                    loaded += 1;
                }
                Err(e) => warn!("Skipping key map {} for '{}': {}", path.display(), device, e),
            }
        }

        info!("Initialized key maps for {} device(s)", loaded);
        loaded
    }

    /// Virtual device names followed by every registered producer
    pub fn devices(&self) -> Vec<String> {
        let mut names = self.virtual_devices.clone();
        names.extend(self.registry.producers().into_iter().map(|p| p.name));
        names
    }

    /// Name and metadata of a physical device.
    ///
    /// `Ok(None)` when the registry reports the device in an error state.
    pub fn device_info(&self, params: &DeviceParams) -> Result<Option<DeviceInfo>, ErrorCode> {
        let device = params.validate()?;

        match self.resolve(device)? {
            DeviceKind::Virtual => Err(ErrorCode::General),
            DeviceKind::Physical => {
                if let Err(e) = self.registry.error(device) {
                    debug!("No metadata for '{}': {}", device, e);
                    return Ok(None);
                }
                Ok(self
                    .registry
                    .producers()
                    .into_iter()
                    .find(|p| p.name == device)
                    .map(|p| DeviceInfo {
                        name: p.name,
                        metadata: p.metadata,
                    }))
            }
        }
    }

    /// Current translation of a scan code
    pub fn key_mapping(&self, params: &KeyParams) -> Result<KeyInfo, ErrorCode> {
        let (device, code) = params.validate()?;
        self.resolve(device)?;

        let info = self
            .tables
            .with_table(device, |map| map.get(code).copied())
            .ok_or(ErrorCode::UnknownKey)?;

        let modifiers = modifiers::expand(info.modifiers).map_err(|e| {
            warn!("Corrupt mapping for '{}' code {:#06x}: {}", device, code, e);
            ErrorCode::General
        })?;

        Ok(KeyInfo {
            code,
            key: info.key,
            modifiers,
        })
    }

    pub fn delete_mapping(&self, params: &KeyParams) -> Result<(), ErrorCode> {
        let (device, code) = params.validate()?;
        self.resolve(device)?;

        if self.tables.with_table(device, |map| map.delete(code)) {
            debug!("Deleted mapping '{}' code {:#06x}", device, code);
            Ok(())
        } else {
            Err(ErrorCode::UnknownKey)
        }
    }

    pub fn modify_mapping(&self, params: &KeyActionParams) -> Result<(), ErrorCode> {
        let action = params.validate()?;
        self.resolve(action.device)?;

        if self
            .tables
            .with_table(action.device, |map| map.modify(action.code, action.key, action.modifiers))
        {
            Ok(())
        } else {
            Err(ErrorCode::UnknownKey)
        }
    }

    /// Insert a new mapping. A rejected insertion is reported as `UnknownKey`.
    pub fn add_mapping(&self, params: &KeyActionParams) -> Result<(), ErrorCode> {
        let action = params.validate()?;
        self.resolve(action.device)?;

        if self
            .tables
            .with_table(action.device, |map| map.add(action.code, action.key, action.modifiers))
        {
            Ok(())
        } else {
            Err(ErrorCode::UnknownKey)
        }
    }

    pub fn pair(&self, params: &DeviceParams) -> Result<(), ErrorCode> {
        let device = params.validate()?;
        self.require_physical(device)?;

        self.registry.pair(device).map_err(|e| {
            warn!("Pairing '{}' failed: {}", device, e);
            ErrorCode::General
        })
    }

    pub fn unpair(&self, params: &UnpairParams) -> Result<(), ErrorCode> {
        let (device, binding_id) = params.validate()?;
        self.require_physical(device)?;

        self.registry.unpair(device, binding_id).map_err(|e| {
            warn!("Unpairing '{}' failed: {}", device, e);
            ErrorCode::General
        })
    }

    /// Press followed by release. No release is sent when the press fails.
    pub fn send_key(&self, params: &KeyActionParams) -> Result<(), ErrorCode> {
        let action = params.validate()?;
        self.resolve(action.device)?;

        let stroke = self.stroke(action.device, action.code)?;
        self.inject(&stroke, |keyboard, stroke| keyboard.key_press(stroke))
    }

    pub fn press_key(&self, params: &KeyActionParams) -> Result<(), ErrorCode> {
        let action = params.validate()?;
        self.resolve(action.device)?;

        let stroke = self.stroke(action.device, action.code)?;
        self.inject(&stroke, |keyboard, stroke| keyboard.key_down(stroke))
    }

    pub fn release_key(&self, params: &KeyActionParams) -> Result<(), ErrorCode> {
        let action = params.validate()?;
        self.resolve(action.device)?;

        let stroke = self.stroke(action.device, action.code)?;
        self.inject(&stroke, |keyboard, stroke| keyboard.key_up(stroke))
    }

    /// Write the device's key map to `<persistent_path>/<device>.json`
    pub fn save_mapping(&self, params: &DeviceParams) -> Result<(), ErrorCode> {
        let device = params.validate()?;
        self.resolve(device)?;

        let directory = self.persistent_path.as_deref().ok_or_else(|| {
            warn!("Cannot save '{}': no persistent path configured", device);
            ErrorCode::General
        })?;

        fs::create_dir_all(directory).map_err(|e| {
            warn!("Cannot create {}: {}", directory.display(), e);
            ErrorCode::General
        })?;

        let file = directory.join(format!("{}.json", device));
        self.tables.snapshot(device).save(&file).map_err(|e| {
            warn!("Cannot save '{}': {}", device, e);
            ErrorCode::General
        })
    }

    /// Replace the device's key map with `<persistent_path>/<device>.json`
    pub fn load_mapping(&self, params: &DeviceParams) -> Result<(), ErrorCode> {
        let device = params.validate()?;
        self.resolve(device)?;

        let file = self
            .persisted_file(device)
            .filter(|path| path.is_file())
            .ok_or(ErrorCode::OpeningFailed)?;

        let mut map = KeyMap::new();
        map.load(&file).map_err(|e| {
            warn!("Cannot load '{}': {}", device, e);
            ErrorCode::General
        })?;
        self.tables.replace(device, map);
        Ok(())
    }

    fn persisted_file(&self, device: &str) -> Option<PathBuf> {
        self.persistent_path
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", device)))
    }

    fn is_virtual(&self, device: &str) -> bool {
        self.virtual_devices.iter().any(|name| name == device)
    }

    /// Virtual names take precedence over registry producers
    fn resolve(&self, device: &str) -> Result<DeviceKind, ErrorCode> {
        if self.is_virtual(device) {
            Ok(DeviceKind::Virtual)
        } else if self.registry.contains(device) {
            Ok(DeviceKind::Physical)
        } else {
            debug!("Unknown device '{}'", device);
            Err(ErrorCode::Unavailable)
        }
    }

    fn require_physical(&self, device: &str) -> Result<(), ErrorCode> {
        match self.resolve(device)? {
            DeviceKind::Physical => Ok(()),
            DeviceKind::Virtual => Err(ErrorCode::Unavailable),
        }
    }

    /// Translate `code` through the device's key map
    fn stroke(&self, device: &str, code: u16) -> Result<KeyStroke, ErrorCode> {
        let info = self
            .tables
            .with_table(device, |map| map.get(code).copied())
            .ok_or_else(|| {
                debug!("No mapping for '{}' code {:#06x}", device, code);
                ErrorCode::UnknownKey
            })?;

        Ok(KeyStroke {
            device: device.to_string(),
            code,
            key: info.key,
            modifiers: info.modifiers,
        })
    }

    fn inject<F>(&self, stroke: &KeyStroke, event: F) -> Result<(), ErrorCode>
    where
        F: FnOnce(&K, &KeyStroke) -> Result<(), BackendError>,
    {
        event(&self.keyboard, stroke).map_err(|e| {
            warn!("Key event for '{}' code {:#06x} failed: {}", stroke.device, stroke.code, e);
            ErrorCode::General
        })
    }
}
