//! Request parameters and results of the remote-control operations
//!
//! Every field of a request is optional on the wire. Presence and shape are
//! checked by the `validate` helpers before any device lookup happens.

use super::ErrorCode;
use crate::keymap::{self, modifiers, Modifier, ModifierError};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{device}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceParams {
    #[serde(default)]
    pub device: Option<String>,
}

/// `{device, code}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyParams {
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub code: Option<u16>,
}

/// `{device, code, key, modifiers}`
///
/// `key` may be a number or a decimal/hex string, `modifiers` a list of
/// modifier names or their numeric values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyActionParams {
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub key: Option<Value>,
    #[serde(default)]
    pub modifiers: Option<Vec<Value>>,
}

/// `{device, bindingId}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnpairParams {
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default, rename = "bindingId", alias = "bindid")]
    pub binding_id: Option<String>,
}

/// Result of a device query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub metadata: String,
}

/// Result of a key mapping query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo {
    pub code: u16,
    pub key: u32,
    pub modifiers: Vec<Modifier>,
}

/// A fully validated key action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KeyAction<'a> {
    pub device: &'a str,
    pub code: u16,
    pub key: u32,
    pub modifiers: u16,
}

impl DeviceParams {
    pub fn new(device: &str) -> Self {
        Self {
            device: Some(device.to_string()),
        }
    }

    pub(crate) fn validate(&self) -> Result<&str, ErrorCode> {
        self.device.as_deref().ok_or(ErrorCode::BadRequest)
    }
}

impl KeyParams {
    pub fn new(device: &str, code: u16) -> Self {
        Self {
            device: Some(device.to_string()),
            code: Some(code),
        }
    }

    pub(crate) fn validate(&self) -> Result<(&str, u16), ErrorCode> {
        match (self.device.as_deref(), self.code) {
            (Some(device), Some(code)) if code != 0 => Ok((device, code)),
            _ => Err(ErrorCode::BadRequest),
        }
    }
}

impl KeyActionParams {
    pub fn new(device: &str, code: u16, key: u32, modifiers: &[Modifier]) -> Self {
        Self {
            device: Some(device.to_string()),
            code: Some(code),
            key: Some(Value::from(key)),
            modifiers: Some(modifiers.iter().map(|m| Value::from(m.name())).collect()),
        }
    }

    pub(crate) fn validate(&self) -> Result<KeyAction<'_>, ErrorCode> {
        let (device, code) = match (self.device.as_deref(), self.code) {
            (Some(device), Some(code)) if code != 0 => (device, code),
            _ => return Err(ErrorCode::BadRequest),
        };
        let key = self
            .key
            .as_ref()
            .ok_or(ErrorCode::BadRequest)
            .and_then(|value| {
                parse_key(value).ok_or_else(|| {
                    debug!("Rejecting key {}", value);
                    ErrorCode::BadRequest
                })
            })?;
        let flags = self.modifiers.as_ref().ok_or(ErrorCode::BadRequest)?;

        let mut parsed = Vec::with_capacity(flags.len());
        for flag in flags {
            let modifier = parse_modifier(flag).map_err(|e| {
                debug!("Rejecting modifiers: {}", e);
                ErrorCode::BadRequest
            })?;
            parsed.push(modifier);
        }

        Ok(KeyAction {
            device,
            code,
            key,
            modifiers: modifiers::reduce(parsed),
        })
    }
}

impl UnpairParams {
    pub fn new(device: &str, binding_id: &str) -> Self {
        Self {
            device: Some(device.to_string()),
            binding_id: Some(binding_id.to_string()),
        }
    }

    pub(crate) fn validate(&self) -> Result<(&str, &str), ErrorCode> {
        match (self.device.as_deref(), self.binding_id.as_deref()) {
            (Some(device), Some(binding)) => Ok((device, binding)),
            _ => Err(ErrorCode::BadRequest),
        }
    }
}

fn parse_key(value: &Value) -> Option<u32> {
    let raw = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => keymap::parse_number(s)?,
        _ => return None,
    };
    u32::try_from(raw).ok()
}

fn parse_modifier(value: &Value) -> Result<Modifier, ModifierError> {
    match value {
        Value::String(s) => s.parse(),
        Value::Number(n) => match n.as_u64() {
            Some(raw) => Modifier::from_value(raw),
            None => Err(ModifierError::UnknownName(n.to_string())),
        },
        other => Err(ModifierError::UnknownName(other.to_string())),
    }
}
