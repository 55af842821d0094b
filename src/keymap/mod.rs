//! Per-device key maps
//!
//! A key map translates a raw scan code reported by a remote into the
//! logical key that is injected into the system, together with the modifier
//! flags that accompany it. Maps are persisted as JSON arrays:
//!
//! ```json
//! [
//!   { "code": "0x0016", "key": "0x001c", "modifiers": ["leftshift"] }
//! ]
//! ```

pub mod modifiers;
pub mod store;

pub use modifiers::{Modifier, ModifierError};
pub use store::KeyTables;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyMapError {
    #[error("Failed to access key map file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse key map file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid key map: {0}")]
    Invalid(String),
}

/// Translation target of a single scan code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionInfo {
    /// Logical key code
    pub key: u32,
    /// Modifier mask, see [`modifiers`]
    pub modifiers: u16,
}

/// Scan code to key translation table of one device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyMap {
    entries: BTreeMap<u16, ConversionInfo>,
}

impl KeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the translation for a scan code
    pub fn get(&self, code: u16) -> Option<&ConversionInfo> {
        self.entries.get(&code)
    }

    /// Insert a new mapping. Fails when the code is already mapped, is zero,
    /// or the mask carries unknown bits.
    pub fn add(&mut self, code: u16, key: u32, modifiers: u16) -> bool {
        if code == 0 || self.entries.contains_key(&code) {
            return false;
        }
        if modifiers::validate_mask(modifiers).is_err() {
            return false;
        }
        self.entries.insert(code, ConversionInfo { key, modifiers });
        true
    }

    /// Change an existing mapping. Never creates one.
    pub fn modify(&mut self, code: u16, key: u32, modifiers: u16) -> bool {
        if modifiers::validate_mask(modifiers).is_err() {
            return false;
        }
        match self.entries.get_mut(&code) {
            Some(info) => {
                info.key = key;
                info.modifiers = modifiers;
                true
            }
            None => false,
        }
    }

    /// Remove a mapping, returning whether one existed
    pub fn delete(&mut self, code: u16) -> bool {
        self.entries.remove(&code).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the mappings ordered by scan code
    pub fn iter(&self) -> impl Iterator<Item = (u16, &ConversionInfo)> {
        self.entries.iter().map(|(code, info)| (*code, info))
    }

    /// Replace the contents of this map with the mappings stored in `path`.
    ///
    /// The map is left untouched when the file cannot be read or is invalid.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<usize, KeyMapError> {
        let path_ref = path.as_ref();
        debug!("Loading key map from: {}", path_ref.display());

        let content = fs::read_to_string(path_ref)?;
        let entries: Vec<KeyMapEntry> = serde_json::from_str(&content)?;

        let mut table = BTreeMap::new();
        for entry in entries {
            let code = entry
                .code
                .value()
                .and_then(|v| u16::try_from(v).ok())
                .filter(|c| *c != 0)
                .ok_or_else(|| KeyMapError::Invalid(format!("invalid scan code {}", entry.code)))?;
            let key = entry
                .key
                .value()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| KeyMapError::Invalid(format!("invalid key {} for code {:#06x}", entry.key, code)))?;
            let info = ConversionInfo {
                key,
                modifiers: modifiers::reduce(entry.modifiers),
            };
            if table.insert(code, info).is_some() {
                return Err(KeyMapError::Invalid(format!("duplicate scan code {:#06x}", code)));
            }
        }

        self.entries = table;
        info!("Loaded {} key mappings from: {}", self.entries.len(), path_ref.display());
        Ok(self.entries.len())
    }

    /// Write this map to `path`, ordered by scan code
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), KeyMapError> {
        let path_ref = path.as_ref();

        let mut entries = Vec::with_capacity(self.len());
        for (code, info) in self.iter() {
            entries.push(KeyMapEntry {
                code: NumberText::Text(format!("{:#06x}", code)),
                key: NumberText::Text(format!("{:#06x}", info.key)),
                modifiers: modifiers::expand(info.modifiers)
                    .map_err(|e| KeyMapError::Invalid(e.to_string()))?,
            });
        }

        let content = serde_json::to_string_pretty(&entries)?;
        fs::write(path_ref, content)?;

        info!("Saved {} key mappings to: {}", entries.len(), path_ref.display());
        Ok(())
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal number
pub fn parse_number(text: &str) -> Option<u64> {
    let trimmed = text.trim();
    match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => trimmed.parse().ok(),
    }
}

/// On-disk form of one mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
struct KeyMapEntry {
    code: NumberText,
    key: NumberText,
    #[serde(default)]
    modifiers: Vec<Modifier>,
}

/// Numbers are written as hex strings but plain numbers are accepted too
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum NumberText {
    Number(u64),
    Text(String),
}

impl NumberText {
    fn value(&self) -> Option<u64> {
        match self {
            NumberText::Number(n) => Some(*n),
            NumberText::Text(s) => parse_number(s),
        }
    }
}

impl fmt::Display for NumberText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberText::Number(n) => write!(f, "{}", n),
            NumberText::Text(s) => write!(f, "'{}'", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_then_get() {
        let mut map = KeyMap::new();
        assert!(map.add(0x16, 0x1C, 0x01));

        let info = map.get(0x16).unwrap();
        assert_eq!(info.key, 0x1C);
        assert_eq!(info.modifiers, 0x01);
    }

    #[test]
    fn test_add_rejects_duplicates_and_zero() {
        let mut map = KeyMap::new();
        assert!(map.add(1, 2, 0));
        assert!(!map.add(1, 3, 0));
        assert!(!map.add(0, 3, 0));
        assert_eq!(map.get(1).unwrap().key, 2);
    }

    #[test]
    fn test_add_rejects_unknown_modifier_bits() {
        let mut map = KeyMap::new();
        assert!(!map.add(1, 2, 0x40));
        assert!(map.is_empty());
    }

    #[test]
    fn test_modify_never_creates() {
        let mut map = KeyMap::new();
        assert!(!map.modify(5, 6, 0));
        assert!(map.is_empty());

        map.add(5, 6, 0);
        assert!(map.modify(5, 7, 0x10));
        assert_eq!(map.get(5), Some(&ConversionInfo { key: 7, modifiers: 0x10 }));
    }

    #[test]
    fn test_delete() {
        let mut map = KeyMap::new();
        map.add(9, 1, 0);
        assert!(map.delete(9));
        assert!(!map.delete(9));
        assert!(map.get(9).is_none());
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("0x1c"), Some(0x1C));
        assert_eq!(parse_number("0X1C"), Some(0x1C));
        assert_eq!(parse_number("42"), Some(42));
        assert_eq!(parse_number(" 7 "), Some(7));
        assert_eq!(parse_number("zz"), None);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Web.json");

        let mut map = KeyMap::new();
        map.add(0x16, 0x1C, 0x21);
        map.add(0x02, 0x30, 0);
        map.save(&path).unwrap();

        let mut loaded = KeyMap::new();
        assert_eq!(loaded.load(&path).unwrap(), 2);
        assert_eq!(loaded, map);
    }

    #[test]
    fn test_save_orders_by_code() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("IR.json");

        let mut map = KeyMap::new();
        map.add(0x30, 1, 0);
        map.add(0x05, 2, 0);
        map.add(0x11, 3, 0);
        assert_eq!(map.iter().map(|(code, _)| code).collect::<Vec<_>>(), vec![0x05, 0x11, 0x30]);
        map.save(&path).unwrap();

        let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let codes: Vec<&str> = saved.as_array().unwrap().iter().map(|e| e["code"].as_str().unwrap()).collect();
        assert_eq!(codes, vec!["0x0005", "0x0011", "0x0030"]);
    }

    #[test]
    fn test_load_accepts_plain_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.json");
        fs::write(&path, r#"[{"code": 22, "key": "0x1c"}, {"code": "0x17", "key": 29, "modifiers": ["rightalt"]}]"#).unwrap();

        let mut map = KeyMap::new();
        map.load(&path).unwrap();
        assert_eq!(map.get(22), Some(&ConversionInfo { key: 0x1C, modifiers: 0 }));
        assert_eq!(map.get(0x17), Some(&ConversionInfo { key: 29, modifiers: 0x08 }));
    }

    #[test]
    fn test_invalid_file_leaves_map_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dup.json");
        fs::write(&path, r#"[{"code": 1, "key": 2}, {"code": 1, "key": 3}]"#).unwrap();

        let mut map = KeyMap::new();
        map.add(7, 7, 0);
        assert!(matches!(map.load(&path), Err(KeyMapError::Invalid(_))));
        assert_eq!(map.len(), 1);

        fs::write(&path, r#"[{"code": 1, "key": 2, "modifiers": ["super"]}]"#).unwrap();
        assert!(matches!(map.load(&path), Err(KeyMapError::Parse(_))));

        fs::write(&path, r#"[{"code": 0, "key": 2}]"#).unwrap();
        assert!(matches!(map.load(&path), Err(KeyMapError::Invalid(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let mut map = KeyMap::new();
        assert!(matches!(map.load("/nonexistent/remote/map.json"), Err(KeyMapError::Io(_))));
    }
}
