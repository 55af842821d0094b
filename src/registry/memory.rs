//! In-memory device registry.
//!
//! Stands in for the device administrator in tests and in the standalone
//! server. Producers are declared up front; their error state and pairing
//! behaviour can be changed at runtime.

use super::{DeviceRegistry, Producer, RegistryError};
use log::{debug, info};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct SimulatedProducer {
    name: String,
    metadata: String,
    error: Option<String>,
    pairable: bool,
    bindings: Vec<String>,
}

impl SimulatedProducer {
    /// Metadata as reported to callers, including the active bindings
    fn describe(&self) -> String {
        serde_json::json!({
            "info": self.metadata,
            "bindings": self.bindings,
        })
        .to_string()
    }
}

/// Registry backed by a list of simulated producers
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    producers: Mutex<Vec<SimulatedProducer>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SimulatedProducer>> {
        self.producers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Builder-style variant of [`add_producer`](Self::add_producer)
    pub fn with_producer(self, name: &str, metadata: &str) -> Self {
        self.add_producer(name, metadata, true);
        self
    }

    /// Register a producer. An existing producer with the same name is replaced.
    pub fn add_producer(&self, name: &str, metadata: &str, pairable: bool) {
        let mut producers = self.lock();
        producers.retain(|p| p.name != name);
        producers.push(SimulatedProducer {
            name: name.to_string(),
            metadata: metadata.to_string(),
            error: None,
            pairable,
            bindings: Vec::new(),
        });
        debug!("Registered producer '{}'", name);
    }

    /// Put a producer into (or out of) an error state
    pub fn set_error(&self, name: &str, reason: Option<&str>) {
        if let Some(producer) = self.lock().iter_mut().find(|p| p.name == name) {
            producer.error = reason.map(str::to_string);
        }
    }

    pub fn set_pairable(&self, name: &str, pairable: bool) {
        if let Some(producer) = self.lock().iter_mut().find(|p| p.name == name) {
            producer.pairable = pairable;
        }
    }

    /// Binding ids currently held by a producer
    pub fn bindings(&self, name: &str) -> Vec<String> {
        self.lock()
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.bindings.clone())
            .unwrap_or_default()
    }
}

impl DeviceRegistry for InMemoryRegistry {
    fn producers(&self) -> Vec<Producer> {
        self.lock()
            .iter()
            .map(|p| Producer {
                name: p.name.clone(),
                metadata: p.describe(),
            })
            .collect()
    }

    fn error(&self, device: &str) -> Result<(), RegistryError> {
        let producers = self.lock();
        let producer = producers
            .iter()
            .find(|p| p.name == device)
            .ok_or_else(|| RegistryError::NotFound(device.to_string()))?;

        match &producer.error {
            Some(reason) => Err(RegistryError::Device {
                device: device.to_string(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    fn pair(&self, device: &str) -> Result<(), RegistryError> {
        let mut producers = self.lock();
        let producer = producers
            .iter_mut()
            .find(|p| p.name == device)
            .ok_or_else(|| RegistryError::NotFound(device.to_string()))?;

        if !producer.pairable {
            return Err(RegistryError::Pairing {
                device: device.to_string(),
                reason: "pairing not supported".to_string(),
            });
        }

        let binding = Uuid::new_v4().to_string();
        info!("Paired '{}' (binding {})", device, binding);
        producer.bindings.push(binding);
        Ok(())
    }

    fn unpair(&self, device: &str, binding_id: &str) -> Result<(), RegistryError> {
        let mut producers = self.lock();
        let producer = producers
            .iter_mut()
            .find(|p| p.name == device)
            .ok_or_else(|| RegistryError::NotFound(device.to_string()))?;

        let before = producer.bindings.len();
        producer.bindings.retain(|b| b != binding_id);
        if producer.bindings.len() == before {
            return Err(RegistryError::Pairing {
                device: device.to_string(),
                reason: format!("unknown binding '{}'", binding_id),
            });
        }

        info!("Unpaired '{}' (binding {})", device, binding_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_producers_in_registration_order() {
        let registry = InMemoryRegistry::new()
            .with_producer("IR", "ir receiver")
            .with_producer("RF4CE", "rf4ce dongle");

        let names: Vec<String> = registry.producers().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["IR", "RF4CE"]);
        assert!(registry.contains("IR"));
        assert!(!registry.contains("Web"));
    }

    #[test]
    fn test_error_state() {
        let registry = InMemoryRegistry::new().with_producer("IR", "");
        assert!(registry.error("IR").is_ok());

        registry.set_error("IR", Some("no receiver"));
        assert!(matches!(registry.error("IR"), Err(RegistryError::Device { .. })));

        registry.set_error("IR", None);
        assert!(registry.error("IR").is_ok());
        assert_eq!(registry.error("BT"), Err(RegistryError::NotFound("BT".to_string())));
    }

    #[test]
    fn test_pair_and_unpair() {
        let registry = InMemoryRegistry::new().with_producer("RF4CE", "");
        registry.pair("RF4CE").unwrap();

        let bindings = registry.bindings("RF4CE");
        assert_eq!(bindings.len(), 1);
        assert!(registry.producers()[0].metadata.contains(&bindings[0]));

        assert!(registry.unpair("RF4CE", "not-a-binding").is_err());
        registry.unpair("RF4CE", &bindings[0]).unwrap();
        assert!(registry.bindings("RF4CE").is_empty());
    }

    #[test]
    fn test_pair_refused() {
        let registry = InMemoryRegistry::new();
        registry.add_producer("IR", "", false);
        assert!(matches!(registry.pair("IR"), Err(RegistryError::Pairing { .. })));

        registry.set_pairable("IR", true);
        assert!(registry.pair("IR").is_ok());
    }
}
