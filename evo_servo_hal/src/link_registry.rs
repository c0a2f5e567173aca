//! Link registry for actuator bus implementations.
//!
//! Provides a `LinkRegistry` struct for registering and retrieving
//! `ActuatorLink` factories by name. The registry is built at startup
//! and handed to `ServoHal`; there is no process-wide instance.

use evo_servo_common::error::ServoError;
use evo_servo_common::link::{ActuatorLink, LinkFactory};
use std::collections::HashMap;

/// Registry of available actuator links.
pub struct LinkRegistry {
    factories: HashMap<&'static str, LinkFactory>,
}

impl LinkRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry holding every in-tree link.
    pub fn with_builtin_links() -> Self {
        let mut registry = Self::new();
        crate::links::register_builtin_links(&mut registry);
        registry
    }

    /// Register a link factory.
    ///
    /// # Errors
    /// Returns `ServoError::InitFailed` if the name is already taken.
    pub fn register(&mut self, name: &'static str, factory: LinkFactory) -> Result<(), ServoError> {
        if self.factories.contains_key(name) {
            return Err(ServoError::InitFailed(format!(
                "Link '{name}' is already registered"
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Get a link factory by name.
    pub fn get_factory(&self, name: &str) -> Option<LinkFactory> {
        self.factories.get(name).copied()
    }

    /// Create a link instance by name.
    ///
    /// # Errors
    /// Returns `ServoError::LinkNotFound` if no link with the given name is registered.
    pub fn create_link(&self, name: &str) -> Result<Box<dyn ActuatorLink>, ServoError> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| ServoError::LinkNotFound(name.to_string()))?;
        Ok(factory())
    }

    /// List all registered link names, sorted.
    pub fn list_links(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for LinkRegistry {
    fn default() -> Self {
        Self::new()
    }
}
