//! Global platform registry for looking up platform definitions.

use std::sync::{LazyLock, RwLock};

use indexmap::IndexMap;

use super::definition::PlatformDefinition;
use super::vendors;
use crate::error::{PlatformError, Result};

/// Global platform registry.
static REGISTRY: LazyLock<RwLock<PlatformRegistry>> = LazyLock::new(|| {
    let mut registry = PlatformRegistry::new();
    registry.register_builtin_platforms();
    RwLock::new(registry)
});

/// Registry for platform definitions.
#[derive(Debug, Default)]
pub struct PlatformRegistry {
    platforms: IndexMap<String, PlatformDefinition>,
}

impl PlatformRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            platforms: IndexMap::new(),
        }
    }

    /// Get the global registry.
    pub fn global() -> &'static RwLock<PlatformRegistry> {
        &REGISTRY
    }

    /// Look up a platform in the global registry and clone it.
    pub fn lookup(name: &str) -> Result<PlatformDefinition> {
        Self::global()
            .read()
            .map_err(|_| PlatformError::InvalidDefinition {
                message: "Failed to acquire registry lock".to_string(),
            })?
            .get(name)
            .cloned()
            .ok_or_else(|| {
                PlatformError::UnknownPlatform {
                    name: name.to_string(),
                }
                .into()
            })
    }

    /// Register built-in platforms.
    fn register_builtin_platforms(&mut self) {
        for platform in [vendors::comware::hp(), vendors::comware::h3c()] {
            self.platforms.insert(platform.name.clone(), platform);
        }
    }

    /// Register a platform definition.
    pub fn register(&mut self, platform: PlatformDefinition) -> Result<()> {
        if self.platforms.contains_key(&platform.name) {
            return Err(PlatformError::AlreadyRegistered {
                name: platform.name.clone(),
            }
            .into());
        }
        self.platforms.insert(platform.name.clone(), platform);
        Ok(())
    }

    /// Get a platform by name.
    pub fn get(&self, name: &str) -> Option<&PlatformDefinition> {
        self.platforms.get(name)
    }

    /// Check if a platform is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.platforms.contains_key(name)
    }

    /// List all registered platform names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.platforms.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_platforms() {
        let hp = PlatformRegistry::lookup("hp_comware").unwrap();
        assert!(hp.data_namespace.contains("www.hp.com"));
        let h3c = PlatformRegistry::lookup("h3c_comware").unwrap();
        assert!(h3c.data_namespace.contains("www.h3c.com"));
        assert!(PlatformRegistry::lookup("nope").is_err());
    }

    #[test]
    fn test_register_duplicate() {
        let mut registry = PlatformRegistry::new();
        registry
            .register(PlatformDefinition::new("custom"))
            .unwrap();
        assert!(registry.contains("custom"));
        assert!(
            registry
                .register(PlatformDefinition::new("custom"))
                .is_err()
        );
        assert_eq!(registry.names().count(), 1);
    }

    #[test]
    fn test_names_keep_registration_order() {
        let mut registry = PlatformRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.register(PlatformDefinition::new(name)).unwrap();
        }
        let names: Vec<&String> = registry.names().collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }
}
