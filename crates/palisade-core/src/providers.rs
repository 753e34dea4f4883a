//! Explicit provider registration.
//!
//! Profiles reference backends and obfuscators by name only. The catalog
//! maps those names to provider instances and is populated once at startup;
//! an unresolved name fails registry construction instead of surfacing
//! mid-call.

use std::collections::HashMap;
use std::sync::Arc;

use crate::obfuscate::{Base64ObfuscatorProvider, HexObfuscatorProvider};
use crate::traits::{BackendProvider, ObfuscatorProvider};

/// Named providers available to a gateway.
#[derive(Clone, Default)]
pub struct ProviderCatalog {
    backends: HashMap<String, Arc<dyn BackendProvider>>,
    obfuscators: HashMap<String, Arc<dyn ObfuscatorProvider>>,
}

impl ProviderCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog with the built-in obfuscators registered.
    /// Storage providers register separately at connect time.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.register_obfuscator(Arc::new(Base64ObfuscatorProvider));
        catalog.register_obfuscator(Arc::new(HexObfuscatorProvider));
        catalog
    }

    /// Registers a backend provider under its own name.
    /// Re-registering a name replaces the previous provider.
    pub fn register_backend(&mut self, provider: Arc<dyn BackendProvider>) {
        self.backends.insert(provider.name().to_string(), provider);
    }

    /// Registers an obfuscator provider under its own name.
    /// Re-registering a name replaces the previous provider.
    pub fn register_obfuscator(&mut self, provider: Arc<dyn ObfuscatorProvider>) {
        self.obfuscators
            .insert(provider.name().to_string(), provider);
    }

    /// Looks up a backend provider by name.
    #[must_use]
    pub fn backend(&self, name: &str) -> Option<Arc<dyn BackendProvider>> {
        self.backends.get(name).cloned()
    }

    /// Looks up an obfuscator provider by name.
    #[must_use]
    pub fn obfuscator(&self, name: &str) -> Option<Arc<dyn ObfuscatorProvider>> {
        self.obfuscators.get(name).cloned()
    }

    /// Names of all registered backend providers.
    #[must_use]
    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.keys().map(String::as_str).collect()
    }

    /// Names of all registered obfuscator providers.
    #[must_use]
    pub fn obfuscator_names(&self) -> Vec<&str> {
        self.obfuscators.keys().map(String::as_str).collect()
    }
}
