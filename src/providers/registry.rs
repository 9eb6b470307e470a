use std::collections::HashMap;

use super::traits::TokenProvider;

/// Registry of available token providers, keyed by provider ID.
pub struct ProviderRegistry {
    providers: HashMap<String, Box<dyn TokenProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Register a new provider.
    pub fn register(&mut self, provider: Box<dyn TokenProvider>) {
        let id = provider.id().to_string();
        self.providers.insert(id, provider);
    }

    /// Get a provider by ID.
    pub fn get(&self, id: &str) -> Option<&dyn TokenProvider> {
        self.providers.get(id).map(|p| p.as_ref())
    }

    /// All registered providers, in stable id order.
    pub fn list(&self) -> Vec<&dyn TokenProvider> {
        let mut providers: Vec<&dyn TokenProvider> =
            self.providers.values().map(|p| p.as_ref()).collect();
        providers.sort_by_key(|p| p.id());
        providers
    }

    /// Number of registered providers.
    pub fn count(&self) -> usize {
        self.providers.len()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::providers::RefreshedToken;
    use async_trait::async_trait;

    struct StubProvider {
        id: &'static str,
    }

    #[async_trait]
    impl TokenProvider for StubProvider {
        fn id(&self) -> &'static str {
            self.id
        }

        fn display_name(&self) -> &str {
            match self.id {
                "alpha" => "Alpha",
                _ => "Beta",
            }
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<RefreshedToken, ApiError> {
            Err(ApiError::ProviderUnavailable("stub".into()))
        }
    }

    #[test]
    fn lists_registered_providers_in_id_order() {
        let mut registry = ProviderRegistry::new();
        assert!(registry.list().is_empty());

        registry.register(Box::new(StubProvider { id: "beta" }));
        registry.register(Box::new(StubProvider { id: "alpha" }));

        let listed = registry.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id(), "alpha");
        assert_eq!(listed[0].display_name(), "Alpha");
        assert_eq!(listed[1].id(), "beta");
        assert_eq!(listed[1].display_name(), "Beta");
    }
}
