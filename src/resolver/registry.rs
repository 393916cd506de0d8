//! Scheme → builder registry, constructed and injected by the caller.

use std::collections::HashMap;
use std::sync::Arc;

use crate::resolver::{Resolver, ResolverBuilder, ResolverError, Target};
use crate::watch::AddressListener;

/// Maps target schemes to resolver builders.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    builders: HashMap<String, Arc<dyn ResolverBuilder>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `builder` under its scheme, returning any builder it replaced.
    pub fn register<B>(&mut self, builder: B) -> Option<Arc<dyn ResolverBuilder>>
    where
        B: ResolverBuilder + 'static,
    {
        let scheme = builder.scheme().to_ascii_lowercase();
        tracing::debug!(scheme = %scheme, "Registering resolver builder");
        self.builders.insert(scheme, Arc::new(builder))
    }

    pub fn get(&self, scheme: &str) -> Option<Arc<dyn ResolverBuilder>> {
        self.builders.get(&scheme.to_ascii_lowercase()).cloned()
    }

    pub fn schemes(&self) -> Vec<String> {
        let mut schemes: Vec<_> = self.builders.keys().cloned().collect();
        schemes.sort();
        schemes
    }

    /// Parse `target` and build a resolver feeding `listener`.
    pub fn resolve(
        &self,
        target: &str,
        listener: Arc<dyn AddressListener>,
    ) -> Result<Resolver, ResolverError> {
        let target: Target = target.parse()?;
        let builder = self
            .get(&target.scheme)
            .ok_or_else(|| ResolverError::UnknownScheme(target.scheme.clone()))?;
        builder.build(&target, listener)
    }
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("schemes", &self.schemes())
            .finish()
    }
}
