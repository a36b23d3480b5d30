//! Provider identities and the registry that turns them back into providers

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{LocalProvider, PanelProvider, ProviderError, ProviderHandle, ProviderResult, same_provider};

/// Serializable identity of a provider instance.
///
/// `tag` names the kind of provider, `junction` tells instances of that kind
/// apart (a connection string, an archive path, a tree name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderPromise {
    pub tag: String,
    #[serde(default)]
    pub junction: String,
}

impl ProviderPromise {
    pub const NATIVE_TAG: &'static str = "native";
    pub const MEMORY_TAG: &'static str = "memory";

    pub fn new(tag: &str, junction: &str) -> Self {
        Self {
            tag: tag.to_string(),
            junction: junction.to_string(),
        }
    }

    /// The local filesystem
    pub fn native() -> Self {
        Self::new(Self::NATIVE_TAG, "")
    }

    pub fn is_native(&self) -> bool {
        self.tag == Self::NATIVE_TAG
    }
}

impl std::fmt::Display for ProviderPromise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}", self.tag, self.junction)
    }
}

/// Creates a provider for a promise; may block (connects, opens archives)
pub type ProviderFactory = Arc<dyn Fn(&ProviderPromise) -> ProviderResult<ProviderHandle> + Send + Sync>;

/// Resolves [`ProviderPromise`]s to live providers.
///
/// Live instances are cached weakly, so a provider is reused while any
/// panel or listing still holds it and recreated through its factory after.
pub struct ProviderRegistry {
    native: ProviderHandle,
    factories: Mutex<HashMap<String, ProviderFactory>>,
    instances: Mutex<HashMap<ProviderPromise, Weak<dyn PanelProvider>>>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            native: Arc::new(LocalProvider::new()),
            factories: Mutex::new(HashMap::new()),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// The shared local filesystem provider
    pub fn native(&self) -> ProviderHandle {
        Arc::clone(&self.native)
    }

    /// Register how to create providers with the given tag
    pub fn register_factory(&self, tag: &str, factory: ProviderFactory) {
        self.factories.lock().insert(tag.to_string(), factory);
    }

    /// Make an existing provider resolvable by its promise
    pub fn register_instance(&self, provider: &ProviderHandle) -> ProviderPromise {
        let promise = provider.promise();
        self.remember(&promise, provider);
        promise
    }

    /// Cache `provider` under `promise`, dropping entries whose provider is gone
    fn remember(&self, promise: &ProviderPromise, provider: &ProviderHandle) {
        let mut instances = self.instances.lock();
        instances.retain(|_, weak| weak.strong_count() > 0);
        instances.insert(promise.clone(), Arc::downgrade(provider));
    }

    /// Promise for `provider`, if resolving it would yield a provider of the same identity
    pub fn promise_for(&self, provider: &ProviderHandle) -> Option<ProviderPromise> {
        let promise = provider.promise();
        if promise.is_native() || self.factories.lock().contains_key(&promise.tag) {
            return Some(promise);
        }
        let instances = self.instances.lock();
        let live = instances.get(&promise).and_then(Weak::upgrade)?;
        same_provider(&live, provider).then_some(promise)
    }

    /// Find or create the provider behind `promise`. May block in a factory.
    pub fn resolve(&self, promise: &ProviderPromise) -> ProviderResult<ProviderHandle> {
        if promise.is_native() {
            return Ok(self.native());
        }

        if let Some(live) = self.instances.lock().get(promise).and_then(Weak::upgrade) {
            return Ok(live);
        }

        let factory = self.factories.lock().get(&promise.tag).cloned();
        let Some(factory) = factory else {
            return Err(ProviderError::NotSupported(format!("no provider for {}", promise)));
        };
        tracing::debug!(%promise, "creating provider");
        let provider = factory(promise)?;
        self.remember(promise, &provider);
        Ok(provider)
    }
}
