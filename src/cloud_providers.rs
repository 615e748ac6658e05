use idp_forms::{CloudProvider, CloudProviderSource, SchemaError};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

struct ProviderIndex {
    providers: Vec<CloudProvider>,
    by_id: HashMap<String, usize>,
    /// Lowercased `name` and `display_name` to position.
    by_name: HashMap<String, usize>,
}

impl ProviderIndex {
    fn build(providers: Vec<CloudProvider>) -> Self {
        let mut by_id = HashMap::new();
        let mut by_name = HashMap::new();
        for (i, provider) in providers.iter().enumerate() {
            by_id.insert(provider.id.clone(), i);
            by_name.entry(provider.name.to_lowercase()).or_insert(i);
            if let Some(display) = &provider.display_name {
                by_name.entry(display.to_lowercase()).or_insert(i);
            }
        }
        Self { providers, by_id, by_name }
    }

    fn by_id(&self, id: &str) -> Option<&CloudProvider> {
        self.by_id.get(id).map(|&i| &self.providers[i])
    }

    fn by_name(&self, name: &str) -> Option<&CloudProvider> {
        self.by_name.get(&name.trim().to_lowercase()).map(|&i| &self.providers[i])
    }
}

/// Resolves cloud provider ids and names.
///
/// The provider list is fetched on first use and kept until `clear`.
/// Concurrent first callers share one request.
pub struct CloudProviderDirectory {
    source: Arc<dyn CloudProviderSource>,
    actor: Option<String>,
    loaded: Mutex<Option<Arc<ProviderIndex>>>,
}

impl CloudProviderDirectory {
    pub fn new(source: Arc<dyn CloudProviderSource>, actor: Option<String>) -> Self {
        Self { source, actor, loaded: Mutex::new(None) }
    }

    async fn index(&self) -> Result<Arc<ProviderIndex>, SchemaError> {
        let mut loaded = self.loaded.lock().await;
        if let Some(index) = loaded.as_ref() {
            return Ok(Arc::clone(index));
        }
        debug!("Loading cloud providers");
        let providers = self.source.list_cloud_providers(self.actor.as_deref()).await?;
        info!("Loaded {} cloud providers", providers.len());
        let index = Arc::new(ProviderIndex::build(providers));
        *loaded = Some(Arc::clone(&index));
        Ok(index)
    }

    pub async fn providers(&self) -> Result<Vec<CloudProvider>, SchemaError> {
        Ok(self.index().await?.providers.clone())
    }

    pub async fn enabled_providers(&self) -> Result<Vec<CloudProvider>, SchemaError> {
        Ok(self.index().await?.providers.iter().filter(|p| p.enabled).cloned().collect())
    }

    pub async fn get(&self, id: &str) -> Result<Option<CloudProvider>, SchemaError> {
        Ok(self.index().await?.by_id(id).cloned())
    }

    pub async fn name_for(&self, id: &str) -> Result<Option<String>, SchemaError> {
        Ok(self.index().await?.by_id(id).map(|p| p.name.clone()))
    }

    /// Looks a provider up by name or display name, ignoring case.
    pub async fn id_for(&self, name: &str) -> Result<Option<String>, SchemaError> {
        Ok(self.index().await?.by_name(name).map(|p| p.id.clone()))
    }

    /// Accepts either an id or a name and returns the id.
    pub async fn resolve(&self, id_or_name: &str) -> Result<Option<String>, SchemaError> {
        let index = self.index().await?;
        Ok(index
            .by_id(id_or_name)
            .or_else(|| index.by_name(id_or_name))
            .map(|p| p.id.clone()))
    }

    /// Forgets the loaded list; the next lookup fetches it again.
    pub async fn clear(&self) {
        *self.loaded.lock().await = None;
    }
}
