pub mod cloud_providers;

pub use cloud_providers::CloudProviderDirectory;
pub use idp_api_client::{ApiError, ClientConfig, ConfigError, IdpApiClient};

use idp_forms::{
    CloudProviderSource, FormController, FormOptions, PropertySchemaStore, RenderError, SchemaCache, SchemaContext,
    SchemaEditor, SchemaKey, SchemaSource, TypeRegistry,
};
use log::debug;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Wires the backend client, the shared schema cache, the cloud provider
/// directory and the renderer registry together.
///
/// Every form created from one console shares its schema cache.
pub struct Console {
    default_actor: Option<String>,
    cache: Arc<SchemaCache>,
    store: Arc<dyn PropertySchemaStore>,
    cloud_providers: CloudProviderDirectory,
    registry: TypeRegistry,
}

impl Console {
    pub fn new(config: &ClientConfig) -> Result<Self, ConsoleError> {
        let client = Arc::new(IdpApiClient::new(config)?);
        Ok(Self::from_parts(client.clone(), client.clone(), client, config.user_email.clone()))
    }

    pub fn from_config_file(path: &Path) -> Result<Self, ConsoleError> {
        let config = ClientConfig::from_file(path)?;
        Self::new(&config)
    }

    /// Builds a console over arbitrary backends with the standard renderers registered.
    pub fn from_parts(
        schemas: Arc<dyn SchemaSource>,
        store: Arc<dyn PropertySchemaStore>,
        providers: Arc<dyn CloudProviderSource>,
        default_actor: Option<String>,
    ) -> Self {
        Self {
            cache: Arc::new(SchemaCache::new(schemas)),
            store,
            cloud_providers: CloudProviderDirectory::new(providers, default_actor.clone()),
            registry: idp_forms_std_renderers::standard_registry(),
            default_actor,
        }
    }

    /// A new dynamic form. Without an explicit actor the console's user is used.
    pub fn form(&self, mut options: FormOptions) -> FormController {
        if options.user_email.is_none() {
            options.user_email = self.default_actor.clone();
        }
        FormController::new(Arc::clone(&self.cache), options)
    }

    pub fn editor(&self, actor: Option<&str>) -> SchemaEditor {
        let actor = actor.map(str::to_string).or_else(|| self.default_actor.clone());
        SchemaEditor::new(Arc::clone(&self.store), actor)
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }

    pub fn schema_cache(&self) -> &Arc<SchemaCache> {
        &self.cache
    }

    pub fn cloud_providers(&self) -> &CloudProviderDirectory {
        &self.cloud_providers
    }

    /// Drops the cached schemas of a mapping in both contexts, typically after it was edited.
    pub fn invalidate_schema(&self, resource_type_id: &str, cloud_provider_id: &str) {
        for context in [SchemaContext::Blueprint, SchemaContext::Stack] {
            self.cache.invalidate(&SchemaKey::new(resource_type_id, cloud_provider_id, context));
        }
        debug!("Invalidated cached schemas for {}/{}", resource_type_id, cloud_provider_id);
    }

    /// Forgets every cached schema and the cloud provider list.
    pub async fn refresh(&self) {
        self.cache.clear();
        self.cloud_providers.clear().await;
    }
}
