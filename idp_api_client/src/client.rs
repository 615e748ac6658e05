use crate::config::ClientConfig;
use crate::error::{server_message, ApiError};
use async_trait::async_trait;
use idp_forms::{
    CloudProvider, CloudProviderSource, PropertySchema, PropertySchemaPatch, PropertySchemaStore,
    ResourceTypeCloudMapping, SchemaError, SchemaKey, SchemaSource,
};
use log::{debug, info};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub const ACTOR_HEADER: &str = "x-auth-request-email";

/// Schema of one mapping as returned by the resource-schema endpoints.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSchema {
    #[serde(default)]
    pub resource_type_id: Option<String>,
    #[serde(default)]
    pub resource_type_name: Option<String>,
    #[serde(default)]
    pub cloud_provider_id: Option<String>,
    #[serde(default)]
    pub cloud_provider_name: Option<String>,
    pub properties: Vec<PropertySchema>,
}

/// The endpoint has answered with three shapes over time: the metadata
/// envelope, a bare list, and an object keyed by property name.
#[derive(Deserialize)]
#[serde(untagged)]
enum SchemaPayload {
    List(Vec<PropertySchema>),
    Envelope(ResourceSchema),
    Keyed(BTreeMap<String, PropertySchema>),
}

impl From<SchemaPayload> for ResourceSchema {
    fn from(payload: SchemaPayload) -> Self {
        match payload {
            SchemaPayload::Envelope(schema) => schema,
            SchemaPayload::List(properties) => ResourceSchema { properties, ..Default::default() },
            SchemaPayload::Keyed(by_name) => ResourceSchema {
                properties: by_name.into_values().collect(),
                ..Default::default()
            },
        }
    }
}

/// Typed HTTP client for the IDP backend.
pub struct IdpApiClient {
    base_url: Url,
    api_key: Option<String>,
    default_actor: Option<String>,
    client: Client,
}

impl IdpApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(config.api_base_url.trim())
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| ApiError::InvalidBaseUrl(config.api_base_url.clone()))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build()
            .map_err(ApiError::Build)?;
        info!("IDP API client targeting {}", base_url);
        Ok(Self {
            base_url,
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            default_actor: config.user_email.clone().filter(|e| !e.is_empty()),
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Schema for a mapping together with the names the backend resolved for it.
    pub async fn fetch_resource_schema(&self, key: &SchemaKey, actor: Option<&str>) -> Result<ResourceSchema, ApiError> {
        let url = self.url(&[
            "v1",
            key.context.collection(),
            "resource-schema",
            &key.resource_type_id,
            &key.cloud_provider_id,
        ])?;
        let payload: SchemaPayload = self.send(Method::GET, url, actor, None::<&()>).await?;
        Ok(payload.into())
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn headers(&self, actor: Option<&str>) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &self.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|_| ApiError::InvalidHeader("Authorization"))?;
            headers.insert(AUTHORIZATION, value);
        }
        if let Some(actor) = actor.or(self.default_actor.as_deref()) {
            let value = HeaderValue::from_str(actor).map_err(|_| ApiError::InvalidHeader(ACTOR_HEADER))?;
            headers.insert(ACTOR_HEADER, value);
        }
        Ok(headers)
    }

    async fn execute<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        actor: Option<&str>,
        body: Option<&B>,
    ) -> Result<String, ApiError> {
        debug!("{} {}", method, url);
        let mut request = self.client.request(method.clone(), url.clone()).headers(self.headers(actor)?);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(|source| ApiError::Network {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|source| ApiError::Network {
            url: url.to_string(),
            source,
        })?;
        if !status.is_success() {
            return Err(ApiError::Status {
                method: method.to_string(),
                url: url.to_string(),
                status: status.as_u16(),
                message: server_message(&text, status.as_u16()),
            });
        }
        Ok(text)
    }

    async fn send<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        actor: Option<&str>,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let text = self.execute(method, url.clone(), actor, body).await?;
        serde_json::from_str(&text).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl SchemaSource for IdpApiClient {
    async fn get_schema(&self, key: &SchemaKey, actor: Option<&str>) -> Result<Vec<PropertySchema>, SchemaError> {
        Ok(self.fetch_resource_schema(key, actor).await?.properties)
    }
}

#[async_trait]
impl PropertySchemaStore for IdpApiClient {
    async fn list_property_schemas(&self, mapping_id: &str, actor: Option<&str>) -> Result<Vec<PropertySchema>, SchemaError> {
        let url = self.url(&["v1", "admin", "property-schemas", "mapping", mapping_id])?;
        Ok(self.send(Method::GET, url, actor, None::<&()>).await?)
    }

    async fn create_property_schema(&self, schema: &PropertySchema, actor: Option<&str>) -> Result<PropertySchema, SchemaError> {
        let url = self.url(&["v1", "admin", "property-schemas"])?;
        Ok(self.send(Method::POST, url, actor, Some(schema)).await?)
    }

    async fn bulk_create_property_schemas(
        &self,
        mapping_id: &str,
        schemas: &[PropertySchema],
        actor: Option<&str>,
    ) -> Result<Vec<PropertySchema>, SchemaError> {
        let mut url = self.url(&["v1", "admin", "property-schemas", "bulk"])?;
        url.query_pairs_mut().append_pair("mappingId", mapping_id);
        Ok(self.send(Method::POST, url, actor, Some(schemas)).await?)
    }

    async fn update_property_schema(
        &self,
        id: &str,
        patch: &PropertySchemaPatch,
        actor: Option<&str>,
    ) -> Result<PropertySchema, SchemaError> {
        let url = self.url(&["v1", "admin", "property-schemas", id])?;
        Ok(self.send(Method::PUT, url, actor, Some(patch)).await?)
    }

    async fn delete_property_schema(&self, id: &str, actor: Option<&str>) -> Result<(), SchemaError> {
        let url = self.url(&["v1", "admin", "property-schemas", id])?;
        self.execute(Method::DELETE, url, actor, None::<&()>).await?;
        Ok(())
    }

    async fn get_resource_type_cloud_mappings(&self, actor: Option<&str>) -> Result<Vec<ResourceTypeCloudMapping>, SchemaError> {
        let url = self.url(&["v1", "admin", "resource-type-cloud-mappings"])?;
        Ok(self.send(Method::GET, url, actor, None::<&()>).await?)
    }
}

#[async_trait]
impl CloudProviderSource for IdpApiClient {
    async fn list_cloud_providers(&self, actor: Option<&str>) -> Result<Vec<CloudProvider>, SchemaError> {
        let url = self.url(&["v1", "admin", "cloud-providers"])?;
        Ok(self.send(Method::GET, url, actor, None::<&()>).await?)
    }
}
