use crate::error::SchemaError;
use crate::schema::{CloudProvider, DataType, PropertySchema, PropertySchemaPatch, ResourceTypeCloudMapping, SchemaKey, ValidationErrors, ValueSet};
use anyhow::Error;
use async_trait::async_trait;

/// Context passed to renderers
pub struct RenderContext<'a> {
    pub values: &'a ValueSet,
    pub errors: &'a ValidationErrors,
    pub disabled: bool,
    pub show_labels: bool,
}

impl<'a> RenderContext<'a> {
    pub fn new(values: &'a ValueSet, errors: &'a ValidationErrors) -> Self {
        Self { values, errors, disabled: false, show_labels: true }
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn show_labels(mut self, show_labels: bool) -> Self {
        self.show_labels = show_labels;
        self
    }
}

pub trait ElementRenderer: Send + Sync {
    /// Data types this renderer can present.
    fn handled_data_types(&self) -> Vec<DataType>;

    /// Render the control for one property (HTML). Label and error markup are added by the engine.
    fn render(&self, field: &PropertySchema, ctx: &RenderContext) -> Result<String, Error>;
}

/// Remote lookup of the property schema for one mapping and context.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn get_schema(&self, key: &SchemaKey, actor: Option<&str>) -> Result<Vec<PropertySchema>, SchemaError>;
}

/// Admin-side persistence of property schema rows.
#[async_trait]
pub trait PropertySchemaStore: Send + Sync {
    async fn list_property_schemas(&self, mapping_id: &str, actor: Option<&str>) -> Result<Vec<PropertySchema>, SchemaError>;

    /// `schema.id` is ignored; the backend assigns it.
    async fn create_property_schema(&self, schema: &PropertySchema, actor: Option<&str>) -> Result<PropertySchema, SchemaError>;

    async fn bulk_create_property_schemas(
        &self,
        mapping_id: &str,
        schemas: &[PropertySchema],
        actor: Option<&str>,
    ) -> Result<Vec<PropertySchema>, SchemaError>;

    async fn update_property_schema(
        &self,
        id: &str,
        patch: &PropertySchemaPatch,
        actor: Option<&str>,
    ) -> Result<PropertySchema, SchemaError>;

    async fn delete_property_schema(&self, id: &str, actor: Option<&str>) -> Result<(), SchemaError>;

    async fn get_resource_type_cloud_mappings(&self, actor: Option<&str>) -> Result<Vec<ResourceTypeCloudMapping>, SchemaError>;
}

#[async_trait]
pub trait CloudProviderSource: Send + Sync {
    async fn list_cloud_providers(&self, actor: Option<&str>) -> Result<Vec<CloudProvider>, SchemaError>;
}
