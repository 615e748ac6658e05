use crate::error::{EditorError, RenderError};
use crate::registry::TypeRegistry;
use crate::render::{sort_for_display, FormEngine};
use crate::schema::{PropertySchema, PropertySchemaPatch, ResourceTypeCloudMapping, ValidationErrors, ValueSet};
use crate::traits::{PropertySchemaStore, RenderContext};
use crate::validation::Validator;
use futures::future::join_all;
use log::{info, warn};
use std::collections::HashSet;
use std::sync::Arc;

const MAX_PROPERTY_NAME: usize = 100;
const MAX_DISPLAY_NAME: usize = 200;
const MAX_DESCRIPTION: usize = 1000;

/// How the editor finds the mapping whose rows it manages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MappingSelector {
    Id(String),
    Pair {
        resource_type_id: String,
        cloud_provider_id: String,
    },
}

/// Admin editor for the property schema rows of one mapping.
///
/// Every mutation is followed by a reload so the rows always reflect the
/// server's order and ids.
pub struct SchemaEditor {
    store: Arc<dyn PropertySchemaStore>,
    actor: Option<String>,
    mapping: Option<ResourceTypeCloudMapping>,
    mapping_id: Option<String>,
    rows: Vec<PropertySchema>,
}

impl SchemaEditor {
    pub fn new(store: Arc<dyn PropertySchemaStore>, actor: Option<String>) -> Self {
        Self { store, actor, mapping: None, mapping_id: None, rows: Vec::new() }
    }

    /// Rows of the loaded mapping, in display order.
    pub fn rows(&self) -> &[PropertySchema] {
        &self.rows
    }

    pub fn mapping(&self) -> Option<&ResourceTypeCloudMapping> {
        self.mapping.as_ref()
    }

    pub fn mapping_id(&self) -> Option<&str> {
        self.mapping_id.as_deref()
    }

    pub async fn load(&mut self, selector: MappingSelector) -> Result<&[PropertySchema], EditorError> {
        let mappings = self.store.get_resource_type_cloud_mappings(self.actor()).await;
        let mapping = match (&selector, mappings) {
            (MappingSelector::Id(id), Ok(mappings)) => mappings.into_iter().find(|m| &m.id == id),
            (MappingSelector::Id(id), Err(e)) => {
                // The rows can still be listed by id without the mapping's metadata.
                warn!("Could not load mapping details for {}: {}", id, e);
                None
            }
            (MappingSelector::Pair { resource_type_id, cloud_provider_id }, Ok(mappings)) => Some(
                mappings
                    .into_iter()
                    .find(|m| &m.resource_type_id == resource_type_id && &m.cloud_provider_id == cloud_provider_id)
                    .ok_or_else(|| EditorError::MappingNotFound {
                        resource_type_id: resource_type_id.clone(),
                        cloud_provider_id: cloud_provider_id.clone(),
                    })?,
            ),
            (MappingSelector::Pair { .. }, Err(e)) => return Err(e.into()),
        };

        self.mapping_id = Some(match (&selector, &mapping) {
            (_, Some(m)) => m.id.clone(),
            (MappingSelector::Id(id), None) => id.clone(),
            (MappingSelector::Pair { .. }, None) => return Err(EditorError::NoMapping),
        });
        self.mapping = mapping;
        self.reload().await?;
        Ok(&self.rows)
    }

    pub async fn reload(&mut self) -> Result<&[PropertySchema], EditorError> {
        let mapping_id = self.mapping_id.clone().ok_or(EditorError::NoMapping)?;
        let rows = self.store.list_property_schemas(&mapping_id, self.actor()).await?;
        self.rows = sort_for_display(rows);
        Ok(&self.rows)
    }

    pub async fn create(&mut self, draft: PropertySchema) -> Result<PropertySchema, EditorError> {
        let mapping_id = self.mapping_id.clone().ok_or(EditorError::NoMapping)?;
        check_draft(&draft)?;
        if self.rows.iter().any(|r| r.property_name == draft.property_name) {
            return Err(EditorError::DuplicatePropertyName(draft.property_name));
        }
        if let Some(issue) = default_value_issue(&draft) {
            warn!("Default value of '{}' does not satisfy its own rules: {}", draft.property_name, issue);
        }

        let draft = draft.with_mapping(mapping_id);
        let created = self.store.create_property_schema(&draft, self.actor()).await?;
        info!("Created property schema '{}' ({})", created.property_name, created.id);
        self.reload().await?;
        Ok(created)
    }

    /// Creates several rows at once. The whole batch is rejected if any name collides.
    pub async fn bulk_create(&mut self, drafts: Vec<PropertySchema>) -> Result<Vec<PropertySchema>, EditorError> {
        let mapping_id = self.mapping_id.clone().ok_or(EditorError::NoMapping)?;
        let mut seen = HashSet::new();
        for draft in &drafts {
            check_draft(draft)?;
            if !seen.insert(draft.property_name.as_str()) {
                return Err(EditorError::DuplicateInBatch(draft.property_name.clone()));
            }
        }
        if let Some(existing) = self.rows.iter().find(|r| seen.contains(r.property_name.as_str())) {
            return Err(EditorError::DuplicatePropertyName(existing.property_name.clone()));
        }

        let drafts: Vec<PropertySchema> = drafts.into_iter().map(|d| d.with_mapping(mapping_id.clone())).collect();
        let created = self.store.bulk_create_property_schemas(&mapping_id, &drafts, self.actor()).await?;
        info!("Created {} property schemas for mapping {}", created.len(), mapping_id);
        self.reload().await?;
        Ok(created)
    }

    pub async fn update(&mut self, id: &str, patch: PropertySchemaPatch) -> Result<PropertySchema, EditorError> {
        if let Some(name) = &patch.display_name {
            check_text("Display name", name, MAX_DISPLAY_NAME)?;
        }
        if let Some(description) = &patch.description {
            check_length("Description", description, MAX_DESCRIPTION)?;
        }
        let updated = self.store.update_property_schema(id, &patch, self.actor()).await?;
        self.reload().await?;
        Ok(updated)
    }

    pub async fn delete(&mut self, id: &str) -> Result<(), EditorError> {
        self.store.delete_property_schema(id, self.actor()).await?;
        info!("Deleted property schema {}", id);
        self.reload().await?;
        Ok(())
    }

    /// Moves the row at `from` to `to` (drag and drop) and persists the new order.
    ///
    /// Each row's order becomes its index. Only rows whose order changed are
    /// patched, all in one batch; the list is reloaded afterwards either way.
    pub async fn reorder(&mut self, from: usize, to: usize) -> Result<&[PropertySchema], EditorError> {
        let len = self.rows.len();
        if from >= len {
            return Err(EditorError::IndexOutOfRange { index: from, len });
        }
        if to >= len {
            return Err(EditorError::IndexOutOfRange { index: to, len });
        }

        let mut reordered = self.rows.clone();
        let moved = reordered.remove(from);
        reordered.insert(to, moved);

        let updates: Vec<(String, i32)> = reordered
            .iter()
            .enumerate()
            .filter_map(|(index, row)| {
                let order = i32::try_from(index).ok()?;
                (row.display_order != Some(order)).then(|| (row.id.clone(), order))
            })
            .collect();

        let actor = self.actor.clone();
        let store = Arc::clone(&self.store);
        let results = join_all(updates.iter().map(|(id, order)| {
            let store = Arc::clone(&store);
            let actor = actor.clone();
            let patch = PropertySchemaPatch::display_order(*order);
            async move { store.update_property_schema(id, &patch, actor.as_deref()).await }
        }))
        .await;

        let mut failures = results.into_iter().filter_map(Result::err);
        let Some(first) = failures.next() else {
            self.reload().await?;
            return Ok(&self.rows);
        };
        let reported = 1 + failures.count();
        warn!("{} of {} display order updates failed: {}", reported, updates.len(), first);

        // The server may have applied a write it reported as failed; the reloaded rows decide.
        let reloaded = self.reload().await.map(|_| ());
        let failed = match reloaded {
            Ok(()) => updates.len() - self.count_applied(&updates),
            Err(e) => {
                warn!("Could not reload property schemas after a failed reorder: {}", e);
                reported
            }
        };
        Err(EditorError::Reorder { failed: failed.max(1), total: updates.len(), first })
    }

    /// Renders the rows exactly as the runtime form would, with every control disabled.
    pub fn preview(&self, registry: &TypeRegistry) -> Result<String, RenderError> {
        self.preview_with(registry, &ValueSet::new(), &ValidationErrors::new())
    }

    pub fn preview_with(
        &self,
        registry: &TypeRegistry,
        values: &ValueSet,
        errors: &ValidationErrors,
    ) -> Result<String, RenderError> {
        let ctx = RenderContext::new(values, errors).disabled(true);
        let fields = FormEngine::new(registry).render_fields(&self.rows, &ctx)?;
        Ok(format!(r#"<div class="idp-dynamic-form idp-form-preview">{}</div>"#, fields))
    }

    fn count_applied(&self, updates: &[(String, i32)]) -> usize {
        updates
            .iter()
            .filter(|(id, order)| self.rows.iter().any(|r| &r.id == id && r.display_order == Some(*order)))
            .count()
    }

    fn actor(&self) -> Option<&str> {
        self.actor.as_deref()
    }
}

/// Explains why a draft's default value would be rejected by its own rules, if it would.
pub fn default_value_issue(draft: &PropertySchema) -> Option<String> {
    let default = draft.default_value.as_ref().filter(|d| !d.is_null())?;
    Validator.validate_property(draft, Some(default))
}

fn check_draft(draft: &PropertySchema) -> Result<(), EditorError> {
    check_text("Property name", &draft.property_name, MAX_PROPERTY_NAME)?;
    check_text("Display name", &draft.display_name, MAX_DISPLAY_NAME)?;
    if let Some(description) = &draft.description {
        check_length("Description", description, MAX_DESCRIPTION)?;
    }
    Ok(())
}

fn check_text(field: &'static str, value: &str, max: usize) -> Result<(), EditorError> {
    if value.trim().is_empty() {
        return Err(EditorError::MissingField(field));
    }
    check_length(field, value, max)
}

fn check_length(field: &'static str, value: &str, max: usize) -> Result<(), EditorError> {
    if value.chars().count() > max {
        return Err(EditorError::FieldTooLong { field, max });
    }
    Ok(())
}
