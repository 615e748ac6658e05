use crate::cache::SchemaCache;
use crate::defaults::apply_defaults;
use crate::error::{RenderError, SchemaError};
use crate::registry::TypeRegistry;
use crate::render::{sort_for_display, FormEngine};
use crate::schema::{PropertySchema, PropertyValue, SchemaContext, SchemaKey, ValidationErrors, ValueSet};
use crate::traits::RenderContext;
use crate::validation::Validator;
use log::{debug, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What a dynamic form is currently showing.
#[derive(Clone, Debug, PartialEq)]
pub enum FormState {
    /// No complete (resource type, cloud provider) selection.
    Idle,
    Loading,
    /// The mapping exists but declares no properties.
    Empty,
    /// No schema is configured for the mapping. Informational, no retry.
    NotConfigured(String),
    /// Fetch failed; the user can retry.
    Error(SchemaError),
    /// Properties in display order.
    Ready(Arc<Vec<PropertySchema>>),
}

impl FormState {
    pub fn schemas(&self) -> &[PropertySchema] {
        match self {
            FormState::Ready(schemas) => schemas,
            _ => &[],
        }
    }
}

#[derive(Clone, Debug)]
pub struct FormOptions {
    /// Actor identity forwarded with every schema request.
    pub user_email: Option<String>,
    /// Edit mode never applies defaults: the values come from the stored resource.
    pub is_edit_mode: bool,
    pub disabled: bool,
    pub show_labels: bool,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self { user_email: None, is_edit_mode: false, disabled: false, show_labels: true }
    }
}

/// One rendered field as seen by an embedding form.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldView {
    pub schema: PropertySchema,
    pub value: Option<PropertyValue>,
    pub error: Option<String>,
}

type ChangeListener = Box<dyn Fn(&ValueSet) + Send + Sync>;

struct FormInner {
    key: Option<SchemaKey>,
    generation: u64,
    state: FormState,
    values: ValueSet,
    errors: ValidationErrors,
}

/// Drives one dynamic property form embedded in a stack or blueprint editor.
///
/// The embedding form calls `select` whenever its resource type, cloud
/// provider or context changes. Every load carries a generation number and
/// only the newest selection may commit its response.
pub struct FormController {
    cache: Arc<SchemaCache>,
    options: FormOptions,
    inner: Mutex<FormInner>,
    on_change: Option<ChangeListener>,
}

impl FormController {
    pub fn new(cache: Arc<SchemaCache>, options: FormOptions) -> Self {
        Self {
            cache,
            options,
            inner: Mutex::new(FormInner {
                key: None,
                generation: 0,
                state: FormState::Idle,
                values: ValueSet::new(),
                errors: ValidationErrors::new(),
            }),
            on_change: None,
        }
    }

    /// Called with the full replacement value set after every change made by the form.
    pub fn on_change(mut self, listener: impl Fn(&ValueSet) + Send + Sync + 'static) -> Self {
        self.on_change = Some(Box::new(listener));
        self
    }

    pub fn with_values(self, values: ValueSet) -> Self {
        self.lock_inner().values = values;
        self
    }

    pub fn options(&self) -> &FormOptions {
        &self.options
    }

    /// Switches the form to a new selection and loads its schema.
    pub async fn select(
        &self,
        resource_type_id: Option<&str>,
        cloud_provider_id: Option<&str>,
        context: SchemaContext,
    ) -> FormState {
        let Some(key) = SchemaKey::from_selection(resource_type_id, cloud_provider_id, context) else {
            let mut inner = self.lock_inner();
            inner.generation += 1;
            inner.key = None;
            inner.state = FormState::Idle;
            inner.errors.clear();
            return FormState::Idle;
        };

        let ticket = {
            let mut inner = self.lock_inner();
            inner.generation += 1;
            inner.key = Some(key.clone());
            inner.state = FormState::Loading;
            inner.errors.clear();
            inner.generation
        };
        debug!("Loading property schema for {}", key);
        self.load(key, ticket).await
    }

    /// Re-fetches the current selection after a failure. The cache is left alone.
    pub async fn retry(&self) -> FormState {
        let (key, ticket) = {
            let mut inner = self.lock_inner();
            let key = match (&inner.state, &inner.key) {
                (FormState::Error(_), Some(key)) => key.clone(),
                _ => return inner.state.clone(),
            };
            inner.generation += 1;
            inner.state = FormState::Loading;
            (key, inner.generation)
        };
        debug!("Retrying property schema for {}", key);
        self.load(key, ticket).await
    }

    async fn load(&self, key: SchemaKey, ticket: u64) -> FormState {
        let result = self.cache.get_schema(&key, self.options.user_email.as_deref()).await;
        self.commit(&key, ticket, result)
    }

    fn commit(&self, key: &SchemaKey, ticket: u64, result: Result<Arc<Vec<PropertySchema>>, SchemaError>) -> FormState {
        let mut changed = None;
        let state = {
            let mut inner = self.lock_inner();
            if inner.generation != ticket || inner.key.as_ref() != Some(key) {
                warn!("Discarding stale schema response for {}", key);
                return inner.state.clone();
            }

            inner.state = match result {
                Ok(schemas) if schemas.is_empty() => FormState::Empty,
                Ok(schemas) => {
                    let ordered = sort_for_display(schemas.as_ref().clone());
                    if !self.options.is_edit_mode {
                        if let Some(merged) = apply_defaults(&ordered, &inner.values) {
                            inner.values = merged.clone();
                            changed = Some(merged);
                        }
                    }
                    FormState::Ready(Arc::new(ordered))
                }
                Err(e) if e.is_not_found() => FormState::NotConfigured(e.user_message()),
                Err(e) => FormState::Error(e),
            };
            inner.state.clone()
        };

        if let Some(values) = changed {
            self.emit(&values);
        }
        state
    }

    pub fn state(&self) -> FormState {
        self.lock_inner().state.clone()
    }

    pub fn values(&self) -> ValueSet {
        self.lock_inner().values.clone()
    }

    /// Replaces the working values with the parent's current copy.
    pub fn set_values(&self, values: ValueSet) {
        self.lock_inner().values = values;
    }

    /// Applies one edit and returns the replacement value set that was emitted.
    /// The field's error is cleared; nothing is re-validated until `validate_all`.
    pub fn update_field(&self, property_name: &str, value: impl Into<PropertyValue>) -> ValueSet {
        let next = {
            let mut inner = self.lock_inner();
            let mut next = inner.values.clone();
            next.insert(property_name.to_string(), value.into());
            inner.values = next.clone();
            inner.errors.remove(property_name);
            next
        };
        self.emit(&next);
        next
    }

    /// Validates the current values, stores the result for display and returns it.
    pub fn validate_all(&self) -> ValidationErrors {
        let mut inner = self.lock_inner();
        let errors = Validator.validate_all(inner.state.schemas(), &inner.values);
        inner.errors = errors.clone();
        errors
    }

    /// Shows errors produced elsewhere, typically by a rejected save.
    pub fn set_validation_errors(&self, errors: ValidationErrors) {
        self.lock_inner().errors = errors;
    }

    pub fn errors(&self) -> ValidationErrors {
        self.lock_inner().errors.clone()
    }

    pub fn fields(&self) -> Vec<FieldView> {
        let inner = self.lock_inner();
        inner
            .state
            .schemas()
            .iter()
            .map(|schema| FieldView {
                value: inner.values.get(&schema.property_name).cloned(),
                error: inner.errors.get(&schema.property_name).cloned(),
                schema: schema.clone(),
            })
            .collect()
    }

    pub fn render(&self, registry: &TypeRegistry) -> Result<String, RenderError> {
        let (state, values, errors) = {
            let inner = self.lock_inner();
            (inner.state.clone(), inner.values.clone(), inner.errors.clone())
        };
        let ctx = RenderContext::new(&values, &errors)
            .disabled(self.options.disabled)
            .show_labels(self.options.show_labels);
        FormEngine::new(registry).render(&state, &ctx)
    }

    fn emit(&self, values: &ValueSet) {
        if let Some(listener) = &self.on_change {
            listener(values);
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, FormInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
