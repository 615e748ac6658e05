use idp_forms::registry::TypeRegistry;
use idp_forms::render::escape_html;
use idp_forms::schema::{format_number, DataType, ListRules, PropertySchema, PropertyValue, ValidationRules};
use idp_forms::traits::{ElementRenderer, RenderContext};
use anyhow::{anyhow, Error, Result};
use log::{debug, warn};
use std::sync::Arc;

/// Attributes shared by every control: identity, required/disabled flags and error state.
fn common_attrs(field: &PropertySchema, ctx: &RenderContext) -> String {
    let name = escape_html(&field.property_name);
    let mut attrs = format!(r#"id="{name}" name="{name}""#);
    if field.required {
        attrs.push_str(r#" required aria-required="true""#);
    }
    if ctx.disabled {
        attrs.push_str(" disabled");
    }
    if ctx.errors.contains_key(&field.property_name) {
        attrs.push_str(r#" aria-invalid="true""#);
    }
    attrs
}

fn current_value<'a>(field: &PropertySchema, ctx: &'a RenderContext) -> Option<&'a PropertyValue> {
    ctx.values.get(&field.property_name).filter(|v| !v.is_null())
}

pub struct TextInputRenderer;

impl ElementRenderer for TextInputRenderer {
    fn handled_data_types(&self) -> Vec<DataType> {
        vec![DataType::String]
    }

    fn render(&self, field: &PropertySchema, ctx: &RenderContext) -> Result<String, Error> {
        let mut attrs = common_attrs(field, ctx);
        if let ValidationRules::String(rules) = &field.rules {
            if let Some(max) = rules.max_length {
                attrs.push_str(&format!(r#" maxlength="{}""#, max));
            }
            if let Some(min) = rules.min_length {
                attrs.push_str(&format!(r#" minlength="{}""#, min));
            }
            if let Some(pattern) = &rules.pattern {
                attrs.push_str(&format!(r#" pattern="{}""#, escape_html(pattern)));
            }
        }
        let value = current_value(field, ctx).and_then(PropertyValue::as_text).unwrap_or_default();
        Ok(format!(
            r#"<input type="text" {attrs} class="form-control" value="{}" />"#,
            escape_html(&value)
        ))
    }
}

pub struct NumberInputRenderer;

impl ElementRenderer for NumberInputRenderer {
    fn handled_data_types(&self) -> Vec<DataType> {
        vec![DataType::Number]
    }

    fn render(&self, field: &PropertySchema, ctx: &RenderContext) -> Result<String, Error> {
        let mut attrs = common_attrs(field, ctx);
        if let ValidationRules::Number(rules) = &field.rules {
            if let Some(min) = rules.min {
                attrs.push_str(&format!(r#" min="{}""#, format_number(min)));
            }
            if let Some(max) = rules.max {
                attrs.push_str(&format!(r#" max="{}""#, format_number(max)));
            }
        }
        // A value that does not parse is shown as typed so the user can correct it.
        let value = current_value(field, ctx).and_then(PropertyValue::as_text).unwrap_or_default();
        Ok(format!(
            r#"<input type="number" {attrs} class="form-control" value="{}" />"#,
            escape_html(&value)
        ))
    }
}

pub struct CheckboxRenderer;

impl ElementRenderer for CheckboxRenderer {
    fn handled_data_types(&self) -> Vec<DataType> {
        vec![DataType::Boolean]
    }

    fn render(&self, field: &PropertySchema, ctx: &RenderContext) -> Result<String, Error> {
        let attrs = common_attrs(field, ctx);
        // Anything that is not a recognisable boolean shows as unchecked.
        let checked = match current_value(field, ctx) {
            Some(value) => value.as_bool().unwrap_or_else(|| {
                warn!("Value {:?} of '{}' is not a boolean, rendering it unchecked", value, field.property_name);
                false
            }),
            None => false,
        };
        let checked = if checked { " checked" } else { "" };
        Ok(format!(r#"<input type="checkbox" {attrs} class="form-check-input" value="true"{checked} />"#))
    }
}

pub struct SelectRenderer;

impl SelectRenderer {
    fn options(rules: &ListRules, selected: &[String], required: bool, multiple: bool) -> String {
        let mut out = String::new();
        if !multiple && (!required || selected.is_empty()) {
            out.push_str(r#"<option value="">-- Select --</option>"#);
        }
        for allowed in &rules.allowed_values {
            let mark = if selected.contains(&allowed.value) { " selected" } else { "" };
            out.push_str(&format!(
                r#"<option value="{}"{}>{}</option>"#,
                escape_html(&allowed.value),
                mark,
                escape_html(allowed.display_label())
            ));
        }
        // Keep a stored value that is no longer allowed visible so validation can flag it.
        for stale in selected.iter().filter(|s| !rules.allows(s)) {
            debug!("Rendering value '{}' that is not among the allowed values", stale);
            out.push_str(&format!(r#"<option value="{0}" selected>{0}</option>"#, escape_html(stale)));
        }
        out
    }
}

impl ElementRenderer for SelectRenderer {
    fn handled_data_types(&self) -> Vec<DataType> {
        vec![DataType::List]
    }

    fn render(&self, field: &PropertySchema, ctx: &RenderContext) -> Result<String, Error> {
        let ValidationRules::List(rules) = &field.rules else {
            return Err(anyhow!("'{}' is {} but a list control was requested", field.property_name, field.data_type()));
        };
        let value = current_value(field, ctx);
        let multiple = matches!(value, Some(PropertyValue::List(_))) || rules.max_items.map_or(false, |n| n > 1);
        let selected: Vec<String> = match value {
            Some(PropertyValue::List(items)) => items.clone(),
            Some(scalar) => scalar.as_text().into_iter().collect(),
            None => Vec::new(),
        };

        let mut attrs = common_attrs(field, ctx);
        if multiple {
            attrs.push_str(" multiple");
        }

        if rules.allowed_values.is_empty() {
            // Free-form list: comma separated entries.
            return Ok(format!(
                r#"<input type="text" {attrs} class="form-control" data-list="true" value="{}" />"#,
                escape_html(&selected.join(", "))
            ));
        }

        Ok(format!(
            r#"<select {attrs} class="form-select">{}</select>"#,
            Self::options(rules, &selected, field.required, multiple)
        ))
    }
}

/// Registers the built-in controls under the component names used by
/// `TypeRegistry::with_default_mappings`.
pub fn register_standard_renderers(registry: &mut TypeRegistry) {
    registry.register_element_renderer("text-input", Arc::new(TextInputRenderer));
    registry.register_element_renderer("number-input", Arc::new(NumberInputRenderer));
    registry.register_element_renderer("checkbox", Arc::new(CheckboxRenderer));
    registry.register_element_renderer("select-input", Arc::new(SelectRenderer));
}

/// Default mappings plus the built-in controls.
pub fn standard_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::with_default_mappings();
    register_standard_renderers(&mut registry);
    registry
}
