use crate::controller::FormState;
use crate::error::RenderError;
use crate::registry::TypeRegistry;
use crate::schema::PropertySchema;
use crate::traits::RenderContext;

pub use tera::escape_html;

/// Orders schemas for display: ascending `display_order`, entries without
/// an order last, ties keeping their original position.
pub fn sort_for_display(mut schemas: Vec<PropertySchema>) -> Vec<PropertySchema> {
    schemas.sort_by_key(|s| (s.display_order.is_none(), s.display_order));
    schemas
}

pub struct FormEngine<'a> {
    registry: &'a TypeRegistry,
}

impl<'a> FormEngine<'a> {
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Self { registry }
    }

    /// Renders whatever the controller is currently showing.
    pub fn render(&self, state: &FormState, ctx: &RenderContext) -> Result<String, RenderError> {
        match state {
            FormState::Idle => Ok(String::new()),
            FormState::Loading => {
                Ok(r#"<div class="idp-form-loading" aria-busy="true">Loading properties...</div>"#.to_string())
            }
            FormState::Empty => Ok(
                r#"<div class="idp-form-info" role="status">No configurable properties are defined for this resource type.</div>"#
                    .to_string(),
            ),
            FormState::NotConfigured(message) => Ok(format!(
                r#"<div class="idp-form-info" role="status">{}</div>"#,
                escape_html(message)
            )),
            FormState::Error(error) => Ok(format!(
                r#"<div class="idp-form-error" role="alert"><p>{}</p><button type="button" data-action="retry">Retry</button></div>"#,
                escape_html(&error.user_message())
            )),
            FormState::Ready(schemas) => {
                let fields = self.render_fields(schemas, ctx)?;
                Ok(format!(r#"<div class="idp-dynamic-form">{}</div>"#, fields))
            }
        }
    }

    /// Renders one group per schema, in the order given. Callers pass
    /// schemas already ordered by `sort_for_display`.
    pub fn render_fields(&self, schemas: &[PropertySchema], ctx: &RenderContext) -> Result<String, RenderError> {
        let mut output = String::new();
        for field in schemas {
            output.push_str(&self.render_field(field, ctx)?);
        }
        Ok(output)
    }

    pub fn render_field(&self, field: &PropertySchema, ctx: &RenderContext) -> Result<String, RenderError> {
        let component_name = self
            .registry
            .resolve_component_config(field.data_type())
            .map(|c| c.component.clone())
            .unwrap_or_else(|| "text-input".to_string());

        let renderer = self
            .registry
            .get_element_renderer(&component_name)
            .ok_or_else(|| RenderError::MissingRenderer(component_name.clone()))?;

        let control = renderer.render(field, ctx).map_err(|source| RenderError::Element {
            field: field.property_name.clone(),
            component: component_name.clone(),
            source,
        })?;

        let name = escape_html(&field.property_name);
        let mut group = format!(r#"<div class="form-group" data-property="{}">"#, name);
        if ctx.show_labels {
            let marker = if field.required { r#" <span class="required">*</span>"# } else { "" };
            group.push_str(&format!(
                r#"<label for="{}">{}{}</label>"#,
                name,
                escape_html(&field.display_name),
                marker
            ));
        }
        group.push_str(&control);
        if let Some(error) = ctx.errors.get(&field.property_name) {
            group.push_str(&format!(r#"<div class="field-error" role="alert">{}</div>"#, escape_html(error)));
        }
        if let Some(description) = field.description.as_deref().filter(|d| !d.is_empty()) {
            group.push_str(&format!(r#"<small class="form-text">{}</small>"#, escape_html(description)));
        }
        group.push_str("</div>");
        Ok(group)
    }
}
