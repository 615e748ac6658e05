pub mod schema;
pub mod error;
pub mod traits;
pub mod registry;
pub mod validation;
pub mod defaults;
pub mod render;
pub mod cache;
pub mod controller;
pub mod authoring;

pub use schema::*;
pub use error::*;
pub use traits::*;
pub use registry::*;
pub use validation::Validator;
pub use defaults::apply_defaults;
pub use render::{escape_html, sort_for_display, FormEngine};
pub use cache::{SchemaCache, SchemaList};
pub use controller::{FieldView, FormController, FormOptions, FormState};
pub use authoring::{default_value_issue, MappingSelector, SchemaEditor};
