use thiserror::Error;

/// Classified failure of a call to the schema backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Nothing is configured for the requested resource. Expected for some resource types.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Transient, worth retrying.
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("{0}")]
    Unknown(String),
}

impl SchemaError {
    /// Classifies by HTTP status. Without a status the raw message is kept as `Unknown`.
    pub fn classify(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            Some(404) => SchemaError::NotFound(message),
            Some(401) | Some(403) => SchemaError::Unauthorized(message),
            Some(status) if (500..600).contains(&status) => SchemaError::ServerError { status, message },
            _ => SchemaError::Unknown(message),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SchemaError::NotFound(_))
    }

    /// Whether the failure is shown as a banner with a retry action.
    pub fn offers_retry(&self) -> bool {
        !self.is_not_found()
    }

    pub fn user_message(&self) -> String {
        match self {
            SchemaError::NotFound(_) => {
                "No configurable properties are defined for this resource type on the selected cloud provider.".to_string()
            }
            SchemaError::Unauthorized(_) => {
                "You do not have permission to view these properties. Please contact an administrator.".to_string()
            }
            SchemaError::ServerError { .. } => {
                "The server could not load the property schema. Please try again.".to_string()
            }
            SchemaError::Unknown(message) => message.clone(),
        }
    }
}

/// Failure while turning a form into markup.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("No renderer found for component '{0}'")]
    MissingRenderer(String),

    #[error("Failed to render field '{field}' with component '{component}'")]
    Element {
        field: String,
        component: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Failure of a schema authoring operation.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("No mapping is loaded")]
    NoMapping,

    #[error("No mapping found for resource type '{resource_type_id}' and cloud provider '{cloud_provider_id}'")]
    MappingNotFound {
        resource_type_id: String,
        cloud_provider_id: String,
    },

    #[error("Property with name '{0}' already exists for this mapping")]
    DuplicatePropertyName(String),

    #[error("Duplicate property names found in bulk create request: {0}")]
    DuplicateInBatch(String),

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{field} must be at most {max} characters")]
    FieldTooLong { field: &'static str, max: usize },

    #[error("Row {index} is out of range for {len} rows")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("{failed} of {total} display order updates failed: {first}")]
    Reorder {
        failed: usize,
        total: usize,
        first: SchemaError,
    },

    #[error(transparent)]
    Store(#[from] SchemaError),
}
