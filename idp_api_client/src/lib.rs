pub mod client;
pub mod config;
pub mod error;

pub use client::{IdpApiClient, ResourceSchema, ACTOR_HEADER};
pub use config::{ClientConfig, ConfigError, API_KEY_ENV};
pub use error::ApiError;
