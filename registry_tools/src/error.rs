use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryClientError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid quote source URL: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid registry entry '{0}'. Use key=baseUrl")]
    InvalidRegistryEntry(String),
    #[error("Invalid base URL for registry {key}. {reason}")]
    InvalidUrl { key: String, reason: String },
}
