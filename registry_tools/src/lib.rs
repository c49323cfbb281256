//! HTTP adapters for the billing desk engine.
//!
//! [`RegistryHttpClient`] implements the engine's `RegistryBackend` over a registry's REST surface, and
//! [`QuoteSourceClient`] implements `ExchangeRateProvider` against the official quote source. [`DeskConfig`] reads
//! everything both of them need from the environment.
mod api;
mod config;
mod credentials;
mod error;
mod rate_source;

pub use api::RegistryHttpClient;
pub use config::{parse_registry_list, DeskConfig, DEFAULT_HTTP_TIMEOUT, DEFAULT_RATE_FIELD, DEFAULT_USER_AGENT};
pub use credentials::Credentials;
pub use error::{ConfigError, RegistryClientError};
pub use rate_source::QuoteSourceClient;
