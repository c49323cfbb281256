use std::{env, time::Duration};

use billdesk_common::{parse_boolean_flag, Secret};
use billdesk_engine::{registry_types::RegistryEndpoint, DirectoryError, ProbeStrategy, RegistryDirectory};
use log::*;
use url::Url;

use crate::{credentials::Credentials, error::ConfigError};

pub const DEFAULT_RATE_FIELD: &str = "bcv";
pub const DEFAULT_USER_AGENT: &str = concat!("billdesk/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct DeskConfig {
    /// Registries in federation order.
    pub registries: Vec<RegistryEndpoint>,
    pub rate_url: Option<String>,
    /// The numeric field of the quote source's payload that holds the rate.
    pub rate_field: String,
    pub access_token: Secret<String>,
    pub parallel_probes: bool,
    pub user_agent: String,
    /// Applied to every HTTP call. Retries are never attempted.
    pub http_timeout: Duration,
    /// Set when `BILLDESK_REGISTRIES` could not be parsed. `registries` is empty in that case.
    pub registry_error: Option<ConfigError>,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            registries: Vec::new(),
            rate_url: None,
            rate_field: DEFAULT_RATE_FIELD.to_string(),
            access_token: Secret::default(),
            parallel_probes: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            registry_error: None,
        }
    }
}

impl DeskConfig {
    pub fn from_env_or_default() -> Self {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source. Invalid values are logged and replaced by defaults. An
    /// invalid registry list is also kept in `registry_error`, so that callers can refuse to start.
    pub fn from_vars<F>(var: F) -> Self
    where F: Fn(&str) -> Option<String> {
        let mut registry_error = None;
        let registries = match var("BILLDESK_REGISTRIES") {
            Some(list) => parse_registry_list(&list).unwrap_or_else(|e| {
                error!("🪛️ BILLDESK_REGISTRIES is invalid. {e}. No registries are configured.");
                registry_error = Some(e);
                Vec::new()
            }),
            None => {
                warn!("🪛️ BILLDESK_REGISTRIES is not set. No registries are configured.");
                Vec::new()
            },
        };
        let rate_url = var("BILLDESK_RATE_URL").filter(|s| !s.trim().is_empty());
        if rate_url.is_none() {
            warn!("🪛️ BILLDESK_RATE_URL is not set. Currency conversion will be unavailable.");
        }
        let rate_field = var("BILLDESK_RATE_FIELD")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_RATE_FIELD.to_string());
        let access_token = Secret::new(var("BILLDESK_ACCESS_TOKEN").unwrap_or_else(|| {
            warn!("🪛️ BILLDESK_ACCESS_TOKEN is not set. Registry calls will be sent without credentials.");
            String::default()
        }));
        let parallel_probes = parse_boolean_flag(var("BILLDESK_PARALLEL_PROBES"), false);
        let user_agent = var("BILLDESK_USER_AGENT")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let http_timeout = var("BILLDESK_HTTP_TIMEOUT")
            .map(|s| {
                s.trim().parse::<u64>().map(Duration::from_secs).unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid number of seconds for BILLDESK_HTTP_TIMEOUT. {e} Using the default, \
                         {DEFAULT_HTTP_TIMEOUT:?}, instead."
                    );
                    DEFAULT_HTTP_TIMEOUT
                })
            })
            .unwrap_or(DEFAULT_HTTP_TIMEOUT);
        Self {
            registries,
            rate_url,
            rate_field,
            access_token,
            parallel_probes,
            user_agent,
            http_timeout,
            registry_error,
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::from(self.access_token.clone())
    }

    pub fn directory(&self) -> Result<RegistryDirectory, DirectoryError> {
        RegistryDirectory::new(self.registries.clone())
    }

    pub fn probe_strategy(&self) -> ProbeStrategy {
        if self.parallel_probes {
            ProbeStrategy::Parallel
        } else {
            ProbeStrategy::Sequential
        }
    }
}

/// Parses `key=baseUrl` entries separated by commas. Order is preserved. Base URLs must be http or https.
pub fn parse_registry_list(list: &str) -> Result<Vec<RegistryEndpoint>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (key, base_url) = entry
                .split_once('=')
                .map(|(k, u)| (k.trim(), u.trim()))
                .filter(|(k, u)| !k.is_empty() && !u.is_empty())
                .ok_or_else(|| ConfigError::InvalidRegistryEntry(entry.to_string()))?;
            validate_base_url(key, base_url)?;
            Ok(RegistryEndpoint::new(key, base_url))
        })
        .collect()
}

pub(crate) fn validate_base_url(key: &str, base_url: &str) -> Result<(), ConfigError> {
    let url = Url::parse(base_url).map_err(|e| ConfigError::InvalidUrl { key: key.to_string(), reason: e.to_string() })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ConfigError::InvalidUrl {
            key: key.to_string(),
            reason: format!("Unsupported scheme '{scheme}'"),
        }),
    }
}
