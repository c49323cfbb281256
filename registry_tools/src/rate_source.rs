use std::{str::FromStr, time::Duration};

use billdesk_engine::{
    traits::{ExchangeRateProvider, RateError},
    ExchangeRate,
};
use chrono::Utc;
use log::*;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use url::Url;

use crate::{
    config::{DEFAULT_HTTP_TIMEOUT, DEFAULT_RATE_FIELD, DEFAULT_USER_AGENT},
    error::RegistryClientError,
    DeskConfig,
};

/// Reads the official rate from a quote source that publishes a JSON object with one numeric field.
///
/// Every call fetches afresh. Wrap it in `CachedRateProvider` for a time-to-live cache.
#[derive(Debug, Clone)]
pub struct QuoteSourceClient {
    client: Client,
    url: Url,
    field: String,
}

impl QuoteSourceClient {
    pub fn new(url: &str) -> Result<Self, RegistryClientError> {
        Self::build(url, DEFAULT_RATE_FIELD, DEFAULT_USER_AGENT, DEFAULT_HTTP_TIMEOUT)
    }

    /// `None` when no quote source is configured.
    pub fn from_config(config: &DeskConfig) -> Option<Result<Self, RegistryClientError>> {
        let url = config.rate_url.as_deref()?;
        Some(Self::build(url, &config.rate_field, &config.user_agent, config.http_timeout))
    }

    pub fn with_field<S: Into<String>>(mut self, field: S) -> Self {
        self.field = field.into();
        self
    }

    fn build(url: &str, field: &str, user_agent: &str, timeout: Duration) -> Result<Self, RegistryClientError> {
        let url = Url::parse(url).map_err(|e| RegistryClientError::InvalidUrl(format!("{url}. {e}")))?;
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryClientError::Initialization(e.to_string()))?;
        Ok(Self { client, url, field: field.to_string() })
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

impl ExchangeRateProvider for QuoteSourceClient {
    async fn fetch_rate(&self) -> Result<ExchangeRate, RateError> {
        trace!("💱️ Fetching rate from {}", self.url);
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| RateError::RateUnavailable(format!("The quote source could not be reached. {e}")))?;
        if !response.status().is_success() {
            return Err(RateError::RateUnavailable(format!("The quote source answered {}", response.status())));
        }
        let payload = response
            .json::<Value>()
            .await
            .map_err(|e| RateError::RateUnavailable(format!("The quote source sent invalid JSON. {e}")))?;
        let value = rate_from_payload(&payload, &self.field)?;
        debug!("💱️ Quote source rate: {value}");
        Ok(ExchangeRate::new(value, Some(Utc::now())))
    }
}

/// Extracts a strictly positive rate from `payload[field]`. Numbers and numeric strings (with either decimal
/// separator) are accepted.
fn rate_from_payload(payload: &Value, field: &str) -> Result<Decimal, RateError> {
    let raw = match payload.get(field) {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.trim().replace(',', "."),
        _ => return Err(RateError::RateUnavailable(format!("The quote source payload has no numeric '{field}' field"))),
    };
    let value = Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|e| RateError::RateUnavailable(format!("'{raw}' is not a valid rate. {e}")))?;
    if value <= Decimal::ZERO {
        return Err(RateError::RateUnavailable(format!("The quote source reported a rate of {value}")));
    }
    Ok(value)
}

#[cfg(test)]
mod test {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    #[test]
    fn rates_from_payloads() {
        assert_eq!(rate_from_payload(&json!({ "bcv": 36.5 }), "bcv").unwrap(), dec!(36.5));
        assert_eq!(rate_from_payload(&json!({ "bcv": "36,72" }), "bcv").unwrap(), dec!(36.72));
        assert_eq!(rate_from_payload(&json!({ "precio": 40 }), "precio").unwrap(), dec!(40));
        assert!(rate_from_payload(&json!({ "bcv": 0 }), "bcv").is_err());
        assert!(rate_from_payload(&json!({ "bcv": -3.2 }), "bcv").is_err());
        assert!(rate_from_payload(&json!({ "bcv": "n/a" }), "bcv").is_err());
        assert!(rate_from_payload(&json!({ "usd": 36.5 }), "bcv").is_err());
        assert!(rate_from_payload(&json!(null), "bcv").is_err());
    }
}
