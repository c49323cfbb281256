use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Result};
use billdesk_common::Secret;
use billdesk_engine::{
    registry_types::RegistryKey,
    CachedRateProvider,
    ClientLookupApi,
    ExchangeRateApi,
    LookupError,
    PaymentApi,
    PaymentError,
    ResolvedSession,
};
use log::*;
use registry_tools::{DeskConfig, QuoteSourceClient, RegistryHttpClient};

use crate::progress::spinner;

/// How long a fetched exchange rate is reused before the quote source is asked again.
pub const RATE_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

pub type Registries = Arc<RegistryHttpClient>;
pub type RateSource = CachedRateProvider<QuoteSourceClient>;

/// Everything the commands need, built once from the merged configuration.
pub struct Desk {
    config: DeskConfig,
    lookup: ClientLookupApi<Registries>,
    payments: PaymentApi<Registries>,
    rates: Option<ExchangeRateApi<RateSource>>,
}

impl Desk {
    pub fn new(config: DeskConfig) -> Result<Self> {
        if let Some(e) = &config.registry_error {
            bail!("BILLDESK_REGISTRIES is invalid. {e}");
        }
        let directory = config.directory()?;
        if directory.is_empty() {
            bail!("No registries are configured. Set BILLDESK_REGISTRIES or add registries to ~/.billdesk/config.toml");
        }
        let client = Arc::new(RegistryHttpClient::from_config(&config)?);
        if config.access_token.is_empty() {
            warn!("🔑️ Registry calls will be sent without credentials");
        }
        let lookup = ClientLookupApi::new(Arc::clone(&client), directory.clone()).with_strategy(config.probe_strategy());
        let payments = PaymentApi::new(client, directory);
        let rates = QuoteSourceClient::from_config(&config)
            .transpose()?
            .map(|source| ExchangeRateApi::new(CachedRateProvider::new(source, RATE_CACHE_TTL)));
        debug!("Desk ready: {lookup:?}");
        Ok(Self { config, lookup, payments, rates })
    }

    /// Rebuilds the desk with a new access token. The current configuration is otherwise kept.
    pub fn with_token(&self, token: String) -> Result<Self> {
        let mut config = self.config.clone();
        config.access_token = Secret::new(token);
        Self::new(config)
    }

    pub fn lookup(&self) -> &ClientLookupApi<Registries> {
        &self.lookup
    }

    pub fn payments(&self) -> &PaymentApi<Registries> {
        &self.payments
    }

    pub fn rates(&self) -> Result<&ExchangeRateApi<RateSource>> {
        self.rates.as_ref().ok_or_else(|| anyhow!("No quote source is configured. Set BILLDESK_RATE_URL."))
    }

    /// The registries to search, in order. Every configured registry when `requested` is empty. Repeated keys are
    /// dropped.
    pub fn candidates(&self, requested: &[String]) -> Vec<RegistryKey> {
        if requested.is_empty() {
            return self.lookup.directory().keys();
        }
        let mut candidates = Vec::with_capacity(requested.len());
        for key in requested.iter().map(|k| RegistryKey::from(k.trim())) {
            if !candidates.contains(&key) {
                candidates.push(key);
            }
        }
        candidates
    }

    /// Runs a federated search, then focuses `client_id` among the matches when one is given.
    pub async fn resolve(&self, query: &str, registries: &[String], client_id: Option<i64>) -> Result<ResolvedSession> {
        let candidates = self.candidates(registries);
        let pb = spinner(format!("Searching {} registries for '{query}'...", candidates.len()));
        let result = self.lookup.search_federated(query, &candidates).await;
        pb.finish_and_clear();
        let mut session = result?;
        if let Some(id) = client_id {
            session.focus(id)?;
        }
        Ok(session)
    }
}

/// Adds a hint to errors that mean the operator has to supply a (new) access token.
pub fn explain(e: anyhow::Error) -> anyhow::Error {
    let auth = e.downcast_ref::<LookupError>().is_some_and(LookupError::is_auth_required) ||
        e.downcast_ref::<PaymentError>().is_some_and(PaymentError::is_auth_required);
    if auth {
        e.context("Authentication required. Set BILLDESK_ACCESS_TOKEN (or token_envar in the config file)")
    } else {
        e
    }
}
