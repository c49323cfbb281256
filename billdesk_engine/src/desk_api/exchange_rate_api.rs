//! Access to the official exchange rate, and the conversions that depend on it.

use std::{
    fmt::Debug,
    time::{Duration, Instant},
};

use log::*;
use tokio::sync::Mutex;

use crate::{
    desk_api::{
        errors::ExchangeApiError,
        exchange_objects::{ConversionRound, CurrencyConverter, ExchangeRate, PlanPrice},
    },
    traits::{ExchangeRateProvider, RateError},
};

pub struct ExchangeRateApi<P> {
    provider: P,
    converter: CurrencyConverter,
}

impl<P> Debug for ExchangeRateApi<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ExchangeRateApi (markup: {})", self.converter.markup())
    }
}

impl<P> ExchangeRateApi<P>
where P: ExchangeRateProvider
{
    pub fn new(provider: P) -> Self {
        Self { provider, converter: CurrencyConverter::default() }
    }

    pub fn with_converter(mut self, converter: CurrencyConverter) -> Self {
        self.converter = converter;
        self
    }

    pub fn converter(&self) -> &CurrencyConverter {
        &self.converter
    }

    /// Fetches the current rate. A rate that is zero or negative is treated as unavailable.
    pub async fn fetch_rate(&self) -> Result<ExchangeRate, RateError> {
        let rate = self.provider.fetch_rate().await?;
        if !rate.is_usable() {
            warn!("💱️ Quote source reported an unusable rate: {}", rate.value);
            return Err(RateError::RateUnavailable(format!("The quote source reported a rate of {}", rate.value)));
        }
        debug!("💱️ Current rate: {rate}");
        Ok(rate)
    }

    /// Fetches the current rate and pins it for one payment form.
    pub async fn begin_round(&self) -> Result<ConversionRound, ExchangeApiError> {
        let rate = self.fetch_rate().await?;
        Ok(self.converter.round(rate)?)
    }

    /// Standard plan prices at the current rate.
    pub async fn plan_prices(&self) -> Result<Vec<PlanPrice>, ExchangeApiError> {
        let rate = self.fetch_rate().await?;
        Ok(self.converter.plan_prices(&rate)?)
    }
}

/// Wraps a provider and reuses its last rate for `ttl`.
///
/// Failed fetches are never cached.
pub struct CachedRateProvider<P> {
    inner: P,
    ttl: Duration,
    cached: Mutex<Option<(Instant, ExchangeRate)>>,
}

impl<P> Debug for CachedRateProvider<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CachedRateProvider (ttl: {:?})", self.ttl)
    }
}

impl<P> CachedRateProvider<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self { inner, ttl, cached: Mutex::new(None) }
    }

    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}

impl<P: ExchangeRateProvider> ExchangeRateProvider for CachedRateProvider<P> {
    async fn fetch_rate(&self) -> Result<ExchangeRate, RateError> {
        let mut cached = self.cached.lock().await;
        if let Some((fetched_at, rate)) = cached.as_ref() {
            if fetched_at.elapsed() < self.ttl {
                trace!("💱️ Using cached rate {rate}");
                return Ok(rate.clone());
            }
        }
        let rate = self.inner.fetch_rate().await?;
        *cached = Some((Instant::now(), rate.clone()));
        Ok(rate)
    }
}
