use std::sync::Arc;

use thiserror::Error;

use crate::desk_api::exchange_objects::ExchangeRate;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateError {
    #[error("The exchange rate is unavailable: {0}")]
    RateUnavailable(String),
}

#[allow(async_fn_in_trait)]
pub trait ExchangeRateProvider {
    /// Fetch the current official rate (local currency units per reference currency unit). Fails with
    /// [`RateError::RateUnavailable`] when the quote source cannot be reached or its payload has no usable rate.
    async fn fetch_rate(&self) -> Result<ExchangeRate, RateError>;
}

impl<T: ExchangeRateProvider + ?Sized> ExchangeRateProvider for &T {
    async fn fetch_rate(&self) -> Result<ExchangeRate, RateError> {
        (**self).fetch_rate().await
    }
}

impl<T: ExchangeRateProvider + ?Sized> ExchangeRateProvider for Arc<T> {
    async fn fetch_rate(&self) -> Result<ExchangeRate, RateError> {
        (**self).fetch_rate().await
    }
}
