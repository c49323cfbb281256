//! Billing desk engine
//!
//! The billing desk lets operators find a subscriber across several independent billing registries, inspect their
//! account, record payments, change their service status and resend receipts. This library holds the core logic. It
//! knows nothing about HTTP: registries and the exchange-rate source are reached through the traits in [`traits`].
//!
//! The library is divided into three main sections:
//! 1. The data types ([`registry_types`]) and the [`RegistryDirectory`], the fixed list of registries the desk talks
//!    to.
//! 2. The backend contracts ([`traits`]) that adapters implement.
//! 3. The public API ([`mod@desk_api`]). [`ClientLookupApi`] runs federated searches and produces a
//!    [`ResolvedSession`], which binds a subscriber to the registry that returned it. [`PaymentApi`] performs the write
//!    operations on a session, and [`ExchangeRateApi`] handles the official rate and currency conversion.
mod desk_api;
mod directory;

pub mod registry_types;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use desk_api::{
    errors::{ExchangeApiError, LookupError, PaymentError},
    exchange_objects::{
        effective_rate,
        to_local,
        to_reference,
        ConversionError,
        ConversionRound,
        CurrencyConverter,
        ExchangeRate,
        PlanPrice,
        DEFAULT_MARKUP,
        RATE_PRECISION,
        STANDARD_PLANS,
    },
    exchange_rate_api::{CachedRateProvider, ExchangeRateApi},
    lookup_api::{ClientLookupApi, ProbeStrategy},
    payment_api::PaymentApi,
    session::{ResolvedSession, SearchTicket, SessionSlot},
};
pub use directory::{DirectoryError, RegistryDirectory};
