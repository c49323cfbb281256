//! # Backend contracts
//!
//! The engine never talks HTTP itself. Everything it needs from the outside world is expressed by the traits in this
//! module, and adapters (the `registry_tools` crate, or the in-memory registries in `test_utils`) implement them.
//!
//! * [`RegistryBackend`] is one billing registry's surface: identity search, invoices, payments, status changes and
//!   receipt dispatch. Every call names the [`RegistryEndpoint`](crate::registry_types::RegistryEndpoint) it targets,
//!   so a single backend value can serve every registry in the directory.
//! * [`ExchangeRateProvider`] fetches the current official exchange rate.
mod exchange_rates;
mod registry_backend;

pub use exchange_rates::{ExchangeRateProvider, RateError};
pub use registry_backend::{RegistryBackend, RegistryError};
