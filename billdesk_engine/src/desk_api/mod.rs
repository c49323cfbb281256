//! # Billing desk public API
//!
//! The `desk_api` module exposes the programmatic API of the billing desk. Like the backend traits, it is split by
//! concern so that a front end only takes what it needs.
//!
//! * [`lookup_api`] runs federated searches and the read-only queries on a resolved session.
//! * [`payment_api`] records payments, changes service status and resends receipts.
//! * [`exchange_rate_api`] fetches the official rate and drives currency conversion.
//!
//! # API usage
//!
//! Every API is created from a backend that implements the relevant trait, plus the registry directory where
//! affinity matters:
//!
//! ```rust,ignore
//! use billdesk_engine::{ClientLookupApi, PaymentApi, RegistryDirectory};
//! let directory = RegistryDirectory::new(endpoints)?;
//! let lookup = ClientLookupApi::new(client.clone(), directory.clone());
//! let payments = PaymentApi::new(client, directory);
//! let mut session = lookup.search_all("V-12345678").await?;
//! payments.record_payment(&mut session, entry).await?;
//! ```
pub mod errors;
pub mod exchange_objects;
pub mod exchange_rate_api;
pub mod lookup_api;
pub mod payment_api;
pub mod session;
