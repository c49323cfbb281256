use std::sync::Arc;

use thiserror::Error;

use crate::registry_types::{
    ClientRecord,
    ClientStatus,
    Invoice,
    NewPayment,
    OperatorProfile,
    PaymentRecord,
    RegistryEndpoint,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Network failure, timeout or a 5xx response.
    #[error("Registry could not be reached. {0}")]
    Unreachable(String),
    /// The registry answered 401. The caller must re-authenticate; nothing is retried.
    #[error("The registry requires (re-)authentication")]
    AuthRequired,
    #[error("The registry rejected the request. Error {status}. {message}")]
    Rejected { status: u16, message: String },
    #[error("The registry sent a response that could not be understood. {0}")]
    MalformedResponse(String),
}

/// The surface of a single billing registry.
///
/// Implementations must not retry, cache or re-route: every call goes to exactly the endpoint it is given. Affinity
/// is decided by the caller.
#[allow(async_fn_in_trait)]
pub trait RegistryBackend {
    /// Free-text identity search (name, national id or phone). An empty vector means "no match".
    async fn search_by_identity(
        &self,
        registry: &RegistryEndpoint,
        query: &str,
    ) -> Result<Vec<ClientRecord>, RegistryError>;

    async fn fetch_invoices(&self, registry: &RegistryEndpoint, client_id: i64) -> Result<Vec<Invoice>, RegistryError>;

    /// Most recent payments for the client, newest first.
    async fn fetch_last_payments(
        &self,
        registry: &RegistryEndpoint,
        client_id: i64,
    ) -> Result<Vec<PaymentRecord>, RegistryError>;

    /// Asks the registry to send the receipt for `payment_id` to the subscriber.
    async fn send_receipt(&self, registry: &RegistryEndpoint, payment_id: i64) -> Result<(), RegistryError>;

    async fn update_status(
        &self,
        registry: &RegistryEndpoint,
        client_id: i64,
        status: &ClientStatus,
    ) -> Result<(), RegistryError>;

    /// Creates a payment. Registries may or may not echo the stored record back.
    async fn create_payment(
        &self,
        registry: &RegistryEndpoint,
        payment: &NewPayment,
    ) -> Result<Option<PaymentRecord>, RegistryError>;

    async fn who_am_i(&self, registry: &RegistryEndpoint) -> Result<OperatorProfile, RegistryError>;

    async fn list_operators(&self, registry: &RegistryEndpoint) -> Result<Vec<OperatorProfile>, RegistryError>;
}

macro_rules! forward_registry_backend {
    ($wrapper:ty) => {
        impl<T: RegistryBackend + ?Sized> RegistryBackend for $wrapper {
            async fn search_by_identity(
                &self,
                registry: &RegistryEndpoint,
                query: &str,
            ) -> Result<Vec<ClientRecord>, RegistryError> {
                (**self).search_by_identity(registry, query).await
            }

            async fn fetch_invoices(
                &self,
                registry: &RegistryEndpoint,
                client_id: i64,
            ) -> Result<Vec<Invoice>, RegistryError> {
                (**self).fetch_invoices(registry, client_id).await
            }

            async fn fetch_last_payments(
                &self,
                registry: &RegistryEndpoint,
                client_id: i64,
            ) -> Result<Vec<PaymentRecord>, RegistryError> {
                (**self).fetch_last_payments(registry, client_id).await
            }

            async fn send_receipt(&self, registry: &RegistryEndpoint, payment_id: i64) -> Result<(), RegistryError> {
                (**self).send_receipt(registry, payment_id).await
            }

            async fn update_status(
                &self,
                registry: &RegistryEndpoint,
                client_id: i64,
                status: &ClientStatus,
            ) -> Result<(), RegistryError> {
                (**self).update_status(registry, client_id, status).await
            }

            async fn create_payment(
                &self,
                registry: &RegistryEndpoint,
                payment: &NewPayment,
            ) -> Result<Option<PaymentRecord>, RegistryError> {
                (**self).create_payment(registry, payment).await
            }

            async fn who_am_i(&self, registry: &RegistryEndpoint) -> Result<OperatorProfile, RegistryError> {
                (**self).who_am_i(registry).await
            }

            async fn list_operators(&self, registry: &RegistryEndpoint) -> Result<Vec<OperatorProfile>, RegistryError> {
                (**self).list_operators(registry).await
            }
        }
    };
}

forward_registry_backend!(&T);
forward_registry_backend!(Arc<T>);
