//! Write operations on a resolved session: payments, status changes and receipts.
//!
//! All of them go to the session's registry. None of them refresh the session afterwards; call
//! [`ClientLookupApi::refresh`](crate::ClientLookupApi::refresh) to see the registry's view of the result.
use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    desk_api::{errors::PaymentError, lookup_api::fetch_last_payment, session::ResolvedSession},
    directory::RegistryDirectory,
    registry_types::{ClientStatus, NewPayment, PaymentEntry, PaymentRecord, RegistryEndpoint},
    traits::RegistryBackend,
};

pub struct PaymentApi<B> {
    backend: B,
    directory: RegistryDirectory,
}

impl<B: Debug> Debug for PaymentApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentApi ({:?})", self.backend)
    }
}

impl<B> PaymentApi<B>
where B: RegistryBackend
{
    pub fn new(backend: B, directory: RegistryDirectory) -> Self {
        Self { backend, directory }
    }

    /// Records a payment against the session's client.
    ///
    /// The entry is validated before anything is sent. If the registry does not echo the stored payment, the record
    /// that was submitted is returned instead.
    pub async fn record_payment(
        &self,
        session: &mut ResolvedSession,
        entry: PaymentEntry,
    ) -> Result<PaymentRecord, PaymentError> {
        validate_entry(&entry)?;
        let endpoint = self.endpoint(session)?;
        let payment = NewPayment::from_entry(session.client_id(), &entry, Utc::now());
        debug!("💰️ Recording payment for client {} at {}: {payment:?}", session.client_id(), endpoint.key);
        let stored = self
            .backend
            .create_payment(endpoint, &payment)
            .await
            .map_err(|e| PaymentError::from_registry(&endpoint.key, e))?;
        let record = stored.unwrap_or_else(|| payment.to_record());
        info!(
            "💰️ Payment of {} ({}) recorded for client {} at {}",
            record.amount_reference,
            record.amount_local,
            session.client_id(),
            endpoint.key
        );
        Ok(record)
    }

    /// Sets the client's service status. Only [`ClientStatus::Active`] and [`ClientStatus::Suspended`] can be set.
    pub async fn set_status(&self, session: &mut ResolvedSession, status: ClientStatus) -> Result<(), PaymentError> {
        if !status.is_settable() {
            return Err(PaymentError::InvalidTransition(status));
        }
        let endpoint = self.endpoint(session)?;
        self.backend
            .update_status(endpoint, session.client_id(), &status)
            .await
            .map_err(|e| PaymentError::from_registry(&endpoint.key, e))?;
        info!("🔌️ Client {} at {} set to {status}", session.client_id(), endpoint.key);
        Ok(())
    }

    /// Flips the client between active and suspended, and returns the status that was sent. A client in any other
    /// state is activated.
    pub async fn toggle_status(&self, session: &mut ResolvedSession) -> Result<ClientStatus, PaymentError> {
        let next = session.client().status.toggled();
        self.set_status(session, next.clone()).await?;
        Ok(next)
    }

    /// Asks the registry to send the receipt of the client's most recent payment again. Returns that payment.
    ///
    /// Nothing about the client changes, so the session is only borrowed. Every call sends another receipt.
    pub async fn resend_last_receipt(&self, session: &ResolvedSession) -> Result<PaymentRecord, PaymentError> {
        let endpoint = self.endpoint(session)?;
        let last = fetch_last_payment(&self.backend, endpoint, session.client_id())
            .await
            .map_err(|e| PaymentError::from_registry(&endpoint.key, e))?
            .ok_or(PaymentError::NothingToSend)?;
        let payment_id = last.id.ok_or_else(|| PaymentError::MalformedResponse {
            registry: endpoint.key.clone(),
            reason: "The most recent payment has no id".into(),
        })?;
        self.backend.send_receipt(endpoint, payment_id).await.map_err(|e| PaymentError::from_registry(&endpoint.key, e))?;
        info!("🧾️ Receipt for payment {payment_id} resent to client {} at {}", session.client_id(), endpoint.key);
        Ok(last)
    }

    fn endpoint(&self, session: &ResolvedSession) -> Result<&RegistryEndpoint, PaymentError> {
        Ok(self.directory.resolve(session.registry_key())?)
    }
}

fn validate_entry(entry: &PaymentEntry) -> Result<(), PaymentError> {
    if !entry.amount_reference.is_positive() {
        return Err(PaymentError::InvalidPayment(format!(
            "The amount must be greater than zero, but was {}",
            entry.amount_reference
        )));
    }
    if !entry.amount_local.is_positive() {
        return Err(PaymentError::InvalidPayment(format!(
            "The local amount must be greater than zero, but was {}",
            entry.amount_local
        )));
    }
    if entry.received_by.is_empty() {
        return Err(PaymentError::InvalidPayment("Select the operator who received the payment".into()));
    }
    if entry.reference.trim().is_empty() {
        return Err(PaymentError::InvalidPayment("The payment reference is required".into()));
    }
    Ok(())
}
