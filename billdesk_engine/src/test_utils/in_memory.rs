//! An in-memory set of registries for tests.
//!
//! Every call is logged with the registry it was sent to, so tests can assert that a session never leaks to another
//! registry. Individual registries can be made to fail or to answer slowly.
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use billdesk_common::RefAmount;

use crate::{
    registry_types::{
        ClientRecord,
        ClientStatus,
        Invoice,
        NewPayment,
        OperatorProfile,
        PaymentRecord,
        RegistryEndpoint,
        RegistryKey,
    },
    traits::{RegistryBackend, RegistryError},
};

#[derive(Debug, Clone, PartialEq)]
pub enum RegistryCall {
    Search { registry: RegistryKey, query: String },
    Invoices { registry: RegistryKey, client_id: i64 },
    LastPayments { registry: RegistryKey, client_id: i64 },
    SendReceipt { registry: RegistryKey, payment_id: i64 },
    UpdateStatus { registry: RegistryKey, client_id: i64, status: ClientStatus },
    CreatePayment { registry: RegistryKey, payment: NewPayment },
    WhoAmI { registry: RegistryKey },
    ListOperators { registry: RegistryKey },
}

impl RegistryCall {
    pub fn registry(&self) -> &RegistryKey {
        match self {
            Self::Search { registry, .. } |
            Self::Invoices { registry, .. } |
            Self::LastPayments { registry, .. } |
            Self::SendReceipt { registry, .. } |
            Self::UpdateStatus { registry, .. } |
            Self::CreatePayment { registry, .. } |
            Self::WhoAmI { registry } |
            Self::ListOperators { registry } => registry,
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    clients: Vec<ClientRecord>,
    invoices: HashMap<i64, Vec<Invoice>>,
    /// Newest first, per client.
    payments: HashMap<i64, Vec<PaymentRecord>>,
    operators: Vec<OperatorProfile>,
    failure: Option<RegistryError>,
    delay: Option<Duration>,
    echo_payments: bool,
    next_payment_id: i64,
}

#[derive(Debug, Default)]
pub struct InMemoryRegistries {
    registries: Mutex<HashMap<RegistryKey, RegistryState>>,
    calls: Mutex<Vec<RegistryCall>>,
}

impl InMemoryRegistries {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, HashMap<RegistryKey, RegistryState>> {
        self.registries.lock().expect("registry state lock poisoned")
    }

    fn with_registry<K: Into<RegistryKey>, T>(&self, key: K, f: impl FnOnce(&mut RegistryState) -> T) -> T {
        let mut state = self.state();
        let registry = state.entry(key.into()).or_insert_with(|| RegistryState { next_payment_id: 1, ..Default::default() });
        f(registry)
    }

    pub fn add_client<K: Into<RegistryKey>>(&self, key: K, client: ClientRecord) {
        self.with_registry(key, |r| r.clients.push(client));
    }

    pub fn add_invoice<K: Into<RegistryKey>>(&self, key: K, client_id: i64, invoice: Invoice) {
        self.with_registry(key, |r| r.invoices.entry(client_id).or_default().push(invoice));
    }

    /// Adds a historical payment. Later additions count as more recent.
    pub fn add_payment<K: Into<RegistryKey>>(&self, key: K, client_id: i64, payment: PaymentRecord) {
        self.with_registry(key, |r| {
            if let Some(id) = payment.id {
                r.next_payment_id = r.next_payment_id.max(id + 1);
            }
            r.payments.entry(client_id).or_default().insert(0, payment)
        });
    }

    pub fn add_operator<K: Into<RegistryKey>>(&self, key: K, operator: OperatorProfile) {
        self.with_registry(key, |r| r.operators.push(operator));
    }

    /// Every call to this registry fails with `error` until [`Self::recover`] is called.
    pub fn fail_with<K: Into<RegistryKey>>(&self, key: K, error: RegistryError) {
        self.with_registry(key, |r| r.failure = Some(error));
    }

    pub fn recover<K: Into<RegistryKey>>(&self, key: K) {
        self.with_registry(key, |r| r.failure = None);
    }

    pub fn delay<K: Into<RegistryKey>>(&self, key: K, delay: Duration) {
        self.with_registry(key, |r| r.delay = Some(delay));
    }

    /// When set, the registry returns the stored record from payment creation.
    pub fn echo_payments<K: Into<RegistryKey>>(&self, key: K, echo: bool) {
        self.with_registry(key, |r| r.echo_payments = echo);
    }

    pub fn client<K: Into<RegistryKey>>(&self, key: K, client_id: i64) -> Option<ClientRecord> {
        self.with_registry(key, |r| r.clients.iter().find(|c| c.id == client_id).cloned())
    }

    pub fn remove_client<K: Into<RegistryKey>>(&self, key: K, client_id: i64) {
        self.with_registry(key, |r| r.clients.retain(|c| c.id != client_id));
    }

    pub fn payments<K: Into<RegistryKey>>(&self, key: K, client_id: i64) -> Vec<PaymentRecord> {
        self.with_registry(key, |r| r.payments.get(&client_id).cloned().unwrap_or_default())
    }

    pub fn calls(&self) -> Vec<RegistryCall> {
        self.calls.lock().expect("call log lock poisoned").clone()
    }

    pub fn calls_to<K: Into<RegistryKey>>(&self, key: K) -> Vec<RegistryCall> {
        let key = key.into();
        self.calls().into_iter().filter(|c| c.registry() == &key).collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().expect("call log lock poisoned").clear();
    }

    /// Logs the call, waits for the configured delay, then runs `f` unless the registry is set to fail.
    async fn handle<T>(
        &self,
        call: RegistryCall,
        f: impl FnOnce(&mut RegistryState) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let key = call.registry().clone();
        self.calls.lock().expect("call log lock poisoned").push(call);
        let delay = self.with_registry(key.clone(), |r| r.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.with_registry(key, |r| {
            if let Some(e) = r.failure.clone() {
                return Err(e);
            }
            f(r)
        })
    }
}

fn not_found(what: &str) -> RegistryError {
    RegistryError::Rejected { status: 404, message: format!("{what} not found") }
}

fn matches_query(client: &ClientRecord, query: &str) -> bool {
    let query = query.to_lowercase();
    client.identification.to_lowercase() == query ||
        client.name.to_lowercase().contains(&query) ||
        client.phone.as_deref().map(|p| p.contains(&query)).unwrap_or(false)
}

impl RegistryBackend for InMemoryRegistries {
    async fn search_by_identity(
        &self,
        registry: &RegistryEndpoint,
        query: &str,
    ) -> Result<Vec<ClientRecord>, RegistryError> {
        let call = RegistryCall::Search { registry: registry.key.clone(), query: query.to_string() };
        self.handle(call, |r| Ok(r.clients.iter().filter(|c| matches_query(c, query)).cloned().collect())).await
    }

    async fn fetch_invoices(&self, registry: &RegistryEndpoint, client_id: i64) -> Result<Vec<Invoice>, RegistryError> {
        let call = RegistryCall::Invoices { registry: registry.key.clone(), client_id };
        self.handle(call, |r| Ok(r.invoices.get(&client_id).cloned().unwrap_or_default())).await
    }

    async fn fetch_last_payments(
        &self,
        registry: &RegistryEndpoint,
        client_id: i64,
    ) -> Result<Vec<PaymentRecord>, RegistryError> {
        let call = RegistryCall::LastPayments { registry: registry.key.clone(), client_id };
        self.handle(call, |r| Ok(r.payments.get(&client_id).cloned().unwrap_or_default())).await
    }

    async fn send_receipt(&self, registry: &RegistryEndpoint, payment_id: i64) -> Result<(), RegistryError> {
        let call = RegistryCall::SendReceipt { registry: registry.key.clone(), payment_id };
        self.handle(call, |r| {
            let exists = r.payments.values().flatten().any(|p| p.id == Some(payment_id));
            if exists {
                Ok(())
            } else {
                Err(not_found("Payment"))
            }
        })
        .await
    }

    async fn update_status(
        &self,
        registry: &RegistryEndpoint,
        client_id: i64,
        status: &ClientStatus,
    ) -> Result<(), RegistryError> {
        let call = RegistryCall::UpdateStatus { registry: registry.key.clone(), client_id, status: status.clone() };
        self.handle(call, |r| {
            let client = r.clients.iter_mut().find(|c| c.id == client_id).ok_or_else(|| not_found("Client"))?;
            client.status = status.clone();
            Ok(())
        })
        .await
    }

    async fn create_payment(
        &self,
        registry: &RegistryEndpoint,
        payment: &NewPayment,
    ) -> Result<Option<PaymentRecord>, RegistryError> {
        let call = RegistryCall::CreatePayment { registry: registry.key.clone(), payment: payment.clone() };
        self.handle(call, |r| {
            let client =
                r.clients.iter_mut().find(|c| c.id == payment.client_id).ok_or_else(|| not_found("Client"))?;
            client.balance += RefAmount::from(payment.amount_reference);
            let mut record = payment.to_record();
            record.id = Some(r.next_payment_id);
            r.next_payment_id += 1;
            r.payments.entry(payment.client_id).or_default().insert(0, record.clone());
            Ok(r.echo_payments.then_some(record))
        })
        .await
    }

    async fn who_am_i(&self, registry: &RegistryEndpoint) -> Result<OperatorProfile, RegistryError> {
        let call = RegistryCall::WhoAmI { registry: registry.key.clone() };
        self.handle(call, |r| r.operators.first().cloned().ok_or(RegistryError::AuthRequired)).await
    }

    async fn list_operators(&self, registry: &RegistryEndpoint) -> Result<Vec<OperatorProfile>, RegistryError> {
        let call = RegistryCall::ListOperators { registry: registry.key.clone() };
        self.handle(call, |r| Ok(r.operators.clone())).await
    }
}
