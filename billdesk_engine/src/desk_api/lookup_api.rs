//! Federated subscriber lookup, and the read-only operations on a resolved session.
//!
//! A search is run against an ordered list of candidate registries. The first registry (in candidate order) that
//! returns at least one match wins, and the resulting [`ResolvedSession`] is bound to it. Registries that are
//! unreachable or refuse our credentials are skipped, and reported in [`LookupError::NotFound`] if nobody matches. Any
//! other registry error ends the search and is returned as is.
//!
//! Probing is sequential by default. [`ProbeStrategy::Parallel`] fires every probe at once but still honours candidate
//! order: a registry's outcome (match or error) is only acted on once every earlier registry has come back empty or
//! been skipped.
use std::{collections::HashSet, fmt::Debug};

use futures_util::stream::{FuturesUnordered, StreamExt};
use log::*;

use crate::{
    desk_api::{errors::LookupError, session::ResolvedSession},
    directory::RegistryDirectory,
    registry_types::{ClientRecord, Invoice, OperatorProfile, PaymentRecord, RegistryEndpoint, RegistryKey},
    traits::{RegistryBackend, RegistryError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeStrategy {
    #[default]
    Sequential,
    Parallel,
}

enum Outcome {
    Matched(Vec<ClientRecord>),
    Empty,
    Skipped,
    Failed(RegistryError),
}

/// How a federated search ended when no registry error stopped it.
type Federated = Result<(RegistryKey, Vec<ClientRecord>), Vec<RegistryKey>>;

pub struct ClientLookupApi<B> {
    backend: B,
    directory: RegistryDirectory,
    strategy: ProbeStrategy,
}

impl<B: Debug> Debug for ClientLookupApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ClientLookupApi ({:?}, {} registries, {:?})", self.backend, self.directory.len(), self.strategy)
    }
}

impl<B> ClientLookupApi<B>
where B: RegistryBackend
{
    pub fn new(backend: B, directory: RegistryDirectory) -> Self {
        Self { backend, directory, strategy: ProbeStrategy::default() }
    }

    pub fn with_strategy(mut self, strategy: ProbeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn directory(&self) -> &RegistryDirectory {
        &self.directory
    }

    pub fn strategy(&self) -> ProbeStrategy {
        self.strategy
    }

    /// Searches a single registry. An empty result is not an error here.
    pub async fn search_one(&self, query: &str, registry: &RegistryKey) -> Result<Vec<ClientRecord>, LookupError> {
        let query = normalize_query(query)?;
        let endpoint = self.directory.resolve(registry)?;
        self.backend
            .search_by_identity(endpoint, query)
            .await
            .map_err(|e| LookupError::from_registry(registry, e))
    }

    /// Searches `candidates` in order and binds the session to the first registry with a match.
    ///
    /// Every candidate key is checked against the directory before anything is sent, so an unknown key fails with
    /// [`LookupError::UnknownRegistry`] without probing any registry. A key listed more than once is searched at its
    /// first position only.
    pub async fn search_federated(
        &self,
        query: &str,
        candidates: &[RegistryKey],
    ) -> Result<ResolvedSession, LookupError> {
        let query = normalize_query(query)?;
        let mut endpoints = self.directory.resolve_all(candidates)?;
        dedup_keep_first(&mut endpoints);
        debug!("🔎️ Searching {} registries ({:?}) for '{query}'", endpoints.len(), self.strategy);
        let outcome = match self.strategy {
            ProbeStrategy::Sequential => self.probe_sequentially(&endpoints, query).await,
            ProbeStrategy::Parallel => self.probe_in_parallel(&endpoints, query).await,
        }?;
        match outcome {
            Ok((key, matches)) => {
                info!("🔎️ {} match(es) for '{query}' at registry {key}", matches.len());
                ResolvedSession::new(key, matches).ok_or(LookupError::NotFound { failed: vec![] })
            },
            Err(failed) => {
                info!("🔎️ No match for '{query}' in {} registries", endpoints.len());
                Err(LookupError::NotFound { failed })
            },
        }
    }

    /// Federated search over every configured registry, in configuration order.
    pub async fn search_all(&self, query: &str) -> Result<ResolvedSession, LookupError> {
        let candidates = self.directory.keys();
        self.search_federated(query, &candidates).await
    }

    /// Re-reads the focused client from its registry and updates the session in place.
    ///
    /// The registry is searched with the client's identification and the record with the same id is kept. If it is no
    /// longer there, the session is left untouched and [`LookupError::ClientVanished`] is returned.
    pub async fn refresh(&self, session: &mut ResolvedSession) -> Result<ClientRecord, LookupError> {
        let registry = session.registry_key().clone();
        let client_id = session.client_id();
        let results = self.search_one(&session.client().identification, &registry).await?;
        let fresh = results
            .into_iter()
            .find(|c| c.id == client_id)
            .ok_or(LookupError::ClientVanished { registry, client_id })?;
        trace!("🔎️ Refreshed client {client_id}: {fresh:?}");
        session.replace_client(fresh.clone());
        Ok(fresh)
    }

    pub async fn list_invoices(&self, session: &ResolvedSession) -> Result<Vec<Invoice>, LookupError> {
        let endpoint = self.directory.resolve(session.registry_key())?;
        self.backend
            .fetch_invoices(endpoint, session.client_id())
            .await
            .map_err(|e| LookupError::from_registry(&endpoint.key, e))
    }

    /// The client's most recent payment, if there is one.
    pub async fn last_payment(&self, session: &ResolvedSession) -> Result<Option<PaymentRecord>, LookupError> {
        let endpoint = self.directory.resolve(session.registry_key())?;
        fetch_last_payment(&self.backend, endpoint, session.client_id())
            .await
            .map_err(|e| LookupError::from_registry(&endpoint.key, e))
    }

    /// The operator the registry's credentials belong to.
    pub async fn who_am_i(&self, registry: &RegistryKey) -> Result<OperatorProfile, LookupError> {
        let endpoint = self.directory.resolve(registry)?;
        self.backend.who_am_i(endpoint).await.map_err(|e| LookupError::from_registry(registry, e))
    }

    pub async fn list_operators(&self, registry: &RegistryKey) -> Result<Vec<OperatorProfile>, LookupError> {
        let endpoint = self.directory.resolve(registry)?;
        self.backend.list_operators(endpoint).await.map_err(|e| LookupError::from_registry(registry, e))
    }

    async fn probe(&self, endpoint: &RegistryEndpoint, query: &str) -> Outcome {
        match self.backend.search_by_identity(endpoint, query).await {
            Ok(matches) if matches.is_empty() => {
                trace!("🔎️ {} has no match", endpoint.key);
                Outcome::Empty
            },
            Ok(matches) => Outcome::Matched(matches),
            Err(e @ (RegistryError::Unreachable(_) | RegistryError::AuthRequired)) => {
                warn!("🔎️ Skipping registry {} during search. {e}", endpoint.key);
                Outcome::Skipped
            },
            Err(e) => {
                warn!("🔎️ Registry {} failed the search. {e}", endpoint.key);
                Outcome::Failed(e)
            },
        }
    }

    async fn probe_sequentially(&self, endpoints: &[&RegistryEndpoint], query: &str) -> Result<Federated, LookupError> {
        let mut failed = Vec::new();
        for endpoint in endpoints {
            match self.probe(endpoint, query).await {
                Outcome::Matched(matches) => return Ok(Ok((endpoint.key.clone(), matches))),
                Outcome::Empty => {},
                Outcome::Skipped => failed.push(endpoint.key.clone()),
                Outcome::Failed(e) => return Err(LookupError::from_registry(&endpoint.key, e)),
            }
        }
        Ok(Err(failed))
    }

    async fn probe_in_parallel(&self, endpoints: &[&RegistryEndpoint], query: &str) -> Result<Federated, LookupError> {
        let mut pending = endpoints
            .iter()
            .enumerate()
            .map(|(i, endpoint)| async move { (i, self.probe(endpoint, query).await) })
            .collect::<FuturesUnordered<_>>();
        let mut outcomes: Vec<Option<Outcome>> = endpoints.iter().map(|_| None).collect();
        let mut failed = Vec::new();
        // Index of the earliest candidate whose outcome has not been consumed yet.
        let mut next = 0;
        while let Some((i, outcome)) = pending.next().await {
            outcomes[i] = Some(outcome);
            while next < outcomes.len() {
                match outcomes[next].take() {
                    None => break,
                    Some(Outcome::Matched(matches)) => {
                        if !pending.is_empty() {
                            debug!("🔎️ Cancelling {} outstanding probes", pending.len());
                        }
                        return Ok(Ok((endpoints[next].key.clone(), matches)));
                    },
                    Some(Outcome::Empty) => next += 1,
                    Some(Outcome::Skipped) => {
                        failed.push(endpoints[next].key.clone());
                        next += 1;
                    },
                    Some(Outcome::Failed(e)) => return Err(LookupError::from_registry(&endpoints[next].key, e)),
                }
            }
        }
        Ok(Err(failed))
    }
}

pub(crate) async fn fetch_last_payment<B: RegistryBackend>(
    backend: &B,
    endpoint: &RegistryEndpoint,
    client_id: i64,
) -> Result<Option<PaymentRecord>, RegistryError> {
    let payments = backend.fetch_last_payments(endpoint, client_id).await?;
    Ok(payments.into_iter().next())
}

fn dedup_keep_first(endpoints: &mut Vec<&RegistryEndpoint>) {
    let mut seen = HashSet::new();
    endpoints.retain(|ep| seen.insert(ep.key.clone()));
}

fn normalize_query(query: &str) -> Result<&str, LookupError> {
    let query = query.trim();
    if query.is_empty() {
        Err(LookupError::InvalidQuery)
    } else {
        Ok(query)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn blank_queries_are_invalid() {
        assert_eq!(normalize_query("   "), Err(LookupError::InvalidQuery));
        assert_eq!(normalize_query(" V-123 "), Ok("V-123"));
    }
}
