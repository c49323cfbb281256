//! Session affinity.
//!
//! Once a federated search finds a subscriber, every later operation on that subscriber must go to the registry that
//! returned it. A [`ResolvedSession`] binds the subscriber to that registry. It can only be created by a successful
//! search, so holding one is proof that the binding exists.
use log::*;

use crate::{
    desk_api::errors::LookupError,
    registry_types::{ClientRecord, RegistryKey},
};

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSession {
    registry_key: RegistryKey,
    client: ClientRecord,
    matches: Vec<ClientRecord>,
}

impl ResolvedSession {
    /// The first match becomes the focused client. Returns `None` when there are no matches.
    pub(crate) fn new(registry_key: RegistryKey, matches: Vec<ClientRecord>) -> Option<Self> {
        let client = matches.first()?.clone();
        Some(Self { registry_key, client, matches })
    }

    /// The registry every operation on this session is sent to.
    pub fn registry_key(&self) -> &RegistryKey {
        &self.registry_key
    }

    pub fn client(&self) -> &ClientRecord {
        &self.client
    }

    pub fn client_id(&self) -> i64 {
        self.client.id
    }

    /// Every record the winning registry returned for the search.
    pub fn matches(&self) -> &[ClientRecord] {
        &self.matches
    }

    /// Switches to another record from the same search. The registry binding cannot change.
    pub fn focus(&mut self, client_id: i64) -> Result<&ClientRecord, LookupError> {
        let client = self.matches.iter().find(|c| c.id == client_id).ok_or(LookupError::NotAMatch(client_id))?;
        self.client = client.clone();
        debug!("🔎️ Session on {} now focused on client {client_id}", self.registry_key);
        Ok(&self.client)
    }

    pub(crate) fn replace_client(&mut self, fresh: ClientRecord) {
        if let Some(m) = self.matches.iter_mut().find(|c| c.id == fresh.id) {
            *m = fresh.clone();
        }
        self.client = fresh;
    }
}

/// Marks one search. Only the most recent ticket may commit its result to a [`SessionSlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchTicket(u64);

/// Holds the current session on behalf of an interactive front end.
///
/// Starting a new search clears the slot straight away, so nothing can act on the previous subscriber while the
/// search runs. Results from a search that has since been superseded are dropped.
#[derive(Debug, Default)]
pub struct SessionSlot {
    generation: u64,
    session: Option<ResolvedSession>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_search(&mut self) -> SearchTicket {
        self.generation += 1;
        self.session = None;
        SearchTicket(self.generation)
    }

    /// Stores `session` if `ticket` belongs to the latest search. Returns whether it was stored.
    pub fn commit(&mut self, ticket: SearchTicket, session: ResolvedSession) -> bool {
        if ticket.0 != self.generation {
            debug!("🔎️ Dropping result of superseded search #{}", ticket.0);
            return false;
        }
        self.session = Some(session);
        true
    }

    pub fn current(&self) -> Option<&ResolvedSession> {
        self.session.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut ResolvedSession> {
        self.session.as_mut()
    }

    pub fn clear(&mut self) {
        self.session = None;
    }
}
