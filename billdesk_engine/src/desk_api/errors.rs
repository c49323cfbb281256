use thiserror::Error;

use crate::{
    desk_api::exchange_objects::ConversionError,
    directory::DirectoryError,
    registry_types::{ClientStatus, RegistryKey},
    traits::{RateError, RegistryError},
};

fn failed_note(failed: &[RegistryKey]) -> String {
    if failed.is_empty() {
        String::default()
    } else {
        let keys = failed.iter().map(|k| k.to_string()).collect::<Vec<String>>().join(", ");
        format!(" (registries that could not be searched: {keys})")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("Unknown registry: {0}")]
    UnknownRegistry(RegistryKey),
    #[error("Registry {registry} could not be reached. {reason}")]
    RegistryUnreachable { registry: RegistryKey, reason: String },
    #[error("Registry {0} requires (re-)authentication")]
    AuthRequired(RegistryKey),
    #[error("Registry {registry} rejected the request. Error {status}. {message}")]
    Rejected { registry: RegistryKey, status: u16, message: String },
    #[error("Registry {registry} sent a response that could not be understood. {reason}")]
    MalformedResponse { registry: RegistryKey, reason: String },
    #[error("Search for a name, national id or phone number")]
    InvalidQuery,
    /// No candidate registry returned a match. `failed` lists the candidates that could not be searched at all, so
    /// callers can tell "no match anywhere" apart from "nobody answered".
    #[error("No subscriber matched the search{}", failed_note(.failed))]
    NotFound { failed: Vec<RegistryKey> },
    #[error("Client {client_id} is no longer returned by registry {registry}")]
    ClientVanished { registry: RegistryKey, client_id: i64 },
    #[error("Client {0} is not one of this search's matches")]
    NotAMatch(i64),
}

impl LookupError {
    pub fn from_registry(registry: &RegistryKey, e: RegistryError) -> Self {
        let registry = registry.clone();
        match e {
            RegistryError::Unreachable(reason) => Self::RegistryUnreachable { registry, reason },
            RegistryError::AuthRequired => Self::AuthRequired(registry),
            RegistryError::Rejected { status, message } => Self::Rejected { registry, status, message },
            RegistryError::MalformedResponse(reason) => Self::MalformedResponse { registry, reason },
        }
    }

    pub fn is_auth_required(&self) -> bool {
        matches!(self, Self::AuthRequired(_))
    }
}

impl From<DirectoryError> for LookupError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::UnknownRegistry(key) | DirectoryError::DuplicateRegistry(key) => Self::UnknownRegistry(key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("Unknown registry: {0}")]
    UnknownRegistry(RegistryKey),
    #[error("Registry {registry} could not be reached. {reason}")]
    RegistryUnreachable { registry: RegistryKey, reason: String },
    #[error("Registry {0} requires (re-)authentication")]
    AuthRequired(RegistryKey),
    #[error("Registry {registry} rejected the request. Error {status}. {message}")]
    Rejected { registry: RegistryKey, status: u16, message: String },
    #[error("Registry {registry} sent a response that could not be understood. {reason}")]
    MalformedResponse { registry: RegistryKey, reason: String },
    #[error("Invalid payment. {0}")]
    InvalidPayment(String),
    #[error("A client cannot be set to '{0}'. Only Active and Suspended are allowed")]
    InvalidTransition(ClientStatus),
    #[error("The client has no payments, so there is no receipt to send")]
    NothingToSend,
}

impl PaymentError {
    pub fn from_registry(registry: &RegistryKey, e: RegistryError) -> Self {
        let registry = registry.clone();
        match e {
            RegistryError::Unreachable(reason) => Self::RegistryUnreachable { registry, reason },
            RegistryError::AuthRequired => Self::AuthRequired(registry),
            RegistryError::Rejected { status, message } => Self::Rejected { registry, status, message },
            RegistryError::MalformedResponse(reason) => Self::MalformedResponse { registry, reason },
        }
    }

    pub fn is_auth_required(&self) -> bool {
        matches!(self, Self::AuthRequired(_))
    }
}

impl From<DirectoryError> for PaymentError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::UnknownRegistry(key) | DirectoryError::DuplicateRegistry(key) => Self::UnknownRegistry(key),
        }
    }
}

impl From<crate::registry_types::UnknownPaymentMethod> for PaymentError {
    fn from(e: crate::registry_types::UnknownPaymentMethod) -> Self {
        Self::InvalidPayment(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeApiError {
    #[error(transparent)]
    Rate(#[from] RateError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}
