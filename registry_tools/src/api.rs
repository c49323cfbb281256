use std::{fmt::Debug, sync::Arc, time::Duration};

use billdesk_engine::{
    registry_types::{
        ClientRecord,
        ClientStatus,
        Invoice,
        NewPayment,
        OperatorProfile,
        PaymentRecord,
        RegistryEndpoint,
    },
    traits::{RegistryBackend, RegistryError},
};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
    RequestBuilder,
    StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};

use crate::{
    config::{DEFAULT_HTTP_TIMEOUT, DEFAULT_USER_AGENT},
    credentials::Credentials,
    error::RegistryClientError,
    DeskConfig,
};

/// A registry client that speaks the registry REST surface. One client serves every registry in the directory; each
/// call names the endpoint it is for.
#[derive(Clone)]
pub struct RegistryHttpClient {
    client: Arc<Client>,
    credentials: Credentials,
}

impl Debug for RegistryHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RegistryHttpClient ({:?})", self.credentials)
    }
}

impl RegistryHttpClient {
    pub fn new(credentials: Credentials) -> Result<Self, RegistryClientError> {
        Self::build(credentials, DEFAULT_USER_AGENT, DEFAULT_HTTP_TIMEOUT)
    }

    pub fn from_config(config: &DeskConfig) -> Result<Self, RegistryClientError> {
        Self::build(config.credentials(), &config.user_agent, config.http_timeout)
    }

    fn build(credentials: Credentials, user_agent: &str, timeout: Duration) -> Result<Self, RegistryClientError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryClientError::Initialization(e.to_string()))?;
        Ok(Self { client: Arc::new(client), credentials })
    }

    /// The one place requests are created. Credentials are attached here and nowhere else.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.credentials.apply(self.client.request(method, url))
    }

    /// Sends a request and decodes the JSON response. An empty or `null` body decodes to `None`.
    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        registry: &RegistryEndpoint,
        path: &str,
        body: Option<&B>,
    ) -> Result<Option<T>, RegistryError> {
        let value = self.send(method, registry, path, body).await?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value).map(Some).map_err(|e| RegistryError::MalformedResponse(e.to_string()))
    }

    async fn send<B: Serialize>(
        &self,
        method: Method,
        registry: &RegistryEndpoint,
        path: &str,
        body: Option<&B>,
    ) -> Result<Value, RegistryError> {
        let url = registry.url(path);
        trace!("Sending REST query to {}: {method} {url}", registry.key);
        let mut req = self.request(method, &url);
        if let Some(body) = body {
            req = req.json(body);
        }
        let response = req.send().await.map_err(|e| RegistryError::Unreachable(e.to_string()))?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!("Registry {} refused the credentials for {url}", registry.key);
            return Err(RegistryError::AuthRequired);
        }
        if status.is_server_error() {
            let message = response.text().await.unwrap_or_default();
            return Err(RegistryError::Unreachable(format!("{status}. {message}")));
        }
        if !status.is_success() {
            let message = response.text().await.map_err(|e| RegistryError::Unreachable(e.to_string()))?;
            return Err(RegistryError::Rejected { status: status.as_u16(), message });
        }
        let text = response.text().await.map_err(|e| RegistryError::Unreachable(e.to_string()))?;
        trace!("REST query successful. {status}. {text}");
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| RegistryError::MalformedResponse(e.to_string()))
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        registry: &RegistryEndpoint,
        path: &str,
    ) -> Result<Vec<T>, RegistryError> {
        let list = self.rest_query::<Vec<T>, ()>(Method::GET, registry, path, None).await?;
        Ok(list.unwrap_or_default())
    }
}

impl RegistryBackend for RegistryHttpClient {
    async fn search_by_identity(
        &self,
        registry: &RegistryEndpoint,
        query: &str,
    ) -> Result<Vec<ClientRecord>, RegistryError> {
        let path = format!("clientByIdentity/{}", urlencoding::encode(query));
        debug!("Searching {} for '{query}'", registry.key);
        self.get_list(registry, &path).await
    }

    async fn fetch_invoices(&self, registry: &RegistryEndpoint, client_id: i64) -> Result<Vec<Invoice>, RegistryError> {
        self.get_list(registry, &format!("clients/{client_id}/bills")).await
    }

    async fn fetch_last_payments(
        &self,
        registry: &RegistryEndpoint,
        client_id: i64,
    ) -> Result<Vec<PaymentRecord>, RegistryError> {
        self.get_list(registry, &format!("client/{client_id}/lastPay")).await
    }

    async fn send_receipt(&self, registry: &RegistryEndpoint, payment_id: i64) -> Result<(), RegistryError> {
        self.send::<()>(Method::GET, registry, &format!("send-pay/{payment_id}"), None).await?;
        Ok(())
    }

    async fn update_status(
        &self,
        registry: &RegistryEndpoint,
        client_id: i64,
        status: &ClientStatus,
    ) -> Result<(), RegistryError> {
        let body = json!({ "estado": status.wire_value() });
        self.send(Method::PATCH, registry, &format!("clientes/{client_id}"), Some(&body)).await?;
        Ok(())
    }

    async fn create_payment(
        &self,
        registry: &RegistryEndpoint,
        payment: &NewPayment,
    ) -> Result<Option<PaymentRecord>, RegistryError> {
        let response = self.send(Method::POST, registry, "paysClient0", Some(payment)).await?;
        // Registries answer with the stored payment, a bare acknowledgement, or nothing at all
        if response.get("id").and_then(Value::as_i64).is_none() {
            return Ok(None);
        }
        match serde_json::from_value::<PaymentRecord>(response) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!("Payment stored at {}, but the echoed record could not be read. {e}", registry.key);
                Ok(None)
            },
        }
    }

    async fn who_am_i(&self, registry: &RegistryEndpoint) -> Result<OperatorProfile, RegistryError> {
        self.rest_query::<OperatorProfile, ()>(Method::GET, registry, "whoAmI", None)
            .await?
            .ok_or_else(|| RegistryError::MalformedResponse("The registry returned an empty profile".into()))
    }

    async fn list_operators(&self, registry: &RegistryEndpoint) -> Result<Vec<OperatorProfile>, RegistryError> {
        self.get_list(registry, "users").await
    }
}
