use billdesk_common::Secret;
use reqwest::RequestBuilder;

/// Registry credentials. A bearer token, or nothing at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    token: Option<Secret<String>>,
}

impl Credentials {
    pub fn bearer<S: Into<String>>(token: S) -> Self {
        let token = Secret::new(token.into());
        if token.is_empty() {
            return Self::anonymous();
        }
        Self { token: Some(token) }
    }

    pub fn anonymous() -> Self {
        Self { token: None }
    }

    pub fn is_anonymous(&self) -> bool {
        self.token.is_none()
    }

    pub(crate) fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token.reveal()),
            None => request,
        }
    }
}

impl From<Secret<String>> for Credentials {
    fn from(token: Secret<String>) -> Self {
        Self::bearer(token.reveal().as_str())
    }
}
