mod memory;
mod session;

pub use memory::MemoryLedger;
pub use session::Session;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Error;

const SIGNING_CONTEXT: &str = "juicechain 2024 request signing v1";

/// Remote methods exposed by a ledger node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    CreateWallet,
    Issue,
    GetAsset,
    Balance,
    Transfer,
    History,
    SetTitle,
    SetDescription,
    SetParameters,
    SetContent,
    SetMedia,
    GetMedia,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateWallet => "create_wallet",
            Self::Issue => "issue",
            Self::GetAsset => "get_asset",
            Self::Balance => "balance",
            Self::Transfer => "transfer",
            Self::History => "history",
            Self::SetTitle => "set_title",
            Self::SetDescription => "set_description",
            Self::SetParameters => "set_parameters",
            Self::SetContent => "set_content",
            Self::SetMedia => "set_media",
            Self::GetMedia => "get_media",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// API credentials for a ledger. Both halves empty means anonymous access,
/// which public and demo ledgers accept.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    key: String,
    secret: String,
}

impl Credentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_anonymous(&self) -> bool {
        self.key.is_empty() && self.secret.is_empty()
    }

    /// BLAKE3 keyed hash over `method || params`, keyed by the secret.
    pub fn sign(&self, method: Method, params: &serde_json::Value) -> String {
        let signing_key = blake3::derive_key(SIGNING_CONTEXT, self.secret.as_bytes());
        let mut hasher = blake3::Hasher::new_keyed(&signing_key);
        hasher.update(method.as_str().as_bytes());
        hasher.update(params.to_string().as_bytes());
        hasher.finalize().to_hex().to_string()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// One request/response exchange with a ledger node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub ledger: String,
    pub method: Method,
    pub params: serde_json::Value,
    pub key: Option<String>,
    pub signature: Option<String>,
}

impl Request {
    pub fn new(ledger: impl Into<String>, method: Method, params: serde_json::Value) -> Self {
        Self {
            ledger: ledger.into(),
            method,
            params,
            key: None,
            signature: None,
        }
    }

    pub fn signed(mut self, credentials: &Credentials) -> Self {
        if !credentials.is_anonymous() {
            self.signature = Some(credentials.sign(self.method, &self.params));
            self.key = Some(credentials.key().to_string());
        }
        self
    }

    /// Checks the request against the credentials a ledger expects.
    pub fn verify(&self, credentials: &Credentials) -> bool {
        if credentials.is_anonymous() {
            return true;
        }
        match (&self.key, &self.signature) {
            (Some(key), Some(signature)) => {
                key == credentials.key() && *signature == credentials.sign(self.method, &self.params)
            }
            _ => false,
        }
    }
}

/// Transport to a ledger node.
///
/// Implementors deliver the request and return the node's answer. Delivery is
/// not assumed to be at-most-once: a request may reach the node even when the
/// caller sees a failure, so callers re-query state instead of assuming a
/// rollback.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn call(&self, request: Request) -> Result<serde_json::Value, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_anonymous_requests_are_unsigned() {
        let request = Request::new("demo", Method::CreateWallet, json!({}))
            .signed(&Credentials::default());
        assert!(request.key.is_none());
        assert!(request.signature.is_none());
        assert!(request.verify(&Credentials::default()));
    }

    #[test]
    fn test_signature_binds_params() {
        let creds = Credentials::new("key-1", "s3cret");
        let mut request =
            Request::new("demo", Method::Transfer, json!({ "quantity": 2 })).signed(&creds);
        assert!(request.verify(&creds));
        assert!(!request.verify(&Credentials::new("key-1", "other")));

        request.params = json!({ "quantity": 200 });
        assert!(!request.verify(&creds));
    }

    #[test]
    fn test_credentials_debug_hides_secret() {
        let creds = Credentials::new("key-1", "s3cret");
        assert!(!format!("{:?}", creds).contains("s3cret"));
    }
}
