use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{Credentials, LedgerClient, Method, Request};
use crate::{Error, NodeConfig};

/// A logical connection to one named ledger.
///
/// Shared by the node and every wallet and asset handle created from it. Holds
/// no ledger state: each call goes to the ledger.
pub struct Session {
    ledger: String,
    credentials: Credentials,
    config: NodeConfig,
    client: Arc<dyn LedgerClient>,
}

impl Session {
    pub fn new(
        ledger: impl Into<String>,
        credentials: Credentials,
        config: NodeConfig,
        client: Arc<dyn LedgerClient>,
    ) -> Self {
        Self {
            ledger: ledger.into(),
            credentials,
            config,
            client,
        }
    }

    pub fn ledger(&self) -> &str {
        &self.ledger
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Issues one remote call and waits at most `call_timeout` for the answer.
    ///
    /// On timeout the request may still be applied by the ledger; the call is
    /// not retried here.
    pub async fn call<P, R>(&self, method: Method, params: &P) -> Result<R, Error>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let params = serde_json::to_value(params).map_err(|e| Error::Serialize(e.to_string()))?;
        let request = Request::new(self.ledger.clone(), method, params).signed(&self.credentials);

        tracing::debug!(ledger = %self.ledger, method = method.as_str(), "ledger call");

        let start = Instant::now();
        let outcome =
            match tokio::time::timeout(self.config.call_timeout, self.client.call(request)).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(method)),
            };

        histogram!("juicechain.call.duration_ms", "method" => method.as_str())
            .record(start.elapsed().as_millis() as f64);
        counter!("juicechain.calls.total",
            "method" => method.as_str(),
            "status" => if outcome.is_ok() { "success" } else { "failed" }
        )
        .increment(1);

        let value = outcome.inspect_err(|err| {
            tracing::warn!(
                ledger = %self.ledger,
                method = method.as_str(),
                error = %err,
                "ledger call failed"
            );
        })?;

        serde_json::from_value(value).map_err(|e| Error::Deserialize(e.to_string()))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("ledger", &self.ledger)
            .field("credentials", &self.credentials)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
