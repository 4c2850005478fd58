//! # JuicEchain client
//!
//! Client SDK for a JuicEchain ledger node: create wallets, issue typed
//! assets such as admission tickets, attach localized metadata and media, and
//! move quantity between wallets.
//!
//! The ledger is the authority. This crate holds no ledger state between
//! calls; every read goes to the node and every mutation is one request that
//! either commits or fails with a typed [`Error`].
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use juicechain::{AssetType, JuicEchain, client::MemoryLedger};
//!
//! let chain = JuicEchain::new();
//! chain.register("demo", Arc::new(MemoryLedger::new("demo")));
//!
//! let demo = chain.get_node("demo", "", "")?;
//! let wallet = demo.create_wallet().await?;
//! let asset = demo
//!     .issue("demo:testasset:7", "Mein Test Asset", AssetType::Admission, 100,
//!            wallet.address(), "BackToTheFuture GmbH")
//!     .await?;
//!
//! let mobile = demo.create_wallet().await?;
//! wallet.transfer(mobile.address(), asset.name(), 2, "{}").await?;
//! ```
//!
//! ## No multi-field transactions
//!
//! Asset mutators (`set_title`, `set_parameters`, `set_content`, ...) each
//! commit independently. A caller applying several of them must be ready for
//! a failure after some have already been applied; re-read the asset to learn
//! what stuck.
//!
//! ## Timeouts
//!
//! Each call is bounded by [`NodeConfig::call_timeout`] (10 seconds by
//! default) and fails with [`Error::Timeout`]. Nothing is retried
//! automatically and a timed-out call may still have been applied.

pub mod asset;
pub mod client;
pub mod config;
pub mod error;
pub mod node;
pub mod protocol;
pub mod transaction;
pub mod wallet;

pub use asset::{
    Asset, AssetParameters, AssetState, AssetType, Content, LocalizedText, MediaRef, MediaSlot,
    Transferable, localized,
};
pub use client::{Credentials, LedgerClient};
pub use config::{MemoryLedgerConfig, NodeConfig};
pub use error::Error;
pub use node::Node;
pub use transaction::{TransferDirection, TransferReceipt, TransferRecord};
pub use wallet::{BalanceEntry, Wallet};

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;

use crate::client::Session;

pub(crate) fn hash_idempotency_key(key: &str) -> String {
    blake3::hash(key.as_bytes()).to_hex().to_string()
}

static GLOBAL: Lazy<JuicEchain> = Lazy::new(JuicEchain::new);

/// Registry of ledger transports keyed by ledger name.
pub struct JuicEchain {
    ledgers: RwLock<HashMap<String, Arc<dyn LedgerClient>>>,
}

impl JuicEchain {
    pub fn new() -> Self {
        Self {
            ledgers: RwLock::new(HashMap::new()),
        }
    }

    /// Process-wide registry.
    pub fn global() -> &'static JuicEchain {
        &GLOBAL
    }

    /// Routes calls for ledger `name` through `client`, replacing any earlier
    /// registration.
    pub fn register(&self, name: impl Into<String>, client: Arc<dyn LedgerClient>) {
        let name = name.into();
        tracing::debug!(ledger = %name, "registered ledger client");
        self.ledgers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, client);
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.ledgers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Node for ledger `name`. No I/O. Empty `key` and `secret` mean
    /// anonymous access.
    pub fn get_node(&self, name: &str, key: &str, secret: &str) -> Result<Node, Error> {
        self.get_node_with_config(name, key, secret, NodeConfig::default())
    }

    pub fn get_node_with_config(
        &self,
        name: &str,
        key: &str,
        secret: &str,
        config: NodeConfig,
    ) -> Result<Node, Error> {
        if name.is_empty() || name.contains(':') || name.contains(char::is_whitespace) {
            return Err(Error::InvalidLedgerName(name.to_string()));
        }
        config.validate()?;

        let client = self
            .ledgers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownLedger(name.to_string()))?;

        Ok(Node::new(Session::new(
            name,
            Credentials::new(key, secret),
            config,
            client,
        )))
    }
}

impl Default for JuicEchain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryLedger;

    #[test]
    fn test_get_node() {
        let chain = JuicEchain::new();
        chain.register("demo", Arc::new(MemoryLedger::new("demo")));

        let node = chain.get_node("demo", "", "").unwrap();
        assert_eq!(node.name(), "demo");
        assert_eq!(node.config(), &NodeConfig::default());
    }

    #[test]
    fn test_get_node_rejects_bad_identity() {
        let chain = JuicEchain::new();
        chain.register("demo", Arc::new(MemoryLedger::new("demo")));

        assert!(matches!(
            chain.get_node("", "", ""),
            Err(Error::InvalidLedgerName(_))
        ));
        assert!(matches!(
            chain.get_node("demo:x", "", ""),
            Err(Error::InvalidLedgerName(_))
        ));
        assert!(matches!(
            chain.get_node("prod", "", ""),
            Err(Error::UnknownLedger(_))
        ));
    }

    #[test]
    fn test_global_registry() {
        JuicEchain::global().register("global-test", Arc::new(MemoryLedger::new("global-test")));
        assert!(JuicEchain::global().is_registered("global-test"));
        assert!(JuicEchain::global().get_node("global-test", "", "").is_ok());
    }

    #[test]
    fn test_idempotency_key_hash_is_stable() {
        assert_eq!(hash_idempotency_key("k"), hash_idempotency_key("k"));
        assert_ne!(hash_idempotency_key("k"), hash_idempotency_key("k2"));
        assert_eq!(hash_idempotency_key("k").len(), 64);
    }
}
