use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Per-node client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Upper bound on the wait for a single remote call. A call that exceeds
    /// it fails with [`Error::Timeout`] and is not retried.
    pub call_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(10),
        }
    }
}

impl NodeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.call_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "call_timeout cannot be zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for the in-process [`MemoryLedger`](crate::client::MemoryLedger).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryLedgerConfig {
    /// Number of balance entries (and history records) per page.
    pub page_size: usize,
    /// Delay injected after a call has been applied and before it answers.
    pub latency: Duration,
}

impl Default for MemoryLedgerConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            latency: Duration::ZERO,
        }
    }
}

impl MemoryLedgerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.page_size == 0 {
            return Err(Error::InvalidConfig("page_size cannot be 0".to_string()));
        }
        Ok(())
    }
}
