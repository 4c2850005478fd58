use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A committed movement of quantity recorded by the ledger.
///
/// Issuance is recorded with no sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: Uuid,
    pub asset: String,
    pub sender: Option<String>,
    pub receiver: String,
    pub quantity: u64,
    /// Opaque, application-defined payload. Never interpreted by the client.
    pub memo: String,
    pub created_at: DateTime<Utc>,
}

impl TransferRecord {
    pub fn new(
        asset: impl Into<String>,
        sender: Option<String>,
        receiver: impl Into<String>,
        quantity: u64,
        memo: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            asset: asset.into(),
            sender,
            receiver: receiver.into(),
            quantity,
            memo: memo.into(),
            created_at: Utc::now(),
        }
    }

    pub fn is_issuance(&self) -> bool {
        self.sender.is_none()
    }

    /// Direction of this record as seen from `address`.
    pub fn direction_for(&self, address: &str) -> Option<TransferDirection> {
        if self.sender.as_deref() == Some(address) {
            Some(TransferDirection::Sent)
        } else if self.receiver == address {
            Some(TransferDirection::Received)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferDirection {
    Received,
    Sent,
}

/// Ledger answer to a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub transfer_id: Uuid,
    pub committed: bool,
    /// The idempotency key had been seen before; nothing moved this time.
    #[serde(default)]
    pub replayed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction() {
        let record = TransferRecord::new("demo:t:1", Some("a".into()), "b", 2, "{}");
        assert_eq!(record.direction_for("a"), Some(TransferDirection::Sent));
        assert_eq!(record.direction_for("b"), Some(TransferDirection::Received));
        assert_eq!(record.direction_for("c"), None);
        assert!(!record.is_issuance());

        let issue = TransferRecord::new("demo:t:1", None, "a", 100, "");
        assert!(issue.is_issuance());
        assert_eq!(issue.direction_for("a"), Some(TransferDirection::Received));
    }
}
