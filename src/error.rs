use std::fmt;

use uuid::Uuid;

use crate::client::Method;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    LedgerUnavailable(String),
    Timeout(Method),
    RegistrationFailed(String),
    DuplicateAssetName(String),
    AssetNotFound(String),
    RecipientInvalid(String),
    InsufficientBalance { available: u64, required: u64 },
    AssetNotTransferable(String),
    /// The sender already used this idempotency key for a different
    /// transfer, identified here.
    DuplicateIdempotencyKey(Uuid),
    InvalidQuantity,
    InvalidLedgerName(String),
    InvalidAssetName(String),
    UnknownLedger(String),
    Unauthorized,
    MediaNotFound { asset: String, slot: String, variant: String },
    Serialize(String),
    Deserialize(String),
    InvalidConfig(String),
}

impl Error {
    /// Transport-level failures. The ledger may or may not have applied the
    /// call; re-query before resubmitting.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LedgerUnavailable(_) | Self::Timeout(_))
    }

    /// Authoritative answers from the ledger. Resubmitting the same input
    /// yields the same answer.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::RegistrationFailed(_)
                | Self::DuplicateAssetName(_)
                | Self::AssetNotFound(_)
                | Self::RecipientInvalid(_)
                | Self::InsufficientBalance { .. }
                | Self::AssetNotTransferable(_)
                | Self::DuplicateIdempotencyKey(_)
                | Self::Unauthorized
                | Self::MediaNotFound { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LedgerUnavailable(msg) => write!(f, "Ledger unavailable: {}", msg),
            Self::Timeout(method) => write!(f, "Timed out waiting for {}", method),
            Self::RegistrationFailed(msg) => write!(f, "Wallet registration failed: {}", msg),
            Self::DuplicateAssetName(name) => write!(f, "Asset already exists: {}", name),
            Self::AssetNotFound(name) => write!(f, "Asset not found: {}", name),
            Self::RecipientInvalid(address) => write!(f, "Invalid recipient: {}", address),
            Self::InsufficientBalance {
                available,
                required,
            } => write!(
                f,
                "Insufficient balance: available {}, required {}",
                available, required
            ),
            Self::AssetNotTransferable(reason) => write!(f, "Asset not transferable: {}", reason),
            Self::DuplicateIdempotencyKey(id) => {
                write!(f, "Idempotency key already used by transfer {}", id)
            }
            Self::InvalidQuantity => write!(f, "Quantity must be greater than zero"),
            Self::InvalidLedgerName(name) => write!(f, "Invalid ledger name: {:?}", name),
            Self::InvalidAssetName(name) => write!(f, "Invalid asset name: {:?}", name),
            Self::UnknownLedger(name) => write!(f, "No ledger registered under {:?}", name),
            Self::Unauthorized => write!(f, "Request rejected: invalid credentials"),
            Self::MediaNotFound {
                asset,
                slot,
                variant,
            } => write!(f, "No {} media '{}' on asset {}", slot, variant, asset),
            Self::Serialize(msg) => write!(f, "Serialization error: {}", msg),
            Self::Deserialize(msg) => write!(f, "Deserialization error: {}", msg),
            Self::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for Error {}
