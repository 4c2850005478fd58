//! Parameter and result records for each remote method.
//!
//! These are the structured values exchanged with a ledger node. How they are
//! encoded on the wire is the transport's business.

use serde::{Deserialize, Serialize};

use crate::asset::{AssetParameters, AssetType, Content, LocalizedText, MediaSlot};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateWalletParams {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRegistration {
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueParams {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub quantity: u64,
    pub owner: String,
    pub publisher: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetQuery {
    pub name: String,
}

/// Page request for balances and history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageQuery {
    pub address: String,
    pub offset: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferParams {
    pub from: String,
    pub to: String,
    pub asset: String,
    pub quantity: u64,
    pub memo: String,
    pub idempotency_key: String,
}

/// Title or description replacement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextParams {
    pub asset: String,
    pub value: LocalizedText,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParametersParams {
    pub asset: String,
    pub parameters: AssetParameters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentParams {
    pub asset: String,
    pub content: Content,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaParams {
    pub asset: String,
    pub slot: MediaSlot,
    pub variant: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaQuery {
    pub asset: String,
    pub slot: MediaSlot,
    pub variant: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaPayload {
    pub data: Vec<u8>,
}

/// Answer to a metadata mutator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub committed: bool,
}

impl Confirmation {
    pub fn ok() -> Self {
        Self { committed: true }
    }
}
