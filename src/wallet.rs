use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::histogram;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::{Method, Session};
use crate::protocol::{PageQuery, TransferParams};
use crate::{Asset, Error, TransferReceipt, TransferRecord};

/// One tranche of an asset held by a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub id: Uuid,
    pub asset: String,
    pub quantity: u64,
    pub created_at: DateTime<Utc>,
}

/// Handle to a ledger-assigned address.
#[derive(Debug, Clone)]
pub struct Wallet {
    address: String,
    session: Arc<Session>,
}

impl Wallet {
    pub(crate) fn new(address: String, session: Arc<Session>) -> Self {
        Self { address, session }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Name of the ledger this address lives on.
    pub fn node(&self) -> &str {
        self.session.ledger()
    }

    /// One page of holdings starting at `offset`. Empty past the end.
    ///
    /// Page size is chosen by the ledger; do not rely on it.
    pub async fn balance(&self, offset: usize) -> Result<Vec<BalanceEntry>, Error> {
        self.session
            .call(
                Method::Balance,
                &PageQuery {
                    address: self.address.clone(),
                    offset,
                },
            )
            .await
    }

    /// Sum of every entry of `asset`, walking pages until an empty one.
    ///
    /// Pages are separate reads, so a transfer committed mid-walk can shift
    /// entries between pages.
    pub async fn aggregate_balance(&self, asset: &str) -> Result<u64, Error> {
        let mut total = 0u64;
        let mut offset = 0;
        loop {
            let page = self.balance(offset).await?;
            if page.is_empty() {
                return Ok(total);
            }
            offset += page.len();
            total += page
                .iter()
                .filter(|entry| entry.asset == asset)
                .map(|entry| entry.quantity)
                .sum::<u64>();
        }
    }

    /// Committed state of an asset.
    pub async fn get_asset(&self, name: &str) -> Result<Asset, Error> {
        Asset::fetch(Arc::clone(&self.session), name).await
    }

    /// Moves `quantity` of `asset` to `to`.
    ///
    /// Returns `true` once the ledger has committed. A losing race against
    /// another transfer from this wallet surfaces as
    /// [`Error::InsufficientBalance`]. After a [`Error::Timeout`] the transfer
    /// may or may not have happened; check [`Wallet::balance`] or use
    /// [`Wallet::transfer_idempotent`] to resubmit safely.
    pub async fn transfer(
        &self,
        to: &str,
        asset: &str,
        quantity: u64,
        memo: &str,
    ) -> Result<bool, Error> {
        let key = Uuid::now_v7().to_string();
        let receipt = self
            .transfer_idempotent(to, asset, quantity, memo, &key)
            .await?;
        Ok(receipt.committed)
    }

    /// Like [`Wallet::transfer`], keyed by a caller-chosen idempotency key.
    /// Keys are scoped to this wallet. Resubmitting the same transfer with the
    /// same key returns the original receipt with `replayed` set and moves
    /// nothing; reusing the key for a different recipient, asset or quantity
    /// fails with [`Error::DuplicateIdempotencyKey`].
    pub async fn transfer_idempotent(
        &self,
        to: &str,
        asset: &str,
        quantity: u64,
        memo: &str,
        idempotency_key: &str,
    ) -> Result<TransferReceipt, Error> {
        if quantity == 0 {
            return Err(Error::InvalidQuantity);
        }
        if to.trim().is_empty() {
            return Err(Error::RecipientInvalid(to.to_string()));
        }

        let receipt: TransferReceipt = self
            .session
            .call(
                Method::Transfer,
                &TransferParams {
                    from: self.address.clone(),
                    to: to.to_string(),
                    asset: asset.to_string(),
                    quantity,
                    memo: memo.to_string(),
                    idempotency_key: idempotency_key.to_string(),
                },
            )
            .await?;

        if receipt.committed && !receipt.replayed {
            histogram!("juicechain.transfer.quantity", "asset" => asset.to_string())
                .record(quantity as f64);
        }
        tracing::debug!(
            from = %self.address,
            to,
            asset,
            quantity,
            replayed = receipt.replayed,
            "transfer committed"
        );

        Ok(receipt)
    }

    /// One page of committed transfers touching this wallet, oldest first.
    pub async fn history(&self, offset: usize) -> Result<Vec<TransferRecord>, Error> {
        self.session
            .call(
                Method::History,
                &PageQuery {
                    address: self.address.clone(),
                    offset,
                },
            )
            .await
    }
}
