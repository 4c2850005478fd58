use std::sync::Arc;

use crate::asset::{AssetState, validate_asset_name};
use crate::client::{Method, Session};
use crate::protocol::{CreateWalletParams, IssueParams, WalletRegistration};
use crate::{Asset, AssetType, Error, NodeConfig, Wallet};

/// Session with one named ledger. Creates wallets and issues assets.
#[derive(Debug, Clone)]
pub struct Node {
    session: Arc<Session>,
}

impl Node {
    pub(crate) fn new(session: Session) -> Self {
        Self {
            session: Arc::new(session),
        }
    }

    pub fn name(&self) -> &str {
        self.session.ledger()
    }

    pub fn config(&self) -> &NodeConfig {
        self.session.config()
    }

    /// Registers a new address on the ledger.
    pub async fn create_wallet(&self) -> Result<Wallet, Error> {
        let registration: WalletRegistration = self
            .session
            .call(Method::CreateWallet, &CreateWalletParams::default())
            .await?;

        tracing::debug!(ledger = self.name(), address = %registration.address, "wallet created");
        Ok(Wallet::new(registration.address, Arc::clone(&self.session)))
    }

    /// Handle for an address that is already registered. No I/O; an unknown
    /// address only fails once it is used.
    pub fn wallet(&self, address: impl Into<String>) -> Wallet {
        Wallet::new(address.into(), Arc::clone(&self.session))
    }

    /// Registers `name` with `quantity` total supply, all of it credited to
    /// `owner`.
    ///
    /// `label` is the display label; `publisher` is the publisher's legal
    /// name as reported by [`Asset::publisher`]. Submitting the same issue
    /// twice fails the second time with [`Error::DuplicateAssetName`].
    pub async fn issue(
        &self,
        name: &str,
        label: &str,
        asset_type: AssetType,
        quantity: u64,
        owner: &str,
        publisher: &str,
    ) -> Result<Asset, Error> {
        if quantity == 0 {
            return Err(Error::InvalidQuantity);
        }
        validate_asset_name(self.name(), name)?;

        let state: AssetState = self
            .session
            .call(
                Method::Issue,
                &IssueParams {
                    name: name.to_string(),
                    label: label.to_string(),
                    asset_type,
                    quantity,
                    owner: owner.to_string(),
                    publisher: publisher.to_string(),
                },
            )
            .await?;

        tracing::info!(ledger = self.name(), asset = name, quantity, owner, "asset issued");
        Ok(Asset::new(state, Arc::clone(&self.session)))
    }
}
