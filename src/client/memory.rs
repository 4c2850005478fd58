use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::{Credentials, LedgerClient, Method, Request};
use crate::asset::{AssetState, MediaRef, MediaSlot};
use crate::protocol::{
    AssetQuery, Confirmation, ContentParams, IssueParams, MediaParams, MediaPayload, MediaQuery,
    PageQuery, ParametersParams, TextParams, TransferParams, WalletRegistration,
};
use crate::{
    BalanceEntry, Error, MemoryLedgerConfig, TransferReceipt, TransferRecord,
    hash_idempotency_key,
};

/// State transitions are one-way: alive -> burned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrancheState {
    Alive,
    Burned,
}

/// A discrete, indivisible holding. Quantity never changes; spending burns the
/// tranche and mints new ones for the receiver and the change.
#[derive(Debug, Clone)]
struct Tranche {
    id: Uuid,
    asset: String,
    owner: String,
    quantity: u64,
    state: TrancheState,
    created_at: DateTime<Utc>,
}

impl Tranche {
    fn new_alive(asset: &str, owner: &str, quantity: u64) -> Self {
        Self {
            id: Uuid::now_v7(),
            asset: asset.to_string(),
            owner: owner.to_string(),
            quantity,
            state: TrancheState::Alive,
            created_at: Utc::now(),
        }
    }

    fn is_alive(&self) -> bool {
        matches!(self.state, TrancheState::Alive)
    }

    fn is_spendable_by(&self, asset: &str, owner: &str) -> bool {
        self.is_alive() && self.asset == asset && self.owner == owner
    }

    fn to_entry(&self) -> BalanceEntry {
        BalanceEntry {
            id: self.id,
            asset: self.asset.clone(),
            quantity: self.quantity,
            created_at: self.created_at,
        }
    }
}

/// A committed transfer's receipt and the submission it answered.
#[derive(Debug, Clone)]
struct StoredReceipt {
    receipt: TransferReceipt,
    fingerprint: String,
}

fn transfer_fingerprint(params: &TransferParams) -> String {
    let mut hasher = blake3::Hasher::new();
    for part in [&params.from, &params.to, &params.asset] {
        hasher.update(part.as_bytes());
        hasher.update(&[0]);
    }
    hasher.update(&params.quantity.to_le_bytes());
    hasher.finalize().to_hex().to_string()
}

#[derive(Default)]
struct MemoryStore {
    wallets: HashSet<String>,
    assets: HashMap<String, AssetState>,
    /// Creation order, oldest first.
    tranches: Vec<Tranche>,
    transfers: Vec<TransferRecord>,
    /// Hashed `(sender, idempotency key)` -> original receipt.
    receipts: HashMap<String, StoredReceipt>,
    media: HashMap<(String, MediaSlot, String), Vec<u8>>,
}

/// In-process ledger node.
///
/// Applies the same rules a remote node does: conservation of quantity,
/// transfer policy, idempotent transfer keys, wholesale metadata replacement.
/// One lock serializes every call, the way a node serializes writes on one
/// balance.
pub struct MemoryLedger {
    name: String,
    credentials: Credentials,
    config: MemoryLedgerConfig,
    available: AtomicBool,
    store: Mutex<MemoryStore>,
}

impl MemoryLedger {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            credentials: Credentials::default(),
            config: MemoryLedgerConfig::default(),
            available: AtomicBool::new(true),
            store: Mutex::new(MemoryStore::default()),
        }
    }

    pub fn with_config(name: impl Into<String>, config: MemoryLedgerConfig) -> Result<Self, Error> {
        config.validate()?;
        let mut ledger = Self::new(name);
        ledger.config = config;
        Ok(ledger)
    }

    /// Only accept requests signed with these credentials.
    pub fn with_credentials(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.credentials = Credentials::new(key, secret);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// While unavailable every call fails with [`Error::LedgerUnavailable`]
    /// and nothing is applied.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Sum of all live holdings of `asset` across every wallet.
    pub fn total_supply_held(&self, asset: &str) -> u64 {
        self.store()
            .tranches
            .iter()
            .filter(|t| t.is_alive() && t.asset == asset)
            .map(|t| t.quantity)
            .sum()
    }

    fn store(&self) -> MutexGuard<'_, MemoryStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, request: &Request) -> Result<serde_json::Value, Error> {
        let params = &request.params;
        match request.method {
            Method::CreateWallet => respond(self.create_wallet()),
            Method::Issue => respond(self.issue(parse(params)?)?),
            Method::GetAsset => respond(self.get_asset(parse(params)?)?),
            Method::Balance => respond(self.balance(parse(params)?)),
            Method::Transfer => respond(self.transfer(parse(params)?)?),
            Method::History => respond(self.history(parse(params)?)),
            Method::SetTitle => respond(self.set_title(parse(params)?)?),
            Method::SetDescription => respond(self.set_description(parse(params)?)?),
            Method::SetParameters => respond(self.set_parameters(parse(params)?)?),
            Method::SetContent => respond(self.set_content(parse(params)?)?),
            Method::SetMedia => respond(self.set_media(parse(params)?)?),
            Method::GetMedia => respond(self.get_media(parse(params)?)?),
        }
    }

    fn create_wallet(&self) -> WalletRegistration {
        let address = Uuid::now_v7().simple().to_string();
        self.store().wallets.insert(address.clone());
        tracing::debug!(ledger = %self.name, %address, "registered wallet");
        WalletRegistration { address }
    }

    fn issue(&self, params: IssueParams) -> Result<AssetState, Error> {
        if params.quantity == 0 {
            return Err(Error::InvalidQuantity);
        }

        let mut store = self.store();
        if store.assets.contains_key(&params.name) {
            return Err(Error::DuplicateAssetName(params.name));
        }
        if !store.wallets.contains(&params.owner) {
            return Err(Error::RecipientInvalid(params.owner));
        }

        let state = AssetState {
            name: params.name.clone(),
            label: params.label,
            publisher: params.publisher,
            asset_type: params.asset_type,
            quantity: params.quantity,
            owner: params.owner.clone(),
            title: Default::default(),
            description: Default::default(),
            content: Default::default(),
            parameters: Default::default(),
            media: Default::default(),
            created_at: Utc::now(),
        };

        store.assets.insert(params.name.clone(), state.clone());
        store
            .tranches
            .push(Tranche::new_alive(&params.name, &params.owner, params.quantity));
        store.transfers.push(TransferRecord::new(
            &params.name,
            None,
            &params.owner,
            params.quantity,
            "",
        ));

        tracing::info!(ledger = %self.name, asset = %params.name, quantity = params.quantity, "issued asset");
        Ok(state)
    }

    fn get_asset(&self, query: AssetQuery) -> Result<AssetState, Error> {
        self.store()
            .assets
            .get(&query.name)
            .cloned()
            .ok_or(Error::AssetNotFound(query.name))
    }

    fn balance(&self, query: PageQuery) -> Vec<BalanceEntry> {
        self.store()
            .tranches
            .iter()
            .filter(|t| t.is_alive() && t.owner == query.address)
            .skip(query.offset)
            .take(self.config.page_size)
            .map(Tranche::to_entry)
            .collect()
    }

    fn transfer(&self, params: TransferParams) -> Result<TransferReceipt, Error> {
        // Keys are scoped to the sender
        let key = hash_idempotency_key(&format!("{}\0{}", params.from, params.idempotency_key));
        let fingerprint = transfer_fingerprint(&params);
        let mut store = self.store();

        if let Some(stored) = store.receipts.get(&key) {
            if stored.fingerprint != fingerprint {
                return Err(Error::DuplicateIdempotencyKey(stored.receipt.transfer_id));
            }
            tracing::debug!(
                ledger = %self.name,
                transfer = %stored.receipt.transfer_id,
                "replayed transfer"
            );
            return Ok(TransferReceipt {
                replayed: true,
                ..stored.receipt
            });
        }

        if params.quantity == 0 {
            return Err(Error::InvalidQuantity);
        }

        let asset = store
            .assets
            .get(&params.asset)
            .ok_or_else(|| Error::AssetNotFound(params.asset.clone()))?;
        let policy = &asset.parameters;
        if policy.disabled {
            return Err(Error::AssetNotTransferable("asset is disabled".to_string()));
        }
        if !policy.transferable.permits(&params.from, &asset.owner) {
            return Err(Error::AssetNotTransferable(format!(
                "transfer policy is '{}'",
                policy.transferable
            )));
        }

        if params.to == params.from || !store.wallets.contains(&params.to) {
            return Err(Error::RecipientInvalid(params.to));
        }

        // Lock the required amount, oldest tranches first
        let available: u64 = store
            .tranches
            .iter()
            .filter(|t| t.is_spendable_by(&params.asset, &params.from))
            .map(|t| t.quantity)
            .sum();
        if available < params.quantity {
            return Err(Error::InsufficientBalance {
                available,
                required: params.quantity,
            });
        }

        let mut locked = 0u64;
        for tranche in store.tranches.iter_mut() {
            if locked >= params.quantity {
                break;
            }
            if tranche.is_spendable_by(&params.asset, &params.from) {
                tranche.state = TrancheState::Burned;
                locked += tranche.quantity;
            }
        }

        store
            .tranches
            .push(Tranche::new_alive(&params.asset, &params.to, params.quantity));
        let change = locked - params.quantity;
        if change > 0 {
            store
                .tranches
                .push(Tranche::new_alive(&params.asset, &params.from, change));
        }

        let record = TransferRecord::new(
            &params.asset,
            Some(params.from.clone()),
            &params.to,
            params.quantity,
            params.memo,
        );
        let receipt = TransferReceipt {
            transfer_id: record.id,
            committed: true,
            replayed: false,
        };
        store.transfers.push(record);
        store.receipts.insert(key, StoredReceipt { receipt, fingerprint });

        tracing::info!(
            ledger = %self.name,
            asset = %params.asset,
            from = %params.from,
            to = %params.to,
            quantity = params.quantity,
            "transfer applied"
        );
        Ok(receipt)
    }

    fn history(&self, query: PageQuery) -> Vec<TransferRecord> {
        self.store()
            .transfers
            .iter()
            .filter(|r| r.direction_for(&query.address).is_some())
            .skip(query.offset)
            .take(self.config.page_size)
            .cloned()
            .collect()
    }

    fn update_asset<F>(&self, name: &str, apply: F) -> Result<Confirmation, Error>
    where
        F: FnOnce(&mut AssetState),
    {
        let mut store = self.store();
        let asset = store
            .assets
            .get_mut(name)
            .ok_or_else(|| Error::AssetNotFound(name.to_string()))?;
        apply(asset);
        Ok(Confirmation::ok())
    }

    fn set_title(&self, params: TextParams) -> Result<Confirmation, Error> {
        self.update_asset(&params.asset, |asset| asset.title = params.value)
    }

    fn set_description(&self, params: TextParams) -> Result<Confirmation, Error> {
        self.update_asset(&params.asset, |asset| asset.description = params.value)
    }

    fn set_parameters(&self, params: ParametersParams) -> Result<Confirmation, Error> {
        self.update_asset(&params.asset, |asset| asset.parameters = params.parameters)
    }

    fn set_content(&self, params: ContentParams) -> Result<Confirmation, Error> {
        self.update_asset(&params.asset, |asset| asset.content = params.content)
    }

    fn set_media(&self, params: MediaParams) -> Result<Confirmation, Error> {
        let mut store = self.store();
        let asset = store
            .assets
            .get_mut(&params.asset)
            .ok_or_else(|| Error::AssetNotFound(params.asset.clone()))?;
        asset
            .media
            .entry(params.slot.as_str().to_string())
            .or_default()
            .insert(params.variant.clone(), MediaRef::of(&params.data));

        store
            .media
            .insert((params.asset, params.slot, params.variant), params.data);
        Ok(Confirmation::ok())
    }

    fn get_media(&self, query: MediaQuery) -> Result<MediaPayload, Error> {
        let store = self.store();
        if !store.assets.contains_key(&query.asset) {
            return Err(Error::AssetNotFound(query.asset));
        }
        match store
            .media
            .get(&(query.asset.clone(), query.slot, query.variant.clone()))
        {
            Some(data) => Ok(MediaPayload { data: data.clone() }),
            None => Err(Error::MediaNotFound {
                asset: query.asset,
                slot: query.slot.to_string(),
                variant: query.variant,
            }),
        }
    }
}

impl std::fmt::Debug for MemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLedger")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("available", &self.available.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

fn parse<T: DeserializeOwned>(params: &serde_json::Value) -> Result<T, Error> {
    serde_json::from_value(params.clone()).map_err(|e| Error::Deserialize(e.to_string()))
}

fn respond<T: Serialize>(value: T) -> Result<serde_json::Value, Error> {
    serde_json::to_value(value).map_err(|e| Error::Serialize(e.to_string()))
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn call(&self, request: Request) -> Result<serde_json::Value, Error> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(Error::LedgerUnavailable(format!(
                "ledger '{}' is offline",
                self.name
            )));
        }
        if request.ledger != self.name {
            return Err(Error::LedgerUnavailable(format!(
                "ledger '{}' is not served here",
                request.ledger
            )));
        }
        if !request.verify(&self.credentials) {
            return Err(match request.method {
                Method::CreateWallet => {
                    Error::RegistrationFailed("invalid credentials".to_string())
                }
                _ => Error::Unauthorized,
            });
        }

        let result = self.dispatch(&request);

        // Applied before the delay: a caller that gives up early still has
        // its effect committed.
        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AssetType;
    use serde_json::json;

    fn request(method: Method, params: serde_json::Value) -> Request {
        Request::new("demo", method, params)
    }

    async fn register(ledger: &MemoryLedger) -> String {
        let value = ledger
            .call(request(Method::CreateWallet, json!({})))
            .await
            .unwrap();
        value["address"].as_str().unwrap().to_string()
    }

    async fn issue(ledger: &MemoryLedger, name: &str, owner: &str, quantity: u64) {
        let params = IssueParams {
            name: name.to_string(),
            label: "label".to_string(),
            asset_type: AssetType::Admission,
            quantity,
            owner: owner.to_string(),
            publisher: "Publisher GmbH".to_string(),
        };
        ledger
            .call(request(Method::Issue, serde_json::to_value(params).unwrap()))
            .await
            .unwrap();
    }

    fn transfer_params(from: &str, to: &str, quantity: u64, key: &str) -> serde_json::Value {
        serde_json::to_value(TransferParams {
            from: from.to_string(),
            to: to.to_string(),
            asset: "demo:t:1".to_string(),
            quantity,
            memo: "{}".to_string(),
            idempotency_key: key.to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_transfer_burns_oldest_first_and_mints_change() {
        let ledger = MemoryLedger::new("demo");
        let a = register(&ledger).await;
        let b = register(&ledger).await;
        issue(&ledger, "demo:t:1", &a, 100).await;

        ledger
            .call(request(Method::Transfer, transfer_params(&a, &b, 30, "k1")))
            .await
            .unwrap();

        let store = ledger.store();
        let alive: Vec<_> = store.tranches.iter().filter(|t| t.is_alive()).collect();
        assert_eq!(alive.len(), 2);
        assert_eq!((alive[0].owner.as_str(), alive[0].quantity), (b.as_str(), 30));
        assert_eq!((alive[1].owner.as_str(), alive[1].quantity), (a.as_str(), 70));
        assert_eq!(store.tranches.len(), 3);
        drop(store);

        assert_eq!(ledger.total_supply_held("demo:t:1"), 100);
    }

    #[tokio::test]
    async fn test_replayed_key_moves_nothing() {
        let ledger = MemoryLedger::new("demo");
        let a = register(&ledger).await;
        let b = register(&ledger).await;
        issue(&ledger, "demo:t:1", &a, 10).await;

        let first: TransferReceipt = serde_json::from_value(
            ledger
                .call(request(Method::Transfer, transfer_params(&a, &b, 4, "same")))
                .await
                .unwrap(),
        )
        .unwrap();
        let second: TransferReceipt = serde_json::from_value(
            ledger
                .call(request(Method::Transfer, transfer_params(&a, &b, 4, "same")))
                .await
                .unwrap(),
        )
        .unwrap();

        assert!(!first.replayed);
        assert!(second.replayed);
        assert_eq!(first.transfer_id, second.transfer_id);
        assert_eq!(ledger.store().transfers.len(), 2); // issuance + one transfer
    }

    #[tokio::test]
    async fn test_reused_key_with_other_parameters_is_rejected() {
        let ledger = MemoryLedger::new("demo");
        let a = register(&ledger).await;
        let b = register(&ledger).await;
        issue(&ledger, "demo:t:1", &a, 10).await;

        let first: TransferReceipt = serde_json::from_value(
            ledger
                .call(request(Method::Transfer, transfer_params(&a, &b, 4, "same")))
                .await
                .unwrap(),
        )
        .unwrap();
        let err = ledger
            .call(request(Method::Transfer, transfer_params(&a, &b, 5, "same")))
            .await
            .unwrap_err();

        assert_eq!(err, Error::DuplicateIdempotencyKey(first.transfer_id));
        assert_eq!(ledger.store().transfers.len(), 2);
        assert_eq!(ledger.total_supply_held("demo:t:1"), 10);
    }

    #[tokio::test]
    async fn test_rejects_wrong_ledger_and_bad_signature() {
        let ledger = MemoryLedger::new("demo").with_credentials("key", "secret");

        let err = ledger
            .call(Request::new("prod", Method::CreateWallet, json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LedgerUnavailable(_)));

        let err = ledger
            .call(request(Method::CreateWallet, json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RegistrationFailed(_)));

        let err = ledger
            .call(request(Method::GetAsset, json!({ "name": "demo:t:1" })).signed(
                &Credentials::new("key", "wrong"),
            ))
            .await
            .unwrap_err();
        assert_eq!(err, Error::Unauthorized);

        let ok = ledger
            .call(
                request(Method::CreateWallet, json!({}))
                    .signed(&Credentials::new("key", "secret")),
            )
            .await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn test_malformed_params() {
        let ledger = MemoryLedger::new("demo");
        let err = ledger
            .call(request(Method::Balance, json!({ "offset": "zero" })))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Deserialize(_)));
    }
}
