use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::{Method, Session};
use crate::protocol::{
    AssetQuery, Confirmation, ContentParams, MediaParams, MediaPayload, MediaQuery,
    ParametersParams, TextParams,
};
use crate::Error;

/// Locale code (`de_DE`, `en_GB`, ...) to text.
pub type LocalizedText = BTreeMap<String, String>;

/// Free-form, application-defined asset content.
pub type Content = serde_json::Map<String, serde_json::Value>;

/// Builds a [`LocalizedText`] from `(locale, text)` pairs.
pub fn localized<K, V, I>(entries: I) -> LocalizedText
where
    K: Into<String>,
    V: Into<String>,
    I: IntoIterator<Item = (K, V)>,
{
    entries
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Classification recognised by the ledger. The set only grows with ledger
/// upgrades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum AssetType {
    Admission,
}

/// Who may move quantity of an asset between wallets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transferable {
    /// Any holder may transfer.
    #[default]
    All,
    /// Quantity is frozen where it is.
    None,
    /// Only the issuing wallet may send.
    Owner,
}

impl Transferable {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::None => "none",
            Self::Owner => "owner",
        }
    }

    pub fn permits(&self, sender: &str, owner: &str) -> bool {
        match self {
            Self::All => true,
            Self::None => false,
            Self::Owner => sender == owner,
        }
    }
}

impl fmt::Display for Transferable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transferable {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "none" => Ok(Self::None),
            "owner" => Ok(Self::Owner),
            other => Err(Error::Deserialize(format!(
                "unknown transferable policy: {}",
                other
            ))),
        }
    }
}

/// Validity window and transfer policy, always replaced as one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetParameters {
    pub inception: Option<DateTime<Utc>>,
    pub expiration: Option<DateTime<Utc>>,
    pub valid: bool,
    pub disabled: bool,
    pub transferable: Transferable,
}

impl Default for AssetParameters {
    fn default() -> Self {
        Self {
            inception: None,
            expiration: None,
            valid: true,
            disabled: false,
            transferable: Transferable::All,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaSlot {
    Card,
    Ticket,
}

impl MediaSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Ticket => "ticket",
        }
    }
}

impl fmt::Display for MediaSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index entry for uploaded media. The bytes themselves are fetched with
/// [`Asset::media`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    /// BLAKE3 of the bytes, hex encoded.
    pub digest: String,
    pub size: u64,
}

impl MediaRef {
    pub fn of(data: &[u8]) -> Self {
        Self {
            digest: blake3::hash(data).to_hex().to_string(),
            size: data.len() as u64,
        }
    }
}

/// Committed state of an asset as recorded by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetState {
    /// `<ledger>:<category>:<id>`, unique per ledger.
    pub name: String,
    pub label: String,
    pub publisher: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    /// Total issued supply. Never changes after issue.
    pub quantity: u64,
    /// Address the supply was issued to.
    pub owner: String,
    #[serde(default)]
    pub title: LocalizedText,
    #[serde(default)]
    pub description: LocalizedText,
    #[serde(default)]
    pub content: Content,
    #[serde(default)]
    pub parameters: AssetParameters,
    /// slot -> variant -> media
    #[serde(default)]
    pub media: BTreeMap<String, BTreeMap<String, MediaRef>>,
    pub created_at: DateTime<Utc>,
}

impl AssetState {
    pub fn media_ref(&self, slot: MediaSlot, variant: &str) -> Option<&MediaRef> {
        self.media.get(slot.as_str())?.get(variant)
    }
}

/// Checks `<ledger>:<category>:<id>` with non-empty segments.
pub(crate) fn validate_asset_name(ledger: &str, name: &str) -> Result<(), Error> {
    let segments: Vec<&str> = name.split(':').collect();
    let well_formed = segments.len() == 3
        && segments.iter().all(|s| !s.is_empty() && !s.contains(char::is_whitespace))
        && segments[0] == ledger;
    if well_formed {
        Ok(())
    } else {
        Err(Error::InvalidAssetName(name.to_string()))
    }
}

/// Handle to a ledger-registered asset.
///
/// Every mutator is a separate remote call and commits on its own. There is
/// no way to update several fields atomically: if a sequence of mutators
/// fails half way, the earlier ones stay applied. The local copy is only
/// updated after the ledger confirms; use [`Asset::refresh`] or
/// [`Wallet::get_asset`](crate::Wallet::get_asset) to observe what is
/// actually committed.
#[derive(Debug, Clone)]
pub struct Asset {
    state: AssetState,
    session: Arc<Session>,
}

impl Asset {
    pub(crate) fn new(state: AssetState, session: Arc<Session>) -> Self {
        Self { state, session }
    }

    pub(crate) async fn fetch(session: Arc<Session>, name: &str) -> Result<Self, Error> {
        let state: AssetState = session
            .call(
                Method::GetAsset,
                &AssetQuery {
                    name: name.to_string(),
                },
            )
            .await?;
        Ok(Self::new(state, session))
    }

    pub fn state(&self) -> &AssetState {
        &self.state
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn label(&self) -> &str {
        &self.state.label
    }

    pub fn publisher(&self) -> &str {
        &self.state.publisher
    }

    pub fn asset_type(&self) -> AssetType {
        self.state.asset_type
    }

    pub fn quantity(&self) -> u64 {
        self.state.quantity
    }

    pub fn owner(&self) -> &str {
        &self.state.owner
    }

    pub fn title(&self) -> &LocalizedText {
        &self.state.title
    }

    pub fn description(&self) -> &LocalizedText {
        &self.state.description
    }

    pub fn content(&self) -> &Content {
        &self.state.content
    }

    pub fn parameters(&self) -> &AssetParameters {
        &self.state.parameters
    }

    pub fn inception(&self) -> Option<DateTime<Utc>> {
        self.state.parameters.inception
    }

    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.state.parameters.expiration
    }

    pub fn valid(&self) -> bool {
        self.state.parameters.valid
    }

    pub fn disabled(&self) -> bool {
        self.state.parameters.disabled
    }

    pub fn transferable(&self) -> Transferable {
        self.state.parameters.transferable
    }

    pub fn media_ref(&self, slot: MediaSlot, variant: &str) -> Option<&MediaRef> {
        self.state.media_ref(slot, variant)
    }

    /// Re-reads the committed state from the ledger.
    pub async fn refresh(&mut self) -> Result<(), Error> {
        let fresh = Self::fetch(Arc::clone(&self.session), &self.state.name).await?;
        self.state = fresh.state;
        Ok(())
    }

    /// Replaces the whole title mapping. Locales not in `title` are dropped.
    pub async fn set_title(&mut self, title: LocalizedText) -> Result<bool, Error> {
        let committed = self.set_text(Method::SetTitle, &title).await?;
        if committed {
            self.state.title = title;
        }
        Ok(committed)
    }

    /// Replaces the whole description mapping.
    pub async fn set_description(&mut self, description: LocalizedText) -> Result<bool, Error> {
        let committed = self.set_text(Method::SetDescription, &description).await?;
        if committed {
            self.state.description = description;
        }
        Ok(committed)
    }

    async fn set_text(&self, method: Method, value: &LocalizedText) -> Result<bool, Error> {
        let confirmation: Confirmation = self
            .session
            .call(
                method,
                &TextParams {
                    asset: self.state.name.clone(),
                    value: value.clone(),
                },
            )
            .await?;
        Ok(confirmation.committed)
    }

    /// Replaces all five parameters.
    pub async fn set_parameters(&mut self, parameters: AssetParameters) -> Result<bool, Error> {
        let confirmation: Confirmation = self
            .session
            .call(
                Method::SetParameters,
                &ParametersParams {
                    asset: self.state.name.clone(),
                    parameters: parameters.clone(),
                },
            )
            .await?;
        if confirmation.committed {
            self.state.parameters = parameters;
        }
        Ok(confirmation.committed)
    }

    /// Replaces the content mapping wholesale. `content` must serialize to a
    /// JSON object.
    pub async fn set_content<T: Serialize + ?Sized>(&mut self, content: &T) -> Result<bool, Error> {
        let content = match serde_json::to_value(content) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(_) => {
                return Err(Error::Serialize(
                    "asset content must be a JSON object".to_string(),
                ));
            }
            Err(e) => return Err(Error::Serialize(e.to_string())),
        };

        let confirmation: Confirmation = self
            .session
            .call(
                Method::SetContent,
                &ContentParams {
                    asset: self.state.name.clone(),
                    content: content.clone(),
                },
            )
            .await?;
        if confirmation.committed {
            self.state.content = content;
        }
        Ok(confirmation.committed)
    }

    /// Uploads card media under `variant`, replacing what was there.
    pub async fn set_card(&mut self, data: &[u8], variant: &str) -> Result<bool, Error> {
        self.set_media(MediaSlot::Card, data, variant).await
    }

    /// Uploads ticket media under `variant`, replacing what was there.
    pub async fn set_ticket(&mut self, data: &[u8], variant: &str) -> Result<bool, Error> {
        self.set_media(MediaSlot::Ticket, data, variant).await
    }

    async fn set_media(
        &mut self,
        slot: MediaSlot,
        data: &[u8],
        variant: &str,
    ) -> Result<bool, Error> {
        let confirmation: Confirmation = self
            .session
            .call(
                Method::SetMedia,
                &MediaParams {
                    asset: self.state.name.clone(),
                    slot,
                    variant: variant.to_string(),
                    data: data.to_vec(),
                },
            )
            .await?;
        if confirmation.committed {
            self.state
                .media
                .entry(slot.as_str().to_string())
                .or_default()
                .insert(variant.to_string(), MediaRef::of(data));
        }
        Ok(confirmation.committed)
    }

    /// Downloads media bytes.
    pub async fn media(&self, slot: MediaSlot, variant: &str) -> Result<Vec<u8>, Error> {
        let payload: MediaPayload = self
            .session
            .call(
                Method::GetMedia,
                &MediaQuery {
                    asset: self.state.name.clone(),
                    slot,
                    variant: variant.to_string(),
                },
            )
            .await?;
        Ok(payload.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_name_validation() {
        assert!(validate_asset_name("demo", "demo:testasset:42").is_ok());
        assert!(validate_asset_name("demo", "prod:testasset:42").is_err());
        assert!(validate_asset_name("demo", "demo:testasset").is_err());
        assert!(validate_asset_name("demo", "demo::42").is_err());
        assert!(validate_asset_name("demo", "demo:test asset:42").is_err());
        assert!(validate_asset_name("demo", "demo:a:b:c").is_err());
    }

    #[test]
    fn test_transferable_policy() {
        assert!(Transferable::All.permits("a", "b"));
        assert!(!Transferable::None.permits("a", "a"));
        assert!(Transferable::Owner.permits("a", "a"));
        assert!(!Transferable::Owner.permits("b", "a"));

        assert_eq!("all".parse::<Transferable>().unwrap(), Transferable::All);
        assert!("some".parse::<Transferable>().is_err());
        assert_eq!(
            serde_json::to_value(Transferable::None).unwrap(),
            serde_json::json!("none")
        );
    }

    #[test]
    fn test_asset_type_wire_name() {
        assert_eq!(
            serde_json::to_value(AssetType::Admission).unwrap(),
            serde_json::json!("ADMISSION")
        );
    }

    #[test]
    fn test_default_parameters() {
        let params = AssetParameters::default();
        assert!(params.valid);
        assert!(!params.disabled);
        assert_eq!(params.transferable, Transferable::All);
        assert!(params.inception.is_none());
    }

    #[test]
    fn test_media_ref_digest() {
        let a = MediaRef::of(b"\x89PNG cover");
        let b = MediaRef::of(b"\x89PNG cover");
        assert_eq!(a, b);
        assert_eq!(a.size, 10);
        assert_ne!(a.digest, MediaRef::of(b"other").digest);
    }
}
