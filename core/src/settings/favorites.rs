use super::keys;
use super::replica::SettingReplica;
use super::value::SettingValue;
use crate::error::SettingError;
use crate::store::StoreManager;

/// Ordered list of favorite channel ids, stored as a JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Favorites(pub Vec<String>);

impl SettingValue for Favorites {
    fn encode(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
    }

    /// Anything that is not a JSON array of strings reads as empty.
    fn decode(raw: &str) -> Result<Self, String> {
        let raw = if raw.is_empty() { "[]" } else { raw };
        Ok(Self(serde_json::from_str::<Vec<String>>(raw).unwrap_or_default()))
    }
}

#[derive(Clone)]
pub struct ChannelFavorites {
    replica: SettingReplica<Favorites>,
}

impl ChannelFavorites {
    pub async fn open(store: StoreManager) -> Self {
        Self {
            replica: SettingReplica::open(store, keys::CHANNEL_FAVORITES, Favorites::default())
                .await,
        }
    }

    pub fn favorites(&self) -> Vec<String> {
        self.replica.value().0
    }

    pub fn is_favorite(&self, channel_id: &str) -> bool {
        self.replica.value().0.iter().any(|id| id == channel_id)
    }

    pub async fn set_favorites(&self, favorites: Vec<String>) -> Result<(), SettingError> {
        self.replica.set_value(Favorites(favorites)).await
    }

    /// Add or remove `channel_id`. Ignored while the initial load is running.
    pub async fn toggle(&self, channel_id: &str) -> Result<(), SettingError> {
        if self.replica.is_loading() {
            return Ok(());
        }
        let mut favorites = self.favorites();
        if let Some(pos) = favorites.iter().position(|id| id == channel_id) {
            favorites.remove(pos);
        } else {
            favorites.push(channel_id.to_string());
        }
        self.set_favorites(favorites).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryBackend, MemoryStore};
    use std::sync::Arc;

    #[test]
    fn malformed_json_reads_as_empty() {
        assert_eq!(Favorites::decode("{oops").unwrap(), Favorites::default());
        assert_eq!(Favorites::decode("{\"a\":1}").unwrap(), Favorites::default());
        assert_eq!(Favorites::decode("").unwrap(), Favorites::default());
    }

    #[tokio::test]
    async fn toggle_adds_then_removes() {
        let data = Arc::new(MemoryStore::new());
        let store = StoreManager::new(Arc::new(MemoryBackend::with_store(data.clone())));
        let favs = ChannelFavorites::open(store).await;
        assert_eq!(
            data.snapshot().get(keys::CHANNEL_FAVORITES).map(String::as_str),
            Some("[]")
        );

        favs.toggle("a").await.unwrap();
        favs.toggle("b").await.unwrap();
        assert!(favs.is_favorite("a"));
        assert_eq!(
            data.snapshot().get(keys::CHANNEL_FAVORITES).map(String::as_str),
            Some("[\"a\",\"b\"]")
        );

        favs.toggle("a").await.unwrap();
        assert_eq!(favs.favorites(), vec!["b".to_string()]);
    }
}
