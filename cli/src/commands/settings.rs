use std::io::Write;

use haven_core::api::{
    keys, AccountSyncService, AccountSyncStatus, CliError, SettingError, SettingReplica,
    SettingValue, StoreManager, TrackNetworkPeriod, KNOWN_SETTINGS,
};
use haven_core::settings::default_for;
use serde_json::{json, Map, Value};

use super::output::Output;

pub async fn list<W: Write>(store: &StoreManager, out: &mut Output<W>) -> Result<i32, CliError> {
    let mut values = Map::new();
    for (key, default) in KNOWN_SETTINGS {
        let replica = SettingReplica::open(store.clone(), *key, default.to_string()).await;
        if let Some(e) = replica.error() {
            tracing::warn!("{}", e);
        }
        let value = replica.value();
        if !out.is_json() {
            out.line(format_args!("{key} = {value}"))?;
        }
        values.insert(key.to_string(), Value::String(value));
    }
    if out.is_json() {
        out.json(&Value::Object(values))?;
    }
    Ok(0)
}

/// Known settings read through a replica, so an unset key shows (and
/// stores) its default. Other keys are read raw; unset prints nothing and
/// exits 1.
pub async fn get<W: Write>(
    store: &StoreManager,
    key: &str,
    out: &mut Output<W>,
) -> Result<i32, CliError> {
    let value = match default_for(key) {
        Some(default) => {
            let replica = SettingReplica::open(store.clone(), key, default.to_string()).await;
            if let Some(e) = replica.error() {
                return Err(e.into());
            }
            Some(replica.value())
        }
        None => store.get_value(key).await?,
    };

    if out.is_json() {
        out.json(&json!({ "key": key, "value": value }))?;
    } else if let Some(value) = &value {
        out.line(value)?;
    }
    Ok(if value.is_some() { 0 } else { 1 })
}

pub async fn set<W: Write>(
    store: &StoreManager,
    key: &str,
    value: &str,
    out: &mut Output<W>,
) -> Result<i32, CliError> {
    validate(key, value)?;
    match default_for(key) {
        Some(default) => {
            SettingReplica::new(store.clone(), key, default.to_string())
                .set_value(value.to_string())
                .await?
        }
        None => store.set_value(key, value).await?,
    }

    if out.is_json() {
        out.json(&json!({ "key": key, "value": value }))?;
    } else {
        out.line(format_args!("{key} = {value}"))?;
    }
    Ok(0)
}

pub async fn toggle_tracking<W: Write>(
    tracking: &TrackNetworkPeriod,
    out: &mut Output<W>,
) -> Result<i32, CliError> {
    let mode = tracking.toggle().await?;
    let period_ms = tracking.period().as_millis();
    if out.is_json() {
        out.json(&json!({ "mode": mode.as_str(), "period_ms": period_ms }))?;
    } else {
        out.line(format_args!("tracking: {mode} ({period_ms} ms)"))?;
    }
    Ok(0)
}

/// Reject values the typed setting would not accept.
fn validate(key: &str, value: &str) -> Result<(), SettingError> {
    let decode_error = |reason: String| SettingError::Decode {
        key: key.to_string(),
        reason,
    };
    match key {
        keys::TRACK_NETWORK_PERIOD => match value {
            "fast" | "slow" => Ok(()),
            other => Err(decode_error(format!(
                "expected 'fast' or 'slow', got '{other}'"
            ))),
        },
        keys::ACCOUNT_SYNC => AccountSyncStatus::decode(value).map(drop).map_err(decode_error),
        keys::ACCOUNT_SYNC_SERVICE => AccountSyncService::decode(value)
            .map(drop)
            .map_err(decode_error),
        keys::CHANNEL_FAVORITES => serde_json::from_str::<Vec<String>>(value)
            .map(drop)
            .map_err(|e| decode_error(format!("expected a JSON array of strings: {e}"))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_core::api::{MemoryBackend, MemoryStore, TrackingConfig};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn store_with(entries: &[(&str, &str)]) -> (StoreManager, Arc<MemoryStore>) {
        let data = Arc::new(MemoryStore::with_entries(entries.iter().copied()));
        let store = StoreManager::new(Arc::new(MemoryBackend::with_store(data.clone())));
        (store, data)
    }

    #[tokio::test]
    async fn list_shows_defaults_and_stored_values() {
        let (store, data) = store_with(&[(keys::TRACK_NETWORK_PERIOD, "slow")]);

        let mut out = Output::buffer(false);
        list(&store, &mut out).await.unwrap();
        let text = out.text();

        assert!(text.contains("TRACK_NETWORK_PERIOD = slow\n"));
        assert!(text.contains("notification-sound = /sounds/notification.mp3\n"));
        assert_eq!(
            data.snapshot().get(keys::ACCOUNT_SYNC).map(String::as_str),
            Some("NotSynced")
        );
    }

    #[tokio::test]
    async fn get_unknown_unset_key_exits_one() {
        let (store, _) = store_with(&[("custom", "x")]);

        let mut out = Output::buffer(false);
        assert_eq!(get(&store, "custom", &mut out).await.unwrap(), 0);
        assert_eq!(out.text(), "x\n");

        let mut out = Output::buffer(true);
        assert_eq!(get(&store, "missing", &mut out).await.unwrap(), 1);
        let value: Value = serde_json::from_str(&out.text()).unwrap();
        assert_eq!(value["value"], Value::Null);
    }

    #[tokio::test]
    async fn set_validates_typed_settings() {
        let (store, data) = store_with(&[]);

        let err = set(&store, keys::ACCOUNT_SYNC, "Maybe", &mut Output::buffer(false))
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Setting(SettingError::Decode { .. })));

        let err = set(
            &store,
            keys::CHANNEL_FAVORITES,
            "{\"a\":1}",
            &mut Output::buffer(false),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CliError::Setting(_)));
        assert!(data.snapshot().is_empty());

        set(&store, keys::ACCOUNT_SYNC_SERVICE, "Dropbox", &mut Output::buffer(false))
            .await
            .unwrap();
        assert_eq!(
            data.snapshot()
                .get(keys::ACCOUNT_SYNC_SERVICE)
                .map(String::as_str),
            Some("Dropbox")
        );
    }

    #[tokio::test]
    async fn set_surfaces_store_failures() {
        let (store, data) = store_with(&[]);
        data.set_fail_writes(true);

        let err = set(&store, keys::TRACK_NETWORK_PERIOD, "slow", &mut Output::buffer(false))
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Setting(SettingError::Store { .. })));
    }

    #[tokio::test]
    async fn toggle_tracking_flips_and_persists() {
        let (store, data) = store_with(&[]);
        let tracking = TrackNetworkPeriod::open(store, TrackingConfig::default()).await;

        let mut out = Output::buffer(false);
        toggle_tracking(&tracking, &mut out).await.unwrap();

        assert_eq!(out.text(), "tracking: slow (60000 ms)\n");
        assert_eq!(
            data.snapshot()
                .get(keys::TRACK_NETWORK_PERIOD)
                .map(String::as_str),
            Some("slow")
        );
    }
}
