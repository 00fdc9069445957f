use std::io::Write;

use haven_core::api::{CliError, StoreManager};
use serde_json::json;

use super::output::Output;

pub async fn keys<W: Write>(store: &StoreManager, out: &mut Output<W>) -> Result<i32, CliError> {
    let keys = store.keys().await?;
    if out.is_json() {
        out.json(&json!(keys))?;
    } else {
        for key in &keys {
            out.line(key)?;
        }
    }
    Ok(0)
}

pub async fn get<W: Write>(
    store: &StoreManager,
    key: &str,
    out: &mut Output<W>,
) -> Result<i32, CliError> {
    let value = store.get_value(key).await?;
    if out.is_json() {
        out.json(&json!({ "key": key, "value": value }))?;
    } else if let Some(value) = &value {
        out.line(value)?;
    }
    Ok(if value.is_some() { 0 } else { 1 })
}

pub async fn delete<W: Write>(
    store: &StoreManager,
    key: &str,
    out: &mut Output<W>,
) -> Result<i32, CliError> {
    store.delete_value(key).await?;
    if out.is_json() {
        out.json(&json!({ "deleted": key }))?;
    } else {
        out.line(format_args!("deleted {key}"))?;
    }
    Ok(0)
}

pub async fn clear<W: Write>(
    store: &StoreManager,
    yes: bool,
    out: &mut Output<W>,
) -> Result<i32, CliError> {
    if !yes {
        return Err(CliError::Command(
            "refusing to clear the store without --yes".to_string(),
        ));
    }
    let removed = store.keys().await?.len();
    store.clear().await?;
    tracing::info!(removed, "persistent store cleared");
    if out.is_json() {
        out.json(&json!({ "cleared": removed }))?;
    } else {
        out.line(format_args!("cleared {removed} keys"))?;
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_core::api::{MemoryBackend, MemoryStore};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn store() -> (StoreManager, Arc<MemoryStore>) {
        let data = Arc::new(MemoryStore::with_entries([("b", "2"), ("a", "1")]));
        let store = StoreManager::new(Arc::new(MemoryBackend::with_store(data.clone())));
        (store, data)
    }

    #[tokio::test]
    async fn keys_are_sorted() {
        let (store, _) = store();
        let mut out = Output::buffer(false);
        keys(&store, &mut out).await.unwrap();
        assert_eq!(out.text(), "a\nb\n");

        let mut out = Output::buffer(true);
        keys(&store, &mut out).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&out.text()).unwrap();
        assert_eq!(value, json!(["a", "b"]));
    }

    #[tokio::test]
    async fn get_and_delete() {
        let (store, data) = store();
        let mut out = Output::buffer(false);
        assert_eq!(get(&store, "a", &mut out).await.unwrap(), 0);
        assert_eq!(out.text(), "1\n");

        delete(&store, "a", &mut Output::buffer(false)).await.unwrap();
        assert!(!data.snapshot().contains_key("a"));
        assert_eq!(get(&store, "a", &mut Output::buffer(false)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn clear_needs_confirmation() {
        let (store, data) = store();
        let err = clear(&store, false, &mut Output::buffer(false))
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Command(_)));
        assert_eq!(data.snapshot().len(), 2);

        let mut out = Output::buffer(false);
        clear(&store, true, &mut out).await.unwrap();
        assert_eq!(out.text(), "cleared 2 keys\n");
        assert!(data.snapshot().is_empty());
    }

    #[tokio::test]
    async fn unreadable_store_is_an_error() {
        let (store, data) = store();
        data.set_fail_reads(true);
        let err = get(&store, "a", &mut Output::buffer(false))
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Store(_)));
    }
}
