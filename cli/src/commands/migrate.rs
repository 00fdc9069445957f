use std::io::Write;

use haven_core::api::{CliError, MigrationError, MigrationReport, StorageMigrator};
use serde_json::json;

use super::output::Output;

pub async fn run<W: Write>(
    migrator: &StorageMigrator,
    out: &mut Output<W>,
) -> Result<i32, CliError> {
    let report = migrator.migrate().await.map_err(|e| match e {
        MigrationError::Store(e) => CliError::Store(e),
    })?;
    render(&report, out)?;
    Ok(if report.failures.is_empty() { 0 } else { 1 })
}

fn render<W: Write>(report: &MigrationReport, out: &mut Output<W>) -> Result<(), CliError> {
    if out.is_json() {
        let failures: Vec<_> = report
            .failures
            .iter()
            .map(|f| json!({ "key": f.key, "error": f.error.to_string() }))
            .collect();
        out.json(&json!({
            "already_completed": report.already_completed,
            "migrated": report.migrated,
            "skipped_existing": report.skipped_existing,
            "failures": failures,
        }))?;
        return Ok(());
    }

    if report.already_completed {
        out.line("migration already completed")?;
        return Ok(());
    }
    out.line(format_args!("migrated: {}", report.migrated))?;
    out.line(format_args!(
        "skipped (already in store): {}",
        report.skipped_existing
    ))?;
    out.line(format_args!("failed: {}", report.failures.len()))?;
    for failure in &report.failures {
        out.line(format_args!("  {}: {}", failure.key, failure.error))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_core::api::{
        keys, MemoryBackend, MemoryLegacyStorage, StoreManager, MIGRATION_COMPLETED_KEY,
    };
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn migrator(legacy: MemoryLegacyStorage) -> (StorageMigrator, Arc<MemoryLegacyStorage>) {
        let legacy = Arc::new(legacy);
        let store = StoreManager::new(Arc::new(MemoryBackend::new()));
        (StorageMigrator::new(store, legacy.clone()), legacy)
    }

    #[tokio::test]
    async fn prints_counts_then_reports_completion() {
        let (migrator, legacy) = migrator(MemoryLegacyStorage::with_entries([
            (keys::TRACK_NETWORK_PERIOD, "slow"),
            (keys::ACCOUNT_SYNC, "Synced"),
        ]));

        let mut out = Output::buffer(false);
        assert_eq!(run(&migrator, &mut out).await.unwrap(), 0);
        assert_eq!(
            out.text(),
            "migrated: 2\nskipped (already in store): 0\nfailed: 0\n"
        );
        assert_eq!(
            legacy.snapshot().get(MIGRATION_COMPLETED_KEY).map(String::as_str),
            Some("true")
        );

        let mut out = Output::buffer(false);
        run(&migrator, &mut out).await.unwrap();
        assert_eq!(out.text(), "migration already completed\n");
    }

    #[tokio::test]
    async fn json_report() {
        let (migrator, _) = migrator(MemoryLegacyStorage::with_entries([("version", "3")]));

        let mut out = Output::buffer(true);
        run(&migrator, &mut out).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&out.text()).unwrap();
        assert_eq!(value["migrated"], 1);
        assert_eq!(value["already_completed"], false);
        assert_eq!(value["failures"], json!([]));
    }
}
