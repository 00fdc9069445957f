//! One-shot migration of legacy flat-storage keys into the persistent store.
//!
//! Runs once per store lifetime: the completion sentinel in legacy storage is
//! checked before any work and set unconditionally once every key has been
//! visited. Per key, a value already present in the persistent store is never
//! overwritten, and the legacy copy is removed once the key has been handled.

use std::sync::Arc;

use crate::error::{MigrationError, StoreError};
use crate::settings::keys;
use crate::store::{LegacyStorage, StoreManager};

/// Sentinel marking a finished migration.
pub const MIGRATION_COMPLETED_KEY: &str = "__kv_migration_completed__";

const MIGRATION_COMPLETED_VALUE: &str = "true";

/// Every legacy key that moves to the persistent store.
pub const LEGACY_KEYS: &[&str] = &[
    keys::CLIENT_INITIALIZED,
    keys::DMS_DATABASE_NAME,
    keys::ACCOUNT_SYNC,
    keys::ACCOUNT_SYNC_SERVICE,
    "prettyprints",
    "version",
    "spacesFirstLoad",
    keys::TRACK_NETWORK_PERIOD,
    "notification-permission",
];

/// What a call to [`StorageMigrator::migrate`] did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// The sentinel was already set; nothing was touched.
    pub already_completed: bool,
    /// Keys copied into the persistent store.
    pub migrated: usize,
    /// Keys whose legacy copy was dropped because the store already had one.
    pub skipped_existing: usize,
    /// Keys that failed and were left for inspection.
    pub failures: Vec<KeyFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFailure {
    pub key: String,
    pub error: StoreError,
}

enum KeyOutcome {
    Absent,
    Migrated,
    SkippedExisting,
}

pub struct StorageMigrator {
    store: StoreManager,
    legacy: Arc<dyn LegacyStorage>,
    keys: Vec<String>,
}

impl StorageMigrator {
    pub fn new(store: StoreManager, legacy: Arc<dyn LegacyStorage>) -> Self {
        Self::with_keys(store, legacy, LEGACY_KEYS.iter().copied())
    }

    pub fn with_keys<I, S>(store: StoreManager, legacy: Arc<dyn LegacyStorage>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            store,
            legacy,
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_completed(&self) -> bool {
        match self.legacy.get_item(MIGRATION_COMPLETED_KEY) {
            Ok(v) => v.as_deref() == Some(MIGRATION_COMPLETED_VALUE),
            Err(e) => {
                tracing::warn!("[migration] cannot read completion sentinel: {}", e);
                false
            }
        }
    }

    /// Migrate every listed legacy key. Safe to call repeatedly.
    pub async fn migrate(&self) -> Result<MigrationReport, MigrationError> {
        if self.is_completed() {
            tracing::debug!("[migration] already completed, skipping");
            return Ok(MigrationReport {
                already_completed: true,
                ..Default::default()
            });
        }

        tracing::info!("[migration] starting legacy storage migration");
        let store = self.store.store().await?;

        let mut report = MigrationReport::default();
        for key in &self.keys {
            match self.migrate_key(store.as_ref(), key).await {
                Ok(KeyOutcome::Absent) => {}
                Ok(KeyOutcome::Migrated) => {
                    tracing::debug!("[migration] migrated '{}'", key);
                    report.migrated += 1;
                }
                Ok(KeyOutcome::SkippedExisting) => {
                    tracing::debug!("[migration] '{}' already in store, skipping", key);
                    report.skipped_existing += 1;
                }
                Err(error) => {
                    tracing::error!("[migration] failed to migrate '{}': {}", key, error);
                    report.failures.push(KeyFailure {
                        key: key.clone(),
                        error,
                    });
                }
            }
        }

        if let Err(e) = self
            .legacy
            .set_item(MIGRATION_COMPLETED_KEY, MIGRATION_COMPLETED_VALUE)
        {
            tracing::warn!("[migration] cannot record completion: {}", e);
        }

        tracing::info!(
            migrated = report.migrated,
            skipped = report.skipped_existing,
            failed = report.failures.len(),
            "[migration] complete"
        );
        Ok(report)
    }

    async fn migrate_key(
        &self,
        store: &dyn crate::store::KvStore,
        key: &str,
    ) -> Result<KeyOutcome, StoreError> {
        let Some(value) = self.legacy.get_item(key)? else {
            return Ok(KeyOutcome::Absent);
        };

        let outcome = if store.get(key).await?.is_some() {
            KeyOutcome::SkippedExisting
        } else {
            // Stored verbatim; legacy values are already encoded.
            store.set(key, &value).await?;
            KeyOutcome::Migrated
        };

        self.legacy.remove_item(key)?;
        Ok(outcome)
    }
}

/// Await the migration before anything trusts the persistent store, treating
/// failure as non-fatal so startup always proceeds.
pub async fn run_startup_migration(migrator: &StorageMigrator) -> Option<MigrationReport> {
    match migrator.migrate().await {
        Ok(report) => Some(report),
        Err(e) => {
            tracing::error!("[migration] failed, continuing startup anyway: {}", e);
            None
        }
    }
}
