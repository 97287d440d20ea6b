//! Per-project data migrations.
//!
//! Each project board records how many migrations have been applied to it
//! (`lastRunMigration`). Loading a project runs the remaining steps in order
//! and advances the checkpoint after each one, so a failed step is retried on
//! the next load and a completed step never runs twice.

use crate::error::{SdkError, SdkResult};
use async_trait::async_trait;
use portabella_crypto::{Record, ResourceKey, aes};
use tracing::info;

/// Board field holding the migration checkpoint.
pub const CHECKPOINT_FIELD: &str = "lastRunMigration";

/// Partial-update primitives a migration may persist through.
///
/// Both must be idempotent: a step interrupted after persisting is run again.
#[async_trait]
pub trait MigrationStore: Send + Sync {
    async fn update_board(&self, fields: Record) -> SdkResult<()>;

    async fn update_column(&self, column_id: &str, fields: Record) -> SdkResult<()>;
}

/// What a migration step can do to the project it runs against.
pub struct MigrationContext<'a> {
    key: &'a ResourceKey,
    store: &'a dyn MigrationStore,
}

impl<'a> MigrationContext<'a> {
    pub fn new(key: &'a ResourceKey, store: &'a dyn MigrationStore) -> Self {
        Self { key, store }
    }

    /// Decrypts a value encrypted under the project's key.
    pub fn decrypt(&self, ciphertext: &str) -> SdkResult<String> {
        let plaintext = aes::decrypt(ciphertext, self.key)?;
        String::from_utf8(plaintext)
            .map_err(|_| SdkError::InvalidResponse("decrypted value is not UTF-8".to_string()))
    }

    pub async fn update_board(&self, fields: Record) -> SdkResult<()> {
        self.store.update_board(fields).await
    }

    pub async fn update_column(&self, column_id: &str, fields: Record) -> SdkResult<()> {
        self.store.update_column(column_id, fields).await
    }
}

/// One step in a project's data history.
#[async_trait]
pub trait Migration: Send + Sync {
    fn name(&self) -> &'static str;

    async fn apply(&self, project: &Record, ctx: &MigrationContext<'_>) -> SdkResult<()>;
}

/// Applies `steps[last_run..]` in order, persisting the checkpoint after each.
///
/// Returns the checkpoint reached. A failing step yields
/// [`SdkError::Migration`] and leaves the checkpoint where it was.
pub async fn run_migrations(
    project: &Record,
    last_run: usize,
    steps: &[Box<dyn Migration>],
    key: &ResourceKey,
    store: &dyn MigrationStore,
) -> SdkResult<usize> {
    let ctx = MigrationContext::new(key, store);
    let mut checkpoint = last_run;

    for (index, step) in steps.iter().enumerate().skip(last_run) {
        info!(index, name = step.name(), "running migration");
        step.apply(project, &ctx)
            .await
            .map_err(|e| migration_error(index, e))?;

        let mut fields = Record::object();
        fields.insert(CHECKPOINT_FIELD, index + 1);
        store
            .update_board(fields)
            .await
            .map_err(|e| migration_error(index, e))?;

        checkpoint = index + 1;
        info!(index, name = step.name(), "migration completed");
    }

    Ok(checkpoint)
}

fn migration_error(index: usize, source: SdkError) -> SdkError {
    SdkError::Migration {
        index,
        source: Box::new(source),
    }
}

/// Reads the checkpoint from a project's board; absent means none have run.
pub fn last_run_migration(project: &Record) -> usize {
    project
        .get("board")
        .and_then(|board| board.get(CHECKPOINT_FIELD))
        .and_then(Record::as_u64)
        .map_or(0, |n| usize::try_from(n).unwrap_or(usize::MAX))
}

/// The migrations every project goes through, in order.
pub fn default_migrations() -> Vec<Box<dyn Migration>> {
    vec![Box::new(LabelsToJson), Box::new(ColumnFieldEncryption)]
}

/// Board labels used to be one encrypted JSON string; they now live in
/// `labelsV2` as a list of `{label, color}` with each field encrypted.
pub struct LabelsToJson;

#[async_trait]
impl Migration for LabelsToJson {
    fn name(&self) -> &'static str {
        "labels-to-json"
    }

    async fn apply(&self, project: &Record, ctx: &MigrationContext<'_>) -> SdkResult<()> {
        let Some(labels) = project
            .get("board")
            .and_then(|board| board.get("labels"))
            .and_then(Record::as_str)
        else {
            return Ok(());
        };

        let parsed: serde_json::Value = serde_json::from_str(&ctx.decrypt(labels)?)?;
        let mut fields = Record::object();
        fields.insert("labelsV2", Record::from(parsed));
        ctx.update_board(fields).await
    }
}

/// Columns switched to per-field encryption, which needs no data rewrite.
pub struct ColumnFieldEncryption;

#[async_trait]
impl Migration for ColumnFieldEncryption {
    fn name(&self) -> &'static str {
        "column-field-encryption"
    }

    async fn apply(&self, _project: &Record, _ctx: &MigrationContext<'_>) -> SdkResult<()> {
        Ok(())
    }
}
