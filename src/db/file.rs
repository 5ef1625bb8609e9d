use anyhow::{anyhow, Context as _, Result};
use std::future::Future;
use std::path::{Path, PathBuf};

use super::{
    backup,
    reconcile::{self, BatchOutcome},
    record::{Record, RecordId},
};

pub const LEDGER_KEY: &str = "records.json";

/// Whole-blob key-value storage.
pub trait BlobStore {
    /// Returns Ok(None) if nothing was stored under `key` yet
    fn load(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;
    fn save(&self, key: &str, content: Vec<u8>) -> impl Future<Output = Result<()>> + Send;
}

/// Stores each key as a file in a directory.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl BlobStore for FileBlobStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.dir.join(key);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        Ok(Some(tokio::fs::read(&path).await?))
    }

    async fn save(&self, key: &str, content: Vec<u8>) -> Result<()> {
        let path = self.dir.join(key);

        // First write to temporary file so we don't lose data if writing fails halfway
        let filename = path
            .file_name()
            .ok_or_else(|| anyhow!("Path has no filename"))?
            .to_str()
            .ok_or_else(|| anyhow!("Filename isn't valid utf-8"))?;
        let tmppath = path.with_file_name(format!("{}.temp", filename));
        tokio::fs::write(&tmppath, content).await?;

        // Ok, writing succeeded, let's now replace the real file with the tmpfile
        tokio::fs::rename(&tmppath, &path).await?;
        Ok(())
    }
}

/// The persisted ledger. Every mutation loads the full record list, changes
/// it in memory and writes the full list back. Assumes a single writer.
pub struct LedgerStore<S: BlobStore> {
    store: S,
    key: String,
}

impl<S: BlobStore> LedgerStore<S> {
    pub fn new(store: S) -> Self {
        Self::with_key(store, LEDGER_KEY)
    }

    pub fn with_key(store: S, key: &str) -> Self {
        Self {
            store,
            key: key.to_string(),
        }
    }

    /// Empty if nothing was stored yet; fails if the stored ledger can't be
    /// read or parsed.
    pub async fn load_strict(&self) -> Result<Vec<Record>> {
        log::info!("Loading ledger...");
        let Some(content) = self.store.load(&self.key).await? else {
            log::info!("Loading ledger...not found, starting empty");
            return Ok(vec![]);
        };
        if content.iter().all(u8::is_ascii_whitespace) {
            return Ok(vec![]);
        }
        let records: Vec<Record> =
            serde_json::from_slice(&content).context("Ledger file is corrupt")?;
        log::info!("Loading ledger...done ({} records)", records.len());
        Ok(records)
    }

    /// Like [Self::load_strict], but read failures yield an empty ledger.
    pub async fn load(&self) -> Vec<Record> {
        match self.load_strict().await {
            Ok(records) => records,
            Err(err) => {
                log::error!("Failed to load ledger, treating it as empty: {err:#}");
                vec![]
            }
        }
    }

    pub async fn save_all(&self, records: &[Record]) -> Result<()> {
        log::info!("Saving ledger ({} records)...", records.len());
        let content = serde_json::to_vec_pretty(records)?;
        self.store
            .save(&self.key, content)
            .await
            .context("Failed to save ledger")?;
        log::info!("Saving ledger...done");
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        self.save_all(&[]).await
    }

    pub async fn add(&self, record: Record) -> Result<Vec<Record>> {
        let outcome = self.import_batch(vec![record]).await?;
        Ok(outcome.ledger)
    }

    pub async fn import_batch(&self, candidates: Vec<Record>) -> Result<BatchOutcome> {
        let existing = self.load_strict().await?;
        let outcome = reconcile::import_batch(candidates, existing);
        self.save_all(&outcome.ledger).await?;
        Ok(outcome)
    }

    pub async fn merge(&self, incoming: Vec<Record>) -> Result<Vec<Record>> {
        let existing = self.load_strict().await?;
        let merged = reconcile::merge_by_identity(incoming, existing);
        self.save_all(&merged).await?;
        Ok(merged)
    }

    /// Merges a backup into the ledger. A malformed backup leaves the ledger untouched.
    pub async fn restore_backup(&self, content: &[u8]) -> Result<Vec<Record>> {
        let incoming = backup::parse_backup(content)?;
        self.merge(incoming).await
    }

    pub async fn export_backup(&self) -> Result<Vec<u8>> {
        backup::render_backup(&self.load_strict().await?)
    }

    /// Returns the removed record, if there was one.
    pub async fn delete(&self, id: &RecordId) -> Result<Option<Record>> {
        let existing = self.load_strict().await?;
        let removed = existing.iter().find(|record| record.id() == id).cloned();
        let remaining = reconcile::delete_by_id(id, existing);
        self.save_all(&remaining).await?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testutils::{file_record, ids, manual_record};

    fn some_ledger() -> Vec<Record> {
        vec![
            file_record("1", "8月5日财报.xlsx", 2023, 8, 5, "12500"),
            file_record("2", "7月30日财报.xlsx", 2023, 7, 30, "8750"),
            manual_record("3", "季度调整", 2023, 7, 15, "-3200"),
        ]
    }

    fn ledger_store(dir: &Path) -> LedgerStore<FileBlobStore> {
        LedgerStore::new(FileBlobStore::new(dir))
    }

    #[tokio::test]
    async fn load_nonexisting() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = ledger_store(tempdir.path());
        assert!(store.load_strict().await.unwrap().is_empty());
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn save_and_load() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = ledger_store(tempdir.path());
        store.save_all(&some_ledger()).await.unwrap();
        assert_eq!(some_ledger(), store.load().await);
    }

    #[tokio::test]
    async fn saves_pretty_json() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = ledger_store(tempdir.path());
        store.save_all(&some_ledger()).await.unwrap();
        let content = std::fs::read_to_string(tempdir.path().join(LEDGER_KEY)).unwrap();
        assert!(content.starts_with("[\n  {"));
        assert!(!tempdir.path().join("records.json.temp").exists());
    }

    #[tokio::test]
    async fn corrupt_ledger_is_masked_by_load_but_not_by_load_strict() {
        let tempdir = tempfile::tempdir().unwrap();
        std::fs::write(tempdir.path().join(LEDGER_KEY), "{not json").unwrap();
        let store = ledger_store(tempdir.path());
        assert!(store.load().await.is_empty());
        assert!(store.load_strict().await.is_err());
    }

    #[tokio::test]
    async fn blank_ledger_file_is_empty() {
        let tempdir = tempfile::tempdir().unwrap();
        std::fs::write(tempdir.path().join(LEDGER_KEY), "\n").unwrap();
        assert!(ledger_store(tempdir.path()).load_strict().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_failure_is_reported() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = ledger_store(&tempdir.path().join("missing-dir"));
        assert!(store.save_all(&some_ledger()).await.is_err());
    }

    #[tokio::test]
    async fn delete_then_load() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = ledger_store(tempdir.path());
        store.save_all(&some_ledger()).await.unwrap();

        let removed = store.delete(&RecordId::new("2".to_string())).await.unwrap();
        assert_eq!(Some("2"), removed.as_ref().map(|r| r.id().as_str()));
        let loaded = store.load().await;
        assert_eq!(2, loaded.len());
        assert_eq!(vec!["1", "3"], ids(&loaded));

        let removed = store.delete(&RecordId::new("2".to_string())).await.unwrap();
        assert_eq!(None, removed);
        assert_eq!(2, store.load().await.len());
    }

    #[tokio::test]
    async fn clear_then_load() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = ledger_store(tempdir.path());
        store.save_all(&some_ledger()).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn import_batch_persists_accepted_records() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = ledger_store(tempdir.path());
        store.save_all(&some_ledger()).await.unwrap();

        let outcome = store
            .import_batch(vec![
                file_record("10", "8月6日财报.xlsx", 2023, 8, 6, "1"),
                file_record("11", "8月5日财报.xlsx", 2023, 8, 5, "1"),
            ])
            .await
            .unwrap();
        assert_eq!(vec!["11"], ids(&outcome.duplicates));
        assert_eq!(vec!["10", "1", "2", "3"], ids(&store.load().await));
    }

    #[tokio::test]
    async fn add_prepends() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = ledger_store(tempdir.path());
        store.save_all(&some_ledger()).await.unwrap();
        store
            .add(manual_record("4", "午餐", 2023, 8, 6, "-45"))
            .await
            .unwrap();
        assert_eq!(vec!["4", "1", "2", "3"], ids(&store.load().await));
    }

    #[tokio::test]
    async fn restore_merges_by_id() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = ledger_store(tempdir.path());
        store.save_all(&some_ledger()).await.unwrap();

        let backup = backup::render_backup(&[
            manual_record("3", "季度调整", 2023, 7, 15, "-3300"),
            manual_record("5", "补贴", 2023, 7, 20, "800"),
        ])
        .unwrap();
        store.restore_backup(&backup).await.unwrap();

        let loaded = store.load().await;
        assert_eq!(vec!["1", "2", "3", "5"], ids(&loaded));
        assert_eq!(rust_decimal::Decimal::from(-3300), loaded[2].amount());
    }

    #[tokio::test]
    async fn malformed_restore_leaves_ledger_untouched() {
        let tempdir = tempfile::tempdir().unwrap();
        let store = ledger_store(tempdir.path());
        store.save_all(&some_ledger()).await.unwrap();

        assert!(store.restore_backup(br#"{"id": "1"}"#).await.is_err());
        assert_eq!(some_ledger(), store.load().await);
    }

    #[tokio::test]
    async fn export_then_restore_into_empty_ledger() {
        let source_dir = tempfile::tempdir().unwrap();
        let target_dir = tempfile::tempdir().unwrap();
        let source = ledger_store(source_dir.path());
        let target = ledger_store(target_dir.path());
        source.save_all(&some_ledger()).await.unwrap();

        let backup = source.export_backup().await.unwrap();
        target.restore_backup(&backup).await.unwrap();
        assert_eq!(some_ledger(), target.load().await);
    }
}
