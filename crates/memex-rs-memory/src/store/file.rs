use super::{MemoryStore, prepare_new, sort_oldest_first, validate_record};
use crate::error::MemoryError;
use crate::model::{MemoryFilter, MemoryId, MemoryRecord};
use async_trait::async_trait;
use log::{debug, info, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const RECORD_EXTENSION: &str = "json";

/// File-backed store: one JSON document per record under
/// `{root}/{namespace}/{platform}/{id}.json`.
#[derive(Debug)]
pub struct FileStore {
    /// Root directory for memory records.
    root: PathBuf,
    /// Record id to file path.
    index: RwLock<HashMap<MemoryId, PathBuf>>,
}

impl FileStore {
    /// Open a store under `root`, indexing the records already on disk.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        let index = scan_records(&root)?;
        info!(
            "initialized file memory store (root={}, records={})",
            root.display(),
            index.len()
        );
        Ok(Self {
            root,
            index: RwLock::new(index),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path for a record's JSON document.
    fn record_path(&self, record: &MemoryRecord) -> PathBuf {
        self.root
            .join(&record.meta.namespace)
            .join(&record.meta.platform)
            .join(format!("{}.{RECORD_EXTENSION}", record.meta.id))
    }

    fn indexed_path(&self, id: &str) -> Option<PathBuf> {
        self.index.read().get(id).cloned()
    }
}

/// Write a record through a temp file and rename it into place.
fn write_record(path: &Path, record: &MemoryRecord) -> Result<(), MemoryError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension(format!("{RECORD_EXTENSION}.tmp"));
    {
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&temp_path)?;
        let payload = serde_json::to_vec_pretty(record)?;
        file.write_all(&payload)?;
        file.sync_all()?;
    }
    std::fs::rename(temp_path, path)?;
    Ok(())
}

fn read_record(path: &Path) -> Result<Option<MemoryRecord>, MemoryError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn remove_file(path: &Path) -> Result<(), MemoryError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Build the id index from every record document under `root`.
fn scan_records(root: &Path) -> Result<HashMap<MemoryId, PathBuf>, MemoryError> {
    let mut index = HashMap::new();
    for entry in WalkDir::new(root).min_depth(3).max_depth(3) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("skipping unreadable memory path: {err}");
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION)
        {
            continue;
        }
        match read_record(path) {
            Ok(Some(record)) => {
                index.insert(record.meta.id, path.to_path_buf());
            }
            Ok(None) => {}
            Err(err) => warn!("invalid memory record ignored (path={}): {err}", path.display()),
        }
    }
    Ok(index)
}

#[async_trait]
impl MemoryStore for FileStore {
    async fn add(&self, record: MemoryRecord) -> Result<MemoryRecord, MemoryError> {
        let record = prepare_new(record)?;
        if self.indexed_path(&record.meta.id).is_some() {
            return Err(MemoryError::DuplicateId(record.meta.id));
        }
        let path = self.record_path(&record);
        write_record(&path, &record)?;
        self.index.write().insert(record.meta.id.clone(), path);
        debug!(
            "stored memory record (id={}, type={}, text_len={})",
            record.meta.id,
            record.memory_type(),
            record.body.text.len()
        );
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Option<MemoryRecord>, MemoryError> {
        let Some(path) = self.indexed_path(id) else {
            return Ok(None);
        };
        let record = read_record(&path)?;
        if record.is_none() {
            self.index.write().remove(id);
        }
        Ok(record)
    }

    async fn update(&self, record: MemoryRecord) -> Result<(), MemoryError> {
        validate_record(&record)?;
        let Some(previous) = self.indexed_path(&record.meta.id) else {
            return Err(MemoryError::NotFound(record.meta.id));
        };
        let path = self.record_path(&record);
        write_record(&path, &record)?;
        if previous != path {
            remove_file(&previous)?;
        }
        self.index.write().insert(record.meta.id, path);
        Ok(())
    }

    async fn purge(&self, id: &str) -> Result<bool, MemoryError> {
        let Some(path) = self.index.write().remove(id) else {
            return Ok(false);
        };
        remove_file(&path)?;
        debug!("purged memory record (id={id})");
        Ok(true)
    }

    async fn query(&self, filter: &MemoryFilter) -> Result<Vec<MemoryRecord>, MemoryError> {
        let paths = self.index.read().values().cloned().collect::<Vec<_>>();
        let mut records = Vec::new();
        for path in paths {
            if let Some(record) = read_record(&path)?
                && filter.matches(&record)
            {
                records.push(record);
            }
        }
        sort_oldest_first(&mut records);
        Ok(records)
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        let paths = self
            .index
            .write()
            .drain()
            .map(|(_, path)| path)
            .collect::<Vec<_>>();
        for path in &paths {
            remove_file(path)?;
        }
        info!(
            "cleared file memory store (root={}, removed={})",
            self.root.display(),
            paths.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::FileStore;
    use crate::model::{MemoryFilter, MemoryRecord, MemoryStatus, MemoryType, Scope};
    use crate::store::MemoryStore;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[tokio::test]
    async fn records_live_under_namespace_and_platform() {
        let temp = tempdir().expect("tempdir");
        let store = FileStore::open(temp.path()).expect("store");
        let scope = Scope::new("openai", "work");
        let record = store
            .add(MemoryRecord::new(&scope, MemoryType::Core, "ship v1", Utc::now()))
            .await
            .expect("add");
        let expected = temp
            .path()
            .join("work")
            .join("openai")
            .join(format!("{}.json", record.meta.id));
        assert!(expected.is_file());
        assert_eq!(store.get(&record.meta.id).await.expect("get"), Some(record));
    }

    #[tokio::test]
    async fn reopen_rebuilds_index_and_skips_garbage() {
        let temp = tempdir().expect("tempdir");
        let scope = Scope::new("generic", "default");
        let record = {
            let store = FileStore::open(temp.path()).expect("store");
            store
                .add(MemoryRecord::new(&scope, MemoryType::Persona, "likes tea", Utc::now()))
                .await
                .expect("add")
        };
        std::fs::write(
            temp.path().join("default").join("generic").join("broken.json"),
            "{not json",
        )
        .expect("write garbage");
        std::fs::write(temp.path().join("audit.jsonl"), "{}\n").expect("write audit");

        let store = FileStore::open(temp.path()).expect("reopen");
        let all = store.query(&MemoryFilter::all()).await.expect("query");
        assert_eq!(all, vec![record]);
    }

    #[tokio::test]
    async fn update_purge_and_clear() {
        let temp = tempdir().expect("tempdir");
        let store = FileStore::open(temp.path()).expect("store");
        let scope = Scope::new("generic", "default");
        let now = Utc::now();
        let mut first = store
            .add(MemoryRecord::new(&scope, MemoryType::Core, "one", now))
            .await
            .expect("add one");
        let second = store
            .add(MemoryRecord::new(&scope, MemoryType::Core, "two", now))
            .await
            .expect("add two");

        first.set_status(MemoryStatus::Superseded, now);
        store.update(first.clone()).await.expect("update");
        let active = store
            .query(&MemoryFilter::active_in(&scope))
            .await
            .expect("active");
        assert_eq!(active, vec![second.clone()]);

        assert!(store.purge(&second.meta.id).await.expect("purge"));
        assert!(!store.purge(&second.meta.id).await.expect("purge again"));
        store.clear().await.expect("clear");
        assert!(store.query(&MemoryFilter::all()).await.expect("query").is_empty());
        assert!(temp.path().exists());
    }
}
