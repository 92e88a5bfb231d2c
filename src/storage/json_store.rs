use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs4::tokio::AsyncFileExt;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::fs::operations::{open_lock_file, read_optional, write_atomic};

use super::{
    entities::{Entry, EntryId, EntryPatch, Project, ProjectId, ProjectPatch},
    record_store::{Document, RecordStore, StoreError},
};

const STORE_FILE: &str = "store.json";
const LOCK_FILE: &str = "store.lock";

/// The main realization of [RecordStore]. Keeps the whole [Document] in a single file
/// and guards it with an advisory file lock, so separate processes can't interleave
/// their read-modify-write cycles.
pub struct JsonRecordStore {
    store_path: PathBuf,
    lock_path: PathBuf,
    // File locks are per process, so tasks inside one process queue up here first.
    guard: Mutex<()>,
}

impl JsonRecordStore {
    pub fn new(dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&dir)?;

        Ok(Self {
            store_path: dir.join(STORE_FILE),
            lock_path: dir.join(LOCK_FILE),
            guard: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.store_path
    }

    async fn load_unlocked(&self) -> Result<Document, StoreError> {
        debug!("Loading {:?}", self.store_path);
        match read_optional(&self.store_path).await? {
            Some(contents) if !contents.trim().is_empty() => Ok(serde_json::from_str(&contents)?),
            Some(_) | None => Ok(Document::default()),
        }
    }

    async fn read<T>(&self, op: impl FnOnce(&Document) -> T + Send) -> Result<T, StoreError> {
        let _guard = self.guard.lock().await;
        let lock = open_lock_file(&self.lock_path).await?;
        lock.lock_shared()?;
        let result = self.load_unlocked().await.map(|document| op(&document));
        lock.unlock_async().await?;
        result
    }

    async fn transact<T>(
        &self,
        op: impl FnOnce(&mut Document) -> Result<T, StoreError> + Send,
    ) -> Result<T, StoreError> {
        let _guard = self.guard.lock().await;
        let lock = open_lock_file(&self.lock_path).await?;
        lock.lock_exclusive()?;
        let result = self.transact_locked(op).await;
        lock.unlock_async().await?;
        result
    }

    async fn transact_locked<T>(
        &self,
        op: impl FnOnce(&mut Document) -> Result<T, StoreError> + Send,
    ) -> Result<T, StoreError> {
        let mut document = self.load_unlocked().await?;
        // A failed operation must not touch the file.
        let value = op(&mut document)?;
        let serialized = serde_json::to_vec_pretty(&document)?;
        write_atomic(&self.store_path, &serialized).await?;
        debug!("Saved {:?}", self.store_path);
        Ok(value)
    }
}

#[async_trait]
impl RecordStore for JsonRecordStore {
    #[instrument(skip(self, project), fields(id = %project.id))]
    async fn insert_project(&self, project: Project) -> Result<Project, StoreError> {
        self.transact(|d| Ok(d.insert_project(project))).await
    }

    async fn projects(&self) -> Result<Vec<Project>, StoreError> {
        self.read(Document::projects).await
    }

    async fn project(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        self.read(|d| d.project(id)).await
    }

    #[instrument(skip(self, patch))]
    async fn update_project(
        &self,
        id: ProjectId,
        patch: ProjectPatch,
    ) -> Result<Project, StoreError> {
        self.transact(|d| d.update_project(id, patch)).await
    }

    #[instrument(skip(self))]
    async fn delete_project_if_unreferenced(&self, id: ProjectId) -> Result<(), StoreError> {
        self.transact(|d| d.delete_project_if_unreferenced(id)).await
    }

    #[instrument(skip(self, entry), fields(id = %entry.id))]
    async fn insert_entry(&self, entry: Entry) -> Result<Entry, StoreError> {
        self.transact(|d| d.insert_entry(entry)).await
    }

    async fn entries(&self) -> Result<Vec<Entry>, StoreError> {
        self.read(Document::entries).await
    }

    async fn entry(&self, id: EntryId) -> Result<Option<Entry>, StoreError> {
        self.read(|d| d.entry(id)).await
    }

    #[instrument(skip(self, patch))]
    async fn update_entry(&self, id: EntryId, patch: EntryPatch) -> Result<Entry, StoreError> {
        self.transact(|d| d.update_entry(id, patch)).await
    }

    #[instrument(skip(self))]
    async fn delete_entry(&self, id: EntryId) -> Result<(), StoreError> {
        self.transact(|d| d.delete_entry(id)).await
    }

    async fn running_entry(&self) -> Result<Option<Entry>, StoreError> {
        self.read(Document::running_entry).await
    }

    async fn entries_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Entry>, StoreError> {
        self.read(|d| d.entries_between(from, to)).await
    }
}
