use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use super::entities::{Entry, EntryId, EntryPatch, Project, ProjectId, ProjectPatch};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("entry {0} not found")]
    EntryNotFound(EntryId),
    #[error("project {0} not found")]
    ProjectNotFound(ProjectId),
    #[error("project {id} is referenced by {references} entries")]
    ProjectInUse { id: ProjectId, references: usize },
    #[error("entry {0} is already running")]
    RunningEntryExists(EntryId),
    #[error("end time {end} must be after start time {start}")]
    EndNotAfterStart {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed store document: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Interface for abstracting storage of projects and entries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_project(&self, project: Project) -> Result<Project, StoreError>;

    /// All projects ordered by creation time.
    async fn projects(&self) -> Result<Vec<Project>, StoreError>;

    async fn project(&self, id: ProjectId) -> Result<Option<Project>, StoreError>;

    async fn update_project(&self, id: ProjectId, patch: ProjectPatch)
        -> Result<Project, StoreError>;

    /// Deletes a project only when no entry references it. The check and the removal
    /// happen in one critical section.
    async fn delete_project_if_unreferenced(&self, id: ProjectId) -> Result<(), StoreError>;

    async fn insert_entry(&self, entry: Entry) -> Result<Entry, StoreError>;

    /// All entries ordered by start time.
    async fn entries(&self) -> Result<Vec<Entry>, StoreError>;

    async fn entry(&self, id: EntryId) -> Result<Option<Entry>, StoreError>;

    /// Applies `patch`. The patched entry must still end after it starts and reference an
    /// existing project, and both are checked in the same critical section as the write.
    async fn update_entry(&self, id: EntryId, patch: EntryPatch) -> Result<Entry, StoreError>;

    async fn delete_entry(&self, id: EntryId) -> Result<(), StoreError>;

    /// The entry without an end timestamp, if any.
    async fn running_entry(&self) -> Result<Option<Entry>, StoreError>;

    /// Entries with `from <= start_ts < to`, ordered by start time.
    async fn entries_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Entry>, StoreError>;
}

#[async_trait]
impl<T> RecordStore for T
where
    T: Deref + Send + Sync,
    T::Target: RecordStore,
{
    async fn insert_project(&self, project: Project) -> Result<Project, StoreError> {
        self.deref().insert_project(project).await
    }

    async fn projects(&self) -> Result<Vec<Project>, StoreError> {
        self.deref().projects().await
    }

    async fn project(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        self.deref().project(id).await
    }

    async fn update_project(
        &self,
        id: ProjectId,
        patch: ProjectPatch,
    ) -> Result<Project, StoreError> {
        self.deref().update_project(id, patch).await
    }

    async fn delete_project_if_unreferenced(&self, id: ProjectId) -> Result<(), StoreError> {
        self.deref().delete_project_if_unreferenced(id).await
    }

    async fn insert_entry(&self, entry: Entry) -> Result<Entry, StoreError> {
        self.deref().insert_entry(entry).await
    }

    async fn entries(&self) -> Result<Vec<Entry>, StoreError> {
        self.deref().entries().await
    }

    async fn entry(&self, id: EntryId) -> Result<Option<Entry>, StoreError> {
        self.deref().entry(id).await
    }

    async fn update_entry(&self, id: EntryId, patch: EntryPatch) -> Result<Entry, StoreError> {
        self.deref().update_entry(id, patch).await
    }

    async fn delete_entry(&self, id: EntryId) -> Result<(), StoreError> {
        self.deref().delete_entry(id).await
    }

    async fn running_entry(&self) -> Result<Option<Entry>, StoreError> {
        self.deref().running_entry().await
    }

    async fn entries_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Entry>, StoreError> {
        self.deref().entries_between(from, to).await
    }
}

pub const DOCUMENT_VERSION: u32 = 1;

/// The whole persisted state. Store implementations load it, run one of the mutating
/// methods below and persist it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub version: u32,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub entries: Vec<Entry>,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            projects: vec![],
            entries: vec![],
        }
    }
}

impl Document {
    pub fn insert_project(&mut self, project: Project) -> Project {
        self.projects.push(project.clone());
        project
    }

    pub fn projects(&self) -> Vec<Project> {
        let mut projects = self.projects.clone();
        projects.sort_by_key(|p| p.created_at);
        projects
    }

    pub fn project(&self, id: ProjectId) -> Option<Project> {
        self.projects.iter().find(|p| p.id == id).cloned()
    }

    pub fn update_project(
        &mut self,
        id: ProjectId,
        patch: ProjectPatch,
    ) -> Result<Project, StoreError> {
        let project = self
            .projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::ProjectNotFound(id))?;
        if let Some(name) = patch.name {
            project.name = name;
        }
        if let Some(color) = patch.color {
            project.color = color;
        }
        Ok(project.clone())
    }

    pub fn delete_project_if_unreferenced(&mut self, id: ProjectId) -> Result<(), StoreError> {
        let position = self
            .projects
            .iter()
            .position(|p| p.id == id)
            .ok_or(StoreError::ProjectNotFound(id))?;
        let references = self
            .entries
            .iter()
            .filter(|e| e.project_id == Some(id))
            .count();
        if references > 0 {
            return Err(StoreError::ProjectInUse { id, references });
        }
        self.projects.remove(position);
        Ok(())
    }

    pub fn insert_entry(&mut self, entry: Entry) -> Result<Entry, StoreError> {
        if entry.is_running() {
            if let Some(running) = self.running_entry() {
                return Err(StoreError::RunningEntryExists(running.id));
            }
        }
        self.entries.push(entry.clone());
        Ok(entry)
    }

    pub fn entries(&self) -> Vec<Entry> {
        let mut entries = self.entries.clone();
        entries.sort_by_key(|e| e.start_ts);
        entries
    }

    pub fn entry(&self, id: EntryId) -> Option<Entry> {
        self.entries.iter().find(|e| e.id == id).cloned()
    }

    pub fn update_entry(&mut self, id: EntryId, patch: EntryPatch) -> Result<Entry, StoreError> {
        // Reopening an entry must not produce a second running one.
        if matches!(patch.end_ts, Some(None)) {
            if let Some(running) = self.entries.iter().find(|e| e.is_running() && e.id != id) {
                return Err(StoreError::RunningEntryExists(running.id));
            }
        }
        let position = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or(StoreError::EntryNotFound(id))?;

        let mut patched = self.entries[position].clone();
        patched.apply(&patch);
        if let Some(end) = patched.end_ts.filter(|end| *end <= patched.start_ts) {
            return Err(StoreError::EndNotAfterStart {
                start: patched.start_ts,
                end,
            });
        }
        if let Some(Some(project_id)) = patch.project_id {
            if self.project(project_id).is_none() {
                return Err(StoreError::ProjectNotFound(project_id));
            }
        }

        self.entries[position] = patched.clone();
        Ok(patched)
    }

    pub fn delete_entry(&mut self, id: EntryId) -> Result<(), StoreError> {
        let position = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or(StoreError::EntryNotFound(id))?;
        self.entries.remove(position);
        Ok(())
    }

    pub fn running_entry(&self) -> Option<Entry> {
        self.entries.iter().find(|e| e.is_running()).cloned()
    }

    pub fn entries_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Entry> {
        let mut entries = self
            .entries
            .iter()
            .filter(|e| from <= e.start_ts && e.start_ts < to)
            .cloned()
            .collect::<Vec<_>>();
        entries.sort_by_key(|e| e.start_ts);
        entries
    }
}

/// Keeps the document in memory only. Used when nothing has to survive the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryRecordStore {
    document: Arc<Mutex<Document>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert_project(&self, project: Project) -> Result<Project, StoreError> {
        debug!("Inserting project {}", project.id);
        Ok(self.document.lock().await.insert_project(project))
    }

    async fn projects(&self) -> Result<Vec<Project>, StoreError> {
        Ok(self.document.lock().await.projects())
    }

    async fn project(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        Ok(self.document.lock().await.project(id))
    }

    async fn update_project(
        &self,
        id: ProjectId,
        patch: ProjectPatch,
    ) -> Result<Project, StoreError> {
        self.document.lock().await.update_project(id, patch)
    }

    async fn delete_project_if_unreferenced(&self, id: ProjectId) -> Result<(), StoreError> {
        self.document.lock().await.delete_project_if_unreferenced(id)
    }

    async fn insert_entry(&self, entry: Entry) -> Result<Entry, StoreError> {
        debug!("Inserting entry {}", entry.id);
        self.document.lock().await.insert_entry(entry)
    }

    async fn entries(&self) -> Result<Vec<Entry>, StoreError> {
        Ok(self.document.lock().await.entries())
    }

    async fn entry(&self, id: EntryId) -> Result<Option<Entry>, StoreError> {
        Ok(self.document.lock().await.entry(id))
    }

    async fn update_entry(&self, id: EntryId, patch: EntryPatch) -> Result<Entry, StoreError> {
        self.document.lock().await.update_entry(id, patch)
    }

    async fn delete_entry(&self, id: EntryId) -> Result<(), StoreError> {
        self.document.lock().await.delete_entry(id)
    }

    async fn running_entry(&self) -> Result<Option<Entry>, StoreError> {
        Ok(self.document.lock().await.running_entry())
    }

    async fn entries_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Entry>, StoreError> {
        Ok(self.document.lock().await.entries_between(from, to))
    }
}
