use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use crate::{
    storage::{
        entities::{Entry, EntryId, EntryPatch, EntrySource, ProjectId},
        record_store::{RecordStore, StoreError},
    },
    utils::clock::Clock,
};

use super::{TrackingError, ValidationError};

/// Time typed in by hand rather than measured by the timer.
#[derive(Debug, Clone)]
pub struct ManualEntry {
    pub project_id: Option<ProjectId>,
    pub start_ts: DateTime<Utc>,
    pub end_ts: DateTime<Utc>,
    pub note: Option<String>,
}

fn check_times(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Result<(), ValidationError> {
    match end {
        Some(end) if end <= start => Err(ValidationError::EndNotAfterStart { start, end }),
        Some(_) | None => Ok(()),
    }
}

async fn check_project(
    store: &impl RecordStore,
    project_id: Option<ProjectId>,
) -> Result<(), TrackingError> {
    let Some(id) = project_id else {
        return Ok(());
    };
    match store.project(id).await? {
        Some(_) => Ok(()),
        None => Err(ValidationError::UnknownProject(id).into()),
    }
}

fn clean_note(note: Option<String>) -> Option<String> {
    note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

#[instrument(skip(store, clock))]
pub async fn add_manual_entry(
    store: &impl RecordStore,
    clock: &dyn Clock,
    manual: ManualEntry,
) -> Result<Entry, TrackingError> {
    check_times(manual.start_ts, Some(manual.end_ts))?;
    check_project(store, manual.project_id).await?;

    let entry = Entry::running(manual.start_ts, EntrySource::Manual)
        .with_project(manual.project_id)
        .with_note(clean_note(manual.note))
        .with_end(Some(manual.end_ts))
        .with_created_at(clock.time());
    let entry = store.insert_entry(entry).await?;
    info!("Added manual entry {}", entry.id);
    Ok(entry)
}

/// Applies `patch`. The store checks the entry it would produce while holding its
/// lock, so a project deleted in the meantime can't end up referenced.
#[instrument(skip(store))]
pub async fn edit_entry(
    store: &impl RecordStore,
    id: EntryId,
    patch: EntryPatch,
) -> Result<Entry, TrackingError> {
    if patch.is_empty() {
        return Err(ValidationError::EmptyChange.into());
    }
    let patch = EntryPatch {
        note: patch.note.map(clean_note),
        ..patch
    };

    let entry = store.update_entry(id, patch).await.map_err(|e| match e {
        StoreError::EndNotAfterStart { start, end } => {
            TrackingError::Validation(ValidationError::EndNotAfterStart { start, end })
        }
        StoreError::ProjectNotFound(project_id) => {
            TrackingError::Validation(ValidationError::UnknownProject(project_id))
        }
        e => TrackingError::Store(e),
    })?;
    info!("Edited entry {}", entry.id);
    Ok(entry)
}

#[instrument(skip(store))]
pub async fn delete_entry(store: &impl RecordStore, id: EntryId) -> Result<(), TrackingError> {
    store.delete_entry(id).await?;
    info!("Deleted entry {id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use crate::{
        storage::{
            entities::{Entry, EntryPatch, EntrySource, Project, ProjectId},
            record_store::{MemoryRecordStore, RecordStore, StoreError},
        },
        tracking::{TrackingError, ValidationError},
        utils::clock::testing::ManualClock,
    };

    use super::{add_manual_entry, delete_entry, edit_entry, ManualEntry};

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn clock() -> ManualClock {
        ManualClock::new(at(600))
    }

    #[tokio::test]
    async fn adds_manual_entry() -> Result<()> {
        let store = MemoryRecordStore::new();
        let project = store.insert_project(Project::new("Work", None, at(0))).await?;

        let entry = add_manual_entry(
            &store,
            &clock(),
            ManualEntry {
                project_id: Some(project.id),
                start_ts: at(0),
                end_ts: at(90),
                note: Some("  planning ".into()),
            },
        )
        .await?;

        assert_eq!(entry.source, EntrySource::Manual);
        assert_eq!(entry.note.as_deref(), Some("planning"));
        assert_eq!(entry.created_at, at(600));
        assert_eq!(store.entries().await?, vec![entry]);
        Ok(())
    }

    #[tokio::test]
    async fn rejects_end_not_after_start() -> Result<()> {
        let store = MemoryRecordStore::new();

        let result = add_manual_entry(
            &store,
            &clock(),
            ManualEntry {
                project_id: None,
                start_ts: at(30),
                end_ts: at(30),
                note: None,
            },
        )
        .await;

        assert!(matches!(
            result,
            Err(TrackingError::Validation(ValidationError::EndNotAfterStart { .. }))
        ));
        assert!(store.entries().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn rejects_unknown_project() -> Result<()> {
        let store = MemoryRecordStore::new();
        let ghost = ProjectId::new();

        let result = add_manual_entry(
            &store,
            &clock(),
            ManualEntry {
                project_id: Some(ghost),
                start_ts: at(0),
                end_ts: at(10),
                note: None,
            },
        )
        .await;

        assert!(matches!(
            result,
            Err(TrackingError::Validation(ValidationError::UnknownProject(id))) if id == ghost
        ));
        Ok(())
    }

    #[tokio::test]
    async fn edit_validates_merged_entry() -> Result<()> {
        let store = MemoryRecordStore::new();
        let entry = store
            .insert_entry(Entry::running(at(0), EntrySource::Manual).with_end(Some(at(60))))
            .await?;

        let result = edit_entry(
            &store,
            entry.id,
            EntryPatch {
                start_ts: Some(at(61)),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(
            result,
            Err(TrackingError::Validation(ValidationError::EndNotAfterStart { .. }))
        ));
        assert_eq!(store.entry(entry.id).await?, Some(entry.clone()));

        let edited = edit_entry(
            &store,
            entry.id,
            EntryPatch {
                start_ts: Some(at(15)),
                note: Some(Some("trimmed".into())),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(edited.start_ts, at(15));
        assert_eq!(edited.whole_minutes(), Some(45));
        assert_eq!(edited.note.as_deref(), Some("trimmed"));
        Ok(())
    }

    #[tokio::test]
    async fn edit_to_deleted_project_is_rejected() -> Result<()> {
        let store = MemoryRecordStore::new();
        let project = store.insert_project(Project::new("Work", None, at(0))).await?;
        let entry = store
            .insert_entry(Entry::running(at(0), EntrySource::Manual).with_end(Some(at(60))))
            .await?;
        store.delete_project_if_unreferenced(project.id).await?;

        let result = edit_entry(
            &store,
            entry.id,
            EntryPatch {
                project_id: Some(Some(project.id)),
                ..Default::default()
            },
        )
        .await;

        assert!(matches!(
            result,
            Err(TrackingError::Validation(ValidationError::UnknownProject(id))) if id == project.id
        ));
        assert_eq!(store.entry(entry.id).await?, Some(entry));
        Ok(())
    }

    #[tokio::test]
    async fn edit_of_missing_entry_is_not_found() {
        let store = MemoryRecordStore::new();
        let ghost = Entry::running(at(0), EntrySource::Manual);

        let result = edit_entry(&store, ghost.id, EntryPatch::end_at(at(5))).await;

        assert!(matches!(
            result,
            Err(TrackingError::Store(StoreError::EntryNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn empty_edit_is_rejected() {
        let store = MemoryRecordStore::new();
        let ghost = Entry::running(at(0), EntrySource::Manual);

        let result = edit_entry(&store, ghost.id, EntryPatch::default()).await;

        assert!(matches!(
            result,
            Err(TrackingError::Validation(ValidationError::EmptyChange))
        ));
    }

    #[tokio::test]
    async fn deletes_entry() -> Result<()> {
        let store = MemoryRecordStore::new();
        let entry = store
            .insert_entry(Entry::running(at(0), EntrySource::Manual).with_end(Some(at(5))))
            .await?;

        delete_entry(&store, entry.id).await?;

        assert!(store.entries().await?.is_empty());
        assert!(delete_entry(&store, entry.id).await.is_err());
        Ok(())
    }
}
