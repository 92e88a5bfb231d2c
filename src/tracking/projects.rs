use tracing::{info, instrument};

use crate::{
    storage::{
        entities::{Project, ProjectId, ProjectPatch},
        record_store::RecordStore,
    },
    utils::clock::Clock,
};

use super::{TrackingError, ValidationError};

fn clean_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        Err(ValidationError::EmptyName)
    } else {
        Ok(name.to_string())
    }
}

/// Accepts `#rrggbb`, case-insensitive, and normalizes it to lowercase.
pub fn clean_color(color: &str) -> Result<String, ValidationError> {
    let color = color.trim();
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if valid {
        Ok(color.to_ascii_lowercase())
    } else {
        Err(ValidationError::InvalidColor(color.to_string()))
    }
}

#[instrument(skip(store, clock))]
pub async fn create_project(
    store: &impl RecordStore,
    clock: &dyn Clock,
    name: &str,
    color: Option<&str>,
) -> Result<Project, TrackingError> {
    let name = clean_name(name)?;
    let color = color.map(clean_color).transpose()?;

    let project = store
        .insert_project(Project::new(name, color, clock.time()))
        .await?;
    info!("Created project {}", project.id);
    Ok(project)
}

/// Renames and/or recolors a project. `color` of `Some(None)` removes the color.
#[instrument(skip(store))]
pub async fn edit_project(
    store: &impl RecordStore,
    id: ProjectId,
    name: Option<&str>,
    color: Option<Option<&str>>,
) -> Result<Project, TrackingError> {
    let patch = ProjectPatch {
        name: name.map(clean_name).transpose()?,
        color: color.map(|c| c.map(clean_color).transpose()).transpose()?,
    };
    if patch.is_empty() {
        return Err(ValidationError::EmptyChange.into());
    }

    let project = store.update_project(id, patch).await?;
    info!("Edited project {}", project.id);
    Ok(project)
}

/// Deletes a project nothing refers to. Fails with
/// [StoreError::ProjectInUse](crate::storage::record_store::StoreError::ProjectInUse)
/// otherwise.
#[instrument(skip(store))]
pub async fn delete_project(store: &impl RecordStore, id: ProjectId) -> Result<(), TrackingError> {
    store.delete_project_if_unreferenced(id).await?;
    info!("Deleted project {id}");
    Ok(())
}
