//! User level edits of entries and projects. A rejected edit never writes anything.

pub mod entries;
pub mod projects;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::storage::{entities::ProjectId, record_store::StoreError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("project name can't be empty")]
    EmptyName,
    #[error("color {0:?} is not a #rrggbb value")]
    InvalidColor(String),
    #[error("end time {end} must be after start time {start}")]
    EndNotAfterStart {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("project {0} doesn't exist")]
    UnknownProject(ProjectId),
    #[error("nothing to change")]
    EmptyChange,
}

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
