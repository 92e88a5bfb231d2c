use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! entity_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

entity_id!(ProjectId);
entity_id!(EntryId);

/// A named grouping label entries may reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: impl Into<String>, color: Option<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: ProjectId::new(),
            name: name.into(),
            color,
            created_at,
        }
    }
}

/// Where an entry came from. Only informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntrySource {
    Manual,
    Timer,
}

impl Display for EntrySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntrySource::Manual => write!(f, "manual"),
            EntrySource::Timer => write!(f, "timer"),
        }
    }
}

/// A span of tracked time. An entry without `end_ts` is the running timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    pub start_ts: DateTime<Utc>,
    #[serde(default)]
    pub end_ts: Option<DateTime<Utc>>,
    #[serde(default)]
    pub note: Option<String>,
    pub source: EntrySource,
    pub created_at: DateTime<Utc>,
}

impl Entry {
    /// Creates an entry that is still running.
    pub fn running(start_ts: DateTime<Utc>, source: EntrySource) -> Self {
        Self {
            id: EntryId::new(),
            project_id: None,
            start_ts,
            end_ts: None,
            note: None,
            source,
            created_at: start_ts,
        }
    }

    pub fn with_project(self, project_id: Option<ProjectId>) -> Self {
        Self { project_id, ..self }
    }

    pub fn with_note(self, note: Option<String>) -> Self {
        Self { note, ..self }
    }

    pub fn with_end(self, end_ts: Option<DateTime<Utc>>) -> Self {
        Self { end_ts, ..self }
    }

    pub fn with_created_at(self, created_at: DateTime<Utc>) -> Self {
        Self { created_at, ..self }
    }

    pub fn is_running(&self) -> bool {
        self.end_ts.is_none()
    }

    /// Duration of a completed entry.
    pub fn duration(&self) -> Option<Duration> {
        self.end_ts.map(|end| end - self.start_ts)
    }

    /// Whole minutes of a completed entry. Partial minutes are dropped.
    pub fn whole_minutes(&self) -> Option<i64> {
        self.duration().map(|d| d.num_seconds() / 60)
    }

    /// Applies every field present in `patch`.
    pub fn apply(&mut self, patch: &EntryPatch) {
        if let Some(project_id) = patch.project_id {
            self.project_id = project_id;
        }
        if let Some(start_ts) = patch.start_ts {
            self.start_ts = start_ts;
        }
        if let Some(end_ts) = patch.end_ts {
            self.end_ts = end_ts;
        }
        if let Some(note) = &patch.note {
            self.note = note.clone();
        }
    }
}

/// Partial update of an [Entry]. `None` leaves a field untouched, `Some(None)` clears
/// an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPatch {
    pub project_id: Option<Option<ProjectId>>,
    pub start_ts: Option<DateTime<Utc>>,
    pub end_ts: Option<Option<DateTime<Utc>>>,
    pub note: Option<Option<String>>,
}

impl EntryPatch {
    pub fn end_at(end_ts: DateTime<Utc>) -> Self {
        Self {
            end_ts: Some(Some(end_ts)),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Partial update of a [Project].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub color: Option<Option<String>>,
}

impl ProjectPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
