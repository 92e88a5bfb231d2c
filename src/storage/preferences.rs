use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::fs::operations::{read_optional, write_atomic};

use super::entities::ProjectId;

const PREFERENCES_FILE: &str = "preferences.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct Preferences {
    #[serde(default)]
    last_project_id: Option<ProjectId>,
}

/// Remembers the last used project. Every failure is logged and treated as "no
/// preference", nothing here is allowed to fail a user action.
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            path: dir.join(PREFERENCES_FILE),
        }
    }

    pub async fn last_project(&self) -> Option<ProjectId> {
        let contents = match read_optional(&self.path).await {
            Ok(Some(v)) => v,
            Ok(None) => return None,
            Err(e) => {
                warn!("Couldn't read preferences {:?}: {e}", self.path);
                return None;
            }
        };
        match serde_json::from_str::<Preferences>(&contents) {
            Ok(v) => v.last_project_id,
            Err(e) => {
                warn!("Ignoring malformed preferences {:?}: {e}", self.path);
                None
            }
        }
    }

    pub async fn remember_project(&self, project_id: Option<ProjectId>) {
        let preferences = Preferences {
            last_project_id: project_id,
        };
        let result = match serde_json::to_vec(&preferences) {
            Ok(v) => write_atomic(&self.path, &v).await.map_err(anyhow::Error::from),
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(()) => debug!("Remembered project {project_id:?}"),
            Err(e) => warn!("Couldn't save preferences {:?}: {e}", self.path),
        }
    }
}
