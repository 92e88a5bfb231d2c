use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;

use crate::{report::export::export_rows, storage::record_store::RecordStore};

use super::Application;

pub async fn process_export_command(app: &Application, out: Option<PathBuf>) -> Result<()> {
    let (entries, projects) = tokio::try_join!(app.store.entries(), app.store.projects())?;

    let rows = export_rows(&entries, &projects, &Local);
    let json = serde_json::to_string_pretty(&rows)?;

    match out {
        Some(path) => {
            tokio::fs::write(&path, json)
                .await
                .with_context(|| format!("Couldn't write {path:?}"))?;
            println!("Exported {} entries to {}", rows.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
