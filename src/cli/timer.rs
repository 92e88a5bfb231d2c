use std::io::Write;

use anyhow::Result;
use chrono::Local;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    storage::{
        entities::{Entry, ProjectId},
        preferences::PreferenceStore,
        record_store::{RecordStore, StoreError},
    },
    timer::{format_elapsed, ticker::TICK_PERIOD},
};

use super::{paint_project, resolve_project, shutdown::detect_shutdown, Application};

#[derive(Debug, clap::Args)]
pub struct StartCommand {
    #[arg(
        short,
        long,
        help = "Project name or id. Defaults to the last used project"
    )]
    project: Option<String>,
    #[arg(long, conflicts_with = "project", help = "Start without a project")]
    no_project: bool,
    #[arg(short, long, help = "Note attached to the entry")]
    note: Option<String>,
}

/// Picks the project for a new timer: explicit flags first, then the remembered one.
async fn choose_project(
    app: &Application,
    command: &StartCommand,
) -> Result<Option<ProjectId>> {
    if command.no_project {
        return Ok(None);
    }
    if let Some(reference) = &command.project {
        return Ok(Some(resolve_project(&app.store, reference).await?.id));
    }
    Ok(remembered_project(&app.store, &app.preferences).await?)
}

/// The last used project, as long as it still exists.
async fn remembered_project(
    store: &impl RecordStore,
    preferences: &PreferenceStore,
) -> Result<Option<ProjectId>, StoreError> {
    let Some(remembered) = preferences.last_project().await else {
        return Ok(None);
    };
    match store.project(remembered).await? {
        Some(project) => Ok(Some(project.id)),
        None => {
            debug!("Remembered project {remembered} is gone");
            Ok(None)
        }
    }
}

async fn describe(app: &Application, entry: &Entry) -> Result<String> {
    let project = match entry.project_id {
        Some(id) => app.store.project(id).await?,
        None => None,
    };
    let mut description = match project {
        Some(p) => paint_project(&p.name, p.color.as_deref()),
        None => "no project".to_string(),
    };
    if let Some(note) = &entry.note {
        description.push_str(&format!(" ({note})"));
    }
    Ok(description)
}

pub async fn process_start_command(app: &Application, command: StartCommand) -> Result<()> {
    app.timer.initialize().await;
    let project_id = choose_project(app, &command).await?;
    let previous = app.timer.snapshot().await;

    let note = command.note.filter(|n| !n.trim().is_empty());
    let entry = app.timer.start(project_id, note).await?;
    app.preferences.remember_project(project_id).await;

    if let Some(stopped) = &previous.current_entry {
        println!(
            "Stopped {} after {}",
            describe(app, stopped).await?,
            previous.formatted_elapsed_time()
        );
    }
    println!(
        "Started {} at {}",
        describe(app, &entry).await?,
        entry.start_ts.with_timezone(&Local).format("%H:%M")
    );
    Ok(())
}

pub async fn process_stop_command(app: &Application) -> Result<()> {
    app.timer.initialize().await;
    let Some(entry) = app.timer.stop().await? else {
        println!("No timer is running");
        return Ok(());
    };
    let elapsed = entry
        .duration()
        .map(|d| d.num_milliseconds() as f64 / 60_000.)
        .unwrap_or(0.);
    println!(
        "Stopped {} after {}",
        describe(app, &entry).await?,
        format_elapsed(elapsed)
    );
    Ok(())
}

pub async fn process_status_command(app: &Application, watch: bool) -> Result<()> {
    app.timer.initialize().await;
    let snapshot = app.timer.snapshot().await;
    let Some(entry) = &snapshot.current_entry else {
        println!("No timer is running");
        return Ok(());
    };
    println!(
        "Running {} since {}",
        describe(app, entry).await?,
        entry.start_ts.with_timezone(&Local).format("%x %H:%M")
    );

    if !watch {
        println!("{}", snapshot.formatted_elapsed_time());
        return Ok(());
    }

    let Some(mut ticker) = app.timer.spawn_ticker(TICK_PERIOD).await else {
        return Ok(());
    };
    let shutdown = CancellationToken::new();
    let mut elapsed = ticker.subscribe();

    tokio::join!(detect_shutdown(shutdown.clone()), async {
        tokio::select! {
            _ = shutdown.cancelled() => (),
            _ = print_elapsed(&mut elapsed) => shutdown.cancel(),
        }
    });

    ticker.cancel();
    ticker.finished().await;
    println!();
    Ok(())
}

async fn print_elapsed(elapsed: &mut watch::Receiver<Option<f64>>) {
    while elapsed.changed().await.is_ok() {
        let value = *elapsed.borrow_and_update();
        let Some(minutes) = value else {
            return;
        };
        print!("\r{}", format_elapsed(minutes));
        if let Err(e) = std::io::stdout().flush() {
            debug!("Couldn't flush stdout {e:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::Utc;
    use tempfile::tempdir;

    use crate::storage::{
        entities::Project,
        preferences::PreferenceStore,
        record_store::{MemoryRecordStore, RecordStore},
    };

    use super::remembered_project;

    #[tokio::test]
    async fn uses_remembered_project() -> Result<()> {
        let dir = tempdir()?;
        let preferences = PreferenceStore::new(dir.path().to_owned());
        let store = MemoryRecordStore::new();
        let project = store.insert_project(Project::new("Writing", None, Utc::now())).await?;
        preferences.remember_project(Some(project.id)).await;

        assert_eq!(
            remembered_project(&store, &preferences).await?,
            Some(project.id)
        );
        Ok(())
    }

    #[tokio::test]
    async fn deleted_remembered_project_falls_back_to_none() -> Result<()> {
        let dir = tempdir()?;
        let preferences = PreferenceStore::new(dir.path().to_owned());
        let store = MemoryRecordStore::new();
        let project = store.insert_project(Project::new("Writing", None, Utc::now())).await?;
        preferences.remember_project(Some(project.id)).await;
        store.delete_project_if_unreferenced(project.id).await?;

        assert_eq!(remembered_project(&store, &preferences).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn nothing_remembered_means_no_project() -> Result<()> {
        let dir = tempdir()?;
        let preferences = PreferenceStore::new(dir.path().to_owned());

        assert_eq!(
            remembered_project(&MemoryRecordStore::new(), &preferences).await?,
            None
        );
        Ok(())
    }
}
