use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};

use crate::{
    storage::entities::{EntryId, EntryPatch, ProjectId},
    tracking::entries::{add_manual_entry, delete_entry, edit_entry, ManualEntry},
    utils::{clock::DefaultClock, time::format_minutes},
};

use super::{dates::parse_moment, resolve_project, Application};

#[derive(Debug, clap::Args)]
pub struct AddCommand {
    #[arg(
        long = "start",
        short,
        help = "Start of the entry. Examples are \"9:00\", \"yesterday 9:00\", \"12:00 16/03/2025\""
    )]
    start_date: String,
    #[arg(
        long = "end",
        short,
        help = "End of the entry. Examples are \"10:30\", \"1 hour ago\", \"13:15 16/03/2025\""
    )]
    end_date: String,
    #[arg(short, long, help = "Project name or id")]
    project: Option<String>,
    #[arg(short, long, help = "Note attached to the entry")]
    note: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct EditCommand {
    #[arg(help = "Id of the entry, as shown by `report`")]
    entry: EntryId,
    #[arg(short, long, help = "New project name or id")]
    project: Option<String>,
    #[arg(
        long,
        conflicts_with = "project",
        help = "Detach the entry from its project"
    )]
    no_project: bool,
    #[arg(long = "start", short, help = "New start of the entry")]
    start_date: Option<String>,
    #[arg(long = "end", short, help = "New end of the entry")]
    end_date: Option<String>,
    #[arg(short, long, help = "New note")]
    note: Option<String>,
    #[arg(long, conflicts_with = "note", help = "Remove the note")]
    clear_note: bool,
}

async fn project_reference(
    app: &Application,
    reference: Option<&str>,
) -> Result<Option<ProjectId>> {
    match reference {
        Some(reference) => Ok(Some(resolve_project(&app.store, reference).await?.id)),
        None => Ok(None),
    }
}

fn moment(app: &Application, value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    value
        .map(|v| parse_moment(v, app.date_style, Local::now()))
        .transpose()
}

pub async fn process_add_command(app: &Application, command: AddCommand) -> Result<()> {
    let start_ts = parse_moment(&command.start_date, app.date_style, Local::now())?;
    let end_ts = parse_moment(&command.end_date, app.date_style, Local::now())?;
    let project_id = project_reference(app, command.project.as_deref()).await?;

    let entry = add_manual_entry(
        &app.store,
        &DefaultClock,
        ManualEntry {
            project_id,
            start_ts,
            end_ts,
            note: command.note,
        },
    )
    .await
    .context("Couldn't add the entry")?;

    println!(
        "Added {} ({})",
        entry.id,
        format_minutes(entry.whole_minutes().unwrap_or(0))
    );
    Ok(())
}

pub async fn process_edit_command(app: &Application, command: EditCommand) -> Result<()> {
    let project_id = if command.no_project {
        Some(None)
    } else {
        project_reference(app, command.project.as_deref())
            .await?
            .map(Some)
    };
    let note = if command.clear_note {
        Some(None)
    } else {
        command.note.map(Some)
    };

    let patch = EntryPatch {
        project_id,
        start_ts: moment(app, command.start_date.as_deref())?,
        end_ts: moment(app, command.end_date.as_deref())?.map(Some),
        note,
    };
    let entry = edit_entry(&app.store, command.entry, patch)
        .await
        .context("Couldn't edit the entry")?;

    println!("Updated {}", entry.id);
    Ok(())
}

pub async fn process_delete_command(app: &Application, id: EntryId) -> Result<()> {
    delete_entry(&app.store, id)
        .await
        .context("Couldn't delete the entry")?;
    println!("Deleted {id}");
    Ok(())
}
