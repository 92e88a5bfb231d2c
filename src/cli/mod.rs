pub mod dates;
pub mod entries;
pub mod export;
pub mod projects;
pub mod report;
pub mod shutdown;
pub mod timer;

use std::{path::PathBuf, sync::Arc};

use ansi_term::Colour;
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use dates::DateStyle;
use entries::{
    process_add_command, process_delete_command, process_edit_command, AddCommand, EditCommand,
};
use export::process_export_command;
use projects::{process_project_command, ProjectCommand};
use report::{process_report_command, ReportCommand};
use timer::{process_start_command, process_status_command, process_stop_command, StartCommand};
use tracing::level_filters::LevelFilter;

use crate::{
    storage::{
        entities::{EntryId, Project},
        json_store::JsonRecordStore,
        preferences::PreferenceStore,
        record_store::RecordStore,
    },
    timer::TimerController,
    utils::{
        clock::DefaultClock,
        dir::resolve_application_path,
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "punchclock", version, long_about = None)]
#[command(about = "Local-first time tracking for the terminal", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, global = true, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        default_value_t = DateStyle::Uk,
        help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year"
    )]
    date_style: DateStyle,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Start the timer. A running timer is stopped first")]
    Start {
        #[command(flatten)]
        command: StartCommand,
    },
    #[command(about = "Stop the running timer")]
    Stop {},
    #[command(about = "Show the running timer")]
    Status {
        #[arg(short, long, help = "Keep refreshing the elapsed time every second")]
        watch: bool,
    },
    #[command(about = "Add an entry by hand")]
    Add {
        #[command(flatten)]
        command: AddCommand,
    },
    #[command(about = "Change an existing entry")]
    Edit {
        #[command(flatten)]
        command: EditCommand,
    },
    #[command(about = "Delete an entry")]
    Delete {
        #[arg(help = "Id of the entry, as shown by `report`")]
        entry: EntryId,
    },
    #[command(about = "Manage projects")]
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },
    #[command(about = "Show a weekly report")]
    Report {
        #[command(flatten)]
        command: ReportCommand,
    },
    #[command(about = "Export completed entries as JSON rows")]
    Export {
        #[arg(short, long, help = "Write into a file instead of stdout")]
        out: Option<PathBuf>,
    },
}

/// Everything a command needs to run.
pub struct Application {
    store: Arc<JsonRecordStore>,
    timer: Arc<TimerController<Arc<JsonRecordStore>>>,
    preferences: PreferenceStore,
    date_style: DateStyle,
}

impl Application {
    pub fn open(dir: PathBuf, date_style: DateStyle) -> Result<Self> {
        let store = Arc::new(JsonRecordStore::new(dir.clone())?);
        let timer = Arc::new(TimerController::new(store.clone(), Box::new(DefaultClock)));
        Ok(Self {
            store,
            timer,
            preferences: PreferenceStore::new(dir),
            date_style,
        })
    }
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let dir = resolve_application_path(args.dir)?;
    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &dir, logging_level, args.log)?;

    let app = Application::open(dir, args.date_style)?;

    match args.commands {
        Commands::Start { command } => process_start_command(&app, command).await,
        Commands::Stop {} => process_stop_command(&app).await,
        Commands::Status { watch } => process_status_command(&app, watch).await,
        Commands::Add { command } => process_add_command(&app, command).await,
        Commands::Edit { command } => process_edit_command(&app, command).await,
        Commands::Delete { entry } => process_delete_command(&app, entry).await,
        Commands::Project { command } => process_project_command(&app, command).await,
        Commands::Report { command } => process_report_command(&app, command).await,
        Commands::Export { out } => process_export_command(&app, out).await,
    }
}

/// Finds a project by id or by case-insensitive name.
pub async fn resolve_project(store: &impl RecordStore, reference: &str) -> Result<Project> {
    let reference = reference.trim();
    store
        .projects()
        .await?
        .into_iter()
        .find(|p| p.id.to_string() == reference || p.name.eq_ignore_ascii_case(reference))
        .ok_or_else(|| anyhow!("Project '{reference}' not found"))
}

/// Paints a project name in its own color when it has one.
pub fn paint_project(name: &str, color: Option<&str>) -> String {
    match color.and_then(parse_hex_color) {
        Some((r, g, b)) => Colour::RGB(r, g, b).paint(name).to_string(),
        None => name.to_string(),
    }
}

fn parse_hex_color(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(hex.get(range)?, 16).ok();
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{TimeZone, Utc};

    use crate::storage::{
        entities::Project,
        record_store::{MemoryRecordStore, RecordStore},
    };

    use super::{paint_project, parse_hex_color, resolve_project};

    #[tokio::test]
    async fn resolves_project_by_name_or_id() -> Result<()> {
        let store = MemoryRecordStore::new();
        let project = store
            .insert_project(Project::new(
                "Deep Work",
                None,
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            ))
            .await?;

        assert_eq!(resolve_project(&store, "deep work").await?, project);
        assert_eq!(resolve_project(&store, &project.id.to_string()).await?, project);
        assert!(resolve_project(&store, "shallow work").await.is_err());
        Ok(())
    }

    #[test]
    fn parses_hex_colors() {
        assert_eq!(parse_hex_color("#ff8000"), Some((255, 128, 0)));
        assert_eq!(parse_hex_color("ff8000"), None);
        assert_eq!(parse_hex_color("#ff80"), None);
        assert_eq!(paint_project("Plain", None), "Plain");
    }
}
