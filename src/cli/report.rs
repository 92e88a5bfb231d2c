use std::collections::HashMap;

use anyhow::Result;
use chrono::{Local, NaiveDate, TimeZone};

use crate::{
    report::{build_weekly_report, DaySummary, ProjectFilter, WeekWindow, WeeklyReport},
    storage::{
        entities::{Entry, Project, ProjectId},
        record_store::{RecordStore, StoreError},
    },
    utils::time::{format_date, format_minutes},
};

use super::{dates::parse_day, paint_project, resolve_project, Application};

#[derive(Debug, clap::Args)]
pub struct ReportCommand {
    #[arg(
        short,
        long,
        help = "Any day of the week to report. Examples are \"today\", \"last week\", \"15/03/2025\""
    )]
    week: Option<String>,
    #[arg(
        short,
        long,
        default_value = "all",
        help = "\"all\", \"no-project\", or a project name or id"
    )]
    project: String,
    #[arg(short, long, help = "Hide individual entries")]
    summary: bool,
}

async fn parse_filter(app: &Application, value: &str) -> Result<ProjectFilter> {
    match value.parse::<ProjectFilter>() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(ProjectFilter::Project(
            resolve_project(&app.store, value).await?.id,
        )),
    }
}

/// Command to process `report` command. Shows the Sunday to Saturday week containing the
/// selected day.
pub async fn process_report_command(
    app: &Application,
    ReportCommand {
        week,
        project,
        summary,
    }: ReportCommand,
) -> Result<()> {
    let now = Local::now();
    let selected_week = match week {
        Some(value) => parse_day(&value, app.date_style, now)?,
        None => now.date_naive(),
    };
    let filter = parse_filter(app, &project).await?;

    let (entries, projects) = tokio::try_join!(
        week_entries(&app.store, selected_week, &Local),
        app.store.projects()
    )?;

    let Some(report) =
        build_weekly_report(Some(entries.as_slice()), &projects, selected_week, filter, &Local)
    else {
        return Ok(());
    };
    print_report(&report, &projects, !summary);
    Ok(())
}

/// Loads only the entries that start inside the week of `selected_week`.
async fn week_entries<Tz: TimeZone>(
    store: &impl RecordStore,
    selected_week: NaiveDate,
    tz: &Tz,
) -> Result<Vec<Entry>, StoreError> {
    let (from, to) = WeekWindow::containing(selected_week).bounds(tz);
    store.entries_between(from, to).await
}

fn print_report(report: &WeeklyReport, projects: &[Project], show_entries: bool) {
    let by_id = projects
        .iter()
        .map(|p| (p.id, p))
        .collect::<HashMap<ProjectId, &Project>>();
    let colors = projects
        .iter()
        .map(|p| (p.name.as_str(), p.color.as_deref()))
        .collect::<HashMap<_, _>>();

    println!(
        "Week {} .. {} ({})",
        format_date(report.window.start),
        format_date(report.window.end),
        describe_filter(report.filter, &by_id)
    );
    println!("{}", "-".repeat(48));

    for day in &report.days {
        print_day(day, &by_id, &colors, show_entries);
    }

    println!("{}", "-".repeat(48));
    println!(
        "Total {}\tDaily average {}",
        format_minutes(report.total_minutes),
        format_minutes(report.daily_average())
    );
}

fn print_day(
    day: &DaySummary,
    by_id: &HashMap<ProjectId, &Project>,
    colors: &HashMap<&str, Option<&str>>,
    show_entries: bool,
) {
    let breakdown = day
        .project_breakdown
        .iter()
        .map(|t| {
            format!(
                "{} {} ({})",
                paint_project(&t.name, colors.get(t.name.as_str()).copied().flatten()),
                format_minutes(t.minutes),
                t.count
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    println!(
        "{} {}\t{}\t{}",
        day.date.format("%a"),
        format_date(day.date),
        format_minutes(day.total_minutes),
        breakdown
    );

    if !show_entries {
        return;
    }
    for entry in &day.entries {
        let (Some(end), Some(minutes)) = (entry.end_ts, entry.whole_minutes()) else {
            continue;
        };
        let project = entry
            .project_id
            .and_then(|id| by_id.get(&id))
            .map(|p| paint_project(&p.name, p.color.as_deref()))
            .unwrap_or_default();
        println!(
            "    {}  {}-{}  {}\t{}\t{}",
            entry.id,
            entry.start_ts.with_timezone(&Local).format("%H:%M"),
            end.with_timezone(&Local).format("%H:%M"),
            format_minutes(minutes),
            project,
            entry.note.as_deref().unwrap_or_default()
        );
    }
}

fn describe_filter(filter: ProjectFilter, by_id: &HashMap<ProjectId, &Project>) -> String {
    match filter {
        ProjectFilter::All => "all projects".to_string(),
        ProjectFilter::NoProject => "entries without project".to_string(),
        ProjectFilter::Project(id) => by_id
            .get(&id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| id.to_string()),
    }
}
