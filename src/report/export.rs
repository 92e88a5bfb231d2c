use std::collections::HashMap;

use chrono::TimeZone;
use serde::Serialize;

use crate::{
    storage::entities::{Entry, EntrySource, Project},
    utils::time::format_date,
};

use super::project_label;

/// One exported line. Formatting into a file format is left to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub date: String,
    pub project: String,
    pub start: String,
    pub end: String,
    pub duration_minutes: i64,
    pub duration_hours: f64,
    pub note: String,
    pub source: EntrySource,
}

/// Rows for every completed entry, oldest first. Times are rendered in `tz`.
pub fn export_rows<Tz: TimeZone>(
    entries: &[Entry],
    projects: &[Project],
    tz: &Tz,
) -> Vec<ExportRow>
where
    Tz::Offset: std::fmt::Display,
{
    let names = projects
        .iter()
        .map(|p| (p.id, p.name.as_str()))
        .collect::<HashMap<_, _>>();

    let mut completed = entries.iter().filter(|e| !e.is_running()).collect::<Vec<_>>();
    completed.sort_by_key(|e| e.start_ts);

    completed
        .into_iter()
        .filter_map(|entry| {
            let end = entry.end_ts?.with_timezone(tz);
            let start = entry.start_ts.with_timezone(tz);
            let minutes = entry.whole_minutes()?;
            Some(ExportRow {
                date: format_date(start.date_naive()),
                project: project_label(&names, entry.project_id).to_string(),
                start: start.format("%H:%M").to_string(),
                end: end.format("%H:%M").to_string(),
                duration_minutes: minutes,
                duration_hours: (minutes as f64 / 60. * 100.).round() / 100.,
                note: entry.note.clone().unwrap_or_default(),
                source: entry.source,
            })
        })
        .collect()
}
