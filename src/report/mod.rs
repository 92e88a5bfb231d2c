//! Weekly reports. A report is always recomputed from the full entry list, nothing is
//! updated incrementally.

pub mod export;

use std::{collections::HashMap, fmt::Display, str::FromStr};

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use tracing::{debug, instrument};

use crate::{
    storage::entities::{Entry, Project, ProjectId},
    utils::time::day_start,
};

pub const NO_PROJECT_LABEL: &str = "No Project";

pub const DAYS_IN_WEEK: i64 = 7;

/// Sunday to Saturday span containing some date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl WeekWindow {
    pub fn containing(date: NaiveDate) -> Self {
        let start = date - Duration::days(date.weekday().num_days_from_sunday() as i64);
        Self {
            start,
            end: start + Duration::days(DAYS_IN_WEEK - 1),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Instants the window covers in `tz`, from the start of Sunday up to, but not
    /// including, the start of the following Sunday.
    pub fn bounds<Tz: TimeZone>(&self, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            day_start(self.start, tz),
            day_start(self.end + Duration::days(1), tz),
        )
    }

    /// Days of the window, Sunday first.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        self.start.iter_days().take(DAYS_IN_WEEK as usize)
    }
}

/// Which entries a report includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectFilter {
    #[default]
    All,
    NoProject,
    Project(ProjectId),
}

impl ProjectFilter {
    pub fn matches(&self, entry: &Entry) -> bool {
        match self {
            ProjectFilter::All => true,
            ProjectFilter::NoProject => entry.project_id.is_none(),
            ProjectFilter::Project(id) => entry.project_id == Some(*id),
        }
    }
}

impl Display for ProjectFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectFilter::All => write!(f, "all"),
            ProjectFilter::NoProject => write!(f, "no-project"),
            ProjectFilter::Project(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for ProjectFilter {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(ProjectFilter::All),
            "no-project" => Ok(ProjectFilter::NoProject),
            other => Ok(ProjectFilter::Project(other.parse()?)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectTally {
    pub name: String,
    pub minutes: i64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySummary {
    pub date: NaiveDate,
    /// Most recent first.
    pub entries: Vec<Entry>,
    pub total_minutes: i64,
    /// In the order projects were first encountered that day.
    pub project_breakdown: Vec<ProjectTally>,
}

impl DaySummary {
    pub fn tally(&self, name: &str) -> Option<&ProjectTally> {
        self.project_breakdown.iter().find(|t| t.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyReport {
    pub window: WeekWindow,
    pub filter: ProjectFilter,
    /// Most recent day first.
    pub days: Vec<DaySummary>,
    pub total_minutes: i64,
}

impl WeeklyReport {
    /// Week total divided by seven, however many days have entries.
    pub fn daily_average(&self) -> i64 {
        daily_average(self.total_minutes)
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DaySummary> {
        self.days.iter().find(|d| d.date == date)
    }
}

pub fn daily_average(total_minutes: i64) -> i64 {
    (total_minutes as f64 / DAYS_IN_WEEK as f64).round() as i64
}

/// Resolves the label an entry is grouped under.
pub fn project_label<'a>(
    names: &'a HashMap<ProjectId, &'a str>,
    project_id: Option<ProjectId>,
) -> &'a str {
    project_id
        .and_then(|id| names.get(&id).copied())
        .unwrap_or(NO_PROJECT_LABEL)
}

/// Builds the report for the week containing `selected_week`. Calendar days are taken
/// in `tz`. `entries` is `None` while entries are still loading, which yields no
/// report.
#[instrument(skip(entries, projects, tz))]
pub fn build_weekly_report<Tz: TimeZone>(
    entries: Option<&[Entry]>,
    projects: &[Project],
    selected_week: NaiveDate,
    filter: ProjectFilter,
    tz: &Tz,
) -> Option<WeeklyReport> {
    let entries = entries?;
    let window = WeekWindow::containing(selected_week);
    let names = projects
        .iter()
        .map(|p| (p.id, p.name.as_str()))
        .collect::<HashMap<_, _>>();

    let mut selected = entries
        .iter()
        .filter(|e| !e.is_running())
        .filter(|e| window.contains(local_date(e, tz)))
        .filter(|e| filter.matches(e))
        .collect::<Vec<_>>();
    // Ascending order decides which project is met first in a day.
    selected.sort_by_key(|e| e.start_ts);

    let mut days = window
        .days()
        .map(|date| summarize_day(date, &selected, &names, tz))
        .collect::<Vec<_>>();
    days.reverse();

    let total_minutes = days.iter().map(|d| d.total_minutes).sum();
    debug!(
        "Aggregated {} entries into {total_minutes} minutes",
        selected.len()
    );

    Some(WeeklyReport {
        window,
        filter,
        days,
        total_minutes,
    })
}

fn summarize_day<Tz: TimeZone>(
    date: NaiveDate,
    selected: &[&Entry],
    names: &HashMap<ProjectId, &str>,
    tz: &Tz,
) -> DaySummary {
    let mut entries = Vec::new();
    let mut total_minutes = 0;
    let mut project_breakdown: Vec<ProjectTally> = Vec::new();

    for entry in selected.iter().filter(|e| local_date(e, tz) == date) {
        // Each entry is truncated to whole minutes before it is summed.
        let minutes = entry.whole_minutes().unwrap_or(0);
        total_minutes += minutes;

        let name = project_label(names, entry.project_id);
        match project_breakdown.iter_mut().find(|t| t.name == name) {
            Some(tally) => {
                tally.minutes += minutes;
                tally.count += 1;
            }
            None => project_breakdown.push(ProjectTally {
                name: name.to_string(),
                minutes,
                count: 1,
            }),
        }
        entries.push((*entry).clone());
    }
    entries.sort_by(|a, b| b.start_ts.cmp(&a.start_ts));

    DaySummary {
        date,
        entries,
        total_minutes,
        project_breakdown,
    }
}

fn local_date<Tz: TimeZone>(entry: &Entry, tz: &Tz) -> NaiveDate {
    entry.start_ts.with_timezone(tz).date_naive()
}
