use std::fmt::Display;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, Utc};
use chrono_english::parse_date_string;
use clap::{CommandFactory, ValueEnum};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

/// Parses a moment like "yesterday 9:00", "1 hour ago" or "12:00 16/03/2025", relative
/// to `now`.
pub fn parse_moment(value: &str, style: DateStyle, now: DateTime<Local>) -> Result<DateTime<Utc>> {
    match parse_date_string(value, now, style.into()) {
        Ok(v) => Ok(v.with_timezone(&Utc)),
        Err(e) => Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Failed to validate date {value:?}: {e}"),
            )
            .into()),
    }
}

/// Parses a value into the local calendar day it falls on.
pub fn parse_day(value: &str, style: DateStyle, now: DateTime<Local>) -> Result<NaiveDate> {
    Ok(parse_moment(value, style, now)?
        .with_timezone(&Local)
        .date_naive())
}
