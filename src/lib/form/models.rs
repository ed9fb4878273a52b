use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use clap::Parser;
use serde::{Deserialize, Deserializer, Serialize};

use super::error::FormError;
use crate::pdf::models::{ConverterConfig, HostProfile};

pub mod document_model;

/// A model for describing one excuse form submission.
/// Consists of:
/// 1. Student's first and last name, written into the name line of the form
/// 2. Reason of the absence
/// 3. Optional teacher's last name and location; configuration defaults are used when absent
/// 4. Absence periods, expanded into one table row per school day
/// 5. Weekly class schedule used to fill the lesson columns
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormRequest {
    pub first_name: String,
    pub last_name: String,
    pub reason: String,
    #[serde(default)]
    pub teacher_last_name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub absence_periods: Vec<AbsencePeriod>,
    #[serde(default)]
    pub schedule: Vec<ScheduleEntry>,
}

/// Inclusive date range of an absence. `start <= end` holds for every value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawAbsencePeriod")]
pub struct AbsencePeriod {
    start: NaiveDate,
    end: NaiveDate,
    start_time: String,
    end_time: String,
}

impl AbsencePeriod {
    pub fn new(
        start: NaiveDate,
        end: NaiveDate,
        start_time: impl Into<String>,
        end_time: impl Into<String>,
    ) -> Result<Self, FormError> {
        if start > end {
            return Err(FormError::InvalidPeriod { start, end });
        }
        Ok(Self {
            start,
            end,
            start_time: start_time.into(),
            end_time: end_time.into(),
        })
    }

    /// A whole school day, 08:00 to 15:00.
    pub fn full_days(start: NaiveDate, end: NaiveDate) -> Result<Self, FormError> {
        Self::new(start, end, default_start_time(), default_end_time())
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn start_time(&self) -> &str {
        &self.start_time
    }

    pub fn end_time(&self) -> &str {
        &self.end_time
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAbsencePeriod {
    #[serde(deserialize_with = "deserialize_iso_date")]
    start: NaiveDate,
    #[serde(deserialize_with = "deserialize_iso_date")]
    end: NaiveDate,
    #[serde(default = "default_start_time")]
    start_time: String,
    #[serde(default = "default_end_time")]
    end_time: String,
}

impl TryFrom<RawAbsencePeriod> for AbsencePeriod {
    type Error = FormError;

    fn try_from(raw: RawAbsencePeriod) -> Result<Self, Self::Error> {
        AbsencePeriod::new(raw.start, raw.end, raw.start_time, raw.end_time)
    }
}

fn default_start_time() -> String {
    "08:00".to_owned()
}

fn default_end_time() -> String {
    "15:00".to_owned()
}

/// Parses an ISO-8601 date or date-time (`2025-01-30`, `2025-01-30T00:00:00Z`,
/// `2025-01-30T08:00:00`) into the calendar date it names.
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.date_naive())
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.date())
        })
}

fn deserialize_iso_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    parse_iso_date(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("not an ISO-8601 date: {value}")))
}

/// One lesson of the weekly schedule, e.g. `{"hour": "1. Stunde", "subject": "Mathe", "weekday": "Montag"}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScheduleEntry {
    pub hour: String,
    pub subject: String,
    #[serde(default)]
    pub weekday: Option<String>,
}

impl ScheduleEntry {
    pub fn new(hour: &str, subject: &str, weekday: Option<&str>) -> Self {
        Self {
            hour: hour.to_owned(),
            subject: subject.to_owned(),
            weekday: weekday.map(str::to_owned),
        }
    }
}

/// How expanded day rows are distributed over absence tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableLayout {
    /// Every row goes into the one table of the template.
    #[default]
    Single,
    /// The table is duplicated once per group of rows.
    PerWeek(WeekGrouping),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekGrouping {
    /// Chunks of five rows, regardless of the actual calendar week.
    #[default]
    CountOfFive,
    /// A new group starts whenever the ISO week changes.
    CalendarWeek,
}

/// A model for describing ARGS of `generate_form`.
/// Consists of:
/// 1. Path to request.json, the submission to fill the form with.
/// 2. Path to config.json, that contains template, output and conversion parameters.
/// 3. Optional path to a semicolon separated schedule export, replacing the request's schedule.
/// 4. Optional host profile overriding the configured one.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[arg(long, value_name = "FILE", default_value = "request.json")]
    pub request_json_path: PathBuf,
    #[arg(long, value_name = "FILE", default_value = "config.json")]
    pub config_json_path: PathBuf,
    #[arg(long, value_name = "FILE")]
    pub schedule_csv_path: Option<PathBuf>,
    #[arg(long, value_enum)]
    pub profile: Option<HostProfile>,
    /// Only write the DOCX, do not try to convert it
    #[arg(long)]
    pub skip_pdf: bool,
}

/// A model for describing configuration of the tool.
/// Every key is optional, see [`Config::default`].
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub template_paths: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub location: String,
    pub teacher_last_name: Option<String>,
    pub table_layout: TableLayout,
    pub conversion: ConverterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            template_paths: vec![
                PathBuf::from("/app/templates/2025-Entschuldigungsformular.docx"),
                PathBuf::from("templates/2025-Entschuldigungsformular.docx"),
                PathBuf::from("templates/entschuldigung_template.docx"),
            ],
            output_dir: PathBuf::from("output"),
            location: "Bergisch Gladbach".to_owned(),
            teacher_last_name: None,
            table_layout: TableLayout::default(),
            conversion: ConverterConfig::default(),
        }
    }
}
