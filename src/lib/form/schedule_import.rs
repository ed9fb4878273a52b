use std::{fs::File, io::Read, path::Path};

use chrono::Weekday;
use log::{debug, info};

use super::{
    error::FormError,
    models::ScheduleEntry,
    schedule_mapper::{parse_weekday, weekday_name},
};

/// Parses a schedule export such as
///
/// ```text
/// ;mo;di;mi;do;fr
/// 1std;Mathe;Deutsch;;Englisch;Sport
/// ```
///
/// into entries with normalized hour labels (`1. Stunde`) and German weekday names.
/// Empty cells and columns with an unknown weekday are skipped.
pub fn parse_schedule_csv<R: Read>(reader: R) -> Result<Vec<ScheduleEntry>, FormError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let weekdays: Vec<Option<Weekday>> = csv_reader
        .headers()?
        .iter()
        .skip(1)
        .map(|label| {
            let weekday = parse_weekday(label);
            if weekday.is_none() {
                debug!("Column {label:?} is not a weekday, skipping it");
            }
            weekday
        })
        .collect();
    if weekdays.iter().all(Option::is_none) {
        return Err(FormError::ScheduleImport(
            "header row names no weekday".to_owned(),
        ));
    }

    let mut entries = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let Some(hour) = record.get(0).and_then(normalize_hour) else {
            debug!("Row {:?} has no hour number, skipping", record.get(0));
            continue;
        };
        for (cell, weekday) in record.iter().skip(1).zip(weekdays.iter()) {
            let Some(weekday) = weekday else {
                continue;
            };
            if cell.is_empty() {
                continue;
            }
            entries.push(ScheduleEntry {
                hour: hour.clone(),
                subject: cell.to_owned(),
                weekday: Some(weekday_name(*weekday).to_owned()),
            });
        }
    }
    Ok(entries)
}

pub fn read_schedule_csv(path: &Path) -> Result<Vec<ScheduleEntry>, FormError> {
    info!(
        "Reading schedule from {}",
        std::path::absolute(path)?.display()
    );
    let entries = parse_schedule_csv(File::open(path)?)?;
    info!("Imported {} schedule entries", entries.len());
    Ok(entries)
}

/// `1std`, `1` and `1. Stunde` all become `1. Stunde`.
pub fn normalize_hour(cell: &str) -> Option<String> {
    let digits: String = cell
        .trim()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    if digits.is_empty() {
        None
    } else {
        Some(format!("{digits}. Stunde"))
    }
}

#[cfg(test)]
#[path = "tests/schedule_import.rs"]
mod tests;
