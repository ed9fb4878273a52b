use std::{fs::File, io::BufReader, path::Path};

use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info};

use super::{
    error::FormError,
    models::{Config, FormRequest, ScheduleEntry},
    substitution::{Placeholder, TokenMap},
};

pub fn log_schedule(schedule: &[ScheduleEntry]) -> () {
    for entry in schedule.iter() {
        debug!(
            "Schedule: {} {} -> {}",
            entry.weekday.as_deref().unwrap_or("(any day)"),
            entry.hour,
            entry.subject
        );
    }
}

pub fn get_request(path: &Path) -> Result<FormRequest, FormError> {
    info!(
        "Reading request.json from {}",
        std::path::absolute(path)?.display()
    );
    let request_file = BufReader::new(File::open(path)?);
    let request: FormRequest = serde_json::from_reader(request_file)?;
    info!(
        "Request for {} {} with {} absence periods",
        request.first_name,
        request.last_name,
        request.absence_periods.len()
    );
    log_schedule(&request.schedule);
    Ok(request)
}

/// Values for every placeholder. The request's location and teacher win over the config's.
pub fn build_token_map(request: &FormRequest, config: &Config, today: NaiveDate) -> TokenMap {
    let mut tokens = TokenMap::new();
    tokens.insert(Placeholder::LastName, request.last_name.trim().to_owned());
    tokens.insert(Placeholder::FirstName, request.first_name.trim().to_owned());
    tokens.insert(Placeholder::Reason, request.reason.trim().to_owned());
    tokens.insert(
        Placeholder::Location,
        request
            .location
            .clone()
            .unwrap_or_else(|| config.location.clone()),
    );
    tokens.insert(
        Placeholder::CurrentDate,
        today.format("%d.%m.%Y").to_string(),
    );
    if let Some(teacher) = request
        .teacher_last_name
        .as_ref()
        .or(config.teacher_last_name.as_ref())
    {
        tokens.insert(Placeholder::TeacherLastName, teacher.clone());
    }
    tokens
}

fn sanitize(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

/// `entschuldigung_<first>_<last>_<YYYYmmdd_HHMMSS>.docx`
pub fn output_file_name(request: &FormRequest, now: NaiveDateTime) -> String {
    format!(
        "entschuldigung_{}_{}_{}.docx",
        sanitize(&request.first_name),
        sanitize(&request.last_name),
        now.format("%Y%m%d_%H%M%S")
    )
}
