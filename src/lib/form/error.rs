use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormError {
    #[error("absence period ends before it starts: {start} > {end}")]
    InvalidPeriod { start: NaiveDate, end: NaiveDate },

    #[error("template could not be loaded: {0}")]
    TemplateLoad(String),

    #[error("DOCX generation failed: {0}")]
    Docx(String),

    #[error("schedule import failed: {0}")]
    ScheduleImport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<csv::Error> for FormError {
    fn from(e: csv::Error) -> Self {
        FormError::ScheduleImport(e.to_string())
    }
}
