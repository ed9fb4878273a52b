use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{NaiveDate, NaiveDateTime};
use log::{info, warn};

use super::{
    absence_table::{expand_periods, fill_absence_table, total_absence_days},
    error::FormError,
    helpers::{build_token_map, output_file_name},
    models::{document_model::Document, Config, FormRequest},
    schedule_mapper::map_schedule,
    substitution::substitute,
    template::{save_document, FormTemplate},
};
use crate::pdf::{converter::DocumentConverter, models::ConvertError};

/// A trait, necessary for every entity that turns a generated form into a portable document.
#[allow(async_fn_in_trait)]
pub trait PortableConverter {
    async fn to_portable(&self, source: &Path) -> Result<PathBuf, ConvertError>;
}

impl PortableConverter for DocumentConverter {
    async fn to_portable(&self, source: &Path) -> Result<PathBuf, ConvertError> {
        self.convert(source).await
    }
}

/// Files produced for one request. `portable` is `None` when every converter failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedForm {
    pub document: PathBuf,
    pub portable: Option<PathBuf>,
}

/// Fills a fresh copy of the template with the request and saves it to `output_path`.
pub fn generate_document(
    request: &FormRequest,
    template: &FormTemplate,
    config: &Config,
    today: NaiveDate,
    output_path: &Path,
) -> Result<Document, FormError> {
    let mut document = template.load();
    substitute(&mut document, &build_token_map(request, config, today));

    let mapping = map_schedule(&request.schedule);
    let rows = expand_periods(&request.absence_periods, &mapping);
    info!(
        "{} absence days, {} of them school days",
        total_absence_days(&request.absence_periods),
        rows.len()
    );
    fill_absence_table(&mut document, &rows, config.table_layout);

    save_document(&document, output_path)?;
    Ok(document)
}

pub async fn run<PC: PortableConverter>(
    converter: &PC,
    request: &FormRequest,
    template: &FormTemplate,
    config: &Config,
    now: NaiveDateTime,
) -> Result<GeneratedForm, FormError> {
    fs::create_dir_all(&config.output_dir)?;
    let document = config.output_dir.join(output_file_name(request, now));
    generate_document(request, template, config, now.date(), &document)?;

    let portable = match converter.to_portable(&document).await {
        Ok(path) => {
            info!("Converted form to {}", path.display());
            Some(path)
        }
        Err(e) => {
            warn!("Form stays a .docx: {e}");
            None
        }
    };
    Ok(GeneratedForm { document, portable })
}
