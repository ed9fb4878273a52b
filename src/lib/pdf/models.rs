use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kind of machine the converter runs on. Chosen by the caller, never probed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum HostProfile {
    /// Shared or containerised hosting without an office suite.
    #[default]
    ManagedHost,
    /// A workstation with a full office suite installed.
    FullDesktop,
}

/// Result of one conversion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    Success(PathBuf),
    /// The tool or service is not there at all.
    Unavailable,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    LibreOffice,
    Pandoc,
    HtmlRender,
    Remote,
}

/// A model for describing the conversion part of config.json.
/// Consists of:
/// 1. Host profile deciding the order of strategies
/// 2. Strategies to try, in order
/// 3. Timeout for a single attempt, in seconds
/// 4. Program names of the external tools and the URL of a conversion service
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConverterConfig {
    pub profile: HostProfile,
    pub strategies: Vec<StrategyKind>,
    pub timeout_secs: u64,
    pub libre_office_program: String,
    pub pandoc_program: String,
    pub html_renderer_program: String,
    pub remote_url: Option<String>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            profile: HostProfile::default(),
            strategies: vec![
                StrategyKind::LibreOffice,
                StrategyKind::HtmlRender,
                StrategyKind::Pandoc,
                StrategyKind::Remote,
            ],
            timeout_secs: 30,
            libre_office_program: "soffice".to_owned(),
            pandoc_program: "pandoc".to_owned(),
            html_renderer_program: "weasyprint".to_owned(),
            remote_url: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("source document not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("source document already is a PDF: {}", .0.display())]
    SourceIsTarget(PathBuf),

    #[error("all {attempted} conversion strategies failed")]
    AllStrategiesFailed { attempted: usize },
}

/// A model for describing ARGS of `convert_pdf`.
/// Consists of:
/// 1. The .docx to convert; the PDF is written next to it.
/// 2. Path to config.json, of which only the `conversion` part is used.
/// 3. Optional host profile overriding the configured one.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[arg(value_name = "FILE")]
    pub source: PathBuf,
    #[arg(long, value_name = "FILE", default_value = "config.json")]
    pub config_json_path: PathBuf,
    #[arg(long, value_enum)]
    pub profile: Option<HostProfile>,
}
