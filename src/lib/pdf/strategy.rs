use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{
    multipart::{Form, Part},
    Client,
};

use super::{
    helpers::{remove_partial, render_html, run_tool, verify_output},
    models::{ConversionOutcome, ConverterConfig, StrategyKind},
};
use crate::form::template::parse_document;

/// A trait, necessary for every way of producing a PDF from a `.docx`.
/// An attempt reports its outcome instead of returning an error.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the strategy needs a full office suite on the host.
    fn requires_desktop_suite(&self) -> bool {
        false
    }

    async fn attempt(&self, source: &Path, target: &Path) -> ConversionOutcome;
}

pub struct LibreOfficeStrategy {
    program: String,
}

impl LibreOfficeStrategy {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Strategy for LibreOfficeStrategy {
    fn name(&self) -> &str {
        "libre_office"
    }

    fn requires_desktop_suite(&self) -> bool {
        true
    }

    async fn attempt(&self, source: &Path, target: &Path) -> ConversionOutcome {
        let out_dir = target
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let args: [&OsStr; 6] = [
            OsStr::new("--headless"),
            OsStr::new("--convert-to"),
            OsStr::new("pdf"),
            OsStr::new("--outdir"),
            out_dir.as_os_str(),
            source.as_os_str(),
        ];
        if let Err(outcome) = run_tool(&self.program, args).await {
            return outcome;
        }

        // The suite names its output after the source, not after our target.
        let Some(stem) = source.file_stem() else {
            return ConversionOutcome::Failed(format!("{} has no file name", source.display()));
        };
        let mut produced_name = stem.to_os_string();
        produced_name.push(".pdf");
        let produced = out_dir.join(produced_name);
        if produced.as_path() != target {
            if let Err(e) = tokio::fs::rename(&produced, target).await {
                remove_partial(&produced);
                return ConversionOutcome::Failed(format!(
                    "could not move {} to {}: {e}",
                    produced.display(),
                    target.display()
                ));
            }
        }
        verify_output(target)
    }
}

pub struct PandocStrategy {
    program: String,
}

impl PandocStrategy {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Strategy for PandocStrategy {
    fn name(&self) -> &str {
        "pandoc"
    }

    async fn attempt(&self, source: &Path, target: &Path) -> ConversionOutcome {
        let args = [source.as_os_str(), OsStr::new("-o"), target.as_os_str()];
        match run_tool(&self.program, args).await {
            Ok(()) => verify_output(target),
            Err(outcome) => outcome,
        }
    }
}

/// Deletes the file it guards when dropped, however the attempt ends.
/// A file already moved away is not an error.
struct ScratchFile(PathBuf);

impl ScratchFile {
    fn new(path: PathBuf) -> Self {
        Self(path)
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        remove_partial(&self.0);
    }
}

/// Renders the document to HTML and hands that to an HTML to PDF renderer.
pub struct HtmlRenderStrategy {
    program: String,
}

impl HtmlRenderStrategy {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// `<stem>.render.html` next to the target.
    pub fn intermediate_path(target: &Path) -> PathBuf {
        target.with_extension("render.html")
    }
}

#[async_trait]
impl Strategy for HtmlRenderStrategy {
    fn name(&self) -> &str {
        "html_render"
    }

    async fn attempt(&self, source: &Path, target: &Path) -> ConversionOutcome {
        let bytes = match tokio::fs::read(source).await {
            Ok(bytes) => bytes,
            Err(e) => return ConversionOutcome::Failed(format!("{}: {e}", source.display())),
        };
        // Unzipping and XML parsing block, keep them off the runtime workers.
        let parsed =
            tokio::task::spawn_blocking(move || parse_document(&bytes).map_err(|e| e.to_string()))
                .await;
        let document = match parsed {
            Ok(Ok(document)) => document,
            Ok(Err(e)) => {
                return ConversionOutcome::Failed(format!("{}: {e}", source.display()));
            }
            Err(e) => {
                return ConversionOutcome::Failed(format!(
                    "reading {} did not finish: {e}",
                    source.display()
                ));
            }
        };

        let scratch = ScratchFile::new(Self::intermediate_path(target));
        if let Err(e) = tokio::fs::write(scratch.path(), render_html(&document)).await {
            return ConversionOutcome::Failed(format!(
                "could not write {}: {e}",
                scratch.path().display()
            ));
        }
        debug!("Rendered {} to {}", source.display(), scratch.path().display());

        let args = [scratch.path().as_os_str(), target.as_os_str()];
        match run_tool(&self.program, args).await {
            Ok(()) => verify_output(target),
            Err(outcome) => outcome,
        }
    }
}

/// Posts the document to a Gotenberg compatible conversion service.
pub struct RemoteStrategy {
    client: Client,
    url: String,
}

impl RemoteStrategy {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    /// `<stem>.pdf.part` next to the target, renamed into place once complete.
    pub fn part_path(target: &Path) -> PathBuf {
        target.with_extension("pdf.part")
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/forms/libreoffice/convert",
            self.url.trim_end_matches('/')
        )
    }

    async fn request(&self, source: &Path) -> Result<Vec<u8>, ConversionOutcome> {
        let bytes = tokio::fs::read(source)
            .await
            .map_err(|e| ConversionOutcome::Failed(format!("{}: {e}", source.display())))?;
        let file_name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.docx".to_owned());
        let part = Part::bytes(bytes).file_name(file_name);
        let form = Form::new().part("files", part);

        let response = self
            .client
            .post(self.endpoint())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    debug!("Conversion service is unreachable: {e}");
                    ConversionOutcome::Unavailable
                } else {
                    ConversionOutcome::Failed(e.to_string())
                }
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ConversionOutcome::Failed(format!(
                "conversion service answered {status}"
            )));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| ConversionOutcome::Failed(e.to_string()))?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl Strategy for RemoteStrategy {
    fn name(&self) -> &str {
        "remote"
    }

    async fn attempt(&self, source: &Path, target: &Path) -> ConversionOutcome {
        let body = match self.request(source).await {
            Ok(body) => body,
            Err(outcome) => return outcome,
        };
        let scratch = ScratchFile::new(Self::part_path(target));
        if let Err(e) = tokio::fs::write(scratch.path(), &body).await {
            return ConversionOutcome::Failed(format!(
                "could not write {}: {e}",
                scratch.path().display()
            ));
        }
        if let Err(e) = tokio::fs::rename(scratch.path(), target).await {
            return ConversionOutcome::Failed(format!(
                "could not move {}: {e}",
                scratch.path().display()
            ));
        }
        verify_output(target)
    }
}

/// Strategies in configured order. `remote` is left out when no URL is configured.
pub fn build_strategies(config: &ConverterConfig) -> Vec<Box<dyn Strategy>> {
    let mut strategies: Vec<Box<dyn Strategy>> = Vec::new();
    for kind in config.strategies.iter() {
        match kind {
            StrategyKind::LibreOffice => strategies.push(Box::new(LibreOfficeStrategy::new(
                config.libre_office_program.as_str(),
            ))),
            StrategyKind::Pandoc => {
                strategies.push(Box::new(PandocStrategy::new(config.pandoc_program.as_str())))
            }
            StrategyKind::HtmlRender => strategies.push(Box::new(HtmlRenderStrategy::new(
                config.html_renderer_program.as_str(),
            ))),
            StrategyKind::Remote => match &config.remote_url {
                Some(url) => strategies.push(Box::new(RemoteStrategy::new(url.as_str()))),
                None => warn!("Strategy remote is configured without remote_url, leaving it out"),
            },
        }
    }
    strategies
}

#[cfg(test)]
#[path = "tests/strategy.rs"]
mod tests;
