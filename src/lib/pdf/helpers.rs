use std::{
    ffi::OsStr,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    process::Stdio,
};

use log::{debug, warn};
use tokio::process::Command;

use super::models::ConversionOutcome;
use crate::form::models::document_model::{Block, Document, Paragraph};

/// Same directory and basename as the source, `.pdf` extension.
pub fn target_path_for(source: &Path) -> PathBuf {
    source.with_extension("pdf")
}

/// Runs an external tool to completion. A missing program is [`ConversionOutcome::Unavailable`],
/// a non-zero exit is [`ConversionOutcome::Failed`] carrying stderr.
/// The child is killed if the returned future is dropped.
pub async fn run_tool<I, S>(program: &str, args: I) -> Result<(), ConversionOutcome>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    debug!("Running {program}");
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                debug!("{program} is not installed");
                ConversionOutcome::Unavailable
            }
            _ => ConversionOutcome::Failed(format!("could not start {program}: {e}")),
        })?;

    if output.status.success() {
        Ok(())
    } else {
        Err(ConversionOutcome::Failed(format!(
            "{program} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

/// Success only for an existing, non-empty file.
pub fn verify_output(target: &Path) -> ConversionOutcome {
    match fs::metadata(target) {
        Ok(metadata) if metadata.is_file() && metadata.len() > 0 => {
            ConversionOutcome::Success(target.to_path_buf())
        }
        Ok(_) => ConversionOutcome::Failed(format!("{} is empty", target.display())),
        Err(_) => ConversionOutcome::Failed(format!("{} was not created", target.display())),
    }
}

pub fn remove_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed partial output {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove partial output {}: {e}", path.display()),
    }
}

fn render_runs(paragraph: &Paragraph) -> String {
    paragraph
        .runs
        .iter()
        .map(|run| {
            if run.bold {
                format!("<strong>{}</strong>", html_escape::encode_text(&run.text))
            } else {
                html_escape::encode_text(&run.text).into_owned()
            }
        })
        .collect()
}

/// Standalone HTML page with the document's text and tables.
pub fn render_html(document: &Document) -> String {
    let mut body = String::new();
    for block in document.blocks.iter() {
        match block {
            Block::Paragraph(paragraph) => {
                body.push_str(&format!("<p>{}</p>\n", render_runs(paragraph)));
            }
            Block::Table(table) => {
                body.push_str("<table>\n");
                for row in table.rows.iter() {
                    body.push_str("<tr>");
                    for cell in row.cells.iter() {
                        let content = cell
                            .paragraphs
                            .iter()
                            .map(render_runs)
                            .collect::<Vec<_>>()
                            .join("<br>");
                        body.push_str(&format!("<td>{content}</td>"));
                    }
                    body.push_str("</tr>\n");
                }
                body.push_str("</table>\n");
            }
        }
    }
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>\n\
         body {{ font-family: sans-serif; font-size: 11pt; }}\n\
         p {{ min-height: 1em; margin: 0.2em 0; }}\n\
         table {{ border-collapse: collapse; width: 100%; }}\n\
         td {{ border: 1px solid #000; padding: 4px; height: 1.4em; }}\n\
         </style>\n</head>\n<body>\n{body}</body>\n</html>\n"
    )
}

#[cfg(test)]
#[path = "tests/tests.rs"]
mod tests;
