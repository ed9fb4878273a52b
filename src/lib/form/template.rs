use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use log::{debug, info, warn};

use super::{
    error::FormError,
    models::document_model::{Block, Cell, Document, Paragraph, Row, Run, Table},
};

/// Where the form is loaded from. Decided once, when the template is constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    Found(PathBuf),
    Fallback,
}

impl TemplateSource {
    /// The first candidate that exists on disk, or [`TemplateSource::Fallback`].
    pub fn resolve<P: AsRef<Path>>(candidates: &[P]) -> Self {
        for candidate in candidates {
            let path: &Path = candidate.as_ref();
            debug!("Looking for template at {}", path.display());
            if path.is_file() {
                return TemplateSource::Found(path.to_path_buf());
            }
        }
        TemplateSource::Fallback
    }
}

pub struct FormTemplate {
    source: TemplateSource,
}

impl FormTemplate {
    pub fn new<P: AsRef<Path>>(candidates: &[P]) -> Self {
        let source = TemplateSource::resolve(candidates);
        match &source {
            TemplateSource::Found(path) => info!("Using template {}", path.display()),
            TemplateSource::Fallback => {
                warn!("No template found in {} locations, using the built-in form", candidates.len())
            }
        }
        Self { source }
    }

    pub fn from_source(source: TemplateSource) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &TemplateSource {
        &self.source
    }

    /// A fresh copy of the form. Never fails: an unreadable file yields the built-in form.
    pub fn load(&self) -> Document {
        match &self.source {
            TemplateSource::Found(path) => match read_document(path) {
                Ok(document) => document,
                Err(e) => {
                    warn!("{e}, using the built-in form");
                    fallback_template()
                }
            },
            TemplateSource::Fallback => fallback_template(),
        }
    }
}

pub fn read_document(path: &Path) -> Result<Document, FormError> {
    let bytes = fs::read(path)
        .map_err(|e| FormError::TemplateLoad(format!("{}: {e}", path.display())))?;
    let document = parse_document(&bytes)
        .map_err(|e| FormError::TemplateLoad(format!("{}: {e}", path.display())))?;
    debug!("Read {} blocks from {}", document.blocks.len(), path.display());
    Ok(document)
}

/// Lowers the bytes of a `.docx` package into the document tree.
pub fn parse_document(bytes: &[u8]) -> Result<Document, docx_rs::ReaderError> {
    let docx = docx_rs::read_docx(bytes)?;

    let mut blocks = Vec::new();
    for child in docx.document.children.iter() {
        match child {
            docx_rs::DocumentChild::Paragraph(paragraph) => {
                blocks.push(Block::Paragraph(lower_paragraph(paragraph)))
            }
            docx_rs::DocumentChild::Table(table) => blocks.push(Block::Table(lower_table(table))),
            _ => {}
        }
    }
    Ok(Document { blocks })
}

fn lower_paragraph(paragraph: &docx_rs::Paragraph) -> Paragraph {
    let mut runs = Vec::new();
    for child in paragraph.children.iter() {
        if let docx_rs::ParagraphChild::Run(run) = child {
            runs.push(lower_run(run));
        }
    }
    Paragraph { runs }
}

fn lower_run(run: &docx_rs::Run) -> Run {
    let mut text = String::new();
    for child in run.children.iter() {
        match child {
            docx_rs::RunChild::Text(t) => text.push_str(&t.text),
            docx_rs::RunChild::Tab(_) => text.push('\t'),
            _ => {}
        }
    }
    Run {
        text,
        bold: run.run_property.bold.is_some(),
    }
}

fn lower_table(table: &docx_rs::Table) -> Table {
    let mut rows = Vec::new();
    for child in table.rows.iter() {
        #[allow(unreachable_patterns)]
        match child {
            docx_rs::TableChild::TableRow(row) => {
                let mut cells = Vec::new();
                for cell in row.cells.iter() {
                    #[allow(unreachable_patterns)]
                    match cell {
                        docx_rs::TableRowChild::TableCell(cell) => {
                            cells.push(Cell {
                                paragraphs: lower_cell(cell),
                            })
                        }
                        _ => {}
                    }
                }
                rows.push(Row { cells });
            }
            _ => {}
        }
    }
    Table { rows }
}

/// Nested tables are flattened into the cell's paragraphs.
fn lower_cell(cell: &docx_rs::TableCell) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();
    for content in cell.children.iter() {
        match content {
            docx_rs::TableCellContent::Paragraph(paragraph) => {
                paragraphs.push(lower_paragraph(paragraph))
            }
            docx_rs::TableCellContent::Table(nested) => {
                for row in lower_table(nested).rows {
                    for cell in row.cells {
                        paragraphs.extend(cell.paragraphs);
                    }
                }
            }
            _ => {}
        }
    }
    paragraphs
}

/// The excuse form as the school hands it out, with placeholders in place of the student's data.
pub fn fallback_template() -> Document {
    let empty = || Block::Paragraph(Paragraph::default());
    let blocks = vec![
        Block::Paragraph(Paragraph::from_text(
            "Berufskolleg Bergisch Gladbach HIT12 2025/2026",
        )),
        empty(),
        Block::Paragraph(Paragraph::default().with_run(Run::bold("Entschuldigungsformular"))),
        empty(),
        Block::Paragraph(
            Paragraph::default()
                .with_run(Run::bold("Nachname, Vorname: "))
                .with_run(Run::new("[NACHNAME], [VORNAME]")),
        ),
        Block::Paragraph(
            Paragraph::default()
                .with_run(Run::bold("Grund: "))
                .with_run(Run::new("[GRUND]")),
        ),
        empty(),
        Block::Paragraph(Paragraph::from_text("Sehr geehrte/r Frau/Herr [LEHRER],")),
        empty(),
        Block::Paragraph(Paragraph::from_text(
            "Ich entschuldige mein Fehlen für die Unterrichtsstunden an folgenden Tagen:",
        )),
        empty(),
        Block::Table(Table {
            rows: vec![Row::from_texts(&["", "", "1./2.", "3./4.", "5./6.", "7./8."])],
        }),
        empty(),
        Block::Paragraph(Paragraph::from_text(
            "Anmerkung: Klausurtermine müssen gekennzeichnet und mit Attest entschuldigt werden.",
        )),
        empty(),
        Block::Paragraph(Paragraph::from_text(
            "Bei Bedarf die oben stehende Tabelle duplizieren.",
        )),
        empty(),
        Block::Paragraph(
            Paragraph::default()
                .with_run(Run::bold("Ort, Datum: "))
                .with_run(Run::new("[ORT], [DATUM]")),
        ),
        empty(),
        Block::Paragraph(Paragraph::from_text("Unterschrift")),
        Block::Paragraph(Paragraph::from_text(
            "(bei Minderjährigen von einem Erziehungsberechtigten)",
        )),
        empty(),
        Block::Paragraph(
            Paragraph::default().with_run(Run::bold("Beschluss der Schulkonferenz vom 30.09.2024")),
        ),
        Block::Paragraph(Paragraph::from_text(
            "Entschuldigungen müssen spätestens eine Woche nach Rückkehr in den Unterricht \
             (bei Minderjährigen mit Unterschrift der Erziehungsberechtigten) oder ein Attest \
             in Papierform unaufgefordert bei der Klassenleitung eingereicht worden sein. \
             Später eingereichte Entschuldigungen werden nicht mehr akzeptiert und führen zu \
             unentschuldigten Fehlzeiten auf dem Zeugnis.",
        )),
    ];
    Document { blocks }
}

/// Writes the document as `.docx`. A partially written file is removed on failure.
pub fn save_document(document: &Document, path: &Path) -> Result<(), FormError> {
    let mut docx = docx_rs::Docx::new();
    for block in document.blocks.iter() {
        docx = match block {
            Block::Paragraph(paragraph) => docx.add_paragraph(raise_paragraph(paragraph)),
            Block::Table(table) => docx.add_table(raise_table(table)),
        };
    }

    let file = File::create(path)?;
    if let Err(e) = docx.build().pack(file) {
        if let Err(remove_error) = fs::remove_file(path) {
            warn!("Could not remove {}: {remove_error}", path.display());
        }
        return Err(FormError::Docx(e.to_string()));
    }
    info!("Saved document to {}", path.display());
    Ok(())
}

fn raise_paragraph(paragraph: &Paragraph) -> docx_rs::Paragraph {
    paragraph
        .runs
        .iter()
        .fold(docx_rs::Paragraph::new(), |acc, run| {
            let mut raised = docx_rs::Run::new().add_text(run.text.as_str());
            if run.bold {
                raised = raised.bold();
            }
            acc.add_run(raised)
        })
}

fn raise_table(table: &Table) -> docx_rs::Table {
    let rows = table
        .rows
        .iter()
        .map(|row| {
            docx_rs::TableRow::new(
                row.cells
                    .iter()
                    .map(|cell| {
                        if cell.paragraphs.is_empty() {
                            docx_rs::TableCell::new().add_paragraph(docx_rs::Paragraph::new())
                        } else {
                            cell.paragraphs
                                .iter()
                                .fold(docx_rs::TableCell::new(), |acc, paragraph| {
                                    acc.add_paragraph(raise_paragraph(paragraph))
                                })
                        }
                    })
                    .collect(),
            )
        })
        .collect();
    docx_rs::Table::new(rows)
}

#[cfg(test)]
#[path = "tests/template.rs"]
mod tests;
