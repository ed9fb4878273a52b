/// A model for describing a word processing document as a tagged tree.
/// Consists of top-level blocks in reading order. Only text, bold emphasis and
/// the table structure survive; the rest of the original styling is dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paragraph {
    pub runs: Vec<Run>,
}

/// A piece of text sharing the same formatting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub bold: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cell {
    pub paragraphs: Vec<Paragraph>,
}

impl Run {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
        }
    }
}

impl Paragraph {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            runs: vec![Run::new(text)],
        }
    }

    pub fn with_run(mut self, run: Run) -> Self {
        self.runs.push(run);
        self
    }

    /// Concatenated text of all runs.
    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }
}

impl Cell {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            paragraphs: vec![Paragraph::from_text(text)],
        }
    }

    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Row {
    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Self {
        Self {
            cells: texts
                .iter()
                .map(|text| Cell::from_text(text.as_ref()))
                .collect(),
        }
    }

    pub fn texts(&self) -> Vec<String> {
        self.cells.iter().map(Cell::text).collect()
    }
}

impl Table {
    pub fn header(&self) -> Option<&Row> {
        self.rows.first()
    }
}

impl Document {
    /// Every paragraph of the document, the ones inside table cells included.
    pub fn paragraphs_mut(&mut self) -> Vec<&mut Paragraph> {
        let mut paragraphs = Vec::new();
        for block in self.blocks.iter_mut() {
            match block {
                Block::Paragraph(paragraph) => paragraphs.push(paragraph),
                Block::Table(table) => {
                    for row in table.rows.iter_mut() {
                        for cell in row.cells.iter_mut() {
                            paragraphs.extend(cell.paragraphs.iter_mut());
                        }
                    }
                }
            }
        }
        paragraphs
    }

    pub fn for_each_paragraph_mut<F: FnMut(&mut Paragraph)>(&mut self, mut f: F) {
        for paragraph in self.paragraphs_mut() {
            f(paragraph);
        }
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Table(table) => Some(table),
            Block::Paragraph(_) => None,
        })
    }

    /// Plain text of the whole document, one line per paragraph, cells tab separated.
    pub fn text(&self) -> String {
        let mut lines = Vec::new();
        for block in self.blocks.iter() {
            match block {
                Block::Paragraph(paragraph) => lines.push(paragraph.text()),
                Block::Table(table) => {
                    for row in table.rows.iter() {
                        lines.push(row.texts().join("\t"));
                    }
                }
            }
        }
        lines.join("\n")
    }
}
