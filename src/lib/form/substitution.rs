use std::collections::BTreeMap;

use log::debug;

use super::models::document_model::{Document, Paragraph, Run};

/// Bracket-delimited tokens the form understands.
/// Declaration order is the order in which they are substituted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Placeholder {
    LastName,
    FirstName,
    Reason,
    Location,
    CurrentDate,
    TeacherLastName,
}

impl Placeholder {
    pub const ALL: [Placeholder; 6] = [
        Placeholder::LastName,
        Placeholder::FirstName,
        Placeholder::Reason,
        Placeholder::Location,
        Placeholder::CurrentDate,
        Placeholder::TeacherLastName,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Placeholder::LastName => "[NACHNAME]",
            Placeholder::FirstName => "[VORNAME]",
            Placeholder::Reason => "[GRUND]",
            Placeholder::Location => "[ORT]",
            Placeholder::CurrentDate => "[DATUM]",
            Placeholder::TeacherLastName => "[LEHRER]",
        }
    }
}

pub type TokenMap = BTreeMap<Placeholder, String>;

/// Label phrases whose remainder of the paragraph is rewritten with a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabeledField {
    Name,
    Reason,
    LocationDate,
}

impl LabeledField {
    pub const ALL: [LabeledField; 3] = [
        LabeledField::Name,
        LabeledField::Reason,
        LabeledField::LocationDate,
    ];

    pub fn label(self) -> &'static str {
        match self {
            LabeledField::Name => "Nachname, Vorname:",
            LabeledField::Reason => "Grund:",
            LabeledField::LocationDate => "Ort, Datum:",
        }
    }

    fn value(self, tokens: &TokenMap) -> Option<String> {
        match self {
            LabeledField::Name => Some(format!(
                "{}, {}",
                tokens.get(&Placeholder::LastName)?,
                tokens.get(&Placeholder::FirstName)?
            )),
            LabeledField::Reason => tokens.get(&Placeholder::Reason).cloned(),
            LabeledField::LocationDate => Some(format!(
                "{}, {}",
                tokens.get(&Placeholder::Location)?,
                tokens.get(&Placeholder::CurrentDate)?
            )),
        }
    }
}

/// Replaces tokens in every run, then rewrites the first paragraph of each labeled field.
/// Applying it twice with the same map gives the same document.
pub fn substitute(document: &mut Document, tokens: &TokenMap) {
    document.for_each_paragraph_mut(|paragraph| {
        for run in paragraph.runs.iter_mut() {
            replace_tokens(run, tokens);
        }
    });

    for field in LabeledField::ALL {
        let Some(value) = field.value(tokens) else {
            continue;
        };
        let label = field.label();
        let mut paragraphs = document.paragraphs_mut();
        match paragraphs
            .iter_mut()
            .find(|paragraph| paragraph.text().contains(label))
        {
            Some(paragraph) => rewrite_after_label(paragraph, label, &value),
            None => debug!("No paragraph labeled {label:?}"),
        }
    }
}

fn replace_tokens(run: &mut Run, tokens: &TokenMap) {
    for placeholder in Placeholder::ALL {
        if let Some(value) = tokens.get(&placeholder) {
            let token = placeholder.token();
            if run.text.contains(token) {
                run.text = run.text.replace(token, value);
            }
        }
    }
}

/// Keeps everything up to the end of `label`, drops the rest and writes ` value` after it.
fn rewrite_after_label(paragraph: &mut Paragraph, label: &str, value: &str) {
    let text = paragraph.text();
    let Some(start) = text.find(label) else {
        return;
    };
    let label_end = start + label.len();

    let mut offset = 0;
    let mut ending_run = None;
    for (i, run) in paragraph.runs.iter().enumerate() {
        let run_end = offset + run.text.len();
        if label_end <= run_end {
            ending_run = Some((i, label_end - offset));
            break;
        }
        offset = run_end;
    }
    let Some((index, cut)) = ending_run else {
        return;
    };

    paragraph.runs[index].text.truncate(cut);
    let filled = format!(" {value}");
    match paragraph.runs.get_mut(index + 1) {
        Some(next) => {
            next.text = filled;
            for run in paragraph.runs.iter_mut().skip(index + 2) {
                run.text.clear();
            }
        }
        None => paragraph.runs[index].text.push_str(&filled),
    }
}

#[cfg(test)]
#[path = "tests/substitution.rs"]
mod tests;
