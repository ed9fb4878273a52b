use chrono::{Datelike, NaiveDate, Weekday};
use log::{debug, info, warn};

use super::{
    models::{
        document_model::{Block, Document, Paragraph, Row, Table},
        AbsencePeriod, TableLayout, WeekGrouping,
    },
    schedule_mapper::{weekday_name, BlockMapping, TimeBlock},
};

/// One school day of absence as it appears in the form's table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbsenceDayRow {
    pub weekday: Weekday,
    pub date: NaiveDate,
    pub subjects: [String; 4],
}

impl AbsenceDayRow {
    pub fn weekday_name(&self) -> &'static str {
        weekday_name(self.weekday)
    }

    pub fn date_text(&self) -> String {
        self.date.format("%d.%m.%Y").to_string()
    }

    pub fn subject(&self, block: TimeBlock) -> &str {
        &self.subjects[block as usize]
    }
}

/// One row per weekday of every period, in period order. Overlapping periods repeat days.
pub fn expand_periods(periods: &[AbsencePeriod], mapping: &BlockMapping) -> Vec<AbsenceDayRow> {
    let mut rows = Vec::new();
    for period in periods {
        for date in period
            .start()
            .iter_days()
            .take_while(|date| *date <= period.end())
        {
            let weekday = date.weekday();
            if matches!(weekday, Weekday::Sat | Weekday::Sun) {
                continue;
            }
            rows.push(AbsenceDayRow {
                weekday,
                date,
                subjects: TimeBlock::ALL.map(|block| mapping.subject(weekday, block).to_owned()),
            });
        }
    }
    debug!("Expanded {} periods into {} rows", periods.len(), rows.len());
    rows
}

/// Calendar days covered by the periods, weekends included.
pub fn total_absence_days(periods: &[AbsencePeriod]) -> i64 {
    periods
        .iter()
        .map(|period| (period.end() - period.start()).num_days() + 1)
        .sum()
}

pub fn group_rows(rows: &[AbsenceDayRow], grouping: WeekGrouping) -> Vec<&[AbsenceDayRow]> {
    match grouping {
        WeekGrouping::CountOfFive => rows.chunks(5).collect(),
        WeekGrouping::CalendarWeek => rows
            .chunk_by(|a, b| a.date.iso_week() == b.date.iso_week())
            .collect(),
    }
}

/// Index of the first table whose header names every block.
pub fn find_target_table(document: &Document) -> Option<usize> {
    document.blocks.iter().position(|block| match block {
        Block::Table(table) => table.header().is_some_and(|header| {
            let texts = header.texts();
            TimeBlock::ALL
                .iter()
                .all(|block| texts.iter().any(|text| text.contains(block.label())))
        }),
        Block::Paragraph(_) => false,
    })
}

struct ColumnMap {
    width: usize,
    blocks: [Option<usize>; 4],
}

impl ColumnMap {
    fn from_header(header: &Row) -> Self {
        let texts = header.texts();
        Self {
            width: texts.len().max(2),
            blocks: TimeBlock::ALL
                .map(|block| texts.iter().position(|text| text.contains(block.label()))),
        }
    }

    fn row(&self, day: &AbsenceDayRow) -> Row {
        let mut cells = vec![String::new(); self.width];
        cells[0] = day.weekday_name().to_owned();
        cells[1] = day.date_text();
        for block in TimeBlock::ALL {
            if let Some(column) = self.blocks[block as usize] {
                cells[column] = day.subject(block).to_owned();
            }
        }
        Row::from_texts(&cells)
    }
}

/// Replaces the body of the target table with `rows`, keeping its header. Returns the
/// number of rows written; zero when the document has no absence table.
pub fn fill_absence_table(
    document: &mut Document,
    rows: &[AbsenceDayRow],
    layout: TableLayout,
) -> usize {
    let Some(index) = find_target_table(document) else {
        warn!("No absence table found in the document, skipping the table");
        return 0;
    };
    let Block::Table(table) = &mut document.blocks[index] else {
        return 0;
    };
    table.rows.truncate(1);
    let Some(header) = table.header().cloned() else {
        return 0;
    };
    let columns = ColumnMap::from_header(&header);

    match layout {
        TableLayout::Single => {
            table.rows.extend(rows.iter().map(|day| columns.row(day)));
        }
        TableLayout::PerWeek(grouping) => {
            let groups = group_rows(rows, grouping);
            let mut groups = groups.into_iter();
            if let Some(first) = groups.next() {
                table.rows.extend(first.iter().map(|day| columns.row(day)));
            }
            let mut position = index + 1;
            for group in groups {
                let mut copy = Table {
                    rows: vec![header.clone()],
                };
                copy.rows.extend(group.iter().map(|day| columns.row(day)));
                document
                    .blocks
                    .insert(position, Block::Paragraph(Paragraph::default()));
                document.blocks.insert(position + 1, Block::Table(copy));
                position += 2;
            }
            info!("Absence table laid out as {} tables", (position - index + 1) / 2);
        }
    }
    rows.len()
}

#[cfg(test)]
#[path = "tests/absence_table.rs"]
mod tests;
