use std::collections::{BTreeMap, HashMap};

use chrono::Weekday;
use log::debug;

use super::models::ScheduleEntry;

/// The four double lessons the form has a column for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimeBlock {
    A,
    B,
    C,
    D,
}

impl TimeBlock {
    pub const ALL: [TimeBlock; 4] = [TimeBlock::A, TimeBlock::B, TimeBlock::C, TimeBlock::D];

    /// Column header of the block in the absence table.
    pub fn label(self) -> &'static str {
        match self {
            TimeBlock::A => "1./2.",
            TimeBlock::B => "3./4.",
            TimeBlock::C => "5./6.",
            TimeBlock::D => "7./8.",
        }
    }

    fn markers(self) -> [&'static str; 2] {
        match self {
            TimeBlock::A => ["1.", "2."],
            TimeBlock::B => ["3.", "4."],
            TimeBlock::C => ["5.", "6."],
            TimeBlock::D => ["7.", "8."],
        }
    }
}

/// What an hour label says about its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HourClass {
    /// `1./2. Stunde` covers the whole block.
    Combined(TimeBlock),
    /// `1. Stunde` covers the first (0) or second (1) lesson of the block.
    Half(TimeBlock, usize),
}

pub fn classify(hour: &str) -> Option<HourClass> {
    for block in TimeBlock::ALL {
        let [first, second] = block.markers();
        match (hour.contains(first), hour.contains(second)) {
            (true, true) => return Some(HourClass::Combined(block)),
            (true, false) => return Some(HourClass::Half(block, 0)),
            (false, true) => return Some(HourClass::Half(block, 1)),
            (false, false) => {}
        }
    }
    None
}

pub type BlockSubjects = BTreeMap<TimeBlock, String>;

/// Subjects per block, either for each weekday or the same for every day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockMapping {
    ByWeekday(HashMap<Weekday, BlockSubjects>),
    /// Entries carried no weekday and were assigned to blocks in order.
    Positional(BlockSubjects),
}

impl BlockMapping {
    pub fn subjects_for(&self, weekday: Weekday) -> Option<&BlockSubjects> {
        match self {
            BlockMapping::ByWeekday(days) => days.get(&weekday),
            BlockMapping::Positional(subjects) => Some(subjects),
        }
    }

    /// Subject of the block on that day, empty when nothing is scheduled.
    pub fn subject(&self, weekday: Weekday, block: TimeBlock) -> &str {
        self.subjects_for(weekday)
            .and_then(|subjects| subjects.get(&block))
            .map(String::as_str)
            .unwrap_or("")
    }
}

struct Slot {
    block: TimeBlock,
    subjects: Vec<String>,
    halves: Option<[bool; 2]>,
}

impl Slot {
    fn is_complete(&self) -> bool {
        self.halves.map_or(true, |[first, second]| first && second)
    }

    fn add_subject(&mut self, subject: &str) {
        let subject = subject.trim();
        if !subject.is_empty() && !self.subjects.iter().any(|s| s == subject) {
            self.subjects.push(subject.to_owned());
        }
    }
}

/// Classified blocks in order of first appearance. A pair of single hours becomes one
/// slot once both halves are seen; a lone half is dropped.
fn collect_slots<'a, I: IntoIterator<Item = &'a ScheduleEntry>>(entries: I) -> Vec<(TimeBlock, String)> {
    let mut slots: Vec<Slot> = Vec::new();
    for entry in entries {
        match classify(&entry.hour) {
            Some(HourClass::Combined(block)) => {
                let mut slot = Slot {
                    block,
                    subjects: Vec::new(),
                    halves: None,
                };
                slot.add_subject(&entry.subject);
                slots.push(slot);
            }
            Some(HourClass::Half(block, half)) => {
                let open = slots
                    .iter_mut()
                    .find(|slot| slot.block == block && slot.halves.is_some());
                match open {
                    Some(slot) => {
                        if let Some(halves) = slot.halves.as_mut() {
                            halves[half] = true;
                        }
                        slot.add_subject(&entry.subject);
                    }
                    None => {
                        let mut halves = [false; 2];
                        halves[half] = true;
                        let mut slot = Slot {
                            block,
                            subjects: Vec::new(),
                            halves: Some(halves),
                        };
                        slot.add_subject(&entry.subject);
                        slots.push(slot);
                    }
                }
            }
            None => debug!("Hour {:?} matches no block, skipping", entry.hour),
        }
    }

    slots
        .into_iter()
        .filter(|slot| {
            let complete = slot.is_complete();
            if !complete {
                debug!("Only one lesson of block {} scheduled, skipping", slot.block.label());
            }
            complete
        })
        .map(|slot| (slot.block, slot.subjects.join(", ")))
        .collect()
}

fn merge_into(subjects: &mut BlockSubjects, block: TimeBlock, subject: String) {
    match subjects.get_mut(&block) {
        Some(existing) if !subject.is_empty() => {
            let known = existing.split(", ").any(|s| s == subject);
            if existing.is_empty() {
                *existing = subject;
            } else if !known {
                existing.push_str(", ");
                existing.push_str(&subject);
            }
        }
        Some(_) => {}
        None => {
            subjects.insert(block, subject);
        }
    }
}

/// Builds the block mapping. Entries with weekdays are grouped per day; when no entry has
/// a weekday the classified entries fill blocks A to D in order and the rest is ignored.
pub fn map_schedule(entries: &[ScheduleEntry]) -> BlockMapping {
    if entries.iter().all(|entry| entry.weekday.is_none()) {
        let subjects = collect_slots(entries)
            .into_iter()
            .zip(TimeBlock::ALL)
            .map(|((_, subject), block)| (block, subject))
            .collect();
        return BlockMapping::Positional(subjects);
    }

    let mut per_day: BTreeMap<u32, (Weekday, Vec<&ScheduleEntry>)> = BTreeMap::new();
    for entry in entries {
        let Some(label) = entry.weekday.as_deref() else {
            debug!("Entry {:?} has no weekday, skipping", entry.hour);
            continue;
        };
        match parse_weekday(label) {
            Some(weekday) => per_day
                .entry(weekday.num_days_from_monday())
                .or_insert_with(|| (weekday, Vec::new()))
                .1
                .push(entry),
            None => debug!("Unknown weekday {label:?}, skipping"),
        }
    }

    let days = per_day
        .into_values()
        .map(|(weekday, day_entries)| {
            let mut subjects = BlockSubjects::new();
            for (block, subject) in collect_slots(day_entries) {
                merge_into(&mut subjects, block, subject);
            }
            (weekday, subjects)
        })
        .collect();
    BlockMapping::ByWeekday(days)
}

pub fn parse_weekday(label: &str) -> Option<Weekday> {
    match label.trim().trim_end_matches('.').to_lowercase().as_str() {
        "montag" | "mo" | "monday" | "mon" => Some(Weekday::Mon),
        "dienstag" | "di" | "tuesday" | "tue" => Some(Weekday::Tue),
        "mittwoch" | "mi" | "wednesday" | "wed" => Some(Weekday::Wed),
        "donnerstag" | "do" | "thursday" | "thu" => Some(Weekday::Thu),
        "freitag" | "fr" | "friday" | "fri" => Some(Weekday::Fri),
        "samstag" | "sa" | "saturday" | "sat" => Some(Weekday::Sat),
        "sonntag" | "so" | "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Montag",
        Weekday::Tue => "Dienstag",
        Weekday::Wed => "Mittwoch",
        Weekday::Thu => "Donnerstag",
        Weekday::Fri => "Freitag",
        Weekday::Sat => "Samstag",
        Weekday::Sun => "Sonntag",
    }
}

#[cfg(test)]
#[path = "tests/schedule_mapper.rs"]
mod tests;
