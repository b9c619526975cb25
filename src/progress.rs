//src/progress.rs
use crate::db::SetLog;
use crate::plan::Plan;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

pub const DEFAULT_RECAP_DATES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggedSet {
    pub weight: String,
    pub reps: u32,
}

/// Every set of one exercise logged on one calendar date, in recording order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateEntry {
    pub date: NaiveDate,
    pub sets: Vec<LoggedSet>,
}

impl DateEntry {
    /// "50kg × 10 52.5kg × 8"
    pub fn summary(&self, unit: &str) -> String {
        self.sets
            .iter()
            .map(|s| format!("{}{} × {}", s.weight, unit, s.reps))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExerciseProgress {
    pub exercise: String,
    /// Ascending by date.
    pub dates: Vec<DateEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayProgress {
    pub day: String,
    pub exercises: Vec<ExerciseProgress>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    NoPlan,
    NoLogs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProgressReport {
    /// Nothing to show yet; distinct from a report whose logs match no plan day.
    Empty { reason: EmptyReason },
    Days { days: Vec<DayProgress> },
}

fn in_recording_order(logs: &[SetLog]) -> Vec<&SetLog> {
    let mut ordered: Vec<&SetLog> = logs.iter().collect();
    ordered.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
    ordered
}

fn logged(log: &SetLog) -> LoggedSet {
    LoggedSet {
        weight: log.weight.clone(),
        reps: log.reps,
    }
}

/// Groups a user's logs by day, exercise and date, following the plan's day and exercise order.
pub fn build_progress_report(plan: Option<&Plan>, logs: &[SetLog]) -> ProgressReport {
    let plan = match plan {
        Some(p) if !p.is_empty() => p,
        _ => {
            return ProgressReport::Empty {
                reason: EmptyReason::NoPlan,
            }
        }
    };
    if logs.is_empty() {
        return ProgressReport::Empty {
            reason: EmptyReason::NoLogs,
        };
    }

    let mut grouped: HashMap<(&str, &str), BTreeMap<NaiveDate, Vec<LoggedSet>>> = HashMap::new();
    for log in in_recording_order(logs) {
        grouped
            .entry((log.day.as_str(), log.exercise.as_str()))
            .or_default()
            .entry(log.timestamp.date_naive())
            .or_default()
            .push(logged(log));
    }

    let mut days = Vec::new();
    for day in &plan.days {
        let mut seen = HashSet::new();
        let exercises: Vec<ExerciseProgress> = day
            .exercises
            .iter()
            .filter(|ex| seen.insert(ex.name.as_str()))
            .filter_map(|ex| {
                grouped
                    .get(&(day.name.as_str(), ex.name.as_str()))
                    .map(|by_date| ExerciseProgress {
                        exercise: ex.name.clone(),
                        dates: by_date
                            .iter()
                            .map(|(date, sets)| DateEntry {
                                date: *date,
                                sets: sets.clone(),
                            })
                            .collect(),
                    })
            })
            .collect();

        if !exercises.is_empty() {
            days.push(DayProgress {
                day: day.name.clone(),
                exercises,
            });
        }
    }

    ProgressReport::Days { days }
}

/// The `limit` most recent dates an exercise was logged on, newest first.
/// `logs` should already be restricted to one exercise.
pub fn build_recap(logs: &[SetLog], limit: usize) -> Vec<DateEntry> {
    let mut by_date: BTreeMap<NaiveDate, Vec<LoggedSet>> = BTreeMap::new();
    for log in in_recording_order(logs) {
        by_date
            .entry(log.timestamp.date_naive())
            .or_default()
            .push(logged(log));
    }

    by_date
        .into_iter()
        .rev()
        .take(limit)
        .map(|(date, sets)| DateEntry { date, sets })
        .collect()
}
