//src/plan.rs
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, warn};

pub const COL_DAY: &str = "Allenamento";
pub const COL_EXERCISE: &str = "Esercizio";
pub const COL_SETS: &str = "Serie";
pub const COL_REPS: &str = "Ripetizioni";
pub const COL_REST: &str = "Recupero";

/// Required column headers, in the order they are reported when missing.
pub const REQUIRED_COLUMNS: [&str; 5] = [COL_DAY, COL_EXERCISE, COL_SETS, COL_REPS, COL_REST];

static FIRST_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("digit pattern is valid"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Failed to read table: {0}")]
    Csv(#[from] csv::Error),
}

/// A raw table with named columns, as handed over by an import collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Reads a CSV document whose first record holds the column names.
    /// Rows may be shorter or longer than the header.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, TableError> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);
        let headers = rdr.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in rdr.records() {
            rows.push(record?.iter().map(str::to_string).collect());
        }
        Ok(Self { headers, rows })
    }

    fn column_index(&self) -> HashMap<&str, usize> {
        let mut index = HashMap::new();
        for (i, header) in self.headers.iter().enumerate() {
            // First occurrence wins for duplicated headers
            index.entry(header.as_str()).or_insert(i);
        }
        index
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub name: String,
    pub sets: u32,
    /// Numeric target or the literal "MAX".
    pub reps: String,
    /// Free-form rest token such as "90s", stored verbatim.
    pub rest: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Day {
    pub name: String,
    pub exercises: Vec<Exercise>,
}

/// Ordered training days. Day order and exercise order within a day are the workout order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub days: Vec<Day>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn day(&self, name: &str) -> Option<&Day> {
        self.days.iter().find(|d| d.name == name)
    }

    pub fn exercises(&self, day: &str) -> Option<&[Exercise]> {
        self.day(day).map(|d| d.exercises.as_slice())
    }

    pub fn day_names(&self) -> Vec<String> {
        self.days.iter().map(|d| d.name.clone()).collect()
    }

    pub fn total_exercises(&self) -> usize {
        self.days.iter().map(|d| d.exercises.len()).sum()
    }

    fn push(&mut self, day: &str, exercise: Exercise) {
        match self.days.iter_mut().find(|d| d.name == day) {
            Some(existing) => existing.exercises.push(exercise),
            None => self.days.push(Day {
                name: day.to_string(),
                exercises: vec![exercise],
            }),
        }
    }
}

/// Lenient set-count coercion: "3" -> 3, "3 serie" -> 3, "abc" -> 1.
/// A digit run too large for `u32` clamps to `u32::MAX`.
pub fn coerce_set_count(raw: &str) -> u32 {
    if let Ok(n) = raw.trim().parse::<u32>() {
        return n;
    }
    match FIRST_DIGITS.find(raw) {
        // A digit run only fails to parse on overflow
        Some(m) => m.as_str().parse::<u32>().unwrap_or_else(|_| {
            warn!(raw, "Set count out of range, clamping");
            u32::MAX
        }),
        None => 1,
    }
}

/// Converts a table into a plan, preserving first-seen day order and row order within a day.
pub fn parse_plan(table: &Table) -> Result<Plan, Error> {
    let index = table.column_index();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !index.contains_key(*col))
        .map(|col| (*col).to_string())
        .collect();
    if !missing.is_empty() {
        return Err(Error::MissingColumns(missing));
    }

    let col = |name: &str| index[name];
    let (day_col, name_col, sets_col, reps_col, rest_col) = (
        col(COL_DAY),
        col(COL_EXERCISE),
        col(COL_SETS),
        col(COL_REPS),
        col(COL_REST),
    );

    let mut plan = Plan::default();
    for (row_no, row) in table.rows.iter().enumerate() {
        let cell = |i: usize| row.get(i).map(String::as_str).unwrap_or("");
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        let day = cell(day_col).trim();
        let name = cell(name_col).trim();
        if day.is_empty() || name.is_empty() {
            warn!(row = row_no + 1, "Skipping plan row without day or exercise name");
            continue;
        }

        plan.push(
            day,
            Exercise {
                name: name.to_string(),
                sets: coerce_set_count(cell(sets_col)),
                reps: cell(reps_col).trim().to_string(),
                rest: cell(rest_col).trim().to_string(),
            },
        );
    }

    debug!(
        days = plan.days.len(),
        exercises = plan.total_exercises(),
        "Parsed plan"
    );
    Ok(plan)
}
