//src/session.rs
use crate::plan::{Exercise, Plan};
use std::fmt;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("No training plan loaded. Import one first.")]
    PlanNotFound,
    #[error("The training plan is empty. Import it again.")]
    EmptyPlan,
    #[error("Training day not found in plan: {0}")]
    DayNotFound(String),
    #[error("No workout in progress.")]
    InactiveSession,
    #[error("Invalid set format '{0}'. Use '<weight> <reps>' (e.g. '50 10' or '52,5 8').")]
    InvalidSetFormat(String),
}

/// Whether free text from the user is currently captured as a set entry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    #[default]
    Idle,
    AwaitingSet,
}

impl TryFrom<&str> for InputMode {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "idle" => Ok(InputMode::Idle),
            "awaiting-set" => Ok(InputMode::AwaitingSet),
            _ => anyhow::bail!("Invalid input mode string from DB: {}", value),
        }
    }
}

impl fmt::Display for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputMode::Idle => write!(f, "idle"),
            InputMode::AwaitingSet => write!(f, "awaiting-set"),
        }
    }
}

/// Per-user cursor into the plan. Idle means `current_day` is `None` and both indexes are 0.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Session {
    pub current_day: Option<String>,
    pub exercise_idx: usize,
    pub set_idx: usize,
    pub input_mode: InputMode,
}

impl Session {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.current_day.is_some()
    }

    fn reset(&mut self) {
        *self = Self::idle();
    }
}

/// A validated weight/reps pair ready to be logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetEntry {
    /// Decimal text with '.' as separator.
    pub weight: String,
    pub reps: u32,
}

impl SetEntry {
    pub fn parse(raw_weight: &str, raw_reps: &str) -> Result<Self, Error> {
        let invalid = || Error::InvalidSetFormat(format!("{} {}", raw_weight.trim(), raw_reps.trim()));

        let weight = raw_weight.trim().replace(',', ".");
        match weight.parse::<f64>() {
            Ok(w) if w.is_finite() && w >= 0.0 => {}
            _ => return Err(invalid()),
        }
        let reps = raw_reps.trim().parse::<u32>().map_err(|_| invalid())?;
        Ok(Self { weight, reps })
    }

    /// Parses free text of the form "<weight> <reps>".
    pub fn parse_line(text: &str) -> Result<Self, Error> {
        let parts: Vec<&str> = text.split_whitespace().collect();
        match parts.as_slice() {
            [weight, reps] => Self::parse(weight, reps),
            _ => Err(Error::InvalidSetFormat(text.trim().to_string())),
        }
    }
}

/// Result of completion evaluation after the cursor moved forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The session rests on an exercise with remaining sets.
    Next,
    /// The named day has no sets left; the session is idle again.
    DayComplete(String),
}

/// Cursor position resolved against the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position<'a> {
    pub day: &'a str,
    pub exercise_idx: usize,
    pub set_idx: usize,
    pub exercise: &'a Exercise,
}

/// A set about to be appended to the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSet {
    pub day: String,
    pub exercise: String,
    pub set_number: u32,
    pub total_sets: u32,
    pub entry: SetEntry,
    pub step: Step,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSet {
    pub exercise: String,
    /// Number of set slots consumed on this exercise after the skip.
    pub set_position: usize,
    pub total_sets: u32,
    pub step: Step,
}

/// The most recent log for the current exercise, as seen by `go_back`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastLog {
    pub id: i64,
    pub set_number: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewind {
    /// Moved onto the last set slot of the nearest earlier exercise that has sets.
    PreviousExercise {
        exercise: String,
        set_idx: usize,
        total_sets: u32,
    },
    /// The preceding set was recorded; its log must be deleted.
    Undone {
        log_id: i64,
        exercise: String,
        set_number: u32,
    },
    /// The preceding set was skipped (or there was none); nothing to delete.
    SteppedBack {
        exercise: String,
        set_idx: usize,
        total_sets: u32,
    },
}

/// Returns the plan if it is usable for a workout.
pub fn require_plan(plan: Option<&Plan>) -> Result<&Plan, Error> {
    match plan {
        None => Err(Error::PlanNotFound),
        Some(p) if p.is_empty() => Err(Error::EmptyPlan),
        Some(p) => Ok(p),
    }
}

/// Resolves the cursor. `Ok(None)` means the active day has no exercise at the cursor.
pub fn position<'a>(plan: &'a Plan, session: &Session) -> Result<Option<Position<'a>>, Error> {
    let day = session.current_day.as_deref().ok_or(Error::InactiveSession)?;
    let Some(found) = plan.day(day) else {
        return Ok(None);
    };
    Ok(found
        .exercises
        .get(session.exercise_idx)
        .map(|exercise| Position {
            day: found.name.as_str(),
            exercise_idx: session.exercise_idx,
            set_idx: session.set_idx,
            exercise,
        }))
}

/// Moves past finished exercises (including ones with zero sets) and finalizes the day
/// once the sequence is exhausted.
pub fn settle(plan: &Plan, session: &mut Session) -> Step {
    let Some(day) = session.current_day.clone() else {
        return Step::Next;
    };
    let exercises = plan.exercises(&day).unwrap_or(&[]);

    while let Some(exercise) = exercises.get(session.exercise_idx) {
        if session.set_idx < exercise.sets as usize {
            return Step::Next;
        }
        session.exercise_idx += 1;
        session.set_idx = 0;
    }

    debug!(day = %day, "Day exhausted, returning session to idle");
    session.reset();
    Step::DayComplete(day)
}

pub fn start_day(plan: &Plan, session: &mut Session, day: &str) -> Result<Step, Error> {
    if plan.day(day).is_none() {
        return Err(Error::DayNotFound(day.to_string()));
    }
    *session = Session {
        current_day: Some(day.to_string()),
        ..Session::idle()
    };
    Ok(settle(plan, session))
}

/// Logs the set at the cursor and advances. `Ok(None)` means the day was already concluded
/// and nothing changed.
pub fn record_set(
    plan: &Plan,
    session: &mut Session,
    entry: SetEntry,
) -> Result<Option<RecordedSet>, Error> {
    let Some(pos) = position(plan, session)? else {
        return Ok(None);
    };
    let day = pos.day.to_string();
    let exercise = pos.exercise.name.clone();
    let total_sets = pos.exercise.sets;
    let set_number = u32::try_from(session.set_idx + 1).unwrap_or(u32::MAX);

    session.set_idx += 1;
    session.input_mode = InputMode::Idle;
    let step = settle(plan, session);
    debug!(%day, %exercise, set_number, ?step, "Recorded set");

    Ok(Some(RecordedSet {
        day,
        exercise,
        set_number,
        total_sets,
        entry,
        step,
    }))
}

pub fn skip_set(plan: &Plan, session: &mut Session) -> Result<Option<SkippedSet>, Error> {
    let Some(pos) = position(plan, session)? else {
        return Ok(None);
    };
    let exercise = pos.exercise.name.clone();
    let total_sets = pos.exercise.sets;

    session.set_idx += 1;
    let set_position = session.set_idx;
    let step = settle(plan, session);
    debug!(%exercise, set_position, ?step, "Skipped set");

    Ok(Some(SkippedSet {
        exercise,
        set_position,
        total_sets,
        step,
    }))
}

/// Rewinds the cursor by one slot. `last_log` is the newest log for the current
/// day and exercise. Never completes the day.
pub fn go_back(
    plan: &Plan,
    session: &mut Session,
    last_log: Option<LastLog>,
) -> Result<Option<Rewind>, Error> {
    let Some(pos) = position(plan, session)? else {
        return Ok(None);
    };

    if session.set_idx == 0 && session.exercise_idx > 0 {
        // Zero-set exercises are never a resting place, same as in settle()
        let earlier = plan
            .exercises(pos.day)
            .and_then(|ex| ex.get(..session.exercise_idx))
            .unwrap_or(&[]);
        let previous = earlier
            .iter()
            .enumerate()
            .rev()
            .find(|(_, ex)| ex.sets > 0);

        if let Some((idx, previous)) = previous {
            session.exercise_idx = idx;
            session.set_idx = previous.sets as usize - 1;
            debug!(exercise = %previous.name, set_idx = session.set_idx, "Back to previous exercise");
            return Ok(Some(Rewind::PreviousExercise {
                exercise: previous.name.clone(),
                set_idx: session.set_idx,
                total_sets: previous.sets,
            }));
        }
    }

    let exercise = pos.exercise.name.clone();
    let total_sets = pos.exercise.sets;
    let recorded_previous = last_log.filter(|log| log.set_number as usize == session.set_idx);
    session.set_idx = session.set_idx.saturating_sub(1);

    Ok(Some(match recorded_previous {
        Some(log) => {
            debug!(%exercise, set_number = log.set_number, "Undoing recorded set");
            Rewind::Undone {
                log_id: log.id,
                exercise,
                set_number: log.set_number,
            }
        }
        None => {
            debug!(%exercise, set_idx = session.set_idx, "Stepping back over unrecorded set");
            Rewind::SteppedBack {
                exercise,
                set_idx: session.set_idx,
                total_sets,
            }
        }
    }))
}

/// Returns the session to idle, yielding the day that was active.
pub fn cancel_day(session: &mut Session) -> Result<String, Error> {
    let day = session.current_day.clone().ok_or(Error::InactiveSession)?;
    session.reset();
    Ok(day)
}
