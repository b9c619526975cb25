//src/render.rs
use crate::plan::{Exercise, Table, REQUIRED_COLUMNS};
use crate::progress::{DateEntry, ProgressReport};
use serde::Serialize;
use std::str::FromStr;
use strum_macros::{AsRefStr, EnumIter, EnumString};

const DAY_BUTTON_PREFIX: &str = "day:";

/// Buttons attached to a rendered message. The string form is the callback identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, AsRefStr, EnumString, EnumIter)]
pub enum Action {
    #[strum(serialize = "import:prompt")]
    ImportPrompt,
    #[strum(serialize = "workout:start")]
    StartWorkout,
    #[strum(serialize = "view_plan")]
    ViewPlan,
    #[strum(serialize = "view_progress")]
    ViewProgress,
    #[strum(serialize = "reset:confirm")]
    ProposeReset,
    #[strum(serialize = "reset:execute")]
    ConfirmReset,
    #[strum(serialize = "reset:cancel")]
    AbortReset,
    #[strum(serialize = "back:set")]
    Back,
    #[strum(serialize = "skip:set")]
    Skip,
    #[strum(serialize = "view_plan_current")]
    ViewCurrentPlan,
    #[strum(serialize = "cancel_workout")]
    CancelWorkout,
    #[strum(serialize = "cancel_workout_confirm")]
    ConfirmCancel,
    #[strum(serialize = "cancel_workout_cancel")]
    ResumeWorkout,
    #[strum(serialize = "workout_cancel")]
    DismissDaySelection,
}

impl Action {
    pub fn label(self) -> &'static str {
        match self {
            Action::ImportPrompt => "Import plan",
            Action::StartWorkout => "Start workout",
            Action::ViewPlan => "View plan",
            Action::ViewProgress => "Progress",
            Action::ProposeReset => "Reset",
            Action::ConfirmReset => "Confirm reset",
            Action::AbortReset => "Cancel",
            Action::Back => "Back",
            Action::Skip => "Skip set",
            Action::ViewCurrentPlan => "View plan",
            Action::CancelWorkout => "Cancel workout",
            Action::ConfirmCancel => "Confirm cancellation",
            Action::ResumeWorkout => "Continue workout",
            Action::DismissDaySelection => "Cancel",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingColumns,
    EmptyOrInvalidPlan,
    DayNotFound,
    InactiveSession,
    InvalidSetFormat,
    Storage,
}

/// Prompt for the next set at the cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    pub exercise_name: String,
    /// 1-based.
    pub set_position: usize,
    pub total_sets: u32,
    pub reps: String,
    pub rest: String,
    /// Only filled on the first set of an exercise; newest date first.
    pub recap: Vec<DateEntry>,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Render {
    Menu {
        actions: Vec<Action>,
    },
    ImportInstructions {
        columns: Vec<String>,
    },
    PlanImported {
        days: Vec<String>,
        total_exercises: usize,
        actions: Vec<Action>,
    },
    DaySelection {
        days: Vec<String>,
        actions: Vec<Action>,
    },
    SelectionDismissed,
    DayStarted {
        day: String,
    },
    Prompt(Prompt),
    SetRecorded {
        exercise: String,
        set_number: u32,
        total_sets: u32,
        weight: String,
        reps: u32,
    },
    SetSkipped {
        exercise: String,
        set_position: usize,
        total_sets: u32,
    },
    SetUndone {
        exercise: String,
        set_number: u32,
    },
    SteppedBack {
        exercise: String,
        set_position: usize,
        total_sets: u32,
    },
    PreviousExercise {
        exercise: String,
        set_position: usize,
        total_sets: u32,
    },
    /// The cursor is past the last exercise; nothing was changed.
    DayConcluded,
    DayComplete {
        day: String,
    },
    CancelConfirmation {
        day: String,
        actions: Vec<Action>,
    },
    WorkoutResumed,
    DayCancelled {
        day: String,
    },
    ResetConfirmation {
        actions: Vec<Action>,
    },
    ResetAborted,
    ResetDone,
    PlanView {
        days: Vec<crate::plan::Day>,
    },
    DayPlanView {
        day: String,
        exercises: Vec<Exercise>,
        current: usize,
    },
    ProgressView {
        report: ProgressReport,
    },
    Error {
        kind: ErrorKind,
        detail: String,
    },
}

impl Render {
    pub fn menu() -> Self {
        Render::Menu {
            actions: vec![
                Action::ImportPrompt,
                Action::StartWorkout,
                Action::ViewPlan,
                Action::ViewProgress,
                Action::ProposeReset,
            ],
        }
    }

    pub fn import_instructions() -> Self {
        Render::ImportInstructions {
            columns: REQUIRED_COLUMNS.iter().map(|c| (*c).to_string()).collect(),
        }
    }
}

/// An already-parsed request from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Start { username: Option<String> },
    ImportPrompt,
    ImportPlan(Table),
    ChooseDay,
    DismissDaySelection,
    StartDay(String),
    RecordSet { weight: String, reps: String },
    /// Text typed by the user; captured as a set only while a set is awaited.
    FreeText(String),
    SkipSet,
    GoBack,
    Resume,
    ViewCurrentDay,
    ProposeCancel,
    ResumeWorkout,
    CancelDay,
    ProposeReset,
    AbortReset,
    ResetAll,
    GetPlanView,
    GetProgressView,
}

impl From<Action> for Intent {
    fn from(action: Action) -> Self {
        match action {
            Action::ImportPrompt => Intent::ImportPrompt,
            Action::StartWorkout => Intent::ChooseDay,
            Action::ViewPlan => Intent::GetPlanView,
            Action::ViewProgress => Intent::GetProgressView,
            Action::ProposeReset => Intent::ProposeReset,
            Action::ConfirmReset => Intent::ResetAll,
            Action::AbortReset => Intent::AbortReset,
            Action::Back => Intent::GoBack,
            Action::Skip => Intent::SkipSet,
            Action::ViewCurrentPlan => Intent::ViewCurrentDay,
            Action::CancelWorkout => Intent::ProposeCancel,
            Action::ConfirmCancel => Intent::CancelDay,
            Action::ResumeWorkout => Intent::ResumeWorkout,
            Action::DismissDaySelection => Intent::DismissDaySelection,
        }
    }
}

/// Callback identifier for a day selection button.
pub fn day_button(day: &str) -> String {
    format!("{DAY_BUTTON_PREFIX}{day}")
}

impl Intent {
    /// Maps a button identifier back to an intent. Unknown identifiers yield `None`.
    pub fn from_button(id: &str) -> Option<Self> {
        if let Some(day) = id.strip_prefix(DAY_BUTTON_PREFIX) {
            return Some(Intent::StartDay(day.to_string()));
        }
        Action::from_str(id).ok().map(Intent::from)
    }
}
