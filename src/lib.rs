use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use thiserror::Error as ThisError;
use tracing::{debug, info};

// --- Declare modules ---
pub mod config;
pub mod db;
pub mod plan;
pub mod progress;
pub mod render;
pub mod session;

// --- Expose public types ---
pub use config::{
    get_config_path as get_config_path_util, load as load_config_util, parse_color,
    save as save_config_util, Config, ConfigError, StandardColor, ThemeConfig, Units,
};
pub use db::{get_db_path as get_db_path_util, DbError, SetLog, SetLogFilters, User};
pub use plan::{parse_plan, Day, Exercise, Plan, Table};
pub use progress::{DateEntry, DayProgress, EmptyReason, ExerciseProgress, ProgressReport};
pub use render::{Action, ErrorKind, Intent, Prompt, Render};
pub use session::{InputMode, Session, SetEntry, Step};

use db::NewSetLog;
use session::{LastLog, Rewind};

/// Failure of a single intent. Everything except `Storage` is a rejection that left
/// the user's state untouched.
#[derive(ThisError, Debug)]
pub enum Error {
    #[error(transparent)]
    Plan(#[from] plan::Error),
    #[error(transparent)]
    Workout(#[from] session::Error),
    #[error(transparent)]
    Storage(#[from] DbError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Plan(plan::Error::MissingColumns(_)) => ErrorKind::MissingColumns,
            Error::Workout(e) => match e {
                session::Error::PlanNotFound | session::Error::EmptyPlan => {
                    ErrorKind::EmptyOrInvalidPlan
                }
                session::Error::DayNotFound(_) => ErrorKind::DayNotFound,
                session::Error::InactiveSession => ErrorKind::InactiveSession,
                session::Error::InvalidSetFormat(_) => ErrorKind::InvalidSetFormat,
            },
            Error::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Storage(DbError::Connection(e))
    }
}

/// Classifies an error returned by [`AppService::dispatch`].
pub fn classify(err: &anyhow::Error) -> ErrorKind {
    match err.downcast_ref::<Error>() {
        Some(e) => e.kind(),
        None => ErrorKind::Storage,
    }
}

/// Returns the plan for an in-workout transition; the session must be active.
fn active_plan<'a>(plan: Option<&'a Plan>, session: &Session) -> Result<&'a Plan, session::Error> {
    if !session.is_active() {
        return Err(session::Error::InactiveSession);
    }
    session::require_plan(plan)
}

/// Builds the prompt for the cursor without changing anything.
fn build_prompt(
    conn: &Connection,
    user_id: i64,
    plan: &Plan,
    session: &Session,
    recap_dates: usize,
) -> Result<Option<Prompt>, Error> {
    let Some(pos) = session::position(plan, session)? else {
        return Ok(None);
    };

    let recap = if pos.set_idx == 0 {
        let logs = db::list_set_logs(
            conn,
            &SetLogFilters {
                user_id,
                day: None,
                exercise: Some(&pos.exercise.name),
            },
        )?;
        progress::build_recap(&logs, recap_dates)
    } else {
        Vec::new()
    };

    let mut actions = Vec::new();
    if pos.set_idx > 0 || pos.exercise_idx > 0 {
        actions.push(Action::Back);
    }
    actions.extend([Action::Skip, Action::ViewCurrentPlan, Action::CancelWorkout]);

    Ok(Some(Prompt {
        exercise_name: pos.exercise.name.clone(),
        set_position: pos.set_idx + 1,
        total_sets: pos.exercise.sets,
        reps: pos.exercise.reps.clone(),
        rest: pos.exercise.rest.clone(),
        recap,
        actions,
    }))
}

/// Prompts for the cursor and starts awaiting set input.
fn issue_prompt(
    conn: &Connection,
    user_id: i64,
    plan: &Plan,
    session: &mut Session,
    recap_dates: usize,
) -> Result<Render, Error> {
    match build_prompt(conn, user_id, plan, session, recap_dates)? {
        Some(prompt) => {
            session.input_mode = InputMode::AwaitingSet;
            Ok(Render::Prompt(prompt))
        }
        None => {
            session.input_mode = InputMode::Idle;
            Ok(Render::DayConcluded)
        }
    }
}

/// What follows a forward move: the next prompt, or the completion notice.
fn follow_up(
    conn: &Connection,
    user_id: i64,
    plan: &Plan,
    session: &mut Session,
    step: Step,
    recap_dates: usize,
) -> Result<Render, Error> {
    match step {
        Step::Next => issue_prompt(conn, user_id, plan, session, recap_dates),
        Step::DayComplete(day) => {
            info!(user_id, %day, "Training day completed");
            Ok(Render::DayComplete { day })
        }
    }
}

pub struct AppService {
    pub config: Config,
    pub conn: Connection,
    pub db_path: PathBuf,
    pub config_path: PathBuf,
}

impl AppService {
    /// Initializes the application service.
    /// # Errors
    /// Returns `anyhow::Error` if config/db path determination, loading, or initialization fails.
    pub fn initialize() -> Result<Self> {
        let config_path =
            config::get_config_path().context("Failed to determine configuration file path")?;
        let config = config::load(&config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"))?;

        let db_path = match &config.database_path {
            Some(path) => path.clone(),
            None => db::get_db_path().context("Failed to determine database path")?,
        };
        let conn = db::open_db(&db_path)
            .with_context(|| format!("Failed to open database at {db_path:?}"))?;
        db::init_db(&conn).context("Failed to initialize database schema")?;

        debug!(?config_path, ?db_path, "Service initialized");
        Ok(Self {
            config,
            conn,
            db_path,
            config_path,
        })
    }

    pub fn get_config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    /// Handles one intent. Rejected intents come back as a single `Render::Error`;
    /// storage failures are returned as `Err`.
    pub fn dispatch(&mut self, user_id: i64, intent: Intent) -> Result<Vec<Render>> {
        let result = match intent {
            Intent::Start { username } => self.start(user_id, username.as_deref()),
            Intent::ImportPrompt => Ok(vec![Render::import_instructions()]),
            Intent::ImportPlan(table) => self.import_plan(user_id, &table),
            Intent::ChooseDay => self.choose_day(user_id),
            Intent::DismissDaySelection => Ok(vec![Render::SelectionDismissed]),
            Intent::StartDay(day) => self.start_day(user_id, &day),
            Intent::RecordSet { weight, reps } => self.record_set(user_id, &weight, &reps),
            Intent::FreeText(text) => self.capture_text(user_id, &text),
            Intent::SkipSet => self.skip_set(user_id),
            Intent::GoBack => self.go_back(user_id),
            Intent::Resume => self.resume(user_id),
            Intent::ViewCurrentDay => self.view_current_day(user_id),
            Intent::ProposeCancel => self.propose_cancel(user_id),
            Intent::ResumeWorkout => self.resume_workout(user_id),
            Intent::CancelDay => self.cancel_day(user_id),
            Intent::ProposeReset => Ok(vec![Render::ResetConfirmation {
                actions: vec![Action::ConfirmReset, Action::AbortReset],
            }]),
            Intent::AbortReset => Ok(vec![Render::ResetAborted]),
            Intent::ResetAll => self.reset_all(user_id),
            Intent::GetPlanView => self.plan_view(user_id),
            Intent::GetProgressView => self.progress_view(user_id),
        };

        match result {
            Ok(renders) => Ok(renders),
            Err(Error::Storage(e)) => Err(Error::Storage(e).into()),
            Err(rejection) => {
                debug!(user_id, error = %rejection, "Intent rejected");
                Ok(vec![Render::Error {
                    kind: rejection.kind(),
                    detail: rejection.to_string(),
                }])
            }
        }
    }

    /// Ensures the user exists and returns the home menu.
    pub fn start(&mut self, user_id: i64, username: Option<&str>) -> Result<Vec<Render>, Error> {
        db::get_or_create_user(&self.conn, user_id, username)?;
        Ok(vec![Render::menu()])
    }

    /// Replaces the user's plan and resets their session. Existing set logs are kept.
    pub fn import_plan(&mut self, user_id: i64, table: &Table) -> Result<Vec<Render>, Error> {
        let plan = plan::parse_plan(table)?;

        let tx = self.conn.transaction()?;
        db::get_or_create_user(&tx, user_id, None)?;
        db::set_plan(&tx, user_id, Some(&plan))?;
        db::save_session(&tx, user_id, &Session::idle())?;
        tx.commit()?;

        info!(
            user_id,
            days = plan.days.len(),
            exercises = plan.total_exercises(),
            "Imported training plan"
        );
        Ok(vec![Render::PlanImported {
            days: plan.day_names(),
            total_exercises: plan.total_exercises(),
            actions: vec![Action::StartWorkout, Action::ViewPlan, Action::ViewProgress],
        }])
    }

    /// Lists the plan's days to pick from.
    pub fn choose_day(&mut self, user_id: i64) -> Result<Vec<Render>, Error> {
        let user = db::get_or_create_user(&self.conn, user_id, None)?;
        let plan = session::require_plan(user.plan.as_ref())?;
        Ok(vec![Render::DaySelection {
            days: plan.day_names(),
            actions: vec![Action::DismissDaySelection],
        }])
    }

    pub fn start_day(&mut self, user_id: i64, day: &str) -> Result<Vec<Render>, Error> {
        let recap_dates = self.config.recap_dates;
        let tx = self.conn.transaction()?;
        let mut user = db::get_or_create_user(&tx, user_id, None)?;
        let plan = session::require_plan(user.plan.as_ref())?;

        let step = session::start_day(plan, &mut user.session, day)?;
        info!(user_id, %day, "Training day started");
        let next = follow_up(&tx, user_id, plan, &mut user.session, step, recap_dates)?;

        db::save_session(&tx, user_id, &user.session)?;
        tx.commit()?;
        Ok(vec![
            Render::DayStarted {
                day: day.to_string(),
            },
            next,
        ])
    }

    /// Records a set from raw weight/reps text.
    pub fn record_set(
        &mut self,
        user_id: i64,
        raw_weight: &str,
        raw_reps: &str,
    ) -> Result<Vec<Render>, Error> {
        let entry = SetEntry::parse(raw_weight, raw_reps)?;
        self.apply_set(user_id, entry)
    }

    /// Treats free text as a "<weight> <reps>" entry if a set is being awaited;
    /// otherwise the text is ignored.
    pub fn capture_text(&mut self, user_id: i64, text: &str) -> Result<Vec<Render>, Error> {
        let awaiting = db::get_user(&self.conn, user_id)?
            .is_some_and(|u| u.session.input_mode == InputMode::AwaitingSet);
        if !awaiting {
            debug!(user_id, "Ignoring free text, no set awaited");
            return Ok(Vec::new());
        }
        let entry = SetEntry::parse_line(text)?;
        self.apply_set(user_id, entry)
    }

    fn apply_set(&mut self, user_id: i64, entry: SetEntry) -> Result<Vec<Render>, Error> {
        let recap_dates = self.config.recap_dates;
        let tx = self.conn.transaction()?;
        let mut user = db::get_or_create_user(&tx, user_id, None)?;
        let plan = active_plan(user.plan.as_ref(), &user.session)?;

        let Some(recorded) = session::record_set(plan, &mut user.session, entry)? else {
            return Ok(vec![Render::DayConcluded]);
        };

        db::add_set_log(
            &tx,
            &NewSetLog {
                user_id,
                day: &recorded.day,
                exercise: &recorded.exercise,
                set_number: recorded.set_number,
                weight: &recorded.entry.weight,
                reps: recorded.entry.reps,
                timestamp: Utc::now(),
            },
        )?;

        let next = follow_up(
            &tx,
            user_id,
            plan,
            &mut user.session,
            recorded.step,
            recap_dates,
        )?;
        db::save_session(&tx, user_id, &user.session)?;
        tx.commit()?;

        Ok(vec![
            Render::SetRecorded {
                exercise: recorded.exercise,
                set_number: recorded.set_number,
                total_sets: recorded.total_sets,
                weight: recorded.entry.weight,
                reps: recorded.entry.reps,
            },
            next,
        ])
    }

    /// Moves past the current set without logging it.
    pub fn skip_set(&mut self, user_id: i64) -> Result<Vec<Render>, Error> {
        let recap_dates = self.config.recap_dates;
        let tx = self.conn.transaction()?;
        let mut user = db::get_or_create_user(&tx, user_id, None)?;
        let plan = active_plan(user.plan.as_ref(), &user.session)?;

        let Some(skipped) = session::skip_set(plan, &mut user.session)? else {
            return Ok(vec![Render::DayConcluded]);
        };

        let mut renders = Vec::new();
        if skipped.set_position < skipped.total_sets as usize {
            renders.push(Render::SetSkipped {
                exercise: skipped.exercise,
                set_position: skipped.set_position,
                total_sets: skipped.total_sets,
            });
        }
        renders.push(follow_up(
            &tx,
            user_id,
            plan,
            &mut user.session,
            skipped.step,
            recap_dates,
        )?);

        db::save_session(&tx, user_id, &user.session)?;
        tx.commit()?;
        Ok(renders)
    }

    /// Rewinds one set slot, deleting the preceding log if that set was recorded.
    pub fn go_back(&mut self, user_id: i64) -> Result<Vec<Render>, Error> {
        let recap_dates = self.config.recap_dates;
        let tx = self.conn.transaction()?;
        let mut user = db::get_or_create_user(&tx, user_id, None)?;
        let plan = active_plan(user.plan.as_ref(), &user.session)?;

        let last_log = match session::position(plan, &user.session)? {
            Some(pos) => db::last_set_log(&tx, user_id, pos.day, &pos.exercise.name)?
                .map(|log| LastLog {
                    id: log.id,
                    set_number: log.set_number,
                }),
            None => None,
        };

        let Some(rewind) = session::go_back(plan, &mut user.session, last_log)? else {
            return Ok(vec![Render::DayConcluded]);
        };

        let ack = match rewind {
            Rewind::PreviousExercise {
                exercise,
                set_idx,
                total_sets,
            } => Render::PreviousExercise {
                exercise,
                set_position: set_idx + 1,
                total_sets,
            },
            Rewind::Undone {
                log_id,
                exercise,
                set_number,
            } => {
                db::delete_set_log(&tx, log_id)?;
                Render::SetUndone {
                    exercise,
                    set_number,
                }
            }
            Rewind::SteppedBack {
                exercise,
                set_idx,
                total_sets,
            } => Render::SteppedBack {
                exercise,
                set_position: set_idx + 1,
                total_sets,
            },
        };

        let next = issue_prompt(&tx, user_id, plan, &mut user.session, recap_dates)?;
        db::save_session(&tx, user_id, &user.session)?;
        tx.commit()?;
        Ok(vec![ack, next])
    }

    /// Re-issues the prompt for the persisted cursor.
    pub fn resume(&mut self, user_id: i64) -> Result<Vec<Render>, Error> {
        let recap_dates = self.config.recap_dates;
        let tx = self.conn.transaction()?;
        let mut user = db::get_or_create_user(&tx, user_id, None)?;
        let plan = active_plan(user.plan.as_ref(), &user.session)?;

        let next = issue_prompt(&tx, user_id, plan, &mut user.session, recap_dates)?;
        db::save_session(&tx, user_id, &user.session)?;
        tx.commit()?;
        Ok(vec![next])
    }

    /// Read-only view of the prompt at the user's cursor, `None` when nothing is left.
    pub fn next_prompt(&self, user_id: i64) -> Result<Option<Prompt>, Error> {
        let user = db::get_user(&self.conn, user_id)?.ok_or(session::Error::InactiveSession)?;
        let plan = active_plan(user.plan.as_ref(), &user.session)?;
        build_prompt(
            &self.conn,
            user_id,
            plan,
            &user.session,
            self.config.recap_dates,
        )
    }

    /// The active day's exercises with the current one marked.
    pub fn view_current_day(&mut self, user_id: i64) -> Result<Vec<Render>, Error> {
        let user = db::get_or_create_user(&self.conn, user_id, None)?;
        let plan = active_plan(user.plan.as_ref(), &user.session)?;
        let day_name = user
            .session
            .current_day
            .as_deref()
            .ok_or(session::Error::InactiveSession)?;
        let day = plan
            .day(day_name)
            .ok_or_else(|| session::Error::DayNotFound(day_name.to_string()))?;

        Ok(vec![Render::DayPlanView {
            day: day.name.clone(),
            exercises: day.exercises.clone(),
            current: user.session.exercise_idx,
        }])
    }

    pub fn propose_cancel(&mut self, user_id: i64) -> Result<Vec<Render>, Error> {
        let user = db::get_or_create_user(&self.conn, user_id, None)?;
        let day = user
            .session
            .current_day
            .ok_or(session::Error::InactiveSession)?;
        Ok(vec![Render::CancelConfirmation {
            day,
            actions: vec![Action::ConfirmCancel, Action::ResumeWorkout],
        }])
    }

    /// Declines a proposed cancellation and prompts again.
    pub fn resume_workout(&mut self, user_id: i64) -> Result<Vec<Render>, Error> {
        let mut renders = vec![Render::WorkoutResumed];
        renders.extend(self.resume(user_id)?);
        Ok(renders)
    }

    /// Abandons the active day. Logged sets are kept.
    pub fn cancel_day(&mut self, user_id: i64) -> Result<Vec<Render>, Error> {
        let tx = self.conn.transaction()?;
        let mut user = db::get_or_create_user(&tx, user_id, None)?;
        let day = session::cancel_day(&mut user.session)?;
        db::save_session(&tx, user_id, &user.session)?;
        tx.commit()?;

        info!(user_id, %day, "Training day cancelled");
        Ok(vec![Render::DayCancelled { day }])
    }

    /// Deletes all of the user's set logs and their plan, and idles the session.
    pub fn reset_all(&mut self, user_id: i64) -> Result<Vec<Render>, Error> {
        let tx = self.conn.transaction()?;
        db::get_or_create_user(&tx, user_id, None)?;
        let removed = db::delete_set_logs_for_user(&tx, user_id)?;
        db::set_plan(&tx, user_id, None)?;
        db::save_session(&tx, user_id, &Session::idle())?;
        tx.commit()?;

        info!(user_id, removed, "Reset plan and progress");
        Ok(vec![Render::ResetDone])
    }

    pub fn plan_view(&mut self, user_id: i64) -> Result<Vec<Render>, Error> {
        let user = db::get_or_create_user(&self.conn, user_id, None)?;
        let plan = session::require_plan(user.plan.as_ref())?;
        Ok(vec![Render::PlanView {
            days: plan.days.clone(),
        }])
    }

    pub fn progress_view(&mut self, user_id: i64) -> Result<Vec<Render>, Error> {
        let user = db::get_or_create_user(&self.conn, user_id, None)?;
        let logs = db::list_set_logs(
            &self.conn,
            &SetLogFilters {
                user_id,
                ..Default::default()
            },
        )?;
        Ok(vec![Render::ProgressView {
            report: progress::build_progress_report(user.plan.as_ref(), &logs),
        }])
    }

    /// Removes the user together with all of their set logs.
    pub fn delete_user(&mut self, user_id: i64) -> Result<(), Error> {
        db::delete_user(&self.conn, user_id)?;
        info!(user_id, "Deleted user and their history");
        Ok(())
    }
}
