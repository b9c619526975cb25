//src/db.rs
use crate::plan::Plan;
use crate::session::{InputMode, Session};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database connection failed")]
    Connection(#[from] rusqlite::Error),
    #[error("Failed to get application data directory")]
    DataDir,
    #[error("I/O error accessing database file")]
    Io(#[from] std::io::Error),
    #[error("User not found: ID {0}")]
    UserNotFound(i64),
    #[error("Set log entry not found: ID {0}")]
    SetLogNotFound(i64),
    #[error("Failed to encode training plan: {0}")]
    PlanEncoding(#[from] serde_json::Error),
    #[error("Database query failed: {0}")]
    QueryFailed(rusqlite::Error),
    #[error("Database update failed: {0}")]
    UpdateFailed(rusqlite::Error),
    #[error("Database insert failed: {0}")]
    InsertFailed(rusqlite::Error),
    #[error("Database delete failed: {0}")]
    DeleteFailed(rusqlite::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub plan: Option<Plan>,
    pub session: Session,
    pub last_updated: DateTime<Utc>,
}

/// One completed set. Day and exercise are copied names, not references into the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetLog {
    pub id: i64,
    pub user_id: i64,
    pub day: String,
    pub exercise: String,
    pub set_number: u32,
    pub weight: String,
    pub reps: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSetLog<'a> {
    pub user_id: i64,
    pub day: &'a str,
    pub exercise: &'a str,
    pub set_number: u32,
    pub weight: &'a str,
    pub reps: u32,
    pub timestamp: DateTime<Utc>,
}

// Struct to hold filter criteria for list_set_logs
#[derive(Default, Debug)]
pub struct SetLogFilters<'a> {
    pub user_id: i64,
    pub day: Option<&'a str>,
    pub exercise: Option<&'a str>,
}

const DB_FILE_NAME: &str = "workout_plan.sqlite";
const APP_DATA_DIR: &str = "workout-plan-tracker";

/// Gets the path to the SQLite database file within the app's data directory.
/// Exposed at crate root as get_db_path_util
pub fn get_db_path() -> Result<PathBuf, DbError> {
    let data_dir = dirs::data_dir().ok_or(DbError::DataDir)?;
    let app_dir = data_dir.join(APP_DATA_DIR);
    if !app_dir.exists() {
        std::fs::create_dir_all(&app_dir)?;
    }
    Ok(app_dir.join(DB_FILE_NAME))
}

/// Opens a connection to the SQLite database.
pub fn open_db<P: AsRef<Path>>(path: P) -> Result<Connection, DbError> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Connection::open(path).map_err(DbError::Connection)
}

/// Initializes the database tables if they don't exist.
pub fn init_db(conn: &Connection) -> Result<(), DbError> {
    // Needed for the set_logs cascade on user deletion
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(DbError::Connection)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,            -- Transport-assigned user id
            username TEXT,
            training_plan TEXT,                -- JSON blob of ordered days/exercises
            current_day TEXT,
            exercise_idx INTEGER NOT NULL DEFAULT 0,
            set_idx INTEGER NOT NULL DEFAULT 0,
            input_mode TEXT NOT NULL DEFAULT 'idle' CHECK(input_mode IN ('idle', 'awaiting-set')),
            last_updated TEXT NOT NULL
        )",
        [],
    )
    .map_err(DbError::Connection)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS set_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            day TEXT NOT NULL,                 -- Copied names, history survives plan edits
            exercise TEXT NOT NULL,
            set_number INTEGER NOT NULL,
            weight TEXT NOT NULL,
            reps INTEGER NOT NULL,
            timestamp TEXT NOT NULL            -- Fixed-width RFC3339 UTC
        )",
        [],
    )
    .map_err(DbError::Connection)?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_set_logs_user_exercise ON set_logs(user_id, exercise, timestamp)",
        [],
    )
    .map_err(DbError::Connection)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_set_logs_user_day ON set_logs(user_id, day, timestamp)",
        [],
    )
    .map_err(DbError::Connection)?;

    Ok(())
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str, col: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn to_index(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}

// Helper function to map a users row to a User struct
fn map_row_to_user(row: &Row) -> Result<User, rusqlite::Error> {
    let id: i64 = row.get(0)?;
    let username: Option<String> = row.get(1)?;
    let plan_json: Option<String> = row.get(2)?;
    let current_day: Option<String> = row.get(3)?;
    let exercise_idx: i64 = row.get(4)?;
    let set_idx: i64 = row.get(5)?;
    let mode_str: String = row.get(6)?;
    let updated_str: String = row.get(7)?;

    let plan = match plan_json {
        Some(json) => Some(serde_json::from_str::<Plan>(&json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?),
        None => None,
    };

    let input_mode = InputMode::try_from(mode_str.as_str()).unwrap_or_else(|e| {
        warn!(user_id = id, error = %e, "Unknown input mode in DB, treating as idle");
        InputMode::Idle
    });

    Ok(User {
        id,
        username,
        plan,
        session: Session {
            current_day,
            exercise_idx: to_index(exercise_idx),
            set_idx: to_index(set_idx),
            input_mode,
        },
        last_updated: parse_timestamp(&updated_str, 7)?,
    })
}

fn map_row_to_set_log(row: &Row) -> Result<SetLog, rusqlite::Error> {
    let timestamp_str: String = row.get(7)?;
    Ok(SetLog {
        id: row.get(0)?,
        user_id: row.get(1)?,
        day: row.get(2)?,
        exercise: row.get(3)?,
        set_number: row.get(4)?,
        weight: row.get(5)?,
        reps: row.get(6)?,
        timestamp: parse_timestamp(&timestamp_str, 7)?,
    })
}

const USER_COLUMNS: &str =
    "id, username, training_plan, current_day, exercise_idx, set_idx, input_mode, last_updated";
const SET_LOG_COLUMNS: &str = "id, user_id, day, exercise, set_number, weight, reps, timestamp";

/// Retrieves a user by id.
pub fn get_user(conn: &Connection, id: i64) -> Result<Option<User>, DbError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    let mut stmt = conn.prepare(&sql).map_err(DbError::QueryFailed)?;
    stmt.query_row(params![id], map_row_to_user)
        .optional()
        .map_err(DbError::QueryFailed)
}

/// Retrieves a user, creating an idle record without a plan if none exists.
pub fn get_or_create_user(
    conn: &Connection,
    id: i64,
    username: Option<&str>,
) -> Result<User, DbError> {
    if let Some(user) = get_user(conn, id)? {
        if username.is_some() && username != user.username.as_deref() {
            conn.execute(
                "UPDATE users SET username = ?1 WHERE id = ?2",
                params![username, id],
            )
            .map_err(DbError::UpdateFailed)?;
            return get_user(conn, id)?.ok_or(DbError::UserNotFound(id));
        }
        return Ok(user);
    }

    let idle = Session::idle();
    conn.execute(
        "INSERT INTO users (id, username, training_plan, current_day, exercise_idx, set_idx, input_mode, last_updated)
         VALUES (?1, ?2, NULL, NULL, 0, 0, ?3, ?4)",
        params![id, username, idle.input_mode.to_string(), format_timestamp(Utc::now())],
    )
    .map_err(DbError::InsertFailed)?;

    get_user(conn, id)?.ok_or(DbError::UserNotFound(id))
}

/// Stores (or clears, with `None`) the user's plan.
pub fn set_plan(conn: &Connection, user_id: i64, plan: Option<&Plan>) -> Result<(), DbError> {
    let encoded = plan.map(serde_json::to_string).transpose()?;
    let rows = conn
        .execute(
            "UPDATE users SET training_plan = ?1, last_updated = ?2 WHERE id = ?3",
            params![encoded, format_timestamp(Utc::now()), user_id],
        )
        .map_err(DbError::UpdateFailed)?;
    if rows == 0 {
        return Err(DbError::UserNotFound(user_id));
    }
    Ok(())
}

/// Persists the session cursor and input mode.
pub fn save_session(conn: &Connection, user_id: i64, session: &Session) -> Result<(), DbError> {
    let rows = conn
        .execute(
            "UPDATE users SET current_day = ?1, exercise_idx = ?2, set_idx = ?3, input_mode = ?4, last_updated = ?5
             WHERE id = ?6",
            params![
                session.current_day,
                i64::try_from(session.exercise_idx).unwrap_or(i64::MAX),
                i64::try_from(session.set_idx).unwrap_or(i64::MAX),
                session.input_mode.to_string(),
                format_timestamp(Utc::now()),
                user_id
            ],
        )
        .map_err(DbError::UpdateFailed)?;
    if rows == 0 {
        return Err(DbError::UserNotFound(user_id));
    }
    Ok(())
}

/// Appends a set log. Returns the new row id.
pub fn add_set_log(conn: &Connection, log: &NewSetLog) -> Result<i64, DbError> {
    conn.execute(
        "INSERT INTO set_logs (user_id, day, exercise, set_number, weight, reps, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            log.user_id,
            log.day,
            log.exercise,
            log.set_number,
            log.weight,
            log.reps,
            format_timestamp(log.timestamp)
        ],
    )
    .map_err(DbError::InsertFailed)?;

    Ok(conn.last_insert_rowid())
}

/// Deletes a single set log by its ID.
pub fn delete_set_log(conn: &Connection, id: i64) -> Result<(), DbError> {
    let rows = conn
        .execute("DELETE FROM set_logs WHERE id = ?1", params![id])
        .map_err(DbError::DeleteFailed)?;
    if rows == 0 {
        Err(DbError::SetLogNotFound(id))
    } else {
        Ok(())
    }
}

/// Lists set logs oldest first, optionally narrowed to a day and/or exercise.
pub fn list_set_logs(conn: &Connection, filters: &SetLogFilters) -> Result<Vec<SetLog>, DbError> {
    let mut sql = format!("SELECT {SET_LOG_COLUMNS} FROM set_logs WHERE user_id = ?1");
    let mut params_vec: Vec<Box<dyn ToSql>> = vec![Box::new(filters.user_id)];

    if let Some(day) = filters.day {
        sql.push_str(&format!(" AND day = ?{}", params_vec.len() + 1));
        params_vec.push(Box::new(day.to_string()));
    }
    if let Some(exercise) = filters.exercise {
        sql.push_str(&format!(" AND exercise = ?{}", params_vec.len() + 1));
        params_vec.push(Box::new(exercise.to_string()));
    }
    sql.push_str(" ORDER BY timestamp ASC, id ASC");

    let params_slice: Vec<&dyn ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();
    let mut stmt = conn.prepare(&sql).map_err(DbError::QueryFailed)?;
    let log_iter = stmt
        .query_map(params_slice.as_slice(), map_row_to_set_log)
        .map_err(DbError::QueryFailed)?;

    log_iter
        .collect::<Result<Vec<_>, _>>()
        .map_err(DbError::QueryFailed)
}

/// Most recent log for an exercise within a day.
pub fn last_set_log(
    conn: &Connection,
    user_id: i64,
    day: &str,
    exercise: &str,
) -> Result<Option<SetLog>, DbError> {
    let sql = format!(
        "SELECT {SET_LOG_COLUMNS} FROM set_logs
         WHERE user_id = ?1 AND day = ?2 AND exercise = ?3
         ORDER BY timestamp DESC, id DESC LIMIT 1"
    );
    let mut stmt = conn.prepare(&sql).map_err(DbError::QueryFailed)?;
    stmt.query_row(params![user_id, day, exercise], map_row_to_set_log)
        .optional()
        .map_err(DbError::QueryFailed)
}

/// Deletes every set log of a user. Returns the number of rows removed.
pub fn delete_set_logs_for_user(conn: &Connection, user_id: i64) -> Result<usize, DbError> {
    conn.execute("DELETE FROM set_logs WHERE user_id = ?1", params![user_id])
        .map_err(DbError::DeleteFailed)
}

/// Deletes a user; their set logs go with them.
pub fn delete_user(conn: &Connection, user_id: i64) -> Result<(), DbError> {
    let rows = conn
        .execute("DELETE FROM users WHERE id = ?1", params![user_id])
        .map_err(DbError::DeleteFailed)?;
    if rows == 0 {
        Err(DbError::UserNotFound(user_id))
    } else {
        Ok(())
    }
}
