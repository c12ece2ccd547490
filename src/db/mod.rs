use crate::clock::{Clock, SystemClock};
use crate::errors::{AppError, AppResult};
use crate::models::{Goal, Profile, RoadmapDocument, RoadmapRecord};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

const SCHEMA_SQL: &str = include_str!("schema.sql");

const PROFILE_SEQUENCE: &str = "profiles";
const GOAL_SEQUENCE: &str = "goals";
const ROADMAP_SEQUENCE: &str = "roadmaps";

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
    db_path: Option<PathBuf>,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        Self::with_clock(path, Arc::new(SystemClock))
    }

    pub fn with_clock(path: &Path, clock: Arc<dyn Clock>) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        let journal_mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        tracing::debug!(path = %path.display(), journal_mode = %journal_mode, "opened sqlite database");

        Self::initialize(conn, clock, Some(path.to_path_buf()))
    }

    pub fn open_in_memory(clock: Arc<dyn Clock>) -> AppResult<Self> {
        let conn = Connection::open_in_memory().map_err(AppError::from)?;
        Self::initialize(conn, clock, None)
    }

    fn initialize(conn: Connection, clock: Arc<dyn Clock>, db_path: Option<PathBuf>) -> AppResult<Self> {
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock,
            db_path,
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn insert_profile(&self, name: &str) -> AppResult<Profile> {
        let created_at = self.now();

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let id = allocate_id(&tx, PROFILE_SEQUENCE)?;
        tx.execute(
            "INSERT INTO profiles (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![id, name, format_time(created_at)],
        )?;
        tx.commit()?;

        Ok(Profile {
            id,
            name: name.to_string(),
            created_at,
        })
    }

    pub fn get_profile_by_id(&self, profile_id: i64) -> AppResult<Option<Profile>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, name, created_at FROM profiles WHERE id = ?1",
            [profile_id],
            |row| {
                Ok(Profile {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: parse_time(&row.get::<_, String>(2)?)?,
                })
            },
        )
        .optional()
        .map_err(AppError::from)
    }

    /// Inserts a goal after confirming the owning profile exists. The check
    /// and the insert share one transaction.
    pub fn insert_goal(&self, profile_id: i64, goal_text: &str) -> AppResult<Goal> {
        let created_at = self.now();

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        if !profile_exists(&tx, profile_id)? {
            return Err(AppError::NotFound("profile not found".to_string()));
        }
        let id = allocate_id(&tx, GOAL_SEQUENCE)?;
        tx.execute(
            "INSERT INTO goals (id, profile_id, goal_text, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, profile_id, goal_text, format_time(created_at)],
        )?;
        tx.commit()?;

        Ok(Goal {
            id,
            profile_id,
            goal_text: goal_text.to_string(),
            created_at,
        })
    }

    /// Stores a roadmap for the profile, linking it to the profile's most
    /// recent goal when one exists.
    pub fn insert_roadmap(&self, profile_id: i64, document: &RoadmapDocument) -> AppResult<RoadmapRecord> {
        let created_at = self.now();
        let body = serde_json::to_string(document)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        if !profile_exists(&tx, profile_id)? {
            return Err(AppError::NotFound("profile not found".to_string()));
        }
        let goal_id: Option<i64> = tx
            .query_row(
                "SELECT id FROM goals WHERE profile_id = ?1 ORDER BY created_at DESC, id DESC LIMIT 1",
                [profile_id],
                |row| row.get(0),
            )
            .optional()?;
        let id = allocate_id(&tx, ROADMAP_SEQUENCE)?;
        tx.execute(
            "INSERT INTO roadmaps (id, profile_id, goal_id, json, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, profile_id, goal_id, body, format_time(created_at)],
        )?;
        tx.commit()?;

        Ok(RoadmapRecord {
            id,
            profile_id,
            goal_id,
            document: document.clone(),
            created_at,
        })
    }

    pub fn latest_roadmap_for_profile(&self, profile_id: i64) -> AppResult<Option<RoadmapRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, profile_id, goal_id, json, created_at
             FROM roadmaps
             WHERE profile_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
            [profile_id],
            parse_roadmap_row,
        )
        .optional()
        .map_err(AppError::from)
    }

    #[cfg(test)]
    fn row_count(&self, table: &str) -> AppResult<i64> {
        let conn = self.lock()?;
        let count = conn.query_row(&format!("SELECT COUNT(1) FROM {table}"), [], |row| row.get(0))?;
        Ok(count)
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }

    // Stored timestamps keep microsecond precision, so returned records are
    // truncated to match what a later read would see.
    fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(6)
    }
}

fn allocate_id(conn: &Connection, sequence: &str) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO id_sequences (name, value) VALUES (?1, 1)
         ON CONFLICT(name) DO UPDATE SET value = value + 1",
        [sequence],
    )?;
    let id = conn.query_row(
        "SELECT value FROM id_sequences WHERE name = ?1",
        [sequence],
        |row| row.get(0),
    )?;
    Ok(id)
}

fn profile_exists(conn: &Connection, profile_id: i64) -> AppResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(1) FROM profiles WHERE id = ?1",
        [profile_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn parse_roadmap_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RoadmapRecord> {
    let body: String = row.get(3)?;
    let document = serde_json::from_str::<RoadmapDocument>(&body).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(error))
    })?;

    Ok(RoadmapRecord {
        id: row.get(0)?,
        profile_id: row.get(1)?,
        goal_id: row.get(2)?,
        document,
        created_at: parse_time(&row.get::<_, String>(4)?)?,
    })
}

// Fixed-width UTC text keeps lexical order equal to chronological order.
fn format_time(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string())),
            )
        })
}
