//! SQLite store with Diesel ORM
//!
//! Holds the team, developer, membership, and commit tables plus the
//! find-or-create sequence used by ingestion. Range queries hand the
//! aggregation engine an already joined, normalized record shape so it never
//! has to branch on missing data.

use crate::model::{CommitRecord, CommitType, DateRange, Evaluation};
use crate::schema::*;
use chrono::Local;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sqlite::SqliteConnection;
use std::path::Path;

/// Walk up the directory tree to find a .devpulse folder (like git finds
/// .git). Can be overridden with the DEVPULSE_DB_PATH env var.
fn get_db_path() -> std::path::PathBuf {
    // Env var always takes priority
    if let Ok(path) = std::env::var("DEVPULSE_DB_PATH") {
        return std::path::PathBuf::from(path);
    }

    if let Ok(current_dir) = std::env::current_dir() {
        let mut dir = current_dir.as_path();
        loop {
            let devpulse_dir = dir.join(".devpulse");
            if devpulse_dir.exists() && devpulse_dir.is_dir() {
                return devpulse_dir.join("devpulse.db");
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
    }

    // No .devpulse found - default to current directory
    // (devpulse init will create it here)
    std::path::PathBuf::from(".devpulse/devpulse.db")
}

// ============================================================================
// Diesel Models
// ============================================================================

/// Insertable team
#[derive(Insertable)]
#[diesel(table_name = teams)]
pub struct NewTeam<'a> {
    pub name: &'a str,
    pub created_at: &'a str,
}

/// Queryable team
#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = teams)]
pub struct Team {
    pub id: i32,
    pub name: String,
    pub created_at: String,
}

/// Insertable developer
#[derive(Insertable)]
#[diesel(table_name = developers)]
pub struct NewDeveloper<'a> {
    pub name: &'a str,
    pub email: Option<&'a str>,
    pub team_id: Option<i32>,
    pub created_at: &'a str,
}

/// Queryable developer. `team_id` is the default/primary team; commits may
/// be made under any team.
#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = developers)]
pub struct Developer {
    pub id: i32,
    pub name: String,
    pub email: Option<String>,
    pub team_id: Option<i32>,
    pub created_at: String,
}

/// Insertable developer-team membership link
#[derive(Insertable)]
#[diesel(table_name = developer_teams)]
pub struct NewDeveloperTeam<'a> {
    pub developer_id: i32,
    pub team_id: i32,
    pub created_at: &'a str,
}

/// Queryable developer-team membership link
#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = developer_teams)]
pub struct DeveloperTeam {
    pub developer_id: i32,
    pub team_id: i32,
    pub created_at: String,
}

/// Insertable commit. Evaluation totals and productivity are stored exactly
/// as submitted, never recomputed here.
#[derive(Insertable)]
#[diesel(table_name = commits)]
pub struct NewCommit<'a> {
    pub commit_id: &'a str,
    pub message: &'a str,
    pub developer_id: Option<i32>,
    pub team_id: Option<i32>,
    pub commit_type: Option<&'a str>,
    pub evaluation_total: Option<f64>,
    pub evaluation_complexity: Option<f64>,
    pub evaluation_volume: Option<f64>,
    pub evaluation_thinking: Option<f64>,
    pub evaluation_others: Option<f64>,
    pub comment: Option<&'a str>,
    pub lines_added: i32,
    pub lines_deleted: i32,
    pub work_hours: Option<f64>,
    pub ai_driven_minutes: Option<i32>,
    pub productivity: Option<f64>,
    pub agent_hash: Option<&'a str>,
    pub created_at: &'a str,
}

/// Queryable commit row, as stored
#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = commits)]
pub struct Commit {
    pub id: i32,
    pub commit_id: String,
    pub message: String,
    pub developer_id: Option<i32>,
    pub team_id: Option<i32>,
    pub commit_type: Option<String>,
    pub evaluation_total: Option<f64>,
    pub evaluation_complexity: Option<f64>,
    pub evaluation_volume: Option<f64>,
    pub evaluation_thinking: Option<f64>,
    pub evaluation_others: Option<f64>,
    pub comment: Option<String>,
    pub lines_added: i32,
    pub lines_deleted: i32,
    pub work_hours: Option<f64>,
    pub ai_driven_minutes: Option<i32>,
    pub productivity: Option<f64>,
    pub agent_hash: Option<String>,
    pub created_at: String,
}

// ============================================================================
// Database Connection
// ============================================================================

type DbPool = Pool<ConnectionManager<SqliteConnection>>;
type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Database connection wrapper with connection pool
pub struct Database {
    pool: DbPool,
}

/// Error type for database operations
#[derive(Debug)]
pub enum DbError {
    Connection(String),
    Query(diesel::result::Error),
    Pool(diesel::r2d2::Error),
    Validation(String),
    /// Unique constraint violation, e.g. inserting the same commit_id twice.
    Duplicate(String),
}

impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbError::Connection(msg) => write!(f, "Connection error: {}", msg),
            DbError::Query(e) => write!(f, "Query error: {}", e),
            DbError::Pool(e) => write!(f, "Pool error: {}", e),
            DbError::Validation(msg) => write!(f, "{}", msg),
            DbError::Duplicate(msg) => write!(f, "Duplicate: {}", msg),
        }
    }
}

impl std::error::Error for DbError {}

impl From<diesel::result::Error> for DbError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                DbError::Duplicate(info.message().to_string())
            }
            other => DbError::Query(other),
        }
    }
}

impl From<diesel::r2d2::Error> for DbError {
    fn from(e: diesel::r2d2::Error) -> Self {
        DbError::Pool(e)
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

impl Database {
    /// Get the database path that will be used
    pub fn db_path() -> std::path::PathBuf {
        get_db_path()
    }

    /// Create a new database at a custom path
    pub fn new(path: &str) -> Result<Self> {
        Self::open_at(path)
    }

    /// Open database at default path (respects DEVPULSE_DB_PATH env var)
    pub fn open() -> Result<Self> {
        let path = get_db_path();
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).ok();
            }
        }
        Self::open_at(&path)
    }

    /// Open database at specified path
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let manager = ConnectionManager::<SqliteConnection>::new(&path_str);
        let pool = Pool::builder()
            .max_size(5)
            .build(manager)
            .map_err(|e| DbError::Connection(e.to_string()))?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    fn get_conn(&self) -> Result<DbConn> {
        self.pool
            .get()
            .map_err(|e| DbError::Connection(e.to_string()))
    }

    fn init_schema(&self) -> Result<()> {
        let mut conn = self.get_conn()?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS teams (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                name TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            )
        "#,
        )
        .execute(&mut conn)?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS developers (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                name TEXT NOT NULL,
                email TEXT,
                team_id INTEGER,
                created_at TEXT NOT NULL,
                FOREIGN KEY (team_id) REFERENCES teams(id)
            )
        "#,
        )
        .execute(&mut conn)?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS developer_teams (
                developer_id INTEGER NOT NULL,
                team_id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (developer_id, team_id),
                FOREIGN KEY (developer_id) REFERENCES developers(id),
                FOREIGN KEY (team_id) REFERENCES teams(id)
            )
        "#,
        )
        .execute(&mut conn)?;

        diesel::sql_query(
            r#"
            CREATE TABLE IF NOT EXISTS commits (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                commit_id TEXT NOT NULL UNIQUE,
                message TEXT NOT NULL,
                developer_id INTEGER,
                team_id INTEGER,
                commit_type TEXT,
                evaluation_total REAL,
                evaluation_complexity REAL,
                evaluation_volume REAL,
                evaluation_thinking REAL,
                evaluation_others REAL,
                comment TEXT,
                lines_added INTEGER NOT NULL DEFAULT 0,
                lines_deleted INTEGER NOT NULL DEFAULT 0,
                work_hours REAL,
                ai_driven_minutes INTEGER,
                productivity REAL,
                agent_hash TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (developer_id) REFERENCES developers(id),
                FOREIGN KEY (team_id) REFERENCES teams(id)
            )
        "#,
        )
        .execute(&mut conn)?;

        // Create indexes
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_commits_developer ON commits(developer_id)")
            .execute(&mut conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_commits_team ON commits(team_id)")
            .execute(&mut conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_commits_created_at ON commits(created_at)")
            .execute(&mut conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_commits_agent_hash ON commits(agent_hash)")
            .execute(&mut conn)?;

        Ok(())
    }

    // ========================================================================
    // Find-or-create Operations (ingestion)
    // ========================================================================

    /// Find a team by exact name, creating it on first sighting.
    pub fn find_or_create_team(&self, team_name: &str) -> Result<Team> {
        let mut conn = self.get_conn()?;

        if let Some(existing) = teams::table
            .filter(teams::name.eq(team_name))
            .first::<Team>(&mut conn)
            .optional()?
        {
            return Ok(existing);
        }

        let now = Local::now().to_rfc3339();
        let new_team = NewTeam {
            name: team_name,
            created_at: &now,
        };
        diesel::insert_into(teams::table)
            .values(&new_team)
            .execute(&mut conn)?;

        Ok(teams::table
            .filter(teams::name.eq(team_name))
            .first::<Team>(&mut conn)?)
    }

    /// Find a developer, creating one on first sighting. `email`, when
    /// present, is the stable identity key; otherwise identity is
    /// `(name, team_id)`.
    pub fn find_or_create_developer(
        &self,
        developer_name: &str,
        email: Option<&str>,
        team_id: i32,
    ) -> Result<Developer> {
        let mut conn = self.get_conn()?;

        let existing = match email {
            Some(addr) => developers::table
                .filter(developers::email.eq(addr))
                .first::<Developer>(&mut conn)
                .optional()?,
            None => developers::table
                .filter(developers::name.eq(developer_name))
                .filter(developers::team_id.eq(team_id))
                .first::<Developer>(&mut conn)
                .optional()?,
        };
        if let Some(developer) = existing {
            return Ok(developer);
        }

        let now = Local::now().to_rfc3339();
        let new_developer = NewDeveloper {
            name: developer_name,
            email,
            team_id: Some(team_id),
            created_at: &now,
        };
        diesel::insert_into(developers::table)
            .values(&new_developer)
            .execute(&mut conn)?;

        let id: i32 =
            diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>("last_insert_rowid()"))
                .first(&mut conn)?;

        Ok(developers::table
            .filter(developers::id.eq(id))
            .first::<Developer>(&mut conn)?)
    }

    /// Upsert the membership link for a developer/team pair.
    pub fn link_developer_team(&self, developer_id: i32, team_id: i32) -> Result<()> {
        let mut conn = self.get_conn()?;
        let now = Local::now().to_rfc3339();

        let link = NewDeveloperTeam {
            developer_id,
            team_id,
            created_at: &now,
        };
        diesel::insert_or_ignore_into(developer_teams::table)
            .values(&link)
            .execute(&mut conn)?;

        Ok(())
    }

    /// Insert one commit row. A duplicate `commit_id` fails atomically with
    /// `DbError::Duplicate`, leaving no partial row.
    pub fn insert_commit(&self, new_commit: &NewCommit) -> Result<i32> {
        let mut conn = self.get_conn()?;

        diesel::insert_into(commits::table)
            .values(new_commit)
            .execute(&mut conn)?;

        let id: i32 =
            diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>("last_insert_rowid()"))
                .first(&mut conn)?;

        Ok(id)
    }

    // ========================================================================
    // Query Operations (aggregation inputs)
    // ========================================================================

    /// Fetch all commits in the window, joined with their developer and team
    /// rows and normalized into the canonical record shape. The join is
    /// total: absent foreign keys become `None` name fields, absent numerics
    /// become 0, a NULL type becomes develop.
    ///
    /// The date bound is applied after parsing rather than in SQL:
    /// `created_at` holds RFC 3339 strings whose local offsets can differ,
    /// and those don't compare reliably as text.
    pub fn commits_in_range(&self, range: &DateRange) -> Result<Vec<CommitRecord>> {
        let mut conn = self.get_conn()?;

        let rows: Vec<(Commit, Option<Developer>, Option<Team>)> = commits::table
            .left_join(developers::table)
            .left_join(teams::table)
            .select((
                Commit::as_select(),
                Option::<Developer>::as_select(),
                Option::<Team>::as_select(),
            ))
            .order(commits::created_at.asc())
            .load(&mut conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for (commit, developer, team) in rows {
            let created_at = chrono::DateTime::parse_from_rfc3339(&commit.created_at)
                .map_err(|e| {
                    DbError::Validation(format!(
                        "bad created_at on commit {}: {}",
                        commit.commit_id, e
                    ))
                })?
                .with_timezone(&Local);

            if !range.contains(&created_at) {
                continue;
            }

            out.push(CommitRecord {
                id: commit.id,
                commit_id: commit.commit_id,
                message: commit.message,
                developer_id: commit.developer_id,
                developer_name: developer.map(|d| d.name),
                team_id: commit.team_id,
                team_name: team.map(|t| t.name),
                commit_type: CommitType::from_column(commit.commit_type.as_deref()),
                evaluation: Evaluation {
                    total: commit.evaluation_total.unwrap_or(0.0),
                    complexity: commit.evaluation_complexity.unwrap_or(0.0),
                    volume: commit.evaluation_volume.unwrap_or(0.0),
                    thinking: commit.evaluation_thinking.unwrap_or(0.0),
                    others: commit.evaluation_others.unwrap_or(0.0),
                },
                lines_added: commit.lines_added.max(0) as i64,
                lines_deleted: commit.lines_deleted.max(0) as i64,
                work_hours: commit.work_hours.unwrap_or(0.0),
                ai_driven_minutes: commit.ai_driven_minutes.unwrap_or(0) as i64,
                stored_productivity: commit.productivity.unwrap_or(0.0),
                agent_hash: commit.agent_hash,
                created_at,
            });
        }

        Ok(out)
    }

    /// Get all teams
    pub fn all_teams(&self) -> Result<Vec<Team>> {
        let mut conn = self.get_conn()?;
        let rows = teams::table.order(teams::name.asc()).load::<Team>(&mut conn)?;
        Ok(rows)
    }

    /// Get all developers
    pub fn all_developers(&self) -> Result<Vec<Developer>> {
        let mut conn = self.get_conn()?;
        let rows = developers::table
            .order(developers::name.asc())
            .load::<Developer>(&mut conn)?;
        Ok(rows)
    }

    /// Get all developer-team membership links
    pub fn all_links(&self) -> Result<Vec<DeveloperTeam>> {
        let mut conn = self.get_conn()?;
        let rows = developer_teams::table
            .order(developer_teams::created_at.asc())
            .load::<DeveloperTeam>(&mut conn)?;
        Ok(rows)
    }
}
