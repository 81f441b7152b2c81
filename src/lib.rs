//! Devpulse - commit activity and AI-assisted productivity analytics
//!
//! Stores developer commit activity, self-reported evaluation scores, and
//! time-tracking metrics, and serves per-developer, per-team, and global
//! aggregates over a date-range filter. A git-hook-style client submits
//! commits to an ingestion endpoint; the dashboard recomputes every view
//! fresh from a filtered snapshot.
//!
//! # The derived-metric rules
//!
//! | Rule | Meaning |
//! |------|---------|
//! | null type | reads as `develop` everywhere |
//! | missing numerics | read as 0 before any arithmetic |
//! | productivity | `(develop hours * 60 / ai minutes) * 100`, from sums |
//! | ratios | denominator guarded, 0 instead of NaN |
//! | team grouping | by the commit's team, not the developer's home team |
//!
//! # Quick Start
//!
//! ```no_run
//! use devpulse::db::Database;
//! use devpulse::model::DateRange;
//! use devpulse::stats;
//!
//! let db = Database::new(".devpulse/devpulse.db").unwrap();
//! let commits = db.commits_in_range(&DateRange::unbounded()).unwrap();
//! let developers = db.all_developers().unwrap();
//! let teams = db.all_teams().unwrap();
//!
//! let summary = stats::aggregate(&commits, &developers, &teams);
//! println!("{} commits over {} days", summary.stats.total_commits, summary.day_count);
//! ```

pub mod anomaly;
pub mod config;
pub mod db;
pub mod ingest;
pub mod model;
pub mod report;
pub mod schema;
pub mod serve;
pub mod stats;

pub use anomaly::AnomalyReport;
pub use config::Config;
pub use db::{Database, DbError, Developer, DeveloperTeam, Team};
pub use ingest::{CommitPayload, IngestOutcome};
pub use model::{CommitRecord, CommitType, DateRange, Evaluation};
pub use stats::{ActivityStats, DashboardSummary, DeveloperStats, TeamStats};
