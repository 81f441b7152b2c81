//! Canonical commit record shape consumed by the aggregation engine
//!
//! The store hands out commits already joined with their developer and team
//! rows and normalized: a NULL type reads as `develop`, absent numeric fields
//! read as 0. The aggregation engine never branches on missing data.

use chrono::{DateTime, Datelike, Local, NaiveDate};
use serde::Serialize;

/// Effective commit classification. The stored column is nullable; NULL (and
/// anything unrecognized) reads as `Develop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitType {
    Develop,
    Meeting,
    Chore,
}

impl CommitType {
    /// Normalize the stored `commit_type` column.
    pub fn from_column(raw: Option<&str>) -> Self {
        match raw {
            Some("meeting") => CommitType::Meeting,
            Some("chore") => CommitType::Chore,
            _ => CommitType::Develop,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommitType::Develop => "develop",
            CommitType::Meeting => "meeting",
            CommitType::Chore => "chore",
        }
    }
}

/// Self-reported evaluation scores, as stored at ingestion.
///
/// `total` is conceptually the sum of the other four but is stored
/// redundantly; aggregation trusts the stored value and never recomputes it.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Evaluation {
    pub total: f64,
    pub complexity: f64,
    pub volume: f64,
    pub thinking: f64,
    pub others: f64,
}

/// One commit, joined and normalized.
#[derive(Debug, Clone, Serialize)]
pub struct CommitRecord {
    pub id: i32,
    pub commit_id: String,
    pub message: String,
    pub developer_id: Option<i32>,
    pub developer_name: Option<String>,
    /// Team the commit was made under. May differ from the developer's
    /// default team; team aggregation groups by this, never by the home team.
    pub team_id: Option<i32>,
    pub team_name: Option<String>,
    pub commit_type: CommitType,
    pub evaluation: Evaluation,
    pub lines_added: i64,
    pub lines_deleted: i64,
    pub work_hours: f64,
    pub ai_driven_minutes: i64,
    /// Productivity as stored at ingestion. Informational only: every
    /// displayed productivity figure is recomputed from aggregated sums.
    pub stored_productivity: f64,
    pub agent_hash: Option<String>,
    pub created_at: DateTime<Local>,
}

impl CommitRecord {
    /// Local calendar date, used for day-count normalization.
    pub fn local_date(&self) -> NaiveDate {
        self.created_at.date_naive()
    }

    /// Day of week, 0=Sunday .. 6=Saturday.
    pub fn weekday_index(&self) -> usize {
        self.created_at.weekday().num_days_from_sunday() as usize
    }
}

/// Inclusive local-date window applied uniformly to all views.
///
/// Both bounds are optional; an absent bound means unbounded on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Parse `YYYY-MM-DD` bounds as supplied on the CLI or query string.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, String> {
        let parse_one = |label: &str, raw: &str| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| format!("invalid {} date '{}', expected YYYY-MM-DD", label, raw))
        };
        let start = match start {
            Some(s) => Some(parse_one("start", s)?),
            None => None,
        };
        let end = match end {
            Some(s) => Some(parse_one("end", s)?),
            None => None,
        };
        Ok(Self { start, end })
    }

    /// Whether a timestamp falls inside the window. Bounds are whole local
    /// days, so `[start 00:00, end 23:59:59]` inclusive.
    pub fn contains(&self, at: &DateTime<Local>) -> bool {
        let date = at.date_naive();
        if let Some(start) = self.start {
            if date < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if date > end {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_null_type_reads_as_develop() {
        assert_eq!(CommitType::from_column(None), CommitType::Develop);
        assert_eq!(CommitType::from_column(Some("develop")), CommitType::Develop);
        assert_eq!(CommitType::from_column(Some("meeting")), CommitType::Meeting);
        assert_eq!(CommitType::from_column(Some("chore")), CommitType::Chore);
        // Unrecognized values normalize to develop rather than erroring
        assert_eq!(CommitType::from_column(Some("retro")), CommitType::Develop);
    }

    #[test]
    fn test_date_range_parse() {
        let range = DateRange::parse(Some("2026-01-01"), Some("2026-01-31")).unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2026, 1, 1));
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2026, 1, 31));

        assert_eq!(DateRange::parse(None, None).unwrap(), DateRange::unbounded());
        assert!(DateRange::parse(Some("01/02/2026"), None).is_err());
    }

    #[test]
    fn test_date_range_is_inclusive_of_both_bounds() {
        let range = DateRange::parse(Some("2026-03-10"), Some("2026-03-12")).unwrap();

        let first_second = Local.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap();
        let last_second = Local.with_ymd_and_hms(2026, 3, 12, 23, 59, 59).unwrap();
        let before = Local.with_ymd_and_hms(2026, 3, 9, 23, 59, 59).unwrap();
        let after = Local.with_ymd_and_hms(2026, 3, 13, 0, 0, 0).unwrap();

        assert!(range.contains(&first_second));
        assert!(range.contains(&last_second));
        assert!(!range.contains(&before));
        assert!(!range.contains(&after));
    }

    #[test]
    fn test_unbounded_range_contains_everything() {
        let range = DateRange::unbounded();
        let at = Local.with_ymd_and_hms(1999, 12, 31, 12, 0, 0).unwrap();
        assert!(range.contains(&at));
    }
}
