//! Commit submission payloads and the ingestion sequence
//!
//! A git-hook-style client posts one JSON payload per commit. Ingestion is a
//! plain upsert chain: find-or-create team, find-or-create developer, upsert
//! the membership link, insert the commit row verbatim. Stored evaluation
//! totals and productivity are taken as given, never recomputed. The only
//! idempotency guarantee is the unique commit_id constraint.

use crate::db::{Database, DbError, NewCommit};
use chrono::Local;
use serde::Deserialize;

/// Evaluation scores as submitted by the client.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct EvaluationPayload {
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub complexity: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub thinking: Option<f64>,
    #[serde(default)]
    pub others: Option<f64>,
}

/// One commit submission. Every field is optional at the serde layer so a
/// missing required field produces a reason string instead of a parse error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitPayload {
    #[serde(default)]
    pub commit_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub developer_name: Option<String>,
    #[serde(default)]
    pub developer_email: Option<String>,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default, rename = "type")]
    pub commit_type: Option<String>,
    #[serde(default)]
    pub evaluation: Option<EvaluationPayload>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub lines_added: Option<i32>,
    #[serde(default)]
    pub lines_deleted: Option<i32>,
    #[serde(default)]
    pub work_hours: Option<f64>,
    #[serde(default)]
    pub ai_driven_minutes: Option<i32>,
    #[serde(default)]
    pub productivity: Option<f64>,
    #[serde(default)]
    pub agent_hash: Option<String>,
}

impl CommitPayload {
    /// Reject before any write. Returns a reason naming the first missing
    /// required field.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for (field, value) in [
            ("commit_id", &self.commit_id),
            ("message", &self.message),
            ("developer_name", &self.developer_name),
            ("team_name", &self.team_name),
        ] {
            match value {
                Some(v) if !v.trim().is_empty() => {}
                _ => return Err(format!("missing required field: {}", field)),
            }
        }
        Ok(())
    }
}

/// Row ids touched by a successful submission.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IngestOutcome {
    pub commit_row_id: i32,
    pub team_id: i32,
    pub developer_id: i32,
}

/// Run the full ingestion sequence for one payload.
pub fn submit(db: &Database, payload: &CommitPayload) -> Result<IngestOutcome, DbError> {
    payload.validate().map_err(DbError::Validation)?;

    // validate() guarantees these are present and non-blank
    let commit_id = payload.commit_id.as_deref().unwrap_or_default();
    let message = payload.message.as_deref().unwrap_or_default();
    let developer_name = payload.developer_name.as_deref().unwrap_or_default();
    let team_name = payload.team_name.as_deref().unwrap_or_default();

    let team = db.find_or_create_team(team_name)?;
    let developer = db.find_or_create_developer(
        developer_name,
        payload.developer_email.as_deref(),
        team.id,
    )?;
    db.link_developer_team(developer.id, team.id)?;

    let evaluation = payload.evaluation.unwrap_or_default();
    let now = Local::now().to_rfc3339();
    let new_commit = NewCommit {
        commit_id,
        message,
        developer_id: Some(developer.id),
        team_id: Some(team.id),
        commit_type: payload.commit_type.as_deref(),
        evaluation_total: evaluation.total,
        evaluation_complexity: evaluation.complexity,
        evaluation_volume: evaluation.volume,
        evaluation_thinking: evaluation.thinking,
        evaluation_others: evaluation.others,
        comment: payload.comment.as_deref(),
        lines_added: payload.lines_added.unwrap_or(0).max(0),
        lines_deleted: payload.lines_deleted.unwrap_or(0).max(0),
        work_hours: payload.work_hours,
        ai_driven_minutes: payload.ai_driven_minutes,
        productivity: payload.productivity,
        agent_hash: payload.agent_hash.as_deref(),
        created_at: &now,
    };

    let commit_row_id = db.insert_commit(&new_commit)?;

    Ok(IngestOutcome {
        commit_row_id,
        team_id: team.id,
        developer_id: developer.id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> CommitPayload {
        CommitPayload {
            commit_id: Some("abc123".to_string()),
            message: Some("feat: add dashboard".to_string()),
            developer_name: Some("ada".to_string()),
            team_name: Some("core".to_string()),
            ..CommitPayload::default()
        }
    }

    #[test]
    fn test_minimal_payload_validates() {
        assert!(minimal().validate().is_ok());
    }

    #[test]
    fn test_each_required_field_is_checked() {
        for field in ["commit_id", "message", "developer_name", "team_name"] {
            let mut payload = minimal();
            match field {
                "commit_id" => payload.commit_id = None,
                "message" => payload.message = None,
                "developer_name" => payload.developer_name = None,
                _ => payload.team_name = None,
            }
            let err = payload.validate().unwrap_err();
            assert!(err.contains(field), "expected '{}' in '{}'", field, err);
        }
    }

    #[test]
    fn test_blank_fields_are_rejected() {
        let mut payload = minimal();
        payload.team_name = Some("   ".to_string());
        assert!(payload.validate().is_err());
    }

    #[test]
    fn test_payload_parses_from_hook_json() {
        let raw = r#"{
            "commit_id": "deadbeef",
            "message": "fix(api): guard zero denominators",
            "developer_name": "ada",
            "developer_email": "ada@example.com",
            "team_name": "core",
            "type": "develop",
            "evaluation": {"total": 12.0, "complexity": 4.0, "volume": 3.0, "thinking": 3.0, "others": 2.0},
            "lines_added": 42,
            "lines_deleted": 7,
            "work_hours": 1.5,
            "ai_driven_minutes": 25,
            "productivity": 360.0,
            "agent_hash": "sha-aaa"
        }"#;
        let payload: CommitPayload = serde_json::from_str(raw).unwrap();
        assert!(payload.validate().is_ok());
        assert_eq!(payload.commit_type.as_deref(), Some("develop"));
        assert_eq!(payload.evaluation.unwrap().total, Some(12.0));
        assert_eq!(payload.agent_hash.as_deref(), Some("sha-aaa"));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        // Older hook clients send extra fields; they must not break parsing
        let raw = r#"{
            "commit_id": "c1",
            "message": "update",
            "developer_name": "bob",
            "team_name": "infra",
            "branch": "main",
            "repo": "devpulse"
        }"#;
        let payload: CommitPayload = serde_json::from_str(raw).unwrap();
        assert!(payload.validate().is_ok());
    }
}
