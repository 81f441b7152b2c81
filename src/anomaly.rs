//! Majority-vote agent-hash anomaly detection
//!
//! Each commit may carry an opaque hash identifying the AI-assistant
//! configuration that produced it. Within one filtered window the most
//! frequent hash is taken as the expected one and everything else is flagged.
//! There is no persisted registry of known-good hashes: the classification is
//! recomputed from scratch per window, so shifting the window can flip a
//! hash's status. Ties on the top count break toward the lexicographically
//! smallest hash.

use crate::model::CommitRecord;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Per-hash detail row.
#[derive(Debug, Clone, Serialize)]
pub struct HashDetail {
    pub hash: String,
    pub count: usize,
    /// Share of all tagged commits, in percent.
    pub percentage: f64,
    /// Distinct developer names seen under this hash, sorted.
    pub developers: Vec<String>,
    pub anomalous: bool,
}

/// Tagged-commit counts per hash for one day of the week.
#[derive(Debug, Clone, Serialize)]
pub struct WeekdayBucket {
    /// 0=Sunday .. 6=Saturday.
    pub weekday: usize,
    pub counts: BTreeMap<String, usize>,
}

/// One-shot classification of a filtered window.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnomalyReport {
    /// Commits carrying an agent hash; untagged commits are ignored.
    pub total_commits: usize,
    pub expected_hash: Option<String>,
    pub normal_count: usize,
    pub anomaly_count: usize,
    /// Sorted by count descending, then hash ascending.
    pub hashes: Vec<HashDetail>,
    /// Always seven buckets, Sunday first.
    pub weekdays: Vec<WeekdayBucket>,
}

/// Classify the tagged commits in one window. An empty window (or one with no
/// tagged commits) yields a zero report, never an error.
pub fn classify(commits: &[CommitRecord]) -> AnomalyReport {
    let tagged: Vec<&CommitRecord> = commits.iter().filter(|c| c.agent_hash.is_some()).collect();
    if tagged.is_empty() {
        return AnomalyReport {
            weekdays: empty_weekdays(),
            ..AnomalyReport::default()
        };
    }

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut developers: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut weekdays = empty_weekdays();

    for commit in &tagged {
        let hash = commit.agent_hash.as_deref().unwrap_or_default();
        *counts.entry(hash).or_insert(0) += 1;
        if let Some(name) = commit.developer_name.as_deref() {
            developers.entry(hash).or_default().insert(name);
        }
        *weekdays[commit.weekday_index()]
            .counts
            .entry(hash.to_string())
            .or_insert(0) += 1;
    }

    // BTreeMap iterates in key order, so keeping strictly-greater counts
    // lands ties on the lexicographically smallest hash.
    let mut expected: Option<(&str, usize)> = None;
    for (&hash, &count) in &counts {
        if expected.map(|(_, best)| count > best).unwrap_or(true) {
            expected = Some((hash, count));
        }
    }
    let (expected_hash, normal_count) = expected.unwrap_or(("", 0));

    let total = tagged.len();
    let mut details: Vec<HashDetail> = counts
        .iter()
        .map(|(&hash, &count)| HashDetail {
            hash: hash.to_string(),
            count,
            percentage: count as f64 / total as f64 * 100.0,
            developers: developers
                .get(hash)
                .map(|names| names.iter().map(|n| n.to_string()).collect())
                .unwrap_or_default(),
            anomalous: hash != expected_hash,
        })
        .collect();
    details.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.hash.cmp(&b.hash)));

    AnomalyReport {
        total_commits: total,
        expected_hash: Some(expected_hash.to_string()),
        normal_count,
        anomaly_count: total - normal_count,
        hashes: details,
        weekdays,
    }
}

fn empty_weekdays() -> Vec<WeekdayBucket> {
    (0..7)
        .map(|weekday| WeekdayBucket {
            weekday,
            counts: BTreeMap::new(),
        })
        .collect()
}
