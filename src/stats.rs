//! Aggregation engine: pure recomputation of dashboard view-models
//!
//! Everything here is a single synchronous pass over an already date-filtered
//! slice of canonical commit records. Nothing is cached between calls; a view
//! refresh recomputes from the snapshot it was handed.
//!
//! The rules worth being careful about:
//! - a NULL commit type already reads as develop (normalized upstream)
//! - every sum treats absent numerics as 0
//! - every ratio guards its denominator and yields 0, never NaN
//! - productivity comes from sums over the window, never from averaging
//!   per-commit ratios (those over-weight small commits)
//! - team stats group by the commit's team, not the developer's home team

use crate::db::{Developer, Team};
use crate::model::{CommitRecord, CommitType};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;

lazy_static! {
    // A commit "feat(scope): ..." or "fix: ..." counts toward its bucket
    // regardless of case. No match means no bucket.
    static ref PREFIX_RE: Regex =
        Regex::new(r"(?i)^(feat|fix|chore|refactor|docs)[(:]").expect("prefix regex");
}

/// Commit counts partitioned by effective type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    pub develop: usize,
    pub meeting: usize,
    pub chore: usize,
}

impl TypeCounts {
    pub fn total(&self) -> usize {
        self.develop + self.meeting + self.chore
    }
}

/// Work hours partitioned by effective type.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TypeHours {
    pub develop: f64,
    pub meeting: f64,
    pub chore: f64,
}

/// Mean evaluation scores over the develop partition, 0 when it is empty.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EvaluationBreakdown {
    pub complexity: f64,
    pub volume: f64,
    pub thinking: f64,
    pub others: f64,
}

/// Conventional-commit prefix buckets over the develop partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PrefixCounts {
    pub feat: usize,
    pub fix: usize,
    pub chore: usize,
    pub refactor: usize,
    pub docs: usize,
}

/// Derived statistics for one slice of commits. The same shape serves
/// per-developer, per-team, and global views.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivityStats {
    pub total_commits: usize,
    pub commits_by_type: TypeCounts,
    pub work_hours_by_type: TypeHours,
    /// AI-assisted minutes, summed over the develop partition only; other
    /// types have no AI-time concept.
    pub ai_driven_minutes: i64,
    pub avg_evaluation_develop: f64,
    pub evaluation_breakdown: EvaluationBreakdown,
    /// Line counts come from the develop partition only, even if a
    /// meeting/chore row happens to carry them.
    pub total_lines_added: i64,
    pub total_lines_deleted: i64,
    /// All types combined.
    pub total_work_hours: f64,
    /// Human develop hours as a percentage of AI-assisted time. 0 whenever
    /// either side of the ratio is 0.
    pub productivity: f64,
    /// Combined workload view: AI time stands in for the develop component.
    pub human_with_ai_hours: f64,
    pub prefix_counts: PrefixCounts,
}

/// Per-developer view-model.
#[derive(Debug, Clone, Serialize)]
pub struct DeveloperStats {
    pub developer_id: i32,
    pub name: String,
    pub stats: ActivityStats,
}

/// Per-team view-model. Embedded developers carry stats computed only from
/// this team's commit subset; a developer on two teams gets two independent
/// scoped entries, distinct from their global roll-up.
#[derive(Debug, Clone, Serialize)]
pub struct TeamStats {
    pub team_id: i32,
    pub name: String,
    pub stats: ActivityStats,
    pub developers: Vec<DeveloperStats>,
}

/// The whole dashboard for one filtered window.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardSummary {
    pub stats: ActivityStats,
    /// Distinct local calendar dates in the window, floored at 1.
    pub day_count: usize,
    pub daily_avg_commits: f64,
    pub daily_avg_work_hours: f64,
    /// Global roll-ups: each developer's stats across all teams.
    pub developers: Vec<DeveloperStats>,
    /// Team-scoped breakdowns.
    pub teams: Vec<TeamStats>,
}

/// Classify a commit message by its conventional-commit prefix.
pub fn message_prefix(message: &str) -> Option<&'static str> {
    let caps = PREFIX_RE.captures(message)?;
    match caps.get(1)?.as_str().to_ascii_lowercase().as_str() {
        "feat" => Some("feat"),
        "fix" => Some("fix"),
        "chore" => Some("chore"),
        "refactor" => Some("refactor"),
        "docs" => Some("docs"),
        _ => None,
    }
}

/// Human develop hours as a percentage of AI-assisted time, from sums.
pub fn productivity_pct(develop_hours: f64, ai_minutes: i64) -> f64 {
    if develop_hours > 0.0 && ai_minutes > 0 {
        develop_hours * 60.0 / ai_minutes as f64 * 100.0
    } else {
        0.0
    }
}

/// Number of distinct local calendar dates in the slice, floored at 1 so
/// daily averages never divide by zero.
pub fn day_count<'a, I>(commits: I) -> usize
where
    I: IntoIterator<Item = &'a CommitRecord>,
{
    let days: BTreeSet<_> = commits.into_iter().map(|c| c.local_date()).collect();
    days.len().max(1)
}

/// Fold one slice of commits into its derived statistics.
pub fn collect_stats<'a, I>(commits: I) -> ActivityStats
where
    I: IntoIterator<Item = &'a CommitRecord>,
{
    let mut out = ActivityStats::default();
    let mut eval_sum = Evals::default();

    for commit in commits {
        out.total_commits += 1;
        match commit.commit_type {
            CommitType::Develop => {
                out.commits_by_type.develop += 1;
                out.work_hours_by_type.develop += commit.work_hours;
                out.ai_driven_minutes += commit.ai_driven_minutes;
                out.total_lines_added += commit.lines_added;
                out.total_lines_deleted += commit.lines_deleted;
                eval_sum.total += commit.evaluation.total;
                eval_sum.complexity += commit.evaluation.complexity;
                eval_sum.volume += commit.evaluation.volume;
                eval_sum.thinking += commit.evaluation.thinking;
                eval_sum.others += commit.evaluation.others;
                match message_prefix(&commit.message) {
                    Some("feat") => out.prefix_counts.feat += 1,
                    Some("fix") => out.prefix_counts.fix += 1,
                    Some("chore") => out.prefix_counts.chore += 1,
                    Some("refactor") => out.prefix_counts.refactor += 1,
                    Some("docs") => out.prefix_counts.docs += 1,
                    _ => {}
                }
            }
            CommitType::Meeting => {
                out.commits_by_type.meeting += 1;
                out.work_hours_by_type.meeting += commit.work_hours;
            }
            CommitType::Chore => {
                out.commits_by_type.chore += 1;
                out.work_hours_by_type.chore += commit.work_hours;
            }
        }
        out.total_work_hours += commit.work_hours;
    }

    let develop_count = out.commits_by_type.develop;
    if develop_count > 0 {
        let n = develop_count as f64;
        out.avg_evaluation_develop = eval_sum.total / n;
        out.evaluation_breakdown = EvaluationBreakdown {
            complexity: eval_sum.complexity / n,
            volume: eval_sum.volume / n,
            thinking: eval_sum.thinking / n,
            others: eval_sum.others / n,
        };
    }

    out.productivity = productivity_pct(out.work_hours_by_type.develop, out.ai_driven_minutes);
    out.human_with_ai_hours = out.ai_driven_minutes as f64 / 60.0
        + out.work_hours_by_type.meeting
        + out.work_hours_by_type.chore;

    out
}

#[derive(Default)]
struct Evals {
    total: f64,
    complexity: f64,
    volume: f64,
    thinking: f64,
    others: f64,
}

/// Global roll-up for one developer across all teams. Unknown developers get
/// an empty placeholder, never an error.
pub fn developer_stats(developer: &Developer, commits: &[CommitRecord]) -> DeveloperStats {
    let stats = collect_stats(
        commits
            .iter()
            .filter(|c| c.developer_id == Some(developer.id)),
    );
    DeveloperStats {
        developer_id: developer.id,
        name: developer.name.clone(),
        stats,
    }
}

/// Stats for one team, grouped by the commit's own team id, with embedded
/// developer stats scoped to this team's commit subset.
pub fn team_stats(team: &Team, commits: &[CommitRecord], developers: &[Developer]) -> TeamStats {
    let subset: Vec<&CommitRecord> = commits
        .iter()
        .filter(|c| c.team_id == Some(team.id))
        .collect();

    let member_ids: BTreeSet<i32> = subset.iter().filter_map(|c| c.developer_id).collect();
    let mut members = Vec::new();
    for developer in developers {
        if !member_ids.contains(&developer.id) {
            continue;
        }
        let scoped = collect_stats(
            subset
                .iter()
                .copied()
                .filter(|c| c.developer_id == Some(developer.id)),
        );
        members.push(DeveloperStats {
            developer_id: developer.id,
            name: developer.name.clone(),
            stats: scoped,
        });
    }
    members.sort_by(|a, b| b.stats.total_commits.cmp(&a.stats.total_commits));

    TeamStats {
        team_id: team.id,
        name: team.name.clone(),
        stats: collect_stats(subset.iter().copied()),
        developers: members,
    }
}

/// Global roll-ups for every developer, busiest first, ties broken by name.
/// The CLI table and the HTTP endpoint both serve this ordering.
pub fn developer_rollups(
    commits: &[CommitRecord],
    developers: &[Developer],
) -> Vec<DeveloperStats> {
    let mut rollups: Vec<DeveloperStats> = developers
        .iter()
        .map(|d| developer_stats(d, commits))
        .collect();
    rollups.sort_by(|a, b| {
        b.stats
            .total_commits
            .cmp(&a.stats.total_commits)
            .then_with(|| a.name.cmp(&b.name))
    });
    rollups
}

/// Build the full dashboard for one filtered window.
pub fn aggregate(
    commits: &[CommitRecord],
    developers: &[Developer],
    teams: &[Team],
) -> DashboardSummary {
    let stats = collect_stats(commits.iter());
    let days = day_count(commits.iter());

    let dev_rollups = developer_rollups(commits, developers);

    let mut team_views: Vec<TeamStats> = teams
        .iter()
        .map(|t| team_stats(t, commits, developers))
        .collect();
    team_views.sort_by(|a, b| a.name.cmp(&b.name));

    DashboardSummary {
        daily_avg_commits: stats.total_commits as f64 / days as f64,
        daily_avg_work_hours: stats.total_work_hours / days as f64,
        stats,
        day_count: days,
        developers: dev_rollups,
        teams: team_views,
    }
}
