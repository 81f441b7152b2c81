//! Terminal rendering of dashboard view-models
//!
//! Consumes aggregation-engine outputs; produces no domain logic of its own.

use crate::anomaly::AnomalyReport;
use crate::stats::{ActivityStats, DashboardSummary, DeveloperStats, TeamStats};
use colored::Colorize;

/// Print the global summary block.
pub fn render_summary(summary: &DashboardSummary) {
    let s = &summary.stats;

    println!("{}", "Summary".bold().underline());
    println!(
        "  commits: {} ({} develop / {} meeting / {} chore)",
        s.total_commits.to_string().bold(),
        s.commits_by_type.develop,
        s.commits_by_type.meeting,
        s.commits_by_type.chore
    );
    println!(
        "  work hours: {:.1} ({:.1} develop / {:.1} meeting / {:.1} chore)",
        s.total_work_hours,
        s.work_hours_by_type.develop,
        s.work_hours_by_type.meeting,
        s.work_hours_by_type.chore
    );
    println!(
        "  lines: {} / {}",
        format!("+{}", s.total_lines_added).green(),
        format!("-{}", s.total_lines_deleted).red()
    );
    println!(
        "  ai minutes: {}   human-with-ai hours: {:.1}",
        s.ai_driven_minutes, s.human_with_ai_hours
    );
    println!(
        "  avg evaluation (develop): {:.1}   productivity: {}",
        s.avg_evaluation_develop,
        colorize_productivity(s.productivity)
    );
    println!(
        "  days: {}   daily avg: {:.1} commits, {:.1}h",
        summary.day_count, summary.daily_avg_commits, summary.daily_avg_work_hours
    );
    println!(
        "  prefixes: feat {} / fix {} / chore {} / refactor {} / docs {}",
        s.prefix_counts.feat,
        s.prefix_counts.fix,
        s.prefix_counts.chore,
        s.prefix_counts.refactor,
        s.prefix_counts.docs
    );
}

/// Print the per-developer table.
pub fn render_developers(developers: &[DeveloperStats]) {
    println!("{}", "Developers".bold().underline());
    println!(
        "  {:<20} {:>8} {:>7} {:>7} {:>7} {:>9} {:>10} {:>12}",
        "name", "commits", "dev", "meet", "chore", "hours", "ai min", "productivity"
    );
    for developer in developers {
        let s = &developer.stats;
        println!(
            "  {:<20} {:>8} {:>7} {:>7} {:>7} {:>9.1} {:>10} {:>12}",
            developer.name,
            s.total_commits,
            s.commits_by_type.develop,
            s.commits_by_type.meeting,
            s.commits_by_type.chore,
            s.total_work_hours,
            s.ai_driven_minutes,
            colorize_productivity(s.productivity)
        );
    }
    if developers.is_empty() {
        println!("  {}", "(no developers)".dimmed());
    }
}

/// Print the per-team tables, including team-scoped developer entries.
pub fn render_teams(teams: &[TeamStats]) {
    for team in teams {
        println!("{} {}", "Team".bold().underline(), team.name.bold());
        render_line(&team.stats);
        for developer in &team.developers {
            let s = &developer.stats;
            println!(
                "    {:<18} {:>4} commits  {:>6.1}h  {}",
                developer.name,
                s.total_commits,
                s.total_work_hours,
                colorize_productivity(s.productivity)
            );
        }
        if team.developers.is_empty() {
            println!("    {}", "(no commits in window)".dimmed());
        }
        println!();
    }
    if teams.is_empty() {
        println!("{}", "(no teams)".dimmed());
    }
}

fn colorize_productivity(value: f64) -> colored::ColoredString {
    let text = format!("{:.0}%", value);
    if value > 0.0 {
        text.bold()
    } else {
        text.dimmed()
    }
}

fn render_line(s: &ActivityStats) {
    println!(
        "  {} commits, {:.1}h, +{}/-{}, productivity {}",
        s.total_commits,
        s.total_work_hours,
        s.total_lines_added,
        s.total_lines_deleted,
        colorize_productivity(s.productivity)
    );
}

/// Print the anomaly report.
pub fn render_anomalies(report: &AnomalyReport) {
    println!("{}", "Agent hashes".bold().underline());
    if report.total_commits == 0 {
        println!("  {}", "(no tagged commits in window)".dimmed());
        return;
    }

    println!(
        "  tagged commits: {}   expected: {}   normal: {}   anomalous: {}",
        report.total_commits,
        report.expected_hash.as_deref().unwrap_or("-").bold(),
        report.normal_count.to_string().green(),
        report.anomaly_count.to_string().red()
    );
    for detail in &report.hashes {
        let status = if detail.anomalous {
            "anomalous".red()
        } else {
            "expected".green()
        };
        println!(
            "  {:<24} {:>9}  {:>5}  {:>6.1}%  {}",
            detail.hash,
            status,
            detail.count,
            detail.percentage,
            detail.developers.join(", ").dimmed()
        );
    }

    const DAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
    println!("  by weekday:");
    for bucket in &report.weekdays {
        if bucket.counts.is_empty() {
            continue;
        }
        let line: Vec<String> = bucket
            .counts
            .iter()
            .map(|(hash, count)| format!("{}={}", hash, count))
            .collect();
        println!("    {} {}", DAYS[bucket.weekday], line.join(" "));
    }
}
