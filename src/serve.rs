//! HTTP server for the dashboard and ingestion endpoint
//!
//! `devpulse serve` → starts server, serves the embedded dashboard page and
//! a JSON API over the aggregation engine. Every view is recomputed fresh
//! from a snapshot read; nothing is cached between requests.

use crate::anomaly;
use crate::config::Config;
use crate::db::{Database, DbError};
use crate::ingest::{self, CommitPayload};
use crate::model::DateRange;
use crate::stats;
use serde::{Deserialize, Serialize};
use std::io::Read;
use tiny_http::{Header, Method, Request, Response, Server};

#[derive(Serialize)]
struct ApiResponse<T> {
    ok: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    fn failure(reason: String) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(reason),
        }
    }
}

// Embedded dashboard page; fetches /api/summary and /api/anomalies
const DASHBOARD_HTML: &str = include_str!("viewer.html");

/// Raw query-string shape for the date-range filter.
#[derive(Deserialize, Default)]
struct RangeQuery {
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
}

/// Start the dashboard server.
pub fn start_server(port: u16, config: Config) -> std::io::Result<()> {
    let addr = format!("127.0.0.1:{}", port);
    let server = Server::http(&addr)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    let url = format!("http://localhost:{}", port);

    eprintln!("\n\x1b[1;32m📈 Devpulse\x1b[0m");
    eprintln!("   Dashboard: {}", url);
    if config.api_key().is_none() {
        eprintln!("   Warning: no API key configured; ingestion is disabled (run `devpulse init`)");
    }
    eprintln!("   Press Ctrl+C to stop\n");

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, &config) {
            eprintln!("Error: {}", e);
        }
    }

    Ok(())
}

fn handle_request(request: Request, config: &Config) -> std::io::Result<()> {
    let url = request.url().to_string();
    let mut parts = url.splitn(2, '?');
    let path = parts.next().unwrap_or("/").to_string();
    let query = parts.next().unwrap_or("").to_string();
    let method = request.method().clone();

    match (&method, path.as_str()) {
        // Serve dashboard UI
        (&Method::Get, "/") | (&Method::Get, "/dashboard") => {
            let response = Response::from_string(DASHBOARD_HTML)
                .with_header(Header::from_bytes(&b"Content-Type"[..], &b"text/html"[..]).unwrap());
            request.respond(response)
        }

        // API: global summary with per-developer and per-team breakdowns
        (&Method::Get, "/api/summary") => {
            handle_view(request, &query, |commits, developers, teams| {
                stats::aggregate(commits, developers, teams)
            })
        }

        // API: global per-developer roll-ups
        (&Method::Get, "/api/developers") => {
            handle_view(request, &query, |commits, developers, _teams| {
                stats::developer_rollups(commits, developers)
            })
        }

        // API: per-team stats with team-scoped developer entries
        (&Method::Get, "/api/teams") => {
            handle_view(request, &query, |commits, developers, teams| {
                teams
                    .iter()
                    .map(|t| stats::team_stats(t, commits, developers))
                    .collect::<Vec<_>>()
            })
        }

        // API: agent-hash anomaly report
        (&Method::Get, "/api/anomalies") => {
            handle_view(request, &query, |commits, _developers, _teams| {
                anomaly::classify(commits)
            })
        }

        // API: commit ingestion (POST /api/commits)
        (&Method::Post, "/api/commits") => handle_ingest(request, config),

        // 404
        _ => {
            let response = Response::from_string("Not found").with_status_code(404);
            request.respond(response)
        }
    }
}

/// Read the filtered snapshot and run one pure view computation over it.
fn handle_view<T, F>(request: Request, query: &str, view: F) -> std::io::Result<()>
where
    T: Serialize,
    F: FnOnce(&[crate::model::CommitRecord], &[crate::db::Developer], &[crate::db::Team]) -> T,
{
    let range = match parse_range(query) {
        Ok(range) => range,
        Err(reason) => return respond_json::<()>(request, 400, ApiResponse::failure(reason)),
    };

    let result = Database::open().and_then(|db| {
        let commits = db.commits_in_range(&range)?;
        let developers = db.all_developers()?;
        let teams = db.all_teams()?;
        Ok((commits, developers, teams))
    });

    match result {
        Ok((commits, developers, teams)) => {
            let data = view(&commits, &developers, &teams);
            respond_json(request, 200, ApiResponse::success(data))
        }
        Err(e) => respond_json::<()>(
            request,
            500,
            ApiResponse::failure(format!("Database error: {}", e)),
        ),
    }
}

fn parse_range(query: &str) -> Result<DateRange, String> {
    let raw: RangeQuery =
        serde_urlencoded::from_str(query).map_err(|e| format!("Invalid query string: {}", e))?;
    DateRange::parse(raw.start.as_deref(), raw.end.as_deref())
}

fn handle_ingest(mut request: Request, config: &Config) -> std::io::Result<()> {
    // Exact-equality API key check, rejected before any read of the body
    let expected_key = match config.api_key() {
        Some(key) => key,
        None => {
            return respond_json::<()>(
                request,
                503,
                ApiResponse::failure("Ingestion disabled: no API key configured".to_string()),
            )
        }
    };
    let provided = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("X-Api-Key"))
        .map(|h| h.value.as_str().to_string());
    if provided.as_deref() != Some(expected_key.as_str()) {
        return respond_json::<()>(
            request,
            401,
            ApiResponse::failure("Invalid API key".to_string()),
        );
    }

    let mut body = String::new();
    if let Err(e) = request.as_reader().read_to_string(&mut body) {
        return respond_json::<()>(
            request,
            400,
            ApiResponse::failure(format!("Failed to read body: {}", e)),
        );
    }

    let payload: CommitPayload = match serde_json::from_str(&body) {
        Ok(p) => p,
        Err(e) => {
            return respond_json::<()>(
                request,
                400,
                ApiResponse::failure(format!("Invalid JSON: {}", e)),
            )
        }
    };

    let result = Database::open().and_then(|db| ingest::submit(&db, &payload));
    match result {
        Ok(outcome) => respond_json(request, 200, ApiResponse::success(outcome)),
        Err(DbError::Validation(reason)) => {
            respond_json::<()>(request, 400, ApiResponse::failure(reason))
        }
        Err(DbError::Duplicate(reason)) => respond_json::<()>(
            request,
            409,
            ApiResponse::failure(format!("Duplicate commit_id: {}", reason)),
        ),
        Err(e) => respond_json::<()>(
            request,
            500,
            ApiResponse::failure(format!("Database error: {}", e)),
        ),
    }
}

fn respond_json<T: Serialize>(
    request: Request,
    status: u16,
    body: ApiResponse<T>,
) -> std::io::Result<()> {
    let json = serde_json::to_string(&body)?;
    let response = Response::from_string(json)
        .with_status_code(status)
        .with_header(Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap());
    request.respond(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    // === ApiResponse Tests ===

    #[test]
    fn test_api_response_success() {
        let response: ApiResponse<String> = ApiResponse::success("hello".to_string());
        assert!(response.ok);
        assert_eq!(response.data, Some("hello".to_string()));
        assert!(response.error.is_none());
    }

    #[test]
    fn test_api_response_failure() {
        let response: ApiResponse<()> = ApiResponse::failure("nope".to_string());
        assert!(!response.ok);
        assert_eq!(response.error.as_deref(), Some("nope"));
    }

    #[test]
    fn test_api_response_serializes_to_json() {
        let response: ApiResponse<String> = ApiResponse::success("test".to_string());
        let json = serde_json::to_string(&response).unwrap();

        assert!(json.contains("\"ok\":true"));
        assert!(json.contains("\"data\":\"test\""));
        assert!(json.contains("\"error\":null"));
    }

    // === Range Parsing Tests ===

    #[test]
    fn test_parse_range_empty_query_is_unbounded() {
        let range = parse_range("").unwrap();
        assert_eq!(range, DateRange::unbounded());
    }

    #[test]
    fn test_parse_range_both_bounds() {
        let range = parse_range("start=2026-02-01&end=2026-02-28").unwrap();
        assert!(range.start.is_some());
        assert!(range.end.is_some());
    }

    #[test]
    fn test_parse_range_rejects_malformed_dates() {
        assert!(parse_range("start=yesterday").is_err());
    }

    // === Dashboard HTML Tests ===

    #[test]
    fn test_dashboard_html_is_valid() {
        assert!(DASHBOARD_HTML.contains("<!DOCTYPE html>") || DASHBOARD_HTML.contains("<html"));
        assert!(DASHBOARD_HTML.contains("</html>"));
    }

    #[test]
    fn test_dashboard_html_hits_the_api() {
        assert!(DASHBOARD_HTML.contains("/api/summary"));
        assert!(DASHBOARD_HTML.contains("/api/anomalies"));
    }
}
