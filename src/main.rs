use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;
use devpulse::db::Database;
use devpulse::model::DateRange;
use devpulse::{anomaly, ingest, report, serve, stats, Config};
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "devpulse")]
#[command(version)]
#[command(about = "Commit activity and AI-assisted productivity analytics for development teams")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create .devpulse/ with the database and a config.toml (generates an API key)
    Init,

    /// Start the dashboard server and ingestion endpoint
    Serve {
        /// Port to listen on (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Submit one commit payload (JSON) from a file or stdin
    Ingest {
        /// Payload file; reads stdin when omitted
        file: Option<PathBuf>,
    },

    /// Show the global summary for a date window
    Summary {
        #[command(flatten)]
        window: WindowArgs,
    },

    /// Show per-developer roll-ups across all teams
    Developers {
        #[command(flatten)]
        window: WindowArgs,
    },

    /// Show per-team breakdowns with team-scoped developer stats
    Teams {
        #[command(flatten)]
        window: WindowArgs,
    },

    /// Show the agent-hash anomaly report
    Anomalies {
        #[command(flatten)]
        window: WindowArgs,
    },

    /// Generate shell completions
    Completion {
        /// Shell to generate for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args)]
struct WindowArgs {
    /// Window start date (YYYY-MM-DD, inclusive)
    #[arg(long)]
    start: Option<String>,

    /// Window end date (YYYY-MM-DD, inclusive)
    #[arg(long)]
    end: Option<String>,

    /// Emit JSON instead of a table
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Init => init(),
        Command::Serve { port } => {
            let config = Config::load();
            let port = port.unwrap_or(config.server.port);
            serve::start_server(port, config)?;
            Ok(())
        }
        Command::Ingest { file } => ingest_from(file),
        Command::Summary { window } => {
            let (commits, developers, teams) = load_window(&window)?;
            let summary = stats::aggregate(&commits, &developers, &teams);
            if window.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                report::render_summary(&summary);
            }
            Ok(())
        }
        Command::Developers { window } => {
            let (commits, developers, _teams) = load_window(&window)?;
            let rollups = stats::developer_rollups(&commits, &developers);
            if window.json {
                println!("{}", serde_json::to_string_pretty(&rollups)?);
            } else {
                report::render_developers(&rollups);
            }
            Ok(())
        }
        Command::Teams { window } => {
            let (commits, developers, teams) = load_window(&window)?;
            let views: Vec<_> = teams
                .iter()
                .map(|t| stats::team_stats(t, &commits, &developers))
                .collect();
            if window.json {
                println!("{}", serde_json::to_string_pretty(&views)?);
            } else {
                report::render_teams(&views);
            }
            Ok(())
        }
        Command::Anomalies { window } => {
            let (commits, _developers, _teams) = load_window(&window)?;
            let report_data = anomaly::classify(&commits);
            if window.json {
                println!("{}", serde_json::to_string_pretty(&report_data)?);
            } else {
                report::render_anomalies(&report_data);
            }
            Ok(())
        }
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Open the store and materialize one filtered snapshot.
fn load_window(
    window: &WindowArgs,
) -> Result<
    (
        Vec<devpulse::model::CommitRecord>,
        Vec<devpulse::db::Developer>,
        Vec<devpulse::db::Team>,
    ),
    Box<dyn std::error::Error>,
> {
    let range = DateRange::parse(window.start.as_deref(), window.end.as_deref())?;
    let db = Database::open()?;
    let commits = db.commits_in_range(&range)?;
    let developers = db.all_developers()?;
    let teams = db.all_teams()?;
    Ok((commits, developers, teams))
}

fn init() -> Result<(), Box<dyn std::error::Error>> {
    let dir = PathBuf::from(".devpulse");
    std::fs::create_dir_all(&dir)?;

    Database::open_at(dir.join("devpulse.db"))?;

    let config_path = dir.join("config.toml");
    if config_path.exists() {
        println!("{} .devpulse/config.toml already exists", "ok:".green());
    } else {
        let api_key = uuid::Uuid::new_v4().to_string();
        let mut config = Config::default();
        config.server.api_key = Some(api_key.clone());
        std::fs::write(&config_path, toml::to_string_pretty(&config)?)?;
        println!("{} created .devpulse/config.toml", "ok:".green());
        println!("   api key: {}", api_key.bold());
    }
    println!("{} database ready at .devpulse/devpulse.db", "ok:".green());
    Ok(())
}

fn ingest_from(file: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let payload: ingest::CommitPayload = serde_json::from_str(&raw)?;
    let db = Database::open()?;
    let outcome = ingest::submit(&db, &payload)?;
    println!(
        "{} commit {} recorded (row {}, developer {}, team {})",
        "ok:".green(),
        payload.commit_id.as_deref().unwrap_or("?").bold(),
        outcome.commit_row_id,
        outcome.developer_id,
        outcome.team_id
    );
    Ok(())
}
