//! CLI entry point for the chemist dispensing report tool.
//!
//! Each subcommand is one request: list chemists or periods, search the
//! reference table, build a single or comparison report, export a stored
//! report as a spreadsheet, or scrape the published workbooks.

mod infra;

use crate::infra::S3BlobStore;
use anyhow::Context;
use chemist_report::details::SEARCH_LIMIT;
use chemist_report::error::{ReportError, Severity};
use chemist_report::fetch::{BasicClient, WithHeader};
use chemist_report::months::Month;
use chemist_report::output::{render_html, render_text, write_csv, write_xlsx};
use chemist_report::report::{AggregateOptions, Cell, PeriodFilter, ROLLING_WINDOW};
use chemist_report::scrape::{self, BROWSER_USER_AGENT, DEFAULT_BASE_URL, DEFAULT_CONCURRENCY, OUTPUT_FILENAME};
use chemist_report::service::{ReportRequest, ReportService};
use chemist_report::session::{FileSessionStore, PendingDownload, SessionStore};
use chemist_report::source::{DEFAULT_ENCODINGS, DataLocation, Encoding, SourceLoader};
use clap::{Args, Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use url::Url;

const NO_DATA_MESSAGE: &str = "No data found for the selected filters";
const NO_DOWNLOAD_MESSAGE: &str = "No processed data available for download";

#[derive(Parser)]
#[command(name = "chemist_report")]
#[command(about = "Monthly dispensing reports for community chemists", long_about = None)]
struct Cli {
    #[command(flatten)]
    sources: SourceArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Dispensing data: a local path or s3://bucket/key (.gz is decompressed)
    #[arg(long, global = true, env = "DISPENSING_DATA", default_value = OUTPUT_FILENAME)]
    data: DataLocation,

    /// Chemist reference table: a local path or s3://bucket/key
    #[arg(long, global = true, env = "CHEMIST_DETAILS", default_value = "formatted_chemist_list.csv")]
    details: DataLocation,

    /// Directory holding reports stored for a later export
    #[arg(long, global = true, env = "SESSION_DIR")]
    session_dir: Option<PathBuf>,

    /// Text encodings to try, in order (repeatable; default utf-8, latin1, cp1252)
    #[arg(long = "encoding", global = true)]
    encodings: Vec<Encoding>,
}

#[derive(Subcommand)]
enum Commands {
    /// List every chemist in the reference table
    Chemists,
    /// List the years and months present in the dispensing data
    Periods,
    /// Search chemists by number, name or address and print JSON
    Search {
        query: String,

        #[arg(short, long, default_value_t = SEARCH_LIMIT)]
        limit: usize,
    },
    /// Monthly totals for one chemist, or two chemists side by side
    Report {
        /// Chemist number
        #[arg(short, long)]
        chemist: String,

        /// Second chemist number to compare against
        #[arg(long)]
        compare: Option<String>,

        #[arg(short, long)]
        year: Option<u32>,

        /// Month number or name
        #[arg(short, long)]
        month: Option<Month>,

        /// Skip the rolling average column
        #[arg(long, default_value_t = false)]
        no_rolling: bool,

        /// Write the table as an HTML fragment
        #[arg(long)]
        html: Option<PathBuf>,

        /// Write the table as CSV
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Write the table as an Excel workbook
        #[arg(long)]
        xlsx: Option<PathBuf>,

        /// Keep the result under this session id for a later `export`
        #[arg(long)]
        session: Option<String>,
    },
    /// Write the report stored for a session as a spreadsheet (once)
    Export {
        #[arg(long)]
        session: String,

        /// Output path; defaults to the report's download file name
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Download the published workbooks and merge them into one CSV
    Scrape {
        #[arg(long, default_value = DEFAULT_BASE_URL)]
        base_url: Url,

        #[arg(short, long, default_value = OUTPUT_FILENAME)]
        output: PathBuf,

        /// Maximum number of concurrent downloads
        #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let _guard = init_logging();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => report_failure(&e),
    }
}

/// Colored stderr plus a JSON daily-rolling log file.
fn init_logging() -> WorkerGuard {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/chemist_report.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("chemist_report.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(env_filter("RUST_LOG", "info"));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(env_filter("RUST_LOG_JSON", "debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    guard
}

fn env_filter(var: &str, default: &str) -> EnvFilter {
    EnvFilter::try_from_env(var).unwrap_or_else(|_| EnvFilter::new(default))
}

/// Logs a failed request at its severity and prints the user-facing text.
fn report_failure(err: &ReportError) -> ExitCode {
    let message = err.user_message();
    match err.severity() {
        Severity::Info => {
            info!(error = %err, "{message}");
            eprintln!("{message}");
            ExitCode::SUCCESS
        }
        Severity::Warning => {
            warn!(error = %err, detail = ?err, "{message}");
            eprintln!("{message}");
            ExitCode::FAILURE
        }
        Severity::Error => {
            error!(error = %err, detail = ?err, "{message}");
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, ReportError> {
    let Cli { sources, command } = cli;

    match command {
        Commands::Chemists => {
            let service = service(&sources).await;
            let chemists = service.chemists().await?;
            if chemists.is_empty() {
                warn!("Reference table has no chemists");
            }
            for chemist in &chemists {
                println!("{}", chemist.display_text());
            }
        }
        Commands::Periods => {
            let periods = service(&sources).await.periods().await?;
            let years: Vec<String> = periods.years.iter().map(u32::to_string).collect();
            let months: Vec<&str> = periods.months.iter().map(|m| m.name()).collect();
            println!("Years: {}", years.join(", "));
            println!("Months: {}", months.join(", "));
        }
        Commands::Search { query, limit } => {
            let hits = service(&sources).await.search(&query, limit).await?;
            let json = serde_json::to_string_pretty(&hits).context("could not serialize search results")?;
            println!("{json}");
        }
        Commands::Report {
            chemist,
            compare,
            year,
            month,
            no_rolling,
            html,
            csv,
            xlsx,
            session,
        } => {
            let request = ReportRequest {
                first: chemist,
                second: compare,
                filter: PeriodFilter { year, month },
                options: AggregateOptions {
                    rolling_window: (!no_rolling).then_some(ROLLING_WINDOW),
                },
            };
            let outcome = service(&sources).await.run(&request).await?;

            if outcome.report.is_empty() {
                info!(filter = %request.filter.label(), "{NO_DATA_MESSAGE}");
                println!("{NO_DATA_MESSAGE}");
                return Ok(ExitCode::SUCCESS);
            }

            for entity in outcome.report.entities() {
                let chemist = &entity.chemist;
                println!(
                    "Chemist {}: {}, {} ({} months, {} items)",
                    chemist.id,
                    chemist.name,
                    chemist.address,
                    entity.rows.len(),
                    Cell::Number(entity.total_items())
                );
            }
            println!();
            print!("{}", render_text(&outcome.table));

            if let Some(path) = html {
                std::fs::write(&path, render_html(&outcome.table))
                    .with_context(|| format!("could not write {}", path.display()))?;
                info!(path = %path.display(), "HTML table written");
            }
            if let Some(path) = csv {
                write_csv(&path, &outcome.table)?;
                info!(path = %path.display(), "CSV written");
            }
            if let Some(path) = xlsx {
                write_xlsx(&path, &outcome.table)?;
                info!(path = %path.display(), "Spreadsheet written");
            }
            if let Some(id) = session {
                let store = session_store(&sources)?;
                store
                    .set(&id, PendingDownload::new(outcome.filename.clone(), outcome.table))
                    .map_err(ReportError::Session)?;
                info!(session = %id, filename = %outcome.filename, "Report stored for export");
            }
        }
        Commands::Export { session, out } => {
            let store = session_store(&sources)?;
            let Some(pending) = store.take(&session).map_err(ReportError::Session)? else {
                warn!(session = %session, "{NO_DOWNLOAD_MESSAGE}");
                eprintln!("{NO_DOWNLOAD_MESSAGE}");
                return Ok(ExitCode::FAILURE);
            };

            let path = out.unwrap_or_else(|| PathBuf::from(&pending.filename));
            write_xlsx(&path, &pending.table)?;
            info!(path = %path.display(), created_at = %pending.created_at, "Spreadsheet exported");
            println!("{}", path.display());
        }
        Commands::Scrape {
            base_url,
            output,
            concurrency,
        } => {
            let client = BasicClient::new().context("could not build HTTP client")?;
            let client = WithHeader::user_agent(client, BROWSER_USER_AGENT)?;
            let summary = scrape::scrape(Arc::new(client), &base_url, &output, concurrency).await?;
            println!(
                "Merged {} of {} workbooks ({} rows) into {}",
                summary.merged_files,
                summary.links_found,
                summary.rows,
                output.display()
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Builds the service, with an S3 client only when a source lives in a bucket.
async fn service(sources: &SourceArgs) -> ReportService {
    let encodings = if sources.encodings.is_empty() {
        DEFAULT_ENCODINGS.to_vec()
    } else {
        sources.encodings.clone()
    };

    let mut loader = SourceLoader::new(encodings);
    if sources.data.local_path().is_none() || sources.details.local_path().is_none() {
        let config = aws_config::load_from_env().await;
        loader = loader.with_blob_store(Arc::new(S3BlobStore::new(&config)));
    }

    ReportService::new(loader, sources.data.clone(), sources.details.clone())
}

fn session_store(sources: &SourceArgs) -> Result<FileSessionStore, ReportError> {
    let dir = sources
        .session_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("chemist_report_sessions"));
    FileSessionStore::new(dir).map_err(ReportError::Session)
}
