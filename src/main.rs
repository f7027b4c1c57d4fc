//! tg-export - incrementally export Telegram chat history to JSONL.
//!
//! Exports are append-only and resumable: re-running an export only appends
//! messages newer than the last one already in the log.
//!
//!   tg-export authenticate
//!   tg-export export --chat @group --out group.jsonl --last 2d
//!   tg-export quick-export --chat https://t.me/group --hours 6
//!   tg-export sync --chat @group --out group.jsonl --every 10m
//!   tg-export clean --input group.jsonl

mod application;
mod cli;
mod domain;
mod infrastructure;

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{
    convert_to_clean_format, default_output_path, format_clean_stats, format_export_summary,
    format_inspection_table, format_sample, run_quick_export, sample_lines, CleanFormat,
    CleanOptions, ExportRequest, ExportService, JobTracker, LogInspection, LogProgress,
    OutputFormat, QuickExportRequest, SyncSchedule, SyncService, TokioSleeper,
};
use cli::{Cli, Commands};
use domain::{AppConfig, AppError, Result};
use infrastructure::{
    config_file_path, ensure_config_exists, install_signal_handler, load_config, read_records,
    save_config, serve, Credentials, GatewayClient, ServerState, SessionStore,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Main application logic.
async fn run(cli: Cli) -> Result<()> {
    if let Commands::Config { init, force } = cli.command {
        return cmd_config(cli.config.as_deref(), init, force);
    }

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Authenticate { phone } => cmd_authenticate(&config, phone).await,
        Commands::Export {
            chat,
            out,
            since,
            last,
        } => {
            let cutoff = cli::export_cutoff(since, last, Utc::now()).map_err(AppError::config)?;
            cmd_export(
                &config,
                ExportRequest {
                    locator: chat,
                    output: out,
                    cutoff,
                },
            )
            .await
        }
        Commands::QuickExport {
            chat,
            hours,
            clean,
            raw,
        } => {
            cmd_quick_export(
                &config,
                QuickExportRequest {
                    locator: chat,
                    hours,
                    clean: Commands::wants_clean(clean, raw),
                },
            )
            .await
        }
        Commands::Sync { chat, out, every } => cmd_sync(&config, chat, out, every).await,
        Commands::Clean {
            input,
            output,
            format,
            keep_bots,
        } => cmd_clean(&input, output, format, keep_bots),
        Commands::Inspect { log, format } => cmd_inspect(&log, &format),
        Commands::Serve { port } => cmd_serve(&config, port).await,
        Commands::Config { .. } => Ok(()),
    }
}

/// Pre-flight checks, then a gateway client bound to the stored session.
///
/// Fails before any network call when credentials or the session are missing.
fn connect(config: &AppConfig) -> Result<GatewayClient> {
    Credentials::from_env()?;
    let session = SessionStore::new(&config.paths.session_file).load()?;
    GatewayClient::new(&config.remote, Some(&session))
}

fn export_service(config: &AppConfig) -> Result<ExportService<GatewayClient, TokioSleeper>> {
    Ok(ExportService::new(
        connect(config)?,
        TokioSleeper,
        config.export.clone(),
    ))
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    std::io::stdout()
        .flush()
        .map_err(|e| AppError::io("Failed to flush stdout", e))?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| AppError::io("Failed to read from stdin", e))?;

    let value = line.trim().to_string();
    if value.is_empty() {
        return Err(AppError::config(format!("No value entered for '{}'", label.trim_end_matches([':', ' ']))));
    }
    Ok(value)
}

/// Log in through the gateway and store the session token.
async fn cmd_authenticate(config: &AppConfig, phone: Option<String>) -> Result<()> {
    let credentials = Credentials::from_env()?;
    let store = SessionStore::new(&config.paths.session_file);

    let phone = match phone {
        Some(phone) => phone,
        None => prompt("Phone number: ")?,
    };

    let client = GatewayClient::new(&config.remote, None)?;
    let code_hash = client.send_code(&credentials, &phone).await?;
    let code = prompt("Login code: ")?;
    let token = client
        .export_session(&credentials, &phone, &code_hash, &code)
        .await?;

    store.save(&token)?;
    println!(
        "{} Session saved to {}",
        "✓".green().bold(),
        store.path().display()
    );

    Ok(())
}

/// Export (or resume) a chat into a log.
async fn cmd_export(config: &AppConfig, request: ExportRequest) -> Result<()> {
    let service = export_service(config)?;
    let summary = service.run(&request, &LogProgress).await?;

    println!("{}", format_export_summary(&summary, &request.output));
    Ok(())
}

/// Export the last N hours into the quick-export directory.
async fn cmd_quick_export(config: &AppConfig, request: QuickExportRequest) -> Result<()> {
    let service = export_service(config)?;
    let outcome = run_quick_export(&service, &config.paths.quick_dir, &request, &LogProgress).await?;

    println!("{} {}", "✓".green().bold(), outcome.describe());
    println!("{}", format_export_summary(&outcome.summary, &outcome.path));
    Ok(())
}

/// Re-export on an interval until the process is stopped.
async fn cmd_sync(config: &AppConfig, chat: String, out: PathBuf, every: Duration) -> Result<()> {
    let schedule = SyncSchedule::new(
        every,
        Duration::from_secs(config.sync.min_interval_secs),
        Duration::from_secs(config.sync.max_jitter_secs),
    );
    if schedule.effective_interval() > every {
        tracing::warn!(
            requested_secs = every.as_secs(),
            effective_secs = schedule.effective_interval().as_secs(),
            "Sync interval raised to the configured minimum"
        );
    }

    let request = ExportRequest {
        locator: chat,
        output: out,
        cutoff: None,
    };
    let service = SyncService::new(export_service(config)?, request, schedule);

    println!(
        "{} Syncing every {}s (Ctrl+C to stop)",
        "⟳".cyan().bold(),
        schedule.effective_interval().as_secs()
    );
    service.run_forever().await;

    Ok(())
}

/// Convert a log into a cleaned transcript.
fn cmd_clean(input: &Path, output: Option<PathBuf>, format: CleanFormat, keep_bots: bool) -> Result<()> {
    let output = output.unwrap_or_else(|| default_output_path(input, format));
    let options = CleanOptions {
        filter_bots: !keep_bots,
        format,
    };

    let stats = convert_to_clean_format(input, &output, options)?;
    println!("{}", format_clean_stats(&stats, &output));

    let sample = sample_lines(&output, 5)?;
    if !sample.is_empty() {
        println!();
        println!("{}", format_sample(&sample));
    }

    Ok(())
}

/// Print statistics about a log.
fn cmd_inspect(log: &Path, format: &str) -> Result<()> {
    let format: OutputFormat = format.parse().map_err(AppError::config)?;
    let records = read_records(log)?;
    let inspection = LogInspection::from_records(&records);

    let output = match format {
        OutputFormat::Table => format_inspection_table(log, &inspection),
        OutputFormat::Json => serde_json::to_string_pretty(&inspection).map_err(AppError::json_parse)?,
    };

    println!("{output}");
    Ok(())
}

/// Run the status server until Ctrl+C.
async fn cmd_serve(config: &AppConfig, port: u16) -> Result<()> {
    let shutdown = install_signal_handler();
    let service = export_service(config)?.with_cancellation(shutdown.clone());

    let state = ServerState {
        export: Arc::new(service),
        tracker: JobTracker::new(),
        quick_dir: Arc::new(config.paths.quick_dir.clone()),
    };

    println!(
        "{} Status server on http://127.0.0.1:{port}",
        "🌐".bold()
    );
    serve(state, port, shutdown).await
}

/// Show configuration or write the default file.
fn cmd_config(explicit: Option<&Path>, init: bool, force: bool) -> Result<()> {
    let path = explicit.map_or_else(config_file_path, Path::to_path_buf);

    if init {
        if force {
            save_config(&AppConfig::default(), &path)?;
            println!("{} Wrote default config to {}", "✓".green().bold(), path.display());
        } else if ensure_config_exists(&path)? {
            println!("{} Created {}", "✓".green().bold(), path.display());
        } else {
            println!("Config already exists at {} (use --force to overwrite)", path.display());
        }
        return Ok(());
    }

    let config = load_config(explicit)?;
    let rendered = toml::to_string_pretty(&config)
        .map_err(|e| AppError::config(format!("Failed to render config: {e}")))?;

    println!("{} {}", "📄 Config:".bold(), path.display());
    if !path.exists() {
        println!("   (not created yet, showing defaults; run 'tg-export config --init')");
    }
    println!();
    println!("{rendered}");

    Ok(())
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
