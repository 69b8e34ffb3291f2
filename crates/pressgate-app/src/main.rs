// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pressgate: print dispatch engine and HTTP print gateway.
//
// Entry point. Initialises logging, loads configuration, and runs one
// subcommand.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use pressgate_app::{AppServices, AppState, build_router};
use pressgate_core::config::default_data_dir;
use pressgate_core::error::{PressgateError, Result};
use pressgate_core::types::{DeviceProfile, ImageSource, PrintRequest, SubmissionKey};

#[derive(Debug, Parser)]
#[command(name = "pressgate", version)]
#[command(about = "Pressgate - print dispatch and device resolution", long_about = None)]
struct Cli {
    /// Data directory holding config.json, printers.json and renders/.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Reconcile device queues, then serve the HTTP gateway
    Serve {
        /// Override the configured bind address
        #[arg(long)]
        bind: Option<String>,
    },
    /// Print an image file or URL
    Print {
        /// Path or http(s) URL
        source: String,
        #[arg(long)]
        high_quality: bool,
        /// Submission key; reuse it when retrying the same print
        #[arg(long)]
        key: Option<String>,
    },
    /// List reported devices, profiles by priority, and the resolved device
    Devices,
    /// Cancel queued jobs and re-enable devices (all when none given)
    Reconcile { devices: Vec<String> },
    /// Create or replace a device profile
    Profile {
        name: String,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long, default_value_t = 0)]
        priority: i32,
        /// Print option as key=value; repeatable
        #[arg(short = 'o', long = "option", value_parser = parse_option)]
        options: Vec<(String, String)>,
    },
    /// Set the default device
    Default { name: String },
}

fn parse_option(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        None if !raw.is_empty() => Ok((raw.to_string(), String::new())),
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "pressgate failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    let services = AppServices::init(&data_dir)?;
    let engine = services.engine();

    match cli.command {
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| services.config().server.bind.clone());
            serve(&services, &bind).await?;
        }
        Commands::Print {
            source,
            high_quality,
            key,
        } => {
            let source = if source.starts_with("http://") || source.starts_with("https://") {
                ImageSource::Url(source)
            } else {
                ImageSource::Bytes(tokio::fs::read(&source).await?)
            };
            let mut request = PrintRequest::new(source, high_quality);
            if let Some(key) = key {
                request = request.with_key(SubmissionKey(key));
            }
            let result = engine.print(request).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Devices => {
            let devices = engine.available_devices().await?;
            let resolved = engine.preview_resolution().await?;
            let registry = engine.registry_state().await;
            let profiles: Vec<_> = registry
                .profiles_by_priority()
                .into_iter()
                .map(|p| serde_json::json!({ "name": p.name, "priority": p.priority }))
                .collect();
            let out = serde_json::json!({
                "devices": devices,
                "profiles": profiles,
                "resolved": resolved,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Commands::Reconcile { devices } => {
            let outcomes = engine.reconcile(&devices).await?;
            println!("{}", serde_json::to_string_pretty(&outcomes)?);
        }
        Commands::Profile {
            name,
            display_name,
            priority,
            options,
        } => {
            let display_name = display_name.unwrap_or_else(|| name.clone());
            let mut profile = DeviceProfile::new(name, display_name).with_priority(priority);
            profile.options.extend(options);
            let state = engine.upsert_profile(profile).await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Commands::Default { name } => {
            let state = engine.set_default_device(name).await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn serve(services: &AppServices, bind: &str) -> Result<()> {
    let outcomes = services.engine().startup().await;
    info!(devices = outcomes.len(), "start-up reconciliation done");

    let app = build_router(AppState::from_services(services));
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %bind, mode = %services.engine().mode(), "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(PressgateError::Io)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "could not install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "could not install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl-C, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
