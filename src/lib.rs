// src/lib.rs

pub mod blocks;
pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod robot;
pub mod server;
pub mod service;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::validate::parse_listen;
use crate::config::{ConfigFile, load_or_default};
use crate::exec::RealProcessBackend;
use crate::fs::RealFileSystem;
use crate::server::AppState;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (plus the `--listen` override)
/// - the execution services on the real process backend
/// - the robot executor and status store
/// - the HTTP server
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let mut cfg = load_or_default(args.config.as_deref().map(Path::new))
        .context("failed to load configuration")?;

    if let Some(listen) = args.listen.as_deref() {
        cfg = cfg.with_listen(parse_listen(listen)?);
    }

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let state = AppState::from_config(
        &cfg,
        Arc::new(RealFileSystem),
        Arc::new(RealProcessBackend),
    );

    let listener = TcpListener::bind(cfg.listen_addr())
        .await
        .with_context(|| format!("failed to bind {}", cfg.listen_addr()))?;

    server::serve(listener, state, shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("failed to listen for Ctrl+C: {e}");
        // Without a signal handler, run until the process is killed.
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

/// Simple dry-run output: print the resolved configuration.
fn print_dry_run(cfg: &ConfigFile) {
    println!("blockbot dry-run");
    println!("  server.listen = {}", cfg.listen_addr());
    println!();

    let exec = &cfg.execution;
    println!("execution:");
    println!("  default_timeout_ms = {}", exec.default_timeout_ms);
    println!("  temp_dir = {}", exec.temp_dir().display());
    println!("  python = {}", exec.interpreter_for(types::Language::Python));
    println!("  node = {}", exec.interpreter_for(types::Language::JavaScript));
    println!();

    println!("packages:");
    println!("  timeout_ms = {}", cfg.packages.timeout_ms);
    println!(
        "  requirements_file = {}",
        cfg.packages.requirements_file.display()
    );
    println!();

    let term = &cfg.terminal;
    println!("terminal:");
    println!("  default_timeout_ms = {}", term.default_timeout_ms);
    if let Some(ref shell) = term.shell {
        println!("  shell = {shell}");
    }
    if let Some(ref dir) = term.default_dir {
        println!("  default_dir = {}", dir.display());
    }
    println!();

    println!("robot:");
    println!("  move_power = {}", cfg.robot.move_power);

    debug!("dry-run complete (server not started)");
}
