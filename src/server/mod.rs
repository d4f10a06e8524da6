// src/server/mod.rs

//! HTTP surface.
//!
//! - [`AppState`] bundles the services behind `Arc`s; handlers clone it.
//! - [`build_router`] wires every endpoint plus the access-log middleware.
//! - [`serve`] runs the router on an already-bound listener until the
//!   shutdown future resolves.
//!
//! Ordinary execution failures are HTTP 200 with `success: false`. Only an
//! unreadable request body (or an unexpected internal failure) becomes a 500.

mod handlers;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ConfigFile;
use crate::exec::ProcessBackend;
use crate::fs::FileSystem;
use crate::robot::{SequentialExecutor, StatusStore};
use crate::service::{CodeExecutionService, PackageInstaller, TerminalEmulator};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub code: Arc<CodeExecutionService>,
    pub packages: Arc<PackageInstaller>,
    pub terminal: Arc<TerminalEmulator>,
    pub robot: Arc<SequentialExecutor>,
}

impl AppState {
    /// Build every service from the validated configuration.
    pub fn from_config(
        config: &ConfigFile,
        fs: Arc<dyn FileSystem>,
        backend: Arc<dyn ProcessBackend>,
    ) -> Self {
        let status = Arc::new(StatusStore::new());
        Self {
            code: Arc::new(CodeExecutionService::new(
                config.execution.clone(),
                Arc::clone(&backend),
            )),
            packages: Arc::new(PackageInstaller::new(
                &config.execution,
                &config.packages,
                Arc::clone(&fs),
                Arc::clone(&backend),
            )),
            terminal: Arc::new(TerminalEmulator::new(config.terminal.clone(), fs, backend)),
            robot: Arc::new(SequentialExecutor::new(status, config.robot.move_power)),
        }
    }

    pub fn status(&self) -> &Arc<StatusStore> {
        self.robot.status()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz_handler))
        .route("/api/execute", post(handlers::execute_handler))
        .route(
            "/api/packages",
            get(handlers::list_packages_handler).post(handlers::install_packages_handler),
        )
        .route("/api/terminal", post(handlers::terminal_handler))
        .route("/api/blocks/compile", post(handlers::compile_blocks_handler))
        .route("/api/robot/connect", post(handlers::robot_connect_handler))
        .route("/api/robot/disconnect", post(handlers::robot_disconnect_handler))
        .route("/api/robot/run", post(handlers::robot_run_handler))
        .route("/api/robot/stop", post(handlers::robot_stop_handler))
        .route("/api/robot/status", get(handlers::robot_status_handler))
        .layer(middleware::from_fn(handlers::access_log_middleware))
        .with_state(state)
}

/// Serve `state` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "blockbot listening");
    }
    let robot = Arc::clone(&state.robot);
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    // Leave the motors stopped when the server goes away mid-program.
    robot.disconnect();
    info!("blockbot server stopped");
    Ok(())
}
