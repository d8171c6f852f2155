mod bootstrap;

use std::net::SocketAddr;
use std::process::ExitCode;

use anypod_api::{admin_router, public_router, AppState};
use anypod_core::config::Settings;
use clap::Parser;
use tokio::signal;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "anypod")]
struct Cli {
    /// Path to the settings file (YAML), overridden by `APP_*` environment
    /// variables.
    #[arg(long, env = "ANYPOD_SETTINGS")]
    settings: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load(cli.settings.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(1);
        }
    };
    if let Err(errors) = settings.validate() {
        for err in &errors {
            eprintln!("configuration error: {err}");
        }
        return ExitCode::from(1);
    }

    if let Err(e) = anypod_core::logging::init_logging(&settings) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::from(1);
    }
    info!("anypod starting");

    let bootstrapped = match bootstrap::bootstrap(&settings).await {
        Ok(b) => b,
        Err(e) => {
            error!(error = %e, "startup failed");
            return ExitCode::from(1);
        }
    };

    let cron_handles = bootstrapped.scheduler.spawn_cron_triggers();
    info!(triggers = cron_handles.len(), "registered cron-scheduled feeds");

    let state = AppState::new(
        bootstrapped.store,
        bootstrapped.paths,
        bootstrapped.extractor,
        settings.max_errors,
        bootstrapped.scheduler,
        bootstrapped.feed_configs,
    );

    let public_addr = SocketAddr::new(settings.server_host.parse().unwrap_or_else(|_| [0, 0, 0, 0].into()), settings.server_port);
    let admin_addr = SocketAddr::new(settings.server_host.parse().unwrap_or_else(|_| [0, 0, 0, 0].into()), settings.admin_server_port);

    let public_listener = match tokio::net::TcpListener::bind(public_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, addr = %public_addr, "failed to bind public listener");
            return ExitCode::from(1);
        }
    };
    let admin_listener = match tokio::net::TcpListener::bind(admin_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, addr = %admin_addr, "failed to bind admin listener");
            return ExitCode::from(1);
        }
    };

    info!(%public_addr, %admin_addr, "listening");
    let public_server = axum::serve(public_listener, public_router(state.clone()));
    let admin_server = axum::serve(admin_listener, admin_router(state));

    tokio::select! {
        result = public_server => {
            if let Err(e) = result {
                error!(error = %e, "public server exited with an error");
            }
        }
        result = admin_server => {
            if let Err(e) = result {
                error!(error = %e, "admin server exited with an error");
            }
        }
        _ = wait_for_shutdown_signal() => {
            info!("shutdown signal received");
        }
    }

    for handle in cron_handles {
        handle.abort();
    }

    ExitCode::from(0)
}

/// Waits for either Ctrl+C or SIGTERM. A second signal while already
/// shutting down is left to the OS (double Ctrl+C kills the process), which
/// matches the "cancelled" exit path described for the CLI entry point.
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
