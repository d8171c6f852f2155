//! Structured logging init: an `EnvFilter` derived from the configured
//! level, JSON in production, pretty for local development.

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Settings;

pub fn init_logging(settings: &Settings) -> anyhow::Result<()> {
    let level = parse_log_level(&settings.log_level)?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let registry = tracing_subscriber::registry().with(env_filter);

    if settings.log_format == "json" {
        let layer = fmt::layer()
            .json()
            .with_target(true)
            .with_line_number(settings.log_include_stacktrace)
            .with_file(settings.log_include_stacktrace);
        registry.with(layer).init();
    } else {
        let layer = fmt::layer()
            .pretty()
            .with_target(true)
            .with_line_number(settings.log_include_stacktrace);
        registry.with(layer).init();
    }

    Ok(())
}

fn parse_log_level(level: &str) -> anyhow::Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(anyhow::anyhow!("invalid log level: {level}")),
    }
}
