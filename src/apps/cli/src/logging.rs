//! Logging Configuration
//!
//! Library crates log through the `log` facade; the subscriber installed here
//! also receives those records. Output goes to stderr so stdout carries only
//! the streamed completion.

use tracing_subscriber::EnvFilter;

pub const LOG_LEVEL_ENV: &str = "TARX_LOG_LEVEL";

const LOG_TARGETS: [&str; 3] = ["tarx_core", "tarx_ai_adapters", "tarx_cli"];

pub fn parse_log_level(value: &str) -> Option<log::LevelFilter> {
    match value.trim().to_lowercase().as_str() {
        "trace" => Some(log::LevelFilter::Trace),
        "debug" => Some(log::LevelFilter::Debug),
        "info" => Some(log::LevelFilter::Info),
        "warn" => Some(log::LevelFilter::Warn),
        "error" => Some(log::LevelFilter::Error),
        "off" => Some(log::LevelFilter::Off),
        _ => None,
    }
}

pub fn level_to_str(level: log::LevelFilter) -> &'static str {
    match level {
        log::LevelFilter::Trace => "trace",
        log::LevelFilter::Debug => "debug",
        log::LevelFilter::Info => "info",
        log::LevelFilter::Warn => "warn",
        log::LevelFilter::Error => "error",
        log::LevelFilter::Off => "off",
    }
}

/// Level from the command line, then `TARX_LOG_LEVEL`, then `warn`
/// (`debug` with `--verbose`).
pub fn resolve_level(cli_value: Option<&str>, verbose: bool) -> log::LevelFilter {
    let fallback = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };

    let (source, value) = match cli_value {
        Some(value) => ("--log-level", value.to_string()),
        None => match std::env::var(LOG_LEVEL_ENV) {
            Ok(value) => (LOG_LEVEL_ENV, value),
            Err(_) => return fallback,
        },
    };

    parse_log_level(&value).unwrap_or_else(|| {
        eprintln!(
            "Warning: Invalid {} '{}', falling back to default",
            source, value
        );
        fallback
    })
}

pub fn init_logging(level: log::LevelFilter) {
    let level = level_to_str(level);
    let directives = LOG_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",");

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directives))
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
