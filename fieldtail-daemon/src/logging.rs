//! Logging initialization for fieldtail-daemon.
//!
//! Configures `tracing-subscriber` from the `[general]` section of
//! `FieldtailConfig`. The configured level applies to the fieldtail
//! crates; dependencies (HTTP client, TLS) stay at `warn`.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use fieldtail_core::config::GeneralConfig;

/// Crates whose events follow the configured level.
const FIELDTAIL_TARGETS: &[&str] = &[
    "fieldtail_core",
    "fieldtail_log_pipeline",
    "fieldtail_daemon",
];

/// Level for everything outside [`FIELDTAIL_TARGETS`].
const DEPENDENCY_LEVEL: &str = "warn";

/// Build the filter directives for `level`.
///
/// `"debug"` becomes `warn,fieldtail_core=debug,fieldtail_log_pipeline=debug,...`.
/// A level that already carries directives (contains `=` or `,`) is used as-is.
pub fn filter_directives(level: &str) -> String {
    if level.contains('=') || level.contains(',') {
        return level.to_owned();
    }
    let mut directives = DEPENDENCY_LEVEL.to_owned();
    for target in FIELDTAIL_TARGETS {
        directives.push_str(&format!(",{target}={level}"));
    }
    directives
}

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
/// `RUST_LOG` takes precedence over `config.log_level`.
///
/// # Formats
///
/// * `"json"` - Machine-parseable JSON lines (default)
/// * `"pretty"` - Human-readable colored output
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directives(&config.log_level)))
        .map_err(|e| anyhow::anyhow!("invalid log level '{}': {}", config.log_level, e))?;

    match config.log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize JSON tracing subscriber: {}", e)
                })?;
        }
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize pretty tracing subscriber: {}", e)
                })?;
        }
        _ => {
            return Err(anyhow::anyhow!(
                "unknown log format '{}', expected 'json' or 'pretty'",
                config.log_format
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_level_scopes_to_fieldtail_crates() {
        let directives = filter_directives("debug");
        assert_eq!(
            directives,
            "warn,fieldtail_core=debug,fieldtail_log_pipeline=debug,fieldtail_daemon=debug"
        );
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn explicit_directives_pass_through() {
        assert_eq!(filter_directives("info,reqwest=debug"), "info,reqwest=debug");
        assert_eq!(
            filter_directives("fieldtail_log_pipeline=trace"),
            "fieldtail_log_pipeline=trace"
        );
    }

    #[test]
    fn unknown_format_is_rejected() {
        let config = GeneralConfig {
            log_format: "xml".to_owned(),
            ..Default::default()
        };
        let err = init_tracing(&config).unwrap_err();
        assert!(err.to_string().contains("unknown log format 'xml'"));
    }
}
