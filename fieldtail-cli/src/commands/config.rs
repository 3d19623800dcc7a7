//! `fieldtail config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use fieldtail_core::config::FieldtailConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Section names accepted by `config show --section`.
pub const SECTIONS: [&str; 8] = [
    "general",
    "ingest",
    "rules",
    "alert",
    "storage",
    "notifier",
    "broadcast",
    "metrics",
];

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    db_path: Option<&str>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => {
            let config = super::load_config(config_path, db_path).await?;
            let report = show_report(config, &config_path.display().to_string(), section.as_deref())?;
            writer.render(&report)
        }
    }
}

/// Load and validate the configuration file, reporting any errors.
///
/// Unlike other commands, a missing file is an error here.
async fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let report = validate_report(config_path).await;
    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }
    Ok(())
}

/// Build the validation report for `config_path`.
pub async fn validate_report(config_path: &Path) -> ConfigValidationReport {
    let errors = match FieldtailConfig::load(config_path).await {
        Ok(_) => Vec::new(),
        Err(e) => vec![e.to_string()],
    };
    ConfigValidationReport {
        source: config_path.display().to_string(),
        valid: errors.is_empty(),
        errors,
    }
}

/// Build the display report, optionally narrowed to one section.
///
/// The webhook URL is redacted before rendering.
pub fn show_report(
    mut config: FieldtailConfig,
    source: &str,
    section: Option<&str>,
) -> Result<ConfigReport, CliError> {
    config.notifier.webhook_url = redact_webhook_url(&config.notifier.webhook_url);

    let full = toml::Value::try_from(&config)
        .map_err(|e| CliError::Command(format!("failed to serialize config: {e}")))?;

    let (value, config_toml) = match section {
        None => (
            full.clone(),
            toml::to_string_pretty(&full)
                .map_err(|e| CliError::Command(format!("failed to serialize config: {e}")))?,
        ),
        Some(name) => {
            let Some(value) = full.get(name).filter(|_| SECTIONS.contains(&name)) else {
                return Err(CliError::Command(format!(
                    "unknown section: {} (expected: {})",
                    name,
                    SECTIONS.join(", ")
                )));
            };
            (
                value.clone(),
                toml::to_string_pretty(value)
                    .map_err(|e| CliError::Command(format!("failed to serialize config: {e}")))?,
            )
        }
    };

    Ok(ConfigReport {
        source: source.to_owned(),
        section: section.map(str::to_owned),
        config: value,
        config_toml,
    })
}

/// Hide the path (and any credentials) of a webhook URL.
///
/// Chat webhook URLs carry their secret token in the path, so only the
/// scheme and host are kept.
pub fn redact_webhook_url(url: &str) -> String {
    if url.is_empty() {
        return url.to_owned();
    }
    let Some(scheme_end) = url.find("://") else {
        return "***REDACTED***".to_owned();
    };
    let scheme = &url[..scheme_end + 3];
    let rest = &url[scheme_end + 3..];
    let authority = rest.split('/').next().unwrap_or_default();
    let host = authority.rsplit('@').next().unwrap_or_default();
    format!("{scheme}{host}/***REDACTED***")
}

/// Configuration display report.
#[derive(Debug, Serialize)]
pub struct ConfigReport {
    /// Configuration file path
    pub source: String,
    /// Optional section name (None = full config)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Effective configuration values
    pub config: toml::Value,
    /// Serialized TOML, used for text rendering only
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(ref section) = self.section {
            let section_label = format!("[{}]", section);
            writeln!(
                w,
                "Configuration {} (source: {})",
                section_label.bold(),
                self.source
            )?;
        } else {
            writeln!(w, "Configuration (source: {})", self.source.bold())?;
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;

        Ok(())
    }
}

/// Configuration validation report.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    /// Configuration file path
    pub source: String,
    /// Whether the configuration is valid
    pub valid: bool,
    /// Validation error messages (empty if valid)
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;

        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_webhook_url() {
        assert_eq!(redact_webhook_url(""), "");
        assert_eq!(
            redact_webhook_url("https://hooks.example.com/services/T000/B000/secret"),
            "https://hooks.example.com/***REDACTED***"
        );
        assert_eq!(
            redact_webhook_url("https://user:pw@hooks.example.com:8443/x"),
            "https://hooks.example.com:8443/***REDACTED***"
        );
        assert_eq!(redact_webhook_url("not-a-url"), "***REDACTED***");
    }

    #[test]
    fn test_show_full_config_redacts_webhook() {
        let mut config = FieldtailConfig::default();
        config.notifier.webhook_url = "https://hooks.example.com/secret-token".to_owned();

        let report = show_report(config, "fieldtail.toml", None).unwrap();
        assert!(report.section.is_none());
        assert!(report.config_toml.contains("[notifier]"));
        assert!(!report.config_toml.contains("secret-token"));
        assert!(report.config_toml.contains("***REDACTED***"));
    }

    #[test]
    fn test_show_single_section() {
        let report = show_report(FieldtailConfig::default(), "x.toml", Some("storage")).unwrap();
        assert_eq!(report.section.as_deref(), Some("storage"));
        assert!(report.config_toml.contains("retention_days = 30"));
        assert!(!report.config_toml.contains("webhook_url"));
        assert_eq!(
            report.config.get("db_path").and_then(toml::Value::as_str),
            Some("./data.db")
        );
    }

    #[test]
    fn test_show_unknown_section() {
        let err = show_report(FieldtailConfig::default(), "x.toml", Some("database")).unwrap_err();
        assert!(err.to_string().contains("unknown section: database"));
    }

    #[test]
    fn test_validation_report_rendering() {
        let report = ConfigValidationReport {
            source: "bad.toml".to_owned(),
            valid: false,
            errors: vec!["general.log_level: must be one of".to_owned()],
        };
        let mut buf = Vec::new();
        report.render_text(&mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(out.contains("INVALID"));
        assert!(out.contains("general.log_level"));
    }
}
