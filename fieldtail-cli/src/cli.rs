//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// fieldtail -- operator commands for the log ingestion pipeline.
///
/// Commands act directly on the SQLite database named in the
/// configuration. A running daemon picks up rule changes on its next
/// cache reload.
#[derive(Parser, Debug)]
#[command(name = "fieldtail", version, about, long_about = None)]
pub struct Cli {
    /// Path to the fieldtail.toml configuration file.
    #[arg(short, long, default_value = "fieldtail.toml", global = true)]
    pub config: PathBuf,

    /// Override the SQLite database path.
    #[arg(long, global = true)]
    pub db_path: Option<String>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage parsing rules.
    Rules(RulesArgs),

    /// Manage value labels.
    Labels(LabelsArgs),

    /// Inspect and acknowledge alerts.
    Alerts(AlertsArgs),

    /// Inspect stored events.
    Events(EventsArgs),

    /// Run a line through the rules and parser without storing anything.
    Preview(PreviewArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- rules ----

/// Manage parsing rules.
#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub action: RulesAction,
}

/// Rule definition given inline or from a file.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct RuleInput {
    /// Rule as a JSON object.
    #[arg(long)]
    pub json: Option<String>,

    /// Path to a JSON file containing the rule.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum RulesAction {
    /// List all rules in evaluation order.
    List,
    /// Create a rule.
    Add(RuleInput),
    /// Replace an existing rule.
    Update {
        /// Rule ID.
        id: i64,
        #[command(flatten)]
        input: RuleInput,
    },
    /// Delete a rule.
    Delete {
        /// Rule ID.
        id: i64,
    },
    /// Export all rules and labels as a JSON bundle.
    Export {
        /// Write the bundle to this file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Import a JSON bundle of rules and labels.
    Import {
        /// Path to the bundle file.
        path: PathBuf,
    },
}

// ---- labels ----

/// Manage value labels.
#[derive(Args, Debug)]
pub struct LabelsArgs {
    #[command(subcommand)]
    pub action: LabelsAction,
}

#[derive(Subcommand, Debug)]
pub enum LabelsAction {
    /// List all labels.
    List,
    /// Create or replace the label of one value position.
    Set {
        /// Device ID.
        #[arg(long)]
        device: String,
        /// Group number.
        #[arg(long)]
        grp: i64,
        /// Value position (0-based).
        #[arg(long)]
        idx: usize,
        /// Label text.
        #[arg(long)]
        label: String,
        /// Unit of measure.
        #[arg(long)]
        unit: Option<String>,
        /// Free-form note.
        #[arg(long)]
        note: Option<String>,
    },
    /// Suggest labels from the stored value profile.
    Suggest {
        /// Device ID.
        #[arg(long)]
        device: String,
        /// Group number.
        #[arg(long)]
        grp: i64,
    },
}

// ---- alerts ----

/// Inspect and acknowledge alerts.
#[derive(Args, Debug)]
pub struct AlertsArgs {
    #[command(subcommand)]
    pub action: AlertsAction,
}

#[derive(Subcommand, Debug)]
pub enum AlertsAction {
    /// List recent alerts, newest first.
    List {
        /// Maximum number of alerts.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Acknowledge an alert.
    Ack {
        /// Alert ID.
        id: i64,
    },
}

// ---- events ----

/// Inspect stored events.
#[derive(Args, Debug)]
pub struct EventsArgs {
    #[command(subcommand)]
    pub action: EventsAction,
}

#[derive(Subcommand, Debug)]
pub enum EventsAction {
    /// Show the most recent events, newest first.
    Recent {
        /// Maximum number of events.
        #[arg(long)]
        limit: Option<usize>,
    },
}

// ---- preview ----

/// Run a line through the rules and parser.
#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// The raw log line.
    pub line: String,

    /// File path used for FILE-scoped rules.
    #[arg(long, default_value = "")]
    pub file: String,

    /// Also apply DRAFT rules.
    #[arg(long)]
    pub drafts: bool,
}

// ---- config ----

/// Manage fieldtail configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, ingest, rules, alert,
        /// storage, notifier, broadcast, metrics).
        #[arg(long)]
        section: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parse_rules_add_json() {
        let cli = Cli::try_parse_from([
            "fieldtail",
            "rules",
            "add",
            "--json",
            r#"{"rule_type":"IGNORE_LINE_REGEX","pattern":"^#"}"#,
        ])
        .expect("parse succeeded");
        match cli.command {
            Commands::Rules(RulesArgs {
                action: RulesAction::Add(input),
            }) => {
                assert!(input.json.is_some());
                assert!(input.file.is_none());
            }
            _ => panic!("expected rules add"),
        }
    }

    #[test]
    fn test_cli_rules_add_requires_input() {
        assert!(Cli::try_parse_from(["fieldtail", "rules", "add"]).is_err());
    }

    #[test]
    fn test_cli_rules_add_rejects_both_inputs() {
        let result = Cli::try_parse_from([
            "fieldtail", "rules", "add", "--json", "{}", "--file", "rule.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_rules_update() {
        let cli = Cli::try_parse_from(["fieldtail", "rules", "update", "3", "--file", "r.json"])
            .expect("parse succeeded");
        match cli.command {
            Commands::Rules(RulesArgs {
                action: RulesAction::Update { id, input },
            }) => {
                assert_eq!(id, 3);
                assert_eq!(input.file, Some(PathBuf::from("r.json")));
            }
            _ => panic!("expected rules update"),
        }
    }

    #[test]
    fn test_cli_parse_labels_set() {
        let cli = Cli::try_parse_from([
            "fieldtail", "labels", "set", "--device", "DEV_A", "--grp", "2", "--idx", "1",
            "--label", "temp", "--unit", "C",
        ])
        .expect("parse succeeded");
        match cli.command {
            Commands::Labels(LabelsArgs {
                action: LabelsAction::Set { device, idx, unit, note, .. },
            }) => {
                assert_eq!(device, "DEV_A");
                assert_eq!(idx, 1);
                assert_eq!(unit.as_deref(), Some("C"));
                assert!(note.is_none());
            }
            _ => panic!("expected labels set"),
        }
    }

    #[test]
    fn test_cli_parse_preview_defaults() {
        let cli = Cli::try_parse_from(["fieldtail", "preview", "DEV_A;1;2;3"])
            .expect("parse succeeded");
        match cli.command {
            Commands::Preview(args) => {
                assert_eq!(args.line, "DEV_A;1;2;3");
                assert_eq!(args.file, "");
                assert!(!args.drafts);
            }
            _ => panic!("expected preview"),
        }
    }

    #[test]
    fn test_cli_global_output_json() {
        let cli = Cli::try_parse_from(["fieldtail", "alerts", "list", "--output", "json"])
            .expect("parse succeeded");
        assert!(matches!(cli.output, OutputFormat::Json));
    }

    #[test]
    fn test_cli_global_db_path_after_subcommand() {
        let cli = Cli::try_parse_from(["fieldtail", "events", "recent", "--db-path", "/tmp/x.db"])
            .expect("parse succeeded");
        assert_eq!(cli.db_path.as_deref(), Some("/tmp/x.db"));
    }

    #[test]
    fn test_cli_parse_config_show_section() {
        let cli = Cli::try_parse_from(["fieldtail", "config", "show", "--section", "storage"])
            .expect("parse succeeded");
        match cli.command {
            Commands::Config(ConfigArgs {
                action: ConfigAction::Show { section },
            }) => assert_eq!(section.as_deref(), Some("storage")),
            _ => panic!("expected config show"),
        }
    }

    #[test]
    fn test_cli_invalid_subcommand() {
        assert!(Cli::try_parse_from(["fieldtail", "scan"]).is_err());
    }
}
