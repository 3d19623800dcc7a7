//! `fieldtail rules` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use fieldtail_log_pipeline::admin::{Bundle, ImportReport};
use fieldtail_log_pipeline::{AdminService, Rule, RuleDraft, RuleScope};

use crate::cli::{RuleInput, RulesAction, RulesArgs};
use crate::commands::ACTOR;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, truncate};

/// Execute the `rules` command.
pub fn execute(
    args: RulesArgs,
    admin: &AdminService,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        RulesAction::List => writer.render(&list(admin)?),
        RulesAction::Add(input) => {
            let draft = read_draft(&input)?;
            writer.render(&RuleChange::created(admin.create_rule(ACTOR, &draft)?))
        }
        RulesAction::Update { id, input } => {
            let draft = read_draft(&input)?;
            writer.render(&RuleChange::updated(admin.update_rule(ACTOR, id, &draft)?))
        }
        RulesAction::Delete { id } => {
            admin.delete_rule(ACTOR, id)?;
            writer.render(&RuleDeleted { id })
        }
        RulesAction::Export { out } => {
            let bundle = admin.export_bundle()?;
            match out {
                Some(path) => {
                    write_bundle(&bundle, &path)?;
                    writer.render(&ExportReport {
                        path: path.display().to_string(),
                        rules: bundle.rules.len(),
                        labels: bundle.labels.len(),
                    })
                }
                // The bundle itself is the output; always JSON so it can be re-imported.
                None => {
                    let stdout = std::io::stdout();
                    let mut handle = stdout.lock();
                    serde_json::to_writer_pretty(&mut handle, &bundle)?;
                    writeln!(handle)?;
                    Ok(())
                }
            }
        }
        RulesAction::Import { path } => {
            let bundle = read_bundle(&path)?;
            let report = admin.import_bundle(ACTOR, &bundle)?;
            writer.render(&ImportSummary {
                path: path.display().to_string(),
                report,
            })
        }
    }
}

/// Build the rule listing.
pub fn list(admin: &AdminService) -> Result<RuleListReport, CliError> {
    let rules = admin.list_rules()?;
    Ok(RuleListReport {
        total: rules.len(),
        rules,
    })
}

/// Parse a rule definition from `--json` or `--file`.
pub fn read_draft(input: &RuleInput) -> Result<RuleDraft, CliError> {
    let text = match (&input.json, &input.file) {
        (Some(json), _) => json.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => {
            return Err(CliError::Invalid(
                "either --json or --file is required".to_owned(),
            ));
        }
    };
    serde_json::from_str(&text).map_err(|e| CliError::Invalid(format!("rule JSON: {e}")))
}

/// Read a bundle file.
pub fn read_bundle(path: &Path) -> Result<Bundle, CliError> {
    info!(path = %path.display(), "reading bundle");
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| CliError::Invalid(format!("bundle JSON: {e}")))
}

/// Write a bundle file as pretty JSON.
pub fn write_bundle(bundle: &Bundle, path: &Path) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(bundle)?;
    std::fs::write(path, json + "\n")?;
    info!(path = %path.display(), rules = bundle.rules.len(), "bundle exported");
    Ok(())
}

fn scope_text(scope: &RuleScope) -> String {
    match scope.to_parts() {
        (kind, Some(value)) => format!("{kind}:{value}"),
        (kind, None) => kind.to_owned(),
    }
}

#[derive(Serialize)]
pub struct RuleListReport {
    pub total: usize,
    pub rules: Vec<Rule>,
}

impl Render for RuleListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Parsing Rules ({} total)", self.total.to_string().bold())?;
        writeln!(w)?;
        writeln!(
            w,
            "{:<6} {:<8} {:<8} {:<26} {:<24} {:<8} Pattern",
            "ID", "Priority", "Mode", "Type", "Scope", "Enabled"
        )?;
        writeln!(w, "{}", "-".repeat(100))?;

        for r in &self.rules {
            let enabled = if r.enabled {
                "yes".green()
            } else {
                "no".yellow()
            };
            writeln!(
                w,
                "{:<6} {:<8} {:<8} {:<26} {:<24} {:<8} {}",
                r.id,
                r.priority,
                r.mode.as_str(),
                r.action.type_name(),
                truncate(&scope_text(&r.scope), 24),
                enabled,
                r.pattern.as_deref().unwrap_or("-")
            )?;
        }

        Ok(())
    }
}

#[derive(Serialize)]
pub struct RuleChange {
    pub change: &'static str,
    pub rule: Rule,
}

impl RuleChange {
    fn created(rule: Rule) -> Self {
        Self {
            change: "created",
            rule,
        }
    }

    fn updated(rule: Rule) -> Self {
        Self {
            change: "updated",
            rule,
        }
    }
}

impl Render for RuleChange {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "{} rule {} ({}, {}, priority {})",
            "✓".green(),
            self.rule.id.to_string().bold(),
            self.change,
            self.rule.action.type_name(),
            self.rule.priority
        )
    }
}

#[derive(Serialize)]
pub struct RuleDeleted {
    pub id: i64,
}

impl Render for RuleDeleted {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;
        writeln!(w, "{} rule {} deleted", "✓".green(), self.id)
    }
}

#[derive(Serialize)]
pub struct ExportReport {
    pub path: String,
    pub rules: usize,
    pub labels: usize,
}

impl Render for ExportReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;
        writeln!(
            w,
            "{} exported {} rules and {} labels to {}",
            "✓".green(),
            self.rules,
            self.labels,
            self.path.bold()
        )
    }
}

#[derive(Serialize)]
pub struct ImportSummary {
    pub path: String,
    #[serde(flatten)]
    pub report: ImportReport,
}

impl Render for ImportSummary {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;
        writeln!(
            w,
            "{} imported {} rules and {} labels from {}",
            "✓".green(),
            self.report.rules,
            self.report.labels,
            self.path.bold()
        )
    }
}
