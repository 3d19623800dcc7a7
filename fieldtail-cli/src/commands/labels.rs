//! `fieldtail labels` command handler

use std::io::Write;

use serde::Serialize;

use fieldtail_log_pipeline::AdminService;
use fieldtail_log_pipeline::admin::LabelSuggestion;
use fieldtail_log_pipeline::store::ValueLabel;

use crate::cli::{LabelsAction, LabelsArgs};
use crate::commands::ACTOR;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `labels` command.
pub fn execute(
    args: LabelsArgs,
    admin: &AdminService,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        LabelsAction::List => {
            let labels = admin.list_labels()?;
            writer.render(&LabelListReport {
                total: labels.len(),
                labels,
            })
        }
        LabelsAction::Set {
            device,
            grp,
            idx,
            label,
            unit,
            note,
        } => {
            let label = ValueLabel {
                device,
                grp,
                idx,
                label,
                unit,
                note,
                updated_at: None,
            };
            admin.set_label(ACTOR, &label)?;
            writer.render(&LabelSet { label })
        }
        LabelsAction::Suggest { device, grp } => {
            let suggestions = admin.suggest_labels(&device, grp)?;
            writer.render(&SuggestionReport {
                device,
                grp,
                suggestions,
            })
        }
    }
}

#[derive(Serialize)]
pub struct LabelListReport {
    pub total: usize,
    pub labels: Vec<ValueLabel>,
}

impl Render for LabelListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Value Labels ({} total)", self.total.to_string().bold())?;
        writeln!(w)?;
        writeln!(
            w,
            "{:<16} {:<6} {:<5} {:<20} {:<8} Note",
            "Device", "Group", "Idx", "Label", "Unit"
        )?;
        writeln!(w, "{}", "-".repeat(72))?;
        for l in &self.labels {
            writeln!(
                w,
                "{:<16} {:<6} {:<5} {:<20} {:<8} {}",
                l.device,
                l.grp,
                l.idx,
                l.label,
                l.unit.as_deref().unwrap_or("-"),
                l.note.as_deref().unwrap_or("")
            )?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
pub struct LabelSet {
    pub label: ValueLabel,
}

impl Render for LabelSet {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;
        writeln!(
            w,
            "{} {} grp {} idx {} = {}",
            "✓".green(),
            self.label.device,
            self.label.grp,
            self.label.idx,
            self.label.label.bold()
        )
    }
}

#[derive(Serialize)]
pub struct SuggestionReport {
    pub device: String,
    pub grp: i64,
    pub suggestions: Vec<LabelSuggestion>,
}

impl Render for SuggestionReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if self.suggestions.is_empty() {
            return writeln!(
                w,
                "{} no profile for {} grp {}",
                "!".yellow(),
                self.device,
                self.grp
            );
        }
        writeln!(w, "Suggested labels for {} grp {}:", self.device.bold(), self.grp)?;
        for s in &self.suggestions {
            writeln!(w, "  {:<5} {}", s.idx, s.label)?;
        }
        Ok(())
    }
}
