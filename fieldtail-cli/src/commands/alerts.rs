//! `fieldtail alerts` command handler

use std::io::Write;

use serde::Serialize;

use fieldtail_core::types::{AlertStatus, Severity};
use fieldtail_log_pipeline::AdminService;
use fieldtail_log_pipeline::store::AlertRecord;

use crate::cli::{AlertsAction, AlertsArgs};
use crate::commands::ACTOR;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, truncate};

/// Execute the `alerts` command.
pub fn execute(
    args: AlertsArgs,
    admin: &AdminService,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        AlertsAction::List { limit } => {
            let alerts = admin.list_alerts(limit)?;
            writer.render(&AlertListReport {
                total: alerts.len(),
                alerts,
            })
        }
        AlertsAction::Ack { id } => {
            admin.ack_alert(ACTOR, id)?;
            writer.render(&AlertAcked { id })
        }
    }
}

#[derive(Serialize)]
pub struct AlertListReport {
    pub total: usize,
    pub alerts: Vec<AlertRecord>,
}

impl Render for AlertListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Alerts ({} shown)", self.total.to_string().bold())?;
        writeln!(w)?;
        writeln!(
            w,
            "{:<6} {:<20} {:<18} {:<9} {:<7} Summary",
            "ID", "Created", "Policy", "Severity", "Status"
        )?;
        writeln!(w, "{}", "-".repeat(100))?;

        for a in &self.alerts {
            let severity = match a.severity {
                Severity::Critical => a.severity.to_string().red().bold(),
                Severity::Warn => a.severity.to_string().yellow(),
                Severity::Info => a.severity.to_string().normal(),
            };
            let status = match a.status {
                AlertStatus::Sent => a.status.to_string().green(),
                AlertStatus::Failed => a.status.to_string().red(),
                AlertStatus::Ack => a.status.to_string().dimmed(),
                AlertStatus::Pending => a.status.to_string().normal(),
            };
            writeln!(
                w,
                "{:<6} {:<20} {:<18} {:<9} {:<7} {}",
                a.id,
                a.created_at.format("%Y-%m-%d %H:%M:%S"),
                a.policy,
                severity,
                status,
                truncate(&a.summary, 60)
            )?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
pub struct AlertAcked {
    pub id: i64,
}

impl Render for AlertAcked {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;
        writeln!(w, "{} alert {} acknowledged", "✓".green(), self.id)
    }
}
