//! `fieldtail events` command handler

use std::io::Write;

use serde::Serialize;

use fieldtail_core::types::Event;
use fieldtail_log_pipeline::AdminService;

use crate::cli::{EventsAction, EventsArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render, truncate};

/// Execute the `events` command.
pub fn execute(
    args: EventsArgs,
    admin: &AdminService,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        EventsAction::Recent { limit } => {
            let events = admin.recent_events(limit)?;
            writer.render(&EventListReport {
                total: events.len(),
                events,
            })
        }
    }
}

#[derive(Serialize)]
pub struct EventListReport {
    pub total: usize,
    pub events: Vec<Event>,
}

fn opt<T: std::fmt::Display>(v: Option<T>) -> String {
    v.map_or_else(|| "-".to_owned(), |v| v.to_string())
}

impl Render for EventListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Recent Events ({} shown)", self.total.to_string().bold())?;
        writeln!(w)?;
        writeln!(
            w,
            "{:<8} {:<7} {:<16} {:<6} {:<5} {:<6} {:<22} Line",
            "ID", "Kind", "Device", "Seq", "Grp", "Values", "Result"
        )?;
        writeln!(w, "{}", "-".repeat(110))?;

        for e in &self.events {
            let result = match (&e.parse_error, e.parse_ok) {
                (Some(code), _) => code.to_string().red(),
                (None, true) => "ok".green(),
                (None, false) => "-".normal(),
            };
            writeln!(
                w,
                "{:<8} {:<7} {:<16} {:<6} {:<5} {:<6} {:<22} {}",
                e.id,
                e.record_kind.to_string(),
                e.device_id.as_deref().unwrap_or("-"),
                opt(e.seq),
                opt(e.grp),
                e.value_count,
                result,
                truncate(&e.raw_line, 40)
            )?;
        }
        Ok(())
    }
}
