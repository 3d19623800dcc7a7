//! `fieldtail preview` command handler

use std::io::Write;

use serde::Serialize;

use fieldtail_log_pipeline::{AdminService, Preview};

use crate::cli::PreviewArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `preview` command.
pub fn execute(
    args: PreviewArgs,
    admin: &AdminService,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let preview = admin.preview(&args.line, &args.file, args.drafts)?;
    writer.render(&PreviewReport {
        input: args.line,
        preview,
    })
}

#[derive(Serialize)]
pub struct PreviewReport {
    pub input: String,
    #[serde(flatten)]
    pub preview: Preview,
}

impl Render for PreviewReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Input:   {}", self.input)?;
        if self.preview.line != self.input {
            writeln!(w, "Rewrite: {}", self.preview.line.cyan())?;
        }
        if !self.preview.applied_rules.is_empty() {
            let ids: Vec<String> = self
                .preview
                .applied_rules
                .iter()
                .map(ToString::to_string)
                .collect();
            writeln!(w, "Rules:   {}", ids.join(", "))?;
        }

        let Some(record) = &self.preview.record else {
            return writeln!(w, "Result:  {}", "ignored".yellow());
        };

        match &record.parse_error {
            Some(code) => writeln!(w, "Result:  {} ({})", record.record_kind, code.to_string().red())?,
            None => writeln!(w, "Result:  {} {}", record.record_kind, "ok".green())?,
        }
        if let Some(device) = &record.device_id {
            writeln!(w, "Device:  {}", device.bold())?;
        }
        if let (Some(seq), Some(grp)) = (record.seq, record.grp) {
            writeln!(w, "Seq/Grp: {seq} / {grp}")?;
        }
        if record.value_count > 0 {
            let values: Vec<String> = record.values.iter().map(ToString::to_string).collect();
            writeln!(w, "Values:  [{}] ({})", values.join(", "), record.value_count)?;
            if let (Some(min), Some(max), Some(mean)) =
                (record.min_val, record.max_val, record.mean_val)
            {
                writeln!(w, "Stats:   min {min} / max {max} / mean {mean:.3}")?;
            }
        }
        Ok(())
    }
}
