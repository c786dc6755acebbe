use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ManifestResult, ProgressEvent, ProgressSink, SyncResult};
use crate::transfer::{TransferReport, TransferStatus};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

/// Prints every progress line to stdout as it arrives.
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn event(&self, event: ProgressEvent) {
        let line = match event.elapsed {
            Some(elapsed) => format!("{} ({} ms)\n", event.message, elapsed.as_millis()),
            None => format!("{}\n", event.message),
        };
        // One write per line so concurrent transfers never interleave mid-line.
        if let Err(err) = write_line(&mut io::stdout().lock(), &line) {
            tracing::debug!(error = %err, "progress line not written");
        }
    }
}

fn write_line(out: &mut impl Write, line: &str) -> io::Result<()> {
    out.write_all(line.as_bytes())?;
    out.flush()
}

/// Silent during the run; results are printed as JSON at the end.
pub struct JsonOutput;

impl JsonOutput {
    pub fn print_manifest(result: &ManifestResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_transfer(report: &TransferReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_sync(result: &SyncResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub fn print_transfer_summary(report: &TransferReport) {
    println!(
        "Transferred {} of {} networks to {}",
        report.uploaded, report.total, report.bucket
    );
    for outcome in &report.outcomes {
        match &outcome.status {
            TransferStatus::Uploaded { .. } => {}
            TransferStatus::Failed { message } => {
                println!("  failed  num: {} id: {}: {message}", outcome.index, outcome.id);
            }
            TransferStatus::Skipped => {
                println!("  skipped num: {} id: {}", outcome.index, outcome.id);
            }
        }
    }
}
