//! Live rendering of job results

use colored::*;
use std::io::{self, Write};

use fleet_core::domain::job::{JobResult, JobStatus};

/// Receives each job as it arrives on the stream
pub trait JobRenderer {
    fn render(&mut self, job: &JobResult) -> io::Result<()>;
}

/// Human-readable, colored output
pub struct TextRenderer<W: Write> {
    out: W,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> JobRenderer for TextRenderer<W> {
    fn render(&mut self, job: &JobResult) -> io::Result<()> {
        writeln!(
            self.out,
            "{} {} ({}) {}",
            "▸".cyan(),
            job.client_name.bold(),
            job.client_id.dimmed(),
            colorize_status(job.status)
        )?;

        if let (Some(started), Some(finished)) = (job.started_at, job.finished_at) {
            let duration = finished.signed_duration_since(started);
            writeln!(
                self.out,
                "    {}",
                format!("job {} took {}ms", job.jid, duration.num_milliseconds()).dimmed()
            )?;
        }

        let stdout = job.stdout().trim_end();
        if !stdout.is_empty() {
            writeln!(self.out, "{}", stdout)?;
        }

        let stderr = job.stderr().trim_end();
        if !stderr.is_empty() {
            writeln!(self.out, "{}", stderr.yellow())?;
        }

        if !job.error.is_empty() {
            writeln!(self.out, "{} {}", "Error:".red().bold(), job.error.red())?;
        }

        writeln!(self.out)?;
        self.out.flush()
    }
}

/// One JSON document per line, per job
pub struct JsonRenderer<W: Write> {
    out: W,
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> JobRenderer for JsonRenderer<W> {
    fn render(&mut self, job: &JobResult) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, job)?;
        writeln!(self.out)?;
        self.out.flush()
    }
}

/// Colorize job status for display
fn colorize_status(status: JobStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        JobStatus::InProgress => text.yellow(),
        JobStatus::Done => text.green(),
        JobStatus::Failed => text.red(),
    }
}
