use crate::pipeline::RunSummary;
use std::fmt;

/// Text report formatter for a batch run
pub struct TextReport<'a> {
    summary: &'a RunSummary,
}

impl<'a> TextReport<'a> {
    /// Creates a new text report
    pub fn new(summary: &'a RunSummary) -> Self {
        Self { summary }
    }
}

impl<'a> fmt::Display for TextReport<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Conversion Summary")?;
        writeln!(f, "==================")?;
        writeln!(f)?;
        writeln!(f, "Studies:   {}", self.summary.total)?;
        writeln!(f, "Succeeded: {}", self.summary.succeeded)?;
        writeln!(f, "Skipped:   {}", self.summary.skipped)?;
        writeln!(f, "Failed:    {}", self.summary.failed)?;

        if !self.summary.failures.is_empty() {
            writeln!(f)?;
            writeln!(f, "Failures")?;
            writeln!(f, "--------")?;
            for failure in &self.summary.failures {
                writeln!(
                    f,
                    "{}: {} (at {}): {}",
                    failure.study, failure.kind, failure.reached, failure.message
                )?;
            }
        }

        if let Some(stats) = &self.summary.global_stats {
            writeln!(f)?;
            writeln!(f, "Global Intensity Statistics")?;
            writeln!(f, "---------------------------")?;
            writeln!(f, "Voxels: {}", stats.voxels)?;
            writeln!(f, "Mean:   {:.4}", stats.mean)?;
            writeln!(f, "Std:    {:.4}", stats.std)?;
        }

        Ok(())
    }
}

/// Serializes the summary as pretty-printed JSON
#[cfg(feature = "json")]
pub fn json_report(summary: &RunSummary) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(summary)
}
