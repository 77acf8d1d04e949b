use crate::shrinker::ShrinkSummary;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::PathBuf;

/// JSON reporter for programmatic output
pub struct JsonReporter {
    output_path: Option<PathBuf>,
}

impl JsonReporter {
    pub fn new(output_path: Option<PathBuf>) -> Self {
        Self { output_path }
    }

    pub fn report(&self, summary: &ShrinkSummary, incremental: bool) -> Result<()> {
        let json = self.render(summary, incremental)?;

        if let Some(path) = &self.output_path {
            std::fs::write(path, &json).into_diagnostic()?;
            println!("Report written to: {}", path.display());
        } else {
            println!("{}", json);
        }

        Ok(())
    }

    fn render(&self, summary: &ShrinkSummary, incremental: bool) -> Result<String> {
        let report = JsonReport {
            version: env!("CARGO_PKG_VERSION"),
            mode: if incremental { "incremental" } else { "full" },
            summary,
        };
        serde_json::to_string_pretty(&report).into_diagnostic()
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    version: &'static str,
    mode: &'static str,
    summary: &'a ShrinkSummary,
}
