use super::UsageReport;
use crate::graph::ShrinkType;
use crate::shrinker::ShrinkSummary;
use colored::Colorize;
use std::path::PathBuf;

/// Terminal reporter with colored output
pub struct TerminalReporter {
    /// List removed classes and methods under each shrink type
    show_removed: bool,
}

impl TerminalReporter {
    pub fn new() -> Self {
        Self { show_removed: false }
    }

    pub fn with_removed(mut self, show: bool) -> Self {
        self.show_removed = show;
        self
    }

    pub fn report(&self, summary: &ShrinkSummary, usage: &[(ShrinkType, UsageReport, PathBuf)]) {
        println!();
        println!(
            "{}",
            format!("Processed {} class files", summary.classes_scanned).bold()
        );

        if summary.shrink_types.is_empty() {
            println!("{}", "No shrink types configured, nothing was written".yellow());
            return;
        }

        for (shrink_type, stats) in &summary.shrink_types {
            println!();
            println!("{}", shrink_type.to_string().cyan().bold());
            println!(
                "  {} entry points, {} classes kept, {} methods kept",
                stats.entry_points, stats.kept_classes, stats.kept_methods
            );

            let removed = format!("{} methods removed", stats.removed_methods);
            if stats.removed_methods > 0 {
                println!("  {}", removed.yellow());
            } else {
                println!("  {}", removed.green());
            }
            println!(
                "  {} files written, {} files deleted",
                stats.rewritten_files, stats.removed_files
            );

            if let Some((_, report, path)) = usage.iter().find(|(t, _, _)| t == shrink_type) {
                println!("  {} {}", "usage:".dimmed(), path.display().to_string().dimmed());
                if self.show_removed {
                    self.print_removed(report);
                }
            }
        }

        println!("{}", "─".repeat(60).dimmed());
    }

    fn print_removed(&self, report: &UsageReport) {
        if report.is_empty() {
            println!("    {}", "nothing removed".green());
            return;
        }
        for line in report.to_text().lines() {
            if line.starts_with(' ') {
                println!("    {}", line.dimmed());
            } else {
                println!("    {}", line.white());
            }
        }
    }
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::new()
    }
}
