//! Markdown summary generation
//!
//! This module generates human-readable markdown summaries of run results,
//! including statistics, failed pages, adaptive history and profile rankings.

use crate::output::{OutputError, OutputResult};
use crate::scheduler::{AdaptiveHistory, AggregateReport, ProfileOutcome, Termination};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Failed pages listed in the summary before the rest are elided
const MAX_LISTED_FAILURES: usize = 50;

/// Run metadata printed at the top of a summary
#[derive(Debug, Clone)]
pub struct ReportHeader {
    /// Scheduling mode name (`fixed`, `profile` or `adaptive`)
    pub mode: String,
    pub started_at: DateTime<Utc>,
    pub config_hash: Option<String>,

    /// Where pages came from (API base URL or simulation)
    pub source: String,
}

/// Result of any scheduling mode
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Report(AggregateReport),
    Profile(ProfileOutcome),
}

/// Writes a markdown summary of a run
///
/// # Arguments
///
/// * `header` - Run metadata
/// * `outcome` - The run or profiling result
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn generate_markdown_report(
    header: &ReportHeader,
    outcome: &RunOutcome,
    output_path: &Path,
) -> OutputResult<()> {
    if output_path.is_dir() {
        return Err(OutputError::Write(format!(
            "{} is a directory",
            output_path.display()
        )));
    }

    let markdown = format_markdown_report(header, outcome);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run outcome as markdown
pub fn format_markdown_report(header: &ReportHeader, outcome: &RunOutcome) -> String {
    let mut md = String::new();

    md.push_str("# Pagewise Run Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Mode**: {}\n", header.mode));
    md.push_str(&format!("- **Source**: {}\n", header.source));
    md.push_str(&format!(
        "- **Started**: {}\n",
        header.started_at.to_rfc3339()
    ));
    if let Some(hash) = &header.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    match outcome {
        RunOutcome::Report(report) => push_report(&mut md, report),
        RunOutcome::Profile(profile) => push_profile(&mut md, profile),
    }

    md
}

fn push_report(md: &mut String, report: &AggregateReport) {
    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!(
        "- **Pages Fetched**: {} / {}\n",
        report.completed_pages(),
        report.requested_pages
    ));
    md.push_str(&format!("- **Rounds**: {}\n", report.rounds));
    md.push_str(&format!("- **Total Items**: {}\n", report.total_items));
    md.push_str(&format!("- **Total Errors**: {}\n", report.error_count));
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n",
        report.success_rate()
    ));
    md.push_str(&format!(
        "- **Total Elapsed**: {:.3}s\n",
        report.total_elapsed.as_secs_f64()
    ));
    md.push_str(&format!(
        "- **Average Per Page**: {:.1}ms\n",
        report.average_per_page.as_secs_f64() * 1000.0
    ));
    if let Some(speedup) = report.speedup_factor {
        md.push_str(&format!("- **Speedup Factor**: {:.2}x\n", speedup));
    }
    if report.truncated {
        md.push_str("- **Truncated**: yes (deadline reached)\n");
    }
    md.push('\n');

    let failed = report.failed_pages();
    if !failed.is_empty() {
        md.push_str("## Failed Pages\n\n");
        md.push_str("| Page | Error |\n");
        md.push_str("|------|-------|\n");

        for result in report
            .results
            .iter()
            .filter(|r| !r.success)
            .take(MAX_LISTED_FAILURES)
        {
            md.push_str(&format!(
                "| {} | {} |\n",
                result.page_number,
                escape_cell(result.error.as_deref().unwrap_or("unknown"))
            ));
        }
        if failed.len() > MAX_LISTED_FAILURES {
            md.push_str(&format!(
                "\n... and {} more\n",
                failed.len() - MAX_LISTED_FAILURES
            ));
        }
        md.push('\n');
    }

    if let Some(history) = &report.history {
        push_history(md, history);
    }
}

/// Escapes text for use inside a table cell
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

fn push_history(md: &mut String, history: &AdaptiveHistory) {
    md.push_str("## Adaptive History\n\n");
    let outcome = match history.termination {
        Termination::Converged => "converged",
        Termination::Truncated => "truncated",
    };
    md.push_str(&format!("- **Outcome**: {}\n", outcome));
    md.push_str(&format!(
        "- **Final Concurrency**: {}\n\n",
        history.final_concurrency
    ));

    md.push_str("| Round | Pages | Concurrency | Elapsed (ms) | Pages/s |");
    md.push_str(" Error Rate | Decision | Next |\n");
    md.push_str("|-------|-------|-------------|--------------|---------|");
    md.push_str("------------|----------|------|\n");
    for round in &history.rounds {
        md.push_str(&format!(
            "| {} | {}-{} | {} | {:.1} | {:.2} | {:.1}% | {:?} | {} |\n",
            round.round_index,
            round.first_page,
            round.last_page,
            round.concurrency,
            round.elapsed.as_secs_f64() * 1000.0,
            round.throughput,
            round.error_rate * 100.0,
            round.adjustment,
            round.next_concurrency
        ));
    }
    md.push('\n');

    if !history.warnings.is_empty() {
        md.push_str("## Warnings\n\n");
        for warning in &history.warnings {
            md.push_str(&format!(
                "- Concurrency oscillated for {} rounds ending at round {} (concurrency {})\n",
                warning.window, warning.round_index, warning.concurrency
            ));
        }
        md.push('\n');
    }
}

fn push_profile(md: &mut String, profile: &ProfileOutcome) {
    md.push_str("## Batch Size Ranking\n\n");
    md.push_str(&format!(
        "- **Recommended Batch Size**: {}\n\n",
        profile.recommended
    ));

    md.push_str("| Rank | Batch Size | Sampled Pages | Measured (ms) |");
    md.push_str(" Per Page (ms) | Projected (ms) | Errors |\n");
    md.push_str("|------|------------|---------------|---------------|");
    md.push_str("---------------|----------------|--------|\n");
    for (rank, report) in profile.ranked.iter().enumerate() {
        md.push_str(&format!(
            "| {} | {} | {} | {:.1} | {:.1} | {:.1} | {} |\n",
            rank + 1,
            report.batch_size,
            report.sampled_pages,
            report.measured_elapsed.as_secs_f64() * 1000.0,
            report.avg_per_page.as_secs_f64() * 1000.0,
            report.extrapolated_total.as_secs_f64() * 1000.0,
            report.error_count
        ));
    }
    md.push('\n');
}
