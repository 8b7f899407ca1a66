//! Terminal statistics for run and profiling reports

use crate::scheduler::{AggregateReport, ProfileOutcome, Termination};

/// Failed page numbers listed before the rest are elided
const MAX_LISTED_FAILURES: usize = 20;

/// Prints a run report to stdout in a formatted manner
///
/// # Arguments
///
/// * `report` - The report of a fixed or adaptive run
pub fn print_report(report: &AggregateReport) {
    println!("=== Run Statistics ===\n");

    println!("Overview:");
    println!(
        "  Pages fetched: {} / {}",
        report.completed_pages(),
        report.requested_pages
    );
    if report.truncated {
        println!("  Stopped at deadline: yes");
    }
    println!("  Rounds: {}", report.rounds);
    println!("  Total items: {}", report.total_items);
    println!("  Total elapsed: {:?}", report.total_elapsed);
    println!("  Average per page: {:?}", report.average_per_page);
    println!();

    if let Some(baseline) = &report.baseline {
        println!("Sequential Baseline:");
        println!(
            "  {} pages in {:?} ({:?}/page)",
            baseline.sampled_pages,
            baseline.elapsed,
            baseline.avg_per_page()
        );
        if let Some(speedup) = report.speedup_factor {
            println!("  Speedup factor: {:.2}x", speedup);
        }
        println!();
    }

    if let Some(history) = &report.history {
        println!("Adaptive Concurrency:");
        if let Some((min, max)) = history.concurrency_range() {
            println!("  Range used: {}..={}", min, max);
        }
        println!("  Final concurrency: {}", history.final_concurrency);
        let outcome = match history.termination {
            Termination::Converged => "all pages fetched",
            Termination::Truncated => "deadline reached",
        };
        println!("  Outcome: {}", outcome);
        if !history.warnings.is_empty() {
            println!("  Oscillation warnings: {}", history.warnings.len());
        }
        println!();
    }

    let failed = report.failed_pages();
    if !failed.is_empty() {
        println!("Failed Pages ({}):", failed.len());
        let listed: Vec<String> = failed
            .iter()
            .take(MAX_LISTED_FAILURES)
            .map(|page| page.to_string())
            .collect();
        println!("  {}", listed.join(", "));
        if failed.len() > MAX_LISTED_FAILURES {
            println!("  ... and {} more", failed.len() - MAX_LISTED_FAILURES);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} pages succeeded)",
        report.success_rate(),
        report.success_count(),
        report.completed_pages()
    );
}

/// Prints the ranked profiling results to stdout
///
/// # Arguments
///
/// * `outcome` - The profiling outcome to display
pub fn print_profile(outcome: &ProfileOutcome) {
    println!("=== Batch Size Profile ===\n");

    println!(
        "  {:>10}  {:>8}  {:>12}  {:>12}  {:>14}  {:>6}",
        "Batch size", "Sampled", "Measured", "Per page", "Projected", "Errors"
    );
    for report in &outcome.ranked {
        println!(
            "  {:>10}  {:>8}  {:>12}  {:>12}  {:>14}  {:>6}",
            report.batch_size,
            report.sampled_pages,
            format!("{:.1?}", report.measured_elapsed),
            format!("{:.1?}", report.avg_per_page),
            format!("{:.1?}", report.extrapolated_total),
            report.error_count
        );
    }
    println!();

    println!("Recommended batch size: {}", outcome.recommended);
}
