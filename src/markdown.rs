use std::fmt::Write;

use crate::age_band::AgeBandAnalysis;
use crate::classifier::{AggregatedIssue, ClassificationSummary, SeverityTier, TieredIssues};
use crate::report::AnalysisReport;

const TIERS: [(SeverityTier, &str); 3] = [
    (SeverityTier::Major, "Major (3x baseline or more)"),
    (SeverityTier::Known, "Known (2x to 3x baseline)"),
    (SeverityTier::Elevated, "Elevated (1.5x to 2x baseline)"),
];

pub fn render_markdown(report: &AnalysisReport) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# MOT Defect Report: {}", report.model_identifier);
    let _ = writeln!(
        output,
        "Generated {} (reference year {}, run {})",
        report.generated_at.format("%Y-%m-%d %H:%M UTC"),
        report.reference_year,
        report.run_id
    );
    let _ = writeln!(output);

    if report.data_sparse {
        let _ = writeln!(
            output,
            "> Insufficient data: {} defect observations across {} tests, too few to \
             compute rates. The absence of issues below is not evidence of reliability.",
            report.provenance.observation_count, report.sample_size
        );
        let _ = writeln!(output);
    } else {
        let _ = writeln!(
            output,
            "Based on {} tests and {} recorded defects.",
            report.sample_size, report.provenance.total_occurrences
        );
        let _ = writeln!(output);
    }

    write_issue_section(
        &mut output,
        "Component Issues",
        &report.grouped,
        &report.provenance.grouped,
    );
    write_issue_section(
        &mut output,
        "Other Defects",
        &report.ungrouped,
        &report.provenance.ungrouped,
    );
    write_age_bands(&mut output, &report.age_bands);

    output
}

fn write_issue_section(
    output: &mut String,
    title: &str,
    tiers: &TieredIssues,
    summary: &ClassificationSummary,
) {
    let _ = writeln!(output, "## {title}");

    if tiers.is_empty() {
        let _ = writeln!(output, "No defects above 1.5x their baseline.");
    }

    for (tier, heading) in TIERS {
        let issues = tiers.tier(tier);
        if issues.is_empty() {
            continue;
        }
        let _ = writeln!(output);
        let _ = writeln!(output, "### {heading}");
        for issue in issues {
            write_issue(output, issue);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "_{} checked, {} below threshold, {} without a baseline, {} beyond the top list._",
        summary.candidates, summary.below_threshold, summary.zero_baseline_skipped, summary.truncated
    );
    let _ = writeln!(output);
}

fn write_issue(output: &mut String, issue: &AggregatedIssue) {
    let _ = writeln!(
        output,
        "- **{}** ({}): {:.2}% vs {:.3}% baseline, {:.2}x, {} occurrences",
        issue.display_name,
        issue.category,
        issue.model_rate,
        issue.baseline.composite,
        issue.ratio,
        issue.total_occurrences
    );
    if issue.variant_count > 1 {
        for description in &issue.variant_descriptions {
            let _ = writeln!(output, "  - {description}");
        }
    }
}

fn write_age_bands(output: &mut String, analysis: &AgeBandAnalysis) {
    let _ = writeln!(output, "## Pass Rate by Age");

    if analysis.model_results.is_empty() {
        let _ = writeln!(output, "No age band has enough tests for a comparison.");
    } else {
        let _ = writeln!(output);
        let _ = writeln!(output, "| Age | Pass rate | vs national | vs make | Tests | Confidence |");
        let _ = writeln!(output, "|-----|-----------|-------------|---------|-------|------------|");
        for result in &analysis.model_results {
            let vs_make = result
                .vs_make
                .map(|delta| format!("{delta:+.1}"))
                .unwrap_or_else(|| "n/a".to_string());
            let _ = writeln!(
                output,
                "| {} | {:.1}% | {:+.1} | {} | {} | {} |",
                result.band,
                result.pass_rate,
                result.vs_national,
                vs_make,
                result.total_tests,
                result.confidence.label()
            );
        }
    }

    if !analysis.national_benchmarks.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "### National benchmarks");
        for benchmark in &analysis.national_benchmarks {
            let _ = writeln!(
                output,
                "- {}: {:.1}% across {} tests ({} confidence)",
                benchmark.band,
                benchmark.pass_rate,
                benchmark.total_tests,
                benchmark.confidence.label()
            );
        }
    }

    let excluded: Vec<String> = analysis
        .excluded_model_bands
        .iter()
        .map(|band| format!("{} ({} tests)", band.band, band.total_tests))
        .collect();
    if !excluded.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "_Too few tests to compare: {}._",
            excluded.join(", ")
        );
    }
}
