//! Report assembly: runs both pipelines for one model and gathers the results
//! together with the provenance needed to judge every figure.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::age_band::{analyze_age_bands, AgeBandAnalysis};
use crate::aggregator::aggregate;
use crate::baseline::{BaselineCalculator, CacheStats, PeerGroup};
use crate::classifier::{classify_issues, ClassificationSummary, IssueCandidate, TieredIssues};
use crate::config::AnalysisConfig;
use crate::models::{model_identifier, VehicleYearRate};
use crate::resolver::ComponentResolver;
use crate::source::InspectionSource;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Provenance {
    pub observation_count: usize,
    pub total_occurrences: u64,
    pub grouped_issue_count: usize,
    pub ungrouped_issue_count: usize,
    pub grouped: ClassificationSummary,
    pub ungrouped: ClassificationSummary,
    pub baseline_cache: CacheStats,
    pub peer_model_years: Vec<i32>,
    pub top_n: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub make: String,
    pub model: String,
    pub model_identifier: String,
    pub reference_year: i32,
    /// Total tests for the model; the denominator behind every model rate.
    pub sample_size: u64,
    /// No observations or no tests: empty tiers mean "unknown", not "clean".
    pub data_sparse: bool,
    pub grouped: TieredIssues,
    pub ungrouped: TieredIssues,
    pub age_bands: AgeBandAnalysis,
    pub provenance: Provenance,
}

impl AnalysisReport {
    pub fn zero_baseline_skipped(&self) -> usize {
        self.provenance.grouped.zero_baseline_skipped + self.provenance.ungrouped.zero_baseline_skipped
    }
}

/// Analyse one model against the corpus.
pub fn generate_report<S>(
    source: &S,
    resolver: &ComponentResolver,
    make: &str,
    model: &str,
    config: &AnalysisConfig,
) -> AnalysisReport
where
    S: InspectionSource + ?Sized,
{
    let observations = source.get_model_defects(make, model);
    let vehicle_rows = source.get_vehicle_rates_by_year(None);
    let model_rows: Vec<&VehicleYearRate> =
        vehicle_rows.iter().filter(|r| r.is_model(make, model)).collect();

    let sample_size = match observations.first() {
        Some(first) => first.sample_size,
        None => model_rows.iter().map(|r| r.total_tests).sum(),
    };
    let peers = PeerGroup::new(make, model, model_rows.iter().map(|r| r.model_year));

    let aggregation = aggregate(&observations, resolver);
    let mut baselines = BaselineCalculator::new(source, &peers, resolver);

    let grouped_candidates: Vec<IssueCandidate> =
        aggregation.grouped.iter().map(IssueCandidate::from).collect();
    let ungrouped_candidates: Vec<IssueCandidate> =
        aggregation.ungrouped.iter().map(IssueCandidate::from).collect();

    let grouped = classify_issues(&grouped_candidates, &mut baselines, config.top_n);
    let ungrouped = classify_issues(&ungrouped_candidates, &mut baselines, config.top_n);
    let age_bands = analyze_age_bands(&vehicle_rows, make, model, config.reference_year);

    let data_sparse = observations.is_empty() || sample_size == 0;
    if data_sparse {
        tracing::warn!(make, model, sample_size, "no usable observations for model");
    }

    let provenance = Provenance {
        observation_count: observations.len(),
        total_occurrences: aggregation.total_occurrences(),
        grouped_issue_count: aggregation.grouped.len(),
        ungrouped_issue_count: aggregation.ungrouped.len(),
        grouped: grouped.summary,
        ungrouped: ungrouped.summary,
        baseline_cache: baselines.cache_stats(),
        peer_model_years: peers.model_years.iter().copied().collect(),
        top_n: config.top_n,
    };

    let report = assemble(
        make,
        model,
        config.reference_year,
        sample_size,
        data_sparse,
        grouped.tiers,
        ungrouped.tiers,
        age_bands,
        provenance,
    );

    tracing::info!(
        run_id = %report.run_id,
        model = %report.model_identifier,
        grouped = report.grouped.len(),
        ungrouped = report.ungrouped.len(),
        zero_baseline = report.zero_baseline_skipped(),
        "report generated"
    );

    report
}

#[allow(clippy::too_many_arguments)]
fn assemble(
    make: &str,
    model: &str,
    reference_year: i32,
    sample_size: u64,
    data_sparse: bool,
    grouped: TieredIssues,
    ungrouped: TieredIssues,
    age_bands: AgeBandAnalysis,
    provenance: Provenance,
) -> AnalysisReport {
    // A sparse report must not look like a clean bill of health.
    let (grouped, ungrouped) = if data_sparse {
        (TieredIssues::default(), TieredIssues::default())
    } else {
        (grouped, ungrouped)
    };

    AnalysisReport {
        run_id: Uuid::new_v4(),
        generated_at: Utc::now(),
        make: make.trim().to_uppercase(),
        model: model.trim().to_uppercase(),
        model_identifier: model_identifier(make, model),
        reference_year,
        sample_size,
        data_sparse,
        grouped,
        ungrouped,
        age_bands,
        provenance,
    }
}
