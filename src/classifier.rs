use std::cmp::Ordering;

use serde::Serialize;

use crate::aggregator::GroupedDefect;
use crate::baseline::{BaselineCalculator, BaselineKey, CompositeBaseline};
use crate::models::DefectObservation;

pub const MAJOR_RATIO: f64 = 3.0;
pub const KNOWN_RATIO: f64 = 2.0;
pub const ELEVATED_RATIO: f64 = 1.5;

pub const DEFAULT_TOP_N: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityTier {
    Major,
    Known,
    Elevated,
}

impl SeverityTier {
    /// Closed-open bands on the ratio; below 1.5 is not elevated at all.
    pub fn from_ratio(ratio: f64) -> Option<Self> {
        if ratio >= MAJOR_RATIO {
            Some(Self::Major)
        } else if ratio >= KNOWN_RATIO {
            Some(Self::Known)
        } else if ratio >= ELEVATED_RATIO {
            Some(Self::Elevated)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Elevation {
    pub ratio: f64,
    pub tier: Option<SeverityTier>,
}

/// Ratio of `rate` to `baseline` and its tier. `None` when the baseline is
/// zero, which callers must count rather than drop.
pub fn classify(rate: f64, baseline: f64) -> Option<Elevation> {
    if !baseline.is_finite() || baseline <= 0.0 {
        return None;
    }
    let ratio = rate / baseline;
    Some(Elevation {
        ratio,
        tier: SeverityTier::from_ratio(ratio),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Grouped,
    Ungrouped,
}

/// An issue ready for classification, grouped or not.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueCandidate {
    pub kind: IssueKind,
    pub identifier: String,
    pub display_name: String,
    pub category: String,
    pub model_rate: f64,
    pub total_occurrences: u64,
    pub sample_size: u64,
    pub variant_descriptions: Vec<String>,
}

impl IssueCandidate {
    fn baseline_key(&self) -> BaselineKey {
        match self.kind {
            IssueKind::Grouped => BaselineKey::Group(self.identifier.clone()),
            IssueKind::Ungrouped => BaselineKey::Defect(self.identifier.clone()),
        }
    }
}

impl From<&GroupedDefect> for IssueCandidate {
    fn from(group: &GroupedDefect) -> Self {
        Self {
            kind: IssueKind::Grouped,
            identifier: group.group_id.clone(),
            display_name: group.display_name.clone(),
            category: group.category.clone(),
            model_rate: group.model_rate(),
            total_occurrences: group.total_occurrences,
            sample_size: group.sample_size,
            variant_descriptions: group.variant_descriptions.clone(),
        }
    }
}

impl From<&DefectObservation> for IssueCandidate {
    fn from(observation: &DefectObservation) -> Self {
        Self {
            kind: IssueKind::Ungrouped,
            identifier: observation.defect_description.clone(),
            display_name: observation.defect_description.clone(),
            category: observation.category.clone(),
            model_rate: observation.rate(),
            total_occurrences: observation.occurrence_count,
            sample_size: observation.sample_size,
            variant_descriptions: vec![observation.defect_description.clone()],
        }
    }
}

/// A classified issue in exactly one severity tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedIssue {
    pub kind: IssueKind,
    pub identifier: String,
    pub display_name: String,
    pub category: String,
    pub model_rate: f64,
    pub baseline: CompositeBaseline,
    pub ratio: f64,
    pub total_occurrences: u64,
    pub sample_size: u64,
    pub variant_count: usize,
    pub variant_descriptions: Vec<String>,
    pub severity_tier: SeverityTier,
}

/// Ratio descending, then occurrences descending, then identifier ascending.
pub fn rank_order(a: &AggregatedIssue, b: &AggregatedIssue) -> Ordering {
    b.ratio
        .total_cmp(&a.ratio)
        .then_with(|| b.total_occurrences.cmp(&a.total_occurrences))
        .then_with(|| a.identifier.cmp(&b.identifier))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TieredIssues {
    pub major: Vec<AggregatedIssue>,
    pub known: Vec<AggregatedIssue>,
    pub elevated: Vec<AggregatedIssue>,
}

impl TieredIssues {
    pub fn tier(&self, tier: SeverityTier) -> &[AggregatedIssue] {
        match tier {
            SeverityTier::Major => &self.major,
            SeverityTier::Known => &self.known,
            SeverityTier::Elevated => &self.elevated,
        }
    }

    pub fn len(&self) -> usize {
        self.major.len() + self.known.len() + self.elevated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What happened to every candidate handed to the classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationSummary {
    pub candidates: usize,
    pub classified: usize,
    pub below_threshold: usize,
    pub zero_baseline_skipped: usize,
    /// Classified issues cut by the per-tier limit.
    pub truncated: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassifiedIssues {
    pub tiers: TieredIssues,
    pub summary: ClassificationSummary,
}

/// Classify candidates against their baselines, rank each tier and keep the
/// top `top_n` of each.
pub fn classify_issues(
    candidates: &[IssueCandidate],
    baselines: &mut BaselineCalculator,
    top_n: usize,
) -> ClassifiedIssues {
    let mut summary = ClassificationSummary {
        candidates: candidates.len(),
        ..ClassificationSummary::default()
    };
    let mut tiers = TieredIssues::default();

    for candidate in candidates {
        let baseline = baselines.baseline(&candidate.baseline_key());
        let Some(elevation) = classify(candidate.model_rate, baseline.composite) else {
            summary.zero_baseline_skipped += 1;
            continue;
        };
        let Some(tier) = elevation.tier else {
            summary.below_threshold += 1;
            continue;
        };

        summary.classified += 1;
        let issue = AggregatedIssue {
            kind: candidate.kind,
            identifier: candidate.identifier.clone(),
            display_name: candidate.display_name.clone(),
            category: candidate.category.clone(),
            model_rate: candidate.model_rate,
            baseline,
            ratio: elevation.ratio,
            total_occurrences: candidate.total_occurrences,
            sample_size: candidate.sample_size,
            variant_count: candidate.variant_descriptions.len().max(1),
            variant_descriptions: candidate.variant_descriptions.clone(),
            severity_tier: tier,
        };

        match tier {
            SeverityTier::Major => tiers.major.push(issue),
            SeverityTier::Known => tiers.known.push(issue),
            SeverityTier::Elevated => tiers.elevated.push(issue),
        }
    }

    for list in [&mut tiers.major, &mut tiers.known, &mut tiers.elevated] {
        list.sort_by(rank_order);
        if list.len() > top_n {
            summary.truncated += list.len() - top_n;
            list.truncate(top_n);
        }
    }

    tracing::debug!(
        candidates = summary.candidates,
        classified = summary.classified,
        below_threshold = summary.below_threshold,
        zero_baseline = summary.zero_baseline_skipped,
        "issues classified"
    );

    ClassifiedIssues { tiers, summary }
}
