//! Age-banded pass-rate benchmarks. Raw pass rates from different bands are
//! not comparable; only same-band deltas are.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{rate_per_hundred, same_name, VehicleYearRate};

/// Youngest age with a full year of MOT history. A vehicle first needs an MOT
/// at three years old, so the age-3 cohort has barely been tested.
pub const MIN_AGE: i32 = 4;

pub const HIGH_CONFIDENCE_TESTS: u64 = 1_000;
pub const MEDIUM_CONFIDENCE_TESTS: u64 = 200;
pub const LOW_CONFIDENCE_TESTS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AgeBand {
    #[serde(rename = "4-7 years")]
    FourToSeven,
    #[serde(rename = "8-10 years")]
    EightToTen,
    #[serde(rename = "11-14 years")]
    ElevenToFourteen,
    #[serde(rename = "15-17 years")]
    FifteenToSeventeen,
    #[serde(rename = "18-20 years")]
    EighteenToTwenty,
    #[serde(rename = "21+ years")]
    TwentyOnePlus,
}

impl AgeBand {
    pub const ALL: [AgeBand; 6] = [
        Self::FourToSeven,
        Self::EightToTen,
        Self::ElevenToFourteen,
        Self::FifteenToSeventeen,
        Self::EighteenToTwenty,
        Self::TwentyOnePlus,
    ];

    pub fn from_age(age: i32) -> Option<Self> {
        match age {
            4..=7 => Some(Self::FourToSeven),
            8..=10 => Some(Self::EightToTen),
            11..=14 => Some(Self::ElevenToFourteen),
            15..=17 => Some(Self::FifteenToSeventeen),
            18..=20 => Some(Self::EighteenToTwenty),
            21.. => Some(Self::TwentyOnePlus),
            _ => None,
        }
    }

    pub fn band_id(self) -> &'static str {
        match self {
            Self::FourToSeven => "4-7 years",
            Self::EightToTen => "8-10 years",
            Self::ElevenToFourteen => "11-14 years",
            Self::FifteenToSeventeen => "15-17 years",
            Self::EighteenToTwenty => "18-20 years",
            Self::TwentyOnePlus => "21+ years",
        }
    }

    /// Inclusive age range; the oldest band is open-ended.
    pub fn age_range(self) -> (i32, Option<i32>) {
        match self {
            Self::FourToSeven => (4, Some(7)),
            Self::EightToTen => (8, Some(10)),
            Self::ElevenToFourteen => (11, Some(14)),
            Self::FifteenToSeventeen => (15, Some(17)),
            Self::EighteenToTwenty => (18, Some(20)),
            Self::TwentyOnePlus => (21, None),
        }
    }

    pub fn band_order(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for AgeBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.band_id())
    }
}

/// Band for a model year. Ages under [`MIN_AGE`] are out of scope.
pub fn band_for(model_year: i32, reference_year: i32) -> Option<AgeBand> {
    AgeBand::from_age(reference_year - model_year)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Insufficient,
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    /// Depends on sample size only, never on the measured rate.
    pub fn from_sample_size(total_tests: u64) -> Self {
        match total_tests {
            n if n >= HIGH_CONFIDENCE_TESTS => Self::High,
            n if n >= MEDIUM_CONFIDENCE_TESTS => Self::Medium,
            n if n >= LOW_CONFIDENCE_TESTS => Self::Low,
            _ => Self::Insufficient,
        }
    }

    pub fn is_sufficient(self) -> bool {
        self != Self::Insufficient
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Insufficient => "insufficient",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AgeBandBenchmark {
    pub band: AgeBand,
    pub pass_rate: f64,
    pub total_tests: u64,
    pub confidence: ConfidenceTier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelAgeBandResult {
    pub band: AgeBand,
    pub pass_rate: f64,
    pub total_tests: u64,
    /// Percentage points above (positive) or below the national band rate.
    pub vs_national: f64,
    pub vs_make: Option<f64>,
    pub confidence: ConfidenceTier,
}

/// A band left out of comparative output, kept with its raw sample size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExcludedBand {
    pub band: AgeBand,
    pub total_tests: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgeBandAnalysis {
    pub reference_year: i32,
    pub national_benchmarks: Vec<AgeBandBenchmark>,
    pub make_benchmarks: Vec<AgeBandBenchmark>,
    pub model_results: Vec<ModelAgeBandResult>,
    pub excluded_benchmarks: Vec<ExcludedBand>,
    pub excluded_make_benchmarks: Vec<ExcludedBand>,
    pub excluded_model_bands: Vec<ExcludedBand>,
    pub rows_below_minimum_age: usize,
}

#[derive(Default, Clone, Copy)]
struct BandTally {
    tests: u64,
    passes: u64,
}

fn tally<'a>(
    rows: impl Iterator<Item = &'a VehicleYearRate>,
    reference_year: i32,
) -> BTreeMap<AgeBand, BandTally> {
    let mut bands: BTreeMap<AgeBand, BandTally> = BTreeMap::new();

    for row in rows {
        let Some(band) = band_for(row.model_year, reference_year) else {
            continue;
        };
        let entry = bands.entry(band).or_default();
        entry.tests += row.total_tests;
        entry.passes += row.total_passes;
    }

    bands
}

fn to_benchmark(band: AgeBand, tally: BandTally) -> AgeBandBenchmark {
    AgeBandBenchmark {
        band,
        pass_rate: rate_per_hundred(tally.passes, tally.tests),
        total_tests: tally.tests,
        confidence: ConfidenceTier::from_sample_size(tally.tests),
    }
}

/// Pass rate per band across every row, in band order. Computed from the rows
/// at call time; bands with no rows are omitted.
pub fn benchmarks(rows: &[VehicleYearRate], reference_year: i32) -> Vec<AgeBandBenchmark> {
    tally(rows.iter(), reference_year)
        .into_iter()
        .map(|(band, tally)| to_benchmark(band, tally))
        .collect()
}

fn split_by_confidence(
    benchmarks: Vec<AgeBandBenchmark>,
) -> (Vec<AgeBandBenchmark>, Vec<ExcludedBand>) {
    let mut kept = Vec::new();
    let mut excluded = Vec::new();
    for benchmark in benchmarks {
        if benchmark.confidence.is_sufficient() {
            kept.push(benchmark);
        } else {
            excluded.push(ExcludedBand {
                band: benchmark.band,
                total_tests: benchmark.total_tests,
            });
        }
    }
    (kept, excluded)
}

/// Age-band comparison of one model against national and same-make peers.
pub fn analyze_age_bands(
    rows: &[VehicleYearRate],
    make: &str,
    model: &str,
    reference_year: i32,
) -> AgeBandAnalysis {
    let rows_below_minimum_age = rows
        .iter()
        .filter(|r| band_for(r.model_year, reference_year).is_none())
        .count();
    let make_bands = tally(
        rows.iter().filter(|r| same_name(&r.make, make)),
        reference_year,
    );
    let model_bands = tally(rows.iter().filter(|r| r.is_model(make, model)), reference_year);

    let (national_benchmarks, excluded_benchmarks) =
        split_by_confidence(benchmarks(rows, reference_year));
    let (make_benchmarks, excluded_make_benchmarks) = split_by_confidence(
        make_bands
            .into_iter()
            .map(|(band, tally)| to_benchmark(band, tally))
            .collect(),
    );

    let mut model_results = Vec::new();
    let mut excluded_model_bands = Vec::new();
    for (band, tally) in model_bands {
        let confidence = ConfidenceTier::from_sample_size(tally.tests);
        // National totals include the model's own rows, so a sufficient model
        // band always has a sufficient national benchmark.
        let national = national_benchmarks.iter().find(|b| b.band == band);
        let Some(national) = national.filter(|_| confidence.is_sufficient()) else {
            excluded_model_bands.push(ExcludedBand {
                band,
                total_tests: tally.tests,
            });
            continue;
        };

        let pass_rate = rate_per_hundred(tally.passes, tally.tests);
        model_results.push(ModelAgeBandResult {
            band,
            pass_rate,
            total_tests: tally.tests,
            vs_national: pass_rate - national.pass_rate,
            vs_make: make_benchmarks
                .iter()
                .find(|b| b.band == band)
                .map(|b| pass_rate - b.pass_rate),
            confidence,
        });
    }

    tracing::debug!(
        bands = model_results.len(),
        excluded = excluded_model_bands.len(),
        excluded_make = excluded_make_benchmarks.len(),
        below_minimum_age = rows_below_minimum_age,
        "age bands compared"
    );

    AgeBandAnalysis {
        reference_year,
        national_benchmarks,
        make_benchmarks,
        model_results,
        excluded_benchmarks,
        excluded_make_benchmarks,
        excluded_model_bands,
        rows_below_minimum_age,
    }
}
