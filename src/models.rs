use serde::{Deserialize, Serialize};

/// Occurrences per hundred tests. A zero denominator yields a zero rate.
pub fn rate_per_hundred(occurrences: u64, sample_size: u64) -> f64 {
    if sample_size == 0 {
        0.0
    } else {
        occurrences as f64 / sample_size as f64 * 100.0
    }
}

/// One defect description observed for one target model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefectObservation {
    pub model_identifier: String,
    pub defect_description: String,
    pub category: String,
    pub occurrence_count: u64,
    /// Total tests for the model; the denominator shared by every description.
    pub sample_size: u64,
}

impl DefectObservation {
    pub fn rate(&self) -> f64 {
        rate_per_hundred(self.occurrence_count, self.sample_size)
    }
}

/// Raw defect count row as held by storage, one per (make, model, year, description).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefectRecord {
    pub make: String,
    pub model: String,
    pub model_year: i32,
    pub defect_description: String,
    pub category: String,
    pub occurrence_count: u64,
}

/// Test totals for one (make, model, model year).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleYearRate {
    pub make: String,
    pub model: String,
    pub model_year: i32,
    pub total_tests: u64,
    pub total_passes: u64,
}

impl VehicleYearRate {
    /// Pass rate in percent.
    pub fn pass_rate(&self) -> f64 {
        rate_per_hundred(self.total_passes, self.total_tests)
    }

    pub fn is_model(&self, make: &str, model: &str) -> bool {
        same_name(&self.make, make) && same_name(&self.model, model)
    }
}

/// Make and model names compare case-insensitively, ignoring surrounding whitespace.
pub fn same_name(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

pub fn model_identifier(make: &str, model: &str) -> String {
    format!("{} {}", make.trim().to_uppercase(), model.trim().to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_is_per_hundred_tests() {
        assert!((rate_per_hundred(21_346, 881_000) - 2.4229).abs() < 0.001);
        assert_eq!(rate_per_hundred(5, 0), 0.0);
    }

    #[test]
    fn names_match_loosely() {
        assert!(same_name("Ford", " FORD "));
        assert!(!same_name("Ford", "Fiat"));
        assert_eq!(model_identifier("Ford", "Focus"), "FORD FOCUS");
    }

    #[test]
    fn pass_rate_handles_empty_rows() {
        let row = VehicleYearRate {
            make: "FORD".to_string(),
            model: "FOCUS".to_string(),
            model_year: 2016,
            total_tests: 0,
            total_passes: 0,
        };
        assert_eq!(row.pass_rate(), 0.0);
    }
}
