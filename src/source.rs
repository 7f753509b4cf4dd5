//! Inbound query interface and its in-memory implementation.

use std::collections::{BTreeMap, HashMap};

use crate::baseline::{BaselineScope, PeerGroup};
use crate::models::{model_identifier, same_name, DefectObservation, DefectRecord, VehicleYearRate};

/// Queries the analysis core makes against the inspection corpus.
pub trait InspectionSource {
    /// One observation per distinct description for the model, summed across
    /// model years. Every observation carries the model's total test count.
    fn get_model_defects(&self, make: &str, model: &str) -> Vec<DefectObservation>;

    /// Rate per hundred tests of every description seen in `scope`. Empty when
    /// the scope has no tests.
    fn get_corpus_defect_rates(
        &self,
        scope: BaselineScope,
        peers: &PeerGroup,
    ) -> BTreeMap<String, f64>;

    fn get_vehicle_rates_by_year(&self, make: Option<&str>) -> Vec<VehicleYearRate>;
}

/// Whole corpus held in memory, loaded once per process from storage.
#[derive(Debug, Clone, Default)]
pub struct InspectionCorpus {
    defects: Vec<DefectRecord>,
    vehicles: Vec<VehicleYearRate>,
}

impl InspectionCorpus {
    pub fn new(defects: Vec<DefectRecord>, vehicles: Vec<VehicleYearRate>) -> Self {
        Self { defects, vehicles }
    }

    pub fn is_empty(&self) -> bool {
        self.defects.is_empty() && self.vehicles.is_empty()
    }

    /// Distinct (make, model) pairs with test data, sorted.
    pub fn models(&self) -> Vec<(String, String)> {
        let mut models: Vec<(String, String)> = self
            .vehicles
            .iter()
            .map(|v| (v.make.trim().to_uppercase(), v.model.trim().to_uppercase()))
            .collect();
        models.sort();
        models.dedup();
        models
    }
}

impl InspectionSource for InspectionCorpus {
    fn get_model_defects(&self, make: &str, model: &str) -> Vec<DefectObservation> {
        let sample_size: u64 = self
            .vehicles
            .iter()
            .filter(|v| v.is_model(make, model))
            .map(|v| v.total_tests)
            .sum();
        let identifier = model_identifier(make, model);

        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut observations: Vec<DefectObservation> = Vec::new();

        for row in self
            .defects
            .iter()
            .filter(|d| same_name(&d.make, make) && same_name(&d.model, model))
        {
            match index.get(row.defect_description.as_str()) {
                Some(&position) => observations[position].occurrence_count += row.occurrence_count,
                None => {
                    index.insert(row.defect_description.as_str(), observations.len());
                    observations.push(DefectObservation {
                        model_identifier: identifier.clone(),
                        defect_description: row.defect_description.clone(),
                        category: row.category.clone(),
                        occurrence_count: row.occurrence_count,
                        sample_size,
                    });
                }
            }
        }

        observations
    }

    fn get_corpus_defect_rates(
        &self,
        scope: BaselineScope,
        peers: &PeerGroup,
    ) -> BTreeMap<String, f64> {
        let tests: u64 = self
            .vehicles
            .iter()
            .filter(|v| peers.includes(scope, &v.make, &v.model, v.model_year))
            .map(|v| v.total_tests)
            .sum();
        if tests == 0 {
            return BTreeMap::new();
        }

        let mut occurrences: BTreeMap<String, u64> = BTreeMap::new();
        for row in self
            .defects
            .iter()
            .filter(|d| peers.includes(scope, &d.make, &d.model, d.model_year))
        {
            *occurrences.entry(row.defect_description.clone()).or_insert(0) += row.occurrence_count;
        }

        occurrences
            .into_iter()
            .map(|(description, count)| (description, count as f64 / tests as f64 * 100.0))
            .collect()
    }

    fn get_vehicle_rates_by_year(&self, make: Option<&str>) -> Vec<VehicleYearRate> {
        self.vehicles
            .iter()
            .filter(|v| make.map_or(true, |m| same_name(&v.make, m)))
            .cloned()
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{defect, vehicle};
    use super::*;

    fn corpus() -> InspectionCorpus {
        InspectionCorpus::new(
            vec![
                defect("FORD", "FOCUS", 2015, "Brake pipe corroded", 30),
                defect("FORD", "FOCUS", 2016, "Brake pipe corroded", 20),
                defect("FORD", "FOCUS", 2016, "Horn inoperative", 5),
                defect("FORD", "FIESTA", 2016, "Brake pipe corroded", 10),
                defect("VAUXHALL", "ASTRA", 2009, "Brake pipe corroded", 40),
            ],
            vec![
                vehicle("FORD", "FOCUS", 2015, 1_000, 700),
                vehicle("FORD", "FOCUS", 2016, 1_000, 750),
                vehicle("FORD", "FIESTA", 2016, 2_000, 1_500),
                vehicle("VAUXHALL", "ASTRA", 2009, 2_000, 1_200),
            ],
        )
    }

    #[test]
    fn model_defects_sum_across_years() {
        let observations = corpus().get_model_defects("ford", "focus");

        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].defect_description, "Brake pipe corroded");
        assert_eq!(observations[0].occurrence_count, 50);
        assert_eq!(observations[0].sample_size, 2_000);
        assert_eq!(observations[1].sample_size, 2_000);
        assert_eq!(observations[0].model_identifier, "FORD FOCUS");
    }

    #[test]
    fn scope_rates_exclude_target_model() {
        let corpus = corpus();
        let peers = PeerGroup::new("FORD", "FOCUS", [2015, 2016]);

        let national = corpus.get_corpus_defect_rates(BaselineScope::National, &peers);
        assert!((national["Brake pipe corroded"] - 50.0 / 4_000.0 * 100.0).abs() < 1e-9);
        assert!(!national.contains_key("Horn inoperative"));

        let same_year = corpus.get_corpus_defect_rates(BaselineScope::SameYear, &peers);
        assert!((same_year["Brake pipe corroded"] - 0.5).abs() < 1e-9);

        let same_make = corpus.get_corpus_defect_rates(BaselineScope::SameMake, &peers);
        assert!((same_make["Brake pipe corroded"] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn empty_scope_yields_no_rates() {
        let corpus = corpus();
        let peers = PeerGroup::new("VAUXHALL", "ASTRA", [2009]);
        let same_make = corpus.get_corpus_defect_rates(BaselineScope::SameMake, &peers);
        assert!(same_make.is_empty());
    }

    #[test]
    fn models_are_distinct_and_sorted() {
        assert_eq!(
            corpus().models(),
            vec![
                ("FORD".to_string(), "FIESTA".to_string()),
                ("FORD".to_string(), "FOCUS".to_string()),
                ("VAUXHALL".to_string(), "ASTRA".to_string()),
            ]
        );
    }

    #[test]
    fn vehicle_rates_filter_by_make() {
        assert_eq!(corpus().get_vehicle_rates_by_year(Some("Ford")).len(), 3);
        assert_eq!(corpus().get_vehicle_rates_by_year(None).len(), 4);
    }
}
