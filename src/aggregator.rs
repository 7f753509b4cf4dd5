//! Sums wording variants of one defect into a single per-group observation.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::{rate_per_hundred, DefectObservation};
use crate::resolver::ComponentResolver;

/// All observations of one component group for the target model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedDefect {
    pub group_id: String,
    pub display_name: String,
    pub category: String,
    pub total_occurrences: u64,
    pub sample_size: u64,
    /// Distinct descriptions, in order of first appearance.
    pub variant_descriptions: Vec<String>,
}

impl GroupedDefect {
    pub fn variant_count(&self) -> usize {
        self.variant_descriptions.len()
    }

    pub fn model_rate(&self) -> f64 {
        rate_per_hundred(self.total_occurrences, self.sample_size)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    pub grouped: Vec<GroupedDefect>,
    pub ungrouped: Vec<DefectObservation>,
}

impl Aggregation {
    pub fn is_empty(&self) -> bool {
        self.grouped.is_empty() && self.ungrouped.is_empty()
    }

    pub fn total_occurrences(&self) -> u64 {
        self.grouped.iter().map(|g| g.total_occurrences).sum::<u64>()
            + self.ungrouped.iter().map(|o| o.occurrence_count).sum::<u64>()
    }
}

/// Partition the target model's observations by component group.
///
/// All observations are expected to share one denominator: the model's total
/// tests. The first observation's sample size is used for every group.
pub fn aggregate(observations: &[DefectObservation], resolver: &ComponentResolver) -> Aggregation {
    let Some(first) = observations.first() else {
        return Aggregation::default();
    };
    let sample_size = first.sample_size;

    if observations.iter().any(|o| o.sample_size != sample_size) {
        tracing::warn!(
            model = %first.model_identifier,
            sample_size,
            "observations disagree on sample size; using the first"
        );
    }

    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut grouped: Vec<GroupedDefect> = Vec::new();
    let mut ungrouped: Vec<DefectObservation> = Vec::new();

    for observation in observations {
        let Some(group) = resolver.resolve_group(&observation.defect_description) else {
            ungrouped.push(observation.clone());
            continue;
        };

        let position = *index.entry(group.group_id.as_str()).or_insert_with(|| {
            grouped.push(GroupedDefect {
                group_id: group.group_id.clone(),
                display_name: group.display_name.clone(),
                category: group.category.clone(),
                total_occurrences: 0,
                sample_size,
                variant_descriptions: Vec::new(),
            });
            grouped.len() - 1
        });

        let entry = &mut grouped[position];
        entry.total_occurrences += observation.occurrence_count;
        if !entry
            .variant_descriptions
            .contains(&observation.defect_description)
        {
            entry
                .variant_descriptions
                .push(observation.defect_description.clone());
        }
    }

    tracing::debug!(
        observations = observations.len(),
        groups = grouped.len(),
        ungrouped = ungrouped.len(),
        "observations aggregated"
    );

    Aggregation { grouped, ungrouped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn observation(description: &str, count: u64) -> DefectObservation {
        DefectObservation {
            model_identifier: "FORD FOCUS".to_string(),
            defect_description: description.to_string(),
            category: "Brakes".to_string(),
            occurrence_count: count,
            sample_size: 881_000,
        }
    }

    #[test]
    fn variants_of_one_group_are_summed() {
        let resolver = ComponentResolver::builtin().unwrap();
        let aggregation = aggregate(
            &[
                observation("Brakes imbalance (axle, 70%)", 18_412),
                observation("Horn inoperative", 120),
                observation("Brakes imbalance (steered axle, 50%)", 2_934),
            ],
            &resolver,
        );

        assert_eq!(aggregation.grouped.len(), 1);
        let group = &aggregation.grouped[0];
        assert_eq!(group.group_id, "brake_imbalance_effort");
        assert_eq!(group.total_occurrences, 21_346);
        assert_eq!(group.variant_count(), 2);
        assert_eq!(
            group.variant_descriptions,
            vec![
                "Brakes imbalance (axle, 70%)".to_string(),
                "Brakes imbalance (steered axle, 50%)".to_string(),
            ]
        );
        assert!((group.model_rate() - 2.4229).abs() < 0.001);

        assert_eq!(aggregation.ungrouped.len(), 1);
        assert_eq!(aggregation.ungrouped[0].defect_description, "Horn inoperative");
    }

    #[test]
    fn groups_keep_first_appearance_order() {
        let resolver = ComponentResolver::builtin().unwrap();
        let aggregation = aggregate(
            &[
                observation("Tyre tread depth below requirements", 10),
                observation("Brakes imbalance (axle, 70%)", 20),
                observation("Tyre tread depth below requirements of 1.6mm", 5),
            ],
            &resolver,
        );

        let ids: Vec<&str> = aggregation.grouped.iter().map(|g| g.group_id.as_str()).collect();
        assert_eq!(ids, vec!["tyre_tread", "brake_imbalance_effort"]);
    }

    #[test]
    fn repeated_descriptions_count_once_as_variants() {
        let resolver = ComponentResolver::builtin().unwrap();
        let aggregation = aggregate(
            &[
                observation("Brakes imbalance (axle, 70%)", 10),
                observation("Brakes imbalance (axle, 70%)", 5),
            ],
            &resolver,
        );

        assert_eq!(aggregation.grouped[0].total_occurrences, 15);
        assert_eq!(aggregation.grouped[0].variant_count(), 1);
    }

    #[test]
    fn no_observations_give_empty_aggregation() {
        let resolver = ComponentResolver::builtin().unwrap();
        let aggregation = aggregate(&[], &resolver);
        assert!(aggregation.is_empty());
        assert_eq!(aggregation.total_occurrences(), 0);
    }

    const DESCRIPTIONS: &[&str] = &[
        "Brakes imbalance (axle, 70%)",
        "Brakes imbalance (steered axle, 50%)",
        "Brake pipe corroded",
        "Nearside front coil spring fractured",
        "Horn inoperative",
        "Number plate lamp missing",
        "Registration plate illegible",
        "Mirror damaged",
    ];

    proptest! {
        #[test]
        fn occurrences_are_never_double_counted(
            rows in proptest::collection::vec((0..DESCRIPTIONS.len(), 0u64..100_000), 0..40)
        ) {
            let resolver = ComponentResolver::builtin().unwrap();
            let observations: Vec<DefectObservation> = rows
                .iter()
                .map(|(i, count)| observation(DESCRIPTIONS[*i], *count))
                .collect();
            let input_total: u64 = observations.iter().map(|o| o.occurrence_count).sum();

            let aggregation = aggregate(&observations, &resolver);

            prop_assert_eq!(aggregation.total_occurrences(), input_total);
            for group in &aggregation.grouped {
                prop_assert!(group.variant_count() >= 1);
            }
        }
    }
}
