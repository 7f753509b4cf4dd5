//! Maps free-text defect descriptions onto component groups. First matching
//! rule wins, so group and pattern order matter.

use std::collections::HashSet;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// A canonical component group and the patterns that select it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentGroup {
    pub group_id: String,
    pub display_name: String,
    pub category: String,
    pub patterns: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GroupTable {
    groups: Vec<ComponentGroup>,
}

struct BuiltinGroup {
    group_id: &'static str,
    display_name: &'static str,
    category: &'static str,
    patterns: &'static [&'static str],
}

const BRAKES: &str = "Brakes";
const SUSPENSION: &str = "Suspension";
const STEERING: &str = "Steering";
const TYRES: &str = "Tyres";
const LAMPS: &str = "Lamps, reflectors and electrical equipment";
const EMISSIONS: &str = "Noise, emissions and leaks";
const BODY: &str = "Body, chassis, structure";
const VISIBILITY: &str = "Visibility";
const SEAT_BELTS: &str = "Seat belts and supplementary restraint systems";
const IDENTIFICATION: &str = "Identification of the vehicle";

/// Default table, most specific groups first.
const BUILTIN_GROUPS: &[BuiltinGroup] = &[
    BuiltinGroup {
        group_id: "brake_imbalance_effort",
        display_name: "Brake imbalance / braking effort",
        category: BRAKES,
        patterns: &[
            r"\bbrak(?:e|es|ing)\b.*\bimbalance",
            r"\bimbalance\b.*\bbrak",
            r"\bbrak(?:e|ing) effort",
            r"\bbrak(?:e|ing) efficiency",
        ],
    },
    BuiltinGroup {
        group_id: "parking_brake",
        display_name: "Parking brake",
        category: BRAKES,
        patterns: &[r"\bparking brake", r"\bhand ?brake"],
    },
    BuiltinGroup {
        group_id: "abs_warning",
        display_name: "ABS / anti-lock braking",
        category: BRAKES,
        patterns: &[r"\banti-?lock", r"\babs\b"],
    },
    BuiltinGroup {
        group_id: "brake_pipes_hoses",
        display_name: "Brake pipes and hoses",
        category: BRAKES,
        patterns: &[r"\bbrake (?:pipe|hose)", r"\bbrake fluid"],
    },
    BuiltinGroup {
        group_id: "brake_discs_pads",
        display_name: "Brake discs, drums and pads",
        category: BRAKES,
        patterns: &[
            r"\bbrake (?:disc|drum|pad|lining)",
            r"\b(?:disc|pad|lining)s?\b.*\b(?:worn|thin|scored|pitted)",
        ],
    },
    BuiltinGroup {
        group_id: "coil_spring",
        display_name: "Coil springs",
        category: SUSPENSION,
        patterns: &[r"\bcoil spring", r"\bspring\b.*\b(?:fractured|broken)"],
    },
    BuiltinGroup {
        group_id: "shock_absorber",
        display_name: "Shock absorbers",
        category: SUSPENSION,
        patterns: &[r"\bshock absorber", r"\bdamper\b"],
    },
    BuiltinGroup {
        group_id: "anti_roll_bar",
        display_name: "Anti-roll bar and linkage",
        category: SUSPENSION,
        patterns: &[r"\banti-?roll bar", r"\bstabili[sz]er"],
    },
    BuiltinGroup {
        group_id: "ball_joint",
        display_name: "Suspension ball joints",
        category: SUSPENSION,
        patterns: &[r"\bball joint"],
    },
    BuiltinGroup {
        group_id: "suspension_arm_bush",
        display_name: "Suspension arms, pins and bushes",
        category: SUSPENSION,
        patterns: &[
            r"\bsuspension arm",
            r"\bwishbone",
            r"\bpin (?:or|and) bush",
            r"\bsuspension\b.*\bbush",
        ],
    },
    BuiltinGroup {
        group_id: "steering_linkage",
        display_name: "Steering rack and linkage",
        category: STEERING,
        patterns: &[
            r"\btrack rod",
            r"\bsteering (?:rack|box|gear|linkage)",
            r"\bsteering\b.*\bgaiter",
        ],
    },
    BuiltinGroup {
        group_id: "tyre_tread",
        display_name: "Tyre tread depth",
        category: TYRES,
        patterns: &[r"\btread depth", r"\btyre\b.*\btread"],
    },
    BuiltinGroup {
        group_id: "tyre_damage",
        display_name: "Tyre damage",
        category: TYRES,
        patterns: &[r"\btyre\b.*\b(?:cut|damaged|bulge|lump|cord)"],
    },
    BuiltinGroup {
        group_id: "headlamp_aim",
        display_name: "Headlamp aim",
        category: LAMPS,
        patterns: &[r"\bheadlamp aim", r"\bheadlamp\b.*\b(?:beam|aim)"],
    },
    BuiltinGroup {
        group_id: "lamp_failure",
        display_name: "Lamps inoperative or missing",
        category: LAMPS,
        patterns: &[
            r"\b(?:lamp|light|indicator)s?\b.*\b(?:inoperative|not working|missing)",
        ],
    },
    BuiltinGroup {
        group_id: "exhaust_emissions",
        display_name: "Exhaust and emissions",
        category: EMISSIONS,
        patterns: &[
            r"\bemissions?\b",
            r"\bexhaust\b.*\b(?:leak|smoke|insecure)",
            r"\blambda\b",
        ],
    },
    BuiltinGroup {
        group_id: "oil_leak",
        display_name: "Oil leaks",
        category: EMISSIONS,
        patterns: &[r"\boil leak", r"\bleaking oil"],
    },
    BuiltinGroup {
        group_id: "corrosion",
        display_name: "Structural corrosion",
        category: BODY,
        patterns: &[r"\bcorro(?:ded|sion)"],
    },
    BuiltinGroup {
        group_id: "wipers_washers",
        display_name: "Wipers and washers",
        category: VISIBILITY,
        patterns: &[r"\bwiper", r"\bwasher\b"],
    },
    BuiltinGroup {
        group_id: "windscreen_damage",
        display_name: "Windscreen damage",
        category: VISIBILITY,
        patterns: &[r"\bwindscreen\b.*\b(?:damage|crack|chip)"],
    },
    BuiltinGroup {
        group_id: "seat_belt",
        display_name: "Seat belts",
        category: SEAT_BELTS,
        patterns: &[r"\bseat ?belt"],
    },
    BuiltinGroup {
        group_id: "airbag_srs",
        display_name: "Airbags and SRS",
        category: SEAT_BELTS,
        patterns: &[r"\bair ?bag", r"\bsrs\b"],
    },
    BuiltinGroup {
        group_id: "registration_plate",
        display_name: "Registration plates",
        category: IDENTIFICATION,
        patterns: &[r"\bregistration plate"],
    },
];

/// The built-in group table as owned values.
pub fn builtin_groups() -> Vec<ComponentGroup> {
    BUILTIN_GROUPS
        .iter()
        .map(|g| ComponentGroup {
            group_id: g.group_id.to_string(),
            display_name: g.display_name.to_string(),
            category: g.category.to_string(),
            patterns: g.patterns.iter().map(|p| p.to_string()).collect(),
        })
        .collect()
}

struct Rule {
    matcher: Regex,
    group_index: usize,
}

/// Ordered `(pattern, group)` rules evaluated first-match-wins.
pub struct ComponentResolver {
    groups: Vec<ComponentGroup>,
    rules: Vec<Rule>,
}

impl std::fmt::Debug for ComponentResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentResolver")
            .field("groups", &self.groups.len())
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl ComponentResolver {
    /// Compile a group table. Every structural problem is reported here so that
    /// matching itself can never fail.
    pub fn new(groups: Vec<ComponentGroup>) -> Result<Self, ConfigurationError> {
        let mut seen = HashSet::new();
        let mut rules = Vec::new();

        for (index, group) in groups.iter().enumerate() {
            if group.group_id.trim().is_empty() {
                return Err(ConfigurationError::EmptyGroupId { index });
            }
            if !seen.insert(group.group_id.as_str()) {
                return Err(ConfigurationError::DuplicateGroup(group.group_id.clone()));
            }
            if group.patterns.is_empty() {
                return Err(ConfigurationError::EmptyPatternSet(group.group_id.clone()));
            }

            for pattern in &group.patterns {
                let matcher = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| ConfigurationError::InvalidPattern {
                        group_id: group.group_id.clone(),
                        pattern: pattern.clone(),
                        source,
                    })?;
                rules.push(Rule {
                    matcher,
                    group_index: index,
                });
            }
        }

        tracing::debug!(
            groups = groups.len(),
            rules = rules.len(),
            "component group table compiled"
        );

        Ok(Self { groups, rules })
    }

    pub fn builtin() -> Result<Self, ConfigurationError> {
        Self::new(builtin_groups())
    }

    /// Load a table from a JSON file of the form `{"groups": [...]}`.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigurationError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigurationError::ReadTable {
            path: path.to_path_buf(),
            source,
        })?;
        let table: GroupTable =
            serde_json::from_str(&raw).map_err(|source| ConfigurationError::ParseTable {
                path: path.to_path_buf(),
                source,
            })?;
        Self::new(table.groups)
    }

    /// Group identifier of the first rule matching `description`.
    pub fn resolve(&self, description: &str) -> Option<&str> {
        self.resolve_group(description).map(|g| g.group_id.as_str())
    }

    pub fn resolve_group(&self, description: &str) -> Option<&ComponentGroup> {
        self.rules
            .iter()
            .find(|rule| rule.matcher.is_match(description))
            .map(|rule| &self.groups[rule.group_index])
    }

    pub fn group(&self, group_id: &str) -> Option<&ComponentGroup> {
        self.groups.iter().find(|g| g.group_id == group_id)
    }

    pub fn groups(&self) -> &[ComponentGroup] {
        &self.groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: &str, patterns: &[&str]) -> ComponentGroup {
        ComponentGroup {
            group_id: id.to_string(),
            display_name: id.to_string(),
            category: "Test".to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn builtin_table_compiles() {
        let resolver = ComponentResolver::builtin().expect("builtin table is valid");
        assert_eq!(resolver.groups().len(), BUILTIN_GROUPS.len());
    }

    #[test]
    fn brake_imbalance_wordings_share_a_group() {
        let resolver = ComponentResolver::builtin().unwrap();
        assert_eq!(
            resolver.resolve("Brakes imbalance (axle, 70%)"),
            Some("brake_imbalance_effort")
        );
        assert_eq!(
            resolver.resolve("Brakes imbalance (steered axle, 50%)"),
            Some("brake_imbalance_effort")
        );
        assert_eq!(
            resolver.resolve("Service brake efficiency below requirements"),
            Some("brake_imbalance_effort")
        );
    }

    #[test]
    fn matching_is_case_insensitive() {
        let resolver = ComponentResolver::builtin().unwrap();
        assert_eq!(
            resolver.resolve("NEARSIDE FRONT COIL SPRING FRACTURED"),
            Some("coil_spring")
        );
    }

    #[test]
    fn unmatched_descriptions_stay_ungrouped() {
        let resolver = ComponentResolver::builtin().unwrap();
        assert_eq!(resolver.resolve("Horn inoperative for its purpose"), None);
    }

    #[test]
    fn first_matching_rule_wins() {
        let resolver = ComponentResolver::new(vec![
            group("specific", &["brake pipe"]),
            group("broad", &["brake"]),
        ])
        .unwrap();

        assert_eq!(resolver.resolve("Brake pipe corroded"), Some("specific"));
        assert_eq!(resolver.resolve("Brake pedal worn"), Some("broad"));
    }

    #[test]
    fn resolution_does_not_depend_on_call_order() {
        let resolver = ComponentResolver::builtin().unwrap();
        let first = resolver.resolve("Tyre tread depth below requirements");
        let _ = resolver.resolve("Brakes imbalance (axle, 70%)");
        let second = resolver.resolve("Tyre tread depth below requirements");
        assert_eq!(first, second);
        assert_eq!(first, Some("tyre_tread"));
    }

    #[test]
    fn invalid_pattern_is_rejected_at_load() {
        let err = ComponentResolver::new(vec![group("broken", &["(unclosed"])]).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::InvalidPattern { ref group_id, .. } if group_id == "broken"
        ));
    }

    #[test]
    fn duplicate_and_empty_groups_are_rejected() {
        let dup = ComponentResolver::new(vec![group("a", &["x"]), group("a", &["y"])]);
        assert!(matches!(dup, Err(ConfigurationError::DuplicateGroup(id)) if id == "a"));

        let empty = ComponentResolver::new(vec![group("a", &[])]);
        assert!(matches!(empty, Err(ConfigurationError::EmptyPatternSet(_))));

        let blank = ComponentResolver::new(vec![group("  ", &["x"])]);
        assert!(matches!(
            blank,
            Err(ConfigurationError::EmptyGroupId { index: 0 })
        ));
    }

    #[test]
    fn table_loads_from_json_file() {
        let path = std::env::temp_dir().join(format!(
            "component-groups-{}.json",
            uuid::Uuid::new_v4()
        ));
        std::fs::write(
            &path,
            r#"{"groups": [{"group_id": "horn", "display_name": "Horn", "category": "Other", "patterns": ["\\bhorn\\b"]}]}"#,
        )
        .unwrap();

        let resolver = ComponentResolver::from_json_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(resolver.resolve("Horn inoperative"), Some("horn"));
        assert_eq!(resolver.group("horn").map(|g| g.category.as_str()), Some("Other"));
    }

    #[test]
    fn missing_table_file_is_a_configuration_error() {
        let err = ComponentResolver::from_json_file(Path::new("/nonexistent/groups.json"))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::ReadTable { .. }));
    }
}
