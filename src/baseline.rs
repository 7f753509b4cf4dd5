//! Composite baseline rates. The target model's own rows are never part of
//! any scope.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::models::same_name;
use crate::resolver::ComponentResolver;
use crate::source::InspectionSource;

pub const NATIONAL_WEIGHT: f64 = 0.5;
pub const SAME_YEAR_WEIGHT: f64 = 0.3;
pub const SAME_MAKE_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineScope {
    National,
    SameYear,
    SameMake,
}

impl BaselineScope {
    pub const ALL: [BaselineScope; 3] = [Self::National, Self::SameYear, Self::SameMake];

    pub fn weight(self) -> f64 {
        match self {
            Self::National => NATIONAL_WEIGHT,
            Self::SameYear => SAME_YEAR_WEIGHT,
            Self::SameMake => SAME_MAKE_WEIGHT,
        }
    }
}

/// Weighted blend of the three scope rates. A missing scope counts as zero and
/// its weight is not redistributed.
pub fn composite_baseline(
    national: Option<f64>,
    same_year: Option<f64>,
    same_make: Option<f64>,
) -> f64 {
    national.unwrap_or(0.0) * NATIONAL_WEIGHT
        + same_year.unwrap_or(0.0) * SAME_YEAR_WEIGHT
        + same_make.unwrap_or(0.0) * SAME_MAKE_WEIGHT
}

/// The comparison population for one target model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerGroup {
    pub make: String,
    pub model: String,
    pub model_years: BTreeSet<i32>,
}

impl PeerGroup {
    pub fn new(make: &str, model: &str, model_years: impl IntoIterator<Item = i32>) -> Self {
        Self {
            make: make.to_string(),
            model: model.to_string(),
            model_years: model_years.into_iter().collect(),
        }
    }

    /// Whether a corpus row for `(make, model, model_year)` belongs to `scope`.
    pub fn includes(&self, scope: BaselineScope, make: &str, model: &str, model_year: i32) -> bool {
        if same_name(make, &self.make) && same_name(model, &self.model) {
            return false;
        }
        match scope {
            BaselineScope::National => true,
            BaselineScope::SameYear => self.model_years.contains(&model_year),
            BaselineScope::SameMake => same_name(make, &self.make),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BaselineKey {
    Defect(String),
    Group(String),
}

/// Per-scope rates and their blend, kept together so every ratio can be traced
/// back to its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompositeBaseline {
    pub national: Option<f64>,
    pub same_year: Option<f64>,
    pub same_make: Option<f64>,
    pub composite: f64,
}

impl CompositeBaseline {
    pub fn from_scopes(national: Option<f64>, same_year: Option<f64>, same_make: Option<f64>) -> Self {
        Self {
            national,
            same_year,
            same_make,
            composite: composite_baseline(national, same_year, same_make),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// One scope's rates, by exact description and by component group.
struct ScopeRates {
    defects: BTreeMap<String, f64>,
    groups: BTreeMap<String, f64>,
}

/// Baselines for one analysis run, memoized by key.
///
/// Build a fresh calculator per report; it holds the scope rates for one
/// peer group and must not be reused for another target model.
pub struct BaselineCalculator {
    national: ScopeRates,
    same_year: ScopeRates,
    same_make: ScopeRates,
    resolved_descriptions: usize,
    cache: HashMap<BaselineKey, CompositeBaseline>,
    stats: CacheStats,
}

impl BaselineCalculator {
    pub fn new<S>(source: &S, peers: &PeerGroup, resolver: &ComponentResolver) -> Self
    where
        S: InspectionSource + ?Sized,
    {
        Self::from_scope_rates(
            resolver,
            source.get_corpus_defect_rates(BaselineScope::National, peers),
            source.get_corpus_defect_rates(BaselineScope::SameYear, peers),
            source.get_corpus_defect_rates(BaselineScope::SameMake, peers),
        )
    }

    /// Each distinct description is resolved once; group rates are summed
    /// up front so a group lookup never re-runs the rule list.
    pub fn from_scope_rates(
        resolver: &ComponentResolver,
        national: BTreeMap<String, f64>,
        same_year: BTreeMap<String, f64>,
        same_make: BTreeMap<String, f64>,
    ) -> Self {
        let mut memberships: HashMap<String, Option<String>> = HashMap::new();
        let national = ScopeRates::new(national, resolver, &mut memberships);
        let same_year = ScopeRates::new(same_year, resolver, &mut memberships);
        let same_make = ScopeRates::new(same_make, resolver, &mut memberships);

        tracing::debug!(
            national = national.defects.len(),
            same_year = same_year.defects.len(),
            same_make = same_make.defects.len(),
            resolved = memberships.len(),
            "baseline scope rates loaded"
        );
        Self {
            national,
            same_year,
            same_make,
            resolved_descriptions: memberships.len(),
            cache: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    fn rates(&self, scope: BaselineScope) -> &ScopeRates {
        match scope {
            BaselineScope::National => &self.national,
            BaselineScope::SameYear => &self.same_year,
            BaselineScope::SameMake => &self.same_make,
        }
    }

    /// Rate of `key` within one scope; `None` when no description in the
    /// scope corresponds to the key.
    fn scope_rate(&self, scope: BaselineScope, key: &BaselineKey) -> Option<f64> {
        let rates = self.rates(scope);
        match key {
            BaselineKey::Defect(description) => rates.defects.get(description).copied(),
            BaselineKey::Group(group_id) => rates.groups.get(group_id).copied(),
        }
    }

    /// Distinct descriptions run through the resolver across all scopes.
    pub fn resolved_descriptions(&self) -> usize {
        self.resolved_descriptions
    }

    pub fn baseline(&mut self, key: &BaselineKey) -> CompositeBaseline {
        if let Some(cached) = self.cache.get(key) {
            self.stats.hits += 1;
            return *cached;
        }

        self.stats.misses += 1;
        let baseline = CompositeBaseline::from_scopes(
            self.scope_rate(BaselineScope::National, key),
            self.scope_rate(BaselineScope::SameYear, key),
            self.scope_rate(BaselineScope::SameMake, key),
        );
        self.cache.insert(key.clone(), baseline);
        baseline
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.stats
    }
}

impl ScopeRates {
    fn new(
        defects: BTreeMap<String, f64>,
        resolver: &ComponentResolver,
        memberships: &mut HashMap<String, Option<String>>,
    ) -> Self {
        let mut groups: BTreeMap<String, f64> = BTreeMap::new();
        for (description, rate) in &defects {
            let group = memberships
                .entry(description.clone())
                .or_insert_with(|| resolver.resolve(description).map(str::to_string));
            if let Some(group_id) = group {
                *groups.entry(group_id.clone()).or_insert(0.0) += rate;
            }
        }
        Self { defects, groups }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rates(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
        entries.iter().map(|(d, r)| (d.to_string(), *r)).collect()
    }

    #[test]
    fn weights_sum_to_one() {
        let total: f64 = BaselineScope::ALL.iter().map(|s| s.weight()).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn composite_blends_scopes() {
        let composite = composite_baseline(Some(1.0), Some(2.0), Some(3.0));
        assert!((composite - (0.5 + 0.6 + 0.6)).abs() < 1e-12);
    }

    #[test]
    fn missing_scope_weight_is_not_redistributed() {
        assert!((composite_baseline(Some(1.0), None, None) - 0.5).abs() < 1e-12);
        assert!((composite_baseline(None, Some(1.0), Some(1.0)) - 0.5).abs() < 1e-12);
        assert_eq!(composite_baseline(None, None, None), 0.0);
    }

    #[test]
    fn peers_exclude_the_target_model() {
        let peers = PeerGroup::new("FORD", "FOCUS", [2015, 2016]);

        assert!(!peers.includes(BaselineScope::National, "ford", "focus", 2015));
        assert!(peers.includes(BaselineScope::National, "VAUXHALL", "ASTRA", 2009));
        assert!(peers.includes(BaselineScope::SameYear, "VAUXHALL", "ASTRA", 2016));
        assert!(!peers.includes(BaselineScope::SameYear, "VAUXHALL", "ASTRA", 2009));
        assert!(peers.includes(BaselineScope::SameMake, "FORD", "FIESTA", 2009));
        assert!(!peers.includes(BaselineScope::SameMake, "VAUXHALL", "ASTRA", 2016));
    }

    #[test]
    fn group_baseline_sums_member_descriptions() {
        let resolver = ComponentResolver::builtin().unwrap();
        let mut calculator = BaselineCalculator::from_scope_rates(
            &resolver,
            rates(&[
                ("Brakes imbalance (axle, 70%)", 0.6),
                ("Brakes imbalance (steered axle, 50%)", 0.1),
                ("Horn inoperative", 0.4),
            ]),
            rates(&[("Brakes imbalance (axle, 70%)", 0.8)]),
            rates(&[]),
        );

        let baseline = calculator.baseline(&BaselineKey::Group("brake_imbalance_effort".into()));
        assert!((baseline.national.unwrap() - 0.7).abs() < 1e-12);
        assert!((baseline.same_year.unwrap() - 0.8).abs() < 1e-12);
        assert_eq!(baseline.same_make, None);
        assert!((baseline.composite - (0.35 + 0.24)).abs() < 1e-12);
    }

    #[test]
    fn descriptions_shared_across_scopes_resolve_once() {
        let resolver = ComponentResolver::builtin().unwrap();
        let mut calculator = BaselineCalculator::from_scope_rates(
            &resolver,
            rates(&[
                ("Brakes imbalance (axle, 70%)", 0.6),
                ("Horn inoperative", 0.4),
            ]),
            rates(&[("Brakes imbalance (axle, 70%)", 0.8)]),
            rates(&[
                ("Brakes imbalance (axle, 70%)", 0.5),
                ("Brakes imbalance (steered axle, 50%)", 0.3),
            ]),
        );

        assert_eq!(calculator.resolved_descriptions(), 3);

        let group = BaselineKey::Group("brake_imbalance_effort".into());
        let baseline = calculator.baseline(&group);
        assert!((baseline.same_make.unwrap() - 0.8).abs() < 1e-12);
        let missing = calculator.baseline(&BaselineKey::Group("seat_belt".into()));
        assert_eq!(missing.national, None);
        assert_eq!(missing.composite, 0.0);
    }

    #[test]
    fn defect_baseline_uses_exact_description() {
        let resolver = ComponentResolver::builtin().unwrap();
        let mut calculator = BaselineCalculator::from_scope_rates(
            &resolver,
            rates(&[("Horn inoperative", 0.4)]),
            rates(&[("Horn inoperative", 0.2)]),
            rates(&[("Horn inoperative", 1.0)]),
        );

        let baseline = calculator.baseline(&BaselineKey::Defect("Horn inoperative".into()));
        assert!((baseline.composite - (0.2 + 0.06 + 0.2)).abs() < 1e-12);

        let unknown = calculator.baseline(&BaselineKey::Defect("Horn missing".into()));
        assert_eq!(unknown.composite, 0.0);
    }

    #[test]
    fn baselines_are_memoized_per_key() {
        let resolver = ComponentResolver::builtin().unwrap();
        let mut calculator = BaselineCalculator::from_scope_rates(
            &resolver,
            rates(&[("Horn inoperative", 0.4)]),
            rates(&[]),
            rates(&[]),
        );
        let key = BaselineKey::Defect("Horn inoperative".into());

        let first = calculator.baseline(&key);
        let second = calculator.baseline(&key);

        assert_eq!(first, second);
        assert_eq!(calculator.cache_stats(), CacheStats { hits: 1, misses: 1 });
    }
}
