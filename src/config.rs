use std::path::PathBuf;
use std::str::FromStr;

use chrono::{Datelike, Utc};

use crate::classifier::DEFAULT_TOP_N;
use crate::error::ConfigurationError;
use crate::resolver::ComponentResolver;

pub const ENV_REFERENCE_YEAR: &str = "MOT_REFERENCE_YEAR";
pub const ENV_TOP_N: &str = "MOT_TOP_N";
pub const ENV_COMPONENT_GROUPS: &str = "MOT_COMPONENT_GROUPS";

/// Settings for one analysis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Year vehicle ages are measured from (default: current UTC year).
    pub reference_year: i32,
    /// Issues kept per severity tier (default: `10`).
    pub top_n: usize,
    /// JSON component group table replacing the built-in one.
    pub component_groups: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            reference_year: Utc::now().year(),
            top_n: DEFAULT_TOP_N,
            component_groups: None,
        }
    }
}

impl AnalysisConfig {
    /// Load settings from environment variables, falling back to defaults.
    ///
    /// | Env Var                | Default            |
    /// |------------------------|--------------------|
    /// | `MOT_REFERENCE_YEAR`   | current UTC year   |
    /// | `MOT_TOP_N`            | `10`               |
    /// | `MOT_COMPONENT_GROUPS` | built-in table     |
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let reference_year = match lookup(ENV_REFERENCE_YEAR) {
            Some(raw) => parse_setting(ENV_REFERENCE_YEAR, &raw)?,
            None => defaults.reference_year,
        };
        let top_n = match lookup(ENV_TOP_N) {
            Some(raw) => parse_setting(ENV_TOP_N, &raw)?,
            None => defaults.top_n,
        };
        let component_groups = lookup(ENV_COMPONENT_GROUPS)
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from);

        let config = Self {
            reference_year,
            top_n,
            component_groups,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.top_n == 0 {
            return Err(ConfigurationError::InvalidSetting {
                name: ENV_TOP_N,
                value: self.top_n.to_string(),
            });
        }
        Ok(())
    }

    /// Resolver for the configured group table.
    pub fn resolver(&self) -> Result<ComponentResolver, ConfigurationError> {
        match &self.component_groups {
            Some(path) => ComponentResolver::from_json_file(path),
            None => ComponentResolver::builtin(),
        }
    }
}

fn parse_setting<T: FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigurationError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigurationError::InvalidSetting {
            name,
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = AnalysisConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.top_n, DEFAULT_TOP_N);
        assert_eq!(config.reference_year, Utc::now().year());
        assert_eq!(config.component_groups, None);
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = AnalysisConfig::from_lookup(lookup(&[
            (ENV_REFERENCE_YEAR, "2024"),
            (ENV_TOP_N, " 5 "),
            (ENV_COMPONENT_GROUPS, "/etc/mot/groups.json"),
        ]))
        .unwrap();

        assert_eq!(config.reference_year, 2024);
        assert_eq!(config.top_n, 5);
        assert_eq!(
            config.component_groups,
            Some(PathBuf::from("/etc/mot/groups.json"))
        );
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let zero = AnalysisConfig::from_lookup(lookup(&[(ENV_TOP_N, "0")]));
        assert!(matches!(
            zero,
            Err(ConfigurationError::InvalidSetting { name: ENV_TOP_N, .. })
        ));

        let text = AnalysisConfig::from_lookup(lookup(&[(ENV_REFERENCE_YEAR, "last year")]));
        assert!(matches!(
            text,
            Err(ConfigurationError::InvalidSetting {
                name: ENV_REFERENCE_YEAR,
                ..
            })
        ));
    }

    #[test]
    fn default_config_uses_builtin_groups() {
        let resolver = AnalysisConfig::default().resolver().unwrap();
        assert!(resolver.group("brake_imbalance_effort").is_some());
    }
}
