use std::path::PathBuf;

/// Structural problems found while loading configuration.
///
/// These are the only fatal errors in the analysis core: they are raised
/// before any observation is touched and abort the run.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("component group at position {index} has an empty identifier")]
    EmptyGroupId { index: usize },

    #[error("duplicate component group identifier: {0}")]
    DuplicateGroup(String),

    #[error("component group '{0}' has no patterns")]
    EmptyPatternSet(String),

    #[error("invalid pattern '{pattern}' in component group '{group_id}': {source}")]
    InvalidPattern {
        group_id: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to read component group table {}: {source}", path.display())]
    ReadTable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse component group table {}: {source}", path.display())]
    ParseTable {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {name}: '{value}'")]
    InvalidSetting { name: &'static str, value: String },
}
