//! Defect-elevation analysis over aggregated MOT inspection statistics.
//!
//! For a given vehicle model, finds the defects that occur at a statistically
//! elevated rate compared with similar vehicles, and compares the model's pass
//! rate with vehicles of the same age.

pub mod age_band;
pub mod aggregator;
pub mod baseline;
pub mod classifier;
pub mod config;
pub mod error;
pub mod markdown;
pub mod models;
pub mod report;
pub mod resolver;
pub mod source;

pub use config::AnalysisConfig;
pub use error::ConfigurationError;
pub use report::{generate_report, AnalysisReport};
pub use resolver::ComponentResolver;
pub use source::{InspectionCorpus, InspectionSource};
