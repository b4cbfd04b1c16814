//! Configuration loading and management.

use std::path::{Path, PathBuf};

use cs_core::{ForestConfig, PipelineConfig, SplitterConfig, TargetDomain, ValidationError};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Site whose arrivals end a session, as a host or URL.
    pub target_domain: String,

    /// Seed for gap sampling and the isolation forest.
    pub seed: u64,

    /// Trees per isolation forest.
    pub n_estimators: usize,

    /// Upper bound on the rows each tree is grown from.
    pub max_samples: usize,

    /// Share of a session's gaps used to fit the gap model.
    pub sample_fraction: f64,

    /// Smallest gap sample, for sessions where the fraction rounds low.
    pub min_sample_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        let splitter = SplitterConfig::default();
        Self {
            database_path: data_dir.join("cs.db"),
            target_domain: "tripadvisor.com".to_string(),
            seed: splitter.forest.seed,                 // 0
            n_estimators: splitter.forest.n_estimators, // 100
            max_samples: splitter.forest.max_samples,   // 256
            sample_fraction: splitter.sample_fraction,  // 0.1
            min_sample_size: splitter.min_sample_size,  // 16
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (CS_*)
        figment = figment.merge(Env::prefixed("CS_"));

        figment.extract()
    }

    /// Builds the pipeline parameters.
    pub fn pipeline(&self) -> Result<PipelineConfig, ValidationError> {
        Ok(PipelineConfig {
            target_domain: TargetDomain::new(&self.target_domain)?,
            splitter: SplitterConfig {
                sample_fraction: self.sample_fraction,
                min_sample_size: self.min_sample_size,
                forest: ForestConfig {
                    n_estimators: self.n_estimators,
                    max_samples: self.max_samples,
                    seed: self.seed,
                },
            },
        })
    }
}

/// Returns the platform-specific config directory for cs.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("cs"))
}

/// Returns the platform-specific data directory for cs.
///
/// On Linux: `~/.local/share/cs`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("cs"))
}
