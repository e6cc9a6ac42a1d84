use bqscore_error::{ErrorCodes, ScoringError};
use figment::providers::{Env, Format, Yaml};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "./bqscore_config.yaml";
const ENV_PREFIX: &str = "BQSCORE_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Error loading config: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ScoringError for ConfigError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::InvalidArgument
    }
}

/// Which scorer [`crate::VectorScorer::new`] builds.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScorerImplementation {
    /// Accelerated when the CPU and input support it, scalar otherwise.
    #[default]
    Auto,
    Scalar,
    /// Fails construction on CPUs without the kernel.
    Accelerated,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct QuantizerConfig {
    /// Weight of the orthogonal error term in the interval loss.
    pub lambda: f32,
    /// Upper bound on coordinate descent steps.
    pub iterations: usize,
}

impl Default for QuantizerConfig {
    fn default() -> Self {
        Self {
            lambda: 0.1,
            iterations: 5,
        }
    }
}

/// # Description
/// Scoring configuration. Read from a YAML file and, with precedence,
/// from environment variables prefixed with `BQSCORE_`. Nested fields use
/// `__` as separator, e.g. `BQSCORE_QUANTIZER__LAMBDA`.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ScorerConfig {
    pub implementation: ScorerImplementation,
    /// Stage query and batch buffers even when they could be used in place.
    pub force_staging: bool,
    pub quantizer: QuantizerConfig,
}

impl ScorerConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    pub fn load_from_path(path: &str) -> Result<Self, ConfigError> {
        // Unfortunately, figment doesn't support environment variables with underscores. So we have to map and replace them.
        let mut f = figment::Figment::from(
            Env::prefixed(ENV_PREFIX).map(|k| k.as_str().replace("__", ".").into()),
        );
        if std::path::Path::new(path).exists() {
            f = figment::Figment::from(Yaml::file(path)).merge(f);
        }
        let config: Self = f.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let lambda = self.quantizer.lambda;
        if !(lambda > 0.0 && lambda <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "quantizer.lambda must be in (0, 1], got {lambda}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|_| {
            let config = ScorerConfig::load().unwrap();
            assert_eq!(config, ScorerConfig::default());
            assert_eq!(config.implementation, ScorerImplementation::Auto);
            assert!(!config.force_staging);
            assert_eq!(config.quantizer.lambda, 0.1);
            assert_eq!(config.quantizer.iterations, 5);
            Ok(())
        });
    }

    #[test]
    fn test_load_from_yaml() {
        Jail::expect_with(|jail| {
            let _ = jail.create_file(
                "bqscore_config.yaml",
                r#"
                implementation: scalar
                quantizer:
                    iterations: 3
                "#,
            );
            let config = ScorerConfig::load().unwrap();
            assert_eq!(config.implementation, ScorerImplementation::Scalar);
            assert!(!config.force_staging);
            assert_eq!(config.quantizer.lambda, 0.1);
            assert_eq!(config.quantizer.iterations, 3);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_yaml() {
        Jail::expect_with(|jail| {
            let _ = jail.create_file(
                "custom.yaml",
                r#"
                implementation: scalar
                force_staging: false
                "#,
            );
            jail.set_env("BQSCORE_IMPLEMENTATION", "accelerated");
            jail.set_env("BQSCORE_FORCE_STAGING", "true");
            jail.set_env("BQSCORE_QUANTIZER__LAMBDA", "0.25");
            let config = ScorerConfig::load_from_path("custom.yaml").unwrap();
            assert_eq!(config.implementation, ScorerImplementation::Accelerated);
            assert!(config.force_staging);
            assert_eq!(config.quantizer.lambda, 0.25);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values() {
        Jail::expect_with(|jail| {
            jail.set_env("BQSCORE_QUANTIZER__LAMBDA", "0");
            assert!(matches!(
                ScorerConfig::load(),
                Err(ConfigError::Invalid(_))
            ));
            jail.set_env("BQSCORE_QUANTIZER__LAMBDA", "0.1");
            jail.set_env("BQSCORE_IMPLEMENTATION", "gpu");
            assert!(matches!(ScorerConfig::load(), Err(ConfigError::Load(_))));
            Ok(())
        });
    }
}
