//! # Config Loader
//!
//! Builds the immutable `BridgeConfig`.
//!
//! Layering (later wins):
//! 1. Defaults
//! 2. Optional TOML / JSON file
//! 3. Environment variables
//! 4. Caller overrides (CLI flags), then [`ConfigLoader::validate`]
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load(Some(Path::new("bridge.toml"))).unwrap();
//! println!("topic: {}", config.destination.topic);
//! ```

pub mod env;
mod parser;
mod validator;

pub use contracts::BridgeConfig;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, optional file, process environment; validated
    pub fn load(path: Option<&Path>) -> Result<BridgeConfig, ContractError> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Like [`load`](Self::load) with an explicit environment lookup
    pub fn load_with_env<F>(path: Option<&Path>, lookup: F) -> Result<BridgeConfig, ContractError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::load_unvalidated(path, lookup)?;
        Self::validate(&mut config)?;
        Ok(config)
    }

    /// Layers 1-3 without validation, for callers applying their own overrides
    pub fn load_unvalidated<F>(
        path: Option<&Path>,
        lookup: F,
    ) -> Result<BridgeConfig, ContractError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => {
                let format = Self::detect_format(path)?;
                let content = Self::read_file(path)?;
                parser::parse(&content, format)?
            }
            None => BridgeConfig::default(),
        };
        env::apply_env(&mut config, lookup)?;
        Ok(config)
    }

    /// Load a config file without environment overrides
    ///
    /// Automatically detects format from file extension (.toml / .json).
    pub fn load_from_path(path: &Path) -> Result<BridgeConfig, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Parse and validate configuration content
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<BridgeConfig, ContractError> {
        let mut config = parser::parse(content, format)?;
        Self::validate(&mut config)?;
        Ok(config)
    }

    /// Normalize and validate a fully layered config
    pub fn validate(config: &mut BridgeConfig) -> Result<(), ContractError> {
        let trimmed = config.destination.endpoint.trim_end_matches('/').len();
        config.destination.endpoint.truncate(trimmed);
        validator::validate(config)
    }

    pub fn to_toml(config: &BridgeConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    pub fn to_json(config: &BridgeConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    fn read_file(path: &Path) -> Result<String, ContractError> {
        std::fs::read_to_string(path).map_err(|e| ContractError::ConfigParse {
            message: format!("cannot read {}: {e}", path.display()),
            source: Some(Box::new(e)),
        })
    }
}
