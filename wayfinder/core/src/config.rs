//! TOML Configuration File Support
//!
//! Optional configuration for the presentation side of navigation, read from
//! `~/.config/wayfinder/navigation.toml`.
//!
//! # Configuration Priority
//!
//! Values are resolved with the following priority (highest first):
//! 1. Explicit overrides from the embedding application ([`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [transitions]
//! enabled = true
//!
//! [presentation]
//! cache_surfaces = true
//! ```
//!
//! # Environment Variables
//!
//! - `WAYFINDER_TRANSITIONS`: `0`/`false`/`off`/`no` swaps surfaces instantly
//! - `WAYFINDER_CACHE_SURFACES`: same values, disables the surface cache

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable toggling transition animations
pub const ENV_TRANSITIONS: &str = "WAYFINDER_TRANSITIONS";

/// Environment variable toggling the surface cache
pub const ENV_CACHE_SURFACES: &str = "WAYFINDER_CACHE_SURFACES";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value set by the embedding application
    Override,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Override => write!(f, "override"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[transitions]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionsToml {
    /// Run transition animations (false: swap surfaces instantly)
    pub enabled: Option<bool>,
}

/// `[presentation]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationToml {
    /// Keep the detached surface while the host is not visible
    pub cache_surfaces: Option<bool>,
}

/// Root of the TOML configuration file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationToml {
    /// Transition settings
    pub transitions: TransitionsToml,
    /// Presentation settings
    pub presentation: PresentationToml,
}

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Resolved navigation configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NavigationConfig {
    /// Run the configured transition animations
    pub transitions_enabled: bool,

    /// Cache the detached surface across `ui_not_visible`
    pub cache_surfaces: bool,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    pub(crate) source: ConfigSource,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            transitions_enabled: true,
            cache_surfaces: true,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl NavigationConfig {
    /// Create a configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest-priority source that contributed a value
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/wayfinder/navigation.toml` (typically
/// `~/.config/wayfinder/navigation.toml`).
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("wayfinder").join("navigation.toml"))
}

/// Load configuration from the default file, then the environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be read or parsed.
/// A missing config file is not an error.
pub fn load_config() -> Result<NavigationConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path, then the environment
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<NavigationConfig, ConfigError> {
    let mut config = load_file_config(path)?;
    apply_env_config_with(&mut config, |name| std::env::var(name).ok());
    Ok(config)
}

/// Defaults overlaid with the TOML file at `path`, ignoring the environment
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_file_config(path: Option<PathBuf>) -> Result<NavigationConfig, ConfigError> {
    let mut config = NavigationConfig::default();

    if let Some(config_path) = path {
        if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: NavigationToml = toml::from_str(&content)?;
            apply_toml_config(&mut config, &toml_config);
            tracing::info!(path = %config_path.display(), "Loaded navigation configuration");
            config.config_file_path = Some(config_path);
            config.source = ConfigSource::File;
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    Ok(config)
}

fn apply_toml_config(config: &mut NavigationConfig, toml: &NavigationToml) {
    if let Some(enabled) = toml.transitions.enabled {
        config.transitions_enabled = enabled;
    }
    if let Some(cache) = toml.presentation.cache_surfaces {
        config.cache_surfaces = cache;
    }
}

/// Apply environment overrides, reading variables through `lookup`
pub fn apply_env_config_with(config: &mut NavigationConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(enabled) = env_flag(&lookup, ENV_TRANSITIONS) {
        config.transitions_enabled = enabled;
        config.source = ConfigSource::Env;
    }
    if let Some(cache) = env_flag(&lookup, ENV_CACHE_SURFACES) {
        config.cache_surfaces = cache;
        config.source = ConfigSource::Env;
    }
}

fn env_flag(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<bool> {
    let raw = lookup(name)?;
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        other => {
            tracing::warn!(variable = name, value = other, "Ignoring unrecognized flag value");
            None
        }
    }
}

// =============================================================================
// Explicit Overrides
// =============================================================================

/// Values set by the embedding application, applied last
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Transition animation override
    pub transitions_enabled: Option<bool>,

    /// Surface cache override
    pub cache_surfaces: Option<bool>,
}

impl ConfigOverrides {
    /// Create an empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set transitions override
    #[must_use]
    pub fn with_transitions_enabled(mut self, enabled: bool) -> Self {
        self.transitions_enabled = Some(enabled);
        self
    }

    /// Set surface cache override
    #[must_use]
    pub fn with_cache_surfaces(mut self, enabled: bool) -> Self {
        self.cache_surfaces = Some(enabled);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut NavigationConfig) {
        if let Some(enabled) = self.transitions_enabled {
            config.transitions_enabled = enabled;
            config.source = ConfigSource::Override;
        }
        if let Some(cache) = self.cache_surfaces {
            config.cache_surfaces = cache;
            config.source = ConfigSource::Override;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn toml_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = NavigationConfig::default();

        assert!(config.transitions_enabled);
        assert!(config.cache_surfaces);
        assert_eq!(config.config_file_path, None);
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_default_config_path() {
        if let Some(path) = default_config_path() {
            assert!(path.to_string_lossy().contains("wayfinder"));
            assert!(path.to_string_lossy().ends_with("navigation.toml"));
        }
    }

    #[test]
    fn test_parse_valid_toml() {
        let file = toml_file(
            r#"
[transitions]
enabled = false

[presentation]
cache_surfaces = false
"#,
        );

        let config = load_file_config(Some(file.path().to_path_buf())).unwrap();

        assert!(!config.transitions_enabled);
        assert!(!config.cache_surfaces);
        assert_eq!(config.source(), ConfigSource::File);
        assert_eq!(config.config_file_path.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_parse_partial_toml() {
        let file = toml_file("[presentation]\ncache_surfaces = false\n");

        let config = load_file_config(Some(file.path().to_path_buf())).unwrap();

        assert!(config.transitions_enabled);
        assert!(!config.cache_surfaces);
    }

    #[test]
    fn test_missing_file_graceful() {
        let path = PathBuf::from("/nonexistent/path/navigation.toml");

        let config = load_file_config(Some(path)).unwrap();

        assert_eq!(config, NavigationConfig::default());
    }

    #[test]
    fn test_malformed_toml_error() {
        let file = toml_file("[transitions\nenabled = \"maybe\"\n");

        let result = load_file_config(Some(file.path().to_path_buf()));

        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = toml_file("[transitions]\nenabled = true\n");
        let mut config = load_file_config(Some(file.path().to_path_buf())).unwrap();

        apply_env_config_with(&mut config, env(&[(ENV_TRANSITIONS, "off")]));

        assert!(!config.transitions_enabled);
        assert!(config.cache_surfaces);
        assert_eq!(config.source(), ConfigSource::Env);
    }

    #[test]
    fn test_unrecognized_env_value_is_ignored() {
        let mut config = NavigationConfig::default();

        apply_env_config_with(&mut config, env(&[(ENV_CACHE_SURFACES, "sometimes")]));

        assert!(config.cache_surfaces);
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_overrides_win() {
        let mut config = NavigationConfig::default();
        apply_env_config_with(&mut config, env(&[(ENV_CACHE_SURFACES, "0")]));

        ConfigOverrides::new()
            .with_cache_surfaces(true)
            .with_transitions_enabled(false)
            .apply(&mut config);

        assert!(config.cache_surfaces);
        assert!(!config.transitions_enabled);
        assert_eq!(config.source(), ConfigSource::Override);
    }

    #[test]
    fn test_empty_overrides_no_change() {
        let mut config = NavigationConfig::default();

        ConfigOverrides::new().apply(&mut config);

        assert_eq!(config, NavigationConfig::default());
    }

    #[test]
    fn test_config_source_display() {
        assert_eq!(ConfigSource::Override.to_string(), "override");
        assert_eq!(ConfigSource::Env.to_string(), "environment");
        assert_eq!(ConfigSource::File.to_string(), "config file");
        assert_eq!(ConfigSource::Default.to_string(), "default");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::ReadError {
            path: PathBuf::from("/tmp/navigation.toml"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/tmp/navigation.toml"));
    }
}
