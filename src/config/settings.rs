//! TOML-based configuration for gridiron.
//!
//! Supports a config file (gridiron.toml) with environment variable expansion
//! for string values.
//!
//! Example configuration:
//! ```toml
//! [season]
//! year = 2024      # pin the current season instead of deriving it
//! week = 6
//! nfl_seas_type = "${GRIDIRON_SEAS_TYPE}"
//!
//! [cache]
//! current = 3600   # seconds
//! historical = 2592000
//!
//! [output]
//! dialect = "postgres"
//! validate = true  # parse generated SQL before returning it
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use super::season::Season;
use crate::cache::CacheTtls;
use crate::sql::Dialect;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub season: SeasonSettings,
    pub cache: CacheTtls,
    pub output: OutputSettings,
}

/// Overrides for the current-season constants. Unset fields are derived
/// from the calendar.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SeasonSettings {
    pub year: Option<i32>,
    pub week: Option<i32>,
    pub nfl_seas_week: Option<i32>,
    pub nfl_seas_type: Option<String>,
}

impl SeasonSettings {
    /// Season constants for `today`, with configured values taking precedence.
    pub fn resolve(&self, today: NaiveDate) -> Season {
        let derived = Season::for_date(today);
        Season {
            year: self.year.unwrap_or(derived.year),
            week: self.week.unwrap_or(derived.week),
            nfl_seas_week: self
                .nfl_seas_week
                .or(self.week)
                .unwrap_or(derived.nfl_seas_week),
            nfl_seas_type: self
                .nfl_seas_type
                .clone()
                .unwrap_or(derived.nfl_seas_type),
        }
    }
}

/// SQL output options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputSettings {
    pub dialect: Dialect,
    /// Parse generated SQL with the dialect's grammar before returning it.
    pub validate: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dialect: Dialect::Postgres,
            validate: false,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML text and expand environment variables.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let mut settings: Settings = toml::from_str(content)?;
        settings.expand()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `GRIDIRON_CONFIG`
    /// 2. `./gridiron.toml`
    /// 3. `~/.config/gridiron/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("GRIDIRON_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("gridiron.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("gridiron").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Current-season constants for `today`.
    pub fn season(&self, today: NaiveDate) -> Season {
        self.season.resolve(today)
    }

    fn expand(&mut self) -> Result<(), SettingsError> {
        if let Some(seas_type) = &self.season.nfl_seas_type {
            self.season.nfl_seas_type = Some(expand_env_vars(seas_type)?);
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if let Some(seas_type) = &self.season.nfl_seas_type {
            if !matches!(seas_type.as_str(), "PRE" | "REG" | "POST") {
                return Err(SettingsError::InvalidConfig(format!(
                    "season.nfl_seas_type must be PRE, REG or POST: {}",
                    seas_type
                )));
            }
        }
        if let Some(week) = self.season.week {
            if !(0..=22).contains(&week) {
                return Err(SettingsError::InvalidConfig(format!(
                    "season.week out of range: {}",
                    week
                )));
            }
        }
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.peek() == Some(&'{') {
            chars.next();
            chars.by_ref().take_while(|&ch| ch != '}').collect()
        } else {
            let mut name = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_alphanumeric() || ch == '_' {
                    name.push(ch);
                    chars.next();
                } else {
                    break;
                }
            }
            name
        };

        if var_name.is_empty() {
            // lone $
            result.push('$');
            continue;
        }

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_expand_env_vars_braces() {
        env::set_var("GRIDIRON_TEST_VAR", "hello");
        assert_eq!(expand_env_vars("${GRIDIRON_TEST_VAR}").unwrap(), "hello");
        assert_eq!(
            expand_env_vars("prefix_${GRIDIRON_TEST_VAR}_suffix").unwrap(),
            "prefix_hello_suffix"
        );
        env::remove_var("GRIDIRON_TEST_VAR");
    }

    #[test]
    fn test_expand_env_vars_no_braces() {
        env::set_var("GRIDIRON_TEST_VAR2", "world");
        assert_eq!(expand_env_vars("$GRIDIRON_TEST_VAR2").unwrap(), "world");
        assert_eq!(expand_env_vars("$GRIDIRON_TEST_VAR2!").unwrap(), "world!");
        assert_eq!(expand_env_vars("cost $ 5").unwrap(), "cost $ 5");
        env::remove_var("GRIDIRON_TEST_VAR2");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("${NONEXISTENT_VAR_12345}");
        assert!(matches!(result, Err(SettingsError::MissingEnvVar(_))));
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[season]
year = 2024
week = 6

[cache]
current = 1800
historical = 86400

[output]
dialect = "duckdb"
validate = true
"#;

        let settings = Settings::from_toml(toml).unwrap();

        assert_eq!(settings.season.year, Some(2024));
        assert_eq!(settings.cache.current, 1800);
        assert_eq!(settings.cache.historical, 86400);
        // untouched tiers keep their defaults
        assert_eq!(settings.cache.betting, CacheTtls::default().betting);
        assert_eq!(settings.output.dialect, Dialect::DuckDb);
        assert!(settings.output.validate);

        let season = settings.season(date(2024, 7, 1));
        assert_eq!(season.year, 2024);
        assert_eq!(season.week, 6);
        assert_eq!(season.nfl_seas_week, 6);
        // not pinned, so still derived from the date
        assert_eq!(season.nfl_seas_type, "PRE");
    }

    #[test]
    fn test_invalid_values_rejected() {
        for toml in [
            "[season]\nnfl_seas_type = \"OFF\"\n",
            "[season]\nweek = 40\n",
        ] {
            assert!(matches!(
                Settings::from_toml(toml),
                Err(SettingsError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_seas_type_from_env() {
        env::set_var("GRIDIRON_TEST_SEAS_TYPE", "POST");
        let settings =
            Settings::from_toml("[season]\nnfl_seas_type = \"${GRIDIRON_TEST_SEAS_TYPE}\"\n")
                .unwrap();
        assert_eq!(settings.season.nfl_seas_type.as_deref(), Some("POST"));
        env::remove_var("GRIDIRON_TEST_SEAS_TYPE");
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.output.dialect, Dialect::Postgres);
        assert_eq!(settings.cache, CacheTtls::default());
        let season = settings.season(date(2024, 10, 2));
        assert_eq!(season.year, 2024);
        assert_eq!(season.week, 5);
    }
}
