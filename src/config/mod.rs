//! Configuration module for gridiron.
//!
//! Handles the config file, environment variable expansion, and the
//! current-season constants used as request defaults.

mod season;
mod settings;

pub use season::{regular_season_start, Season, REGULAR_SEASON_WEEKS};
pub use settings::{expand_env_vars, OutputSettings, SeasonSettings, Settings, SettingsError};
