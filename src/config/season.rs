//! Current-season constants.
//!
//! The compiler reads `year`/`week` defaults and the cache resolver reads the
//! season boundary from here. Values are either pinned in configuration or
//! derived from the calendar: the regular season opens the week after Labor
//! Day (first Monday of September) and runs 18 weeks.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Regular-season length in weeks.
pub const REGULAR_SEASON_WEEKS: i32 = 18;

/// Read-only season constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Season {
    /// Season year (January playoff games belong to the previous year).
    pub year: i32,
    /// Fantasy week: 0 before the season, capped at the final regular week.
    pub week: i32,
    /// Week number within `nfl_seas_type`.
    pub nfl_seas_week: i32,
    /// `PRE`, `REG` or `POST`.
    pub nfl_seas_type: String,
}

impl Season {
    /// Derive the season state for a calendar date.
    pub fn for_date(today: NaiveDate) -> Self {
        // Jan/Feb dates are the tail of the previous season
        let year = if today.month() <= 2 {
            today.year() - 1
        } else {
            today.year()
        };

        let start = regular_season_start(year);
        if today < start {
            return Self {
                year,
                week: 0,
                nfl_seas_week: 0,
                nfl_seas_type: "PRE".into(),
            };
        }

        let week = ((today - start).num_days() / 7) as i32 + 1;
        if week <= REGULAR_SEASON_WEEKS {
            Self {
                year,
                week,
                nfl_seas_week: week,
                nfl_seas_type: "REG".into(),
            }
        } else {
            Self {
                year,
                week: REGULAR_SEASON_WEEKS,
                nfl_seas_week: week - REGULAR_SEASON_WEEKS,
                nfl_seas_type: "POST".into(),
            }
        }
    }

    pub fn is_regular_season(&self) -> bool {
        self.nfl_seas_type == "REG"
    }
}

/// Tuesday after Labor Day; week 1 runs from here through the following Monday.
pub fn regular_season_start(year: i32) -> NaiveDate {
    // Sept 1 always exists
    let sept_first = NaiveDate::from_ymd_opt(year, 9, 1).unwrap_or_default();
    let days_to_monday = (7 + Weekday::Mon.num_days_from_monday() as i64
        - sept_first.weekday().num_days_from_monday() as i64)
        % 7;
    let labor_day = sept_first + Duration::days(days_to_monday);
    labor_day + Duration::days(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_regular_season_start() {
        // Labor Day 2023 was Sept 4, Labor Day 2024 was Sept 2
        assert_eq!(regular_season_start(2023), date(2023, 9, 5));
        assert_eq!(regular_season_start(2024), date(2024, 9, 3));
    }

    #[test]
    fn test_preseason() {
        let season = Season::for_date(date(2024, 7, 15));
        assert_eq!(season.year, 2024);
        assert_eq!(season.week, 0);
        assert_eq!(season.nfl_seas_type, "PRE");
    }

    #[test]
    fn test_regular_season_weeks() {
        let season = Season::for_date(date(2024, 9, 8));
        assert_eq!(season.week, 1);
        assert!(season.is_regular_season());

        let season = Season::for_date(date(2024, 10, 2));
        assert_eq!(season.week, 5);
        assert_eq!(season.nfl_seas_week, 5);
    }

    #[test]
    fn test_january_is_previous_season() {
        let season = Season::for_date(date(2025, 1, 15));
        assert_eq!(season.year, 2024);
        assert_eq!(season.nfl_seas_type, "POST");
        assert_eq!(season.week, REGULAR_SEASON_WEEKS);
        assert_eq!(season.nfl_seas_week, 2);
    }
}
