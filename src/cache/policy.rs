//! Cache-policy resolution.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Season;
use crate::params::DataViewParams;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// What kind of data a column is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicyKind {
    /// Season totals that keep changing all season.
    SeasonAggregate,
    /// Per-play or per-game rows.
    PlayLevel,
    /// Data refreshed many times a day (injuries, depth charts).
    FrequentUpdate,
    /// Odds and props.
    Betting,
    /// Reference data that rarely changes.
    Static,
    /// Data that never changes once written.
    Immutable,
    /// Values keyed by an exact season year.
    ExactYear,
}

impl CachePolicyKind {
    pub const ALL: [CachePolicyKind; 7] = [
        CachePolicyKind::SeasonAggregate,
        CachePolicyKind::PlayLevel,
        CachePolicyKind::FrequentUpdate,
        CachePolicyKind::Betting,
        CachePolicyKind::Static,
        CachePolicyKind::Immutable,
        CachePolicyKind::ExactYear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CachePolicyKind::SeasonAggregate => "season_aggregate",
            CachePolicyKind::PlayLevel => "play_level",
            CachePolicyKind::FrequentUpdate => "frequent_update",
            CachePolicyKind::Betting => "betting",
            CachePolicyKind::Static => "static",
            CachePolicyKind::Immutable => "immutable",
            CachePolicyKind::ExactYear => "exact_year",
        }
    }

    /// Kinds whose current-season values change at year granularity.
    pub fn is_season_level(&self) -> bool {
        matches!(
            self,
            CachePolicyKind::SeasonAggregate | CachePolicyKind::ExactYear
        )
    }
}

impl fmt::Display for CachePolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CachePolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.replace('-', "_");
        CachePolicyKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("unknown cache policy kind '{}'", s))
    }
}

/// TTLs in seconds per tier. Loaded from `[cache]` in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheTtls {
    pub current: u64,
    pub frequent: u64,
    pub betting: u64,
    pub season: u64,
    pub historical: u64,
    pub static_ttl: u64,
    pub immutable: u64,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            current: HOUR,
            frequent: 15 * MINUTE,
            betting: 5 * MINUTE,
            season: 6 * HOUR,
            historical: 30 * DAY,
            static_ttl: 7 * DAY,
            immutable: 365 * DAY,
        }
    }
}

impl CacheTtls {
    /// TTL for `tier`, with the "current" tier depending on the kind.
    pub fn ttl(&self, tier: CacheTier, kind: CachePolicyKind) -> u64 {
        match tier {
            CacheTier::Current => match kind {
                CachePolicyKind::FrequentUpdate => self.frequent,
                CachePolicyKind::Betting => self.betting,
                _ => self.current,
            },
            CacheTier::Season => self.season,
            CacheTier::Historical => self.historical,
            CacheTier::Static => self.static_ttl,
            CacheTier::Immutable => self.immutable,
        }
    }
}

/// Freshness class a request falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTier {
    Current,
    Season,
    Historical,
    Static,
    Immutable,
}

/// Resolved cache policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheInfo {
    /// Seconds.
    pub cache_ttl: u64,
    pub cache_expire_at: DateTime<Utc>,
}

impl CacheInfo {
    pub fn new(cache_ttl: u64, now: DateTime<Utc>) -> Self {
        let ttl = i64::try_from(cache_ttl).unwrap_or(i64::MAX);
        let cache_expire_at = now
            .checked_add_signed(Duration::seconds(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            cache_ttl,
            cache_expire_at,
        }
    }

    /// Shortest-lived of two policies. A report is as fresh as its
    /// freshest column.
    pub fn merge_min(self, other: CacheInfo) -> CacheInfo {
        if other.cache_ttl < self.cache_ttl {
            other
        } else {
            self
        }
    }
}

/// Year/week values the resolver looks at, normalized to arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodParams {
    pub years: Vec<i32>,
    pub weeks: Vec<i32>,
}

impl PeriodParams {
    /// Default extraction: `year` and `week`, nulls dropped.
    pub fn from_params(params: &DataViewParams) -> Self {
        Self {
            years: params.years(),
            weeks: params.weeks(),
        }
    }
}

/// Pick the freshness tier for a request.
pub fn classify(period: &PeriodParams, kind: CachePolicyKind, season: &Season) -> CacheTier {
    match kind {
        CachePolicyKind::Static => return CacheTier::Static,
        CachePolicyKind::Immutable => return CacheTier::Immutable,
        _ => {}
    }

    if period.years.is_empty() {
        return CacheTier::Current;
    }

    if !period.years.contains(&season.year) {
        return CacheTier::Historical;
    }

    if kind.is_season_level() {
        return CacheTier::Season;
    }

    if !period.weeks.is_empty() && period.weeks.iter().all(|&w| w < season.week) {
        return CacheTier::Historical;
    }

    CacheTier::Current
}

/// Resolve the cache policy for `params` using the default year/week extraction.
pub fn resolve_cache_policy(
    params: &DataViewParams,
    kind: CachePolicyKind,
    season: &Season,
    ttls: &CacheTtls,
    now: DateTime<Utc>,
) -> CacheInfo {
    resolve_cache_policy_with(|| PeriodParams::from_params(params), kind, season, ttls, now)
}

/// Resolve the cache policy with a caller-supplied parameter extraction.
pub fn resolve_cache_policy_with<F>(
    extract: F,
    kind: CachePolicyKind,
    season: &Season,
    ttls: &CacheTtls,
    now: DateTime<Utc>,
) -> CacheInfo
where
    F: FnOnce() -> PeriodParams,
{
    let period = extract();
    let tier = classify(&period, kind, season);
    let ttl = ttls.ttl(tier, kind);
    tracing::trace!(?tier, %kind, ttl, "resolved cache policy");
    CacheInfo::new(ttl, now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn season() -> Season {
        Season {
            year: 2024,
            week: 5,
            nfl_seas_week: 5,
            nfl_seas_type: "REG".into(),
        }
    }

    fn period(years: &[i32], weeks: &[i32]) -> PeriodParams {
        PeriodParams {
            years: years.to_vec(),
            weeks: weeks.to_vec(),
        }
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!(
            "season-aggregate".parse::<CachePolicyKind>(),
            Ok(CachePolicyKind::SeasonAggregate)
        );
        assert_eq!("betting".parse::<CachePolicyKind>(), Ok(CachePolicyKind::Betting));
        assert!("forever".parse::<CachePolicyKind>().is_err());
    }

    #[test]
    fn test_classify_tiers() {
        let s = season();
        let play = CachePolicyKind::PlayLevel;
        assert_eq!(classify(&period(&[], &[]), play, &s), CacheTier::Current);
        assert_eq!(classify(&period(&[2022], &[]), play, &s), CacheTier::Historical);
        assert_eq!(
            classify(&period(&[2024], &[]), CachePolicyKind::SeasonAggregate, &s),
            CacheTier::Season
        );
        assert_eq!(classify(&period(&[2024], &[4]), play, &s), CacheTier::Historical);
        assert_eq!(classify(&period(&[2024], &[4, 5]), play, &s), CacheTier::Current);
        assert_eq!(classify(&period(&[2024], &[]), play, &s), CacheTier::Current);
    }

    #[test]
    fn test_merge_min() {
        let now = Utc::now();
        let a = CacheInfo::new(HOUR, now);
        let b = CacheInfo::new(5 * MINUTE, now);
        assert_eq!(a.clone().merge_min(b.clone()), b);
        assert_eq!(b.clone().merge_min(a), b);
    }

    #[test]
    fn test_expire_at() {
        let now = DateTime::parse_from_rfc3339("2024-10-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let info = CacheInfo::new(HOUR, now);
        assert_eq!(info.cache_expire_at.to_rfc3339(), "2024-10-01T13:00:00+00:00");
    }
}
