//! Tests for cache-policy resolution.

use chrono::{DateTime, Duration, Utc};
use gridiron::cache::{
    resolve_cache_policy, resolve_cache_policy_with, CachePolicyKind, CacheTtls, PeriodParams,
};
use gridiron::config::Season;
use gridiron::params::DataViewParams;
use serde_json::json;

fn season() -> Season {
    Season {
        year: 2024,
        week: 5,
        nfl_seas_week: 5,
        nfl_seas_type: "REG".into(),
    }
}

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-10-08T16:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn params(value: serde_json::Value) -> DataViewParams {
    serde_json::from_value(value).unwrap()
}

fn ttl(value: serde_json::Value, kind: CachePolicyKind) -> u64 {
    resolve_cache_policy(&params(value), kind, &season(), &CacheTtls::default(), now()).cache_ttl
}

#[test]
fn test_no_year_is_current_for_every_dynamic_kind() {
    let ttls = CacheTtls::default();
    for kind in CachePolicyKind::ALL {
        let expected = match kind {
            CachePolicyKind::Static => ttls.static_ttl,
            CachePolicyKind::Immutable => ttls.immutable,
            CachePolicyKind::FrequentUpdate => ttls.frequent,
            CachePolicyKind::Betting => ttls.betting,
            _ => ttls.current,
        };
        assert_eq!(ttl(json!({}), kind), expected, "{}", kind);
    }
}

#[test]
fn test_played_weeks_are_historical() {
    let ttls = CacheTtls::default();
    assert_eq!(
        ttl(json!({"year": 2024, "week": [1, 2, 3]}), CachePolicyKind::PlayLevel),
        ttls.historical
    );
    assert_eq!(
        ttl(json!({"year": 2024, "week": [5]}), CachePolicyKind::PlayLevel),
        ttls.current
    );
}

#[test]
fn test_past_season_is_historical() {
    assert_eq!(
        ttl(json!({"year": [2021, 2022]}), CachePolicyKind::SeasonAggregate),
        CacheTtls::default().historical
    );
}

#[test]
fn test_current_season_aggregate() {
    assert_eq!(
        ttl(json!({"year": [2023, 2024]}), CachePolicyKind::SeasonAggregate),
        CacheTtls::default().season
    );
}

#[test]
fn test_static_ignores_years() {
    assert_eq!(
        ttl(json!({"year": 2024, "week": 5}), CachePolicyKind::Static),
        CacheTtls::default().static_ttl
    );
}

#[test]
fn test_custom_extraction() {
    let info = resolve_cache_policy_with(
        || PeriodParams {
            years: vec![2019],
            weeks: vec![],
        },
        CachePolicyKind::Betting,
        &season(),
        &CacheTtls::default(),
        now(),
    );
    assert_eq!(info.cache_ttl, CacheTtls::default().historical);
}

#[test]
fn test_expire_at_follows_ttl() {
    let ttls = CacheTtls {
        current: 120,
        ..CacheTtls::default()
    };
    let info = resolve_cache_policy(
        &DataViewParams::default(),
        CachePolicyKind::PlayLevel,
        &season(),
        &ttls,
        now(),
    );
    assert_eq!(info.cache_ttl, 120);
    assert_eq!(info.cache_expire_at, now() + Duration::seconds(120));
}
