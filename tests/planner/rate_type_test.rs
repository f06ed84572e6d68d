//! Tests for the per-player route count CTE.

use gridiron::cache::table_hash;
use gridiron::params::{DataViewParams, Split, SplitSet};
use gridiron::planner::{
    add_rate_type_per_player_route, rate_type_table_key, PlayByPlayFilters, RouteCountSpec,
};
use gridiron::sql::{Dialect, Query};
use serde_json::json;

fn params(value: serde_json::Value) -> DataViewParams {
    serde_json::from_value(value).unwrap()
}

#[test]
fn test_key_lists_every_offset_year() {
    let key = rate_type_table_key(
        &params(json!({"year": [2023], "year_offset": [0, 2]})),
        &[Split::Year].into(),
        None,
    )
    .unwrap();
    assert!(key.contains("_years_2023,2024,2025_"));
}

#[test]
fn test_key_is_stable_and_distinguishes_filters() {
    let splits: SplitSet = [Split::Year, Split::Week].into();
    let base = params(json!({"year": 2024, "week": [1, 2]}));
    let filtered = params(json!({"year": 2024, "week": [1, 2], "dwn": [3, 4]}));

    let a = rate_type_table_key(&base, &splits, None).unwrap();
    let b = rate_type_table_key(&base.clone(), &splits, None).unwrap();
    let c = rate_type_table_key(&filtered, &splits, None).unwrap();

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(c.ends_with("_filters_{\"dwn\":[3,4]}"));
    assert_ne!(table_hash(&a), table_hash(&c));
}

#[test]
fn test_cte_covers_offset_years_and_filters() {
    let spec = RouteCountSpec::new("routes_2023")
        .params(params(json!({"year": [2023], "year_offset": [0, 2], "qtr": [1, 2]})))
        .splits([Split::Year].into());

    let mut query = Query::new();
    let name =
        add_rate_type_per_player_route(&mut query, &spec, &PlayByPlayFilters::new()).unwrap();
    assert_eq!(name, "routes_2023");

    let sql = query.to_sql(Dialect::Postgres);
    assert!(sql.contains("\"nfl_plays\".\"year\" IN (2023, 2024, 2025)"));
    assert!(sql.contains("\"nfl_plays\".\"qtr\" IN (1, 2)"));
    assert!(sql.contains("INNER JOIN \"nfl_snaps\" ON \"nfl_snaps\".\"esbid\" = \"nfl_plays\".\"esbid\" AND \"nfl_snaps\".\"playid\" = \"nfl_plays\".\"playid\""));
    assert!(sql.contains("\"nfl_plays\".\"play_type\" = 'PASS'"));
}

#[test]
fn test_registration_is_idempotent() {
    let spec = RouteCountSpec::new("routes").default_year(2024);
    let filters = PlayByPlayFilters::new();

    let mut query = Query::new();
    add_rate_type_per_player_route(&mut query, &spec, &filters).unwrap();
    add_rate_type_per_player_route(&mut query, &spec, &filters).unwrap();
    assert_eq!(query.with.len(), 1);
}
