//! Filter parameter sets for data-view requests.
//!
//! Request JSON carries filters as either bare scalars or arrays
//! (`"year": 2023` and `"year": [2023, null]` are both accepted). Everything
//! here normalizes to array form before any SQL is built, and nothing is
//! mutated after deserialization; sub-builders get filtered copies instead.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest accepted `|year_offset|`.
pub const MAX_YEAR_OFFSET: i32 = 50;

/// Parameter values that cannot be turned into SQL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("year_offset {0} is outside -{max}..={max}", max = MAX_YEAR_OFFSET)]
    YearOffsetOutOfRange(i32),

    #[error("year {year} shifted by {offset} is not a valid year")]
    YearOverflow { year: i32, offset: i32 },
}

// =============================================================================
// Scalar-or-array values
// =============================================================================

/// A parameter value that may arrive as a scalar or an array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<Option<T>>),
}

impl<T: Clone> OneOrMany<T> {
    /// Array form with nulls dropped.
    pub fn to_vec(&self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v.clone()],
            OneOrMany::Many(vs) => vs.iter().flatten().cloned().collect(),
        }
    }
}

impl<T> From<T> for OneOrMany<T> {
    fn from(value: T) -> Self {
        OneOrMany::One(value)
    }
}

impl<T> OneOrMany<T> {
    pub fn many(values: impl IntoIterator<Item = T>) -> Self {
        OneOrMany::Many(values.into_iter().map(Some).collect())
    }
}

fn normalize<T: Clone>(value: &Option<OneOrMany<T>>) -> Vec<T> {
    value.as_ref().map(OneOrMany::to_vec).unwrap_or_default()
}

// =============================================================================
// Filter Parameter Set
// =============================================================================

/// Filters attached to one data-view column.
///
/// Keys the compiler understands are typed fields; anything else lands in
/// `extra` and is handed to the filter applier untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataViewParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<OneOrMany<i32>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week: Option<OneOrMany<i32>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_offset: Option<OneOrMany<i32>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seas_type: Option<OneOrMany<String>>,

    /// `[min, max]` of a player's career season number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub career_year: Option<OneOrMany<i32>>,

    /// `[min, max]` of a player's career game number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub career_game: Option<OneOrMany<i32>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matchup_opponent_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_type_route_group: Option<RouteGroup>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl DataViewParams {
    pub fn years(&self) -> Vec<i32> {
        normalize(&self.year)
    }

    /// The year when it was supplied as a bare scalar rather than a list.
    pub fn scalar_year(&self) -> Option<i32> {
        match &self.year {
            Some(OneOrMany::One(year)) => Some(*year),
            _ => None,
        }
    }

    pub fn weeks(&self) -> Vec<i32> {
        normalize(&self.week)
    }

    pub fn year_offsets(&self) -> Vec<i32> {
        normalize(&self.year_offset)
    }

    pub fn seas_types(&self) -> Vec<String> {
        normalize(&self.seas_type)
    }

    pub fn career_years(&self) -> Vec<i32> {
        normalize(&self.career_year)
    }

    pub fn career_games(&self) -> Vec<i32> {
        normalize(&self.career_game)
    }

    pub fn year_offset_range(&self) -> Result<YearOffsetRange, ParamError> {
        YearOffsetRange::from_params(self)
    }

    /// Copy without the player-level career filters, which have no meaning
    /// for team aggregates.
    pub fn without_career_filters(&self) -> Self {
        Self {
            career_year: None,
            career_game: None,
            ..self.clone()
        }
    }
}

// =============================================================================
// Splits
// =============================================================================

/// A dimension the report keeps as its own output rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Year,
    Week,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Year => "year",
            Split::Week => "week",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Split {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "year" => Ok(Split::Year),
            "week" => Ok(Split::Week),
            other => Err(format!("unknown split '{}'", other)),
        }
    }
}

/// Membership-only set of requested splits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SplitSet(BTreeSet<Split>);

impl SplitSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, split: Split) -> bool {
        self.0.contains(&split)
    }

    pub fn has_year(&self) -> bool {
        self.contains(Split::Year)
    }

    pub fn has_week(&self) -> bool {
        self.contains(Split::Week)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn insert(&mut self, split: Split) -> bool {
        self.0.insert(split)
    }

    pub fn iter(&self) -> impl Iterator<Item = Split> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Split> for SplitSet {
    fn from_iter<I: IntoIterator<Item = Split>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Split; N]> for SplitSet {
    fn from(splits: [Split; N]) -> Self {
        splits.into_iter().collect()
    }
}

// =============================================================================
// Year offsets
// =============================================================================

/// Inclusive `[min, max]` shift applied to the reference year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct YearOffsetRange {
    pub min: i32,
    pub max: i32,
}

impl YearOffsetRange {
    pub fn new(a: i32, b: i32) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Scalar `k` becomes `[k, k]`; an absent offset becomes `[0, 0]`.
    pub fn from_params(params: &DataViewParams) -> Result<Self, ParamError> {
        let offsets = params.year_offsets();
        if let Some(&bad) = offsets.iter().find(|o| o.unsigned_abs() > MAX_YEAR_OFFSET.unsigned_abs()) {
            return Err(ParamError::YearOffsetOutOfRange(bad));
        }
        Ok(match (offsets.iter().min(), offsets.iter().max()) {
            (Some(&min), Some(&max)) => Self { min, max },
            _ => Self::default(),
        })
    }

    /// `year + offset`, failing instead of wrapping.
    pub fn shift(year: i32, offset: i32) -> Result<i32, ParamError> {
        year.checked_add(offset)
            .ok_or(ParamError::YearOverflow { year, offset })
    }

    pub fn is_zero(&self) -> bool {
        self.min == 0 && self.max == 0
    }

    /// Both bounds equal: an exact-year comparison rather than a range.
    pub fn is_single(&self) -> bool {
        self.min == self.max
    }

    pub fn offsets(&self) -> impl Iterator<Item = i32> {
        self.min..=self.max
    }
}

// =============================================================================
// Enum-like parameters
// =============================================================================

/// Which opponent a team-level stat is looked up for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchupOpponentType {
    CurrentWeekOpponentTotal,
    NextWeekOpponentTotal,
}

impl MatchupOpponentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchupOpponentType::CurrentWeekOpponentTotal => "current_week_opponent_total",
            MatchupOpponentType::NextWeekOpponentTotal => "next_week_opponent_total",
        }
    }

    /// Name of the per-player opponent lookup table for this matchup.
    pub fn lookup_table(&self) -> &'static str {
        match self {
            MatchupOpponentType::CurrentWeekOpponentTotal => "current_week_opponents",
            MatchupOpponentType::NextWeekOpponentTotal => "next_week_opponents",
        }
    }
}

impl FromStr for MatchupOpponentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "current_week_opponent_total" => Ok(MatchupOpponentType::CurrentWeekOpponentTotal),
            "next_week_opponent_total" => Ok(MatchupOpponentType::NextWeekOpponentTotal),
            other => Err(format!("unknown matchup_opponent_type '{}'", other)),
        }
    }
}

/// Sub-unit routes are counted per, for per-route rate stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteGroup {
    Half,
    Quarter,
    Drive,
    Series,
}

impl RouteGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteGroup::Half => "half",
            RouteGroup::Quarter => "quarter",
            RouteGroup::Drive => "drive",
            RouteGroup::Series => "series",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> DataViewParams {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_scalar_and_array_normalize() {
        let scalar = parse(json!({"year": 2023, "week": 4}));
        assert_eq!(scalar.years(), vec![2023]);
        assert_eq!(scalar.weeks(), vec![4]);

        assert_eq!(scalar.scalar_year(), Some(2023));

        let array = parse(json!({"year": [2022, null, 2023], "week": []}));
        assert_eq!(array.years(), vec![2022, 2023]);
        assert_eq!(array.scalar_year(), None);
        assert!(array.weeks().is_empty());

        let null = parse(json!({"year": null}));
        assert!(null.years().is_empty());
    }

    #[test]
    fn test_unknown_keys_pass_through() {
        let params = parse(json!({"year": 2023, "qtr": [1, 2], "dwn": 3}));
        assert_eq!(params.extra.len(), 2);
        assert_eq!(params.extra["qtr"], json!([1, 2]));
    }

    #[test]
    fn test_without_career_filters() {
        let params = parse(json!({"year": 2023, "career_year": [1, 3], "career_game": [1, 17]}));
        let team = params.without_career_filters();
        assert!(team.career_year.is_none());
        assert!(team.career_game.is_none());
        assert_eq!(team.years(), vec![2023]);
        // original untouched
        assert_eq!(params.career_years(), vec![1, 3]);
    }

    fn range(value: serde_json::Value) -> YearOffsetRange {
        parse(value).year_offset_range().unwrap()
    }

    #[test]
    fn test_year_offset_range() {
        assert_eq!(range(json!({})), YearOffsetRange { min: 0, max: 0 });
        assert_eq!(range(json!({"year_offset": 2})), YearOffsetRange { min: 2, max: 2 });
        assert_eq!(
            range(json!({"year_offset": [3, 1]})),
            YearOffsetRange { min: 1, max: 3 }
        );
        assert!(range(json!({"year_offset": [0]})).is_zero());
        assert!(range(json!({"year_offset": [1, 1]})).is_single());
        assert!(!range(json!({"year_offset": [0, 2]})).is_zero());
    }

    #[test]
    fn test_year_offset_out_of_range() {
        assert_eq!(
            parse(json!({"year_offset": 2147483647})).year_offset_range(),
            Err(ParamError::YearOffsetOutOfRange(i32::MAX))
        );
        assert_eq!(
            parse(json!({"year_offset": [-2000000000, 2000000000]})).year_offset_range(),
            Err(ParamError::YearOffsetOutOfRange(-2000000000))
        );
        assert_eq!(
            parse(json!({"year_offset": -2147483648})).year_offset_range(),
            Err(ParamError::YearOffsetOutOfRange(i32::MIN))
        );
        assert!(parse(json!({"year_offset": [-50, 50]})).year_offset_range().is_ok());
    }

    #[test]
    fn test_shift_overflow() {
        assert_eq!(YearOffsetRange::shift(2023, 2), Ok(2025));
        assert_eq!(
            YearOffsetRange::shift(i32::MAX, 1),
            Err(ParamError::YearOverflow { year: i32::MAX, offset: 1 })
        );
    }

    #[test]
    fn test_splits() {
        let splits: SplitSet = serde_json::from_value(json!(["week", "year", "week"])).unwrap();
        assert!(splits.has_year());
        assert!(splits.has_week());
        assert_eq!(splits.iter().collect::<Vec<_>>(), vec![Split::Year, Split::Week]);
        assert!("quarter".parse::<Split>().is_err());
    }

    #[test]
    fn test_matchup_opponent_type() {
        assert_eq!(
            "next_week_opponent_total".parse::<MatchupOpponentType>(),
            Ok(MatchupOpponentType::NextWeekOpponentTotal)
        );
        assert!("last_week_opponent".parse::<MatchupOpponentType>().is_err());
    }

    #[test]
    fn test_route_group() {
        let params = parse(json!({"rate_type_route_group": "drive"}));
        assert_eq!(params.rate_type_route_group, Some(RouteGroup::Drive));
    }
}
