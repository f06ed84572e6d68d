//! Column catalog for data views.
//!
//! Every column a report can request is described here: where its value
//! comes from and which cache policy its data follows. The compiler turns
//! each definition into selects, joins and CTEs.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::cache::CachePolicyKind;
use crate::planner::TeamUnit;

/// Where a column's value comes from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnSource {
    /// A column of the driving `player` row.
    Player { column: String },

    /// A column of an enrichment table joined by `pid`.
    Table {
        table: String,
        column: String,
        /// Pin the year when year is not a split.
        join_year: bool,
        /// Pin the week when week is not a split.
        join_week: bool,
        /// The table's `week` column is text.
        week_is_text: bool,
        /// Season-level table without a `week` column.
        season_level: bool,
    },

    /// A team stat aggregated from play-by-play.
    TeamStat {
        unit: TeamUnit,
        /// Per-play stage select expressions.
        selects: Vec<String>,
        /// Aggregated from `_numerator` / `_denominator` parts.
        rate: bool,
        /// Only games the player was active in, summed per player.
        active_games: bool,
    },

    /// A play-by-play stat divided by the player's route count.
    PerRoute {
        /// `nfl_plays` column identifying the credited player.
        pid_column: String,
        /// Aggregate expression over `nfl_plays`.
        numerator: String,
    },
}

/// One requestable column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDefinition {
    pub id: String,
    pub description: String,
    pub source: ColumnSource,
    pub cache_kind: CachePolicyKind,
}

impl ColumnDefinition {
    pub fn player(id: &str, column: &str, cache_kind: CachePolicyKind) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            source: ColumnSource::Player {
                column: column.into(),
            },
            cache_kind,
        }
    }

    pub fn table(id: &str, table: &str, column: &str, cache_kind: CachePolicyKind) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            source: ColumnSource::Table {
                table: table.into(),
                column: column.into(),
                join_year: true,
                join_week: false,
                week_is_text: false,
                season_level: false,
            },
            cache_kind,
        }
    }

    pub fn team_stat(id: &str, unit: TeamUnit, selects: &[&str]) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            source: ColumnSource::TeamStat {
                unit,
                selects: selects.iter().map(|s| s.to_string()).collect(),
                rate: false,
                active_games: false,
            },
            cache_kind: CachePolicyKind::PlayLevel,
        }
    }

    pub fn per_route(id: &str, pid_column: &str, numerator: &str) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            source: ColumnSource::PerRoute {
                pid_column: pid_column.into(),
                numerator: numerator.into(),
            },
            cache_kind: CachePolicyKind::PlayLevel,
        }
    }

    pub fn description(mut self, text: &str) -> Self {
        self.description = text.into();
        self
    }

    /// Also pin the week when week is not a split.
    pub fn join_week(mut self) -> Self {
        if let ColumnSource::Table { join_week, .. } = &mut self.source {
            *join_week = true;
        }
        self
    }

    pub fn week_is_text(mut self) -> Self {
        if let ColumnSource::Table { week_is_text, .. } = &mut self.source {
            *week_is_text = true;
        }
        self
    }

    pub fn season_level(mut self) -> Self {
        if let ColumnSource::Table { season_level, .. } = &mut self.source {
            *season_level = true;
        }
        self
    }

    pub fn rate(mut self) -> Self {
        if let ColumnSource::TeamStat { rate, .. } = &mut self.source {
            *rate = true;
        }
        self
    }

    pub fn active_games(mut self) -> Self {
        if let ColumnSource::TeamStat { active_games, .. } = &mut self.source {
            *active_games = true;
        }
        self
    }
}

/// Lookup of column definitions by id.
#[derive(Debug, Clone, Default)]
pub struct ColumnRegistry {
    columns: BTreeMap<String, ColumnDefinition>,
}

impl ColumnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a definition.
    pub fn register(&mut self, definition: ColumnDefinition) -> &mut Self {
        self.columns.insert(definition.id.clone(), definition);
        self
    }

    pub fn get(&self, id: &str) -> Option<&ColumnDefinition> {
        self.columns.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns.values()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// The columns shipped with the crate.
    pub fn builtin() -> Self {
        use CachePolicyKind::*;

        let mut registry = Self::new();
        for definition in [
            ColumnDefinition::player("player_position", "pos", Static)
                .description("Listed position"),
            ColumnDefinition::player("player_nfl_team", "current_nfl_team", FrequentUpdate)
                .description("Current NFL team"),
            ColumnDefinition::player("player_draft_position", "dpos", Immutable)
                .description("Overall draft pick"),
            ColumnDefinition::table("player_season_points", "player_seasonlogs", "points", SeasonAggregate)
                .season_level()
                .description("Fantasy points for the season"),
            ColumnDefinition::table("player_game_points", "player_gamelogs", "points", PlayLevel)
                .join_week()
                .description("Fantasy points for the game"),
            ColumnDefinition::table("player_projected_points", "projections_index", "total", FrequentUpdate)
                .join_week()
                .week_is_text()
                .description("Projected fantasy points"),
            ColumnDefinition::table("player_prop_line", "prop_markets_index", "line", Betting)
                .join_week()
                .description("Player prop line"),
            ColumnDefinition::table("player_contract_value", "player_contracts", "value", ExactYear)
                .season_level()
                .description("Contract value for the season"),
            ColumnDefinition::team_stat(
                "team_pass_yards_from_plays",
                TeamUnit::Offense,
                &["SUM(CASE WHEN nfl_plays.play_type = 'PASS' THEN nfl_plays.pass_yds ELSE 0 END) AS team_pass_yards_from_plays"],
            )
            .description("Team passing yards"),
            ColumnDefinition::team_stat(
                "team_rush_yards_from_plays",
                TeamUnit::Offense,
                &["SUM(CASE WHEN nfl_plays.play_type = 'RUSH' THEN nfl_plays.rush_yds ELSE 0 END) AS team_rush_yards_from_plays"],
            )
            .description("Team rushing yards"),
            ColumnDefinition::team_stat(
                "team_yards_per_rush_from_plays",
                TeamUnit::Offense,
                &[
                    "SUM(CASE WHEN nfl_plays.play_type = 'RUSH' THEN nfl_plays.rush_yds ELSE 0 END) AS team_yards_per_rush_from_plays_numerator",
                    "SUM(CASE WHEN nfl_plays.play_type = 'RUSH' THEN 1 ELSE 0 END) AS team_yards_per_rush_from_plays_denominator",
                ],
            )
            .rate()
            .description("Team yards per rush"),
            ColumnDefinition::team_stat(
                "team_sacks_from_plays",
                TeamUnit::Defense,
                &["SUM(CASE WHEN nfl_plays.sk THEN 1 ELSE 0 END) AS team_sacks_from_plays"],
            )
            .description("Team sacks"),
            ColumnDefinition::team_stat(
                "team_pass_attempts_in_player_games",
                TeamUnit::Offense,
                &["SUM(CASE WHEN nfl_plays.play_type = 'PASS' THEN 1 ELSE 0 END) AS team_pass_attempts_in_player_games"],
            )
            .active_games()
            .description("Team pass attempts in games the player was active"),
            ColumnDefinition::per_route(
                "player_targets_per_route",
                "trg_pid",
                "COUNT(*)",
            )
            .description("Targets per route run"),
            ColumnDefinition::per_route(
                "player_receiving_yards_per_route",
                "trg_pid",
                "SUM(COALESCE(nfl_plays.recv_yds, 0))",
            )
            .description("Receiving yards per route run"),
        ] {
            registry.register(definition);
        }
        registry
    }
}
