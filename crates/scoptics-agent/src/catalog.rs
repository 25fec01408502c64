//! Snapshot of known matches, loaded once at startup.
//!
//! Lets classifiers recognize match ids and team names without touching
//! the store during resolution.

use scoptics_core::types::MatchMetadata;

#[derive(Clone, Debug, Default)]
pub struct MatchCatalog {
    matches: Vec<MatchMetadata>,
}

impl MatchCatalog {
    pub fn new(matches: Vec<MatchMetadata>) -> Self {
        Self { matches }
    }

    pub fn matches(&self) -> &[MatchMetadata] {
        &self.matches
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Look up a match by id, ignoring ASCII case.
    pub fn get(&self, match_id: &str) -> Option<&MatchMetadata> {
        self.matches
            .iter()
            .find(|m| m.match_id.eq_ignore_ascii_case(match_id))
    }

    /// Distinct team names across all matches, in catalog order.
    pub fn team_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self.matches.iter().flat_map(|m| m.team_names()) {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                names.push(name);
            }
        }
        names
    }

    /// Matches in which every one of `teams` plays.
    pub fn matches_with_teams(&self, teams: &[&str]) -> Vec<&MatchMetadata> {
        self.matches
            .iter()
            .filter(|m| {
                teams.iter().all(|t| {
                    m.team_names()
                        .iter()
                        .any(|name| name.eq_ignore_ascii_case(t))
                })
            })
            .collect()
    }

    /// Team identifier used in the tracking and events tables for `team_name`.
    ///
    /// Reads `home_team_id` / `away_team_id` from the match's extension
    /// fields, falling back to the name itself.
    pub fn team_id(&self, match_id: Option<&str>, team_name: &str) -> String {
        let candidates: Vec<&MatchMetadata> = match match_id.and_then(|id| self.get(id)) {
            Some(meta) => vec![meta],
            None => self.matches.iter().collect(),
        };

        for meta in candidates {
            let side = if meta
                .home_team_name
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(team_name))
            {
                "home_team_id"
            } else if meta
                .away_team_name
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(team_name))
            {
                "away_team_id"
            } else {
                continue;
            };
            if let Some(id) = meta.extra.get(side).and_then(|v| v.as_str()) {
                return id.to_string();
            }
            break;
        }
        team_name.to_string()
    }
}
