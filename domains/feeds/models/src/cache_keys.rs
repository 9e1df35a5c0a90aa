//! Canonical cache keys. Every writer and reader goes through these so
//! a key never exists in two spellings.

pub const SPORTS: &str = "sports";
pub const SIDEBAR: &str = "sidebar";
pub const TOP_EVENTS: &str = "top-events";
pub const BANNERS: &str = "banners";

/// Glob covering the whole hot set, for registry enumeration.
pub const HOT_ODDS_PATTERN: &str = "hot:odds:*";
pub const HOT_ODDS_PREFIX: &str = "hot:odds:";

pub fn match_list(sport_id: i64) -> String {
    format!("matches:{sport_id}")
}

pub fn odds(match_id: &str) -> String { format!("odds:{match_id}") }

pub fn details(match_id: &str) -> String {
    format!("details:{match_id}")
}

pub fn tv(match_id: &str) -> String { format!("tv:{match_id}") }

pub fn vtv(match_id: &str) -> String { format!("vtv:{match_id}") }

pub fn results(sport_id: i64, match_id: &str) -> String {
    format!("results:{sport_id}:{match_id}")
}

pub fn hot_odds(match_id: &str) -> String {
    format!("{HOT_ODDS_PREFIX}{match_id}")
}

/// Inverse of `hot_odds`, for legacy records whose payload lacks the
/// game id.
pub fn game_id_from_hot_key(key: &str) -> Option<&str> {
    key.strip_prefix(HOT_ODDS_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_shapes() {
        assert_eq!(match_list(4), "matches:4");
        assert_eq!(odds("1001"), "odds:1001");
        assert_eq!(results(4, "1001"), "results:4:1001");
        assert_eq!(hot_odds("1001"), "hot:odds:1001");
        assert_eq!(game_id_from_hot_key("hot:odds:1001"), Some("1001"));
        assert_eq!(game_id_from_hot_key("odds:1001"), None);
    }
}
