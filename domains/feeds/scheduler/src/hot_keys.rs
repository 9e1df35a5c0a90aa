use std::time::Duration;

use cache_store::{CacheResult, SwrCache};
use chrono::Utc;
use feeds_models::{HotRecord, cache_keys};
use tracing::{debug, instrument};

/// Tracks which match ids are currently "hot" — requested recently
/// enough to be worth polling every odds tick.
///
/// The registry is a view over the cache prefix `hot:odds:`. Records
/// age out by TTL instead of explicit removal: clients simply stop
/// requesting, and within `hot_ttl` the key drops out of the polling
/// set.
#[derive(Clone)]
pub struct HotKeyRegistry {
    cache: SwrCache,
    hot_ttl: Duration,
    default_sport_id: i64,
}

impl HotKeyRegistry {
    pub fn new(
        cache: SwrCache, hot_ttl: Duration, default_sport_id: i64,
    ) -> Self {
        Self {
            cache,
            hot_ttl,
            default_sport_id,
        }
    }

    pub fn hot_ttl(&self) -> Duration { self.hot_ttl }

    /// Idempotent: marking an already-hot key renews its window.
    #[instrument(skip(self))]
    pub async fn mark(
        &self, game_id: &str, sport_id: i64,
    ) -> CacheResult<()> {
        let now = Utc::now();
        let window = chrono::Duration::from_std(self.hot_ttl)
            .unwrap_or_else(|_| chrono::Duration::seconds(30));
        let record = HotRecord {
            game_id: game_id.to_string(),
            sport_id,
            renewed_at: now,
            expires_at: now + window,
        };
        let value = serde_json::to_value(&record).map_err(|e| {
            cache_store::CacheError::Serialization(e.to_string())
        })?;
        self.cache
            .set(&cache_keys::hot_odds(game_id), &value, self.hot_ttl)
            .await
    }

    /// All non-expired hot records. The record's own `expires_at` is
    /// authoritative, so a store that keeps entries readable past their
    /// fresh TTL cannot stretch the hot window.
    pub async fn list(&self) -> CacheResult<Vec<HotRecord>> {
        let now = Utc::now();
        let keys = self
            .cache
            .keys_matching(cache_keys::HOT_ODDS_PATTERN)
            .await?;

        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(value) = self.cache.get(&key).await? else {
                continue;
            };
            match serde_json::from_value::<HotRecord>(value) {
                Ok(record) if record.is_live(now) => {
                    records.push(record);
                }
                Ok(_) => {}
                Err(_) => {
                    // Legacy record without metadata: still hot, but we
                    // only know the id from the key.
                    let Some(game_id) =
                        cache_keys::game_id_from_hot_key(&key)
                    else {
                        continue;
                    };
                    debug!(
                        "hot record {key} has no metadata, assuming \
                         sport {}",
                        self.default_sport_id
                    );
                    records.push(HotRecord {
                        game_id: game_id.to_string(),
                        sport_id: self.default_sport_id,
                        renewed_at: now,
                        expires_at: now,
                    });
                }
            }
        }
        Ok(records)
    }
}
