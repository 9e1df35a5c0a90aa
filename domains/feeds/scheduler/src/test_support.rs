//! Shared scripted provider for pool and scheduler tests.

use std::{
    collections::HashSet,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use provider_client::{
    PriorityMarketRequest, ProviderClient, ProviderError,
    ProviderResult,
};
use serde_json::{Value, json};
use tokio::time::sleep;

pub(crate) struct MockProvider {
    latency: Duration,
    sports_payload: Mutex<Value>,
    fail_odds: Mutex<HashSet<String>>,
    empty_odds: Mutex<HashSet<String>>,
    fail_match_list: AtomicBool,
    odds_calls: AtomicU32,
    sports_calls: AtomicU32,
    match_list_calls: AtomicU32,
    sidebar_calls: AtomicU32,
    top_events_calls: AtomicU32,
    banners_calls: AtomicU32,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            latency: Duration::ZERO,
            sports_payload: Mutex::new(json!([{"sportId": 4}])),
            fail_odds: Mutex::new(HashSet::new()),
            empty_odds: Mutex::new(HashSet::new()),
            fail_match_list: AtomicBool::new(false),
            odds_calls: AtomicU32::new(0),
            sports_calls: AtomicU32::new(0),
            match_list_calls: AtomicU32::new(0),
            sidebar_calls: AtomicU32::new(0),
            top_events_calls: AtomicU32::new(0),
            banners_calls: AtomicU32::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_sports(self, payload: Value) -> Self {
        *self.sports_payload.lock().unwrap() = payload;
        self
    }

    pub fn fail_odds_for(&self, game_id: &str) {
        self.fail_odds.lock().unwrap().insert(game_id.to_string());
    }

    pub fn empty_odds_for(&self, game_id: &str) {
        self.empty_odds.lock().unwrap().insert(game_id.to_string());
    }

    pub fn fail_match_list(&self) {
        self.fail_match_list.store(true, Ordering::SeqCst);
    }

    pub fn odds_calls(&self) -> u32 {
        self.odds_calls.load(Ordering::SeqCst)
    }

    pub fn sports_calls(&self) -> u32 {
        self.sports_calls.load(Ordering::SeqCst)
    }

    pub fn match_list_calls(&self) -> u32 {
        self.match_list_calls.load(Ordering::SeqCst)
    }

    pub fn sidebar_calls(&self) -> u32 {
        self.sidebar_calls.load(Ordering::SeqCst)
    }

    pub fn top_events_calls(&self) -> u32 {
        self.top_events_calls.load(Ordering::SeqCst)
    }

    pub fn banners_calls(&self) -> u32 {
        self.banners_calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn simulate_call(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProviderClient for MockProvider {
    async fn get_all_sports(&self) -> ProviderResult<Option<Value>> {
        self.sports_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_call().await;
        Ok(Some(self.sports_payload.lock().unwrap().clone()))
    }

    async fn get_match_list(
        &self, sport_id: i64,
    ) -> ProviderResult<Option<Value>> {
        self.match_list_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_call().await;
        if self.fail_match_list.load(Ordering::SeqCst) {
            return Err(ProviderError::Timeout);
        }
        Ok(Some(json!([{"matchId": "m1", "sportId": sport_id}])))
    }

    async fn get_match_odds(
        &self, match_id: &str, sport_id: i64,
    ) -> ProviderResult<Option<Value>> {
        self.odds_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_call().await;
        if self.fail_odds.lock().unwrap().contains(match_id) {
            return Err(ProviderError::Transport(
                "connection refused".into(),
            ));
        }
        if self.empty_odds.lock().unwrap().contains(match_id) {
            return Ok(None);
        }
        Ok(Some(json!({
            "gameId": match_id,
            "sportId": sport_id,
            "odds": [1.98, 2.02],
        })))
    }

    async fn get_match_details(
        &self, _sport_id: i64, match_id: &str,
    ) -> ProviderResult<Option<Value>> {
        self.simulate_call().await;
        Ok(Some(json!({"matchId": match_id})))
    }

    async fn get_live_tv_score(
        &self, match_id: &str, _sport_id: i64,
    ) -> ProviderResult<Option<Value>> {
        self.simulate_call().await;
        Ok(Some(json!({"matchId": match_id, "score": "120/3"})))
    }

    async fn get_virtual_tv(
        &self, match_id: &str,
    ) -> ProviderResult<Option<Value>> {
        self.simulate_call().await;
        Ok(Some(json!({"matchId": match_id})))
    }

    async fn get_results(
        &self, sport_id: i64, match_id: &str,
    ) -> ProviderResult<Option<Value>> {
        self.simulate_call().await;
        Ok(Some(json!({"matchId": match_id, "sportId": sport_id})))
    }

    async fn get_sidebar_tree(&self) -> ProviderResult<Option<Value>> {
        self.sidebar_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_call().await;
        Ok(Some(json!({"tree": []})))
    }

    async fn get_top_events(&self) -> ProviderResult<Option<Value>> {
        self.top_events_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_call().await;
        Ok(Some(json!([{"eventId": "t1"}])))
    }

    async fn get_banners(&self) -> ProviderResult<Option<Value>> {
        self.banners_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_call().await;
        Ok(Some(json!([{"bannerId": "b1"}])))
    }

    async fn post_priority_market(
        &self, payload: PriorityMarketRequest,
    ) -> ProviderResult<Value> {
        self.simulate_call().await;
        Ok(json!({"accepted": true, "id": payload.id}))
    }
}
