use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
    client::{ProviderClient, ProviderResult},
    config::ProviderConfig,
    error::ProviderError,
    types::PriorityMarketRequest,
};

/// HTTP client for the diamond-proxy gateway. Every call carries its
/// own deadline; a timeout surfaces as `ProviderError::Timeout` and
/// never cascades into the caller's timer.
pub struct DiamondProxyClient {
    http: Client,
    config: ProviderConfig,
}

impl DiamondProxyClient {
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        let http = Client::builder()
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get_json(
        &self, path: &str,
    ) -> ProviderResult<Option<Value>> {
        let url = self.url(path);
        debug!("GET {url}");

        let response = self
            .http
            .get(&url)
            .timeout(self.config.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Semantic {
                status: status.as_u16(),
                message: truncate(&message),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidData(e.to_string()))?;
        unwrap_envelope(body)
    }
}

#[async_trait]
impl ProviderClient for DiamondProxyClient {
    #[instrument(skip(self))]
    async fn get_all_sports(&self) -> ProviderResult<Option<Value>> {
        self.get_json("/api/sports").await
    }

    #[instrument(skip(self))]
    async fn get_match_list(
        &self, sport_id: i64,
    ) -> ProviderResult<Option<Value>> {
        self.get_json(&format!("/api/matchlist/{sport_id}")).await
    }

    #[instrument(skip(self))]
    async fn get_match_odds(
        &self, match_id: &str, sport_id: i64,
    ) -> ProviderResult<Option<Value>> {
        self.get_json(&format!("/api/odds/{match_id}/{sport_id}"))
            .await
    }

    #[instrument(skip(self))]
    async fn get_match_details(
        &self, sport_id: i64, match_id: &str,
    ) -> ProviderResult<Option<Value>> {
        self.get_json(&format!(
            "/api/matchdetails/{sport_id}/{match_id}"
        ))
        .await
    }

    #[instrument(skip(self))]
    async fn get_live_tv_score(
        &self, match_id: &str, sport_id: i64,
    ) -> ProviderResult<Option<Value>> {
        self.get_json(&format!("/api/livetv/{match_id}/{sport_id}"))
            .await
    }

    #[instrument(skip(self))]
    async fn get_virtual_tv(
        &self, match_id: &str,
    ) -> ProviderResult<Option<Value>> {
        self.get_json(&format!("/api/virtualtv/{match_id}")).await
    }

    #[instrument(skip(self))]
    async fn get_results(
        &self, sport_id: i64, match_id: &str,
    ) -> ProviderResult<Option<Value>> {
        self.get_json(&format!("/api/results/{sport_id}/{match_id}"))
            .await
    }

    #[instrument(skip(self))]
    async fn get_sidebar_tree(&self) -> ProviderResult<Option<Value>> {
        self.get_json("/api/sidebar").await
    }

    #[instrument(skip(self))]
    async fn get_top_events(&self) -> ProviderResult<Option<Value>> {
        self.get_json("/api/topevents").await
    }

    #[instrument(skip(self))]
    async fn get_banners(&self) -> ProviderResult<Option<Value>> {
        self.get_json("/api/banners").await
    }

    #[instrument(skip(self, payload))]
    async fn post_priority_market(
        &self, payload: PriorityMarketRequest,
    ) -> ProviderResult<Value> {
        let url = self.url("/api/prioritymarket");
        debug!("POST {url}");

        let response = self
            .http
            .post(&url)
            .timeout(self.config.post_timeout)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Semantic {
                status: status.as_u16(),
                message: truncate(&message),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidData(e.to_string()))
    }
}

/// The gateway wraps payloads as `{success, data}`. A 2xx with
/// `success: false` is a semantic failure; a missing or null `data` is
/// "responded with no content".
fn unwrap_envelope(body: Value) -> ProviderResult<Option<Value>> {
    match body {
        Value::Object(mut fields)
            if fields.contains_key("success") =>
        {
            let success = fields
                .get("success")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if !success {
                let message = fields
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("provider reported failure")
                    .to_string();
                return Err(ProviderError::Semantic {
                    status: 200,
                    message,
                });
            }
            match fields.remove("data") {
                Some(Value::Null) | None => Ok(None),
                Some(data) => Ok(Some(data)),
            }
        }
        Value::Null => Ok(None),
        other => Ok(Some(other)),
    }
}

fn truncate(message: &str) -> String {
    const LIMIT: usize = 200;
    if message.len() <= LIMIT {
        message.to_string()
    }
    else {
        let mut cut = LIMIT;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message[..cut].to_string()
    }
}
