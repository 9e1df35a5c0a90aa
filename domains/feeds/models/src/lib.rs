pub mod cache_keys;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Response envelope every feed endpoint speaks. `data` is the opaque
/// provider payload, or null when the provider had nothing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    #[schema(value_type = Object)]
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    /// 200 with empty data: the provider answered, nothing to show.
    pub fn empty() -> Self {
        Self {
            success: true,
            data: Value::Null,
            error: None,
        }
    }
}

/// Record stored under `hot:odds:<id>`. Carries its own expiry so hot
/// aging stays exact even when the underlying store keeps the entry
/// readable past its fresh TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotRecord {
    pub game_id: String,
    pub sport_id: i64,
    pub renewed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl HotRecord {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// "Non-empty" check shared by every tier writer: an empty payload
/// never overwrites a cache entry.
pub fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}
