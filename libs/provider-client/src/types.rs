use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of the priority-market POST, forwarded to the gateway
/// unmodified.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PriorityMarketRequest {
    pub sport_id: i64,
    pub id: String,
    pub market_name: String,
    pub mname: String,
    pub gtype: String,
}
