use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const PURCHASE_REQUESTS_TABLE: &str = "purchase_requests";

/// A buyer's request to purchase an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub id: String,
    pub item_id: String,
    /// Auth principal asking to buy
    pub buyer_id: String,
    #[serde(default)]
    pub message: Option<String>,
    pub status: RequestStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl RequestStatus {
    pub fn is_open(self) -> bool {
        self == RequestStatus::Pending
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPurchaseRequest {
    pub item_id: String,
    pub buyer_id: String,
    pub message: Option<String>,
    pub status: RequestStatus,
}

impl NewPurchaseRequest {
    pub fn new(item_id: &str, buyer_id: &str, message: Option<&str>) -> Self {
        Self {
            item_id: item_id.to_string(),
            buyer_id: buyer_id.to_string(),
            message: message
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string),
            status: RequestStatus::Pending,
        }
    }
}
