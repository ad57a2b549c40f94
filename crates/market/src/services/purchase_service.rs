//! Purchase requests between buyers and item owners.

use std::sync::Arc;

use bazaar_backend::{Backend, DataApiExt, Direction, Query};
use serde_json::json;
use tracing::{info, warn};

use crate::entities::{
    ItemStatus, NewPurchaseRequest, PurchaseRequest, RequestStatus, PURCHASE_REQUESTS_TABLE,
};
use crate::services::{require_session, ItemService};
use crate::types::{MarketError, MarketResult};

pub struct PurchaseService {
    backend: Arc<dyn Backend>,
    items: Arc<ItemService>,
}

impl PurchaseService {
    pub fn new(backend: Arc<dyn Backend>, items: Arc<ItemService>) -> Self {
        Self { backend, items }
    }

    pub async fn create_request(
        &self,
        item_id: &str,
        message: Option<&str>,
    ) -> MarketResult<PurchaseRequest> {
        let session = require_session(&*self.backend).await?;
        let item = self.items.get_item(item_id).await?;

        if item.is_owned_by(&session.user.id) {
            return Err(MarketError::OwnItem);
        }
        if item.status != ItemStatus::Available {
            return Err(MarketError::ItemUnavailable);
        }

        let row = NewPurchaseRequest::new(item_id, &session.user.id, message);
        let request: PurchaseRequest = self
            .backend
            .insert_as(PURCHASE_REQUESTS_TABLE, &row)
            .await?;
        info!(request_id = %request.id, item_id, "purchase request created");
        Ok(request)
    }

    /// Requests for one item, newest first. Failures yield an empty list.
    pub async fn list_for_item(&self, item_id: &str) -> Vec<PurchaseRequest> {
        let query = Query::from(PURCHASE_REQUESTS_TABLE)
            .eq("item_id", item_id)
            .order("created_at", Direction::Descending);
        match self.backend.select_as(&query).await {
            Ok(requests) => requests,
            Err(err) => {
                warn!(item_id, error = %err, "failed to load purchase requests");
                Vec::new()
            }
        }
    }

    /// Accept or reject a pending request on one of the owner's items.
    /// Accepting marks the item pending.
    pub async fn respond(&self, request_id: &str, accept: bool) -> MarketResult<PurchaseRequest> {
        let session = require_session(&*self.backend).await?;

        let query = Query::from(PURCHASE_REQUESTS_TABLE).eq("id", request_id);
        let request: PurchaseRequest = match self.backend.select_single(&query).await {
            Ok(request) => request,
            Err(err) if err.is_not_found() => {
                return Err(MarketError::request_not_found(request_id))
            }
            Err(err) => return Err(err.into()),
        };

        let item = self.items.get_item(&request.item_id).await?;
        if !item.is_owned_by(&session.user.id) || !request.status.is_open() {
            return Err(MarketError::request_not_found(request_id));
        }

        let status = if accept {
            RequestStatus::Accepted
        } else {
            RequestStatus::Rejected
        };
        let updated: Vec<PurchaseRequest> = self
            .backend
            .update_as(&query, json!({ "status": status }))
            .await?;
        let request = updated
            .into_iter()
            .next()
            .ok_or_else(|| MarketError::request_not_found(request_id))?;

        if accept {
            self.items.set_status(&item.id, ItemStatus::Pending).await?;
        }
        info!(request_id, accepted = accept, "purchase request answered");
        Ok(request)
    }
}
