//! Purchase requests between buyers and owners.

mod common;

use std::sync::Arc;

use bazaar_backend::{AuthApi, MemoryBackend};
use bazaar_market::{
    ImageService, ItemService, ItemStatus, MarketError, PurchaseService, RequestStatus,
};
use serde_json::json;

use common::{item_row, marketplace_backend, shared, signed_in_member, storage_config};

fn purchases(backend: &MemoryBackend) -> PurchaseService {
    let images = Arc::new(ImageService::new(shared(backend), storage_config()));
    let items = Arc::new(ItemService::new(shared(backend), images));
    PurchaseService::new(shared(backend), items)
}

#[tokio::test]
async fn owner_accepting_a_request_marks_the_item_pending() {
    let backend = marketplace_backend().await;
    let (owner, _) = signed_in_member(&backend, "owner@example.com").await;
    backend
        .seed("items", vec![item_row("item-1", &owner.user.id)])
        .await;

    let (buyer, _) = signed_in_member(&backend, "buyer@example.com").await;
    let service = purchases(&backend);
    let request = service
        .create_request("item-1", Some("  Would you take 100?  "))
        .await
        .expect("request created");
    assert_eq!(request.buyer_id, buyer.user.id);
    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(service.list_for_item("item-1").await.len(), 1);

    backend
        .sign_in("owner@example.com", common::PASSWORD)
        .await
        .expect("owner signs back in");
    let answered = service.respond(&request.id, true).await.expect("accepted");
    assert_eq!(answered.status, RequestStatus::Accepted);

    let items = backend.rows("items").await;
    assert_eq!(items[0]["status"], ItemStatus::Pending.as_str());

    let err = service
        .respond(&request.id, false)
        .await
        .expect_err("no longer pending");
    assert!(matches!(err, MarketError::RequestNotFound { .. }));
}

#[tokio::test]
async fn buyers_cannot_request_their_own_or_unavailable_items() {
    let backend = marketplace_backend().await;
    let (member, _) = signed_in_member(&backend, "ada@example.com").await;
    let mut sold = item_row("item-sold", "someone-else");
    sold["status"] = json!("sold");
    backend
        .seed("items", vec![item_row("item-own", &member.user.id), sold])
        .await;
    let service = purchases(&backend);

    let own = service.create_request("item-own", None).await.expect_err("own item");
    assert!(matches!(own, MarketError::OwnItem));

    let unavailable = service
        .create_request("item-sold", None)
        .await
        .expect_err("sold item");
    assert!(matches!(unavailable, MarketError::ItemUnavailable));

    let missing = service
        .create_request("item-missing", None)
        .await
        .expect_err("no such item");
    assert!(matches!(missing, MarketError::ItemNotFound { .. }));
    assert!(backend.rows("purchase_requests").await.is_empty());
}

#[tokio::test]
async fn only_the_owner_can_respond() {
    let backend = marketplace_backend().await;
    backend
        .seed("items", vec![item_row("item-1", "owner-id")])
        .await;
    backend
        .seed(
            "purchase_requests",
            vec![json!({"id": "req-1", "item_id": "item-1", "buyer_id": "b", "status": "pending"})],
        )
        .await;
    signed_in_member(&backend, "stranger@example.com").await;

    let err = purchases(&backend)
        .respond("req-1", true)
        .await
        .expect_err("not the owner");
    assert!(matches!(err, MarketError::RequestNotFound { .. }));
    assert_eq!(backend.rows("items").await[0]["status"], "available");
}
