mod common;

use assert_matches::assert_matches;
use axum::http::{Method, StatusCode};
use common::{decimal, TestApp, OWNER_A, OWNER_B};
use pizza_pantry::{
    entities::{inventory_item, quantity_audit_log},
    errors::ServiceError,
    models::input::QuantityAdjustment,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use uuid::Uuid;

fn adjustment(change: Decimal) -> QuantityAdjustment {
    QuantityAdjustment {
        change,
        reason: "Quantity adjustment".to_string(),
        idempotency_key: None,
    }
}

async fn stored_quantity(app: &TestApp, id: Uuid) -> Decimal {
    inventory_item::Entity::find_by_id(id)
        .one(app.state.db.as_ref())
        .await
        .unwrap()
        .unwrap()
        .quantity
}

async fn audit_count(app: &TestApp, id: Uuid) -> u64 {
    quantity_audit_log::Entity::find()
        .filter(quantity_audit_log::Column::ItemId.eq(id))
        .count(app.state.db.as_ref())
        .await
        .unwrap()
}

#[tokio::test]
async fn draining_to_zero_is_allowed_but_not_below() {
    let app = TestApp::new().await;
    let id: Uuid = app.create_item(OWNER_A, "Flour", 5).await.parse().unwrap();

    let err = app
        .state
        .ledger
        .adjust_quantity(id, OWNER_A, adjustment(dec!(-6)))
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::InsufficientQuantity { available, change, .. }
            if available == dec!(5) && change == dec!(-6)
    );
    assert_eq!(stored_quantity(&app, id).await, dec!(5));
    assert_eq!(audit_count(&app, id).await, 0);

    let receipt = app
        .state
        .ledger
        .adjust_quantity(id, OWNER_A, adjustment(dec!(-5)))
        .await
        .unwrap();
    assert_eq!(receipt.item.item.quantity, Decimal::ZERO);
    assert_eq!(receipt.entry.previous_quantity, dec!(5));
    assert_eq!(receipt.entry.new_quantity, Decimal::ZERO);
    assert!(!receipt.replayed);
    assert_eq!(audit_count(&app, id).await, 1);
}

#[tokio::test]
async fn dough_delivery_then_oversized_withdrawal() {
    let app = TestApp::new().await;
    let id = app.create_item(OWNER_A, "Dough", 10).await;

    let res = app.adjust(OWNER_A, &id, 20, Some("delivery")).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["id"], id.as_str());
    assert_eq!(decimal(&res.body["quantity"]), dec!(30));
    assert_eq!(res.body["stockStatus"], "in-stock");
    assert_eq!(res.headers["idempotent-replayed"], "false");

    let entry = app.latest_audit(OWNER_A, &id).await;
    assert_eq!(entry["reason"], "delivery");
    assert_eq!(decimal(&entry["change"]), dec!(20));

    let res = app.adjust(OWNER_A, &id, -35, None).await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(res.body["message"], "Insufficient quantity");

    let res = app
        .as_owner(OWNER_A, Method::GET, &format!("/api/v1/items/{}", id), None)
        .await;
    assert_eq!(decimal(&res.body["quantity"]), dec!(30));

    let res = app
        .as_owner(OWNER_A, Method::GET, &format!("/api/v1/audit?itemId={}", id), None)
        .await;
    assert_eq!(res.body["pagination"]["total"], 1);
}

#[tokio::test]
async fn missing_reason_uses_configured_default() {
    let app = TestApp::with_config(|cfg| cfg.default_adjust_reason = "Stock count".into()).await;
    let id = app.create_item(OWNER_A, "Basil", 3).await;

    let res = app.adjust(OWNER_A, &id, 2, None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(app.latest_audit(OWNER_A, &id).await["reason"], "Stock count");

    let res = app.adjust(OWNER_A, &id, 1, Some("   ")).await;
    assert_eq!(decimal(&res.body["quantity"]), dec!(6));
    assert_eq!(app.latest_audit(OWNER_A, &id).await["reason"], "Stock count");
}

#[tokio::test]
async fn quantity_equals_initial_plus_applied_changes() {
    let app = TestApp::new().await;
    let id: Uuid = app.create_item(OWNER_A, "Pepperoni", 8).await.parse().unwrap();

    let changes = [dec!(4), dec!(-10), dec!(-3), dec!(7), dec!(-20), dec!(1)];
    let mut expected = dec!(8);
    let mut applied = 0;
    for change in changes {
        match app
            .state
            .ledger
            .adjust_quantity(id, OWNER_A, adjustment(change))
            .await
        {
            Ok(receipt) => {
                expected += change;
                applied += 1;
                assert_eq!(receipt.entry.new_quantity, expected);
            }
            Err(ServiceError::InsufficientQuantity { .. }) => {
                assert!(expected + change < Decimal::ZERO);
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(stored_quantity(&app, id).await, expected);
    assert!(expected >= Decimal::ZERO);
    assert_eq!(audit_count(&app, id).await, applied);
}

#[tokio::test]
async fn concurrent_withdrawals_never_overdraw() {
    let app = TestApp::with_config(|cfg| cfg.db_max_connections = 4).await;

    for round in 0..20 {
        let name = format!("Mozzarella {}", round);
        let id: Uuid = app.create_item(OWNER_A, &name, 5).await.parse().unwrap();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let ledger = app.state.ledger.clone();
                tokio::spawn(async move {
                    ledger
                        .adjust_quantity(id, OWNER_A, adjustment(dec!(-3)))
                        .await
                })
            })
            .collect();

        let mut successes = 0;
        let mut insufficient = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(ServiceError::InsufficientQuantity { .. }) => insufficient += 1,
                Err(other) => panic!("round {}: unexpected error: {}", round, other),
            }
        }
        assert_eq!((successes, insufficient), (1, 1), "round {}", round);
        assert_eq!(stored_quantity(&app, id).await, dec!(2));
        assert_eq!(audit_count(&app, id).await, 1);
    }
}

#[tokio::test]
async fn concurrent_small_withdrawals_all_apply() {
    let app = TestApp::with_config(|cfg| cfg.db_max_connections = 4).await;
    let id: Uuid = app.create_item(OWNER_A, "Semolina", 20).await.parse().unwrap();

    let handles: Vec<_> = (0..12)
        .map(|i| {
            let ledger = app.state.ledger.clone();
            let change = if i % 3 == 0 { dec!(2) } else { dec!(-1) };
            tokio::spawn(async move {
                ledger
                    .adjust_quantity(id, OWNER_A, adjustment(change))
                    .await
            })
        })
        .collect();

    for handle in handles {
        let receipt = handle.await.unwrap().expect("adjustment with enough stock");
        assert!(receipt.entry.new_quantity >= Decimal::ZERO);
    }

    // four deliveries of 2 and eight withdrawals of 1
    assert_eq!(stored_quantity(&app, id).await, dec!(20));
    assert_eq!(audit_count(&app, id).await, 12);
}

#[tokio::test]
async fn oversized_changes_are_rejected_without_panicking() {
    let app = TestApp::new().await;
    let id = app.create_item(OWNER_A, "Oregano", 1).await;
    let uri = format!("/api/v1/items/{}/quantity", id);

    let res = app
        .as_owner(
            OWNER_A,
            Method::PATCH,
            &uri,
            Some(serde_json::json!({ "change": "79228162514264337593543950335" })),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST, "{}", res.body);
    assert_eq!(res.body["message"], "Change too large");

    let res = app
        .as_owner(
            OWNER_A,
            Method::PATCH,
            &uri,
            Some(serde_json::json!({ "change": 99999999999.999_f64 })),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST, "{}", res.body);
    assert_eq!(res.body["message"], "Quantity out of range");

    let res = app
        .as_owner(OWNER_A, Method::GET, &format!("/api/v1/items/{}", id), None)
        .await;
    assert_eq!(decimal(&res.body["quantity"]), dec!(1));
}

#[tokio::test]
async fn idempotency_key_applies_once() {
    let app = TestApp::new().await;
    let id = app.create_item(OWNER_A, "Olives", 10).await;
    let uri = format!("/api/v1/items/{}/quantity", id);
    let token = app.token_for(OWNER_A);
    let headers = [("idempotency-key", "delivery-2024-03-01")];

    let first = app
        .request(
            Method::PATCH,
            &uri,
            Some(serde_json::json!({ "change": 5, "reason": "delivery" })),
            Some(&token),
            &headers,
        )
        .await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.headers["idempotent-replayed"], "false");
    assert_eq!(decimal(&first.body["quantity"]), dec!(15));

    let second = app
        .request(
            Method::PATCH,
            &uri,
            Some(serde_json::json!({ "change": 5, "reason": "delivery" })),
            Some(&token),
            &headers,
        )
        .await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.headers["idempotent-replayed"], "true");
    assert_eq!(second.body["id"], first.body["id"]);
    assert_eq!(decimal(&second.body["quantity"]), dec!(15));

    let audit = app
        .as_owner(OWNER_A, Method::GET, &format!("/api/v1/audit?itemId={}", id), None)
        .await;
    assert_eq!(audit.body["pagination"]["total"], 1);
}

#[tokio::test]
async fn foreign_items_look_missing() {
    let app = TestApp::new().await;
    let id: Uuid = app.create_item(OWNER_A, "Ham", 4).await.parse().unwrap();

    let err = app
        .state
        .ledger
        .adjust_quantity(id, OWNER_B, adjustment(dec!(1)))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(ref msg) if msg == "Item not found");

    let res = app.adjust(OWNER_B, &id.to_string(), 1, None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(stored_quantity(&app, id).await, dec!(4));
}

#[tokio::test]
async fn invalid_adjustments_are_rejected_before_writing() {
    let app = TestApp::new().await;
    let id = app.create_item(OWNER_A, "Yeast", 2).await;

    let res = app.adjust(OWNER_A, &id, 0, None).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "Change cannot be zero");

    let long_reason = "x".repeat(201);
    let res = app.adjust(OWNER_A, &id, 1, Some(&long_reason)).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "Reason too long");

    let res = app.adjust(OWNER_A, "not-a-uuid", 1, None).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "Invalid item ID");

    let res = app
        .as_owner(OWNER_A, Method::GET, &format!("/api/v1/audit?itemId={}", id), None)
        .await;
    assert_eq!(res.body["pagination"]["total"], 0);
}
