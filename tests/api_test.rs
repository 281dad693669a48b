use std::sync::Arc;

use actix_web::{http::StatusCode, test, web, App};
use serde_json::{json, Value};
use uuid::Uuid;
use warikan::{
    auth::{ApiKey, API_KEY_HEADER},
    currency::Currency,
    handlers,
    schemas::{Expense, Group, Member, SettlementResult},
    service::Ledger,
    store::MemoryStore,
};

macro_rules! app {
    ($api_key:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(Arc::new(Ledger::new(
                    Arc::new(MemoryStore::new()),
                    Currency::Jpy,
                ))))
                .app_data(web::Data::new(ApiKey::new($api_key)))
                .configure(handlers::configure_routes),
        )
        .await
    };
}

fn trip() -> Value {
    json!({
        "name": "Kyoto trip",
        "description": "Autumn leaves",
        "memberNames": ["Alice", "Bob", "Carol"]
    })
}

#[actix_web::test]
async fn test_group_expense_settlement_flow() {
    let app = app!(None);

    let req = test::TestRequest::post()
        .uri("/groups")
        .set_json(trip())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let group: Group = test::read_body_json(resp).await;
    assert_eq!(group.currency, Currency::Jpy);
    assert_eq!(group.members.len(), 3);
    let (alice, bob) = (group.members[0].id, group.members[1].id);
    let ids: Vec<Uuid> = group.members.iter().map(|m| m.id).collect();

    let req = test::TestRequest::post()
        .uri(&format!("/groups/{}/expenses", group.id))
        .set_json(json!({
            "amount": 3000,
            "description": "Dinner",
            "paidById": alice,
            "splitMemberIds": ids
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let expense: Expense = test::read_body_json(resp).await;
    assert_eq!(expense.paid_by_name, "Alice");

    let req = test::TestRequest::get()
        .uri(&format!("/groups/{}/expenses", group.id))
        .to_request();
    let expenses: Vec<Expense> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(expenses, vec![expense.clone()]);

    let req = test::TestRequest::get()
        .uri(&format!("/groups/{}/settlements", group.id))
        .to_request();
    let result: SettlementResult = test::call_and_read_body_json(&app, req).await;
    assert_eq!(result.settlements.len(), 2);
    assert!(result.settlements.iter().all(|s| s.to_member_id == alice));
    assert!(result.settlements.iter().all(|s| s.amount == 1000.0));

    let req = test::TestRequest::put()
        .uri(&format!("/expenses/{}", expense.id))
        .set_json(json!({
            "amount": 1000,
            "description": "Taxi",
            "paidById": bob,
            "splitMemberIds": [alice, bob]
        }))
        .to_request();
    let updated: Expense = test::call_and_read_body_json(&app, req).await;
    assert_eq!(updated.id, expense.id);
    assert_eq!(updated.paid_by_name, "Bob");

    let req = test::TestRequest::get()
        .uri(&format!("/groups/{}/settlements", group.id))
        .to_request();
    let result: SettlementResult = test::call_and_read_body_json(&app, req).await;
    assert_eq!(result.settlements.len(), 1);
    assert_eq!(result.settlements[0].from_member_id, alice);
    assert_eq!(result.settlements[0].to_member_id, bob);
    assert_eq!(result.settlements[0].amount, 500.0);

    let req = test::TestRequest::get()
        .uri(&format!("/groups/{}/analytics", group.id))
        .to_request();
    let analytics: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(analytics["byDay"].as_array().unwrap().len(), 30);
    assert_eq!(analytics["byCategory"][0]["category"], "transport");

    let req = test::TestRequest::delete()
        .uri(&format!("/expenses/{}", expense.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::delete()
        .uri(&format!("/groups/{}", group.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get()
        .uri(&format!("/groups/{}", group.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["type"], "not_found");
}

#[actix_web::test]
async fn test_calculate_endpoint_matches_worked_example() {
    let app = app!(None);

    let req = test::TestRequest::post()
        .uri("/groups")
        .set_json(trip())
        .to_request();
    let group: Group = test::call_and_read_body_json(&app, req).await;
    let ids: Vec<Uuid> = group.members.iter().map(|m| m.id).collect();

    let req = test::TestRequest::post()
        .uri(&format!("/groups/{}/settlements/calculate", group.id))
        .set_json(json!({
            "expenses": [
                { "id": "e1", "payerId": ids[0], "amount": 3000, "splitBetween": ids }
            ]
        }))
        .to_request();
    let result: SettlementResult = test::call_and_read_body_json(&app, req).await;

    let balances: Vec<f64> = result.balances.iter().map(|b| b.balance).collect();
    assert_eq!(balances, vec![2000.0, -1000.0, -1000.0]);
    assert_eq!(result.settlements.len(), 2);
    let sum: f64 = result.settlements.iter().map(|s| s.amount).sum();
    assert_eq!(sum, 2000.0);

    // Nothing was stored.
    let req = test::TestRequest::get()
        .uri(&format!("/groups/{}/expenses", group.id))
        .to_request();
    let expenses: Vec<Expense> = test::call_and_read_body_json(&app, req).await;
    assert!(expenses.is_empty());
}

#[actix_web::test]
async fn test_calculate_rejects_oversized_amount() {
    let app = app!(None);

    let req = test::TestRequest::post()
        .uri("/groups")
        .set_json(json!({
            "name": "Vegas",
            "currency": "USD",
            "memberNames": ["Alice", "Bob"]
        }))
        .to_request();
    let group: Group = test::call_and_read_body_json(&app, req).await;
    let ids: Vec<Uuid> = group.members.iter().map(|m| m.id).collect();

    let req = test::TestRequest::post()
        .uri(&format!("/groups/{}/settlements/calculate", group.id))
        .set_json(json!({
            "expenses": [
                { "id": "huge", "payerId": ids[0], "amount": 1e308, "splitBetween": ids }
            ]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["type"], "validation_error");
}

#[actix_web::test]
async fn test_members_can_be_added_and_removed() {
    let app = app!(None);

    let req = test::TestRequest::post()
        .uri("/groups")
        .set_json(trip())
        .to_request();
    let group: Group = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::post()
        .uri(&format!("/groups/{}/members", group.id))
        .set_json(json!({ "memberName": "Dave" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let dave: Member = test::read_body_json(resp).await;

    let req = test::TestRequest::post()
        .uri(&format!("/groups/{}/members", group.id))
        .set_json(json!({ "memberName": "dave" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["type"], "conflict");

    let req = test::TestRequest::delete()
        .uri(&format!("/groups/{}/members/{}", group.id, dave.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get()
        .uri(&format!("/groups/{}", group.id))
        .to_request();
    let group: Group = test::call_and_read_body_json(&app, req).await;
    assert_eq!(group.members.len(), 3);
}

#[actix_web::test]
async fn test_invalid_input_yields_validation_errors() {
    let app = app!(None);

    let req = test::TestRequest::post()
        .uri("/groups")
        .set_json(json!({ "name": "  ", "memberNames": ["Alice"] }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["type"], "validation_error");

    let req = test::TestRequest::post()
        .uri("/groups")
        .set_json(json!({ "name": "Trip", "currency": "XYZ", "memberNames": ["Alice"] }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri("/groups/not-a-uuid")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["type"], "validation_error");

    let req = test::TestRequest::post()
        .uri("/groups")
        .insert_header(("content-type", "application/json"))
        .set_payload("{ not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_api_key_is_enforced() {
    let app = app!(Some("s3cret"));

    let req = test::TestRequest::get().uri("/groups").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["type"], "unauthorized");

    let req = test::TestRequest::get()
        .uri("/groups")
        .insert_header((API_KEY_HEADER, "wrong"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/groups")
        .insert_header((API_KEY_HEADER, "s3cret"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/healthz").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
