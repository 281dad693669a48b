use std::sync::Arc;

use actix_web::{error, web, HttpRequest, HttpResponse};
use serde_json::json;
use uuid::Uuid;

use crate::auth::Authorized;
use crate::error::WarikanError;
use crate::schemas::{
    AddMemberInput, CalculateSettlementsRequest, CreateGroupInput, ExpenseDraft,
    UpdateGroupInput,
};
use crate::service::{ExpenseService, GroupService, Ledger, SettlementService};

type Response = Result<HttpResponse, WarikanError>;

/// Health check, pings the store. Not behind the API key.
pub async fn health_check(ledger: web::Data<Arc<Ledger>>) -> Response {
    ledger.store().ping().await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "warikan",
        "version": env!("CARGO_PKG_VERSION")
    })))
}

pub async fn list_groups(_: Authorized, ledger: web::Data<Arc<Ledger>>) -> Response {
    let groups = ledger.list_groups().await?;
    Ok(HttpResponse::Ok().json(groups))
}

pub async fn create_group(
    _: Authorized,
    ledger: web::Data<Arc<Ledger>>,
    input: web::Json<CreateGroupInput>,
) -> Response {
    let group = ledger.create_group(input.into_inner()).await?;
    Ok(HttpResponse::Created().json(group))
}

pub async fn get_group(
    _: Authorized,
    ledger: web::Data<Arc<Ledger>>,
    group_id: web::Path<Uuid>,
) -> Response {
    let group = ledger.get_group(*group_id).await?;
    Ok(HttpResponse::Ok().json(group))
}

pub async fn update_group(
    _: Authorized,
    ledger: web::Data<Arc<Ledger>>,
    group_id: web::Path<Uuid>,
    input: web::Json<UpdateGroupInput>,
) -> Response {
    let group = ledger.update_group(*group_id, input.into_inner()).await?;
    Ok(HttpResponse::Ok().json(group))
}

pub async fn delete_group(
    _: Authorized,
    ledger: web::Data<Arc<Ledger>>,
    group_id: web::Path<Uuid>,
) -> Response {
    ledger.delete_group(*group_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn add_member(
    _: Authorized,
    ledger: web::Data<Arc<Ledger>>,
    group_id: web::Path<Uuid>,
    input: web::Json<AddMemberInput>,
) -> Response {
    let member = ledger.add_member(*group_id, input.into_inner()).await?;
    Ok(HttpResponse::Created().json(member))
}

pub async fn remove_member(
    _: Authorized,
    ledger: web::Data<Arc<Ledger>>,
    path: web::Path<(Uuid, Uuid)>,
) -> Response {
    let (group_id, member_id) = path.into_inner();
    ledger.remove_member(group_id, member_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn list_expenses(
    _: Authorized,
    ledger: web::Data<Arc<Ledger>>,
    group_id: web::Path<Uuid>,
) -> Response {
    let expenses = ledger.list_expenses(*group_id).await?;
    Ok(HttpResponse::Ok().json(expenses))
}

pub async fn add_expense(
    _: Authorized,
    ledger: web::Data<Arc<Ledger>>,
    group_id: web::Path<Uuid>,
    draft: web::Json<ExpenseDraft>,
) -> Response {
    let expense = ledger.add_expense(*group_id, draft.into_inner()).await?;
    Ok(HttpResponse::Created().json(expense))
}

pub async fn update_group_expense(
    _: Authorized,
    ledger: web::Data<Arc<Ledger>>,
    path: web::Path<(Uuid, Uuid)>,
    draft: web::Json<ExpenseDraft>,
) -> Response {
    let (group_id, expense_id) = path.into_inner();
    let expense = ledger
        .update_group_expense(group_id, expense_id, draft.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(expense))
}

pub async fn update_expense(
    _: Authorized,
    ledger: web::Data<Arc<Ledger>>,
    expense_id: web::Path<Uuid>,
    draft: web::Json<ExpenseDraft>,
) -> Response {
    let expense = ledger.update_expense(*expense_id, draft.into_inner()).await?;
    Ok(HttpResponse::Ok().json(expense))
}

pub async fn delete_expense(
    _: Authorized,
    ledger: web::Data<Arc<Ledger>>,
    expense_id: web::Path<Uuid>,
) -> Response {
    ledger.delete_expense(*expense_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Settles an ad-hoc list of expenses against the group roster without
/// storing anything.
pub async fn calculate_settlements(
    _: Authorized,
    ledger: web::Data<Arc<Ledger>>,
    group_id: web::Path<Uuid>,
    request: web::Json<CalculateSettlementsRequest>,
) -> Response {
    let result = ledger
        .calculate_settlements(*group_id, request.into_inner().expenses)
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

pub async fn group_settlements(
    _: Authorized,
    ledger: web::Data<Arc<Ledger>>,
    group_id: web::Path<Uuid>,
) -> Response {
    let result = ledger.group_settlements(*group_id).await?;
    Ok(HttpResponse::Ok().json(result))
}

pub async fn group_analytics(
    _: Authorized,
    ledger: web::Data<Arc<Ledger>>,
    group_id: web::Path<Uuid>,
) -> Response {
    let analytics = ledger.group_analytics(*group_id).await?;
    Ok(HttpResponse::Ok().json(analytics))
}

fn path_error(err: error::PathError, _: &HttpRequest) -> actix_web::Error {
    WarikanError::validation("path", err.to_string()).into()
}

fn json_error(err: error::JsonPayloadError, _: &HttpRequest) -> actix_web::Error {
    WarikanError::validation("body", err.to_string()).into()
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PathConfig::default().error_handler(path_error))
        .app_data(web::JsonConfig::default().error_handler(json_error))
        .route("/healthz", web::get().to(health_check))
        .service(
            web::scope("/groups")
                .route("", web::get().to(list_groups))
                .route("", web::post().to(create_group))
                .route("/{id}", web::get().to(get_group))
                .route("/{id}", web::put().to(update_group))
                .route("/{id}", web::delete().to(delete_group))
                .route("/{id}/members", web::post().to(add_member))
                .route("/{id}/members/{member_id}", web::delete().to(remove_member))
                .route("/{id}/expenses", web::get().to(list_expenses))
                .route("/{id}/expenses", web::post().to(add_expense))
                .route(
                    "/{id}/expenses/{expense_id}",
                    web::put().to(update_group_expense),
                )
                .route(
                    "/{id}/settlements/calculate",
                    web::post().to(calculate_settlements),
                )
                .route("/{id}/settlements", web::get().to(group_settlements))
                .route("/{id}/analytics", web::get().to(group_analytics)),
        )
        .service(
            web::scope("/expenses")
                .route("/{expense_id}", web::put().to(update_expense))
                .route("/{expense_id}", web::delete().to(delete_expense)),
        );
}
