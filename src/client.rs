//! HTTP adapter of the service ports, speaking the REST routes served by
//! [`crate::handlers`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error};
use uuid::Uuid;

use crate::analytics::GroupAnalytics;
use crate::auth::API_KEY_HEADER;
use crate::error::{Result, WarikanError};
use crate::schemas::{
    AddMemberInput, CalculateSettlementsRequest, CreateGroupInput, Expense, ExpenseDraft,
    ExpenseInput, Group, Member, SettlementResult, UpdateGroupInput,
};
use crate::service::{ExpenseService, GroupService, SettlementService};

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    kind: String,
    message: String,
}

pub struct RestClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl RestClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(RestClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "sending request");
        let request = self.client.request(method, url);
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = check(request.send().await?).await?;
        response
            .json()
            .await
            .map_err(|e| WarikanError::Serialization(e.to_string()))
    }

    async fn execute(&self, request: RequestBuilder) -> Result<()> {
        check(request.send().await?).await?;
        Ok(())
    }
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await?;
    match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => Err(decode_error(envelope.error)),
        Err(_) => {
            error!(%status, "unexpected error response");
            Err(WarikanError::Transport(format!("HTTP {status}: {body}")))
        }
    }
}

/// Rebuilds the server-side error from its `type` code and message.
fn decode_error(body: ErrorBody) -> WarikanError {
    let ErrorBody { kind, message } = body;
    match kind.as_str() {
        "not_found" => {
            let (entity, id) = message
                .split_once(" not found: ")
                .unwrap_or(("resource", message.as_str()));
            let entity = match entity {
                "group" => "group",
                "expense" => "expense",
                "member" => "member",
                _ => "resource",
            };
            WarikanError::not_found(entity, id)
        }
        "validation_error" => match message.split_once(": ") {
            Some((field, detail)) => WarikanError::validation(field, detail),
            None => WarikanError::validation("request", message),
        },
        "conflict" => WarikanError::Conflict(
            message
                .strip_prefix("Conflict: ")
                .unwrap_or(message.as_str())
                .to_string(),
        ),
        "unauthorized" => WarikanError::Unauthorized,
        "transport_error" => WarikanError::Transport(message),
        _ => WarikanError::Internal(message),
    }
}

#[async_trait]
impl GroupService for RestClient {
    async fn create_group(&self, input: CreateGroupInput) -> Result<Group> {
        self.fetch(self.request(Method::POST, "/groups").json(&input))
            .await
    }

    async fn get_group(&self, id: Uuid) -> Result<Group> {
        self.fetch(self.request(Method::GET, &format!("/groups/{id}")))
            .await
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        self.fetch(self.request(Method::GET, "/groups")).await
    }

    async fn update_group(&self, id: Uuid, input: UpdateGroupInput) -> Result<Group> {
        self.fetch(self.request(Method::PUT, &format!("/groups/{id}")).json(&input))
            .await
    }

    async fn delete_group(&self, id: Uuid) -> Result<()> {
        self.execute(self.request(Method::DELETE, &format!("/groups/{id}")))
            .await
    }

    async fn add_member(&self, group_id: Uuid, input: AddMemberInput) -> Result<Member> {
        self.fetch(
            self.request(Method::POST, &format!("/groups/{group_id}/members"))
                .json(&input),
        )
        .await
    }

    async fn remove_member(&self, group_id: Uuid, member_id: Uuid) -> Result<()> {
        self.execute(self.request(
            Method::DELETE,
            &format!("/groups/{group_id}/members/{member_id}"),
        ))
        .await
    }
}

#[async_trait]
impl ExpenseService for RestClient {
    async fn add_expense(&self, group_id: Uuid, draft: ExpenseDraft) -> Result<Expense> {
        self.fetch(
            self.request(Method::POST, &format!("/groups/{group_id}/expenses"))
                .json(&draft),
        )
        .await
    }

    async fn list_expenses(&self, group_id: Uuid) -> Result<Vec<Expense>> {
        self.fetch(self.request(Method::GET, &format!("/groups/{group_id}/expenses")))
            .await
    }

    async fn update_expense(&self, expense_id: Uuid, draft: ExpenseDraft) -> Result<Expense> {
        self.fetch(
            self.request(Method::PUT, &format!("/expenses/{expense_id}"))
                .json(&draft),
        )
        .await
    }

    async fn update_group_expense(
        &self,
        group_id: Uuid,
        expense_id: Uuid,
        draft: ExpenseDraft,
    ) -> Result<Expense> {
        self.fetch(
            self.request(
                Method::PUT,
                &format!("/groups/{group_id}/expenses/{expense_id}"),
            )
            .json(&draft),
        )
        .await
    }

    async fn delete_expense(&self, expense_id: Uuid) -> Result<()> {
        self.execute(self.request(Method::DELETE, &format!("/expenses/{expense_id}")))
            .await
    }
}

#[async_trait]
impl SettlementService for RestClient {
    async fn calculate_settlements(
        &self,
        group_id: Uuid,
        expenses: Vec<ExpenseInput>,
    ) -> Result<SettlementResult> {
        let body = CalculateSettlementsRequest { expenses };
        self.fetch(
            self.request(
                Method::POST,
                &format!("/groups/{group_id}/settlements/calculate"),
            )
            .json(&body),
        )
        .await
    }

    async fn group_settlements(&self, group_id: Uuid) -> Result<SettlementResult> {
        self.fetch(self.request(Method::GET, &format!("/groups/{group_id}/settlements")))
            .await
    }

    async fn group_analytics(&self, group_id: Uuid) -> Result<GroupAnalytics> {
        self.fetch(self.request(Method::GET, &format!("/groups/{group_id}/analytics")))
            .await
    }
}
