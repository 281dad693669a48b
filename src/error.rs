use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WarikanError>;

#[derive(Error, Debug)]
pub enum WarikanError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl WarikanError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        WarikanError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        WarikanError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Machine-readable code carried in error bodies. Clients match on this
    /// instead of the human message.
    pub fn error_type(&self) -> &'static str {
        match self {
            WarikanError::NotFound { .. } => "not_found",
            WarikanError::Validation { .. } => "validation_error",
            WarikanError::Conflict(_) => "conflict",
            WarikanError::Unauthorized => "unauthorized",
            WarikanError::Database(_) => "database_error",
            WarikanError::Serialization(_) => "serialization_error",
            WarikanError::Transport(_) => "transport_error",
            WarikanError::Config(_) => "config_error",
            WarikanError::Internal(_) => "internal_error",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, WarikanError::NotFound { .. })
    }
}

impl ResponseError for WarikanError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();

        HttpResponse::build(status_code).json(json!({
            "error": {
                "code": status_code.as_u16(),
                "message": self.to_string(),
                "type": self.error_type()
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            WarikanError::NotFound { .. } => StatusCode::NOT_FOUND,
            WarikanError::Validation { .. } => StatusCode::BAD_REQUEST,
            WarikanError::Conflict(_) => StatusCode::CONFLICT,
            WarikanError::Unauthorized => StatusCode::UNAUTHORIZED,
            WarikanError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WarikanError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WarikanError::Transport(_) => StatusCode::BAD_GATEWAY,
            WarikanError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WarikanError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<bson::ser::Error> for WarikanError {
    fn from(err: bson::ser::Error) -> Self {
        WarikanError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for WarikanError {
    fn from(err: reqwest::Error) -> Self {
        WarikanError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            WarikanError::not_found("group", "abc").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            WarikanError::validation("amount", "must be positive").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WarikanError::Unauthorized.status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[actix_web::test]
    async fn test_error_body_carries_type_code() {
        let response = WarikanError::not_found("group", "abc").error_response();
        let body = to_bytes(response.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"]["code"], 404);
        assert_eq!(value["error"]["type"], "not_found");
        assert_eq!(value["error"]["message"], "group not found: abc");
    }
}
