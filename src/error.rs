use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, CategoryError>;

/// CategoryError
///
/// Every failure the category service and its persistence layer can surface.
/// Validation variants are raised before any write happens.
#[derive(Debug, Error)]
pub enum CategoryError {
    #[error("invalid category name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("category path is {len} characters, the limit is {limit}")]
    PathTooLong { len: usize, limit: usize },

    #[error("category {0} not found")]
    NotFound(Uuid),

    #[error("parent category {0} not found")]
    ParentNotFound(Uuid),

    #[error("category {0} still has children")]
    HasChildren(Uuid),

    #[error("category {id} cannot be moved under {parent_id}: it is the category itself or one of its descendants")]
    InvalidMove { id: Uuid, parent_id: Uuid },

    #[error("category tree is deeper than the configured limit of {limit} levels")]
    DepthExceeded { limit: usize },

    #[error("category tree around {0} is corrupt (cycle or dangling parent)")]
    CorruptTree(Uuid),

    /// Raised when a concurrent writer created the same (name, parent, level) key first.
    #[error("category already exists: {0}")]
    Conflict(String),

    #[error("the owner of this record must be the user creating or altering it")]
    Forbidden,

    #[error("database request failed: {0}")]
    Database(String),
}

impl CategoryError {
    pub fn invalid_name(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidName { .. }
            | Self::PathTooLong { .. }
            | Self::ParentNotFound(_)
            | Self::InvalidMove { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::HasChildren(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::DepthExceeded { .. } | Self::CorruptTree(_) | Self::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<sqlx::Error> for CategoryError {
    fn from(value: sqlx::Error) -> Self {
        match &value {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(db.message().to_string())
            }
            _ => Self::Database(value.to_string()),
        }
    }
}

impl IntoResponse for CategoryError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Storage details stay in the logs.
        let message = match &self {
            Self::Database(_) | Self::CorruptTree(_) | Self::DepthExceeded { .. } => {
                tracing::error!("category request failed: {}", self);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
