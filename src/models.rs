use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The acting identity stored in the `profiles` table. Categories are stamped with the
/// creating and updating user.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    // RBAC field: 'superuser', 'admin', 'project_manager' or 'default_user'.
    pub role: String,
}

/// CategoryNode
///
/// One named segment of the category forest, stored in the `categories` table.
///
/// `path` and `level` are derived from the parent chain and are only ever written by
/// `CategoryManager`, never taken from request payloads.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct CategoryNode {
    pub id: Uuid,
    pub name: String,
    // Roots have no parent.
    pub parent_id: Option<Uuid>,
    // Delimiter-joined names from the root down to this node, e.g. "Arts>Music>Local".
    pub path: String,
    // Number of delimiters in `path`; 0 for a root.
    pub level: i32,
    pub owner_id: Uuid,
    pub creator_id: Uuid,
    pub updater_id: Uuid,
    #[ts(type = "string")]
    pub created: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated: DateTime<Utc>,
}

impl PartialEq for CategoryNode {
    /// Nodes are the same node when they share an identity, whatever their loaded state.
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CategoryNode {}

impl std::hash::Hash for CategoryNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for CategoryNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path)
    }
}

/// NewCategory
///
/// Insert payload handed to the repository. The manager computes `path` and `level`
/// before the row exists; the repository assigns `id` and the timestamps.
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub path: String,
    pub level: i32,
    pub owner_id: Uuid,
    pub creator_id: Uuid,
    pub updater_id: Uuid,
}

// --- Request Payloads (Input Schemas) ---

/// CreateCategoryRequest
///
/// Input payload for creating a single category (POST /categories).
/// `owner_id` defaults to the authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Uuid>,
}

/// UpdateCategoryRequest
///
/// Partial update payload (PUT /categories/{id}). Setting `make_root` detaches the node
/// from its parent and wins over `parent_id`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateCategoryRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub make_root: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Uuid>,
}

/// CreateTreeRequest
///
/// Ordered segment names from the root down (POST /categories/tree).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateTreeRequest {
    pub names: Vec<String>,
}

/// DeleteTreeRequest
///
/// Category ids in the order returned by a prior tree creation (POST /categories/tree/delete).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct DeleteTreeRequest {
    pub ids: Vec<Uuid>,
}

// --- Output Schemas ---

/// DeletedPathsResponse
///
/// Paths removed by a rollback deletion, leaf first. A shorter list than requested means
/// deletion stopped at a node that still had children.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct DeletedPathsResponse {
    pub deleted: Vec<String>,
}
