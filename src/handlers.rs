use crate::{
    AppState,
    auth::AuthUser,
    error::CategoryError,
    models::{
        CategoryNode, CreateCategoryRequest, CreateTreeRequest, DeleteTreeRequest,
        DeletedPathsResponse, UpdateCategoryRequest, User,
    },
    permissions::{ensure_owner, has_full_access, visible_users},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

// --- Query Structs ---

/// ChildrenQuery
///
/// Query parameters of GET /categories/{id}/children.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct ChildrenQuery {
    /// Include the category itself in the result.
    pub with_root: Option<bool>,
}

/// RootTreesQuery
///
/// Query parameters of GET /categories/roots.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct RootTreesQuery {
    /// Exact segment name to look for.
    pub name: String,
}

// --- User Handlers ---

/// get_me
///
/// [Authenticated Route] Returns the caller's own profile.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = User))
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, StatusCode> {
    state
        .repo
        .get_user(id)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// list_users
///
/// [Authenticated Route] Superusers and administrators see every user; anybody else
/// sees only themselves.
#[utoipa::path(
    get,
    path = "/users",
    responses((status = 200, description = "Visible users", body = [User]))
)]
pub async fn list_users(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, CategoryError> {
    let all = state.repo.list_users().await?;
    Ok(Json(visible_users(&user, all)))
}

// --- Category CRUD ---

#[utoipa::path(
    get,
    path = "/categories",
    responses((status = 200, description = "All categories ordered by path", body = [CategoryNode]))
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryNode>>, CategoryError> {
    Ok(Json(state.categories.list_categories().await?))
}

#[utoipa::path(
    get,
    path = "/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Found", body = CategoryNode),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CategoryNode>, CategoryError> {
    Ok(Json(state.categories.get_category(id).await?))
}

/// create_category
///
/// [Authenticated Route] Creates one category. The owner defaults to the caller; naming
/// another owner requires full access.
#[utoipa::path(
    post,
    path = "/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Created", body = CategoryNode),
        (status = 400, description = "Invalid name or unknown parent"),
        (status = 403, description = "Owner is not the caller"),
        (status = 409, description = "Category already exists")
    )
)]
pub async fn create_category(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<CategoryNode>), CategoryError> {
    let owner_id = payload.owner_id.unwrap_or(user.id);
    ensure_owner(&user, owner_id)?;

    let node = state
        .categories
        .create_category(&payload.name, payload.parent_id, owner_id, user.id)
        .await?;
    Ok((StatusCode::CREATED, Json(node)))
}

/// update_category
///
/// [Authenticated Route] Renames, moves, or re-owns a category. Descendant paths are
/// recomputed before the response is sent.
#[utoipa::path(
    put,
    path = "/categories/{id}",
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Updated", body = CategoryNode),
        (status = 400, description = "Invalid name or move"),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_category(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> Result<Json<CategoryNode>, CategoryError> {
    let existing = state.categories.get_category(id).await?;
    ensure_owner(&user, existing.owner_id)?;
    if let Some(owner_id) = payload.owner_id {
        ensure_owner(&user, owner_id)?;
    }

    let node = state.categories.update_category(id, payload, user.id).await?;
    Ok(Json(node))
}

#[utoipa::path(
    delete,
    path = "/categories/{id}",
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Category still has children")
    )
)]
pub async fn delete_category(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, CategoryError> {
    let existing = state.categories.get_category(id).await?;
    ensure_owner(&user, existing.owner_id)?;

    state.categories.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Hierarchy Handlers ---

/// get_parents
///
/// [Authenticated Route] Ancestors of a category, root first.
#[utoipa::path(
    get,
    path = "/categories/{id}/parents",
    responses((status = 200, description = "Ancestors, root first", body = [CategoryNode]))
)]
pub async fn get_parents(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CategoryNode>>, CategoryError> {
    let node = state.categories.get_category(id).await?;
    Ok(Json(state.categories.get_parents(&node).await?))
}

/// get_children
///
/// [Authenticated Route] Every descendant of a category, sorted case-insensitively by path.
#[utoipa::path(
    get,
    path = "/categories/{id}/children",
    params(ChildrenQuery),
    responses((status = 200, description = "Descendants", body = [CategoryNode]))
)]
pub async fn get_children(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ChildrenQuery>,
) -> Result<Json<Vec<CategoryNode>>, CategoryError> {
    let node = state.categories.get_category(id).await?;
    let children = if query.with_root.unwrap_or(false) {
        state.categories.get_children_and_root(&node).await?
    } else {
        state.categories.get_children(&node).await?
    };
    Ok(Json(children))
}

/// get_root_trees
///
/// [Authenticated Route] The ancestor chain of every category with the given name.
#[utoipa::path(
    get,
    path = "/categories/roots",
    params(RootTreesQuery),
    responses((status = 200, description = "One ancestor chain per match", body = Vec<Vec<CategoryNode>>))
)]
pub async fn get_root_trees(
    State(state): State<AppState>,
    Query(query): Query<RootTreesQuery>,
) -> Result<Json<Vec<Vec<CategoryNode>>>, CategoryError> {
    Ok(Json(state.categories.get_all_root_trees(&query.name).await?))
}

/// create_tree
///
/// [Authenticated Route] Gets or creates a whole path from a list of segment names.
/// Idempotent: repeating the call returns the same categories.
#[utoipa::path(
    post,
    path = "/categories/tree",
    request_body = CreateTreeRequest,
    responses(
        (status = 200, description = "Categories along the path, root first", body = [CategoryNode]),
        (status = 400, description = "A name contains the delimiter"),
        (status = 409, description = "Concurrent creation of the same path")
    )
)]
pub async fn create_tree(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateTreeRequest>,
) -> Result<Json<Vec<CategoryNode>>, CategoryError> {
    let nodes = state
        .categories
        .create_category_tree(&payload.names, id)
        .await?;
    Ok(Json(nodes))
}

/// delete_tree
///
/// [Authenticated Route] Rolls back a tree creation. Deletion proceeds leaf first and stops
/// at the first category that still has children, or, for callers without full access, at
/// the first category owned by somebody else.
#[utoipa::path(
    post,
    path = "/categories/tree/delete",
    request_body = DeleteTreeRequest,
    responses(
        (status = 200, description = "Deleted paths, leaf first", body = DeletedPathsResponse),
        (status = 404, description = "Unknown category id")
    )
)]
pub async fn delete_tree(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<DeleteTreeRequest>,
) -> Result<Json<DeletedPathsResponse>, CategoryError> {
    let mut nodes = Vec::with_capacity(payload.ids.len());
    for id in payload.ids {
        nodes.push(state.categories.get_category(id).await?);
    }

    let start = if has_full_access(&user) {
        0
    } else {
        nodes
            .iter()
            .rposition(|n| n.owner_id != user.id)
            .map_or(0, |i| i + 1)
    };

    let deleted = state.categories.delete_category_tree(&nodes[start..]).await?;
    Ok(Json(DeletedPathsResponse { deleted }))
}
