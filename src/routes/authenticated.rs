use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Every route here sits behind the `auth_middleware` layer, so handlers always receive a
/// resolved `AuthUser`. Ownership checks happen in the handlers via `permissions`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Identity ---
        .route("/me", get(handlers::get_me))
        // GET /users
        // Role-filtered listing: administrators see everyone, others only themselves.
        .route("/users", get(handlers::list_users))
        // --- Categories ---
        .route(
            "/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        // Static segments below take priority over the `{id}` capture.
        .route("/categories/roots", get(handlers::get_root_trees))
        // POST /categories/tree
        // Idempotent get-or-create of a full path from its segment names.
        .route("/categories/tree", post(handlers::create_tree))
        // POST /categories/tree/delete
        // Leaf-first rollback of a tree creation; stops at categories that still have children.
        .route("/categories/tree/delete", post(handlers::delete_tree))
        .route(
            "/categories/{id}",
            get(handlers::get_category)
                .put(handlers::update_category)
                .delete(handlers::delete_category),
        )
        .route("/categories/{id}/parents", get(handlers::get_parents))
        .route("/categories/{id}/children", get(handlers::get_children))
}
