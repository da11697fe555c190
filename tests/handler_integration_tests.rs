use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{Request, StatusCode},
    response::IntoResponse,
};
use inventory::{
    AppState, CategoryError, InMemoryRepository,
    auth::AuthUser,
    config::AppConfig,
    create_router, handlers,
    models::{
        CategoryNode, CreateCategoryRequest, CreateTreeRequest, DeleteTreeRequest,
        DeletedPathsResponse, UpdateCategoryRequest, User,
    },
    repository::Repository,
};
use std::sync::Arc;
use tokio::test;
use tower::ServiceExt;
use uuid::Uuid;

// --- TEST UTILITIES ---

const TEST_ID: Uuid = Uuid::from_u128(123);
const TEST_ADMIN_ID: Uuid = Uuid::from_u128(456);

async fn create_test_state() -> AppState {
    let repo = InMemoryRepository::new();
    repo.create_user(User {
        id: TEST_ID,
        email: "member@example.com".to_string(),
        role: "default_user".to_string(),
    })
    .await
    .unwrap();
    repo.create_user(User {
        id: TEST_ADMIN_ID,
        email: "admin@example.com".to_string(),
        role: "admin".to_string(),
    })
    .await
    .unwrap();

    AppState::new(Arc::new(repo), AppConfig::default())
}

fn admin_user() -> AuthUser {
    AuthUser {
        id: TEST_ADMIN_ID,
        role: "admin".to_string(),
    }
}

fn member_user() -> AuthUser {
    AuthUser {
        id: TEST_ID,
        role: "default_user".to_string(),
    }
}

fn tree(names: &[&str]) -> Json<CreateTreeRequest> {
    Json(CreateTreeRequest {
        names: names.iter().map(|s| s.to_string()).collect(),
    })
}

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// --- HANDLER TESTS ---

#[test]
async fn test_create_tree_and_fetch_children() {
    let state = create_test_state().await;

    let Json(local) = handlers::create_tree(
        member_user(),
        State(state.clone()),
        tree(&["Arts", "Music", "Local"]),
    )
    .await
    .unwrap();
    handlers::create_tree(
        member_user(),
        State(state.clone()),
        tree(&["Arts", "Music", "Regional"]),
    )
    .await
    .unwrap();

    let Json(children) = handlers::get_children(
        State(state.clone()),
        Path(local[1].id),
        Query(handlers::ChildrenQuery { with_root: None }),
    )
    .await
    .unwrap();
    let paths: Vec<&str> = children.iter().map(|c| c.path.as_str()).collect();
    assert_eq!(paths, vec!["Arts>Music>Local", "Arts>Music>Regional"]);

    let Json(with_root) = handlers::get_children(
        State(state),
        Path(local[1].id),
        Query(handlers::ChildrenQuery {
            with_root: Some(true),
        }),
    )
    .await
    .unwrap();
    assert_eq!(with_root[0].path, "Arts>Music");
}

#[test]
async fn test_create_tree_with_delimiter_is_bad_request() {
    let state = create_test_state().await;

    let result = handlers::create_tree(member_user(), State(state.clone()), tree(&["Arts", "A>B"])).await;

    let err = result.unwrap_err();
    assert!(matches!(err, CategoryError::InvalidName { .. }));
    assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    assert!(state.categories.list_categories().await.unwrap().is_empty());
}

#[test]
async fn test_get_category_not_found() {
    let state = create_test_state().await;

    let result = handlers::get_category(State(state), Path(TEST_ID)).await;

    assert_eq!(result.unwrap_err().into_response().status(), StatusCode::NOT_FOUND);
}

#[test]
async fn test_create_category_for_other_owner_forbidden() {
    let state = create_test_state().await;

    let result = handlers::create_category(
        member_user(),
        State(state),
        Json(CreateCategoryRequest {
            name: "Tools".to_string(),
            parent_id: None,
            owner_id: Some(TEST_ADMIN_ID),
        }),
    )
    .await;

    assert_eq!(result.unwrap_err().into_response().status(), StatusCode::FORBIDDEN);
}

#[test]
async fn test_admin_may_create_for_other_owner() {
    let state = create_test_state().await;

    let (status, Json(node)) = handlers::create_category(
        admin_user(),
        State(state),
        Json(CreateCategoryRequest {
            name: "Tools".to_string(),
            parent_id: None,
            owner_id: Some(TEST_ID),
        }),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(node.owner_id, TEST_ID);
    assert_eq!(node.creator_id, TEST_ADMIN_ID);
}

#[test]
async fn test_update_category_requires_ownership() {
    let state = create_test_state().await;
    let Json(nodes) = handlers::create_tree(admin_user(), State(state.clone()), tree(&["Arts"]))
        .await
        .unwrap();

    let rename = || {
        Json(UpdateCategoryRequest {
            name: Some("Culture".to_string()),
            ..UpdateCategoryRequest::default()
        })
    };

    let forbidden =
        handlers::update_category(member_user(), State(state.clone()), Path(nodes[0].id), rename()).await;
    assert!(matches!(forbidden, Err(CategoryError::Forbidden)));

    let Json(updated) =
        handlers::update_category(admin_user(), State(state), Path(nodes[0].id), rename())
            .await
            .unwrap();
    assert_eq!(updated.path, "Culture");
}

#[test]
async fn test_delete_category_with_children_conflicts() {
    let state = create_test_state().await;
    let Json(nodes) =
        handlers::create_tree(member_user(), State(state.clone()), tree(&["Arts", "Music"]))
            .await
            .unwrap();

    let conflict =
        handlers::delete_category(member_user(), State(state.clone()), Path(nodes[0].id)).await;
    assert_eq!(conflict.unwrap_err().into_response().status(), StatusCode::CONFLICT);

    let status = handlers::delete_category(member_user(), State(state), Path(nodes[1].id))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[test]
async fn test_delete_tree_stops_at_shared_branch() {
    let state = create_test_state().await;
    let Json(abc) = handlers::create_tree(member_user(), State(state.clone()), tree(&["A", "B", "C"]))
        .await
        .unwrap();
    handlers::create_tree(member_user(), State(state.clone()), tree(&["A", "B", "D"]))
        .await
        .unwrap();

    let Json(response) = handlers::delete_tree(
        member_user(),
        State(state),
        Json(DeleteTreeRequest {
            ids: abc.iter().map(|n| n.id).collect(),
        }),
    )
    .await
    .unwrap();

    assert_eq!(response.deleted, vec!["A>B>C"]);
}

#[test]
async fn test_delete_tree_stops_at_foreign_owner() {
    let state = create_test_state().await;
    // The admin owns "A"; the member then extends it with "B".
    handlers::create_tree(admin_user(), State(state.clone()), tree(&["A"]))
        .await
        .unwrap();
    let Json(ab) = handlers::create_tree(member_user(), State(state.clone()), tree(&["A", "B"]))
        .await
        .unwrap();

    let Json(response) = handlers::delete_tree(
        member_user(),
        State(state.clone()),
        Json(DeleteTreeRequest {
            ids: ab.iter().map(|n| n.id).collect(),
        }),
    )
    .await
    .unwrap();

    assert_eq!(response.deleted, vec!["A>B"]);
    assert!(state.categories.get_category(ab[0].id).await.is_ok());
}

#[test]
async fn test_get_root_trees_and_parents() {
    let state = create_test_state().await;
    let Json(nodes) =
        handlers::create_tree(member_user(), State(state.clone()), tree(&["Arts", "Music", "Local"]))
            .await
            .unwrap();
    handlers::create_tree(member_user(), State(state.clone()), tree(&["Places", "Local"]))
        .await
        .unwrap();

    let Json(chains) = handlers::get_root_trees(
        State(state.clone()),
        Query(handlers::RootTreesQuery {
            name: "Local".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(chains.len(), 2);

    let Json(parents) = handlers::get_parents(State(state), Path(nodes[2].id))
        .await
        .unwrap();
    let paths: Vec<&str> = parents.iter().map(|p| p.path.as_str()).collect();
    assert_eq!(paths, vec!["Arts", "Arts>Music"]);
}

#[test]
async fn test_list_users_is_role_filtered() {
    let state = create_test_state().await;

    let Json(as_member) = handlers::list_users(member_user(), State(state.clone()))
        .await
        .unwrap();
    assert_eq!(as_member.len(), 1);
    assert_eq!(as_member[0].id, TEST_ID);

    let Json(as_admin) = handlers::list_users(admin_user(), State(state)).await.unwrap();
    assert_eq!(as_admin.len(), 2);
}

// --- ROUTER TESTS ---

#[test]
async fn test_router_rejects_anonymous_category_access() {
    let app = create_router(create_test_state().await);

    let response = app
        .oneshot(Request::builder().uri("/categories").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[test]
async fn test_router_health_is_public() {
    let app = create_router(create_test_state().await);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[test]
async fn test_router_tree_roundtrip_with_local_bypass() {
    let app = create_router(create_test_state().await);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/categories/tree")
                .header("x-user-id", TEST_ID.to_string())
                .header("content-type", "application/json")
                .body(Body::from(r#"{"names":["Arts","Music"]}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let nodes: Vec<CategoryNode> = body_json(response).await;
    assert_eq!(nodes[1].path, "Arts>Music");

    let delete_body = serde_json::json!({ "ids": [nodes[0].id, nodes[1].id] }).to_string();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/categories/tree/delete")
                .header("x-user-id", TEST_ID.to_string())
                .header("content-type", "application/json")
                .body(Body::from(delete_body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let deleted: DeletedPathsResponse = body_json(response).await;
    assert_eq!(deleted.deleted, vec!["Arts>Music", "Arts"]);
}

#[test]
async fn test_router_error_body_is_json() {
    let app = create_router(create_test_state().await);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/categories/tree")
                .header("x-user-id", TEST_ID.to_string())
                .header("content-type", "application/json")
                .body(Body::from(r#"{"names":["A>B"]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("delimiter"));
}
