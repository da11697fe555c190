use inventory::{
    AppConfig, AppState, InMemoryRepository, create_router,
    models::{CategoryNode, User},
    repository::Repository,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
    pub user_id: Uuid,
}

/// Serves the full router on an ephemeral port, backed by the in-memory repository.
async fn spawn_app() -> TestApp {
    let repo = InMemoryRepository::new();
    let user_id = Uuid::new_v4();
    repo.create_user(User {
        id: user_id,
        email: "t@t.com".to_string(),
        role: "default_user".to_string(),
    })
    .await
    .unwrap();

    let state = AppState::new(Arc::new(repo), AppConfig::default());
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address, user_id }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_category_lifecycle() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let user = app.user_id.to_string();

    // Create a tree
    let response = client
        .post(format!("{}/categories/tree", app.address))
        .header("x-user-id", &user)
        .json(&serde_json::json!({ "names": ["Arts", "Music", "Local"] }))
        .send()
        .await
        .expect("post fail");
    assert_eq!(response.status(), 200);
    let tree: Vec<CategoryNode> = response.json().await.unwrap();
    assert_eq!(tree.len(), 3);

    // Rename the root; the leaf path follows.
    let response = client
        .put(format!("{}/categories/{}", app.address, tree[0].id))
        .header("x-user-id", &user)
        .json(&serde_json::json!({ "name": "Culture" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let leaf: CategoryNode = client
        .get(format!("{}/categories/{}", app.address, tree[2].id))
        .header("x-user-id", &user)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(leaf.path, "Culture>Music>Local");

    // Deleting a category with children is refused.
    let response = client
        .delete(format!("{}/categories/{}", app.address, tree[1].id))
        .header("x-user-id", &user)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);

    // Where does "Local" occur?
    let chains: Vec<Vec<CategoryNode>> = client
        .get(format!("{}/categories/roots?name=Local", app.address))
        .header("x-user-id", &user)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(chains.len(), 1);
    assert_eq!(chains[0].len(), 2);
}

#[tokio::test]
async fn test_unknown_bypass_user_is_unauthorized() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/categories", app.address))
        .header("x-user-id", Uuid::new_v4().to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}
