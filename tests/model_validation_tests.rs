use inventory::models::{
    CategoryNode, CreateCategoryRequest, DeletedPathsResponse, UpdateCategoryRequest,
};
use uuid::Uuid;

// --- Tests ---

#[test]
fn test_category_node_equality_is_by_identity() {
    let id = Uuid::new_v4();
    let fresh = CategoryNode {
        id,
        name: "Music".to_string(),
        path: "Arts>Music".to_string(),
        level: 1,
        ..CategoryNode::default()
    };
    let stale = CategoryNode {
        path: "Old>Music".to_string(),
        ..fresh.clone()
    };

    assert_eq!(fresh, stale);
    assert_eq!(fresh.to_string(), "Arts>Music");
}

#[test]
fn test_category_node_json_shape() {
    let node = CategoryNode {
        id: Uuid::new_v4(),
        name: "Local".to_string(),
        parent_id: Some(Uuid::new_v4()),
        path: "Arts>Music>Local".to_string(),
        level: 2,
        ..CategoryNode::default()
    };

    let json: serde_json::Value = serde_json::to_value(&node).unwrap();
    assert_eq!(json["path"], "Arts>Music>Local");
    assert_eq!(json["level"], 2);
    for key in ["creator_id", "updater_id", "owner_id", "created", "updated"] {
        assert!(json.get(key).is_some(), "missing {}", key);
    }
}

#[test]
fn test_update_request_optionality() {
    // An empty body is a valid no-op update.
    let empty: UpdateCategoryRequest = serde_json::from_str("{}").unwrap();
    assert!(empty.name.is_none());
    assert!(empty.parent_id.is_none());
    assert!(!empty.make_root);

    let partial = UpdateCategoryRequest {
        name: Some("Culture".to_string()),
        ..UpdateCategoryRequest::default()
    };
    let json_output = serde_json::to_string(&partial).unwrap();
    assert!(json_output.contains(r#""name":"Culture""#));
    assert!(!json_output.contains("parent_id")); // None fields are omitted
}

#[test]
fn test_create_request_parent_defaults_to_root() {
    let req: CreateCategoryRequest = serde_json::from_str(r#"{"name":"Arts"}"#).unwrap();
    assert_eq!(req.name, "Arts");
    assert!(req.parent_id.is_none());
    assert!(req.owner_id.is_none());
}

#[test]
fn test_deleted_paths_response_serialization() {
    let response = DeletedPathsResponse {
        deleted: vec!["A>B".to_string(), "A".to_string()],
    };
    assert_eq!(
        serde_json::to_string(&response).unwrap(),
        r#"{"deleted":["A>B","A"]}"#
    );
}
