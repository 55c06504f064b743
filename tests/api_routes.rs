use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use cds_authoring::seed::{default_modifiers, default_templates};
use cds_authoring::{build_app, MemoryStore, ModifierRegistry, TemplateCatalog};

// Test client wrapper driving the router in-process
struct TestClient {
    app: Router,
}

impl TestClient {
    fn new() -> Self {
        let registry = ModifierRegistry::new(default_modifiers()).unwrap();
        let catalog = TemplateCatalog::new(default_templates()).unwrap();
        Self {
            app: build_app(Arc::new(MemoryStore::new()), registry, catalog),
        }
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(path)
            .header("x-user-id", "clinician-7");
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.send(Method::GET, path, None).await
    }

    async fn post(&self, path: &str, json: Value) -> (StatusCode, Value) {
        self.send(Method::POST, path, Some(json)).await
    }

    async fn delete(&self, path: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, path, None).await
    }

    async fn create_artifact(&self, name: &str) -> Value {
        let (status, artifact) = self.post("/artifacts", json!({ "name": name })).await;
        assert_eq!(status, StatusCode::CREATED);
        artifact
    }

    async fn operation(&self, artifact_id: &str, operation: Value) -> (StatusCode, Value) {
        self.post(&format!("/artifacts/{}/operations", artifact_id), operation)
            .await
    }
}

fn id_of(value: &Value, key: &str) -> String {
    value[key].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let client = TestClient::new();

    let (status, body) = client.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_catalog_routes() {
    let client = TestClient::new();

    let (status, all) = client.get("/modifiers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all["total"], default_modifiers().len());

    let (_, boolean) = client.get("/modifiers?input_type=boolean").await;
    let ids: Vec<&str> = boolean["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"BooleanNot"));
    assert!(!ids.contains(&"VerifiedObservation"));

    let (status, templates) = client.get("/templates").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!templates.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_artifact_lifecycle() {
    let client = TestClient::new();

    let artifact = client.create_artifact("Diabetes Screening").await;
    let artifact_id = id_of(&artifact, "id");
    assert_eq!(artifact["createdBy"], "clinician-7");
    assert!(artifact["revision"].is_string());

    let (status, listed) = client.get("/artifacts").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["total"], 1);

    let (status, fetched) = client.get(&format!("/artifacts/{}", artifact_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"], "Diabetes Screening");

    let (status, _) = client.delete(&format!("/artifacts/{}", artifact_id)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = client.get(&format!("/artifacts/{}", artifact_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "artifact_not_found");

    let (status, _) = client.delete(&format!("/artifacts/{}", artifact_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_operations_persist_and_lock() {
    let client = TestClient::new();
    let artifact = client.create_artifact("Hypertension").await;
    let artifact_id = id_of(&artifact, "id");
    let include = id_of(&artifact, "expTreeInclude");

    let (status, added) = client
        .operation(
            &artifact_id,
            json!({ "op": "add_base_element", "template_id": "GenericObservation" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let definition = id_of(&added, "created");

    let (status, used) = client
        .operation(
            &artifact_id,
            json!({
                "op": "add_base_element_use",
                "parent_id": include,
                "referent_id": definition,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let use_id = id_of(&used, "created");

    let (status, body) = client
        .operation(
            &artifact_id,
            json!({ "op": "add_modifier", "unique_id": definition, "modifier_id": "BooleanExists" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "in_use");

    let (status, body) = client
        .operation(
            &artifact_id,
            json!({
                "op": "delete_instance",
                "tree": { "tree": "base_elements" },
                "unique_id": definition,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "in_use");

    let (status, view) = client
        .get(&format!("/artifacts/{}/instances/{}", artifact_id, definition))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["return_type"], "observations");
    assert_eq!(view["used_by"], json!([use_id]));
    assert_eq!(view["menu"]["locked"], true);

    let (status, view) = client
        .get(&format!("/artifacts/{}/instances/{}", artifact_id, use_id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["base_element"]["referent_id"], definition);
}

#[tokio::test]
async fn test_rejected_operation_reports_kind() {
    let client = TestClient::new();
    let artifact = client.create_artifact("Empty").await;
    let artifact_id = id_of(&artifact, "id");

    let (status, body) = client
        .operation(
            &artifact_id,
            json!({ "op": "add_base_element", "template_id": "NoSuchTemplate" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "unknown_template");

    let (status, _) = client
        .operation("missing", json!({ "op": "add_subpopulation", "name": "Adults" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = client
        .get(&format!("/artifacts/{}/instances/nothing-here", artifact_id))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
