use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use idp_api_client::{ClientConfig, IdpApiClient};
use idp_forms::{
    CloudProviderSource, PropertySchema, PropertySchemaPatch, PropertySchemaStore, SchemaContext, SchemaError, SchemaKey, SchemaSource,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Recorded {
    requests: Mutex<Vec<(String, Option<String>, Option<String>, Option<Value>)>>,
}

impl Recorded {
    fn push(&self, what: String, headers: &HeaderMap, body: Option<Value>) {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
        self.requests
            .lock()
            .unwrap()
            .push((what, header("authorization"), header("x-auth-request-email"), body));
    }

    fn last(&self) -> (String, Option<String>, Option<String>, Option<Value>) {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

type Shared = Arc<Recorded>;

fn property(name: &str, order: i64) -> Value {
    json!({
        "id": format!("ps-{}", name),
        "mappingId": "m-1",
        "propertyName": name,
        "displayName": name.to_uppercase(),
        "dataType": "STRING",
        "required": false,
        "displayOrder": order
    })
}

async fn resource_schema(
    State(rec): State<Shared>,
    Path((collection, rt, cp)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    rec.push(format!("GET {}/{}/{}", collection, rt, cp), &headers, None);
    match (collection.as_str(), rt.as_str(), cp.as_str()) {
        (_, _, "none") => (StatusCode::NOT_FOUND, Json(json!({ "message": "No mapping found" }))),
        (_, _, "locked") => (StatusCode::FORBIDDEN, Json(json!({ "message": "Forbidden" }))),
        (_, _, "broken") => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "database unavailable" }))),
        ("blueprints", "legacy", _) => (
            StatusCode::OK,
            Json(json!({ "capacityProvider": property("capacityProvider", 10), "instanceType": property("instanceType", 20) })),
        ),
        ("blueprints", _, _) => (
            StatusCode::OK,
            Json(json!({
                "resourceTypeId": rt,
                "resourceTypeName": "Storage",
                "cloudProviderId": cp,
                "cloudProviderName": "AWS",
                "properties": [property("bucketName", 10), property("region", 20)]
            })),
        ),
        _ => (StatusCode::OK, Json(json!([property("replicas", 1)]))),
    }
}

async fn list_by_mapping(State(rec): State<Shared>, Path(id): Path<String>, headers: HeaderMap) -> Json<Value> {
    rec.push(format!("GET mapping/{}", id), &headers, None);
    Json(json!([property("a", 0), property("b", 1)]))
}

async fn create(State(rec): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    rec.push("POST".to_string(), &headers, Some(body.clone()));
    let mut created = body;
    created["id"] = json!("ps-new");
    (StatusCode::CREATED, Json(created))
}

async fn bulk(
    State(rec): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mapping = query.get("mappingId").cloned().unwrap_or_default();
    rec.push(format!("POST bulk {}", mapping), &headers, Some(body.clone()));
    let created: Vec<Value> = body
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, mut item)| {
            item["id"] = json!(format!("ps-bulk-{}", i));
            item
        })
        .collect();
    (StatusCode::CREATED, Json(Value::Array(created)))
}

async fn update(
    State(rec): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    rec.push(format!("PUT {}", id), &headers, Some(body.clone()));
    if id == "missing" {
        return (StatusCode::NOT_FOUND, Json(json!({ "message": "Property schema not found" })));
    }
    let mut row = property("a", 0);
    row["id"] = json!(id);
    if let Some(order) = body.get("displayOrder") {
        row["displayOrder"] = order.clone();
    }
    (StatusCode::OK, Json(row))
}

async fn delete(State(rec): State<Shared>, Path(id): Path<String>, headers: HeaderMap) -> StatusCode {
    rec.push(format!("DELETE {}", id), &headers, None);
    StatusCode::NO_CONTENT
}

async fn mappings(State(rec): State<Shared>, headers: HeaderMap) -> Json<Value> {
    rec.push("GET mappings".to_string(), &headers, None);
    Json(json!([{ "id": "m-1", "resourceTypeId": "s3-bucket", "cloudProviderId": "aws", "enabled": true }]))
}

async fn cloud_providers(State(rec): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    rec.push("GET cloud-providers".to_string(), &headers, None);
    if !headers.contains_key("authorization") {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Missing credentials" })));
    }
    (
        StatusCode::OK,
        Json(json!([{ "id": "cp-aws", "name": "AWS", "displayName": "Amazon Web Services", "enabled": true }])),
    )
}

async fn start_server() -> (String, Shared) {
    let rec: Shared = Arc::new(Recorded::default());
    let app = Router::new()
        .route("/api/v1/:collection/resource-schema/:rt/:cp", get(resource_schema))
        .route("/api/v1/admin/property-schemas/mapping/:id", get(list_by_mapping))
        .route("/api/v1/admin/property-schemas", post(create))
        .route("/api/v1/admin/property-schemas/bulk", post(bulk))
        .route("/api/v1/admin/property-schemas/:id", put(update).delete(delete))
        .route("/api/v1/admin/resource-type-cloud-mappings", get(mappings))
        .route("/api/v1/admin/cloud-providers", get(cloud_providers))
        .with_state(rec.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/api", addr), rec)
}

fn client(base_url: &str, api_key: Option<&str>) -> IdpApiClient {
    let config = ClientConfig {
        api_key: api_key.map(str::to_string),
        user_email: Some("default@example.com".to_string()),
        ..ClientConfig::new(base_url)
    };
    IdpApiClient::new(&config).unwrap()
}

async fn fetch(client: &IdpApiClient, cloud_provider_id: &str) -> Result<Vec<PropertySchema>, SchemaError> {
    let key = SchemaKey::new("s3-bucket", cloud_provider_id, SchemaContext::Blueprint);
    client.get_schema(&key, None).await
}

#[tokio::test]
async fn test_envelope_schema_and_headers() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (base, rec) = start_server().await;
    let client = client(&base, Some("secret"));

    let key = SchemaKey::new("s3-bucket", "aws", SchemaContext::Blueprint);
    let schema = client.fetch_resource_schema(&key, Some("alice@example.com")).await.unwrap();
    assert_eq!(schema.cloud_provider_name.as_deref(), Some("AWS"));
    assert_eq!(schema.properties.len(), 2);
    assert_eq!(schema.properties[0].property_name, "bucketName");

    let (what, auth, actor, _) = rec.last();
    assert_eq!(what, "GET blueprints/s3-bucket/aws");
    assert_eq!(auth.as_deref(), Some("Bearer secret"));
    assert_eq!(actor.as_deref(), Some("alice@example.com"));
}

#[tokio::test]
async fn test_bare_array_and_keyed_schemas_decode() {
    let (base, rec) = start_server().await;
    let client = client(&base, None);

    let stack = client
        .get_schema(&SchemaKey::new("s3-bucket", "aws", SchemaContext::Stack), None)
        .await
        .unwrap();
    assert_eq!(stack.len(), 1);
    assert_eq!(stack[0].property_name, "replicas");
    let (what, auth, actor, _) = rec.last();
    assert_eq!(what, "GET stacks/s3-bucket/aws");
    assert_eq!(auth, None);
    assert_eq!(actor.as_deref(), Some("default@example.com"));

    let legacy = client
        .get_schema(&SchemaKey::new("legacy", "aws", SchemaContext::Blueprint), None)
        .await
        .unwrap();
    let mut names: Vec<String> = legacy.into_iter().map(|p| p.property_name).collect();
    names.sort();
    assert_eq!(names, ["capacityProvider", "instanceType"]);
}

#[tokio::test]
async fn test_error_statuses_are_classified() {
    let (base, _rec) = start_server().await;
    let client = client(&base, Some("secret"));

    assert_eq!(fetch(&client, "none").await, Err(SchemaError::NotFound("No mapping found".to_string())));
    assert_eq!(fetch(&client, "locked").await, Err(SchemaError::Unauthorized("Forbidden".to_string())));
    assert_eq!(
        fetch(&client, "broken").await,
        Err(SchemaError::ServerError { status: 500, message: "database unavailable".to_string() })
    );
}

#[tokio::test]
async fn test_unreachable_backend_is_unknown() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client(&format!("http://{}", addr), None);
    let result = client
        .get_schema(&SchemaKey::new("s3-bucket", "aws", SchemaContext::Blueprint), None)
        .await;
    assert!(matches!(result, Err(SchemaError::Unknown(_))), "{:?}", result);
}

#[tokio::test]
async fn test_admin_property_schema_calls() {
    let (base, rec) = start_server().await;
    let client = client(&base, Some("secret"));

    let rows = client.list_property_schemas("m-1", Some("admin@example.com")).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rec.last().0, "GET mapping/m-1");

    let draft = rows[0].clone().with_id("");
    let created = client.create_property_schema(&draft, None).await.unwrap();
    assert_eq!(created.id, "ps-new");
    let (_, _, _, body) = rec.last();
    let body = body.unwrap();
    assert!(body.get("id").is_none(), "new rows carry no id: {}", body);
    assert_eq!(body["propertyName"], "a");
    assert_eq!(body["dataType"], "STRING");

    let created = client.bulk_create_property_schemas("m-1", &rows, None).await.unwrap();
    assert_eq!(created.len(), 2);
    assert_eq!(rec.last().0, "POST bulk m-1");

    let updated = client
        .update_property_schema("ps-a", &PropertySchemaPatch::display_order(7), None)
        .await
        .unwrap();
    assert_eq!(updated.display_order, Some(7));
    assert_eq!(rec.last().3, Some(json!({ "displayOrder": 7 })));

    let missing = client.update_property_schema("missing", &PropertySchemaPatch::display_order(1), None).await;
    assert!(matches!(missing, Err(SchemaError::NotFound(_))));

    client.delete_property_schema("ps-b", None).await.unwrap();
    assert_eq!(rec.last().0, "DELETE ps-b");

    let mappings = client.get_resource_type_cloud_mappings(None).await.unwrap();
    assert_eq!(mappings[0].id, "m-1");
    assert_eq!(mappings[0].cloud_provider_id, "aws");
}

#[tokio::test]
async fn test_cloud_providers_need_credentials() {
    let (base, _rec) = start_server().await;

    let anonymous = client(&base, None);
    assert!(matches!(anonymous.list_cloud_providers(None).await, Err(SchemaError::Unauthorized(_))));

    let authed = client(&base, Some("secret"));
    let providers = authed.list_cloud_providers(None).await.unwrap();
    assert_eq!(providers[0].display_name.as_deref(), Some("Amazon Web Services"));
}
