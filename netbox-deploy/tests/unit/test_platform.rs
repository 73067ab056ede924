//! Platform client tests against a local fake API

use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use netbox_deploy::apps::{list_apps, load_app_overview};
use netbox_deploy::deploy::trigger::{deploy, DeployRequest};
use netbox_deploy::errors::DeployerError;
use netbox_deploy::http::builds::{LATEST_BUILD_RANGE, LATEST_RELEASE_RANGE};
use netbox_deploy::http::client::{PlatformClient, ACCEPT_V3};
use netbox_deploy::http::setups::SetupSource;
use secrecy::SecretString;
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};

use crate::fixtures::spawn_router;

const TOKEN: &str = "test-token";

#[derive(Default)]
struct FakeApi {
    setup_requests: Mutex<Vec<Value>>,
}

type ApiState = State<Arc<FakeApi>>;

fn authorized(headers: &HeaderMap) -> bool {
    let value = |name| headers.get(name).and_then(|value| value.to_str().ok());
    value(header::ACCEPT) == Some(ACCEPT_V3) && value(header::AUTHORIZATION) == Some("Bearer test-token")
}

fn reject() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"id": "unauthorized", "message": "bad headers"}))).into_response()
}

fn build_json(app_id: &str, version: &str) -> Value {
    json!({
        "id": format!("{}-build", app_id),
        "status": "succeeded",
        "source_blob": {
            "url": "https://netbox-deploy.netlify.com/source_blob?version=v2.6.7",
            "version": version,
        },
        "output_stream_url": null,
        "created_at": "2020-01-01T10:00:00Z",
    })
}

async fn apps(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return reject();
    }
    Json(json!([
        {"id": "managed", "name": "my-netbox"},
        {"id": "unmanaged", "name": "other-app"},
        {"id": "empty", "name": "fresh-app"},
        {"id": "broken", "name": "broken-app"},
    ]))
    .into_response()
}

async fn app(Path(id): Path<String>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return reject();
    }
    Json(json!({"id": id, "name": "my-netbox", "web_url": "https://my-netbox.herokuapp.com/"})).into_response()
}

async fn builds(Path(id): Path<String>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return reject();
    }
    if headers.get(header::RANGE).and_then(|value| value.to_str().ok()) != Some(LATEST_BUILD_RANGE) {
        return (StatusCode::BAD_REQUEST, "missing range").into_response();
    }
    match id.as_str() {
        "managed" => Json(json!([build_json("managed", "netbox-heroku@v2.6.7")])).into_response(),
        "unmanaged" => Json(json!([build_json("unmanaged", "3f2a1bc")])).into_response(),
        "broken" => (StatusCode::SERVICE_UNAVAILABLE, "try again").into_response(),
        _ => Json(json!([])).into_response(),
    }
}

async fn releases(headers: HeaderMap) -> Response {
    if headers.get(header::RANGE).and_then(|value| value.to_str().ok()) != Some(LATEST_RELEASE_RANGE) {
        return (StatusCode::BAD_REQUEST, "missing range").into_response();
    }
    // Ignores the requested order on purpose
    Json(json!([
        {"id": "r7", "version": 7, "status": "succeeded"},
        {"id": "r12", "version": 12, "status": "succeeded"},
    ]))
    .into_response()
}

async fn config_vars() -> Json<Value> {
    Json(json!({"LOGIN_REQUIRED": "false", "SECRET_KEY": "s3cr3t", "UNSET": null}))
}

async fn domains() -> Json<Value> {
    Json(json!([{"id": "d1", "hostname": "my-netbox.herokuapp.com", "kind": "heroku", "cname": null}]))
}

async fn create_setup(State(api): ApiState, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return reject();
    }
    api.setup_requests.lock().unwrap().push(body);
    (StatusCode::CREATED, Json(json!({"id": "setup-1", "status": "pending"}))).into_response()
}

async fn get_setup(Path(id): Path<String>) -> Response {
    if id == "setup-1" {
        return Json(json!({
            "id": "setup-1",
            "status": "pending",
            "build": {"id": "b1", "status": "pending", "output_stream_url": "https://build-output.example/b1"},
        }))
        .into_response();
    }
    (
        StatusCode::NOT_FOUND,
        Json(json!({"id": "not_found", "message": "Couldn't find that app setup."})),
    )
        .into_response()
}

async fn spawn_api() -> (PlatformClient, Arc<FakeApi>) {
    let api = Arc::new(FakeApi::default());
    let router = Router::new()
        .route("/apps", get(apps))
        .route("/apps/{id}", get(app))
        .route("/apps/{id}/builds", get(builds))
        .route("/apps/{id}/releases", get(releases))
        .route("/apps/{id}/config-vars", get(config_vars))
        .route("/apps/{id}/domains", get(domains))
        .route("/app-setups", post(create_setup))
        .route("/app-setups/{id}", get(get_setup))
        .with_state(api.clone());
    let addr = spawn_router(router).await;

    let client = PlatformClient::new(&format!("http://{}/", addr), SecretString::from(TOKEN.to_string())).unwrap();
    (client, api)
}

#[tokio::test]
async fn test_last_build_uses_range_header() {
    let (client, _) = spawn_api().await;

    let build = client.get_last_build("managed").await.unwrap().unwrap();
    assert_eq!(build.id, "managed-build");

    assert!(client.get_last_build("empty").await.unwrap().is_none());
}

#[tokio::test]
async fn test_last_release_picks_highest_version() {
    let (client, _) = spawn_api().await;

    let release = client.get_last_release("managed").await.unwrap().unwrap();
    assert_eq!(release.version, 12);
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let (client, _) = spawn_api().await;

    let err = assert_err!(client.fetch_setup("unknown").await);
    match &err {
        DeployerError::HttpError { status, body } => {
            assert_eq!(*status, StatusCode::NOT_FOUND);
            assert!(body.contains("not_found"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!err.is_transient());

    let err = assert_err!(client.get_last_build("broken").await);
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_bad_token_is_rejected() {
    let (client, _) = spawn_api().await;
    let wrong = PlatformClient::new(client.base_url(), SecretString::from("nope".to_string())).unwrap();

    assert!(matches!(
        wrong.get_apps().await,
        Err(DeployerError::HttpError { status, .. }) if status == StatusCode::UNAUTHORIZED
    ));
}

#[tokio::test]
async fn test_deploy_creates_setup() {
    let (client, api) = spawn_api().await;

    let request = DeployRequest::new("https://netbox-deploy.netlify.com", "v2.6.7")
        .unwrap()
        .with_region("eu");
    let setup_id = assert_ok!(deploy(&client, &request).await);
    assert_eq!(setup_id, "setup-1");

    let requests = api.setup_requests.lock().unwrap();
    assert_eq!(
        requests.as_slice(),
        &[json!({
            "source_blob": {
                "url": "https://netbox-deploy.netlify.com/source_blob?version=v2.6.7",
                "version": "netbox-heroku@v2.6.7",
            },
            "app": {"region": "eu"},
        })]
    );
}

#[tokio::test]
async fn test_list_apps_classifies_rows() {
    let (client, _) = spawn_api().await;

    let apps = list_apps(&client).await.unwrap();
    let row = |id: &str| apps.iter().find(|summary| summary.app.id == id).unwrap();

    assert_eq!(apps.len(), 4);
    assert_eq!(row("managed").version.as_deref(), Some("2.6.7"));
    assert!(row("managed").is_managed());
    assert!(!row("unmanaged").is_managed());
    assert!(row("unmanaged").error.is_none());
    assert!(!row("empty").is_managed());
    assert!(row("broken").error.is_some());
}

#[tokio::test]
async fn test_app_overview() {
    let (client, _) = spawn_api().await;

    let overview = load_app_overview(&client, "managed").await.unwrap();
    assert_eq!(overview.version, "2.6.7");
    assert_eq!(overview.release.version, 12);
    assert!(!overview.login_required());
    assert!(!overview.env.contains_key("UNSET"));
    assert_eq!(overview.domains[0].hostname, "my-netbox.herokuapp.com");

    let err = load_app_overview(&client, "unmanaged").await.unwrap_err();
    assert_eq!(err.to_string(), "Validation error: App not managed by this tool");

    let err = load_app_overview(&client, "empty").await.unwrap_err();
    assert_eq!(err.to_string(), "Validation error: Failed to load all data");
}
