//! HTTP request handlers

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use server_models::{ErrorResponse, HealthResponse, VersionResponse};
use tracing::{error, info};

use crate::archive::source::rewrite_source_blob;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Content type of the rewritten tarball
pub const GZIP_CONTENT_TYPE: &str = "application/x-gzip";

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "netbox-deploy".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, message.to_string()).into_response()
}

/// Serves the template tarball with `build.config.VERSION` set to the
/// `version` query parameter.
///
/// The archive is fully rewritten before the response starts, so a failure
/// anywhere in the pipeline becomes a 500 and never a truncated 200.
pub async fn source_blob_handler(
    State(state): State<Arc<ServerState>>,
    method: Method,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if method != Method::GET {
        return bad_request("Invalid request");
    }

    let Some(version) = params.get("version").filter(|version| !version.is_empty()) else {
        return bad_request("Missing request params");
    };

    info!("Building source blob for version {}", version);
    match rewrite_source_blob(&state.http_client, &state.template_url, version).await {
        Ok(body) => ([(header::CONTENT_TYPE, GZIP_CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!("Failed to build source blob for {}: {}", version, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "source_blob_failed".to_string(),
                    message: e.to_string(),
                    details: None,
                }),
            )
                .into_response()
        }
    }
}
