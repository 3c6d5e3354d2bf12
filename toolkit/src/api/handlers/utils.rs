use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Response,
};

use crate::AppState;
use crate::api::models::utils::{
    EchoRequest, MAX_RANDOM_LENGTH, PushResponse, RandomQuery, RandomResponse, SlugRequest, SlugResponse,
};
use crate::errors::Result;
use crate::json::{JsonResponse, StrictJson};

pub async fn create_slug(State(state): State<AppState>, StrictJson(request): StrictJson<SlugRequest>) -> Result<Response> {
    let slug = state.toolkit.slugify(&request.text)?;
    state
        .toolkit
        .write_json(StatusCode::OK, &JsonResponse::ok("slug created", SlugResponse { slug }), None)
}

/// Random identifier; lengths above the cap are clamped.
pub async fn random_string(State(state): State<AppState>, Query(query): Query<RandomQuery>) -> Result<Response> {
    let value = state.toolkit.random_string(query.length.min(MAX_RANDOM_LENGTH));
    state
        .toolkit
        .write_json(StatusCode::OK, &JsonResponse::ok("random string", RandomResponse { value }), None)
}

pub async fn echo(State(state): State<AppState>, StrictJson(request): StrictJson<EchoRequest>) -> Result<Response> {
    state.toolkit.write_json(StatusCode::OK, &JsonResponse::ok("echo", request), None)
}

/// Forward the body to the configured push URL and answer with the remote status.
pub async fn push(State(state): State<AppState>, StrictJson(payload): StrictJson<serde_json::Value>) -> Result<Response> {
    let Some(url) = state.config.push_url.as_ref() else {
        return state
            .toolkit
            .error_json(&"no push URL configured", Some(StatusCode::SERVICE_UNAVAILABLE));
    };

    let (_, status) = state
        .toolkit
        .push_json_to_remote(url.as_str(), &payload, Some(&state.http))
        .await?;

    tracing::info!(url = %url, status = %status, "Pushed JSON to remote");

    // Remote status is passed through
    state.toolkit.write_json(
        status,
        &JsonResponse::ok("pushed", PushResponse { status: status.as_u16() }),
        None,
    )
}
