//! HTTP trigger: accepts release notifications and returns a plain-text
//! acknowledgement once the report is stored.
use axum::{
    Json, Router,
    body::Bytes,
    extract::{RawQuery, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use hmac::{Hmac, Mac};
use log::*;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::{
    Result,
    error::ReleaseNotesError,
    handler::{ACKNOWLEDGEMENT, Connector, ReleaseNotesHandler},
};

/// Function-style route the release pipeline posts to.
pub const WEBHOOK_ROUTE: &str = "/api/ReleaseNotesWebHook";
/// Header carrying the function key.
pub const FUNCTION_KEY_HEADER: &str = "x-functions-key";
/// Query parameter carrying the function key.
pub const FUNCTION_KEY_PARAM: &str = "code";

const KEY_CHECK_CONTEXT: &[u8] = b"release-notes-hook function key";

type HmacSha256 = Hmac<Sha256>;

type SharedHandler<C> = Arc<ReleaseNotesHandler<C>>;

/// Router serving the webhook on its function route and on `/`.
pub fn create_router<C: Connector + 'static>(
    handler: SharedHandler<C>,
) -> Router {
    Router::new()
        .route(
            WEBHOOK_ROUTE,
            get(release_notes::<C>).post(release_notes::<C>),
        )
        .route("/", get(release_notes::<C>).post(release_notes::<C>))
        .route("/health", get(health))
        .with_state(handler)
}

/// Bind `address` and serve until interrupted.
pub async fn serve<C: Connector + 'static>(
    address: &str,
    handler: ReleaseNotesHandler<C>,
) -> Result<()> {
    let listener = TcpListener::bind(address).await?;

    info!(
        "listening for release notifications on http://{}{WEBHOOK_ROUTE}",
        listener.local_addr()?
    );

    axum::serve(listener, create_router(Arc::new(handler)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
    }
    info!("shutting down");
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn release_notes<C: Connector + 'static>(
    State(handler): State<SharedHandler<C>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    if let Some(expected) = &handler.config().function_key
        && !is_authorized(expected, &headers, query.as_deref())
    {
        warn!("rejected release notification: missing or wrong function key");
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }

    match handler.handle_body(&body).await {
        Ok(outcome) => {
            debug!("handled notification for {}", outcome.document.name);
            (StatusCode::OK, ACKNOWLEDGEMENT).into_response()
        }
        Err(err) => error_response(err),
    }
}

/// Key from the `x-functions-key` header, else from the `code` query
/// parameter.
fn presented_key(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    if let Some(value) = headers
        .get(FUNCTION_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        return Some(value.to_string());
    }

    query.and_then(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .find(|(name, _)| name == FUNCTION_KEY_PARAM)
            .map(|(_, value)| value.into_owned())
    })
}

fn is_authorized(
    expected: &SecretString,
    headers: &HeaderMap,
    query: Option<&str>,
) -> bool {
    match presented_key(headers, query) {
        Some(key) => {
            keys_match(expected.expose_secret().as_bytes(), key.as_bytes())
        }
        None => false,
    }
}

/// Both keys are MACed under the same context key and the tags compared
/// with `verify_slice`, which runs in constant time.
fn keys_match(expected: &[u8], presented: &[u8]) -> bool {
    let tag = |key: &[u8]| -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(KEY_CHECK_CONTEXT).ok()?;
        mac.update(key);
        Some(mac)
    };

    let (Some(expected), Some(presented)) = (tag(expected), tag(presented))
    else {
        return false;
    };

    presented
        .verify_slice(&expected.finalize().into_bytes())
        .is_ok()
}

/// Payload errors are the caller's fault; everything else is reported as an
/// internal failure with the error text as body.
fn error_response(err: ReleaseNotesError) -> Response {
    let status = if err.is_client_error() {
        warn!("rejected release notification: {err}");
        StatusCode::BAD_REQUEST
    } else {
        error!("release notes generation failed: {err}");
        StatusCode::INTERNAL_SERVER_ERROR
    };

    (status, err.to_string()).into_response()
}
