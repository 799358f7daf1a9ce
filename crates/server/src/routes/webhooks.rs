//! Sanity webhook receiver. This is the only automatic trigger for featured
//! limit enforcement: the document is mirrored into the configured store,
//! accepted events are handed to the background worker and the CMS gets an
//! immediate 202.

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json as ResponseJson,
    routing::post,
};
use serde::{Deserialize, Serialize};
use services::services::{
    document_store::DocumentSnapshot, featured_events::FeaturedEvent, sanity::parse_published_at,
};
use tracing::{debug, warn};
use ts_rs::TS;
use utils::{
    response::ApiResponse,
    webhook_signature::{self, SIGNATURE_HEADER},
};

use crate::{error::ApiError, state::AppState};

const DRAFT_PREFIX: &str = "drafts.";

/// Projection configured on the Sanity webhook:
/// `{_id, _type, title, publishedAt, isFeatured}`. Unset fields arrive as null.
#[derive(Debug, Clone, Deserialize)]
pub struct FeaturedWebhookPayload {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_type")]
    pub collection: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "publishedAt", default)]
    pub published_at: Option<String>,
    #[serde(rename = "isFeatured", default)]
    pub is_featured: Option<bool>,
}

impl FeaturedWebhookPayload {
    pub fn snapshot(&self) -> DocumentSnapshot {
        let published_at = self.published_at.as_deref().and_then(|raw| {
            let parsed = parse_published_at(raw);
            if parsed.is_none() {
                warn!(
                    document_id = %self.id,
                    published_at = %raw,
                    "Unparseable publishedAt, treating as unset"
                );
            }
            parsed
        });
        DocumentSnapshot {
            id: self.id.clone(),
            collection: self.collection.clone(),
            title: self.title.clone(),
            published_at,
            is_featured: self.is_featured.unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct WebhookAck {
    pub queued: bool,
}

pub async fn sanity_featured_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, ResponseJson<ApiResponse<WebhookAck>>), ApiError> {
    if let Some(secret) = &state.webhook_secret {
        let header = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok());
        webhook_signature::verify(secret, header, &body, state.signature_tolerance_ms)?;
    }

    let payload: FeaturedWebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid webhook payload: {}", e)))?;

    if payload.id.starts_with(DRAFT_PREFIX) {
        debug!(document_id = %payload.id, "Webhook for draft document ignored");
        return Ok(accepted(false));
    }

    let snapshot = payload.snapshot();
    // The event is still queued; enforcement re-reads whatever the store has
    if let Err(e) = state.store().sync_document(&snapshot).await {
        warn!(
            collection = %snapshot.collection,
            document_id = %snapshot.id,
            error = %e,
            "Could not mirror webhook document"
        );
    }

    let queued = if !snapshot.is_featured {
        debug!(document_id = %snapshot.id, "Webhook for unfeatured document ignored");
        false
    } else {
        match state
            .events
            .try_enqueue(FeaturedEvent::new(&snapshot.collection, &snapshot.id))
        {
            Ok(()) => true,
            // Enforcement is eventual; the next featured event will catch up
            Err(e) => {
                warn!(
                    collection = %snapshot.collection,
                    document_id = %snapshot.id,
                    error = %e,
                    "Could not queue featured event"
                );
                false
            }
        }
    };

    Ok(accepted(queued))
}

fn accepted(queued: bool) -> (StatusCode, ResponseJson<ApiResponse<WebhookAck>>) {
    (
        StatusCode::ACCEPTED,
        ResponseJson(ApiResponse::success(WebhookAck { queued })),
    )
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/webhooks/sanity/featured", post(sanity_featured_webhook))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::{Body, to_bytes},
        http::Request,
    };
    use chrono::{TimeZone, Utc};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::{routes, test_support::TestApp};

    const SECRET: &str = "webhook-secret";

    async fn post_webhook(app: &TestApp, body: &str, signature: Option<String>) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method("POST")
            .uri("/api/webhooks/sanity/featured")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            request = request.header(SIGNATURE_HEADER, signature);
        }
        let response = routes::router(app.state.clone())
            .oneshot(request.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn signed(body: &str) -> Option<String> {
        Some(webhook_signature::sign(SECRET, Utc::now().timestamp_millis(), body.as_bytes()).unwrap())
    }

    async fn wait_for<F: Fn() -> bool>(check: F) -> bool {
        for _ in 0..100 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_featured_webhook_triggers_demotion() {
        let app = TestApp::with_match_week().with_secret(SECRET);
        let body = r#"{"_id":"E","_type":"news","title":"Derby day","publishedAt":"2024-05-01T00:00:00Z","isFeatured":true}"#;

        let (status, json) = post_webhook(&app, body, signed(body)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json["data"]["queued"], true);

        let store = app.store.clone();
        assert!(wait_for(|| !store.get("jan").unwrap().is_featured).await);
        assert!(store.get("E").unwrap().is_featured);
    }

    #[tokio::test]
    async fn test_bad_signature_rejected() {
        let app = TestApp::with_match_week().with_secret(SECRET);
        let body = r#"{"_id":"E","_type":"news","isFeatured":true}"#;

        let (status, _) = post_webhook(&app, body, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let forged = webhook_signature::sign("wrong", Utc::now().timestamp_millis(), body.as_bytes()).ok();
        let (status, json) = post_webhook(&app, body, forged).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_drafts_and_unfeatured_not_queued() {
        let app = TestApp::with_match_week();

        let (status, json) =
            post_webhook(&app, r#"{"_id":"drafts.E","_type":"news","isFeatured":true}"#, None).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json["data"]["queued"], false);
        assert!(app.store.get("drafts.E").is_none());

        let (_, json) =
            post_webhook(&app, r#"{"_id":"E","_type":"news","isFeatured":false}"#, None).await;
        assert_eq!(json["data"]["queued"], false);

        let (_, json) = post_webhook(&app, r#"{"_id":"E","_type":"news"}"#, None).await;
        assert_eq!(json["data"]["queued"], false);
    }

    #[tokio::test]
    async fn test_new_document_is_mirrored_and_enforced() {
        let app = TestApp::with_match_week();
        let body = r#"{"_id":"cup-final","_type":"news","title":"Cup final","publishedAt":"2024-06-01","isFeatured":true}"#;

        let (status, json) = post_webhook(&app, body, None).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json["data"]["queued"], true);

        let mirrored = app.store.get("cup-final").unwrap();
        assert!(mirrored.is_featured);
        assert_eq!(
            mirrored.published_at,
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
        );

        let store = app.store.clone();
        assert!(wait_for(|| !store.get("jan").unwrap().is_featured).await);
        assert!(store.get("cup-final").unwrap().is_featured);
    }

    #[tokio::test]
    async fn test_null_featured_flag_is_accepted() {
        let app = TestApp::with_match_week();
        let body = r#"{"_id":"new-doc","_type":"news","title":null,"publishedAt":null,"isFeatured":null}"#;

        let (status, json) = post_webhook(&app, body, None).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json["data"]["queued"], false);

        let mirrored = app.store.get("new-doc").unwrap();
        assert!(!mirrored.is_featured);
        assert!(mirrored.published_at.is_none());
        assert_eq!(app.store.featured_ids("news").len(), 5);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_bad_request() {
        let app = TestApp::with_match_week();
        let (status, _) = post_webhook(&app, r#"{"title":"no id"}"#, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
