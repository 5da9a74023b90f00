//! HTTP router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Encounter creation lives under `/consult/`, everything else under `/api/`.
//!
//! Layers (outermost → innermost): CORS → per-route headers → handler.

use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router.
///
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .expose_headers([CONTENT_TYPE])
}

fn build_router(ctx: ApiContext) -> Router {
    // Reverse proxies must not buffer the event stream.
    let no_proxy_buffering = SetResponseHeaderLayer::overriding(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );

    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/encounters", get(endpoints::encounters::list))
        .route(
            "/templates/first-message",
            get(endpoints::templates::first_message),
        )
        .route(
            "/encounters/:id/messages",
            post(endpoints::encounters::post_message),
        )
        .route("/encounters/:id/end", post(endpoints::encounters::end))
        .route(
            "/encounters/:id/stream",
            get(endpoints::stream::stream).layer(no_proxy_buffering),
        )
        .route(
            "/encounters/:id/clinical-note",
            post(endpoints::clinical_note::generate),
        );

    let consult = Router::new().route("/new", post(endpoints::encounters::create));

    Router::new()
        .nest("/api", api)
        .nest("/consult", consult)
        .with_state(ctx)
        .layer(cors_layer())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db::repository;
    use crate::locale::Locale;
    use crate::models::enums::MessageRole;
    use crate::pipeline::consult::FallbackGenerator;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    /// Core state on a temp database with a zero-delay fallback source.
    /// The tempdir guard must be kept alive for the duration of the test.
    fn test_core_state() -> (Arc<CoreState>, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let config = AppConfig {
            database_path: tmp.path().join("intake.db"),
            locale: Locale::Ja,
            ..AppConfig::default()
        };
        let source = Arc::new(FallbackGenerator::new(Locale::Ja).with_delay(Duration::ZERO));
        let core = Arc::new(CoreState::with_source(config, source));
        core.initialize_storage().unwrap();
        (core, tmp)
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        serde_json::from_str(&body_string(response).await).unwrap()
    }

    async fn create_encounter(app: &Router, chief: Option<&str>) -> String {
        let body = match chief {
            Some(c) => serde_json::json!({ "chief_complaint": c }),
            None => serde_json::json!({}),
        };
        let response = app
            .clone()
            .oneshot(json_request("POST", "/consult/new", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["encounter_id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    async fn post_message(app: &Router, id: &str, role: &str, content: &str) -> Response {
        app.clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/encounters/{id}/messages"),
                serde_json::json!({ "role": role, "content": content }),
            ))
            .await
            .unwrap()
    }

    /// Parse an SSE body into (event, data) pairs, skipping comments.
    fn parse_sse(body: &str) -> Vec<(String, serde_json::Value)> {
        body.split("\n\n")
            .filter_map(|block| {
                let mut name = None;
                let mut data = None;
                for line in block.lines() {
                    if let Some(v) = line.strip_prefix("event:") {
                        name = Some(v.trim().to_string());
                    } else if let Some(v) = line.strip_prefix("data:") {
                        data = Some(serde_json::from_str(v.trim()).unwrap());
                    }
                }
                Some((name?, data?))
            })
            .collect()
    }

    #[tokio::test]
    async fn health_reports_db_and_provider() {
        let (core, _tmp) = test_core_state();
        let app = api_router(core);

        let response = app.oneshot(empty_request("GET", "/api/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "symptom-intake");
        assert_eq!(json["db"], "ok");
        assert_eq!(json["provider"], "fallback");
    }

    #[tokio::test]
    async fn create_with_and_without_body() {
        let (core, _tmp) = test_core_state();
        let app = api_router(core.clone());

        let with_cc = create_encounter(&app, Some("  頭痛  ")).await;
        let response = app
            .clone()
            .oneshot(empty_request("POST", "/consult/new"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let conn = core.open_db().unwrap();
        let enc = repository::get_encounter(&conn, &with_cc.parse().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(enc.chief_complaint.as_deref(), Some("頭痛"));
        assert!(enc.is_active());
    }

    #[tokio::test]
    async fn list_returns_newest_first_in_camel_case() {
        let (core, _tmp) = test_core_state();
        let app = api_router(core);

        let first = create_encounter(&app, Some("first")).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = create_encounter(&app, None).await;

        let response = app
            .clone()
            .oneshot(empty_request("GET", "/api/encounters?limit=abc"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let items = json.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["id"], second);
        assert_eq!(items[1]["id"], first);
        assert_eq!(items[1]["chiefComplaint"], "first");
        assert!(items[0]["triageLevel"].is_null());
        assert_eq!(items[0]["needsAttention"], false);

        let response = app
            .oneshot(empty_request("GET", "/api/encounters?status=closed"))
            .await
            .unwrap();
        assert!(body_json(response).await.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn post_message_validates_before_storage() {
        let (core, _tmp) = test_core_state();
        let app = api_router(core);
        let id = create_encounter(&app, None).await;

        let response = post_message(&app, &id, "assistant", "hi").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = post_message(&app, &id, "user", "   ").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["message"], "content is required");

        let response = post_message(&app, &id, "user", &"あ".repeat(4001)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = post_message(&app, &id, "user", &"あ".repeat(4000)).await;
        assert_eq!(response.status(), StatusCode::OK);

        // Validation wins over the missing encounter.
        let unknown = uuid::Uuid::new_v4().to_string();
        let response = post_message(&app, &unknown, "robot", "hi").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn post_message_with_missing_fields_is_json_400() {
        let (core, _tmp) = test_core_state();
        let app = api_router(core);
        let id = create_encounter(&app, None).await;

        for body in [
            serde_json::json!({ "role": "user" }),
            serde_json::json!({ "role": "user", "content": null }),
            serde_json::json!({ "content": "hi" }),
            serde_json::json!({}),
        ] {
            let response = app
                .clone()
                .oneshot(json_request(
                    "POST",
                    &format!("/api/encounters/{id}/messages"),
                    body.clone(),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
            assert_eq!(body_json(response).await["error"]["code"], "BAD_REQUEST");
        }
    }

    #[tokio::test]
    async fn padded_id_is_accepted_on_every_route() {
        let (core, _tmp) = test_core_state();
        let app = api_router(core);
        let id = create_encounter(&app, None).await;
        let padded = format!("%20{id}%20");

        let response = post_message(&app, &padded, "user", "hi").await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(empty_request("POST", &format!("/api/encounters/{padded}/end")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn post_message_to_missing_or_closed_encounter() {
        let (core, _tmp) = test_core_state();
        let app = api_router(core);

        let unknown = uuid::Uuid::new_v4().to_string();
        let response = post_message(&app, &unknown, "user", "hi").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await["error"]["message"],
            format!("encounter {unknown} not found")
        );

        let id = create_encounter(&app, None).await;
        let response = app
            .clone()
            .oneshot(empty_request("POST", &format!("/api/encounters/{id}/end")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = post_message(&app, &id, "user", "hi").await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn post_message_stores_trimmed_content() {
        let (core, _tmp) = test_core_state();
        let app = api_router(core.clone());
        let id = create_encounter(&app, None).await;

        let response = post_message(&app, &id, "system", "  patient is 72  ").await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "queued");

        let conn = core.open_db().unwrap();
        let messages =
            repository::get_messages_by_encounter(&conn, &id.parse().unwrap()).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id.to_string(), json["message_id"].as_str().unwrap());
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[0].content, "patient is 72");
    }

    #[tokio::test]
    async fn end_is_idempotent_and_keeps_first_end_time() {
        let (core, _tmp) = test_core_state();
        let app = api_router(core.clone());
        let id = create_encounter(&app, None).await;
        let uri = format!("/api/encounters/{id}/end");

        let response = app.clone().oneshot(empty_request("POST", &uri)).await.unwrap();
        assert_eq!(body_json(response).await["status"], "closed");
        let conn = core.open_db().unwrap();
        let first_end = repository::get_encounter(&conn, &id.parse().unwrap())
            .unwrap()
            .unwrap()
            .ended_at;
        assert!(first_end.is_some());

        let response = app.clone().oneshot(empty_request("POST", &uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let second_end = repository::get_encounter(&conn, &id.parse().unwrap())
            .unwrap()
            .unwrap()
            .ended_at;
        assert_eq!(first_end, second_end);

        let response = app
            .clone()
            .oneshot(empty_request("POST", "/api/encounters/not-a-uuid/end"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let unknown = uuid::Uuid::new_v4();
        let response = app
            .oneshot(empty_request("POST", &format!("/api/encounters/{unknown}/end")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await["error"]["message"],
            format!("encounter {unknown} not found")
        );
    }

    #[tokio::test]
    async fn first_message_template_is_localized() {
        let (core, _tmp) = test_core_state();
        let app = api_router(core);

        let response = app
            .oneshot(empty_request("GET", "/api/templates/first-message"))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["content"], "本日はどうなさいましたか？");
        assert_eq!(json["locale"], "ja-JP");
    }

    #[tokio::test]
    async fn stream_emits_tokens_then_done_and_persists() {
        let (core, _tmp) = test_core_state();
        let app = api_router(core.clone());
        let id = create_encounter(&app, None).await;
        post_message(&app, &id, "user", "chest pain for 2 hours").await;

        let response = app
            .clone()
            .oneshot(empty_request("GET", &format!("/api/encounters/{id}/stream")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-accel-buffering"], "no");
        assert_eq!(response.headers()["cache-control"], "no-cache");
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        let events = parse_sse(&body_string(response).await);
        let (last_name, last_data) = events.last().unwrap();
        assert_eq!(last_name, "done");

        let text: String = events
            .iter()
            .filter(|(name, _)| name == "token")
            .map(|(_, data)| data["delta"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(text, Locale::Ja.fallback_follow_up());

        let conn = core.open_db().unwrap();
        let messages =
            repository::get_messages_by_encounter(&conn, &id.parse().unwrap()).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(
            messages[1].id.to_string(),
            last_data["messageId"].as_str().unwrap()
        );
    }

    #[tokio::test]
    async fn stream_for_missing_encounter_is_single_error_event() {
        let (core, _tmp) = test_core_state();
        let app = api_router(core);

        let response = app
            .oneshot(empty_request("GET", "/api/encounters/unknown/stream"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let events = parse_sse(&body_string(response).await);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "error");
        assert_eq!(events[0].1["message"], "encounter unknown not found");
    }

    #[tokio::test]
    async fn clinical_note_uses_template_without_provider() {
        let (core, _tmp) = test_core_state();
        let app = api_router(core);
        let id = create_encounter(&app, None).await;
        post_message(&app, &id, "user", "昨日から咳が出る").await;

        let response = app
            .clone()
            .oneshot(empty_request(
                "POST",
                &format!("/api/encounters/{id}/clinical-note"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["chief_complaint"], "昨日から咳が出る");
        assert!(json["note_md"].as_str().unwrap().contains("# 内科カルテ"));
        assert!(json["created_at"].is_string());

        let unknown = uuid::Uuid::new_v4();
        let response = app
            .oneshot(empty_request(
                "POST",
                &format!("/api/encounters/{unknown}/clinical-note"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cors_preflight_allows_any_origin() {
        let (core, _tmp) = test_core_state();
        let app = api_router(core);

        let request = Request::builder()
            .method("OPTIONS")
            .uri("/consult/new")
            .header("Origin", "http://localhost:3000")
            .header("Access-Control-Request-Method", "POST")
            .header("Access-Control-Request-Headers", "content-type")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        let methods = response.headers()["access-control-allow-methods"]
            .to_str()
            .unwrap();
        assert!(methods.contains("POST"));
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (core, _tmp) = test_core_state();
        let app = api_router(core);
        let response = app.oneshot(empty_request("GET", "/api/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
