//! Consent banner routes — what the page shell renders and the buttons it wires up.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use ccg_consent::{BannerView, Category, ConsentCategories};
use ccg_core::Error;
use tracing::debug;

use crate::state::AppState;

// ---------------------------------------------------------------
// Route builder
// ---------------------------------------------------------------

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        // Read API
        .route("/consent", get(banner_view))
        .route("/consent/decision", get(current_decision))
        .route("/consent/allowed/{category}", get(category_allowed))
        // Banner actions
        .route("/consent/accept-all", post(accept_all))
        .route("/consent/reject", post(reject_non_essential))
        // Settings panel
        .route("/consent/settings/open", post(open_settings))
        .route("/consent/settings/back", post(back))
        .route("/consent/settings/toggle", post(toggle))
        .route("/consent/settings/save", post(save_settings))
}

// ---------------------------------------------------------------
// Request/Response types
// ---------------------------------------------------------------

#[derive(serde::Deserialize)]
struct ToggleBody {
    /// Parsed like the `allowed/{category}` path segment, case-insensitively.
    category: String,
    enabled: bool,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<serde_json::Value>)>;

fn error_response(e: Error) -> (StatusCode, Json<serde_json::Value>) {
    let status = match &e {
        Error::InvalidTransition { .. } => StatusCode::CONFLICT,
        Error::LockedCategory(_) | Error::UnknownCategory(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    debug!("Consent request rejected: {}", e);
    (status, Json(serde_json::json!({ "error": e.to_string() })))
}

// ---------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------

async fn banner_view(State(state): State<Arc<AppState>>) -> Json<BannerView> {
    Json(state.consent.view())
}

async fn current_decision(State(state): State<Arc<AppState>>) -> Json<ConsentCategories> {
    Json(state.consent.current_decision())
}

async fn category_allowed(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
) -> ApiResult<serde_json::Value> {
    let category: Category = category.parse().map_err(error_response)?;
    Ok(Json(serde_json::json!({
        "category": category,
        "allowed": state.consent.is_category_allowed(category),
    })))
}

async fn accept_all(State(state): State<Arc<AppState>>) -> Json<BannerView> {
    state.consent.accept_all();
    Json(state.consent.view())
}

async fn reject_non_essential(State(state): State<Arc<AppState>>) -> Json<BannerView> {
    state.consent.reject_non_essential();
    Json(state.consent.view())
}

async fn open_settings(State(state): State<Arc<AppState>>) -> Json<BannerView> {
    state.consent.open_settings();
    Json(state.consent.view())
}

async fn back(State(state): State<Arc<AppState>>) -> ApiResult<BannerView> {
    state.consent.back().map_err(error_response)?;
    Ok(Json(state.consent.view()))
}

async fn toggle(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ToggleBody>,
) -> ApiResult<BannerView> {
    let category: Category = body.category.parse().map_err(error_response)?;
    state
        .consent
        .toggle(category, body.enabled)
        .map_err(error_response)?;
    Ok(Json(state.consent.view()))
}

async fn save_settings(State(state): State<Arc<AppState>>) -> ApiResult<BannerView> {
    state.consent.save_settings().map_err(error_response)?;
    Ok(Json(state.consent.view()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::build_router;
    use axum::body::Body;
    use axum::http::Request;
    use ccg_core::ConsentConfig;
    use ccg_store::{KeyValueStore, MemoryStore};
    use tower::ServiceExt;

    fn test_app(store: &MemoryStore) -> (Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = ConsentConfig::from_lookup(dir.path(), |_| None).unwrap();
        let state = Arc::new(AppState::new(config, Arc::new(store.clone())));
        (build_router(state), dir)
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_first_visit_accept_all() {
        let store = MemoryStore::new();
        let (app, _dir) = test_app(&store);

        let (status, view) = call(&app, "GET", "/api/consent", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["state"], "prompt");
        assert_eq!(view["visible"], true);
        assert_eq!(view["categories"].as_array().unwrap().len(), 3);
        assert_eq!(view["categories"][0]["label"], "Strictly Necessary");

        let (status, view) = call(&app, "POST", "/api/consent/accept-all", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["state"], "hidden");
        assert_eq!(view["visible"], false);

        let (_, decision) = call(&app, "GET", "/api/consent/decision", None).await;
        assert_eq!(
            decision,
            serde_json::json!({ "necessary": true, "analytics": true, "marketing": true })
        );
        assert!(store.get("ccg_cookie_consent").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_settings_flow() {
        let store = MemoryStore::new();
        let (app, _dir) = test_app(&store);

        let (_, view) = call(&app, "POST", "/api/consent/settings/open", None).await;
        assert_eq!(view["state"], "settings");

        let (status, view) = call(
            &app,
            "POST",
            "/api/consent/settings/toggle",
            Some(serde_json::json!({ "category": "analytics", "enabled": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["categories"][1]["enabled"], true);
        assert_eq!(view["decision"]["analytics"], false);

        let (status, _) = call(
            &app,
            "POST",
            "/api/consent/settings/toggle",
            Some(serde_json::json!({ "category": "necessary", "enabled": false })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, view) = call(
            &app,
            "POST",
            "/api/consent/settings/toggle",
            Some(serde_json::json!({ "category": "Marketing", "enabled": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["categories"][2]["enabled"], true);

        let (_, view) = call(&app, "POST", "/api/consent/settings/save", None).await;
        assert_eq!(view["state"], "hidden");

        let (_, allowed) = call(&app, "GET", "/api/consent/allowed/analytics", None).await;
        assert_eq!(allowed, serde_json::json!({ "category": "analytics", "allowed": true }));
        let (_, allowed) = call(&app, "GET", "/api/consent/allowed/Marketing", None).await;
        assert_eq!(allowed["allowed"], true);
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let (app, _dir) = test_app(&MemoryStore::new());

        let (status, body) = call(&app, "POST", "/api/consent/settings/save", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("prompt"));

        let (status, _) = call(&app, "POST", "/api/consent/settings/back", None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        call(&app, "POST", "/api/consent/settings/open", None).await;
        let (status, body) = call(
            &app,
            "POST",
            "/api/consent/settings/toggle",
            Some(serde_json::json!({ "category": "preferences", "enabled": true })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("preferences"));

        let (status, body) = call(&app, "GET", "/api/consent/allowed/preferences", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_stored_consent_hides_banner() {
        let store = MemoryStore::new();
        store
            .set(
                "ccg_cookie_consent",
                r#"{"version":"1.0","date":"2025-06-01T08:00:00.000Z","choices":{"necessary":true,"analytics":false,"marketing":true}}"#,
            )
            .unwrap();
        let (app, _dir) = test_app(&store);

        let (_, view) = call(&app, "GET", "/api/consent", None).await;
        assert_eq!(view["state"], "hidden");
        assert_eq!(view["consentedAt"], "2025-06-01T08:00:00.000Z");

        let (_, health) = call(&app, "GET", "/api/health", None).await;
        assert_eq!(health["status"], "ok");
        assert_eq!(health["storage"], "memory");
    }
}
