//! Liveness endpoint.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use notiteams_registry::Registry;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct Health {
    pub ok: bool,
}

/// `GET /healthz`: 200 when the registry answers a trivial read, 503
/// otherwise.
pub async fn healthz(State(registry): State<Arc<dyn Registry>>) -> (StatusCode, Json<Health>) {
    let ok = registry.health_check().await;
    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(Health { ok }))
}

#[cfg(test)]
mod tests {
    use crate::router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use notiteams_registry::{InMemoryRegistry, Registry};
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn get_healthz(registry: Arc<InMemoryRegistry>) -> (StatusCode, Value) {
        let response = router(registry)
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn healthy_registry() {
        let (status, body) = get_healthz(Arc::new(InMemoryRegistry::new())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn unreachable_registry() {
        let registry = Arc::new(InMemoryRegistry::new());
        registry.shutdown().await;

        let (status, body) = get_healthz(registry).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, serde_json::json!({"ok": false}));
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let response = router(Arc::new(InMemoryRegistry::new()))
            .oneshot(Request::get("/api/messages").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
