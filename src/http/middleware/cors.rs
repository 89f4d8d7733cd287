//! Cross-origin resource sharing.
//!
//! Echoes the caller's `Origin` back instead of answering with a wildcard, which
//! is what credentialed browser requests require. Requests without an `Origin`
//! are left alone.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::debug;

pub const ALLOW_METHODS: &str = "POST, GET, OPTIONS, PUT, DELETE, UPDATE, PATCH";
pub const ALLOW_HEADERS: &str = "Authorization";
pub const MAX_AGE_SECS: &str = "172800";

/// Body returned to every `OPTIONS` request.
pub const PREFLIGHT_BODY: &str = "Options Request!";

/// Echo the request origin in CORS headers and answer every `OPTIONS` request.
pub async fn cors_middleware(request: Request<Body>, next: Next) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .filter(|origin| !origin.is_empty())
        .cloned();
    let preflight = request.method() == Method::OPTIONS;

    // The chain runs for preflights too; only its response is replaced.
    let downstream = next.run(request).await;

    let mut response = if preflight {
        debug!(downstream_status = %downstream.status(), "Answering preflight request");
        drop(downstream);
        (StatusCode::OK, Json(PREFLIGHT_BODY)).into_response()
    } else {
        downstream
    };

    if let Some(origin) = origin {
        allow_origin(response.headers_mut(), origin);
    }

    response
}

fn allow_origin(headers: &mut HeaderMap, origin: HeaderValue) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(MAX_AGE_SECS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers
        .entry(header::CONTENT_TYPE)
        .or_insert(HeaderValue::from_static("application/json"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware::from_fn, routing::get, Router};
    use tower::ServiceExt;

    const CORS_HEADERS: [header::HeaderName; 5] = [
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        header::ACCESS_CONTROL_ALLOW_METHODS,
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        header::ACCESS_CONTROL_MAX_AGE,
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
    ];

    fn app() -> Router {
        Router::new()
            .route("/items", get(|| async { "items" }))
            .layer(from_fn(cors_middleware))
    }

    async fn body_of(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_origin_is_echoed() {
        let response = app()
            .oneshot(
                Request::get("/items")
                    .header(header::ORIGIN, "https://app.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.example.com");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], ALLOW_METHODS);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "Authorization");
        assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "172800");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(body_of(response).await, "items");
    }

    #[tokio::test]
    async fn test_no_origin_no_headers() {
        for origin in [None, Some("")] {
            let mut builder = Request::get("/items");
            if let Some(origin) = origin {
                builder = builder.header(header::ORIGIN, origin);
            }
            let response = app().oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
            for name in &CORS_HEADERS {
                assert!(!response.headers().contains_key(name), "{name} should be absent");
            }
        }
    }

    #[tokio::test]
    async fn test_options_answers_preflight() {
        for origin in [None, Some("https://app.example.com")] {
            let mut builder = Request::builder().method(Method::OPTIONS).uri("/items");
            if let Some(origin) = origin {
                builder = builder.header(header::ORIGIN, origin);
            }
            let response = app().oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN),
                origin.is_some()
            );
            assert_eq!(body_of(response).await, "\"Options Request!\"");
        }
    }

    #[tokio::test]
    async fn test_preflight_on_unknown_path() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/nowhere")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(response).await, "\"Options Request!\"");
    }
}
