//! Request extractors whose rejections go through `AppError`, so a bad body,
//! path or query string still gets the standard envelope.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};

use crate::errors::AppError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{self, header::CONTENT_TYPE, StatusCode},
        response::IntoResponse,
        routing::{get, post},
        Router,
    };
    use http_body_util::BodyExt;
    use serde::Deserialize;
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::repository::PageQuery;
    use crate::response::ApiResponse;

    #[derive(Deserialize)]
    struct Login {
        username: String,
    }

    #[derive(Deserialize)]
    struct Month {
        month: String,
    }

    fn app() -> Router {
        Router::new()
            .route(
                "/login",
                post(|Json(body): Json<Login>| async move {
                    ApiResponse::ok(body.username).into_response()
                }),
            )
            .route(
                "/roles/:id",
                get(|Path(id): Path<Uuid>| async move { ApiResponse::ok(id).into_response() }),
            )
            .route(
                "/jobs",
                get(|Query(q): Query<PageQuery>| async move {
                    ApiResponse::ok(q.page).into_response()
                }),
            )
            .route(
                "/attendance",
                get(|Query(q): Query<Month>| async move { ApiResponse::ok(q.month).into_response() }),
            )
    }

    async fn expect_validation_envelope(request: http::Request<Body>) {
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).expect("envelope is JSON");
        assert_eq!(body["code"], 400);
        assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
        assert!(body["data"].is_null());
        assert!(body["timestamp"].is_i64());
    }

    fn get_request(uri: &str) -> http::Request<Body> {
        http::Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_malformed_json_gets_envelope() {
        let request = http::Request::builder()
            .method("POST")
            .uri("/login")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        expect_validation_envelope(request).await;
    }

    #[tokio::test]
    async fn test_missing_json_content_type_gets_envelope() {
        let request = http::Request::builder()
            .method("POST")
            .uri("/login")
            .body(Body::from(r#"{"username":"ada"}"#))
            .unwrap();
        expect_validation_envelope(request).await;
    }

    #[tokio::test]
    async fn test_bad_path_id_gets_envelope() {
        expect_validation_envelope(get_request("/roles/not-a-uuid")).await;
    }

    #[tokio::test]
    async fn test_bad_page_and_missing_query_get_envelope() {
        expect_validation_envelope(get_request("/jobs?page=first")).await;
        expect_validation_envelope(get_request("/attendance")).await;
    }

    #[tokio::test]
    async fn test_valid_input_passes_through() {
        let response = app()
            .oneshot(get_request("/jobs?page=2&pageSize=5"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
