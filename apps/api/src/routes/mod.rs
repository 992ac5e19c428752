pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS},
        HeaderValue, Uri,
    },
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::accounts::handlers as accounts;
use crate::attendance::handlers as attendance;
use crate::auth::middleware::{require_admin, require_auth};
use crate::errors::AppError;
use crate::jobs::handlers as jobs;
use crate::middleware::{audit::audit, context::request_context, rate_limit::rate_limit};
use crate::notices::handlers as notices;
use crate::resumes::handlers as resumes;
use crate::roles::handlers as roles;
use crate::salary::handlers as salary;
use crate::state::AppState;
use crate::training::handlers as training;
use crate::uploads::handlers as uploads;

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}

/// Routes reachable without a token.
fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/health", get(health::health_handler))
        .route("/api/v1/auth/register", post(accounts::handle_register))
        .route("/api/v1/auth/login", post(accounts::handle_login))
        .route("/api/v1/jobs", get(jobs::handle_list_open_jobs))
        .route("/api/v1/jobs/:id", get(jobs::handle_get_job))
        .route("/api/v1/trainings", get(training::handle_list_courses))
        .route("/api/v1/trainings/:id", get(training::handle_get_course))
}

/// Routes for any signed-in account; handlers act on the caller's own data.
fn account_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/accounts/me",
            get(accounts::handle_get_me).put(accounts::handle_update_me),
        )
        .route(
            "/api/v1/accounts/me/password",
            put(accounts::handle_change_password),
        )
        .route("/api/v1/jobs/:id/apply", post(jobs::handle_apply))
        .route("/api/v1/applications/me", get(jobs::handle_my_applications))
        .route("/api/v1/attendance", get(attendance::handle_my_attendance))
        .route("/api/v1/attendance/clock-in", post(attendance::handle_clock_in))
        .route(
            "/api/v1/attendance/clock-out",
            post(attendance::handle_clock_out),
        )
        .route("/api/v1/salaries", get(salary::handle_salary_details))
        .route("/api/v1/salaries/history", get(salary::handle_salary_history))
        .route("/api/v1/notices", get(notices::handle_my_notices))
        .route("/api/v1/notices/:id", get(notices::handle_get_notice))
        .route("/api/v1/notices/:id/read", post(notices::handle_mark_read))
        .route(
            "/api/v1/trainings/:id/register",
            post(training::handle_register),
        )
        .route(
            "/api/v1/training-records/me",
            get(training::handle_my_records),
        )
        .route(
            "/api/v1/training-records/:id/cancel",
            post(training::handle_cancel),
        )
        .route(
            "/api/v1/resumes/me",
            get(resumes::handle_get_my_resume)
                .put(resumes::handle_submit_resume)
                .delete(resumes::handle_delete_my_resume),
        )
        .route(
            "/api/v1/uploads",
            post(uploads::handle_upload)
                .layer(DefaultBodyLimit::max(uploads::MAX_UPLOAD_BYTES)),
        )
        .route("/api/v1/uploads/:filename", get(uploads::handle_download))
}

/// Routes that additionally require the admin role.
fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/admin/accounts", get(accounts::handle_list_accounts))
        .route(
            "/api/v1/admin/accounts/:id",
            get(accounts::handle_get_account)
                .put(accounts::handle_update_account)
                .delete(accounts::handle_delete_account),
        )
        .route(
            "/api/v1/admin/accounts/:id/roles",
            put(accounts::handle_assign_roles),
        )
        .route(
            "/api/v1/admin/roles",
            get(roles::handle_list_roles).post(roles::handle_create_role),
        )
        .route("/api/v1/admin/roles/:id", get(roles::handle_get_role))
        .route(
            "/api/v1/admin/roles/:id/permissions",
            post(roles::handle_grant_permissions),
        )
        .route(
            "/api/v1/admin/permissions",
            get(roles::handle_list_permissions).post(roles::handle_create_permission),
        )
        .route(
            "/api/v1/admin/jobs",
            get(jobs::handle_list_jobs).post(jobs::handle_create_job),
        )
        .route(
            "/api/v1/admin/jobs/:id",
            put(jobs::handle_update_job).delete(jobs::handle_delete_job),
        )
        .route(
            "/api/v1/admin/jobs/:id/applications",
            get(jobs::handle_job_applications),
        )
        .route(
            "/api/v1/admin/applications/:id/status",
            put(jobs::handle_update_application),
        )
        .route("/api/v1/admin/attendance", get(attendance::handle_all_attendance))
        .route(
            "/api/v1/admin/attendance/stats",
            get(attendance::handle_attendance_stats),
        )
        .route("/api/v1/admin/salaries", get(salary::handle_list_salaries))
        .route(
            "/api/v1/admin/salaries/generate",
            post(salary::handle_generate_salary),
        )
        .route(
            "/api/v1/admin/notices",
            get(notices::handle_active_notices).post(notices::handle_create_notice),
        )
        .route(
            "/api/v1/admin/notices/:id",
            put(notices::handle_update_notice).delete(notices::handle_delete_notice),
        )
        .route("/api/v1/admin/trainings", post(training::handle_create_course))
        .route(
            "/api/v1/admin/training-records/:id",
            put(training::handle_update_record),
        )
        .route("/api/v1/admin/resumes", get(resumes::handle_list_resumes))
        .route(
            "/api/v1/admin/resumes/:account_id",
            get(resumes::handle_get_resume),
        )
}

/// Per request: context, then authentication, then the admin check, then the
/// rate limit, then the handler. The audit layer wraps everything so it also
/// sees timeouts and rejections.
pub fn build_router(state: AppState) -> Router {
    let limiter = state.rate_limiter.clone();
    let timeout = state.config.request_timeout;

    let public = public_routes()
        .route_layer(from_fn_with_state(limiter.clone(), rate_limit));

    let account = account_routes()
        .route_layer(from_fn_with_state(limiter.clone(), rate_limit))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let admin = admin_routes()
        .route_layer(from_fn_with_state(limiter, rate_limit))
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public)
        .merge(account)
        .merge(admin)
        .fallback(not_found)
        .layer(SetResponseHeaderLayer::if_not_present(
            X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(from_fn_with_state(timeout, request_context))
        .layer(from_fn(audit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{self, header::AUTHORIZATION, StatusCode},
        response::Response,
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::cache::memory::MemoryStore;
    use crate::middleware::context::REQUEST_ID_HEADER;
    use crate::state::test_support::{lazy_state, test_config};

    fn app() -> (Router, AppState) {
        let state = lazy_state(Arc::new(MemoryStore::new()), test_config());
        (build_router(state.clone()), state)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn request(uri: &str, token: Option<&str>) -> http::Request<Body> {
        let mut builder = http::Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let (app, _) = app();
        let response = app.oneshot(request("/api/v1/accounts/me", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        let body = body_json(response).await;
        assert_eq!(body["code"], 401);
        assert!(body["request_id"].is_string());
    }

    #[tokio::test]
    async fn test_garbage_token_is_rejected() {
        let (app, _) = app();
        let response = app
            .oneshot(request("/api/v1/accounts/me", Some("not-a-token")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_route_forbids_non_admin() {
        let (app, state) = app();
        let token = state
            .tokens
            .issue(Uuid::new_v4(), vec!["employee".to_string()])
            .unwrap();

        let response = app
            .oneshot(request("/api/v1/admin/accounts", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body["message"], "administrator role required");
    }

    #[tokio::test]
    async fn test_unknown_route_gets_json_404_with_security_headers() {
        let (app, _) = app();
        let response = app.oneshot(request("/api/v1/nope", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(response.headers()[X_FRAME_OPTIONS], "DENY");
        let body = body_json(response).await;
        assert_eq!(body["code"], 404);
        assert!(body["request_id"].is_string());
    }

    #[tokio::test]
    async fn test_health_reports_degraded_without_database() {
        let (app, _) = app();
        let response = app.oneshot(request("/api/v1/health", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["message"], "degraded");
        assert_eq!(body["data"]["database"], "unavailable");
        assert_eq!(body["data"]["cache"], "available");
    }

    #[tokio::test]
    async fn test_rate_limit_applies_before_handler() {
        let mut config = test_config();
        config.rate_limit.max_requests = 2;
        let state = lazy_state(Arc::new(MemoryStore::new()), config);
        let app = build_router(state.clone());
        let token = state.tokens.issue(Uuid::new_v4(), vec![]).unwrap();

        // The lazy pool fails these in the handler; the limiter still counts them.
        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(request("/api/v1/training-records/me", Some(&token)))
                .await
                .unwrap();
            assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        }
        let response = app
            .oneshot(request("/api/v1/training-records/me", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(http::header::RETRY_AFTER));
    }

    async fn assert_validation_envelope(app: Router, request: http::Request<Body>) {
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        let body = body_json(response).await;
        assert_eq!(body["code"], 400);
        assert!(body["message"].is_string());
        assert!(body["request_id"].is_string());
    }

    #[tokio::test]
    async fn test_malformed_register_body_gets_envelope() {
        let (app, _) = app();
        let request = http::Request::builder()
            .method("POST")
            .uri("/api/v1/auth/register")
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        assert_validation_envelope(app, request).await;
    }

    #[tokio::test]
    async fn test_non_uuid_path_gets_envelope() {
        let (app, state) = app();
        let token = state
            .tokens
            .issue(Uuid::new_v4(), vec!["admin".to_string()])
            .unwrap();
        assert_validation_envelope(app, request("/api/v1/admin/roles/not-a-uuid", Some(&token)))
            .await;
    }

    #[tokio::test]
    async fn test_bad_query_gets_envelope() {
        let (app, state) = app();
        assert_validation_envelope(app.clone(), request("/api/v1/jobs?page=first", None)).await;

        let token = state
            .tokens
            .issue(Uuid::new_v4(), vec!["admin".to_string()])
            .unwrap();
        assert_validation_envelope(app, request("/api/v1/admin/attendance/stats", Some(&token)))
            .await;
    }

    #[tokio::test]
    async fn test_upload_without_multipart_gets_envelope() {
        let (app, state) = app();
        let token = state.tokens.issue(Uuid::new_v4(), vec![]).unwrap();
        let request = http::Request::builder()
            .method("POST")
            .uri("/api/v1/uploads")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(http::header::CONTENT_TYPE, "text/plain")
            .body(Body::from("hello"))
            .unwrap();
        assert_validation_envelope(app, request).await;
    }
}
