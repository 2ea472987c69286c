//! Inkwell API Gateway
//!
//! HTTP entry point for users and their blogs.
//! Handles:
//! - Request routing and validation
//! - One pooled database session per request via shared state
//! - Rate limiting
//! - Observability (logging, metrics, tracing)

mod extract;
mod handlers;
mod middleware;

use axum::{
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, MethodRouter},
    Router,
};
use inkwell_common::{
    config::AppConfig,
    db::{schema, DbPool},
    metrics::{self, LATENCY_BUCKETS},
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::Notify;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::middleware::rate_limit::{rate_limit_middleware, RateLimit};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub metrics: Option<PrometheusHandle>,
    pub rate_limit: Option<RateLimit>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load()?);

    // Initialize tracing
    init_tracing(&config);

    info!(
        service = %config.observability.service_name,
        "Starting Inkwell API Gateway v{}", inkwell_common::VERSION
    );

    // Initialize metrics
    let prometheus = if config.observability.metrics_enabled {
        Some(install_metrics_exporter()?)
    } else {
        None
    };
    metrics::register_metrics();

    // Initialize database connection
    let mut db_config = config.database.clone();
    db_config.log_statements |= config.server.debug;
    let db = DbPool::new(&db_config).await?;

    if config.database.create_tables {
        schema::create_tables(db.connection()).await?;
    }

    let rate_limit = if config.rate_limit.enabled {
        RateLimit::new(config.rate_limit.requests_per_second, config.rate_limit.burst)
    } else {
        None
    };

    // Create app state
    let state = AppState {
        config: config.clone(),
        db,
        metrics: prometheus,
        rate_limit,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let shutdown = Arc::new(Notify::new());
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(notify_on_shutdown(shutdown.clone()))
        .into_future();

    drain_with_deadline(server, &shutdown, config.shutdown_timeout()).await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Install the global tracing subscriber; `RUST_LOG` overrides the config
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Install the Prometheus recorder and keep its histograms drained
fn install_metrics_exporter() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .install_recorder()?;

    let upkeep = handle.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            interval.tick().await;
            upkeep.run_upkeep();
        }
    });

    Ok(handle)
}

/// Collection routes answer with and without the trailing slash
fn users_collection() -> MethodRouter<AppState> {
    post(handlers::users::create_user).get(handlers::users::list_users)
}

fn blogs_collection() -> MethodRouter<AppState> {
    post(handlers::blogs::create_blog).get(handlers::blogs::list_blogs)
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let timeout =
        TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, state.config.request_timeout());

    // API routes
    let api_routes = Router::new()
        // User endpoints
        .route("/users", users_collection())
        .route("/users/", users_collection())
        .route(
            "/users/{user_id}",
            get(handlers::users::get_user).delete(handlers::users::delete_user),
        )

        // Blog endpoints
        .route("/blogs", blogs_collection())
        .route("/blogs/", blogs_collection())
        .route(
            "/blogs/{blog_id}",
            get(handlers::blogs::get_blog).delete(handlers::blogs::delete_blog),
        )
        .route_layer(from_fn(middleware::metrics::track_metrics));

    let mut app = Router::new()
        // Health and metrics endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/metrics", get(handlers::health::metrics))
        .merge(api_routes);

    if let Some(limit) = state.rate_limit.clone() {
        app = app.layer(from_fn_with_state(limit, rate_limit_middleware));
    }

    // Compose the app
    app.layer(TraceLayer::new_for_http())
        .layer(timeout)
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

/// Forward the shutdown signal to the drain deadline
async fn notify_on_shutdown(shutdown: Arc<Notify>) {
    shutdown_signal().await;
    shutdown.notify_one();
}

/// Drive the server to completion; once shutdown starts, in-flight
/// requests get at most `limit` to finish before they are dropped
async fn drain_with_deadline<F>(server: F, shutdown: &Notify, limit: Duration) -> std::io::Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => result,
        _ = shutdown.notified() => match tokio::time::timeout(limit, &mut server).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_secs = limit.as_secs(), "Shutdown deadline reached, dropping open connections");
                Ok(())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use inkwell_common::config::DatabaseConfig;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn test_state() -> AppState {
        let db = DbPool::new(&DatabaseConfig::in_memory()).await.unwrap();
        schema::create_tables(db.connection()).await.unwrap();

        AppState {
            config: Arc::new(AppConfig::default()),
            db,
            metrics: None,
            rate_limit: None,
        }
    }

    async fn test_app() -> Router {
        create_router(test_state().await)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        (status, json)
    }

    async fn create_user(app: &Router, username: &str) -> i64 {
        let (status, body) = send(
            app,
            "POST",
            "/users/",
            Some(json!({"username": username, "email": format!("{username}@example.com")})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = test_app().await;

        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = send(&app, "GET", "/ready", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["database"]["status"], "up");
    }

    #[tokio::test]
    async fn test_create_user_returns_id() {
        let app = test_app().await;

        let (status, body) = send(
            &app,
            "POST",
            "/users/",
            Some(json!({"username": "alice", "email": "alice@example.com"})),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert!(body["id"].as_i64().unwrap() > 0);
        assert_eq!(body["username"], "alice");
        assert_eq!(body["blogs"], json!([]));
    }

    #[tokio::test]
    async fn test_duplicate_username_is_400() {
        let app = test_app().await;
        create_user(&app, "alice").await;

        let (status, body) = send(
            &app,
            "POST",
            "/users",
            Some(json!({"username": "alice", "email": "second@example.com"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "USERNAME_TAKEN");
        assert_eq!(body["error"]["message"], "Username already registered");
    }

    #[tokio::test]
    async fn test_duplicate_email_is_400() {
        let app = test_app().await;
        create_user(&app, "alice").await;

        let (status, body) = send(
            &app,
            "POST",
            "/users/",
            Some(json!({"username": "alice2", "email": "alice@example.com"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "EMAIL_TAKEN");
    }

    #[tokio::test]
    async fn test_invalid_user_payloads_are_400() {
        let app = test_app().await;

        let (status, body) = send(
            &app,
            "POST",
            "/users/",
            Some(json!({"username": "alice", "email": "not-an-email"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["field"], "email");

        let (status, body) = send(&app, "POST", "/users/", Some(json!({"username": "bob"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_FORMAT");
    }

    #[tokio::test]
    async fn test_unknown_user_is_404() {
        let app = test_app().await;

        let (status, body) = send(&app, "GET", "/users/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "USER_NOT_FOUND");
        assert_eq!(body["error"]["message"], "User not found");

        let (status, _) = send(&app, "DELETE", "/users/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_blog_is_nested_under_owner() {
        let app = test_app().await;
        let user_id = create_user(&app, "alice").await;

        let (status, blog) = send(
            &app,
            "POST",
            &format!("/blogs/?user_id={user_id}"),
            Some(json!({"title": "Hello", "content": "First post"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{blog}");
        assert_eq!(blog["owner_id"].as_i64(), Some(user_id));
        assert_eq!(blog["published"], true);

        let (status, user) = send(&app, "GET", &format!("/users/{user_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let blogs = user["blogs"].as_array().unwrap();
        assert_eq!(blogs.len(), 1);
        assert_eq!(blogs[0]["id"], blog["id"]);
        assert_eq!(blogs[0]["title"], "Hello");
    }

    #[tokio::test]
    async fn test_blog_for_missing_user_is_404() {
        let app = test_app().await;

        let (status, body) = send(
            &app,
            "POST",
            "/blogs/?user_id=12345",
            Some(json!({"title": "Orphan", "content": "Nobody home"})),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "USER_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_deleting_user_removes_blogs() {
        let app = test_app().await;
        let user_id = create_user(&app, "alice").await;

        let (_, blog) = send(
            &app,
            "POST",
            &format!("/blogs?user_id={user_id}"),
            Some(json!({"title": "Doomed", "content": "..."})),
        )
        .await;
        let blog_id = blog["id"].as_i64().unwrap();

        let (status, body) = send(&app, "DELETE", &format!("/users/{user_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "User deleted successfully");

        let (status, _) = send(&app, "GET", &format!("/users/{user_id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, "GET", &format!("/blogs/{blog_id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], "Blog not found");
    }

    #[tokio::test]
    async fn test_list_and_delete_blogs() {
        let app = test_app().await;
        let user_id = create_user(&app, "alice").await;

        for (title, published) in [("One", true), ("Two", false), ("Three", true)] {
            let (status, _) = send(
                &app,
                "POST",
                &format!("/blogs/?user_id={user_id}"),
                Some(json!({"title": title, "content": "body", "published": published})),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, all) = send(&app, "GET", "/blogs/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all.as_array().unwrap().len(), 3);

        let (_, published) = send(&app, "GET", "/blogs?published=true", None).await;
        let titles: Vec<_> = published
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["title"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(titles, vec!["One", "Three"]);

        let (_, page) = send(&app, "GET", "/blogs?start=2&limit=1", None).await;
        assert_eq!(page[0]["title"], "Two");

        let first_id = all[0]["id"].as_i64().unwrap();
        let (status, body) = send(&app, "DELETE", &format!("/blogs/{first_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Blog deleted successfully");

        let (status, _) = send(&app, "DELETE", &format!("/blogs/{first_id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_users_includes_blogs() {
        let app = test_app().await;
        let alice = create_user(&app, "alice").await;
        create_user(&app, "bob").await;

        send(
            &app,
            "POST",
            &format!("/blogs/?user_id={alice}"),
            Some(json!({"title": "Hi", "content": "there"})),
        )
        .await;

        let (status, users) = send(&app, "GET", "/users/", None).await;
        assert_eq!(status, StatusCode::OK);
        let users = users.as_array().unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0]["username"], "alice");
        assert_eq!(users[0]["blogs"].as_array().unwrap().len(), 1);
        assert_eq!(users[1]["blogs"], json!([]));

        let (_, page) = send(&app, "GET", "/users?skip=1&limit=1", None).await;
        assert_eq!(page.as_array().unwrap().len(), 1);
        assert_eq!(page[0]["username"], "bob");
    }

    #[tokio::test]
    async fn test_out_of_range_offsets_return_empty_pages() {
        let app = test_app().await;
        let user_id = create_user(&app, "alice").await;
        send(
            &app,
            "POST",
            &format!("/blogs/?user_id={user_id}"),
            Some(json!({"title": "Only", "content": "post"})),
        )
        .await;

        let (status, users) = send(&app, "GET", "/users/?skip=18446744073709551615", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(users, json!([]));

        let (status, blogs) = send(&app, "GET", "/blogs/?start=18446744073709551615", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(blogs, json!([]));
    }

    #[tokio::test]
    async fn test_malformed_path_and_query_use_error_body() {
        let app = test_app().await;

        let (status, body) = send(&app, "GET", "/users/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_FORMAT");

        let (status, body) = send(&app, "DELETE", "/blogs/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_FORMAT");

        let (status, body) = send(
            &app,
            "POST",
            "/blogs/?user_id=abc",
            Some(json!({"title": "Hello", "content": "body"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_FORMAT");

        let (status, body) = send(
            &app,
            "POST",
            "/blogs/",
            Some(json!({"title": "Hello", "content": "body"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_FORMAT");

        let (status, body) = send(&app, "GET", "/blogs/?start=-1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_FORMAT");
    }

    #[tokio::test]
    async fn test_drain_returns_when_server_finishes() {
        let shutdown = Notify::new();

        let result = drain_with_deadline(async { Ok(()) }, &shutdown, Duration::from_secs(5)).await;
        assert!(result.is_ok());

        let failing = async { Err(std::io::Error::other("accept failed")) };
        let result = drain_with_deadline(failing, &shutdown, Duration::from_secs(5)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_drain_gives_up_after_deadline() {
        let shutdown = Notify::new();
        shutdown.notify_one();

        let stuck = std::future::pending::<std::io::Result<()>>();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            drain_with_deadline(stuck, &shutdown, Duration::from_millis(20)),
        )
        .await
        .expect("drain should stop at its own deadline");

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_metrics_endpoint_without_exporter_is_404() {
        let app = test_app().await;

        let (status, _) = send(&app, "GET", "/metrics", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_excess_requests() {
        let mut state = test_state().await;
        state.rate_limit = RateLimit::new(1, 1);
        let app = create_router(state);

        let (status, _) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["code"], "RATE_LIMITED");
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let app = test_app().await;

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.headers().contains_key("x-request-id"));
    }
}
