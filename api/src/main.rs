use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use application::{PostRepository, PostService};
use infrastructure::{InMemoryPostRepository, MongoPostRepository};

mod config;
mod handlers;
mod openapi;

use config::{AppConfig, StoreBackend};
use handlers::{
    AppState, create_post_handler, delete_post_handler, get_post_handler, health_check,
    list_posts_handler, route_not_found, search_posts_handler, update_post_handler,
};
use openapi::openapi_json;

// Application entry point
#[tokio::main]
async fn main() {
    // --- Logger Initialization ---
    let filter: EnvFilter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
    info!("Logger initialized successfully.");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    // --- Dependency Injection ---
    // 1. Create the store selected by STORE_BACKEND
    let repository: Arc<dyn PostRepository> = match config.store {
        StoreBackend::Memory => {
            info!("Using in-memory post store with seed data.");
            Arc::new(InMemoryPostRepository::with_seed_data())
        }
        StoreBackend::Mongo => {
            match MongoPostRepository::connect(&config.db_connection_string).await {
                Ok(repo) => {
                    info!("MongoDB post store initialized.");
                    Arc::new(repo)
                }
                Err(e) => {
                    error!("Failed to connect to MongoDB: {}", e);
                    std::process::exit(1);
                }
            }
        }
    };

    // 2. Create application services, injecting dependencies
    let app_state = AppState {
        post_service: Arc::new(PostService::new(repository)),
        store: config.store,
    };
    info!("Application state created.");

    let app = build_router(app_state);
    info!("API routes configured.");

    // --- Server Startup ---
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Server starting on {}", addr);
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => {
            info!("Server listening on {}", addr);
            listener
        }
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app.into_make_service()).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Builds the API router. The static `/posts/search` route takes precedence over `/posts/:id`.
fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        .route("/posts", get(list_posts_handler).post(create_post_handler))
        .route("/posts/search", get(search_posts_handler))
        .route(
            "/posts/:id",
            get(get_post_handler)
                .put(update_post_handler)
                .delete(delete_post_handler),
        )
        .fallback(route_not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use application::ApplicationError;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode, header};
    use domain::{NewPost, Post, PostChanges, PostId};
    use serde_json::{Value, json};
    use tower::util::ServiceExt;

    const STORE_FAILURE: &str = "connection refused by mongo-primary:27017";

    /// Store whose every call fails.
    struct UnreachableStore;

    fn unreachable() -> ApplicationError {
        ApplicationError::InfrastructureError(STORE_FAILURE.to_string())
    }

    #[async_trait]
    impl PostRepository for UnreachableStore {
        async fn find_all(&self) -> Result<Vec<Post>, ApplicationError> {
            Err(unreachable())
        }

        async fn find_by_id(&self, _id: PostId) -> Result<Option<Post>, ApplicationError> {
            Err(unreachable())
        }

        async fn find_by_text(&self, _query: &str) -> Result<Vec<Post>, ApplicationError> {
            Err(unreachable())
        }

        async fn create(&self, _new_post: NewPost) -> Result<Post, ApplicationError> {
            Err(unreachable())
        }

        async fn update(
            &self,
            _id: PostId,
            _changes: PostChanges,
        ) -> Result<Option<Post>, ApplicationError> {
            Err(unreachable())
        }

        async fn delete(&self, _id: PostId) -> Result<bool, ApplicationError> {
            Err(unreachable())
        }
    }

    fn app_with(repository: Arc<dyn PostRepository>) -> Router {
        build_router(AppState {
            post_service: Arc::new(PostService::new(repository)),
            store: StoreBackend::Memory,
        })
    }

    fn seeded_app() -> Router {
        app_with(Arc::new(InMemoryPostRepository::with_seed_data()))
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
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

    fn titles(posts: &Value) -> Vec<&str> {
        posts
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["title"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn health_reports_store_and_total() {
        let app = seeded_app();
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "success", "store": "memory", "total": 3 }));
    }

    #[tokio::test]
    async fn list_posts_wraps_envelope() {
        let app = seeded_app();
        let (status, body) = send(&app, Method::GET, "/posts", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["total"], 3);
        assert_eq!(
            titles(&body["posts"]),
            ["Bem-vindo ao Diario", "Segundo Post", "Terceiro Post"]
        );
    }

    #[tokio::test]
    async fn get_post_flattens_fields_into_envelope() {
        let app = seeded_app();
        let (status, body) = send(&app, Method::GET, "/posts/2", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["id"], 2);
        assert_eq!(body["title"], "Segundo Post");
        assert_eq!(body["author"], "Professor Maria");
        assert_eq!(body["createdAt"], "2026-01-02T00:00:00Z");
    }

    #[tokio::test]
    async fn get_post_errors() {
        let app = seeded_app();

        let (status, body) = send(&app, Method::GET, "/posts/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "status": "error", "message": "Post not found." }));

        let (status, body) = send(&app, Method::GET, "/posts/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().contains("Invalid ID"));
    }

    #[tokio::test]
    async fn search_returns_matching_posts() {
        let app = seeded_app();

        let (status, body) = send(&app, Method::GET, "/posts/search?q=node", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["query"], "node");
        assert_eq!(body["total"], 1);
        assert_eq!(titles(&body["posts"]), ["Segundo Post"]);

        let (_, body) = send(&app, Method::GET, "/posts/search?q=express", None).await;
        assert_eq!(titles(&body["posts"]), ["Terceiro Post"]);

        let (status, body) = send(&app, Method::GET, "/posts/search?q=python", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 0);
    }

    #[tokio::test]
    async fn search_requires_query_of_two_chars() {
        let app = seeded_app();
        let (status, body) = send(&app, Method::GET, "/posts/search", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");

        let (status, _) = send(&app, Method::GET, "/posts/search?q=a", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_then_fetch() {
        let app = seeded_app();
        let (status, created) = send(
            &app,
            Method::POST,
            "/posts",
            Some(json!({
                "title": "  Novo Post  ",
                "content": "Conteúdo suficientemente longo",
                "author": "Professora Ana"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "success");
        assert_eq!(created["id"], 4);
        assert_eq!(created["title"], "Novo Post");
        assert!(created["createdAt"].is_string());

        let (status, fetched) = send(&app, Method::GET, "/posts/4", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn create_with_invalid_fields_is_unprocessable() {
        let app = seeded_app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/posts",
            Some(json!({ "title": "Oi", "content": "Conteúdo Válido", "author": "Autor" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().contains("Title"));

        let (status, _) = send(&app, Method::POST, "/posts", Some(json!({}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn malformed_json_body_gets_error_envelope() {
        let app = seeded_app();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/posts")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn update_changes_only_supplied_fields() {
        let app = seeded_app();
        let (_, before) = send(&app, Method::GET, "/posts/3", None).await;

        let (status, after) = send(
            &app,
            Method::PUT,
            "/posts/3",
            Some(json!({ "title": "Terceiro Post Revisado" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(after["title"], "Terceiro Post Revisado");
        assert_eq!(after["content"], before["content"]);
        assert_eq!(after["id"], before["id"]);
        assert_eq!(after["createdAt"], before["createdAt"]);
    }

    #[tokio::test]
    async fn update_errors() {
        let app = seeded_app();
        let (status, _) = send(
            &app,
            Method::PUT,
            "/posts/999",
            Some(json!({ "title": "Valid title" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            Method::PUT,
            "/posts/1",
            Some(json!({ "content": "short" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = send(
            &app,
            Method::PUT,
            "/posts/-1",
            Some(json!({ "title": "Valid title" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_with_null_field_is_unprocessable() {
        let app = seeded_app();
        let (status, body) =
            send(&app, Method::PUT, "/posts/1", Some(json!({ "title": null }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().contains("Title"));

        let (_, post) = send(&app, Method::GET, "/posts/1", None).await;
        assert_eq!(post["title"], "Bem-vindo ao Diario");
    }

    #[tokio::test]
    async fn undecodable_path_gets_error_envelope() {
        let app = seeded_app();
        for method in [Method::GET, Method::DELETE] {
            let (status, body) = send(&app, method, "/posts/%FF", None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["status"], "error");
            assert!(body["message"].as_str().unwrap().contains("Invalid URL"));
        }

        let (status, body) = send(
            &app,
            Method::PUT,
            "/posts/%FF",
            Some(json!({ "title": "Valid title" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn store_failure_is_internal_error_without_detail() {
        let app = app_with(Arc::new(UnreachableStore));
        let expected = json!({ "status": "error", "message": "Internal server error" });

        let (status, body) = send(&app, Method::GET, "/posts", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, expected);
        assert!(!body.to_string().contains("mongo-primary"));

        let (status, body) = send(
            &app,
            Method::POST,
            "/posts",
            Some(json!({
                "title": "Novo Post",
                "content": "Conteúdo suficientemente longo",
                "author": "Professora Ana"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, expected);

        let (status, body) = send(&app, Method::GET, "/posts/search?q=node", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, expected);
    }

    #[tokio::test]
    async fn openapi_document_lists_post_routes() {
        let app = seeded_app();
        let (status, doc) = send(&app, Method::GET, "/api-docs/openapi.json", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(doc["openapi"].as_str().unwrap().starts_with("3."));
        assert_eq!(doc["info"]["title"], "Diario de Classe API");

        let paths = &doc["paths"];
        assert!(paths["/posts"]["get"].is_object());
        assert!(paths["/posts"]["post"].is_object());
        assert!(paths["/posts/search"]["get"].is_object());
        for method in ["get", "put", "delete"] {
            assert!(paths["/posts/{id}"][method].is_object(), "missing {method}");
        }

        let post = &doc["components"]["schemas"]["Post"]["properties"];
        assert!(post["createdAt"].is_object());
        assert!(post["id"].is_object());
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let app = seeded_app();
        let (status, body) = send(&app, Method::DELETE, "/posts/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "success" }));

        let (status, _) = send(&app, Method::GET, "/posts/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, Method::DELETE, "/posts/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_route_gets_error_envelope() {
        let app = seeded_app();
        let (status, body) = send(&app, Method::GET, "/comments", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "status": "error", "message": "Route not found" }));
    }
}
