use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Json as JsonResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use application::{
    ApplicationError, CreatePostRequest, ErrorClass, PostListResponse, PostService,
    SearchPostsResponse, UpdatePostRequest,
};
use domain::Post;

use crate::config::StoreBackend;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub post_service: Arc<PostService>,
    pub store: StoreBackend,
}

/// `{ "status": "success", ...payload }`
#[derive(Serialize)]
struct Success<T: Serialize> {
    status: &'static str,
    #[serde(flatten)]
    payload: T,
}

fn success<T: Serialize>(status_code: StatusCode, payload: T) -> Response {
    (
        status_code,
        JsonResponse(Success {
            status: "success",
            payload,
        }),
    )
        .into_response()
}

/// `{ "status": "error", "message": ... }`
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(value_type = String, example = "error")]
    status: &'static str,
    #[schema(example = "Post not found.")]
    message: String,
}

fn error_envelope(status_code: StatusCode, message: impl Into<String>) -> Response {
    (
        status_code,
        JsonResponse(ErrorResponse {
            status: "error",
            message: message.into(),
        }),
    )
        .into_response()
}

#[derive(Deserialize, Debug)]
pub struct SearchParams {
    q: Option<String>,
}

// --- Health ---

pub async fn health_check(State(state): State<AppState>) -> Response {
    info!("Health check endpoint called");
    match state.post_service.count().await {
        Ok(total) => success(
            StatusCode::OK,
            json!({ "store": state.store.as_str(), "total": total }),
        ),
        Err(e) => map_application_error_to_response(e),
    }
}

// --- Post Handlers ---

/// Handler for listing posts (GET /posts).
#[utoipa::path(
    get,
    path = "/posts",
    tag = "Posts",
    responses(
        (status = 200, description = "All posts with their total", body = PostListResponse),
        (status = 500, description = "Store failure", body = ErrorResponse)
    )
)]
pub async fn list_posts_handler(State(state): State<AppState>) -> Response {
    info!("Received request to list posts");
    match state.post_service.get_all().await {
        Ok(list) => success(StatusCode::OK, list),
        Err(e) => {
            error!("Failed to list posts via handler: {}", e);
            map_application_error_to_response(e)
        }
    }
}

/// Handler for searching posts (GET /posts/search?q=...).
#[utoipa::path(
    get,
    path = "/posts/search",
    tag = "Posts",
    params(("q" = String, Query, description = "Search term, at least 2 characters")),
    responses(
        (status = 200, description = "Posts matching the term", body = SearchPostsResponse),
        (status = 400, description = "Missing or short search term", body = ErrorResponse)
    )
)]
pub async fn search_posts_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    let query = params.q.unwrap_or_default();
    info!(query = %query, "Received search request");
    match state.post_service.search(&query).await {
        Ok(result) => {
            info!(
                query = %result.query,
                "Search completed successfully via handler, {} hits",
                result.total
            );
            success(StatusCode::OK, result)
        }
        Err(e) => map_application_error_to_response(e),
    }
}

/// Handler for fetching a post (GET /posts/:id).
#[utoipa::path(
    get,
    path = "/posts/{id}",
    tag = "Posts",
    params(("id" = i64, Path, description = "Post id, an integer greater than zero")),
    responses(
        (status = 200, description = "The post, wrapped in the success envelope", body = Post),
        (status = 400, description = "Invalid id", body = ErrorResponse),
        (status = 404, description = "Post not found", body = ErrorResponse)
    )
)]
pub async fn get_post_handler(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Response {
    let Path(id) = match path {
        Ok(path) => path,
        Err(rejection) => return map_path_rejection_to_response(rejection),
    };
    info!(post_id = %id, "Received request to get post");
    match state.post_service.get_by_id(&id).await {
        Ok(post) => success(StatusCode::OK, post),
        Err(e) => map_application_error_to_response(e),
    }
}

/// Handler for creating a post (POST /posts).
#[utoipa::path(
    post,
    path = "/posts",
    tag = "Posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Created post, wrapped in the success envelope", body = Post),
        (status = 400, description = "Malformed JSON body", body = ErrorResponse),
        (status = 422, description = "Field validation failed", body = ErrorResponse)
    )
)]
pub async fn create_post_handler(
    State(state): State<AppState>,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return map_json_rejection_to_response(rejection),
    };
    info!("Received request to create post");
    match state.post_service.create(request).await {
        Ok(post) => {
            info!(post_id = %post.id, "Post created successfully via handler");
            success(StatusCode::CREATED, post)
        }
        Err(e) => map_application_error_to_response(e),
    }
}

/// Handler for updating a post (PUT /posts/:id).
#[utoipa::path(
    put,
    path = "/posts/{id}",
    tag = "Posts",
    params(("id" = i64, Path, description = "Post id, an integer greater than zero")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated post, wrapped in the success envelope", body = Post),
        (status = 400, description = "Invalid id or malformed JSON body", body = ErrorResponse),
        (status = 404, description = "Post not found", body = ErrorResponse),
        (status = 422, description = "Field validation failed", body = ErrorResponse)
    )
)]
pub async fn update_post_handler(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<UpdatePostRequest>, JsonRejection>,
) -> Response {
    let Path(id) = match path {
        Ok(path) => path,
        Err(rejection) => return map_path_rejection_to_response(rejection),
    };
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return map_json_rejection_to_response(rejection),
    };
    info!(post_id = %id, "Received request to update post");
    match state.post_service.update(&id, request).await {
        Ok(post) => success(StatusCode::OK, post),
        Err(e) => map_application_error_to_response(e),
    }
}

/// Handler for deleting a post (DELETE /posts/:id).
#[utoipa::path(
    delete,
    path = "/posts/{id}",
    tag = "Posts",
    params(("id" = i64, Path, description = "Post id, an integer greater than zero")),
    responses(
        (status = 200, description = "Post deleted"),
        (status = 400, description = "Invalid id", body = ErrorResponse),
        (status = 404, description = "Post not found", body = ErrorResponse)
    )
)]
pub async fn delete_post_handler(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Response {
    let Path(id) = match path {
        Ok(path) => path,
        Err(rejection) => return map_path_rejection_to_response(rejection),
    };
    info!(post_id = %id, "Received request to delete post");
    match state.post_service.delete(&id).await {
        Ok(()) => {
            info!(post_id = %id, "Post deleted successfully via handler");
            (StatusCode::OK, JsonResponse(json!({ "status": "success" }))).into_response()
        }
        Err(e) => map_application_error_to_response(e),
    }
}

/// Catch-all for unknown routes.
pub async fn route_not_found() -> Response {
    error_envelope(StatusCode::NOT_FOUND, "Route not found")
}

/// Maps ApplicationError onto an HTTP status code and error envelope.
/// Internal failures are logged and replaced with a generic message.
fn map_application_error_to_response(err: ApplicationError) -> Response {
    let status = match err.class() {
        ErrorClass::BadRequest => StatusCode::BAD_REQUEST,
        ErrorClass::Unprocessable => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorClass::NotFound => StatusCode::NOT_FOUND,
        ErrorClass::Internal => {
            error!("Underlying infrastructure error: {}", err);
            return error_envelope(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
            );
        }
    };
    warn!(status = status.as_u16(), "Request rejected: {}", err);
    let message = match err {
        ApplicationError::NotFound(_) => "Post not found.".to_string(),
        other => other.to_string(),
    };
    error_envelope(status, message)
}

fn map_json_rejection_to_response(rejection: JsonRejection) -> Response {
    warn!("Rejected request body: {}", rejection.body_text());
    error_envelope(rejection.status(), rejection.body_text())
}

fn map_path_rejection_to_response(rejection: PathRejection) -> Response {
    warn!("Rejected request path: {}", rejection.body_text());
    error_envelope(rejection.status(), rejection.body_text())
}
