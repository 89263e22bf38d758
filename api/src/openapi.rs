use axum::Json;
use utoipa::OpenApi;

use application::{CreatePostRequest, PostListResponse, SearchPostsResponse, UpdatePostRequest};
use domain::Post;

use crate::handlers::{self, ErrorResponse};

/// OpenAPI 3 document for the posts routes.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Diario de Classe API",
        version = "1.0.0",
        description = "API para gerenciamento de postagens educacionais."
    ),
    paths(
        handlers::list_posts_handler,
        handlers::search_posts_handler,
        handlers::get_post_handler,
        handlers::create_post_handler,
        handlers::update_post_handler,
        handlers::delete_post_handler,
    ),
    components(schemas(
        Post,
        CreatePostRequest,
        UpdatePostRequest,
        PostListResponse,
        SearchPostsResponse,
        ErrorResponse
    )),
    tags((name = "Posts", description = "Gerenciamento de postagens"))
)]
pub struct ApiDoc;

/// Handler serving the document (GET /api-docs/openapi.json).
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
