use async_trait::async_trait;
use domain::{DomainError, NewPost, Post, PostChanges, PostId};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;

// --- Application Errors ---

/// Coarse status classification carried by every [`ApplicationError`].
/// The API layer maps these onto HTTP status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    BadRequest,
    Unprocessable,
    NotFound,
    Internal,
}

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{message}")]
    InvalidInput { message: String, class: ErrorClass },
    #[error("Post not found: {0}")]
    NotFound(PostId),
    #[error("Infrastructure error: {0}")]
    InfrastructureError(String),
}

impl ApplicationError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ApplicationError::InvalidInput { class, .. } => *class,
            ApplicationError::NotFound(_) => ErrorClass::NotFound,
            ApplicationError::InfrastructureError(_) => ErrorClass::Internal,
        }
    }
}

impl From<DomainError> for ApplicationError {
    fn from(err: DomainError) -> Self {
        // Malformed ids and queries are request errors; bad field values are semantic ones.
        let class = match &err {
            DomainError::InvalidId(_) | DomainError::InvalidQuery(_) => ErrorClass::BadRequest,
            DomainError::InvalidField { .. } => ErrorClass::Unprocessable,
        };
        ApplicationError::InvalidInput {
            message: err.to_string(),
            class,
        }
    }
}

// --- Infrastructure Interfaces (Traits) ---

/// Interface for storing and retrieving posts.
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Lists every post in the store's natural order.
    async fn find_all(&self) -> Result<Vec<Post>, ApplicationError>;
    /// Retrieves a post by its ID.
    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>, ApplicationError>;
    /// Posts whose title or content contains `query`, ignoring case.
    async fn find_by_text(&self, query: &str) -> Result<Vec<Post>, ApplicationError>;
    /// Stores a new post, assigning its ID and creation date.
    async fn create(&self, new_post: NewPost) -> Result<Post, ApplicationError>;
    /// Applies a partial update. Returns `None` if the post doesn't exist.
    async fn update(
        &self,
        id: PostId,
        changes: PostChanges,
    ) -> Result<Option<Post>, ApplicationError>;
    /// Deletes a post. Returns true if deleted.
    async fn delete(&self, id: PostId) -> Result<bool, ApplicationError>;
    /// Number of stored posts.
    async fn count(&self) -> Result<usize, ApplicationError> {
        Ok(self.find_all().await?.len())
    }
}

// --- Request/Response Models (Data Transfer Objects - DTOs) ---

/// Body of `POST /posts`. Missing or null fields fail validation instead of deserialization.
#[derive(Deserialize, Debug, Default, Clone, ToSchema)]
pub struct CreatePostRequest {
    #[schema(example = "Novo Post")]
    pub title: Option<String>,
    #[schema(example = "Conteúdo do novo post")]
    pub content: Option<String>,
    #[schema(example = "Professora Ana")]
    pub author: Option<String>,
}

/// Body of `PUT /posts/:id`. Any subset of the fields may be supplied.
///
/// A missing key is `None`. A key present as `null` is `Some(None)` and is
/// validated like an empty value.
#[derive(Deserialize, Debug, Default, Clone, ToSchema)]
pub struct UpdatePostRequest {
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>, example = "Título atualizado")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    pub content: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    pub author: Option<Option<String>>,
}

// Only called for keys that appear in the body.
fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

fn supplied(field: &Option<Option<String>>) -> Option<&str> {
    field.as_ref().map(|value| value.as_deref().unwrap_or_default())
}

#[derive(Serialize, Debug, ToSchema)]
pub struct PostListResponse {
    pub total: usize,
    pub posts: Vec<Post>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct SearchPostsResponse {
    pub total: usize,
    /// The trimmed search term actually used.
    pub query: String,
    pub posts: Vec<Post>,
}

// --- Application Services (Use Cases) ---

/// Service orchestrating validation and storage of posts.
pub struct PostService {
    repo: Arc<dyn PostRepository>,
}

impl PostService {
    pub fn new(repo: Arc<dyn PostRepository>) -> Self {
        Self { repo }
    }

    #[instrument(skip(self))]
    pub async fn get_all(&self) -> Result<PostListResponse, ApplicationError> {
        info!("Listing all posts");
        let posts = self.repo.find_all().await?;
        debug!(total = posts.len(), "Posts retrieved");
        Ok(PostListResponse {
            total: posts.len(),
            posts,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, raw_id: &str) -> Result<Post, ApplicationError> {
        let id = domain::validate_id(raw_id)?;
        info!(post_id = %id, "Retrieving post");
        self.repo.find_by_id(id).await?.ok_or_else(|| {
            warn!(post_id = %id, "Post not found");
            ApplicationError::NotFound(id)
        })
    }

    #[instrument(skip(self, request))]
    pub async fn create(&self, request: CreatePostRequest) -> Result<Post, ApplicationError> {
        let new_post = NewPost::parse(
            request.title.as_deref(),
            request.content.as_deref(),
            request.author.as_deref(),
        )?;
        info!(title = %new_post.title(), "Creating post");

        let post = self.repo.create(new_post).await.map_err(|e| {
            error!("Failed to store new post: {}", e);
            e
        })?;
        info!(post_id = %post.id, "Post created successfully");
        Ok(post)
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        raw_id: &str,
        request: UpdatePostRequest,
    ) -> Result<Post, ApplicationError> {
        let id = domain::validate_id(raw_id)?;
        let changes = PostChanges::parse(
            supplied(&request.title),
            supplied(&request.content),
            supplied(&request.author),
        )?;
        if changes.is_empty() {
            debug!(post_id = %id, "Update request carries no fields");
        }
        info!(post_id = %id, "Updating post");

        match self.repo.update(id, changes).await? {
            Some(post) => {
                info!(post_id = %id, "Post updated successfully");
                Ok(post)
            }
            None => {
                warn!(post_id = %id, "Update failed: post not found");
                Err(ApplicationError::NotFound(id))
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, raw_id: &str) -> Result<(), ApplicationError> {
        let id = domain::validate_id(raw_id)?;
        info!(post_id = %id, "Deleting post");

        if self.repo.delete(id).await? {
            info!(post_id = %id, "Post deleted successfully");
            Ok(())
        } else {
            warn!(post_id = %id, "Deletion failed: post not found");
            Err(ApplicationError::NotFound(id))
        }
    }

    #[instrument(skip(self))]
    pub async fn search(&self, raw_query: &str) -> Result<SearchPostsResponse, ApplicationError> {
        let query = domain::validate_query(raw_query)?;
        info!(query = %query, "Searching posts");

        let posts = self.repo.find_by_text(&query).await?;
        info!(query = %query, total = posts.len(), "Search finished");
        Ok(SearchPostsResponse {
            total: posts.len(),
            query,
            posts,
        })
    }

    /// Number of stored posts, for health reporting.
    pub async fn count(&self) -> Result<usize, ApplicationError> {
        self.repo.count().await
    }
}
