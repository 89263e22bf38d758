use application::{ApplicationError, PostRepository};
use async_trait::async_trait;
use bson::{Document, doc};
use chrono::{DateTime, Utc};
use domain::{NewPost, Post, PostChanges, PostId};
use futures::TryStreamExt;
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

pub const DEFAULT_CONNECTION_STRING: &str = "mongodb://localhost:27017/diario_de_classe";
pub const DEFAULT_DATABASE: &str = "diario_de_classe";
const COLLECTION_NAME: &str = "posts";

/// Shape of a post inside the `posts` collection.
/// The driver-managed `_id` is ignored; lookups go through the numeric `id` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostDocument {
    id: i64,
    title: String,
    content: String,
    author: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
}

impl From<&Post> for PostDocument {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id.value(),
            title: post.title.clone(),
            content: post.content.clone(),
            author: post.author.clone(),
            created_at: post.created_at,
        }
    }
}

impl From<PostDocument> for Post {
    fn from(document: PostDocument) -> Self {
        Post {
            id: PostId::new(document.id),
            title: document.title,
            content: document.content,
            author: document.author,
            created_at: document.created_at,
        }
    }
}

/// Post store backed by a MongoDB collection.
#[derive(Debug, Clone)]
pub struct MongoPostRepository {
    collection: Collection<PostDocument>,
}

impl MongoPostRepository {
    /// Connects using `uri`. The database comes from the URI path, falling back to
    /// [`DEFAULT_DATABASE`]. Ensures a unique index on `id`.
    #[instrument(skip(uri))]
    pub async fn connect(uri: &str) -> Result<Self, ApplicationError> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| store_error("connect", e))?;
        let database = client
            .default_database()
            .unwrap_or_else(|| client.database(DEFAULT_DATABASE));
        info!(database = %database.name(), "Connected to MongoDB");

        let repo = Self {
            collection: database.collection(COLLECTION_NAME),
        };
        repo.ensure_indexes().await?;
        Ok(repo)
    }

    async fn ensure_indexes(&self) -> Result<(), ApplicationError> {
        let index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection
            .create_index(index)
            .await
            .map_err(|e| store_error("create_index", e))?;
        debug!(collection = COLLECTION_NAME, "Unique index on 'id' ensured");
        Ok(())
    }
}

#[async_trait]
impl PostRepository for MongoPostRepository {
    #[instrument(skip(self))]
    async fn find_all(&self) -> Result<Vec<Post>, ApplicationError> {
        debug!("Listing all posts from MongoDB");
        let documents: Vec<PostDocument> = self
            .collection
            .find(doc! {})
            .sort(doc! { "id": 1 })
            .await
            .map_err(|e| store_error("find", e))?
            .try_collect()
            .await
            .map_err(|e| store_error("find", e))?;
        Ok(documents.into_iter().map(Post::from).collect())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>, ApplicationError> {
        debug!(post_id = %id, "Getting post from MongoDB");
        let document = self
            .collection
            .find_one(id_filter(id))
            .await
            .map_err(|e| store_error("find_one", e))?;
        Ok(document.map(Post::from))
    }

    #[instrument(skip(self))]
    async fn find_by_text(&self, query: &str) -> Result<Vec<Post>, ApplicationError> {
        debug!(query = %query, "Searching posts in MongoDB");
        let documents: Vec<PostDocument> = self
            .collection
            .find(text_filter(query))
            .sort(doc! { "id": 1 })
            .await
            .map_err(|e| store_error("find", e))?
            .try_collect()
            .await
            .map_err(|e| store_error("find", e))?;
        Ok(documents.into_iter().map(Post::from).collect())
    }

    #[instrument(skip(self, new_post))]
    async fn create(&self, new_post: NewPost) -> Result<Post, ApplicationError> {
        // BSON dates keep milliseconds only. Truncate now so the returned post
        // matches what is stored.
        let created_at = bson::DateTime::now().to_chrono();
        // TODO: two creates within the same millisecond collide on the unique
        // index; switch to a counter document.
        let id = PostId::new(created_at.timestamp_millis());
        let post = new_post.into_post(id, created_at);

        debug!(post_id = %id, "Inserting post into MongoDB");
        self.collection
            .insert_one(PostDocument::from(&post))
            .await
            .map_err(|e| store_error("insert_one", e))?;
        Ok(post)
    }

    #[instrument(skip(self, changes))]
    async fn update(
        &self,
        id: PostId,
        changes: PostChanges,
    ) -> Result<Option<Post>, ApplicationError> {
        if changes.is_empty() {
            return self.find_by_id(id).await;
        }
        debug!(post_id = %id, "Updating post in MongoDB");
        let document = self
            .collection
            .find_one_and_update(id_filter(id), doc! { "$set": set_fields(&changes) })
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| store_error("find_one_and_update", e))?;
        Ok(document.map(Post::from))
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: PostId) -> Result<bool, ApplicationError> {
        debug!(post_id = %id, "Deleting post from MongoDB");
        let result = self
            .collection
            .delete_one(id_filter(id))
            .await
            .map_err(|e| store_error("delete_one", e))?;
        Ok(result.deleted_count > 0)
    }

    async fn count(&self) -> Result<usize, ApplicationError> {
        let total = self
            .collection
            .count_documents(doc! {})
            .await
            .map_err(|e| store_error("count_documents", e))?;
        Ok(total as usize)
    }
}

fn store_error(operation: &str, err: mongodb::error::Error) -> ApplicationError {
    error!(operation, "MongoDB operation failed: {}", err);
    ApplicationError::InfrastructureError(format!("MongoDB {} failed: {}", operation, err))
}

fn id_filter(id: PostId) -> Document {
    doc! { "id": id.value() }
}

/// Case-insensitive substring match on title or content.
fn text_filter(query: &str) -> Document {
    // The search term is literal text, not a pattern.
    let pattern = regex::escape(query);
    doc! {
        "$or": [
            { "title": { "$regex": pattern.as_str(), "$options": "i" } },
            { "content": { "$regex": pattern.as_str(), "$options": "i" } },
        ]
    }
}

/// `$set` body holding only the supplied fields.
fn set_fields(changes: &PostChanges) -> Document {
    let mut fields = Document::new();
    if let Some(title) = changes.title() {
        fields.insert("title", title);
    }
    if let Some(content) = changes.content() {
        fields.insert("content", content);
    }
    if let Some(author) = changes.author() {
        fields.insert("author", author);
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn document_maps_to_post_and_back() {
        let post = Post {
            id: PostId::new(1_767_225_600_000),
            title: "Terceiro Post".to_string(),
            content: "Express é um framework incrível".to_string(),
            author: "Professor Pedro".to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 1, 3, 0, 0, 0).unwrap(),
        };
        let document = PostDocument::from(&post);
        assert_eq!(document.id, 1_767_225_600_000);
        assert_eq!(Post::from(document), post);
    }

    #[test]
    fn stored_document_uses_bson_datetime_and_camel_case() {
        let document = PostDocument {
            id: 5,
            title: "Title".to_string(),
            content: "Some content".to_string(),
            author: "Author".to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
        };
        let bson_doc = bson::to_document(&document).unwrap();
        assert!(matches!(bson_doc.get("createdAt"), Some(bson::Bson::DateTime(_))));
        assert_eq!(bson_doc.get_i64("id").unwrap(), 5);
        assert!(!bson_doc.contains_key("_id"));
    }

    #[test]
    fn text_filter_escapes_pattern_characters() {
        let filter = text_filter("node.js (v20)");
        let clauses = filter.get_array("$or").unwrap();
        assert_eq!(clauses.len(), 2);

        let title = clauses[0]
            .as_document()
            .and_then(|d| d.get_document("title").ok())
            .unwrap();
        assert_eq!(title.get_str("$regex").unwrap(), r"node\.js \(v20\)");
        assert_eq!(title.get_str("$options").unwrap(), "i");
    }

    #[test]
    fn set_fields_contains_only_supplied_values() {
        let changes = PostChanges::parse(None, Some("A fresh body of text"), None).unwrap();
        let fields = set_fields(&changes);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get_str("content").unwrap(), "A fresh body of text");
        assert!(!fields.contains_key("id"));
        assert!(!fields.contains_key("createdAt"));
    }

    #[test]
    fn id_filter_targets_mirrored_field() {
        assert_eq!(id_filter(PostId::new(42)), doc! { "id": 42_i64 });
    }
}
