use application::{ApplicationError, PostRepository};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use domain::{NewPost, Post, PostChanges, PostId};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{debug, instrument};

use super::seed::seed_posts;

/// In-memory post store. Each instance owns its posts and its ID counter.
#[derive(Debug, Clone)]
pub struct InMemoryPostRepository {
    // Post ID -> Post
    posts: Arc<DashMap<PostId, Post>>,
    // Next ID to hand out; only ever increases
    next_id: Arc<AtomicI64>,
}

impl Default for InMemoryPostRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPostRepository {
    pub fn new() -> Self {
        Self {
            posts: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicI64::new(1)),
        }
    }

    /// A store preloaded with the three example posts (IDs 1..=3).
    pub fn with_seed_data() -> Self {
        Self::from_posts(seed_posts())
    }

    /// Builds a store from existing posts; new IDs continue after the highest one.
    pub fn from_posts(posts: Vec<Post>) -> Self {
        let next_id = posts.iter().map(|p| p.id.value()).max().unwrap_or(0) + 1;
        let map = DashMap::with_capacity(posts.len());
        for post in posts {
            map.insert(post.id, post);
        }
        Self {
            posts: Arc::new(map),
            next_id: Arc::new(AtomicI64::new(next_id)),
        }
    }

    // IDs are handed out in creation order, so sorting by ID gives insertion order.
    fn sorted(&self, mut posts: Vec<Post>) -> Vec<Post> {
        posts.sort_unstable_by_key(|p| p.id);
        posts
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    #[instrument(skip(self))]
    async fn find_all(&self) -> Result<Vec<Post>, ApplicationError> {
        debug!("Listing all posts from in-memory store");
        let posts = self.posts.iter().map(|entry| entry.value().clone()).collect();
        Ok(self.sorted(posts))
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>, ApplicationError> {
        debug!(post_id = %id, "Getting post from in-memory store");
        Ok(self.posts.get(&id).map(|entry| entry.value().clone()))
    }

    #[instrument(skip(self))]
    async fn find_by_text(&self, query: &str) -> Result<Vec<Post>, ApplicationError> {
        debug!(query = %query, "Searching posts in in-memory store");
        let query_lower = query.to_lowercase();
        let matches = self
            .posts
            .iter()
            .filter(|entry| entry.value().matches_text(&query_lower))
            .map(|entry| entry.value().clone())
            .collect();
        Ok(self.sorted(matches))
    }

    #[instrument(skip(self, new_post))]
    async fn create(&self, new_post: NewPost) -> Result<Post, ApplicationError> {
        let id = PostId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let post = new_post.into_post(id, Utc::now());
        debug!(post_id = %id, "Saving post to in-memory store");
        self.posts.insert(id, post.clone());
        Ok(post)
    }

    #[instrument(skip(self, changes))]
    async fn update(
        &self,
        id: PostId,
        changes: PostChanges,
    ) -> Result<Option<Post>, ApplicationError> {
        debug!(post_id = %id, "Updating post in in-memory store");
        let updated = self.posts.get_mut(&id).map(|mut entry| {
            entry.value_mut().apply(&changes);
            entry.value().clone()
        });
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: PostId) -> Result<bool, ApplicationError> {
        debug!(post_id = %id, "Deleting post from in-memory store");
        Ok(self.posts.remove(&id).is_some())
    }

    async fn count(&self) -> Result<usize, ApplicationError> {
        Ok(self.posts.len())
    }
}
