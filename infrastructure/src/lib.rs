// Module declarations
pub mod persistence;

// Re-export all implementations
pub use persistence::{
    DEFAULT_CONNECTION_STRING, DEFAULT_DATABASE, InMemoryPostRepository, MongoPostRepository,
    seed_posts,
};
