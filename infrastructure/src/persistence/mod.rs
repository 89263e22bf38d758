pub mod in_memory_repository;
pub mod mongo_repository;
pub mod seed;

// Re-export both repository types
pub use in_memory_repository::InMemoryPostRepository;
pub use mongo_repository::{DEFAULT_CONNECTION_STRING, DEFAULT_DATABASE, MongoPostRepository};
pub use seed::seed_posts;
