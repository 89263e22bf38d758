use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error; // For domain-specific errors
use utoipa::ToSchema;

pub const MIN_TITLE_LEN: usize = 3;
pub const MIN_CONTENT_LEN: usize = 10;
pub const MIN_AUTHOR_LEN: usize = 3;
pub const MIN_QUERY_LEN: usize = 2;

// --- Domain Errors ---
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("{0}")]
    InvalidId(String),
    #[error("{reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("{0}")]
    InvalidQuery(String),
}

// --- Post ID ---

/// Numeric identifier assigned by the store. Always greater than zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(i64);

impl PostId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<PostId> for i64 {
    fn from(id: PostId) -> Self {
        id.0
    }
}

// --- Post Entity ---

/// A titled, authored, timestamped text record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[schema(value_type = i64, example = 1)]
    pub id: PostId,
    #[schema(example = "Bem-vindo ao Diario")]
    pub title: String,
    #[schema(example = "Este é o primeiro post do sistema.")]
    pub content: String,
    #[schema(example = "Professor João")]
    pub author: String,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Case-insensitive substring match against title or content.
    /// `query_lower` must already be lowercased.
    pub fn matches_text(&self, query_lower: &str) -> bool {
        self.title.to_lowercase().contains(query_lower)
            || self.content.to_lowercase().contains(query_lower)
    }

    /// Applies a validated partial update. `id` and `created_at` are never touched.
    pub fn apply(&mut self, changes: &PostChanges) {
        if let Some(title) = changes.title() {
            self.title = title.to_string();
        }
        if let Some(content) = changes.content() {
            self.content = content.to_string();
        }
        if let Some(author) = changes.author() {
            self.author = author.to_string();
        }
    }
}

/// Validated fields for a post that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    title: String,
    content: String,
    author: String,
}

impl NewPost {
    /// Validates title, content and author in that order, stopping at the first failure.
    /// Missing fields are treated as empty.
    pub fn parse(
        title: Option<&str>,
        content: Option<&str>,
        author: Option<&str>,
    ) -> Result<Self, DomainError> {
        let title = validate_title(title.unwrap_or_default())?;
        let content = validate_content(content.unwrap_or_default())?;
        let author = validate_author(author.unwrap_or_default())?;
        Ok(Self {
            title,
            content,
            author,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    /// Turns the validated fields into a stored post.
    pub fn into_post(self, id: PostId, created_at: DateTime<Utc>) -> Post {
        Post {
            id,
            title: self.title,
            content: self.content,
            author: self.author,
            created_at,
        }
    }
}

/// Validated partial update. Only supplied fields are present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostChanges {
    title: Option<String>,
    content: Option<String>,
    author: Option<String>,
}

impl PostChanges {
    /// Validates only the supplied fields (title, content, author order).
    pub fn parse(
        title: Option<&str>,
        content: Option<&str>,
        author: Option<&str>,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            title: title.map(validate_title).transpose()?,
            content: content.map(validate_content).transpose()?,
            author: author.map(validate_author).transpose()?,
        })
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.author.is_none()
    }
}

// --- Validators ---

/// Parses a raw path segment into a [`PostId`]. Must be an integer greater than zero.
pub fn validate_id(raw: &str) -> Result<PostId, DomainError> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(PostId(id)),
        _ => Err(DomainError::InvalidId(
            "Invalid ID. It must be a number greater than zero.".to_string(),
        )),
    }
}

pub fn validate_title(title: &str) -> Result<String, DomainError> {
    validate_text_field("title", title, MIN_TITLE_LEN, "Title")
}

pub fn validate_content(content: &str) -> Result<String, DomainError> {
    validate_text_field("content", content, MIN_CONTENT_LEN, "Content")
}

pub fn validate_author(author: &str) -> Result<String, DomainError> {
    validate_text_field("author", author, MIN_AUTHOR_LEN, "Author")
}

/// Returns the trimmed search term.
pub fn validate_query(query: &str) -> Result<String, DomainError> {
    let trimmed = query.trim();
    if trimmed.chars().count() < MIN_QUERY_LEN {
        return Err(DomainError::InvalidQuery(format!(
            "Search term is required and must be at least {} characters long.",
            MIN_QUERY_LEN
        )));
    }
    Ok(trimmed.to_string())
}

// Length is measured in characters after trimming, so "  ab  " is two long.
fn validate_text_field(
    field: &'static str,
    value: &str,
    min_len: usize,
    label: &str,
) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.chars().count() < min_len {
        return Err(DomainError::InvalidField {
            field,
            reason: format!(
                "{} is required and must be at least {} characters long.",
                label, min_len
            ),
        });
    }
    Ok(trimmed.to_string())
}
