//! Content-store contract: the narrow read surface this core consumes.
//! The real store (database, CMS, filesystem) lives in the host app; tests
//! and offline runs use `FixedContentStore`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ReadError;

/// Where a coverage entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageSource {
    Static,
    Published,
    Draft,
}

/// Publication status filter for the article listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleStatus {
    Published,
    Draft,
}

/// One item as the store exposes it; detection runs over title+description+slug.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredItem {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Read-only view of the two independent content sources.
///
/// Accessors return `Result` so the softening policy (treat a failed read
/// as an empty contribution) is applied visibly in `CoverageMapBuilder`,
/// not hidden inside each implementation.
pub trait ContentStore: Send + Sync {
    /// The static content listing (hand-written evergreen pages).
    fn list_static_posts(&self) -> Result<Vec<StoredItem>, ReadError>;

    /// Draft/published articles from the dynamic article store.
    fn list_articles(&self, status: ArticleStatus) -> Result<Vec<StoredItem>, ReadError>;
}

/// In-memory store for tests and offline gap analysis.
#[derive(Debug, Default, Clone)]
pub struct FixedContentStore {
    pub static_posts: Vec<StoredItem>,
    pub published: Vec<StoredItem>,
    pub drafts: Vec<StoredItem>,
}

impl ContentStore for FixedContentStore {
    fn list_static_posts(&self) -> Result<Vec<StoredItem>, ReadError> {
        Ok(self.static_posts.clone())
    }

    fn list_articles(&self, status: ArticleStatus) -> Result<Vec<StoredItem>, ReadError> {
        Ok(match status {
            ArticleStatus::Published => self.published.clone(),
            ArticleStatus::Draft => self.drafts.clone(),
        })
    }
}
