//! Coverage map: a flat snapshot of what the blog already covers, tagged
//! with detected intents, cities, and audiences. Rebuilt on every analysis
//! call; nothing here is cached across invocations.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::ReadError;
use crate::store::{ArticleStatus, ContentStore, CoverageSource, StoredItem};
use crate::vocab::{AUDIENCE_VOCABULARY, CITY_VOCABULARY, INTENT_VOCABULARY};

/// Immutable coverage snapshot for one stored item.
#[derive(Debug, Clone)]
pub struct CoverageEntry {
    pub slug: String,
    pub title: String,
    pub intents: BTreeSet<String>,
    pub cities: BTreeSet<String>,
    pub audiences: BTreeSet<String>,
    pub source: CoverageSource,
    pub created_at: Option<DateTime<Utc>>,
}

/// Substring detection against the fixed intent vocabulary.
pub fn detect_intents(text: &str) -> BTreeSet<String> {
    let hay = text.to_lowercase();
    INTENT_VOCABULARY
        .iter()
        .filter(|def| def.keywords.iter().any(|k| hay.contains(k)))
        .map(|def| def.intent.to_string())
        .collect()
}

/// Substring detection against the known city list (case-insensitive).
pub fn detect_cities(text: &str) -> BTreeSet<String> {
    let hay = text.to_lowercase();
    CITY_VOCABULARY
        .iter()
        .filter(|c| hay.contains(&c.to_lowercase()))
        .map(|c| c.to_string())
        .collect()
}

/// Substring detection against audience keyword sets.
pub fn detect_audiences(text: &str) -> BTreeSet<String> {
    let hay = text.to_lowercase();
    AUDIENCE_VOCABULARY
        .iter()
        .filter(|(_, kws)| kws.iter().any(|k| hay.contains(k)))
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Builds the coverage map from the two independent content sources.
pub struct CoverageMapBuilder {
    store: Arc<dyn ContentStore>,
}

impl CoverageMapBuilder {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Read both sources defensively and tag every item. A failed read
    /// contributes an empty list; the partial map is always returned.
    pub fn build(&self) -> Vec<CoverageEntry> {
        let statics = soften(self.store.list_static_posts(), "static posts");
        let published = soften(
            self.store.list_articles(ArticleStatus::Published),
            "published articles",
        );
        let drafts = soften(
            self.store.list_articles(ArticleStatus::Draft),
            "draft articles",
        );

        let mut out = Vec::with_capacity(statics.len() + published.len() + drafts.len());
        for it in statics {
            out.push(tag_item(it, CoverageSource::Static));
        }
        for it in published {
            out.push(tag_item(it, CoverageSource::Published));
        }
        for it in drafts {
            out.push(tag_item(it, CoverageSource::Draft));
        }
        out
    }
}

/// The single place where a `ReadError` is downgraded to "no contribution".
fn soften(res: Result<Vec<StoredItem>, ReadError>, what: &str) -> Vec<StoredItem> {
    match res {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, source = what, "coverage source unavailable; using empty list");
            Vec::new()
        }
    }
}

fn tag_item(item: StoredItem, source: CoverageSource) -> CoverageEntry {
    let hay = format!("{} {} {}", item.title, item.description, item.slug);
    CoverageEntry {
        intents: detect_intents(&hay),
        cities: detect_cities(&hay),
        audiences: detect_audiences(&hay),
        slug: item.slug,
        title: item.title,
        source,
        created_at: item.created_at,
    }
}
