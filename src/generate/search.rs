//! Web-search service abstraction and the executor that turns raw query
//! batches into a deduplicated, blocklist-filtered, capped result pool.
//!
//! Queries run sequentially by design: the shared seen-URL set and the
//! hard result cap then need no synchronization.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::sources::{find_trusted_source, is_blocked_domain, normalize_url};

/// One item as the search provider returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSearchItem {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub display_domain: Option<String>,
}

/// A usable, canonicalized result. `id` is a pipeline-local sequence
/// token, valid only within one invocation.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub id: u32,
    pub query: String,
    pub title: String,
    pub snippet: String,
    pub url: String,
    pub published_at: Option<String>,
    pub source_name: Option<String>,
}

#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Absent credentials yield an empty list, not an error.
    async fn search(&self, query: &str, count: usize) -> anyhow::Result<Vec<RawSearchItem>>;
    fn name(&self) -> &'static str;
}

/// Brave web-search provider.
pub struct BraveSearch {
    http: reqwest::Client,
    api_key: Option<String>,
}

impl BraveSearch {
    pub fn new(api_key: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("content-gap-analyzer/0.1 (+github.com/wheretoteach/content-gap-analyzer)")
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(8))
            .build()
            .expect("reqwest client");
        Self { http, api_key }
    }
}

#[derive(Deserialize)]
struct BraveResp {
    #[serde(default)]
    web: Option<BraveWeb>,
}
#[derive(Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveItem>,
}
#[derive(Deserialize)]
struct BraveItem {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    age: Option<String>,
    #[serde(default)]
    profile: Option<BraveProfile>,
}
#[derive(Deserialize)]
struct BraveProfile {
    #[serde(default)]
    name: Option<String>,
}

#[async_trait]
impl SearchClient for BraveSearch {
    async fn search(&self, query: &str, count: usize) -> anyhow::Result<Vec<RawSearchItem>> {
        let Some(key) = self.api_key.as_deref() else {
            return Ok(Vec::new());
        };

        let resp = self
            .http
            .get("https://api.search.brave.com/res/v1/web/search")
            .header("X-Subscription-Token", key)
            .query(&[("q", query), ("count", &count.to_string())])
            .send()
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("search returned {}", resp.status());
        }
        let body: BraveResp = resp.json().await?;
        let items = body.web.map(|w| w.results).unwrap_or_default();
        Ok(items
            .into_iter()
            .map(|it| RawSearchItem {
                title: it.title,
                url: it.url,
                snippet: it.description,
                published_at: it.age,
                display_domain: it.profile.and_then(|p| p.name),
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "brave"
    }
}

/// Scripted search client for tests: fixed responses per query, recorded
/// call order.
#[derive(Default)]
pub struct ScriptedSearch {
    by_query: Mutex<HashMap<String, VecDeque<Vec<RawSearchItem>>>>,
    fallback: Mutex<Vec<RawSearchItem>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSearch {
    pub fn stub(&self, query: &str, items: Vec<RawSearchItem>) {
        self.by_query
            .lock()
            .expect("scripted search")
            .entry(query.to_string())
            .or_default()
            .push_back(items);
    }

    /// Items returned for any query without an explicit stub.
    pub fn stub_fallback(&self, items: Vec<RawSearchItem>) {
        *self.fallback.lock().expect("scripted search") = items;
    }

    pub fn queries_seen(&self) -> Vec<String> {
        self.calls.lock().expect("scripted search").clone()
    }
}

#[async_trait]
impl SearchClient for ScriptedSearch {
    async fn search(&self, query: &str, _count: usize) -> anyhow::Result<Vec<RawSearchItem>> {
        self.calls
            .lock()
            .expect("scripted search")
            .push(query.to_string());
        if let Some(q) = self.by_query.lock().expect("scripted search").get_mut(query) {
            if let Some(items) = q.pop_front() {
                return Ok(items);
            }
        }
        Ok(self.fallback.lock().expect("scripted search").clone())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

pub const MAX_RESULTS_DEFAULT: usize = 15;
const MIN_SNIPPET_CHARS: usize = 20;
const PER_QUERY_COUNT: usize = 8;

/// Executes a query batch and owns the dedup set, blocklist filter,
/// snippet floor, and result cap.
pub struct SearchExecutor<'a> {
    client: &'a dyn SearchClient,
    max_results: usize,
}

impl<'a> SearchExecutor<'a> {
    pub fn new(client: &'a dyn SearchClient, max_results: usize) -> Self {
        Self {
            client,
            max_results,
        }
    }

    /// Run queries one at a time. A failed query is skipped with a warning,
    /// never aborting the batch. Returns at most `max_results` results with
    /// monotonically increasing local ids.
    pub async fn execute(&self, queries: &[String]) -> Vec<SearchResult> {
        self.execute_seeded(queries, &mut HashSet::new(), 0).await
    }

    /// Variant used by query widening: carries the seen-URL set and id
    /// offset across the original and widened batches so merged results
    /// stay deduplicated.
    pub async fn execute_seeded(
        &self,
        queries: &[String],
        seen: &mut HashSet<String>,
        next_id: u32,
    ) -> Vec<SearchResult> {
        super::ensure_metrics_described();
        let mut out: Vec<SearchResult> = Vec::new();
        let mut id = next_id;
        let mut rejected = 0usize;

        'queries: for query in queries {
            if out.len() >= self.max_results {
                break;
            }
            let t0 = std::time::Instant::now();
            let items = match self.client.search(query, PER_QUERY_COUNT).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, query, "search query failed; skipping");
                    continue;
                }
            };
            histogram!("search_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

            for item in items {
                let canonical = normalize_url(&item.url);
                if !seen.insert(canonical.clone()) {
                    rejected += 1;
                    continue;
                }
                if is_blocked_domain(&canonical) {
                    debug!(url = %canonical, "blocked domain");
                    rejected += 1;
                    continue;
                }
                if item.snippet.trim().chars().count() < MIN_SNIPPET_CHARS {
                    rejected += 1;
                    continue;
                }

                let source_name = find_trusted_source(&canonical)
                    .map(|t| t.publisher.to_string())
                    .or(item.display_domain);
                out.push(SearchResult {
                    id,
                    query: query.clone(),
                    title: item.title,
                    snippet: item.snippet,
                    url: canonical,
                    published_at: item.published_at,
                    source_name,
                });
                id += 1;
                if out.len() >= self.max_results {
                    break 'queries;
                }
            }
        }

        counter!("pipeline_results_kept_total").increment(out.len() as u64);
        counter!("pipeline_results_rejected_total").increment(rejected as u64);
        out
    }
}
