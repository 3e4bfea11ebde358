// src/generate/mod.rs
pub mod client;
pub mod queries;
pub mod search;
pub mod topics;

use metrics::{describe_counter, describe_histogram};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on the host's /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "pipeline_queries_total",
            "Search queries produced by Stage A."
        );
        describe_counter!(
            "pipeline_results_kept_total",
            "Search results kept after canonicalization and filtering."
        );
        describe_counter!(
            "pipeline_results_rejected_total",
            "Search results rejected (duplicate, blocked, or thin snippet)."
        );
        describe_counter!(
            "pipeline_repairs_total",
            "Repair calls issued after validation failures."
        );
        describe_counter!("pipeline_topics_total", "Grounded topics produced.");
        describe_histogram!("search_fetch_ms", "Web-search call time in milliseconds.");
    });
}

/// Strip Markdown code fences the generator sometimes wraps JSON in.
pub(crate) fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the fence line.
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start_matches('\n')
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}
