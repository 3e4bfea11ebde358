// src/lib.rs
// Public library surface for the content-gap / grounded-topic core.

pub mod config;
pub mod coverage;
pub mod error;
pub mod gaps;
pub mod history;
pub mod rotation;
pub mod similarity;
pub mod sources;
pub mod store;
pub mod textclean;
pub mod vocab;

// Grounded generation pipeline (clients, search, Stage A/B, orchestration)
pub mod candidates;
pub mod generate;
pub mod pipeline;

// ---- Re-exports for stable public API ----
pub use crate::candidates::{CandidateTitle, CandidateTitleSource, UniquenessFilter};
pub use crate::error::{GenError, PipelineError, ReadError};
pub use crate::gaps::{gap_score, identify_gaps, CoverageGap};
pub use crate::generate::client::{ScriptedTextGen, TextGenClient};
pub use crate::generate::search::{ScriptedSearch, SearchClient, SearchResult};
pub use crate::generate::topics::{Audience, NewsTopic};
pub use crate::pipeline::{Pipeline, PipelineLog};
pub use crate::rotation::TopicRotator;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR APP_ENV in {local, development, dev})
///   - GAP_DEV_LOG=1
pub fn enable_dev_tracing() {
    let dev_flag = std::env::var("GAP_DEV_LOG").ok().is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("APP_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("content_gap_analyzer=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}
