//! Error taxonomy for the gap-analysis / grounded-generation core.
//!
//! Soft failures (one query, one store read) are logged and skipped at the
//! call site and never appear here. Everything that propagates to a caller
//! is one of these structured variants with a human-readable reason.

use thiserror::Error;

/// Failures that propagate out of the pipeline entry points.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Stage A produced zero usable queries even after the repair attempt.
    #[error("no search queries produced: {0}")]
    NoQueries(String),

    /// Post-widening usable result count stayed below the minimum.
    #[error("only {found} usable search results (minimum {min}); refusing to generate ungrounded topics")]
    TooFewResults { found: usize, min: usize },

    /// Both Stage B parse/validation attempts failed; grounding cannot be assumed.
    #[error("topic generation unusable after repair: {0}")]
    TopicsUnusable(String),

    /// The text-generation service itself failed (transport, block, empty output).
    #[error("text generation failed: {0}")]
    Generation(#[from] GenError),

    /// Missing credentials or an unusable configuration. Surfaced immediately, not retried.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// A store accessor failed to read. The orchestrating layers decide whether
/// this degrades to an empty contribution (coverage, history) or propagates.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("malformed store data: {0}")]
    Malformed(String),
}

/// Text-generation service errors. The service-level block reason is kept verbatim.
#[derive(Debug, Error)]
pub enum GenError {
    #[error("generation request failed: {0}")]
    Transport(String),
    #[error("generation returned empty output ({0})")]
    EmptyOutput(String),
    #[error("generation blocked by provider: {0}")]
    Blocked(String),
    #[error("missing credentials for provider `{0}`")]
    MissingCredentials(&'static str),
}
