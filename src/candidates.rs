//! Candidate titles: the deterministic template source, the LLM-backed
//! source, and the uniqueness filter that keeps the blog from publishing
//! the same article twice with slightly different words.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::error::PipelineError;
use crate::gaps::{gap_score, CoverageGap};
use crate::generate::client::{TextGenClient, TextGenRequest};
use crate::generate::strip_code_fences;
use crate::similarity::trigram_similarity;
use crate::textclean::clean;
use crate::vocab::{localize, templates_for};

/// A scored title proposal. Transient; persisted only if a caller accepts it.
#[derive(Debug, Clone)]
pub struct CandidateTitle {
    pub title: String,
    pub score: u32,
    /// Human-readable scoring rationale.
    pub why: Vec<String>,
    pub keywords: Vec<String>,
    pub intent: String,
    pub city: String,
    pub audience: String,
}

/// One interface over the two "best title" strategies; selected by config.
#[async_trait]
pub trait CandidateTitleSource: Send + Sync {
    async fn candidates(
        &self,
        gaps: &[CoverageGap],
        city_focus: &str,
        audiences: &[String],
    ) -> Result<Vec<CandidateTitle>, PipelineError>;
}

fn rationale(gap: &CoverageGap, city: &str, audience: &str) -> Vec<String> {
    vec![
        format!("intent \"{}\" covered {} time(s)", gap.intent, gap.coverage_count),
        format!("staleness {}/10", gap.staleness),
        format!(
            "freshness-relevant: {}",
            if gap.is_freshness_relevant { "yes" } else { "no" }
        ),
        format!("audience {audience}, city {city}"),
    ]
}

/// Top gaps by score, highest first.
pub fn top_gaps(gaps: &[CoverageGap], n: usize) -> Vec<&CoverageGap> {
    let mut ranked: Vec<&CoverageGap> = gaps.iter().collect();
    ranked.sort_by_key(|g| std::cmp::Reverse(gap_score(g)));
    ranked.truncate(n);
    ranked
}

/// Deterministic fallback path: fixed per-(intent, audience) templates
/// with the focus city substituted in.
pub struct TemplateTitleSource {
    pub top_n: usize,
}

impl Default for TemplateTitleSource {
    fn default() -> Self {
        Self { top_n: 3 }
    }
}

#[async_trait]
impl CandidateTitleSource for TemplateTitleSource {
    async fn candidates(
        &self,
        gaps: &[CoverageGap],
        city_focus: &str,
        audiences: &[String],
    ) -> Result<Vec<CandidateTitle>, PipelineError> {
        let mut out = Vec::new();
        for gap in top_gaps(gaps, self.top_n) {
            for audience in audiences {
                for template in templates_for(&gap.intent, audience) {
                    let title = localize(template, city_focus);
                    out.push(CandidateTitle {
                        title,
                        score: gap_score(gap),
                        why: rationale(gap, city_focus, audience),
                        keywords: vec![localize(&format!("{{city}} {}", gap.intent), city_focus)],
                        intent: gap.intent.clone(),
                        city: city_focus.to_string(),
                        audience: audience.clone(),
                    });
                }
            }
        }
        Ok(out)
    }
}

/// LLM-backed source: one prompt listing the top gaps, asking for titles.
pub struct GeneratorTitleSource<'a> {
    client: &'a dyn TextGenClient,
    pub top_n: usize,
}

impl<'a> GeneratorTitleSource<'a> {
    pub fn new(client: &'a dyn TextGenClient) -> Self {
        Self { client, top_n: 3 }
    }
}

#[derive(Deserialize)]
struct TitlesPayload {
    titles: Vec<RawTitle>,
}

#[derive(Deserialize)]
struct RawTitle {
    title: String,
    #[serde(default)]
    intent: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    audience: String,
}

#[async_trait]
impl<'a> CandidateTitleSource for GeneratorTitleSource<'a> {
    async fn candidates(
        &self,
        gaps: &[CoverageGap],
        city_focus: &str,
        audiences: &[String],
    ) -> Result<Vec<CandidateTitle>, PipelineError> {
        let ranked = top_gaps(gaps, self.top_n);
        let gap_lines: Vec<String> = ranked
            .iter()
            .map(|g| {
                format!(
                    "- {} (covered {}x, staleness {}/10, score {})",
                    g.intent,
                    g.coverage_count,
                    g.staleness,
                    gap_score(g)
                )
            })
            .collect();
        let prompt = format!(
            "You name blog articles for a {city_focus} city blog (audiences: {}).\n\
             Under-covered topic gaps, highest priority first:\n{}\n\
             Return a JSON object {{\"titles\": [{{\"title\", \"intent\", \"audience\", \"keywords\"}}]}} \
             with one title per gap-audience pair. Pick a different gap each time; never reuse an \
             angle you already proposed. No em or en dashes.",
            audiences.join(", "),
            gap_lines.join("\n")
        );

        let resp = self
            .client
            .generate(TextGenRequest {
                prompt,
                json_mode: true,
            })
            .await?;

        let parsed: TitlesPayload = serde_json::from_str(strip_code_fences(&resp.text))
            .map_err(|e| PipelineError::TopicsUnusable(format!("title JSON unparseable: {e}")))?;

        let out = parsed
            .titles
            .into_iter()
            .filter(|t| !t.title.trim().is_empty())
            .map(|t| {
                let gap = ranked.iter().find(|g| g.intent == t.intent);
                let (score, why) = match gap {
                    Some(g) => (gap_score(g), rationale(g, city_focus, &t.audience)),
                    None => {
                        warn!(intent = %t.intent, "generated title names an unranked intent");
                        (0, vec!["intent not in the ranked gap list".to_string()])
                    }
                };
                CandidateTitle {
                    title: clean(&t.title),
                    score,
                    why,
                    keywords: t.keywords.iter().map(|k| clean(k)).collect(),
                    intent: t.intent,
                    city: city_focus.to_string(),
                    audience: t.audience,
                }
            })
            .collect();
        Ok(out)
    }
}

/// Outcome of the uniqueness pass: survivors plus the best rejected
/// candidate, which the orchestrator may fall back to.
#[derive(Debug, Default)]
pub struct UniquenessOutcome {
    pub unique: Vec<CandidateTitle>,
    pub best_rejected: Option<CandidateTitle>,
}

/// Drops candidates too similar to any existing title.
pub struct UniquenessFilter {
    pub threshold: f64,
}

impl Default for UniquenessFilter {
    fn default() -> Self {
        Self { threshold: 0.62 }
    }
}

impl UniquenessFilter {
    pub fn filter_unique(
        &self,
        candidates: Vec<CandidateTitle>,
        existing_titles: &[String],
    ) -> UniquenessOutcome {
        let mut out = UniquenessOutcome::default();
        for cand in candidates {
            let too_similar = existing_titles
                .iter()
                .any(|t| trigram_similarity(&cand.title, t) > self.threshold);
            if too_similar {
                let better = out
                    .best_rejected
                    .as_ref()
                    .map(|b| cand.score > b.score)
                    .unwrap_or(true);
                if better {
                    out.best_rejected = Some(cand);
                }
            } else {
                out.unique.push(cand);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gap(intent: &str, count: usize, staleness: u8) -> CoverageGap {
        CoverageGap {
            intent: intent.into(),
            is_freshness_relevant: crate::vocab::is_time_sensitive(intent),
            coverage_count: count,
            last_covered_at: None,
            staleness,
        }
    }

    #[tokio::test]
    async fn template_source_emits_scored_candidates() {
        let gaps = vec![gap("visa", 0, 10), gap("culture", 4, 1)];
        let source = TemplateTitleSource::default();
        let cands = source
            .candidates(&gaps, "Phnom Penh", &["TEACHERS".to_string()])
            .await
            .unwrap();
        assert!(!cands.is_empty());
        let first = &cands[0];
        assert_eq!(first.intent, "visa");
        assert!(first.title.contains("Phnom Penh"));
        assert_eq!(first.score, 85); // 40 + 30 + 15
        assert!(first.why.iter().any(|w| w.contains("covered 0 time")));
    }

    #[tokio::test]
    async fn template_source_localizes_other_cities() {
        let gaps = vec![gap("visa", 0, 10)];
        let source = TemplateTitleSource::default();
        let cands = source
            .candidates(&gaps, "Kampot", &["TRAVELLERS".to_string()])
            .await
            .unwrap();
        assert!(cands.iter().all(|c| c.title.contains("Kampot")));
    }

    #[test]
    fn top_gaps_ranks_by_score() {
        let gaps = vec![gap("culture", 4, 1), gap("visa", 0, 10), gap("food", 1, 5)];
        let ranked = top_gaps(&gaps, 2);
        assert_eq!(ranked[0].intent, "visa");
        assert_eq!(ranked[1].intent, "food");
    }

    #[test]
    fn near_duplicate_candidate_is_rejected() {
        let cand = CandidateTitle {
            title: "Phnom Penh Visa Guide 2025".into(),
            score: 50,
            why: vec![],
            keywords: vec![],
            intent: "visa".into(),
            city: "Phnom Penh".into(),
            audience: "TRAVELLERS".into(),
        };
        let existing = vec!["Phnom Penh Visa Guide for 2025".to_string()];
        let outcome = UniquenessFilter::default().filter_unique(vec![cand], &existing);
        assert!(outcome.unique.is_empty());
        assert_eq!(
            outcome.best_rejected.unwrap().title,
            "Phnom Penh Visa Guide 2025"
        );
    }

    #[test]
    fn dissimilar_candidate_survives() {
        let cand = CandidateTitle {
            title: "Commuting in Phnom Penh: What Teachers Need to Know".into(),
            score: 50,
            why: vec![],
            keywords: vec![],
            intent: "transport".into(),
            city: "Phnom Penh".into(),
            audience: "TEACHERS".into(),
        };
        let existing = vec!["Phnom Penh Visa Guide for 2025".to_string()];
        let outcome = UniquenessFilter::default().filter_unique(vec![cand], &existing);
        assert_eq!(outcome.unique.len(), 1);
        assert!(outcome.best_rejected.is_none());
    }
}
