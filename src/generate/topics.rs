//! Stage B: grounded topic variations. The prompt embeds the Stage A
//! search results as the only allowed citation pool; cleaning makes the
//! model's output safe to use, strict validation decides whether a repair
//! call is needed, and the repaired output is re-validated before it may
//! replace the original.

use std::collections::HashSet;

use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::generate::client::{TextGenClient, TextGenRequest};
use crate::generate::search::SearchResult;
use crate::generate::strip_code_fences;
use crate::textclean::{clean, has_forbidden_dash};
use crate::vocab::{COUNTRY_TOKEN, COUNTRY_WIDE_FOCUS};

pub const MIN_TOPICS: usize = 4;
pub const MAX_TOPICS: usize = 8;
pub const MAX_SOURCE_URLS: usize = 3;

/// Which reader segment a topic targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Audience {
    Travellers,
    Teachers,
}

impl Audience {
    pub const ALL: [Audience; 2] = [Audience::Travellers, Audience::Teachers];

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "TRAVELLERS" => Some(Audience::Travellers),
            "TEACHERS" => Some(Audience::Teachers),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedKeywords {
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub secondary: Vec<String>,
}

/// One grounded topic, cleaned and safe to hand to the article generator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsTopic {
    pub id: String,
    pub title: String,
    pub angle: String,
    pub why_it_matters: String,
    pub audience_fit: Vec<Audience>,
    pub suggested_keywords: SuggestedKeywords,
    pub search_queries: Vec<String>,
    pub intent: String,
    pub outline_angles: Vec<String>,
    /// Grounding invariant: every entry equals a normalized URL from the
    /// result pool of this run; 1..=3 entries, no duplicates.
    pub source_urls: Vec<String>,
    pub source_count: usize,
    pub from_seed_title: bool,
}

/// The shape as the model returns it, before cleaning. Tolerant of
/// missing fields and out-of-enum audience strings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTopic {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub angle: String,
    #[serde(default)]
    pub why_it_matters: String,
    #[serde(default)]
    pub audience_fit: Vec<String>,
    #[serde(default)]
    pub suggested_keywords: SuggestedKeywords,
    #[serde(default)]
    pub search_queries: Vec<String>,
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub outline_angles: Vec<String>,
    #[serde(default)]
    pub source_urls: Vec<String>,
    #[serde(default)]
    pub from_seed_title: bool,
}

#[derive(Debug, Clone)]
pub struct TopicBatch {
    pub topics: Vec<NewsTopic>,
    pub token_usage: u32,
}

#[derive(Deserialize)]
struct TopicsPayload {
    topics: Vec<RawTopic>,
}

fn parse_topics(raw: &str) -> Option<Vec<RawTopic>> {
    let body = strip_code_fences(raw);
    serde_json::from_str::<TopicsPayload>(body)
        .map(|p| p.topics)
        .or_else(|_| serde_json::from_str::<Vec<RawTopic>>(body))
        .ok()
}

fn focus_term(city_focus: &str) -> &str {
    if city_focus.eq_ignore_ascii_case(COUNTRY_WIDE_FOCUS) {
        COUNTRY_TOKEN
    } else {
        city_focus
    }
}

/// Normalized allowed-URL set from the result pool.
pub fn allowed_urls(results: &[SearchResult]) -> HashSet<String> {
    results
        .iter()
        .map(|r| crate::sources::normalize_url(&r.url))
        .collect()
}

/// Best-effort cleaning: always produces usable data, even from an
/// imperfect batch. Ungrounded URLs and unknown audiences are dropped
/// silently; free text goes through the text cleaner.
pub fn validate_and_clean_topics(raw: Vec<RawTopic>, allowed: &HashSet<String>) -> Vec<NewsTopic> {
    raw.into_iter()
        .enumerate()
        .map(|(i, t)| {
            let mut seen = HashSet::new();
            let source_urls: Vec<String> = t
                .source_urls
                .iter()
                .map(|u| crate::sources::normalize_url(u))
                .filter(|u| allowed.contains(u))
                .filter(|u| seen.insert(u.clone()))
                .take(MAX_SOURCE_URLS)
                .collect();

            let mut audience_fit: Vec<Audience> = t
                .audience_fit
                .iter()
                .filter_map(|s| Audience::parse(s))
                .collect();
            audience_fit.sort();
            audience_fit.dedup();
            if audience_fit.is_empty() {
                audience_fit = Audience::ALL.to_vec();
            }

            NewsTopic {
                id: if t.id.trim().is_empty() {
                    format!("t{}", i + 1)
                } else {
                    t.id
                },
                title: clean(&t.title),
                angle: clean(&t.angle),
                why_it_matters: clean(&t.why_it_matters),
                audience_fit,
                suggested_keywords: SuggestedKeywords {
                    target: clean(&t.suggested_keywords.target),
                    secondary: t.suggested_keywords.secondary.iter().map(|s| clean(s)).collect(),
                },
                search_queries: t.search_queries.iter().map(|s| clean(s)).collect(),
                intent: t.intent.trim().to_lowercase(),
                outline_angles: t.outline_angles.iter().map(|s| clean(s)).collect(),
                source_count: source_urls.len(),
                source_urls,
                from_seed_title: t.from_seed_title,
            }
        })
        .collect()
}

/// Strict invariant check over the raw (pre-clean) batch. Returns
/// human-readable failures; empty = valid.
pub fn validate_topics_strict(
    raw: &[RawTopic],
    allowed: &HashSet<String>,
    city_focus: &str,
    current_year: i32,
) -> Vec<String> {
    let mut failures = Vec::new();

    if raw.len() < MIN_TOPICS || raw.len() > MAX_TOPICS {
        failures.push(format!(
            "expected {MIN_TOPICS}-{MAX_TOPICS} topics, got {}",
            raw.len()
        ));
    }
    if let Some(first) = raw.first() {
        if !first.from_seed_title {
            failures.push("topic 1 must set fromSeedTitle=true and track the seed title".into());
        }
    }

    let focus = focus_term(city_focus).to_lowercase();
    static RE_YEAR: OnceCell<Regex> = OnceCell::new();
    let re_year = RE_YEAR.get_or_init(|| Regex::new(r"\b(20\d{2})\b").unwrap());

    for (i, t) in raw.iter().enumerate() {
        let label = format!("topic {}", i + 1);

        if !t.title.to_lowercase().contains(&focus) {
            failures.push(format!("{label}: title must mention \"{}\"", focus_term(city_focus)));
        }

        for cap in re_year.captures_iter(&t.title) {
            let y: i32 = cap[1].parse().unwrap_or(current_year);
            if y != current_year {
                failures.push(format!(
                    "{label}: title mentions {y} but the current year is {current_year}"
                ));
            }
        }

        for a in &t.audience_fit {
            if Audience::parse(a).is_none() {
                failures.push(format!(
                    "{label}: audienceFit value \"{a}\" is not TRAVELLERS or TEACHERS"
                ));
            }
        }

        let normalized: Vec<String> = t
            .source_urls
            .iter()
            .map(|u| crate::sources::normalize_url(u))
            .collect();
        if normalized.is_empty() || normalized.len() > MAX_SOURCE_URLS {
            failures.push(format!(
                "{label}: sourceUrls must have 1-{MAX_SOURCE_URLS} entries, got {}",
                normalized.len()
            ));
        }
        for u in &normalized {
            if !allowed.contains(u) {
                failures.push(format!(
                    "{label}: sourceUrls entry {u} is not in the provided result pool"
                ));
            }
        }
        let uniq: HashSet<&String> = normalized.iter().collect();
        if uniq.len() != normalized.len() {
            failures.push(format!("{label}: sourceUrls contains duplicates"));
        }

        for field in [&t.title, &t.angle, &t.why_it_matters]
            .into_iter()
            .chain(t.outline_angles.iter())
            .chain(t.search_queries.iter())
        {
            if has_forbidden_dash(field) {
                failures.push(format!("{label}: contains a forbidden dash"));
                break;
            }
        }
    }

    failures
}

fn build_prompt(
    seed_title: &str,
    city_focus: &str,
    audience_focus: &str,
    current_year: i32,
    results: &[SearchResult],
) -> String {
    let focus = focus_term(city_focus);
    let mut pool = String::new();
    for r in results {
        pool.push_str(&format!(
            "[{}] {}\n    url: {}\n    snippet: {}\n",
            r.id, r.title, r.url, r.snippet
        ));
        if let Some(d) = &r.published_at {
            pool.push_str(&format!("    published: {d}\n"));
        }
        if let Some(s) = &r.source_name {
            pool.push_str(&format!("    source: {s}\n"));
        }
    }

    format!(
        "You propose blog topics grounded ONLY in the search results below. \
         Never cite a URL that is not listed.\n\n\
         SEARCH RESULTS (the only allowed citation pool):\n{pool}\n\
         Seed title: \"{seed_title}\"\n\
         Location focus: {focus}. Primary audience: {audience_focus}. Current year: {current_year}.\n\n\
         Return a JSON object {{\"topics\": [...]}} with {MIN_TOPICS} to {MAX_TOPICS} topics. Each topic:\n\
         {{\"id\", \"title\", \"angle\", \"whyItMatters\", \"audienceFit\", \"suggestedKeywords\": {{\"target\", \"secondary\"}}, \
         \"searchQueries\", \"intent\", \"outlineAngles\", \"sourceUrls\", \"fromSeedTitle\"}}\n\
         Rules:\n\
         - Topic 1 closely tracks the seed title and sets fromSeedTitle=true; every other topic takes a materially different angle.\n\
         - Every title mentions \"{focus}\" and never a year other than {current_year}.\n\
         - audienceFit values are restricted to TRAVELLERS and TEACHERS.\n\
         - sourceUrls: 1 to {MAX_SOURCE_URLS} URLs copied exactly from the pool above, no duplicates.\n\
         - No em or en dashes anywhere."
    )
}

fn build_repair_prompt(
    previous_raw: &str,
    failures: &[String],
    allowed: &HashSet<String>,
) -> String {
    let mut urls: Vec<&String> = allowed.iter().collect();
    urls.sort();
    format!(
        "Your previous topic list failed validation.\n\
         Failures:\n{}\n\
         Allowed source URLs (use these exactly, nothing else):\n{}\n\
         Previous output:\n{}\n\
         Return a corrected JSON object {{\"topics\": [...]}} fixing every failure.",
        failures
            .iter()
            .map(|f| format!("- {f}"))
            .collect::<Vec<_>>()
            .join("\n"),
        urls.iter()
            .map(|u| format!("- {u}"))
            .collect::<Vec<_>>()
            .join("\n"),
        previous_raw
    )
}

/// Stage B entry point. Fatal when neither the original nor the repaired
/// response yields a parseable, usable batch; grounding cannot be assumed
/// from nothing.
pub async fn generate_topic_variations(
    client: &dyn TextGenClient,
    seed_title: &str,
    city_focus: &str,
    audience_focus: &str,
    current_year: i32,
    results: &[SearchResult],
) -> Result<TopicBatch, PipelineError> {
    super::ensure_metrics_described();
    let allowed = allowed_urls(results);

    let prompt = build_prompt(seed_title, city_focus, audience_focus, current_year, results);
    let resp = client
        .generate(TextGenRequest {
            prompt,
            json_mode: true,
        })
        .await?;
    let mut token_usage = resp.token_count.unwrap_or(0);

    let original = parse_topics(&resp.text);
    let failures = match &original {
        Some(raw) => validate_topics_strict(raw, &allowed, city_focus, current_year),
        None => vec!["response was not parseable topic JSON".to_string()],
    };

    if failures.is_empty() {
        let raw = original.unwrap_or_default();
        let topics = validate_and_clean_topics(raw, &allowed);
        counter!("pipeline_topics_total").increment(topics.len() as u64);
        return Ok(TopicBatch {
            topics,
            token_usage,
        });
    }

    // One bounded repair with the enumerated failures and the URL pool.
    warn!(failure_count = failures.len(), "topic batch invalid; issuing repair call");
    counter!("pipeline_repairs_total").increment(1);
    let repair_prompt = build_repair_prompt(&resp.text, &failures, &allowed);
    let repaired = match client
        .generate(TextGenRequest {
            prompt: repair_prompt,
            json_mode: true,
        })
        .await
    {
        Ok(r) => {
            token_usage += r.token_count.unwrap_or(0);
            parse_topics(&r.text)
        }
        Err(e) => {
            warn!(error = %e, "topic repair call failed");
            None
        }
    };

    match (original, repaired) {
        // Repaired output replaces the original only when it is big enough
        // AND passes re-validation.
        (_, Some(rep))
            if rep.len() >= MIN_TOPICS
                && validate_topics_strict(&rep, &allowed, city_focus, current_year).is_empty() =>
        {
            let topics = validate_and_clean_topics(rep, &allowed);
            counter!("pipeline_topics_total").increment(topics.len() as u64);
            Ok(TopicBatch {
                topics,
                token_usage,
            })
        }
        // Fall back to the original batch: cleaning alone makes it safe.
        (Some(orig), _) => {
            info!("repair unusable; falling back to cleaned original topic batch");
            let topics = validate_and_clean_topics(orig, &allowed);
            counter!("pipeline_topics_total").increment(topics.len() as u64);
            Ok(TopicBatch {
                topics,
                token_usage,
            })
        }
        // Original unparseable, repair parseable but imperfect: accept the
        // cleaned repair when it reaches the minimum count.
        (None, Some(rep)) if rep.len() >= MIN_TOPICS => {
            warn!("accepting cleaned repair output; original was unparseable");
            let topics = validate_and_clean_topics(rep, &allowed);
            counter!("pipeline_topics_total").increment(topics.len() as u64);
            Ok(TopicBatch {
                topics,
                token_usage,
            })
        }
        _ => Err(PipelineError::TopicsUnusable(
            "both generation attempts failed to produce parseable topics".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> HashSet<String> {
        ["https://example.com/a", "https://example.com/b"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn raw_topic(title: &str, urls: &[&str]) -> RawTopic {
        RawTopic {
            id: String::new(),
            title: title.into(),
            angle: "angle".into(),
            why_it_matters: "matters".into(),
            audience_fit: vec!["TRAVELLERS".into()],
            suggested_keywords: SuggestedKeywords::default(),
            search_queries: vec![],
            intent: "visa".into(),
            outline_angles: vec![],
            source_urls: urls.iter().map(|s| s.to_string()).collect(),
            from_seed_title: false,
        }
    }

    fn valid_batch() -> Vec<RawTopic> {
        let mut t0 = raw_topic("Phnom Penh Visa Rules 2025", &["https://example.com/a"]);
        t0.from_seed_title = true;
        vec![
            t0,
            raw_topic("Phnom Penh Visa Costs Compared", &["https://example.com/b"]),
            raw_topic("Phnom Penh Border Run Alternatives", &["https://example.com/a"]),
            raw_topic(
                "What Phnom Penh Expats Say About Extensions",
                &["https://example.com/a", "https://example.com/b"],
            ),
        ]
    }

    #[test]
    fn valid_batch_passes_strict() {
        let failures = validate_topics_strict(&valid_batch(), &pool(), "Phnom Penh", 2025);
        assert!(failures.is_empty(), "{failures:?}");
    }

    #[test]
    fn strict_flags_every_invariant() {
        let mut batch = valid_batch();
        batch[0].from_seed_title = false;
        batch[1].title = "Visa Costs in 2024 \u{2014} Compared".into(); // no city, stale year, dash
        batch[2].audience_fit = vec!["DIGITAL_NOMADS".into()];
        batch[3].source_urls = vec![
            "https://example.com/a".into(),
            "https://example.com/a/".into(), // duplicate after normalization
            "https://invented.example/fake".into(),
        ];

        let failures = validate_topics_strict(&batch, &pool(), "Phnom Penh", 2025);
        let text = failures.join("\n");
        assert!(text.contains("fromSeedTitle"));
        assert!(text.contains("must mention"));
        assert!(text.contains("2024"));
        assert!(text.contains("forbidden dash"));
        assert!(text.contains("DIGITAL_NOMADS"));
        assert!(text.contains("not in the provided result pool"));
        assert!(text.contains("duplicates"));
    }

    #[test]
    fn cleaning_drops_ungrounded_urls_silently() {
        let mut batch = valid_batch();
        batch[0].source_urls = vec![
            "https://www.example.com/a/".into(), // normalizes into the pool
            "https://invented.example/fake".into(),
        ];
        let cleaned = validate_and_clean_topics(batch, &pool());
        assert_eq!(cleaned[0].source_urls, vec!["https://example.com/a"]);
        assert_eq!(cleaned[0].source_count, 1);
    }

    #[test]
    fn cleaning_defaults_emptied_audience_to_both() {
        let mut batch = valid_batch();
        batch[0].audience_fit = vec!["NOMADS".into()];
        let cleaned = validate_and_clean_topics(batch, &pool());
        assert_eq!(cleaned[0].audience_fit, Audience::ALL.to_vec());
    }

    #[test]
    fn cleaning_strips_dashes_from_free_text() {
        let mut batch = valid_batch();
        batch[0].angle = "the cost angle \u{2013} with numbers".into();
        let cleaned = validate_and_clean_topics(batch, &pool());
        assert_eq!(cleaned[0].angle, "the cost angle, with numbers");
    }

    #[test]
    fn parse_accepts_wrapped_and_bare_shapes() {
        let obj = serde_json::json!({"topics": [{"title": "x"}]}).to_string();
        assert_eq!(parse_topics(&obj).unwrap().len(), 1);
        let arr = serde_json::json!([{"title": "x"}]).to_string();
        assert_eq!(parse_topics(&arr).unwrap().len(), 1);
        assert!(parse_topics("nope").is_none());
    }
}
