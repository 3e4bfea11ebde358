//! Stage A: turn a seed title into validated web-search queries.
//!
//! The model's self-report is never trusted: every constraint is
//! re-checked programmatically, and a single repair attempt restates the
//! exact violations. A repair that still fails validation is discarded in
//! favor of the original batch.

use metrics::counter;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::generate::client::{TextGenClient, TextGenRequest};
use crate::generate::strip_code_fences;
use crate::textclean::has_forbidden_dash;
use crate::vocab::{COUNTRY_TOKEN, COUNTRY_WIDE_FOCUS};

pub const MIN_QUERIES: usize = 4;
pub const MAX_QUERIES: usize = 6;

#[derive(Debug, Clone)]
pub struct QueryBatch {
    pub queries: Vec<String>,
    pub token_usage: u32,
}

/// The place-name every query-count rule is checked against.
fn focus_term(city_focus: &str) -> &str {
    if city_focus.eq_ignore_ascii_case(COUNTRY_WIDE_FOCUS) {
        COUNTRY_TOKEN
    } else {
        city_focus
    }
}

/// Programmatic re-check of every Stage A constraint. Empty = valid.
pub fn validate_queries(
    queries: &[String],
    city_focus: &str,
    seed_title: &str,
    current_year: i32,
) -> Vec<String> {
    let mut violations = Vec::new();

    if queries.len() < MIN_QUERIES || queries.len() > MAX_QUERIES {
        violations.push(format!(
            "expected {MIN_QUERIES}-{MAX_QUERIES} queries, got {}",
            queries.len()
        ));
    }

    let focus = focus_term(city_focus);
    let focus_mentions = queries
        .iter()
        .filter(|q| q.to_lowercase().contains(&focus.to_lowercase()))
        .count();
    if focus_mentions < 2 {
        violations.push(format!(
            "at least 2 queries must mention \"{focus}\", found {focus_mentions}"
        ));
    }

    let year = current_year.to_string();
    if seed_title.contains(&year) && !queries.iter().any(|q| q.contains(&year)) {
        violations.push(format!(
            "seed title mentions {year} but no query contains it"
        ));
    }

    for q in queries {
        if has_forbidden_dash(q) {
            violations.push(format!("query contains a forbidden dash: \"{q}\""));
        }
    }

    violations
}

#[derive(Deserialize)]
struct QueriesPayload {
    queries: Vec<String>,
}

/// Accepts `{"queries": [..]}` or, defensively, a bare JSON array.
fn parse_queries(raw: &str) -> Option<Vec<String>> {
    let body = strip_code_fences(raw);
    let parsed: Vec<String> = serde_json::from_str::<QueriesPayload>(body)
        .map(|p| p.queries)
        .or_else(|_| serde_json::from_str::<Vec<String>>(body))
        .ok()?;
    let cleaned: Vec<String> = parsed
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();
    Some(cleaned)
}

fn build_prompt(seed_title: &str, city_focus: &str, audience_focus: &str, current_year: i32) -> String {
    let focus = focus_term(city_focus);
    let year_rule = if seed_title.contains(&current_year.to_string()) {
        format!("- The seed title mentions {current_year}; at least 1 query must contain {current_year}.\n")
    } else {
        String::new()
    };
    format!(
        "You generate web-search queries for researching a blog article.\n\
         Seed title: \"{seed_title}\"\n\
         Location focus: {focus}. Audience: {audience_focus}.\n\
         Return a JSON object {{\"queries\": [...]}} with {MIN_QUERIES} to {MAX_QUERIES} short search queries.\n\
         Rules:\n\
         - At least 2 queries must mention \"{focus}\".\n\
         {year_rule}\
         - Plain search phrases only, no operators, no em or en dashes.\n\
         - Each query targets a different aspect of the seed topic."
    )
}

fn build_repair_prompt(original: &[String], violations: &[String]) -> String {
    format!(
        "Your previous search-query list was invalid.\n\
         Previous queries: {}\n\
         Violations:\n{}\n\
         Return a corrected JSON object {{\"queries\": [...]}} that fixes every violation. \
         Keep valid queries unchanged.",
        serde_json::to_string(original).unwrap_or_else(|_| "[]".into()),
        violations
            .iter()
            .map(|v| format!("- {v}"))
            .collect::<Vec<_>>()
            .join("\n")
    )
}

/// Stage A entry point. Returns the validated batch, or the original batch
/// when only the repair failed, or `PipelineError::NoQueries` when there is
/// nothing usable at all.
pub async fn generate_search_queries(
    client: &dyn TextGenClient,
    seed_title: &str,
    city_focus: &str,
    audience_focus: &str,
    current_year: i32,
) -> Result<QueryBatch, PipelineError> {
    super::ensure_metrics_described();

    let prompt = build_prompt(seed_title, city_focus, audience_focus, current_year);
    let resp = client
        .generate(TextGenRequest {
            prompt,
            json_mode: true,
        })
        .await?;
    let mut token_usage = resp.token_count.unwrap_or(0);

    let original = parse_queries(&resp.text).unwrap_or_default();
    if original.is_empty() {
        return Err(PipelineError::NoQueries(
            "generation response contained no parseable queries".into(),
        ));
    }

    let violations = validate_queries(&original, city_focus, seed_title, current_year);
    if violations.is_empty() {
        counter!("pipeline_queries_total").increment(original.len() as u64);
        return Ok(QueryBatch {
            queries: original,
            token_usage,
        });
    }

    // Exactly one repair attempt, restating the specific violations.
    warn!(?violations, "query batch invalid; issuing repair call");
    counter!("pipeline_repairs_total").increment(1);
    let repair_prompt = build_repair_prompt(&original, &violations);
    match client
        .generate(TextGenRequest {
            prompt: repair_prompt,
            json_mode: true,
        })
        .await
    {
        Ok(repair_resp) => {
            token_usage += repair_resp.token_count.unwrap_or(0);
            let repaired = parse_queries(&repair_resp.text).unwrap_or_default();
            let repair_violations =
                validate_queries(&repaired, city_focus, seed_title, current_year);
            if repair_violations.is_empty() {
                counter!("pipeline_queries_total").increment(repaired.len() as u64);
                return Ok(QueryBatch {
                    queries: repaired,
                    token_usage,
                });
            }
            // Unvalidated repair loses to the once-validated original.
            info!(
                ?repair_violations,
                "repair still invalid; keeping the original query batch"
            );
        }
        Err(e) => warn!(error = %e, "repair call failed; keeping the original query batch"),
    }

    counter!("pipeline_queries_total").increment(original.len() as u64);
    Ok(QueryBatch {
        queries: original,
        token_usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qs(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn valid_batch_has_no_violations() {
        let queries = qs(&[
            "Phnom Penh visa rules 2025",
            "Phnom Penh visa extension cost",
            "cambodia e-visa changes",
            "visa run schedule 2025",
        ]);
        assert!(validate_queries(&queries, "Phnom Penh", "Phnom Penh Visa Rules 2025", 2025)
            .is_empty());
    }

    #[test]
    fn missing_year_and_focus_are_flagged() {
        let queries = qs(&[
            "visa rules",
            "visa extension cost",
            "e-visa changes",
            "visa run schedule",
        ]);
        let violations =
            validate_queries(&queries, "Phnom Penh", "Phnom Penh Visa Rules 2025", 2025);
        assert_eq!(violations.len(), 2);
        assert!(violations[0].contains("Phnom Penh"));
        assert!(violations[1].contains("2025"));
    }

    #[test]
    fn country_wide_focus_checks_country_token() {
        let queries = qs(&[
            "Cambodia visa rules",
            "Cambodia border crossings",
            "e-visa online",
            "visa agent reviews",
        ]);
        assert!(validate_queries(&queries, "country-wide", "Visa Basics", 2025).is_empty());
    }

    #[test]
    fn forbidden_dash_is_flagged() {
        let queries = qs(&[
            "Phnom Penh visa \u{2014} new rules",
            "Phnom Penh e-visa",
            "cambodia visa cost",
            "visa run guide",
        ]);
        let violations = validate_queries(&queries, "Phnom Penh", "Visa Basics", 2025);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("forbidden dash"));
    }

    #[test]
    fn parse_accepts_object_and_bare_array() {
        assert_eq!(
            parse_queries(r#"{"queries": ["a b", " c "]}"#).unwrap(),
            vec!["a b", "c"]
        );
        assert_eq!(parse_queries(r#"["x"]"#).unwrap(), vec!["x"]);
        assert!(parse_queries("not json").is_none());
    }
}
