// tests/grounding.rs
// Stage B grounding invariants: every citation traces to a retrieved
// result, the repair is bounded to one call, and a repaired batch is
// re-validated before it may replace the original.

use std::collections::HashSet;

use content_gap_analyzer::error::PipelineError;
use content_gap_analyzer::generate::topics::generate_topic_variations;
use content_gap_analyzer::{ScriptedTextGen, SearchResult};

const SEED: &str = "Phnom Penh Visa Rules 2025";

fn result(id: u32, url: &str) -> SearchResult {
    SearchResult {
        id,
        query: "q".into(),
        title: format!("result {id}"),
        snippet: "a sufficiently long snippet describing visa changes".into(),
        url: url.into(),
        published_at: None,
        source_name: None,
    }
}

fn pool() -> Vec<SearchResult> {
    vec![
        result(0, "https://example.com/a"),
        result(1, "https://example.com/b"),
        result(2, "https://khmertimeskh.com/visa"),
    ]
}

fn topic(title: &str, from_seed: bool, urls: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "id": "",
        "title": title,
        "angle": "the practical angle",
        "whyItMatters": "readers keep asking",
        "audienceFit": ["TRAVELLERS"],
        "suggestedKeywords": {"target": "phnom penh visa", "secondary": []},
        "searchQueries": [],
        "intent": "visa",
        "outlineAngles": ["costs", "timelines"],
        "sourceUrls": urls,
        "fromSeedTitle": from_seed
    })
}

fn valid_topics_json() -> String {
    serde_json::json!({
        "topics": [
            topic("Phnom Penh Visa Rules 2025 Explained", true, &["https://example.com/a"]),
            topic("Phnom Penh Visa Costs Compared", false, &["https://example.com/b"]),
            topic("How Phnom Penh Handles Overstays", false, &["https://khmertimeskh.com/visa"]),
            topic("Phnom Penh Extension Paperwork Walkthrough", false,
                  &["https://example.com/a", "https://example.com/b"]),
        ]
    })
    .to_string()
}

#[tokio::test]
async fn grounding_invariants_hold_on_success() {
    let client = ScriptedTextGen::with_responses([valid_topics_json()]);
    let results = pool();
    let batch =
        generate_topic_variations(&client, SEED, "Phnom Penh", "TRAVELLERS", 2025, &results)
            .await
            .unwrap();

    assert_eq!(client.call_count(), 1);
    assert!(batch.topics[0].from_seed_title, "first topic tracks the seed");

    let allowed: HashSet<&str> = ["https://example.com/a", "https://example.com/b", "https://khmertimeskh.com/visa"]
        .into_iter()
        .collect();
    for t in &batch.topics {
        assert!(
            (1..=3).contains(&t.source_urls.len()),
            "sourceUrls count out of bounds for {}",
            t.title
        );
        let uniq: HashSet<&String> = t.source_urls.iter().collect();
        assert_eq!(uniq.len(), t.source_urls.len(), "duplicate citation");
        for u in &t.source_urls {
            assert!(allowed.contains(u.as_str()), "fabricated citation {u}");
        }
        assert_eq!(t.source_count, t.source_urls.len());
    }
}

#[tokio::test]
async fn fabricated_url_triggers_repair_then_uses_valid_batch() {
    let bad = serde_json::json!({
        "topics": [
            topic("Phnom Penh Visa Rules 2025 Explained", true, &["https://invented.example/fake"]),
            topic("Phnom Penh Visa Costs Compared", false, &["https://example.com/b"]),
            topic("How Phnom Penh Handles Overstays", false, &["https://khmertimeskh.com/visa"]),
            topic("Phnom Penh Extension Paperwork Walkthrough", false, &["https://example.com/a"]),
        ]
    })
    .to_string();

    let client = ScriptedTextGen::with_responses([bad, valid_topics_json()]);
    let results = pool();
    let batch =
        generate_topic_variations(&client, SEED, "Phnom Penh", "TRAVELLERS", 2025, &results)
            .await
            .unwrap();

    assert_eq!(client.call_count(), 2, "exactly one repair call");
    // The repair prompt lists the allowed pool and the failures.
    let prompts = client.prompts();
    assert!(prompts[1].contains("Allowed source URLs"));
    assert!(prompts[1].contains("not in the provided result pool"));
    // Repaired batch passed re-validation and was accepted.
    assert!(batch.topics.iter().all(|t| !t.source_urls.is_empty()));
}

#[tokio::test]
async fn invalid_repair_falls_back_to_cleaned_original() {
    // Original misses the city in one title (strict failure) but carries a
    // fabricated URL too; the repair is also invalid. The cleaned original
    // must come back with the fabricated citation dropped.
    let original = serde_json::json!({
        "topics": [
            topic("Phnom Penh Visa Rules 2025 Explained", true,
                  &["https://example.com/a", "https://invented.example/fake"]),
            topic("Visa Costs Compared", false, &["https://example.com/b"]),
            topic("How Phnom Penh Handles Overstays", false, &["https://khmertimeskh.com/visa"]),
            topic("Phnom Penh Extension Paperwork Walkthrough", false, &["https://example.com/a"]),
        ]
    })
    .to_string();
    let still_bad = serde_json::json!({
        "topics": [
            topic("Visa Rules", false, &["https://invented.example/fake"]),
            topic("Visa Costs", false, &["https://example.com/b"]),
            topic("Overstays", false, &["https://khmertimeskh.com/visa"]),
            topic("Paperwork", false, &["https://example.com/a"]),
        ]
    })
    .to_string();

    let client = ScriptedTextGen::with_responses([original, still_bad]);
    let results = pool();
    let batch =
        generate_topic_variations(&client, SEED, "Phnom Penh", "TRAVELLERS", 2025, &results)
            .await
            .unwrap();

    assert_eq!(client.call_count(), 2);
    // Original batch survived, with the ungrounded URL silently dropped.
    assert_eq!(batch.topics.len(), 4);
    assert!(batch.topics[0].from_seed_title);
    assert_eq!(batch.topics[0].source_urls, vec!["https://example.com/a"]);
}

#[tokio::test]
async fn double_parse_failure_is_fatal() {
    let client = ScriptedTextGen::with_responses(["garbage", "more garbage"]);
    let results = pool();
    let err = generate_topic_variations(&client, SEED, "Phnom Penh", "TRAVELLERS", 2025, &results)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::TopicsUnusable(_)));
    assert_eq!(client.call_count(), 2, "repair is bounded to one retry");
}

#[tokio::test]
async fn out_of_enum_audience_is_dropped_not_fatal() {
    let mut t = topic(
        "Phnom Penh Visa Rules 2025 Explained",
        true,
        &["https://example.com/a"],
    );
    t["audienceFit"] = serde_json::json!(["TRAVELLERS", "DIGITAL_NOMADS"]);
    let json = serde_json::json!({
        "topics": [
            t,
            topic("Phnom Penh Visa Costs Compared", false, &["https://example.com/b"]),
            topic("How Phnom Penh Handles Overstays", false, &["https://khmertimeskh.com/visa"]),
            topic("Phnom Penh Extension Paperwork Walkthrough", false, &["https://example.com/a"]),
        ]
    })
    .to_string();

    // Strict validation flags the enum violation; the scripted repair
    // returns a fully valid batch.
    let client = ScriptedTextGen::with_responses([json, valid_topics_json()]);
    let results = pool();
    let batch =
        generate_topic_variations(&client, SEED, "Phnom Penh", "TRAVELLERS", 2025, &results)
            .await
            .unwrap();
    assert_eq!(client.call_count(), 2);
    assert!(!batch.topics.is_empty());
}
