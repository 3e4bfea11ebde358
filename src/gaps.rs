//! Gap analysis: per-intent coverage counts, staleness buckets, and the
//! priority score used to rank which intent gets written about next.

use chrono::{DateTime, Utc};

use crate::coverage::CoverageEntry;
use crate::vocab::{is_time_sensitive, INTENT_VOCABULARY};

/// One gap row per intent in the fixed vocabulary, always fully populated.
#[derive(Debug, Clone)]
pub struct CoverageGap {
    pub intent: String,
    pub is_freshness_relevant: bool,
    pub coverage_count: usize,
    pub last_covered_at: Option<DateTime<Utc>>,
    /// 0..=10; 10 means never covered (or covered with no usable timestamp).
    pub staleness: u8,
}

/// Day-bucket staleness from the most recent coverage timestamp.
fn staleness_bucket(age_days: i64) -> u8 {
    match age_days {
        d if d < 7 => 1,
        d if d < 30 => 3,
        d if d < 90 => 5,
        d if d < 180 => 7,
        _ => 9,
    }
}

/// Score a gap for ranking. Higher = higher priority to cover.
pub fn gap_score(gap: &CoverageGap) -> u32 {
    let coverage_bonus = match gap.coverage_count {
        0 => 40,
        1 => 20,
        _ => 5,
    };
    let freshness_bonus = if gap.is_freshness_relevant { 15 } else { 0 };
    coverage_bonus + u32::from(gap.staleness) * 3 + freshness_bonus
}

/// True when the entry matches the focus, where untagged entries count as
/// universally relevant.
fn matches_focus(tags: &std::collections::BTreeSet<String>, focus: &str) -> bool {
    tags.is_empty() || tags.contains(focus)
}

/// One `CoverageGap` per known intent, filtered to the city/audience focus.
/// Never returns fewer rows than the intent vocabulary, even for an empty map.
pub fn identify_gaps(
    coverage: &[CoverageEntry],
    city_focus: &str,
    audience_focus: &str,
) -> Vec<CoverageGap> {
    identify_gaps_at(coverage, city_focus, audience_focus, Utc::now())
}

/// Same as [`identify_gaps`] with an explicit "now" for deterministic tests.
pub fn identify_gaps_at(
    coverage: &[CoverageEntry],
    city_focus: &str,
    audience_focus: &str,
    now: DateTime<Utc>,
) -> Vec<CoverageGap> {
    INTENT_VOCABULARY
        .iter()
        .map(|def| {
            let matched: Vec<&CoverageEntry> = coverage
                .iter()
                .filter(|e| e.intents.contains(def.intent))
                .filter(|e| matches_focus(&e.cities, city_focus))
                .filter(|e| matches_focus(&e.audiences, audience_focus))
                .collect();

            let last_covered_at = matched.iter().filter_map(|e| e.created_at).max();
            let staleness = match last_covered_at {
                Some(ts) => staleness_bucket((now - ts).num_days()),
                None => 10,
            };

            CoverageGap {
                intent: def.intent.to_string(),
                is_freshness_relevant: is_time_sensitive(def.intent),
                coverage_count: matched.len(),
                last_covered_at,
                staleness,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CoverageSource;
    use chrono::Duration;
    use std::collections::BTreeSet;

    fn entry(intent: &str, city: &str, audience: &str, age_days: i64) -> CoverageEntry {
        let set = |s: &str| -> BTreeSet<String> {
            if s.is_empty() {
                BTreeSet::new()
            } else {
                std::iter::once(s.to_string()).collect()
            }
        };
        CoverageEntry {
            slug: format!("{intent}-post"),
            title: format!("{intent} coverage"),
            intents: set(intent),
            cities: set(city),
            audiences: set(audience),
            source: CoverageSource::Published,
            created_at: Some(Utc::now() - Duration::days(age_days)),
        }
    }

    #[test]
    fn always_one_row_per_intent() {
        let gaps = identify_gaps(&[], "Phnom Penh", "TEACHERS");
        assert_eq!(gaps.len(), INTENT_VOCABULARY.len());
        assert!(gaps.iter().all(|g| g.coverage_count == 0 && g.staleness == 10));
    }

    #[test]
    fn staleness_buckets_match_day_thresholds() {
        let now = Utc::now();
        for (age, want) in [(6, 1u8), (29, 3), (89, 5), (179, 7), (1000, 9)] {
            let cov = vec![entry("visa", "", "", age)];
            let gaps = identify_gaps_at(&cov, "Phnom Penh", "TEACHERS", now);
            let visa = gaps.iter().find(|g| g.intent == "visa").unwrap();
            assert_eq!(visa.staleness, want, "age {age} days");
        }
    }

    #[test]
    fn untagged_entries_count_for_any_focus() {
        let cov = vec![entry("visa", "", "", 3)];
        let gaps = identify_gaps(&cov, "Kampot", "TRAVELLERS");
        assert_eq!(gaps.iter().find(|g| g.intent == "visa").unwrap().coverage_count, 1);
    }

    #[test]
    fn city_focus_excludes_other_cities() {
        let cov = vec![entry("visa", "Siem Reap", "", 3)];
        let gaps = identify_gaps(&cov, "Phnom Penh", "TRAVELLERS");
        assert_eq!(gaps.iter().find(|g| g.intent == "visa").unwrap().coverage_count, 0);
    }

    #[test]
    fn score_prefers_uncovered_fresh_relevant_intents() {
        let zero = CoverageGap {
            intent: "visa".into(),
            is_freshness_relevant: true,
            coverage_count: 0,
            last_covered_at: None,
            staleness: 10,
        };
        // 40 + 30 + 15
        assert_eq!(gap_score(&zero), 85);

        let well_covered = CoverageGap {
            intent: "culture".into(),
            is_freshness_relevant: false,
            coverage_count: 5,
            last_covered_at: Some(Utc::now()),
            staleness: 1,
        };
        assert_eq!(gap_score(&well_covered), 8);
    }
}
