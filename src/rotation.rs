//! Topic rotation: pick the next gap topic for a (city, audience) key,
//! excluding the most recent selections so consecutive runs do not repeat
//! themselves. Randomness is injected so tests can assert exact picks.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use crate::history::{SelectionHistory, TopicSelection, LOOKBACK_N};
use crate::vocab::{localize, GAP_TOPICS};

/// Result of one rotation pick.
#[derive(Debug, Clone)]
pub struct RotationPick {
    pub selected_topic: String,
    pub primary_keyword_terms: Vec<String>,
}

pub struct TopicRotator {
    history: Arc<dyn SelectionHistory>,
    rng: Mutex<StdRng>,
}

impl TopicRotator {
    pub fn new(history: Arc<dyn SelectionHistory>) -> Self {
        Self::with_rng(history, StdRng::from_os_rng())
    }

    /// Seedable constructor for deterministic tests.
    pub fn with_rng(history: Arc<dyn SelectionHistory>, rng: StdRng) -> Self {
        Self {
            history,
            rng: Mutex::new(rng),
        }
    }

    /// Pick the next topic, never repeating the last [`LOOKBACK_N`]
    /// selections for the same key. History read failures degrade to an
    /// empty history; the pick itself always succeeds.
    pub fn get_next_gap_topic(&self, city_focus: &str, audience_focus: &str) -> RotationPick {
        let recent: Vec<String> = match self.history.last_n(city_focus, audience_focus, LOOKBACK_N)
        {
            Ok(sels) => sels.into_iter().map(|s| s.topic).collect(),
            Err(e) => {
                warn!(error = %e, "history read failed; rotating over the full topic list");
                Vec::new()
            }
        };

        let mut pool: Vec<usize> = (0..GAP_TOPICS.len())
            .filter(|&i| !recent.iter().any(|r| r == GAP_TOPICS[i].topic))
            .collect();
        if pool.is_empty() {
            // Subtraction emptied the pool (tiny lists); fall back to all.
            pool = (0..GAP_TOPICS.len()).collect();
        }

        let (topic_idx, term_idx) = {
            let mut rng = self.rng.lock().expect("rotator rng poisoned");
            let topic_idx = pool[rng.random_range(0..pool.len())];
            let term_idx = rng.random_range(0..GAP_TOPICS[topic_idx].keyword_terms.len());
            (topic_idx, term_idx)
        };
        let def = &GAP_TOPICS[topic_idx];

        let pick = RotationPick {
            selected_topic: def.topic.to_string(),
            primary_keyword_terms: vec![localize(def.keyword_terms[term_idx], city_focus)],
        };

        // Recording is best-effort; a lost record only weakens repetition
        // avoidance, which is a soft heuristic anyway.
        if let Err(e) = self.history.record(TopicSelection {
            city_focus: city_focus.to_string(),
            audience_focus: audience_focus.to_string(),
            topic: pick.selected_topic.clone(),
            selected_at: Utc::now(),
        }) {
            warn!(error = %e, "failed to record topic selection");
        }

        pick
    }
}
