//! Selection history: the last few rotation picks per (city, audience)
//! key, used to avoid repeating recent topics. The real log lives in the
//! host app; the in-memory implementation here backs tests and local runs.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ReadError;

/// How many recent selections the rotator excludes.
pub const LOOKBACK_N: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSelection {
    pub city_focus: String,
    pub audience_focus: String,
    pub topic: String,
    pub selected_at: DateTime<Utc>,
}

/// Read + append contract for the external history log.
pub trait SelectionHistory: Send + Sync {
    /// Most recent `n` selections for this (city, audience) key, newest last.
    fn last_n(
        &self,
        city_focus: &str,
        audience_focus: &str,
        n: usize,
    ) -> Result<Vec<TopicSelection>, ReadError>;

    fn record(&self, selection: TopicSelection) -> Result<(), ReadError>;
}

/// Capped in-memory history.
#[derive(Debug)]
pub struct InMemoryHistory {
    inner: Mutex<Vec<TopicSelection>>,
    cap: usize,
}

impl InMemoryHistory {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            inner: Mutex::new(Vec::with_capacity(cap.min(10_000))),
            cap: cap.min(10_000),
        }
    }
}

impl Default for InMemoryHistory {
    fn default() -> Self {
        Self::with_capacity(256)
    }
}

impl SelectionHistory for InMemoryHistory {
    fn last_n(
        &self,
        city_focus: &str,
        audience_focus: &str,
        n: usize,
    ) -> Result<Vec<TopicSelection>, ReadError> {
        let v = self
            .inner
            .lock()
            .map_err(|_| ReadError::Unavailable("history mutex poisoned".into()))?;
        let mut matched: Vec<TopicSelection> = v
            .iter()
            .filter(|s| s.city_focus == city_focus && s.audience_focus == audience_focus)
            .cloned()
            .collect();
        let start = matched.len().saturating_sub(n);
        Ok(matched.split_off(start))
    }

    fn record(&self, selection: TopicSelection) -> Result<(), ReadError> {
        let mut v = self
            .inner
            .lock()
            .map_err(|_| ReadError::Unavailable("history mutex poisoned".into()))?;
        v.push(selection);
        if v.len() > self.cap {
            let excess = v.len() - self.cap;
            v.drain(0..excess);
        }
        Ok(())
    }
}
