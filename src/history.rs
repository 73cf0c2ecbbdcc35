use std::collections::hash_map::Entry;
use std::collections::HashMap;

use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use tracing::debug;

use crate::rolling_avg::RollingAvg;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Number of instantaneous speeds averaged into the reported speed
    pub speed_window: usize,

    /// Entries without a new sample for this long are dropped by `prune`
    pub ttl_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            speed_window: 10,
            ttl_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp_ms: u64,
    pub pos: na::Point2<f64>,
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub last: Sample,
    pub speeds: RollingAvg,
}

impl HistoryEntry {
    fn new(last: Sample, window: usize) -> Self {
        Self {
            last,
            speeds: RollingAvg::new(window),
        }
    }

    #[inline]
    pub fn speed(&self) -> Option<f64> {
        self.speeds.mean()
    }
}

/// Ground position history per track identity, used to derive smoothed speed
#[derive(Debug, Default)]
pub struct HistoryStore {
    config: HistoryConfig,
    entries: HashMap<u32, HistoryEntry>,
}

impl HistoryStore {
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
        }
    }

    /// Records the ground position of `id` and returns its smoothed speed in m/s.
    ///
    /// The first sample of an identity has no speed. A sample that is not
    /// newer than the previous one has no speed either, it still replaces the
    /// last position and takes a slot in the speed window.
    pub fn observe(&mut self, id: u32, timestamp_ms: u64, pos: na::Point2<f64>) -> Option<f64> {
        let sample = Sample { timestamp_ms, pos };

        let window = self.config.speed_window;
        let entry = match self.entries.entry(id) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                e.insert(HistoryEntry::new(sample, window));
                return None;
            }
        };

        let prev = entry.last;
        entry.last = sample;

        if timestamp_ms <= prev.timestamp_ms {
            debug!(id, timestamp_ms, prev = prev.timestamp_ms, "non-increasing timestamp");
            entry.speeds.push(f64::NAN);
            return None;
        }

        let dt = (timestamp_ms - prev.timestamp_ms) as f64 / 1000.0;
        let speed = na::distance(&prev.pos, &pos) / dt;

        entry.speeds.push(speed);
        entry.speed()
    }

    /// Drops entries whose last sample is older than the configured TTL
    pub fn prune(&mut self, now_ms: u64) -> usize {
        let ttl = self.config.ttl_ms;
        let before = self.entries.len();

        self.entries
            .retain(|_, e| now_ms.saturating_sub(e.last.timestamp_ms) <= ttl);

        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "history pruned");
        }

        removed
    }

    #[inline]
    pub fn get(&self, id: u32) -> Option<&HistoryEntry> {
        self.entries.get(&id)
    }

    #[inline]
    pub fn remove(&mut self, id: u32) -> Option<HistoryEntry> {
        self.entries.remove(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Straight-line ground distance from the point below the camera
#[inline]
pub fn distance_from_camera(pos: &na::Point2<f64>) -> f64 {
    pos.coords.norm()
}
