//! Gap detection on the depth update sequence-number chain.

use crate::model::DepthUpdate;

/// Verdict of a single consistency check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
    Consistent,
    /// `update.first_update_id` didn't chain from the previous update's
    /// `last_update_id`.
    Gap { expected: u64, actual: u64 },
}

/// Tracks the last accepted update and flags sequence gaps.
///
/// `last_update` is updated unconditionally on every call, whether or not
/// the current update was consistent with it: a gap marks the pipeline
/// fatal downstream (once synced), but the monitor itself keeps moving
/// regardless.
#[derive(Default)]
pub struct ConsistencyMonitor {
    last_update: Option<LastUpdate>,
}

struct LastUpdate {
    last_update_id: u64,
}

impl ConsistencyMonitor {
    pub fn new() -> Self {
        ConsistencyMonitor { last_update: None }
    }

    /// Checks whether `update` chains from the previously observed update
    /// (or there is no previous update yet), then unconditionally records
    /// `update` as the new last-seen update.
    pub fn check(&mut self, update: &DepthUpdate) -> Consistency {
        let verdict = match &self.last_update {
            Some(last) if update.first_update_id != last.last_update_id + 1 => Consistency::Gap {
                expected: last.last_update_id + 1,
                actual: update.first_update_id,
            },
            _ => Consistency::Consistent,
        };
        self.last_update = Some(LastUpdate {
            last_update_id: update.last_update_id,
        });
        verdict
    }
}
