// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Recent submission outcomes, keyed by submission key.
//
// A repeated key whose earlier attempt succeeded or timed out gets the
// recorded result back instead of a second physical print. Definite failures
// are never recorded so a retry can go through.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use tracing::debug;

use pressgate_core::types::{JobResult, SubmissionKey};

pub const DEFAULT_LEDGER_CAPACITY: usize = 256;

#[derive(Default)]
struct Entries {
    results: HashMap<SubmissionKey, JobResult>,
    order: VecDeque<SubmissionKey>,
}

/// Bounded, FIFO-evicting map of settled results.
pub struct SubmissionLedger {
    capacity: usize,
    entries: Mutex<Entries>,
}

impl Default for SubmissionLedger {
    fn default() -> Self {
        Self::new(DEFAULT_LEDGER_CAPACITY)
    }
}

impl SubmissionLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(Entries::default()),
        }
    }

    pub fn lookup(&self, key: &SubmissionKey) -> Option<JobResult> {
        self.entries
            .lock()
            .ok()
            .and_then(|e| e.results.get(key).cloned())
    }

    /// Record `result` if it is settled. Returns whether it was recorded.
    pub fn record(&self, result: &JobResult) -> bool {
        if !result.is_settled() {
            return false;
        }
        let Ok(mut entries) = self.entries.lock() else {
            return false;
        };
        let key = result.submission_key.clone();
        if entries.results.insert(key.clone(), result.clone()).is_none() {
            entries.order.push_back(key);
        }
        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                debug!(key = %oldest, "evicting ledger entry");
                entries.results.remove(&oldest);
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.results.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use pressgate_core::error::PressgateError;

    use super::*;

    fn key(s: &str) -> SubmissionKey {
        SubmissionKey(s.to_string())
    }

    fn ok(k: &str) -> JobResult {
        JobResult::accepted("Canon_A", "Canon_A-1", true, true, key(k))
    }

    #[test]
    fn success_and_timeout_are_recorded() {
        let ledger = SubmissionLedger::default();
        assert!(ledger.record(&ok("a")));

        let timeout = PressgateError::SubmissionTimeout {
            device: "Canon_A".into(),
            after_secs: 30,
        };
        assert!(ledger.record(&JobResult::failed(Some("Canon_A".into()), &timeout, false, key("b"))));

        assert_eq!(ledger.lookup(&key("a")), Some(ok("a")));
        assert!(ledger.lookup(&key("b")).is_some());
    }

    #[test]
    fn definite_failures_are_not_recorded() {
        let ledger = SubmissionLedger::default();
        let failed = JobResult::failed(None, &PressgateError::NoDeviceAvailable, false, key("c"));
        assert!(!ledger.record(&failed));
        assert!(ledger.lookup(&key("c")).is_none());
        assert!(ledger.is_empty());
    }

    #[test]
    fn evicts_oldest_first() {
        let ledger = SubmissionLedger::new(2);
        ledger.record(&ok("a"));
        ledger.record(&ok("b"));
        ledger.record(&ok("c"));

        assert_eq!(ledger.len(), 2);
        assert!(ledger.lookup(&key("a")).is_none());
        assert!(ledger.lookup(&key("c")).is_some());
    }
}
