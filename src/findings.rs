//! Append-only, size-bounded findings log. The sole place findings
//! accumulate and the sole source for "recent attacks" queries.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::models::Attack;

/// Retained findings cap; the oldest entry is evicted first.
pub const MAX_FINDINGS: usize = 1000;

#[derive(Debug, Default)]
pub struct FindingsLog {
    inner: Mutex<VecDeque<Attack>>,
}

impl FindingsLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, finding: Attack) {
        let mut log = self.lock();
        log.push_back(finding);
        while log.len() > MAX_FINDINGS {
            log.pop_front();
        }
    }

    /// Returns the most recent `limit` findings in arrival order (oldest to
    /// newest within the returned tail). A limit of zero, or one larger than
    /// the retained length, returns the full retained log.
    pub fn recent(&self, limit: usize) -> Vec<Attack> {
        let log = self.lock();
        let skip = if limit == 0 || limit > log.len() {
            0
        } else {
            log.len() - limit
        };
        log.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Attack>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttackKind, Severity};

    fn finding(i: usize) -> Attack {
        Attack::new(
            AttackKind::RogueAp,
            Severity::High,
            format!("finding {i}"),
            format!("target-{i}"),
        )
    }

    #[test]
    fn append_evicts_oldest_beyond_cap() {
        let log = FindingsLog::new();
        for i in 0..=MAX_FINDINGS {
            log.append(finding(i));
        }
        assert_eq!(log.len(), MAX_FINDINGS);
        let retained = log.recent(0);
        // finding 0 was evicted; findings 1..=1000 remain in arrival order.
        assert_eq!(retained[0].target, "target-1");
        assert_eq!(retained[MAX_FINDINGS - 1].target, format!("target-{MAX_FINDINGS}"));
    }

    #[test]
    fn recent_returns_tail_in_arrival_order() {
        let log = FindingsLog::new();
        for i in 0..5 {
            log.append(finding(i));
        }
        let tail = log.recent(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].target, "target-3");
        assert_eq!(tail[1].target, "target-4");
    }

    #[test]
    fn zero_or_oversized_limit_returns_everything() {
        let log = FindingsLog::new();
        for i in 0..3 {
            log.append(finding(i));
        }
        assert_eq!(log.recent(0).len(), 3);
        assert_eq!(log.recent(100).len(), 3);
    }
}
