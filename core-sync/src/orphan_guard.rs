//! # Orphan Safety Guard
//!
//! Decides whether the books missing from a catalog snapshot may be marked as
//! orphaned. A source that suddenly lacks a large share of the library is far
//! more likely truncated or misconfigured than genuinely emptied, so such a
//! pass is refused rather than applied.

use core_runtime::config::DEFAULT_ORPHAN_THRESHOLD;

/// Outcome of an orphan safety check
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrphanDecision {
    /// Candidates may be marked orphaned
    Accept,
    /// Candidates must be left untouched
    Reject {
        /// Share of tracked books that would be orphaned, in percent
        percentage: f64,
    },
}

impl OrphanDecision {
    /// Whether the candidates may be marked orphaned
    pub fn is_accepted(&self) -> bool {
        matches!(self, OrphanDecision::Accept)
    }
}

/// Threshold policy for orphan detection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrphanGuard {
    threshold: f64,
}

impl Default for OrphanGuard {
    fn default() -> Self {
        Self::new(DEFAULT_ORPHAN_THRESHOLD)
    }
}

impl OrphanGuard {
    /// Create a guard rejecting passes that orphan more than `threshold`
    /// (a fraction in `0.0..=1.0`) of the tracked books.
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Largest orphaned share this guard accepts
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Evaluate `candidates` removals against `total_tracked` books.
    ///
    /// An empty tracking store always accepts. Reaching the threshold
    /// exactly is still accepted.
    pub fn decide(&self, candidates: u64, total_tracked: u64) -> OrphanDecision {
        if total_tracked == 0 || candidates == 0 {
            return OrphanDecision::Accept;
        }

        let ratio = candidates as f64 / total_tracked as f64;
        if ratio > self.threshold {
            OrphanDecision::Reject {
                percentage: ratio * 100.0,
            }
        } else {
            OrphanDecision::Accept
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_above_threshold() {
        let guard = OrphanGuard::default();

        match guard.decide(15, 100) {
            OrphanDecision::Reject { percentage } => assert!((percentage - 15.0).abs() < 1e-9),
            OrphanDecision::Accept => panic!("15% must be rejected at a 10% threshold"),
        }
    }

    #[test]
    fn test_accepts_at_or_below_threshold() {
        let guard = OrphanGuard::default();

        assert!(guard.decide(5, 100).is_accepted());
        assert!(guard.decide(10, 100).is_accepted());
        assert!(!guard.decide(11, 100).is_accepted());
    }

    #[test]
    fn test_empty_store_accepts() {
        assert!(OrphanGuard::default().decide(0, 0).is_accepted());
        assert!(OrphanGuard::new(0.0).decide(3, 0).is_accepted());
    }

    #[test]
    fn test_custom_threshold() {
        let strict = OrphanGuard::new(0.0);
        assert!(!strict.decide(1, 1000).is_accepted());

        let permissive = OrphanGuard::new(1.0);
        assert!(permissive.decide(100, 100).is_accepted());
        assert_eq!(permissive.threshold(), 1.0);
    }
}
