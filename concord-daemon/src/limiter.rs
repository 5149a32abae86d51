//! Per-actor sliding-window command rate limiter.
//!
//! Each actor gets at most `max` commands within a trailing `window`.
//! Timestamps outside the window are pruned on every check, so memory is
//! bounded by actual traffic. Exempt actors bypass both the check and the
//! usage recording. Repeated limit notices for the same actor are
//! suppressed so a hammering client only hears back occasionally.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

/// Minimum gap between limit notices for one actor.
const NOTICE_GAP: Duration = Duration::from_secs(30);

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    /// Over the limit; the window frees up after `retry_after`.
    Limited { retry_after: Duration },
}

/// Sliding-window limiter over actor identities.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max: usize,
    exempt: HashSet<String>,
    hits: HashMap<String, VecDeque<Instant>>,
    last_notice: HashMap<String, Instant>,
}

impl RateLimiter {
    pub fn new(window: Duration, max: usize, exempt: HashSet<String>) -> Self {
        Self {
            window,
            max,
            exempt,
            hits: HashMap::new(),
            last_notice: HashMap::new(),
        }
    }

    /// Check whether `actor` may run a command at `now`, recording the
    /// usage when allowed.
    pub fn check(&mut self, actor: &str, now: Instant) -> Decision {
        if self.exempt.contains(actor) {
            return Decision::Allowed;
        }

        let hits = self.hits.entry(actor.to_string()).or_default();
        while let Some(oldest) = hits.front() {
            if now.duration_since(*oldest) >= self.window {
                hits.pop_front();
            } else {
                break;
            }
        }

        if hits.len() >= self.max {
            let retry_after = hits
                .front()
                .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or_default();
            return Decision::Limited { retry_after };
        }

        hits.push_back(now);
        Decision::Allowed
    }

    /// Whether a limit notice should be sent to `actor` now, or silently
    /// dropped because one went out recently.
    pub fn should_notify(&mut self, actor: &str, now: Instant) -> bool {
        match self.last_notice.get(actor) {
            Some(last) if now.duration_since(*last) < NOTICE_GAP => false,
            _ => {
                self.last_notice.insert(actor.to_string(), now);
                true
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: usize) -> RateLimiter {
        RateLimiter::new(Duration::from_secs(60), max, HashSet::new())
    }

    #[test]
    fn allows_up_to_the_limit_then_blocks() {
        let mut limiter = limiter(3);
        let start = Instant::now();

        for _ in 0..3 {
            assert_eq!(limiter.check("alice", start), Decision::Allowed);
        }
        assert!(matches!(
            limiter.check("alice", start),
            Decision::Limited { .. }
        ));
    }

    #[test]
    fn window_expiry_frees_the_actor() {
        let mut limiter = limiter(2);
        let start = Instant::now();

        assert_eq!(limiter.check("alice", start), Decision::Allowed);
        assert_eq!(limiter.check("alice", start), Decision::Allowed);
        assert!(matches!(
            limiter.check("alice", start + Duration::from_secs(30)),
            Decision::Limited { .. }
        ));

        // Both hits fall out of the 60s window.
        assert_eq!(
            limiter.check("alice", start + Duration::from_secs(61)),
            Decision::Allowed
        );
    }

    #[test]
    fn retry_after_counts_down_from_the_oldest_hit() {
        let mut limiter = limiter(1);
        let start = Instant::now();

        assert_eq!(limiter.check("alice", start), Decision::Allowed);
        let decision = limiter.check("alice", start + Duration::from_secs(15));
        match decision {
            Decision::Limited { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(45));
            }
            Decision::Allowed => panic!("should be limited"),
        }
    }

    #[test]
    fn actors_are_isolated() {
        let mut limiter = limiter(1);
        let start = Instant::now();

        assert_eq!(limiter.check("alice", start), Decision::Allowed);
        assert!(matches!(
            limiter.check("alice", start),
            Decision::Limited { .. }
        ));
        assert_eq!(limiter.check("bob", start), Decision::Allowed);
    }

    #[test]
    fn exempt_actors_are_never_limited_or_recorded() {
        let mut exempt = HashSet::new();
        exempt.insert("admin".to_string());
        let mut limiter = RateLimiter::new(Duration::from_secs(60), 1, exempt);
        let start = Instant::now();

        for _ in 0..10 {
            assert_eq!(limiter.check("admin", start), Decision::Allowed);
        }
        assert!(limiter.hits.get("admin").is_none());
    }

    #[test]
    fn limit_notices_are_suppressed_for_a_while() {
        let mut limiter = limiter(1);
        let start = Instant::now();

        assert!(limiter.should_notify("alice", start));
        assert!(!limiter.should_notify("alice", start + Duration::from_secs(5)));
        assert!(limiter.should_notify("alice", start + Duration::from_secs(31)));
    }
}
