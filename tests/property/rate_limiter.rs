//! Property tests for the per-client rate limiter.
//!
//! Invariants tested:
//! - Never admits more than the limit within one window
//! - Remaining budget counts down by one per admitted request
//! - Clients never consume each other's budget

use proptest::prelude::*;
use tower_mesh_ratelimiter::{ClientRateLimiter, RateLimit};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: admitted requests equal min(requests, limit)
    #[test]
    fn admits_exactly_up_to_the_limit(limit in 0u32..=50, requests in 0usize..=120) {
        let limiter = ClientRateLimiter::default();
        let policy = RateLimit::per_minute(limit);

        let admitted = (0..requests)
            .filter(|_| limiter.check("route", "client", &policy).is_ok())
            .count();

        prop_assert_eq!(admitted, requests.min(limit as usize));
    }

    /// Property: remaining counts down from limit - 1 to zero
    #[test]
    fn remaining_counts_down(limit in 1u32..=30) {
        let limiter = ClientRateLimiter::default();
        let policy = RateLimit::per_minute(limit);

        for expected in (0..limit).rev() {
            prop_assert_eq!(limiter.check("route", "client", &policy), Ok(expected));
        }
        prop_assert!(limiter.check("route", "client", &policy).is_err());
    }

    /// Property: interleaved clients each get their full budget
    #[test]
    fn clients_are_isolated(limit in 1u32..=10, clients in 1usize..=8) {
        let limiter = ClientRateLimiter::default();
        let policy = RateLimit::per_minute(limit);
        let mut admitted = vec![0u32; clients];

        for _ in 0..limit + 2 {
            for (i, count) in admitted.iter_mut().enumerate() {
                if limiter.check("route", &format!("client-{i}"), &policy).is_ok() {
                    *count += 1;
                }
            }
        }

        prop_assert!(admitted.iter().all(|&n| n == limit));
    }
}
