//! The processing policy: a deterministic function of an order's items that
//! decides success or failure. Injected as a trait object so the test suite
//! can swap in a fixed-outcome stub without depending on the PRNG.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::domain::ProcessingStatus;

pub trait ProcessingPolicy: Send + Sync {
    /// Evaluates the order identified by `order_id` with the given item
    /// SKUs. Returns the outcome and, when failed, a reason.
    fn evaluate(&self, order_id: &str, skus: &[String]) -> (ProcessingStatus, Option<String>);
}

/// The production policy: embargo check first, then a seeded-PRNG simulated
/// outcome so runs are reproducible given the same `order_id`.
pub struct DefaultPolicy {
    pub embargo_skus: Vec<String>,
    pub success_probability: f64,
}

impl DefaultPolicy {
    pub fn new(embargo_skus: Vec<String>, success_probability: f64) -> Self {
        Self {
            embargo_skus,
            success_probability,
        }
    }

    fn seed_from_order_id(order_id: &str) -> u64 {
        // FNV-1a: cheap, stable across platforms, good enough for a
        // reproducible-for-tests PRNG seed (not a security primitive).
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in order_id.as_bytes() {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        hash
    }
}

impl ProcessingPolicy for DefaultPolicy {
    fn evaluate(&self, order_id: &str, skus: &[String]) -> (ProcessingStatus, Option<String>) {
        if let Some(embargoed) = skus.iter().find(|sku| self.embargo_skus.contains(sku)) {
            return (
                ProcessingStatus::Failed,
                Some(format!("embargo:{embargoed}")),
            );
        }

        let mut rng = ChaCha8Rng::seed_from_u64(Self::seed_from_order_id(order_id));
        if rng.gen::<f64>() < self.success_probability {
            (ProcessingStatus::Success, None)
        } else {
            (ProcessingStatus::Failed, Some("processing_error".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embargoed_sku_fails_with_a_reason_naming_the_sku() {
        let policy = DefaultPolicy::new(vec!["teapot".into()], 1.0);
        let (status, reason) = policy.evaluate("ord-1", &["teapot".into()]);
        assert_eq!(status, ProcessingStatus::Failed);
        assert_eq!(reason.as_deref(), Some("embargo:teapot"));
    }

    #[test]
    fn same_order_id_always_yields_the_same_outcome() {
        let policy = DefaultPolicy::new(vec![], 0.8);
        let first = policy.evaluate("ord-deterministic", &["laptop".into()]);
        let second = policy.evaluate("ord-deterministic", &["laptop".into()]);
        assert_eq!(first, second);
    }

    #[test]
    fn probability_one_always_succeeds_absent_embargo() {
        let policy = DefaultPolicy::new(vec![], 1.0);
        let (status, _) = policy.evaluate("any-order", &["widget".into()]);
        assert_eq!(status, ProcessingStatus::Success);
    }

    #[test]
    fn probability_zero_always_fails_absent_embargo() {
        let policy = DefaultPolicy::new(vec![], 0.0);
        let (status, reason) = policy.evaluate("any-order", &["widget".into()]);
        assert_eq!(status, ProcessingStatus::Failed);
        assert_eq!(reason.as_deref(), Some("processing_error"));
    }
}
