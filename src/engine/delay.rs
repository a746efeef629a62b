//! Delay policies applied when a train arrives at a stop.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::DelayPolicyConfig;

/// Decides how many minutes of delay a train picks up on arrival
///
/// Any `FnMut(&str) -> u32` closure is a policy, which keeps tests
/// deterministic without a bespoke type.
pub trait DelayPolicy: Send {
    fn on_arrival(&mut self, train_id: &str) -> u32;
}

impl<F> DelayPolicy for F
where
    F: FnMut(&str) -> u32 + Send,
{
    fn on_arrival(&mut self, train_id: &str) -> u32 {
        self(train_id)
    }
}

/// With probability `p`, a uniform delay in `[min, max]` minutes
#[derive(Debug, Clone)]
pub struct RandomDelayPolicy {
    rng: ChaCha8Rng,
    probability: f64,
    min_minutes: u32,
    max_minutes: u32,
}

impl RandomDelayPolicy {
    #[must_use]
    pub fn seeded(config: &DelayPolicyConfig, seed: u64) -> Self {
        Self::with_rng(config, ChaCha8Rng::seed_from_u64(seed))
    }

    #[must_use]
    pub fn from_entropy(config: &DelayPolicyConfig) -> Self {
        Self::with_rng(config, ChaCha8Rng::from_entropy())
    }

    fn with_rng(config: &DelayPolicyConfig, rng: ChaCha8Rng) -> Self {
        Self {
            rng,
            probability: config.probability.clamp(0.0, 1.0),
            min_minutes: config.min_minutes.min(config.max_minutes),
            max_minutes: config.max_minutes.max(config.min_minutes),
        }
    }
}

impl DelayPolicy for RandomDelayPolicy {
    fn on_arrival(&mut self, _train_id: &str) -> u32 {
        if self.rng.gen_bool(self.probability) {
            self.rng.gen_range(self.min_minutes..=self.max_minutes)
        } else {
            0
        }
    }
}
