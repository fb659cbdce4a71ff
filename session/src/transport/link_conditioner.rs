use rand::{rngs::SmallRng, Rng, SeedableRng};

/// Synthetic link degradation, for exercising retransmission paths
/// without a real lossy network.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinkConditionerConfig {
    /// Probability in `[0.0, 1.0]` that an incoming datagram is dropped
    /// before the session sees it.
    pub incoming_loss: f32,
}

impl LinkConditionerConfig {
    pub fn new(incoming_loss: f32) -> Self {
        Self { incoming_loss }
    }
}

/// Applies a [`LinkConditionerConfig`] to a socket's receive path.
pub struct LinkConditioner {
    config: LinkConditionerConfig,
    rng: SmallRng,
}

impl LinkConditioner {
    pub fn new(config: LinkConditionerConfig) -> Self {
        Self {
            config,
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn should_drop(&mut self) -> bool {
        self.rng.gen::<f32>() < self.config.incoming_loss
    }
}
