use rand::Rng;

use crate::{assert_interval, decay::Decay};

use super::Choice;

/// Epsilon greedy exploration policy with an epsilon threshold that decays once per episode
#[derive(Debug, Clone)]
pub struct EpsilonGreedy<D: Decay> {
    epsilon: f32,
    decay: D,
}

impl<D: Decay> EpsilonGreedy<D> {
    /// Initialize epsilon greedy policy from a starting epsilon and a decay strategy
    ///
    /// **Panics** if `epsilon` is not in the interval `[0,1]`
    pub fn new(epsilon: f32, decay: D) -> Self {
        assert_interval!(epsilon, 0.0, 1.0);
        Self { epsilon, decay }
    }

    /// Invoke epsilon greedy policy with the current epsilon
    ///
    /// Draws exactly one value from `rng`
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Choice {
        if rng.gen::<f32>() > self.epsilon {
            Choice::Exploit
        } else {
            Choice::Explore
        }
    }

    /// Advance epsilon by one step of the decay strategy
    pub fn decay(&mut self) {
        self.epsilon = self.decay.next(self.epsilon);
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    /// **Panics** if `epsilon` is not in the interval `[0,1]`
    pub fn set_epsilon(&mut self, epsilon: f32) {
        assert_interval!(epsilon, 0.0, 1.0);
        self.epsilon = epsilon;
    }
}
