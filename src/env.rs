use std::ops::Index;

use rand::{seq::SliceRandom, Rng};

use crate::error::{Error, Result};

/// Represents a Markov decision process, defining the dynamics of an environment
/// in which an agent can operate.
///
/// This base trait represents the common case of a discrete-time MDP with one agent
/// and a finite state space and action space. Every random draw the environment makes
/// comes from the generator passed in by the caller, so a seeded generator makes an
/// episode fully reproducible.
pub trait Environment {
    /// A representation of the state of the environment to be passed to an agent
    type State;

    /// A representation of an action that an agent can take to affect the environment
    type Action;

    /// Determine if the state is active or terminal
    fn is_active(&self) -> bool;

    /// Update the environment in response to an action taken by an agent
    ///
    /// **Returns** `(next_state, reward, done)`
    fn step<R: Rng + ?Sized>(
        &mut self,
        action: Self::Action,
        rng: &mut R,
    ) -> (Self::State, f32, bool);

    /// Reset the environment to an initial state
    ///
    /// **Returns** the state
    fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Self::State;
}

/// An environment with a finite set of actions
pub trait DiscreteActionSpace: Environment {
    /// Get the available actions for the current state
    ///
    /// The returned vec should never be empty, instead specify an action that represents doing nothing if necessary.
    fn actions(&self) -> Vec<Self::Action>;
}

/// Named per-episode metrics accumulated by an environment and drained by the driver
///
/// Values keep the order their keys were registered in.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    keys: Vec<&'static str>,
    values: Vec<f64>,
}

impl Report {
    pub fn new(keys: Vec<&'static str>) -> Self {
        let values = vec![0.0; keys.len()];
        Self { keys, values }
    }

    pub fn keys(&self) -> &[&'static str] {
        &self.keys
    }

    /// Add `x` to the metric named `key`, ignoring unknown keys
    pub fn add(&mut self, key: &str, x: f64) {
        match self.position(key) {
            Some(i) => self.values[i] += x,
            None => log::warn!("report has no metric named `{key}`"),
        }
    }

    /// Return the accumulated values in key order and zero them for the next episode
    pub fn take(&mut self) -> Vec<f64> {
        std::mem::replace(&mut self.values, vec![0.0; self.keys.len()])
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| *k == key)
    }
}

impl Index<&str> for Report {
    type Output = f64;

    /// **Panics** if the report has no metric named `key`
    fn index(&self, key: &str) -> &Self::Output {
        let i = self
            .position(key)
            .unwrap_or_else(|| panic!("report has no metric named `{key}`"));
        &self.values[i]
    }
}

/// Choose uniformly among `actions`
pub(crate) fn choose_action<A: Copy, R: Rng + ?Sized>(actions: &[A], rng: &mut R) -> Result<A> {
    actions.choose(rng).copied().ok_or(Error::EmptyActionSpace)
}

#[cfg(test)]
pub(crate) mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    /// A one-dimensional walk: action `+1`/`-1` moves the position, reaching `3` ends the episode
    pub struct MockEnv {
        pub pos: i32,
    }

    impl Environment for MockEnv {
        type State = i32;
        type Action = i32;

        fn is_active(&self) -> bool {
            self.pos.abs() < 3
        }

        fn step<R: Rng + ?Sized>(&mut self, action: i32, _rng: &mut R) -> (i32, f32, bool) {
            self.pos += action;
            let done = !self.is_active();
            let reward = if self.pos == 3 { 1.0 } else { -0.1 };
            (self.pos, reward, done)
        }

        fn reset<R: Rng + ?Sized>(&mut self, _rng: &mut R) -> i32 {
            self.pos = 0;
            self.pos
        }
    }

    impl DiscreteActionSpace for MockEnv {
        fn actions(&self) -> Vec<i32> {
            vec![-1, 1]
        }
    }

    #[test]
    fn report_accumulates_and_resets() {
        let mut report = Report::new(vec!["score", "steps"]);
        report.add("steps", 1.0);
        report.add("steps", 1.0);
        report.add("score", 5.0);
        report.add("unknown", 9.0);

        assert_eq!(report["steps"], 2.0);
        assert_eq!(report.take(), vec![5.0, 2.0], "Values come out in key order");
        assert_eq!(report["score"], 0.0, "Values reset after take");
        assert_eq!(report.keys(), ["score", "steps"]);
    }

    #[test]
    fn choose_from_empty_fails() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let empty: [u8; 0] = [];
        assert!(matches!(
            choose_action(&empty, &mut rng),
            Err(Error::EmptyActionSpace)
        ));
    }
}
