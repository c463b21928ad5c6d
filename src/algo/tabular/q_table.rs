use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    assert_interval,
    decay::{self, Decay},
    env::{choose_action, DiscreteActionSpace, Environment},
    error::{Error, Result},
    exploration::{Choice, EpsilonGreedy},
    memory::Exp,
};

use super::Hashable;

/// Configuration for the [`QTableAgent`]
pub struct QTableAgentConfig<D: Decay> {
    /// Exploration policy, decayed once per episode
    ///
    /// **Default**: epsilon `1.0`, multiplied by `0.95` after every episode down to a floor of `0.001`
    pub exploration: EpsilonGreedy<D>,
    /// Learning rate
    ///
    /// **Default**: `0.3`
    pub alpha: f32,
    /// Discount factor
    ///
    /// **Default**: `0.9`
    pub gamma: f32,
}

impl Default for QTableAgentConfig<decay::Exponential> {
    fn default() -> Self {
        Self {
            exploration: EpsilonGreedy::new(
                1.0,
                decay::Exponential::new(0.95, 0.001).expect("default decay parameters are valid"),
            ),
            alpha: 0.3,
            gamma: 0.9,
        }
    }
}

/// Action values of a single state, kept in the order the actions were first seen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row<A> {
    values: Vec<(A, f32)>,
}

impl<A: Hashable> Row<A> {
    pub fn get(&self, action: A) -> Option<f32> {
        self.values
            .iter()
            .find_map(|&(a, v)| (a == action).then_some(v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (A, f32)> + '_ {
        self.values.iter().copied()
    }

    /// Insert a zero value for every action not yet present
    fn ensure(&mut self, actions: &[A]) {
        for &action in actions {
            if self.get(action).is_none() {
                self.values.push((action, 0.0));
            }
        }
    }

    fn value_mut(&mut self, action: A) -> &mut f32 {
        let i = match self.values.iter().position(|&(a, _)| a == action) {
            Some(i) => i,
            None => {
                self.values.push((action, 0.0));
                self.values.len() - 1
            }
        };
        &mut self.values[i].1
    }

    /// Highest value among `actions`, or `None` if `actions` is empty
    fn max(&self, actions: &[A]) -> Option<f32> {
        actions
            .iter()
            .map(|&a| self.get(a).unwrap_or(0.0))
            .reduce(f32::max)
    }

    /// All actions sharing the highest value
    fn best(&self, actions: &[A]) -> Vec<A> {
        let Some(max) = self.max(actions) else {
            return Vec::new();
        };
        actions
            .iter()
            .copied()
            .filter(|&a| self.get(a).unwrap_or(0.0) == max)
            .collect()
    }
}

impl<A> Default for Row<A> {
    fn default() -> Self {
        Self { values: Vec::new() }
    }
}

/// A snapshot of everything the agent has learned, suitable for persisting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy<S, A> {
    /// Current exploration rate
    pub epsilon: f32,
    /// Rows sorted by state
    pub table: Vec<(S, Row<A>)>,
}

/// A simple Q-learning agent that utilizes a Q-table to learn its environment
///
/// Each visit to a state-action pair moves its value toward the one-step target:
///
/// Q(s,a) ← Q(s,a) + α(r + γ max<sub>a'</sub> Q(s',a') - Q(s,a))
///
/// where the bootstrap term is dropped on terminal transitions. Rows are created lazily with a zero
/// value for every action the first time a state is referenced.
///
/// ### Generics
/// - `E` - The [`Environment`] in which the agent will learn
///     - The environment's state and action spaces must both be discrete because a Q value will be recorded for each state action pair
///     - For the same reason, the state and action types must be [`Hashable`] to be used as keys in a [`HashMap`]
/// - `D` - The [`Decay`] strategy applied to epsilon after each episode
pub struct QTableAgent<E, D = decay::Exponential>
where
    E: Environment + DiscreteActionSpace,
    E::State: Hashable,
    E::Action: Hashable,
    D: Decay,
{
    q_table: HashMap<E::State, Row<E::Action>>,
    exploration: EpsilonGreedy<D>,
    alpha: f32,   // learning rate
    gamma: f32,   // discount factor
    episode: u32, // completed episodes
}

impl<E, D> QTableAgent<E, D>
where
    E: Environment + DiscreteActionSpace,
    E::State: Hashable,
    E::Action: Hashable,
    D: Decay,
{
    /// Initialize a new `QTableAgent` with an empty table
    ///
    /// **Panics** if `alpha` or `gamma` is not in the interval `[0,1]`
    pub fn new(config: QTableAgentConfig<D>) -> Self {
        assert_interval!(config.alpha, 0.0, 1.0);
        assert_interval!(config.gamma, 0.0, 1.0);
        Self {
            q_table: HashMap::new(),
            exploration: config.exploration,
            alpha: config.alpha,
            gamma: config.gamma,
            episode: 0,
        }
    }

    pub fn q_table(&self) -> &HashMap<E::State, Row<E::Action>> {
        &self.q_table
    }

    /// The learned value of a state-action pair, `None` if the state has never been seen
    pub fn q_value(&self, state: E::State, action: E::Action) -> Option<f32> {
        self.q_table.get(&state).and_then(|row| row.get(action))
    }

    pub fn epsilon(&self) -> f32 {
        self.exploration.epsilon()
    }

    /// **Panics** if `epsilon` is not in the interval `[0,1]`
    pub fn set_epsilon(&mut self, epsilon: f32) {
        self.exploration.set_epsilon(epsilon);
    }

    /// Number of episodes completed by [`go`](Self::go) since creation or the last
    /// [`restore`](Self::restore)
    pub fn episode(&self) -> u32 {
        self.episode
    }

    fn row(&mut self, state: E::State, actions: &[E::Action]) -> &mut Row<E::Action> {
        let row = self.q_table.entry(state).or_default();
        row.ensure(actions);
        row
    }

    /// Choose an action for `state` with the epsilon greedy policy
    ///
    /// Exploiting picks uniformly among all actions that share the highest value, so an untrained
    /// row does not favor whichever action happens to come first.
    pub fn act<R: Rng + ?Sized>(
        &mut self,
        state: E::State,
        actions: &[E::Action],
        rng: &mut R,
    ) -> Result<E::Action> {
        if actions.is_empty() {
            return Err(Error::EmptyActionSpace);
        }

        let choice = self.exploration.choose(rng);
        let row = self.row(state, actions);
        match choice {
            Choice::Explore => choose_action(actions, rng),
            Choice::Exploit => choose_action(&row.best(actions), rng),
        }
    }

    /// Learn from a given experience and update the table
    ///
    /// `actions` and `next_actions` are the actions available in `experience.state` and
    /// `experience.next_state`, used to fill in rows seen for the first time.
    pub fn learn(
        &mut self,
        experience: Exp<E>,
        actions: &[E::Action],
        next_actions: &[E::Action],
    ) {
        let Exp {
            state,
            action,
            reward,
            next_state,
            done,
        } = experience;

        let max_next_q = self
            .row(next_state, next_actions)
            .max(next_actions)
            .unwrap_or(0.0);
        let target = if done {
            reward
        } else {
            reward + self.gamma * max_next_q
        };

        let alpha = self.alpha;
        let q = self.row(state, actions).value_mut(action);
        *q += alpha * (target - *q);
    }

    /// Shrink epsilon by one step of the decay strategy, call once per finished episode
    pub fn decay_exploration(&mut self) {
        self.exploration.decay();
    }

    /// Play one episode in the given environment, learning after every step
    pub fn go<R: Rng + ?Sized>(&mut self, env: &mut E, rng: &mut R) -> Result<()> {
        self.go_with(env, rng, |_| {})
    }

    /// Like [`go`](Self::go), calling `on_step` with the environment after every step
    pub fn go_with<R, F>(&mut self, env: &mut E, rng: &mut R, mut on_step: F) -> Result<()>
    where
        R: Rng + ?Sized,
        F: FnMut(&E),
    {
        let mut state = env.reset(rng);
        let mut actions = env.actions();
        let mut steps = 0u32;
        let mut total_reward = 0.0;

        loop {
            let action = self.act(state, &actions, rng)?;
            let (next_state, reward, done) = env.step(action, rng);
            let next_actions = env.actions();
            on_step(&*env);

            self.learn(
                Exp {
                    state,
                    action,
                    reward,
                    next_state,
                    done,
                },
                &actions,
                &next_actions,
            );

            steps += 1;
            total_reward += reward;
            if done {
                break;
            }
            state = next_state;
            actions = next_actions;
        }

        self.decay_exploration();
        self.episode += 1;
        log::debug!(
            "episode {} finished after {steps} steps with return {total_reward} (epsilon {:.4}, {} states)",
            self.episode,
            self.epsilon(),
            self.q_table.len(),
        );

        Ok(())
    }

    /// Take a snapshot of the table and exploration rate
    pub fn policy(&self) -> Policy<E::State, E::Action>
    where
        E::State: Ord,
    {
        let mut table = self
            .q_table
            .iter()
            .map(|(&s, row)| (s, row.clone()))
            .collect::<Vec<_>>();
        table.sort_unstable_by_key(|&(s, _)| s);

        Policy {
            epsilon: self.epsilon(),
            table,
        }
    }

    /// Replace the table and exploration rate with a snapshot taken by [`policy`](Self::policy)
    ///
    /// The episode counter only covers the current session and starts over from zero.
    pub fn restore(&mut self, policy: Policy<E::State, E::Action>) -> Result<()> {
        if !(0.0..=1.0).contains(&policy.epsilon) {
            return Err(Error::invalid(
                "epsilon",
                format!("{} is outside [0, 1]", policy.epsilon),
            ));
        }
        self.exploration.set_epsilon(policy.epsilon);
        self.q_table = policy.table.into_iter().collect();
        self.episode = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use crate::{
        env::tests::MockEnv,
        gym::snake::{SnakeConfig, SnakeEnv, Turn},
    };

    use super::*;

    fn greedy() -> QTableAgent<MockEnv, decay::Constant> {
        QTableAgent::new(QTableAgentConfig {
            exploration: EpsilonGreedy::new(0.0, decay::Constant),
            alpha: 0.3,
            gamma: 0.9,
        })
    }

    fn row(values: &[(i32, f32)]) -> Row<i32> {
        Row {
            values: values.to_vec(),
        }
    }

    #[test]
    fn act_creates_zero_row() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut agent: QTableAgent<SnakeEnv> = QTableAgent::new(QTableAgentConfig::default());
        let mut env = SnakeEnv::new(SnakeConfig::default()).unwrap();
        let state = env.reset(&mut rng);

        assert!(agent.q_table().is_empty());
        agent.act(state, &env.actions(), &mut rng).unwrap();

        let row = agent.q_table().get(&state).expect("Row was created");
        assert_eq!(
            row.iter().collect::<Vec<_>>(),
            [(Turn::Straight, 0.0), (Turn::Left, 0.0), (Turn::Right, 0.0)]
        );
    }

    #[test]
    fn learn_on_unseen_states() {
        let mut agent = greedy();
        agent.learn(
            Exp {
                state: 0,
                action: 1,
                reward: -30.0,
                next_state: 1,
                done: true,
            },
            &[-1, 1],
            &[-1, 1],
        );

        assert_eq!(agent.q_value(0, 1), Some(0.3 * -30.0));
        assert_eq!(agent.q_value(1, -1), Some(0.0), "Next state row was created");
    }

    #[test]
    fn learn_fills_each_row_with_its_own_actions() {
        let mut agent = greedy();
        agent.learn(
            Exp {
                state: 0,
                action: 1,
                reward: -1.0,
                next_state: 7,
                done: false,
            },
            &[-1, 1],
            &[5, 6],
        );

        let actions = |s: i32| {
            let mut actions = agent.q_table()[&s].iter().map(|(a, _)| a).collect::<Vec<_>>();
            actions.sort();
            actions
        };
        assert_eq!(actions(0), [-1, 1]);
        assert_eq!(actions(7), [5, 6]);
        assert_eq!(agent.q_value(0, 1), Some(0.3 * -1.0));
        assert_eq!(agent.q_value(0, -1), Some(0.0));
    }

    #[test]
    fn learn_bootstraps_from_best_next_action() {
        let mut agent = greedy();
        agent.q_table.insert(1, row(&[(-1, 1.0), (1, 3.0)]));

        agent.learn(
            Exp {
                state: 0,
                action: 1,
                reward: -1.0,
                next_state: 1,
                done: false,
            },
            &[-1, 1],
            &[-1, 1],
        );

        // target = -1 + 0.9 * 3
        let q = agent.q_value(0, 1).unwrap();
        assert!((q - 0.3 * 1.7).abs() < 1e-6, "q = {q}");
    }

    #[test]
    fn terminal_transition_ignores_next_state() {
        let mut agent = greedy();
        agent.q_table.insert(1, row(&[(-1, 100.0), (1, 100.0)]));

        agent.learn(
            Exp {
                state: 0,
                action: -1,
                reward: 50.0,
                next_state: 1,
                done: true,
            },
            &[-1, 1],
            &[-1, 1],
        );

        assert_eq!(agent.q_value(0, -1), Some(0.3 * 50.0));
    }

    #[test]
    fn converged_value_is_unchanged() {
        let mut agent = QTableAgent::<MockEnv, _>::new(QTableAgentConfig {
            exploration: EpsilonGreedy::new(0.0, decay::Constant),
            alpha: 0.3,
            gamma: 0.0,
        });
        agent.q_table.insert(0, row(&[(-1, 0.0), (1, 0.0)]));

        for _ in 0..3 {
            agent.learn(
                Exp {
                    state: 0,
                    action: 1,
                    reward: 0.0,
                    next_state: 1,
                    done: false,
                },
                &[-1, 1],
                &[-1, 1],
            );
            assert_eq!(agent.q_value(0, 1), Some(0.0));
        }
    }

    #[test]
    fn greedy_breaks_ties_randomly() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut agent = QTableAgent::<SnakeEnv, _>::new(QTableAgentConfig {
            exploration: EpsilonGreedy::new(0.0, decay::Constant),
            alpha: 0.3,
            gamma: 0.9,
        });
        let mut env = SnakeEnv::new(SnakeConfig::default()).unwrap();
        let state = env.reset(&mut rng);
        let actions = env.actions();

        let chosen = (0..300)
            .map(|_| agent.act(state, &actions, &mut rng).unwrap())
            .collect::<HashSet<_>>();
        assert_eq!(chosen.len(), 3, "Every tied action gets picked");

        *agent.row(state, &actions).value_mut(Turn::Left) = 1.0;
        for _ in 0..50 {
            assert_eq!(agent.act(state, &actions, &mut rng).unwrap(), Turn::Left);
        }
    }

    #[test]
    fn act_without_actions_fails() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut agent = greedy();
        assert!(matches!(
            agent.act(0, &[], &mut rng),
            Err(Error::EmptyActionSpace)
        ));
    }

    #[test]
    fn epsilon_decays_once_per_episode() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut agent: QTableAgent<SnakeEnv> = QTableAgent::new(QTableAgentConfig::default());
        let mut env = SnakeEnv::new(SnakeConfig::default()).unwrap();

        agent.go(&mut env, &mut rng).unwrap();
        assert_eq!(agent.epsilon(), 0.95);
        agent.go(&mut env, &mut rng).unwrap();
        assert_eq!(agent.epsilon(), 0.95 * 0.95);
        assert_eq!(agent.episode(), 2);
        assert!(!env.is_active(), "Episode ran to the end");
    }

    #[test]
    fn go_with_sees_every_step() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut agent: QTableAgent<SnakeEnv> = QTableAgent::new(QTableAgentConfig::default());
        let mut env = SnakeEnv::new(SnakeConfig::default()).unwrap();

        let mut heads = Vec::new();
        agent
            .go_with(&mut env, &mut rng, |env| heads.push(env.head()))
            .unwrap();

        assert_eq!(heads.len() as f64, env.report["steps"]);
        assert_eq!(heads.last(), Some(&env.head()));
    }

    #[test]
    fn go_in_generic_env() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut agent = QTableAgent::<MockEnv, _>::new(QTableAgentConfig {
            exploration: EpsilonGreedy::new(0.5, decay::Linear::new(0.1, 0.0).unwrap()),
            alpha: 0.5,
            gamma: 1.0,
        });
        let mut env = MockEnv { pos: 0 };

        for _ in 0..10 {
            agent.go(&mut env, &mut rng).unwrap();
        }
        assert_eq!(agent.epsilon(), 0.0);
        assert!(agent.q_value(0, 1).is_some());
    }

    #[test]
    fn restored_policy_reproduces_behavior() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut trained: QTableAgent<SnakeEnv> = QTableAgent::new(QTableAgentConfig::default());
        let mut env = SnakeEnv::new(SnakeConfig::default()).unwrap();
        for _ in 0..30 {
            trained.go(&mut env, &mut rng).unwrap();
        }

        let mut restored: QTableAgent<SnakeEnv> = QTableAgent::new(QTableAgentConfig::default());
        restored.restore(trained.policy()).unwrap();
        assert_eq!(restored.policy(), trained.policy());

        let mut rng_a = ChaCha8Rng::seed_from_u64(6);
        let mut rng_b = ChaCha8Rng::seed_from_u64(6);
        let mut env_b = env.clone();
        for _ in 0..10 {
            trained.go(&mut env, &mut rng_a).unwrap();
            restored.go(&mut env_b, &mut rng_b).unwrap();
        }
        assert_eq!(restored.policy(), trained.policy());
        assert_eq!(env.report.take(), env_b.report.take());
    }

    #[test]
    fn restore_starts_episode_count_over() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut agent: QTableAgent<SnakeEnv> = QTableAgent::new(QTableAgentConfig::default());
        let mut env = SnakeEnv::new(SnakeConfig::default()).unwrap();
        for _ in 0..3 {
            agent.go(&mut env, &mut rng).unwrap();
        }
        assert_eq!(agent.episode(), 3);

        let policy = agent.policy();
        agent.restore(policy).unwrap();
        assert_eq!(agent.episode(), 0);

        agent.go(&mut env, &mut rng).unwrap();
        assert_eq!(agent.episode(), 1);
    }

    #[test]
    fn restore_rejects_bad_epsilon() {
        let mut agent = greedy();
        let policy = Policy {
            epsilon: 2.0,
            table: Vec::new(),
        };
        assert!(agent.restore(policy).is_err());
    }

    #[test]
    #[should_panic(expected = "Invalid value for `config.alpha`")]
    fn rejects_alpha_out_of_range() {
        QTableAgent::<MockEnv, _>::new(QTableAgentConfig {
            exploration: EpsilonGreedy::new(0.1, decay::Constant),
            alpha: 1.5,
            gamma: 0.9,
        });
    }
}
