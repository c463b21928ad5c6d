use crate::env::Environment;

/// Represents a single experience or transition in the environment
pub struct Exp<E: Environment> {
    /// The state of the environment before taking the action
    pub state: E::State,
    /// The action taken in the given state
    pub action: E::Action,
    /// The reward received after taking the action
    pub reward: f32,
    /// The state of the environment after the action is taken
    ///
    /// Terminal transitions still carry the observed state, but its value is never bootstrapped from.
    pub next_state: E::State,
    /// Whether the action ended the episode
    pub done: bool,
}
