//! A grid snake environment and a tabular Q-learning agent that learns to play it

/// Implemented RL algorithms
pub mod algo;

/// Strategies for decaying hyperparameters between episodes
pub mod decay;

/// Environment
pub mod env;

/// Error type
pub mod error;

/// Exploration policies
pub mod exploration;

/// Testing environments
pub mod gym;

/// Transitions
pub mod memory;

/// Policy persistence
pub mod store;

/// Terminal dashboard and board renderer
#[cfg(feature = "viz")]
pub mod viz;

mod util;

pub use error::{Error, Result};
