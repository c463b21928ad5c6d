pub mod tabular;

pub use tabular::q_table::{Policy, QTableAgent, QTableAgentConfig};
