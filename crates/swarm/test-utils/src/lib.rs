//! Test utilities for vertex-swarm crates.
//!
//! - [`SimulatedBackend`] - in-memory chain with settlement contracts and an
//!   adjustable clock
//! - fixed keys, addresses and a reference cheque for reproducible tests

mod backend;
mod fixtures;

pub use backend::{SimulatedBackend, SubmittedCheque};
pub use fixtures::*;
