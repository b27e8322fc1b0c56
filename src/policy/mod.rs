//! Pluggable AI policies the interpreter invokes whenever a decision
//! isn't forced (spec.md §4.4).

pub mod greedy;
pub mod mcts;
pub mod random;

use rand::rngs::SmallRng;

use crate::interpreter::moves::Move;
use crate::state::GameState;

/// Chooses one of `moves` for the active player in `state`. Implementors
/// must be deterministic given `rng`'s stream so that games replay
/// identically from the same seed.
pub trait Policy {
    fn select(&self, state: &GameState, moves: &[Move], rng: &mut SmallRng) -> usize;
}
