//! Uniform random policy — the baseline opponent for win-rate benchmarks
//! (spec.md §4.4) and the rollout policy inside MCTS.

use rand::Rng;
use rand::rngs::SmallRng;

use crate::interpreter::moves::Move;
use crate::policy::Policy;
use crate::state::GameState;

pub struct RandomPolicy;

impl Policy for RandomPolicy {
    fn select(&self, _state: &GameState, moves: &[Move], rng: &mut SmallRng) -> usize {
        rng.gen_range(0..moves.len())
    }
}
