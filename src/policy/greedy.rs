//! One-ply lookahead policy: tries every candidate move on a scratch copy
//! of the state and keeps the one that scores best under a heuristic
//! chosen from the rule descriptor's win conditions (spec.md §4.4).
//!
//! Grounded in the teacher's `solver.rs` minimax evaluation (score each
//! resulting state, keep the best), cut down to depth one and built on
//! [`ScratchPool`] instead of a fresh `clone()` per branch.

use crate::decoder::descriptor::{RuleDescriptor, WinKind};
use crate::interpreter::apply;
use crate::interpreter::moves::Move;
use crate::policy::Policy;
use crate::state::{GameState, ScratchPool};
use rand::rngs::SmallRng;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Heuristic {
    /// Fewer cards in hand is better (shedding games).
    Shedder,
    /// More captured cards is better (trick-taking / collection games).
    Capture,
    /// More chips is better (betting games).
    Chips,
}

/// Greedy one-ply policy: evaluates every candidate move by applying it to
/// a scratch copy of the live state and scoring the result, breaking ties
/// in favor of the first-seen (lowest-index) move.
pub struct GreedyPolicy<'a> {
    descriptor: &'a RuleDescriptor,
    heuristic: Heuristic,
    scratch: ScratchPool,
}

impl<'a> GreedyPolicy<'a> {
    pub fn new(descriptor: &'a RuleDescriptor) -> Self {
        GreedyPolicy {
            descriptor,
            heuristic: heuristic_for(descriptor),
            scratch: ScratchPool::new(),
        }
    }

    fn score(&self, state: &GameState, player: usize) -> i64 {
        match self.heuristic {
            Heuristic::Shedder => -(state.hands[player].len() as i64),
            Heuristic::Capture => state.captured[player].len() as i64,
            Heuristic::Chips => state.chips[player] as i64,
        }
    }
}

fn heuristic_for(descriptor: &RuleDescriptor) -> Heuristic {
    let shedder = descriptor
        .win_conditions
        .iter()
        .any(|wc| matches!(wc.kind, WinKind::EmptyHand | WinKind::AllHandsEmpty));
    if shedder {
        return Heuristic::Shedder;
    }
    if descriptor.has_betting() {
        return Heuristic::Chips;
    }
    Heuristic::Capture
}

impl<'a> Policy for GreedyPolicy<'a> {
    fn select(&self, state: &GameState, moves: &[Move], _rng: &mut SmallRng) -> usize {
        debug_assert!(!moves.is_empty());
        let player = state.active_player;
        let phase = &self.descriptor.phases[state.current_phase_index];

        let mut best_index = 0;
        let mut best_score = i64::MIN;
        for (index, mv) in moves.iter().enumerate() {
            let mut scratch = self.scratch.acquire_copy_of(state);
            if apply::apply(phase, &mut scratch, mv).is_err() {
                continue;
            }
            let score = self.score(&scratch, player);
            if score > best_score {
                best_score = score;
                best_index = index;
            }
        }
        best_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Card;
    use crate::decoder::condition::{Cmp, ConditionNode};
    use crate::decoder::descriptor::{Phase, Scoring, ScoringPolicy, Setup, WinCondition};
    use rand::SeedableRng;

    fn shedder_descriptor() -> RuleDescriptor {
        RuleDescriptor {
            version: 1,
            genome_id_hash: 0,
            player_count: 2,
            max_turns: 100,
            setup: Setup {
                cards_per_player: 5,
                initial_discard_count: 1,
            },
            phases: vec![Phase::Play {
                min: 1,
                max: 2,
                follows_tableau: false,
                condition: ConditionNode::CheckHandSize { cmp: Cmp::Ge, n: 0 },
            }],
            win_conditions: vec![WinCondition {
                kind: WinKind::EmptyHand,
                threshold: 0,
            }],
            scoring: Scoring {
                rank_points: [1; crate::card::RANK_COUNT as usize],
                policy: ScoringPolicy::PerCard,
                bonuses: vec![],
            },
            special_effects: vec![],
        }
    }

    #[test]
    fn prefers_playing_the_whole_hand_over_one_card() {
        let descriptor = shedder_descriptor();
        let policy = GreedyPolicy::new(&descriptor);
        let mut state = GameState::for_test(2);
        state.hands[0] = vec![Card::new(0, 0), Card::new(1, 0)];
        let moves = vec![
            Move::Play {
                cards: vec![Card::new(0, 0)],
            },
            Move::Play {
                cards: vec![Card::new(0, 0), Card::new(1, 0)],
            },
        ];
        let mut rng = SmallRng::seed_from_u64(1);
        let choice = policy.select(&state, &moves, &mut rng);
        assert_eq!(choice, 1);
    }

    #[test]
    fn single_move_is_trivially_chosen() {
        let descriptor = shedder_descriptor();
        let policy = GreedyPolicy::new(&descriptor);
        let mut state = GameState::for_test(2);
        state.hands[0] = vec![Card::new(0, 0)];
        let moves = vec![Move::Play {
            cards: vec![Card::new(0, 0)],
        }];
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(policy.select(&state, &moves, &mut rng), 0);
    }
}
