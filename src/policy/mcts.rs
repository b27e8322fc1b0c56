//! Monte Carlo tree search policy (spec.md §4.4): grows an arena-allocated
//! tree of decision points, selecting with UCT and backing up random
//! rollouts, before committing to the root move with the most visits.
//!
//! Nodes live in a flat `Vec` addressed by `usize`, the same arena-over-
//! `Rc<RefCell<_>>` choice the teacher makes for `solver.rs`'s transposition
//! table — here there's no need for a map since every node has exactly one
//! parent move.

use std::f64::consts::SQRT_2;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::decoder::descriptor::{Phase, RuleDescriptor};
use crate::interpreter::moves::Move;
use crate::interpreter::{advance_to_decision, apply_decision, StepOutcome};
use crate::policy::random::RandomPolicy;
use crate::policy::Policy;
use crate::state::{GameState, ScratchPool};

const MAX_ROLLOUT_PLIES: u32 = 40;

struct MctsNode {
    move_from_parent: Option<Move>,
    children: Vec<usize>,
    phase: Option<Phase>,
    untried: Vec<Move>,
    terminal_winner: Option<Option<usize>>,
    visits: u32,
    total_value: f64,
}

impl MctsNode {
    fn decision(phase: Phase, moves: Vec<Move>, move_from_parent: Option<Move>) -> Self {
        MctsNode {
            move_from_parent,
            children: Vec::new(),
            phase: Some(phase),
            untried: moves,
            terminal_winner: None,
            visits: 0,
            total_value: 0.0,
        }
    }

    fn terminal(winner: Option<usize>, move_from_parent: Option<Move>) -> Self {
        MctsNode {
            move_from_parent,
            children: Vec::new(),
            phase: None,
            untried: Vec::new(),
            terminal_winner: Some(winner),
            visits: 0,
            total_value: 0.0,
        }
    }

    fn is_terminal(&self) -> bool {
        self.terminal_winner.is_some()
    }

    fn is_fully_expanded(&self) -> bool {
        self.untried.is_empty()
    }
}

/// Runs `iterations` rounds of selection/expansion/rollout/backprop per
/// decision, starting a fresh tree each time (the tree from the previous
/// decision is stale: the opponent's actual move rarely matches the one
/// MCTS would have explored next).
pub struct MctsPolicy<'a> {
    descriptor: &'a RuleDescriptor,
    iterations: u32,
}

impl<'a> MctsPolicy<'a> {
    pub fn new(descriptor: &'a RuleDescriptor, iterations: u32) -> Self {
        MctsPolicy {
            descriptor,
            iterations,
        }
    }
}

impl<'a> Policy for MctsPolicy<'a> {
    fn select(&self, state: &GameState, moves: &[Move], rng: &mut SmallRng) -> usize {
        if moves.len() == 1 {
            return 0;
        }

        let root_player = state.active_player;
        let phase = self.descriptor.phases[state.current_phase_index].clone();
        let mut nodes = vec![MctsNode::decision(phase, moves.to_vec(), None)];

        let scratch_pool = ScratchPool::new();
        let rollout_policy = RandomPolicy;
        // Rollouts and tree growth draw from separate streams so tree
        // shape doesn't change which cards a rollout happens to draw.
        let mut rollout_rng = SmallRng::seed_from_u64(rng.gen::<u64>());

        for _ in 0..self.iterations {
            let mut scratch = scratch_pool.acquire_copy_of(state);
            let mut path = vec![0usize];
            let mut current = 0usize;

            while !nodes[current].is_terminal()
                && nodes[current].is_fully_expanded()
                && !nodes[current].children.is_empty()
            {
                let child = select_child_uct(&nodes, current);
                let mv = nodes[child]
                    .move_from_parent
                    .clone()
                    .expect("every non-root node was reached by a move");
                let phase = nodes[current]
                    .phase
                    .clone()
                    .expect("non-terminal node carries its phase");
                let _ = apply_decision(self.descriptor, &mut scratch, &phase, &mv);
                current = child;
                path.push(current);
            }

            if !nodes[current].is_terminal() && !nodes[current].is_fully_expanded() {
                let pick = rng.gen_range(0..nodes[current].untried.len());
                let mv = nodes[current].untried.swap_remove(pick);
                let phase = nodes[current]
                    .phase
                    .clone()
                    .expect("non-terminal node carries its phase");
                let _ = apply_decision(self.descriptor, &mut scratch, &phase, &mv);
                let child_index = expand(self.descriptor, &mut scratch, &mut nodes, mv);
                nodes[current].children.push(child_index);
                current = child_index;
                path.push(current);
            }

            let value = match nodes[current].terminal_winner {
                Some(winner) => reward(winner, root_player),
                None => rollout(
                    self.descriptor,
                    &mut scratch,
                    &rollout_policy,
                    &mut rollout_rng,
                    root_player,
                ),
            };

            for &idx in &path {
                nodes[idx].visits += 1;
                nodes[idx].total_value += value;
            }
        }

        let best_child = nodes[0]
            .children
            .iter()
            .copied()
            .max_by_key(|&c| nodes[c].visits)
            .expect("root expands at least one child given at least one iteration");
        let best_move = nodes[best_child]
            .move_from_parent
            .clone()
            .expect("child node always has a move");
        moves.iter().position(|m| *m == best_move).unwrap_or(0)
    }
}

fn expand(
    descriptor: &RuleDescriptor,
    scratch: &mut GameState,
    nodes: &mut Vec<MctsNode>,
    mv: Move,
) -> usize {
    let node = match advance_to_decision(descriptor, scratch) {
        StepOutcome::Terminal { winner } => MctsNode::terminal(winner, Some(mv)),
        StepOutcome::Decision { phase, moves } => MctsNode::decision(phase, moves, Some(mv)),
    };
    nodes.push(node);
    nodes.len() - 1
}

fn select_child_uct(nodes: &[MctsNode], parent: usize) -> usize {
    let parent_visits = nodes[parent].visits.max(1) as f64;
    nodes[parent]
        .children
        .iter()
        .copied()
        .max_by(|&a, &b| {
            uct_value(&nodes[a], parent_visits)
                .partial_cmp(&uct_value(&nodes[b], parent_visits))
                .unwrap()
        })
        .expect("caller only descends into nodes with children")
}

fn uct_value(node: &MctsNode, parent_visits: f64) -> f64 {
    if node.visits == 0 {
        return f64::INFINITY;
    }
    let visits = node.visits as f64;
    let exploitation = node.total_value / visits;
    let exploration = SQRT_2 * (parent_visits.ln() / visits).sqrt();
    exploitation + exploration
}

/// Plays the game forward with [`RandomPolicy`] for every seat, capped at
/// 40 plies, scoring the result from `root_player`'s perspective. A game
/// that hasn't ended by the ply cap is scored as a draw.
fn rollout(
    descriptor: &RuleDescriptor,
    state: &mut GameState,
    policy: &RandomPolicy,
    rng: &mut SmallRng,
    root_player: usize,
) -> f64 {
    for _ in 0..MAX_ROLLOUT_PLIES {
        match advance_to_decision(descriptor, state) {
            StepOutcome::Terminal { winner } => return reward(winner, root_player),
            StepOutcome::Decision { phase, mut moves } => {
                let choice = if moves.len() == 1 {
                    0
                } else {
                    policy.select(state, &moves, rng)
                };
                let chosen = moves.swap_remove(choice);
                if apply_decision(descriptor, state, &phase, &chosen).is_err() {
                    return 0.5;
                }
            }
        }
    }
    0.5
}

fn reward(winner: Option<usize>, root_player: usize) -> f64 {
    match winner {
        Some(p) if p == root_player => 1.0,
        Some(_) => 0.0,
        None => 0.5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::condition::{Cmp, ConditionNode};
    use crate::decoder::descriptor::{Scoring, ScoringPolicy, Setup, WinCondition, WinKind};
    use crate::state::StatePool;

    fn two_player_empty_hand_descriptor() -> RuleDescriptor {
        RuleDescriptor {
            version: 1,
            genome_id_hash: 0,
            player_count: 2,
            max_turns: 200,
            setup: Setup {
                cards_per_player: 3,
                initial_discard_count: 1,
            },
            phases: vec![Phase::Play {
                min: 1,
                max: 1,
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
    fn search_returns_an_in_range_move_index() {
        let descriptor = two_player_empty_hand_descriptor();
        let pool = StatePool::new(&descriptor);
        let mut state = pool.acquire(&descriptor, 3);
        crate::interpreter::setup(&descriptor, &mut state);

        let policy = MctsPolicy::new(&descriptor, 16);
        let moves = crate::interpreter::moves::generate(&descriptor.phases[0], &state);
        let mut rng = SmallRng::seed_from_u64(9);
        let choice = policy.select(&state, &moves, &mut rng);
        assert!(choice < moves.len());
    }

    #[test]
    fn single_candidate_short_circuits_search() {
        let descriptor = two_player_empty_hand_descriptor();
        let policy = MctsPolicy::new(&descriptor, 100);
        let state = GameState::for_test(2);
        let moves = vec![Move::Pass];
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(policy.select(&state, &moves, &mut rng), 0);
    }
}
