//! The rule interpreter: setup, the main per-turn loop, and the glue
//! between move generation, AI policies, and apply (spec.md §4.3).

pub mod apply;
pub mod moves;
pub mod win;

use rand::seq::SliceRandom;

use crate::card::full_deck;
use crate::decoder::descriptor::{Phase, RuleDescriptor};
use crate::error::RuntimeError;
use crate::policy::Policy;
use moves::Move;
use crate::state::{GameState, Metrics};

/// Outcome of one completed game, handed off to `src/batch` to become a
/// `GameResult`.
#[derive(Clone, Copy, Debug)]
pub struct GameOutcome {
    pub winner: Option<usize>,
    pub turns_played: u32,
    pub metrics: Metrics,
}

/// Deals the deck, places the initial discard, and seeds chips — spec.md
/// §4.3 "Setup".
pub fn setup(descriptor: &RuleDescriptor, state: &mut GameState) {
    state.deck.extend(full_deck());
    state.deck.shuffle(&mut state.rng);

    let player_count = descriptor.player_count as usize;
    for _ in 0..descriptor.setup.cards_per_player {
        for player in 0..player_count {
            if let Some(card) = state.deck.pop() {
                state.hands[player].push(card);
            }
        }
    }

    for _ in 0..descriptor.setup.initial_discard_count {
        if let Some(card) = state.deck.pop() {
            state.discard_pile.push(card);
        }
    }

    if descriptor.has_betting() {
        for chip in state.chips.iter_mut() {
            *chip = 1_000;
        }
    }
}

/// What the interpreter's decision loop found at the current point in the
/// game: either a real decision (with the phase it belongs to, needed by
/// [`apply_decision`]) or a terminal outcome.
pub enum StepOutcome {
    Decision { phase: Phase, moves: Vec<Move> },
    Terminal { winner: Option<usize> },
}

/// Runs the loop's steps 1-3 (check win, generate moves, apply the
/// no-valid-plays fallback) until either a real decision point is reached
/// or the game ends. Shared by [`run_game`] and `MctsPolicy`'s tree growth
/// and rollouts, so both walk the exact same state machine.
pub fn advance_to_decision(descriptor: &RuleDescriptor, state: &mut GameState) -> StepOutcome {
    loop {
        if let Some(winner) = win::evaluate_win(descriptor, state) {
            return StepOutcome::Terminal { winner: Some(winner) };
        }
        if state.turn_number >= descriptor.max_turns {
            return StepOutcome::Terminal { winner: None };
        }

        let phase = descriptor.phases[state.current_phase_index].clone();

        if matches!(phase, Phase::Betting { .. })
            && state.betting_phase_is_fresh(state.turn_number, state.current_phase_index)
        {
            state.start_betting_round();
            state.mark_betting_phase_started(state.turn_number, state.current_phase_index);
        }

        let candidate_moves = moves::generate(&phase, state);
        state.metrics.valid_moves += candidate_moves.len() as u64;

        if candidate_moves.is_empty() {
            apply_fallback(&phase, state);
            advance_phase_if_complete(descriptor, state, &phase);
            continue;
        }

        state.metrics.decisions += 1;
        if candidate_moves.len() == 1 {
            state.metrics.forced_decisions += 1;
        }
        return StepOutcome::Decision {
            phase,
            moves: candidate_moves,
        };
    }
}

/// Applies the chosen move for a [`StepOutcome::Decision`], updates the
/// leader-change detectors, and advances the phase/turn if the phase's
/// completion condition now holds (spec.md §4.3 steps 4-6).
pub fn apply_decision(
    descriptor: &RuleDescriptor,
    state: &mut GameState,
    phase: &Phase,
    chosen: &Move,
) -> Result<(), RuntimeError> {
    apply::apply(phase, state, chosen)?;

    state.update_hand_size_leader();
    let player_count = descriptor.player_count as usize;
    let scores: Vec<u32> = (0..player_count)
        .map(|p| win::score(descriptor, state, p))
        .collect();
    state.update_score_leader(&scores);

    advance_phase_if_complete(descriptor, state, phase);
    Ok(())
}

fn advance_phase_if_complete(descriptor: &RuleDescriptor, state: &mut GameState, phase: &Phase) {
    let player_count = descriptor.player_count as usize;
    let phase_complete = match phase {
        Phase::Draw { .. } | Phase::Play { .. } | Phase::Discard { .. } => true,
        Phase::Trick { .. } | Phase::Claim { .. } => {
            state.hands.iter().all(|hand| hand.is_empty())
        }
        Phase::Betting { .. } => apply::betting_round_complete(state),
    };

    if !phase_complete {
        return;
    }

    state.current_phase_index += 1;
    let self_advancing = matches!(
        phase,
        Phase::Trick { .. } | Phase::Betting { .. } | Phase::Claim { .. }
    );
    if state.current_phase_index >= descriptor.phases.len() {
        state.current_phase_index = 0;
        state.turn_number += 1;
        if !self_advancing {
            state.active_player = (state.active_player + 1) % player_count;
        }
    }
}

/// Runs one complete game: Setup, then the main loop until a win
/// condition fires or `max_turns` is reached (a draw). `policies[p]`
/// drives player `p`'s decisions.
pub fn run_game(
    descriptor: &RuleDescriptor,
    state: &mut GameState,
    policies: &[&dyn Policy],
) -> Result<GameOutcome, RuntimeError> {
    setup(descriptor, state);

    loop {
        let (phase, mut candidate_moves) = match advance_to_decision(descriptor, state) {
            StepOutcome::Terminal { winner } => return Ok(finish(state, winner)),
            StepOutcome::Decision { phase, moves } => (phase, moves),
        };

        let chosen_index = if candidate_moves.len() == 1 {
            0
        } else {
            let player = state.active_player;
            let mut rng = state.rng.clone();
            let choice = policies[player].select(state, &candidate_moves, &mut rng);
            state.rng = rng;
            choice
        };
        let chosen = candidate_moves.swap_remove(chosen_index);
        apply_decision(descriptor, state, &phase, &chosen)?;
    }
}

fn finish(state: &GameState, winner: Option<usize>) -> GameOutcome {
    GameOutcome {
        winner,
        turns_played: state.turn_number,
        metrics: state.metrics,
    }
}

/// No-valid-plays policies (spec.md §4.3, step 3): `Play` falls back to
/// drawing up to three cards; `Draw`'s own insufficiency handling lives in
/// `apply::apply`; everything else passes.
fn apply_fallback(phase: &Phase, state: &mut GameState) {
    if let Phase::Play { .. } = phase {
        if state.deck.len() < 3 {
            apply::recycle(state);
        }
        let actual = 3.min(state.deck.len());
        let player = state.active_player;
        for _ in 0..actual {
            if let Some(card) = state.deck.pop() {
                state.hands[player].push(card);
            }
        }
    }
}
