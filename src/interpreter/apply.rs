//! Applies a chosen [`Move`] to [`GameState`] in place: mutates the
//! relevant fields and updates instrumentation counters (spec.md §4.3
//! "Apply").

use crate::decoder::descriptor::Phase;
use crate::error::RuntimeError;
use crate::interpreter::moves::Move;
use crate::state::GameState;
use rand::seq::SliceRandom;

fn remove_cards(hand: &mut Vec<crate::card::Card>, cards: &[crate::card::Card]) -> Result<(), RuntimeError> {
    for card in cards {
        let pos = hand.iter().position(|c| c == card).ok_or(RuntimeError::IllegalMove)?;
        hand.remove(pos);
    }
    Ok(())
}

/// Shuffles `discard_pile[..len-1]` back into `deck`, keeping the top
/// discard card in place — spec.md §4.3 "Recycle".
pub(crate) fn recycle(state: &mut GameState) {
    if state.discard_pile.len() <= 1 {
        return;
    }
    let top = state.discard_pile.pop();
    state.deck.append(&mut state.discard_pile);
    state.deck.shuffle(&mut state.rng);
    if let Some(top) = top {
        state.discard_pile.push(top);
    }
}

pub fn apply(phase: &Phase, state: &mut GameState, mv: &Move) -> Result<(), RuntimeError> {
    let player = state.active_player;
    state.metrics.actions += 1;

    match (phase, mv) {
        (Phase::Draw { .. }, Move::Draw { count }) => {
            if state.deck.len() < *count as usize {
                recycle(state);
            }
            let actual = (*count as usize).min(state.deck.len());
            for _ in 0..actual {
                if let Some(card) = state.deck.pop() {
                    state.hands[player].push(card);
                }
            }
        }

        (Phase::Play { .. }, Move::Play { cards }) => {
            remove_cards(&mut state.hands[player], cards)?;
            state.discard_pile.extend_from_slice(cards);
        }

        (Phase::Discard { .. }, Move::Discard { cards }) => {
            remove_cards(&mut state.hands[player], cards)?;
            state.discard_pile.extend_from_slice(cards);
        }

        (Phase::Trick { .. }, Move::PlayCard { card }) => {
            remove_cards(&mut state.hands[player], std::slice::from_ref(card))?;
            if state.tableau.is_empty() {
                state.trick_leader = player;
                state.trick_suit = Some(card.suit());
            }
            state.tableau.push(*card);
            state.metrics.interactions += 1;

            let player_count = state.hands.len();
            if state.tableau.len() == player_count {
                resolve_trick(state, player_count);
            } else {
                state.active_player = (player + 1) % player_count;
            }
        }

        (Phase::Betting { .. }, Move::Check) => {
            state.record_betting_action();
            advance_betting_turn(state);
        }

        (Phase::Betting { .. }, Move::Call) => {
            let amount = state.last_raise.min(state.chips[player]);
            state.chips[player] -= amount;
            state.pot += amount;
            state.metrics.interactions += 1;
            state.record_betting_action();
            advance_betting_turn(state);
        }

        (Phase::Betting { .. }, Move::Raise { amount }) => {
            let amount = (*amount).min(state.chips[player]);
            state.chips[player] -= amount;
            state.pot += amount;
            state.last_raise = amount;
            state.metrics.interactions += 1;
            state.record_raise();
            advance_betting_turn(state);
        }

        (Phase::Betting { .. }, Move::Fold) => {
            state.folded[player] = true;
            state.metrics.interactions += 1;
            state.record_betting_action();
            advance_betting_turn(state);
        }

        (Phase::Betting { .. }, Move::AllIn) => {
            let amount = state.chips[player];
            state.chips[player] = 0;
            state.pot += amount;
            if amount > state.last_raise {
                state.last_raise = amount;
                state.record_raise();
            } else {
                state.record_betting_action();
            }
            state.metrics.interactions += 1;
            advance_betting_turn(state);
        }

        (Phase::Claim { rank_sequence }, Move::Claim { rank, cards }) => {
            remove_cards(&mut state.hands[player], cards)?;
            state.claim_pile.extend_from_slice(cards);
            state.metrics.interactions += 1;
            resolve_challenge(state, player, *rank, cards.len());
            advance_claim_rank(state, rank_sequence);
        }

        (Phase::Claim { .. }, Move::Pass) => {
            let player_count = state.hands.len();
            state.active_player = (player + 1) % player_count;
        }

        _ => return Err(RuntimeError::IllegalMove),
    }

    Ok(())
}

fn advance_betting_turn(state: &mut GameState) {
    let player_count = state.hands.len();
    let mut next = (state.active_player + 1) % player_count;
    let mut scanned = 0;
    while state.folded[next] && scanned < player_count {
        next = (next + 1) % player_count;
        scanned += 1;
    }
    state.active_player = next;
}

/// True once every non-folded player has acted since the last raise (or
/// since the round began, if nobody has raised).
pub fn betting_round_complete(state: &GameState) -> bool {
    state.non_folded_count() <= 1 || state.betting_acted_since_raise() as usize >= state.non_folded_count()
}

fn resolve_trick(state: &mut GameState, player_count: usize) {
    let suit = state.trick_suit;
    let mut winner = state.trick_leader;
    let mut best_rank = None;
    for offset in 0..player_count {
        let p = (state.trick_leader + offset) % player_count;
        let card = state.tableau[offset];
        let follows = suit.map_or(true, |s| card.suit() == s);
        if follows && best_rank.map_or(true, |r| card.rank() > r) {
            best_rank = Some(card.rank());
            winner = p;
        }
    }
    let won_cards: Vec<_> = state.tableau.drain(..).collect();
    state.captured[winner].extend(won_cards);
    state.trick_leader = winner;
    state.trick_suit = None;
    state.active_player = winner;
    state.update_trick_leader(winner);
}

/// Deterministic challenge policy (spec.md §4.3 "Claim"): the next player
/// challenges iff their chip count exceeds the median chip count. A
/// successful challenge (the claimed cards don't actually match `rank`)
/// returns the whole claim pile to the claimant's hand as a penalty.
fn resolve_challenge(state: &mut GameState, claimant: usize, rank: u8, claimed_count: usize) {
    let player_count = state.hands.len();
    let challenger = (claimant + 1) % player_count;
    if !should_challenge(&state.chips, challenger) {
        return;
    }

    let actually_matches = state
        .claim_pile
        .iter()
        .rev()
        .take(claimed_count)
        .all(|c| c.rank() == rank);

    state.metrics.interactions += 1;
    if !actually_matches {
        let returned: Vec<_> = state.claim_pile.drain(..).collect();
        state.hands[claimant].extend(returned);
    }
}

fn should_challenge(chips: &[u32], challenger: usize) -> bool {
    let mut sorted: Vec<u32> = chips.to_vec();
    sorted.sort_unstable();
    let median = sorted[sorted.len() / 2];
    chips[challenger] > median
}

fn advance_claim_rank(state: &mut GameState, rank_sequence: &[u8]) {
    let player_count = state.hands.len();
    state.active_player = (state.active_player + 1) % player_count;
    if rank_sequence.is_empty() {
        return;
    }
    let current_index = rank_sequence
        .iter()
        .position(|&r| r == state.claim_next_rank)
        .unwrap_or(0);
    state.claim_next_rank = rank_sequence[(current_index + 1) % rank_sequence.len()];
}
