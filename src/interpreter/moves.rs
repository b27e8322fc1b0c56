//! Move generation: turns the active player's current phase plus game
//! state into the finite set of legal [`Move`]s (spec.md §4.3).

use crate::card::Card;
use crate::decoder::condition::{evaluate, ConditionNode, MatchMode};
use crate::decoder::descriptor::Phase;
use crate::state::GameState;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Move {
    Draw { count: u8 },
    Play { cards: Vec<Card> },
    Discard { cards: Vec<Card> },
    PlayCard { card: Card },
    Check,
    Call,
    Raise { amount: u32 },
    Fold,
    AllIn,
    Claim { rank: u8, cards: Vec<Card> },
    Pass,
}

/// Generates the legal moves for the active player under `phase`. An empty
/// result means the no-valid-plays fallback in `src/interpreter/mod.rs`
/// must run.
pub fn generate(phase: &Phase, state: &GameState) -> Vec<Move> {
    let player = state.active_player;
    match phase {
        Phase::Draw { count } => vec![Move::Draw { count: *count }],

        Phase::Play {
            min,
            max,
            follows_tableau,
            condition,
        } => generate_hand_subsets(
            &state.hands[player],
            *min,
            *max,
            condition,
            *follows_tableau,
            state,
            player,
        )
        .into_iter()
        .map(|cards| Move::Play { cards })
        .collect(),

        Phase::Discard { count, condition } => generate_hand_subsets(
            &state.hands[player],
            *count,
            *count,
            condition,
            false,
            state,
            player,
        )
        .into_iter()
        .map(|cards| Move::Discard { cards })
        .collect(),

        Phase::Trick { .. } => generate_trick_moves(state, player),

        Phase::Betting {
            min_bet,
            max_raises,
        } => generate_betting_moves(state, player, *min_bet, *max_raises),

        Phase::Claim { .. } => generate_claim_moves(state, player),
    }
}

/// Enumerates every subset of `hand` whose size falls in `[min, max]` and
/// whose cards individually satisfy `condition` — plus, when
/// `follows_tableau` is set, `MatchesTop` against the discard pile's top
/// card, on top of whatever the condition tree already checks (spec.md
/// §4.3: "for tableau-following games, match MatchesTop"). Singletons are
/// produced first (size `min`, which equals 1 in the common case) and the
/// set only widens to true combinations once `max > 1`.
fn generate_hand_subsets(
    hand: &[Card],
    min: u8,
    max: u8,
    condition: &ConditionNode,
    follows_tableau: bool,
    state: &GameState,
    player: usize,
) -> Vec<Vec<Card>> {
    let candidates: Vec<Card> = hand
        .iter()
        .copied()
        .filter(|&card| {
            evaluate(condition, state, player, card)
                && (!follows_tableau
                    || evaluate(
                        &ConditionNode::MatchesTop {
                            mode: MatchMode::Either,
                        },
                        state,
                        player,
                        card,
                    ))
        })
        .collect();

    let mut subsets = Vec::new();
    for size in min..=max {
        subsets.extend(combinations(&candidates, size as usize));
    }
    subsets
}

fn combinations(items: &[Card], size: usize) -> Vec<Vec<Card>> {
    if size == 0 {
        return vec![Vec::new()];
    }
    if items.len() < size {
        return Vec::new();
    }
    let mut result = Vec::new();
    for i in 0..=(items.len() - size) {
        let head = items[i];
        for mut tail in combinations(&items[i + 1..], size - 1) {
            let mut combo = Vec::with_capacity(size);
            combo.push(head);
            combo.append(&mut tail);
            result.push(combo);
        }
    }
    result
}

fn generate_trick_moves(state: &GameState, player: usize) -> Vec<Move> {
    let hand = &state.hands[player];
    if hand.is_empty() {
        return Vec::new();
    }
    if player == state.trick_leader {
        return hand.iter().map(|&card| Move::PlayCard { card }).collect();
    }
    let suit = match state.trick_suit {
        Some(suit) => suit,
        None => return hand.iter().map(|&card| Move::PlayCard { card }).collect(),
    };
    let following: Vec<Card> = hand.iter().copied().filter(|c| c.suit() == suit).collect();
    if following.is_empty() {
        hand.iter().map(|&card| Move::PlayCard { card }).collect()
    } else {
        following
            .into_iter()
            .map(|card| Move::PlayCard { card })
            .collect()
    }
}

fn generate_betting_moves(
    state: &GameState,
    player: usize,
    min_bet: u32,
    max_raises: u8,
) -> Vec<Move> {
    let chips = state.chips[player];
    let call_amount = state.last_raise;
    let mut moves = Vec::new();

    if chips == 0 {
        return moves;
    }

    if call_amount == 0 {
        moves.push(Move::Check);
    } else if chips >= call_amount {
        moves.push(Move::Call);
    }

    let raise_amount = call_amount.saturating_add(min_bet);
    if state.betting_raises_this_round() < max_raises && chips > raise_amount {
        moves.push(Move::Raise {
            amount: raise_amount,
        });
    }

    moves.push(Move::Fold);
    moves.push(Move::AllIn);
    moves
}

fn generate_claim_moves(state: &GameState, player: usize) -> Vec<Move> {
    let hand = &state.hands[player];
    let mut moves = vec![Move::Pass];
    let max_count = hand.len().min(4);
    for k in 1..=max_count {
        moves.push(Move::Claim {
            rank: state.claim_next_rank,
            cards: hand[..k].to_vec(),
        });
    }
    moves
}
