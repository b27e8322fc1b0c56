//! Win-condition evaluation: seven pure predicates over game state plus
//! the active-player tie-break (spec.md §4.3).

use crate::decoder::descriptor::{RuleDescriptor, ScoringPolicy, WinCondition, WinKind};
use crate::state::GameState;

/// Returns the winner, if any win condition currently holds. Evaluated in
/// declaration order; the first condition whose qualifying set is
/// non-empty decides the game.
pub fn evaluate_win(descriptor: &RuleDescriptor, state: &GameState) -> Option<usize> {
    for wc in &descriptor.win_conditions {
        let qualifying = qualifying_players(wc, descriptor, state);
        if !qualifying.is_empty() {
            return Some(resolve_tie(&qualifying, state.active_player));
        }
    }
    None
}

/// Multiple players can qualify for the same win condition in the same
/// check; the active player wins the tie, falling back to the first
/// qualifying player if the active player isn't among them.
fn resolve_tie(qualifying: &[usize], active_player: usize) -> usize {
    if qualifying.contains(&active_player) {
        active_player
    } else {
        qualifying[0]
    }
}

fn is_terminal(descriptor: &RuleDescriptor, state: &GameState) -> bool {
    state.turn_number >= descriptor.max_turns || (state.deck.is_empty() && state.discard_pile.len() <= 1)
}

fn qualifying_players(
    wc: &WinCondition,
    descriptor: &RuleDescriptor,
    state: &GameState,
) -> Vec<usize> {
    match wc.kind {
        WinKind::EmptyHand => (0..state.hands.len())
            .filter(|&p| state.hands[p].is_empty())
            .collect(),

        WinKind::AllHandsEmpty => {
            if state.hands.iter().all(|h| h.is_empty()) {
                vec![state.active_player]
            } else {
                Vec::new()
            }
        }

        WinKind::ScoreAtLeast => (0..state.hands.len())
            .filter(|&p| score(descriptor, state, p) as u32 >= wc.threshold)
            .collect(),

        WinKind::MostTricks => {
            if !is_terminal(descriptor, state) {
                return Vec::new();
            }
            let tricks: Vec<usize> = (0..state.hands.len()).map(|p| tricks_won(descriptor, state, p)).collect();
            argmax(&tricks)
        }

        WinKind::LowScore => {
            if !is_terminal(descriptor, state) {
                return Vec::new();
            }
            let scores: Vec<u32> = (0..state.hands.len())
                .map(|p| score(descriptor, state, p) as u32)
                .collect();
            argmin(&scores)
        }

        WinKind::CaptureAll => {
            let all_cards_settled = state.deck.is_empty()
                && state.discard_pile.is_empty()
                && state.tableau.is_empty()
                && state.hands.iter().all(|h| h.is_empty());
            if !all_cards_settled {
                return Vec::new();
            }
            let holders: Vec<usize> = (0..state.captured.len())
                .filter(|&p| !state.captured[p].is_empty())
                .collect();
            if holders.len() == 1 {
                holders
            } else {
                Vec::new()
            }
        }

        WinKind::LastStanding => {
            let standing: Vec<usize> = (0..state.chips.len()).filter(|&p| state.chips[p] > 0).collect();
            if standing.len() == 1 {
                standing
            } else {
                Vec::new()
            }
        }
    }
}

fn argmax(values: &[usize]) -> Vec<usize> {
    match values.iter().max() {
        None => Vec::new(),
        Some(&max) => (0..values.len()).filter(|&i| values[i] == max).collect(),
    }
}

fn argmin(values: &[u32]) -> Vec<usize> {
    match values.iter().min() {
        None => Vec::new(),
        Some(&min) => (0..values.len()).filter(|&i| values[i] == min).collect(),
    }
}

/// Number of tricks attributed to `player`, inferred from captured pile
/// size: every resolved trick deposits exactly `player_count` cards into
/// the winner's captured pile.
pub fn tricks_won(descriptor: &RuleDescriptor, state: &GameState, player: usize) -> usize {
    state.captured[player].len() / descriptor.player_count as usize
}

/// Computes `player`'s current score per the descriptor's scoring policy
/// (spec.md §3 `scoring`): `PerCard` sums `rank_points` over captured
/// cards; `PerTrick` counts tricks won, one point each, since a trick's
/// value under this policy is independent of which cards it contained.
pub fn score(descriptor: &RuleDescriptor, state: &GameState, player: usize) -> u32 {
    match descriptor.scoring.policy {
        ScoringPolicy::PerCard => state.captured[player]
            .iter()
            .map(|c| descriptor.scoring.rank_points[c.rank() as usize] as u32)
            .sum(),
        ScoringPolicy::PerTrick => tricks_won(descriptor, state, player) as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Card;
    use crate::decoder::descriptor::{Scoring, Setup};

    fn descriptor(win_conditions: Vec<WinCondition>) -> RuleDescriptor {
        RuleDescriptor {
            version: 1,
            genome_id_hash: 0,
            player_count: 2,
            max_turns: 10,
            setup: Setup {
                cards_per_player: 5,
                initial_discard_count: 0,
            },
            phases: vec![],
            win_conditions,
            scoring: Scoring {
                rank_points: [1; crate::card::RANK_COUNT as usize],
                policy: ScoringPolicy::PerCard,
                bonuses: vec![],
            },
            special_effects: vec![],
        }
    }

    fn state_with_hands(hands: Vec<Vec<Card>>) -> GameState {
        let mut state = GameState::for_test(hands.len());
        state.hands = hands;
        state
    }

    #[test]
    fn empty_hand_declares_winner() {
        let descriptor = descriptor(vec![WinCondition {
            kind: WinKind::EmptyHand,
            threshold: 0,
        }]);
        let mut state = state_with_hands(vec![vec![], vec![Card::new(0, 0)]]);
        state.active_player = 1;
        assert_eq!(evaluate_win(&descriptor, &state), Some(0));
    }

    #[test]
    fn no_condition_met_returns_none() {
        let descriptor = descriptor(vec![WinCondition {
            kind: WinKind::EmptyHand,
            threshold: 0,
        }]);
        let state = state_with_hands(vec![vec![Card::new(0, 0)], vec![Card::new(1, 0)]]);
        assert_eq!(evaluate_win(&descriptor, &state), None);
    }

    #[test]
    fn capture_all_requires_single_holder() {
        let descriptor = descriptor(vec![WinCondition {
            kind: WinKind::CaptureAll,
            threshold: 0,
        }]);
        let mut state = state_with_hands(vec![vec![], vec![]]);
        state.captured[0] = vec![Card::new(0, 0)];
        assert_eq!(evaluate_win(&descriptor, &state), Some(0));
    }

    #[test]
    fn last_standing_requires_exactly_one_player_with_chips() {
        let descriptor = descriptor(vec![WinCondition {
            kind: WinKind::LastStanding,
            threshold: 0,
        }]);
        let mut state = state_with_hands(vec![vec![Card::new(0, 0)], vec![Card::new(1, 0)]]);
        state.chips = vec![0, 100];
        assert_eq!(evaluate_win(&descriptor, &state), Some(1));
    }
}
