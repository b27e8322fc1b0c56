//! Integration tests for the concrete batch scenarios from spec.md §8:
//! each test builds a hand-assembled [`RuleDescriptor`] (or, for the
//! decoder scenario, a corrupted byte buffer) and checks an end-to-end
//! property of a whole batch rather than a single interpreter step.

use darwindeck_engine::batch::{run_batch, AiKind};
use darwindeck_engine::decoder::condition::{Cmp, ConditionNode};
use darwindeck_engine::decoder::descriptor::{
    Phase, RuleDescriptor, Scoring, ScoringPolicy, Setup, WinCondition, WinKind,
};
use darwindeck_engine::card::RANK_COUNT;
use darwindeck_engine::decode;
use darwindeck_engine::error::DecodeError;

fn always_legal() -> ConditionNode {
    ConditionNode::CheckHandSize { cmp: Cmp::Ge, n: 0 }
}

fn flat_scoring() -> Scoring {
    Scoring {
        rank_points: [1; RANK_COUNT as usize],
        policy: ScoringPolicy::PerCard,
        bonuses: vec![],
    }
}

/// spec.md §8 scenario 1: a two-player trick-taking game dealing the full
/// deck (26 cards each) that only ends when one player has captured every
/// card, or the turn budget runs out in a draw.
#[test]
fn two_player_trick_game_accounts_for_every_game() {
    let descriptor = RuleDescriptor {
        version: 1,
        genome_id_hash: 0,
        player_count: 2,
        max_turns: 300,
        setup: Setup {
            cards_per_player: 26,
            initial_discard_count: 0,
        },
        phases: vec![Phase::Trick { lead_rule: 0 }],
        win_conditions: vec![WinCondition {
            kind: WinKind::CaptureAll,
            threshold: 0,
        }],
        scoring: flat_scoring(),
        special_effects: vec![],
    };
    let ai = vec![AiKind::Random, AiKind::Random];
    let stats = run_batch(&descriptor, 4, &ai, 0, 42, None);

    assert_eq!(stats.total_games, 4);
    assert_eq!(
        stats.wins.iter().sum::<u32>() + stats.draws + stats.errors,
        4
    );
    assert_eq!(stats.errors, 0);
    assert!(stats.avg_turns > 0.0);
}

/// spec.md §8 scenario 2: a four-player shedder (Draw, Play, Draw each
/// turn) should reach `AllHandsEmpty` well before `max_turns` in at least
/// some of its games.
#[test]
fn four_player_shedder_ends_before_turn_limit() {
    let descriptor = RuleDescriptor {
        version: 1,
        genome_id_hash: 0,
        player_count: 4,
        max_turns: 500,
        setup: Setup {
            cards_per_player: 12,
            initial_discard_count: 1,
        },
        phases: vec![
            Phase::Draw { count: 1 },
            Phase::Play {
                min: 1,
                max: 1,
                follows_tableau: false,
                condition: always_legal(),
            },
            Phase::Draw { count: 1 },
        ],
        win_conditions: vec![WinCondition {
            kind: WinKind::AllHandsEmpty,
            threshold: 0,
        }],
        scoring: flat_scoring(),
        special_effects: vec![],
    };
    let ai = vec![AiKind::Random; 4];
    let stats = run_batch(&descriptor, 10, &ai, 0, 7, None);

    assert_eq!(stats.total_games, 10);
    assert_eq!(stats.errors, 0);
    assert!(stats.avg_turns < descriptor.max_turns as f64);
}

/// spec.md §8 scenario 3: a two-player betting game (two `Betting` phases
/// interleaved with two `Play` phases) should produce betting
/// interactions (checks/calls/raises/folds/all-ins) across a batch.
#[test]
fn two_player_betting_game_produces_interactions() {
    let descriptor = RuleDescriptor {
        version: 1,
        genome_id_hash: 0,
        player_count: 2,
        max_turns: 400,
        setup: Setup {
            cards_per_player: 26,
            initial_discard_count: 0,
        },
        phases: vec![
            Phase::Betting {
                min_bet: 10,
                max_raises: 3,
            },
            Phase::Play {
                min: 1,
                max: 1,
                follows_tableau: false,
                condition: always_legal(),
            },
            Phase::Betting {
                min_bet: 10,
                max_raises: 3,
            },
            Phase::Play {
                min: 1,
                max: 1,
                follows_tableau: false,
                condition: always_legal(),
            },
        ],
        win_conditions: vec![WinCondition {
            kind: WinKind::LastStanding,
            threshold: 0,
        }],
        scoring: flat_scoring(),
        special_effects: vec![],
    };
    let ai = vec![AiKind::Random, AiKind::Random];
    let stats = run_batch(&descriptor, 20, &ai, 0, 99, None);

    assert_eq!(stats.total_games, 20);
    assert_eq!(stats.errors, 0);
    assert!(stats.total_interactions > 0);
}

/// spec.md §8 scenario 4: a bytecode buffer whose phase count claims more
/// phases than the buffer actually holds must be rejected rather than
/// read out of bounds.
#[test]
fn truncated_phase_list_is_rejected_not_read_out_of_bounds() {
    let descriptor = RuleDescriptor {
        version: 1,
        genome_id_hash: 0xABCD,
        player_count: 2,
        max_turns: 100,
        setup: Setup {
            cards_per_player: 5,
            initial_discard_count: 1,
        },
        phases: vec![Phase::Play {
            min: 1,
            max: 1,
            follows_tableau: false,
            condition: always_legal(),
        }],
        win_conditions: vec![WinCondition {
            kind: WinKind::EmptyHand,
            threshold: 0,
        }],
        scoring: flat_scoring(),
        special_effects: vec![],
    };
    let mut bytes = darwindeck_engine::decoder::encode(&descriptor);
    let turn_structure_offset = u32::from_le_bytes(bytes[20..24].try_into().unwrap()) as usize;
    bytes[turn_structure_offset] = 200;
    bytes.truncate(turn_structure_offset + 1);

    let err = decode(&bytes).unwrap_err();
    assert_eq!(err, DecodeError::TruncatedPhases { offset: 20 });
}

/// spec.md §8 scenario 5: an MCTS policy should outperform a random one
/// over enough games of the same shedder. Seating is fixed (seat 0 always
/// acts first and both hands start equal), so seat 0's advantage here is
/// deterministic across the whole batch for a fixed master seed.
#[test]
fn mcts_beats_random_over_many_games() {
    let descriptor = RuleDescriptor {
        version: 1,
        genome_id_hash: 0,
        player_count: 2,
        max_turns: 500,
        setup: Setup {
            cards_per_player: 7,
            initial_discard_count: 1,
        },
        phases: vec![Phase::Play {
            min: 1,
            max: 1,
            follows_tableau: false,
            condition: always_legal(),
        }],
        win_conditions: vec![WinCondition {
            kind: WinKind::EmptyHand,
            threshold: 0,
        }],
        scoring: flat_scoring(),
        special_effects: vec![],
    };
    let ai = vec![AiKind::Mcts, AiKind::Random];
    let stats = run_batch(&descriptor, 200, &ai, 64, 1, None);
    let mcts_win_rate = stats.wins[0] as f64 / stats.total_games as f64;

    assert_eq!(stats.total_games, 200);
    assert!(mcts_win_rate > 0.55, "mcts_win_rate was {mcts_win_rate}");
}

/// spec.md §8 scenario 6: once the deck runs dry, drawing must recycle the
/// discard pile instead of failing, and the game keeps making progress
/// (`total_actions` keeps climbing) all the way to the turn limit.
#[test]
fn deck_exhaustion_recycles_discard_pile_without_errors() {
    let descriptor = RuleDescriptor {
        version: 1,
        genome_id_hash: 0,
        player_count: 2,
        max_turns: 100,
        setup: Setup {
            cards_per_player: 0,
            initial_discard_count: 2,
        },
        phases: vec![
            Phase::Draw { count: 3 },
            Phase::Play {
                min: 1,
                max: 3,
                follows_tableau: false,
                condition: always_legal(),
            },
        ],
        win_conditions: vec![WinCondition {
            kind: WinKind::EmptyHand,
            threshold: 0,
        }],
        scoring: flat_scoring(),
        special_effects: vec![],
    };
    let ai = vec![AiKind::Random, AiKind::Random];
    let stats = run_batch(&descriptor, 10, &ai, 0, 5, None);

    assert_eq!(stats.total_games, 10);
    assert_eq!(stats.errors, 0);
    assert!(stats.total_actions > 0);
}
