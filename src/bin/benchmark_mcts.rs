//! MCTS-vs-Random win-rate demo, matching spec.md §8 concrete scenario 5:
//! MCTS with 64 iterations should beat Random AI more than 55% of the time
//! in a two-player shedder over 200 games.

use darwindeck_engine::batch::{run_batch, AiKind};
use darwindeck_engine::decoder::condition::{Cmp, ConditionNode};
use darwindeck_engine::decoder::descriptor::{
    Phase, RuleDescriptor, Scoring, ScoringPolicy, Setup, WinCondition, WinKind,
};

fn shedder_descriptor() -> RuleDescriptor {
    RuleDescriptor {
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
            condition: ConditionNode::CheckHandSize { cmp: Cmp::Ge, n: 0 },
        }],
        win_conditions: vec![WinCondition {
            kind: WinKind::EmptyHand,
            threshold: 0,
        }],
        scoring: Scoring {
            rank_points: [1; darwindeck_engine::card::RANK_COUNT as usize],
            policy: ScoringPolicy::PerCard,
            bonuses: vec![],
        },
        special_effects: vec![],
    }
}

fn main() {
    env_logger::init();
    let descriptor = shedder_descriptor();
    let ai = vec![AiKind::Mcts, AiKind::Random];
    let num_games = 200;
    let mcts_iterations = 64;

    let stats = run_batch(&descriptor, num_games, &ai, mcts_iterations, 1, None);
    let mcts_win_rate = stats.wins[0] as f64 / stats.total_games as f64;

    println!("MCTS (seat 0) vs Random (seat 1), {num_games} games, {mcts_iterations} iterations/move");
    println!(
        "wins={:?} draws={} errors={} mcts_win_rate={:.1}%",
        stats.wins,
        stats.draws,
        stats.errors,
        mcts_win_rate * 100.0
    );
}
