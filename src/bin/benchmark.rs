//! Throughput benchmark: runs a two-player shedder game through
//! `run_batch` and reports games/second, mirroring the teacher's
//! `hands/second` benchmark style.

use std::time::Instant;

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
            follows_tableau: true,
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
    let ai = vec![AiKind::Random, AiKind::Random];
    let batch_size: u32 = 10_000;

    println!("Running {batch_size} games...");
    let start = Instant::now();
    let stats = run_batch(&descriptor, batch_size, &ai, 0, 42, None);
    let duration = start.elapsed();

    println!("Finished {batch_size} games in {duration:.4?}");
    println!(
        "Throughput: {:.0} games/second",
        batch_size as f64 / duration.as_secs_f64()
    );
    println!(
        "wins={:?} draws={} errors={} avg_turns={:.2} median_turns={}",
        stats.wins, stats.draws, stats.errors, stats.avg_turns, stats.median_turns
    );
}
