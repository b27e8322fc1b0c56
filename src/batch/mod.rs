//! Batch runner (spec.md §4.5): derives per-game seeds from a master seed,
//! dispatches independent games across a rayon worker pool, and aggregates
//! their outcomes into [`AggregatedStats`].
//!
//! Dispatch follows the channel-based self-play pattern from the pack's
//! `freeeve-polite-betrayal` reference (`engine/src/selfplay.rs`): a sized
//! `rayon::ThreadPoolBuilder` pool runs `into_par_iter().for_each_with(tx,
//! ...)`, and a plain `mpsc::channel` carries results back to a draining
//! loop on the calling thread.

pub mod seed;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Instant;

use rayon::prelude::*;

use crate::decoder::descriptor::RuleDescriptor;
use crate::error::EngineError;
use crate::interpreter::run_game;
use crate::policy::greedy::GreedyPolicy;
use crate::policy::mcts::MctsPolicy;
use crate::policy::random::RandomPolicy;
use crate::policy::Policy;
use crate::state::{Metrics, StatePool};

/// Which AI drives one seat, named per [`Request`] (spec.md §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AiKind {
    Random,
    Greedy,
    Mcts,
}

/// One request from the evolutionary layer to the engine (spec.md §6): a
/// genome's bytecode plus the batch configuration to run it under.
#[derive(Clone, Debug)]
pub struct Request {
    pub genome_bytecode: Vec<u8>,
    pub num_games: u32,
    pub ai_per_player: Vec<AiKind>,
    pub mcts_iterations: u32,
    pub master_seed: u64,
}

/// A batch of requests sharing an opaque `batch_id` (spec.md §6).
#[derive(Clone, Debug)]
pub struct BatchRequest {
    pub batch_id: u64,
    pub requests: Vec<Request>,
}

/// Per-request response, field-for-field the external contract in spec.md
/// §6. `run_batch` returns the richer [`AggregatedStats`]; `run_request`
/// narrows it to this shape for the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Response {
    pub total_games: u32,
    pub wins: [u32; 4],
    pub draws: u32,
    pub avg_turns: f64,
    pub median_turns: u32,
    pub avg_duration_ns: f64,
    pub errors: u32,
    pub total_decisions: u64,
    pub total_valid_moves: u64,
    pub forced_decisions: u64,
    pub total_interactions: u64,
    pub total_actions: u64,
}

/// A batch response preserving request order (spec.md §6).
#[derive(Clone, Debug, Default)]
pub struct BatchResponse {
    pub batch_id: u64,
    pub responses: Vec<Response>,
}

/// One completed (or failed) game, produced by a worker and drained by the
/// aggregator (spec.md §3 `GameResult`).
#[derive(Clone, Copy, Debug)]
struct GameResult {
    winner: Option<usize>,
    turns_played: u32,
    duration_ns: u64,
    metrics: Metrics,
    error: bool,
}

/// Sums, means, and the median over a batch's [`GameResult`]s (spec.md §3
/// `AggregatedStats`), plus the `incomplete` flag spec.md §5 attaches to a
/// cancelled batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AggregatedStats {
    pub total_games: u32,
    pub wins: Vec<u32>,
    pub draws: u32,
    pub avg_turns: f64,
    pub median_turns: u32,
    pub avg_duration_ns: f64,
    pub errors: u32,
    pub total_decisions: u64,
    pub total_valid_moves: u64,
    pub forced_decisions: u64,
    pub total_interactions: u64,
    pub total_actions: u64,
    pub incomplete: bool,
}

impl AggregatedStats {
    fn to_response(&self) -> Response {
        let mut wins = [0u32; 4];
        for (i, &w) in self.wins.iter().take(4).enumerate() {
            wins[i] = w;
        }
        Response {
            total_games: self.total_games,
            wins,
            draws: self.draws,
            avg_turns: self.avg_turns,
            median_turns: self.median_turns,
            avg_duration_ns: self.avg_duration_ns,
            errors: self.errors,
            total_decisions: self.total_decisions,
            total_valid_moves: self.total_valid_moves,
            forced_decisions: self.forced_decisions,
            total_interactions: self.total_interactions,
            total_actions: self.total_actions,
        }
    }
}

/// Builds one [`Policy`] per seat from `ai_per_player`. `descriptor` must
/// outlive every policy it backs, since `GreedyPolicy`/`MctsPolicy` borrow
/// it for scoring and for re-reading phase parameters during search.
fn build_policies<'a>(
    descriptor: &'a RuleDescriptor,
    ai_per_player: &[AiKind],
    mcts_iterations: u32,
) -> Vec<Box<dyn Policy + 'a>> {
    ai_per_player
        .iter()
        .map(|kind| -> Box<dyn Policy + 'a> {
            match kind {
                AiKind::Random => Box::new(RandomPolicy),
                AiKind::Greedy => Box::new(GreedyPolicy::new(descriptor)),
                AiKind::Mcts => Box::new(MctsPolicy::new(descriptor, mcts_iterations)),
            }
        })
        .collect()
}

/// Plays exactly one game to completion and converts its outcome (or
/// failure) into a [`GameResult`]. A worker that catches a [`RuntimeError`]
/// logs it and reports `error: true` instead of propagating, per spec.md
/// §4.5/§7 — a single bad game never aborts the batch.
fn run_one_game(
    descriptor: &RuleDescriptor,
    ai_per_player: &[AiKind],
    mcts_iterations: u32,
    seed: u64,
) -> GameResult {
    let pool = StatePool::new(descriptor);
    let mut state = pool.acquire(descriptor, seed);
    let policies = build_policies(descriptor, ai_per_player, mcts_iterations);
    let policy_refs: Vec<&dyn Policy> = policies.iter().map(AsRef::as_ref).collect();

    let started = Instant::now();
    match run_game(descriptor, &mut state, &policy_refs) {
        Ok(outcome) => GameResult {
            winner: outcome.winner,
            turns_played: outcome.turns_played,
            duration_ns: started.elapsed().as_nanos() as u64,
            metrics: outcome.metrics,
            error: false,
        },
        Err(err) => {
            log::warn!("game failed during apply/generate: {err}");
            GameResult {
                winner: None,
                turns_played: 0,
                duration_ns: started.elapsed().as_nanos() as u64,
                metrics: Metrics::default(),
                error: true,
            }
        }
    }
}

/// Runs `num_games` independent games of `descriptor` under `ai_per_player`
/// and aggregates the results (spec.md §4.5). `cancel`, when set, is
/// checked between games; a batch cancelled mid-flight returns whatever
/// games completed first with `incomplete: true` (spec.md §5).
pub fn run_batch(
    descriptor: &RuleDescriptor,
    num_games: u32,
    ai_per_player: &[AiKind],
    mcts_iterations: u32,
    master_seed: u64,
    cancel: Option<&AtomicBool>,
) -> AggregatedStats {
    let seeds = seed::derive_seeds(master_seed, num_games);
    let (tx, rx) = mpsc::channel::<GameResult>();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_cpus::get())
        .build()
        .expect("failed to build rayon thread pool for batch dispatch");

    pool.install(|| {
        seeds
            .into_par_iter()
            .with_min_len(1)
            .for_each_with(tx, |tx, seed| {
                if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                    return;
                }
                let result = run_one_game(descriptor, ai_per_player, mcts_iterations, seed);
                let _ = tx.send(result);
            });
    });
    let cancelled_games = cancel.is_some_and(|flag| flag.load(Ordering::Relaxed));

    let mut stats = AggregatedStats {
        wins: vec![0; ai_per_player.len()],
        ..Default::default()
    };
    let mut turn_counts: Vec<u32> = Vec::with_capacity(num_games as usize);
    let mut duration_sum = 0u128;

    for result in rx {
        stats.total_games += 1;
        if result.error {
            stats.errors += 1;
        } else {
            match result.winner {
                Some(p) if p < stats.wins.len() => stats.wins[p] += 1,
                Some(_) => stats.errors += 1,
                None => stats.draws += 1,
            }
        }
        turn_counts.push(result.turns_played);
        duration_sum += result.duration_ns as u128;
        stats.total_decisions += result.metrics.decisions;
        stats.total_valid_moves += result.metrics.valid_moves;
        stats.forced_decisions += result.metrics.forced_decisions;
        stats.total_interactions += result.metrics.interactions;
        stats.total_actions += result.metrics.actions;
    }

    if !turn_counts.is_empty() {
        stats.avg_turns = turn_counts.iter().map(|&t| t as f64).sum::<f64>() / turn_counts.len() as f64;
        stats.avg_duration_ns = duration_sum as f64 / turn_counts.len() as f64;
        turn_counts.sort_unstable();
        stats.median_turns = turn_counts[turn_counts.len() / 2];
    }

    stats.incomplete = cancelled_games && stats.total_games < num_games;
    stats
}

/// Decodes `request.genome_bytecode` and runs its batch, narrowing the
/// result to the external [`Response`] shape (spec.md §6). Returns
/// `EngineError::Decode` if the bytecode is malformed; the whole request
/// fails fast in that case, per spec.md §7.
pub fn run_request(request: &Request) -> Result<Response, EngineError> {
    let descriptor = crate::decoder::decode(&request.genome_bytecode)?;
    let stats = run_batch(
        &descriptor,
        request.num_games,
        &request.ai_per_player,
        request.mcts_iterations,
        request.master_seed,
        None,
    );
    Ok(stats.to_response())
}

/// Runs every request in `batch`, preserving request order in the returned
/// [`BatchResponse`] (spec.md §6). A single malformed genome fails only its
/// own request; other requests in the batch still run. The caller
/// distinguishes a per-request decode failure from a successful run by the
/// `Result` in the returned vector.
pub fn run_batch_request(batch: &BatchRequest) -> (BatchResponse, Vec<Option<DecodeFailure>>) {
    let mut responses = Vec::with_capacity(batch.requests.len());
    let mut failures = Vec::with_capacity(batch.requests.len());
    for request in &batch.requests {
        match run_request(request) {
            Ok(response) => {
                responses.push(response);
                failures.push(None);
            }
            Err(EngineError::Decode(decode_err)) => {
                responses.push(Response::default());
                failures.push(Some(DecodeFailure(decode_err)));
            }
            Err(EngineError::Cancelled) => {
                responses.push(Response::default());
                failures.push(None);
            }
        }
    }
    (
        BatchResponse {
            batch_id: batch.batch_id,
            responses,
        },
        failures,
    )
}

/// Carries a request's decode failure alongside its placeholder response in
/// [`run_batch_request`]'s second return value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeFailure(pub crate::error::DecodeError);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::condition::{Cmp, ConditionNode};
    use crate::decoder::descriptor::{
        Phase, Scoring, ScoringPolicy, Setup, WinCondition, WinKind,
    };

    fn two_player_shedder() -> RuleDescriptor {
        RuleDescriptor {
            version: 1,
            genome_id_hash: 0,
            player_count: 2,
            max_turns: 500,
            setup: Setup {
                cards_per_player: 5,
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
    fn aggregation_sums_to_total_games() {
        let descriptor = two_player_shedder();
        let ai = vec![AiKind::Random, AiKind::Random];
        let stats = run_batch(&descriptor, 8, &ai, 0, 42, None);
        assert_eq!(stats.total_games, 8);
        assert_eq!(
            stats.wins.iter().sum::<u32>() + stats.draws + stats.errors,
            stats.total_games
        );
        assert!(!stats.incomplete);
    }

    #[test]
    fn determinism_across_repeated_runs() {
        // Every deterministic counter must match bit-for-bit across runs;
        // `avg_duration_ns` is wall-clock and deliberately excluded from
        // this guarantee (spec.md §8 scopes determinism to game outcomes
        // and counters, not timing).
        let descriptor = two_player_shedder();
        let ai = vec![AiKind::Random, AiKind::Random];
        let a = run_batch(&descriptor, 16, &ai, 0, 42, None);
        let b = run_batch(&descriptor, 16, &ai, 0, 42, None);
        assert_eq!(a.total_games, b.total_games);
        assert_eq!(a.wins, b.wins);
        assert_eq!(a.draws, b.draws);
        assert_eq!(a.avg_turns, b.avg_turns);
        assert_eq!(a.median_turns, b.median_turns);
        assert_eq!(a.errors, b.errors);
        assert_eq!(a.total_decisions, b.total_decisions);
        assert_eq!(a.total_valid_moves, b.total_valid_moves);
        assert_eq!(a.forced_decisions, b.forced_decisions);
        assert_eq!(a.total_interactions, b.total_interactions);
        assert_eq!(a.total_actions, b.total_actions);
        assert_eq!(a.incomplete, b.incomplete);
    }

    #[test]
    fn cancellation_before_any_game_marks_incomplete() {
        let descriptor = two_player_shedder();
        let ai = vec![AiKind::Random, AiKind::Random];
        let cancel = AtomicBool::new(true);
        let stats = run_batch(&descriptor, 10, &ai, 0, 1, Some(&cancel));
        assert!(stats.incomplete);
        assert!(stats.total_games < 10);
    }

    #[test]
    fn run_request_surfaces_decode_errors() {
        let bad_request = Request {
            genome_bytecode: vec![0u8; 4],
            num_games: 1,
            ai_per_player: vec![AiKind::Random, AiKind::Random],
            mcts_iterations: 0,
            master_seed: 1,
        };
        let err = run_request(&bad_request).unwrap_err();
        assert!(matches!(err, EngineError::Decode(_)));
    }

    #[test]
    fn batch_request_preserves_order_and_isolates_decode_failures() {
        let good_bytes = crate::decoder::encode(&two_player_shedder());
        let batch = BatchRequest {
            batch_id: 7,
            requests: vec![
                Request {
                    genome_bytecode: vec![0u8; 4],
                    num_games: 2,
                    ai_per_player: vec![AiKind::Random, AiKind::Random],
                    mcts_iterations: 0,
                    master_seed: 1,
                },
                Request {
                    genome_bytecode: good_bytes,
                    num_games: 4,
                    ai_per_player: vec![AiKind::Random, AiKind::Random],
                    mcts_iterations: 0,
                    master_seed: 2,
                },
            ],
        };
        let (response, failures) = run_batch_request(&batch);
        assert_eq!(response.batch_id, 7);
        assert_eq!(response.responses.len(), 2);
        assert!(failures[0].is_some());
        assert!(failures[1].is_none());
        assert_eq!(response.responses[1].total_games, 4);
    }
}
