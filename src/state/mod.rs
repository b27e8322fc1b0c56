//! Mutable per-game state, its instrumentation counters, and the object
//! pools that let a worker run millions of games without per-game
//! allocation (spec.md §3/§4.2).
//!
//! `GameState` is a flat struct of `pub` fields in the same shape as the
//! teacher's `PlayingState` (`gameplay/playing.rs`), minus the `#[pyclass]`
//! plumbing: this core has no Python boundary.

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::card::Card;
use crate::decoder::descriptor::RuleDescriptor;

/// Instrumentation counters accumulated over one game (spec.md §3).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Metrics {
    pub decisions: u64,
    pub valid_moves: u64,
    pub forced_decisions: u64,
    pub interactions: u64,
    pub actions: u64,
    pub hand_size_leader_changes: u64,
    pub trick_leader_changes: u64,
    pub score_leader_changes: u64,
}

impl Metrics {
    fn reset(&mut self) {
        *self = Metrics::default();
    }
}

/// Mutable per-game state. Every `Vec` field is pre-sized by [`StatePool`]
/// and only ever truncated, never dropped, across a pool cycle.
#[derive(Clone, Debug)]
pub struct GameState {
    pub deck: Vec<Card>,
    pub discard_pile: Vec<Card>,
    pub hands: Vec<Vec<Card>>,
    pub captured: Vec<Vec<Card>>,
    pub chips: Vec<u32>,
    pub tableau: Vec<Card>,

    pub turn_number: u32,
    pub active_player: usize,
    pub current_phase_index: usize,

    pub trick_leader: usize,
    pub trick_suit: Option<u8>,

    pub pot: u32,
    pub last_raise: u32,

    pub claim_pile: Vec<Card>,
    pub claim_next_rank: u8,

    pub metrics: Metrics,
    pub rng: SmallRng,

    /// Tracked across `apply` calls to detect leader changes; not part of
    /// the spec's observable state, only of the leader-change detectors.
    last_hand_size_leader: Option<usize>,
    last_trick_leader: Option<usize>,
    last_score_leader: Option<usize>,

    /// Raises made so far in the current betting round, reset whenever a
    /// new `Betting` phase begins. `max_raises` is a phase parameter, not
    /// state, so this counter is the bookkeeping that makes it enforceable.
    betting_raises: u8,

    /// How many non-folded players have acted since the last raise (or
    /// since the phase began, if nobody has raised yet). The phase
    /// completes once this reaches the non-folded player count.
    betting_acted_since_raise: u8,

    /// Per-player fold flags for the current betting phase. Not part of
    /// the spec's essential attributes (folding is an implementation
    /// detail of betting-round bookkeeping, not an observable game field),
    /// reset whenever a `Betting` phase begins.
    pub folded: Vec<bool>,

    /// `(turn_number, current_phase_index)` of the last `Betting` phase
    /// entry that has already had `start_betting_round` called on it, so
    /// the interpreter's decision loop can call it exactly once per
    /// betting round even though it's re-entered once per player action.
    betting_phase_token: Option<(u32, usize)>,
}

impl GameState {
    /// Builds a bare state for unit tests outside this module that only
    /// need to poke at a handful of fields (win-condition / move-generation
    /// tests). Production code always goes through [`StatePool::acquire`].
    #[cfg(test)]
    pub fn for_test(player_count: usize) -> Self {
        GameState {
            deck: Vec::new(),
            discard_pile: Vec::new(),
            hands: vec![Vec::new(); player_count],
            captured: vec![Vec::new(); player_count],
            chips: vec![0; player_count],
            tableau: Vec::new(),
            turn_number: 0,
            active_player: 0,
            current_phase_index: 0,
            trick_leader: 0,
            trick_suit: None,
            pot: 0,
            last_raise: 0,
            claim_pile: Vec::new(),
            claim_next_rank: 0,
            metrics: Metrics::default(),
            rng: SmallRng::seed_from_u64(0),
            last_hand_size_leader: None,
            last_trick_leader: None,
            last_score_leader: None,
            betting_raises: 0,
            betting_acted_since_raise: 0,
            folded: vec![false; player_count],
            betting_phase_token: None,
        }
    }

    /// Builds a state with every `Vec` pre-sized per `descriptor` so no
    /// later push reallocates during a game (spec.md §4.2).
    fn with_capacity(descriptor: &RuleDescriptor) -> Self {
        let player_count = descriptor.player_count as usize;
        let max_hand = descriptor.max_hand_size();
        let deck_capacity = crate::card::DECK_SIZE;

        GameState {
            deck: Vec::with_capacity(deck_capacity),
            discard_pile: Vec::with_capacity(deck_capacity),
            hands: (0..player_count)
                .map(|_| Vec::with_capacity(max_hand))
                .collect(),
            captured: (0..player_count)
                .map(|_| Vec::with_capacity(deck_capacity))
                .collect(),
            chips: vec![0; player_count],
            tableau: Vec::with_capacity(player_count),
            turn_number: 0,
            active_player: 0,
            current_phase_index: 0,
            trick_leader: 0,
            trick_suit: None,
            pot: 0,
            last_raise: 0,
            claim_pile: Vec::with_capacity(deck_capacity),
            claim_next_rank: 0,
            metrics: Metrics::default(),
            rng: SmallRng::seed_from_u64(0),
            last_hand_size_leader: None,
            last_trick_leader: None,
            last_score_leader: None,
            betting_raises: 0,
            betting_acted_since_raise: 0,
            folded: vec![false; player_count],
            betting_phase_token: None,
        }
    }

    /// Truncates every owned vector to length 0 (preserving capacity),
    /// zeroes counters and scalar fields, and reseeds `rng` — the pool's
    /// reset contract (spec.md §3 "Lifecycle").
    fn reset(&mut self, player_count: usize, seed: u64) {
        self.deck.clear();
        self.discard_pile.clear();
        for hand in &mut self.hands {
            hand.clear();
        }
        for captured in &mut self.captured {
            captured.clear();
        }
        self.hands.resize_with(player_count, Vec::new);
        self.captured.resize_with(player_count, Vec::new);
        self.chips.clear();
        self.chips.resize(player_count, 0);
        self.tableau.clear();
        self.turn_number = 0;
        self.active_player = 0;
        self.current_phase_index = 0;
        self.trick_leader = 0;
        self.trick_suit = None;
        self.pot = 0;
        self.last_raise = 0;
        self.claim_pile.clear();
        self.claim_next_rank = 0;
        self.metrics.reset();
        self.rng = SmallRng::seed_from_u64(seed);
        self.last_hand_size_leader = None;
        self.last_trick_leader = None;
        self.last_score_leader = None;
        self.betting_raises = 0;
        self.betting_acted_since_raise = 0;
        self.folded.clear();
        self.folded.resize(player_count, false);
        self.betting_phase_token = None;
    }

    pub fn betting_raises_this_round(&self) -> u8 {
        self.betting_raises
    }

    pub fn betting_acted_since_raise(&self) -> u8 {
        self.betting_acted_since_raise
    }

    pub fn non_folded_count(&self) -> usize {
        self.folded.iter().filter(|&&f| !f).count()
    }

    pub fn record_raise(&mut self) {
        self.betting_raises = self.betting_raises.saturating_add(1);
        self.betting_acted_since_raise = 1;
    }

    pub fn record_betting_action(&mut self) {
        self.betting_acted_since_raise = self.betting_acted_since_raise.saturating_add(1);
    }

    /// Called when a `Betting` phase is (re)entered: clears fold flags and
    /// the raise/action counters for a fresh round.
    pub fn start_betting_round(&mut self) {
        self.betting_raises = 0;
        self.betting_acted_since_raise = 0;
        self.last_raise = 0;
        for f in &mut self.folded {
            *f = false;
        }
    }

    /// True unless `start_betting_round` has already run for this exact
    /// `(turn_number, current_phase_index)` pair.
    pub fn betting_phase_is_fresh(&self, turn: u32, phase_index: usize) -> bool {
        self.betting_phase_token != Some((turn, phase_index))
    }

    pub fn mark_betting_phase_started(&mut self, turn: u32, phase_index: usize) {
        self.betting_phase_token = Some((turn, phase_index));
    }

    /// Re-evaluates the hand-size leader (fewest cards) and bumps the
    /// matching metric if it changed since the last call.
    pub fn update_hand_size_leader(&mut self) {
        let leader = self
            .hands
            .iter()
            .enumerate()
            .min_by_key(|(_, h)| h.len())
            .map(|(i, _)| i);
        if leader != self.last_hand_size_leader {
            self.metrics.hand_size_leader_changes += 1;
            self.last_hand_size_leader = leader;
        }
    }

    pub fn update_trick_leader(&mut self, current_trick_leader: usize) {
        let leader = Some(current_trick_leader);
        if leader != self.last_trick_leader {
            self.metrics.trick_leader_changes += 1;
            self.last_trick_leader = leader;
        }
    }

    pub fn update_score_leader(&mut self, scores: &[u32]) {
        let leader = scores
            .iter()
            .enumerate()
            .max_by_key(|(_, &s)| s)
            .map(|(i, _)| i);
        if leader != self.last_score_leader {
            self.metrics.score_leader_changes += 1;
            self.last_score_leader = leader;
        }
    }
}

/// RAII guard returned by [`StatePool::acquire`]. Derefs to [`GameState`]
/// and returns the state to the pool's free list on drop, guaranteeing
/// release on every exit path (early return, `?`, panic unwind) per
/// spec.md §4.2.
pub struct PooledState<'a> {
    state: Option<GameState>,
    pool: &'a StatePool,
}

impl<'a> std::ops::Deref for PooledState<'a> {
    type Target = GameState;
    fn deref(&self) -> &GameState {
        self.state.as_ref().expect("state taken before drop")
    }
}

impl<'a> std::ops::DerefMut for PooledState<'a> {
    fn deref_mut(&mut self) -> &mut GameState {
        self.state.as_mut().expect("state taken before drop")
    }
}

impl<'a> Drop for PooledState<'a> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            self.pool.release(state);
        }
    }
}

/// A thread-confined stack of [`GameState`] objects, one per worker
/// (spec.md §4.2, Design Note 9.2). Never shared across threads: each
/// rayon task in `src/batch` owns its own pool.
pub struct StatePool {
    free: std::cell::RefCell<Vec<GameState>>,
    descriptor_player_count: usize,
}

impl StatePool {
    pub fn new(descriptor: &RuleDescriptor) -> Self {
        StatePool {
            free: std::cell::RefCell::new(Vec::new()),
            descriptor_player_count: descriptor.player_count as usize,
        }
    }

    /// Pops a cleared, reseeded state from the free list, or allocates a
    /// fresh one sized to `descriptor` if the pool is empty.
    pub fn acquire(&self, descriptor: &RuleDescriptor, seed: u64) -> PooledState<'_> {
        let mut state = self
            .free
            .borrow_mut()
            .pop()
            .unwrap_or_else(|| GameState::with_capacity(descriptor));
        state.reset(self.descriptor_player_count, seed);
        PooledState {
            state: Some(state),
            pool: self,
        }
    }

    fn release(&self, state: GameState) {
        self.free.borrow_mut().push(state);
    }
}

/// Scratch state used by [`crate::policy::greedy::GreedyPolicy`] for its
/// one-ply lookahead. Structurally identical to [`StatePool`] but
/// `acquire` copies from a live state by field-by-field clear+extend
/// instead of building a state from scratch (spec.md §4.4).
pub struct ScratchPool {
    free: std::cell::RefCell<Vec<GameState>>,
}

impl ScratchPool {
    pub fn new() -> Self {
        ScratchPool {
            free: std::cell::RefCell::new(Vec::new()),
        }
    }

    /// Returns a scratch state whose contents mirror `source`, reusing a
    /// pooled buffer's capacity when available.
    pub fn acquire_copy_of(&self, source: &GameState) -> PooledScratch<'_> {
        let mut state = self
            .free
            .borrow_mut()
            .pop()
            .unwrap_or_else(|| source.clone());
        copy_into(source, &mut state);
        PooledScratch {
            state: Some(state),
            pool: self,
        }
    }

    fn release(&self, state: GameState) {
        self.free.borrow_mut().push(state);
    }
}

impl Default for ScratchPool {
    fn default() -> Self {
        Self::new()
    }
}

fn copy_into(source: &GameState, dest: &mut GameState) {
    dest.deck.clear();
    dest.deck.extend_from_slice(&source.deck);
    dest.discard_pile.clear();
    dest.discard_pile.extend_from_slice(&source.discard_pile);

    dest.hands.clear();
    dest.hands.extend(source.hands.iter().cloned());
    dest.captured.clear();
    dest.captured.extend(source.captured.iter().cloned());

    dest.chips.clear();
    dest.chips.extend_from_slice(&source.chips);
    dest.tableau.clear();
    dest.tableau.extend_from_slice(&source.tableau);

    dest.turn_number = source.turn_number;
    dest.active_player = source.active_player;
    dest.current_phase_index = source.current_phase_index;
    dest.trick_leader = source.trick_leader;
    dest.trick_suit = source.trick_suit;
    dest.pot = source.pot;
    dest.last_raise = source.last_raise;
    dest.claim_pile.clear();
    dest.claim_pile.extend_from_slice(&source.claim_pile);
    dest.claim_next_rank = source.claim_next_rank;
    dest.metrics = source.metrics;
    dest.rng = source.rng.clone();
    dest.last_hand_size_leader = source.last_hand_size_leader;
    dest.last_trick_leader = source.last_trick_leader;
    dest.last_score_leader = source.last_score_leader;
    dest.betting_raises = source.betting_raises;
    dest.betting_acted_since_raise = source.betting_acted_since_raise;
    dest.folded.clear();
    dest.folded.extend_from_slice(&source.folded);
    dest.betting_phase_token = source.betting_phase_token;
}

/// RAII guard returned by [`ScratchPool::acquire_copy_of`].
pub struct PooledScratch<'a> {
    state: Option<GameState>,
    pool: &'a ScratchPool,
}

impl<'a> std::ops::Deref for PooledScratch<'a> {
    type Target = GameState;
    fn deref(&self) -> &GameState {
        self.state.as_ref().expect("state taken before drop")
    }
}

impl<'a> std::ops::DerefMut for PooledScratch<'a> {
    fn deref_mut(&mut self) -> &mut GameState {
        self.state.as_mut().expect("state taken before drop")
    }
}

impl<'a> Drop for PooledScratch<'a> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            self.pool.release(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::descriptor::{Scoring, ScoringPolicy, Setup, WinCondition, WinKind};

    fn descriptor(player_count: u8) -> RuleDescriptor {
        RuleDescriptor {
            version: 1,
            genome_id_hash: 0,
            player_count,
            max_turns: 10,
            setup: Setup {
                cards_per_player: 5,
                initial_discard_count: 1,
            },
            phases: vec![],
            win_conditions: vec![WinCondition {
                kind: WinKind::EmptyHand,
                threshold: 0,
            }],
            scoring: Scoring {
                rank_points: [0; crate::card::RANK_COUNT as usize],
                policy: ScoringPolicy::PerCard,
                bonuses: vec![],
            },
            special_effects: vec![],
        }
    }

    #[test]
    fn acquire_resets_counters_and_vectors() {
        let descriptor = descriptor(2);
        let pool = StatePool::new(&descriptor);
        {
            let mut state = pool.acquire(&descriptor, 1);
            state.deck.push(Card::new(3, 1));
            state.metrics.actions = 7;
        }
        let state = pool.acquire(&descriptor, 2);
        assert!(state.deck.is_empty());
        assert_eq!(state.metrics.actions, 0);
        assert_eq!(state.hands.len(), 2);
    }

    #[test]
    fn release_on_drop_returns_capacity() {
        let descriptor = descriptor(3);
        let pool = StatePool::new(&descriptor);
        let capacity_before = {
            let mut state = pool.acquire(&descriptor, 1);
            state.deck.extend(crate::card::full_deck());
            state.deck.capacity()
        };
        let state = pool.acquire(&descriptor, 2);
        assert!(state.deck.capacity() >= capacity_before);
    }

    #[test]
    fn hand_size_leader_change_detected() {
        let descriptor = descriptor(2);
        let pool = StatePool::new(&descriptor);
        let mut state = pool.acquire(&descriptor, 1);
        state.hands[0].push(Card::new(0, 0));
        state.hands[1].push(Card::new(1, 0));
        state.hands[1].push(Card::new(2, 0));
        state.update_hand_size_leader();
        assert_eq!(state.metrics.hand_size_leader_changes, 1);
        state.update_hand_size_leader();
        assert_eq!(state.metrics.hand_size_leader_changes, 1);
        state.hands[0].pop();
        state.hands[1].pop();
        // player 0 now ties player 1 at one card fewer removed; leader stays 0
        state.update_hand_size_leader();
        assert_eq!(state.metrics.hand_size_leader_changes, 1);
    }

    #[test]
    fn scratch_pool_copies_live_state() {
        let descriptor = descriptor(2);
        let pool = StatePool::new(&descriptor);
        let mut live = pool.acquire(&descriptor, 5);
        live.hands[0].push(Card::new(4, 2));
        live.pot = 40;

        let scratch_pool = ScratchPool::new();
        let scratch = scratch_pool.acquire_copy_of(&live);
        assert_eq!(scratch.hands[0], live.hands[0]);
        assert_eq!(scratch.pot, 40);
    }
}
