//! The decoded, read-only rule descriptor (spec.md §3) and its sub-records.

use crate::decoder::condition::ConditionNode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Setup {
    pub cards_per_player: u8,
    pub initial_discard_count: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Draw {
        count: u8,
    },
    Play {
        min: u8,
        max: u8,
        follows_tableau: bool,
        condition: ConditionNode,
    },
    Discard {
        count: u8,
        condition: ConditionNode,
    },
    Trick {
        lead_rule: u8,
    },
    Betting {
        min_bet: u32,
        max_raises: u8,
    },
    Claim {
        rank_sequence: Vec<u8>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WinKind {
    EmptyHand,
    AllHandsEmpty,
    ScoreAtLeast,
    MostTricks,
    LowScore,
    CaptureAll,
    LastStanding,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WinCondition {
    pub kind: WinKind,
    pub threshold: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoringPolicy {
    PerCard,
    PerTrick,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BonusKind {
    LastTrick,
    CaptureAllBonus,
    EmptyHandFirst,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BonusRule {
    pub kind: BonusKind,
    pub value: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scoring {
    pub rank_points: [u16; crate::card::RANK_COUNT as usize],
    pub policy: ScoringPolicy,
    pub bonuses: Vec<BonusRule>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpecialEffect {
    pub trigger_rank: u8,
    pub effect_kind: u8,
    pub target: u8,
    pub value: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleDescriptor {
    pub version: u8,
    pub genome_id_hash: u64,
    pub player_count: u8,
    pub max_turns: u32,
    pub setup: Setup,
    pub phases: Vec<Phase>,
    pub win_conditions: Vec<WinCondition>,
    pub scoring: Scoring,
    pub special_effects: Vec<SpecialEffect>,
}

impl RuleDescriptor {
    pub fn has_betting(&self) -> bool {
        self.phases.iter().any(|p| matches!(p, Phase::Betting { .. }))
    }

    pub fn max_hand_size(&self) -> usize {
        // Deck + player hands must never exceed the deck, and every card a
        // player ever holds started in `cards_per_player` or arrived via a
        // Draw phase; the generous-but-bounded cap used to size the pool is
        // the full deck size, since no hand can legally exceed it.
        crate::card::DECK_SIZE
    }
}
