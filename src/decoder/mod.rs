//! Bytecode decoder: parses a read-only byte buffer into a [`RuleDescriptor`]
//! or a [`DecodeError`] identifying the first inconsistency (spec.md §4.1).

pub mod condition;
pub mod descriptor;

use crate::card::RANK_COUNT;
use crate::error::DecodeError;
use condition::{decode_condition, ConditionNode};
use descriptor::{
    BonusKind, BonusRule, Phase, RuleDescriptor, Scoring, ScoringPolicy, Setup, SpecialEffect,
    WinCondition, WinKind,
};

const MAGIC: u16 = 0xDDC5;
const HEADER_LEN: usize = 36;
const ABSENT_OFFSET: u32 = u32::MAX;

const TAG_DRAW: u8 = 0;
const TAG_PLAY: u8 = 1;
const TAG_DISCARD: u8 = 2;
const TAG_TRICK: u8 = 3;
const TAG_BETTING: u8 = 4;
const TAG_CLAIM: u8 = 5;

const WIN_EMPTY_HAND: u8 = 0;
const WIN_ALL_HANDS_EMPTY: u8 = 1;
const WIN_SCORE_AT_LEAST: u8 = 2;
const WIN_MOST_TRICKS: u8 = 3;
const WIN_LOW_SCORE: u8 = 4;
const WIN_CAPTURE_ALL: u8 = 5;
const WIN_LAST_STANDING: u8 = 6;

struct Header {
    version: u8,
    player_count: u8,
    max_turns: u32,
    genome_id_hash: u64,
    setup_offset: u32,
    turn_structure_offset: u32,
    win_conditions_offset: u32,
    scoring_offset: u32,
    special_effects_offset: u32,
}

fn read_u8(buf: &[u8], offset: usize) -> Result<u8, DecodeError> {
    buf.get(offset)
        .copied()
        .ok_or(DecodeError::TruncatedBuffer { offset })
}

fn read_u16_le(buf: &[u8], offset: usize) -> Result<u16, DecodeError> {
    let bytes = buf
        .get(offset..offset + 2)
        .ok_or(DecodeError::TruncatedBuffer { offset })?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32_le(buf: &[u8], offset: usize) -> Result<u32, DecodeError> {
    let bytes = buf
        .get(offset..offset + 4)
        .ok_or(DecodeError::TruncatedBuffer { offset })?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_u64_le(buf: &[u8], offset: usize) -> Result<u64, DecodeError> {
    let bytes = buf
        .get(offset..offset + 8)
        .ok_or(DecodeError::TruncatedBuffer { offset })?;
    let mut arr = [0u8; 8];
    arr.copy_from_slice(bytes);
    Ok(u64::from_le_bytes(arr))
}

fn parse_header(buf: &[u8]) -> Result<Header, DecodeError> {
    if buf.len() < HEADER_LEN {
        return Err(DecodeError::TruncatedBuffer { offset: 0 });
    }
    let magic = read_u16_le(buf, 0)?;
    if magic != MAGIC {
        return Err(DecodeError::BadMagic);
    }
    let version = read_u8(buf, 2)?;
    let player_count = read_u8(buf, 3)?;
    if !(2..=4).contains(&player_count) {
        return Err(DecodeError::ParameterOutOfRange { offset: 3 });
    }
    let max_turns = read_u32_le(buf, 4)?;
    if max_turns == 0 || max_turns > 100_000 {
        return Err(DecodeError::ParameterOutOfRange { offset: 4 });
    }
    let genome_id_hash = read_u64_le(buf, 8)?;
    let setup_offset = read_u32_le(buf, 16)?;
    let turn_structure_offset = read_u32_le(buf, 20)?;
    let win_conditions_offset = read_u32_le(buf, 24)?;
    let scoring_offset = read_u32_le(buf, 28)?;
    let special_effects_offset = read_u32_le(buf, 32)?;

    Ok(Header {
        version,
        player_count,
        max_turns,
        genome_id_hash,
        setup_offset,
        turn_structure_offset,
        win_conditions_offset,
        scoring_offset,
        special_effects_offset,
    })
}

/// Validates that a section starting at `offset` lies strictly after the
/// header and strictly within the buffer.
fn section_start(buf: &[u8], offset: u32, field_offset: usize) -> Result<usize, DecodeError> {
    let offset = offset as usize;
    if offset < HEADER_LEN {
        return Err(DecodeError::SectionOverlap {
            offset: field_offset,
        });
    }
    if offset >= buf.len() {
        return Err(DecodeError::OffsetOutOfBounds {
            offset: field_offset,
        });
    }
    Ok(offset)
}

fn parse_setup(buf: &[u8], offset: usize) -> Result<Setup, DecodeError> {
    let cards_per_player = read_u8(buf, offset)?;
    let initial_discard_count = read_u8(buf, offset + 1)?;
    if cards_per_player == 0 {
        return Err(DecodeError::ParameterOutOfRange { offset });
    }
    Ok(Setup {
        cards_per_player,
        initial_discard_count,
    })
}

fn parse_turn_structure(
    buf: &[u8],
    offset: usize,
    header_offset: usize,
) -> Result<Vec<Phase>, DecodeError> {
    let phase_count = read_u8(buf, offset)?;
    if phase_count == 0 {
        return Err(DecodeError::EmptyPhaseList);
    }
    let mut pos = offset + 1;
    // Each phase needs at least one tag byte; a declared count that can't
    // even be covered by tag bytes alone means the buffer was truncated
    // (spec.md §8 concrete scenario 4), independent of any particular
    // phase's own (and separately reported) field truncation.
    if buf.len() - pos < phase_count as usize {
        return Err(DecodeError::TruncatedPhases {
            offset: header_offset,
        });
    }
    let mut phases = Vec::with_capacity(phase_count as usize);

    for _ in 0..phase_count {
        let tag_offset = pos;
        let tag = read_u8(buf, pos)?;
        pos += 1;

        let phase = match tag {
            TAG_DRAW => {
                let count = read_u8(buf, pos)?;
                pos += 1;
                if count == 0 {
                    return Err(DecodeError::ParameterOutOfRange { offset: tag_offset });
                }
                Phase::Draw { count }
            }
            TAG_PLAY => {
                let min = read_u8(buf, pos)?;
                let max = read_u8(buf, pos + 1)?;
                let follows_tableau = read_u8(buf, pos + 2)? != 0;
                pos += 3;
                if min == 0 || min > max {
                    return Err(DecodeError::ParameterOutOfRange { offset: tag_offset });
                }
                let cond_len = read_u16_le(buf, pos)? as usize;
                pos += 2;
                let cond_bytes = buf
                    .get(pos..)
                    .ok_or(DecodeError::TruncatedBuffer { offset: pos })?;
                let condition = decode_condition(cond_bytes, cond_len, pos)?;
                pos += cond_len;
                Phase::Play {
                    min,
                    max,
                    follows_tableau,
                    condition,
                }
            }
            TAG_DISCARD => {
                let count = read_u8(buf, pos)?;
                pos += 1;
                if count == 0 {
                    return Err(DecodeError::ParameterOutOfRange { offset: tag_offset });
                }
                let cond_len = read_u16_le(buf, pos)? as usize;
                pos += 2;
                let cond_bytes = buf
                    .get(pos..)
                    .ok_or(DecodeError::TruncatedBuffer { offset: pos })?;
                let condition = decode_condition(cond_bytes, cond_len, pos)?;
                pos += cond_len;
                Phase::Discard { count, condition }
            }
            TAG_TRICK => {
                let lead_rule = read_u8(buf, pos)?;
                pos += 1;
                Phase::Trick { lead_rule }
            }
            TAG_BETTING => {
                let min_bet = read_u32_le(buf, pos)?;
                let max_raises = read_u8(buf, pos + 4)?;
                pos += 5;
                Phase::Betting {
                    min_bet,
                    max_raises,
                }
            }
            TAG_CLAIM => {
                let len = read_u8(buf, pos)? as usize;
                pos += 1;
                let slice = buf
                    .get(pos..pos + len)
                    .ok_or(DecodeError::TruncatedBuffer { offset: pos })?;
                for &r in slice {
                    if r >= RANK_COUNT {
                        return Err(DecodeError::ParameterOutOfRange { offset: pos });
                    }
                }
                let rank_sequence = slice.to_vec();
                pos += len;
                Phase::Claim { rank_sequence }
            }
            other => {
                return Err(DecodeError::UnknownTag {
                    offset: tag_offset,
                    tag: other,
                })
            }
        };
        phases.push(phase);
    }

    Ok(phases)
}

fn parse_win_conditions(buf: &[u8], offset: usize) -> Result<Vec<WinCondition>, DecodeError> {
    let count = read_u8(buf, offset)?;
    if count == 0 {
        return Err(DecodeError::EmptyWinConditions);
    }
    let mut pos = offset + 1;
    let mut conditions = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let kind_offset = pos;
        let kind_byte = read_u8(buf, pos)?;
        pos += 1;
        let threshold = read_u32_le(buf, pos)?;
        pos += 4;
        let kind = match kind_byte {
            WIN_EMPTY_HAND => WinKind::EmptyHand,
            WIN_ALL_HANDS_EMPTY => WinKind::AllHandsEmpty,
            WIN_SCORE_AT_LEAST => WinKind::ScoreAtLeast,
            WIN_MOST_TRICKS => WinKind::MostTricks,
            WIN_LOW_SCORE => WinKind::LowScore,
            WIN_CAPTURE_ALL => WinKind::CaptureAll,
            WIN_LAST_STANDING => WinKind::LastStanding,
            _ => {
                return Err(DecodeError::ParameterOutOfRange {
                    offset: kind_offset,
                })
            }
        };
        conditions.push(WinCondition { kind, threshold });
    }
    Ok(conditions)
}

fn parse_scoring(buf: &[u8], offset: usize) -> Result<Scoring, DecodeError> {
    let mut rank_points = [0u16; RANK_COUNT as usize];
    let mut pos = offset;
    for slot in rank_points.iter_mut() {
        *slot = read_u16_le(buf, pos)?;
        pos += 2;
    }
    let policy_byte = read_u8(buf, pos)?;
    let policy = match policy_byte {
        0 => ScoringPolicy::PerCard,
        1 => ScoringPolicy::PerTrick,
        _ => return Err(DecodeError::ParameterOutOfRange { offset: pos }),
    };
    pos += 1;
    let bonus_count = read_u8(buf, pos)?;
    pos += 1;
    let mut bonuses = Vec::with_capacity(bonus_count as usize);
    for _ in 0..bonus_count {
        let kind_offset = pos;
        let kind_byte = read_u8(buf, pos)?;
        pos += 1;
        let value = read_u16_le(buf, pos)?;
        pos += 2;
        let kind = match kind_byte {
            0 => BonusKind::LastTrick,
            1 => BonusKind::CaptureAllBonus,
            2 => BonusKind::EmptyHandFirst,
            _ => {
                return Err(DecodeError::ParameterOutOfRange {
                    offset: kind_offset,
                })
            }
        };
        bonuses.push(BonusRule { kind, value });
    }
    Ok(Scoring {
        rank_points,
        policy,
        bonuses,
    })
}

fn parse_special_effects(buf: &[u8], offset: usize) -> Result<Vec<SpecialEffect>, DecodeError> {
    let count = read_u8(buf, offset)?;
    let mut pos = offset + 1;
    let mut effects = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let trigger_rank = read_u8(buf, pos)?;
        let effect_kind = read_u8(buf, pos + 1)?;
        let target = read_u8(buf, pos + 2)?;
        let value = read_u16_le(buf, pos + 3)?;
        pos += 5;
        if trigger_rank >= RANK_COUNT {
            return Err(DecodeError::ParameterOutOfRange { offset: pos - 5 });
        }
        effects.push(SpecialEffect {
            trigger_rank,
            effect_kind,
            target,
            value,
        });
    }
    Ok(effects)
}

/// Decodes `buf` into a [`RuleDescriptor`], or the first inconsistency found.
pub fn decode(buf: &[u8]) -> Result<RuleDescriptor, DecodeError> {
    let header = parse_header(buf)?;

    let setup_offset = section_start(buf, header.setup_offset, 16)?;
    let turn_structure_offset = section_start(buf, header.turn_structure_offset, 20)?;
    let win_conditions_offset = section_start(buf, header.win_conditions_offset, 24)?;
    let scoring_offset = section_start(buf, header.scoring_offset, 28)?;

    let setup = parse_setup(buf, setup_offset)?;
    let phases = parse_turn_structure(buf, turn_structure_offset, 20)?;
    let win_conditions = parse_win_conditions(buf, win_conditions_offset)?;
    let scoring = parse_scoring(buf, scoring_offset)?;

    let special_effects = if header.special_effects_offset == ABSENT_OFFSET {
        Vec::new()
    } else {
        let offset = section_start(buf, header.special_effects_offset, 32)?;
        parse_special_effects(buf, offset)?
    };

    Ok(RuleDescriptor {
        version: header.version,
        genome_id_hash: header.genome_id_hash,
        player_count: header.player_count,
        max_turns: header.max_turns,
        setup,
        phases,
        win_conditions,
        scoring,
        special_effects,
    })
}

/// Encodes a [`RuleDescriptor`] back into bytecode. Only used by tests to
/// build round-trip fixtures and hand-assembled descriptors for the
/// benchmark binary; the evolutionary layer (out of scope here) is the
/// real-world encoder.
pub fn encode(descriptor: &RuleDescriptor) -> Vec<u8> {
    let mut sections: Vec<u8> = Vec::new();

    let setup_bytes = vec![
        descriptor.setup.cards_per_player,
        descriptor.setup.initial_discard_count,
    ];

    let mut turn_bytes = Vec::new();
    turn_bytes.push(descriptor.phases.len() as u8);
    for phase in &descriptor.phases {
        match phase {
            Phase::Draw { count } => {
                turn_bytes.push(TAG_DRAW);
                turn_bytes.push(*count);
            }
            Phase::Play {
                min,
                max,
                follows_tableau,
                condition,
            } => {
                turn_bytes.push(TAG_PLAY);
                turn_bytes.push(*min);
                turn_bytes.push(*max);
                turn_bytes.push(*follows_tableau as u8);
                let mut cond_bytes = Vec::new();
                condition::encode_condition(condition, &mut cond_bytes);
                turn_bytes.extend_from_slice(&(cond_bytes.len() as u16).to_le_bytes());
                turn_bytes.extend_from_slice(&cond_bytes);
            }
            Phase::Discard { count, condition } => {
                turn_bytes.push(TAG_DISCARD);
                turn_bytes.push(*count);
                let mut cond_bytes = Vec::new();
                condition::encode_condition(condition, &mut cond_bytes);
                turn_bytes.extend_from_slice(&(cond_bytes.len() as u16).to_le_bytes());
                turn_bytes.extend_from_slice(&cond_bytes);
            }
            Phase::Trick { lead_rule } => {
                turn_bytes.push(TAG_TRICK);
                turn_bytes.push(*lead_rule);
            }
            Phase::Betting {
                min_bet,
                max_raises,
            } => {
                turn_bytes.push(TAG_BETTING);
                turn_bytes.extend_from_slice(&min_bet.to_le_bytes());
                turn_bytes.push(*max_raises);
            }
            Phase::Claim { rank_sequence } => {
                turn_bytes.push(TAG_CLAIM);
                turn_bytes.push(rank_sequence.len() as u8);
                turn_bytes.extend_from_slice(rank_sequence);
            }
        }
    }

    let mut win_bytes = Vec::new();
    win_bytes.push(descriptor.win_conditions.len() as u8);
    for wc in &descriptor.win_conditions {
        let kind_byte = match wc.kind {
            WinKind::EmptyHand => WIN_EMPTY_HAND,
            WinKind::AllHandsEmpty => WIN_ALL_HANDS_EMPTY,
            WinKind::ScoreAtLeast => WIN_SCORE_AT_LEAST,
            WinKind::MostTricks => WIN_MOST_TRICKS,
            WinKind::LowScore => WIN_LOW_SCORE,
            WinKind::CaptureAll => WIN_CAPTURE_ALL,
            WinKind::LastStanding => WIN_LAST_STANDING,
        };
        win_bytes.push(kind_byte);
        win_bytes.extend_from_slice(&wc.threshold.to_le_bytes());
    }

    let mut scoring_bytes = Vec::new();
    for rp in descriptor.scoring.rank_points {
        scoring_bytes.extend_from_slice(&rp.to_le_bytes());
    }
    scoring_bytes.push(match descriptor.scoring.policy {
        ScoringPolicy::PerCard => 0,
        ScoringPolicy::PerTrick => 1,
    });
    scoring_bytes.push(descriptor.scoring.bonuses.len() as u8);
    for bonus in &descriptor.scoring.bonuses {
        scoring_bytes.push(match bonus.kind {
            BonusKind::LastTrick => 0,
            BonusKind::CaptureAllBonus => 1,
            BonusKind::EmptyHandFirst => 2,
        });
        scoring_bytes.extend_from_slice(&bonus.value.to_le_bytes());
    }

    let mut special_bytes = Vec::new();
    if !descriptor.special_effects.is_empty() {
        special_bytes.push(descriptor.special_effects.len() as u8);
        for effect in &descriptor.special_effects {
            special_bytes.push(effect.trigger_rank);
            special_bytes.push(effect.effect_kind);
            special_bytes.push(effect.target);
            special_bytes.extend_from_slice(&effect.value.to_le_bytes());
        }
    }

    let setup_offset = HEADER_LEN as u32;
    let turn_structure_offset = setup_offset + setup_bytes.len() as u32;
    let win_conditions_offset = turn_structure_offset + turn_bytes.len() as u32;
    let scoring_offset = win_conditions_offset + win_bytes.len() as u32;
    let special_effects_offset = if special_bytes.is_empty() {
        ABSENT_OFFSET
    } else {
        scoring_offset + scoring_bytes.len() as u32
    };

    let mut out = Vec::with_capacity(HEADER_LEN + setup_bytes.len());
    out.extend_from_slice(&MAGIC.to_le_bytes());
    out.push(descriptor.version);
    out.push(descriptor.player_count);
    out.extend_from_slice(&descriptor.max_turns.to_le_bytes());
    out.extend_from_slice(&descriptor.genome_id_hash.to_le_bytes());
    out.extend_from_slice(&setup_offset.to_le_bytes());
    out.extend_from_slice(&turn_structure_offset.to_le_bytes());
    out.extend_from_slice(&win_conditions_offset.to_le_bytes());
    out.extend_from_slice(&scoring_offset.to_le_bytes());
    out.extend_from_slice(&special_effects_offset.to_le_bytes());
    debug_assert_eq!(out.len(), HEADER_LEN);

    out.extend_from_slice(&setup_bytes);
    out.extend_from_slice(&turn_bytes);
    out.extend_from_slice(&win_bytes);
    out.extend_from_slice(&scoring_bytes);
    out.extend_from_slice(&special_bytes);
    out
}
