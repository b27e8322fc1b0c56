//! Condition trees: postfix-encoded boolean expressions over card/hand
//! predicates, evaluated against a single candidate card plus whole-state
//! context (spec.md §4.1/§4.3, Design Note 9.5).
//!
//! Represented as tagged-variant nested nodes (no polymorphic dispatch) so
//! evaluation is allocation-free and branch-predictable.

use crate::card::Card;
use crate::error::DecodeError;
use crate::state::GameState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
    Ne,
}

impl Cmp {
    fn from_byte(byte: u8, offset: usize) -> Result<Self, DecodeError> {
        Ok(match byte {
            0 => Cmp::Eq,
            1 => Cmp::Lt,
            2 => Cmp::Le,
            3 => Cmp::Gt,
            4 => Cmp::Ge,
            5 => Cmp::Ne,
            _ => return Err(DecodeError::ParameterOutOfRange { offset }),
        })
    }

    fn apply(self, lhs: i32, rhs: i32) -> bool {
        match self {
            Cmp::Eq => lhs == rhs,
            Cmp::Lt => lhs < rhs,
            Cmp::Le => lhs <= rhs,
            Cmp::Gt => lhs > rhs,
            Cmp::Ge => lhs >= rhs,
            Cmp::Ne => lhs != rhs,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchMode {
    Rank,
    Suit,
    Either,
}

impl MatchMode {
    fn from_byte(byte: u8, offset: usize) -> Result<Self, DecodeError> {
        Ok(match byte {
            0 => MatchMode::Rank,
            1 => MatchMode::Suit,
            2 => MatchMode::Either,
            _ => return Err(DecodeError::ParameterOutOfRange { offset }),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConditionNode {
    CheckHandSize { cmp: Cmp, n: u8 },
    CheckCardRank { cmp: Cmp, r: u8 },
    CheckCardSuit { s: u8 },
    MatchesTop { mode: MatchMode },
    And(Vec<ConditionNode>),
    Or(Vec<ConditionNode>),
    Not(Box<ConditionNode>),
}

const OPCODE_CHECK_HAND_SIZE: u8 = 0;
const OPCODE_CHECK_CARD_RANK: u8 = 1;
const OPCODE_CHECK_CARD_SUIT: u8 = 2;
const OPCODE_MATCHES_TOP: u8 = 3;
const OPCODE_AND: u8 = 4;
const OPCODE_OR: u8 = 5;
const OPCODE_NOT: u8 = 6;

/// Decodes a postfix opcode stream of `len` bytes starting at `bytes[0]`
/// (relative slice; `base_offset` is only used for error reporting) into a
/// single root node. Returns the node and the number of bytes consumed.
pub fn decode_condition(
    bytes: &[u8],
    len: usize,
    base_offset: usize,
) -> Result<ConditionNode, DecodeError> {
    if len > bytes.len() {
        return Err(DecodeError::TruncatedBuffer {
            offset: base_offset,
        });
    }
    let stream = &bytes[..len];
    let mut stack: Vec<ConditionNode> = Vec::new();
    let mut pos = 0usize;

    while pos < stream.len() {
        let offset = base_offset + pos;
        let opcode = stream[pos];
        pos += 1;

        let node = match opcode {
            OPCODE_CHECK_HAND_SIZE => {
                let (cmp_b, n) = read2(stream, &mut pos, offset)?;
                ConditionNode::CheckHandSize {
                    cmp: Cmp::from_byte(cmp_b, offset)?,
                    n,
                }
            }
            OPCODE_CHECK_CARD_RANK => {
                let (cmp_b, r) = read2(stream, &mut pos, offset)?;
                if r >= crate::card::RANK_COUNT {
                    return Err(DecodeError::ParameterOutOfRange { offset });
                }
                ConditionNode::CheckCardRank {
                    cmp: Cmp::from_byte(cmp_b, offset)?,
                    r,
                }
            }
            OPCODE_CHECK_CARD_SUIT => {
                let s = read1(stream, &mut pos, offset)?;
                if s >= crate::card::SUIT_COUNT {
                    return Err(DecodeError::ParameterOutOfRange { offset });
                }
                ConditionNode::CheckCardSuit { s }
            }
            OPCODE_MATCHES_TOP => {
                let mode_b = read1(stream, &mut pos, offset)?;
                ConditionNode::MatchesTop {
                    mode: MatchMode::from_byte(mode_b, offset)?,
                }
            }
            OPCODE_AND => {
                let n = read1(stream, &mut pos, offset)? as usize;
                ConditionNode::And(pop_n(&mut stack, n, offset)?)
            }
            OPCODE_OR => {
                let n = read1(stream, &mut pos, offset)? as usize;
                ConditionNode::Or(pop_n(&mut stack, n, offset)?)
            }
            OPCODE_NOT => {
                let child = stack
                    .pop()
                    .ok_or(DecodeError::ArityMismatch { offset })?;
                ConditionNode::Not(Box::new(child))
            }
            other => {
                return Err(DecodeError::UnknownOpcode {
                    offset,
                    opcode: other,
                })
            }
        };
        stack.push(node);
    }

    if stack.len() != 1 {
        return Err(DecodeError::ArityMismatch {
            offset: base_offset,
        });
    }
    Ok(stack.pop().unwrap())
}

fn read1(stream: &[u8], pos: &mut usize, offset: usize) -> Result<u8, DecodeError> {
    let b = *stream
        .get(*pos)
        .ok_or(DecodeError::TruncatedBuffer { offset })?;
    *pos += 1;
    Ok(b)
}

fn read2(stream: &[u8], pos: &mut usize, offset: usize) -> Result<(u8, u8), DecodeError> {
    let a = read1(stream, pos, offset)?;
    let b = read1(stream, pos, offset)?;
    Ok((a, b))
}

fn pop_n(
    stack: &mut Vec<ConditionNode>,
    n: usize,
    offset: usize,
) -> Result<Vec<ConditionNode>, DecodeError> {
    if stack.len() < n {
        return Err(DecodeError::ArityMismatch { offset });
    }
    let split_at = stack.len() - n;
    Ok(stack.split_off(split_at))
}

/// Evaluates `node` against `card` (the candidate card under consideration)
/// plus whole-state context for `player`. `CheckHandSize` ignores `card` and
/// reads the player's current hand length; `MatchesTop` reads the top of the
/// discard pile (the tableau's reference card for follow-suit-style games).
pub fn evaluate(node: &ConditionNode, state: &GameState, player: usize, card: Card) -> bool {
    match node {
        ConditionNode::CheckHandSize { cmp, n } => {
            cmp.apply(state.hands[player].len() as i32, *n as i32)
        }
        ConditionNode::CheckCardRank { cmp, r } => cmp.apply(card.rank() as i32, *r as i32),
        ConditionNode::CheckCardSuit { s } => card.suit() == *s,
        ConditionNode::MatchesTop { mode } => match state.discard_pile.last() {
            None => false,
            Some(top) => match mode {
                MatchMode::Rank => card.rank() == top.rank(),
                MatchMode::Suit => card.suit() == top.suit(),
                MatchMode::Either => card.rank() == top.rank() || card.suit() == top.suit(),
            },
        },
        ConditionNode::And(children) => children.iter().all(|c| evaluate(c, state, player, card)),
        ConditionNode::Or(children) => children.iter().any(|c| evaluate(c, state, player, card)),
        ConditionNode::Not(child) => !evaluate(child, state, player, card),
    }
}

/// Encodes `node` back into a postfix opcode stream — the inverse of
/// [`decode_condition`]. Used by [`crate::decoder::encode`] to build
/// round-trip test fixtures and by the benchmark binary to hand-assemble
/// descriptors without a real evolutionary-layer encoder.
pub fn encode_condition(node: &ConditionNode, out: &mut Vec<u8>) {
    match node {
        ConditionNode::CheckHandSize { cmp, n } => {
            out.push(OPCODE_CHECK_HAND_SIZE);
            out.push(cmp_to_byte(*cmp));
            out.push(*n);
        }
        ConditionNode::CheckCardRank { cmp, r } => {
            out.push(OPCODE_CHECK_CARD_RANK);
            out.push(cmp_to_byte(*cmp));
            out.push(*r);
        }
        ConditionNode::CheckCardSuit { s } => {
            out.push(OPCODE_CHECK_CARD_SUIT);
            out.push(*s);
        }
        ConditionNode::MatchesTop { mode } => {
            out.push(OPCODE_MATCHES_TOP);
            out.push(match mode {
                MatchMode::Rank => 0,
                MatchMode::Suit => 1,
                MatchMode::Either => 2,
            });
        }
        ConditionNode::And(children) => {
            for c in children {
                encode_condition(c, out);
            }
            out.push(OPCODE_AND);
            out.push(children.len() as u8);
        }
        ConditionNode::Or(children) => {
            for c in children {
                encode_condition(c, out);
            }
            out.push(OPCODE_OR);
            out.push(children.len() as u8);
        }
        ConditionNode::Not(child) => {
            encode_condition(child, out);
            out.push(OPCODE_NOT);
        }
    }
}

fn cmp_to_byte(cmp: Cmp) -> u8 {
    match cmp {
        Cmp::Eq => 0,
        Cmp::Lt => 1,
        Cmp::Le => 2,
        Cmp::Gt => 3,
        Cmp::Ge => 4,
        Cmp::Ne => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_simple_rank_check() {
        // CheckCardRank(Eq, 5)
        let bytes = [OPCODE_CHECK_CARD_RANK, 0, 5];
        let node = decode_condition(&bytes, bytes.len(), 0).unwrap();
        assert_eq!(
            node,
            ConditionNode::CheckCardRank {
                cmp: Cmp::Eq,
                r: 5
            }
        );
    }

    #[test]
    fn decodes_and_of_two_children() {
        // CheckCardSuit(1), CheckCardRank(Gt, 3), And(2)
        let bytes = [
            OPCODE_CHECK_CARD_SUIT,
            1,
            OPCODE_CHECK_CARD_RANK,
            3,
            3,
            OPCODE_AND,
            2,
        ];
        let node = decode_condition(&bytes, bytes.len(), 0).unwrap();
        match node {
            ConditionNode::And(children) => assert_eq!(children.len(), 2),
            _ => panic!("expected And"),
        }
    }

    #[test]
    fn rejects_unknown_opcode() {
        let bytes = [0xEE];
        let err = decode_condition(&bytes, bytes.len(), 10).unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnknownOpcode {
                offset: 10,
                opcode: 0xEE
            }
        );
    }

    #[test]
    fn rejects_arity_mismatch() {
        // And(2) with only one operand on the stack.
        let bytes = [OPCODE_CHECK_CARD_SUIT, 0, OPCODE_AND, 2];
        let err = decode_condition(&bytes, bytes.len(), 0).unwrap_err();
        assert!(matches!(err, DecodeError::ArityMismatch { .. }));
    }

    #[test]
    fn round_trips_through_encode() {
        let node = ConditionNode::And(vec![
            ConditionNode::CheckCardSuit { s: 2 },
            ConditionNode::Not(Box::new(ConditionNode::MatchesTop {
                mode: MatchMode::Either,
            })),
        ]);
        let mut bytes = Vec::new();
        encode_condition(&node, &mut bytes);
        let decoded = decode_condition(&bytes, bytes.len(), 0).unwrap();
        assert_eq!(decoded, node);
    }
}
