//! Error types for the decoder, interpreter, and batch runner (spec.md §7).

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("buffer truncated at offset {offset}")]
    TruncatedBuffer { offset: usize },

    #[error("offset {offset} is out of bounds for the buffer")]
    OffsetOutOfBounds { offset: usize },

    #[error("section at offset {offset} overlaps the header or another section")]
    SectionOverlap { offset: usize },

    #[error("unknown phase tag {tag} at offset {offset}")]
    UnknownTag { offset: usize, tag: u8 },

    #[error("unknown condition opcode {opcode} at offset {offset}")]
    UnknownOpcode { offset: usize, opcode: u8 },

    #[error("arity mismatch decoding condition tree at offset {offset}")]
    ArityMismatch { offset: usize },

    #[error("parameter out of declared range at offset {offset}")]
    ParameterOutOfRange { offset: usize },

    #[error("win condition list must not be empty")]
    EmptyWinConditions,

    #[error("phase list must not be empty")]
    EmptyPhaseList,

    #[error("declared phase count exceeds the bytes remaining in the buffer, header field at offset {offset}")]
    TruncatedPhases { offset: usize },

    #[error("bad magic number in header")]
    BadMagic,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("index out of range during apply")]
    IndexOutOfRange,

    #[error("apply called with an illegal move")]
    IllegalMove,

    #[error("generate produced an empty move list where one was required")]
    EmptyMoveList,

    #[error("state pool exhausted unexpectedly")]
    PoolExhausted,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("batch was cancelled before any games completed")]
    Cancelled,
}
