use thiserror::Error;

use crate::{
    CHUNK_BAUD_RATE, CHUNK_DATA, CHUNK_GAP_FLOAT, CHUNK_GAP_INTEGER, CHUNK_ORIGIN, ChunkStream,
    DecodeError, decode,
};

// ACIA/ULA timer reload values as stored in chunk &117. Kept literal.
pub const BAUD_300_PAYLOAD: [u8; 2] = [0x2C, 0x01];
pub const BAUD_1200_PAYLOAD: [u8; 2] = [0xB0, 0x04];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Baud {
    B300,
    B1200,
}

impl Baud {
    #[must_use]
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        if payload == BAUD_300_PAYLOAD {
            Some(Self::B300)
        } else if payload == BAUD_1200_PAYLOAD {
            Some(Self::B1200)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn rate(self) -> u16 {
        match self {
            Self::B300 => 300,
            Self::B1200 => 1200,
        }
    }

    #[must_use]
    pub const fn payload(self) -> [u8; 2] {
        match self {
            Self::B300 => BAUD_300_PAYLOAD,
            Self::B1200 => BAUD_1200_PAYLOAD,
        }
    }
}

impl TryFrom<u16> for Baud {
    type Error = u16;

    fn try_from(rate: u16) -> Result<Self, Self::Error> {
        match rate {
            300 => Ok(Self::B300),
            1200 => Ok(Self::B1200),
            other => Err(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("chunk {chunk_index}: &117 payload is {len} bytes, expected 2")]
    BadLength { chunk_index: usize, len: usize },
    #[error("chunk {chunk_index}: &117 payload {payload:02x?} is not a known rate")]
    BadRate {
        chunk_index: usize,
        payload: Vec<u8>,
    },
    #[error("&117 #{position} (chunk {chunk_index}): found {found} baud, expected {expected}")]
    BaudMismatch {
        chunk_index: usize,
        position: usize,
        expected: u16,
        found: u16,
    },
    #[error("&117 #{position} (chunk {chunk_index}) exceeds the expected sequence")]
    Excess { chunk_index: usize, position: usize },
    #[error("found {found} &117 chunks, expected {expected}")]
    CountMismatch { expected: usize, found: usize },
    #[error("data chunk {chunk_index} is immediately followed by silence")]
    SilenceAfterData { chunk_index: usize },
}

/// Checks that the `&117` chunks of `stream`, in order, carry exactly the
/// rates in `expected`. The first violation is returned.
pub fn check_baud_sequence(stream: &ChunkStream, expected: &[u16]) -> Result<(), SequenceError> {
    let mut position = 0;
    for (chunk_index, chunk) in stream.iter().enumerate() {
        if chunk.chunk_type() != CHUNK_BAUD_RATE {
            continue;
        }
        let payload = chunk.payload();
        if payload.len() != 2 {
            return Err(SequenceError::BadLength {
                chunk_index,
                len: payload.len(),
            });
        }
        let Some(baud) = Baud::from_payload(payload) else {
            return Err(SequenceError::BadRate {
                chunk_index,
                payload: payload.to_vec(),
            });
        };
        let Some(&want) = expected.get(position) else {
            return Err(SequenceError::Excess {
                chunk_index,
                position,
            });
        };
        if baud.rate() != want {
            return Err(SequenceError::BaudMismatch {
                chunk_index,
                position,
                expected: want,
                found: baud.rate(),
            });
        }
        position += 1;
    }

    if position != expected.len() {
        return Err(SequenceError::CountMismatch {
            expected: expected.len(),
            found: position,
        });
    }
    Ok(())
}

pub fn check_baud_sequence_bytes(image: &[u8], expected: &[u16]) -> Result<(), SequenceError> {
    let stream = decode(image)?;
    check_baud_sequence(&stream, expected)
}

#[must_use]
pub fn count_chunks_of_type(stream: &ChunkStream, chunk_type: u16) -> usize {
    stream.of_type(chunk_type).count()
}

#[must_use]
pub fn count_origin_chunks(stream: &ChunkStream) -> usize {
    count_chunks_of_type(stream, CHUNK_ORIGIN)
}

#[must_use]
pub fn origin_is_first(stream: &ChunkStream) -> bool {
    stream
        .chunks()
        .first()
        .is_some_and(|chunk| chunk.chunk_type() == CHUNK_ORIGIN)
}

/// A `&100` data chunk must never be followed directly by `&112`/`&116`
/// silence.
pub fn check_no_silence_after_data(stream: &ChunkStream) -> Result<(), SequenceError> {
    for (chunk_index, pair) in stream.chunks().windows(2).enumerate() {
        let next = pair[1].chunk_type();
        if pair[0].chunk_type() == CHUNK_DATA
            && (next == CHUNK_GAP_INTEGER || next == CHUNK_GAP_FLOAT)
        {
            return Err(SequenceError::SilenceAfterData { chunk_index });
        }
    }
    Ok(())
}
