#![forbid(unsafe_code)]

//! UEF tape container decoding.
//!
//! A UEF image is a 12-byte header (`"UEF File!\0"` plus a two-byte version)
//! followed by chunks of `u16 type`, `u32 length`, `length` payload bytes,
//! all little-endian. The whole image may be wrapped in gzip.
//!
//! Decoding is all-or-nothing: any error discards every chunk read so far.

use std::io::Read;

use flate2::read::GzDecoder;
use thiserror::Error;

mod checks;

pub use checks::{
    BAUD_300_PAYLOAD, BAUD_1200_PAYLOAD, Baud, SequenceError, check_baud_sequence,
    check_baud_sequence_bytes, check_no_silence_after_data, count_chunks_of_type,
    count_origin_chunks, origin_is_first,
};

pub const UEF_MAGIC: &[u8; 10] = b"UEF File!\0";
/// Minor byte first, then major.
pub const UEF_VERSION: [u8; 2] = [0x0A, 0x00];
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

pub const HEADER_LEN: usize = UEF_MAGIC.len() + UEF_VERSION.len();
pub const CHUNK_HEADER_LEN: usize = 6;

/// High nibble of a chunk type; no defined chunk uses it.
pub const RESERVED_TYPE_BITS: u16 = 0xF000;

pub const CHUNK_ORIGIN: u16 = 0x0000;
pub const CHUNK_DATA: u16 = 0x0100;
pub const CHUNK_GAP_INTEGER: u16 = 0x0112;
pub const CHUNK_GAP_FLOAT: u16 = 0x0116;
pub const CHUNK_BAUD_RATE: u16 = 0x0117;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("no input")]
    NoInput,
    #[error("gzip envelope could not be decompressed")]
    DecompressFailed(#[source] std::io::Error),
    #[error("missing UEF magic")]
    BadMagic,
    #[error("unsupported UEF version bytes {found:02x?}")]
    BadVersion { found: Vec<u8> },
    #[error("chunk type &{chunk_type:x} has reserved bits set (offset {offset})")]
    InsaneType { chunk_type: u16, offset: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Chunk {
    chunk_type: u16,
    payload: Vec<u8>,
}

impl Chunk {
    /// Builds a chunk, refusing types with any of the reserved high bits set.
    pub fn new(chunk_type: u16, payload: impl Into<Vec<u8>>) -> Result<Self, DecodeError> {
        if chunk_type & RESERVED_TYPE_BITS != 0 {
            return Err(DecodeError::InsaneType {
                chunk_type,
                offset: 0,
            });
        }
        Ok(Self {
            chunk_type,
            payload: payload.into(),
        })
    }

    #[must_use]
    pub fn chunk_type(&self) -> u16 {
        self.chunk_type
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkStream {
    chunks: Vec<Chunk>,
}

impl ChunkStream {
    #[must_use]
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self { chunks }
    }

    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Chunk> {
        self.chunks.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunks of one type, in stream order.
    pub fn of_type(&self, chunk_type: u16) -> impl Iterator<Item = &Chunk> {
        self.chunks
            .iter()
            .filter(move |chunk| chunk.chunk_type == chunk_type)
    }

    #[must_use]
    pub fn into_chunks(self) -> Vec<Chunk> {
        self.chunks
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        encode(self)
    }
}

impl<'a> IntoIterator for &'a ChunkStream {
    type Item = &'a Chunk;
    type IntoIter = std::slice::Iter<'a, Chunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.iter()
    }
}

pub fn decode(input: &[u8]) -> Result<ChunkStream, DecodeError> {
    if input.is_empty() {
        return Err(DecodeError::NoInput);
    }

    let inflated;
    let bytes: &[u8] = if input.starts_with(&GZIP_MAGIC) {
        inflated = gunzip(input)?;
        &inflated
    } else {
        input
    };

    if bytes.get(..UEF_MAGIC.len()) != Some(&UEF_MAGIC[..]) {
        return Err(DecodeError::BadMagic);
    }

    let version = bytes.get(UEF_MAGIC.len()..HEADER_LEN).unwrap_or_default();
    if version != UEF_VERSION {
        return Err(DecodeError::BadVersion {
            found: version.to_vec(),
        });
    }

    let mut chunks = Vec::new();
    let mut cursor = HEADER_LEN;
    while cursor < bytes.len() {
        let chunk_type = u16::from_le_bytes([byte_at(bytes, cursor), byte_at(bytes, cursor + 1)]);
        if chunk_type & RESERVED_TYPE_BITS != 0 {
            return Err(DecodeError::InsaneType {
                chunk_type,
                offset: cursor,
            });
        }
        let declared = u32::from_le_bytes([
            byte_at(bytes, cursor + 2),
            byte_at(bytes, cursor + 3),
            byte_at(bytes, cursor + 4),
            byte_at(bytes, cursor + 5),
        ]) as usize;

        // A truncated payload is kept as far as it goes; the cursor still
        // moves past the declared length, which ends the loop.
        let start = cursor + CHUNK_HEADER_LEN;
        let end = start.saturating_add(declared).min(bytes.len());
        let payload = bytes.get(start..end).unwrap_or_default().to_vec();

        chunks.push(Chunk {
            chunk_type,
            payload,
        });
        cursor = start.saturating_add(declared);
    }

    Ok(ChunkStream { chunks })
}

/// Serializes a stream back to an uncompressed UEF image.
#[must_use]
pub fn encode(stream: &ChunkStream) -> Vec<u8> {
    let body: usize = stream
        .iter()
        .map(|chunk| CHUNK_HEADER_LEN + chunk.payload.len())
        .sum();
    let mut out = Vec::with_capacity(HEADER_LEN + body);
    out.extend_from_slice(UEF_MAGIC);
    out.extend_from_slice(&UEF_VERSION);
    for chunk in stream {
        out.extend_from_slice(&chunk.chunk_type.to_le_bytes());
        out.extend_from_slice(&(chunk.payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&chunk.payload);
    }
    out
}

fn gunzip(input: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::new();
    GzDecoder::new(input)
        .read_to_end(&mut out)
        .map_err(DecodeError::DecompressFailed)?;
    Ok(out)
}

// Header bytes past the end of the buffer read as zero.
fn byte_at(bytes: &[u8], idx: usize) -> u8 {
    bytes.get(idx).copied().unwrap_or(0)
}
