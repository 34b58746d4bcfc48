use std::fs;
use std::io::{ErrorKind, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use thiserror::Error;
use tracing::debug;
use tt_tibet::{ToneError, check_run_lengths, contains_tone_sequence};
use tt_uef::{
    DecodeError, SequenceError, check_baud_sequence, check_no_silence_after_data,
    count_chunks_of_type, count_origin_chunks, decode, origin_is_first,
};

use crate::case::{OutputCheck, OutputSpec};

#[derive(Debug, Error)]
pub enum CheckFailure {
    #[error("no output")]
    Missing,
    #[error("output")]
    Unexpected,
    #[error("unreadable output: {0}")]
    Unreadable(#[source] std::io::Error),
    #[error("parse: {0}")]
    Decode(#[from] DecodeError),
    #[error("{0}")]
    Sequence(#[from] SequenceError),
    #[error("{0}")]
    Tone(#[from] ToneError),
    #[error("have chunks")]
    HaveChunks,
    #[error("origin not first")]
    OriginNotFirst,
    #[error("{found} chunks of type &{chunk_type:x}, expected {expected}")]
    ChunkCount {
        chunk_type: u16,
        expected: usize,
        found: usize,
    },
    #[error("no magic")]
    NoMagic,
    #[error("gunzip failed: {0}")]
    Gunzip(#[source] std::io::Error),
    #[error("missing text")]
    MissingText,
    #[error("unexpected text")]
    UnexpectedText,
    #[error("text mismatch")]
    TextMismatch,
}

/// Reads the file named by `spec` and applies its checks in order. The
/// first failing check is returned.
pub fn check_output(path: &Path, spec: &OutputSpec) -> Result<(), CheckFailure> {
    // An empty file counts as absent.
    let bytes = match fs::read(path) {
        Ok(bytes) if bytes.is_empty() => None,
        Ok(bytes) => Some(bytes),
        Err(err) if err.kind() == ErrorKind::NotFound => None,
        Err(err) => return Err(CheckFailure::Unreadable(err)),
    };

    let bytes = match (bytes, spec.expect_present) {
        (Some(_), false) => return Err(CheckFailure::Unexpected),
        (None, true) => return Err(CheckFailure::Missing),
        (None, false) => return Ok(()),
        (Some(bytes), true) => bytes,
    };

    for check in &spec.checks {
        run_check(check, &bytes)?;
        debug!(path = %path.display(), ?check, "output check passed");
    }
    Ok(())
}

pub fn run_check(check: &OutputCheck, bytes: &[u8]) -> Result<(), CheckFailure> {
    match check {
        OutputCheck::Parses => {
            decode(bytes)?;
        }
        OutputCheck::NoChunks => {
            if !decode(bytes)?.is_empty() {
                return Err(CheckFailure::HaveChunks);
            }
        }
        OutputCheck::OriginFirst => {
            if !origin_is_first(&decode(bytes)?) {
                return Err(CheckFailure::OriginNotFirst);
            }
        }
        OutputCheck::OriginCount { count } => {
            let found = count_origin_chunks(&decode(bytes)?);
            if found != *count {
                return Err(CheckFailure::ChunkCount {
                    chunk_type: tt_uef::CHUNK_ORIGIN,
                    expected: *count,
                    found,
                });
            }
        }
        OutputCheck::ChunkTypeCount { chunk_type, count } => {
            let found = count_chunks_of_type(&decode(bytes)?, *chunk_type);
            if found != *count {
                return Err(CheckFailure::ChunkCount {
                    chunk_type: *chunk_type,
                    expected: *count,
                    found,
                });
            }
        }
        OutputCheck::BaudSequence { bauds } => {
            check_baud_sequence(&decode(bytes)?, bauds)?;
        }
        OutputCheck::NoSilenceAfterData => {
            check_no_silence_after_data(&decode(bytes)?)?;
        }
        OutputCheck::RunLengths { unit_pulses } => {
            check_run_lengths(&String::from_utf8_lossy(bytes), *unit_pulses)?;
        }
        OutputCheck::ToneSequence { pattern } => {
            if !contains_tone_sequence(&String::from_utf8_lossy(bytes), pattern) {
                return Err(CheckFailure::MissingText);
            }
        }
        OutputCheck::MagicPrefix { magic } => {
            if !bytes.starts_with(magic.as_bytes()) {
                return Err(CheckFailure::NoMagic);
            }
        }
        OutputCheck::Contains { text, gunzip } => {
            if !find(&maybe_gunzip(bytes, *gunzip)?, text.as_bytes()) {
                return Err(CheckFailure::MissingText);
            }
        }
        OutputCheck::Lacks { text, gunzip } => {
            if find(&maybe_gunzip(bytes, *gunzip)?, text.as_bytes()) {
                return Err(CheckFailure::UnexpectedText);
            }
        }
        OutputCheck::ExactText { text } => {
            if bytes != text.as_bytes() {
                return Err(CheckFailure::TextMismatch);
            }
        }
    }
    Ok(())
}

fn maybe_gunzip(bytes: &[u8], gunzip: bool) -> Result<Vec<u8>, CheckFailure> {
    if !gunzip {
        return Ok(bytes.to_vec());
    }
    let mut out = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut out)
        .map_err(CheckFailure::Gunzip)?;
    Ok(out)
}

fn find(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tt_uef::{
        Baud, CHUNK_BAUD_RATE, CHUNK_DATA, CHUNK_GAP_FLOAT, CHUNK_ORIGIN, Chunk, ChunkStream,
    };

    use super::{CheckFailure, check_output, run_check};
    use crate::case::{OutputCheck, OutputSpec};

    fn uef(chunks: Vec<(u16, Vec<u8>)>) -> Vec<u8> {
        ChunkStream::new(
            chunks
                .into_iter()
                .map(|(t, p)| Chunk::new(t, p).expect("chunk"))
                .collect(),
        )
        .to_bytes()
    }

    fn spec(path: &str, checks: Vec<OutputCheck>) -> OutputSpec {
        OutputSpec {
            path: path.into(),
            expect_present: true,
            checks,
        }
    }

    #[test]
    fn presence_rules() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("my.uef");

        assert!(matches!(
            check_output(&path, &spec("my.uef", vec![])),
            Err(CheckFailure::Missing)
        ));
        let mut absent = spec("my.uef", vec![OutputCheck::Parses]);
        absent.expect_present = false;
        check_output(&path, &absent).expect("absent and not expected");

        std::fs::write(&path, b"").expect("write");
        assert!(matches!(
            check_output(&path, &spec("my.uef", vec![])),
            Err(CheckFailure::Missing)
        ));

        std::fs::write(&path, b"RIFF").expect("write");
        assert!(matches!(
            check_output(&path, &absent),
            Err(CheckFailure::Unexpected)
        ));
        assert_eq!(CheckFailure::Missing.to_string(), "no output");
        assert_eq!(CheckFailure::Unexpected.to_string(), "output");
    }

    #[test]
    fn uef_checks_run_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("my.uef");
        let image = uef(vec![
            (CHUNK_ORIGIN, b"B-Em\0".to_vec()),
            (CHUNK_BAUD_RATE, Baud::B300.payload().to_vec()),
            (CHUNK_DATA, vec![0x2A]),
        ]);
        std::fs::write(&path, &image).expect("write");

        let ok = spec(
            "my.uef",
            vec![
                OutputCheck::Parses,
                OutputCheck::OriginFirst,
                OutputCheck::OriginCount { count: 1 },
                OutputCheck::BaudSequence { bauds: vec![300] },
                OutputCheck::NoSilenceAfterData,
            ],
        );
        check_output(&path, &ok).expect("all pass");

        let bad = spec(
            "my.uef",
            vec![
                OutputCheck::NoChunks,
                OutputCheck::BaudSequence { bauds: vec![1200] },
            ],
        );
        assert!(matches!(
            check_output(&path, &bad),
            Err(CheckFailure::HaveChunks)
        ));
    }

    #[test]
    fn chunk_counting_and_silence() {
        let image = uef(vec![
            (CHUNK_DATA, vec![1]),
            (CHUNK_GAP_FLOAT, vec![0, 0, 0x80, 0x3F]),
        ]);
        assert!(matches!(
            run_check(
                &OutputCheck::ChunkTypeCount {
                    chunk_type: 0x112,
                    count: 1
                },
                &image
            ),
            Err(CheckFailure::ChunkCount {
                chunk_type: 0x112,
                expected: 1,
                found: 0
            })
        ));
        assert!(matches!(
            run_check(&OutputCheck::NoSilenceAfterData, &image),
            Err(CheckFailure::Sequence(_))
        ));
        assert!(matches!(
            run_check(&OutputCheck::Parses, b"not a uef"),
            Err(CheckFailure::Decode(_))
        ));
    }

    #[test]
    fn text_checks() {
        let tibet = b"tibet 0.5\ndata\n----....\n----\nend\n";
        run_check(&OutputCheck::RunLengths { unit_pulses: 2 }, tibet).expect("runs");
        run_check(
            &OutputCheck::ToneSequence {
                pattern: "....----end".into(),
            },
            tibet,
        )
        .expect("tones");
        run_check(
            &OutputCheck::Contains {
                text: "tibet".into(),
                gunzip: false,
            },
            tibet,
        )
        .expect("magic");
        assert!(matches!(
            run_check(
                &OutputCheck::Lacks {
                    text: "tibet".into(),
                    gunzip: false
                },
                tibet
            ),
            Err(CheckFailure::UnexpectedText)
        ));
        assert!(matches!(
            run_check(
                &OutputCheck::MagicPrefix {
                    magic: "Compressed Square Wave".into()
                },
                tibet
            ),
            Err(CheckFailure::NoMagic)
        ));
        run_check(
            &OutputCheck::ExactText {
                text: "HELLO\r".into(),
            },
            b"HELLO\r",
        )
        .expect("exact");
    }

    #[test]
    fn gunzip_before_search() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"tibet 0.5\n").expect("write");
        let gz = encoder.finish().expect("finish");

        let gunzipped = OutputCheck::Contains {
            text: "tibet".into(),
            gunzip: true,
        };
        run_check(&gunzipped, &gz).expect("found after gunzip");
        assert!(matches!(
            run_check(&gunzipped, b"tibet"),
            Err(CheckFailure::Gunzip(_))
        ));
    }
}
