// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::io::{Read, Write};

/// Error during serialization.
#[derive(Debug)]
pub enum EncodeError {
    /// I/O error
    Io(std::io::Error),
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "EncodeError({e})"),
        }
    }
}

impl From<std::io::Error> for EncodeError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
        }
    }
}

/// Error during deserialization.
#[derive(Debug)]
pub enum DecodeError {
    /// I/O error
    Io(std::io::Error),

    /// Magic number didn't match, or matched the "unfinished" marker.
    InvalidHeader(&'static str),

    /// A numeric header field failed a sanity check (out of range, nonzero
    /// padding, offsets that don't land back-to-back, ...).
    BadField(&'static str),

    /// File format version this reader doesn't know how to parse.
    UnsupportedVersion(u32),

    /// RRR block size / rank period stored in the file doesn't match this
    /// build's compile-time constants.
    RrrParameterMismatch {
        /// (block size, rank period) this build was compiled with.
        expected: (u8, u8),
        /// (block size, rank period) recorded in the file.
        found: (u8, u8),
    },
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "DecodeError::Io({e})"),
            Self::InvalidHeader(what) => write!(f, "invalid header: {what}"),
            Self::BadField(what) => write!(f, "bad header field: {what}"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported file format version {v}"),
            Self::RrrParameterMismatch { expected, found } => write!(
                f,
                "RRR parameter mismatch: expected block/period {expected:?}, file has {found:?}"
            ),
        }
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// Trait for types with a fixed little-endian on-disk encoding.
pub trait Encode {
    /// Serializes into a writer.
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError>;

    /// Serializes into a freshly allocated vector.
    fn encode_into_vec(&self) -> Vec<u8> {
        let mut v = vec![];
        self.encode_into(&mut v)
            .expect("writing to a Vec cannot fail");
        v
    }
}

/// Trait for types with a fixed little-endian on-disk encoding.
pub trait Decode: Sized {
    /// Deserializes from a reader.
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError>;
}
