// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::coding::{DecodeError, EncodeError};

/// Represents errors that can occur while building or querying a sequence
/// Bloom tree.
#[derive(Debug)]
pub enum Error {
    /// I/O error (file not found, short read, write failure, ...)
    Io(std::io::Error),

    /// Serialization failed
    Encode(EncodeError),

    /// Deserialization failed: bad magic, unsupported version, inconsistent
    /// header, RRR parameter mismatch, offset not matching expected position.
    Decode(DecodeError),

    /// Operation not supported by the current representation: rank/select on
    /// a Roaring vector, save of a write-protected vector, union of
    /// unequal-length vectors whose zero-fill semantics are ambiguous.
    Unsupported(&'static str),

    /// Two filters participating in the same tree disagree on smer size,
    /// hash function count, seeds, hash modulus, numBits, or kind.
    Consistency(String),

    /// Tree shape is invalid: an internal node has exactly one child, a
    /// topology line jumps more than one depth level, the tree is empty, or
    /// two nodes share a name.
    Structure(String),

    /// Caller asked for something that isn't legal right now: modifying a
    /// read-only bit-vector variant, looking up in a filter that hasn't been
    /// loaded yet.
    Invalid(&'static str),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Encode(e) => write!(f, "encode error: {e}"),
            Self::Decode(e) => write!(f, "decode error: {e}"),
            Self::Unsupported(msg) => write!(f, "unsupported operation: {msg}"),
            Self::Consistency(msg) => write!(f, "inconsistent bloom filter parameters: {msg}"),
            Self::Structure(msg) => write!(f, "invalid tree structure: {msg}"),
            Self::Invalid(msg) => write!(f, "invalid request: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Encode(e) => Some(e),
            Self::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<EncodeError> for Error {
    fn from(value: EncodeError) -> Self {
        Self::Encode(value)
    }
}

impl From<DecodeError> for Error {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
