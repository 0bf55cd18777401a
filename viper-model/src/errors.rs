// © 2020, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fmt;

/// An error raised while decoding raw backend output: model entries, terms,
/// heap chunk records, or static type descriptors.
///
/// Decode errors are unrecoverable for the entity being decoded; the decoder
/// aborts and names the offending symbol, chunk or field instead of
/// substituting a default.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// The raw entry has a kind the current operation does not support
    /// (e.g. a `function_entry` where a term was expected).
    UnsupportedEntryKind {
        context: String,
        expected: &'static str,
        actual: String,
    },
    /// A required key is missing from a raw heap chunk record.
    MissingField {
        chunk_type: String,
        field: &'static str,
    },
    /// The snapshot term of a field or predicate chunk decoded to a shape
    /// that can never carry a sort.
    UnexpectedSnapshotShape {
        chunk_type: String,
        snapshot: String,
    },
    /// The snapshot function of a quantified chunk does not carry a sort of
    /// the expected form.
    MalformedFunctionSort {
        chunk_type: String,
        expected: &'static str,
        actual: String,
    },
    /// The `type` discriminator of a raw heap chunk is not one of the six
    /// known chunk kinds.
    UnknownChunkType { chunk_type: String },
    /// A statically declared type has a shape this decoder does not
    /// recognize. Fatal for the session: the type map would be incomplete.
    UnsupportedTypeShape { symbol: String, shape: String },
}

pub type DecodeResult<T> = Result<T, DecodeError>;

impl DecodeError {
    pub fn unsupported_entry_kind<C: ToString, A: ToString>(
        context: C,
        expected: &'static str,
        actual: A,
    ) -> Self {
        DecodeError::UnsupportedEntryKind {
            context: context.to_string(),
            expected,
            actual: actual.to_string(),
        }
    }

    pub fn missing_field<C: ToString>(chunk_type: C, field: &'static str) -> Self {
        DecodeError::MissingField {
            chunk_type: chunk_type.to_string(),
            field,
        }
    }

    pub fn unsupported_type_shape<S: ToString, R: ToString>(symbol: S, shape: R) -> Self {
        DecodeError::UnsupportedTypeShape {
            symbol: symbol.to_string(),
            shape: shape.to_string(),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeError::UnsupportedEntryKind {
                context,
                expected,
                actual,
            } => write!(
                f,
                "expected entry of type {expected} in {context}; got '{actual}'"
            ),
            DecodeError::MissingField { chunk_type, field } => {
                write!(f, "a '{chunk_type}' chunk must have a '{field}' entry")
            }
            DecodeError::UnexpectedSnapshotShape {
                chunk_type,
                snapshot,
            } => write!(
                f,
                "unexpected snapshot shape in '{chunk_type}' chunk: '{snapshot}'"
            ),
            DecodeError::MalformedFunctionSort {
                chunk_type,
                expected,
                actual,
            } => write!(
                f,
                "expected sort of the form '{expected}' in '{chunk_type}' chunk, but it was '{actual}'"
            ),
            DecodeError::UnknownChunkType { chunk_type } => {
                write!(f, "unknown heap chunk type: '{chunk_type}'")
            }
            DecodeError::UnsupportedTypeShape { symbol, shape } => {
                write!(f, "cannot serialize type of '{symbol}': unsupported shape '{shape}'")
            }
        }
    }
}

impl std::error::Error for DecodeError {}
