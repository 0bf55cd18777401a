// © 2020, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::fmt;
use viper_model::DecodeError;

/// An error raised while building a session or producing a graph model.
///
/// Session errors are fatal for the computation that raised them: no partial
/// graph model is returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionError {
    Decode(DecodeError),
    /// The raw model failed the sanity checks performed before decoding.
    InvalidModel(String),
    /// The model does not contain the lookup relation expected for a field.
    MissingFieldRelation { field: String, relation: String },
    /// The lookup relation of a field is not a map entry.
    MalformedFieldRelation {
        field: String,
        relation: String,
        actual: String,
    },
    /// The backend tag does not identify a supported backend.
    UnknownBackend(String),
}

pub type SessionResult<T> = Result<T, SessionError>;

impl From<DecodeError> for SessionError {
    fn from(error: DecodeError) -> Self {
        SessionError::Decode(error)
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SessionError::Decode(error) => error.fmt(f),
            SessionError::InvalidModel(reason) => write!(f, "invalid model: {reason}"),
            SessionError::MissingFieldRelation { field, relation } => write!(
                f,
                "model does not contain the expected relation '{relation}' for field '{field}'"
            ),
            SessionError::MalformedFieldRelation {
                field,
                relation,
                actual,
            } => write!(
                f,
                "field-value relation '{relation}' for field '{field}' must be a 'map_entry'; got '{actual}'"
            ),
            SessionError::UnknownBackend(tag) => {
                write!(f, "unknown verification backend: '{tag}'")
            }
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Decode(error) => Some(error),
            _ => None,
        }
    }
}

/// An error raised by a navigation call. The cursor is left unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NavigationError {
    /// No record with the requested index exists in the active verifiable.
    RecordIndexNotFound(usize),
    /// No verifiable with the requested name exists in the session.
    UnknownVerifiable(String),
    /// The requested verifiable has no records to place the cursor on.
    EmptyVerifiable(String),
    /// The trace contains no verifiables at all.
    NoVerifiables,
    /// A navigation call was issued from inside an observer callback.
    ReentrantNavigation,
}

pub type NavigationResult<T> = Result<T, NavigationError>;

impl fmt::Display for NavigationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NavigationError::RecordIndexNotFound(index) => {
                write!(f, "could not find a record with index {index}")
            }
            NavigationError::UnknownVerifiable(name) => {
                write!(f, "could not find verifiable '{name}'")
            }
            NavigationError::EmptyVerifiable(name) => {
                write!(f, "verifiable '{name}' has no records")
            }
            NavigationError::NoVerifiables => write!(f, "the trace contains no verifiables"),
            NavigationError::ReentrantNavigation => {
                write!(f, "navigation from inside a state-change observer is not allowed")
            }
        }
    }
}

impl std::error::Error for NavigationError {}
