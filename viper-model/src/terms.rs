// © 2020, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::{
    errors::{DecodeError, DecodeResult},
    model::ModelEntry,
};
use std::fmt;

/// A typed term decoded from a raw model entry.
///
/// Terms are immutable once built and owned by whichever structure decoded
/// them (a heap chunk, or a transient type-inference computation).
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// A literal or uninterpreted constant. The sort is absent unless
    /// contextual type information was supplied by the producer.
    Constant { value: String, sort: Option<String> },
    /// A reference to a sorted symbol.
    Variable { name: String, sort: String },
    /// An applied function with its decoded arguments.
    Application {
        function: String,
        args: Vec<Term>,
        sort: Option<String>,
    },
    /// A function table: argument tuples mapped to values, with a default.
    Map {
        cases: Vec<(Vec<Term>, Term)>,
        default: Box<Term>,
    },
}

impl Term {
    /// Decodes a raw model entry into a term.
    ///
    /// Pure function of its input. `function_entry` is not supported and
    /// fails instead of being coerced. A nullary application carrying a sort
    /// decodes to a [`Term::Variable`]: it is a reference to a sorted symbol,
    /// not an application.
    pub fn decode(entry: &ModelEntry) -> DecodeResult<Term> {
        match entry {
            ModelEntry::Constant { value, sort } => Ok(Term::Constant {
                value: value.clone(),
                sort: sort.clone(),
            }),
            ModelEntry::Application { value, sort } => {
                if value.args.is_empty() {
                    if let Some(sort) = sort {
                        return Ok(Term::Variable {
                            name: value.name.clone(),
                            sort: sort.clone(),
                        });
                    }
                }
                let args = value
                    .args
                    .iter()
                    .map(Term::decode)
                    .collect::<DecodeResult<Vec<_>>>()?;
                Ok(Term::Application {
                    function: value.name.clone(),
                    args,
                    sort: sort.clone(),
                })
            }
            ModelEntry::Map { cases, default } => {
                let cases = cases
                    .iter()
                    .map(|case| {
                        let args = case
                            .args
                            .iter()
                            .map(Term::decode)
                            .collect::<DecodeResult<Vec<_>>>()?;
                        let value = Term::decode(&case.value)?;
                        Ok((args, value))
                    })
                    .collect::<DecodeResult<Vec<_>>>()?;
                Ok(Term::Map {
                    cases,
                    default: Box::new(Term::decode(default)?),
                })
            }
            ModelEntry::Function { .. } => Err(DecodeError::unsupported_entry_kind(
                "term",
                "'constant_entry', 'application_entry' or 'map_entry'",
                entry.kind(),
            )),
        }
    }

    /// The declared sort of this term, if it carries one.
    pub fn sort(&self) -> Option<&str> {
        match self {
            Term::Constant { sort, .. } => sort.as_deref(),
            Term::Variable { sort, .. } => Some(sort),
            Term::Application { sort, .. } => sort.as_deref(),
            Term::Map { .. } => None,
        }
    }

    /// Attaches contextual sort information to a sortless constant or
    /// application; other terms are returned unchanged.
    pub fn with_sort(self, contextual_sort: &str) -> Term {
        match self {
            Term::Constant { value, sort: None } => Term::Constant {
                value,
                sort: Some(contextual_sort.to_string()),
            },
            Term::Application {
                function,
                args,
                sort: None,
            } => Term::Application {
                function,
                args,
                sort: Some(contextual_sort.to_string()),
            },
            other => other,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Term::Constant { value, .. } => write!(f, "{value}"),
            Term::Variable { name, .. } => write!(f, "{name}"),
            Term::Application { function, args, .. } => {
                write!(f, "{function}(")?;
                for (index, arg) in args.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Term::Map { cases, .. } => write!(f, "map[{} cases]", cases.len()),
        }
    }
}
