// © 2020, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

/// A source location reported by the verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViperLocation {
    pub start: String,
    pub end: String,
    pub file: String,
}

/// A scope bound: either a concrete location or the literal `"global"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScopeBound {
    Location(ViperLocation),
    Marker(String),
}

impl ScopeBound {
    pub fn is_global(&self) -> bool {
        matches!(self, ScopeBound::Marker(marker) if marker == "global")
    }
}

/// The declared kind and (optional) static type of a program symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionType {
    /// The symbol kind: `Local`, `Argument`, `Field`, `Function`, `Method`,
    /// `Predicate`, ...
    pub name: String,
    #[serde(
        default,
        rename = "viperType",
        skip_serializing_if = "Option::is_none"
    )]
    pub viper_type: Option<RawViperType>,
}

/// A statically declared Viper type, as the verifier serializes it.
///
/// `typename` is either a plain string (atomic and pre-serialized types) or a
/// structured value (concrete generic types); its interpretation depends on
/// `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawViperType {
    pub kind: String,
    pub typename: serde_json::Value,
    #[serde(default, rename = "isConcrete")]
    pub is_concrete: bool,
}

/// One symbol of the verified program, harvested from its symbol table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViperDefinition {
    pub name: String,
    pub location: ViperLocation,
    #[serde(rename = "scopeStart")]
    pub scope_start: ScopeBound,
    #[serde(rename = "scopeEnd")]
    pub scope_end: ScopeBound,
    #[serde(rename = "type")]
    pub typ: DefinitionType,
}

impl ViperDefinition {
    pub fn kind_name(&self) -> &str {
        &self.typ.name
    }
}
