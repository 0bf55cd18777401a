// © 2020, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use rustc_hash::FxHashMap;
use serde_json::Value;
use std::{fmt, rc::Rc};
use viper_model::{DecodeError, DecodeResult, RawViperType, ViperDefinition};

/// A Viper-level type inferred for a model value, optionally carrying the
/// concrete inner SMT value it was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViperType {
    Ref { inner: Option<String> },
    Int { inner: Option<String> },
    Bool { inner: Option<String> },
    Perm { inner: Option<String> },
    Set {
        inner: Option<String>,
        element: Rc<ViperType>,
    },
    Other { name: String, inner: Option<String> },
}

impl ViperType {
    pub fn typename(&self) -> String {
        match self {
            ViperType::Ref { .. } => "Ref".to_string(),
            ViperType::Int { .. } => "Int".to_string(),
            ViperType::Bool { .. } => "Bool".to_string(),
            ViperType::Perm { .. } => "Perm".to_string(),
            ViperType::Set { element, .. } => format!("Set[{}]", element.typename()),
            ViperType::Other { name, .. } => name.clone(),
        }
    }

    pub fn inner(&self) -> Option<&str> {
        match self {
            ViperType::Ref { inner }
            | ViperType::Int { inner }
            | ViperType::Bool { inner }
            | ViperType::Perm { inner }
            | ViperType::Set { inner, .. }
            | ViperType::Other { inner, .. } => inner.as_deref(),
        }
    }
}

impl fmt::Display for ViperType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.typename())
    }
}

/// Interning cache for types, owned by one session.
///
/// Structurally identical types resolved through one cache compare equal by
/// reference (`Rc::ptr_eq`). Constructed fresh per session; there is no
/// ambient global cache.
pub struct TypeCache {
    types: FxHashMap<String, Rc<ViperType>>,
}

impl TypeCache {
    pub fn new() -> Self {
        let mut types = FxHashMap::default();
        types.insert("Bool".to_string(), Rc::new(ViperType::Bool { inner: None }));
        types.insert("Int".to_string(), Rc::new(ViperType::Int { inner: None }));
        types.insert("Ref".to_string(), Rc::new(ViperType::Ref { inner: None }));
        types.insert("Perm".to_string(), Rc::new(ViperType::Perm { inner: None }));
        types.insert(
            "Wand".to_string(),
            Rc::new(ViperType::Other {
                name: "Wand".to_string(),
                inner: None,
            }),
        );
        types.insert(
            "Internal".to_string(),
            Rc::new(ViperType::Other {
                name: "Internal".to_string(),
                inner: None,
            }),
        );
        TypeCache { types }
    }

    /// Resolves a canonical type representation to its interned type,
    /// creating it on first use.
    pub fn resolve(&mut self, repr: &str) -> Rc<ViperType> {
        if let Some(typ) = self.types.get(repr) {
            return Rc::clone(typ);
        }
        let typ = if repr == "Set[Ref]" {
            Rc::new(ViperType::Set {
                inner: None,
                element: self.resolve("Ref"),
            })
        } else {
            // TODO: track the structure of Seq/Map and nested Set types
            // instead of collapsing them into `Other`.
            Rc::new(ViperType::Other {
                name: repr.to_string(),
                inner: None,
            })
        };
        self.types.insert(repr.to_string(), Rc::clone(&typ));
        typ
    }

    pub fn lookup(&self, repr: &str) -> Option<Rc<ViperType>> {
        self.types.get(repr).map(Rc::clone)
    }
}

impl Default for TypeCache {
    fn default() -> Self {
        TypeCache::new()
    }
}

/// Serializes a statically declared type into its canonical string key.
///
/// Atomic types map directly (backend-specific ones through their `smtName`),
/// concrete generic types serialize recursively, pre-serialized generic and
/// extension types pass through unchanged. Any other shape is a program/tool
/// mismatch and fails; it is never silently defaulted.
pub fn serialize_type(symbol: &str, raw: &RawViperType) -> DecodeResult<String> {
    match raw.kind.as_str() {
        "atomic" => match &raw.typename {
            Value::String(typename) => Ok(typename.clone()),
            Value::Object(fields) => match fields.get("smtName").and_then(Value::as_str) {
                Some(smt_name) => Ok(smt_name.to_string()),
                None => Err(DecodeError::unsupported_type_shape(symbol, &raw.typename)),
            },
            other => Err(DecodeError::unsupported_type_shape(symbol, other)),
        },
        "generic" => {
            if raw.is_concrete {
                serialize_concrete_type(symbol, &raw.typename)
            } else {
                // Non-concrete generic types arrive pre-serialized.
                raw.typename
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| DecodeError::unsupported_type_shape(symbol, &raw.typename))
            }
        }
        "extension" => raw
            .typename
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| DecodeError::unsupported_type_shape(symbol, &raw.typename)),
        unknown => Err(DecodeError::unsupported_type_shape(symbol, unknown)),
    }
}

fn serialize_concrete_type(symbol: &str, typ: &Value) -> DecodeResult<String> {
    if typ.get("kind").and_then(Value::as_str) == Some("atomic") {
        return typ
            .get("typename")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DecodeError::unsupported_type_shape(symbol, typ));
    }
    let collection = match typ.get("collection").and_then(Value::as_str) {
        Some(collection) => collection,
        None => return Err(DecodeError::unsupported_type_shape(symbol, typ)),
    };
    match collection {
        "Set" | "Seq" | "MultiSet" => {
            let element = serialize_concrete_type(symbol, &typ["elements"])?;
            Ok(format!("{collection}[{element}]"))
        }
        "Map" => {
            let keys = serialize_concrete_type(symbol, &typ["keys"])?;
            let values = serialize_concrete_type(symbol, &typ["values"])?;
            Ok(format!("Map[{keys},{values}]"))
        }
        _ => {
            let params = match typ.get("typeParams").and_then(Value::as_array) {
                Some(params) => params,
                None => return Err(DecodeError::unsupported_type_shape(symbol, typ)),
            };
            let args = params
                .iter()
                .map(|param| serialize_concrete_type(symbol, param))
                .collect::<DecodeResult<Vec<_>>>()?;
            Ok(format!("{collection}[{}]", args.join(",")))
        }
    }
}

/// The symbol-name to type map harvested from the program's declarations.
pub struct StaticTypes {
    map: FxHashMap<String, Rc<ViperType>>,
}

impl StaticTypes {
    pub fn harvest(
        definitions: &[ViperDefinition],
        cache: &mut TypeCache,
    ) -> DecodeResult<StaticTypes> {
        let mut map = FxHashMap::default();
        for definition in definitions {
            if let Some(raw_type) = &definition.typ.viper_type {
                let key = serialize_type(&definition.name, raw_type)?;
                map.insert(definition.name.clone(), cache.resolve(&key));
            }
        }
        Ok(StaticTypes { map })
    }

    pub fn lookup(&self, name: &str) -> Option<Rc<ViperType>> {
        self.map.get(name).map(Rc::clone)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_type(value: serde_json::Value) -> RawViperType {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn cache_interns_types() {
        let mut cache = TypeCache::new();
        let first = cache.resolve("Ref");
        let second = cache.resolve("Ref");
        assert!(Rc::ptr_eq(&first, &second));

        let set = cache.resolve("Set[Ref]");
        match &*set {
            ViperType::Set { element, .. } => assert!(Rc::ptr_eq(element, &first)),
            other => panic!("expected a set type, got {other:?}"),
        }
        assert!(Rc::ptr_eq(&set, &cache.resolve("Set[Ref]")));
    }

    #[test]
    fn serialize_atomic_types() {
        assert_eq!(
            serialize_type("x", &raw_type(json!({ "kind": "atomic", "typename": "Ref" }))).unwrap(),
            "Ref"
        );
        assert_eq!(
            serialize_type(
                "x",
                &raw_type(json!({
                    "kind": "atomic",
                    "typename": { "smtName": "$PSF<Int>" }
                }))
            )
            .unwrap(),
            "$PSF<Int>"
        );
    }

    #[test]
    fn serialize_concrete_generic_types() {
        assert_eq!(
            serialize_type(
                "s",
                &raw_type(json!({
                    "kind": "generic",
                    "isConcrete": true,
                    "typename": {
                        "collection": "Set",
                        "elements": { "kind": "atomic", "typename": "Ref" }
                    }
                }))
            )
            .unwrap(),
            "Set[Ref]"
        );
        assert_eq!(
            serialize_type(
                "m",
                &raw_type(json!({
                    "kind": "generic",
                    "isConcrete": true,
                    "typename": {
                        "collection": "Map",
                        "keys": { "kind": "atomic", "typename": "Int" },
                        "values": { "kind": "atomic", "typename": "Bool" }
                    }
                }))
            )
            .unwrap(),
            "Map[Int,Bool]"
        );
        assert_eq!(
            serialize_type(
                "p",
                &raw_type(json!({
                    "kind": "generic",
                    "isConcrete": true,
                    "typename": {
                        "collection": "Pair",
                        "typeParams": [
                            { "kind": "atomic", "typename": "Int" },
                            { "kind": "atomic", "typename": "Ref" }
                        ]
                    }
                }))
            )
            .unwrap(),
            "Pair[Int,Ref]"
        );
    }

    #[test]
    fn preserialized_types_pass_through() {
        assert_eq!(
            serialize_type(
                "s",
                &raw_type(json!({ "kind": "generic", "typename": "Seq[T]" }))
            )
            .unwrap(),
            "Seq[T]"
        );
        assert_eq!(
            serialize_type(
                "a",
                &raw_type(json!({ "kind": "extension", "typename": "Adt[List]" }))
            )
            .unwrap(),
            "Adt[List]"
        );
    }

    #[test]
    fn unknown_type_shape_is_fatal() {
        let result = serialize_type(
            "weird",
            &raw_type(json!({ "kind": "mystery", "typename": "X" })),
        );
        assert_eq!(
            result,
            Err(DecodeError::UnsupportedTypeShape {
                symbol: "weird".to_string(),
                shape: "mystery".to_string()
            })
        );
    }

    #[test]
    fn harvest_builds_symbol_map() {
        let definitions: Vec<ViperDefinition> = serde_json::from_value(json!([
            {
                "name": "x",
                "location": { "start": "1:1", "end": "1:2", "file": "a.vpr" },
                "scopeStart": "global",
                "scopeEnd": "global",
                "type": { "name": "Local", "viperType": { "kind": "atomic", "typename": "Ref" } }
            },
            {
                "name": "main",
                "location": { "start": "1:1", "end": "9:1", "file": "a.vpr" },
                "scopeStart": "global",
                "scopeEnd": "global",
                "type": { "name": "Method" }
            }
        ]))
        .unwrap();

        let mut cache = TypeCache::new();
        let statics = StaticTypes::harvest(&definitions, &mut cache).unwrap();
        assert_eq!(statics.len(), 1);
        assert!(Rc::ptr_eq(
            &statics.lookup("x").unwrap(),
            &cache.resolve("Ref")
        ));
        assert_eq!(statics.lookup("main"), None);
    }
}
