// © 2020, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::{
    errors::{DecodeError, DecodeResult},
    model::ModelEntry,
    terms::Term,
};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::fmt;

static FVF_SORT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^FVF\[(.+)\]$").unwrap());
static PSF_SORT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^PSF\[(.+)\]$").unwrap());

/// A single ownership fact holding at one point of the symbolic execution.
#[derive(Debug, Clone, PartialEq)]
pub enum HeapChunk {
    Field(FieldChunk),
    Predicate(PredicateChunk),
    MagicWand(MagicWandChunk),
    QuantifiedField(QuantifiedFieldChunk),
    QuantifiedPredicate(QuantifiedPredicateChunk),
    QuantifiedMagicWand(QuantifiedMagicWandChunk),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldChunk {
    pub field: String,
    pub sort: Option<String>,
    pub receiver: Term,
    pub snap: Term,
    pub perm: Term,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredicateChunk {
    pub id: String,
    pub sort: Option<String>,
    pub args: Vec<Term>,
    pub snap: Term,
    pub perm: Term,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MagicWandChunk {
    pub args: Vec<Term>,
    pub snap: Term,
    pub perm: Term,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuantifiedFieldChunk {
    pub field: String,
    /// The inner sort of the field value function, from `FVF[<inner>]`.
    pub sort: String,
    pub field_value_function: Term,
    pub perm: Term,
    pub invertibles: Option<Vec<String>>,
    pub cond: Option<Term>,
    pub receiver: Option<Term>,
    pub hints: Vec<Term>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuantifiedPredicateChunk {
    pub predicate: String,
    pub vars: Vec<Term>,
    /// The inner sort of the predicate snap function, from `PSF[<inner>]`.
    pub sort: String,
    pub predicate_snap_function: Term,
    pub perm: Term,
    pub invertibles: Option<Vec<String>>,
    pub cond: Option<Term>,
    pub singleton_args: Vec<Term>,
    pub hints: Vec<Term>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuantifiedMagicWandChunk {
    pub predicate: String,
    pub vars: Vec<Term>,
    pub wand_snap_function: Term,
    pub perm: Term,
    pub invertibles: Option<Vec<String>>,
    pub cond: Option<Term>,
    pub singleton_args: Vec<Term>,
    pub hints: Vec<Term>,
}

impl HeapChunk {
    /// Decodes a raw heap chunk record, dispatching on its mandatory `type`
    /// discriminator. The required keys of each chunk kind are validated in a
    /// fixed order and the first missing key is named in the error.
    pub fn decode(raw: &Value) -> DecodeResult<HeapChunk> {
        let chunk_type = match raw.get("type").and_then(Value::as_str) {
            Some(chunk_type) => chunk_type,
            None => return Err(DecodeError::missing_field("<unknown>", "type")),
        };

        match chunk_type {
            "basic_field_chunk" => {
                must_have(raw, chunk_type, &["field", "receiver", "snap", "perm"])?;
                let snap = snapshot_term(raw, chunk_type, "snap")?;
                Ok(HeapChunk::Field(FieldChunk {
                    field: string_field(raw, chunk_type, "field")?,
                    sort: snap.sort().map(str::to_string),
                    receiver: term_field(raw, chunk_type, "receiver")?,
                    snap,
                    perm: term_field(raw, chunk_type, "perm")?,
                }))
            }
            "basic_predicate_chunk" => {
                must_have(raw, chunk_type, &["predicate", "args", "snap", "perm"])?;
                let snap = snapshot_term(raw, chunk_type, "snap")?;
                Ok(HeapChunk::Predicate(PredicateChunk {
                    id: string_field(raw, chunk_type, "predicate")?,
                    sort: snap.sort().map(str::to_string),
                    args: term_list(raw, chunk_type, "args")?,
                    snap,
                    perm: term_field(raw, chunk_type, "perm")?,
                }))
            }
            "basic_magic_wand_chunk" => {
                must_have(raw, chunk_type, &["args", "snap", "perm"])?;
                Ok(HeapChunk::MagicWand(MagicWandChunk {
                    args: term_list(raw, chunk_type, "args")?,
                    snap: term_field(raw, chunk_type, "snap")?,
                    perm: term_field(raw, chunk_type, "perm")?,
                }))
            }
            "quantified_field_chunk" => {
                must_have(
                    raw,
                    chunk_type,
                    &["field", "field_value_function", "perm", "invs", "cond", "receiver", "hints"],
                )?;
                let fvf = term_field(raw, chunk_type, "field_value_function")?;
                let sort = function_sort(&fvf, chunk_type, &FVF_SORT, "FVF[...]")?;
                Ok(HeapChunk::QuantifiedField(QuantifiedFieldChunk {
                    field: string_field(raw, chunk_type, "field")?,
                    sort,
                    field_value_function: fvf,
                    perm: term_field(raw, chunk_type, "perm")?,
                    invertibles: name_list(raw, chunk_type, "invs")?,
                    cond: optional_term(raw, chunk_type, "cond")?,
                    receiver: optional_term(raw, chunk_type, "receiver")?,
                    hints: term_list(raw, chunk_type, "hints")?,
                }))
            }
            "quantified_predicate_chunk" => {
                must_have(
                    raw,
                    chunk_type,
                    &[
                        "predicate",
                        "vars",
                        "predicate_snap_function",
                        "perm",
                        "invs",
                        "cond",
                        "singleton_args",
                        "hints",
                    ],
                )?;
                let psf = term_field(raw, chunk_type, "predicate_snap_function")?;
                let sort = function_sort(&psf, chunk_type, &PSF_SORT, "PSF[...]")?;
                Ok(HeapChunk::QuantifiedPredicate(QuantifiedPredicateChunk {
                    predicate: string_field(raw, chunk_type, "predicate")?,
                    vars: term_list(raw, chunk_type, "vars")?,
                    sort,
                    predicate_snap_function: psf,
                    perm: term_field(raw, chunk_type, "perm")?,
                    invertibles: name_list(raw, chunk_type, "invs")?,
                    cond: optional_term(raw, chunk_type, "cond")?,
                    singleton_args: term_list(raw, chunk_type, "singleton_args")?,
                    hints: term_list(raw, chunk_type, "hints")?,
                }))
            }
            "quantified_magic_wand_chunk" => {
                must_have(
                    raw,
                    chunk_type,
                    &[
                        "vars",
                        "predicate",
                        "wand_snap_function",
                        "perm",
                        "invs",
                        "cond",
                        "singleton_args",
                        "hints",
                    ],
                )?;
                Ok(HeapChunk::QuantifiedMagicWand(QuantifiedMagicWandChunk {
                    predicate: string_field(raw, chunk_type, "predicate")?,
                    vars: term_list(raw, chunk_type, "vars")?,
                    wand_snap_function: term_field(raw, chunk_type, "wand_snap_function")?,
                    perm: term_field(raw, chunk_type, "perm")?,
                    invertibles: name_list(raw, chunk_type, "invs")?,
                    cond: optional_term(raw, chunk_type, "cond")?,
                    singleton_args: term_list(raw, chunk_type, "singleton_args")?,
                    hints: term_list(raw, chunk_type, "hints")?,
                }))
            }
            unknown => Err(DecodeError::UnknownChunkType {
                chunk_type: unknown.to_string(),
            }),
        }
    }

    pub fn chunk_type(&self) -> &'static str {
        match self {
            HeapChunk::Field(_) => "basic_field_chunk",
            HeapChunk::Predicate(_) => "basic_predicate_chunk",
            HeapChunk::MagicWand(_) => "basic_magic_wand_chunk",
            HeapChunk::QuantifiedField(_) => "quantified_field_chunk",
            HeapChunk::QuantifiedPredicate(_) => "quantified_predicate_chunk",
            HeapChunk::QuantifiedMagicWand(_) => "quantified_magic_wand_chunk",
        }
    }
}

/// Decodes an ordered list of raw heap chunk records, failing on the first
/// malformed chunk.
pub fn decode_heap(raw_chunks: &[Value]) -> DecodeResult<Vec<HeapChunk>> {
    raw_chunks.iter().map(HeapChunk::decode).collect()
}

fn must_have(raw: &Value, chunk_type: &str, keys: &[&'static str]) -> DecodeResult<()> {
    for key in keys {
        if raw.get(*key).is_none() {
            return Err(DecodeError::missing_field(chunk_type, key));
        }
    }
    Ok(())
}

fn string_field(raw: &Value, chunk_type: &str, key: &'static str) -> DecodeResult<String> {
    raw[key]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| DecodeError::unsupported_entry_kind(
            format!("{chunk_type}.{key}"),
            "a string",
            &raw[key],
        ))
}

fn term_field(raw: &Value, chunk_type: &str, key: &'static str) -> DecodeResult<Term> {
    decode_term_value(&raw[key], chunk_type, key)
}

fn decode_term_value(value: &Value, chunk_type: &str, key: &'static str) -> DecodeResult<Term> {
    let entry: ModelEntry = serde_json::from_value(value.clone()).map_err(|_| {
        let actual = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("<malformed>");
        DecodeError::unsupported_entry_kind(
            format!("{chunk_type}.{key}"),
            "a raw term entry",
            actual,
        )
    })?;
    Term::decode(&entry)
}

/// A term that stands for a chunk's snapshot. Shapes that can never carry a
/// sort (function tables) are rejected here.
fn snapshot_term(raw: &Value, chunk_type: &str, key: &'static str) -> DecodeResult<Term> {
    let snap = term_field(raw, chunk_type, key)?;
    if let Term::Map { .. } = snap {
        return Err(DecodeError::UnexpectedSnapshotShape {
            chunk_type: chunk_type.to_string(),
            snapshot: snap.to_string(),
        });
    }
    Ok(snap)
}

fn optional_term(raw: &Value, chunk_type: &str, key: &'static str) -> DecodeResult<Option<Term>> {
    if raw[key].is_null() {
        return Ok(None);
    }
    term_field(raw, chunk_type, key).map(Some)
}

fn term_list(raw: &Value, chunk_type: &str, key: &'static str) -> DecodeResult<Vec<Term>> {
    let value = &raw[key];
    if value.is_null() {
        return Ok(vec![]);
    }
    let items = value.as_array().ok_or_else(|| {
        DecodeError::unsupported_entry_kind(
            format!("{chunk_type}.{key}"),
            "a list of raw term entries",
            value,
        )
    })?;
    items
        .iter()
        .map(|item| decode_term_value(item, chunk_type, key))
        .collect()
}

fn name_list(raw: &Value, chunk_type: &str, key: &'static str) -> DecodeResult<Option<Vec<String>>> {
    let value = &raw[key];
    match value {
        Value::Null => Ok(None),
        Value::String(name) => Ok(Some(vec![name.clone()])),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    DecodeError::unsupported_entry_kind(
                        format!("{chunk_type}.{key}"),
                        "a list of names",
                        item,
                    )
                })
            })
            .collect::<DecodeResult<Vec<_>>>()
            .map(Some),
        other => Err(DecodeError::unsupported_entry_kind(
            format!("{chunk_type}.{key}"),
            "a list of names",
            other,
        )),
    }
}

fn function_sort(
    term: &Term,
    chunk_type: &str,
    pattern: &Regex,
    expected: &'static str,
) -> DecodeResult<String> {
    let sort = term.sort().ok_or_else(|| DecodeError::MalformedFunctionSort {
        chunk_type: chunk_type.to_string(),
        expected,
        actual: "<no sort>".to_string(),
    })?;
    match pattern.captures(sort) {
        Some(captures) => Ok(captures[1].to_string()),
        None => Err(DecodeError::MalformedFunctionSort {
            chunk_type: chunk_type.to_string(),
            expected,
            actual: sort.to_string(),
        }),
    }
}

fn join_terms(terms: &[Term]) -> String {
    terms.iter().join(", ")
}

impl fmt::Display for HeapChunk {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HeapChunk::Field(chunk) => chunk.fmt(f),
            HeapChunk::Predicate(chunk) => chunk.fmt(f),
            HeapChunk::MagicWand(chunk) => chunk.fmt(f),
            HeapChunk::QuantifiedField(chunk) => chunk.fmt(f),
            HeapChunk::QuantifiedPredicate(chunk) => chunk.fmt(f),
            HeapChunk::QuantifiedMagicWand(chunk) => chunk.fmt(f),
        }
    }
}

impl fmt::Display for FieldChunk {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}.{}: {} -> {} # {}",
            self.receiver,
            self.field,
            self.sort.as_deref().unwrap_or("?"),
            self.snap,
            self.perm
        )
    }
}

impl fmt::Display for PredicateChunk {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}({}; {}): {} # {}",
            self.id,
            self.snap,
            join_terms(&self.args),
            self.sort.as_deref().unwrap_or("?"),
            self.perm
        )
    }
}

impl fmt::Display for MagicWandChunk {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "wand[{}; {}]", self.snap, join_terms(&self.args))
    }
}

impl fmt::Display for QuantifiedFieldChunk {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "QA r :: r.{}: {} -> {} # {}",
            self.field, self.sort, self.field_value_function, self.perm
        )
    }
}

impl fmt::Display for QuantifiedPredicateChunk {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let vars = join_terms(&self.vars);
        write!(
            f,
            "QA {} :: {}({}): {} -> {} # {}",
            vars, self.predicate, vars, self.sort, self.predicate_snap_function, self.perm
        )
    }
}

impl fmt::Display for QuantifiedMagicWandChunk {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let vars = join_terms(&self.vars);
        write!(
            f,
            "QA {} :: {}({}) -> {} # {}",
            vars, self.predicate, vars, self.wand_snap_function, self.perm
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_basic_field_chunk() {
        let raw = json!({
            "type": "basic_field_chunk",
            "field": "f",
            "receiver": { "type": "constant_entry", "value": "$Ref!val!0" },
            "snap": { "type": "constant_entry", "value": "5" },
            "perm": { "type": "constant_entry", "value": "1.0" }
        });
        let chunk = HeapChunk::decode(&raw).unwrap();
        match chunk {
            HeapChunk::Field(field) => {
                assert_eq!(field.field, "f");
                assert_eq!(field.receiver.to_string(), "$Ref!val!0");
                assert_eq!(field.snap.to_string(), "5");
                assert_eq!(field.perm.to_string(), "1.0");
                assert_eq!(field.sort, None);
            }
            other => panic!("expected a field chunk, got {other:?}"),
        }
    }

    #[test]
    fn first_missing_key_is_named() {
        let raw = json!({ "type": "basic_field_chunk", "field": "f" });
        let result = HeapChunk::decode(&raw);
        assert_eq!(
            result,
            Err(DecodeError::MissingField {
                chunk_type: "basic_field_chunk".to_string(),
                field: "receiver"
            })
        );
    }

    #[test]
    fn missing_type_discriminator() {
        let raw = json!({ "field": "f" });
        assert_eq!(
            HeapChunk::decode(&raw),
            Err(DecodeError::MissingField {
                chunk_type: "<unknown>".to_string(),
                field: "type"
            })
        );
    }

    #[test]
    fn unknown_chunk_type() {
        let raw = json!({ "type": "exotic_chunk" });
        assert_eq!(
            HeapChunk::decode(&raw),
            Err(DecodeError::UnknownChunkType {
                chunk_type: "exotic_chunk".to_string()
            })
        );
    }

    #[test]
    fn map_shaped_snapshot_is_rejected() {
        let raw = json!({
            "type": "basic_field_chunk",
            "field": "f",
            "receiver": { "type": "constant_entry", "value": "$Ref!val!0" },
            "snap": {
                "type": "map_entry",
                "cases": [],
                "default": { "type": "constant_entry", "value": "0" }
            },
            "perm": { "type": "constant_entry", "value": "1.0" }
        });
        assert!(matches!(
            HeapChunk::decode(&raw),
            Err(DecodeError::UnexpectedSnapshotShape { .. })
        ));
    }

    #[test]
    fn decode_quantified_field_chunk_with_null_optionals() {
        let raw = json!({
            "type": "quantified_field_chunk",
            "field": "val",
            "field_value_function": {
                "type": "application_entry",
                "value": { "name": "sm@11@10", "args": [] },
                "sort": "FVF[Int]"
            },
            "perm": { "type": "constant_entry", "value": "1.0" },
            "invs": null,
            "cond": null,
            "receiver": null,
            "hints": null
        });
        let chunk = HeapChunk::decode(&raw).unwrap();
        match chunk {
            HeapChunk::QuantifiedField(qf) => {
                assert_eq!(qf.field, "val");
                assert_eq!(qf.sort, "Int");
                assert_eq!(qf.invertibles, None);
                assert_eq!(qf.cond, None);
                assert_eq!(qf.receiver, None);
                assert!(qf.hints.is_empty());
            }
            other => panic!("expected a quantified field chunk, got {other:?}"),
        }
    }

    #[test]
    fn quantified_field_chunk_requires_fvf_sort() {
        let raw = json!({
            "type": "quantified_field_chunk",
            "field": "val",
            "field_value_function": {
                "type": "application_entry",
                "value": { "name": "sm@11@10", "args": [] },
                "sort": "PSF[Int]"
            },
            "perm": { "type": "constant_entry", "value": "1.0" },
            "invs": null,
            "cond": null,
            "receiver": null,
            "hints": null
        });
        assert_eq!(
            HeapChunk::decode(&raw),
            Err(DecodeError::MalformedFunctionSort {
                chunk_type: "quantified_field_chunk".to_string(),
                expected: "FVF[...]",
                actual: "PSF[Int]".to_string()
            })
        );
    }

    #[test]
    fn decode_predicate_chunk_display() {
        let raw = json!({
            "type": "basic_predicate_chunk",
            "predicate": "list",
            "args": [{ "type": "constant_entry", "value": "$Ref!val!1" }],
            "snap": {
                "type": "application_entry",
                "value": { "name": "$t@4@7", "args": [] },
                "sort": "$Snap"
            },
            "perm": { "type": "constant_entry", "value": "1.0" }
        });
        let chunk = HeapChunk::decode(&raw).unwrap();
        assert_eq!(chunk.chunk_type(), "basic_predicate_chunk");
        assert_eq!(chunk.to_string(), "list($t@4@7; $Ref!val!1): $Snap # 1.0");
    }

    #[test]
    fn decode_heap_fails_fast() {
        let chunks = vec![
            json!({
                "type": "basic_magic_wand_chunk",
                "args": [],
                "snap": { "type": "constant_entry", "value": "$Snap.unit" },
                "perm": { "type": "constant_entry", "value": "1.0" }
            }),
            json!({ "type": "basic_field_chunk", "field": "f" }),
        ];
        assert!(matches!(
            decode_heap(&chunks),
            Err(DecodeError::MissingField { field: "receiver", .. })
        ));
    }
}
