// © 2020, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::errors::{DecodeError, DecodeResult};
use itertools::Itertools;
use log::error;
use regex::Regex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// The SMT solver's concrete interpretation of one symbol.
///
/// Entries inside heap chunk records use the same vocabulary and may carry an
/// additional `sort` annotation; entries of the plain model never do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ModelEntry {
    #[serde(rename = "constant_entry")]
    Constant {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sort: Option<String>,
    },
    #[serde(rename = "application_entry")]
    Application {
        value: FunctionValue,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sort: Option<String>,
    },
    #[serde(rename = "map_entry")]
    Map {
        cases: Vec<ModelCase>,
        default: Box<ModelEntry>,
    },
    #[serde(rename = "function_entry")]
    Function {
        #[serde(default)]
        cases: Vec<ModelCase>,
        default: Box<ModelEntry>,
    },
}

/// An uninterpreted function application appearing in a model entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionValue {
    pub name: String,
    pub args: Vec<ModelEntry>,
}

/// One case of a `map_entry`: a tuple of argument values and the value the
/// map takes on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCase {
    pub args: Vec<ModelEntry>,
    pub value: ModelEntry,
}

impl ModelEntry {
    /// The raw discriminator this entry was decoded from.
    pub fn kind(&self) -> &'static str {
        match self {
            ModelEntry::Constant { .. } => "constant_entry",
            ModelEntry::Application { .. } => "application_entry",
            ModelEntry::Map { .. } => "map_entry",
            ModelEntry::Function { .. } => "function_entry",
        }
    }

    /// The inner value of a constant entry.
    pub fn constant_value(&self) -> DecodeResult<&str> {
        match self {
            ModelEntry::Constant { value, .. } => Ok(value),
            other => Err(DecodeError::unsupported_entry_kind(
                "constant entry lookup",
                "'constant_entry'",
                other.kind(),
            )),
        }
    }

    /// Fully applies this entry to concrete argument values.
    ///
    /// Constants ignore the arguments; map entries return the value of the
    /// first case whose arguments all match, falling back to the default.
    pub fn apply(&self, args: &[&str]) -> DecodeResult<String> {
        match self {
            ModelEntry::Constant { value, .. } => Ok(value.clone()),
            ModelEntry::Map { cases, default } => {
                for case in cases {
                    if case.args.len() != args.len() {
                        continue;
                    }
                    let mut matches = true;
                    for (case_arg, arg) in case.args.iter().zip(args) {
                        if case_arg.constant_value()? != *arg {
                            matches = false;
                            break;
                        }
                    }
                    if matches {
                        return Ok(case.value.constant_value()?.to_string());
                    }
                }
                Ok(default.constant_value()?.to_string())
            }
            other => Err(DecodeError::unsupported_entry_kind(
                "entry application",
                "'constant_entry' or 'map_entry'",
                other.kind(),
            )),
        }
    }
}

/// A mapping from symbol name to the solver's interpretation of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Model {
    pub entries: FxHashMap<String, ModelEntry>,
}

impl Model {
    pub fn new(entries: FxHashMap<String, ModelEntry>) -> Self {
        Model { entries }
    }

    pub fn get(&self, name: &str) -> Option<&ModelEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in lexicographic symbol order. Iteration over the backing map
    /// is unordered; every consumer that must be deterministic goes through
    /// this accessor.
    pub fn iter_sorted(&self) -> impl Iterator<Item = (&String, &ModelEntry)> {
        self.entries.iter().sorted_by(|(a, _), (b, _)| a.cmp(b))
    }

    /// All entries whose symbol name matches the pattern, in symbol order.
    pub fn entries_matching(&self, pattern: &Regex) -> Vec<(&String, &ModelEntry)> {
        self.iter_sorted()
            .filter(|(name, _)| pattern.is_match(name))
            .collect()
    }

    /// Finds every sub-entry of the model whose inner value equals `value`,
    /// together with the path of symbols leading to it. Used to explain where
    /// a given model value flows.
    pub fn collect_dependent_entries(&self, value: &str) -> Vec<(Vec<String>, &ModelEntry)> {
        let mut result = Vec::new();
        for (name, entry) in self.iter_sorted() {
            collect_dependent_rec(vec![name.clone()], entry, value, &mut result);
        }
        result
    }
}

fn collect_dependent_rec<'a>(
    path: Vec<String>,
    entry: &'a ModelEntry,
    value: &str,
    out: &mut Vec<(Vec<String>, &'a ModelEntry)>,
) {
    match entry {
        ModelEntry::Constant { value: v, .. } => {
            if v == value {
                out.push((path, entry));
            }
        }
        ModelEntry::Application { value: fun, .. } => {
            for arg in &fun.args {
                let mut arg_path = path.clone();
                arg_path.push(fun.name.clone());
                collect_dependent_rec(arg_path, arg, value, out);
            }
        }
        ModelEntry::Map { cases, default } => {
            let mut default_path = path.clone();
            default_path.push("default".to_string());
            collect_dependent_rec(default_path, default, value, out);
            for case in cases {
                let mut value_path = path.clone();
                value_path.push("value".to_string());
                collect_dependent_rec(value_path, &case.value, value, out);
                for (index, arg) in case.args.iter().enumerate() {
                    let mut arg_path = path.clone();
                    arg_path.push(format!("arg{index}"));
                    collect_dependent_rec(arg_path, arg, value, out);
                }
            }
        }
        ModelEntry::Function { .. } => {
            error!("unsupported model entry type: {}", entry.kind());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn constant(value: &str) -> ModelEntry {
        ModelEntry::Constant {
            value: value.to_string(),
            sort: None,
        }
    }

    #[test]
    fn deserialize_tagged_entries() {
        let model: Model = serde_json::from_value(json!({
            "x@1@2": { "type": "constant_entry", "value": "$Ref!val!0" },
            "f": {
                "type": "map_entry",
                "cases": [
                    {
                        "args": [{ "type": "constant_entry", "value": "$Ref!val!0" }],
                        "value": { "type": "constant_entry", "value": "5" }
                    }
                ],
                "default": { "type": "constant_entry", "value": "0" }
            }
        }))
        .unwrap();

        assert_eq!(model.len(), 2);
        assert_eq!(
            model.get("x@1@2").unwrap().constant_value().unwrap(),
            "$Ref!val!0"
        );
        assert_eq!(model.get("f").unwrap().kind(), "map_entry");
    }

    #[test]
    fn apply_map_entry_matches_case() {
        let map = ModelEntry::Map {
            cases: vec![ModelCase {
                args: vec![constant("s1"), constant("r1")],
                value: constant("v1"),
            }],
            default: Box::new(constant("d")),
        };

        assert_eq!(map.apply(&["s1", "r1"]).unwrap(), "v1");
        assert_eq!(map.apply(&["s2", "r1"]).unwrap(), "d");
    }

    #[test]
    fn apply_rejects_function_entries() {
        let fun = ModelEntry::Function {
            cases: vec![],
            default: Box::new(constant("d")),
        };
        assert!(matches!(
            fun.apply(&[]),
            Err(DecodeError::UnsupportedEntryKind { .. })
        ));
    }

    #[test]
    fn dependent_entries_search_all_positions() {
        let model: Model = serde_json::from_value(json!({
            "a": { "type": "constant_entry", "value": "target" },
            "b": {
                "type": "application_entry",
                "value": {
                    "name": "g",
                    "args": [{ "type": "constant_entry", "value": "target" }]
                }
            },
            "c": {
                "type": "map_entry",
                "cases": [
                    {
                        "args": [{ "type": "constant_entry", "value": "target" }],
                        "value": { "type": "constant_entry", "value": "other" }
                    }
                ],
                "default": { "type": "constant_entry", "value": "target" }
            }
        }))
        .unwrap();

        let hits = model.collect_dependent_entries("target");
        let paths: Vec<Vec<String>> = hits.into_iter().map(|(path, _)| path).collect();
        assert!(paths.contains(&vec!["a".to_string()]));
        assert!(paths.contains(&vec!["b".to_string(), "g".to_string()]));
        assert!(paths.contains(&vec!["c".to_string(), "default".to_string()]));
        assert!(paths.contains(&vec!["c".to_string(), "arg0".to_string()]));
    }
}
