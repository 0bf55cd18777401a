// © 2020, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use log::error;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use viper_model::{decode_heap, DecodeResult, HeapChunk};

static HEAD_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)\s+(\d+):(\d+):\s+(.*)$").unwrap());

pub type RecordId = usize;

/// What kind of symbolic execution step a record describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKind {
    Execute,
    Evaluate,
    Consume,
    Produce,
    Other(String),
}

impl RecordKind {
    pub fn from_tag(tag: &str) -> RecordKind {
        match tag.to_uppercase().as_str() {
            "EXECUTE" => RecordKind::Execute,
            "EVAL" | "EVALUATE" => RecordKind::Evaluate,
            "CONSUME" => RecordKind::Consume,
            "PRODUCE" => RecordKind::Produce,
            _ => RecordKind::Other(tag.to_string()),
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordKind::Execute => write!(f, "EXECUTE"),
            RecordKind::Evaluate => write!(f, "EVAL"),
            RecordKind::Consume => write!(f, "CONSUME"),
            RecordKind::Produce => write!(f, "PRODUCE"),
            RecordKind::Other(tag) => write!(f, "{tag}"),
        }
    }
}

/// A zero-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

/// One `name -> value` binding of the symbolic store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreEntry {
    pub name: String,
    pub value: String,
}

/// The raw symbolic state a record was taken in. Heap chunks and path
/// conditions stay raw here and are decoded on demand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prestate {
    pub store: Vec<StoreEntry>,
    pub heap: Vec<Value>,
    pub old_heap: Vec<Value>,
    pub path_conditions: Vec<Value>,
}

impl Prestate {
    pub fn decode_heap(&self) -> DecodeResult<Vec<HeapChunk>> {
        decode_heap(&self.heap)
    }

    pub fn decode_old_heap(&self) -> DecodeResult<Vec<HeapChunk>> {
        decode_heap(&self.old_heap)
    }
}

/// One step of a verifiable's execution trace.
///
/// Records form a tree through `parent`/`children` and a doubly linked
/// sibling chain through `next`/`previous`; all four are indices into the
/// owning verifiable's arena, assigned once at ingestion and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub index: usize,
    pub kind: RecordKind,
    pub position: Option<SourcePosition>,
    pub formula: Option<String>,
    pub prestate: Option<Prestate>,
    pub parent: Option<RecordId>,
    pub children: Vec<RecordId>,
    pub next: Option<RecordId>,
    pub previous: Option<RecordId>,
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(position) = self.position {
            write!(f, " {}:{}", position.line, position.column)?;
        }
        if let Some(formula) = &self.formula {
            write!(f, ": {formula}")?;
        }
        Ok(())
    }
}

/// Parses a trace head line of the form `EXECUTE 12:3: x := y.f`, converting
/// the position to zero-based numbering.
pub fn parse_head_line(line: &str) -> Option<(RecordKind, SourcePosition, String)> {
    let captures = HEAD_LINE.captures(line)?;
    let kind = RecordKind::from_tag(captures.get(1).unwrap().as_str());
    let line_nr: u32 = captures.get(2).unwrap().as_str().parse().ok()?;
    let column_nr: u32 = captures.get(3).unwrap().as_str().parse().ok()?;
    let position = SourcePosition {
        line: line_nr.saturating_sub(1),
        column: column_nr.saturating_sub(1),
    };
    let formula = captures.get(4).unwrap().as_str().trim().to_string();
    Some((kind, position, formula))
}

/// A record of the trace as the backend reports it, before arena linking.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub pos: Option<String>,
    #[serde(default)]
    pub children: Vec<RawRecord>,
    #[serde(default)]
    pub prestate: Option<RawPrestate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPrestate {
    #[serde(default)]
    pub store: Vec<StoreEntry>,
    #[serde(default)]
    pub heap: Vec<Value>,
    #[serde(default, rename = "oldHeap")]
    pub old_heap: Vec<Value>,
    #[serde(default)]
    pub pcs: Vec<Value>,
}

/// One verified method, function or predicate, holding its execution trace.
#[derive(Debug, Clone, PartialEq)]
pub struct Verifiable {
    name: String,
    records: Vec<Record>,
    top_level: Vec<RecordId>,
}

impl Verifiable {
    /// Ingests a raw trace tree, assigning depth-first indices and wiring the
    /// parent/children/next/previous links.
    pub fn from_raw(name: &str, raw_records: &[RawRecord]) -> Verifiable {
        let mut verifiable = Verifiable {
            name: name.to_string(),
            records: Vec::new(),
            top_level: Vec::new(),
        };
        let mut previous: Option<RecordId> = None;
        for raw in raw_records {
            let id = verifiable.insert(raw, None);
            if let Some(previous_id) = previous {
                verifiable.records[previous_id].next = Some(id);
                verifiable.records[id].previous = Some(previous_id);
            }
            verifiable.top_level.push(id);
            previous = Some(id);
        }
        verifiable
    }

    fn insert(&mut self, raw: &RawRecord, parent: Option<RecordId>) -> RecordId {
        let (kind, position, formula) = interpret_raw(raw);
        let id = self.records.len();
        self.records.push(Record {
            index: id,
            kind,
            position,
            formula,
            prestate: raw.prestate.as_ref().map(|raw_prestate| Prestate {
                store: raw_prestate.store.clone(),
                heap: raw_prestate.heap.clone(),
                old_heap: raw_prestate.old_heap.clone(),
                path_conditions: raw_prestate.pcs.clone(),
            }),
            parent,
            children: Vec::new(),
            next: None,
            previous: None,
        });

        let mut previous: Option<RecordId> = None;
        for child in &raw.children {
            let child_id = self.insert(child, Some(id));
            self.records[id].children.push(child_id);
            if let Some(previous_id) = previous {
                self.records[previous_id].next = Some(child_id);
                self.records[child_id].previous = Some(previous_id);
            }
            previous = Some(child_id);
        }
        id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record(&self, id: RecordId) -> Option<&Record> {
        self.records.get(id)
    }

    pub fn top_level(&self) -> &[RecordId] {
        &self.top_level
    }

    /// Depth-first search for the record with the given index.
    pub fn find_index(&self, index: usize) -> Option<RecordId> {
        fn traverse(records: &[Record], id: RecordId, index: usize) -> Option<RecordId> {
            if records[id].index == index {
                return Some(id);
            }
            records[id]
                .children
                .iter()
                .find_map(|child| traverse(records, *child, index))
        }
        self.top_level
            .iter()
            .find_map(|id| traverse(&self.records, *id, index))
    }
}

fn interpret_raw(raw: &RawRecord) -> (RecordKind, Option<SourcePosition>, Option<String>) {
    if let Some(kind_tag) = &raw.kind {
        let position = raw.pos.as_deref().and_then(parse_raw_position);
        return (RecordKind::from_tag(kind_tag), position, raw.value.clone());
    }
    // No explicit kind: the record may use the head-line wire format.
    if let Some(value) = &raw.value {
        if let Some((kind, position, formula)) = parse_head_line(value) {
            return (kind, Some(position), Some(formula));
        }
        error!("could not parse first line of the trace record: '{value}'");
        return (RecordKind::Other("unknown".to_string()), None, Some(value.clone()));
    }
    (RecordKind::Other("unknown".to_string()), None, None)
}

fn parse_raw_position(pos: &str) -> Option<SourcePosition> {
    let (line, column) = pos.split_once(':')?;
    Some(SourcePosition {
        line: line.trim().parse::<u32>().ok()?.saturating_sub(1),
        column: column.trim().parse::<u32>().ok()?.saturating_sub(1),
    })
}
