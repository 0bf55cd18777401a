// © 2020, ETH Zurich
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::{
    errors::{SessionError, SessionResult},
    graph::{EquivClasses, Graph, GraphModel, Node, NodeId, Relation},
    strategy::{strategy_for, BackendStrategy},
    types::{StaticTypes, TypeCache, ViperType},
};
use log::warn;
use rustc_hash::FxHashMap;
use std::rc::Rc;
use viper_model::{Model, ModelEntry, VerificationBackend, ViperDefinition};

/// One inspection session over a raw model and the verified program's
/// declarations.
///
/// The session owns every cache involved in decoding; nothing is shared
/// between sessions and node ids are never reused within one.
pub struct Session {
    backend: VerificationBackend,
    model: Model,
    definitions: Vec<ViperDefinition>,
    strategy: Box<dyn BackendStrategy>,
    type_cache: TypeCache,
    static_types: StaticTypes,
    states: Vec<String>,
    /// Node arena: the atoms extracted from the model followed by any nodes
    /// synthesized for fresh heap values. A node's id is its index.
    nodes: Vec<Node>,
    /// How many of `nodes` are atoms (top-level model constants).
    atom_count: usize,
    /// Equivalence classes over all nodes, extended as fresh values are
    /// discovered.
    equiv_classes: EquivClasses,
}

impl Session {
    /// Creates a session from the backend tag reported by the host tool.
    pub fn new(
        backend_tag: &str,
        model: Model,
        definitions: Vec<ViperDefinition>,
    ) -> SessionResult<Session> {
        let backend = VerificationBackend::from_tag(backend_tag)
            .ok_or_else(|| SessionError::UnknownBackend(backend_tag.to_string()))?;
        Session::with_backend(backend, model, definitions)
    }

    pub fn with_backend(
        backend: VerificationBackend,
        model: Model,
        definitions: Vec<ViperDefinition>,
    ) -> SessionResult<Session> {
        if model.is_empty() {
            return Err(SessionError::InvalidModel(
                "model contains no entries".to_string(),
            ));
        }

        let mut type_cache = TypeCache::new();
        let static_types = StaticTypes::harvest(&definitions, &mut type_cache)?;
        let strategy = strategy_for(backend, &model, &mut type_cache)?;

        let states = model
            .iter_sorted()
            .filter(|(name, entry)| strategy.is_state_entry(name, entry))
            .filter_map(|(_, entry)| entry.constant_value().ok().map(str::to_string))
            .collect();

        // Extract the atoms: every top-level constant of the model becomes a
        // candidate node.
        let mut nodes = Vec::new();
        for (name, entry) in model.iter_sorted() {
            if let ModelEntry::Constant { value, .. } = entry {
                let typ = static_types.lookup(strategy.strip_decoration(name));
                nodes.push(Node {
                    name: name.clone(),
                    typ,
                    id: nodes.len(),
                    val: value.clone(),
                    proto: None,
                });
            }
        }
        let atom_count = nodes.len();
        let equiv_classes = EquivClasses::from_nodes(nodes.iter());

        Ok(Session {
            backend,
            model,
            definitions,
            strategy,
            type_cache,
            static_types,
            states,
            nodes,
            atom_count,
            equiv_classes,
        })
    }

    pub fn backend(&self) -> VerificationBackend {
        self.backend
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// The program states found in the model, in symbol order.
    pub fn states(&self) -> &[String] {
        &self.states
    }

    /// The atoms extracted from the model (excluding synthesized nodes).
    pub fn atoms(&self) -> &[Node] {
        &self.nodes[..self.atom_count]
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// The statically declared type of a model symbol, after stripping the
    /// backend's state decoration.
    pub fn type_of_symbol(&self, symbol: &str) -> Option<Rc<ViperType>> {
        self.static_types
            .lookup(self.strategy.strip_decoration(symbol))
    }

    /// The dynamically inferred type of a model value. Memoized: the same
    /// value always yields the same type instance within this session.
    pub fn type_of_value(&mut self, value: &str) -> Rc<ViperType> {
        self.strategy.type_of_value(value)
    }

    /// Resolves a canonical type representation through the session's
    /// interning cache.
    pub fn resolve_type(&mut self, repr: &str) -> Rc<ViperType> {
        self.type_cache.resolve(repr)
    }

    /// Builds the graph model for the current model: graph nodes, field
    /// relations and equivalence classes. Called anew for every inspected
    /// step; the caller discards the previous result.
    pub fn produce_graph_model(&mut self) -> SessionResult<GraphModel> {
        let node_ids = self.collect_graph_nodes();
        let fields = self.collect_fields(&node_ids)?;
        let graph = Graph {
            name: "G".to_string(),
            node_ids,
        };
        let equivalence_classes = EquivClasses::from_nodes(self.nodes.iter());
        Ok(GraphModel {
            graph,
            nodes: self.nodes.clone(),
            fields,
            edges: vec![],
            paths: vec![],
            equivalence_classes,
        })
    }

    fn definition_names(&self, kind: &str) -> Vec<String> {
        self.definitions
            .iter()
            .filter(|definition| definition.kind_name() == kind)
            .map(|definition| definition.name.clone())
            .collect()
    }

    /// The subset of atoms denoting program variables, arguments, or the
    /// null reference. Some declared names may legitimately be absent in a
    /// given state; that is reported as a warning, not an error.
    fn collect_graph_nodes(&mut self) -> Vec<NodeId> {
        let mut names = self.definition_names("Local");
        names.extend(self.definition_names("Argument"));
        names.push(self.strategy.null_ref_name().to_string());

        let mut ids = Vec::new();
        for proto in &names {
            for id in 0..self.atom_count {
                if !symbol_matches_proto(&self.nodes[id].name, proto) {
                    continue;
                }
                if !ids.contains(&id) {
                    self.nodes[id].proto = Some(proto.clone());
                    ids.push(id);
                }
            }
        }

        if ids.len() < names.len() {
            warn!(
                "could not find definitions for some graph nodes in raw model \
                 ({} expected, {} found)",
                names.len(),
                ids.len()
            );
        }
        ids
    }

    fn collect_fields(&mut self, node_ids: &[NodeId]) -> SessionResult<Vec<Relation>> {
        let field_names = self.definition_names("Field");

        // Resolve the lookup tables first; the arena is only mutated
        // afterwards, when successors get resolved.
        let mut lookups = Vec::new();
        for field in &field_names {
            let relation_name = self.strategy.field_lookup_relation(field);
            let entry = self.model.get(&relation_name).ok_or_else(|| {
                SessionError::MissingFieldRelation {
                    field: field.clone(),
                    relation: relation_name.clone(),
                }
            })?;
            let (cases, default) = match entry {
                ModelEntry::Map { cases, default } => (cases.as_slice(), default.as_ref()),
                other => {
                    return Err(SessionError::MalformedFieldRelation {
                        field: field.clone(),
                        relation: relation_name,
                        actual: other.kind().to_string(),
                    })
                }
            };
            let field_tag = self.strategy.field_tag(&self.model, field)?;
            for &node_id in node_ids {
                let receiver = self.nodes[node_id].val.clone();
                let table =
                    partially_apply_field_map(cases, default, &receiver, field_tag.as_deref())?;
                for state in &self.states {
                    let value = table.value_in(state).to_string();
                    lookups.push((field.clone(), state.clone(), node_id, value));
                }
            }
        }

        let mut relations = Vec::new();
        for (field, state, node_id, value) in lookups {
            let succ = self.resolve_successor(node_id, &field, &state, &value);
            relations.push(Relation {
                name: field,
                state,
                pred: node_id,
                succ,
            });
        }
        Ok(relations)
    }

    /// Maps a looked-up inner value back to a node, reusing the equivalence
    /// classes. A value with no backing atom is fresh: a node is synthesized
    /// for it and registered for reuse by later lookups.
    fn resolve_successor(
        &mut self,
        pred: NodeId,
        field: &str,
        state: &str,
        value: &str,
    ) -> NodeId {
        if let Some(ids) = self.equiv_classes.get(value) {
            if ids.len() > 1 {
                warn!(
                    "multiple values are possible for {}.{field}; \
                     perhaps there are multiple program states involved?",
                    self.nodes[pred].name
                );
            }
            // Deterministic tie-break: the lexicographically first atom name.
            return *ids
                .iter()
                .min_by_key(|id| &self.nodes[**id].name)
                .unwrap();
        }

        let name = format!("{}.{field}", self.nodes[pred].name);
        warn!("no atom found for value '{value}' of {name} in state {state}");
        let typ = match self
            .static_types
            .lookup(self.strategy.strip_decoration(&name))
        {
            Some(typ) => Some(typ),
            None => Some(self.strategy.type_of_value(value)),
        };
        let id = self.nodes.len();
        self.nodes.push(Node {
            name,
            typ,
            id,
            val: value.to_string(),
            proto: None,
        });
        self.equiv_classes.add(value, id);
        id
    }
}

/// A symbol denotes a declared name if it is the name itself or the name
/// followed by the backend's `@...` decoration.
fn symbol_matches_proto(symbol: &str, proto: &str) -> bool {
    if symbol == proto {
        return true;
    }
    match symbol.strip_prefix(proto) {
        Some(rest) => rest.starts_with('@'),
        None => false,
    }
}

/// A field lookup map partially applied to a receiver (and field tag):
/// what remains is a function of the program state.
struct PartialFieldMap {
    values: FxHashMap<String, String>,
    default: String,
}

impl PartialFieldMap {
    fn value_in(&self, state: &str) -> &str {
        match self.values.get(state) {
            Some(value) => value,
            None => &self.default,
        }
    }
}

fn partially_apply_field_map(
    cases: &[viper_model::ModelCase],
    default: &ModelEntry,
    receiver: &str,
    field_tag: Option<&str>,
) -> SessionResult<PartialFieldMap> {
    let arity = if field_tag.is_some() { 3 } else { 2 };
    let mut values = FxHashMap::default();
    for case in cases {
        if case.args.len() < arity {
            continue;
        }
        let state = case.args[0].constant_value()?;
        let first = case.args[1].constant_value()?;
        let matched = match field_tag {
            Some(tag) => first == receiver && case.args[2].constant_value()? == tag,
            None => first == receiver,
        };
        if matched {
            values.insert(state.to_string(), case.value.constant_value()?.to_string());
        }
    }

    Ok(PartialFieldMap {
        values,
        default: default.constant_value()?.to_string(),
    })
}
