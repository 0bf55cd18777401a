use lazy_static::lazy_static;
use serde_json::json;
use std::sync::Once;
use viper_debugger::{DebuggerSession, RawRecord, Session, Verifiable};
use viper_model::{Model, ViperDefinition};

static INIT: Once = Once::new();

/// Setup function that is only run once, even if called multiple times.
fn setup() {
    INIT.call_once(|| {
        env_logger::init();
    });
}

lazy_static! {
    static ref LIST_MODEL: Model = serde_json::from_value(json!({
        "x@1@2": { "type": "constant_entry", "value": "$Ref!val!3" },
        "y@1@2": { "type": "constant_entry", "value": "$Ref!val!3" },
        "$Ref.null": { "type": "constant_entry", "value": "$Ref!val!0" },
        "s@7@11": { "type": "constant_entry", "value": "$FVF<next>!val!0" },
        "$FVF.lookup_next": {
            "type": "map_entry",
            "cases": [
                {
                    "args": [
                        { "type": "constant_entry", "value": "$FVF<next>!val!0" },
                        { "type": "constant_entry", "value": "$Ref!val!3" }
                    ],
                    "value": { "type": "constant_entry", "value": "$Ref!val!0" }
                },
                {
                    "args": [
                        { "type": "constant_entry", "value": "$FVF<next>!val!0" },
                        { "type": "constant_entry", "value": "$Ref!val!0" }
                    ],
                    "value": { "type": "constant_entry", "value": "$Ref!val!3" }
                }
            ],
            "default": { "type": "constant_entry", "value": "$Ref!val!0" }
        }
    }))
    .unwrap();
    static ref LIST_DEFINITIONS: Vec<ViperDefinition> = serde_json::from_value(json!([
        {
            "name": "x",
            "location": { "start": "2:3", "end": "2:4", "file": "list.vpr" },
            "scopeStart": "global",
            "scopeEnd": "global",
            "type": { "name": "Local", "viperType": { "kind": "atomic", "typename": "Ref" } }
        },
        {
            "name": "y",
            "location": { "start": "3:3", "end": "3:4", "file": "list.vpr" },
            "scopeStart": "global",
            "scopeEnd": "global",
            "type": { "name": "Local", "viperType": { "kind": "atomic", "typename": "Ref" } }
        },
        {
            "name": "next",
            "location": { "start": "1:1", "end": "1:11", "file": "list.vpr" },
            "scopeStart": "global",
            "scopeEnd": "global",
            "type": { "name": "Field", "viperType": { "kind": "atomic", "typename": "Ref" } }
        }
    ]))
    .unwrap();
}

#[test]
fn aliased_variables_share_one_node() {
    setup();

    let mut session = Session::new(
        "silicon",
        LIST_MODEL.clone(),
        LIST_DEFINITIONS.clone(),
    )
    .unwrap();
    let graph_model = session.produce_graph_model().unwrap();

    // x, y and the null reference.
    assert_eq!(graph_model.graph.node_ids.len(), 3);

    let x = graph_model
        .nodes
        .iter()
        .find(|node| node.name == "x@1@2")
        .unwrap();
    let y = graph_model
        .nodes
        .iter()
        .find(|node| node.name == "y@1@2")
        .unwrap();
    let null = graph_model
        .nodes
        .iter()
        .find(|node| node.name == "$Ref.null")
        .unwrap();

    let class = graph_model.equivalence_classes.get("$Ref!val!3").unwrap();
    assert!(class.contains(&x.id) && class.contains(&y.id));

    // Resolving the successor of the null node lands on the aliased value;
    // one node (the lexicographically first) is reused for both variables.
    let null_successor = graph_model
        .fields
        .iter()
        .find(|relation| relation.pred == null.id)
        .unwrap()
        .succ;
    assert_eq!(null_successor, x.id);

    // Both aliased variables point to null.
    for variable in [x, y] {
        let successor = graph_model
            .fields
            .iter()
            .find(|relation| relation.pred == variable.id)
            .unwrap()
            .succ;
        assert_eq!(successor, null.id);
    }
}

#[test]
fn decoding_is_idempotent() {
    setup();

    let mut first = Session::new(
        "silicon",
        LIST_MODEL.clone(),
        LIST_DEFINITIONS.clone(),
    )
    .unwrap();
    let mut second = Session::new(
        "silicon",
        LIST_MODEL.clone(),
        LIST_DEFINITIONS.clone(),
    )
    .unwrap();

    assert_eq!(first.atoms(), second.atoms());
    assert_eq!(first.states(), second.states());
    assert_eq!(
        first.produce_graph_model().unwrap(),
        second.produce_graph_model().unwrap()
    );
}

#[test]
fn trace_navigation_with_on_demand_heap_decoding() {
    setup();

    let raw: Vec<RawRecord> = serde_json::from_value(json!([
        {
            "kind": "execute",
            "value": "y := x",
            "pos": "5:3",
            "prestate": {
                "store": [
                    { "name": "x", "value": "$Ref!val!3" }
                ],
                "heap": [
                    {
                        "type": "basic_field_chunk",
                        "field": "next",
                        "receiver": { "type": "constant_entry", "value": "$Ref!val!3" },
                        "snap": { "type": "constant_entry", "value": "$Ref!val!0" },
                        "perm": { "type": "constant_entry", "value": "1.0" }
                    }
                ]
            },
            "children": [
                { "kind": "eval", "value": "x" }
            ]
        },
        { "kind": "execute", "value": "assert y == x" }
    ]))
    .unwrap();

    let verifiable = Verifiable::from_raw("list_reverse", &raw);
    let session = DebuggerSession::new(vec![verifiable]).unwrap();

    // The heap snapshot of the current record decodes on demand.
    let prestate = session.current_record().prestate.clone().unwrap();
    let heap = prestate.decode_heap().unwrap();
    assert_eq!(heap.len(), 1);
    assert_eq!(
        heap[0].to_string(),
        "$Ref!val!3.next: ? -> $Ref!val!0 # 1.0"
    );

    // Walking forward skips into the child chain only on request.
    assert!(session.has_next());
    session.go_to_next_state().unwrap();
    assert_eq!(session.current_record().formula.as_deref(), Some("assert y == x"));
    assert!(!session.has_next());

    session.go_to_prev_state().unwrap();
    session.go_to_child_state().unwrap();
    assert_eq!(session.current_record().formula.as_deref(), Some("x"));
}
