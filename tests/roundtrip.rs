use flowlite::{
    Edge, EdgeLabel, ExternalCfg, FlowGraph, Node, Shape, cfg_to_flow, flow_to_source,
    graph::normalize_joins, source_to_flow,
};

fn node(id: &str, shape: Shape, title: &str) -> Node {
    Node {
        id: id.to_string(),
        shape,
        title: title.to_string(),
        source_line: None,
        x: 0.0,
        y: 0.0,
    }
}

fn edge(id: &str, from: &str, to: &str, label: Option<EdgeLabel>) -> Edge {
    Edge {
        id: id.to_string(),
        from: from.to_string(),
        to: to.to_string(),
        label,
    }
}

/// Hand-built graph for `if x > 0: a = 1 else: a = 2` and a shared print.
fn diamond() -> FlowGraph {
    FlowGraph {
        nodes: vec![
            node("start", Shape::StartEnd, "开始"),
            node("d", Shape::Decision, "x > 0"),
            node("a1", Shape::Process, "a = 1"),
            node("a2", Shape::Process, "a = 2"),
            node("p", Shape::Io, "print(a)"),
            node("end", Shape::StartEnd, "结束"),
        ],
        edges: vec![
            edge("e0", "start", "d", None),
            edge("e1", "d", "a1", Some(EdgeLabel::Yes)),
            edge("e2", "d", "a2", Some(EdgeLabel::No)),
            edge("e3", "a1", "p", None),
            edge("e4", "a2", "p", None),
            edge("e5", "p", "end", None),
        ],
    }
}

fn assert_join_invariant(graph: &FlowGraph) {
    for n in &graph.nodes {
        if n.shape != Shape::Connector {
            continue;
        }
        let ins = graph.edges.iter().filter(|e| e.to == n.id).count();
        let outs = graph.edges.iter().filter(|e| e.from == n.id).count();
        assert!(ins >= 2, "connector {} has {ins} incoming edges", n.id);
        assert_eq!(outs, 1, "connector {} has {outs} outgoing edges", n.id);
    }
}

#[test]
fn test_translation_is_deterministic() {
    let src = "i = 0\nwhile i < 10:\n  if i > 5:\n    print(i)\n  i += 1\nprint(i)";
    let first = source_to_flow(src).unwrap();
    let second = source_to_flow(src).unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    let text_a = flow_to_source(&first).text;
    let text_b = flow_to_source(&second).text;
    assert_eq!(text_a, text_b);
}

#[test]
fn test_join_invariant_holds_for_built_graphs() {
    let sources = [
        "if x > 0:\n  a = 1\nelse:\n  a = 2\nprint(a)",
        "if x > 0:\n  a = 1\nelif x < 0:\n  a = 2\nelif x == 0:\n  a = 3\nelse:\n  a = 4\nprint(a)",
        "if x > 0:\n  print(x)\nprint(1)",
        "while i < 10:\n  if i > 5:\n    i += 2\n  else:\n    i += 1\nprint(i)",
    ];
    for src in sources {
        assert_join_invariant(&source_to_flow(src).unwrap());
    }
}

#[test]
fn test_elif_chain_has_one_shared_join() {
    let src = "if x > 0:\n  a = 1\nelif x < 0:\n  a = 2\nelse:\n  a = 3\nprint(a)";
    let graph = source_to_flow(src).unwrap();
    let joins: Vec<_> = graph
        .nodes
        .iter()
        .filter(|n| n.shape == Shape::Connector)
        .collect();
    assert_eq!(joins.len(), 1);
    assert_eq!(
        graph.edges.iter().filter(|e| e.to == joins[0].id).count(),
        3
    );
}

#[test]
fn test_all_return_chain_leaves_no_join_into_end() {
    let src = "def sign(x):\n  if x > 0:\n    return 1\n  elif x < 0:\n    return -1\n  else:\n    return 0";
    let graph = source_to_flow(src).unwrap();
    let end = graph
        .nodes
        .iter()
        .find(|n| n.shape == Shape::StartEnd && n.title == "结束")
        .unwrap();
    assert!(
        !graph
            .edges
            .iter()
            .any(|e| e.from.starts_with("__join__") && e.to == end.id)
    );
}

#[test]
fn test_structuring_round_trip_recovers_if_else() {
    let outcome = flow_to_source(&diamond());
    assert!(outcome.structured);
    assert_eq!(outcome.text, "if x > 0:\n  a = 1\nelse:\n  a = 2\nprint(a)");
    assert_eq!(outcome.line_map.get("d"), Some(&1));
    assert_eq!(outcome.line_map.get("p"), Some(&5));
}

#[test]
fn test_source_survives_a_full_round_trip() {
    let src = "a = input()\nif a > 0:\n  print(a)\nelse:\n  a = helper(a)\nwhile a != 10:\n  a += 1\nprint(a)";
    let graph = source_to_flow(src).unwrap();
    let outcome = flow_to_source(&graph);
    assert!(outcome.structured);
    assert_eq!(outcome.text, src);
}

#[test]
fn test_counting_while_comes_back_as_for() {
    let src = "n = 10\ni = 0\nwhile i < n:\n  print(i)\n  i += 1";
    let graph = source_to_flow(src).unwrap();
    let outcome = flow_to_source(&graph);
    assert!(outcome.text.contains("for i in range(n):"));
    assert!(!outcome.text.contains("while"));
}

#[test]
fn test_for_source_round_trips_through_the_graph() {
    let src = "for i in range(3, 10):\n  print(i)";
    let graph = source_to_flow(src).unwrap();
    let outcome = flow_to_source(&graph);
    assert!(outcome.structured);
    assert_eq!(outcome.text, src);
}

#[test]
fn test_missing_initializer_blocks_induction_with_warning() {
    let graph = source_to_flow("n = 10\nwhile i < n:\n  print(i)\n  i += 1").unwrap();
    let outcome = flow_to_source(&graph);
    assert!(outcome.text.contains("while"));
    assert!(!outcome.text.contains("for"));
    assert!(
        outcome
            .warnings
            .iter()
            .any(|w| w.message.contains("归纳失败") && w.message.contains("初始化"))
    );
}

#[test]
fn test_join_collapse_is_idempotent() {
    let graph = source_to_flow("if x > 0:\n  a = 1\nelse:\n  a = 2\nprint(a)").unwrap();
    let normalized = normalize_joins(graph);
    let again = normalize_joins(normalized.clone());
    assert_eq!(normalized.nodes.len(), again.nodes.len());
    assert_eq!(normalized.edges.len(), again.edges.len());
}

#[test]
fn test_unstructurable_graph_still_yields_text() {
    let mut graph = diamond();
    graph.edges.push(edge("e6", "d", "end", None));
    let outcome = flow_to_source(&graph);
    assert!(!outcome.structured);
    assert!(!outcome.text.is_empty());
    assert!(!outcome.warnings.is_empty());
}

#[test]
fn test_adapted_cfg_round_trips_to_elif_text() {
    let input = r#"{
        "nodes": [
            {"id": "f", "kind": "Function", "title": "main"},
            {"id": "d1", "kind": "If", "title": "x > 0", "range": [2, 2]},
            {"id": "d2", "kind": "Elif", "title": "x < 0", "range": [4, 4]},
            {"id": "a1", "kind": "Assign", "title": "a = 1"},
            {"id": "a2", "kind": "Assign", "title": "a = 2"},
            {"id": "a3", "kind": "Assign", "title": "a = 3"},
            {"id": "p", "kind": "Call", "title": "print(a)"},
            {"id": "fe", "kind": "FunctionEnd", "title": ""}
        ],
        "edges": [
            {"id": "c0", "from": "f", "to": "d1", "kind": "Next"},
            {"id": "c1", "from": "d1", "to": "a1", "kind": "True"},
            {"id": "c2", "from": "d1", "to": "d2", "kind": "False"},
            {"id": "c3", "from": "d2", "to": "a2", "kind": "True"},
            {"id": "c4", "from": "d2", "to": "a3", "kind": "False"},
            {"id": "c5", "from": "a1", "to": "p", "kind": "Next"},
            {"id": "c6", "from": "a2", "to": "p", "kind": "Next"},
            {"id": "c7", "from": "a3", "to": "p", "kind": "Next"},
            {"id": "c8", "from": "p", "to": "fe", "kind": "Next"}
        ],
        "entryNodeId": "f",
        "exitNodeIds": ["fe"],
        "diagnostics": []
    }"#;
    let cfg: ExternalCfg = serde_json::from_str(input).unwrap();
    let adapted = cfg_to_flow(&cfg);
    assert_join_invariant(&adapted.graph);
    let outcome = flow_to_source(&adapted.graph);
    assert!(outcome.structured);
    assert_eq!(
        outcome.text,
        "if x > 0:\n  a = 1\nelif x < 0:\n  a = 2\nelse:\n  a = 3\nprint(a)"
    );
}
