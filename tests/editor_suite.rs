use std::path::Path;
use std::sync::Arc;

use flowgraph_editor::persist::{self, JsonFileAdapter, PersistenceAdapter};
use flowgraph_editor::registry::{NodeTypeDescriptor, PortSpec};
use flowgraph_editor::{
    DiagramService, Document, InlineRunner, LayoutConfig, Mutation, MutationOutcome,
    NodeTypeRegistry, RegistryError, ServiceState, Theme, ThreadedRunner, compute_layout,
};
use serde_json::json;

fn registry() -> Arc<NodeTypeRegistry> {
    let registry = NodeTypeRegistry::new();
    flowgraph_editor::nodes::register_builtins(&registry).unwrap();
    Arc::new(registry)
}

fn load_fixture(name: &str) -> Document {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    let json = std::fs::read_to_string(&path).expect("fixture read failed");
    persist::parse_document(registry(), &json).expect("fixture parse failed")
}

fn service() -> DiagramService<InlineRunner> {
    DiagramService::new(registry())
}

fn add_node(svc: &mut DiagramService<InlineRunner>, kind: &str) -> String {
    match svc
        .apply_mutation(Mutation::AddNode {
            kind: kind.to_string(),
            payload: json!({}),
        })
        .unwrap()
    {
        MutationOutcome::NodeAdded { id } => id,
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn layout_is_deterministic_for_fixture_documents() {
    for fixture in ["order_flow.json", "retry_loop.json"] {
        let document = load_fixture(fixture);
        let theme = Theme::modern();
        let config = LayoutConfig::default();
        let a = compute_layout(&document, &theme, &config).unwrap();
        let b = compute_layout(&document, &theme, &config).unwrap();
        assert_eq!(a, b, "{fixture}: nondeterministic layout");
    }
}

#[test]
fn linear_fixture_ranks_follow_the_flow() {
    let document = load_fixture("order_flow.json");
    let layout = compute_layout(&document, &Theme::modern(), &LayoutConfig::default()).unwrap();
    let rank = |id: &str| layout.rank_of(id).unwrap();
    assert!(rank("n_1") < rank("n_2"));
    assert!(rank("n_2") < rank("n_3"));
    assert!(rank("n_3") < rank("n_4"));
    assert!(rank("n_4") < rank("n_5"));
    assert!(rank("n_5") < rank("n_6"));
}

#[test]
fn retry_cycle_keeps_one_back_edge_and_routes_it_apart() {
    let document = load_fixture("retry_loop.json");
    let layout = compute_layout(&document, &Theme::modern(), &LayoutConfig::default()).unwrap();
    let back: Vec<_> = layout.edges.iter().filter(|e| e.back).collect();
    assert_eq!(back.len(), 1);
    assert_eq!(back[0].source, "n_3");
    assert_eq!(back[0].target, "n_2");
    // Back edges detour, so they carry more bends than a straight hop.
    assert!(back[0].points.len() >= 4);
}

#[test]
fn two_tasks_connected_rank_in_order() {
    let mut svc = service();
    let n1 = add_node(&mut svc, "code");
    let n2 = add_node(&mut svc, "code");
    assert_eq!(n1, "n_1");
    assert_eq!(n2, "n_2");
    svc.apply_mutation(Mutation::AddEdge {
        source: n1.clone(),
        source_port: "result".to_string(),
        target: n2.clone(),
        target_port: "data".to_string(),
    })
    .unwrap();
    svc.settle().unwrap();
    let layout = svc.current_layout().unwrap();
    assert!(layout.rank_of(&n1).unwrap() < layout.rank_of(&n2).unwrap());
}

#[test]
fn settled_layout_version_always_matches_the_document() {
    let mut svc = service();
    let mut previous: Option<String> = None;
    for step in 0..6 {
        let id = add_node(&mut svc, "code");
        if step % 2 == 0 {
            if let Some(prev) = &previous {
                svc.apply_mutation(Mutation::AddEdge {
                    source: prev.clone(),
                    source_port: "result".to_string(),
                    target: id.clone(),
                    target_port: "data".to_string(),
                })
                .unwrap();
            }
        }
        previous = Some(id);
        svc.settle().unwrap();
        assert_eq!(svc.state(), ServiceState::Idle);
        assert_eq!(svc.current_layout().unwrap().version, svc.document().version());
    }
}

#[test]
fn burst_of_mutations_notifies_once_with_the_final_state() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let mut svc = service();
    let versions = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&versions);
    svc.subscribe(move |layout| sink.borrow_mut().push(layout.version));

    for _ in 0..10 {
        add_node(&mut svc, "code");
    }
    svc.settle().unwrap();

    let seen = versions.borrow();
    assert_eq!(seen.as_slice(), &[svc.document().version()]);
    assert_eq!(svc.current_layout().unwrap().nodes.len(), 10);
}

#[test]
fn threaded_layout_discards_superseded_versions() {
    let mut svc = DiagramService::with_runner(
        Document::new(registry()),
        Theme::modern(),
        LayoutConfig::default(),
        ThreadedRunner::new(),
    );
    for _ in 0..8 {
        svc.apply_mutation(Mutation::AddNode {
            kind: "code".to_string(),
            payload: json!({}),
        })
        .unwrap();
    }
    svc.settle().unwrap();
    let layout = svc.current_layout().unwrap();
    assert_eq!(layout.version, svc.document().version());
    assert_eq!(layout.nodes.len(), 8);
}

#[test]
fn removing_a_node_cascades_and_undo_restores_everything() {
    let mut svc = service();
    let a = add_node(&mut svc, "manual_trigger");
    let b = add_node(&mut svc, "http_request");
    svc.apply_mutation(Mutation::AddEdge {
        source: a.clone(),
        source_port: "out".to_string(),
        target: b.clone(),
        target_port: "data".to_string(),
    })
    .unwrap();

    svc.apply_mutation(Mutation::RemoveNode { id: b.clone() })
        .unwrap();
    assert!(svc.document().edges().is_empty());
    assert!(svc.document().node(&b).is_none());

    svc.undo().unwrap();
    assert!(svc.document().node(&b).is_some());
    assert_eq!(svc.document().edges().len(), 1);
    // Identity survives the round trip.
    assert_eq!(svc.document().edges()[0].id, format!("{a}:out->{b}:data"));
}

#[test]
fn late_registration_after_first_document_is_frozen_out() {
    let registry = registry();
    let _document = Document::new(Arc::clone(&registry));
    let err = registry
        .register(
            NodeTypeDescriptor::new("late", "Late", "general")
                .output(PortSpec::data("out", "Out")),
        )
        .unwrap_err();
    assert!(matches!(err, RegistryError::RegistryFrozen));
}

#[test]
fn file_round_trip_survives_edit_and_relayout() {
    let mut svc = service();
    let a = add_node(&mut svc, "schedule_trigger");
    let b = add_node(&mut svc, "http_request");
    svc.apply_mutation(Mutation::AddEdge {
        source: a.clone(),
        source_port: "out".to_string(),
        target: b.clone(),
        target_port: "data".to_string(),
    })
    .unwrap();
    svc.apply_mutation(Mutation::PinPosition {
        id: b.clone(),
        position: Some((500.0, 60.0)),
    })
    .unwrap();

    let path = std::env::temp_dir().join(format!("fge-roundtrip-{}.json", std::process::id()));
    let adapter = JsonFileAdapter::new(&path);
    adapter.save(&persist::to_data(svc.document())).unwrap();

    let restored = persist::from_data(registry(), adapter.load().unwrap()).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(restored.node_count(), 2);
    assert_eq!(restored.node(&b).unwrap().pinned, Some((500.0, 60.0)));

    let layout = compute_layout(&restored, &Theme::modern(), &LayoutConfig::default()).unwrap();
    let pinned = layout.node(&b).unwrap();
    assert_eq!((pinned.x, pinned.y), (500.0, 60.0));
    assert!(pinned.pinned);
}

#[test]
fn fixture_renders_to_svg_with_labels_and_edges() {
    let document = load_fixture("order_flow.json");
    let theme = Theme::modern();
    let layout = compute_layout(&document, &theme, &LayoutConfig::default()).unwrap();
    let svg = flowgraph_editor::render_svg(
        &layout,
        &theme,
        &flowgraph_editor::config::RenderConfig::default(),
    );
    assert!(svg.contains("<svg"));
    assert!(svg.contains("</svg>"));
    assert!(svg.contains("Fetch orders"));
    assert!(svg.contains("yes"));
    assert!(svg.matches("<path").count() >= document.edges().len());
}
