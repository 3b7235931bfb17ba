use anyhow::Result;
use flowpad::{document, ConnectionParams, EditSession, Graph, SaveOutcome};

#[test]
fn editing_session_builds_a_graph_that_round_trips() -> Result<()> {
    let mut graph = Graph::new();
    let mut session = EditSession::new();

    session.open_new();
    let buffer = session.buffer_mut().expect("form should be open");
    buffer.label = "Fetch".to_string();
    buffer.description = "pull the data".to_string();
    let SaveOutcome::Added(fetch_id) = session.save(&mut graph)? else {
        panic!("expected a new node");
    };

    graph.connect(
        "1",
        &fetch_id,
        ConnectionParams {
            source_handle: Some("bottom".to_string()),
            target_handle: Some("top".to_string()),
        },
    );

    let exported = document::to_document(&graph)?;
    let restored = document::from_document(&exported)?;
    assert_eq!(restored, graph);

    Ok(())
}

#[test]
fn failed_import_preserves_unsaved_work() -> Result<()> {
    let mut graph = Graph::new();
    graph.add_node("unsaved", "");
    let before = graph.clone();

    assert!(graph.import(r#"{"nodes": []}"#).is_err());
    assert_eq!(graph, before);

    let replacement = document::to_document(&Graph::new())?;
    graph.import(&replacement)?;
    assert_eq!(graph.nodes().len(), 1, "import replaces, never merges");

    Ok(())
}

#[test]
fn deleting_the_edited_node_keeps_edges_consistent() -> Result<()> {
    let mut graph = Graph::new();
    let a = graph.add_node("A", "");
    let b = graph.add_node("B", "");
    graph.connect("1", &a, ConnectionParams::default());
    graph.connect(&a, &b, ConnectionParams::default());

    let mut session = EditSession::new();
    session.open_existing(&graph, &a)?;
    session.delete(&mut graph)?;

    for edge in graph.edges() {
        assert!(graph.contains(&edge.source));
        assert!(graph.contains(&edge.target));
    }
    assert_eq!(graph.edges().len(), 0);

    Ok(())
}
