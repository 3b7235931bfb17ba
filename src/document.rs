use crate::graph::Graph;
use crate::FlowError;

/// Conventional file name for exported documents.
pub const EXPORT_FILE_NAME: &str = "flow.json";

/// Serializes the graph as a pretty-printed `{nodes, edges}` document.
/// Field order is fixed by the type definitions, so the same graph
/// always produces the same bytes.
pub fn to_document(graph: &Graph) -> serde_json::Result<String> {
    let mut document = serde_json::to_string_pretty(graph)?;
    document.push('\n');
    Ok(document)
}

/// Parses a document produced by [`to_document`]. Both `nodes` and
/// `edges` must be present and no other top-level field is accepted.
pub fn from_document(source: &str) -> Result<Graph, FlowError> {
    serde_json::from_str(source).map_err(FlowError::InvalidDocument)
}

impl Graph {
    /// [`to_document`] on self.
    pub fn export(&self) -> serde_json::Result<String> {
        to_document(self)
    }

    /// Replaces the whole store with the parsed document. On parse
    /// failure the store is left exactly as it was.
    pub fn import(&mut self, source: &str) -> Result<(), FlowError> {
        let parsed = from_document(source)?;
        *self = parsed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ConnectionParams, SEED_NODE_ID};

    fn sample_graph() -> Graph {
        let mut graph = Graph::new();
        let a = graph.add_node("Fetch", "pull the data");
        let b = graph.add_node("Store", "");
        graph.connect(SEED_NODE_ID, &a, ConnectionParams::default());
        graph.connect(
            &a,
            &b,
            ConnectionParams {
                source_handle: Some("bottom".to_string()),
                target_handle: Some("top".to_string()),
            },
        );
        graph
    }

    #[test]
    fn export_import_round_trips_exactly() {
        let graph = sample_graph();
        let document = to_document(&graph).unwrap();
        let restored = from_document(&document).unwrap();
        assert_eq!(restored, graph);
    }

    #[test]
    fn export_is_stable_for_the_same_graph() {
        let graph = sample_graph();
        assert_eq!(to_document(&graph).unwrap(), to_document(&graph).unwrap());
    }

    #[test]
    fn document_contains_only_nodes_and_edges() {
        let document = to_document(&Graph::new()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&document).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert!(object.contains_key("nodes"));
        assert!(object.contains_key("edges"));
    }

    #[test]
    fn import_rejects_missing_edges_field() {
        let mut graph = sample_graph();
        let before = graph.clone();

        let err = graph.import(r#"{"nodes": []}"#).unwrap_err();
        assert!(matches!(err, FlowError::InvalidDocument(_)));
        assert_eq!(err.to_string(), "Invalid document");
        assert_eq!(graph, before, "failed import must not touch the store");
    }

    #[test]
    fn import_rejects_missing_nodes_field() {
        assert!(from_document(r#"{"edges": []}"#).is_err());
    }

    #[test]
    fn import_rejects_extra_top_level_fields() {
        assert!(from_document(r#"{"nodes": [], "edges": [], "meta": 1}"#).is_err());
    }

    #[test]
    fn import_rejects_malformed_text() {
        let mut graph = Graph::new();
        let before = graph.clone();
        assert!(graph.import("not json at all").is_err());
        assert_eq!(graph, before);
    }

    #[test]
    fn import_replaces_the_store_wholesale() {
        let mut graph = sample_graph();
        let replacement = to_document(&Graph::new()).unwrap();
        graph.import(&replacement).unwrap();
        assert_eq!(graph.nodes().len(), 1);
        assert!(graph.edges().is_empty());
    }

    // Imported files are trusted verbatim; referential integrity of
    // foreign documents is not checked on the way in.
    #[test]
    fn import_trusts_edges_in_the_document() {
        let source = r#"{
            "nodes": [],
            "edges": [{"id": "e", "source": "ghost", "target": "ghost"}]
        }"#;
        let graph = from_document(source).unwrap();
        assert_eq!(graph.edges().len(), 1);
    }
}
