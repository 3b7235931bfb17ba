pub mod document;
pub mod editor;
pub mod graph;
#[cfg(feature = "server")]
pub mod serve;

pub use document::{from_document, to_document, EXPORT_FILE_NAME};
pub use editor::{EditBuffer, EditSession, SaveOutcome};
pub use graph::{
    ConnectionParams, Edge, EdgeMarker, EdgeStyle, Graph, MarkerKind, Node, NodeData, Point,
};

use thiserror::Error;

/// Errors surfaced by graph mutations, the edit session and the codec.
#[derive(Debug, Error)]
pub enum FlowError {
    /// A save was attempted with a blank (or whitespace-only) label.
    #[error("Label is required")]
    EmptyLabel,
    /// An operation referenced a node id that is not in the store.
    #[error("node '{0}' not found")]
    NotFound(String),
    /// The imported text did not parse as a `{nodes, edges}` document.
    #[error("Invalid document")]
    InvalidDocument(#[source] serde_json::Error),
    /// A session operation was invoked without a matching open state.
    #[error("no node is being edited")]
    SessionClosed,
}
