use tracing::warn;

use crate::graph::Graph;
use crate::FlowError;

/// Working copy of a node's editable fields while the edit form is
/// open. Nothing here reaches the graph until [`EditSession::save`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditBuffer {
    pub id: String,
    pub label: String,
    pub description: String,
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Closed,
    AddingNew(EditBuffer),
    EditingExisting(EditBuffer),
}

/// What a successful save did to the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Added(String),
    Updated(String),
    /// The edited node vanished before the save landed; the edits
    /// were dropped and the session closed.
    Skipped(String),
}

/// The modal create/edit workflow over a single node.
///
/// Opens on an add action or a node activation, buffers the user's
/// input, and commits through the graph's mutation operations only
/// when a valid save arrives.
#[derive(Debug, Default)]
pub struct EditSession {
    state: State,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.state, State::Closed)
    }

    /// True while an existing node is being edited, which is the only
    /// state in which delete is offered.
    pub fn is_editing(&self) -> bool {
        matches!(self.state, State::EditingExisting(_))
    }

    pub fn buffer(&self) -> Option<&EditBuffer> {
        match &self.state {
            State::Closed => None,
            State::AddingNew(buffer) | State::EditingExisting(buffer) => Some(buffer),
        }
    }

    pub fn buffer_mut(&mut self) -> Option<&mut EditBuffer> {
        match &mut self.state {
            State::Closed => None,
            State::AddingNew(buffer) | State::EditingExisting(buffer) => Some(buffer),
        }
    }

    /// Opens the form with an empty buffer for a brand new node.
    pub fn open_new(&mut self) {
        self.state = State::AddingNew(EditBuffer::default());
    }

    /// Opens the form populated from an existing node, e.g. after the
    /// canvas reports a node activation.
    pub fn open_existing(&mut self, graph: &Graph, id: &str) -> Result<(), FlowError> {
        let node = graph
            .node(id)
            .ok_or_else(|| FlowError::NotFound(id.to_string()))?;
        self.state = State::EditingExisting(EditBuffer {
            id: node.id.clone(),
            label: node.data.label.clone(),
            description: node.data.description.clone(),
        });
        Ok(())
    }

    /// Discards the buffer without touching the graph.
    pub fn cancel(&mut self) {
        self.state = State::Closed;
    }

    /// Validates the buffer and commits it. A blank label keeps the
    /// session open and returns [`FlowError::EmptyLabel`]; otherwise
    /// the session closes whatever the graph reported.
    pub fn save(&mut self, graph: &mut Graph) -> Result<SaveOutcome, FlowError> {
        let outcome = match std::mem::take(&mut self.state) {
            State::Closed => return Err(FlowError::SessionClosed),
            State::AddingNew(buffer) => {
                if buffer.label.trim().is_empty() {
                    self.state = State::AddingNew(buffer);
                    return Err(FlowError::EmptyLabel);
                }
                let id = graph.add_node(&buffer.label, &buffer.description);
                SaveOutcome::Added(id)
            }
            State::EditingExisting(buffer) => {
                if buffer.label.trim().is_empty() {
                    self.state = State::EditingExisting(buffer);
                    return Err(FlowError::EmptyLabel);
                }
                match graph.update_node(&buffer.id, &buffer.label, &buffer.description) {
                    Ok(()) => SaveOutcome::Updated(buffer.id),
                    Err(FlowError::NotFound(id)) => {
                        warn!(node = %id, "edited node no longer exists, dropping the edits");
                        SaveOutcome::Skipped(id)
                    }
                    Err(err) => return Err(err),
                }
            }
        };
        Ok(outcome)
    }

    /// Deletes the node under edit and closes the session. Only valid
    /// while editing an existing node.
    pub fn delete(&mut self, graph: &mut Graph) -> Result<String, FlowError> {
        match std::mem::take(&mut self.state) {
            State::EditingExisting(buffer) => {
                if !graph.delete_node(&buffer.id) {
                    warn!(node = %buffer.id, "node under edit no longer exists");
                }
                Ok(buffer.id)
            }
            other => {
                self.state = other;
                Err(FlowError::SessionClosed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ConnectionParams, SEED_NODE_ID};

    #[test]
    fn add_flow_commits_on_save() {
        let mut graph = Graph::new();
        let mut session = EditSession::new();

        session.open_new();
        assert!(session.is_open());
        assert!(!session.is_editing());

        let buffer = session.buffer_mut().unwrap();
        buffer.label = "Review".to_string();
        buffer.description = "second pass".to_string();

        let outcome = session.save(&mut graph).unwrap();
        let SaveOutcome::Added(id) = outcome else {
            panic!("expected an added node");
        };
        assert!(!session.is_open());
        assert_eq!(graph.node(&id).unwrap().data.label, "Review");
    }

    #[test]
    fn whitespace_label_is_rejected_and_session_stays_open() {
        let mut graph = Graph::new();
        let before = graph.clone();
        let mut session = EditSession::new();

        session.open_new();
        session.buffer_mut().unwrap().label = "   ".to_string();

        let err = session.save(&mut graph).unwrap_err();
        assert!(matches!(err, FlowError::EmptyLabel));
        assert_eq!(err.to_string(), "Label is required");
        assert!(session.is_open(), "rejected save must not close the form");
        assert_eq!(graph, before, "rejected save must not touch the store");

        // The user can fix the label and save again.
        session.buffer_mut().unwrap().label = "ok".to_string();
        session.save(&mut graph).unwrap();
        assert_eq!(graph.nodes().len(), 2);
    }

    #[test]
    fn edit_flow_populates_buffer_and_updates() {
        let mut graph = Graph::new();
        let mut session = EditSession::new();

        session.open_existing(&graph, SEED_NODE_ID).unwrap();
        assert!(session.is_editing());
        assert_eq!(session.buffer().unwrap().label, "Start");

        session.buffer_mut().unwrap().label = "Begin".to_string();
        let outcome = session.save(&mut graph).unwrap();
        assert_eq!(outcome, SaveOutcome::Updated(SEED_NODE_ID.to_string()));
        assert_eq!(graph.node(SEED_NODE_ID).unwrap().data.label, "Begin");
    }

    #[test]
    fn open_existing_on_unknown_id_fails() {
        let graph = Graph::new();
        let mut session = EditSession::new();
        assert!(session.open_existing(&graph, "missing").is_err());
        assert!(!session.is_open());
    }

    #[test]
    fn cancel_discards_the_buffer() {
        let mut graph = Graph::new();
        let before = graph.clone();
        let mut session = EditSession::new();

        session.open_existing(&graph, SEED_NODE_ID).unwrap();
        session.buffer_mut().unwrap().label = "thrown away".to_string();
        session.cancel();

        assert!(!session.is_open());
        assert_eq!(graph, before);
    }

    #[test]
    fn save_against_a_vanished_node_closes_as_a_noop() {
        let mut graph = Graph::new();
        let mut session = EditSession::new();

        session.open_existing(&graph, SEED_NODE_ID).unwrap();
        graph.delete_node(SEED_NODE_ID);

        session.buffer_mut().unwrap().label = "orphan".to_string();
        let outcome = session.save(&mut graph).unwrap();
        assert_eq!(outcome, SaveOutcome::Skipped(SEED_NODE_ID.to_string()));
        assert!(!session.is_open());
        assert!(graph.nodes().is_empty());
    }

    #[test]
    fn delete_cascades_and_closes() {
        let mut graph = Graph::new();
        let other = graph.add_node("B", "");
        graph.connect(SEED_NODE_ID, &other, ConnectionParams::default());

        let mut session = EditSession::new();
        session.open_existing(&graph, SEED_NODE_ID).unwrap();
        let deleted = session.delete(&mut graph).unwrap();

        assert_eq!(deleted, SEED_NODE_ID);
        assert!(!session.is_open());
        assert_eq!(graph.nodes().len(), 1);
        assert!(graph.edges().is_empty());
    }

    #[test]
    fn delete_is_not_available_while_adding() {
        let mut graph = Graph::new();
        let mut session = EditSession::new();

        session.open_new();
        let err = session.delete(&mut graph).unwrap_err();
        assert!(matches!(err, FlowError::SessionClosed));
        assert!(session.is_open(), "misplaced delete must not lose the buffer");
    }

    #[test]
    fn save_without_a_session_is_an_error() {
        let mut graph = Graph::new();
        let mut session = EditSession::new();
        assert!(session.save(&mut graph).is_err());
    }
}
