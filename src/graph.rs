use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::FlowError;

/// Id of the node every new graph starts with.
pub const SEED_NODE_ID: &str = "1";
pub const SEED_NODE_LABEL: &str = "Start";

const SEED_X: f64 = 250.0;
const SEED_Y: f64 = 50.0;

const NEW_NODE_X: f64 = 150.0;
const NEW_NODE_Y_BASE: f64 = 100.0;
const NEW_NODE_Y_STEP: f64 = 70.0;

const ARRANGE_X: f64 = 100.0;
const ARRANGE_Y_BASE: f64 = 100.0;
const ARRANGE_Y_STEP: f64 = 80.0;

const EDGE_STROKE_WIDTH: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub label: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub position: Point,
    pub data: NodeData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    ArrowClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeMarker {
    #[serde(rename = "type")]
    pub kind: MarkerKind,
}

impl Default for EdgeMarker {
    fn default() -> Self {
        Self {
            kind: MarkerKind::ArrowClosed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeStyle {
    pub stroke_width: f64,
}

impl Default for EdgeStyle {
    fn default() -> Self {
        Self {
            stroke_width: EDGE_STROKE_WIDTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(default)]
    pub animated: bool,
    #[serde(default)]
    pub style: EdgeStyle,
    #[serde(default)]
    pub marker_end: EdgeMarker,
}

/// Routing endpoints supplied by the canvas when a connection gesture
/// completes. Passed through to the edge unchanged.
#[derive(Debug, Clone, Default)]
pub struct ConnectionParams {
    pub source_handle: Option<String>,
    pub target_handle: Option<String>,
}

/// The complete diagram state: ordered nodes and their edges.
///
/// Fields are private so every mutation goes through the named
/// operations below, which keep node ids unique and edges pointing at
/// live nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl Default for Graph {
    fn default() -> Self {
        Self {
            nodes: vec![Node {
                id: SEED_NODE_ID.to_string(),
                position: Point {
                    x: SEED_X,
                    y: SEED_Y,
                },
                data: NodeData {
                    label: SEED_NODE_LABEL.to_string(),
                    description: String::new(),
                },
            }],
            edges: Vec::new(),
        }
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// Appends a node with a fresh id, cascading new nodes vertically
    /// below the default layout so they do not stack on each other.
    pub fn add_node(&mut self, label: &str, description: &str) -> String {
        let id = fresh_id();
        let position = Point {
            x: NEW_NODE_X,
            y: NEW_NODE_Y_BASE + NEW_NODE_Y_STEP * self.nodes.len() as f64,
        };
        self.nodes.push(Node {
            id: id.clone(),
            position,
            data: NodeData {
                label: label.to_string(),
                description: description.to_string(),
            },
        });
        id
    }

    /// Replaces only the editable fields; id and position are kept.
    pub fn update_node(
        &mut self,
        id: &str,
        label: &str,
        description: &str,
    ) -> Result<(), FlowError> {
        let node = self
            .nodes
            .iter_mut()
            .find(|node| node.id == id)
            .ok_or_else(|| FlowError::NotFound(id.to_string()))?;
        node.data.label = label.to_string();
        node.data.description = description.to_string();
        Ok(())
    }

    pub fn move_node(&mut self, id: &str, position: Point) -> Result<(), FlowError> {
        let node = self
            .nodes
            .iter_mut()
            .find(|node| node.id == id)
            .ok_or_else(|| FlowError::NotFound(id.to_string()))?;
        node.position = position;
        Ok(())
    }

    /// Removes the node and every edge touching it. Returns false when
    /// the id is unknown.
    pub fn delete_node(&mut self, id: &str) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|node| node.id != id);
        if self.nodes.len() == before {
            return false;
        }
        self.edges
            .retain(|edge| edge.source != id && edge.target != id);
        true
    }

    /// Appends an edge between two nodes the caller has already
    /// resolved. Endpoint existence is the caller's responsibility;
    /// see [`Graph::contains`].
    pub fn connect(&mut self, source: &str, target: &str, params: ConnectionParams) -> String {
        let id = fresh_id();
        self.edges.push(Edge {
            id: id.clone(),
            source: source.to_string(),
            target: target.to_string(),
            source_handle: params.source_handle,
            target_handle: params.target_handle,
            animated: true,
            style: EdgeStyle::default(),
            marker_end: EdgeMarker::default(),
        });
        id
    }

    /// Stacks all nodes into a single vertical column in store order.
    /// Edges and ids are untouched; running it twice changes nothing.
    pub fn auto_arrange(&mut self) {
        for (index, node) in self.nodes.iter_mut().enumerate() {
            node.position = Point {
                x: ARRANGE_X,
                y: ARRANGE_Y_BASE + ARRANGE_Y_STEP * index as f64,
            };
        }
    }
}

/// A fresh process-unique identifier in canonical uuid text form.
/// Never collides with the reserved seed id.
pub fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}
