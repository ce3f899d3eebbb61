use crate::registry::{NodeTypeRegistry, PortSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid edge endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("duplicate edge: {0}")]
    DuplicateEdge(String),
    #[error("incompatible ports: {0} -> {1}")]
    IncompatiblePorts(String, String),
    #[error("unknown node kind: {0}")]
    UnknownKind(String),
    #[error("duplicate node id: {0}")]
    DuplicateNodeId(String),
}

/// A node instance. Port lists are copied from the descriptor at creation so
/// the document stays self-describing even when handed to the layout or
/// interaction layers without the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: String,
    pub label: String,
    pub width: f32,
    pub height: f32,
    pub inputs: Vec<PortSpec>,
    pub outputs: Vec<PortSpec>,
    /// Manual position override set by drag gestures. Pinned nodes keep this
    /// position across layout recomputations.
    pub pinned: Option<(f32, f32)>,
    /// Host-defined data; opaque to the editor core.
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub source_port: String,
    pub target: String,
    pub target_port: String,
    pub label: Option<String>,
}

impl Edge {
    /// Deterministic edge id derived from its endpoints, so identical
    /// connections collide instead of accumulating.
    pub fn derive_id(source: &str, source_port: &str, target: &str, target_port: &str) -> String {
        format!("{source}:{source_port}->{target}:{target_port}")
    }

    pub fn involves(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// The editable graph document: nodes, edges, and a version counter bumped on
/// every successful mutation. Mutations are all-or-nothing; a failed call
/// leaves the document (and the version) untouched.
#[derive(Debug, Clone)]
pub struct Document {
    registry: Arc<NodeTypeRegistry>,
    nodes: BTreeMap<String, Node>,
    node_order: Vec<String>,
    edges: Vec<Edge>,
    version: u64,
    id_counter: u64,
}

impl Document {
    /// Attaching a document freezes the registry: from this point on the kind
    /// set is fixed and late registrations fail with `RegistryFrozen`.
    pub fn new(registry: Arc<NodeTypeRegistry>) -> Self {
        registry.freeze();
        Self {
            registry,
            nodes: BTreeMap::new(),
            node_order: Vec::new(),
            edges: Vec::new(),
            version: 0,
            id_counter: 0,
        }
    }

    pub fn registry(&self) -> &Arc<NodeTypeRegistry> {
        &self.registry
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Nodes in insertion order. Layout depends on this order being stable.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.node_order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add_node(
        &mut self,
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<String, GraphError> {
        let descriptor = self
            .registry
            .resolve(kind)
            .map_err(|_| GraphError::UnknownKind(kind.to_string()))?;
        self.id_counter += 1;
        let id = format!("n_{}", self.id_counter);
        let node = Node {
            id: id.clone(),
            kind: descriptor.kind.clone(),
            label: descriptor.label.clone(),
            width: descriptor.default_size.w,
            height: descriptor.default_size.h,
            inputs: descriptor.inputs.clone(),
            outputs: descriptor.outputs.clone(),
            pinned: None,
            payload,
        };
        self.nodes.insert(id.clone(), node);
        self.node_order.push(id.clone());
        self.version += 1;
        Ok(id)
    }

    /// Reinsert a previously removed node with its original id. Used by
    /// undo and by document loading, where ids come from outside.
    pub fn restore_node(&mut self, node: Node) -> Result<(), GraphError> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNodeId(node.id));
        }
        if !self.registry.contains(&node.kind) {
            return Err(GraphError::UnknownKind(node.kind));
        }
        // Keep generated ids from colliding with restored ones.
        if let Some(numeric) = node.id.strip_prefix("n_").and_then(|s| s.parse::<u64>().ok()) {
            self.id_counter = self.id_counter.max(numeric);
        }
        self.node_order.push(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
        self.version += 1;
        Ok(())
    }

    /// Removes a node and every incident edge. Returns the node together with
    /// the removed edges so callers (undo) can restore the exact state.
    pub fn remove_node(&mut self, id: &str) -> Result<(Node, Vec<Edge>), GraphError> {
        let node = self
            .nodes
            .remove(id)
            .ok_or_else(|| GraphError::NotFound(id.to_string()))?;
        self.node_order.retain(|n| n != id);
        let mut removed_edges = Vec::new();
        self.edges.retain(|edge| {
            if edge.involves(id) {
                removed_edges.push(edge.clone());
                false
            } else {
                true
            }
        });
        self.version += 1;
        Ok((node, removed_edges))
    }

    pub fn add_edge(
        &mut self,
        source: &str,
        source_port: &str,
        target: &str,
        target_port: &str,
    ) -> Result<String, GraphError> {
        let source_node = self
            .nodes
            .get(source)
            .ok_or_else(|| GraphError::InvalidEndpoint(source.to_string()))?;
        let target_node = self
            .nodes
            .get(target)
            .ok_or_else(|| GraphError::InvalidEndpoint(target.to_string()))?;
        if source == target {
            return Err(GraphError::InvalidEndpoint(format!(
                "self-edge on {source}"
            )));
        }
        let out_port = source_node
            .outputs
            .iter()
            .find(|p| p.key == source_port)
            .ok_or_else(|| GraphError::InvalidEndpoint(format!("{source}:{source_port}")))?;
        let in_port = target_node
            .inputs
            .iter()
            .find(|p| p.key == target_port)
            .ok_or_else(|| GraphError::InvalidEndpoint(format!("{target}:{target_port}")))?;
        if !out_port.socket.connects_to(in_port.socket) {
            return Err(GraphError::IncompatiblePorts(
                format!("{source}:{source_port}"),
                format!("{target}:{target_port}"),
            ));
        }
        let id = Edge::derive_id(source, source_port, target, target_port);
        if self.edges.iter().any(|e| e.id == id) {
            return Err(GraphError::DuplicateEdge(id));
        }
        self.edges.push(Edge {
            id: id.clone(),
            source: source.to_string(),
            source_port: source_port.to_string(),
            target: target.to_string(),
            target_port: target_port.to_string(),
            label: None,
        });
        self.version += 1;
        Ok(id)
    }

    /// Reinsert a removed edge verbatim. Endpoints must still exist.
    pub fn restore_edge(&mut self, edge: Edge) -> Result<(), GraphError> {
        if !self.nodes.contains_key(&edge.source) {
            return Err(GraphError::InvalidEndpoint(edge.source));
        }
        if !self.nodes.contains_key(&edge.target) {
            return Err(GraphError::InvalidEndpoint(edge.target));
        }
        if self.edges.iter().any(|e| e.id == edge.id) {
            return Err(GraphError::DuplicateEdge(edge.id));
        }
        self.edges.push(edge);
        self.version += 1;
        Ok(())
    }

    pub fn remove_edge(&mut self, id: &str) -> Result<Edge, GraphError> {
        let index = self
            .edges
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| GraphError::NotFound(id.to_string()))?;
        let edge = self.edges.remove(index);
        self.version += 1;
        Ok(edge)
    }

    pub fn set_edge_label(
        &mut self,
        id: &str,
        label: Option<String>,
    ) -> Result<Option<String>, GraphError> {
        let edge = self
            .edges
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| GraphError::NotFound(id.to_string()))?;
        let previous = std::mem::replace(&mut edge.label, label);
        self.version += 1;
        Ok(previous)
    }

    pub fn set_label(&mut self, id: &str, label: &str) -> Result<String, GraphError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::NotFound(id.to_string()))?;
        let previous = std::mem::replace(&mut node.label, label.to_string());
        self.version += 1;
        Ok(previous)
    }

    pub fn set_payload(
        &mut self,
        id: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, GraphError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::NotFound(id.to_string()))?;
        let previous = std::mem::replace(&mut node.payload, payload);
        self.version += 1;
        Ok(previous)
    }

    /// Pin or unpin a node's position. Returns the previous pin.
    pub fn set_pinned_position(
        &mut self,
        id: &str,
        position: Option<(f32, f32)>,
    ) -> Result<Option<(f32, f32)>, GraphError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::NotFound(id.to_string()))?;
        let previous = std::mem::replace(&mut node.pinned, position);
        self.version += 1;
        Ok(previous)
    }

    /// Edges incident to a node.
    pub fn edges_for(&self, node_id: &str) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.involves(node_id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::register_builtins;
    use serde_json::json;

    fn document() -> Document {
        let registry = NodeTypeRegistry::new();
        register_builtins(&registry).unwrap();
        Document::new(Arc::new(registry))
    }

    #[test]
    fn add_node_assigns_sequential_ids_and_bumps_version() {
        let mut doc = document();
        assert_eq!(doc.version(), 0);
        let a = doc.add_node("code", json!({})).unwrap();
        let b = doc.add_node("code", json!({})).unwrap();
        assert_eq!(a, "n_1");
        assert_eq!(b, "n_2");
        assert_eq!(doc.version(), 2);
    }

    #[test]
    fn unknown_kind_is_rejected_without_side_effects() {
        let mut doc = document();
        let err = doc.add_node("bogus", json!({})).unwrap_err();
        assert_eq!(err, GraphError::UnknownKind("bogus".to_string()));
        assert!(doc.is_empty());
        assert_eq!(doc.version(), 0);
    }

    #[test]
    fn edge_to_missing_node_leaves_document_unchanged() {
        let mut doc = document();
        let a = doc.add_node("code", json!({})).unwrap();
        let version = doc.version();
        let err = doc.add_edge(&a, "result", "ghost", "data").unwrap_err();
        assert_eq!(err, GraphError::InvalidEndpoint("ghost".to_string()));
        assert!(doc.edges().is_empty());
        assert_eq!(doc.version(), version);
    }

    #[test]
    fn removing_a_node_cascades_incident_edges() {
        let mut doc = document();
        let a = doc.add_node("code", json!({})).unwrap();
        let b = doc.add_node("code", json!({})).unwrap();
        doc.add_edge(&a, "result", &b, "data").unwrap();
        let (_, removed) = doc.remove_node(&b).unwrap();
        assert_eq!(removed.len(), 1);
        assert!(doc.edges().is_empty());
        assert!(doc.node(&a).is_some());
    }

    #[test]
    fn duplicate_edge_is_rejected() {
        let mut doc = document();
        let a = doc.add_node("code", json!({})).unwrap();
        let b = doc.add_node("code", json!({})).unwrap();
        doc.add_edge(&a, "result", &b, "data").unwrap();
        let err = doc.add_edge(&a, "result", &b, "data").unwrap_err();
        assert!(matches!(err, GraphError::DuplicateEdge(_)));
        assert_eq!(doc.edges().len(), 1);
    }

    #[test]
    fn distinct_ports_between_the_same_nodes_are_allowed() {
        let mut doc = document();
        let a = doc.add_node("if", json!({})).unwrap();
        let b = doc.add_node("merge", json!({})).unwrap();
        doc.add_edge(&a, "true", &b, "a").unwrap();
        doc.add_edge(&a, "false", &b, "b").unwrap();
        assert_eq!(doc.edges().len(), 2);
    }

    #[test]
    fn self_edges_are_invalid() {
        let mut doc = document();
        let a = doc.add_node("code", json!({})).unwrap();
        let err = doc.add_edge(&a, "result", &a, "data").unwrap_err();
        assert!(matches!(err, GraphError::InvalidEndpoint(_)));
    }

    #[test]
    fn trigger_output_cannot_feed_data_input() {
        use crate::registry::{NodeTypeDescriptor, PortSpec};
        let registry = NodeTypeRegistry::new();
        registry
            .register(
                NodeTypeDescriptor::new("pulse", "Pulse", "trigger")
                    .output(PortSpec::trigger("tick", "Tick")),
            )
            .unwrap();
        registry
            .register(
                NodeTypeDescriptor::new("sink", "Sink", "data")
                    .input(PortSpec::data("data", "Data")),
            )
            .unwrap();
        let mut doc = Document::new(Arc::new(registry));
        let t = doc.add_node("pulse", json!({})).unwrap();
        let c = doc.add_node("sink", json!({})).unwrap();
        let err = doc.add_edge(&t, "tick", &c, "data").unwrap_err();
        assert!(matches!(err, GraphError::IncompatiblePorts(_, _)));
    }

    #[test]
    fn restore_after_remove_round_trips() {
        let mut doc = document();
        let a = doc.add_node("code", json!({"x": 1})).unwrap();
        let b = doc.add_node("code", json!({})).unwrap();
        doc.add_edge(&a, "result", &b, "data").unwrap();
        let (node, edges) = doc.remove_node(&a).unwrap();
        doc.restore_node(node.clone()).unwrap();
        for edge in edges {
            doc.restore_edge(edge).unwrap();
        }
        assert_eq!(doc.node(&a).unwrap().payload, json!({"x": 1}));
        assert_eq!(doc.edges().len(), 1);
        // A fresh node must not reuse the restored id.
        let c = doc.add_node("code", json!({})).unwrap();
        assert_ne!(c, a);
        assert_ne!(c, b);
    }
}
