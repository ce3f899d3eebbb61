//! Document serialization. The wire shape mirrors what canvas front ends
//! exchange: node `type` instead of `kind`, `sourceHandle`/`targetHandle`
//! for ports, and a format version tag so old exports fail loudly instead
//! of half-loading.

use crate::graph::{Document, GraphError, Node};
use crate::registry::{NodeTypeRegistry, RegistryError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub const FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("unsupported document format version: {0}")]
    UnsupportedVersion(String),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentData {
    pub version: String,
    pub nodes: Vec<NodeData>,
    pub edges: Vec<EdgeData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeData {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<PositionData>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PositionData {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeData {
    pub id: String,
    pub source: String,
    #[serde(rename = "sourceHandle")]
    pub source_port: String,
    pub target: String,
    #[serde(rename = "targetHandle")]
    pub target_port: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Snapshot of a document in the wire shape.
pub fn to_data(document: &Document) -> DocumentData {
    DocumentData {
        version: FORMAT_VERSION.to_string(),
        nodes: document
            .nodes()
            .map(|node| NodeData {
                id: node.id.clone(),
                kind: node.kind.clone(),
                label: node.label.clone(),
                position: node.pinned.map(|(x, y)| PositionData { x, y }),
                payload: node.payload.clone(),
            })
            .collect(),
        edges: document
            .edges()
            .iter()
            .map(|edge| EdgeData {
                id: edge.id.clone(),
                source: edge.source.clone(),
                source_port: edge.source_port.clone(),
                target: edge.target.clone(),
                target_port: edge.target_port.clone(),
                label: edge.label.clone(),
            })
            .collect(),
    }
}

/// Rebuilds a document from its wire shape. Everything goes through the
/// same validated mutation paths the editor uses, so a corrupted file
/// cannot smuggle in an edge the UI would have refused.
pub fn from_data(
    registry: Arc<NodeTypeRegistry>,
    data: DocumentData,
) -> Result<Document, PersistError> {
    if data.version != FORMAT_VERSION {
        return Err(PersistError::UnsupportedVersion(data.version));
    }
    let mut document = Document::new(registry);
    for node_data in data.nodes {
        let descriptor = document.registry().resolve(&node_data.kind)?;
        document.restore_node(Node {
            id: node_data.id,
            kind: descriptor.kind.clone(),
            label: node_data.label,
            width: descriptor.default_size.w,
            height: descriptor.default_size.h,
            inputs: descriptor.inputs.clone(),
            outputs: descriptor.outputs.clone(),
            pinned: node_data.position.map(|p| (p.x, p.y)),
            payload: node_data.payload,
        })?;
    }
    for edge_data in data.edges {
        let id = document.add_edge(
            &edge_data.source,
            &edge_data.source_port,
            &edge_data.target,
            &edge_data.target_port,
        )?;
        if edge_data.label.is_some() {
            document.set_edge_label(&id, edge_data.label)?;
        }
    }
    Ok(document)
}

/// Storage seam so hosts can back documents with whatever they have:
/// files, a database column, an HTTP endpoint.
pub trait PersistenceAdapter {
    fn save(&self, data: &DocumentData) -> Result<(), PersistError>;
    fn load(&self) -> Result<DocumentData, PersistError>;
}

/// Pretty-printed JSON in a single file.
pub struct JsonFileAdapter {
    path: PathBuf,
}

impl JsonFileAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PersistenceAdapter for JsonFileAdapter {
    fn save(&self, data: &DocumentData) -> Result<(), PersistError> {
        let json = serde_json::to_string_pretty(data)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    fn load(&self) -> Result<DocumentData, PersistError> {
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Parses a document straight from a JSON string.
pub fn parse_document(
    registry: Arc<NodeTypeRegistry>,
    json: &str,
) -> Result<Document, PersistError> {
    let data: DocumentData = serde_json::from_str(json)?;
    from_data(registry, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::register_builtins;
    use serde_json::json;

    fn registry() -> Arc<NodeTypeRegistry> {
        let registry = NodeTypeRegistry::new();
        register_builtins(&registry).unwrap();
        Arc::new(registry)
    }

    fn sample_document() -> Document {
        let mut document = Document::new(registry());
        let a = document
            .add_node("manual_trigger", json!({}))
            .unwrap();
        let b = document
            .add_node("http_request", json!({"url": "https://example.com"}))
            .unwrap();
        document.add_edge(&a, "out", &b, "data").unwrap();
        document.set_pinned_position(&b, Some((420.0, 120.0))).unwrap();
        document
    }

    #[test]
    fn round_trip_preserves_structure_ids_and_pins() {
        let original = sample_document();
        let data = to_data(&original);
        assert_eq!(data.version, FORMAT_VERSION);

        let restored = from_data(registry(), data).unwrap();
        assert_eq!(restored.node_count(), original.node_count());
        assert_eq!(restored.edges().len(), 1);
        let ids: Vec<&str> = restored.nodes().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["n_1", "n_2"]);
        assert_eq!(restored.node("n_2").unwrap().pinned, Some((420.0, 120.0)));
        assert_eq!(
            restored.node("n_2").unwrap().payload["url"],
            "https://example.com"
        );
    }

    #[test]
    fn restored_document_continues_id_generation_past_loaded_ids() {
        let data = to_data(&sample_document());
        let mut restored = from_data(registry(), data).unwrap();
        let next = restored.add_node("code", json!({})).unwrap();
        assert_eq!(next, "n_3");
    }

    #[test]
    fn wire_format_uses_canvas_field_names() {
        let data = to_data(&sample_document());
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["nodes"][0]["type"], "manual_trigger");
        assert_eq!(json["edges"][0]["sourceHandle"], "out");
        assert_eq!(json["edges"][0]["targetHandle"], "data");
        assert!(json["nodes"][0].get("kind").is_none());
    }

    #[test]
    fn unknown_format_version_is_rejected() {
        let err = parse_document(
            registry(),
            r#"{"version": "2.0", "nodes": [], "edges": []}"#,
        )
        .unwrap_err();
        assert!(matches!(err, PersistError::UnsupportedVersion(v) if v == "2.0"));
    }

    #[test]
    fn corrupt_edge_fails_through_normal_validation() {
        let mut data = to_data(&sample_document());
        data.edges[0].target_port = "no_such_port".to_string();
        let err = from_data(registry(), data).unwrap_err();
        assert!(matches!(
            err,
            PersistError::Graph(GraphError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn unknown_kind_in_file_is_rejected() {
        let json = r#"{
            "version": "1.0",
            "nodes": [{"id": "n_1", "type": "mystery", "label": "?", "payload": {}}],
            "edges": []
        }"#;
        let err = parse_document(registry(), json).unwrap_err();
        assert!(matches!(err, PersistError::Registry(_)));
    }
}
