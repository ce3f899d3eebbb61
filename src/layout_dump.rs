use crate::config::LayoutConfig;
use crate::layout::LayoutResult;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Flat, diff-friendly snapshot of a layout for debugging and golden
/// comparisons.
#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub version: u64,
    pub direction: String,
    pub width: f32,
    pub height: f32,
    pub nodes: Vec<NodeDump>,
    pub edges: Vec<EdgeDump>,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub id: String,
    pub kind: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub rank: usize,
    pub order: usize,
    pub pinned: bool,
}

#[derive(Debug, Serialize)]
pub struct EdgeDump {
    pub id: String,
    pub from: String,
    pub to: String,
    pub back: bool,
    pub points: Vec<[f32; 2]>,
}

impl LayoutDump {
    pub fn from_layout(layout: &LayoutResult, config: &LayoutConfig) -> Self {
        let nodes = layout
            .nodes
            .values()
            .map(|node| NodeDump {
                id: node.id.clone(),
                kind: node.kind.clone(),
                x: node.x,
                y: node.y,
                width: node.width,
                height: node.height,
                rank: node.rank,
                order: node.order,
                pinned: node.pinned,
            })
            .collect();

        let edges = layout
            .edges
            .iter()
            .map(|edge| EdgeDump {
                id: edge.id.clone(),
                from: edge.source.clone(),
                to: edge.target.clone(),
                back: edge.back,
                points: edge.points.iter().map(|p| [p.x, p.y]).collect(),
            })
            .collect();

        LayoutDump {
            version: layout.version,
            direction: format!("{:?}", config.direction),
            width: layout.width,
            height: layout.height,
            nodes,
            edges,
        }
    }
}

pub fn write_layout_dump(
    path: &Path,
    layout: &LayoutResult,
    config: &LayoutConfig,
) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_layout(layout, config);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}
