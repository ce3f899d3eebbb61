use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortPoint {
    pub key: String,
    pub x: f32,
    pub y: f32,
    pub input: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLayout {
    pub id: String,
    pub kind: String,
    pub label: String,
    /// Top-left corner.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub rank: usize,
    /// Position within the rank after crossing minimization.
    pub order: usize,
    pub pinned: bool,
    pub ports: Vec<PortPoint>,
}

impl NodeLayout {
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn port(&self, key: &str, input: bool) -> Option<&PortPoint> {
        self.ports.iter().find(|p| p.key == key && p.input == input)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRoute {
    pub id: String,
    pub source: String,
    pub target: String,
    pub points: Vec<Point>,
    /// Cycle edge: excluded from ranking and routed around its span.
    pub back: bool,
    pub label: Option<String>,
}

impl EdgeRoute {
    /// Point halfway along the polyline, for label anchoring.
    pub fn midpoint(&self) -> Option<Point> {
        if self.points.is_empty() {
            return None;
        }
        let mut total = 0.0f32;
        for pair in self.points.windows(2) {
            total += segment_length(pair[0], pair[1]);
        }
        if total <= f32::EPSILON {
            return Some(self.points[0]);
        }
        let mut remaining = total / 2.0;
        for pair in self.points.windows(2) {
            let len = segment_length(pair[0], pair[1]);
            if remaining <= len {
                let t = if len > 0.0 { remaining / len } else { 0.0 };
                return Some(Point::new(
                    pair[0].x + (pair[1].x - pair[0].x) * t,
                    pair[0].y + (pair[1].y - pair[0].y) * t,
                ));
            }
            remaining -= len;
        }
        self.points.last().copied()
    }
}

fn segment_length(a: Point, b: Point) -> f32 {
    ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt()
}

/// Geometry for one document version. A result whose `version` no longer
/// matches the document is stale and must not be rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutResult {
    pub version: u64,
    pub width: f32,
    pub height: f32,
    pub nodes: BTreeMap<String, NodeLayout>,
    pub edges: Vec<EdgeRoute>,
}

impl LayoutResult {
    pub fn node(&self, id: &str) -> Option<&NodeLayout> {
        self.nodes.get(id)
    }

    pub fn edge(&self, id: &str) -> Option<&EdgeRoute> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn rank_of(&self, id: &str) -> Option<usize> {
        self.nodes.get(id).map(|n| n.rank)
    }
}
