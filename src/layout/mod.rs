mod ranking;
mod routing;
pub(crate) mod types;

pub use types::*;

use crate::config::{LayoutConfig, LayoutDirection};
use crate::graph::{Document, Node};
use crate::text_metrics;
use crate::theme::Theme;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Instant;
use thiserror::Error;

use ranking::{assign_ranks, find_back_edges, order_ranks};
use routing::{LANE_GAP, route_back, route_forward};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("layout exceeded its budget of {budget_ms} ms")]
    Timeout { budget_ms: u64 },
}

/// Vertical room reserved per port row when sizing a node.
const PORT_ROW_HEIGHT: f32 = 22.0;
const PORT_ROW_PADDING: f32 = 24.0;

/// Computes a layout for the document's current content, tagged with its
/// version. Deterministic for identical content and insertion order.
///
/// Cycles never fail the computation: cycle edges are excluded from ranking
/// and routed as marked back edges. Pinned nodes keep their manual position;
/// everything else gets a fresh rank-based placement.
pub fn compute_layout(
    document: &Document,
    theme: &Theme,
    config: &LayoutConfig,
) -> Result<LayoutResult, LayoutError> {
    let started = Instant::now();
    let budget = config.layout_budget_ms;
    let check_budget = |started: &Instant| -> Result<(), LayoutError> {
        if started.elapsed().as_millis() as u64 >= budget {
            Err(LayoutError::Timeout { budget_ms: budget })
        } else {
            Ok(())
        }
    };

    let nodes: Vec<&Node> = document.nodes().collect();
    if nodes.is_empty() {
        return Ok(LayoutResult {
            version: document.version(),
            width: config.margin * 2.0,
            height: config.margin * 2.0,
            nodes: BTreeMap::new(),
            edges: Vec::new(),
        });
    }

    let index_of: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(idx, node)| (node.id.as_str(), idx))
        .collect();
    let sizes: Vec<(f32, f32)> = nodes
        .iter()
        .map(|node| node_size(node, theme, config))
        .collect();
    let endpoints: Vec<(usize, usize)> = document
        .edges()
        .iter()
        .map(|edge| (index_of[edge.source.as_str()], index_of[edge.target.as_str()]))
        .collect();

    check_budget(&started)?;

    let components = connected_components(nodes.len(), &endpoints);

    // Per-node results, indexed like `nodes`.
    let mut rank = vec![0usize; nodes.len()];
    let mut order = vec![0usize; nodes.len()];
    let mut position = vec![(0.0f32, 0.0f32); nodes.len()];
    let mut component_of = vec![0usize; nodes.len()];
    let mut edge_back = vec![false; endpoints.len()];
    // Cross-axis extent of each component after stacking, for back-edge lanes.
    let mut component_cross_end: Vec<f32> = Vec::with_capacity(components.len());

    let horizontal = config.direction == LayoutDirection::LeftRight;
    let mut cross_cursor = config.margin;

    for (component_idx, members) in components.iter().enumerate() {
        check_budget(&started)?;

        let local_of: HashMap<usize, usize> = members
            .iter()
            .enumerate()
            .map(|(local, &global)| (global, local))
            .collect();
        let local_edges: Vec<(usize, (usize, usize))> = endpoints
            .iter()
            .enumerate()
            .filter(|(_, (from, to))| local_of.contains_key(from) && local_of.contains_key(to))
            .map(|(edge_idx, (from, to))| (edge_idx, (local_of[from], local_of[to])))
            .collect();
        let local_pairs: Vec<(usize, usize)> = local_edges.iter().map(|(_, pair)| *pair).collect();

        let back = find_back_edges(members.len(), &local_pairs);
        for ((edge_idx, _), is_back) in local_edges.iter().zip(&back) {
            edge_back[*edge_idx] = *is_back;
        }
        let forward: Vec<(usize, usize)> = local_pairs
            .iter()
            .zip(&back)
            .filter(|&(_, &is_back)| !is_back)
            .map(|(&pair, _)| pair)
            .collect();

        let local_ranks = assign_ranks(members.len(), &forward);
        check_budget(&started)?;
        let buckets = order_ranks(&local_ranks, &forward, config.ordering_passes);
        check_budget(&started)?;

        // Extents along the flow axis (main) and the perpendicular (cross).
        let main_extent = |global: usize| if horizontal { sizes[global].0 } else { sizes[global].1 };
        let cross_extent = |global: usize| if horizontal { sizes[global].1 } else { sizes[global].0 };

        let rank_main_width: Vec<f32> = buckets
            .iter()
            .map(|bucket| {
                bucket
                    .iter()
                    .map(|&local| main_extent(members[local]))
                    .fold(0.0f32, f32::max)
            })
            .collect();
        let mut rank_main_offset = Vec::with_capacity(buckets.len());
        let mut main_cursor = config.margin;
        for width in &rank_main_width {
            rank_main_offset.push(main_cursor);
            main_cursor += width + config.rank_separation;
        }

        let bucket_cross_total: Vec<f32> = buckets
            .iter()
            .map(|bucket| {
                let sizes_total: f32 = bucket
                    .iter()
                    .map(|&local| cross_extent(members[local]))
                    .sum();
                let gaps = bucket.len().saturating_sub(1) as f32 * config.node_separation;
                sizes_total + gaps
            })
            .collect();
        let component_cross = bucket_cross_total.iter().copied().fold(0.0f32, f32::max);

        for (rank_idx, bucket) in buckets.iter().enumerate() {
            let mut cross = cross_cursor + (component_cross - bucket_cross_total[rank_idx]) / 2.0;
            for (order_idx, &local) in bucket.iter().enumerate() {
                let global = members[local];
                rank[global] = rank_idx;
                order[global] = order_idx;
                component_of[global] = component_idx;
                let main = rank_main_offset[rank_idx]
                    + (rank_main_width[rank_idx] - main_extent(global)) / 2.0;
                position[global] = if horizontal { (main, cross) } else { (cross, main) };
                cross += cross_extent(global) + config.node_separation;
            }
        }

        // Manual overrides win over the computed placement.
        let mut cross_end = cross_cursor + component_cross;
        for &global in members {
            if let Some((px, py)) = nodes[global].pinned {
                position[global] = (px, py);
                let pinned_cross = if horizontal {
                    py + sizes[global].1
                } else {
                    px + sizes[global].0
                };
                cross_end = cross_end.max(pinned_cross);
            }
        }
        component_cross_end.push(cross_end);
        cross_cursor = cross_end + config.component_separation;
    }

    check_budget(&started)?;

    let mut node_layouts: BTreeMap<String, NodeLayout> = BTreeMap::new();
    for (idx, node) in nodes.iter().enumerate() {
        let (x, y) = position[idx];
        let (width, height) = sizes[idx];
        let mut layout = NodeLayout {
            id: node.id.clone(),
            kind: node.kind.clone(),
            label: node.label.clone(),
            x,
            y,
            width,
            height,
            rank: rank[idx],
            order: order[idx],
            pinned: node.pinned.is_some(),
            ports: Vec::new(),
        };
        layout.ports = port_points(node, &layout, config.direction);
        node_layouts.insert(node.id.clone(), layout);
    }

    let mut lane_count_per_component = vec![0usize; components.len()];
    let mut edge_routes = Vec::with_capacity(document.edges().len());
    for (edge_idx, edge) in document.edges().iter().enumerate() {
        let source = &node_layouts[&edge.source];
        let target = &node_layouts[&edge.target];
        let start = port_anchor(source, &edge.source_port, false);
        let end = port_anchor(target, &edge.target_port, true);
        let points = if edge_back[edge_idx] {
            let component = component_of[index_of[edge.source.as_str()]];
            let lane_index = lane_count_per_component[component];
            lane_count_per_component[component] += 1;
            let lane = component_cross_end[component]
                + config.back_edge_clearance
                + lane_index as f32 * LANE_GAP;
            route_back(start, end, lane, config.direction)
        } else {
            route_forward(start, end, config.direction)
        };
        edge_routes.push(EdgeRoute {
            id: edge.id.clone(),
            source: edge.source.clone(),
            target: edge.target.clone(),
            points,
            back: edge_back[edge_idx],
            label: edge.label.clone(),
        });
    }

    let mut max_x = 0.0f32;
    let mut max_y = 0.0f32;
    for layout in node_layouts.values() {
        max_x = max_x.max(layout.x + layout.width);
        max_y = max_y.max(layout.y + layout.height);
    }
    for route in &edge_routes {
        for point in &route.points {
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }
    }

    Ok(LayoutResult {
        version: document.version(),
        width: max_x + config.margin,
        height: max_y + config.margin,
        nodes: node_layouts,
        edges: edge_routes,
    })
}

fn node_size(node: &Node, theme: &Theme, config: &LayoutConfig) -> (f32, f32) {
    let label_width =
        text_metrics::measure_label_width(&node.label, theme.font_size, &theme.font_family);
    let width = node.width.max(label_width + 2.0 * config.label_padding);
    let port_rows = node.inputs.len().max(node.outputs.len()) as f32;
    let height = node
        .height
        .max(port_rows * PORT_ROW_HEIGHT + PORT_ROW_PADDING);
    (width, height)
}

fn connected_components(node_count: usize, endpoints: &[(usize, usize)]) -> Vec<Vec<usize>> {
    let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    for &(from, to) in endpoints {
        neighbors[from].push(to);
        neighbors[to].push(from);
    }
    let mut component = vec![usize::MAX; node_count];
    let mut components: Vec<Vec<usize>> = Vec::new();
    for start in 0..node_count {
        if component[start] != usize::MAX {
            continue;
        }
        let component_idx = components.len();
        let mut members = Vec::new();
        let mut queue = VecDeque::from([start]);
        component[start] = component_idx;
        while let Some(node) = queue.pop_front() {
            members.push(node);
            for &next in &neighbors[node] {
                if component[next] == usize::MAX {
                    component[next] = component_idx;
                    queue.push_back(next);
                }
            }
        }
        // Keep insertion order inside the component regardless of BFS order.
        members.sort_unstable();
        components.push(members);
    }
    components
}

/// Input ports sit on the upstream side of the node, outputs on the
/// downstream side, evenly spread along it.
fn port_points(node: &Node, layout: &NodeLayout, direction: LayoutDirection) -> Vec<PortPoint> {
    let mut ports = Vec::with_capacity(node.inputs.len() + node.outputs.len());
    let spread = |count: usize, index: usize, start: f32, extent: f32| {
        start + extent * (index + 1) as f32 / (count + 1) as f32
    };
    for (idx, port) in node.inputs.iter().enumerate() {
        let (x, y) = match direction {
            LayoutDirection::LeftRight => (
                layout.x,
                spread(node.inputs.len(), idx, layout.y, layout.height),
            ),
            LayoutDirection::TopDown => (
                spread(node.inputs.len(), idx, layout.x, layout.width),
                layout.y,
            ),
        };
        ports.push(PortPoint {
            key: port.key.clone(),
            x,
            y,
            input: true,
        });
    }
    for (idx, port) in node.outputs.iter().enumerate() {
        let (x, y) = match direction {
            LayoutDirection::LeftRight => (
                layout.x + layout.width,
                spread(node.outputs.len(), idx, layout.y, layout.height),
            ),
            LayoutDirection::TopDown => (
                spread(node.outputs.len(), idx, layout.x, layout.width),
                layout.y + layout.height,
            ),
        };
        ports.push(PortPoint {
            key: port.key.clone(),
            x,
            y,
            input: false,
        });
    }
    ports
}

fn port_anchor(layout: &NodeLayout, key: &str, input: bool) -> Point {
    match layout.port(key, input) {
        Some(port) => Point::new(port.x, port.y),
        // Ports always exist for edges admitted by the model; the center is
        // a harmless fallback for hand-built layouts.
        None => layout.center(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Document;
    use crate::nodes::register_builtins;
    use crate::registry::NodeTypeRegistry;
    use serde_json::json;
    use std::sync::Arc;

    fn document() -> Document {
        let registry = NodeTypeRegistry::new();
        register_builtins(&registry).unwrap();
        Document::new(Arc::new(registry))
    }

    fn theme() -> Theme {
        Theme::modern()
    }

    #[test]
    fn empty_document_lays_out_to_margins() {
        let doc = document();
        let layout = compute_layout(&doc, &theme(), &LayoutConfig::default()).unwrap();
        assert!(layout.nodes.is_empty());
        assert_eq!(layout.version, 0);
    }

    #[test]
    fn edge_source_gets_a_strictly_earlier_rank() {
        let mut doc = document();
        let n1 = doc.add_node("code", json!({})).unwrap();
        let n2 = doc.add_node("code", json!({})).unwrap();
        doc.add_edge(&n1, "result", &n2, "data").unwrap();
        let layout = compute_layout(&doc, &theme(), &LayoutConfig::default()).unwrap();
        assert!(layout.rank_of(&n1).unwrap() < layout.rank_of(&n2).unwrap());
    }

    #[test]
    fn layout_is_deterministic() {
        let mut doc = document();
        let mut previous = Vec::new();
        for _ in 0..8 {
            previous.push(doc.add_node("code", json!({})).unwrap());
        }
        for pair in previous.windows(2) {
            doc.add_edge(&pair[0], "result", &pair[1], "data").unwrap();
        }
        doc.add_edge(&previous[0], "result", &previous[3], "data")
            .unwrap();
        let first = compute_layout(&doc, &theme(), &LayoutConfig::default()).unwrap();
        let second = compute_layout(&doc, &theme(), &LayoutConfig::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn cycles_are_laid_out_with_marked_back_edges() {
        let mut doc = document();
        let a = doc.add_node("code", json!({})).unwrap();
        let b = doc.add_node("code", json!({})).unwrap();
        let c = doc.add_node("code", json!({})).unwrap();
        doc.add_edge(&a, "result", &b, "data").unwrap();
        doc.add_edge(&b, "result", &c, "data").unwrap();
        let back_id = doc.add_edge(&c, "result", &a, "data").unwrap();
        let layout = compute_layout(&doc, &theme(), &LayoutConfig::default()).unwrap();
        let back_edges: Vec<&EdgeRoute> = layout.edges.iter().filter(|e| e.back).collect();
        assert_eq!(back_edges.len(), 1);
        assert_eq!(back_edges[0].id, back_id);
        // Forward ranks are unaffected by the cycle edge.
        assert!(layout.rank_of(&a).unwrap() < layout.rank_of(&c).unwrap());
    }

    #[test]
    fn disconnected_components_do_not_overlap() {
        let mut doc = document();
        let a = doc.add_node("code", json!({})).unwrap();
        let b = doc.add_node("code", json!({})).unwrap();
        let c = doc.add_node("code", json!({})).unwrap();
        let d = doc.add_node("code", json!({})).unwrap();
        doc.add_edge(&a, "result", &b, "data").unwrap();
        doc.add_edge(&c, "result", &d, "data").unwrap();
        let layout = compute_layout(&doc, &theme(), &LayoutConfig::default()).unwrap();
        let first = layout.node(&a).unwrap();
        let second = layout.node(&c).unwrap();
        // Left-to-right flow stacks components vertically.
        assert!(second.y >= first.y + first.height);
    }

    #[test]
    fn pinned_node_keeps_its_position() {
        let mut doc = document();
        let a = doc.add_node("code", json!({})).unwrap();
        let b = doc.add_node("code", json!({})).unwrap();
        doc.add_edge(&a, "result", &b, "data").unwrap();
        doc.set_pinned_position(&b, Some((640.0, 480.0))).unwrap();
        let layout = compute_layout(&doc, &theme(), &LayoutConfig::default()).unwrap();
        let pinned = layout.node(&b).unwrap();
        assert_eq!((pinned.x, pinned.y), (640.0, 480.0));
        assert!(pinned.pinned);
    }

    #[test]
    fn zero_budget_reports_timeout() {
        let mut doc = document();
        doc.add_node("code", json!({})).unwrap();
        let config = LayoutConfig {
            layout_budget_ms: 0,
            ..LayoutConfig::default()
        };
        let err = compute_layout(&doc, &theme(), &config).unwrap_err();
        assert_eq!(err, LayoutError::Timeout { budget_ms: 0 });
    }

    #[test]
    fn result_version_matches_document_version() {
        let mut doc = document();
        doc.add_node("code", json!({})).unwrap();
        doc.add_node("code", json!({})).unwrap();
        let layout = compute_layout(&doc, &theme(), &LayoutConfig::default()).unwrap();
        assert_eq!(layout.version, doc.version());
    }

    #[test]
    fn top_down_direction_stacks_ranks_vertically() {
        let mut doc = document();
        let a = doc.add_node("code", json!({})).unwrap();
        let b = doc.add_node("code", json!({})).unwrap();
        doc.add_edge(&a, "result", &b, "data").unwrap();
        let config = LayoutConfig {
            direction: LayoutDirection::TopDown,
            ..LayoutConfig::default()
        };
        let layout = compute_layout(&doc, &theme(), &config).unwrap();
        let first = layout.node(&a).unwrap();
        let second = layout.node(&b).unwrap();
        assert!(second.y > first.y + first.height / 2.0);
    }
}
