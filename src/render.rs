use crate::config::RenderConfig;
use crate::layout::{EdgeRoute, LayoutResult, Point};
use crate::theme::Theme;
use anyhow::Result;
use std::path::Path;

/// Renders a settled layout to standalone SVG. The markup is a plain static
/// snapshot; interactive hosts draw the same geometry themselves and use
/// this path for exports and headless tests.
pub fn render_svg(layout: &LayoutResult, theme: &Theme, config: &RenderConfig) -> String {
    let mut svg = String::new();
    let width = layout.width.max(200.0);
    let height = layout.height.max(200.0);

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    ));

    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        theme.background
    ));

    svg.push_str("<defs>");
    svg.push_str(&format!(
        "<marker id=\"arrow\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"6\" markerHeight=\"6\" orient=\"auto-start-reverse\"><path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"{}\"/></marker>",
        theme.line_color
    ));
    svg.push_str(&format!(
        "<marker id=\"arrow-back\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"6\" markerHeight=\"6\" orient=\"auto-start-reverse\"><path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"{}\"/></marker>",
        theme.back_edge_color
    ));
    svg.push_str("</defs>");

    for edge in &layout.edges {
        let d = points_to_path(&edge.points);
        let (stroke, marker, dash) = if edge.back {
            (
                theme.back_edge_color.as_str(),
                "marker-end=\"url(#arrow-back)\"",
                " stroke-dasharray=\"6 4\"",
            )
        } else {
            (theme.line_color.as_str(), "marker-end=\"url(#arrow)\"", "")
        };
        svg.push_str(&format!(
            "<path d=\"{d}\" fill=\"none\" stroke=\"{stroke}\" stroke-width=\"1.4\"{dash} {marker}/>",
        ));

        if let Some(label) = &edge.label {
            svg.push_str(&edge_label_svg(edge, label, theme));
        }
    }

    for node in layout.nodes.values() {
        svg.push_str(&format!(
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"{r}\" ry=\"{r}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1.4\"/>",
            node.x,
            node.y,
            node.width,
            node.height,
            theme.node_fill,
            theme.node_border_color,
            r = config.node_corner_radius
        ));

        let center = node.center();
        svg.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" dominant-baseline=\"central\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
            center.x,
            center.y,
            theme.font_family,
            theme.font_size,
            theme.node_text_color,
            escape_xml(&node.label)
        ));

        for port in &node.ports {
            svg.push_str(&format!(
                "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"{}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1\"/>",
                port.x, port.y, config.port_radius, theme.port_fill, theme.background
            ));
        }
    }

    svg.push_str("</svg>");
    svg
}

fn edge_label_svg(edge: &EdgeRoute, label: &str, theme: &Theme) -> String {
    let Some(mid) = edge.midpoint() else {
        return String::new();
    };
    let label_width =
        crate::text_metrics::measure_label_width(label, theme.font_size, &theme.font_family);
    let rect_w = label_width + 12.0;
    let rect_h = theme.font_size + 8.0;
    let rect_x = mid.x - rect_w / 2.0;
    let rect_y = mid.y - rect_h / 2.0;
    let mut out = String::new();
    out.push_str(&format!(
        "<rect x=\"{rect_x:.2}\" y=\"{rect_y:.2}\" width=\"{rect_w:.2}\" height=\"{rect_h:.2}\" rx=\"6\" ry=\"6\" fill=\"{}\" stroke=\"{}\" stroke-width=\"0.8\"/>",
        theme.edge_label_background,
        theme.node_border_color
    ));
    out.push_str(&format!(
        "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" dominant-baseline=\"central\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
        mid.x,
        mid.y,
        theme.font_family,
        theme.font_size,
        theme.node_text_color,
        escape_xml(label)
    ));
    out
}

fn points_to_path(points: &[Point]) -> String {
    if points.is_empty() {
        return String::new();
    }
    let mut d = String::new();
    d.push_str(&format!("M {:.2} {:.2}", points[0].x, points[0].y));
    for point in points.iter().skip(1) {
        d.push_str(&format!(" L {:.2} {:.2}", point.x, point.y));
    }
    d
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = "Inter".to_string();
    opt.default_size = usvg::Size::from_wh(render_cfg.width, render_cfg.height)
        .unwrap_or(usvg::Size::from_wh(800.0, 600.0).unwrap());

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::graph::Document;
    use crate::layout::compute_layout;
    use crate::nodes::register_builtins;
    use crate::registry::NodeTypeRegistry;
    use serde_json::json;
    use std::sync::Arc;

    fn document() -> Document {
        let registry = NodeTypeRegistry::new();
        register_builtins(&registry).unwrap();
        Document::new(Arc::new(registry))
    }

    #[test]
    fn render_svg_basic() {
        let mut doc = document();
        let a = doc.add_node("manual_trigger", json!({})).unwrap();
        let b = doc.add_node("http_request", json!({})).unwrap();
        doc.add_edge(&a, "out", &b, "data").unwrap();
        let layout = compute_layout(&doc, &Theme::modern(), &LayoutConfig::default()).unwrap();
        let svg = render_svg(&layout, &Theme::modern(), &RenderConfig::default());
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Manual Trigger"));
        assert!(svg.contains("url(#arrow)"));
        assert!(svg.contains("<circle"));
    }

    #[test]
    fn back_edges_render_dashed_in_their_own_color() {
        let mut doc = document();
        let a = doc.add_node("code", json!({})).unwrap();
        let b = doc.add_node("code", json!({})).unwrap();
        doc.add_edge(&a, "result", &b, "data").unwrap();
        doc.add_edge(&b, "result", &a, "data").unwrap();
        let theme = Theme::modern();
        let layout = compute_layout(&doc, &theme, &LayoutConfig::default()).unwrap();
        let svg = render_svg(&layout, &theme, &RenderConfig::default());
        assert!(svg.contains("stroke-dasharray=\"6 4\""));
        assert!(svg.contains(&theme.back_edge_color));
    }

    #[test]
    fn labels_are_escaped() {
        let mut doc = document();
        let id = doc.add_node("code", json!({})).unwrap();
        doc.set_label(&id, "a < b & c").unwrap();
        let layout = compute_layout(&doc, &Theme::modern(), &LayoutConfig::default()).unwrap();
        let svg = render_svg(&layout, &Theme::modern(), &RenderConfig::default());
        assert!(svg.contains("a &lt; b &amp; c"));
        assert!(!svg.contains("a < b & c"));
    }
}
