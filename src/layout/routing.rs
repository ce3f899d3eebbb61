//! Orthogonal edge routing. Forward edges take an elbow between the two
//! port points; back edges detour through a lane outside the component so
//! they read as returns instead of crossing the body of the graph.

use crate::config::LayoutDirection;

use super::types::Point;

/// Minimum stub leaving a port before the first bend.
pub(super) const PORT_STUB: f32 = 18.0;
/// Gap between stacked back-edge lanes.
pub(super) const LANE_GAP: f32 = 14.0;

pub(super) fn route_forward(start: Point, end: Point, direction: LayoutDirection) -> Vec<Point> {
    let points = match direction {
        LayoutDirection::LeftRight => {
            if (start.y - end.y).abs() < 0.5 {
                vec![start, end]
            } else {
                let mid_x = (start.x + end.x) / 2.0;
                vec![
                    start,
                    Point::new(mid_x, start.y),
                    Point::new(mid_x, end.y),
                    end,
                ]
            }
        }
        LayoutDirection::TopDown => {
            if (start.x - end.x).abs() < 0.5 {
                vec![start, end]
            } else {
                let mid_y = (start.y + end.y) / 2.0;
                vec![
                    start,
                    Point::new(start.x, mid_y),
                    Point::new(end.x, mid_y),
                    end,
                ]
            }
        }
    };
    dedupe(points)
}

/// Routes a back edge through `lane`, a coordinate on the cross axis beyond
/// the component's extent (below it for left-to-right flow, beside it for
/// top-down flow).
pub(super) fn route_back(
    start: Point,
    end: Point,
    lane: f32,
    direction: LayoutDirection,
) -> Vec<Point> {
    let points = match direction {
        LayoutDirection::LeftRight => vec![
            start,
            Point::new(start.x + PORT_STUB, start.y),
            Point::new(start.x + PORT_STUB, lane),
            Point::new(end.x - PORT_STUB, lane),
            Point::new(end.x - PORT_STUB, end.y),
            end,
        ],
        LayoutDirection::TopDown => vec![
            start,
            Point::new(start.x, start.y + PORT_STUB),
            Point::new(lane, start.y + PORT_STUB),
            Point::new(lane, end.y - PORT_STUB),
            Point::new(end.x, end.y - PORT_STUB),
            end,
        ],
    };
    dedupe(points)
}

fn dedupe(points: Vec<Point>) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for point in points {
        let duplicate = out
            .last()
            .is_some_and(|last| (last.x - point.x).abs() < 0.01 && (last.y - point.y).abs() < 0.01);
        if !duplicate {
            out.push(point);
        }
    }
    out
}
