//! Transition planning between settled layouts. The animator diffs two
//! layout results into enter/move/exit transitions and samples them at a
//! caller-supplied clock, so hosts drive it from their own frame loop and
//! tests drive it with plain numbers.

use crate::config::AnimationConfig;
use crate::layout::{LayoutResult, Point};
use std::collections::BTreeMap;

/// Points used when interpolating between two edge polylines with a
/// different number of bends.
const EDGE_SAMPLES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Easing {
    Linear,
    /// cubic-bezier(0.42, 0, 1, 1)
    EaseIn,
    /// cubic-bezier(0, 0, 0.58, 1)
    EaseOut,
    CubicBezier(f32, f32, f32, f32),
}

impl Easing {
    /// Maps progress `t` in [0, 1] through the curve.
    pub fn eval(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseIn => cubic_bezier(0.42, 0.0, 1.0, 1.0, t),
            Easing::EaseOut => cubic_bezier(0.0, 0.0, 0.58, 1.0, t),
            Easing::CubicBezier(x1, y1, x2, y2) => cubic_bezier(x1, y1, x2, y2, t),
        }
    }
}

/// Solves the CSS-style curve: x1/x2 parametrize time, y1/y2 the output.
/// Bisection on the x polynomial is plenty at animation precision.
fn cubic_bezier(x1: f32, y1: f32, x2: f32, y2: f32, t: f32) -> f32 {
    if t <= 0.0 {
        return 0.0;
    }
    if t >= 1.0 {
        return 1.0;
    }
    let sample = |p1: f32, p2: f32, s: f32| {
        let inv = 1.0 - s;
        3.0 * inv * inv * s * p1 + 3.0 * inv * s * s * p2 + s * s * s
    };
    let mut lo = 0.0f32;
    let mut hi = 1.0f32;
    let mut s = t;
    for _ in 0..24 {
        let x = sample(x1, x2, s);
        if (x - t).abs() < 1e-4 {
            break;
        }
        if x < t {
            lo = s;
        } else {
            hi = s;
        }
        s = (lo + hi) * 0.5;
    }
    sample(y1, y2, s)
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionKind {
    /// New element fades and scales in at its final position.
    EnterNode { to: Point },
    /// Element fades out where it last stood.
    ExitNode { from: Point },
    MoveNode { from: Point, to: Point },
    EnterEdge { to: Vec<Point> },
    ExitEdge { from: Vec<Point> },
    /// Both polylines are resampled to the same point count up front.
    MoveEdge { from: Vec<Point>, to: Vec<Point> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub id: String,
    pub kind: TransitionKind,
    /// Offset from the plan's start, milliseconds.
    pub delay_ms: u64,
    pub duration_ms: u64,
    pub easing: Easing,
}

impl Transition {
    fn progress(&self, elapsed_ms: u64) -> f32 {
        if elapsed_ms <= self.delay_ms {
            return 0.0;
        }
        if self.duration_ms == 0 {
            return 1.0;
        }
        ((elapsed_ms - self.delay_ms) as f32 / self.duration_ms as f32).min(1.0)
    }

    fn finished(&self, elapsed_ms: u64) -> bool {
        elapsed_ms >= self.delay_ms + self.duration_ms
    }
}

/// The set of transitions carrying one settled layout to the next, tagged
/// with the layout version it animates toward.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationPlan {
    pub version: u64,
    pub transitions: Vec<Transition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeFrame {
    /// Top-left corner, same convention as the layout.
    pub position: Point,
    pub opacity: f32,
    pub scale: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeFrame {
    pub points: Vec<Point>,
    pub opacity: f32,
}

/// One sampled animation frame. Exited elements disappear from the maps
/// once their fade completes.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub nodes: BTreeMap<String, NodeFrame>,
    pub edges: BTreeMap<String, EdgeFrame>,
    pub settled: bool,
}

struct ActivePlan {
    plan: AnimationPlan,
    started_ms: u64,
}

/// Diffs successive layouts into plans and samples the active one.
///
/// A new layout arriving mid-flight retargets: in-progress elements start
/// their next move from the sampled position, not from the stale layout, so
/// nothing jumps.
pub struct Animator {
    config: AnimationConfig,
    target: Option<LayoutResult>,
    active: Option<ActivePlan>,
}

impl Animator {
    pub fn new(config: AnimationConfig) -> Self {
        Self {
            config,
            target: None,
            active: None,
        }
    }

    pub fn target(&self) -> Option<&LayoutResult> {
        self.target.as_ref()
    }

    /// Begins animating toward `next`. The previous target (sampled at
    /// `now_ms` if a plan is still running) provides the starting geometry.
    pub fn transition_to(&mut self, next: &LayoutResult, now_ms: u64) -> &AnimationPlan {
        let from = self.current_frame(now_ms);
        let plan = self.build_plan(&from, next);
        self.target = Some(next.clone());
        self.active = Some(ActivePlan {
            plan,
            started_ms: now_ms,
        });
        match &self.active {
            Some(active) => &active.plan,
            None => unreachable!("plan was just stored"),
        }
    }

    /// Geometry to start the next plan from: the live sample while a plan
    /// runs, otherwise the settled target.
    fn current_frame(&self, now_ms: u64) -> Frame {
        if self.active.is_some() {
            return self.sample(now_ms);
        }
        let mut frame = Frame {
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            settled: true,
        };
        if let Some(target) = &self.target {
            for (id, node) in &target.nodes {
                frame.nodes.insert(
                    id.clone(),
                    NodeFrame {
                        position: Point::new(node.x, node.y),
                        opacity: 1.0,
                        scale: 1.0,
                    },
                );
            }
            for edge in &target.edges {
                frame.edges.insert(
                    edge.id.clone(),
                    EdgeFrame {
                        points: edge.points.clone(),
                        opacity: 1.0,
                    },
                );
            }
        }
        frame
    }

    fn build_plan(&self, from: &Frame, next: &LayoutResult) -> AnimationPlan {
        let mut transitions = Vec::new();
        let mut enters = 0u64;

        for (id, node) in &next.nodes {
            let to = Point::new(node.x, node.y);
            match from.nodes.get(id) {
                None => {
                    transitions.push(Transition {
                        id: id.clone(),
                        kind: TransitionKind::EnterNode { to },
                        delay_ms: enters * self.config.stagger_ms,
                        duration_ms: self.config.enter_duration_ms,
                        easing: Easing::EaseOut,
                    });
                    enters += 1;
                }
                Some(frame) if distance(frame.position, to) > 0.5 => {
                    transitions.push(Transition {
                        id: id.clone(),
                        kind: TransitionKind::MoveNode {
                            from: frame.position,
                            to,
                        },
                        delay_ms: 0,
                        duration_ms: self.config.move_duration_ms,
                        easing: Easing::CubicBezier(0.25, 0.1, 0.25, 1.0),
                    });
                }
                Some(_) => {}
            }
        }
        for (id, frame) in &from.nodes {
            if !next.nodes.contains_key(id) {
                transitions.push(Transition {
                    id: id.clone(),
                    kind: TransitionKind::ExitNode {
                        from: frame.position,
                    },
                    delay_ms: 0,
                    duration_ms: self.config.exit_duration_ms,
                    easing: Easing::EaseIn,
                });
            }
        }

        for edge in &next.edges {
            match from.edges.get(&edge.id) {
                None => {
                    transitions.push(Transition {
                        id: edge.id.clone(),
                        kind: TransitionKind::EnterEdge {
                            to: edge.points.clone(),
                        },
                        delay_ms: 0,
                        duration_ms: self.config.enter_duration_ms,
                        easing: Easing::EaseOut,
                    });
                }
                Some(frame) if polyline_changed(&frame.points, &edge.points) => {
                    transitions.push(Transition {
                        id: edge.id.clone(),
                        kind: TransitionKind::MoveEdge {
                            from: resample(&frame.points, EDGE_SAMPLES),
                            to: resample(&edge.points, EDGE_SAMPLES),
                        },
                        delay_ms: 0,
                        duration_ms: self.config.move_duration_ms,
                        easing: Easing::CubicBezier(0.25, 0.1, 0.25, 1.0),
                    });
                }
                Some(_) => {}
            }
        }
        for (id, frame) in &from.edges {
            if next.edge(id).is_none() {
                transitions.push(Transition {
                    id: id.clone(),
                    kind: TransitionKind::ExitEdge {
                        from: frame.points.clone(),
                    },
                    delay_ms: 0,
                    duration_ms: self.config.exit_duration_ms,
                    easing: Easing::EaseIn,
                });
            }
        }

        AnimationPlan {
            version: next.version,
            transitions,
        }
    }

    /// Samples the animation at `now_ms`. Finished transitions snap to
    /// their exact target geometry (bends from the layout, not resampled).
    pub fn sample(&self, now_ms: u64) -> Frame {
        let mut frame = Frame {
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            settled: true,
        };
        let Some(target) = &self.target else {
            return frame;
        };

        for (id, node) in &target.nodes {
            frame.nodes.insert(
                id.clone(),
                NodeFrame {
                    position: Point::new(node.x, node.y),
                    opacity: 1.0,
                    scale: 1.0,
                },
            );
        }
        for edge in &target.edges {
            frame.edges.insert(
                edge.id.clone(),
                EdgeFrame {
                    points: edge.points.clone(),
                    opacity: 1.0,
                },
            );
        }

        let Some(active) = &self.active else {
            return frame;
        };
        let elapsed = now_ms.saturating_sub(active.started_ms);

        for transition in &active.plan.transitions {
            let done = transition.finished(elapsed);
            if !done {
                frame.settled = false;
            }
            let t = transition.easing.eval(transition.progress(elapsed));
            match &transition.kind {
                TransitionKind::EnterNode { to } => {
                    if !done {
                        let scale =
                            self.config.enter_scale_from + (1.0 - self.config.enter_scale_from) * t;
                        frame.nodes.insert(
                            transition.id.clone(),
                            NodeFrame {
                                position: *to,
                                opacity: t,
                                scale,
                            },
                        );
                    }
                }
                TransitionKind::ExitNode { from } => {
                    if done {
                        frame.nodes.remove(&transition.id);
                    } else {
                        frame.nodes.insert(
                            transition.id.clone(),
                            NodeFrame {
                                position: *from,
                                opacity: 1.0 - t,
                                scale: 1.0,
                            },
                        );
                    }
                }
                TransitionKind::MoveNode { from, to } => {
                    if !done {
                        frame.nodes.insert(
                            transition.id.clone(),
                            NodeFrame {
                                position: lerp_point(*from, *to, t),
                                opacity: 1.0,
                                scale: 1.0,
                            },
                        );
                    }
                }
                TransitionKind::EnterEdge { to } => {
                    if !done {
                        frame.edges.insert(
                            transition.id.clone(),
                            EdgeFrame {
                                points: to.clone(),
                                opacity: t,
                            },
                        );
                    }
                }
                TransitionKind::ExitEdge { from } => {
                    if done {
                        frame.edges.remove(&transition.id);
                    } else {
                        frame.edges.insert(
                            transition.id.clone(),
                            EdgeFrame {
                                points: from.clone(),
                                opacity: 1.0 - t,
                            },
                        );
                    }
                }
                TransitionKind::MoveEdge { from, to } => {
                    if !done {
                        let points = from
                            .iter()
                            .zip(to)
                            .map(|(&a, &b)| lerp_point(a, b, t))
                            .collect();
                        frame.edges.insert(
                            transition.id.clone(),
                            EdgeFrame {
                                points,
                                opacity: 1.0,
                            },
                        );
                    }
                }
            }
        }
        frame
    }

    pub fn is_settled(&self, now_ms: u64) -> bool {
        match &self.active {
            None => true,
            Some(active) => {
                let elapsed = now_ms.saturating_sub(active.started_ms);
                active
                    .plan
                    .transitions
                    .iter()
                    .all(|transition| transition.finished(elapsed))
            }
        }
    }
}

fn distance(a: Point, b: Point) -> f32 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

fn lerp_point(a: Point, b: Point, t: f32) -> Point {
    Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
}

fn polyline_changed(a: &[Point], b: &[Point]) -> bool {
    a.len() != b.len()
        || a.iter()
            .zip(b)
            .any(|(p, q)| (p.x - q.x).abs() > 0.5 || (p.y - q.y).abs() > 0.5)
}

/// Evenly respaces a polyline along its arc length so two routes with a
/// different bend count can be interpolated point for point.
fn resample(points: &[Point], count: usize) -> Vec<Point> {
    if points.is_empty() {
        return Vec::new();
    }
    if points.len() == 1 || count < 2 {
        return vec![points[0]; count.max(1)];
    }

    let mut lengths = Vec::with_capacity(points.len() - 1);
    let mut total = 0.0f32;
    for pair in points.windows(2) {
        let len = distance(pair[0], pair[1]);
        lengths.push(len);
        total += len;
    }
    if total <= f32::EPSILON {
        return vec![points[0]; count];
    }

    let mut out = Vec::with_capacity(count);
    out.push(points[0]);
    let mut segment = 0usize;
    let mut walked = 0.0f32;
    for i in 1..count - 1 {
        let goal = total * i as f32 / (count - 1) as f32;
        while segment < lengths.len() - 1 && walked + lengths[segment] < goal {
            walked += lengths[segment];
            segment += 1;
        }
        let within = if lengths[segment] <= f32::EPSILON {
            0.0
        } else {
            (goal - walked) / lengths[segment]
        };
        out.push(lerp_point(points[segment], points[segment + 1], within));
    }
    out.push(points[points.len() - 1]);
    out
}
