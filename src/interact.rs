//! Pointer and gesture handling. The controller owns the ephemeral state
//! (press, drag preview, pending connection, selection) and turns completed
//! gestures into document mutations. While a drag is in flight the document
//! is never touched; only the release commits, as a single pin mutation.

use crate::config::InteractionConfig;
use crate::layout::Point;
use crate::service::{DiagramService, EditorError, LayoutRunner, Mutation, MutationOutcome};
use serde_json::json;

#[derive(Debug, Clone, PartialEq)]
pub enum GestureEvent {
    PointerDown {
        x: f32,
        y: f32,
        /// Node under the pointer, if any.
        node: Option<String>,
    },
    PointerMove {
        x: f32,
        y: f32,
    },
    PointerUp {
        x: f32,
        y: f32,
    },
    /// Pointer left an output port with the button held.
    ConnectStart {
        node: String,
        port: String,
    },
    /// Pointer released over an input port.
    ConnectDrop {
        node: String,
        port: String,
    },
    ConnectCancel,
    DeleteSelection,
    /// A palette entry was dropped onto the canvas.
    PaletteDrop {
        kind: String,
        x: f32,
        y: f32,
    },
}

/// What the host should do after a gesture: repaint a preview, update the
/// selection chrome, or nothing (mutations announce themselves through the
/// service's layout notifications).
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionEffect {
    None,
    SelectionChanged(Vec<String>),
    /// Ghost position for the dragged node; the document still holds the
    /// old one.
    DragPreview { node: String, x: f32, y: f32 },
    Mutated(MutationOutcome),
}

#[derive(Debug, Clone, PartialEq)]
enum PointerState {
    Idle,
    /// Pressed but not yet past the drag threshold.
    Pressed {
        node: String,
        start: Point,
        origin: Point,
    },
    Dragging {
        node: String,
        start: Point,
        origin: Point,
        current: Point,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct PendingConnection {
    node: String,
    port: String,
}

pub struct InteractionController {
    config: InteractionConfig,
    pointer: PointerState,
    connection: Option<PendingConnection>,
    selection: Vec<String>,
}

impl InteractionController {
    pub fn new(config: InteractionConfig) -> Self {
        Self {
            config,
            pointer: PointerState::Idle,
            connection: None,
            selection: Vec::new(),
        }
    }

    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.pointer, PointerState::Dragging { .. })
    }

    pub fn pending_connection(&self) -> Option<(&str, &str)> {
        self.connection
            .as_ref()
            .map(|c| (c.node.as_str(), c.port.as_str()))
    }

    pub fn handle<R: LayoutRunner>(
        &mut self,
        event: GestureEvent,
        service: &mut DiagramService<R>,
    ) -> Result<InteractionEffect, EditorError> {
        match event {
            GestureEvent::PointerDown { x, y, node } => match node {
                Some(node) => {
                    let origin = service
                        .current_layout()
                        .and_then(|layout| layout.node(&node))
                        .map(|n| Point::new(n.x, n.y))
                        .unwrap_or(Point::new(x, y));
                    self.pointer = PointerState::Pressed {
                        node: node.clone(),
                        start: Point::new(x, y),
                        origin,
                    };
                    self.selection = vec![node];
                    Ok(InteractionEffect::SelectionChanged(self.selection.clone()))
                }
                None => {
                    self.pointer = PointerState::Idle;
                    if self.selection.is_empty() {
                        Ok(InteractionEffect::None)
                    } else {
                        self.selection.clear();
                        Ok(InteractionEffect::SelectionChanged(Vec::new()))
                    }
                }
            },
            GestureEvent::PointerMove { x, y } => {
                let position = Point::new(x, y);
                match &self.pointer {
                    PointerState::Pressed { node, start, origin } => {
                        let travel = ((x - start.x).powi(2) + (y - start.y).powi(2)).sqrt();
                        if travel < self.config.drag_threshold {
                            return Ok(InteractionEffect::None);
                        }
                        let (node, start, origin) = (node.clone(), *start, *origin);
                        self.pointer = PointerState::Dragging {
                            node: node.clone(),
                            start,
                            origin,
                            current: position,
                        };
                        Ok(self.preview())
                    }
                    PointerState::Dragging {
                        node,
                        start,
                        origin,
                    .. } => {
                        let (node, start, origin) = (node.clone(), *start, *origin);
                        self.pointer = PointerState::Dragging {
                            node,
                            start,
                            origin,
                            current: position,
                        };
                        Ok(self.preview())
                    }
                    PointerState::Idle => Ok(InteractionEffect::None),
                }
            }
            GestureEvent::PointerUp { x, y } => {
                let pointer = std::mem::replace(&mut self.pointer, PointerState::Idle);
                match pointer {
                    PointerState::Dragging {
                        node,
                        start,
                        origin,
                        ..
                    } => {
                        let outcome = service.apply_mutation(Mutation::PinPosition {
                            id: node,
                            position: Some((origin.x + (x - start.x), origin.y + (y - start.y))),
                        })?;
                        Ok(InteractionEffect::Mutated(outcome))
                    }
                    // A press without travel is a click; selection already
                    // happened on the way down.
                    _ => Ok(InteractionEffect::None),
                }
            }
            GestureEvent::ConnectStart { node, port } => {
                self.connection = Some(PendingConnection { node, port });
                Ok(InteractionEffect::None)
            }
            GestureEvent::ConnectDrop { node, port } => {
                let Some(pending) = self.connection.take() else {
                    return Ok(InteractionEffect::None);
                };
                let outcome = service.apply_mutation(Mutation::AddEdge {
                    source: pending.node,
                    source_port: pending.port,
                    target: node,
                    target_port: port,
                })?;
                Ok(InteractionEffect::Mutated(outcome))
            }
            GestureEvent::ConnectCancel => {
                self.connection = None;
                Ok(InteractionEffect::None)
            }
            GestureEvent::DeleteSelection => {
                if self.selection.is_empty() {
                    return Ok(InteractionEffect::None);
                }
                let doomed = std::mem::take(&mut self.selection);
                service.begin_batch();
                for id in &doomed {
                    // A selected node may already be gone via edge cascade.
                    if service.document().node(id).is_some() {
                        let result = service.apply_mutation(Mutation::RemoveNode { id: id.clone() });
                        if let Err(err) = result {
                            service.end_batch("delete selection");
                            return Err(err);
                        }
                    }
                }
                service.end_batch("delete selection");
                Ok(InteractionEffect::SelectionChanged(Vec::new()))
            }
            GestureEvent::PaletteDrop { kind, x, y } => {
                service.begin_batch();
                let outcome = match service.apply_mutation(Mutation::AddNode {
                    kind,
                    payload: json!({}),
                }) {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        service.end_batch("add node");
                        return Err(err);
                    }
                };
                if let MutationOutcome::NodeAdded { id } = &outcome {
                    let result = service.apply_mutation(Mutation::PinPosition {
                        id: id.clone(),
                        position: Some((x, y)),
                    });
                    if let Err(err) = result {
                        service.end_batch("add node");
                        return Err(err);
                    }
                    self.selection = vec![id.clone()];
                }
                service.end_batch("add node");
                Ok(InteractionEffect::Mutated(outcome))
            }
        }
    }

    fn preview(&self) -> InteractionEffect {
        match &self.pointer {
            PointerState::Dragging {
                node,
                start,
                origin,
                current,
            } => InteractionEffect::DragPreview {
                node: node.clone(),
                x: origin.x + (current.x - start.x),
                y: origin.y + (current.y - start.y),
            },
            _ => InteractionEffect::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphError;
    use crate::nodes::register_builtins;
    use crate::registry::NodeTypeRegistry;
    use crate::service::InlineRunner;
    use std::sync::Arc;

    fn service() -> DiagramService<InlineRunner> {
        let registry = NodeTypeRegistry::new();
        register_builtins(&registry).unwrap();
        DiagramService::new(Arc::new(registry))
    }

    fn controller() -> InteractionController {
        InteractionController::new(InteractionConfig::default())
    }

    fn add_node(svc: &mut DiagramService<InlineRunner>, kind: &str) -> String {
        match svc
            .apply_mutation(Mutation::AddNode {
                kind: kind.to_string(),
                payload: json!({}),
            })
            .unwrap()
        {
            MutationOutcome::NodeAdded { id } => id,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn click_selects_without_mutating() {
        let mut svc = service();
        let id = add_node(&mut svc, "code");
        svc.settle().unwrap();
        let version = svc.document().version();

        let mut ctl = controller();
        let effect = ctl
            .handle(
                GestureEvent::PointerDown {
                    x: 60.0,
                    y: 60.0,
                    node: Some(id.clone()),
                },
                &mut svc,
            )
            .unwrap();
        assert_eq!(effect, InteractionEffect::SelectionChanged(vec![id]));
        // Travel below the threshold stays a click.
        ctl.handle(GestureEvent::PointerMove { x: 62.0, y: 61.0 }, &mut svc)
            .unwrap();
        ctl.handle(GestureEvent::PointerUp { x: 62.0, y: 61.0 }, &mut svc)
            .unwrap();
        assert_eq!(svc.document().version(), version);
    }

    #[test]
    fn drag_previews_then_pins_on_release() {
        let mut svc = service();
        let id = add_node(&mut svc, "code");
        svc.settle().unwrap();
        let origin = {
            let node = svc.current_layout().unwrap().node(&id).unwrap();
            (node.x, node.y)
        };
        let version = svc.document().version();

        let mut ctl = controller();
        ctl.handle(
            GestureEvent::PointerDown {
                x: 100.0,
                y: 100.0,
                node: Some(id.clone()),
            },
            &mut svc,
        )
        .unwrap();
        let effect = ctl
            .handle(GestureEvent::PointerMove { x: 140.0, y: 130.0 }, &mut svc)
            .unwrap();
        assert!(ctl.is_dragging());
        match effect {
            InteractionEffect::DragPreview { x, y, .. } => {
                assert_eq!(x, origin.0 + 40.0);
                assert_eq!(y, origin.1 + 30.0);
            }
            other => panic!("expected a preview, got {other:?}"),
        }
        // Preview does not touch the document.
        assert_eq!(svc.document().version(), version);

        ctl.handle(GestureEvent::PointerUp { x: 140.0, y: 130.0 }, &mut svc)
            .unwrap();
        assert_eq!(svc.document().version(), version + 1);
        let pinned = svc.document().node(&id).unwrap().pinned.unwrap();
        assert_eq!(pinned, (origin.0 + 40.0, origin.1 + 30.0));
    }

    #[test]
    fn connect_gesture_adds_one_edge() {
        let mut svc = service();
        let a = add_node(&mut svc, "code");
        let b = add_node(&mut svc, "code");

        let mut ctl = controller();
        ctl.handle(
            GestureEvent::ConnectStart {
                node: a.clone(),
                port: "result".to_string(),
            },
            &mut svc,
        )
        .unwrap();
        assert_eq!(ctl.pending_connection(), Some((a.as_str(), "result")));
        let effect = ctl
            .handle(
                GestureEvent::ConnectDrop {
                    node: b.clone(),
                    port: "data".to_string(),
                },
                &mut svc,
            )
            .unwrap();
        assert!(matches!(
            effect,
            InteractionEffect::Mutated(MutationOutcome::EdgeAdded { .. })
        ));
        assert_eq!(svc.document().edges().len(), 1);
        assert!(ctl.pending_connection().is_none());
    }

    #[test]
    fn invalid_drop_surfaces_the_error_and_leaves_no_edge() {
        let mut svc = service();
        let a = add_node(&mut svc, "code");

        let mut ctl = controller();
        ctl.handle(
            GestureEvent::ConnectStart {
                node: a.clone(),
                port: "result".to_string(),
            },
            &mut svc,
        )
        .unwrap();
        // Self-connection is rejected by the document.
        let err = ctl
            .handle(
                GestureEvent::ConnectDrop {
                    node: a,
                    port: "data".to_string(),
                },
                &mut svc,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EditorError::Graph(GraphError::InvalidEndpoint(_))
        ));
        assert!(svc.document().edges().is_empty());
    }

    #[test]
    fn palette_drop_creates_a_pinned_node_in_one_undo_step() {
        let mut svc = service();
        let mut ctl = controller();
        let effect = ctl
            .handle(
                GestureEvent::PaletteDrop {
                    kind: "http_request".to_string(),
                    x: 240.0,
                    y: 180.0,
                },
                &mut svc,
            )
            .unwrap();
        let id = match effect {
            InteractionEffect::Mutated(MutationOutcome::NodeAdded { id }) => id,
            other => panic!("expected a node, got {other:?}"),
        };
        assert_eq!(
            svc.document().node(&id).unwrap().pinned,
            Some((240.0, 180.0))
        );
        assert_eq!(ctl.selection(), [id]);

        svc.undo().unwrap();
        assert!(svc.document().is_empty());
    }

    #[test]
    fn delete_selection_removes_nodes_and_incident_edges() {
        let mut svc = service();
        let a = add_node(&mut svc, "code");
        let b = add_node(&mut svc, "code");
        svc.apply_mutation(Mutation::AddEdge {
            source: a.clone(),
            source_port: "result".to_string(),
            target: b.clone(),
            target_port: "data".to_string(),
        })
        .unwrap();

        let mut ctl = controller();
        ctl.handle(
            GestureEvent::PointerDown {
                x: 0.0,
                y: 0.0,
                node: Some(a.clone()),
            },
            &mut svc,
        )
        .unwrap();
        let effect = ctl.handle(GestureEvent::DeleteSelection, &mut svc).unwrap();
        assert_eq!(effect, InteractionEffect::SelectionChanged(Vec::new()));
        assert!(svc.document().node(&a).is_none());
        assert!(svc.document().edges().is_empty());
        assert!(svc.document().node(&b).is_some());
    }
}
