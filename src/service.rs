//! The diagram service serializes mutations against a single document,
//! schedules layout recomputation, and guarantees that the layout handed to
//! subscribers always corresponds to the latest document version.

use crate::config::LayoutConfig;
use crate::graph::{Document, Edge, GraphError, Node};
use crate::history::History;
use crate::layout::{LayoutError, LayoutResult, compute_layout};
use crate::registry::{NodeTypeRegistry, RegistryError};
use crate::theme::Theme;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EditorError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Idle,
    Mutating,
    LayoutPending,
    LayoutReady,
}

/// A single document mutation. `RestoreNode`/`RestoreEdge` reinsert removed
/// elements with their original identity; undo and document loading depend
/// on them.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    AddNode {
        kind: String,
        payload: serde_json::Value,
    },
    RemoveNode {
        id: String,
    },
    AddEdge {
        source: String,
        source_port: String,
        target: String,
        target_port: String,
    },
    RemoveEdge {
        id: String,
    },
    SetLabel {
        id: String,
        label: String,
    },
    SetPayload {
        id: String,
        payload: serde_json::Value,
    },
    PinPosition {
        id: String,
        position: Option<(f32, f32)>,
    },
    RestoreNode {
        node: Node,
    },
    RestoreEdge {
        edge: Edge,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    NodeAdded { id: String },
    NodeRemoved { id: String, removed_edges: Vec<String> },
    EdgeAdded { id: String },
    EdgeRemoved { id: String },
    Updated { id: String },
}

/// Inverse mutation pair recorded per applied mutation.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub description: String,
    pub undo: Vec<Mutation>,
    pub redo: Vec<Mutation>,
}

/// Snapshot handed to a layout runner. The document clone carries the
/// version the result will be tagged with.
pub struct LayoutJob {
    pub document: Document,
    pub theme: Theme,
    pub config: LayoutConfig,
}

impl LayoutJob {
    pub fn run(&self) -> Result<LayoutResult, LayoutError> {
        compute_layout(&self.document, &self.theme, &self.config)
    }

    pub fn version(&self) -> u64 {
        self.document.version()
    }
}

/// Seam between the service and layout execution. A newer submission
/// supersedes older ones only through version checking on the service side;
/// runners never cancel work in flight (the algorithm has no safe abort
/// point), they just let stale results surface and get discarded. Results
/// carry the version of the job they were computed from so failures can be
/// version-checked too.
pub trait LayoutRunner {
    fn submit(&mut self, job: LayoutJob);
    /// At most one finished result per call, oldest first.
    fn poll(&mut self) -> Option<(u64, Result<LayoutResult, LayoutError>)>;
}

/// Computes on the caller's thread at poll time. Keeps only the latest job,
/// so a burst of mutations costs one layout.
#[derive(Default)]
pub struct InlineRunner {
    pending: Option<LayoutJob>,
}

impl LayoutRunner for InlineRunner {
    fn submit(&mut self, job: LayoutJob) {
        self.pending = Some(job);
    }

    fn poll(&mut self) -> Option<(u64, Result<LayoutResult, LayoutError>)> {
        self.pending.take().map(|job| (job.version(), job.run()))
    }
}

/// Runs each job on its own worker thread; results come back over a channel
/// in completion order. Superseded jobs run to completion and are discarded
/// by the service's version check.
pub struct ThreadedRunner {
    sender: Sender<(u64, Result<LayoutResult, LayoutError>)>,
    receiver: Receiver<(u64, Result<LayoutResult, LayoutError>)>,
}

impl ThreadedRunner {
    pub fn new() -> Self {
        let (sender, receiver) = channel();
        Self { sender, receiver }
    }
}

impl Default for ThreadedRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutRunner for ThreadedRunner {
    fn submit(&mut self, job: LayoutJob) {
        let sender = self.sender.clone();
        std::thread::spawn(move || {
            // The receiver may be gone if the service was dropped.
            let version = job.version();
            let _ = sender.send((version, job.run()));
        });
    }

    fn poll(&mut self) -> Option<(u64, Result<LayoutResult, LayoutError>)> {
        self.receiver.try_recv().ok()
    }
}

type Listener = Box<dyn FnMut(&LayoutResult)>;

pub struct DiagramService<R: LayoutRunner = InlineRunner> {
    document: Document,
    theme: Theme,
    layout_config: LayoutConfig,
    state: ServiceState,
    runner: R,
    current_layout: Option<LayoutResult>,
    listeners: Vec<(usize, Listener)>,
    next_listener_id: usize,
    history: History<HistoryEntry>,
}

impl DiagramService<InlineRunner> {
    pub fn new(registry: Arc<NodeTypeRegistry>) -> Self {
        Self::with_runner(
            Document::new(registry),
            Theme::modern(),
            LayoutConfig::default(),
            InlineRunner::default(),
        )
    }
}

impl<R: LayoutRunner> DiagramService<R> {
    pub fn with_runner(
        document: Document,
        theme: Theme,
        layout_config: LayoutConfig,
        runner: R,
    ) -> Self {
        Self {
            document,
            theme,
            layout_config,
            state: ServiceState::Idle,
            runner,
            current_layout: None,
            listeners: Vec::new(),
            next_listener_id: 0,
            history: History::new(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    /// The last settled layout. May lag the document while a layout is
    /// pending; it always corresponds to *some* fully settled version.
    pub fn current_layout(&self) -> Option<&LayoutResult> {
        self.current_layout.as_ref()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&LayoutResult) + 'static) -> usize {
        let id = self.next_listener_id;
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: usize) {
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
    }

    /// Applies one mutation. On success the service moves to
    /// `LayoutPending` and a fresh layout job is submitted; a mutation
    /// arriving while one is already pending simply supersedes it (the old
    /// result fails the version check when it lands). On failure the
    /// document is untouched and the previous state is restored.
    pub fn apply_mutation(&mut self, mutation: Mutation) -> Result<MutationOutcome, EditorError> {
        self.state = ServiceState::Mutating;
        match self.apply_to_document(&mutation) {
            Ok((outcome, entry)) => {
                self.history.push(entry);
                self.state = ServiceState::LayoutPending;
                self.submit_layout();
                Ok(outcome)
            }
            Err(err) => {
                self.state = if self.layout_is_current() {
                    ServiceState::Idle
                } else {
                    ServiceState::LayoutPending
                };
                Err(err)
            }
        }
    }

    /// Applies a sequence of mutations as one history batch. Layout is
    /// submitted once per mutation but only the final version ever settles.
    pub fn apply_batch(
        &mut self,
        description: &str,
        mutations: Vec<Mutation>,
    ) -> Result<Vec<MutationOutcome>, EditorError> {
        self.history.begin_batch();
        let mut outcomes = Vec::with_capacity(mutations.len());
        for mutation in mutations {
            match self.apply_mutation(mutation) {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    self.fold_batch(description);
                    return Err(err);
                }
            }
        }
        self.fold_batch(description);
        Ok(outcomes)
    }

    /// Requests a layout for the document as it stands, without mutating.
    /// Used after loading a document or changing layout parameters.
    pub fn refresh(&mut self) {
        self.state = ServiceState::LayoutPending;
        self.submit_layout();
    }

    /// Starts collecting subsequent mutations into one undo step. Paired
    /// with [`end_batch`](Self::end_batch).
    pub fn begin_batch(&mut self) {
        self.history.begin_batch();
    }

    pub fn end_batch(&mut self, description: &str) {
        self.fold_batch(description);
    }

    fn fold_batch(&mut self, description: &str) {
        let entries = self.history.commit_batch();
        if entries.is_empty() {
            return;
        }
        let undo = entries
            .iter()
            .rev()
            .flat_map(|entry| entry.undo.iter().cloned())
            .collect();
        let redo = entries
            .iter()
            .flat_map(|entry| entry.redo.iter().cloned())
            .collect();
        self.history.push(HistoryEntry {
            description: description.to_string(),
            undo,
            redo,
        });
    }

    /// Collects finished layout results. Stale results and stale failures
    /// (job version behind the document) are discarded; a matching success
    /// settles the service: the layout is stored, listeners fire exactly
    /// once, and the state returns to `Idle`. Only a failure of the current
    /// version is surfaced.
    pub fn poll(&mut self) -> Result<Option<&LayoutResult>, EditorError> {
        if self.state != ServiceState::LayoutPending {
            return Ok(None);
        }
        loop {
            match self.runner.poll() {
                None => return Ok(None),
                Some((version, _)) if version != self.document.version() => continue,
                Some((_, Ok(result))) => {
                    self.current_layout = Some(result);
                    self.state = ServiceState::LayoutReady;
                    if let Some(layout) = self.current_layout.take() {
                        for (_, listener) in &mut self.listeners {
                            listener(&layout);
                        }
                        self.current_layout = Some(layout);
                    }
                    self.state = ServiceState::Idle;
                    return Ok(self.current_layout.as_ref());
                }
                Some((_, Err(err))) => {
                    // The previous layout stays on screen; the failure is
                    // surfaced, not swallowed.
                    self.state = ServiceState::Idle;
                    return Err(err.into());
                }
            }
        }
    }

    /// Drives the state machine until it settles or a layout error occurs.
    pub fn settle(&mut self) -> Result<(), EditorError> {
        while self.state == ServiceState::LayoutPending {
            let advanced = self.poll()?.is_some();
            if !advanced && self.state == ServiceState::LayoutPending {
                std::thread::sleep(Duration::from_millis(1));
            }
        }
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> Result<bool, EditorError> {
        let Some(entry) = self.history.undo() else {
            return Ok(false);
        };
        self.replay(&entry.undo)?;
        self.state = ServiceState::LayoutPending;
        self.submit_layout();
        Ok(true)
    }

    pub fn redo(&mut self) -> Result<bool, EditorError> {
        let Some(entry) = self.history.redo() else {
            return Ok(false);
        };
        self.replay(&entry.redo)?;
        self.state = ServiceState::LayoutPending;
        self.submit_layout();
        Ok(true)
    }

    fn replay(&mut self, mutations: &[Mutation]) -> Result<(), EditorError> {
        self.history.pause();
        let result = mutations
            .iter()
            .try_for_each(|mutation| self.apply_to_document(mutation).map(|_| ()));
        self.history.resume();
        result
    }

    fn layout_is_current(&self) -> bool {
        self.current_layout
            .as_ref()
            .is_some_and(|layout| layout.version == self.document.version())
            || self.document.version() == 0
    }

    fn submit_layout(&mut self) {
        self.runner.submit(LayoutJob {
            document: self.document.clone(),
            theme: self.theme.clone(),
            config: self.layout_config.clone(),
        });
    }

    fn apply_to_document(
        &mut self,
        mutation: &Mutation,
    ) -> Result<(MutationOutcome, HistoryEntry), EditorError> {
        match mutation {
            Mutation::AddNode { kind, payload } => {
                let id = self.document.add_node(kind, payload.clone())?;
                let node = self.document.node(&id).cloned().unwrap_or_else(|| {
                    unreachable!("node {id} was just inserted");
                });
                Ok((
                    MutationOutcome::NodeAdded { id: id.clone() },
                    HistoryEntry {
                        description: format!("add {kind} node"),
                        undo: vec![Mutation::RemoveNode { id }],
                        redo: vec![Mutation::RestoreNode { node }],
                    },
                ))
            }
            Mutation::RemoveNode { id } => {
                let (node, edges) = self.document.remove_node(id)?;
                let removed_edges: Vec<String> = edges.iter().map(|e| e.id.clone()).collect();
                let mut undo = vec![Mutation::RestoreNode { node: node.clone() }];
                undo.extend(edges.into_iter().map(|edge| Mutation::RestoreEdge { edge }));
                Ok((
                    MutationOutcome::NodeRemoved {
                        id: id.clone(),
                        removed_edges,
                    },
                    HistoryEntry {
                        description: format!("remove {} node", node.kind),
                        undo,
                        redo: vec![Mutation::RemoveNode { id: id.clone() }],
                    },
                ))
            }
            Mutation::AddEdge {
                source,
                source_port,
                target,
                target_port,
            } => {
                let id = self
                    .document
                    .add_edge(source, source_port, target, target_port)?;
                let edge = self.document.edge(&id).cloned().unwrap_or_else(|| {
                    unreachable!("edge {id} was just inserted");
                });
                Ok((
                    MutationOutcome::EdgeAdded { id: id.clone() },
                    HistoryEntry {
                        description: "add connection".to_string(),
                        undo: vec![Mutation::RemoveEdge { id }],
                        redo: vec![Mutation::RestoreEdge { edge }],
                    },
                ))
            }
            Mutation::RemoveEdge { id } => {
                let edge = self.document.remove_edge(id)?;
                Ok((
                    MutationOutcome::EdgeRemoved { id: id.clone() },
                    HistoryEntry {
                        description: "remove connection".to_string(),
                        undo: vec![Mutation::RestoreEdge { edge }],
                        redo: vec![Mutation::RemoveEdge { id: id.clone() }],
                    },
                ))
            }
            Mutation::SetLabel { id, label } => {
                let previous = self.document.set_label(id, label)?;
                Ok((
                    MutationOutcome::Updated { id: id.clone() },
                    HistoryEntry {
                        description: "rename node".to_string(),
                        undo: vec![Mutation::SetLabel {
                            id: id.clone(),
                            label: previous,
                        }],
                        redo: vec![mutation.clone()],
                    },
                ))
            }
            Mutation::SetPayload { id, payload } => {
                let previous = self.document.set_payload(id, payload.clone())?;
                Ok((
                    MutationOutcome::Updated { id: id.clone() },
                    HistoryEntry {
                        description: "edit node".to_string(),
                        undo: vec![Mutation::SetPayload {
                            id: id.clone(),
                            payload: previous,
                        }],
                        redo: vec![mutation.clone()],
                    },
                ))
            }
            Mutation::PinPosition { id, position } => {
                let previous = self.document.set_pinned_position(id, *position)?;
                Ok((
                    MutationOutcome::Updated { id: id.clone() },
                    HistoryEntry {
                        description: "move node".to_string(),
                        undo: vec![Mutation::PinPosition {
                            id: id.clone(),
                            position: previous,
                        }],
                        redo: vec![mutation.clone()],
                    },
                ))
            }
            Mutation::RestoreNode { node } => {
                self.document.restore_node(node.clone())?;
                Ok((
                    MutationOutcome::NodeAdded {
                        id: node.id.clone(),
                    },
                    HistoryEntry {
                        description: format!("add {} node", node.kind),
                        undo: vec![Mutation::RemoveNode {
                            id: node.id.clone(),
                        }],
                        redo: vec![mutation.clone()],
                    },
                ))
            }
            Mutation::RestoreEdge { edge } => {
                self.document.restore_edge(edge.clone())?;
                Ok((
                    MutationOutcome::EdgeAdded {
                        id: edge.id.clone(),
                    },
                    HistoryEntry {
                        description: "add connection".to_string(),
                        undo: vec![Mutation::RemoveEdge {
                            id: edge.id.clone(),
                        }],
                        redo: vec![mutation.clone()],
                    },
                ))
            }
        }
    }
}
