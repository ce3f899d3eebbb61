//! Bounded undo/redo stacks with batching. The history is generic over the
//! entry type; the diagram service stores inverse mutation pairs in it.

/// Default cap on the undo stack; oldest entries fall off first.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Debug)]
pub struct History<T> {
    undo_stack: Vec<T>,
    redo_stack: Vec<T>,
    limit: usize,
    recording: bool,
    batch: Option<Vec<T>>,
}

impl<T: Clone> History<T> {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            limit: limit.max(1),
            recording: true,
            batch: None,
        }
    }

    /// Records an entry. New entries invalidate the redo stack. Ignored
    /// while recording is paused (i.e. during undo/redo replay).
    pub fn push(&mut self, entry: T) {
        if !self.recording {
            return;
        }
        if let Some(batch) = &mut self.batch {
            batch.push(entry);
            return;
        }
        self.undo_stack.push(entry);
        self.redo_stack.clear();
        if self.undo_stack.len() > self.limit {
            self.undo_stack.remove(0);
        }
    }

    /// Pops the latest entry for replay and moves it to the redo stack.
    pub fn undo(&mut self) -> Option<T> {
        let entry = self.undo_stack.pop()?;
        self.redo_stack.push(entry.clone());
        Some(entry)
    }

    /// Pops the latest undone entry for replay and moves it back.
    pub fn redo(&mut self) -> Option<T> {
        let entry = self.redo_stack.pop()?;
        self.undo_stack.push(entry.clone());
        Some(entry)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.batch = None;
    }

    /// Collect subsequent entries into one batch until `commit_batch`.
    pub fn begin_batch(&mut self) {
        if self.batch.is_none() {
            self.batch = Some(Vec::new());
        }
    }

    /// Finishes the batch and returns its entries so the caller can fold
    /// them into a single composite entry. Empty batches record nothing.
    pub fn commit_batch(&mut self) -> Vec<T> {
        self.batch.take().unwrap_or_default()
    }

    pub fn pause(&mut self) {
        self.recording = false;
    }

    pub fn resume(&mut self) {
        self.recording = true;
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }
}

impl<T: Clone> Default for History<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undo_moves_entries_to_the_redo_stack() {
        let mut history: History<u32> = History::new();
        history.push(1);
        history.push(2);
        assert_eq!(history.undo(), Some(2));
        assert!(history.can_redo());
        assert_eq!(history.redo(), Some(2));
        assert_eq!(history.undo(), Some(2));
        assert_eq!(history.undo(), Some(1));
        assert_eq!(history.undo(), None);
    }

    #[test]
    fn new_entries_clear_the_redo_stack() {
        let mut history: History<u32> = History::new();
        history.push(1);
        history.undo();
        history.push(2);
        assert!(!history.can_redo());
    }

    #[test]
    fn stack_is_bounded() {
        let mut history: History<u32> = History::with_limit(3);
        for n in 0..10 {
            history.push(n);
        }
        assert_eq!(history.undo(), Some(9));
        assert_eq!(history.undo(), Some(8));
        assert_eq!(history.undo(), Some(7));
        assert_eq!(history.undo(), None);
    }

    #[test]
    fn paused_history_records_nothing() {
        let mut history: History<u32> = History::new();
        history.pause();
        history.push(1);
        history.resume();
        assert!(!history.can_undo());
    }

    #[test]
    fn batch_collects_until_commit() {
        let mut history: History<u32> = History::new();
        history.begin_batch();
        history.push(1);
        history.push(2);
        let batch = history.commit_batch();
        assert_eq!(batch, vec![1, 2]);
        assert!(!history.can_undo());
    }
}
