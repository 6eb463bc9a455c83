use std::collections::VecDeque;

use crate::change::ChangeSet;
use crate::selection::EditorSelection;

/// One undoable step: the changes that revert an edit and the selection
/// from before it.
#[derive(Debug, Clone)]
pub(crate) struct HistoryEntry {
    pub(crate) changes: ChangeSet,
    pub(crate) selection: EditorSelection,
}

/// Linear undo and redo stacks. A new edit clears the redo stack.
#[derive(Debug, Clone)]
pub(crate) struct History {
    done: VecDeque<HistoryEntry>,
    undone: Vec<HistoryEntry>,
    depth: usize,
}

impl History {
    pub(crate) fn new(depth: usize) -> Self {
        Self {
            done: VecDeque::new(),
            undone: Vec::new(),
            depth,
        }
    }

    pub(crate) fn record(&mut self, entry: HistoryEntry) {
        self.undone.clear();
        if self.depth == 0 {
            return;
        }
        if self.done.len() == self.depth {
            self.done.pop_front();
        }
        self.done.push_back(entry);
    }

    pub(crate) fn pop_undo(&mut self) -> Option<HistoryEntry> {
        self.done.pop_back()
    }

    pub(crate) fn pop_redo(&mut self) -> Option<HistoryEntry> {
        self.undone.pop()
    }

    pub(crate) fn push_undo(&mut self, entry: HistoryEntry) {
        self.done.push_back(entry);
    }

    pub(crate) fn push_redo(&mut self, entry: HistoryEntry) {
        self.undone.push(entry);
    }

    pub(crate) fn can_undo(&self) -> bool {
        !self.done.is_empty()
    }

    pub(crate) fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    pub(crate) fn undo_depth(&self) -> usize {
        self.done.len()
    }
}
