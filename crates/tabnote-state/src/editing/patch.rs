use std::ops::Range;

use crate::change::ChangeSet;
use crate::selection::EditorSelection;

/// Result of dispatching a transaction
#[derive(Debug, Clone)]
pub struct Patch {
    /// Changed ranges in the new document
    pub changed: Vec<Range<usize>>,
    pub new_selection: EditorSelection,
    pub version: u64,
    /// The applied changes, for mapping derived state
    pub changes: ChangeSet,
}
