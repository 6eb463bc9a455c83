use crate::change::{Assoc, ChangeDesc, ChangeSet, ChangeSpec};
use crate::error::StateError;
use crate::selection::{EditorSelection, SelectionRange, check_selection};

/// An edit request, resolved by [`crate::Document::transaction`].
#[derive(Debug, Clone, Default)]
pub struct TransactionSpec {
    pub changes: Option<ChangeSpec>,
    /// Selection after the changes, in the changed document's coordinates.
    pub selection: Option<EditorSelection>,
    /// Positions refer to the document produced by the preceding specs
    /// instead of the original one.
    pub sequential: bool,
}

impl TransactionSpec {
    pub fn changes(changes: impl Into<ChangeSpec>) -> Self {
        Self {
            changes: Some(changes.into()),
            ..Self::default()
        }
    }

    pub fn selection(selection: EditorSelection) -> Self {
        Self {
            selection: Some(selection),
            ..Self::default()
        }
    }

    pub fn with_selection(mut self, selection: EditorSelection) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn sequential(mut self) -> Self {
        self.sequential = true;
        self
    }
}

/// What [`crate::Document::change_by_range`] expects back for each range.
#[derive(Debug, Clone)]
pub struct RangeEdit {
    /// The range after its own changes.
    pub range: SelectionRange,
    pub changes: Option<ChangeSpec>,
}

impl RangeEdit {
    pub fn new(range: SelectionRange, changes: impl Into<ChangeSpec>) -> Self {
        Self {
            range,
            changes: Some(changes.into()),
        }
    }

    /// Move the range without changing the document.
    pub fn select(range: SelectionRange) -> Self {
        Self { range, changes: None }
    }
}

/// A resolved edit, ready to dispatch against the document version it was
/// built from.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub(crate) changes: ChangeSet,
    pub(crate) selection: Option<EditorSelection>,
    pub(crate) start_version: u64,
}

impl Transaction {
    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// The explicit selection, if any spec set one.
    pub fn selection(&self) -> Option<&EditorSelection> {
        self.selection.as_ref()
    }

    pub fn start_version(&self) -> u64 {
        self.start_version
    }

    pub fn doc_changed(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// Changes and selection of a single spec, or of several merged ones.
#[derive(Debug)]
pub(crate) struct Resolved {
    pub(crate) changes: ChangeSet,
    pub(crate) selection: Option<EditorSelection>,
}

impl Resolved {
    pub(crate) fn new(changes: ChangeSet, selection: Option<EditorSelection>) -> Result<Self, StateError> {
        if let Some(selection) = &selection {
            check_selection(selection, changes.new_len())?;
        }
        Ok(Self { changes, selection })
    }

    /// Fold `next` into `self`. A sequential `next` applies on top of
    /// `self`; otherwise both describe the same document and `next` is
    /// rebased over `self`.
    pub(crate) fn merge(self, next: Resolved, sequential: bool) -> Result<Resolved, StateError> {
        let (map_for_a, map_for_b, changes) = if sequential {
            let changes = self.changes.compose(&next.changes)?;
            let map_for_b = ChangeSet::empty(next.changes.new_len()).into_desc();
            (next.changes.into_desc(), map_for_b, changes)
        } else {
            let map_for_a = next.changes.map(self.changes.desc(), false)?;
            let map_for_b: ChangeDesc = self.changes.map_desc(next.changes.desc(), true)?;
            let changes = self.changes.compose(&map_for_a)?;
            (map_for_a.into_desc(), map_for_b, changes)
        };
        let selection = match (next.selection, self.selection) {
            (Some(selection), _) => Some(selection.map(&map_for_b, Assoc::Before)),
            (None, Some(selection)) => Some(selection.map(&map_for_a, Assoc::Before)),
            (None, None) => None,
        };
        Ok(Resolved { changes, selection })
    }
}
