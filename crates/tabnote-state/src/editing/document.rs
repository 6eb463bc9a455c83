use tabnote_config::Config;

use crate::change::{Assoc, ChangeSet, ChangeSpec, InsertText};
use crate::editing::history::{History, HistoryEntry};
use crate::editing::transaction::Resolved;
use crate::editing::{Patch, RangeEdit, Transaction, TransactionSpec};
use crate::error::StateError;
use crate::selection::{EditorSelection, SelectionRange, check_selection_in};
use crate::text::{Text, count_column, split_lines};

/// The current text and selection of one editor, with undo history
///
/// Edits never mutate the stored snapshots. Each dispatched transaction
/// swaps in a new [`Text`] and [`EditorSelection`] and bumps the version,
/// so earlier snapshots handed out by [`Document::text`] stay valid.
///
/// ```rust
/// # use tabnote_state::{Document, EditorSelection, Text};
/// let mut doc = Document::new(Text::from("one\ntwo"));
/// doc.set_selection(EditorSelection::single(4, 7)).unwrap();
///
/// let spec = doc.replace_selection("2").unwrap();
/// let patch = doc.apply(spec).unwrap();
///
/// assert_eq!(doc.text().to_string(), "one\n2");
/// assert_eq!(patch.new_selection.main().head(), 5);
/// assert_eq!(doc.version(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    text: Text,
    selection: EditorSelection,
    /// Incremented on every dispatched transaction
    version: u64,
    config: Config,
    history: History,
}

impl Document {
    /// A document with default settings and the cursor at the start
    pub fn new(text: Text) -> Self {
        Self::with_config(text, &Config::default())
    }

    pub fn with_config(text: Text, config: &Config) -> Self {
        Self {
            text,
            selection: EditorSelection::single(0, 0),
            version: 0,
            config: config.clone(),
            history: History::new(config.history_depth),
        }
    }

    pub fn text(&self) -> &Text {
        &self.text
    }

    pub fn selection(&self) -> &EditorSelection {
        &self.selection
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replace the selection without changing the text
    pub fn set_selection(&mut self, selection: EditorSelection) -> Result<(), StateError> {
        check_selection_in(&selection, &self.text)?;
        self.selection = self.limit_selection(selection);
        Ok(())
    }

    /// Visual column of `pos` in its line, with tabs expanded to the
    /// configured tab size
    pub fn column_at(&self, pos: usize) -> Result<usize, StateError> {
        let line = self.text.line_at(pos)?;
        Ok(count_column(line.text, self.config.tab_size, pos - line.from))
    }

    /// Split a string into a [`Text`] using the configured line separator
    pub fn to_text(&self, s: &str) -> Text {
        let lines = split_lines(s, self.config.line_separator())
            .into_iter()
            .map(String::from)
            .collect();
        Text::from_lines(lines)
    }

    /// Build a change set against the current text
    pub fn changes(&self, spec: impl Into<ChangeSpec>) -> Result<ChangeSet, StateError> {
        let changes = ChangeSet::of(spec, self.text.len(), self.config.line_separator())?;
        changes.check_doc(&self.text)?;
        Ok(changes)
    }

    fn resolve(&self, spec: TransactionSpec, len: usize) -> Result<Resolved, StateError> {
        let changes = match spec.changes {
            Some(changes) => ChangeSet::of(changes, len, self.config.line_separator())?,
            None => ChangeSet::empty(len),
        };
        if !spec.sequential {
            changes.check_doc(&self.text)?;
        }
        Resolved::new(changes, spec.selection)
    }

    /// Merge `specs` into one transaction against the current version
    ///
    /// Each spec describes positions in the current document, unless it is
    /// `sequential`, in which case it applies to the output of the specs
    /// before it. A later explicit selection wins over an earlier one.
    pub fn transaction(&self, specs: impl IntoIterator<Item = TransactionSpec>) -> Result<Transaction, StateError> {
        let len = self.text.len();
        let mut specs = specs.into_iter();
        let mut resolved = match specs.next() {
            Some(spec) => self.resolve(spec, len)?,
            None => Resolved::new(ChangeSet::empty(len), None)?,
        };
        for spec in specs {
            let sequential = spec.sequential;
            let base = if sequential { resolved.changes.new_len() } else { len };
            let next = self.resolve(spec, base)?;
            resolved = resolved.merge(next, sequential)?;
        }
        log::trace!("Resolved transaction changes: {}", resolved.changes.desc());
        Ok(Transaction {
            changes: resolved.changes,
            selection: resolved.selection,
            start_version: self.version,
        })
    }

    /// Resolve a single spec and dispatch it
    pub fn apply(&mut self, spec: TransactionSpec) -> Result<Patch, StateError> {
        let tx = self.transaction([spec])?;
        self.dispatch(tx)
    }

    /// Apply a transaction built from this document's current version
    pub fn dispatch(&mut self, tx: Transaction) -> Result<Patch, StateError> {
        self.dispatch_inner(tx, true)
    }

    fn dispatch_inner(&mut self, tx: Transaction, record: bool) -> Result<Patch, StateError> {
        if tx.start_version != self.version {
            return Err(StateError::StaleTransaction {
                version: tx.start_version,
                current: self.version,
            });
        }
        let Transaction { changes, selection, .. } = tx;
        let text = changes.apply(&self.text)?;
        let selection = match selection {
            Some(selection) => selection,
            None => self.selection.map(changes.desc(), Assoc::Before),
        };
        check_selection_in(&selection, &text)?;
        let selection = self.limit_selection(selection);

        if record && !changes.is_empty() {
            let inverse = changes.invert(&self.text)?;
            self.history.record(HistoryEntry {
                changes: inverse,
                selection: self.selection.clone(),
            });
        }

        let changed = changes
            .desc()
            .iter_changed_ranges(false)
            .map(|range| range.from_b..range.to_b)
            .collect::<Vec<_>>();

        self.text = text;
        self.selection = selection.clone();
        self.version += 1;
        log::debug!(
            "Applied transaction: version {}, {} changed ranges, length {}",
            self.version,
            changed.len(),
            self.text.len()
        );

        Ok(Patch {
            changed,
            new_selection: selection,
            version: self.version,
            changes,
        })
    }

    fn limit_selection(&self, selection: EditorSelection) -> EditorSelection {
        if self.config.allow_multiple_selections {
            selection
        } else {
            selection.as_single()
        }
    }

    /// Run `f` for every selection range and combine the per-range edits
    ///
    /// Each range's changes are written against the current document; they
    /// are mapped over the changes of the ranges before them, and the ranges
    /// returned by `f` are mapped over the changes of the others.
    pub fn change_by_range(
        &self,
        mut f: impl FnMut(&SelectionRange) -> RangeEdit,
    ) -> Result<TransactionSpec, StateError> {
        let Some((first, rest)) = self.selection.ranges().split_first() else {
            return Ok(TransactionSpec::default());
        };
        let len = self.text.len();

        let edit = f(first);
        let mut changes = self.range_changes(edit.changes, len)?;
        check_range(&edit.range, changes.new_len())?;
        let mut ranges = vec![edit.range];

        for range in rest {
            let edit = f(range);
            let own = self.range_changes(edit.changes, len)?;
            check_range(&edit.range, own.new_len())?;
            let mapped = own.map(changes.desc(), false)?;
            for earlier in &mut ranges {
                *earlier = earlier.map(mapped.desc(), Assoc::Before);
            }
            let map_by = changes.map_desc(own.desc(), true)?;
            ranges.push(edit.range.map(&map_by, Assoc::Before));
            changes = changes.compose(&mapped)?;
        }

        let selection = EditorSelection::create(ranges, self.selection.main_index())?;
        Ok(TransactionSpec::changes(changes).with_selection(selection))
    }

    fn range_changes(&self, spec: Option<ChangeSpec>, len: usize) -> Result<ChangeSet, StateError> {
        match spec {
            Some(spec) => ChangeSet::of(spec, len, self.config.line_separator()),
            None => Ok(ChangeSet::empty(len)),
        }
    }

    /// Replace every selection range with `text`, leaving cursors after it
    pub fn replace_selection(&self, text: impl Into<InsertText>) -> Result<TransactionSpec, StateError> {
        let text = match text.into() {
            InsertText::Str(s) => self.to_text(&s),
            InsertText::Text(text) => text,
        };
        self.change_by_range(|range| {
            RangeEdit::new(
                EditorSelection::cursor(range.from() + text.len()),
                ChangeSpec::replace(range.from(), range.to(), text.clone()),
            )
        })
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Number of edits that can currently be undone
    pub fn undo_depth(&self) -> usize {
        self.history.undo_depth()
    }

    /// Revert the most recent recorded edit. `Ok(None)` when there is
    /// nothing to undo.
    pub fn undo(&mut self) -> Result<Option<Patch>, StateError> {
        let Some(entry) = self.history.pop_undo() else {
            return Ok(None);
        };
        let redo = HistoryEntry {
            changes: entry.changes.invert(&self.text)?,
            selection: self.selection.clone(),
        };
        let patch = self.dispatch_inner(self.history_transaction(entry), false)?;
        self.history.push_redo(redo);
        log::debug!("Undo: now at version {}", patch.version);
        Ok(Some(patch))
    }

    /// Reapply the most recently undone edit
    pub fn redo(&mut self) -> Result<Option<Patch>, StateError> {
        let Some(entry) = self.history.pop_redo() else {
            return Ok(None);
        };
        let undo = HistoryEntry {
            changes: entry.changes.invert(&self.text)?,
            selection: self.selection.clone(),
        };
        let patch = self.dispatch_inner(self.history_transaction(entry), false)?;
        self.history.push_undo(undo);
        log::debug!("Redo: now at version {}", patch.version);
        Ok(Some(patch))
    }

    fn history_transaction(&self, entry: HistoryEntry) -> Transaction {
        Transaction {
            changes: entry.changes,
            selection: Some(entry.selection),
            start_version: self.version,
        }
    }
}

fn check_range(range: &SelectionRange, len: usize) -> Result<(), StateError> {
    if range.to() > len {
        return Err(StateError::SelectionOutOfRange { pos: range.to(), len });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn doc(text: &str) -> Document {
        Document::new(Text::from(text))
    }

    fn heads(selection: &EditorSelection) -> Vec<usize> {
        selection.ranges().iter().map(SelectionRange::head).collect()
    }

    #[test]
    fn test_new_document() {
        let doc = doc("abc");
        assert_eq!(doc.text().to_string(), "abc");
        assert_eq!(doc.selection(), &EditorSelection::single(0, 0));
        assert_eq!(doc.version(), 0);
        assert!(!doc.can_undo());
    }

    #[test]
    fn test_apply_maps_selection_and_reports_changes() {
        let mut doc = doc("hello world");
        doc.set_selection(EditorSelection::single(6, 11)).unwrap();
        let patch = doc
            .apply(TransactionSpec::changes(ChangeSpec::replace(0, 5, "goodbye")))
            .unwrap();
        assert_eq!(doc.text().to_string(), "goodbye world");
        assert_eq!(patch.changed, vec![0..7]);
        assert_eq!(patch.version, 1);
        let main = doc.selection().main();
        assert_eq!((main.anchor(), main.head()), (8, 13));
    }

    #[test]
    fn test_explicit_selection_replaces_mapping() {
        let mut doc = doc("abc");
        doc.apply(TransactionSpec::changes(ChangeSpec::insert(3, "def")).with_selection(EditorSelection::single(6, 6)))
            .unwrap();
        assert_eq!(heads(doc.selection()), vec![6]);
    }

    #[test]
    fn test_parallel_and_sequential_specs() {
        let doc = doc("xyz");
        let tx = doc
            .transaction([
                TransactionSpec::changes(ChangeSpec::insert(0, "a")),
                TransactionSpec::changes(ChangeSpec::insert(3, "b")),
                TransactionSpec::changes(ChangeSpec::delete(0, 2)).sequential(),
            ])
            .unwrap();
        assert_eq!(tx.changes().apply(doc.text()).unwrap().to_string(), "yzb");
        assert!(tx.doc_changed());
        assert_eq!(tx.start_version(), 0);
    }

    #[test]
    fn test_invalid_selection_is_rejected() {
        let mut doc = doc("abc");
        assert_eq!(
            doc.set_selection(EditorSelection::single(0, 4)),
            Err(StateError::SelectionOutOfRange { pos: 4, len: 3 })
        );
        let err = doc
            .apply(TransactionSpec::changes(ChangeSpec::delete(0, 1)).with_selection(EditorSelection::single(3, 3)))
            .unwrap_err();
        assert_eq!(err, StateError::SelectionOutOfRange { pos: 3, len: 2 });
        assert_eq!(doc.version(), 0);
    }

    #[test]
    fn test_positions_inside_characters_are_rejected() {
        let mut doc = doc("héllo");
        assert_eq!(
            doc.set_selection(EditorSelection::single(2, 2)),
            Err(StateError::NotCharBoundary { pos: 2 })
        );
        assert_eq!(doc.selection(), &EditorSelection::single(0, 0));

        let err = doc
            .apply(TransactionSpec::changes(ChangeSpec::replace(2, 3, "x")))
            .unwrap_err();
        assert_eq!(err, StateError::NotCharBoundary { pos: 2 });
        assert!(doc.changes(ChangeSpec::insert(2, "x")).is_err());

        let err = doc
            .apply(TransactionSpec::changes(ChangeSpec::insert(0, "x")).with_selection(EditorSelection::single(3, 3)))
            .unwrap_err();
        assert_eq!(err, StateError::NotCharBoundary { pos: 3 });
        assert_eq!(doc.text().to_string(), "héllo");
        assert_eq!(doc.version(), 0);
        assert!(!doc.can_undo());
        assert_eq!(doc.column_at(2), Err(StateError::NotCharBoundary { pos: 2 }));
    }

    #[test]
    fn test_stale_transaction_is_rejected() {
        let mut doc = doc("abc");
        let stale = doc.transaction([TransactionSpec::changes(ChangeSpec::insert(0, "x"))]).unwrap();
        doc.apply(TransactionSpec::changes(ChangeSpec::insert(0, "y"))).unwrap();
        assert_eq!(
            doc.dispatch(stale).unwrap_err(),
            StateError::StaleTransaction { version: 0, current: 1 }
        );
    }

    #[test]
    fn test_single_selection_config_collapses_ranges() {
        let config = Config {
            allow_multiple_selections: false,
            ..Config::default()
        };
        let mut doc = Document::with_config(Text::from("abcdef"), &config);
        let selection =
            EditorSelection::create(vec![EditorSelection::cursor(1), EditorSelection::cursor(4)], 1).unwrap();
        doc.set_selection(selection).unwrap();
        assert_eq!(heads(doc.selection()), vec![4]);
    }

    #[test]
    fn test_replace_selection_with_several_cursors() {
        let mut doc = doc("abcd");
        let selection =
            EditorSelection::create(vec![EditorSelection::cursor(1), EditorSelection::cursor(3)], 0).unwrap();
        doc.set_selection(selection).unwrap();
        let spec = doc.replace_selection("X").unwrap();
        let patch = doc.apply(spec).unwrap();
        assert_eq!(doc.text().to_string(), "aXbcXd");
        assert_eq!(heads(&patch.new_selection), vec![2, 5]);
        assert_eq!(patch.changed, vec![1..2, 4..5]);
    }

    #[test]
    fn test_change_by_range_rejects_ranges_past_the_end() {
        let doc = doc("ab");
        let err = doc
            .change_by_range(|_| RangeEdit::select(EditorSelection::cursor(5)))
            .unwrap_err();
        assert_eq!(err, StateError::SelectionOutOfRange { pos: 5, len: 2 });
    }

    #[test]
    fn test_configured_line_separator_splits_inserted_text() {
        let config = Config {
            line_separator: Some("|".to_string()),
            ..Config::default()
        };
        let mut doc = Document::with_config(Text::from(""), &config);
        let spec = doc.replace_selection("a|b").unwrap();
        doc.apply(spec).unwrap();
        assert_eq!(doc.text().lines(), 2);
        assert_eq!(doc.text().to_string(), "a\nb");
    }

    #[test]
    fn test_column_at_uses_tab_size() {
        let config = Config {
            tab_size: 2,
            ..Config::default()
        };
        let doc = Document::with_config(Text::from("x\n\tab"), &config);
        assert_eq!(doc.column_at(3).unwrap(), 2);
        assert_eq!(doc.column_at(5).unwrap(), 4);
        assert!(doc.column_at(6).is_err());
    }

    #[test]
    fn test_undo_and_redo() {
        let mut doc = doc("abc");
        doc.set_selection(EditorSelection::single(3, 3)).unwrap();
        doc.apply(TransactionSpec::changes(ChangeSpec::insert(3, "d"))).unwrap();
        doc.apply(TransactionSpec::changes(ChangeSpec::delete(0, 1))).unwrap();
        assert_eq!(doc.text().to_string(), "bcd");

        doc.undo().unwrap();
        assert_eq!(doc.text().to_string(), "abcd");
        assert_eq!(heads(doc.selection()), vec![3]);
        doc.undo().unwrap();
        assert_eq!(doc.text().to_string(), "abc");
        assert_eq!(heads(doc.selection()), vec![3]);
        assert!(doc.undo().unwrap().is_none());

        doc.redo().unwrap();
        doc.redo().unwrap();
        assert_eq!(doc.text().to_string(), "bcd");
        assert!(!doc.can_redo());
        assert_eq!(doc.version(), 6);
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut doc = doc("abc");
        doc.apply(TransactionSpec::changes(ChangeSpec::insert(0, "x"))).unwrap();
        doc.undo().unwrap();
        assert!(doc.can_redo());
        doc.apply(TransactionSpec::changes(ChangeSpec::insert(0, "y"))).unwrap();
        assert!(!doc.can_redo());
        assert!(doc.redo().unwrap().is_none());
    }

    #[test]
    fn test_history_depth_from_config() {
        let config = Config {
            history_depth: 1,
            ..Config::default()
        };
        let mut doc = Document::with_config(Text::from(""), &config);
        doc.apply(TransactionSpec::changes(ChangeSpec::insert(0, "a"))).unwrap();
        doc.apply(TransactionSpec::changes(ChangeSpec::insert(1, "b"))).unwrap();
        assert_eq!(doc.undo_depth(), 1);
        doc.undo().unwrap();
        assert!(!doc.can_undo());
        assert_eq!(doc.undo_depth(), 0);
        assert_eq!(doc.text().to_string(), "a");
    }

    #[test]
    fn test_selection_only_transaction_is_not_recorded() {
        let mut doc = doc("abc");
        let patch = doc.apply(TransactionSpec::selection(EditorSelection::single(1, 2))).unwrap();
        assert!(patch.changed.is_empty());
        assert_eq!(doc.version(), 1);
        assert!(!doc.can_undo());
    }
}
