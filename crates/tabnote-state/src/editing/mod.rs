/*!
 * # Editing
 *
 * A [`Document`] is the mutable handle a host holds on to. Everything it
 * contains is an immutable snapshot ([`Text`], [`EditorSelection`]); edits
 * replace those snapshots wholesale.
 *
 * ## Edit Loop
 *
 * 1. **Describe**: one or more [`TransactionSpec`]s, each with changes against
 *    the current document (or, when `sequential`, against the result of the
 *    specs before it) and an optional explicit selection.
 * 2. **Resolve**: [`Document::transaction`] merges the specs into a single
 *    [`Transaction`] holding one `ChangeSet` and the resulting selection.
 * 3. **Dispatch**: [`Document::dispatch`] applies the changes, maps the old
 *    selection when none was given, validates it, records the inverse for
 *    undo and returns a [`Patch`].
 *
 * Per-range edits (typing with several cursors) go through
 * [`Document::change_by_range`], which maps each range's changes over the
 * changes of the ranges before it.
 *
 * ## Module Structure
 *
 * - **`document`**: `Document` and the edit loop
 * - **`transaction`**: `TransactionSpec`, `Transaction`, `RangeEdit` and spec merging
 * - **`history`**: linear undo/redo stacks of inverted change sets
 * - **`patch`**: edit result with changed ranges and the new selection
 *
 * ## Usage Pattern
 *
 * ```rust
 * use tabnote_state::{ChangeSpec, Document, Text, TransactionSpec};
 *
 * let mut doc = Document::new(Text::from("hello"));
 * let patch = doc.apply(TransactionSpec::changes(ChangeSpec::insert(5, " world"))).unwrap();
 * assert_eq!(doc.text().to_string(), "hello world");
 * assert_eq!(patch.changed, vec![5..11]);
 *
 * doc.undo().unwrap();
 * assert_eq!(doc.text().to_string(), "hello");
 * ```
 */

pub mod document;
mod history;
pub mod patch;
pub mod transaction;

pub use document::Document;
pub use patch::Patch;
pub use transaction::{RangeEdit, Transaction, TransactionSpec};

#[cfg(doc)]
use crate::{selection::EditorSelection, text::Text};
