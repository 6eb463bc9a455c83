pub mod change;
pub mod editing;
pub mod error;
pub mod rangeset;
pub mod selection;
pub mod text;

// Re-export key types for easier usage
pub use change::{
    Assoc, ChangeDesc, ChangeSet, ChangeSpec, ChangedRange, FilteredChanges, InsertText, MapMode, Section,
    TouchesRange,
};
pub use editing::{Document, Patch, RangeEdit, Transaction, TransactionSpec};
pub use error::StateError;
pub use rangeset::{
    CHUNK_SIZE, Range, RangeComparator, RangeCursor, RangeSet, RangeSetBuilder, RangeSetUpdate, RangeValue,
    SpanIterator,
};
pub use selection::{EditorSelection, SelectionRange};
pub use text::{BRANCH, BRANCH_SHIFT, Direction, Line, Text, TextChunk};
