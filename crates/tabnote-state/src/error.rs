/// Errors raised by the document model.
///
/// Every variant describes invalid input handed to the model by its caller.
/// Nothing here is retried or repaired internally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("Invalid position {pos} in document of length {len}")]
    PositionOutOfRange { pos: usize, len: usize },

    #[error("Position {pos} is inside a multi-byte character")]
    NotCharBoundary { pos: usize },

    #[error("Invalid line number {line} in {lines}-line document")]
    LineOutOfRange { line: usize, lines: usize },

    #[error("A document must have at least one line")]
    EmptyDocument,

    #[error("Invalid change range {from} to {to} (in doc of length {len})")]
    InvalidChangeRange { from: usize, to: usize, len: usize },

    #[error("Mismatched change set length (got {got}, expected {expected})")]
    MismatchedLength { got: usize, expected: usize },

    #[error("Applying change set of length {expected} to a document with the wrong length ({got})")]
    WrongDocumentLength { got: usize, expected: usize },

    #[error("A selection needs at least one range")]
    EmptySelection,

    #[error("Range index {index} is out of range for a selection with {ranges} ranges")]
    InvalidRangeIndex { index: usize, ranges: usize },

    #[error("Selection points outside of document (position {pos}, length {len})")]
    SelectionOutOfRange { pos: usize, len: usize },

    #[error("Ranges must be added sorted by `from` position and `startSide`")]
    UnsortedRanges,

    #[error("Invalid range {from} to {to}: `from` must not be greater than `to`")]
    ReversedRange { from: usize, to: usize },

    #[error("Empty range at {pos} is not allowed for this value")]
    EmptyRange { pos: usize },

    #[error("Transaction was built for version {version} but the document is at version {current}")]
    StaleTransaction { version: u64, current: u64 },
}
