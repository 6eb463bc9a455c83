//! Selections: one or more ranges over a document, one of them the main range.
//!
//! An [`EditorSelection`] always holds at least one range. Its ranges are
//! sorted by `from` and do not overlap; empty ranges may touch neighbouring
//! ranges but not sit inside them. Constructors normalize input that
//! breaks these rules by sorting and merging, keeping track of which range
//! is the main one.

use serde::{Deserialize, Serialize};

use crate::change::{Assoc, ChangeDesc};
use crate::error::StateError;
use crate::text::Text;

/// A single selection range or cursor.
///
/// `from <= to` always holds; `inverted` records that the head sits at
/// `from`, so the range was made by moving backward.
#[derive(Debug, Clone, Copy, Eq, Serialize, Deserialize)]
#[serde(from = "RangeJson", into = "RangeJson")]
pub struct SelectionRange {
    from: usize,
    to: usize,
    inverted: bool,
    assoc: Option<Assoc>,
    bidi_level: Option<u8>,
    goal_column: Option<usize>,
}

impl SelectionRange {
    pub fn from(&self) -> usize {
        self.from
    }

    pub fn to(&self) -> usize {
        self.to
    }

    /// The fixed end of the range.
    pub fn anchor(&self) -> usize {
        if self.inverted { self.to } else { self.from }
    }

    /// The end that moves when the selection is extended.
    pub fn head(&self) -> usize {
        if self.inverted { self.from } else { self.to }
    }

    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }

    /// Side of the position a cursor is attached to, if any.
    pub fn assoc(&self) -> Option<Assoc> {
        self.assoc
    }

    /// Bidi embedding level of the character the cursor is next to.
    pub fn bidi_level(&self) -> Option<u8> {
        self.bidi_level
    }

    /// Column vertical motion tries to keep.
    pub fn goal_column(&self) -> Option<usize> {
        self.goal_column
    }

    pub fn with_assoc(mut self, assoc: Assoc) -> Self {
        self.assoc = Some(assoc);
        self
    }

    pub fn with_bidi_level(mut self, level: u8) -> Self {
        self.bidi_level = Some(level);
        self
    }

    pub fn with_goal_column(mut self, column: usize) -> Self {
        self.goal_column = Some(column);
        self
    }

    /// Map the range through a change.
    ///
    /// A cursor maps with `assoc`. A non-empty range maps its start forward
    /// and its end backward, so text inserted at either edge stays outside.
    ///
    /// # Panics
    ///
    /// Panics when the range extends past the end of the change's document.
    #[track_caller]
    pub fn map(&self, change: &ChangeDesc, assoc: Assoc) -> SelectionRange {
        let (from, to) = if self.is_empty() {
            let pos = change.map_pos(self.from, assoc);
            (pos, pos)
        } else {
            (change.map_pos(self.from, Assoc::After), change.map_pos(self.to, Assoc::Before))
        };
        SelectionRange { from, to, ..*self }
    }

    /// Extend the range to cover `from..to`, keeping its anchor unless the
    /// target range contains it.
    pub fn extend(&self, from: usize, to: usize) -> SelectionRange {
        let anchor = self.anchor();
        if from <= anchor && to >= anchor {
            return EditorSelection::range(from, to);
        }
        let head = if from.abs_diff(anchor) > to.abs_diff(anchor) { from } else { to };
        EditorSelection::range(anchor, head)
    }

    /// Equality that also compares the assoc of cursors.
    pub fn eq_with_assoc(&self, other: &SelectionRange) -> bool {
        self == other && (!self.is_empty() || self.assoc == other.assoc)
    }
}

/// Ranges compare by anchor and head.
impl PartialEq for SelectionRange {
    fn eq(&self, other: &SelectionRange) -> bool {
        self.anchor() == other.anchor() && self.head() == other.head()
    }
}

#[derive(Serialize, Deserialize)]
struct RangeJson {
    anchor: usize,
    head: usize,
}

impl From<RangeJson> for SelectionRange {
    fn from(json: RangeJson) -> Self {
        EditorSelection::range(json.anchor, json.head)
    }
}

impl From<SelectionRange> for RangeJson {
    fn from(range: SelectionRange) -> Self {
        RangeJson {
            anchor: range.anchor(),
            head: range.head(),
        }
    }
}

/// A set of selection ranges with a designated main range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SelectionJson", into = "SelectionJson")]
pub struct EditorSelection {
    ranges: Vec<SelectionRange>,
    main: usize,
}

#[derive(Serialize, Deserialize)]
struct SelectionJson {
    ranges: Vec<SelectionRange>,
    main: usize,
}

impl TryFrom<SelectionJson> for EditorSelection {
    type Error = StateError;

    fn try_from(json: SelectionJson) -> Result<Self, StateError> {
        EditorSelection::create(json.ranges, json.main)
    }
}

impl From<EditorSelection> for SelectionJson {
    fn from(selection: EditorSelection) -> Self {
        SelectionJson {
            ranges: selection.ranges,
            main: selection.main,
        }
    }
}

impl EditorSelection {
    /// Build a selection, normalizing the ranges if they are out of order
    /// or overlap. `main` indexes into `ranges` as given.
    pub fn create(ranges: Vec<SelectionRange>, main: usize) -> Result<EditorSelection, StateError> {
        if ranges.is_empty() {
            return Err(StateError::EmptySelection);
        }
        if main >= ranges.len() {
            return Err(StateError::InvalidRangeIndex {
                index: main,
                ranges: ranges.len(),
            });
        }
        Ok(EditorSelection::create_unchecked(ranges, main))
    }

    /// `create` for a non-empty `ranges` and an in-bounds `main`.
    fn create_unchecked(ranges: Vec<SelectionRange>, main: usize) -> EditorSelection {
        let mut pos = 0;
        for range in &ranges {
            let misplaced = if range.is_empty() { range.from <= pos } else { range.from < pos };
            if misplaced {
                return EditorSelection::normalize(ranges, main);
            }
            pos = range.to;
        }
        EditorSelection { ranges, main }
    }

    /// Sort and merge `ranges` unconditionally.
    pub fn normalized(ranges: Vec<SelectionRange>, main: usize) -> Result<EditorSelection, StateError> {
        if ranges.is_empty() {
            return Err(StateError::EmptySelection);
        }
        if main >= ranges.len() {
            return Err(StateError::InvalidRangeIndex {
                index: main,
                ranges: ranges.len(),
            });
        }
        Ok(EditorSelection::normalize(ranges, main))
    }

    fn normalize(ranges: Vec<SelectionRange>, main: usize) -> EditorSelection {
        let mut indexed: Vec<(usize, SelectionRange)> = ranges.into_iter().enumerate().collect();
        indexed.sort_by_key(|(_, range)| range.from);
        let mut main = indexed
            .iter()
            .position(|(index, _)| *index == main)
            .unwrap_or(0);
        let mut ranges: Vec<SelectionRange> = indexed.into_iter().map(|(_, range)| range).collect();

        let mut i = 1;
        while i < ranges.len() {
            let (range, prev) = (ranges[i], ranges[i - 1]);
            let overlaps = if range.is_empty() { range.from <= prev.to } else { range.from < prev.to };
            if !overlaps {
                i += 1;
                continue;
            }
            let (from, to) = (prev.from, range.to.max(prev.to));
            if i <= main {
                main -= 1;
            }
            ranges[i - 1] = if range.anchor() > range.head() {
                EditorSelection::range(to, from)
            } else {
                EditorSelection::range(from, to)
            };
            ranges.remove(i);
        }
        EditorSelection { ranges, main }
    }

    /// A selection holding one range.
    pub fn single(anchor: usize, head: usize) -> EditorSelection {
        EditorSelection {
            ranges: vec![EditorSelection::range(anchor, head)],
            main: 0,
        }
    }

    /// An empty range at `pos`.
    pub fn cursor(pos: usize) -> SelectionRange {
        SelectionRange {
            from: pos,
            to: pos,
            inverted: false,
            assoc: None,
            bidi_level: None,
            goal_column: None,
        }
    }

    /// A range from `anchor` to `head`, in either direction.
    pub fn range(anchor: usize, head: usize) -> SelectionRange {
        let (from, to, inverted) = if head < anchor {
            (head, anchor, true)
        } else {
            (anchor, head, false)
        };
        SelectionRange {
            from,
            to,
            inverted,
            assoc: match head.cmp(&anchor) {
                std::cmp::Ordering::Less => Some(Assoc::After),
                std::cmp::Ordering::Greater => Some(Assoc::Before),
                std::cmp::Ordering::Equal => None,
            },
            bidi_level: None,
            goal_column: None,
        }
    }

    pub fn ranges(&self) -> &[SelectionRange] {
        &self.ranges
    }

    pub fn main_index(&self) -> usize {
        self.main
    }

    pub fn main(&self) -> &SelectionRange {
        &self.ranges[self.main]
    }

    /// Map every range through a change, merging ranges that come to overlap.
    ///
    /// # Panics
    ///
    /// Panics when a range extends past the end of the change's document.
    #[track_caller]
    pub fn map(&self, change: &ChangeDesc, assoc: Assoc) -> EditorSelection {
        if change.is_empty() {
            return self.clone();
        }
        let ranges = self.ranges.iter().map(|range| range.map(change, assoc)).collect();
        EditorSelection::create_unchecked(ranges, self.main)
    }

    /// Ranges compare equal and cursors agree on their assoc.
    pub fn eq_with_assoc(&self, other: &EditorSelection) -> bool {
        self.main == other.main
            && self.ranges.len() == other.ranges.len()
            && self
                .ranges
                .iter()
                .zip(&other.ranges)
                .all(|(a, b)| a.eq_with_assoc(b))
    }

    /// This selection reduced to its main range.
    pub fn as_single(&self) -> EditorSelection {
        if self.ranges.len() == 1 {
            return self.clone();
        }
        EditorSelection {
            ranges: vec![*self.main()],
            main: 0,
        }
    }

    /// Add a range, making it the main range when `main` is set.
    pub fn add_range(&self, range: SelectionRange, main: bool) -> EditorSelection {
        let mut ranges = Vec::with_capacity(self.ranges.len() + 1);
        ranges.push(range);
        ranges.extend_from_slice(&self.ranges);
        EditorSelection::create_unchecked(ranges, if main { 0 } else { self.main + 1 })
    }

    /// Replace the range at `which` (the main range when `None`).
    pub fn replace_range(&self, range: SelectionRange, which: Option<usize>) -> Result<EditorSelection, StateError> {
        let which = which.unwrap_or(self.main);
        if which >= self.ranges.len() {
            return Err(StateError::InvalidRangeIndex {
                index: which,
                ranges: self.ranges.len(),
            });
        }
        let mut ranges = self.ranges.clone();
        ranges[which] = range;
        Ok(EditorSelection::create_unchecked(ranges, self.main))
    }
}

/// Fail when any range of `selection` extends past `len`.
pub fn check_selection(selection: &EditorSelection, len: usize) -> Result<(), StateError> {
    match selection.ranges.iter().find(|range| range.to > len) {
        Some(range) => Err(StateError::SelectionOutOfRange { pos: range.to, len }),
        None => Ok(()),
    }
}

/// [`check_selection`] against `doc`, also failing when a range starts or
/// ends inside a multi-byte character.
pub fn check_selection_in(selection: &EditorSelection, doc: &Text) -> Result<(), StateError> {
    check_selection(selection, doc.len())?;
    for range in &selection.ranges {
        doc.check_pos(range.from)?;
        doc.check_pos(range.to)?;
    }
    Ok(())
}
