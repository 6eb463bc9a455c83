//! # Change descriptions and change sets
//!
//! A change is a run-length list of [`Section`]s covering the whole
//! document it applies to: stretches that are kept, and stretches that are
//! replaced by some number of new positions. [`ChangeDesc`] is only that
//! shape and is enough to map positions. [`ChangeSet`] also carries the
//! inserted text, so it can be applied, inverted and composed.
//!
//! ## Coordinates
//!
//! "A" coordinates refer to the document before the change, "B"
//! coordinates to the document after it. All positions are byte offsets
//! with one position per line break, the same units as [`Text`].
//!
//! ## Laws
//!
//! - `a.compose(b).apply(doc) == b.apply(a.apply(doc))`
//! - `a.invert(doc).apply(a.apply(doc)) == doc`
//! - composition is associative and `ChangeSet::empty(len)` is its identity
//! - mapping through an empty change returns the change unchanged

use std::fmt;

use crate::error::StateError;
use crate::text::Text;

mod algebra;
mod json;
mod set;

pub use set::{ChangeSet, ChangeSpec, FilteredChanges, InsertText};

/// One run of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    /// `len` positions kept as they are.
    Retain(usize),
    /// `len` positions replaced by `ins` new ones.
    Replace { len: usize, ins: usize },
}

impl Section {
    pub(crate) fn new(len: usize, ins: Option<usize>) -> Section {
        match ins {
            None => Section::Retain(len),
            Some(ins) => Section::Replace { len, ins },
        }
    }

    /// Length in the original document.
    pub fn len(&self) -> usize {
        match *self {
            Section::Retain(len) | Section::Replace { len, .. } => len,
        }
    }

    /// Length in the changed document.
    pub fn new_len(&self) -> usize {
        match *self {
            Section::Retain(len) => len,
            Section::Replace { ins, .. } => ins,
        }
    }

    /// Inserted length, or `None` for a kept run.
    pub fn ins(&self) -> Option<usize> {
        match *self {
            Section::Retain(_) => None,
            Section::Replace { ins, .. } => Some(ins),
        }
    }

    pub fn is_retain(&self) -> bool {
        matches!(self, Section::Retain(_))
    }
}

/// How [`ChangeDesc::map_pos_tracked`] treats positions inside deleted content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapMode {
    /// Always map to a position, clamping deleted positions to the edge of
    /// the replacement.
    #[default]
    Simple,
    /// Drop positions strictly inside a deletion.
    TrackDel,
    /// Drop positions whose character before them was deleted.
    TrackBefore,
    /// Drop positions whose character after them was deleted.
    TrackAfter,
}

/// Which side of an insertion a position at the insertion point sticks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Assoc {
    /// Stay before inserted content.
    #[default]
    Before,
    /// Move past inserted content.
    After,
}

/// Result of [`ChangeDesc::touches_range`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchesRange {
    No,
    Yes,
    /// A single replacement strictly covers the whole range.
    Cover,
}

/// A changed stretch of the document, in both coordinate spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangedRange {
    pub from_a: usize,
    pub to_a: usize,
    pub from_b: usize,
    pub to_b: usize,
}

/// The shape of a change, without the inserted text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeDesc {
    pub(crate) sections: Vec<Section>,
}

impl ChangeDesc {
    pub(crate) fn from_sections(sections: Vec<Section>) -> ChangeDesc {
        ChangeDesc { sections }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Length of the document this change applies to.
    pub fn len(&self) -> usize {
        self.sections.iter().map(Section::len).sum()
    }

    /// Length of the document after the change.
    pub fn new_len(&self) -> usize {
        self.sections.iter().map(Section::new_len).sum()
    }

    /// True when the change replaces nothing.
    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(Section::is_retain)
    }

    /// Unchanged stretches as `(pos_a, pos_b, len)`.
    pub fn iter_gaps(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        let (mut pos_a, mut pos_b) = (0, 0);
        self.sections.iter().filter_map(move |section| {
            let gap = match *section {
                Section::Retain(len) => {
                    let gap = (pos_a, pos_b, len);
                    pos_b += len;
                    Some(gap)
                }
                Section::Replace { ins, .. } => {
                    pos_b += ins;
                    None
                }
            };
            pos_a += section.len();
            gap
        })
    }

    /// Changed stretches. Unless `individual` is set, adjacent replacements
    /// are reported as one range.
    pub fn iter_changed_ranges(&self, individual: bool) -> impl Iterator<Item = ChangedRange> + '_ {
        ChangesIter::new(&self.sections, &[], individual).map(|(range, _)| range)
    }

    /// The shape of the change that undoes this one.
    pub fn inverted_desc(&self) -> ChangeDesc {
        ChangeDesc::from_sections(
            self.sections
                .iter()
                .map(|section| match *section {
                    Section::Retain(len) => Section::Retain(len),
                    Section::Replace { len, ins } => Section::Replace { len: ins, ins: len },
                })
                .collect(),
        )
    }

    /// Apply `other` after this change, as one description.
    pub fn compose_desc(&self, other: &ChangeDesc) -> Result<ChangeDesc, StateError> {
        if self.new_len() != other.len() {
            return Err(StateError::MismatchedLength {
                got: other.len(),
                expected: self.new_len(),
            });
        }
        if self.is_empty() {
            return Ok(other.clone());
        }
        if other.is_empty() {
            return Ok(self.clone());
        }
        let (sections, _) = algebra::compose_sets(self, &[], other, &[])?;
        Ok(ChangeDesc::from_sections(sections))
    }

    /// Rebase this change so it applies after `other`, which starts from
    /// the same document. `before` puts this change's insertions first when
    /// both insert at the same position.
    pub fn map_desc(&self, other: &ChangeDesc, before: bool) -> Result<ChangeDesc, StateError> {
        if self.len() != other.len() {
            return Err(StateError::MismatchedLength {
                got: other.len(),
                expected: self.len(),
            });
        }
        if other.is_empty() {
            return Ok(self.clone());
        }
        let (sections, _) = algebra::map_set(self, &[], other, before)?;
        Ok(ChangeDesc::from_sections(sections))
    }

    /// Map a position in the original document to the changed document.
    ///
    /// # Panics
    ///
    /// Panics when `pos` is past the end of the original document.
    #[track_caller]
    pub fn map_pos(&self, pos: usize, assoc: Assoc) -> usize {
        // Simple mode never drops a position
        self.map_pos_tracked(pos, assoc, MapMode::Simple)
            .unwrap_or(pos)
    }

    /// Like [`ChangeDesc::map_pos`], returning `None` when `mode` says the
    /// position was deleted.
    ///
    /// # Panics
    ///
    /// Panics when `pos` is past the end of the original document.
    #[track_caller]
    pub fn map_pos_tracked(&self, pos: usize, assoc: Assoc, mode: MapMode) -> Option<usize> {
        let (mut pos_a, mut pos_b) = (0, 0);
        for section in &self.sections {
            let len = section.len();
            let end_a = pos_a + len;
            match *section {
                Section::Retain(_) => {
                    if end_a > pos {
                        return Some(pos_b + (pos - pos_a));
                    }
                    pos_b += len;
                }
                Section::Replace { ins, .. } => {
                    let deleted = end_a >= pos
                        && match mode {
                            MapMode::Simple => false,
                            MapMode::TrackDel => pos_a < pos && end_a > pos,
                            MapMode::TrackBefore => pos_a < pos,
                            MapMode::TrackAfter => end_a > pos,
                        };
                    if deleted {
                        return None;
                    }
                    if end_a > pos || (end_a == pos && assoc == Assoc::Before && len == 0) {
                        return Some(if pos == pos_a || assoc == Assoc::Before {
                            pos_b
                        } else {
                            pos_b + ins
                        });
                    }
                    pos_b += ins;
                }
            }
            pos_a = end_a;
        }
        if pos > pos_a {
            panic!("{}", StateError::PositionOutOfRange { pos, len: pos_a });
        }
        Some(pos_b)
    }

    /// Whether any replacement touches `from..=to`.
    pub fn touches_range(&self, from: usize, to: usize) -> TouchesRange {
        let mut pos = 0;
        for section in &self.sections {
            if pos > to {
                break;
            }
            let end = pos + section.len();
            if !section.is_retain() && pos <= to && end >= from {
                return if pos < from && end > to {
                    TouchesRange::Cover
                } else {
                    TouchesRange::Yes
                };
            }
            pos = end;
        }
        TouchesRange::No
    }
}

impl AsRef<ChangeDesc> for ChangeDesc {
    fn as_ref(&self) -> &ChangeDesc {
        self
    }
}

impl fmt::Display for ChangeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match section {
                Section::Retain(len) => write!(f, "{len}")?,
                Section::Replace { len, ins } => write!(f, "{len}:{ins}")?,
            }
        }
        Ok(())
    }
}

/// Append a run to `sections`, merging it into the previous run when they
/// describe the same kind of content. With `force_join` a replacement is
/// always merged into a preceding replacement.
pub(crate) fn add_section(sections: &mut Vec<Section>, len: usize, ins: Option<usize>, force_join: bool) {
    if len == 0 && ins.unwrap_or(0) == 0 {
        return;
    }
    match sections.last_mut() {
        Some(last) if ins.unwrap_or(0) == 0 && last.ins() == ins => {
            *last = Section::new(last.len() + len, ins);
        }
        Some(Section::Replace { len: 0, ins: last_ins }) if len == 0 => {
            *last_ins += ins.unwrap_or(0);
        }
        Some(Section::Replace {
            len: last_len,
            ins: last_ins,
        }) if force_join => {
            *last_len += len;
            *last_ins += ins.unwrap_or(0);
        }
        _ => sections.push(Section::new(len, ins)),
    }
}

/// Record inserted text for the last section in `sections`. Texts are kept
/// at the index of their section; gaps are padded with empty texts.
pub(crate) fn add_insert(values: &mut Vec<Text>, sections: &[Section], value: &Text) {
    if value.is_empty() {
        return;
    }
    let index = sections.len().saturating_sub(1);
    if index < values.len() {
        if let Some(last) = values.last_mut() {
            *last = last.append(value);
        }
    } else {
        values.resize_with(index, Text::empty);
        values.push(value.clone());
    }
}

/// State of a [`SectionIter`]'s current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ins {
    Retain,
    Insert(usize),
    Done,
}

/// Walks the sections of a change, allowing partial consumption of a run.
pub(crate) struct SectionIter<'a> {
    sections: &'a [Section],
    inserted: &'a [Text],
    /// Index one past the current section.
    pub(crate) i: usize,
    /// Remaining original length of the current run.
    pub(crate) len: usize,
    /// How far into the current run the iterator has moved.
    pub(crate) off: usize,
    pub(crate) ins: Ins,
}

impl<'a> SectionIter<'a> {
    pub(crate) fn new(sections: &'a [Section], inserted: &'a [Text]) -> Self {
        let mut iter = SectionIter {
            sections,
            inserted,
            i: 0,
            len: 0,
            off: 0,
            ins: Ins::Done,
        };
        iter.next();
        iter
    }

    pub(crate) fn next(&mut self) {
        match self.sections.get(self.i) {
            Some(section) => {
                self.i += 1;
                self.len = section.len();
                self.ins = match section.ins() {
                    None => Ins::Retain,
                    Some(ins) => Ins::Insert(ins),
                };
            }
            None => {
                self.len = 0;
                self.ins = Ins::Done;
            }
        }
        self.off = 0;
    }

    pub(crate) fn done(&self) -> bool {
        self.ins == Ins::Done
    }

    pub(crate) fn is_insert(&self) -> bool {
        matches!(self.ins, Ins::Insert(_))
    }

    /// Inserted length of the current run, `None` for kept or finished runs.
    pub(crate) fn ins_len(&self) -> Option<usize> {
        match self.ins {
            Ins::Insert(n) => Some(n),
            Ins::Retain | Ins::Done => None,
        }
    }

    /// Remaining length of the current run in the changed document.
    pub(crate) fn len2(&self) -> usize {
        match self.ins {
            Ins::Insert(n) => n,
            Ins::Retain | Ins::Done => self.len,
        }
    }

    pub(crate) fn text(&self) -> Text {
        self.i
            .checked_sub(1)
            .and_then(|index| self.inserted.get(index))
            .cloned()
            .unwrap_or_else(Text::empty)
    }

    /// `len` positions of the current run's inserted text, from the current offset.
    pub(crate) fn text_bit(&self, len: usize) -> Text {
        match self.i.checked_sub(1).and_then(|index| self.inserted.get(index)) {
            Some(text) => text.slice(self.off, self.off + len),
            None => Text::empty(),
        }
    }

    pub(crate) fn forward(&mut self, len: usize) {
        if len == self.len {
            self.next();
        } else {
            self.len -= len;
            self.off += len;
        }
    }

    /// Move forward `len` positions in the changed document.
    pub(crate) fn forward2(&mut self, len: usize) {
        match self.ins {
            Ins::Retain => self.forward(len),
            Ins::Insert(n) if n == len => self.next(),
            Ins::Insert(n) => {
                self.ins = Ins::Insert(n - len);
                self.off += len;
            }
            Ins::Done => {}
        }
    }
}

/// Iterates over changed ranges along with the text inserted there.
pub(crate) struct ChangesIter<'a> {
    sections: &'a [Section],
    inserted: &'a [Text],
    individual: bool,
    i: usize,
    pos_a: usize,
    pos_b: usize,
}

impl<'a> ChangesIter<'a> {
    pub(crate) fn new(sections: &'a [Section], inserted: &'a [Text], individual: bool) -> Self {
        ChangesIter {
            sections,
            inserted,
            individual,
            i: 0,
            pos_a: 0,
            pos_b: 0,
        }
    }

    fn inserted_at(&self, index: usize, ins: usize) -> Option<&'a Text> {
        if ins == 0 {
            None
        } else {
            self.inserted.get(index)
        }
    }
}

impl Iterator for ChangesIter<'_> {
    type Item = (ChangedRange, Text);

    fn next(&mut self) -> Option<(ChangedRange, Text)> {
        while let Some(&section) = self.sections.get(self.i) {
            self.i += 1;
            let (len, ins) = match section {
                Section::Retain(len) => {
                    self.pos_a += len;
                    self.pos_b += len;
                    continue;
                }
                Section::Replace { len, ins } => (len, ins),
            };
            let (mut end_a, mut end_b) = (self.pos_a + len, self.pos_b + ins);
            let mut text = self
                .inserted_at(self.i - 1, ins)
                .cloned()
                .unwrap_or_else(Text::empty);
            while !self.individual {
                let Some(&Section::Replace { len, ins }) = self.sections.get(self.i) else {
                    break;
                };
                end_a += len;
                end_b += ins;
                if let Some(more) = self.inserted_at(self.i, ins) {
                    text = text.append(more);
                }
                self.i += 1;
            }
            let range = ChangedRange {
                from_a: self.pos_a,
                to_a: end_a,
                from_b: self.pos_b,
                to_b: end_b,
            };
            self.pos_a = end_a;
            self.pos_b = end_b;
            return Some((range, text));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn desc(spec: &str) -> ChangeDesc {
        let sections = spec
            .split_whitespace()
            .map(|part| match part.split_once(':') {
                Some((len, ins)) => Section::Replace {
                    len: len.parse().unwrap(),
                    ins: ins.parse().unwrap(),
                },
                None => Section::Retain(part.parse().unwrap()),
            })
            .collect();
        ChangeDesc::from_sections(sections)
    }

    #[test]
    fn test_lengths() {
        let d = desc("4 2:5 3 0:1");
        assert_eq!(d.len(), 9);
        assert_eq!(d.new_len(), 13);
        assert!(!d.is_empty());
        assert!(desc("10").is_empty());
        assert!(ChangeDesc::default().is_empty());
    }

    #[test]
    fn test_display_lists_runs() {
        assert_eq!(desc("4 2:5 3").to_string(), "4 2:5 3");
        assert_eq!(desc("").to_string(), "");
    }

    #[test]
    fn test_inverted_desc_swaps_lengths() {
        assert_eq!(desc("4 2:5 3 0:1").inverted_desc(), desc("4 5:2 3 1:0"));
    }

    #[rstest]
    #[case(0, Assoc::Before, 0)]
    #[case(3, Assoc::Before, 3)]
    #[case(4, Assoc::Before, 4)]
    #[case(4, Assoc::After, 4)]
    #[case(5, Assoc::Before, 4)]
    #[case(5, Assoc::After, 9)]
    #[case(6, Assoc::Before, 9)]
    #[case(9, Assoc::Before, 12)]
    fn test_map_pos_through_replacement(#[case] pos: usize, #[case] assoc: Assoc, #[case] expected: usize) {
        assert_eq!(desc("4 2:5 3").map_pos(pos, assoc), expected);
    }

    #[test]
    fn test_map_pos_at_insertion_point_follows_assoc() {
        let d = desc("2 0:3 2");
        assert_eq!(d.map_pos(2, Assoc::Before), 2);
        assert_eq!(d.map_pos(2, Assoc::After), 5);
        assert_eq!(d.map_pos(4, Assoc::Before), 7);
    }

    #[test]
    fn test_map_pos_tracked_modes() {
        let d = desc("2 3:0 2");
        assert_eq!(d.map_pos_tracked(3, Assoc::Before, MapMode::TrackDel), None);
        assert_eq!(d.map_pos_tracked(2, Assoc::Before, MapMode::TrackDel), Some(2));
        assert_eq!(d.map_pos_tracked(5, Assoc::Before, MapMode::TrackDel), Some(2));
        assert_eq!(d.map_pos_tracked(5, Assoc::Before, MapMode::TrackBefore), None);
        assert_eq!(d.map_pos_tracked(2, Assoc::Before, MapMode::TrackBefore), Some(2));
        assert_eq!(d.map_pos_tracked(2, Assoc::Before, MapMode::TrackAfter), None);
        assert_eq!(d.map_pos_tracked(5, Assoc::Before, MapMode::TrackAfter), Some(2));
        assert_eq!(d.map_pos_tracked(3, Assoc::Before, MapMode::Simple), Some(2));
    }

    #[test]
    #[should_panic(expected = "Invalid position 8")]
    fn test_map_pos_past_end_panics() {
        desc("4 2:5 1").map_pos(8, Assoc::Before);
    }

    #[rstest]
    #[case(0, 1, TouchesRange::No)]
    #[case(0, 4, TouchesRange::Yes)]
    #[case(5, 5, TouchesRange::Cover)]
    #[case(7, 7, TouchesRange::Yes)]
    #[case(8, 9, TouchesRange::No)]
    fn test_touches_range(#[case] from: usize, #[case] to: usize, #[case] expected: TouchesRange) {
        assert_eq!(desc("4 3:1 3").touches_range(from, to), expected);
    }

    #[test]
    fn test_iter_gaps() {
        let gaps: Vec<_> = desc("4 2:5 3").iter_gaps().collect();
        assert_eq!(gaps, vec![(0, 0, 4), (6, 9, 3)]);
    }

    #[test]
    fn test_iter_changed_ranges_joins_adjacent_unless_individual() {
        let d = desc("1 2:0 0:3 1");
        let joined: Vec<_> = d.iter_changed_ranges(false).collect();
        assert_eq!(
            joined,
            vec![ChangedRange {
                from_a: 1,
                to_a: 3,
                from_b: 1,
                to_b: 4
            }]
        );
        assert_eq!(d.iter_changed_ranges(true).count(), 2);
    }

    #[test]
    fn test_compose_desc() {
        let a = desc("2 0:2 3");
        let b = desc("1 4:0 2");
        let composed = a.compose_desc(&b).unwrap();
        assert_eq!(composed.len(), 5);
        assert_eq!(composed.new_len(), 3);
        assert_eq!(composed.to_string(), "1 2:0 2");
    }

    #[test]
    fn test_compose_desc_rejects_mismatched_lengths() {
        assert_eq!(
            desc("2 0:2").compose_desc(&desc("3")),
            Err(StateError::MismatchedLength { got: 3, expected: 4 })
        );
    }

    #[test]
    fn test_map_desc_orders_concurrent_insertions() {
        let a = desc("2 0:1 2");
        let b = desc("2 0:3 2");
        assert_eq!(a.map_desc(&b, true).unwrap(), desc("2 0:1 5"));
        assert_eq!(a.map_desc(&b, false).unwrap(), desc("5 0:1 2"));
    }

    #[test]
    fn test_add_section_merges_runs() {
        let mut sections = Vec::new();
        add_section(&mut sections, 2, None, false);
        add_section(&mut sections, 3, None, false);
        add_section(&mut sections, 0, Some(2), false);
        add_section(&mut sections, 0, Some(1), false);
        add_section(&mut sections, 0, None, false);
        assert_eq!(
            sections,
            vec![Section::Retain(5), Section::Replace { len: 0, ins: 3 }]
        );
    }
}
