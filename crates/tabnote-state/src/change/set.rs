use std::ops::Range;

use super::{
    Assoc, ChangeDesc, ChangedRange, ChangesIter, Ins, Section, SectionIter, add_insert, add_section,
    algebra,
};
use crate::error::StateError;
use crate::text::{Text, split_lines};

/// A change together with the text it inserts.
///
/// `inserted[i]` holds the text for `sections[i]`. Kept runs and pure
/// deletions have an empty text or no entry at all.
#[derive(Debug, Clone)]
pub struct ChangeSet {
    desc: ChangeDesc,
    inserted: Vec<Text>,
}

/// Text to insert for a [`ChangeSpec::Replace`].
#[derive(Debug, Clone)]
pub enum InsertText {
    /// Split into lines with the separator passed to [`ChangeSet::of`].
    Str(String),
    Text(Text),
}

impl Default for InsertText {
    fn default() -> Self {
        InsertText::Text(Text::empty())
    }
}

impl From<&str> for InsertText {
    fn from(s: &str) -> Self {
        InsertText::Str(s.to_string())
    }
}

impl From<String> for InsertText {
    fn from(s: String) -> Self {
        InsertText::Str(s)
    }
}

impl From<Text> for InsertText {
    fn from(text: Text) -> Self {
        InsertText::Text(text)
    }
}

/// Description of edits for [`ChangeSet::of`].
///
/// All positions refer to the document the resulting change applies to.
#[derive(Debug, Clone)]
pub enum ChangeSpec {
    Replace {
        from: usize,
        to: usize,
        insert: InsertText,
    },
    Set(ChangeSet),
    List(Vec<ChangeSpec>),
}

impl ChangeSpec {
    pub fn insert(at: usize, text: impl Into<InsertText>) -> ChangeSpec {
        ChangeSpec::Replace {
            from: at,
            to: at,
            insert: text.into(),
        }
    }

    pub fn delete(from: usize, to: usize) -> ChangeSpec {
        ChangeSpec::Replace {
            from,
            to,
            insert: InsertText::default(),
        }
    }

    pub fn replace(from: usize, to: usize, text: impl Into<InsertText>) -> ChangeSpec {
        ChangeSpec::Replace {
            from,
            to,
            insert: text.into(),
        }
    }
}

impl From<ChangeSet> for ChangeSpec {
    fn from(set: ChangeSet) -> Self {
        ChangeSpec::Set(set)
    }
}

impl From<Vec<ChangeSpec>> for ChangeSpec {
    fn from(specs: Vec<ChangeSpec>) -> Self {
        ChangeSpec::List(specs)
    }
}

/// Result of [`ChangeSet::filter`].
#[derive(Debug, Clone)]
pub struct FilteredChanges {
    /// The changes that do not touch the filtered ranges.
    pub changes: ChangeSet,
    /// The dropped changes, expressed against the document after `changes`.
    pub filtered: ChangeDesc,
}

impl ChangeSet {
    pub(crate) fn from_parts(sections: Vec<Section>, inserted: Vec<Text>) -> ChangeSet {
        ChangeSet {
            desc: ChangeDesc::from_sections(sections),
            inserted,
        }
    }

    /// A change that keeps a document of length `len` as it is.
    pub fn empty(len: usize) -> ChangeSet {
        let sections = if len > 0 { vec![Section::Retain(len)] } else { Vec::new() };
        ChangeSet::from_parts(sections, Vec::new())
    }

    /// Build a change from edit specs against a document of length `len`.
    ///
    /// Replacements must be given in document order to end up in a single
    /// pass. A spec starting before the end of the previous one, and every
    /// nested [`ChangeSet`], is combined with what came before as if both
    /// were made to the original document. Strings are split into lines on
    /// `line_sep`, or on any line break when it is `None`.
    pub fn of(spec: impl Into<ChangeSpec>, len: usize, line_sep: Option<&str>) -> Result<ChangeSet, StateError> {
        let mut builder = SpecBuilder {
            len,
            line_sep,
            sections: Vec::new(),
            inserted: Vec::new(),
            pos: 0,
            total: None,
        };
        builder.process(spec.into())?;
        let force = builder.total.is_none();
        builder.flush(force)?;
        Ok(builder.total.unwrap_or_else(|| ChangeSet::empty(len)))
    }

    pub fn desc(&self) -> &ChangeDesc {
        &self.desc
    }

    pub fn into_desc(self) -> ChangeDesc {
        self.desc
    }

    pub fn sections(&self) -> &[Section] {
        &self.desc.sections
    }

    pub fn len(&self) -> usize {
        self.desc.len()
    }

    pub fn new_len(&self) -> usize {
        self.desc.new_len()
    }

    pub fn is_empty(&self) -> bool {
        self.desc.is_empty()
    }

    /// Shorthand for `self.desc().map_pos(pos, assoc)`.
    #[track_caller]
    pub fn map_pos(&self, pos: usize, assoc: Assoc) -> usize {
        self.desc.map_pos(pos, assoc)
    }

    /// Changed ranges with the text inserted in each. Adjacent replacements
    /// are joined unless `individual` is set.
    pub fn iter_changes(&self, individual: bool) -> impl Iterator<Item = (ChangedRange, Text)> + '_ {
        ChangesIter::new(&self.desc.sections, &self.inserted, individual)
    }

    /// Fail unless `doc` has this change's length and every changed range
    /// starts and ends on a character boundary of it.
    pub fn check_doc(&self, doc: &Text) -> Result<(), StateError> {
        if self.len() != doc.len() {
            return Err(StateError::WrongDocumentLength {
                got: doc.len(),
                expected: self.len(),
            });
        }
        for range in self.desc.iter_changed_ranges(true) {
            doc.check_pos(range.from_a)?;
            doc.check_pos(range.to_a)?;
        }
        Ok(())
    }

    /// Apply the change to `doc`, which must have the change's length.
    pub fn apply(&self, doc: &Text) -> Result<Text, StateError> {
        self.check_doc(doc)?;
        let mut doc = doc.clone();
        for (range, text) in self.iter_changes(false) {
            doc = doc.replace(range.from_b, range.from_b + (range.to_a - range.from_a), &text);
        }
        Ok(doc)
    }

    /// The change that undoes this one. `doc` is the document before this
    /// change, which holds the text the inverse has to restore.
    pub fn invert(&self, doc: &Text) -> Result<ChangeSet, StateError> {
        self.check_doc(doc)?;
        let mut sections = Vec::with_capacity(self.desc.sections.len());
        let mut inserted = Vec::new();
        let mut pos = 0;
        for (index, section) in self.desc.sections.iter().enumerate() {
            match *section {
                Section::Retain(len) => sections.push(Section::Retain(len)),
                Section::Replace { len, ins } => {
                    sections.push(Section::Replace { len: ins, ins: len });
                    inserted.resize_with(index, Text::empty);
                    inserted.push(if len > 0 { doc.slice(pos, pos + len) } else { Text::empty() });
                }
            }
            pos += section.len();
        }
        Ok(ChangeSet::from_parts(sections, inserted))
    }

    /// This change followed by `other`, as a single change.
    pub fn compose(&self, other: &ChangeSet) -> Result<ChangeSet, StateError> {
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
        let (sections, inserted) = algebra::compose_sets(&self.desc, &self.inserted, &other.desc, &other.inserted)?;
        Ok(ChangeSet::from_parts(sections, inserted))
    }

    /// Rebase this change onto the document produced by `other`, a change
    /// to the same starting document. When both insert at the same place,
    /// `before` puts this change's text first.
    pub fn map(&self, other: &ChangeDesc, before: bool) -> Result<ChangeSet, StateError> {
        if self.len() != other.len() {
            return Err(StateError::MismatchedLength {
                got: other.len(),
                expected: self.len(),
            });
        }
        if other.is_empty() {
            return Ok(self.clone());
        }
        let (sections, inserted) = algebra::map_set(&self.desc, &self.inserted, other, before)?;
        Ok(ChangeSet::from_parts(sections, inserted))
    }

    /// Shape of [`ChangeSet::map`], without building the inserted text.
    pub fn map_desc(&self, other: &ChangeDesc, before: bool) -> Result<ChangeDesc, StateError> {
        self.desc.map_desc(other, before)
    }

    /// Split the change into the parts outside `ranges` and the parts that
    /// touch them. `ranges` must be sorted and non-overlapping.
    pub fn filter(&self, ranges: &[Range<usize>]) -> FilteredChanges {
        let mut result_sections = Vec::new();
        let mut result_inserted = Vec::new();
        let mut filtered_sections = Vec::new();
        let mut iter = SectionIter::new(&self.desc.sections, &self.inserted);
        let mut pos = 0;
        let mut ranges = ranges.iter();
        'done: loop {
            let (next, end) = match ranges.next() {
                Some(range) => (range.start, Some(range.end)),
                None => (usize::MAX, None),
            };
            while pos < next || (pos == next && iter.len == 0) {
                if iter.done() {
                    break 'done;
                }
                let len = iter.len.min(next - pos);
                add_section(&mut filtered_sections, len, None, false);
                let ins = iter.ins_len().map(|ins| if iter.off == 0 { ins } else { 0 });
                add_section(&mut result_sections, len, ins, false);
                if ins.is_some_and(|ins| ins > 0) {
                    add_insert(&mut result_inserted, &result_sections, &iter.text());
                }
                iter.forward(len);
                pos += len;
            }
            let Some(end) = end else { continue };
            while pos < end {
                if iter.done() {
                    break 'done;
                }
                let len = iter.len.min(end - pos);
                add_section(&mut result_sections, len, None, false);
                let ins = match iter.ins {
                    Ins::Insert(ins) if iter.off == 0 => Some(ins),
                    Ins::Insert(_) => Some(0),
                    Ins::Retain | Ins::Done => None,
                };
                add_section(&mut filtered_sections, len, ins, false);
                iter.forward(len);
                pos += len;
            }
        }
        FilteredChanges {
            changes: ChangeSet::from_parts(result_sections, result_inserted),
            filtered: ChangeDesc::from_sections(filtered_sections),
        }
    }

    /// Inserted text for section `index`, if it has any.
    pub(crate) fn inserted_at(&self, index: usize) -> Option<&Text> {
        self.inserted.get(index)
    }
}

impl AsRef<ChangeDesc> for ChangeSet {
    fn as_ref(&self) -> &ChangeDesc {
        &self.desc
    }
}

impl PartialEq for ChangeSet {
    fn eq(&self, other: &ChangeSet) -> bool {
        self.desc == other.desc
            && self.desc.sections.iter().enumerate().all(|(i, section)| {
                section.ins().is_none_or(|ins| ins == 0)
                    || self.inserted.get(i) == other.inserted.get(i)
            })
    }
}

impl Eq for ChangeSet {}

/// Accumulates specs into sections, flushing into `total` whenever a spec
/// does not continue where the previous one ended.
struct SpecBuilder<'a> {
    len: usize,
    line_sep: Option<&'a str>,
    sections: Vec<Section>,
    inserted: Vec<Text>,
    pos: usize,
    total: Option<ChangeSet>,
}

impl SpecBuilder<'_> {
    fn flush(&mut self, force: bool) -> Result<(), StateError> {
        if !force && self.sections.is_empty() {
            return Ok(());
        }
        if self.pos < self.len {
            add_section(&mut self.sections, self.len - self.pos, None, false);
        }
        let set = ChangeSet::from_parts(
            std::mem::take(&mut self.sections),
            std::mem::take(&mut self.inserted),
        );
        self.combine(set)?;
        self.pos = 0;
        Ok(())
    }

    fn combine(&mut self, set: ChangeSet) -> Result<(), StateError> {
        self.total = Some(match self.total.take() {
            Some(total) => total.compose(&set.map(total.desc(), false)?)?,
            None => set,
        });
        Ok(())
    }

    fn process(&mut self, spec: ChangeSpec) -> Result<(), StateError> {
        match spec {
            ChangeSpec::List(specs) => {
                for spec in specs {
                    self.process(spec)?;
                }
            }
            ChangeSpec::Set(set) => {
                if set.len() != self.len {
                    return Err(StateError::MismatchedLength {
                        got: set.len(),
                        expected: self.len,
                    });
                }
                self.flush(false)?;
                self.combine(set)?;
            }
            ChangeSpec::Replace { from, to, insert } => {
                if from > to || to > self.len {
                    return Err(StateError::InvalidChangeRange {
                        from,
                        to,
                        len: self.len,
                    });
                }
                let text = match insert {
                    InsertText::Text(text) => text,
                    InsertText::Str(s) => Text::from_lines(
                        split_lines(&s, self.line_sep)
                            .into_iter()
                            .map(str::to_string)
                            .collect(),
                    ),
                };
                if from == to && text.is_empty() {
                    return Ok(());
                }
                if from < self.pos {
                    self.flush(false)?;
                }
                if from > self.pos {
                    add_section(&mut self.sections, from - self.pos, None, false);
                }
                add_section(&mut self.sections, to - from, Some(text.len()), false);
                add_insert(&mut self.inserted, &self.sections, &text);
                self.pos = to;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn doc() -> Text {
        Text::from("abcdefg")
    }

    #[test]
    fn test_replace_spec_applies() {
        let cs = ChangeSet::of(ChangeSpec::replace(1, 2, "XY"), 7, None).unwrap();
        assert_eq!(cs.apply(&doc()).unwrap().to_string(), "aXYcdefg");
        assert_eq!(cs.new_len(), 8);
        assert_eq!(cs.desc().to_string(), "1 1:2 5");
    }

    #[test]
    fn test_invert_restores_document() {
        let original = doc();
        let cs = ChangeSet::of(ChangeSpec::replace(1, 2, "XY"), 7, None).unwrap();
        let changed = cs.apply(&original).unwrap();
        let inverse = cs.invert(&original).unwrap();
        assert_eq!(inverse.apply(&changed).unwrap().to_string(), "abcdefg");
    }

    #[test]
    fn test_apply_rejects_wrong_length() {
        let cs = ChangeSet::empty(3);
        assert_eq!(
            cs.apply(&doc()),
            Err(StateError::WrongDocumentLength { got: 7, expected: 3 })
        );
        assert_eq!(
            cs.invert(&doc()),
            Err(StateError::WrongDocumentLength { got: 7, expected: 3 })
        );
    }

    #[rstest]
    #[case(ChangeSpec::replace(3, 2, "x"))]
    #[case(ChangeSpec::delete(5, 8))]
    fn test_invalid_spec_range(#[case] spec: ChangeSpec) {
        assert!(matches!(
            ChangeSet::of(spec, 7, None),
            Err(StateError::InvalidChangeRange { len: 7, .. })
        ));
    }

    #[test]
    fn test_nested_set_must_match_length() {
        let spec = ChangeSpec::List(vec![ChangeSet::empty(4).into()]);
        assert_eq!(
            ChangeSet::of(spec, 7, None),
            Err(StateError::MismatchedLength { got: 4, expected: 7 })
        );
    }

    #[test]
    fn test_multiple_specs_in_order() {
        let cs = ChangeSet::of(
            vec![
                ChangeSpec::insert(0, ">"),
                ChangeSpec::delete(2, 4),
                ChangeSpec::insert(7, "!"),
            ],
            7,
            None,
        )
        .unwrap();
        assert_eq!(cs.apply(&doc()).unwrap().to_string(), ">abefg!");
        assert_eq!(cs.desc().to_string(), "0:1 2 2:0 3 0:1");
    }

    #[test]
    fn test_out_of_order_specs_are_combined() {
        let cs = ChangeSet::of(
            vec![ChangeSpec::replace(4, 5, "E"), ChangeSpec::replace(0, 1, "A")],
            7,
            None,
        )
        .unwrap();
        assert_eq!(cs.apply(&doc()).unwrap().to_string(), "AbcdEfg");
    }

    #[test]
    fn test_overlapping_specs_are_combined() {
        let cs = ChangeSet::of(
            vec![ChangeSpec::replace(1, 4, "X"), ChangeSpec::replace(2, 5, "Y")],
            7,
            None,
        )
        .unwrap();
        assert_eq!(cs.apply(&doc()).unwrap().to_string(), "aXYfg");
    }

    #[test]
    fn test_empty_insert_is_no_change() {
        let cs = ChangeSet::of(ChangeSpec::insert(3, ""), 7, None).unwrap();
        assert!(cs.is_empty());
        assert_eq!(cs, ChangeSet::empty(7));
    }

    #[test]
    fn test_line_separator_splits_insert() {
        let cs = ChangeSet::of(ChangeSpec::insert(0, "a|b|"), 0, Some("|")).unwrap();
        let text = cs.apply(&Text::empty()).unwrap();
        assert_eq!(text.lines(), 3);
        assert_eq!(text.to_string(), "a\nb\n");
    }

    #[test]
    fn test_compose_applies_both() {
        let original = doc();
        let a = ChangeSet::of(ChangeSpec::insert(2, "12"), 7, None).unwrap();
        let b = ChangeSet::of(ChangeSpec::delete(1, 4), 9, None).unwrap();
        let composed = a.compose(&b).unwrap();
        let stepwise = b.apply(&a.apply(&original).unwrap()).unwrap();
        assert_eq!(composed.apply(&original).unwrap(), stepwise);
        assert_eq!(stepwise.to_string(), "a2cdefg");
    }

    #[test]
    fn test_compose_rejects_mismatched_lengths() {
        assert_eq!(
            ChangeSet::empty(3).compose(&ChangeSet::empty(4)),
            Err(StateError::MismatchedLength { got: 4, expected: 3 })
        );
    }

    #[test]
    fn test_compose_with_inverse_is_noop() {
        let original = doc();
        let cs = ChangeSet::of(
            vec![ChangeSpec::replace(0, 2, "xyz"), ChangeSpec::delete(5, 6)],
            7,
            None,
        )
        .unwrap();
        let round = cs.compose(&cs.invert(&original).unwrap()).unwrap();
        assert_eq!(round.len(), 7);
        assert_eq!(round.new_len(), 7);
        assert_eq!(round.apply(&original).unwrap(), original);
    }

    #[test]
    fn test_map_through_empty_returns_same_change() {
        let cs = ChangeSet::of(ChangeSpec::replace(1, 3, "Q"), 7, None).unwrap();
        assert_eq!(cs.map(ChangeSet::empty(7).desc(), false).unwrap(), cs);
    }

    #[test]
    fn test_map_concurrent_edits() {
        let original = doc();
        let a = ChangeSet::of(ChangeSpec::insert(1, "A"), 7, None).unwrap();
        let b = ChangeSet::of(ChangeSpec::replace(5, 7, "B"), 7, None).unwrap();
        let a_after_b = a.map(b.desc(), false).unwrap();
        let result = a_after_b.apply(&b.apply(&original).unwrap()).unwrap();
        assert_eq!(result.to_string(), "aAbcdeB");
        let b_after_a = b.map(a.desc(), true).unwrap();
        assert_eq!(b_after_a.apply(&a.apply(&original).unwrap()).unwrap(), result);
    }

    #[test]
    fn test_map_ties_follow_before_flag() {
        let original = doc();
        let a = ChangeSet::of(ChangeSpec::insert(3, "a"), 7, None).unwrap();
        let b = ChangeSet::of(ChangeSpec::insert(3, "b"), 7, None).unwrap();
        let after_b = b.apply(&original).unwrap();
        let first = a.map(b.desc(), true).unwrap().apply(&after_b).unwrap();
        let second = a.map(b.desc(), false).unwrap().apply(&after_b).unwrap();
        assert_eq!(first.to_string(), "abcabdefg");
        assert_eq!(second.to_string(), "abcbadefg");
    }

    #[test]
    fn test_iter_changes_reports_text() {
        let cs = ChangeSet::of(
            vec![ChangeSpec::replace(1, 2, "XY"), ChangeSpec::insert(5, "Z")],
            7,
            None,
        )
        .unwrap();
        let changes: Vec<_> = cs
            .iter_changes(false)
            .map(|(range, text)| (range.from_a, range.to_a, range.from_b, range.to_b, text.to_string()))
            .collect();
        assert_eq!(
            changes,
            vec![(1, 2, 1, 3, "XY".to_string()), (5, 5, 6, 7, "Z".to_string())]
        );
    }

    #[test]
    fn test_filter_splits_changes() {
        let original = doc();
        let cs = ChangeSet::of(
            vec![ChangeSpec::replace(0, 1, "A"), ChangeSpec::replace(4, 5, "E")],
            7,
            None,
        )
        .unwrap();
        let FilteredChanges { changes, filtered } = cs.filter(&[3..6]);
        assert_eq!(changes.apply(&original).unwrap().to_string(), "Abcdefg");
        assert_eq!(filtered.len(), changes.new_len());
        assert_eq!(filtered.to_string(), "4 1:1 2");
        let all = changes.desc().compose_desc(&filtered).unwrap();
        assert_eq!(&all, cs.desc());
    }

    #[test]
    fn test_changes_inside_characters_are_rejected() {
        let text = Text::from("héllo");
        let cs = ChangeSet::of(ChangeSpec::replace(2, 3, "x"), text.len(), None).unwrap();
        assert_eq!(cs.apply(&text).unwrap_err(), StateError::NotCharBoundary { pos: 2 });
        assert_eq!(cs.invert(&text).unwrap_err(), StateError::NotCharBoundary { pos: 2 });

        let insert = ChangeSet::of(ChangeSpec::insert(2, "x"), text.len(), None).unwrap();
        assert_eq!(insert.check_doc(&text), Err(StateError::NotCharBoundary { pos: 2 }));

        let whole = ChangeSet::of(ChangeSpec::replace(1, 3, "e"), text.len(), None).unwrap();
        assert_eq!(whole.apply(&text).unwrap().to_string(), "hello");
    }
}
