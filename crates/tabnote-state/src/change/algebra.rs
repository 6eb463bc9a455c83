//! Two-pointer walks over a pair of changes: composition and mapping.
//!
//! Both return the resulting sections plus the inserted texts aligned to
//! them. Description-only callers pass empty text slices and ignore the
//! second half of the result.

use super::{ChangeDesc, Ins, SectionIter, Section, add_insert, add_section};
use crate::error::StateError;
use crate::text::Text;

type Parts = (Vec<Section>, Vec<Text>);

/// Combine `set_a` followed by `set_b` into one change against `set_a`'s document.
pub(crate) fn compose_sets(
    set_a: &ChangeDesc,
    text_a: &[Text],
    set_b: &ChangeDesc,
    text_b: &[Text],
) -> Result<Parts, StateError> {
    let mismatch = || StateError::MismatchedLength {
        got: set_b.len(),
        expected: set_a.new_len(),
    };
    let mut sections = Vec::new();
    let mut insert = Vec::new();
    let mut a = SectionIter::new(&set_a.sections, text_a);
    let mut b = SectionIter::new(&set_b.sections, text_b);
    // Set while the last emitted replacement continues into the next step
    let mut open = false;
    loop {
        if a.done() && b.done() {
            return Ok((sections, insert));
        } else if a.ins == Ins::Insert(0) {
            // Deletion in A
            add_section(&mut sections, a.len, Some(0), open);
            a.next();
        } else if b.len == 0 && !b.done() {
            // Insertion in B
            add_section(&mut sections, 0, b.ins_len(), open);
            add_insert(&mut insert, &sections, &b.text());
            b.next();
        } else if a.done() || b.done() {
            return Err(mismatch());
        } else {
            let len = a.len2().min(b.len);
            let section_count = sections.len();
            match (a.ins, b.ins) {
                (Ins::Retain, _) => {
                    let ins_b = b.ins_len().map(|ins| if b.off > 0 { 0 } else { ins });
                    add_section(&mut sections, len, ins_b, open);
                    if ins_b.is_some_and(|ins| ins > 0) {
                        add_insert(&mut insert, &sections, &b.text());
                    }
                }
                (_, Ins::Retain) => {
                    let len_a = if a.off > 0 { 0 } else { a.len };
                    add_section(&mut sections, len_a, Some(len), open);
                    add_insert(&mut insert, &sections, &a.text_bit(len));
                }
                _ => {
                    let len_a = if a.off > 0 { 0 } else { a.len };
                    let ins_b = if b.off > 0 { 0 } else { b.len2() };
                    add_section(&mut sections, len_a, Some(ins_b), open);
                    if b.off == 0 {
                        add_insert(&mut insert, &sections, &b.text());
                    }
                }
            }
            let a_continues = matches!(a.ins, Ins::Insert(ins) if ins > len);
            let b_continues = b.is_insert() && b.len > len;
            open = (a_continues || b_continues) && (open || sections.len() > section_count);
            a.forward2(len);
            b.forward(len);
        }
    }
}

/// Rebase `set_a` so it applies to the document produced by `set_b`.
pub(crate) fn map_set(
    set_a: &ChangeDesc,
    text_a: &[Text],
    set_b: &ChangeDesc,
    before: bool,
) -> Result<Parts, StateError> {
    let mismatch = || StateError::MismatchedLength {
        got: set_b.len(),
        expected: set_a.len(),
    };
    let mut sections = Vec::new();
    let mut insert = Vec::new();
    let mut a = SectionIter::new(&set_a.sections, text_a);
    let mut b = SectionIter::new(&set_b.sections, &[]);
    // Index (one-based) of the last A section whose insertion was emitted
    let mut inserted = 0;
    loop {
        if (a.done() && b.len > 0) || (b.done() && a.len > 0) {
            return Err(mismatch());
        } else if a.ins == Ins::Retain && b.ins == Ins::Retain {
            // Stretch kept by both
            let len = a.len.min(b.len);
            add_section(&mut sections, len, None, false);
            a.forward(len);
            b.forward(len);
        } else if let Some(ins_b) = b.ins_len().filter(|_| {
            !a.is_insert()
                || inserted == a.i
                || (a.off == 0 && (b.len < a.len || (b.len == a.len && !before)))
        }) {
            // A change in B comes first: skip over it, emitting any A
            // insertions it covers
            let mut len = b.len;
            add_section(&mut sections, ins_b, None, false);
            while len > 0 {
                if a.done() {
                    return Err(mismatch());
                }
                let piece = a.len.min(len);
                if let Some(ins_a) = a.ins_len() {
                    if inserted < a.i && a.len <= piece {
                        add_section(&mut sections, 0, Some(ins_a), false);
                        add_insert(&mut insert, &sections, &a.text());
                        inserted = a.i;
                    }
                }
                a.forward(piece);
                len -= piece;
            }
            b.next();
        } else if let Some(ins_a) = a.ins_len() {
            // The part of A's change up to the next non-deleting change in B
            let mut len = 0;
            let mut left = a.len;
            while left > 0 {
                match b.ins {
                    Ins::Retain => {
                        let piece = left.min(b.len);
                        len += piece;
                        left -= piece;
                        b.forward(piece);
                    }
                    Ins::Insert(0) if b.len < left => {
                        left -= b.len;
                        b.next();
                    }
                    _ => break,
                }
            }
            let fresh = inserted < a.i;
            add_section(&mut sections, len, Some(if fresh { ins_a } else { 0 }), false);
            if fresh {
                add_insert(&mut insert, &sections, &a.text());
            }
            inserted = a.i;
            a.forward(a.len - left);
        } else if a.done() && b.done() {
            return Ok((sections, insert));
        } else {
            return Err(mismatch());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn desc(sections: Vec<Section>) -> ChangeDesc {
        ChangeDesc::from_sections(sections)
    }

    #[test]
    fn test_compose_insertion_then_deletion_of_it() {
        let a = desc(vec![Section::Retain(2), Section::Replace { len: 0, ins: 3 }, Section::Retain(2)]);
        let b = desc(vec![Section::Retain(2), Section::Replace { len: 3, ins: 0 }, Section::Retain(2)]);
        let (sections, _) = compose_sets(&a, &[], &b, &[]).unwrap();
        assert_eq!(desc(sections).to_string(), "4");
    }

    #[test]
    fn test_compose_keeps_both_insertions_in_order() {
        let a = desc(vec![Section::Replace { len: 0, ins: 1 }, Section::Retain(2)]);
        let b = desc(vec![Section::Retain(3), Section::Replace { len: 0, ins: 2 }]);
        let text_a = vec![Text::from("x")];
        let text_b = vec![Text::empty(), Text::from("yz")];
        let (sections, inserted) = compose_sets(&a, &text_a, &b, &text_b).unwrap();
        assert_eq!(desc(sections).to_string(), "0:1 2 0:2");
        assert_eq!(inserted[0].to_string(), "x");
        assert_eq!(inserted[2].to_string(), "yz");
    }

    #[test]
    fn test_map_set_keeps_insertion_inside_deleted_range() {
        let a = desc(vec![Section::Retain(3), Section::Replace { len: 0, ins: 2 }, Section::Retain(3)]);
        let b = desc(vec![Section::Retain(1), Section::Replace { len: 4, ins: 0 }, Section::Retain(1)]);
        let (sections, _) = map_set(&a, &[Text::empty(), Text::from("ab")], &b, false).unwrap();
        assert_eq!(desc(sections).to_string(), "1 0:2 1");
    }

    #[test]
    fn test_mismatched_lengths_fail() {
        let a = desc(vec![Section::Retain(3)]);
        let b = desc(vec![Section::Retain(1), Section::Replace { len: 1, ins: 0 }, Section::Retain(2)]);
        assert_eq!(
            map_set(&a, &[], &b, false),
            Err(StateError::MismatchedLength { got: 4, expected: 3 })
        );
    }
}
