//! Algebraic laws of texts, change sets, selections and range sets,
//! checked against generated documents and edits.

use proptest::prelude::*;
use proptest::sample::Index;
use tabnote_state::{
    Assoc, ChangeSet, ChangeSpec, EditorSelection, Range, RangeSet, RangeValue, SelectionRange, Text,
};

fn line() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(vec!['a', 'b', 'z', ' ', '\t', 'é', '→', '🦀']), 0..12)
        .prop_map(|chars| chars.into_iter().collect())
}

fn text() -> impl Strategy<Value = Text> {
    prop::collection::vec(line(), 1..40).prop_map(|lines| Text::of(lines).unwrap())
}

/// Byte positions that fall on character boundaries of `text`.
fn boundaries(text: &Text) -> Vec<usize> {
    let s = text.to_string();
    s.char_indices().map(|(i, _)| i).chain([s.len()]).collect()
}

fn pick_range(points: &[usize], a: &Index, b: &Index) -> (usize, usize) {
    let (x, y) = (*a.get(points), *b.get(points));
    (x.min(y), x.max(y))
}

type Edit = (Index, Index, String);

fn edits() -> impl Strategy<Value = Vec<Edit>> {
    let insert = prop_oneof![Just(String::new()), line(), (line(), line()).prop_map(|(a, b)| format!("{a}\n{b}"))];
    prop::collection::vec((any::<Index>(), any::<Index>(), insert), 0..5)
}

fn changes_for(text: &Text, edits: &[Edit]) -> ChangeSet {
    let points = boundaries(text);
    let specs = edits
        .iter()
        .map(|(a, b, insert)| {
            let (from, to) = pick_range(&points, a, b);
            ChangeSpec::replace(from, to, insert.as_str())
        })
        .collect::<Vec<_>>();
    ChangeSet::of(specs, text.len(), None).unwrap()
}

#[derive(Debug, PartialEq)]
struct Tag(usize);

impl RangeValue for Tag {}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn slices_reassemble_the_text(text in text(), a in any::<Index>(), b in any::<Index>()) {
        let (from, to) = pick_range(&boundaries(&text), &a, &b);
        let rebuilt = text
            .slice(0, from)
            .append(&text.slice(from, to))
            .append(&text.slice(to, text.len()));
        prop_assert_eq!(rebuilt.to_string(), text.to_string());
        prop_assert_eq!(rebuilt.lines(), text.lines());
    }

    #[test]
    fn compose_matches_sequential_apply(text in text(), first in edits(), second in edits()) {
        let a = changes_for(&text, &first);
        let middle = a.apply(&text).unwrap();
        let b = changes_for(&middle, &second);
        let composed = a.compose(&b).unwrap();
        prop_assert_eq!(
            composed.apply(&text).unwrap().to_string(),
            b.apply(&middle).unwrap().to_string()
        );
        prop_assert_eq!(composed.len(), text.len());
    }

    #[test]
    fn compose_is_associative(text in text(), first in edits(), second in edits(), third in edits()) {
        let a = changes_for(&text, &first);
        let after_a = a.apply(&text).unwrap();
        let b = changes_for(&after_a, &second);
        let c = changes_for(&b.apply(&after_a).unwrap(), &third);
        let left = a.compose(&b).unwrap().compose(&c).unwrap();
        let right = a.compose(&b.compose(&c).unwrap()).unwrap();
        prop_assert_eq!(left.desc(), right.desc());
        prop_assert_eq!(
            left.apply(&text).unwrap().to_string(),
            right.apply(&text).unwrap().to_string()
        );
    }

    #[test]
    fn composing_with_empty_changes_nothing(text in text(), edits in edits()) {
        let changes = changes_for(&text, &edits);
        let before = ChangeSet::empty(changes.len()).compose(&changes).unwrap();
        let after = changes.compose(&ChangeSet::empty(changes.new_len())).unwrap();
        let expected = changes.apply(&text).unwrap().to_string();
        prop_assert_eq!(before.desc(), changes.desc());
        prop_assert_eq!(after.desc(), changes.desc());
        prop_assert_eq!(before.apply(&text).unwrap().to_string(), expected.clone());
        prop_assert_eq!(after.apply(&text).unwrap().to_string(), expected);
    }

    #[test]
    fn invert_restores_the_original(text in text(), edits in edits()) {
        let changes = changes_for(&text, &edits);
        let changed = changes.apply(&text).unwrap();
        let restored = changes.invert(&text).unwrap().apply(&changed).unwrap();
        prop_assert_eq!(restored.to_string(), text.to_string());
    }

    #[test]
    fn mapping_over_nothing_changes_nothing(text in text(), edits in edits()) {
        let changes = changes_for(&text, &edits);
        let empty = ChangeSet::empty(text.len()).into_desc();
        let mapped = changes.map(&empty, false).unwrap();
        prop_assert_eq!(mapped.desc(), changes.desc());
        prop_assert_eq!(
            mapped.apply(&text).unwrap().to_string(),
            changes.apply(&text).unwrap().to_string()
        );
    }

    #[test]
    fn parallel_changes_converge(text in text(), first in edits(), second in edits()) {
        let a = changes_for(&text, &first);
        let b = changes_for(&text, &second);
        let a_then_b = a.compose(&b.map(a.desc(), false).unwrap()).unwrap();
        let b_then_a = b.compose(&a.map(b.desc(), true).unwrap()).unwrap();
        prop_assert_eq!(
            a_then_b.apply(&text).unwrap().to_string(),
            b_then_a.apply(&text).unwrap().to_string()
        );
    }

    #[test]
    fn normalized_selection_is_stable(
        ends in prop::collection::vec((0usize..200, 0usize..200), 1..8),
        main in any::<Index>(),
    ) {
        let ranges = ends
            .iter()
            .map(|&(anchor, head)| EditorSelection::range(anchor, head))
            .collect::<Vec<SelectionRange>>();
        let main = main.index(ranges.len());
        let once = EditorSelection::create(ranges, main).unwrap();
        let twice = EditorSelection::create(once.ranges().to_vec(), once.main_index()).unwrap();
        prop_assert_eq!(&twice, &once);
        prop_assert_eq!(twice.main_index(), once.main_index());
        for pair in once.ranges().windows(2) {
            prop_assert!(pair[0].to() <= pair[1].from());
        }
    }

    #[test]
    fn selections_survive_edits(text in text(), edits in edits(), a in any::<Index>(), b in any::<Index>()) {
        let points = boundaries(&text);
        let changes = changes_for(&text, &edits);
        let selection = EditorSelection::single(*a.get(&points), *b.get(&points));
        let mapped = selection.map(changes.desc(), Assoc::Before);
        prop_assert!(mapped.main().to() <= changes.new_len());
    }

    #[test]
    fn range_set_maps_to_itself_over_no_changes(
        spans in prop::collection::vec((0usize..1000, 0usize..20), 0..300),
    ) {
        let ranges = spans
            .iter()
            .enumerate()
            .map(|(i, &(from, len))| Range::new(from, from + len, Tag(i)).unwrap())
            .collect::<Vec<_>>();
        let set = RangeSet::of(ranges, true).unwrap();
        let mapped = set.map(&ChangeSet::empty(2000).into_desc());
        prop_assert!(mapped.ptr_eq(&set));
        prop_assert_eq!(mapped.size(), spans.len());
    }

    #[test]
    fn range_set_iterates_in_order(
        spans in prop::collection::vec((0usize..1000, 0usize..20), 0..600),
    ) {
        let ranges = spans
            .iter()
            .enumerate()
            .map(|(i, &(from, len))| Range::new(from, from + len, Tag(i)).unwrap())
            .collect::<Vec<_>>();
        let set = RangeSet::of(ranges, true).unwrap();
        let seen = set.iter(0).map(|range| range.from).collect::<Vec<_>>();
        prop_assert_eq!(seen.len(), spans.len());
        prop_assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
    }
}
