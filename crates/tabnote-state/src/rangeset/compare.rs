use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::cursor::{SkipSet, SpanCursor, chunk_key};
use super::{FAR, FAR_SIDE, RangeSet, RangeValue};
use crate::change::{Assoc, ChangeDesc, TouchesRange};

/// Receives the differences found by [`RangeSet::compare`].
pub trait RangeComparator<T> {
    /// `from..to` is covered by different sets of non-point ranges.
    fn compare_range(&mut self, from: usize, to: usize, active_a: &[Arc<T>], active_b: &[Arc<T>]);

    /// `from..to` holds a point on at least one side, and the points (or the
    /// ranges around them) differ.
    fn compare_point(&mut self, from: usize, to: usize, point_a: Option<&Arc<T>>, point_b: Option<&Arc<T>>);

    /// A range boundary moved at `pos` without the covered content changing.
    /// Only called when [`RangeComparator::tracks_bounds`] is true.
    fn bound_change(&mut self, _pos: usize) {}

    fn tracks_bounds(&self) -> bool {
        false
    }
}

/// Receives the spans produced by [`RangeSet::spans`].
pub trait SpanIterator<T> {
    /// A stretch without points. `open_start` counts the active ranges
    /// that started before `from`.
    fn span(&mut self, from: usize, to: usize, active: &[Arc<T>], open_start: usize);

    /// A point range. `index` is the rank of the set it came from.
    fn point(&mut self, from: usize, to: usize, value: &Arc<T>, active: &[Arc<T>], open_start: usize, index: usize);
}

fn same_value<T: RangeValue>(a: &Arc<T>, b: &Arc<T>) -> bool {
    Arc::ptr_eq(a, b) || a == b
}

pub(crate) fn same_values<T: RangeValue>(a: &[Arc<T>], b: &[Arc<T>]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(a, b)| same_value(a, b))
}

/// Top-layer chunks without points that appear in both `a` and `b` at the
/// same (mapped) position and are not touched by `text_diff`.
fn find_shared_chunks<T: RangeValue>(a: &[RangeSet<T>], b: &[RangeSet<T>], text_diff: Option<&ChangeDesc>) -> SkipSet {
    let mut in_a = HashMap::new();
    for layer in a.iter().filter_map(|set| set.layer.as_ref()) {
        for (chunk, &pos) in layer.chunks.iter().zip(&layer.chunk_pos) {
            if chunk.max_point <= 0 {
                in_a.insert(chunk_key(chunk), pos);
            }
        }
    }
    let mut shared = HashSet::new();
    for layer in b.iter().filter_map(|set| set.layer.as_ref()) {
        for (chunk, &pos) in layer.chunks.iter().zip(&layer.chunk_pos) {
            let key = chunk_key(chunk);
            let Some(&known) = in_a.get(&key) else {
                continue;
            };
            let same_place = match text_diff {
                Some(diff) => {
                    diff.map_pos(known, Assoc::Before) == pos
                        && diff.touches_range(known, known + chunk.len()) == TouchesRange::No
                }
                None => known == pos,
            };
            if same_place {
                shared.insert(key);
            }
        }
    }
    Arc::new(shared)
}

fn has_points<T: RangeValue>(set: &RangeSet<T>, min_point_size: isize) -> bool {
    let max_point = set.max_point();
    max_point > 0 || (!set.is_empty() && max_point >= min_point_size)
}

pub(crate) fn compare<T: RangeValue>(
    old_sets: &[RangeSet<T>],
    new_sets: &[RangeSet<T>],
    text_diff: &ChangeDesc,
    comparator: &mut dyn RangeComparator<T>,
    min_point_size: isize,
) {
    let a: Vec<RangeSet<T>> = old_sets
        .iter()
        .filter(|set| has_points(set, min_point_size))
        .cloned()
        .collect();
    let b: Vec<RangeSet<T>> = new_sets
        .iter()
        .filter(|set| has_points(set, min_point_size))
        .cloned()
        .collect();
    let shared = find_shared_chunks(&a, &b, Some(text_diff));
    let mut side_a = SpanCursor::new(&a, Some(shared.clone()), min_point_size);
    let mut side_b = SpanCursor::new(&b, Some(shared), min_point_size);
    for (from_a, from_b, len) in text_diff.iter_gaps() {
        compare_spans(&mut side_a, from_a, &mut side_b, from_b, len, comparator);
    }
    if text_diff.is_empty() && text_diff.len() == 0 {
        compare_spans(&mut side_a, 0, &mut side_b, 0, 0, comparator);
    }
}

fn compare_spans<T: RangeValue>(
    a: &mut SpanCursor<T>,
    start_a: usize,
    b: &mut SpanCursor<T>,
    start_b: usize,
    len: usize,
    comparator: &mut dyn RangeComparator<T>,
) {
    a.goto(start_a, -FAR_SIDE);
    b.goto(start_b, -FAR_SIDE);
    let end_b = start_b + len;
    let shift = start_b as isize - start_a as isize;
    let tracks_bounds = comparator.tracks_bounds();
    let mut pos = start_b;
    let mut bound_change = false;
    loop {
        let a_to = a.to.saturating_add_signed(shift);
        let end_order = a_to.cmp(&b.to);
        let diff = end_order.then(a.end_side.cmp(&b.end_side));
        let end = if diff == Ordering::Less { a_to } else { b.to };
        let clip_end = end.min(end_b);
        if a.point.is_some() || b.point.is_some() {
            let same = match (&a.point, &b.point) {
                (Some(point_a), Some(point_b)) => {
                    same_value(point_a, point_b)
                        && same_values(&a.active_for_point(a.to), &b.active_for_point(b.to))
                }
                _ => false,
            };
            if !same {
                comparator.compare_point(pos, clip_end, a.point.as_ref(), b.point.as_ref());
            }
            bound_change = false;
        } else {
            if bound_change {
                comparator.bound_change(pos);
            }
            if clip_end > pos && !same_values(&a.active, &b.active) {
                comparator.compare_range(pos, clip_end, &a.active, &b.active);
            }
            if tracks_bounds
                && clip_end < end_b
                && (end_order != Ordering::Equal || a.open_end(end) != b.open_end(end))
            {
                bound_change = true;
            }
        }
        if end > end_b {
            break;
        }
        pos = end;
        if diff != Ordering::Greater {
            a.next();
        }
        if diff != Ordering::Less {
            b.next();
        }
    }
}

pub(crate) fn eq<T: RangeValue>(old_sets: &[RangeSet<T>], new_sets: &[RangeSet<T>], from: usize, to: usize) -> bool {
    let unshared = |sets: &[RangeSet<T>], others: &[RangeSet<T>]| -> Vec<RangeSet<T>> {
        sets.iter()
            .filter(|set| !set.is_empty() && !others.iter().any(|other| other.ptr_eq(set)))
            .cloned()
            .collect()
    };
    let a = unshared(old_sets, new_sets);
    let b = unshared(new_sets, old_sets);
    if a.len() != b.len() {
        return false;
    }
    if a.is_empty() {
        return true;
    }
    let shared = find_shared_chunks(&a, &b, None);
    let mut side_a = SpanCursor::new(&a, Some(shared.clone()), -1);
    let mut side_b = SpanCursor::new(&b, Some(shared), -1);
    side_a.goto(from, -FAR_SIDE);
    side_b.goto(from, -FAR_SIDE);
    loop {
        let points_match = match (&side_a.point, &side_b.point) {
            (None, None) => true,
            (Some(point_a), Some(point_b)) => same_value(point_a, point_b),
            _ => false,
        };
        if side_a.to != side_b.to || !same_values(&side_a.active, &side_b.active) || !points_match {
            return false;
        }
        if side_a.to > to || side_a.to == FAR {
            return true;
        }
        side_a.next();
        side_b.next();
    }
}

pub(crate) fn spans<T: RangeValue>(
    sets: &[RangeSet<T>],
    from: usize,
    to: usize,
    iterator: &mut dyn SpanIterator<T>,
    min_point_size: isize,
) -> usize {
    let mut cursor = SpanCursor::new(sets, None, min_point_size);
    cursor.goto(from, -FAR_SIDE);
    let mut pos = from;
    let mut open_ranges = cursor.open_start.unwrap_or(0);
    loop {
        let cur_to = cursor.to.min(to);
        if let Some(point) = cursor.point.clone() {
            let active = cursor.active_for_point(cursor.to);
            let open_count = if cursor.point_from < from {
                active.len() + 1
            } else if point.start_side() < 0 {
                active.len()
            } else {
                active.len().min(open_ranges)
            };
            iterator.point(pos, cur_to, &point, &active, open_count, cursor.point_rank);
            open_ranges = cursor.open_end(cur_to).min(active.len());
        } else if cur_to > pos {
            iterator.span(pos, cur_to, &cursor.active, open_ranges);
            open_ranges = cursor.open_end(cur_to);
        }
        if cursor.to > to {
            return open_ranges + usize::from(cursor.point.is_some());
        }
        pos = cursor.to;
        cursor.next();
    }
}
