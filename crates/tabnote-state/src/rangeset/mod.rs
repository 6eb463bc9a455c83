/*!
# Range sets

A [`RangeSet`] is an immutable collection of ranges with attached values,
kept sorted by `(from, start_side)` and mapped through document changes.

## Layout

- Ranges live in chunks of at most [`CHUNK_SIZE`], stored relative to
  the chunk start so a chunk moved by an edit elsewhere is reused as is.
- Ranges within one layer never overlap. A range that overlaps its
  predecessor goes to the next layer, so a set is a short list of layers.
- The empty set has no layers at all; emptiness and identity checks are
  pointer comparisons.

## Values

Values implement [`RangeValue`], which supplies the side each end prefers
when boundaries coincide, whether the value is a point (drawn as an atomic
unit over its span), and how it maps through deletions. Values are stored as
`Arc<T>`; two values are the same when they are the same allocation or
compare equal.

## Iteration

[`RangeSet::iter`] and [`RangeSet::iter_sets`] yield ranges in order,
merging layers and sets. [`RangeSet::spans`] reports the stretches between
boundaries together with the ranges active over them, and
[`RangeSet::compare`] diffs two groups of sets across a document change.
*/

mod builder;
mod chunk;
mod compare;
mod cursor;

use std::fmt;
use std::sync::Arc;

use crate::change::{Assoc, ChangeDesc, MapMode, TouchesRange};
use crate::error::StateError;

pub use builder::RangeSetBuilder;
pub use compare::{RangeComparator, SpanIterator};
pub use cursor::RangeCursor;

use chunk::Chunk;

/// Maximum number of ranges in a chunk.
pub const CHUNK_SIZE: usize = 250;

/// Position past any real document position.
pub(crate) const FAR: usize = 100_000_000;
/// Side beyond any value's start or end side.
pub(crate) const FAR_SIDE: i32 = 100_000_000;

pub(crate) fn side_assoc(side: i32) -> Assoc {
    if side < 0 { Assoc::Before } else { Assoc::After }
}

/// A value that can be stored in a [`RangeSet`].
pub trait RangeValue: PartialEq {
    /// Ordering of the range start among values starting at the same
    /// position; negative sides sort before and map before insertions.
    fn start_side(&self) -> i32 {
        0
    }

    fn end_side(&self) -> i32 {
        0
    }

    /// How an empty range maps when text around it is deleted.
    fn map_mode(&self) -> MapMode {
        MapMode::TrackDel
    }

    fn is_point(&self) -> bool {
        false
    }

    /// Whether [`Range::new`] accepts `from == to` for this value.
    fn allows_empty(&self) -> bool {
        true
    }
}

/// A value attached to a span of the document.
#[derive(Debug)]
pub struct Range<T> {
    pub from: usize,
    pub to: usize,
    pub value: Arc<T>,
}

impl<T: RangeValue> Range<T> {
    pub fn new(from: usize, to: usize, value: impl Into<Arc<T>>) -> Result<Range<T>, StateError> {
        let value = value.into();
        if from > to {
            return Err(StateError::ReversedRange { from, to });
        }
        if from == to && !value.allows_empty() {
            return Err(StateError::EmptyRange { pos: from });
        }
        Ok(Range { from, to, value })
    }

    /// A range covering the single position `pos`.
    pub fn point(pos: usize, value: impl Into<Arc<T>>) -> Result<Range<T>, StateError> {
        Range::new(pos, pos, value)
    }
}

impl<T> Clone for Range<T> {
    fn clone(&self) -> Self {
        Range {
            from: self.from,
            to: self.to,
            value: self.value.clone(),
        }
    }
}

impl<T: PartialEq> PartialEq for Range<T> {
    fn eq(&self, other: &Range<T>) -> bool {
        self.from == other.from
            && self.to == other.to
            && (Arc::ptr_eq(&self.value, &other.value) || self.value == other.value)
    }
}

fn cmp_range<T: RangeValue>(a: &Range<T>, b: &Range<T>) -> std::cmp::Ordering {
    a.from
        .cmp(&b.from)
        .then(a.value.start_side().cmp(&b.value.start_side()))
}

pub(crate) struct Layer<T> {
    pub(crate) chunk_pos: Vec<usize>,
    pub(crate) chunks: Vec<Arc<Chunk<T>>>,
    pub(crate) next: RangeSet<T>,
    /// Largest point size in this layer's chunks, `-1` without points.
    pub(crate) max_point: isize,
}

impl<T: RangeValue> Layer<T> {
    pub(crate) fn chunk_end(&self, index: usize) -> usize {
        self.chunk_pos[index] + self.chunks[index].len()
    }
}

/// An immutable, layered collection of ranges.
pub struct RangeSet<T> {
    pub(crate) layer: Option<Arc<Layer<T>>>,
}

impl<T> Clone for RangeSet<T> {
    fn clone(&self) -> Self {
        RangeSet {
            layer: self.layer.clone(),
        }
    }
}

impl<T> Default for RangeSet<T> {
    fn default() -> Self {
        RangeSet { layer: None }
    }
}

impl<T: RangeValue + fmt::Debug> fmt::Debug for RangeSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter(0)).finish()
    }
}

/// Options for [`RangeSet::update`].
pub struct RangeSetUpdate<'a, T> {
    add: Vec<Range<T>>,
    sort: bool,
    filter: Option<Box<dyn Fn(usize, usize, &T) -> bool + 'a>>,
    filter_from: usize,
    filter_to: Option<usize>,
}

impl<T> Default for RangeSetUpdate<'_, T> {
    fn default() -> Self {
        RangeSetUpdate {
            add: Vec::new(),
            sort: false,
            filter: None,
            filter_from: 0,
            filter_to: None,
        }
    }
}

impl<'a, T> RangeSetUpdate<'a, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ranges to add, sorted by `(from, start_side)` unless `sort` is set.
    pub fn add(mut self, ranges: impl IntoIterator<Item = Range<T>>) -> Self {
        self.add.extend(ranges);
        self
    }

    pub fn sort(mut self, sort: bool) -> Self {
        self.sort = sort;
        self
    }

    /// Keep only existing ranges for which `f(from, to, value)` is true.
    pub fn filter(mut self, f: impl Fn(usize, usize, &T) -> bool + 'a) -> Self {
        self.filter = Some(Box::new(f));
        self
    }

    /// Restrict the filter to ranges touching `from..=to`.
    pub fn filter_range(mut self, from: usize, to: usize) -> Self {
        self.filter_from = from;
        self.filter_to = Some(to);
        self
    }
}

type Filter<'f, T> = Option<&'f dyn Fn(usize, usize, &T) -> bool>;

impl<T: RangeValue> RangeSet<T> {
    /// The empty set.
    pub fn empty() -> Self {
        RangeSet { layer: None }
    }

    pub(crate) fn create(chunk_pos: Vec<usize>, chunks: Vec<Arc<Chunk<T>>>, next: RangeSet<T>, max_point: isize) -> Self {
        RangeSet {
            layer: Some(Arc::new(Layer {
                chunk_pos,
                chunks,
                next,
                max_point,
            })),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.layer.is_none()
    }

    /// Whether both handles refer to the same set.
    pub fn ptr_eq(&self, other: &RangeSet<T>) -> bool {
        match (&self.layer, &other.layer) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    pub(crate) fn layers(&self) -> impl Iterator<Item = &Arc<Layer<T>>> {
        std::iter::successors(self.layer.as_ref(), |layer| layer.next.layer.as_ref())
    }

    pub(crate) fn max_point(&self) -> isize {
        self.layers().map(|layer| layer.max_point).max().unwrap_or(-1)
    }

    /// End position of the last range, or 0 when empty.
    pub fn len(&self) -> usize {
        self.layers()
            .filter_map(|layer| layer.chunks.len().checked_sub(1).map(|last| layer.chunk_end(last)))
            .max()
            .unwrap_or(0)
    }

    /// Number of ranges in the set.
    pub fn size(&self) -> usize {
        self.layers()
            .flat_map(|layer| layer.chunks.iter())
            .map(|chunk| chunk.value.len())
            .sum()
    }

    /// Build a set from ranges. Unless `sort` is set, the ranges must
    /// already be sorted by `(from, start_side)`.
    pub fn of(ranges: impl IntoIterator<Item = Range<T>>, sort: bool) -> Result<RangeSet<T>, StateError> {
        let mut ranges: Vec<Range<T>> = ranges.into_iter().collect();
        if sort {
            ranges.sort_by(cmp_range);
        }
        let mut builder = RangeSetBuilder::new();
        for range in ranges {
            builder.add(range.from, range.to, range.value)?;
        }
        Ok(builder.finish())
    }

    /// Stack the layers of `sets` into one set.
    pub fn join(sets: &[RangeSet<T>]) -> RangeSet<T> {
        let Some((last, rest)) = sets.split_last() else {
            return RangeSet::empty();
        };
        let mut result = last.clone();
        for set in rest.iter().rev() {
            let layers: Vec<_> = set.layers().collect();
            for layer in layers.into_iter().rev() {
                result = RangeSet::create(layer.chunk_pos.clone(), layer.chunks.clone(), result, layer.max_point);
            }
        }
        result
    }

    /// Add and/or filter ranges, reusing chunks the update does not touch.
    pub fn update(&self, spec: RangeSetUpdate<'_, T>) -> Result<RangeSet<T>, StateError> {
        let RangeSetUpdate {
            mut add,
            sort,
            filter,
            filter_from,
            filter_to,
        } = spec;
        if add.is_empty() && filter.is_none() {
            return Ok(self.clone());
        }
        if sort {
            add.sort_by(cmp_range);
        } else if add.windows(2).any(|pair| cmp_range(&pair[0], &pair[1]).is_gt()) {
            return Err(StateError::UnsortedRanges);
        }
        let filter_to = filter_to.unwrap_or_else(|| self.len());
        self.update_inner(add, filter.as_deref(), filter_from, filter_to)
    }

    fn update_inner(
        &self,
        add: Vec<Range<T>>,
        filter: Filter<'_, T>,
        filter_from: usize,
        filter_to: usize,
    ) -> Result<RangeSet<T>, StateError> {
        let Some(layer) = &self.layer else {
            return RangeSet::of(add, false);
        };
        if add.is_empty() && filter.is_none() {
            return Ok(self.clone());
        }
        let mut cur = cursor::LayerCursor::new(layer.clone(), None, -1, 0);
        cur.goto(0, -FAR_SIDE);
        let mut i = 0;
        let mut spill = Vec::new();
        let mut builder = RangeSetBuilder::new();
        while cur.value.is_some() || i < add.len() {
            let take_added = i < add.len()
                && cur
                    .from
                    .cmp(&add[i].from)
                    .then(cur.start_side().cmp(&add[i].value.start_side()))
                    .is_ge();
            if take_added {
                let range = &add[i];
                i += 1;
                if !builder.add_inner(range.from, range.to, &range.value)? {
                    spill.push(range.clone());
                }
                continue;
            }
            let chunk_index = cur.chunk_index;
            let whole_chunk = cur.range_index == 1
                && chunk_index < layer.chunks.len()
                && (i == add.len() || layer.chunk_end(chunk_index) < add[i].from)
                && (filter.is_none()
                    || filter_from > layer.chunk_end(chunk_index)
                    || filter_to < layer.chunk_pos[chunk_index]);
            if whole_chunk && builder.add_chunk(layer.chunk_pos[chunk_index], &layer.chunks[chunk_index]) {
                cur.next_chunk();
                continue;
            }
            let Some(value) = cur.value.clone() else {
                break;
            };
            let keep = match filter {
                Some(f) => filter_from > cur.to || filter_to < cur.from || f(cur.from, cur.to, &value),
                None => true,
            };
            if keep && !builder.add_inner(cur.from, cur.to, &value)? {
                spill.push(Range {
                    from: cur.from,
                    to: cur.to,
                    value,
                });
            }
            cur.next();
        }
        let next = if layer.next.is_empty() && spill.is_empty() {
            RangeSet::empty()
        } else {
            layer.next.update_inner(spill, filter, filter_from, filter_to)?
        };
        Ok(builder.finish_inner(next))
    }

    /// Map the set through a document change. Chunks the change does not
    /// touch are reused; ranges in touched chunks map according to their
    /// value's sides and map mode.
    ///
    /// # Panics
    ///
    /// Panics when a range extends past the end of the change's document.
    #[track_caller]
    pub fn map(&self, changes: &ChangeDesc) -> RangeSet<T> {
        let Some(layer) = &self.layer else {
            return self.clone();
        };
        if changes.is_empty() {
            return self.clone();
        }
        let mut chunks = Vec::new();
        let mut chunk_pos = Vec::new();
        let mut max_point = -1;
        for (chunk, &start) in layer.chunks.iter().zip(&layer.chunk_pos) {
            match changes.touches_range(start, start + chunk.len()) {
                TouchesRange::No => {
                    max_point = max_point.max(chunk.max_point);
                    chunks.push(chunk.clone());
                    chunk_pos.push(changes.map_pos(start, Assoc::Before));
                }
                TouchesRange::Yes => {
                    if let Some((mapped, pos)) = chunk.map(start, changes) {
                        max_point = max_point.max(mapped.max_point);
                        chunks.push(Arc::new(mapped));
                        chunk_pos.push(pos);
                    }
                }
                TouchesRange::Cover => {}
            }
        }
        let next = layer.next.map(changes);
        if chunks.is_empty() {
            next
        } else {
            RangeSet::create(chunk_pos, chunks, next, max_point)
        }
    }

    /// Call `f(from, to, value)` for every range touching `from..=to`, until
    /// it returns false.
    pub fn between(&self, from: usize, to: usize, mut f: impl FnMut(usize, usize, &T) -> bool) {
        for layer in self.layers() {
            for (chunk, &start) in layer.chunks.iter().zip(&layer.chunk_pos) {
                if to >= start
                    && from <= start + chunk.len()
                    && !chunk.between(start, from.saturating_sub(start), to - start, &mut f)
                {
                    return;
                }
            }
        }
    }

    /// Iterate the ranges ending at or after `from`.
    pub fn iter(&self, from: usize) -> RangeCursor<T> {
        RangeCursor::new(std::slice::from_ref(self), from)
    }

    /// Iterate the ranges of several sets together.
    pub fn iter_sets(sets: &[RangeSet<T>], from: usize) -> RangeCursor<T> {
        RangeCursor::new(sets, from)
    }

    /// Report where `new_sets` differs from `old_sets`, with `text_diff`
    /// mapping old positions to new ones. Only points at least
    /// `min_point_size` long take part when it is given.
    pub fn compare(
        old_sets: &[RangeSet<T>],
        new_sets: &[RangeSet<T>],
        text_diff: &ChangeDesc,
        comparator: &mut impl RangeComparator<T>,
        min_point_size: Option<usize>,
    ) {
        compare::compare(
            old_sets,
            new_sets,
            text_diff,
            comparator,
            min_point_size.map_or(-1, |size| size as isize),
        );
    }

    /// Whether two groups of sets produce the same spans over `from..=to`
    /// (to the end of the document when `to` is `None`).
    pub fn eq_sets(old_sets: &[RangeSet<T>], new_sets: &[RangeSet<T>], from: usize, to: Option<usize>) -> bool {
        compare::eq(old_sets, new_sets, from, to.unwrap_or(FAR - 1))
    }

    /// Walk the spans and points of `sets` between `from` and `to`.
    /// Returns the number of ranges left open at `to`.
    pub fn spans(
        sets: &[RangeSet<T>],
        from: usize,
        to: usize,
        iterator: &mut impl SpanIterator<T>,
        min_point_size: Option<usize>,
    ) -> usize {
        compare::spans(
            sets,
            from,
            to.min(FAR - 1),
            iterator,
            min_point_size.map_or(-1, |size| size as isize),
        )
    }
}
