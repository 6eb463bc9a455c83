//! Cursors over range sets.
//!
//! [`LayerCursor`] walks one layer, [`HeapCursor`] merges any number of
//! layers through a binary heap, and [`SpanCursor`] turns the merged stream
//! into spans between range boundaries with the set of ranges active over
//! each.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use super::{FAR, FAR_SIDE, Layer, Range, RangeSet, RangeValue};

/// Chunk addresses a cursor should skip over.
pub(crate) type SkipSet = Arc<HashSet<usize>>;

pub(crate) fn chunk_key<T>(chunk: &Arc<super::chunk::Chunk<T>>) -> usize {
    Arc::as_ptr(chunk) as usize
}

pub(crate) struct LayerCursor<T> {
    layer: Arc<Layer<T>>,
    skip: Option<SkipSet>,
    min_point: isize,
    rank: usize,
    pub(crate) from: usize,
    pub(crate) to: usize,
    pub(crate) value: Option<Arc<T>>,
    pub(crate) chunk_index: usize,
    pub(crate) range_index: usize,
}

impl<T: RangeValue> LayerCursor<T> {
    pub(crate) fn new(layer: Arc<Layer<T>>, skip: Option<SkipSet>, min_point: isize, rank: usize) -> Self {
        Self {
            layer,
            skip,
            min_point,
            rank,
            from: FAR,
            to: FAR,
            value: None,
            chunk_index: 0,
            range_index: 0,
        }
    }

    pub(crate) fn start_side(&self) -> i32 {
        self.value.as_ref().map_or(0, |value| value.start_side())
    }

    pub(crate) fn end_side(&self) -> i32 {
        self.value.as_ref().map_or(0, |value| value.end_side())
    }

    fn skips(&self, index: usize) -> bool {
        self.skip
            .as_ref()
            .is_some_and(|skip| skip.contains(&chunk_key(&self.layer.chunks[index])))
    }

    pub(crate) fn goto(&mut self, pos: usize, side: i32) {
        self.chunk_index = 0;
        self.range_index = 0;
        self.goto_inner(pos, side, false);
    }

    fn goto_inner(&mut self, pos: usize, side: i32, mut forward: bool) {
        while self.chunk_index < self.layer.chunks.len() {
            let chunk = &self.layer.chunks[self.chunk_index];
            if !(self.skips(self.chunk_index)
                || self.layer.chunk_end(self.chunk_index) < pos
                || chunk.max_point < self.min_point)
            {
                break;
            }
            self.chunk_index += 1;
            forward = false;
        }
        if self.chunk_index < self.layer.chunks.len() {
            let chunk = &self.layer.chunks[self.chunk_index];
            let start = self.layer.chunk_pos[self.chunk_index];
            let range_index = if pos < start {
                0
            } else {
                chunk.find_index(pos - start, side, true, 0)
            };
            if !forward || self.range_index < range_index {
                self.set_range_index(range_index);
            }
        }
        self.next();
    }

    pub(crate) fn forward(&mut self, pos: usize, side: i32) {
        if self.to.cmp(&pos).then(self.end_side().cmp(&side)) == Ordering::Less {
            self.goto_inner(pos, side, true);
        }
    }

    pub(crate) fn next(&mut self) {
        loop {
            if self.chunk_index == self.layer.chunks.len() {
                self.from = FAR;
                self.to = FAR;
                self.value = None;
                break;
            }
            let chunk_pos = self.layer.chunk_pos[self.chunk_index];
            let chunk = &self.layer.chunks[self.chunk_index];
            let value = chunk.value[self.range_index].clone();
            self.from = chunk_pos + chunk.from[self.range_index];
            self.to = chunk_pos + chunk.to[self.range_index];
            let wanted = self.min_point < 0 || (value.is_point() && (self.to - self.from) as isize >= self.min_point);
            self.value = Some(value);
            self.set_range_index(self.range_index + 1);
            if wanted {
                break;
            }
        }
    }

    fn set_range_index(&mut self, index: usize) {
        if index == self.layer.chunks[self.chunk_index].value.len() {
            self.chunk_index += 1;
            if self.skip.is_some() {
                while self.chunk_index < self.layer.chunks.len() && self.skips(self.chunk_index) {
                    self.chunk_index += 1;
                }
            }
            self.range_index = 0;
        } else {
            self.range_index = index;
        }
    }

    pub(crate) fn next_chunk(&mut self) {
        self.chunk_index += 1;
        self.range_index = 0;
        self.next();
    }

    fn compare(&self, other: &LayerCursor<T>) -> Ordering {
        self.from
            .cmp(&other.from)
            .then(self.start_side().cmp(&other.start_side()))
            .then(self.rank.cmp(&other.rank))
            .then(self.to.cmp(&other.to))
            .then(self.end_side().cmp(&other.end_side()))
    }
}

/// Merges the layers of several sets in `(from, start_side, rank)` order.
pub(crate) struct HeapCursor<T> {
    heap: Vec<LayerCursor<T>>,
    pub(crate) from: usize,
    pub(crate) to: usize,
    pub(crate) value: Option<Arc<T>>,
    pub(crate) rank: usize,
}

impl<T: RangeValue> HeapCursor<T> {
    /// A cursor over every layer of `sets` holding points of at least
    /// `min_point` (all layers for `-1`). A layer's rank is the index of its
    /// set.
    pub(crate) fn new(sets: &[RangeSet<T>], skip: Option<SkipSet>, min_point: isize) -> Self {
        let mut heap = Vec::new();
        for (rank, set) in sets.iter().enumerate() {
            for layer in set.layers() {
                if layer.max_point >= min_point {
                    heap.push(LayerCursor::new(layer.clone(), skip.clone(), min_point, rank));
                }
            }
        }
        Self {
            heap,
            from: FAR,
            to: FAR,
            value: None,
            rank: 0,
        }
    }

    pub(crate) fn start_side(&self) -> i32 {
        self.value.as_ref().map_or(0, |value| value.start_side())
    }

    fn end_side(&self) -> i32 {
        self.value.as_ref().map_or(0, |value| value.end_side())
    }

    pub(crate) fn goto(&mut self, pos: usize, side: i32) {
        for cursor in &mut self.heap {
            cursor.goto(pos, side);
        }
        for i in (0..=self.heap.len() >> 1).rev() {
            heap_bubble(&mut self.heap, i);
        }
        self.next();
    }

    pub(crate) fn forward(&mut self, pos: usize, side: i32) {
        for cursor in &mut self.heap {
            cursor.forward(pos, side);
        }
        for i in (0..=self.heap.len() >> 1).rev() {
            heap_bubble(&mut self.heap, i);
        }
        if self.to.cmp(&pos).then(self.end_side().cmp(&side)) == Ordering::Less {
            self.next();
        }
    }

    pub(crate) fn next(&mut self) {
        let Some(top) = self.heap.first_mut() else {
            self.from = FAR;
            self.to = FAR;
            self.value = None;
            return;
        };
        self.from = top.from;
        self.to = top.to;
        self.value = top.value.clone();
        self.rank = top.rank;
        if top.value.is_some() {
            top.next();
        }
        heap_bubble(&mut self.heap, 0);
    }
}

fn heap_bubble<T: RangeValue>(heap: &mut [LayerCursor<T>], mut index: usize) {
    loop {
        let mut child = (index << 1) + 1;
        if child >= heap.len() {
            break;
        }
        if child + 1 < heap.len() && heap[child].compare(&heap[child + 1]) != Ordering::Less {
            child += 1;
        }
        if heap[index].compare(&heap[child]) == Ordering::Less {
            break;
        }
        heap.swap(index, child);
        index = child;
    }
}

/// Iterates the ranges of one or more sets in order of position.
///
/// Created by [`RangeSet::iter`] and [`RangeSet::iter_sets`]. The cursor
/// sits on its next range; [`RangeCursor::from`], [`RangeCursor::to`] and
/// [`RangeCursor::value`] describe it without advancing.
pub struct RangeCursor<T> {
    inner: HeapCursor<T>,
}

impl<T: RangeValue> RangeCursor<T> {
    pub(crate) fn new(sets: &[RangeSet<T>], from: usize) -> Self {
        let mut inner = HeapCursor::new(sets, None, -1);
        inner.goto(from, -FAR_SIDE);
        Self { inner }
    }

    /// Move to the first range ending at or after `pos`.
    pub fn goto(&mut self, pos: usize) {
        self.inner.goto(pos, -FAR_SIDE);
    }

    pub fn from(&self) -> usize {
        self.inner.from
    }

    pub fn to(&self) -> usize {
        self.inner.to
    }

    /// The current value, `None` once the cursor is exhausted.
    pub fn value(&self) -> Option<&Arc<T>> {
        self.inner.value.as_ref()
    }
}

impl<T: RangeValue> Iterator for RangeCursor<T> {
    type Item = Range<T>;

    fn next(&mut self) -> Option<Range<T>> {
        let value = self.inner.value.clone()?;
        let range = Range {
            from: self.inner.from,
            to: self.inner.to,
            value,
        };
        self.inner.next();
        Some(range)
    }
}

/// Walks the boundaries of a group of sets, tracking which non-point ranges
/// cover the current span and which point, if any, spans it.
pub(crate) struct SpanCursor<T> {
    cursor: HeapCursor<T>,
    pub(crate) active: Vec<Arc<T>>,
    active_to: Vec<usize>,
    active_rank: Vec<usize>,
    min_active: Option<usize>,
    pub(crate) point: Option<Arc<T>>,
    pub(crate) point_from: usize,
    pub(crate) point_rank: usize,
    pub(crate) to: usize,
    pub(crate) end_side: i32,
    /// Active ranges that started before the current span.
    pub(crate) open_start: Option<usize>,
}

impl<T: RangeValue> SpanCursor<T> {
    pub(crate) fn new(sets: &[RangeSet<T>], skip: Option<SkipSet>, min_point: isize) -> Self {
        Self {
            cursor: HeapCursor::new(sets, skip, min_point),
            active: Vec::new(),
            active_to: Vec::new(),
            active_rank: Vec::new(),
            min_active: None,
            point: None,
            point_from: 0,
            point_rank: 0,
            to: 0,
            end_side: 0,
            open_start: None,
        }
    }

    pub(crate) fn goto(&mut self, pos: usize, side: i32) -> &mut Self {
        self.cursor.goto(pos, side);
        self.active.clear();
        self.active_to.clear();
        self.active_rank.clear();
        self.min_active = None;
        self.to = pos;
        self.end_side = side;
        self.open_start = None;
        self.next();
        self
    }

    fn forward(&mut self, pos: usize, side: i32) {
        while let Some(min) = self.min_active {
            let ends_before = self.active_to[min]
                .cmp(&pos)
                .then(self.active[min].end_side().cmp(&side))
                == Ordering::Less;
            if !ends_before {
                break;
            }
            self.remove_active(min);
        }
        self.cursor.forward(pos, side);
    }

    fn remove_active(&mut self, index: usize) {
        self.active.remove(index);
        self.active_to.remove(index);
        self.active_rank.remove(index);
        self.min_active = find_min_index(&self.active, &self.active_to);
    }

    fn add_active(&mut self, value: Arc<T>, track_open: Option<&mut Vec<usize>>) {
        let (to, rank) = (self.cursor.to, self.cursor.rank);
        let mut i = 0;
        while i < self.active_rank.len()
            && rank
                .cmp(&self.active_rank[i])
                .then(to.cmp(&self.active_to[i]))
                == Ordering::Greater
        {
            i += 1;
        }
        self.active.insert(i, value);
        self.active_to.insert(i, to);
        self.active_rank.insert(i, rank);
        if let Some(track_open) = track_open {
            track_open.insert(i, self.cursor.from);
        }
        self.min_active = find_min_index(&self.active, &self.active_to);
    }

    pub(crate) fn next(&mut self) {
        let from = self.to;
        let was_point = self.point.take().is_some();
        let mut track_open = if self.open_start.is_none() { Some(Vec::new()) } else { None };
        loop {
            let expired = self.min_active.filter(|&a| {
                self.active_to[a]
                    .cmp(&self.cursor.from)
                    .then(self.active[a].end_side().cmp(&self.cursor.start_side()))
                    == Ordering::Less
            });
            if let Some(a) = expired {
                if self.active_to[a] > from {
                    self.to = self.active_to[a];
                    self.end_side = self.active[a].end_side();
                    break;
                }
                self.remove_active(a);
                if let Some(track_open) = &mut track_open {
                    track_open.remove(a);
                }
                continue;
            }
            let Some(next_value) = self.cursor.value.clone() else {
                self.to = FAR;
                self.end_side = FAR_SIDE;
                break;
            };
            if self.cursor.from > from {
                self.to = self.cursor.from;
                self.end_side = self.cursor.start_side();
                break;
            }
            if !next_value.is_point() {
                self.add_active(next_value, track_open.as_mut());
                self.cursor.next();
            } else if was_point && self.cursor.to == self.to && self.cursor.from < self.cursor.to {
                // Skip extra points covering the same span
                self.cursor.next();
            } else {
                self.point_from = self.cursor.from;
                self.point_rank = self.cursor.rank;
                self.to = self.cursor.to;
                self.end_side = next_value.end_side();
                self.point = Some(next_value);
                self.cursor.next();
                self.forward(self.to, self.end_side);
                break;
            }
        }
        if let Some(track_open) = track_open {
            let open = track_open.iter().rev().take_while(|&&start| start < from).count();
            self.open_start = Some(open);
        }
    }

    /// Active ranges that continue over the current point.
    pub(crate) fn active_for_point(&self, to: usize) -> Vec<Arc<T>> {
        let Some(point) = &self.point else {
            return self.active.clone();
        };
        let mut active = Vec::new();
        for i in (0..self.active.len()).rev() {
            if self.active_rank[i] < self.point_rank {
                break;
            }
            if self.active_to[i] > to || (self.active_to[i] == to && self.active[i].end_side() >= point.end_side()) {
                active.push(self.active[i].clone());
            }
        }
        active.reverse();
        active
    }

    /// Number of active ranges that continue past `to`.
    pub(crate) fn open_end(&self, to: usize) -> usize {
        self.active_to.iter().rev().take_while(|&&end| end > to).count()
    }
}

fn find_min_index<T: RangeValue>(values: &[Arc<T>], ends: &[usize]) -> Option<usize> {
    let mut found: Option<usize> = None;
    let mut found_pos = FAR;
    for (i, &end) in ends.iter().enumerate() {
        let order = end.cmp(&found_pos).then_with(|| match found {
            Some(f) => values[i].end_side().cmp(&values[f].end_side()),
            None => Ordering::Equal,
        });
        if order == Ordering::Less {
            found = Some(i);
            found_pos = end;
        }
    }
    found
}
