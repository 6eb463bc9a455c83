use std::cmp::Ordering;
use std::sync::Arc;

use super::chunk::Chunk;
use super::{CHUNK_SIZE, RangeSet, RangeValue};
use crate::error::StateError;

/// Builds a [`RangeSet`] from ranges added in order of `(from, start_side)`.
///
/// Ranges that overlap the previous one in a layer go to a lazily created
/// builder for the next layer.
#[derive(Debug)]
pub struct RangeSetBuilder<T> {
    chunks: Vec<Arc<Chunk<T>>>,
    chunk_pos: Vec<usize>,
    chunk_start: Option<usize>,
    last: Option<Arc<T>>,
    last_from: usize,
    last_to: usize,
    from: Vec<usize>,
    to: Vec<usize>,
    value: Vec<Arc<T>>,
    max_point: isize,
    set_max_point: isize,
    next_layer: Option<Box<RangeSetBuilder<T>>>,
}

impl<T: RangeValue> Default for RangeSetBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RangeValue> RangeSetBuilder<T> {
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            chunk_pos: Vec::new(),
            chunk_start: None,
            last: None,
            last_from: 0,
            last_to: 0,
            from: Vec::new(),
            to: Vec::new(),
            value: Vec::new(),
            max_point: -1,
            set_max_point: -1,
            next_layer: None,
        }
    }

    fn finish_chunk(&mut self) {
        let chunk = Chunk {
            from: std::mem::take(&mut self.from),
            to: std::mem::take(&mut self.to),
            value: std::mem::take(&mut self.value),
            max_point: self.max_point,
        };
        self.chunks.push(Arc::new(chunk));
        self.chunk_pos.push(self.chunk_start.take().unwrap_or(0));
        self.set_max_point = self.set_max_point.max(self.max_point);
        self.max_point = -1;
    }

    /// Add a range. Ranges must come sorted by `from`, then by the value's
    /// start side.
    pub fn add(&mut self, from: usize, to: usize, value: impl Into<Arc<T>>) -> Result<(), StateError> {
        if from > to {
            return Err(StateError::ReversedRange { from, to });
        }
        let value = value.into();
        if !self.add_inner(from, to, &value)? {
            self.next_layer
                .get_or_insert_with(|| Box::new(RangeSetBuilder::new()))
                .add(from, to, value)?;
        }
        Ok(())
    }

    /// Add to this layer only; `Ok(false)` when the range overlaps the
    /// previous one.
    pub(crate) fn add_inner(&mut self, from: usize, to: usize, value: &Arc<T>) -> Result<bool, StateError> {
        if let Some(last) = &self.last {
            let diff = from
                .cmp(&self.last_to)
                .then(value.start_side().cmp(&last.end_side()));
            let order = from
                .cmp(&self.last_from)
                .then(value.start_side().cmp(&last.start_side()));
            if diff != Ordering::Greater && order == Ordering::Less {
                return Err(StateError::UnsortedRanges);
            }
            if diff == Ordering::Less {
                return Ok(false);
            }
        }
        if self.from.len() == CHUNK_SIZE {
            self.finish_chunk();
        }
        let start = *self.chunk_start.get_or_insert(from);
        self.from.push(from - start);
        self.to.push(to - start);
        self.last = Some(value.clone());
        self.last_from = from;
        self.last_to = to;
        self.value.push(value.clone());
        if value.is_point() {
            self.max_point = self.max_point.max((to - from) as isize);
        }
        Ok(true)
    }

    /// Add a whole chunk when it starts after the last added range.
    pub(crate) fn add_chunk(&mut self, from: usize, chunk: &Arc<Chunk<T>>) -> bool {
        let (Some(first), Some(last_value)) = (chunk.value.first(), chunk.value.last()) else {
            return false;
        };
        let overlaps = self.last.as_ref().is_some_and(|last| {
            from.cmp(&self.last_to)
                .then(first.start_side().cmp(&last.end_side()))
                == Ordering::Less
        });
        if overlaps {
            return false;
        }
        if !self.from.is_empty() {
            self.finish_chunk();
        }
        self.set_max_point = self.set_max_point.max(chunk.max_point);
        self.chunks.push(chunk.clone());
        self.chunk_pos.push(from);
        let last = chunk.value.len() - 1;
        self.last = Some(last_value.clone());
        self.last_from = chunk.from[last] + from;
        self.last_to = chunk.to[last] + from;
        true
    }

    pub fn finish(self) -> RangeSet<T> {
        self.finish_inner(RangeSet::empty())
    }

    pub(crate) fn finish_inner(mut self, next: RangeSet<T>) -> RangeSet<T> {
        if !self.from.is_empty() {
            self.finish_chunk();
        }
        if self.chunks.is_empty() {
            return next;
        }
        let next = match self.next_layer.take() {
            Some(builder) => builder.finish_inner(next),
            None => next,
        };
        RangeSet::create(self.chunk_pos, self.chunks, next, self.set_max_point)
    }
}
