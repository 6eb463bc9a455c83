use std::cmp::Ordering;
use std::sync::Arc;

use super::{FAR_SIDE, RangeValue, side_assoc};
use crate::change::ChangeDesc;

/// Up to [`super::CHUNK_SIZE`] non-overlapping ranges, stored relative to
/// the chunk's start position.
#[derive(Debug)]
pub(crate) struct Chunk<T> {
    pub(crate) from: Vec<usize>,
    pub(crate) to: Vec<usize>,
    pub(crate) value: Vec<Arc<T>>,
    /// Largest point size in the chunk, `-1` without points.
    pub(crate) max_point: isize,
}

impl<T: RangeValue> Chunk<T> {
    /// End of the last range. Chunks are never empty.
    pub(crate) fn len(&self) -> usize {
        self.to.last().copied().unwrap_or(0)
    }

    /// First index whose start (or end, with `end`) is at or after
    /// `pos`/`side`.
    pub(crate) fn find_index(&self, pos: usize, side: i32, end: bool, start_at: usize) -> usize {
        let positions = if end { &self.to } else { &self.from };
        let (mut lo, mut hi) = (start_at, positions.len());
        loop {
            if lo == hi {
                return lo;
            }
            let mid = (lo + hi) >> 1;
            let value_side = if end {
                self.value[mid].end_side()
            } else {
                self.value[mid].start_side()
            };
            let diff = positions[mid].cmp(&pos).then(value_side.cmp(&side));
            if mid == lo {
                return if diff != Ordering::Less { lo } else { hi };
            }
            if diff != Ordering::Less {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
    }

    /// Call `f` for every range touching `from..=to`, relative positions
    /// shifted by `offset`. Returns false when `f` asked to stop.
    pub(crate) fn between(
        &self,
        offset: usize,
        from: usize,
        to: usize,
        f: &mut dyn FnMut(usize, usize, &T) -> bool,
    ) -> bool {
        let start = self.find_index(from, -FAR_SIDE, true, 0);
        let end = self.find_index(to, FAR_SIDE, false, start);
        for i in start..end {
            if !f(self.from[i] + offset, self.to[i] + offset, &self.value[i]) {
                return false;
            }
        }
        true
    }

    /// Map every range through `changes`, dropping the ones the change
    /// deletes. Returns the new chunk and its start position.
    pub(crate) fn map(&self, offset: usize, changes: &ChangeDesc) -> Option<(Chunk<T>, usize)> {
        let mut mapped = Chunk {
            from: Vec::new(),
            to: Vec::new(),
            value: Vec::new(),
            max_point: -1,
        };
        let mut new_pos = None;
        for (i, value) in self.value.iter().enumerate() {
            let (cur_from, cur_to) = (self.from[i] + offset, self.to[i] + offset);
            let (start_side, end_side) = (value.start_side(), value.end_side());
            let (new_from, new_to) = if cur_from == cur_to {
                let Some(pos) = changes.map_pos_tracked(cur_from, side_assoc(start_side), value.map_mode()) else {
                    continue;
                };
                let mut new_to = pos;
                if start_side != end_side {
                    new_to = changes.map_pos(cur_from, side_assoc(end_side));
                    if new_to < pos {
                        continue;
                    }
                }
                (pos, new_to)
            } else {
                let new_from = changes.map_pos(cur_from, side_assoc(start_side));
                let new_to = changes.map_pos(cur_to, side_assoc(end_side));
                if new_from > new_to || (new_from == new_to && start_side > 0 && end_side <= 0) {
                    continue;
                }
                (new_from, new_to)
            };
            if new_to.cmp(&new_from).then(end_side.cmp(&start_side)) == Ordering::Less {
                continue;
            }
            let base = *new_pos.get_or_insert(new_from);
            if value.is_point() {
                mapped.max_point = mapped.max_point.max((new_to - new_from) as isize);
            }
            mapped.value.push(value.clone());
            mapped.from.push(new_from - base);
            mapped.to.push(new_to - base);
        }
        new_pos.map(|pos| (mapped, pos))
    }
}
