//! Column counting for a single line.
//!
//! Tabs advance to the next multiple of the tab size and each extended
//! grapheme cluster counts as one column.

use unicode_segmentation::GraphemeCursor;

/// Byte offset of the next (or, when `forward` is false, previous) grapheme
/// cluster boundary from `pos`. Returns `pos` clamped to the string at its ends.
pub fn find_cluster_break(s: &str, pos: usize, forward: bool) -> usize {
    let pos = pos.min(s.len());
    let mut cursor = GraphemeCursor::new(pos, s.len(), true);
    let next = if forward {
        cursor.next_boundary(s, 0)
    } else {
        cursor.prev_boundary(s, 0)
    };
    match next {
        Ok(Some(boundary)) => boundary,
        Ok(None) | Err(_) => {
            if forward {
                s.len()
            } else {
                0
            }
        }
    }
}

/// Visual column at byte offset `to` of `s`.
pub fn count_column(s: &str, tab_size: usize, to: usize) -> usize {
    let tab_size = tab_size.max(1);
    let mut column = 0;
    let mut i = 0;
    while i < to && i < s.len() {
        if s.as_bytes()[i] == b'\t' {
            column += tab_size - (column % tab_size);
            i += 1;
        } else {
            column += 1;
            i = find_cluster_break(s, i, true);
        }
    }
    column
}

/// Byte offset at which visual column `col` starts in `s`.
///
/// A column past the end of the line yields `None` when `strict`, and the
/// line's length otherwise.
pub fn find_column(s: &str, col: usize, tab_size: usize, strict: bool) -> Option<usize> {
    let tab_size = tab_size.max(1);
    let mut column = 0;
    let mut i = 0;
    loop {
        if column >= col {
            return Some(i);
        }
        if i == s.len() {
            break;
        }
        column += if s.as_bytes()[i] == b'\t' {
            tab_size - (column % tab_size)
        } else {
            1
        };
        i = find_cluster_break(s, i, true);
    }
    if strict { None } else { Some(s.len()) }
}
