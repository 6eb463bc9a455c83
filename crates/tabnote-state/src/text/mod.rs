//! # Text: an immutable rope of lines
//!
//! A [`Text`] stores a document as a tree of lines. Small documents are a
//! single leaf holding up to [`BRANCH`] line strings; larger ones are branch
//! nodes over child texts. Line breaks are implicit between lines and count
//! as one position each, so `len == Σ line lengths + lines − 1`.
//!
//! Every edit returns a new `Text`. Unchanged subtrees are shared with the
//! previous version through `Arc`, so keeping old versions around is cheap
//! and they can be handed to other threads as snapshots.
//!
//! Positions are byte offsets into the UTF-8 line strings and must fall on
//! `char` boundaries.

use std::fmt;
use std::sync::{Arc, LazyLock};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::StateError;

pub mod column;
pub mod cursor;

pub use column::{count_column, find_cluster_break, find_column};
pub use cursor::{LineCursor, TextChunk, TextCursor};
use cursor::RawTextCursor;

/// Log2 of [`BRANCH`].
pub const BRANCH_SHIFT: u32 = 5;
/// Maximum number of lines in a leaf, and the target fan-out of branches.
pub const BRANCH: usize = 1 << BRANCH_SHIFT;

static EMPTY: LazyLock<Text> = LazyLock::new(|| Text::leaf(vec![String::new()], 0));

/// Iteration direction for [`Text::iter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

/// A single line of a [`Text`], as returned by [`Text::line_at`] and [`Text::line`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    /// Position of the start of the line.
    pub from: usize,
    /// Position at the end of the line, before the line break.
    pub to: usize,
    /// 1-based line number.
    pub number: usize,
    /// The line's content.
    pub text: &'a str,
}

impl Line<'_> {
    pub fn len(&self) -> usize {
        self.to - self.from
    }

    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }
}

/// An immutable, structurally shared document.
#[derive(Clone)]
pub struct Text(Arc<Node>);

enum Node {
    Leaf {
        lines: Vec<String>,
        len: usize,
    },
    Branch {
        children: Vec<Text>,
        len: usize,
        lines: usize,
    },
}

/// Which sides of a decomposed piece continue a line shared with its neighbour.
#[derive(Debug, Clone, Copy, Default)]
struct Open {
    from: bool,
    to: bool,
}

impl Open {
    const NONE: Open = Open {
        from: false,
        to: false,
    };
    const FROM: Open = Open {
        from: true,
        to: false,
    };
    const TO: Open = Open {
        from: false,
        to: true,
    };
    const BOTH: Open = Open {
        from: true,
        to: true,
    };
}

impl Text {
    /// Create a text from its lines. Fails when `lines` is empty.
    pub fn of<I, S>(lines: I) -> Result<Text, StateError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines: Vec<String> = lines.into_iter().map(Into::into).collect();
        if lines.is_empty() {
            return Err(StateError::EmptyDocument);
        }
        Ok(Text::from_lines(lines))
    }

    /// The empty document: a single empty line. Always the same shared node.
    pub fn empty() -> Text {
        EMPTY.clone()
    }

    pub(crate) fn from_lines(lines: Vec<String>) -> Text {
        if lines.is_empty() || (lines.len() == 1 && lines[0].is_empty()) {
            return Text::empty();
        }
        let len = text_length(&lines);
        if lines.len() <= BRANCH {
            Text::leaf(lines, len)
        } else {
            Text::from_children(split_leaves(lines), Some(len))
        }
    }

    fn leaf(lines: Vec<String>, len: usize) -> Text {
        Text(Arc::new(Node::Leaf { lines, len }))
    }

    fn branch(children: Vec<Text>, len: usize) -> Text {
        let lines = children.iter().map(Text::lines).sum();
        Text(Arc::new(Node::Branch {
            children,
            len,
            lines,
        }))
    }

    /// Document length, counting each line break as one position.
    pub fn len(&self) -> usize {
        match &*self.0 {
            Node::Leaf { len, .. } | Node::Branch { len, .. } => *len,
        }
    }

    /// True when the document is a single empty line.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of lines. Never zero.
    pub fn lines(&self) -> usize {
        match &*self.0 {
            Node::Leaf { lines, .. } => lines.len(),
            Node::Branch { lines, .. } => *lines,
        }
    }

    /// Child nodes of a branch, `None` for a leaf.
    pub fn children(&self) -> Option<&[Text]> {
        match &*self.0 {
            Node::Branch { children, .. } => Some(children),
            Node::Leaf { .. } => None,
        }
    }

    fn leaf_lines(&self) -> Option<&[String]> {
        match &*self.0 {
            Node::Leaf { lines, .. } => Some(lines),
            Node::Branch { .. } => None,
        }
    }

    /// Number of direct entries (lines for a leaf, children for a branch).
    fn node_size(&self) -> usize {
        match &*self.0 {
            Node::Leaf { lines, .. } => lines.len(),
            Node::Branch { children, .. } => children.len(),
        }
    }

    /// True when both values are the same shared node.
    pub fn ptr_eq(&self, other: &Text) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// The line containing `pos`. `pos == len` yields the last line.
    pub fn line_at(&self, pos: usize) -> Result<Line<'_>, StateError> {
        self.check_pos(pos)?;
        Ok(self.line_inner(pos, false, 1, 0))
    }

    /// Whether `pos` lies in the document and not inside a multi-byte
    /// character.
    pub fn is_char_boundary(&self, pos: usize) -> bool {
        if pos > self.len() {
            return false;
        }
        let line = self.line_inner(pos, false, 1, 0);
        line.text.is_char_boundary(pos - line.from)
    }

    /// Fail unless `pos` is a position of this document on a character
    /// boundary.
    pub fn check_pos(&self, pos: usize) -> Result<(), StateError> {
        if pos > self.len() {
            return Err(StateError::PositionOutOfRange {
                pos,
                len: self.len(),
            });
        }
        if !self.is_char_boundary(pos) {
            return Err(StateError::NotCharBoundary { pos });
        }
        Ok(())
    }

    /// `pos`, moved back to the start of the character it falls inside.
    fn floor_char_boundary(&self, pos: usize) -> usize {
        let line = self.line_inner(pos, false, 1, 0);
        let mut offset = pos - line.from;
        while !line.text.is_char_boundary(offset) {
            offset -= 1;
        }
        line.from + offset
    }

    /// Line `n`, 1-based.
    pub fn line(&self, n: usize) -> Result<Line<'_>, StateError> {
        if n < 1 || n > self.lines() {
            return Err(StateError::LineOutOfRange {
                line: n,
                lines: self.lines(),
            });
        }
        Ok(self.line_inner(n, true, 1, 0))
    }

    fn line_inner(&self, target: usize, by_line: bool, mut line: usize, mut offset: usize) -> Line<'_> {
        match &*self.0 {
            Node::Leaf { lines, .. } => {
                let mut i = 0;
                loop {
                    let text = lines[i].as_str();
                    let end = offset + text.len();
                    if i + 1 == lines.len() || (if by_line { line } else { end }) >= target {
                        return Line {
                            from: offset,
                            to: end,
                            number: line,
                            text,
                        };
                    }
                    offset = end + 1;
                    line += 1;
                    i += 1;
                }
            }
            Node::Branch { children, .. } => {
                let mut i = 0;
                loop {
                    let child = &children[i];
                    let end = offset + child.len();
                    let end_line = line + child.lines() - 1;
                    if i + 1 == children.len() || (if by_line { end_line } else { end }) >= target {
                        return child.line_inner(target, by_line, line, offset);
                    }
                    offset = end + 1;
                    line = end_line + 1;
                    i += 1;
                }
            }
        }
    }

    fn clip(&self, from: usize, to: usize) -> (usize, usize) {
        let from = self.floor_char_boundary(from.min(self.len()));
        (from, self.floor_char_boundary(to.min(self.len())).max(from))
    }

    /// Replace `from..to` with `text`. Bounds are clamped to the document
    /// and moved back to a character boundary.
    pub fn replace(&self, from: usize, to: usize, text: &Text) -> Text {
        let (from, to) = self.clip(from, to);
        let new_len = self.len() - (to - from) + text.len();
        match (&*self.0, &*text.0) {
            (Node::Leaf { lines, .. }, Node::Leaf { lines: inserted, .. }) => {
                let mut out = slice_text(lines, 0, from);
                append_text(inserted, &mut out, 0, usize::MAX);
                append_text(lines, &mut out, to, usize::MAX);
                if out.len() <= BRANCH {
                    Text::leaf(out, new_len)
                } else {
                    Text::from_children(split_leaves(out), Some(new_len))
                }
            }
            (Node::Branch { children, .. }, _) if text.lines() < self.lines() => {
                let mut pos = 0;
                for (i, child) in children.iter().enumerate() {
                    let end = pos + child.len();
                    // Only one child is affected: update it in place if its size stays balanced
                    if from >= pos && to <= end {
                        let updated = child.replace(from - pos, to - pos, text);
                        let total_lines = self.lines() - child.lines() + updated.lines();
                        if updated.lines() < (total_lines >> (BRANCH_SHIFT - 1))
                            && updated.lines() > (total_lines >> (BRANCH_SHIFT + 1))
                        {
                            let mut copy = children.clone();
                            copy[i] = updated;
                            return Text::branch(copy, new_len);
                        }
                        return self.replace_parts(pos, end, &updated);
                    }
                    pos = end + 1;
                }
                self.replace_parts(from, to, text)
            }
            _ => self.replace_parts(from, to, text),
        }
    }

    fn replace_parts(&self, from: usize, to: usize, text: &Text) -> Text {
        let mut parts = Vec::new();
        self.decompose(0, from, &mut parts, Open::TO);
        if !text.is_empty() {
            text.decompose(0, text.len(), &mut parts, Open::BOTH);
        }
        self.decompose(to, self.len(), &mut parts, Open::FROM);
        Text::from_children(parts, Some(self.len() - (to - from) + text.len()))
    }

    /// Append `other` to the end of this text.
    pub fn append(&self, other: &Text) -> Text {
        self.replace(self.len(), self.len(), other)
    }

    /// The text between `from` and `to`. Bounds are clamped like
    /// [`Text::replace`].
    pub fn slice(&self, from: usize, to: usize) -> Text {
        let (from, to) = self.clip(from, to);
        let mut parts = Vec::new();
        self.decompose(from, to, &mut parts, Open::NONE);
        Text::from_children(parts, Some(to - from))
    }

    /// The content between `from` and `to` as a string, with `line_sep`
    /// between lines. Bounds are clamped like [`Text::replace`].
    pub fn slice_string(&self, from: usize, to: usize, line_sep: &str) -> String {
        let (from, to) = self.clip(from, to);
        let mut out = String::with_capacity(to - from);
        self.write_slice(from, to, line_sep, &mut out);
        out
    }

    fn write_slice(&self, from: usize, to: usize, line_sep: &str, out: &mut String) {
        let mut pos = 0;
        match &*self.0 {
            Node::Leaf { lines, .. } => {
                for (i, line) in lines.iter().enumerate() {
                    if pos > to {
                        break;
                    }
                    let end = pos + line.len();
                    if pos > from && i > 0 {
                        out.push_str(line_sep);
                    }
                    if from < end && to > pos {
                        out.push_str(&line[from.saturating_sub(pos)..(to - pos).min(line.len())]);
                    }
                    pos = end + 1;
                }
            }
            Node::Branch { children, .. } => {
                for (i, child) in children.iter().enumerate() {
                    if pos > to {
                        break;
                    }
                    let end = pos + child.len();
                    if pos > from && i > 0 {
                        out.push_str(line_sep);
                    }
                    if from < end && to > pos {
                        child.write_slice(from.saturating_sub(pos), (to - pos).min(child.len()), line_sep, out);
                    }
                    pos = end + 1;
                }
            }
        }
    }

    /// All lines as owned strings.
    pub fn to_lines(&self) -> Vec<String> {
        let mut target = Vec::with_capacity(self.lines());
        self.flatten(&mut target);
        target
    }

    fn flatten(&self, target: &mut Vec<String>) {
        match &*self.0 {
            Node::Leaf { lines, .. } => target.extend(lines.iter().cloned()),
            Node::Branch { children, .. } => {
                for child in children {
                    child.flatten(target);
                }
            }
        }
    }

    /// Iterate over the whole document in `dir`.
    pub fn iter(&self, dir: Direction) -> TextCursor<'_> {
        match dir {
            Direction::Forward => TextCursor::new(self, 0, self.len()),
            Direction::Backward => TextCursor::new(self, self.len(), 0),
        }
    }

    /// Iterate over `from..to`. When `from > to` the range is walked backward.
    pub fn iter_range(&self, from: usize, to: usize) -> TextCursor<'_> {
        let (from, to) = (from.min(self.len()), to.min(self.len()));
        TextCursor::new(self, self.floor_char_boundary(from), self.floor_char_boundary(to))
    }

    /// Iterate over every line's content.
    pub fn iter_lines(&self) -> LineCursor<'_> {
        LineCursor::new(self.iter(Direction::Forward))
    }

    /// Iterate over lines `from..to` (1-based, `to` exclusive; `lines + 1`
    /// runs to the end of the document).
    pub fn iter_line_range(&self, from: usize, to: usize) -> Result<LineCursor<'_>, StateError> {
        let start = self.line(from)?.from;
        let end = if to == self.lines() + 1 {
            self.len()
        } else if to <= 1 {
            0
        } else {
            self.line(to - 1)?.to
        };
        Ok(LineCursor::new(self.iter_range(start, start.max(end))))
    }

    /// Break `from..to` of this node into pieces appended to `target`.
    ///
    /// An `open.from` piece continues the last line of the piece before it
    /// and gets merged into that leaf.
    fn decompose(&self, from: usize, to: usize, target: &mut Vec<Text>, open: Open) {
        match &*self.0 {
            Node::Leaf { lines, len } => {
                let piece_len = to.min(*len) - from.min(*len);
                let joined_prev = match target.last().map(|t| &*t.0) {
                    Some(Node::Leaf {
                        lines: prev_lines,
                        len: prev_len,
                    }) if open.from => Some((prev_lines.clone(), *prev_len)),
                    _ => None,
                };
                if let Some((mut joined, prev_len)) = joined_prev {
                    target.pop();
                    append_text(lines, &mut joined, from, to);
                    if joined.len() <= BRANCH {
                        target.push(Text::leaf(joined, prev_len + piece_len));
                    } else {
                        let second = joined.split_off(joined.len() >> 1);
                        target.push(Text::leaf_from(joined));
                        target.push(Text::leaf_from(second));
                    }
                } else if from == 0 && to >= *len {
                    target.push(self.clone());
                } else {
                    target.push(Text::leaf(slice_text(lines, from, to), piece_len));
                }
            }
            Node::Branch { children, .. } => {
                let mut pos = 0;
                for child in children {
                    if pos > to {
                        break;
                    }
                    let end = pos + child.len();
                    if from <= end && to >= pos {
                        let child_open = Open {
                            from: open.from && pos <= from,
                            to: open.to && end >= to,
                        };
                        if pos >= from && end <= to && !child_open.from && !child_open.to {
                            target.push(child.clone());
                        } else {
                            child.decompose(from.saturating_sub(pos), to - pos, target, child_open);
                        }
                    }
                    pos = end + 1;
                }
            }
        }
    }

    fn leaf_from(lines: Vec<String>) -> Text {
        let len = text_length(&lines);
        Text::leaf(lines, len)
    }

    /// Reassemble decomposed pieces into a balanced tree.
    fn from_children(children: Vec<Text>, len: Option<usize>) -> Text {
        let len = len.unwrap_or_else(|| {
            children
                .iter()
                .map(|ch| ch.len() + 1)
                .sum::<usize>()
                .saturating_sub(1)
        });
        let lines: usize = children.iter().map(Text::lines).sum();
        if lines < BRANCH {
            let mut flat = Vec::with_capacity(lines);
            for child in &children {
                child.flatten(&mut flat);
            }
            return Text::leaf(flat, len);
        }

        let chunk = BRANCH.max(lines >> BRANCH_SHIFT);
        let mut chunker = Chunker {
            chunk,
            max_chunk: chunk << 1,
            min_chunk: chunk >> 1,
            chunked: Vec::new(),
            current: Vec::new(),
            current_lines: 0,
            current_len: 0,
        };
        for child in children {
            chunker.add(child);
        }
        chunker.flush();
        let mut chunked = chunker.chunked;
        if chunked.len() == 1 {
            if let Some(only) = chunked.pop() {
                return only;
            }
        }
        Text::branch(chunked, len)
    }

    /// Length of the identical prefix (or suffix, for `Backward`) that two
    /// branches share by pointer.
    fn scan_identical(&self, other: &Text, dir: Direction) -> usize {
        match (self.children(), other.children()) {
            (Some(a), Some(b)) => match dir {
                Direction::Forward => scan_pairs(a.iter().zip(b.iter()), dir),
                Direction::Backward => scan_pairs(a.iter().rev().zip(b.iter().rev()), dir),
            },
            _ => 0,
        }
    }
}

fn scan_pairs<'a>(pairs: impl Iterator<Item = (&'a Text, &'a Text)>, dir: Direction) -> usize {
    let mut length = 0;
    for (a, b) in pairs {
        if !a.ptr_eq(b) {
            return length + a.scan_identical(b, dir);
        }
        length += a.len() + 1;
    }
    length
}

/// Groups children into chunks of roughly `chunk` lines while rebuilding a branch.
struct Chunker {
    chunk: usize,
    max_chunk: usize,
    min_chunk: usize,
    chunked: Vec<Text>,
    current: Vec<Text>,
    current_lines: usize,
    /// Sum of `len + 1` over `current`.
    current_len: usize,
}

impl Chunker {
    fn add(&mut self, child: Text) {
        let child_lines = child.lines();
        if child_lines > self.max_chunk {
            if let Some(children) = child.children() {
                for grandchild in children {
                    self.add(grandchild.clone());
                }
                return;
            }
        }
        if child_lines > self.min_chunk && (self.current_lines > self.min_chunk || self.current_lines == 0) {
            self.flush();
            self.chunked.push(child);
            return;
        }
        if self.current_lines > 0 {
            let merged = match (child.leaf_lines(), self.current.last()) {
                (Some(child_text), Some(last)) => match last.leaf_lines() {
                    Some(last_text) if child_lines + last_text.len() <= BRANCH => {
                        let mut lines = Vec::with_capacity(child_lines + last_text.len());
                        lines.extend(last_text.iter().cloned());
                        lines.extend(child_text.iter().cloned());
                        Some(Text::leaf(lines, last.len() + 1 + child.len()))
                    }
                    _ => None,
                },
                _ => None,
            };
            if let Some(merged) = merged {
                self.current_lines += child_lines;
                self.current_len += child.len() + 1;
                if let Some(last) = self.current.last_mut() {
                    *last = merged;
                }
                return;
            }
        }
        if self.current_lines + child_lines > self.chunk {
            self.flush();
        }
        self.current_lines += child_lines;
        self.current_len += child.len() + 1;
        self.current.push(child);
    }

    fn flush(&mut self) {
        if self.current_lines == 0 {
            return;
        }
        let mut current = std::mem::take(&mut self.current);
        let node = match current.pop() {
            Some(only) if current.is_empty() => only,
            Some(last) => {
                current.push(last);
                Text::from_children(current, Some(self.current_len - 1))
            }
            None => return,
        };
        self.chunked.push(node);
        self.current_len = 0;
        self.current_lines = 0;
    }
}

fn text_length(lines: &[String]) -> usize {
    lines.iter().map(|l| l.len() + 1).sum::<usize>().saturating_sub(1)
}

/// Append the content of `text` between `from` and `to` to `target`. The
/// first appended line is joined onto `target`'s last line.
fn append_text(text: &[String], target: &mut Vec<String>, from: usize, to: usize) {
    let mut pos = 0;
    let mut first = true;
    for line in text {
        if pos > to {
            break;
        }
        let end = pos + line.len();
        if end >= from {
            let mut piece = line.as_str();
            if end > to {
                piece = &piece[..to - pos];
            }
            if pos < from {
                piece = &piece[from - pos..];
            }
            match target.last_mut() {
                Some(last) if first => last.push_str(piece),
                _ => target.push(piece.to_string()),
            }
            first = false;
        }
        pos = end + 1;
    }
}

fn slice_text(text: &[String], from: usize, to: usize) -> Vec<String> {
    let mut target = vec![String::new()];
    append_text(text, &mut target, from, to);
    target
}

fn split_leaves(lines: Vec<String>) -> Vec<Text> {
    let mut target = Vec::with_capacity(lines.len() / BRANCH + 1);
    let mut part = Vec::with_capacity(BRANCH);
    for line in lines {
        part.push(line);
        if part.len() == BRANCH {
            target.push(Text::leaf_from(std::mem::replace(&mut part, Vec::with_capacity(BRANCH))));
        }
    }
    if !part.is_empty() {
        target.push(Text::leaf_from(part));
    }
    target
}

/// Split `s` into lines on `line_sep`, or on `\r\n`, `\r` and `\n` when no
/// separator is given.
pub fn split_lines<'a>(s: &'a str, line_sep: Option<&str>) -> Vec<&'a str> {
    if let Some(sep) = line_sep.filter(|sep| !sep.is_empty()) {
        return s.split(sep).collect();
    }
    let bytes = s.as_bytes();
    let mut out = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                out.push(&s[start..i]);
                i += 1;
                start = i;
            }
            b'\r' => {
                out.push(&s[start..i]);
                i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            }
            _ => i += 1,
        }
    }
    out.push(&s[start..]);
    out
}

impl From<&str> for Text {
    fn from(s: &str) -> Text {
        Text::from_lines(split_lines(s, None).into_iter().map(str::to_string).collect())
    }
}

impl From<String> for Text {
    fn from(s: String) -> Text {
        Text::from(s.as_str())
    }
}

impl Default for Text {
    fn default() -> Text {
        Text::empty()
    }
}

impl PartialEq for Text {
    fn eq(&self, other: &Text) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        if self.len() != other.len() || self.lines() != other.lines() {
            return false;
        }
        let start = self.scan_identical(other, Direction::Forward);
        let end = self
            .len()
            .saturating_sub(self.scan_identical(other, Direction::Backward));
        let mut a = RawTextCursor::new(self, Direction::Forward);
        let mut b = RawTextCursor::new(other, Direction::Forward);
        let mut skip = start;
        let mut pos = start;
        loop {
            let chunk_a = a.next_skip(skip);
            let chunk_b = b.next_skip(skip);
            skip = 0;
            if chunk_a != chunk_b {
                return false;
            }
            match chunk_a {
                None => return true,
                Some(chunk) => {
                    pos += chunk.len();
                    if pos >= end {
                        return true;
                    }
                }
            }
        }
    }
}

impl Eq for Text {}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.slice_string(0, self.len(), "\n"))
    }
}

impl fmt::Debug for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Text")
            .field(&self.iter_lines().collect::<Vec<_>>())
            .finish()
    }
}

impl Serialize for Text {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter_lines())
    }
}

impl<'de> Deserialize<'de> for Text {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Text, D::Error> {
        let lines = Vec::<String>::deserialize(deserializer)?;
        Text::of(lines).map_err(D::Error::custom)
    }
}
