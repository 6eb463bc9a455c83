//! Iteration over the content of a [`Text`].
//!
//! Cursors yield [`TextChunk`]s: runs of line content and the line breaks
//! between them. Chunks borrow from the text, nothing is copied.

use super::{Direction, Node, Text};

/// A piece of a document produced by a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextChunk<'a> {
    /// Content from a single line, never spanning a line break.
    Text(&'a str),
    LineBreak,
}

impl<'a> TextChunk<'a> {
    /// Number of positions the chunk covers. A line break covers one.
    pub fn len(&self) -> usize {
        match self {
            TextChunk::Text(s) => s.len(),
            TextChunk::LineBreak => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_line_break(&self) -> bool {
        matches!(self, TextChunk::LineBreak)
    }

    /// The chunk's content, `"\n"` for a line break.
    pub fn as_str(&self) -> &'a str {
        match self {
            TextChunk::Text(s) => s,
            TextChunk::LineBreak => "\n",
        }
    }
}

/// Walks a whole tree, one line or line break at a time.
///
/// Each stack entry keeps `index << 1 | flag` for its node. For leaves the
/// low bit records whether the line break after the current line has been
/// emitted yet.
pub(crate) struct RawTextCursor<'a> {
    dir: Direction,
    nodes: Vec<&'a Text>,
    offsets: Vec<usize>,
}

impl<'a> RawTextCursor<'a> {
    pub(crate) fn new(text: &'a Text, dir: Direction) -> Self {
        let offset = match dir {
            Direction::Forward => 1,
            Direction::Backward => text.node_size() << 1,
        };
        Self {
            dir,
            nodes: vec![text],
            offsets: vec![offset],
        }
    }

    /// Next chunk after skipping `skip` positions, or `None` at the end.
    pub(crate) fn next_skip(&mut self, mut skip: usize) -> Option<TextChunk<'a>> {
        let forward = self.dir == Direction::Forward;
        loop {
            let last = self.nodes.len() - 1;
            let top = self.nodes[last];
            let offset_value = self.offsets[last];
            let offset = offset_value >> 1;
            let size = top.node_size();
            if offset == if forward { size } else { 0 } {
                if last == 0 {
                    return None;
                }
                if forward {
                    self.offsets[last - 1] += 1;
                }
                self.nodes.pop();
                self.offsets.pop();
            } else if (offset_value & 1) == if forward { 0 } else { 1 } {
                self.step(last);
                if skip == 0 {
                    return Some(TextChunk::LineBreak);
                }
                skip -= 1;
            } else {
                let index = if forward { offset } else { offset - 1 };
                match &*top.0 {
                    Node::Leaf { lines, .. } => {
                        let next = lines[index].as_str();
                        self.step(last);
                        if next.len() > skip {
                            let piece = if skip == 0 {
                                next
                            } else if forward {
                                &next[skip..]
                            } else {
                                &next[..next.len() - skip]
                            };
                            return Some(TextChunk::Text(piece));
                        }
                        skip -= next.len();
                    }
                    Node::Branch { children, .. } => {
                        let next = &children[index];
                        if skip > next.len() {
                            skip -= next.len();
                            self.step(last);
                        } else {
                            if !forward {
                                self.offsets[last] -= 1;
                            }
                            self.nodes.push(next);
                            self.offsets.push(if forward { 1 } else { next.node_size() << 1 });
                        }
                    }
                }
            }
        }
    }

    fn step(&mut self, depth: usize) {
        match self.dir {
            Direction::Forward => self.offsets[depth] += 1,
            Direction::Backward => self.offsets[depth] -= 1,
        }
    }
}

/// Iterator over a range of a [`Text`], forward or backward.
///
/// Created by [`Text::iter`] and [`Text::iter_range`].
pub struct TextCursor<'a> {
    cursor: RawTextCursor<'a>,
    pos: usize,
    from: usize,
    to: usize,
}

impl<'a> TextCursor<'a> {
    pub(crate) fn new(text: &'a Text, start: usize, end: usize) -> Self {
        let backward = start > end;
        Self {
            cursor: RawTextCursor::new(
                text,
                if backward {
                    Direction::Backward
                } else {
                    Direction::Forward
                },
            ),
            pos: if backward { text.len() } else { 0 },
            from: start.min(end),
            to: start.max(end),
        }
    }

    /// Skip `skip` positions in the cursor's direction, then return the next chunk.
    pub fn next_skip(&mut self, skip: usize) -> Option<TextChunk<'a>> {
        let forward = self.cursor.dir == Direction::Forward;
        if if forward { self.pos >= self.to } else { self.pos <= self.from } {
            return None;
        }
        let mut skip = skip
            + if forward {
                self.from.saturating_sub(self.pos)
            } else {
                self.pos.saturating_sub(self.to)
            };
        let mut limit = if forward { self.to - self.pos } else { self.pos - self.from };
        skip = skip.min(limit);
        limit -= skip;

        let chunk = self.cursor.next_skip(skip)?;
        let advanced = chunk.len() + skip;
        if forward {
            self.pos += advanced;
        } else {
            self.pos -= advanced;
        }

        let chunk = if chunk.len() <= limit {
            chunk
        } else {
            match chunk {
                TextChunk::Text(s) if forward => TextChunk::Text(&s[..limit]),
                TextChunk::Text(s) => TextChunk::Text(&s[s.len() - limit..]),
                TextChunk::LineBreak => return None,
            }
        };
        if chunk.is_empty() { None } else { Some(chunk) }
    }

    /// Current position: the end of the last returned chunk in the
    /// direction of travel.
    pub fn pos(&self) -> usize {
        self.pos.clamp(self.from, self.to)
    }
}

impl<'a> Iterator for TextCursor<'a> {
    type Item = TextChunk<'a>;

    fn next(&mut self) -> Option<TextChunk<'a>> {
        self.next_skip(0)
    }
}

/// Iterator over the lines of a [`Text`], yielding each line's content
/// without its line break. Chunks split across tree nodes are yielded as
/// separate pieces, so a long line crossing no leaf boundary is one item.
pub struct LineCursor<'a> {
    inner: TextCursor<'a>,
    after_break: bool,
}

impl<'a> LineCursor<'a> {
    pub(crate) fn new(inner: TextCursor<'a>) -> Self {
        Self {
            inner,
            after_break: true,
        }
    }
}

impl<'a> Iterator for LineCursor<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        loop {
            match self.inner.next() {
                None => {
                    if self.after_break {
                        self.after_break = false;
                        return Some("");
                    }
                    return None;
                }
                Some(TextChunk::LineBreak) => {
                    if self.after_break {
                        return Some("");
                    }
                    self.after_break = true;
                }
                Some(TextChunk::Text(s)) => {
                    self.after_break = false;
                    return Some(s);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn collect(cursor: TextCursor<'_>) -> String {
        cursor.map(|chunk| chunk.as_str()).collect()
    }

    fn big() -> Text {
        Text::of((0..200).map(|i| format!("{i:03}"))).unwrap()
    }

    #[test]
    fn test_forward_iteration_yields_lines_and_breaks() {
        let text = Text::from("ab\n\ncd");
        let chunks: Vec<_> = text.iter(Direction::Forward).collect();
        assert_eq!(
            chunks,
            vec![
                TextChunk::Text("ab"),
                TextChunk::LineBreak,
                TextChunk::LineBreak,
                TextChunk::Text("cd"),
            ]
        );
    }

    #[test]
    fn test_backward_iteration_reverses_chunks() {
        let text = Text::from("ab\ncd");
        let chunks: Vec<_> = text.iter(Direction::Backward).collect();
        assert_eq!(
            chunks,
            vec![TextChunk::Text("cd"), TextChunk::LineBreak, TextChunk::Text("ab")]
        );
    }

    #[test]
    fn test_iteration_through_branches_reproduces_document() {
        let text = big();
        assert!(text.children().is_some());
        assert_eq!(collect(text.iter(Direction::Forward)), text.to_string());
        let backward: Vec<_> = text.iter(Direction::Backward).map(|c| c.as_str()).collect();
        let rebuilt: String = backward.into_iter().rev().collect();
        assert_eq!(rebuilt, text.to_string());
    }

    #[test]
    fn test_iter_range_forward_and_backward() {
        let text = big();
        let expected = &text.to_string()[10..95];
        assert_eq!(collect(text.iter_range(10, 95)), expected);
        let backward: Vec<_> = text.iter_range(95, 10).map(|c| c.as_str()).collect();
        assert_eq!(backward.into_iter().rev().collect::<String>(), expected);
    }

    #[test]
    fn test_iter_range_starting_mid_line() {
        let text = Text::from("hello\nworld");
        let chunks: Vec<_> = text.iter_range(3, 8).collect();
        assert_eq!(
            chunks,
            vec![TextChunk::Text("lo"), TextChunk::LineBreak, TextChunk::Text("wo")]
        );
    }

    #[test]
    fn test_next_skip_moves_forward() {
        let text = Text::from("abc\ndef");
        let mut cursor = text.iter(Direction::Forward);
        assert_eq!(cursor.next_skip(5), Some(TextChunk::Text("ef")));
        assert_eq!(cursor.pos(), 7);
        assert_eq!(cursor.next(), None);
    }

    #[test]
    fn test_empty_range_yields_nothing() {
        let text = Text::from("abc");
        assert_eq!(text.iter_range(1, 1).next(), None);
        assert_eq!(Text::empty().iter(Direction::Forward).next(), None);
    }

    #[test]
    fn test_iter_lines_includes_empty_lines() {
        let text = Text::from("abc\n\ndef\n");
        let lines: Vec<_> = text.iter_lines().collect();
        assert_eq!(lines, vec!["abc", "", "def", ""]);
        assert_eq!(Text::empty().iter_lines().collect::<Vec<_>>(), vec![""]);
    }

    #[test]
    fn test_iter_line_range() {
        let text = Text::from("a\nb\nc\nd");
        let lines: Vec<_> = text.iter_line_range(2, 4).unwrap().collect();
        assert_eq!(lines, vec!["b", "c"]);
        let tail: Vec<_> = text.iter_line_range(3, 5).unwrap().collect();
        assert_eq!(tail, vec!["c", "d"]);
        assert!(text.iter_line_range(0, 2).is_err());
    }

    #[test]
    fn test_iter_lines_across_leaves() {
        let text = big();
        let lines: Vec<_> = text.iter_lines().collect();
        assert_eq!(lines.len(), 200);
        assert_eq!(lines[0], "000");
        assert_eq!(lines[199], "199");
    }
}
