//! Offset <-> line/column mapping and tree annotation.
//!
//! A [`PositionTracker`] is built once per text snapshot. It is never updated
//! incrementally; an edited buffer needs a fresh tracker.

use crate::core::{Headline, Location, OrgDocument, OrgElement, OrgObject, Position, SourceRange};

/// Byte bounds of one source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpan {
    pub start: usize,
    /// End of the line content, terminator excluded.
    pub end: usize,
    /// Start of the following line (or text length for the last line).
    pub next: usize,
}

impl LineSpan {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

#[derive(Debug, Clone)]
pub struct PositionTracker {
    lines: Vec<LineSpan>,
    len: usize,
}

impl PositionTracker {
    /// Index every line start in `text`. `\n`, `\r\n` and a lone `\r` all end a line.
    pub fn new(text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut lines = Vec::new();
        let mut start = 0;
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\n' => {
                    lines.push(LineSpan { start, end: i, next: i + 1 });
                    start = i + 1;
                }
                b'\r' => {
                    let next = if bytes.get(i + 1) == Some(&b'\n') { i + 2 } else { i + 1 };
                    lines.push(LineSpan { start, end: i, next });
                    start = next;
                    i = next;
                    continue;
                }
                _ => {}
            }
            i += 1;
        }
        lines.push(LineSpan {
            start,
            end: bytes.len(),
            next: bytes.len(),
        });
        Self {
            lines,
            len: bytes.len(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn text_len(&self) -> usize {
        self.len
    }

    pub fn line_span(&self, line: usize) -> Option<LineSpan> {
        self.lines.get(line).copied()
    }

    pub fn lines(&self) -> &[LineSpan] {
        &self.lines
    }

    /// 0-indexed line containing `offset`.
    pub fn line_of(&self, offset: usize) -> Option<usize> {
        if offset > self.len {
            return None;
        }
        // Last line whose start is <= offset.
        Some(self.lines.partition_point(|l| l.start <= offset).saturating_sub(1))
    }

    /// Resolve a byte offset in `[0, len]`; anything past the end is `None`.
    pub fn location(&self, offset: usize) -> Option<Location> {
        let line = self.line_of(offset)?;
        Some(Location {
            line,
            column: offset - self.lines[line].start,
            offset,
        })
    }

    pub fn position(&self, start: usize, end: usize) -> Option<Position> {
        Some(Position {
            start: self.location(start)?,
            end: self.location(end)?,
        })
    }

    pub fn range_position(&self, range: SourceRange) -> Option<Position> {
        self.position(range.start, range.end)
    }

    /// Inverse of [`location`](Self::location). The column may point into the
    /// line terminator (both bytes of `\r\n`) but not past it.
    pub fn offset(&self, line: usize, column: usize) -> Option<usize> {
        let span = self.lines.get(line)?;
        let offset = span.start + column;
        (offset <= span.end || offset < span.next).then_some(offset)
    }

    /// Content of `line`, terminator excluded.
    pub fn line_text<'a>(&self, text: &'a str, line: usize) -> Option<&'a str> {
        let span = self.lines.get(line)?;
        text.get(span.start..span.end)
    }
}

/* ---------------------------- Annotation ---------------------------- */

/// Fill `position` on every node of `doc` from its `range`.
///
/// Safe to run repeatedly: positions are recomputed from ranges each time.
pub fn annotate_positions(doc: &mut OrgDocument, text: &str) {
    let tracker = PositionTracker::new(text);
    annotate_with(doc, &tracker);
}

pub fn annotate_with(doc: &mut OrgDocument, tracker: &PositionTracker) {
    doc.position = tracker.range_position(doc.range);
    if let Some(section) = doc.section.as_mut() {
        annotate_element(section, tracker);
    }
    for h in doc.children.iter_mut() {
        annotate_headline(h, tracker);
    }
    tracing::trace!(lines = tracker.line_count(), "annotated positions");
}

fn annotate_headline(h: &mut Headline, tracker: &PositionTracker) {
    h.position = tracker.range_position(h.range);
    annotate_objects(&mut h.title, tracker);
    if let Some(section) = h.section.as_mut() {
        annotate_element(section, tracker);
    }
    for child in h.children.iter_mut() {
        annotate_headline(child, tracker);
    }
}

fn annotate_element(el: &mut OrgElement, tracker: &PositionTracker) {
    el.position = tracker.range_position(el.range);
    for objects in el.objects_mut() {
        annotate_objects(objects, tracker);
    }
    if let Some(children) = el.elements_mut() {
        for child in children.iter_mut() {
            annotate_element(child, tracker);
        }
    }
}

fn annotate_objects(objects: &mut [OrgObject], tracker: &PositionTracker) {
    for obj in objects.iter_mut() {
        obj.position = tracker.range_position(obj.range);
        if let Some(children) = obj.children_mut() {
            annotate_objects(children, tracker);
        }
    }
}
