//! Dynamic block engine.
//!
//! A dynamic block is a `#+BEGIN: name args` ... `#+END:` region whose body is
//! regenerated from document data. The engine is pure: it receives the buffer
//! text, its parsed tree and the current time, and returns replacement text for
//! the block body. Applying the edit is the caller's job.
//!
//! Pipeline per invocation: locate, parse args, collect scope, filter, render.

pub mod clocktable;
pub mod columnview;
pub mod table;

use crate::core::*;
use crate::parser::elements::strip_prefix_ci;
use crate::position::PositionTracker;
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/* -------------------------------- Errors -------------------------------- */

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DynamicBlockError {
    #[error("not in a dynamic block")]
    NotInBlock,
    #[error("unknown dynamic block type: {0}")]
    UnknownBlockType(String),
    #[error("cannot render dynamic block: {0}")]
    RenderError(String),
}

impl DynamicBlockError {
    /// Errors the caller may silently ignore.
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::NotInBlock | Self::UnknownBlockType(_))
    }
}

/* -------------------------------- Locate -------------------------------- */

/// A located `#+BEGIN:` ... `#+END:` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRegion {
    pub begin_line: usize,
    pub end_line: usize,
    pub name: String,
    pub args: String,
    /// Byte offset of the `#+BEGIN:` line.
    pub begin_offset: usize,
    /// Body between the begin line and the `#+END:` line.
    pub content_range: SourceRange,
}

fn begin_args(line: &str) -> Option<&str> {
    strip_prefix_ci(line.trim(), "#+begin:")
}

fn is_end(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("#+end:")
}

/// Find the dynamic block containing `line` (0-indexed). Both delimiter lines
/// count as inside.
pub fn locate_block(text: &str, line: usize) -> Option<BlockRegion> {
    let tracker = PositionTracker::new(text);
    let line_text = |n: usize| tracker.line_text(text, n);
    line_text(line)?;

    let mut begin = None;
    for k in (0..=line).rev() {
        let t = line_text(k)?;
        if begin_args(t).is_some() {
            begin = Some(k);
            break;
        }
        if is_end(t) && k != line {
            return None;
        }
    }
    let begin = begin?;
    let end = (begin + 1..tracker.line_count()).find(|&k| line_text(k).is_some_and(is_end))?;
    if end < line {
        return None;
    }

    let head = begin_args(line_text(begin)?)?.trim();
    let (name, args) = head.split_once(char::is_whitespace).unwrap_or((head, ""));
    let begin_span = tracker.line_span(begin)?;
    let end_span = tracker.line_span(end)?;
    Some(BlockRegion {
        begin_line: begin,
        end_line: end,
        name: name.to_string(),
        args: args.trim().to_string(),
        begin_offset: begin_span.start,
        content_range: SourceRange::new(begin_span.next.min(end_span.start), end_span.start),
    })
}

/// Every complete dynamic block in `text`, in buffer order.
pub fn find_blocks(text: &str) -> Vec<BlockRegion> {
    let tracker = PositionTracker::new(text);
    let mut out = Vec::new();
    let mut line = 0;
    while line < tracker.line_count() {
        let starts = tracker
            .line_text(text, line)
            .is_some_and(|t| begin_args(t).is_some());
        match starts.then(|| locate_block(text, line)).flatten() {
            Some(region) => {
                line = region.end_line + 1;
                out.push(region);
            }
            None => line += 1,
        }
    }
    out
}

/* ------------------------------ Arguments ------------------------------ */

/// `:key value` pairs from a begin line. Keys are lowercased without the colon;
/// quoted values keep their spaces and a parenthesized list stays one value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockArgs {
    values: IndexMap<String, String>,
}

impl BlockArgs {
    pub fn parse(args: &str) -> Self {
        let mut values: IndexMap<String, String> = IndexMap::new();
        let mut key: Option<String> = None;
        for (token, quoted) in tokenize(args) {
            match token.strip_prefix(':') {
                Some(k) if !quoted && !k.is_empty() => {
                    let k = k.to_ascii_lowercase();
                    values.entry(k.clone()).or_default();
                    key = Some(k);
                }
                _ => {
                    if let Some(k) = &key {
                        let slot = values.entry(k.clone()).or_default();
                        if !slot.is_empty() {
                            slot.push(' ');
                        }
                        slot.push_str(&token);
                    }
                }
            }
        }
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Present and not `nil`.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| v != "nil")
    }

    pub fn number(&self, key: &str) -> Option<usize> {
        self.get(key)?.trim().parse().ok()
    }

    /// A `("a" "b")` list, or a single bare word.
    pub fn list(&self, key: &str) -> Vec<String> {
        let Some(raw) = self.get(key) else {
            return vec![];
        };
        let inner = raw
            .trim()
            .strip_prefix('(')
            .and_then(|r| r.strip_suffix(')'))
            .unwrap_or(raw);
        tokenize(inner).into_iter().map(|(t, _)| t).collect()
    }
}

/// Whitespace-separated tokens; `"..."` and `(...)` group. Returns (token, was_quoted).
fn tokenize(s: &str) -> Vec<(String, bool)> {
    let mut out = Vec::new();
    let mut chars = s.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let mut token = String::new();
        if c == '"' {
            chars.next();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            token.push(escaped);
                        }
                    }
                    '"' => break,
                    _ => token.push(c),
                }
            }
            out.push((token, true));
            continue;
        }
        let mut depth = 0usize;
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() && depth == 0 {
                break;
            }
            match c {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                _ => {}
            }
            token.push(c);
            chars.next();
        }
        out.push((token, false));
    }
    out
}

/* ------------------------------ Tag matching ------------------------------ */

/// Tag match expression: `+a-b`, `a&b`, `a:b`; `|` separates alternatives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagMatch {
    alternatives: Vec<Vec<(bool, String)>>,
}

impl TagMatch {
    pub fn parse(expr: &str) -> Self {
        let alternatives = expr
            .split('|')
            .map(|alt| {
                let mut terms = Vec::new();
                let mut required = true;
                let mut word = String::new();
                for c in alt.chars().chain(std::iter::once(' ')) {
                    if c.is_alphanumeric() || matches!(c, '_' | '@' | '#' | '%') {
                        word.push(c);
                        continue;
                    }
                    if !word.is_empty() {
                        terms.push((required, std::mem::take(&mut word)));
                    }
                    required = c != '-';
                }
                terms
            })
            .filter(|terms: &Vec<(bool, String)>| !terms.is_empty())
            .collect();
        Self { alternatives }
    }

    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }

    pub fn matches(&self, tags: &[String]) -> bool {
        self.is_empty()
            || self.alternatives.iter().any(|terms| {
                terms
                    .iter()
                    .all(|(required, tag)| tags.iter().any(|t| t == tag) == *required)
            })
    }
}

/* ------------------------------- Scope ------------------------------- */

/// A headline flattened out of its tree, with everything filters need.
#[derive(Debug, Clone)]
pub(crate) struct Entry<'d> {
    pub headline: &'d Headline,
    /// Own tags plus tags inherited from ancestors and `#+FILETAGS:`.
    pub all_tags: Vec<String>,
    pub file: Option<&'d Path>,
}

pub(crate) fn flatten<'d>(
    roots: &'d [Headline],
    inherited: &[String],
    file: Option<&'d Path>,
    out: &mut Vec<Entry<'d>>,
) {
    for h in roots {
        let mut all_tags = inherited.to_vec();
        for t in &h.tags {
            if !all_tags.contains(t) {
                all_tags.push(t.clone());
            }
        }
        out.push(Entry {
            headline: h,
            all_tags: all_tags.clone(),
            file,
        });
        flatten(&h.children, &all_tags, file, out);
    }
}

/// A parsed document supplied by the caller for agenda scope.
#[derive(Debug, Clone, Copy)]
pub struct AgendaDocument<'a> {
    pub path: &'a Path,
    pub document: &'a OrgDocument,
}

/// What a dynamic block writes back into the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockReplacement {
    /// Body range to replace (between the delimiter lines).
    pub range: SourceRange,
    pub text: String,
}

impl BlockReplacement {
    /// The buffer with the replacement applied.
    pub fn apply(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() + self.text.len());
        out.push_str(&text[..self.range.start]);
        out.push_str(&self.text);
        out.push_str(&text[self.range.end..]);
        out
    }
}

/* ------------------------------- Engine ------------------------------- */

pub struct DynamicBlockEngine<'a> {
    pub(crate) text: &'a str,
    pub(crate) document: &'a OrgDocument,
    pub(crate) agenda: Vec<AgendaDocument<'a>>,
    pub(crate) now: NaiveDateTime,
}

impl<'a> DynamicBlockEngine<'a> {
    pub fn new(text: &'a str, document: &'a OrgDocument, now: NaiveDateTime) -> Self {
        Self {
            text,
            document,
            agenda: Vec::new(),
            now,
        }
    }

    /// Documents searched by agenda-scoped blocks.
    pub fn with_agenda(mut self, agenda: Vec<AgendaDocument<'a>>) -> Self {
        self.agenda = agenda;
        self
    }

    /// Locate the block at `line` and regenerate its body.
    pub fn execute_at_line(&self, line: usize) -> Result<BlockReplacement, DynamicBlockError> {
        let region = locate_block(self.text, line).ok_or(DynamicBlockError::NotInBlock)?;
        debug!(
            name = %region.name,
            args = %region.args,
            begin = region.begin_line,
            end = region.end_line,
            "executing dynamic block"
        );
        let text = match region.name.to_ascii_lowercase().as_str() {
            "columnview" => self.execute_column_view(&region.args, region.begin_offset)?,
            "clocktable" => self.execute_clock_table(&region.args, region.begin_offset)?,
            _ => return Err(DynamicBlockError::UnknownBlockType(region.name)),
        };
        Ok(BlockReplacement {
            range: region.content_range,
            text,
        })
    }

    /// Current document's headlines with inherited tags.
    pub(crate) fn file_entries(&self) -> Vec<Entry<'a>> {
        let mut out = Vec::new();
        flatten(
            &self.document.children,
            &self.document.file_tags(),
            self.document.path.as_deref(),
            &mut out,
        );
        out
    }

    /// Entries per agenda document; falls back to the current document.
    pub(crate) fn agenda_entries(&self) -> Vec<(Option<&'a Path>, Vec<Entry<'a>>)> {
        if self.agenda.is_empty() {
            return vec![(self.document.path.as_deref(), self.file_entries())];
        }
        self.agenda
            .iter()
            .map(|a| {
                let mut out = Vec::new();
                flatten(
                    &a.document.children,
                    &a.document.file_tags(),
                    Some(a.path),
                    &mut out,
                );
                (Some(a.path), out)
            })
            .collect()
    }

    /// Entries of the subtree rooted at `root`, with tags inherited from above it.
    pub(crate) fn subtree_entries(&self, root: &'a Headline) -> Vec<Entry<'a>> {
        let inherited = self
            .file_entries()
            .into_iter()
            .find(|e| std::ptr::eq(e.headline, root))
            .map(|e| {
                e.all_tags
                    .into_iter()
                    .filter(|t| !root.tags.contains(t))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let mut out = Vec::new();
        flatten(
            std::slice::from_ref(root),
            &inherited,
            self.document.path.as_deref(),
            &mut out,
        );
        out
    }

    /// Existing body of the block that starts at `begin_offset`.
    pub(crate) fn block_body(&self, begin_offset: usize) -> &'a str {
        let tracker = PositionTracker::new(self.text);
        tracker
            .line_of(begin_offset)
            .and_then(|line| locate_block(self.text, line))
            .map(|r| r.content_range.slice(self.text))
            .unwrap_or_default()
    }
}

/// `\_  ` prefix for a title nested `level - 1` levels deep.
pub(crate) fn indent_prefix(level: usize) -> String {
    if level <= 1 {
        String::new()
    } else {
        format!("\\_{}", " ".repeat(2 * (level - 1)))
    }
}

/// `H:MM`.
pub fn format_minutes(minutes: i64) -> String {
    format!("{}:{:02}", minutes / 60, minutes % 60)
}
