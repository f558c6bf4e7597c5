//! Headline lines and headline bodies.

use super::elements::{planning_line, Line, Region};
use super::{fail, PResult};
use crate::core::*;
use crate::settings::ParseSettings;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_till1, take_while1},
    character::complete::{char, satisfy, space1},
    combinator::{eof, opt},
    sequence::{delimited, terminated},
};

/// Star runs this long or longer are inline tasks, not headlines.
pub const INLINE_TASK_MIN_LEVEL: usize = 15;

fn star_run(line: &str) -> Option<usize> {
    let stars = line.bytes().take_while(|b| *b == b'*').count();
    let after = line.as_bytes().get(stars);
    (stars > 0 && matches!(after, None | Some(b' ') | Some(b'\t'))).then_some(stars)
}

/// Level of a headline line, `None` for anything else.
pub fn headline_level(line: &str) -> Option<usize> {
    star_run(line).filter(|n| *n < INLINE_TASK_MIN_LEVEL)
}

pub(crate) fn inline_task_level(line: &str) -> Option<usize> {
    star_run(line).filter(|n| *n >= INLINE_TASK_MIN_LEVEL)
}

/// `*************** END` closes an inline task.
pub(crate) fn is_inline_task_end(line: &str) -> bool {
    inline_task_level(line).is_some() && line.trim_start_matches('*').trim() == "END"
}

/* ---------------------------- Headline line ---------------------------- */

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HeadlineParts<'a> {
    pub level: usize,
    pub todo: Option<(&'a str, TodoType)>,
    pub priority: Option<char>,
    pub commented: bool,
    pub title: &'a str,
    /// Byte offset of `title` within the line.
    pub title_at: usize,
    pub tags: Vec<String>,
}

pub(crate) fn parse_headline_line<'a>(
    line: &'a str,
    settings: &ParseSettings,
) -> Option<HeadlineParts<'a>> {
    headline_parts(line, settings).ok().map(|(_, parts)| parts)
}

fn headline_parts<'a>(line: &'a str, settings: &ParseSettings) -> PResult<'a, HeadlineParts<'a>> {
    let (i, stars) = take_while1(|c| c == '*')(line)?;
    let (i, _) = alt((space1, eof))(i)?;
    let (i, todo) = opt(|i: &'a str| todo_keyword(i, settings))(i)?;
    let (i, priority) = opt(terminated(
        delimited(tag("[#"), satisfy(|c| c.is_ascii_alphanumeric()), char(']')),
        alt((space1, eof)),
    ))(i)?;
    let (i, commented) = opt(terminated(tag("COMMENT"), alt((space1, eof))))(i)?;

    let (title, tags) = split_tags(i.trim_end());
    let title = title.trim_end();
    Ok((
        "",
        HeadlineParts {
            level: stars.len(),
            todo,
            priority,
            commented: commented.is_some(),
            title,
            title_at: line.len() - i.len(),
            tags,
        },
    ))
}

fn todo_keyword<'a>(i: &'a str, settings: &ParseSettings) -> PResult<'a, (&'a str, TodoType)> {
    let (rest, word) = take_till1(char::is_whitespace)(i)?;
    match settings.todo_type_of(word) {
        Some(todo_type) => {
            let (rest, _) = alt((space1, eof))(rest)?;
            Ok((rest, (word, todo_type)))
        }
        None => fail(i, "todo keyword"),
    }
}

fn is_tag_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '@' | '#' | '%')
}

/// Split a trailing `:a:b:` group off a title. Duplicate tags keep their first position.
fn split_tags(body: &str) -> (&str, Vec<String>) {
    let start = body.rfind([' ', '\t']).map_or(0, |p| p + 1);
    let candidate = &body[start..];
    if candidate.len() >= 2 && candidate.starts_with(':') && candidate.ends_with(':') {
        let names: Vec<&str> = candidate[1..candidate.len() - 1].split(':').collect();
        if names.iter().all(|t| !t.is_empty() && t.chars().all(is_tag_char)) {
            let mut tags: Vec<String> = Vec::with_capacity(names.len());
            for name in names {
                if !tags.iter().any(|t| t == name) {
                    tags.push(name.to_string());
                }
            }
            return (&body[..start], tags);
        }
    }
    (body, vec![])
}

/* ---------------------------- Headline body ---------------------------- */

impl Region<'_> {
    /// Build the headline at `lines[at]`. Its section runs to `body_end`, its
    /// subtree (and so its range) to `subtree_end`.
    pub fn headline(&self, lines: &[Line], at: usize, body_end: usize, subtree_end: usize) -> Headline {
        let line = &lines[at];
        let raw = self.line(line);
        let end = lines.get(subtree_end).map_or(self.text.len(), |l| l.start);
        let level = headline_level(raw).unwrap_or(1);

        let mut h = Headline::new(level, String::new(), SourceRange::new(line.start, end));
        if let Some(parts) = parse_headline_line(raw, self.settings) {
            let title_start = line.start + parts.title_at;
            h.todo_keyword = parts.todo.map(|(k, _)| k.to_string());
            h.todo_type = parts.todo.map(|(_, t)| t);
            h.priority = parts.priority;
            h.commented = parts.commented;
            h.archived = parts.tags.iter().any(|t| t == "ARCHIVE");
            h.raw_value = parts.title.to_string();
            h.title = self.objects(title_start, title_start + parts.title.len());
            h.tags = parts.tags;
        }
        h.post_blank = lines[at + 1..subtree_end]
            .iter()
            .rev()
            .take_while(|l| self.is_blank(l))
            .count();

        let body = &lines[at + 1..body_end];
        if body.iter().all(|l| self.is_blank(l)) {
            return h;
        }

        let mut children = Vec::new();
        let mut k = 0;
        if let Some(planning) = planning_line(self.line(&body[0])) {
            let (el, next) = self.finish(body, 0, 1, ElementKind::Planning(planning.clone()));
            h.planning = Some(planning);
            children.push(el);
            k = next;
        }
        if k < body.len() && self.line(&body[k]).trim().eq_ignore_ascii_case(":PROPERTIES:") {
            let (kind, end) = self.drawer(body, k, "PROPERTIES");
            if let ElementKind::PropertyDrawer { properties } = &kind {
                h.properties = properties.clone();
            }
            let (el, next) = self.finish(body, k, end, kind);
            children.push(el);
            k = next;
        }
        children.extend(self.elements(&body[k..]));

        let range = SourceRange::new(body[0].start, body[body.len() - 1].next);
        let mut section = OrgElement::new(ElementKind::Section { children }, range);
        section.post_blank = body.iter().rev().take_while(|l| self.is_blank(l)).count();
        h.section = Some(section);
        h
    }
}
