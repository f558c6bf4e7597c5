//! Block-level recognizers.
//!
//! A region is a slice of [`Line`]s. The first line of a region may start in the
//! middle of a physical line (item and footnote contents), which is why every
//! line remembers where its physical line begins.

use super::headline;
use super::objects::parse_objects;
use super::timestamp::parse_timestamp;
use super::PResult;
use crate::core::*;
use crate::position::{LineSpan, PositionTracker};
use crate::settings::ParseSettings;
use indexmap::IndexMap;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_till1},
    character::complete::{char, digit1, space0, space1},
    combinator::{eof, opt, recognize},
    sequence::tuple,
};
use tracing::trace;

/* --------------------------------- Lines --------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line {
    pub start: usize,
    pub end: usize,
    pub next: usize,
    /// Start of the physical line this line belongs to.
    pub line_start: usize,
}

impl Line {
    pub fn physical(span: LineSpan) -> Self {
        Self {
            start: span.start,
            end: span.end,
            next: span.next,
            line_start: span.start,
        }
    }

    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        &src[self.start..self.end]
    }

    fn starting_at(&self, start: usize) -> Self {
        Self {
            start: start.min(self.end),
            ..*self
        }
    }
}

/// Physical lines of a whole buffer. A final terminator does not open another line.
pub(crate) fn buffer_lines(tracker: &PositionTracker, input: &str) -> Vec<Line> {
    let mut lines: Vec<Line> = tracker.lines().iter().map(|l| Line::physical(*l)).collect();
    if lines.len() > 1 && lines.last().is_some_and(|l| l.start == input.len()) {
        lines.pop();
    }
    lines
}

fn span(lines: &[Line]) -> SourceRange {
    match (lines.first(), lines.last()) {
        (Some(first), Some(last)) => SourceRange::new(first.start, last.next),
        _ => SourceRange::default(),
    }
}

/* -------------------------------- Region -------------------------------- */

pub struct Region<'a> {
    pub(crate) text: &'a str,
    pub(crate) settings: &'a ParseSettings,
}

impl<'a> Region<'a> {
    pub fn new(text: &'a str, settings: &'a ParseSettings) -> Self {
        Self { text, settings }
    }

    pub(crate) fn line(&self, l: &Line) -> &'a str {
        l.text(self.text)
    }

    pub(crate) fn is_blank(&self, l: &Line) -> bool {
        self.line(l).trim().is_empty()
    }

    /// Column of the first non-blank character, counted from the physical line start.
    fn indent(&self, l: &Line) -> usize {
        let raw = self.line(l);
        (l.start - l.line_start) + (raw.len() - raw.trim_start().len())
    }

    pub(crate) fn objects(&self, start: usize, end: usize) -> Vec<OrgObject> {
        if start >= end {
            return vec![];
        }
        parse_objects(&self.text[start..end], start, &self.settings.objects)
    }

    /// Section over `lines`; `None` when they are all blank.
    pub fn section(&self, lines: &[Line]) -> Option<OrgElement> {
        if lines.iter().all(|l| self.is_blank(l)) {
            return None;
        }
        let children = self.elements(lines);
        let mut el = OrgElement::new(ElementKind::Section { children }, span(lines));
        el.post_blank = lines.iter().rev().take_while(|l| self.is_blank(l)).count();
        Some(el)
    }

    /// Parse every element in `lines`.
    pub fn elements(&self, lines: &[Line]) -> Vec<OrgElement> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            if self.is_blank(&lines[i]) {
                i += 1;
                continue;
            }

            let (affiliated, body) = self.affiliated_run(lines, i);
            let mut attached = None;
            if body > i && body < lines.len() && !self.is_blank(&lines[body]) {
                let (kind, end) = self.element_at(lines, body);
                if accepts_affiliated(&kind) {
                    attached = Some((kind, end));
                }
            }

            let (el, next) = match attached {
                Some((kind, end)) => {
                    let (mut el, next) = self.finish(lines, i, end, kind);
                    el.affiliated = affiliated;
                    (el, next)
                }
                None => {
                    // A dangling run of affiliated keywords degrades to plain keywords.
                    let (kind, end) = self.element_at(lines, i);
                    self.finish(lines, i, end, kind)
                }
            };
            out.push(el);
            i = next;
        }
        out
    }

    /// Wrap `lines[start..end]` as an element and absorb the blank lines after it.
    pub(crate) fn finish(
        &self,
        lines: &[Line],
        start: usize,
        end: usize,
        kind: ElementKind,
    ) -> (OrgElement, usize) {
        let end = end.max(start + 1);
        let mut next = end;
        while next < lines.len() && self.is_blank(&lines[next]) {
            next += 1;
        }
        let mut el = OrgElement::new(
            kind,
            SourceRange::new(lines[start].start, lines[next - 1].next),
        );
        el.post_blank = next - end;
        (el, next)
    }

    /// Recognize the element starting at `lines[i]`. Returns its kind and the
    /// index of the first line after it (trailing blanks not included).
    pub(crate) fn element_at(&self, lines: &[Line], i: usize) -> (ElementKind, usize) {
        let line = &lines[i];
        let raw = self.line(line);
        let t = raw.trim();

        if self.at_column_zero(line) && headline::inline_task_level(raw).is_some() {
            return self.inline_task(lines, i);
        }
        if let Some(clock) = clock_line(t) {
            return (ElementKind::Clock(clock), i + 1);
        }
        if t.starts_with("#+") {
            if let Some(found) = self.block(lines, i) {
                return found;
            }
            if let Some(found) = self.dynamic_block(lines, i) {
                return found;
            }
            if let Some((key, value)) = keyword_line(t) {
                if key.eq_ignore_ascii_case("CALL") {
                    return (babel_call(value), i + 1);
                }
                return (
                    ElementKind::Keyword {
                        key: key.to_ascii_uppercase(),
                        value: value.to_string(),
                    },
                    i + 1,
                );
            }
        }
        if t.starts_with("\\begin{") {
            if let Some(found) = self.latex_environment(lines, i) {
                return found;
            }
        }
        if let Some(name) = drawer_name(t) {
            return self.drawer(lines, i, name);
        }
        if is_fixed_width(t) {
            return self.fixed_width(lines, i);
        }
        if is_comment(t) {
            return self.comment(lines, i);
        }
        if is_horizontal_rule(t) {
            return (ElementKind::HorizontalRule, i + 1);
        }
        if self.at_column_zero(line) && footnote_label(raw).is_some() {
            return self.footnote_definition(lines, i);
        }
        if t.starts_with('|') {
            return self.table(lines, i);
        }
        if t.starts_with("+-") {
            return self.table_el(lines, i);
        }
        if self.bullet(line).is_some() {
            return self.plain_list(lines, i);
        }
        self.paragraph(lines, i)
    }

    fn at_column_zero(&self, line: &Line) -> bool {
        line.start == line.line_start
    }

    /// Cheap test used to end paragraphs.
    fn starts_element(&self, line: &Line) -> bool {
        let raw = self.line(line);
        let t = raw.trim();
        if self.at_column_zero(line)
            && (headline::inline_task_level(raw).is_some() || footnote_label(raw).is_some())
        {
            return true;
        }
        (t.starts_with("#+")
            && (strip_prefix_ci(t, "#+begin").is_some() || keyword_line(t).is_some()))
            || t.starts_with("\\begin{")
            || t.starts_with('|')
            || t.starts_with("+-")
            || drawer_name(t).is_some()
            || is_fixed_width(t)
            || is_comment(t)
            || is_horizontal_rule(t)
            || clock_line(t).is_some()
            || self.bullet(line).is_some()
    }

    /* ----------------------------- Paragraph ----------------------------- */

    fn paragraph(&self, lines: &[Line], i: usize) -> (ElementKind, usize) {
        let mut k = i + 1;
        while k < lines.len() && !self.is_blank(&lines[k]) && !self.starts_element(&lines[k]) {
            k += 1;
        }
        let first = self.line(&lines[i]);
        let start = lines[i].start + (first.len() - first.trim_start().len());
        let end = lines[k - 1].end;
        (
            ElementKind::Paragraph {
                children: self.objects(start, end),
            },
            k,
        )
    }

    /* ------------------------ Affiliated keywords ------------------------ */

    fn affiliated_run(&self, lines: &[Line], i: usize) -> (AffiliatedKeywords, usize) {
        let mut aff = AffiliatedKeywords::default();
        let mut k = i;
        while k < lines.len() {
            let line = &lines[k];
            let raw = self.line(line);
            let t = raw.trim();
            let Some((key, value)) = keyword_line(t) else {
                break;
            };
            let (name, option) = split_dual(key);
            let name = name.to_ascii_uppercase();
            match name.as_str() {
                "CAPTION" => {
                    let value_at = line.start + (raw.len() - raw.trim_start().len()) + (t.len() - value.len());
                    aff.caption.push(self.objects(value_at, value_at + value.len()));
                }
                "NAME" | "DATA" | "LABEL" | "RESNAME" | "SOURCE" | "SRCNAME" | "TBLNAME" => {
                    aff.name = Some(value.to_string());
                }
                "HEADER" | "HEADERS" => aff.header.push(value.to_string()),
                "RESULTS" => {
                    aff.results = Some(match option {
                        Some(hash) if value.is_empty() => hash.to_string(),
                        _ => value.to_string(),
                    })
                }
                "PLOT" => aff.plot = Some(value.to_string()),
                _ => match name.strip_prefix("ATTR_") {
                    Some(backend) if !backend.is_empty() => aff
                        .attributes
                        .entry(backend.to_ascii_lowercase())
                        .or_default()
                        .push(value.to_string()),
                    _ => break,
                },
            }
            k += 1;
        }
        (aff, k)
    }

    /* ------------------------------- Blocks ------------------------------- */

    /// Index of the closing line, or the region end for unterminated constructs.
    fn closing_line(&self, lines: &[Line], from: usize, marker: &str) -> (usize, usize) {
        match (from..lines.len()).find(|&k| self.line(&lines[k]).trim().eq_ignore_ascii_case(marker)) {
            Some(k) => (k, k + 1),
            None => {
                trace!(marker, "unterminated construct closed at region end");
                (lines.len(), lines.len())
            }
        }
    }

    fn block(&self, lines: &[Line], i: usize) -> Option<(ElementKind, usize)> {
        let t = self.line(&lines[i]).trim();
        let head = strip_prefix_ci(t, "#+begin_")?;
        let name_len = head.find(char::is_whitespace).unwrap_or(head.len());
        let name = &head[..name_len];
        if name.is_empty() {
            return None;
        }
        let params = head[name_len..].trim();
        let parameters = (!params.is_empty()).then(|| params.to_string());

        let (content_end, end) = self.closing_line(lines, i + 1, &format!("#+end_{name}"));
        let contents = &lines[i + 1..content_end];

        let kind = match name.to_ascii_uppercase().as_str() {
            "SRC" => {
                let (language, switches, parameters) = split_src_params(params);
                ElementKind::SrcBlock {
                    language,
                    switches,
                    parameters,
                    value: self.raw_value(contents),
                }
            }
            "EXAMPLE" => ElementKind::ExampleBlock {
                switches: parameters,
                value: self.raw_value(contents),
            },
            "EXPORT" => ElementKind::ExportBlock {
                back_end: params.split_whitespace().next().unwrap_or_default().to_string(),
                value: self.raw_value(contents),
            },
            "COMMENT" => ElementKind::CommentBlock {
                value: self.raw_value(contents),
            },
            "VERSE" => {
                let range = span(contents);
                let end = contents.last().map_or(range.start, |l| l.end);
                ElementKind::VerseBlock {
                    children: self.objects(range.start, end),
                }
            }
            "QUOTE" => ElementKind::QuoteBlock {
                children: self.elements(contents),
            },
            "CENTER" => ElementKind::CenterBlock {
                children: self.elements(contents),
            },
            _ => ElementKind::SpecialBlock {
                block_type: name.to_string(),
                parameters,
                children: self.elements(contents),
            },
        };
        Some((kind, end))
    }

    /// Contents of a verbatim block; `,*` and `,#+` escapes are removed.
    fn raw_value(&self, contents: &[Line]) -> String {
        contents
            .iter()
            .map(|l| {
                let raw = self.line(l);
                let lead = raw.len() - raw.trim_start().len();
                let body = &raw[lead..];
                if body.starts_with(",*") || body.starts_with(",#+") {
                    format!("{}{}", &raw[..lead], &body[1..])
                } else {
                    raw.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn dynamic_block(&self, lines: &[Line], i: usize) -> Option<(ElementKind, usize)> {
        let t = self.line(&lines[i]).trim();
        let head = strip_prefix_ci(t, "#+begin:")?.trim();
        let (name, args) = head.split_once(char::is_whitespace).unwrap_or((head, ""));
        let (content_end, end) = self.closing_line(lines, i + 1, "#+end:");
        let args = args.trim();
        Some((
            ElementKind::DynamicBlock {
                block_name: name.to_string(),
                arguments: (!args.is_empty()).then(|| args.to_string()),
                children: self.elements(&lines[i + 1..content_end]),
            },
            end,
        ))
    }

    fn latex_environment(&self, lines: &[Line], i: usize) -> Option<(ElementKind, usize)> {
        let t = self.line(&lines[i]).trim();
        let rest = t.strip_prefix("\\begin{")?;
        let name = &rest[..rest.find('}')?];
        let closer = format!("\\end{{{name}}}");
        let k = if t.ends_with(&closer) {
            i
        } else {
            (i + 1..lines.len()).find(|&k| self.line(&lines[k]).trim().starts_with(&closer))?
        };
        let value = self.text[lines[i].start..lines[k].end].to_string();
        Some((ElementKind::LatexEnvironment { value }, k + 1))
    }

    /* ------------------------------- Drawers ------------------------------- */

    pub(crate) fn drawer(&self, lines: &[Line], i: usize, name: &str) -> (ElementKind, usize) {
        let (content_end, end) = self.closing_line(lines, i + 1, ":END:");
        let contents = &lines[i + 1..content_end];
        if name.eq_ignore_ascii_case("PROPERTIES") {
            let mut properties: IndexMap<String, String> = IndexMap::new();
            for l in contents {
                let Ok((_, (key, value))) = property_line(self.line(l)) else {
                    continue;
                };
                match key.strip_suffix('+') {
                    Some(base) => {
                        let entry = properties.entry(base.to_string()).or_default();
                        if !entry.is_empty() {
                            entry.push(' ');
                        }
                        entry.push_str(value);
                    }
                    None => {
                        properties.insert(key.to_string(), value.to_string());
                    }
                }
            }
            return (ElementKind::PropertyDrawer { properties }, end);
        }
        (
            ElementKind::Drawer {
                drawer_name: name.to_string(),
                children: self.elements(contents),
            },
            end,
        )
    }

    fn fixed_width(&self, lines: &[Line], i: usize) -> (ElementKind, usize) {
        let mut k = i;
        let mut value = Vec::new();
        while k < lines.len() && is_fixed_width(self.line(&lines[k]).trim()) {
            let t = self.line(&lines[k]).trim_start();
            value.push(t.strip_prefix(": ").unwrap_or(&t[1..]).to_string());
            k += 1;
        }
        (
            ElementKind::FixedWidth {
                value: value.join("\n"),
            },
            k,
        )
    }

    fn comment(&self, lines: &[Line], i: usize) -> (ElementKind, usize) {
        let mut k = i;
        let mut value = Vec::new();
        while k < lines.len() && is_comment(self.line(&lines[k]).trim()) {
            let t = self.line(&lines[k]).trim_start();
            value.push(t.strip_prefix("# ").unwrap_or(&t[1..]).to_string());
            k += 1;
        }
        (
            ElementKind::Comment {
                value: value.join("\n"),
            },
            k,
        )
    }

    /* ---------------------------- Footnotes ---------------------------- */

    fn footnote_definition(&self, lines: &[Line], i: usize) -> (ElementKind, usize) {
        let raw = self.line(&lines[i]);
        let label = footnote_label(raw).unwrap_or_default();
        let after_label = label.len() + "[fn:]".len();
        let gap = raw[after_label..].len() - raw[after_label..].trim_start().len();

        // Ends at the next definition or after two blank lines.
        let mut k = i + 1;
        let mut blanks = 0;
        let mut last = i + 1;
        while k < lines.len() {
            let l = &lines[k];
            if self.is_blank(l) {
                blanks += 1;
                if blanks == 2 {
                    break;
                }
            } else {
                if self.at_column_zero(l) && footnote_label(self.line(l)).is_some() {
                    break;
                }
                blanks = 0;
                last = k + 1;
            }
            k += 1;
        }

        let mut contents: Vec<Line> = lines[i..last].to_vec();
        contents[0] = lines[i].starting_at(lines[i].start + after_label + gap);
        (
            ElementKind::FootnoteDefinition {
                label: label.to_string(),
                children: self.elements(&contents),
            },
            last,
        )
    }

    /* ------------------------------- Tables ------------------------------- */

    fn table(&self, lines: &[Line], i: usize) -> (ElementKind, usize) {
        let mut k = i;
        let mut rows = Vec::new();
        while k < lines.len() && self.line(&lines[k]).trim_start().starts_with('|') {
            rows.push(self.table_row(&lines[k]));
            k += 1;
        }
        let mut formulas = Vec::new();
        while k < lines.len() {
            match keyword_line(self.line(&lines[k]).trim()) {
                Some((key, value)) if key.eq_ignore_ascii_case("TBLFM") => {
                    formulas.push(value.to_string());
                    k += 1;
                }
                _ => break,
            }
        }
        (
            ElementKind::Table {
                table_type: TableType::Org,
                children: rows,
                formulas,
                value: None,
            },
            k,
        )
    }

    fn table_row(&self, line: &Line) -> OrgElement {
        let raw = self.line(line);
        let lead = raw.len() - raw.trim_start().len();
        let body = raw.trim();
        let range = SourceRange::new(line.start, line.next);
        if body.starts_with("|-") {
            return OrgElement::new(
                ElementKind::TableRow {
                    row_type: TableRowType::Rule,
                    children: vec![],
                },
                range,
            );
        }

        let body_start = line.start + lead;
        let body_end = body_start + body.len();
        let mut cells = Vec::new();
        let mut cell_start = body_start + 1;
        for (idx, _) in body.match_indices('|').skip(1) {
            let pipe = body_start + idx;
            cells.push(self.table_cell(cell_start, pipe));
            cell_start = pipe + 1;
        }
        if !self.text[cell_start.min(body_end)..body_end].trim().is_empty() {
            cells.push(self.table_cell(cell_start, body_end));
        }
        OrgElement::new(
            ElementKind::TableRow {
                row_type: TableRowType::Standard,
                children: cells,
            },
            range,
        )
    }

    fn table_cell(&self, start: usize, end: usize) -> OrgObject {
        let raw = &self.text[start..end];
        let lead = raw.len() - raw.trim_start().len();
        let inner = raw.trim();
        let children = self.objects(start + lead, start + lead + inner.len());
        OrgObject::new(
            ObjectKind::TableCell { children },
            SourceRange::new(start, end),
        )
    }

    fn table_el(&self, lines: &[Line], i: usize) -> (ElementKind, usize) {
        let mut k = i;
        while k < lines.len() {
            let t = self.line(&lines[k]).trim_start();
            if !(t.starts_with('+') || t.starts_with('|')) {
                break;
            }
            k += 1;
        }
        let value = self.text[lines[i].start..lines[k - 1].end].to_string();
        (
            ElementKind::Table {
                table_type: TableType::TableEl,
                children: vec![],
                formulas: vec![],
                value: Some(value),
            },
            k,
        )
    }

    /* ------------------------------- Lists ------------------------------- */

    fn bullet(&self, line: &Line) -> Option<Bullet> {
        let raw = self.line(line);
        let lead = raw.len() - raw.trim_start().len();
        let t = &raw[lead..];
        let b = t.as_bytes();
        let (bullet_len, ordered) = match *b.first()? {
            b'-' | b'+' => (1, false),
            b'*' if self.indent(line) > 0 => (1, false),
            c if c.is_ascii_digit() => {
                let digits = b.iter().take_while(|c| c.is_ascii_digit()).count();
                match b.get(digits) {
                    Some(b'.') | Some(b')') => (digits + 1, true),
                    _ => return None,
                }
            }
            _ => return None,
        };
        if !matches!(b.get(bullet_len), None | Some(b' ') | Some(b'\t')) {
            return None;
        }

        let skip_ws = |k: usize| k + t[k..].len() - t[k..].trim_start().len();
        let mut k = skip_ws(bullet_len);

        let mut counter = None;
        if t[k..].starts_with("[@") {
            if let Some(close) = t[k..].find(']') {
                let value = &t[k + 2..k + close];
                counter = match value.parse::<u32>() {
                    Ok(n) => Some(n),
                    Err(_) if value.len() == 1 && value.as_bytes()[0].is_ascii_alphabetic() => {
                        Some(u32::from(value.as_bytes()[0].to_ascii_lowercase() - b'a') + 1)
                    }
                    Err(_) => None,
                };
                if counter.is_some() {
                    k = skip_ws(k + close + 1);
                }
            }
        }

        let mut checkbox = None;
        let boxed = |s: &str| matches!(t.as_bytes().get(k + 3), None | Some(b' ') | Some(b'\t')) && t[k..].starts_with(s);
        for (mark, state) in [("[ ]", Checkbox::Off), ("[-]", Checkbox::Trans), ("[X]", Checkbox::On)] {
            if boxed(mark) {
                checkbox = Some(state);
                break;
            }
        }
        if checkbox.is_some() {
            k = skip_ws(k + 3);
        }

        let mut tag = None;
        if !ordered {
            let rest = &t[k..];
            let found = rest.match_indices("::").find(|(p, _)| {
                *p > 0
                    && rest[..*p].ends_with([' ', '\t'])
                    && matches!(rest.as_bytes().get(p + 2), None | Some(b' ') | Some(b'\t'))
            });
            if let Some((p, _)) = found {
                let tag_text = rest[..p].trim_end();
                let tag_at = line.start + lead + k;
                tag = Some((tag_at, tag_at + tag_text.len()));
                k = skip_ws(k + p + 2);
            }
        }

        Some(Bullet {
            bullet: t[..bullet_len].to_string(),
            ordered,
            counter,
            checkbox,
            tag,
            content: line.start + lead + k,
        })
    }

    fn plain_list(&self, lines: &[Line], i: usize) -> (ElementKind, usize) {
        let indent = self.indent(&lines[i]);
        let mut items = Vec::new();
        let mut list_type = None;
        let mut k = i;
        let mut end = i + 1;

        while let Some(bullet) = self.bullet(&lines[k]) {
            list_type.get_or_insert(match (bullet.ordered, bullet.tag.is_some()) {
                (true, _) => ListType::Ordered,
                (false, true) => ListType::Descriptive,
                (false, false) => ListType::Unordered,
            });

            let mut m = k + 1;
            let mut blanks = 0;
            let mut last = k + 1;
            while m < lines.len() {
                if self.is_blank(&lines[m]) {
                    blanks += 1;
                    if blanks == 2 {
                        break;
                    }
                    m += 1;
                    continue;
                }
                if self.indent(&lines[m]) <= indent {
                    break;
                }
                blanks = 0;
                m += 1;
                last = m;
            }

            let next_item = blanks < 2
                && m < lines.len()
                && !self.is_blank(&lines[m])
                && self.indent(&lines[m]) == indent
                && self.bullet(&lines[m]).is_some();
            let item_end = if next_item { m } else { last };
            items.push(self.item(lines, k, item_end, bullet));
            end = last;
            if !next_item {
                break;
            }
            k = m;
        }

        (
            ElementKind::PlainList {
                list_type: list_type.unwrap_or(ListType::Unordered),
                children: items,
            },
            end,
        )
    }

    fn item(&self, lines: &[Line], k: usize, end: usize, bullet: Bullet) -> OrgElement {
        let mut content_end = end;
        while content_end > k + 1 && self.is_blank(&lines[content_end - 1]) {
            content_end -= 1;
        }
        let mut contents: Vec<Line> = lines[k..content_end].to_vec();
        contents[0] = lines[k].starting_at(bullet.content);

        let tag = bullet.tag.map(|(a, b)| self.objects(a, b));
        let mut el = OrgElement::new(
            ElementKind::Item {
                bullet: bullet.bullet,
                checkbox: bullet.checkbox,
                counter: bullet.counter,
                tag,
                children: self.elements(&contents),
            },
            SourceRange::new(lines[k].start, lines[end - 1].next),
        );
        el.post_blank = end - content_end;
        el
    }

    /* ---------------------------- Inline tasks ---------------------------- */

    fn inline_task(&self, lines: &[Line], i: usize) -> (ElementKind, usize) {
        let line = &lines[i];
        let raw = self.line(line);
        let parts = headline::parse_headline_line(raw, self.settings);
        let close = (i + 1..lines.len()).find(|&k| {
            self.at_column_zero(&lines[k]) && headline::is_inline_task_end(self.line(&lines[k]))
        });
        let (children, end) = match close {
            Some(k) if !headline::is_inline_task_end(raw) => (self.elements(&lines[i + 1..k]), k + 1),
            _ => (vec![], i + 1),
        };

        let mut task = InlineTask {
            level: raw.bytes().take_while(|b| *b == b'*').count(),
            todo_keyword: None,
            todo_type: None,
            priority: None,
            tags: vec![],
            raw_value: String::new(),
            title: vec![],
            children,
        };
        if let Some(parts) = parts {
            task.todo_keyword = parts.todo.map(|(k, _)| k.to_string());
            task.todo_type = parts.todo.map(|(_, t)| t);
            task.priority = parts.priority;
            task.tags = parts.tags;
            task.raw_value = parts.title.to_string();
            task.title = self.objects(line.start + parts.title_at, line.start + parts.title_at + parts.title.len());
        }
        (ElementKind::InlineTask(Box::new(task)), end)
    }
}

struct Bullet {
    bullet: String,
    ordered: bool,
    counter: Option<u32>,
    checkbox: Option<Checkbox>,
    /// Absolute byte range of the description tag.
    tag: Option<(usize, usize)>,
    /// Absolute offset where the item's contents begin.
    content: usize,
}

fn accepts_affiliated(kind: &ElementKind) -> bool {
    !matches!(
        kind,
        ElementKind::Keyword { .. }
            | ElementKind::Clock(_)
            | ElementKind::Planning(_)
            | ElementKind::PropertyDrawer { .. }
            | ElementKind::InlineTask(_)
    )
}

/* --------------------------- Line predicates --------------------------- */

pub(crate) fn strip_prefix_ci<'s>(s: &'s str, prefix: &str) -> Option<&'s str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

/// `#+KEY: value` (KEY may carry a `[...]` option). Returns the key and trimmed value.
pub(crate) fn keyword_line(s: &str) -> Option<(&str, &str)> {
    let rest = s.strip_prefix("#+")?;
    let bytes = rest.as_bytes();
    let mut depth = 0usize;
    let mut k = 0;
    while k < bytes.len() {
        match bytes[k] {
            b'[' => depth += 1,
            b']' if depth > 0 => depth -= 1,
            b':' if depth == 0 => break,
            b' ' | b'\t' if depth == 0 => return None,
            _ => {}
        }
        k += 1;
    }
    if k == 0 || k >= bytes.len() {
        return None;
    }
    Some((&rest[..k], rest[k + 1..].trim()))
}

/// `CAPTION[short]` -> (`CAPTION`, Some(`short`)).
fn split_dual(key: &str) -> (&str, Option<&str>) {
    match key.find('[') {
        Some(p) if key.ends_with(']') => (&key[..p], Some(&key[p + 1..key.len() - 1])),
        _ => (key, None),
    }
}

fn drawer_name(t: &str) -> Option<&str> {
    let name = t.strip_prefix(':')?.strip_suffix(':')?;
    let valid = !name.is_empty()
        && !name.eq_ignore_ascii_case("END")
        && name.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_');
    valid.then_some(name)
}

fn is_fixed_width(t: &str) -> bool {
    t == ":" || t.starts_with(": ") || t.starts_with(":\t")
}

fn is_comment(t: &str) -> bool {
    t == "#" || t.starts_with("# ") || t.starts_with("#\t")
}

fn is_horizontal_rule(t: &str) -> bool {
    t.len() >= 5 && t.bytes().all(|b| b == b'-')
}

/// Label of a `[fn:LABEL] ...` definition line (column 0 only).
fn footnote_label(raw: &str) -> Option<&str> {
    let rest = raw.strip_prefix("[fn:")?;
    let close = rest.find(']')?;
    let label = &rest[..close];
    let valid = !label.is_empty()
        && label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    valid.then_some(label)
}

/// `lang -n -r :var x=1` -> (lang, switches, parameters).
fn split_src_params(params: &str) -> (Option<String>, Option<String>, Option<String>) {
    let params = params.trim();
    let (language, rest) = match params.split_once(char::is_whitespace) {
        _ if params.is_empty() || params.starts_with([':', '-']) => (None, params),
        Some((lang, rest)) => (Some(lang), rest.trim()),
        None => (Some(params), ""),
    };
    let header_at = if rest.starts_with(':') {
        Some(0)
    } else {
        rest.find(" :").map(|p| p + 1)
    };
    let (switches, parameters) = match header_at {
        Some(p) => (rest[..p].trim(), rest[p..].trim()),
        None => (rest, ""),
    };
    let some = |s: &str| (!s.is_empty()).then(|| s.to_string());
    (language.map(str::to_string), some(switches), some(parameters))
}

/// Body of a balanced `open ... close` group at the start of `s`, and the text after it.
fn take_group(s: &str, open: char, close: char) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some((&s[open.len_utf8()..i], &s[i + close.len_utf8()..]));
            }
        }
    }
    None
}

/// `#+CALL: name[inside](args)[end]`.
fn babel_call(value: &str) -> ElementKind {
    let name_end = value.find(['[', '(']).unwrap_or(value.len());
    let mut rest = &value[name_end..];
    let mut group = |open: char, close: char| {
        if !rest.starts_with(open) {
            return None;
        }
        let (inner, after) = take_group(rest, open, close)?;
        rest = after.trim_start();
        Some(inner.trim().to_string()).filter(|s| !s.is_empty())
    };
    let inside_header = group('[', ']');
    let arguments = group('(', ')');
    let end_header = group('[', ']');
    ElementKind::BabelCall {
        call: value[..name_end].trim().to_string(),
        inside_header,
        arguments,
        end_header,
        value: value.to_string(),
    }
}

/* ------------------------- Planning, clocks, properties ------------------------- */

fn preceded_ws<'a, F, O>(
    prefix: F,
    inner: impl Fn(&'a str) -> PResult<'a, O>,
) -> impl Fn(&'a str) -> PResult<'a, O>
where
    F: Fn(&'a str) -> PResult<'a, &'a str>,
{
    move |i: &'a str| {
        let (i, _) = space0(i)?;
        let (i, _) = prefix(i)?;
        let (i, _) = space0(i)?;
        inner(i)
    }
}

/// `SCHEDULED: <...> DEADLINE: <...> CLOSED: [...]` in any order.
pub(crate) fn planning_line(line: &str) -> Option<Planning> {
    let mut rest = line;
    let mut matched = false;
    let mut p = Planning::default();

    while !rest.trim().is_empty() {
        if let Ok((r, ts)) = preceded_ws(tag("SCHEDULED:"), parse_timestamp)(rest) {
            p.scheduled = Some(ts);
            rest = r;
            matched = true;
            continue;
        }
        if let Ok((r, ts)) = preceded_ws(tag("DEADLINE:"), parse_timestamp)(rest) {
            p.deadline = Some(ts);
            rest = r;
            matched = true;
            continue;
        }
        if let Ok((r, ts)) = preceded_ws(tag("CLOSED:"), parse_timestamp)(rest) {
            p.closed = Some(ts);
            rest = r;
            matched = true;
            continue;
        }
        // nothing matched -> not a planning line
        return None;
    }
    matched.then_some(p)
}

/// `CLOCK: [start]--[end] => H:MM` or a running `CLOCK: [start]`.
pub(crate) fn clock_line(t: &str) -> Option<Clock> {
    fn parse(i: &str) -> PResult<'_, Clock> {
        let (i, _) = space0(i)?;
        let (i, _) = tag("CLOCK:")(i)?;
        let (i, _) = space0(i)?;
        let (i, value) = parse_timestamp(i)?;
        let (i, duration) = opt(parse_clock_duration)(i)?;
        let (i, _) = space0(i)?;
        let (i, _) = eof(i)?;
        let status = if value.is_range() {
            ClockStatus::Closed
        } else {
            ClockStatus::Running
        };
        Ok((
            i,
            Clock {
                value,
                duration: duration.map(str::to_string),
                status,
            },
        ))
    }
    parse(t).ok().map(|(_, c)| c)
}

fn parse_clock_duration(i: &str) -> PResult<'_, &str> {
    let (i, _) = space0(i)?;
    let (i, _) = tag("=>")(i)?;
    let (i, _) = space0(i)?;
    recognize(tuple((digit1, char(':'), digit1)))(i)
}

/// `:KEY: value` inside a property drawer; `:KEY+:` appends.
fn property_line(i: &str) -> PResult<'_, (&str, &str)> {
    let (i, _) = space0(i)?;
    let (i, _) = char(':')(i)?;
    let (i, key) = take_till1(|c: char| c == ':' || c.is_whitespace())(i)?;
    let (i, _) = char(':')(i)?;
    let (i, _) = alt((space1, eof))(i)?;
    if key.eq_ignore_ascii_case("END") {
        return super::fail(i, "property-end");
    }
    Ok(("", (key, i.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> Vec<OrgElement> {
        let settings = ParseSettings::default();
        let lines = buffer_lines(&PositionTracker::new(text), text);
        Region::new(text, &settings).elements(&lines)
    }

    fn kinds(els: &[OrgElement]) -> Vec<&'static str> {
        els.iter()
            .map(|e| match &e.kind {
                ElementKind::Paragraph { .. } => "paragraph",
                ElementKind::PlainList { .. } => "plain-list",
                ElementKind::Item { .. } => "item",
                ElementKind::SrcBlock { .. } => "src-block",
                ElementKind::QuoteBlock { .. } => "quote-block",
                ElementKind::Table { .. } => "table",
                ElementKind::Keyword { .. } => "keyword",
                ElementKind::Drawer { .. } => "drawer",
                ElementKind::PropertyDrawer { .. } => "property-drawer",
                ElementKind::Comment { .. } => "comment",
                ElementKind::FixedWidth { .. } => "fixed-width",
                ElementKind::HorizontalRule => "horizontal-rule",
                ElementKind::Clock(_) => "clock",
                ElementKind::FootnoteDefinition { .. } => "footnote-definition",
                ElementKind::DynamicBlock { .. } => "dynamic-block",
                ElementKind::LatexEnvironment { .. } => "latex-environment",
                ElementKind::BabelCall { .. } => "babel-call",
                ElementKind::InlineTask(_) => "inline-task",
                ElementKind::VerseBlock { .. } => "verse-block",
                ElementKind::ExampleBlock { .. } => "example-block",
                _ => "other",
            })
            .collect()
    }

    #[test]
    fn paragraphs_split_on_blank_lines_and_elements() {
        let text = "one\ntwo\n\nthree\n# note\n-----\n";
        let els = parse(text);
        assert_eq!(kinds(&els), vec!["paragraph", "paragraph", "comment", "horizontal-rule"]);
        assert_eq!(els[0].range.slice(text), "one\ntwo\n\n");
        assert_eq!(els[0].post_blank, 1);
    }

    #[test]
    fn src_block_keeps_raw_value_and_params() {
        let text = "#+begin_src rust -n :results output\nlet x = *y*;\n,* not a heading\n#+END_SRC\n";
        let els = parse(text);
        let ElementKind::SrcBlock { language, switches, parameters, value } = &els[0].kind else {
            panic!("expected src block, got {:?}", els[0].kind);
        };
        assert_eq!(language.as_deref(), Some("rust"));
        assert_eq!(switches.as_deref(), Some("-n"));
        assert_eq!(parameters.as_deref(), Some(":results output"));
        assert_eq!(value, "let x = *y*;\n* not a heading");
    }

    #[test]
    fn unterminated_block_closes_at_region_end() {
        let text = "#+BEGIN_QUOTE\nquoted\n\nstill quoted\n";
        let els = parse(text);
        assert_eq!(kinds(&els), vec!["quote-block"]);
        assert_eq!(kinds(els[0].elements()), vec!["paragraph", "paragraph"]);
        assert_eq!(els[0].range.end, text.len());
    }

    #[test]
    fn property_drawer_accumulates_plus_keys() {
        let text = ":PROPERTIES:\n:ID: abc\n:VAR: a=1\n:VAR+: b=2\n:END:\n";
        let els = parse(text);
        let ElementKind::PropertyDrawer { properties } = &els[0].kind else {
            panic!("expected property drawer");
        };
        assert_eq!(properties.get("ID").map(String::as_str), Some("abc"));
        assert_eq!(properties.get("VAR").map(String::as_str), Some("a=1 b=2"));
    }

    #[test]
    fn lists_nest_by_indentation() {
        let text = "- a\n  - a1\n  - a2\n- b\n\n\nafter\n";
        let els = parse(text);
        assert_eq!(kinds(&els), vec!["plain-list", "paragraph"]);
        assert_eq!(els[0].post_blank, 2);
        let items = els[0].elements();
        assert_eq!(items.len(), 2);
        assert_eq!(kinds(items[0].elements()), vec!["paragraph", "plain-list"]);
        assert_eq!(items[0].elements()[1].elements().len(), 2);
        assert_eq!(items[0].range.slice(text), "- a\n  - a1\n  - a2\n");
    }

    #[test]
    fn item_checkbox_counter_and_tag() {
        let text = "1. [@3] [X] done\n- term :: definition\n";
        let els = parse(text);
        let ElementKind::Item { bullet, counter, checkbox, .. } = &els[0].elements()[0].kind else {
            panic!("expected item");
        };
        assert_eq!((bullet.as_str(), *counter, *checkbox), ("1.", Some(3), Some(Checkbox::On)));

        let ElementKind::PlainList { list_type, children } = &els[0].kind else {
            panic!("expected list");
        };
        assert_eq!(*list_type, ListType::Ordered);
        let ElementKind::Item { tag: Some(tag), .. } = &children[1].kind else {
            panic!("expected tagged item");
        };
        assert_eq!(plain_text(tag), "term");
    }

    #[test]
    fn table_rows_cells_and_formulas() {
        let text = "| a | *b* |\n|---+---|\n| 1 | 2\n#+TBLFM: $2=$1*2\n";
        let els = parse(text);
        let ElementKind::Table { children, formulas, .. } = &els[0].kind else {
            panic!("expected table");
        };
        assert_eq!(formulas, &vec!["$2=$1*2".to_string()]);
        assert_eq!(children.len(), 3);
        let ElementKind::TableRow { row_type, children: cells } = &children[0].kind else {
            panic!("expected row");
        };
        assert_eq!(*row_type, TableRowType::Standard);
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[1].children()[0].object_type(), ObjectType::Bold);
        let ElementKind::TableRow { row_type, .. } = &children[1].kind else {
            panic!("expected rule");
        };
        assert_eq!(*row_type, TableRowType::Rule);
        let ElementKind::TableRow { children: cells, .. } = &children[2].kind else {
            panic!("expected row");
        };
        assert_eq!(cells.len(), 2);
    }

    #[test]
    fn affiliated_keywords_attach_to_next_element() {
        let text = "#+CAPTION: A *nice* table\n#+NAME: tbl\n#+ATTR_HTML: :border 1\n| x |\n";
        let els = parse(text);
        assert_eq!(kinds(&els), vec!["table"]);
        let aff = &els[0].affiliated;
        assert_eq!(aff.name.as_deref(), Some("tbl"));
        assert_eq!(aff.attributes.get("html"), Some(&vec![":border 1".to_string()]));
        assert_eq!(plain_text(&aff.caption[0]), "A nice table");
        assert_eq!(els[0].range.start, 0);
    }

    #[test]
    fn dangling_affiliated_keywords_become_keywords() {
        let els = parse("#+NAME: orphan\n\ntext\n");
        assert_eq!(kinds(&els), vec!["keyword", "paragraph"]);
    }

    #[test]
    fn footnote_definition_ends_at_next_definition() {
        let text = "[fn:1] First note\ncontinues\n[fn:2] Second\n";
        let els = parse(text);
        assert_eq!(kinds(&els), vec!["footnote-definition", "footnote-definition"]);
        let ElementKind::FootnoteDefinition { label, children } = &els[0].kind else {
            panic!("expected footnote definition");
        };
        assert_eq!(label, "1");
        assert_eq!(children[0].range.start, 7);
    }

    #[test]
    fn clock_lines_and_drawers() {
        let text = ":LOGBOOK:\nCLOCK: [2024-03-01 Fri 09:00]--[2024-03-01 Fri 10:30] =>  1:30\nCLOCK: [2024-03-02 Sat 09:00]\n:END:\n";
        let els = parse(text);
        let ElementKind::Drawer { drawer_name, children } = &els[0].kind else {
            panic!("expected drawer");
        };
        assert_eq!(drawer_name, "LOGBOOK");
        let ElementKind::Clock(closed) = &children[0].kind else {
            panic!("expected clock");
        };
        assert_eq!(closed.status, ClockStatus::Closed);
        assert_eq!(closed.duration.as_deref(), Some("1:30"));
        assert_eq!(closed.minutes(), Some(90));
        let ElementKind::Clock(running) = &children[1].kind else {
            panic!("expected clock");
        };
        assert_eq!(running.status, ClockStatus::Running);
    }

    #[test]
    fn miscellaneous_lesser_elements() {
        let text = ": fixed\n: width\n#+CALL: double[:eval yes](n=4)\n\\begin{equation}\nx\n\\end{equation}\n#+BEGIN: clocktable :scope file\n#+END:\n";
        let els = parse(text);
        assert_eq!(
            kinds(&els),
            vec!["fixed-width", "babel-call", "latex-environment", "dynamic-block"]
        );
        let ElementKind::BabelCall { call, inside_header, arguments, .. } = &els[1].kind else {
            panic!("expected babel call");
        };
        assert_eq!(call, "double");
        assert_eq!(inside_header.as_deref(), Some(":eval yes"));
        assert_eq!(arguments.as_deref(), Some("n=4"));
    }

    #[test]
    fn planning_line_fields_in_any_order() {
        let p = planning_line("DEADLINE: <2024-03-05 Tue> SCHEDULED: <2024-03-01 Fri>").unwrap();
        assert!(p.scheduled.is_some() && p.deadline.is_some() && p.closed.is_none());
        assert!(planning_line("Just text").is_none());
    }

    #[test]
    fn inline_task_with_end_line() {
        let text = "*************** TODO Call back :phone:\nBody text\n*************** END\nafter\n";
        let els = parse(text);
        assert_eq!(kinds(&els), vec!["inline-task", "paragraph"]);
        let ElementKind::InlineTask(task) = &els[0].kind else {
            panic!("expected inline task");
        };
        assert_eq!(task.level, 15);
        assert_eq!(task.todo_keyword.as_deref(), Some("TODO"));
        assert_eq!(task.tags, vec!["phone"]);
        assert_eq!(kinds(&task.children), vec!["paragraph"]);
    }
}
