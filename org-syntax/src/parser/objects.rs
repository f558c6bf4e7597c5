//! Inline object parser.
//!
//! One left-to-right scan over a text span. Bytes that cannot start an object
//! are skipped in O(1); a trigger byte selects an ordered list of matchers from
//! a static dispatch table and the first one that returns a match wins. Gaps
//! between matches become `plain-text` objects, so the output always tiles the
//! input exactly. Nothing here fails: unmatched markup stays plain text.
//!
//! Every matcher is a pure function of `(scanner, position)`. Matches are only
//! ever split at ASCII delimiters, so all ranges fall on char boundaries.

use super::timestamp::parse_timestamp;
use crate::core::*;
use crate::entities;
use crate::settings::ObjectOptions;
use once_cell::sync::Lazy;

/// Parse `text` into inline objects. `base` is the byte offset of `text` in the
/// enclosing document; every produced range is absolute.
pub fn parse_objects(text: &str, base: usize, options: &ObjectOptions) -> Vec<OrgObject> {
    Scanner {
        text,
        base,
        options,
    }
    .run()
}

/* --------------------------- Link type registry --------------------------- */

const WEB_LINK_TYPES: &[&str] = &["http", "https", "ftp"];

#[rustfmt::skip]
const LINK_TYPES: &[&str] = &[
    "http", "https", "ftp", "file", "mailto", "id", "doi", "news", "shell", "elisp",
    "help", "info", "attachment",
    "ref", "eqref", "pageref", "nameref", "autoref", "cref", "Cref", "label",
    "cite", "citep", "citet", "citealt", "citealp", "citeauthor", "citeyear", "nocite",
    "Cite", "Citep", "Citet", "Citealt", "Citealp", "Citeauthor",
];

pub fn is_link_type(name: &str) -> bool {
    LINK_TYPES.contains(&name)
}

/// Build a link from its raw target.
///
/// Registered `type:` prefixes win; then `#id`, `(coderef)`, path-like targets
/// and finally fuzzy search.
pub fn resolve_link(raw: &str, format: LinkFormat, children: Vec<OrgObject>) -> Link {
    let target = raw.trim();
    let (link_type, path) = match target.split_once(':') {
        Some((ty, rest)) if is_link_type(ty) => {
            let path = if WEB_LINK_TYPES.contains(&ty) { target } else { rest };
            (ty.to_string(), path.to_string())
        }
        _ if target.starts_with('#') => ("custom-id".to_string(), target[1..].to_string()),
        _ if target.len() > 2 && target.starts_with('(') && target.ends_with(')') => (
            "coderef".to_string(),
            target[1..target.len() - 1].to_string(),
        ),
        _ if ["/", "./", "../", "~/"].iter().any(|p| target.starts_with(p)) => {
            ("file".to_string(), target.to_string())
        }
        _ => ("fuzzy".to_string(), target.to_string()),
    };

    let (path, search_option) = match (link_type.as_str(), path.split_once("::")) {
        ("file", Some((p, search))) => (p.to_string(), Some(search.to_string())),
        _ => (path, None),
    };

    Link {
        link_type,
        path,
        raw_link: raw.to_string(),
        format,
        search_option,
        children,
    }
}

/* ------------------------------ Dispatch table ------------------------------ */

type Matcher = fn(&Scanner<'_>, usize) -> Option<Match>;

const BACKSLASH: &[Matcher] = &[line_break, bracket_latex_fragment, entity, latex_command];
const DOLLAR: &[Matcher] = &[dollar_latex_fragment];
const BRACKET: &[Matcher] = &[footnote_reference, bracket_link, statistics_cookie, inactive_timestamp];
const ANGLE: &[Matcher] = &[radio_target, target, active_timestamp, angle_link];
const AT: &[Matcher] = &[export_snippet];
const BRACE: &[Matcher] = &[macro_call];
const UNDERSCORE: &[Matcher] = &[subscript, emphasis];
const CARET: &[Matcher] = &[superscript];
const EMPHASIS: &[Matcher] = &[emphasis];
const WORD: &[Matcher] = &[inline_src_block, inline_babel_call, plain_link];

fn matchers_for(b: u8) -> &'static [Matcher] {
    match b {
        b'\\' => BACKSLASH,
        b'$' => DOLLAR,
        b'[' => BRACKET,
        b'<' => ANGLE,
        b'@' => AT,
        b'{' => BRACE,
        b'_' => UNDERSCORE,
        b'^' => CARET,
        b'*' | b'/' | b'+' | b'=' | b'~' => EMPHASIS,
        b if b.is_ascii_alphabetic() => WORD,
        _ => &[],
    }
}

/// Bytes that may start an object: markup punctuation plus the initials of
/// link types and of `src_` / `call_`.
static TRIGGERS: Lazy<[bool; 256]> = Lazy::new(|| {
    let mut table = [false; 256];
    for b in b"\\$[<@{_^*/+=~sc" {
        table[*b as usize] = true;
    }
    for ty in LINK_TYPES {
        if let Some(b) = ty.bytes().next() {
            table[b as usize] = true;
        }
    }
    table
});

/* --------------------------------- Scanner --------------------------------- */

struct Match {
    kind: ObjectKind,
    /// Exclusive end, relative to the scanned text.
    end: usize,
}

struct Scanner<'a> {
    text: &'a str,
    base: usize,
    options: &'a ObjectOptions,
}

impl<'a> Scanner<'a> {
    fn run(&self) -> Vec<OrgObject> {
        let bytes = self.text.as_bytes();
        let mut out = Vec::new();
        let mut plain_start = 0;
        let mut pos = 0;

        while pos < bytes.len() {
            let b = bytes[pos];
            if !TRIGGERS[b as usize] {
                pos += 1;
                continue;
            }
            let Some(m) = matchers_for(b).iter().find_map(|matcher| matcher(self, pos)) else {
                pos += 1;
                continue;
            };
            debug_assert!(m.end > pos, "matcher made no progress at {pos}");
            self.flush(&mut out, plain_start, pos);
            let mut obj = OrgObject::new(m.kind, self.range(pos, m.end));
            obj.post_blank = bytes[m.end..]
                .iter()
                .take_while(|b| matches!(b, b' ' | b'\t'))
                .count();
            out.push(obj);
            pos = m.end.max(pos + 1);
            plain_start = pos;
        }
        self.flush(&mut out, plain_start, bytes.len());
        out
    }

    fn flush(&self, out: &mut Vec<OrgObject>, start: usize, end: usize) {
        if start < end {
            out.push(self.plain(start, end));
        }
    }

    fn plain(&self, start: usize, end: usize) -> OrgObject {
        OrgObject::new(
            ObjectKind::PlainText {
                value: self.text[start..end].to_string(),
            },
            self.range(start, end),
        )
    }

    fn range(&self, start: usize, end: usize) -> SourceRange {
        SourceRange::new(self.base + start, self.base + end)
    }

    fn bytes(&self) -> &'a [u8] {
        self.text.as_bytes()
    }

    fn at(&self, i: usize) -> Option<u8> {
        self.bytes().get(i).copied()
    }

    fn prev_char(&self, pos: usize) -> Option<char> {
        self.text[..pos].chars().next_back()
    }

    /// Previous char is absent or not a word character.
    fn at_word_start(&self, pos: usize) -> bool {
        self.prev_char(pos)
            .is_none_or(|c| !(c.is_alphanumeric() || c == '_'))
    }

    /// Interior objects of a container spanning `[start, end)`.
    fn nested(&self, start: usize, end: usize, options: &ObjectOptions) -> Vec<OrgObject> {
        if start >= end {
            return vec![];
        }
        if !self.options.parse_nested {
            return vec![self.plain(start, end)];
        }
        parse_objects(&self.text[start..end], self.base + start, options)
    }

    /// Index of the delimiter closing the one at `open_at`, counting nesting.
    fn balanced(&self, open_at: usize, open: u8, close: u8, multiline: bool) -> Option<usize> {
        let bytes = self.bytes();
        let mut depth = 0usize;
        for (i, &b) in bytes.iter().enumerate().skip(open_at) {
            if b == open {
                depth += 1;
            } else if b == close {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            } else if !multiline && matches!(b, b'\n' | b'\r') {
                return None;
            }
        }
        None
    }

    /// Length of the ASCII run starting at `from` satisfying `pred`.
    fn run_len(&self, from: usize, pred: impl Fn(u8) -> bool) -> usize {
        self.bytes()
            .get(from..)
            .map_or(0, |rest| rest.iter().take_while(|b| pred(**b)).count())
    }

    fn starts_with(&self, pos: usize, pat: &str) -> bool {
        self.text.get(pos..).is_some_and(|s| s.starts_with(pat))
    }

    fn find_from(&self, from: usize, pat: &str) -> Option<usize> {
        self.text.get(from..)?.find(pat).map(|i| i + from)
    }
}

/* ------------------------------- Emphasis ------------------------------- */

fn is_pre(c: char) -> bool {
    c.is_whitespace() || matches!(c, '-' | '(' | '{' | '\'' | '"')
}

fn is_post(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '-' | '.' | ',' | ';' | ':' | '!' | '?' | '\'' | '"' | ')' | '}' | '[' | ']' | '\\' | '>'
        )
}

fn emphasis(s: &Scanner<'_>, pos: usize) -> Option<Match> {
    let marker = s.at(pos)?;
    let object_type = match marker {
        b'*' => ObjectType::Bold,
        b'/' => ObjectType::Italic,
        b'_' => ObjectType::Underline,
        b'+' => ObjectType::StrikeThrough,
        b'=' => ObjectType::Code,
        b'~' => ObjectType::Verbatim,
        _ => return None,
    };
    if !s.options.allows(object_type) || !s.prev_char(pos).is_none_or(is_pre) {
        return None;
    }
    if s.text[pos + 1..].chars().next().is_none_or(char::is_whitespace) {
        return None;
    }

    let bytes = s.bytes();
    let mut close = None;
    for j in pos + 2..bytes.len() {
        match bytes[j] {
            b'\n' | b'\r' => return None,
            b if b == marker
                && !bytes[j - 1].is_ascii_whitespace()
                && s.text[j + 1..].chars().next().is_none_or(is_post) =>
            {
                close = Some(j);
                break;
            }
            _ => {}
        }
    }
    let close = close?;

    let (start, end) = (pos + 1, close);
    let kind = match object_type {
        ObjectType::Code => ObjectKind::Code {
            value: s.text[start..end].to_string(),
        },
        ObjectType::Verbatim => ObjectKind::Verbatim {
            value: s.text[start..end].to_string(),
        },
        _ => {
            let children = s.nested(start, end, s.options);
            match object_type {
                ObjectType::Bold => ObjectKind::Bold { children },
                ObjectType::Italic => ObjectKind::Italic { children },
                ObjectType::Underline => ObjectKind::Underline { children },
                _ => ObjectKind::StrikeThrough { children },
            }
        }
    };
    Some(Match {
        kind,
        end: close + 1,
    })
}

/* ------------------------------ Backslash ------------------------------ */

fn line_break(s: &Scanner<'_>, pos: usize) -> Option<Match> {
    if !s.options.allows(ObjectType::LineBreak) || s.at(pos + 1) != Some(b'\\') {
        return None;
    }
    if s.prev_char(pos) == Some('\\') {
        return None;
    }
    let after = pos + 2 + s.run_len(pos + 2, |b| b == b' ' || b == b'\t');
    match s.at(after) {
        None | Some(b'\n') | Some(b'\r') => Some(Match {
            kind: ObjectKind::LineBreak,
            end: pos + 2,
        }),
        _ => None,
    }
}

/// `\(...\)` and `\[...\]`.
fn bracket_latex_fragment(s: &Scanner<'_>, pos: usize) -> Option<Match> {
    if !s.options.allows(ObjectType::LatexFragment) {
        return None;
    }
    let closer = match s.at(pos + 1)? {
        b'(' => "\\)",
        b'[' => "\\]",
        _ => return None,
    };
    let end = s.find_from(pos + 2, closer)? + 2;
    Some(Match {
        kind: ObjectKind::LatexFragment {
            value: s.text[pos..end].to_string(),
        },
        end,
    })
}

fn entity(s: &Scanner<'_>, pos: usize) -> Option<Match> {
    if !s.options.allows(ObjectType::Entity) {
        return None;
    }
    let alpha_end = pos + 1 + s.run_len(pos + 1, |b| b.is_ascii_alphabetic());
    if alpha_end == pos + 1 {
        return None;
    }
    let digit_end = alpha_end + s.run_len(alpha_end, |b| b.is_ascii_digit());
    let name_end = if digit_end > alpha_end && entities::lookup(&s.text[pos + 1..digit_end]).is_some() {
        digit_end
    } else {
        alpha_end
    };
    let name = &s.text[pos + 1..name_end];
    let found = entities::lookup(name)?;
    let (use_brackets, end) = if s.starts_with(name_end, "{}") {
        (true, name_end + 2)
    } else {
        (false, name_end)
    };
    Some(Match {
        kind: ObjectKind::Entity {
            name: name.to_string(),
            use_brackets,
            latex: found.latex.to_string(),
            latex_math: found.latex_math,
            html: found.html.to_string(),
            utf8: found.utf8.to_string(),
        },
        end,
    })
}

/// `\command[opt]{arg}` for names that are not entities.
fn latex_command(s: &Scanner<'_>, pos: usize) -> Option<Match> {
    if !s.options.allows(ObjectType::LatexFragment) {
        return None;
    }
    let name_len = s.run_len(pos + 1, |b| b.is_ascii_alphabetic());
    if name_len == 0 {
        return None;
    }
    let mut end = pos + 1 + name_len;
    if s.at(end) == Some(b'*') {
        end += 1;
    }
    loop {
        let close = match s.at(end) {
            Some(b'[') => s.balanced(end, b'[', b']', false),
            Some(b'{') => s.balanced(end, b'{', b'}', false),
            _ => None,
        };
        match close {
            Some(close) => end = close + 1,
            None => break,
        }
    }
    Some(Match {
        kind: ObjectKind::LatexFragment {
            value: s.text[pos..end].to_string(),
        },
        end,
    })
}

/// `$...$` (single line, tight) and `$$...$$`.
fn dollar_latex_fragment(s: &Scanner<'_>, pos: usize) -> Option<Match> {
    if !s.options.allows(ObjectType::LatexFragment) {
        return None;
    }
    let end = if s.starts_with(pos, "$$") {
        let close = s.find_from(pos + 2, "$$")?;
        if close == pos + 2 {
            return None;
        }
        close + 2
    } else {
        if s.prev_char(pos) == Some('$') {
            return None;
        }
        let first = s.text[pos + 1..].chars().next()?;
        if first.is_whitespace() || matches!(first, '.' | ',' | ';' | '$') {
            return None;
        }
        let bytes = s.bytes();
        let close = (pos + 1..bytes.len()).find(|&j| matches!(bytes[j], b'$' | b'\n' | b'\r'))?;
        if bytes[close] != b'$' || matches!(bytes[close - 1], b' ' | b'\t' | b'.' | b',') {
            return None;
        }
        let after_ok = s.text[close + 1..]
            .chars()
            .next()
            .is_none_or(|c| c.is_whitespace() || c.is_ascii_punctuation());
        if !after_ok {
            return None;
        }
        close + 1
    };
    Some(Match {
        kind: ObjectKind::LatexFragment {
            value: s.text[pos..end].to_string(),
        },
        end,
    })
}

/* ------------------------------- Brackets ------------------------------- */

/// `[fn:label]`, `[fn:label:definition]`, `[fn::definition]`.
fn footnote_reference(s: &Scanner<'_>, pos: usize) -> Option<Match> {
    if !s.options.allows(ObjectType::FootnoteReference) || !s.starts_with(pos, "[fn:") {
        return None;
    }
    let close = s.balanced(pos, b'[', b']', true)?;
    let label_start = pos + 4;
    let label_end = label_start
        + s.run_len(label_start, |b| {
            b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
        })
        .min(close - label_start);
    let label = &s.text[label_start..label_end];

    let kind = if label_end == close {
        if label.is_empty() {
            return None;
        }
        ObjectKind::FootnoteReference {
            label: Some(label.to_string()),
            reference_type: FootnoteReferenceType::Standard,
            children: vec![],
        }
    } else if s.at(label_end) == Some(b':') {
        let children = s.nested(label_end + 1, close, s.options);
        if label.is_empty() && children.is_empty() {
            return None;
        }
        ObjectKind::FootnoteReference {
            label: (!label.is_empty()).then(|| label.to_string()),
            reference_type: FootnoteReferenceType::Inline,
            children,
        }
    } else {
        return None;
    };
    Some(Match {
        kind,
        end: close + 1,
    })
}

/// `[[target]]` or `[[target][description]]`.
fn bracket_link(s: &Scanner<'_>, pos: usize) -> Option<Match> {
    if !s.options.allows(ObjectType::Link) || !s.starts_with(pos, "[[") {
        return None;
    }
    let target_start = pos + 2;
    let mut k = target_start;
    let mut depth = 0usize;
    loop {
        match s.at(k)? {
            b'\\' => {
                k += 2;
                continue;
            }
            b'\n' | b'\r' => return None,
            b'[' => depth += 1,
            b']' if depth == 0 => break,
            b']' => depth -= 1,
            _ => {}
        }
        k += 1;
    }
    let target_end = k;
    if s.text[target_start..target_end].trim().is_empty() {
        return None;
    }

    let (description, end) = match s.at(k + 1)? {
        b']' => (None, k + 2),
        b'[' => {
            let desc_start = k + 2;
            let desc_end = s.find_from(desc_start, "]]")?;
            (Some((desc_start, desc_end)), desc_end + 2)
        }
        _ => return None,
    };

    let children = description
        .map(|(a, b)| s.nested(a, b, &s.options.without(ObjectType::Link)))
        .unwrap_or_default();
    let link = resolve_link(&s.text[target_start..target_end], LinkFormat::Bracket, children);
    Some(Match {
        kind: ObjectKind::Link(link),
        end,
    })
}

/// `[33%]`, `[1/3]`, `[%]`, `[/]`.
fn statistics_cookie(s: &Scanner<'_>, pos: usize) -> Option<Match> {
    if !s.options.allows(ObjectType::StatisticsCookie) {
        return None;
    }
    let mut k = pos + 1 + s.run_len(pos + 1, |b| b.is_ascii_digit());
    match s.at(k)? {
        b'%' => k += 1,
        b'/' => k += 1 + s.run_len(k + 1, |b| b.is_ascii_digit()),
        _ => return None,
    }
    if s.at(k)? != b']' {
        return None;
    }
    Some(Match {
        kind: ObjectKind::StatisticsCookie {
            value: s.text[pos..=k].to_string(),
        },
        end: k + 1,
    })
}

fn timestamp_at(s: &Scanner<'_>, pos: usize, active: bool) -> Option<Match> {
    if !s.options.allows(ObjectType::Timestamp) {
        return None;
    }
    let (rest, ts) = parse_timestamp(&s.text[pos..]).ok()?;
    if ts.is_active() != active {
        return None;
    }
    Some(Match {
        end: s.text.len() - rest.len(),
        kind: ObjectKind::Timestamp(ts),
    })
}

fn inactive_timestamp(s: &Scanner<'_>, pos: usize) -> Option<Match> {
    timestamp_at(s, pos, false)
}

fn active_timestamp(s: &Scanner<'_>, pos: usize) -> Option<Match> {
    timestamp_at(s, pos, true)
}

/* --------------------------------- Angles --------------------------------- */

/// Contents of `<<...>>` / `<<<...>>>`: no angle brackets or newlines, no
/// surrounding whitespace. Returns the contents' end.
fn target_contents(s: &Scanner<'_>, start: usize, closer: &str) -> Option<usize> {
    let first = s.text[start..].chars().next()?;
    if first.is_whitespace() || first == '<' || first == '>' {
        return None;
    }
    let len = s.run_len(start, |b| !matches!(b, b'<' | b'>' | b'\n' | b'\r'));
    let end = start + len;
    if !s.starts_with(end, closer) || s.bytes()[end - 1].is_ascii_whitespace() {
        return None;
    }
    Some(end)
}

fn radio_target(s: &Scanner<'_>, pos: usize) -> Option<Match> {
    if !s.options.allows(ObjectType::RadioTarget) || !s.starts_with(pos, "<<<") {
        return None;
    }
    let end = target_contents(s, pos + 3, ">>>")?;
    Some(Match {
        kind: ObjectKind::RadioTarget {
            value: s.text[pos + 3..end].to_string(),
            children: s.nested(pos + 3, end, s.options),
        },
        end: end + 3,
    })
}

fn target(s: &Scanner<'_>, pos: usize) -> Option<Match> {
    if !s.options.allows(ObjectType::Target) || !s.starts_with(pos, "<<") {
        return None;
    }
    let end = target_contents(s, pos + 2, ">>")?;
    Some(Match {
        kind: ObjectKind::Target {
            value: s.text[pos + 2..end].to_string(),
        },
        end: end + 2,
    })
}

/// `<type:path>` with a registered type.
fn angle_link(s: &Scanner<'_>, pos: usize) -> Option<Match> {
    if !s.options.allows(ObjectType::Link) {
        return None;
    }
    let type_end = pos + 1 + s.run_len(pos + 1, |b| b.is_ascii_alphabetic());
    if s.at(type_end) != Some(b':') || !is_link_type(&s.text[pos + 1..type_end]) {
        return None;
    }
    let path_end = type_end + 1 + s.run_len(type_end + 1, |b| !matches!(b, b'<' | b'>' | b'\n' | b'\r'));
    if path_end == type_end + 1 || s.at(path_end) != Some(b'>') {
        return None;
    }
    let link = resolve_link(&s.text[pos + 1..path_end], LinkFormat::Angle, vec![]);
    Some(Match {
        kind: ObjectKind::Link(link),
        end: path_end + 1,
    })
}

/* ------------------------------ Snippets/macros ------------------------------ */

/// `@@backend:value@@`.
fn export_snippet(s: &Scanner<'_>, pos: usize) -> Option<Match> {
    if !s.options.allows(ObjectType::ExportSnippet) || !s.starts_with(pos, "@@") {
        return None;
    }
    let backend_end =
        pos + 2 + s.run_len(pos + 2, |b| b.is_ascii_alphanumeric() || b == b'-');
    if backend_end == pos + 2 || s.at(backend_end) != Some(b':') {
        return None;
    }
    let close = s.find_from(backend_end + 1, "@@")?;
    Some(Match {
        kind: ObjectKind::ExportSnippet {
            back_end: s.text[pos + 2..backend_end].to_string(),
            value: s.text[backend_end + 1..close].to_string(),
        },
        end: close + 2,
    })
}

/// `{{{name}}}` or `{{{name(arg1, arg2)}}}`; `\,` escapes a comma.
fn macro_call(s: &Scanner<'_>, pos: usize) -> Option<Match> {
    if !s.options.allows(ObjectType::Macro) || !s.starts_with(pos, "{{{") {
        return None;
    }
    let name_start = pos + 3;
    if !s.at(name_start)?.is_ascii_alphabetic() {
        return None;
    }
    let name_end = name_start
        + s.run_len(name_start, |b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    let key = s.text[name_start..name_end].to_string();

    if s.starts_with(name_end, "}}}") {
        return Some(Match {
            kind: ObjectKind::Macro { key, args: vec![] },
            end: name_end + 3,
        });
    }
    if s.at(name_end) != Some(b'(') {
        return None;
    }
    let close = s.find_from(name_end + 1, ")}}}")?;
    Some(Match {
        kind: ObjectKind::Macro {
            key,
            args: split_macro_args(&s.text[name_end + 1..close]),
        },
        end: close + 4,
    })
}

fn split_macro_args(raw: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&',') => {
                current.push(',');
                chars.next();
            }
            ',' => args.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    args.push(current.trim().to_string());
    args
}

/* ---------------------------- Sub/superscript ---------------------------- */

fn script(s: &Scanner<'_>, pos: usize, superscript: bool) -> Option<Match> {
    let object_type = if superscript {
        ObjectType::Superscript
    } else {
        ObjectType::Subscript
    };
    if !s.options.allows(object_type) {
        return None;
    }
    let prev = s.prev_char(pos)?;
    if !(prev.is_alphanumeric() || prev == ')') {
        return None;
    }

    let (use_braces, children, end) = if s.at(pos + 1) == Some(b'{') {
        let close = s.balanced(pos + 1, b'{', b'}', false)?;
        (true, s.nested(pos + 2, close, s.options), close + 1)
    } else {
        let mut k = pos + 1;
        if matches!(s.at(k), Some(b'+') | Some(b'-')) {
            k += 1;
        }
        let body_start = k;
        k += s.run_len(k, |b| b.is_ascii_alphanumeric() || b == b'.' || b == b',');
        while k > body_start && !s.bytes()[k - 1].is_ascii_alphanumeric() {
            k -= 1;
        }
        if k == body_start {
            return None;
        }
        (false, vec![s.plain(pos + 1, k)], k)
    };

    let kind = if superscript {
        ObjectKind::Superscript {
            use_braces,
            children,
        }
    } else {
        ObjectKind::Subscript {
            use_braces,
            children,
        }
    };
    Some(Match { kind, end })
}

fn subscript(s: &Scanner<'_>, pos: usize) -> Option<Match> {
    script(s, pos, false)
}

fn superscript(s: &Scanner<'_>, pos: usize) -> Option<Match> {
    script(s, pos, true)
}

/* ------------------------------ Word triggers ------------------------------ */

/// Optional bracketed group at `at` as `(inner_start, inner_end, next)`.
/// The outer `None` means the group opens but never closes.
fn optional_group(s: &Scanner<'_>, at: usize, open: u8, close: u8) -> Option<Option<(usize, usize, usize)>> {
    if s.at(at) != Some(open) {
        return Some(None);
    }
    let end = s.balanced(at, open, close, false)?;
    Some(Some((at + 1, end, end + 1)))
}

/// `src_lang[headers]{body}`.
fn inline_src_block(s: &Scanner<'_>, pos: usize) -> Option<Match> {
    if !s.options.allows(ObjectType::InlineSrcBlock)
        || !s.starts_with(pos, "src_")
        || !s.at_word_start(pos)
    {
        return None;
    }
    let lang_start = pos + 4;
    let lang_end = lang_start
        + s.run_len(lang_start, |b| !b.is_ascii_whitespace() && b != b'[' && b != b'{');
    if lang_end == lang_start {
        return None;
    }
    let params = optional_group(s, lang_end, b'[', b']')?;
    let body_at = params.map_or(lang_end, |(_, _, next)| next);
    let (body_start, body_end, end) = optional_group(s, body_at, b'{', b'}')??;
    Some(Match {
        kind: ObjectKind::InlineSrcBlock {
            language: s.text[lang_start..lang_end].to_string(),
            parameters: params.map(|(a, b, _)| s.text[a..b].trim().to_string()),
            value: s.text[body_start..body_end].to_string(),
        },
        end,
    })
}

/// `call_name[inside](args)[end]`.
fn inline_babel_call(s: &Scanner<'_>, pos: usize) -> Option<Match> {
    if !s.options.allows(ObjectType::InlineBabelCall)
        || !s.starts_with(pos, "call_")
        || !s.at_word_start(pos)
    {
        return None;
    }
    let name_start = pos + 5;
    let name_end = name_start
        + s.run_len(name_start, |b| {
            !b.is_ascii_whitespace() && !matches!(b, b'[' | b']' | b'(' | b')')
        });
    if name_end == name_start {
        return None;
    }
    let inside = optional_group(s, name_end, b'[', b']')?;
    let args_at = inside.map_or(name_end, |(_, _, next)| next);
    let (args_start, args_end, after_args) = optional_group(s, args_at, b'(', b')')??;
    let end_header = optional_group(s, after_args, b'[', b']')?;
    let end = end_header.map_or(after_args, |(_, _, next)| next);

    let text_of = |g: Option<(usize, usize, usize)>| {
        g.map(|(a, b, _)| s.text[a..b].trim().to_string())
            .filter(|v| !v.is_empty())
    };
    Some(Match {
        kind: ObjectKind::InlineBabelCall {
            call: s.text[name_start..name_end].to_string(),
            inside_header: text_of(inside),
            arguments: text_of(Some((args_start, args_end, after_args))),
            end_header: text_of(end_header),
        },
        end,
    })
}

/// `type:path` in running text, e.g. `https://example.com` or `cite:key`.
fn plain_link(s: &Scanner<'_>, pos: usize) -> Option<Match> {
    if !s.options.allows(ObjectType::Link) || !s.at_word_start(pos) {
        return None;
    }
    let type_end = pos + s.run_len(pos, |b| b.is_ascii_alphabetic());
    if s.at(type_end) != Some(b':') || !is_link_type(&s.text[pos..type_end]) {
        return None;
    }

    let path_start = type_end + 1;
    let mut path_end = s.text.len();
    let mut depth = 0usize;
    for (i, c) in s.text[path_start..].char_indices() {
        let stop = match c {
            c if c.is_whitespace() => true,
            '[' | ']' | '<' | '>' | '"' => true,
            '(' => {
                depth += 1;
                false
            }
            ')' if depth == 0 => true,
            ')' => {
                depth -= 1;
                false
            }
            _ => false,
        };
        if stop {
            path_end = path_start + i;
            break;
        }
    }
    while path_end > path_start
        && matches!(s.bytes()[path_end - 1], b'.' | b',' | b';' | b':' | b'!' | b'?' | b'\'')
    {
        path_end -= 1;
    }
    if path_end == path_start {
        return None;
    }

    let link = resolve_link(&s.text[pos..path_end], LinkFormat::Plain, vec![]);
    Some(Match {
        kind: ObjectKind::Link(link),
        end: path_end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn parse(text: &str) -> Vec<OrgObject> {
        parse_objects(text, 0, &ObjectOptions::default())
    }

    fn types(text: &str) -> Vec<ObjectType> {
        parse(text).iter().map(OrgObject::object_type).collect()
    }

    fn only(text: &str) -> OrgObject {
        let mut objects = parse(text);
        assert_eq!(objects.len(), 1, "expected a single object for {text:?}: {objects:#?}");
        objects.remove(0)
    }

    fn rebuild(text: &str, objects: &[OrgObject]) -> String {
        objects.iter().map(|o| o.range.slice(text)).collect()
    }

    use ObjectType::*;

    #[rstest]
    #[case("a*b*c", vec![PlainText])]
    #[case("(*bold*)", vec![PlainText, Bold, PlainText])]
    #[case("*foo\nbar*", vec![PlainText])]
    #[case("* not bold*", vec![PlainText])]
    #[case("*not bold *", vec![PlainText])]
    #[case("/it/ _u_ +s+ =c= ~v~", vec![Italic, PlainText, Underline, PlainText, StrikeThrough, PlainText, Code, PlainText, Verbatim])]
    #[case("x^2 and H_2 here", vec![PlainText, Superscript, PlainText, Subscript, PlainText])]
    #[case("a _b_", vec![PlainText, Underline])]
    #[case("[fn:1]", vec![FootnoteReference])]
    #[case("[2024-01-15 Mon]", vec![Timestamp])]
    #[case("<2024-01-15 .+3d>", vec![Timestamp])]
    #[case("[1/3] [50%]", vec![StatisticsCookie, PlainText, StatisticsCookie])]
    #[case("<<target>> <<<radio>>>", vec![Target, PlainText, RadioTarget])]
    #[case("\\alpha \\foo{x}", vec![Entity, PlainText, LatexFragment])]
    #[case("line\\\\\nnext", vec![PlainText, LineBreak, PlainText])]
    #[case("@@html:<b>@@", vec![ExportSnippet])]
    #[case("{{{date(%Y)}}}", vec![Macro])]
    #[case("src_python{1+1}", vec![InlineSrcBlock])]
    #[case("call_square(4)", vec![InlineBabelCall])]
    #[case("$x^2$ and \\(y\\)", vec![LatexFragment, PlainText, LatexFragment])]
    #[case("xref:foo", vec![PlainText])]
    #[case(" ref:foo", vec![PlainText, Link])]
    #[case("<https://orgmode.org>", vec![Link])]
    fn recognizes_object_sequences(#[case] text: &str, #[case] expected: Vec<ObjectType>) {
        let objects = parse(text);
        assert_eq!(objects.iter().map(OrgObject::object_type).collect::<Vec<_>>(), expected);
        assert_eq!(rebuild(text, &objects), text);
    }

    #[test]
    fn bold_nests_italic() {
        let bold = only("*a /b/ c*");
        let children = bold.children();
        assert_eq!(
            children.iter().map(OrgObject::object_type).collect::<Vec<_>>(),
            vec![PlainText, Italic, PlainText]
        );
        assert_eq!(children[1].range, SourceRange::new(3, 6));
    }

    #[test]
    fn code_keeps_raw_interior() {
        match only("=*not bold*=").kind {
            ObjectKind::Code { value } => assert_eq!(value, "*not bold*"),
            other => panic!("expected code, got {other:?}"),
        }
        match only("~a\\b~").kind {
            ObjectKind::Verbatim { value } => assert_eq!(value, "a\\b"),
            other => panic!("expected verbatim, got {other:?}"),
        }
    }

    #[test]
    fn bracket_link_with_description() {
        let link = only("[[https://example.com][Example]]");
        let ObjectKind::Link(link) = link.kind else {
            panic!("expected link");
        };
        assert_eq!(link.link_type, "https");
        assert_eq!(link.path, "https://example.com");
        assert_eq!(link.format, LinkFormat::Bracket);
        assert_eq!(plain_text(&link.children), "Example");
        assert_eq!(link.children[0].range, SourceRange::new(23, 30));
    }

    #[rstest]
    #[case("[[file:notes.org::*Heading]]", "file", "notes.org", Some("*Heading"))]
    #[case("[[#my-id]]", "custom-id", "my-id", None)]
    #[case("[[(ref1)]]", "coderef", "ref1", None)]
    #[case("[[./img.png]]", "file", "./img.png", None)]
    #[case("[[Some heading]]", "fuzzy", "Some heading", None)]
    #[case("[[id:abc-123]]", "id", "abc-123", None)]
    #[case("[[fuzzy [x] target]]", "fuzzy", "fuzzy [x] target", None)]
    fn link_type_resolution(
        #[case] text: &str,
        #[case] link_type: &str,
        #[case] path: &str,
        #[case] search: Option<&str>,
    ) {
        let ObjectKind::Link(link) = only(text).kind else {
            panic!("expected link for {text}");
        };
        assert_eq!(link.link_type, link_type);
        assert_eq!(link.path, path);
        assert_eq!(link.search_option.as_deref(), search);
    }

    #[test]
    fn unterminated_bracket_link_stays_plain() {
        assert_eq!(types("see [[nowhere][oops"), vec![PlainText]);
        assert_eq!(types("[[a\nb]]"), vec![PlainText]);
    }

    #[test]
    fn link_description_cannot_hold_links() {
        let ObjectKind::Link(link) = only("[[id:x][see https://a.b]]").kind else {
            panic!("expected link");
        };
        assert!(link.children.iter().all(|c| c.object_type() == PlainText));
    }

    #[test]
    fn plain_link_trims_sentence_punctuation() {
        let objects = parse("Visit https://example.com/a_(b). Then");
        let ObjectKind::Link(link) = &objects[1].kind else {
            panic!("expected link");
        };
        assert_eq!(link.path, "https://example.com/a_(b)");
        assert_eq!(objects[2].range.slice("Visit https://example.com/a_(b). Then"), ". Then");
    }

    #[test]
    fn citation_links_keep_key_lists() {
        let ObjectKind::Link(link) = parse("see citep:smith2020,doe2021.")[1].kind.clone() else {
            panic!("expected link");
        };
        assert_eq!(link.link_type, "citep");
        assert_eq!(link.path, "smith2020,doe2021");
    }

    #[test]
    fn footnote_reference_variants() {
        let ObjectKind::FootnoteReference { label, reference_type, children } =
            only("[fn:note:An *inline* def]").kind
        else {
            panic!("expected footnote");
        };
        assert_eq!(label.as_deref(), Some("note"));
        assert_eq!(reference_type, FootnoteReferenceType::Inline);
        assert!(children.iter().any(|c| c.object_type() == Bold));

        let ObjectKind::FootnoteReference { label, .. } = only("[fn::anonymous]").kind else {
            panic!("expected footnote");
        };
        assert!(label.is_none());
        assert_eq!(types("[fn:]"), vec![PlainText]);
    }

    #[test]
    fn timestamp_range_is_one_object() {
        let ObjectKind::Timestamp(ts) = only("<2024-01-15>--<2024-01-17>").kind else {
            panic!("expected timestamp");
        };
        assert_eq!(ts.timestamp_type, TimestampType::ActiveRange);
        assert_eq!(ts.end.map(|e| e.date.format("%d").to_string()).as_deref(), Some("17"));
    }

    #[test]
    fn unknown_entity_falls_back_to_latex_fragment() {
        let ObjectKind::LatexFragment { value } = only("\\textbf{x}").kind else {
            panic!("expected fragment");
        };
        assert_eq!(value, "\\textbf{x}");
        let ObjectKind::Entity { name, use_brackets, utf8, .. } = only("\\rarr{}").kind else {
            panic!("expected entity");
        };
        assert_eq!((name.as_str(), use_brackets, utf8.as_str()), ("rarr", true, "→"));
    }

    #[test]
    fn macro_arguments_split_on_unescaped_commas() {
        let ObjectKind::Macro { key, args } = only("{{{kbd(C-c\\, C-x, b )}}}").kind else {
            panic!("expected macro");
        };
        assert_eq!(key, "kbd");
        assert_eq!(args, vec!["C-c, C-x", "b"]);
    }

    #[test]
    fn post_blank_counts_following_blanks() {
        let objects = parse("Some *bold*  \tand");
        assert_eq!(objects[1].post_blank, 3);
        assert_eq!(objects[2].range.slice("Some *bold*  \tand"), "  \tand");
    }

    #[test]
    fn allow_list_restricts_output() {
        let opts = ObjectOptions::only(&[Italic]);
        let objects = parse_objects("*b* /i/ [[x]]", 0, &opts);
        assert_eq!(
            objects.iter().map(OrgObject::object_type).collect::<Vec<_>>(),
            vec![PlainText, Italic, PlainText]
        );
    }

    #[test]
    fn disabled_nesting_keeps_interior_verbatim() {
        let opts = ObjectOptions {
            restrict: None,
            parse_nested: false,
        };
        let objects = parse_objects("*a /b/*", 0, &opts);
        assert_eq!(objects.len(), 1);
        let children = objects[0].children();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].kind, ObjectKind::PlainText { value: "a /b/".into() });
    }

    #[test]
    fn base_offset_shifts_ranges() {
        let objects = parse_objects("x *y*", 100, &ObjectOptions::default());
        assert_eq!(objects[1].range, SourceRange::new(102, 105));
        assert_eq!(objects[1].children()[0].range, SourceRange::new(103, 104));
    }

    #[test]
    fn multibyte_text_round_trips() {
        let text = "Ünïcödé *fëtt* → [[ß]] _ü_ é^ö";
        assert_eq!(rebuild(text, &parse(text)), text);
    }
}
