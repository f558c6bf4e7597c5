//! Org parser.
//!
//! Parsing strategy:
//! - The buffer is split into lines once (`\n`, `\r\n` and lone `\r` all end a line).
//! - Headline lines (`*` runs at column 0, fewer than 15 stars) cut the buffer into
//!   sections; the headline tree is stack-built by comparing levels.
//! - Each section is handed to the element parser in [`elements`], which calls the
//!   inline object parser in [`objects`] on every paragraph, cell and title.
//!
//! Parsing is total: any input yields a document. Malformed constructs degrade to
//! paragraphs or plain text, and unterminated blocks and drawers close at the end
//! of their enclosing region.

pub mod elements;
pub mod headline;
pub mod objects;
pub mod timestamp;

use crate::core::*;
use crate::position::PositionTracker;
use crate::settings::{ParseSettings, TodoSequence};
use crate::storage::OrgParser;
use anyhow::{Context, Result};
use elements::{Line, Region};
use nom::{
    IResult,
    bytes::complete::take_while,
    error::{VerboseError, VerboseErrorKind},
};
use std::{fs, path::Path, path::PathBuf};
use tracing::debug;

/* ------------------------ Public entry points ------------------------ */

/// Parse an Org document from a string with default settings.
pub fn parse_org_from_str(path: Option<PathBuf>, input: &str) -> OrgDocument {
    parse_org_with_settings(path, input, &ParseSettings::default())
}

/// Parse an Org document from a string.
///
/// In-buffer `#+TODO:`, `#+SEQ_TODO:` and `#+TYP_TODO:` lines replace the
/// configured TODO sequences for this parse.
pub fn parse_org_with_settings(
    path: Option<PathBuf>,
    input: &str,
    settings: &ParseSettings,
) -> OrgDocument {
    let tracker = PositionTracker::new(input);
    let lines = elements::buffer_lines(&tracker, input);
    let settings = buffer_settings(input, &lines, settings);
    let region = Region::new(input, &settings);

    let mut doc = OrgDocument::new(path, SourceRange::new(0, input.len()));

    // 1) Headline boundaries.
    let heads: Vec<(usize, usize)> = lines
        .iter()
        .enumerate()
        .filter_map(|(i, l)| headline::headline_level(l.text(input)).map(|level| (i, level)))
        .collect();

    // 2) Content before the first headline.
    let first = heads.first().map_or(lines.len(), |(i, _)| *i);
    doc.section = region.section(&lines[..first]);
    collect_document_keywords(&mut doc, &settings);

    // 3) Headlines (stack build).
    let mut stack: Vec<Headline> = Vec::new();
    for (n, &(line_index, level)) in heads.iter().enumerate() {
        let body_end = heads.get(n + 1).map_or(lines.len(), |(i, _)| *i);
        let subtree_end = heads[n + 1..]
            .iter()
            .find(|(_, l)| *l <= level)
            .map_or(lines.len(), |(i, _)| *i);
        let node = region.headline(&lines, line_index, body_end, subtree_end);

        while stack.last().is_some_and(|h| h.level >= node.level) {
            attach(&mut stack, &mut doc.children);
        }
        stack.push(node);
    }
    while !stack.is_empty() {
        attach(&mut stack, &mut doc.children);
    }

    debug!(
        headlines = heads.len(),
        lines = lines.len(),
        "parsed org document"
    );
    doc
}

/// Pop the top of the stack into its parent (or the roots).
fn attach(stack: &mut Vec<Headline>, roots: &mut Vec<Headline>) {
    if let Some(done) = stack.pop() {
        match stack.last_mut() {
            Some(parent) => parent.children.push(done),
            None => roots.push(done),
        }
    }
}

/// Concrete parser implementing the `storage::OrgParser` trait.
#[derive(Debug, Clone, Default)]
pub struct NomOrgParser {
    pub settings: ParseSettings,
}

impl NomOrgParser {
    pub fn new(settings: ParseSettings) -> Self {
        Self { settings }
    }
}

impl OrgParser for NomOrgParser {
    fn parse_file(&self, abs_path: &Path) -> Result<OrgDocument> {
        let text =
            fs::read_to_string(abs_path).with_context(|| format!("reading {:?}", abs_path))?;
        Ok(parse_org_with_settings(
            Some(abs_path.to_path_buf()),
            &text,
            &self.settings,
        ))
    }
}

/* --------------------------- Buffer settings --------------------------- */

fn buffer_settings(input: &str, lines: &[Line], base: &ParseSettings) -> ParseSettings {
    let sequences: Vec<TodoSequence> = lines
        .iter()
        .filter_map(|l| elements::keyword_line(l.text(input).trim_start()))
        .filter(|(key, _)| {
            ["TODO", "SEQ_TODO", "TYP_TODO"]
                .iter()
                .any(|k| key.eq_ignore_ascii_case(k))
        })
        .map(|(_, value)| TodoSequence::from_words(value))
        .filter(|s| !s.items.is_empty())
        .collect();

    let mut settings = base.clone();
    if !sequences.is_empty() {
        debug!(count = sequences.len(), "using in-buffer TODO sequences");
        settings.todo_sequences = sequences;
    }
    settings
}

fn collect_document_keywords(doc: &mut OrgDocument, settings: &ParseSettings) {
    let Some(section) = &doc.section else {
        return;
    };
    let mut keywords = indexmap::IndexMap::new();
    let mut lists: indexmap::IndexMap<String, Vec<String>> = indexmap::IndexMap::new();
    for el in section.elements() {
        if let ElementKind::Keyword { key, value } = &el.kind {
            let key = key.to_ascii_uppercase();
            if settings.is_multi_valued(&key) {
                lists.entry(key).or_default().push(value.clone());
            } else if key == "FILETAGS" {
                // FILETAGS accumulates across lines.
                let merged = match keywords.get(&key) {
                    Some(prev) => format!("{prev} {value}"),
                    None => value.clone(),
                };
                keywords.insert(key, merged);
            } else {
                keywords.insert(key, value.clone());
            }
        }
    }
    doc.keywords = keywords;
    doc.keyword_lists = lists;
}

/* ------------------------------- Utils ------------------------------- */

pub(crate) type PResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

pub(crate) fn fail<'a, T>(i: &'a str, ctx: &'static str) -> PResult<'a, T> {
    Err(nom::Err::Error(VerboseError {
        errors: vec![(i, VerboseErrorKind::Context(ctx))],
    }))
}

pub(crate) fn take_while_m_n<F>(m: usize, n: usize, cond: F) -> impl Fn(&str) -> PResult<'_, &str>
where
    F: Fn(char) -> bool + Copy,
{
    move |i: &str| {
        let (rest, out) = take_while(cond)(i)?;
        if out.len() < m || out.len() > n {
            fail(i, "m_n")
        } else {
            Ok((rest, out))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn headline_nesting_follows_levels() {
        let text = "* A\n** B\n*** C\n** D\n* E\n*** F\n";
        let doc = parse_org_from_str(None, text);
        let titles = |hs: &[Headline]| hs.iter().map(Headline::title_text).collect::<Vec<_>>();
        assert_eq!(titles(&doc.children), vec!["A", "E"]);
        assert_eq!(titles(&doc.children[0].children), vec!["B", "D"]);
        assert_eq!(titles(&doc.children[0].children[0].children), vec!["C"]);
        assert_eq!(titles(&doc.children[1].children), vec!["F"]);
    }

    #[test]
    fn subtree_ranges_cover_descendants() {
        let text = "* A\nbody\n** B\n* C\n";
        let doc = parse_org_from_str(None, text);
        assert_eq!(doc.children[0].range, SourceRange::new(0, 14));
        assert_eq!(doc.children[0].children[0].range.slice(text), "** B\n");
        assert_eq!(doc.children[1].range.slice(text), "* C\n");
    }

    #[test]
    fn document_keywords_split_single_and_multi_valued() {
        let text = "#+TITLE: Notes\n#+LATEX_HEADER: \\usepackage{a}\n#+LATEX_HEADER: \\usepackage{b}\n#+FILETAGS: :x:\n#+FILETAGS: :y:\n";
        let doc = parse_org_from_str(None, text);
        assert_eq!(doc.title(), Some("Notes"));
        assert_eq!(
            doc.keyword_lists.get("LATEX_HEADER").map(Vec::len),
            Some(2)
        );
        assert_eq!(doc.file_tags(), vec!["x", "y"]);
    }

    #[test]
    fn in_buffer_todo_sequence_replaces_default() {
        let text = "#+TODO: NEXT WAIT | FINISHED\n* NEXT Call\n* TODO Plain title\n* FINISHED Done\n";
        let doc = parse_org_from_str(None, text);
        assert_eq!(doc.children[0].todo_keyword.as_deref(), Some("NEXT"));
        assert_eq!(doc.children[1].todo_keyword, None);
        assert_eq!(doc.children[1].title_text(), "TODO Plain title");
        assert_eq!(doc.children[2].todo_type, Some(TodoType::Done));
    }

    #[test]
    fn take_while_m_n_enforces_bounds() {
        let digits = take_while_m_n(2, 3, |c: char| c.is_ascii_digit());
        assert_eq!(digits("12ab").ok(), Some(("ab", "12")));
        assert!(digits("1ab").is_err());
        assert!(digits("1234").is_err());
    }

    #[test]
    fn parser_trait_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.org");
        fs::write(&path, "* Heading\n").unwrap();
        let doc = NomOrgParser::default().parse_file(&path).unwrap();
        assert_eq!(doc.path.as_deref(), Some(path.as_path()));
        assert_eq!(doc.children.len(), 1);
        assert!(NomOrgParser::default().parse_file(&dir.path().join("missing.org")).is_err());
    }
}
