//! `columnview` blocks: one table row per headline, one column per format entry.

use super::clocktable::subtree_minutes;
use super::table::{Row, escape_cell, render};
use super::{BlockArgs, DynamicBlockEngine, DynamicBlockError, Entry, TagMatch, format_minutes, indent_prefix};
use crate::core::*;
use crate::parser::PResult;
use crate::parser::elements::strip_prefix_ci;
use nom::{
    bytes::complete::{take_till, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{map_res, opt},
    multi::many0,
    sequence::{delimited, preceded},
};
use tracing::debug;

pub const DEFAULT_FORMAT: &str = "%25ITEM %TODO %3PRIORITY %TAGS";

/// One `%WIDTH?NAME(Title)?{summary}?` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub width: Option<usize>,
    pub name: String,
    pub title: Option<String>,
    pub summary: Option<String>,
}

impl ColumnSpec {
    pub fn header(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }
}

fn column(i: &str) -> PResult<'_, ColumnSpec> {
    let (i, _) = char('%')(i)?;
    let (i, width) = opt(map_res(digit1, str::parse::<usize>))(i)?;
    let (i, name) = take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-')(i)?;
    let (i, title) = opt(delimited(char('('), take_till(|c| c == ')'), char(')')))(i)?;
    let (i, summary) = opt(delimited(char('{'), take_till(|c| c == '}'), char('}')))(i)?;
    Ok((
        i,
        ColumnSpec {
            width,
            name: name.to_string(),
            title: title.map(str::to_string),
            summary: summary.map(str::to_string),
        },
    ))
}

/// Parse a column format. Anything after the last well-formed column is ignored.
pub fn parse_columns(format: &str) -> Vec<ColumnSpec> {
    let parsed: PResult<'_, Vec<ColumnSpec>> = many0(preceded(multispace0, column))(format);
    parsed.map(|(_, columns)| columns).unwrap_or_default()
}

fn tag_string(tags: &[String]) -> String {
    if tags.is_empty() {
        String::new()
    } else {
        format!(":{}:", tags.join(":"))
    }
}

/// `:hlines t` puts a rule before every headline, `:hlines N` before levels up to N.
/// Any non-nil value also rules off the header row.
fn hlines_level(args: &BlockArgs) -> Option<usize> {
    match args.get("hlines")? {
        "t" => Some(usize::MAX),
        "nil" | "" => None,
        n => n.parse().ok(),
    }
}

impl<'a> DynamicBlockEngine<'a> {
    /// Render a column view for the block whose arguments are `args`.
    /// `cursor_offset` is any offset inside the block.
    pub fn execute_column_view(&self, args: &str, cursor_offset: usize) -> Result<String, DynamicBlockError> {
        let args = BlockArgs::parse(args);
        let format = args
            .get("format")
            .map(str::to_string)
            .or_else(|| self.document.keywords.get("COLUMNS").cloned())
            .unwrap_or_else(|| DEFAULT_FORMAT.to_string());
        let columns = parse_columns(&format);
        if columns.is_empty() {
            return Err(DynamicBlockError::RenderError(format!(
                "no columns in format {format:?}"
            )));
        }

        let scope = args.get("id").or_else(|| args.get("scope")).unwrap_or("file");
        let entries = self.column_scope(scope, cursor_offset)?;

        let maxlevel = args.number("maxlevel");
        let matcher = TagMatch::parse(args.get("match").unwrap_or_default());
        let exclude = args.list("exclude-tags");
        let skip_empty = args.flag("skip-empty-rows");
        let indent = args.flag("indent");
        let hlines = hlines_level(&args);

        let mut rows = vec![Row::cells(columns.iter().map(|c| c.header().to_string()))];
        if hlines.is_some() {
            rows.push(Row::Rule);
        }
        let mut first = true;
        for entry in &entries {
            let h = entry.headline;
            if maxlevel.is_some_and(|m| h.level > m)
                || !matcher.matches(&entry.all_tags)
                || entry.all_tags.iter().any(|t| exclude.contains(t))
            {
                continue;
            }
            let cells: Vec<String> = columns
                .iter()
                .map(|c| escape_cell(&self.column_value(entry, c, indent)))
                .collect();
            let empty = columns
                .iter()
                .zip(&cells)
                .all(|(c, v)| c.name.eq_ignore_ascii_case("ITEM") || v.is_empty());
            if skip_empty && empty {
                continue;
            }
            if !first && hlines.is_some_and(|n| h.level <= n) {
                rows.push(Row::Rule);
            }
            first = false;
            rows.push(Row::Cells(cells));
        }

        let mut out = render(&rows);
        for line in self.block_body(cursor_offset).lines() {
            if strip_prefix_ci(line.trim(), "#+tblfm:").is_some() {
                out.push_str(line.trim());
                out.push('\n');
            }
        }
        debug!(rows = rows.len(), scope, "rendered column view");
        Ok(out)
    }

    fn column_scope(&self, scope: &str, cursor_offset: usize) -> Result<Vec<Entry<'a>>, DynamicBlockError> {
        Ok(match scope.to_ascii_lowercase().as_str() {
            "file" => self.file_entries(),
            "global" | "agenda" => self
                .agenda_entries()
                .into_iter()
                .flat_map(|(_, entries)| entries)
                .collect(),
            "local" => match self.document.headline_at(cursor_offset) {
                Some(h) => self.subtree_entries(h),
                None => self.file_entries(),
            },
            _ => {
                let root = self
                    .document
                    .find_headline_by_id(scope)
                    .or_else(|| {
                        self.agenda
                            .iter()
                            .find_map(|a| a.document.find_headline_by_id(scope))
                    })
                    .ok_or_else(|| {
                        DynamicBlockError::RenderError(format!("cannot find entry with ID {scope:?}"))
                    })?;
                self.subtree_entries(root)
            }
        })
    }

    fn column_value(&self, entry: &Entry<'_>, column: &ColumnSpec, indent: bool) -> String {
        let h = entry.headline;
        let stamp = |ts: Option<&Timestamp>| ts.map(|t| t.raw_value.clone()).unwrap_or_default();
        let planning = h.planning.as_ref();
        match column.name.to_ascii_uppercase().as_str() {
            "ITEM" if indent => format!("{}{}", indent_prefix(h.level), h.title_text()),
            "ITEM" => h.title_text(),
            "TODO" => h.todo_keyword.clone().unwrap_or_default(),
            "PRIORITY" => h.priority.map(String::from).unwrap_or_default(),
            "TAGS" => tag_string(&h.tags),
            "ALLTAGS" => tag_string(&entry.all_tags),
            "LEVEL" => h.level.to_string(),
            "SCHEDULED" => stamp(planning.and_then(|p| p.scheduled.as_ref())),
            "DEADLINE" => stamp(planning.and_then(|p| p.deadline.as_ref())),
            "CLOSED" => stamp(planning.and_then(|p| p.closed.as_ref())),
            "EFFORT" => h.property("Effort").unwrap_or_default().to_string(),
            "CLOCKSUM" => match subtree_minutes(h, None, self.now) {
                0 => String::new(),
                m => format_minutes(m),
            },
            "FILE" => entry
                .file
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            _ => h.property(&column.name).unwrap_or_default().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dblock::AgendaDocument;
    use crate::parser::parse_org_from_str;
    use chrono::{NaiveDate, NaiveDateTime};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .and_then(|d| d.and_hms_opt(10, 0, 0))
            .unwrap()
    }

    const DOC: &str = "\
#+COLUMNS: %ITEM %TODO %Effort(Est)
* TODO Write report :work:
:PROPERTIES:
:ID: report
:Effort: 2:00
:END:
** DONE Outline
* Errands :home:
#+BEGIN: columnview :id file
#+END:
";

    fn run(args: &str) -> Result<String, DynamicBlockError> {
        let doc = parse_org_from_str(None, DOC);
        DynamicBlockEngine::new(DOC, &doc, now()).execute_column_view(args, 0)
    }

    #[test]
    fn column_format_entries() {
        let cols = parse_columns("%25ITEM %TODO(State) %CLOCKSUM{:}");
        assert_eq!(cols.len(), 3);
        assert_eq!((cols[0].width, cols[0].name.as_str()), (Some(25), "ITEM"));
        assert_eq!(cols[1].header(), "State");
        assert_eq!(cols[2].summary.as_deref(), Some(":"));
        assert!(parse_columns("no columns here").is_empty());
    }

    #[test]
    fn file_scope_uses_buffer_columns() {
        assert_eq!(
            run(":id file").unwrap(),
            "\
| ITEM         | TODO | Est  |
| Write report | TODO | 2:00 |
| Outline      | DONE |      |
| Errands      |      |      |
"
        );
    }

    #[test]
    fn filters_and_hlines() {
        let out = run(r#":id file :format "%ITEM %LEVEL" :maxlevel 1 :hlines 1"#).unwrap();
        assert_eq!(
            out,
            "\
| ITEM         | LEVEL |
|--------------+-------|
| Write report | 1     |
|--------------+-------|
| Errands      | 1     |
"
        );
        let out = run(r#":format "%ITEM" :exclude-tags ("work")"#).unwrap();
        assert_eq!(out, "| ITEM    |\n| Errands |\n");
        let out = run(r#":format "%ITEM %TODO" :skip-empty-rows t :match "work""#).unwrap();
        assert_eq!(out.lines().count(), 3);
    }

    #[test]
    fn header_rule_follows_hlines() {
        let plain = "| ITEM         |\n| Write report |\n| Outline      |\n| Errands      |\n";
        assert_eq!(run(r#":format "%ITEM""#).unwrap(), plain);
        assert_eq!(run(r#":format "%ITEM" :hlines nil"#).unwrap(), plain);
        assert_eq!(
            run(r#":format "%ITEM" :hlines 0"#).unwrap(),
            "| ITEM         |\n|--------------|\n| Write report |\n| Outline      |\n| Errands      |\n"
        );
        assert_eq!(
            run(r#":format "%ITEM" :hlines t"#).unwrap(),
            "\
| ITEM         |
|--------------|
| Write report |
|--------------|
| Outline      |
|--------------|
| Errands      |
"
        );
    }

    #[test]
    fn id_scope_and_missing_id() {
        let out = run(r#":id report :format "%ITEM""#).unwrap();
        assert_eq!(out, "| ITEM         |\n| Write report |\n| Outline      |\n");
        assert!(matches!(run(":id nowhere"), Err(DynamicBlockError::RenderError(_))));
    }

    #[test]
    fn malformed_format_is_a_render_error() {
        assert!(matches!(
            run(r#":format "garbage""#),
            Err(DynamicBlockError::RenderError(_))
        ));
    }

    #[test]
    fn output_is_deterministic() {
        assert_eq!(run(":id file"), run(":id file"));
    }

    #[test]
    fn agenda_scope_spans_documents() {
        let other = parse_org_from_str(None, "* Elsewhere\n");
        let doc = parse_org_from_str(None, DOC);
        let engine = DynamicBlockEngine::new(DOC, &doc, now()).with_agenda(vec![
            AgendaDocument { path: Path::new("a.org"), document: &doc },
            AgendaDocument { path: Path::new("b.org"), document: &other },
        ]);
        let out = engine
            .execute_column_view(r#":id global :format "%ITEM %FILE""#, 0)
            .unwrap();
        assert!(out.contains("| Elsewhere    | b.org |"));
        assert_eq!(out.lines().count(), 5);
    }

    #[test]
    fn formulas_survive_regeneration() {
        let text = "* A\n#+BEGIN: columnview :format \"%ITEM\"\n| old |\n#+TBLFM: $1=1\n#+END:\n";
        let doc = parse_org_from_str(None, text);
        let engine = DynamicBlockEngine::new(text, &doc, now());
        let repl = engine.execute_at_line(1).unwrap();
        assert_eq!(repl.text, "| ITEM |\n| A    |\n#+TBLFM: $1=1\n");
    }
}
