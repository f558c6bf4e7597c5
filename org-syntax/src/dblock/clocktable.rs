//! `clocktable` blocks: logged time summed per headline.

use super::table::{Row, escape_cell, render};
use super::{BlockArgs, DynamicBlockEngine, DynamicBlockError, Entry, TagMatch, format_minutes, indent_prefix};
use crate::core::*;
use crate::parser::timestamp::timestamp_from_str;
use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime};
use std::path::Path;
use tracing::debug;

/// Half-open `[start, end)` reporting window.
pub type Window = (NaiveDateTime, NaiveDateTime);

pub const DEFAULT_MAXLEVEL: usize = 3;

fn midnight(d: NaiveDate) -> NaiveDateTime {
    d.and_time(NaiveTime::MIN)
}

/// Window for a `:block` keyword. `Ok(None)` means no restriction.
pub fn block_window(block: &str, now: NaiveDateTime) -> Result<Option<Window>, DynamicBlockError> {
    let today = now.date();
    let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
    let month = today.with_day(1).unwrap_or(today);
    let year = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
    let months = |d: NaiveDate, n: i32| {
        if n >= 0 {
            d.checked_add_months(Months::new(n.unsigned_abs()))
        } else {
            d.checked_sub_months(Months::new(n.unsigned_abs()))
        }
        .unwrap_or(d)
    };

    let (start, end) = match block.to_ascii_lowercase().as_str() {
        "today" => (today, today + Duration::days(1)),
        "yesterday" => (today - Duration::days(1), today),
        "thisweek" => (monday, monday + Duration::days(7)),
        "lastweek" => (monday - Duration::days(7), monday),
        "thismonth" => (month, months(month, 1)),
        "lastmonth" => (months(month, -1), month),
        "thisyear" => (year, months(year, 12)),
        "lastyear" => (months(year, -12), year),
        "untilnow" | "" => return Ok(None),
        other => {
            return Err(DynamicBlockError::RenderError(format!(
                "unknown :block value {other:?}"
            )));
        }
    };
    Ok(Some((midnight(start), midnight(end))))
}

/// `:tstart` / `:tend`: a timestamp, with or without brackets.
fn parse_bound(value: &str) -> Result<NaiveDateTime, DynamicBlockError> {
    timestamp_from_str(value)
        .or_else(|| timestamp_from_str(&format!("<{}>", value.trim())))
        .map(|ts| ts.start_datetime())
        .ok_or_else(|| DynamicBlockError::RenderError(format!("invalid time bound {value:?}")))
}

fn resolve_window(args: &BlockArgs, now: NaiveDateTime) -> Result<Option<Window>, DynamicBlockError> {
    let mut window = match args.get("block") {
        Some(block) => block_window(block, now)?,
        None => None,
    };
    let tstart = args.get("tstart").map(parse_bound).transpose()?;
    let tend = args.get("tend").map(parse_bound).transpose()?;
    if tstart.is_some() || tend.is_some() {
        let (start, end) = window.unwrap_or((NaiveDateTime::MIN, NaiveDateTime::MAX));
        window = Some((tstart.unwrap_or(start), tend.unwrap_or(end)));
    }
    Ok(window)
}

/// Minutes of one clock entry inside `window`. Running clocks count up to `now`.
pub fn clocked_minutes(clock: &Clock, window: Option<Window>, now: NaiveDateTime) -> i64 {
    let start = clock.value.start_datetime();
    let end = match clock.status {
        ClockStatus::Closed => clock.value.end_datetime(),
        ClockStatus::Running => Some(now),
    };
    let Some(end) = end else {
        return clock.minutes().unwrap_or(0);
    };
    let (start, end) = match window {
        Some((ws, we)) => (start.max(ws), end.min(we)),
        None => (start, end),
    };
    (end - start).num_minutes().max(0)
}

fn own_minutes(h: &Headline, window: Option<Window>, now: NaiveDateTime) -> i64 {
    h.clocks()
        .into_iter()
        .map(|c| clocked_minutes(c, window, now))
        .sum()
}

/// Minutes logged in `h` and all of its descendants.
pub fn subtree_minutes(h: &Headline, window: Option<Window>, now: NaiveDateTime) -> i64 {
    own_minutes(h, window, now)
        + h.children
            .iter()
            .map(|c| subtree_minutes(c, window, now))
            .sum::<i64>()
}

/// Per-entry totals for a pre-order run of entries from one file.
fn totals(entries: &[Entry<'_>], own: &[i64]) -> Vec<i64> {
    let mut totals = vec![0; entries.len()];
    let mut pending: Vec<usize> = Vec::new();
    for i in (0..entries.len()).rev() {
        let level = entries[i].headline.level;
        let mut total = own[i];
        while let Some(&j) = pending.last() {
            if entries[j].headline.level <= level {
                break;
            }
            total += totals[j];
            pending.pop();
        }
        totals[i] = total;
        pending.push(i);
    }
    totals
}

/// Depth of each entry within its own tree in the run: roots are 1, whatever
/// their level.
fn depths(entries: &[Entry<'_>]) -> Vec<usize> {
    let mut open: Vec<usize> = Vec::new();
    entries
        .iter()
        .map(|e| {
            let level = e.headline.level;
            while open.last().is_some_and(|&l| l >= level) {
                open.pop();
            }
            open.push(level);
            open.len()
        })
        .collect()
}

/// One reported headline.
struct Line {
    depth: usize,
    title: String,
    minutes: i64,
}

struct FileReport<'d> {
    file: Option<&'d Path>,
    total: i64,
    lines: Vec<Line>,
}

/// Which headlines contribute their own time.
struct Filter {
    matcher: TagMatch,
    exclude: Vec<String>,
}

impl Filter {
    fn accepts(&self, tags: &[String]) -> bool {
        self.matcher.matches(tags) && !tags.iter().any(|t| self.exclude.contains(t))
    }
}

impl<'a> DynamicBlockEngine<'a> {
    /// Render a clock table for the block whose arguments are `args`.
    pub fn execute_clock_table(&self, args: &str, cursor_offset: usize) -> Result<String, DynamicBlockError> {
        let args = BlockArgs::parse(args);
        let window = resolve_window(&args, self.now)?;
        let maxlevel = args.number("maxlevel").unwrap_or(DEFAULT_MAXLEVEL);
        let filter = Filter {
            matcher: TagMatch::parse(args.get("match").unwrap_or_default()),
            exclude: args.list("exclude-tags"),
        };
        let scope = args.get("scope").unwrap_or("file").to_ascii_lowercase();

        let groups: Vec<(Option<&'a Path>, Vec<Entry<'a>>)> = match scope.as_str() {
            "file" => vec![(self.document.path.as_deref(), self.file_entries())],
            "subtree" | "tree" => {
                let root = self.document.headline_at(cursor_offset).ok_or_else(|| {
                    DynamicBlockError::RenderError("clock table is not inside a subtree".into())
                })?;
                vec![(self.document.path.as_deref(), self.subtree_entries(root))]
            }
            "agenda" => self.agenda_entries(),
            other => {
                return Err(DynamicBlockError::RenderError(format!(
                    "unknown clock table scope {other:?}"
                )));
            }
        };

        let reports: Vec<FileReport<'a>> = groups
            .into_iter()
            .map(|(file, entries)| self.file_report(file, &entries, window, maxlevel, &filter))
            .collect();
        let total: i64 = reports.iter().map(|r| r.total).sum();
        let depth = reports
            .iter()
            .flat_map(|r| r.lines.iter().map(|l| l.depth))
            .max()
            .unwrap_or(1);

        let with_files = scope == "agenda";
        let skip_empty_files = args.flag("fileskip0");
        let lead = usize::from(with_files);
        let pad = |mut cells: Vec<String>| {
            cells.resize(lead + 1 + depth, String::new());
            Row::Cells(cells)
        };

        let mut header = Vec::new();
        if with_files {
            header.push("File".to_string());
        }
        header.extend(["Headline".to_string(), "Time".to_string()]);
        let mut rows = vec![pad(header), Row::Rule];

        let mut total_row = vec![String::new(); lead];
        total_row.extend(["*Total time*".to_string(), format!("*{}*", format_minutes(total))]);
        rows.push(pad(total_row));

        for report in &reports {
            if with_files && skip_empty_files && report.total == 0 {
                continue;
            }
            rows.push(Row::Rule);
            if with_files {
                let name = report
                    .file
                    .and_then(Path::file_name)
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                rows.push(pad(vec![
                    escape_cell(&name),
                    "*File time*".to_string(),
                    format!("*{}*", format_minutes(report.total)),
                ]));
            }
            for line in &report.lines {
                let mut cells = vec![String::new(); lead];
                cells.push(escape_cell(&format!("{}{}", indent_prefix(line.depth), line.title)));
                cells.resize(lead + line.depth, String::new());
                cells.push(format_minutes(line.minutes));
                rows.push(pad(cells));
            }
        }

        debug!(scope = %scope, total, files = reports.len(), "rendered clock table");
        Ok(format!(
            "#+CAPTION: Clock summary at [{}]\n{}",
            self.now.format("%Y-%m-%d %a %H:%M"),
            render(&rows)
        ))
    }

    fn file_report(
        &self,
        file: Option<&'a Path>,
        entries: &[Entry<'a>],
        window: Option<Window>,
        maxlevel: usize,
        filter: &Filter,
    ) -> FileReport<'a> {
        let own: Vec<i64> = entries
            .iter()
            .map(|e| {
                if filter.accepts(&e.all_tags) {
                    own_minutes(e.headline, window, self.now)
                } else {
                    0
                }
            })
            .collect();
        let totals = totals(entries, &own);

        let mut total = 0;
        let mut lines = Vec::new();
        for ((entry, &minutes), depth) in entries.iter().zip(&totals).zip(depths(entries)) {
            if depth == 1 {
                total += minutes;
            }
            if minutes == 0 || depth > maxlevel {
                continue;
            }
            lines.push(Line {
                depth,
                title: entry.headline.title_text(),
                minutes,
            });
        }
        FileReport { file, total, lines }
    }
}
