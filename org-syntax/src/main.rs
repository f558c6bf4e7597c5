use std::{
    collections::{BTreeSet, HashSet},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use org_syntax::core::OrgDocument;
use org_syntax::dblock::{AgendaDocument, DynamicBlockEngine, find_blocks};
use org_syntax::parser::parse_org_with_settings;
use org_syntax::storage::OrgParser;
use org_syntax::{NomOrgParser, ParseSettings, PositionTracker, annotate_positions};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    name = "org-syntax",
    about = "Parse Org files and regenerate their dynamic blocks",
    version
)]
struct Cli {
    /// Enable verbose logging for debugging.
    #[arg(long, global = true)]
    verbose: bool,
    /// JSON file with parse settings (TODO sequences, object options).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Parse Org files and print their trees.
    Parse(ParseArgs),

    /// Convert between byte offsets and line/column positions.
    Locate(LocateArgs),

    /// Regenerate dynamic blocks (columnview, clocktable).
    Update(UpdateArgs),
}

#[derive(Debug, Args)]
struct ParseArgs {
    /// Org files or directories containing Org files to parse.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Emit JSON instead of a debug representation.
    #[arg(long)]
    json: bool,
    /// Fill line/column positions on every node.
    #[arg(long)]
    positions: bool,
}

#[derive(Debug, Args)]
struct LocateArgs {
    file: PathBuf,
    /// Byte offset to resolve into line and column.
    #[arg(long, conflicts_with = "line")]
    offset: Option<usize>,
    /// 0-indexed line to resolve into a byte offset.
    #[arg(long, requires = "column")]
    line: Option<usize>,
    /// 0-indexed column (bytes) on `--line`.
    #[arg(long)]
    column: Option<usize>,
}

#[derive(Debug, Args)]
struct UpdateArgs {
    file: PathBuf,
    /// 0-indexed line inside the block to update.
    #[arg(long, required_unless_present = "all")]
    line: Option<usize>,
    /// Update every dynamic block in the file.
    #[arg(long, conflicts_with = "line")]
    all: bool,
    /// Org files or directories used by agenda-scoped blocks.
    #[arg(long = "agenda")]
    agenda: Vec<PathBuf>,
    /// Current time for clock computations (YYYY-MM-DD HH:MM). Defaults to now.
    #[arg(long, value_parser = parse_now)]
    now: Option<NaiveDateTime>,
    /// Overwrite the file instead of printing to stdout.
    #[arg(long)]
    in_place: bool,
}

fn parse_now(s: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").map_err(|e| format!("{s:?}: {e}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let settings = load_settings(cli.settings.as_deref())?;
    match cli.command {
        Commands::Parse(args) => handle_parse(args, settings),
        Commands::Locate(args) => handle_locate(args),
        Commands::Update(args) => handle_update(args, settings),
    }
}

/// `RUST_LOG` wins; otherwise warnings only, or debug with `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "org_syntax=debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_settings(path: Option<&Path>) -> Result<ParseSettings> {
    let Some(path) = path else {
        return Ok(ParseSettings::default());
    };
    let text = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("parsing settings {:?}", path))
}

fn handle_parse(args: ParseArgs, settings: ParseSettings) -> Result<()> {
    let ParseArgs {
        inputs,
        json,
        positions,
    } = args;
    let expanded = expand_inputs(&inputs)?;
    if expanded.is_empty() {
        anyhow::bail!("no Org files found in the provided inputs");
    }

    let mut parsed = Vec::new();
    for path in expanded {
        debug!(path = %path.display(), "parsing");
        let text = fs::read_to_string(&path).with_context(|| format!("reading {:?}", path))?;
        let mut doc = parse_org_with_settings(Some(path.clone()), &text, &settings);
        if positions {
            annotate_positions(&mut doc, &text);
        }
        parsed.push((path, doc));
    }

    if json {
        #[derive(serde::Serialize)]
        struct JsonOutput<'a> {
            path: String,
            org: &'a OrgDocument,
        }

        let payload: Vec<JsonOutput<'_>> = parsed
            .iter()
            .map(|(path, doc)| JsonOutput {
                path: path.display().to_string(),
                org: doc,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        for (idx, (path, doc)) in parsed.iter().enumerate() {
            if parsed.len() > 1 {
                println!("== {} ==", path.display());
            }
            println!("{:#?}", doc);
            if parsed.len() > 1 && idx + 1 < parsed.len() {
                println!();
            }
        }
    }
    Ok(())
}

fn handle_locate(args: LocateArgs) -> Result<()> {
    let text =
        fs::read_to_string(&args.file).with_context(|| format!("reading {:?}", args.file))?;
    let tracker = PositionTracker::new(&text);
    match (args.offset, args.line, args.column) {
        (Some(offset), _, _) => {
            let loc = tracker
                .location(offset)
                .with_context(|| format!("offset {offset} is past the end of {:?}", args.file))?;
            println!("{}:{}", loc.line, loc.column);
        }
        (None, Some(line), Some(column)) => {
            let offset = tracker
                .offset(line, column)
                .with_context(|| format!("{line}:{column} is outside {:?}", args.file))?;
            println!("{offset}");
        }
        _ => anyhow::bail!("pass either --offset or --line with --column"),
    }
    Ok(())
}

fn handle_update(args: UpdateArgs, settings: ParseSettings) -> Result<()> {
    let UpdateArgs {
        file,
        line,
        all,
        agenda,
        now,
        in_place,
    } = args;
    let now = now.unwrap_or_else(|| Local::now().naive_local());

    let parser = NomOrgParser::new(settings.clone());
    let mut agenda_docs = Vec::new();
    for path in expand_inputs(&agenda)? {
        let doc = parser
            .parse_file(&path)
            .with_context(|| format!("parsing agenda file {:?}", path))?;
        agenda_docs.push((path, doc));
    }

    let mut text = fs::read_to_string(&file).with_context(|| format!("reading {:?}", file))?;
    let mut lines: Vec<usize> = match line {
        Some(line) => vec![line],
        None => find_blocks(&text).into_iter().map(|b| b.begin_line).collect(),
    };
    // Bottom-up so earlier line numbers stay valid after each rewrite.
    lines.reverse();

    let mut updated = 0;
    for line in lines {
        let result = {
            let doc = parse_org_with_settings(Some(file.clone()), &text, &settings);
            let engine = DynamicBlockEngine::new(&text, &doc, now).with_agenda(
                agenda_docs
                    .iter()
                    .map(|(path, document)| AgendaDocument { path, document })
                    .collect(),
            );
            engine.execute_at_line(line)
        };
        match result {
            Ok(replacement) => {
                text = replacement.apply(&text);
                updated += 1;
            }
            Err(err) if err.is_noop() => {
                if all {
                    debug!(line, %err, "skipping block");
                } else {
                    warn!(line, %err, "nothing to update");
                }
            }
            Err(err) => return Err(err).with_context(|| format!("updating block at line {line}")),
        }
    }

    if in_place {
        if updated > 0 {
            fs::write(&file, text.as_bytes()).with_context(|| format!("writing {:?}", file))?;
        }
        info!(path = %file.display(), blocks = updated, "updated dynamic blocks");
    } else {
        print!("{text}");
    }
    Ok(())
}

fn collect_org_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut visited = HashSet::new();
    visit_dir(dir, &mut out, &mut visited)?;
    out.sort();
    out.dedup();
    Ok(out)
}

fn is_org_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "org")
}

fn expand_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut visited = BTreeSet::new();
    for path in paths {
        let canonical =
            fs::canonicalize(path).with_context(|| format!("resolving path {:?}", path))?;
        let meta = fs::metadata(&canonical)
            .with_context(|| format!("reading metadata for {:?}", canonical))?;
        if meta.is_dir() {
            debug!(dir = %canonical.display(), "scanning directory");
            for file in collect_org_files(&canonical)? {
                if visited.insert(file.clone()) {
                    out.push(file);
                }
            }
        } else if meta.is_file() {
            if !is_org_file(&canonical) {
                anyhow::bail!("{:?} is not an .org file", canonical);
            }
            if visited.insert(canonical.clone()) {
                out.push(canonical);
            }
        }
    }
    Ok(out)
}

fn visit_dir(path: &Path, out: &mut Vec<PathBuf>, visited: &mut HashSet<PathBuf>) -> Result<()> {
    let canonical = fs::canonicalize(path)?;
    if !visited.insert(canonical.clone()) {
        return Ok(());
    }

    let metadata = fs::metadata(&canonical)?;
    if metadata.is_dir() {
        for entry in fs::read_dir(&canonical)? {
            let entry = entry?;
            if entry.file_type()?.is_symlink() {
                continue;
            }
            visit_dir(&entry.path(), out, visited)?;
        }
    } else if metadata.is_file() && is_org_file(&canonical) {
        out.push(canonical);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn expand_inputs_walks_directories_and_dedups() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path();
        let nested = root.join("notes/2024");
        fs::create_dir_all(&nested).expect("mkdir nested");
        let a = root.join("a.org");
        let b = nested.join("b.org");
        fs::write(&a, "* A\n").expect("write a");
        fs::write(&b, "* B\n").expect("write b");
        fs::write(root.join("readme.txt"), "skip").expect("write txt");

        let expanded = expand_inputs(&[root.to_path_buf(), a.clone()]).expect("expand");

        let canonical_a = fs::canonicalize(&a).expect("canonical a");
        let canonical_b = fs::canonicalize(&b).expect("canonical b");
        assert_eq!(expanded.len(), 2);
        assert!(expanded.contains(&canonical_a));
        assert!(expanded.contains(&canonical_b));
    }

    #[test]
    fn expand_inputs_rejects_non_org_files() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let txt = tmp.path().join("notes.txt");
        fs::write(&txt, "plain").expect("write txt");

        assert!(expand_inputs(&[txt]).is_err());
    }

    #[test]
    fn settings_default_without_a_file() {
        let settings = load_settings(None).expect("defaults");
        assert_eq!(settings, ParseSettings::default());
    }

    #[test]
    fn settings_load_from_json() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("settings.json");
        fs::write(
            &path,
            r#"{"todo_sequences":[{"items":["NEXT","|","DONE"]}]}"#,
        )
        .expect("write settings");

        let settings = load_settings(Some(&path)).expect("load");
        assert_eq!(settings.todo_sequences[0].items, ["NEXT", "|", "DONE"]);
    }

    #[test]
    fn update_all_rewrites_every_block_in_place() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("plan.org");
        fs::write(
            &path,
            "* Task\n#+BEGIN: columnview :format \"%ITEM\"\nstale\n#+END:\n\
             #+BEGIN: unknown\nkeep\n#+END:\n",
        )
        .expect("write plan");

        handle_update(
            UpdateArgs {
                file: path.clone(),
                line: None,
                all: true,
                agenda: vec![],
                now: parse_now("2024-03-05 10:00").ok(),
                in_place: true,
            },
            ParseSettings::default(),
        )
        .expect("update");

        let text = fs::read_to_string(&path).expect("read back");
        assert!(text.contains("| ITEM |\n| Task |\n"));
        assert!(!text.contains("stale"));
        assert!(text.contains("#+BEGIN: unknown\nkeep\n#+END:\n"));
    }

    #[test]
    fn now_uses_minute_precision() {
        assert!(parse_now("2024-03-05 10:00").is_ok());
        assert!(parse_now("yesterday").is_err());
    }
}
