use chrono::NaiveDate;
use org_syntax::core::*;
use org_syntax::parser::objects::parse_objects;
use org_syntax::settings::ObjectOptions;
use org_syntax::{
    DynamicBlockEngine, DynamicBlockError, PositionTracker, annotate_positions, parse_org_from_str,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn objects(text: &str) -> Vec<OrgObject> {
    parse_objects(text, 0, &ObjectOptions::default())
}

fn outline<'a>(text: &'a str, objects: &[OrgObject]) -> Vec<(ObjectType, &'a str)> {
    objects
        .iter()
        .map(|o| (o.object_type(), o.range.slice(text)))
        .collect()
}

fn noon() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 5)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .unwrap()
}

/* ---------------------------- Tree invariants ---------------------------- */

fn element_objects(el: &OrgElement) -> Vec<&[OrgObject]> {
    let mut out: Vec<&[OrgObject]> = el.affiliated.caption.iter().map(Vec::as_slice).collect();
    match &el.kind {
        ElementKind::Paragraph { children }
        | ElementKind::VerseBlock { children }
        | ElementKind::TableRow { children, .. } => out.push(children),
        ElementKind::Item { tag: Some(tag), .. } => out.push(tag),
        ElementKind::InlineTask(task) => out.push(&task.title),
        _ => {}
    }
    out
}

fn check_range(text: &str, range: SourceRange, parent: SourceRange) {
    assert!(range.start <= range.end, "inverted range {range:?}");
    assert!(
        parent.start <= range.start && range.end <= parent.end,
        "{range:?} escapes {parent:?}"
    );
    assert!(text.get(range.start..range.end).is_some(), "{range:?} splits a char");
}

fn check_objects(text: &str, objects: &[OrgObject], parent: SourceRange) {
    let mut prev = parent.start;
    for o in objects {
        check_range(text, o.range, parent);
        assert!(prev <= o.range.start, "object {:?} overlaps its predecessor", o.range);
        prev = o.range.end;
        check_objects(text, o.children(), o.range);
    }
}

fn check_elements(text: &str, elements: &[OrgElement], parent: SourceRange) {
    let mut prev = parent.start;
    for el in elements {
        check_range(text, el.range, parent);
        assert!(prev <= el.range.start, "element {:?} overlaps its predecessor", el.range);
        prev = el.range.end;
        for seq in element_objects(el) {
            check_objects(text, seq, el.range);
        }
        check_elements(text, el.elements(), el.range);
    }
}

fn check_headlines(text: &str, headlines: &[Headline], parent: SourceRange, parent_level: usize) {
    let mut prev = parent.start;
    for h in headlines {
        check_range(text, h.range, parent);
        assert!(prev <= h.range.start);
        assert!(h.level > parent_level, "level {} under {parent_level}", h.level);
        prev = h.range.end;
        check_objects(text, &h.title, h.range);
        if let Some(section) = &h.section {
            check_range(text, section.range, h.range);
            check_elements(text, section.elements(), section.range);
        }
        check_headlines(text, &h.children, h.range, h.level);
    }
}

fn check_document(text: &str, doc: &OrgDocument) {
    assert_eq!(doc.range, SourceRange::new(0, text.len()));
    if let Some(section) = &doc.section {
        check_range(text, section.range, doc.range);
        check_elements(text, section.elements(), section.range);
    }
    check_headlines(text, &doc.children, doc.range, 0);
}

fn check_positions(tracker: &PositionTracker, doc: &OrgDocument) {
    fn element(tracker: &PositionTracker, el: &OrgElement) {
        assert_eq!(el.position, tracker.range_position(el.range));
        for seq in element_objects(el) {
            inline(tracker, seq);
        }
        for child in el.elements() {
            element(tracker, child);
        }
    }
    fn inline(tracker: &PositionTracker, objs: &[OrgObject]) {
        for o in objs {
            assert_eq!(o.position, tracker.range_position(o.range));
            inline(tracker, o.children());
        }
    }
    assert_eq!(doc.position, tracker.range_position(doc.range));
    if let Some(section) = &doc.section {
        element(tracker, section);
    }
    for h in doc.headlines() {
        assert_eq!(h.position, tracker.range_position(h.range));
        inline(tracker, &h.title);
        if let Some(section) = &h.section {
            element(tracker, section);
        }
    }
}

/* ------------------------------ Strategies ------------------------------ */

const ORG_LINES: &[&str] = &[
    "",
    "   ",
    "* TODO [#A] Heading :tag:",
    "** Sub heading",
    "**** Deep",
    "*************** inline task",
    "*************** END",
    "SCHEDULED: <2024-03-01 Fri> DEADLINE: <2024-03-08 Fri -2d>",
    ":PROPERTIES:",
    ":ID: abc",
    ":Effort+: 1:00",
    ":END:",
    ":LOGBOOK:",
    "CLOCK: [2024-03-01 Fri 09:00]--[2024-03-01 Fri 10:30] =>  1:30",
    "- item",
    "  - [X] nested :: description",
    "1. [@3] ordered",
    "#+BEGIN_SRC rust",
    "#+END_SRC",
    "#+BEGIN_QUOTE",
    "#+END_QUOTE",
    "#+BEGIN_VERSE",
    "#+END_VERSE",
    "#+BEGIN: columnview :id file",
    "#+END:",
    "#+TITLE: Notes",
    "#+NAME: thing",
    "#+CAPTION: A *caption*",
    "| a | b |",
    "|---+---|",
    "#+TBLFM: $1=2",
    "+---+",
    "[fn:1] Footnote *text*",
    ": fixed width",
    "# comment",
    "-----",
    "\\begin{equation}",
    "\\end{equation}",
    "#+CALL: square(4)",
    "Text with *bold*, [[https://orgmode.org][a link]] and <2024-01-15 Mon>.",
];

fn org_line() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => prop::sample::select(ORG_LINES).prop_map(String::from),
        1 => "[a-zA-Z *=/_+~\\[\\]<>:#|0-9^{}()\\\\$@-]{0,40}",
    ]
}

fn org_document() -> impl Strategy<Value = String> {
    (
        prop::collection::vec(org_line(), 0..30),
        prop_oneof![Just("\n"), Just("\r\n"), Just("\r")],
        any::<bool>(),
    )
        .prop_map(|(lines, eol, trailing)| {
            let mut text = lines.join(eol);
            if trailing {
                text.push_str(eol);
            }
            text
        })
}

proptest! {
    #[test]
    fn objects_tile_arbitrary_text(text in any::<String>()) {
        let objs = objects(&text);
        let rebuilt: String = objs.iter().map(|o| o.range.slice(&text)).collect();
        prop_assert_eq!(rebuilt, text.clone());
        check_objects(&text, &objs, SourceRange::new(0, text.len()));
    }

    #[test]
    fn objects_tile_markup_heavy_text(text in "[a-z *=/_+~\\[\\]<>:0-9^{}()\\\\$@\n.-]{0,80}") {
        let objs = objects(&text);
        let rebuilt: String = objs.iter().map(|o| o.range.slice(&text)).collect();
        prop_assert_eq!(rebuilt, text.clone());
    }

    #[test]
    fn parsing_is_total_and_well_nested(text in org_document()) {
        let doc = parse_org_from_str(None, &text);
        check_document(&text, &doc);
    }

    #[test]
    fn parsing_arbitrary_text_never_panics(text in any::<String>()) {
        let doc = parse_org_from_str(None, &text);
        check_document(&text, &doc);
    }

    #[test]
    fn annotation_is_idempotent(text in org_document()) {
        let mut doc = parse_org_from_str(None, &text);
        annotate_positions(&mut doc, &text);
        let once = doc.clone();
        annotate_positions(&mut doc, &text);
        prop_assert_eq!(&once, &doc);
        check_positions(&PositionTracker::new(&text), &doc);
    }

    #[test]
    fn locations_invert_offsets(text in org_document()) {
        let tracker = PositionTracker::new(&text);
        for (n, span) in tracker.lines().iter().enumerate() {
            for offset in (span.start..span.next.max(span.end + 1)).filter(|o| text.is_char_boundary(*o)) {
                let loc = tracker.location(offset).unwrap();
                prop_assert_eq!(loc.line, n);
                prop_assert_eq!(tracker.offset(loc.line, loc.column), Some(offset));
            }
        }
        prop_assert!(tracker.location(text.len() + 1).is_none());
    }
}

/* ------------------------------ Properties ------------------------------ */

#[test]
fn emphasis_needs_boundaries() {
    assert_eq!(outline("a*b*c", &objects("a*b*c")), vec![(ObjectType::PlainText, "a*b*c")]);
    let text = "(*bold*)";
    assert_eq!(
        outline(text, &objects(text)),
        vec![
            (ObjectType::PlainText, "("),
            (ObjectType::Bold, "*bold*"),
            (ObjectType::PlainText, ")"),
        ]
    );
}

#[test]
fn emphasis_stays_on_one_line() {
    let text = "*foo\nbar*";
    assert_eq!(outline(text, &objects(text)), vec![(ObjectType::PlainText, text)]);
}

#[test]
fn footnote_reference_is_not_a_timestamp() {
    let objs = objects("[fn:1]");
    assert_eq!(objs.len(), 1);
    assert_eq!(objs[0].object_type(), ObjectType::FootnoteReference);
}

#[test]
fn bracket_link_with_description() {
    let text = "[[https://example.com][Example]]";
    let objs = objects(text);
    assert_eq!(objs.len(), 1);
    let ObjectKind::Link(link) = &objs[0].kind else {
        panic!("expected a link, got {:?}", objs[0].kind);
    };
    assert_eq!(link.path, "https://example.com");
    assert_eq!(link.link_type, "https");
    let description: String = link.children.iter().map(|c| c.range.slice(text)).collect();
    assert_eq!(description, "Example");
}

#[test]
fn timestamp_range_is_a_single_object() {
    let objs = objects("<2024-01-15>--<2024-01-17>");
    assert_eq!(objs.len(), 1);
    let ObjectKind::Timestamp(ts) = &objs[0].kind else {
        panic!("expected a timestamp");
    };
    assert_eq!(ts.timestamp_type, TimestampType::ActiveRange);
    assert_eq!(ts.date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    assert_eq!(
        ts.end.as_ref().map(|e| e.date),
        NaiveDate::from_ymd_opt(2024, 1, 17)
    );
}

#[test]
fn plain_links_need_a_word_boundary() {
    let types = |t: &str| objects(t).iter().map(OrgObject::object_type).collect::<Vec<_>>();
    assert!(!types("xref:foo").contains(&ObjectType::Link));
    assert_eq!(types(" ref:foo"), vec![ObjectType::PlainText, ObjectType::Link]);
}

#[test]
fn engine_outside_a_block_is_a_noop() {
    let text = "* Heading\nplain text\n#+BEGIN: columnview\n#+END:\n";
    let doc = parse_org_from_str(None, text);
    let engine = DynamicBlockEngine::new(text, &doc, noon());
    let err = engine.execute_at_line(1).unwrap_err();
    assert_eq!(err, DynamicBlockError::NotInBlock);
    assert!(err.is_noop());
}

#[test]
fn column_view_is_deterministic() {
    let text = "\
* TODO Alpha :a:
:PROPERTIES:
:Effort: 0:30
:END:
** Beta
* DONE Gamma
#+BEGIN: columnview :format \"%ITEM %TODO %Effort %TAGS\"
#+END:
";
    let doc = parse_org_from_str(None, text);
    let engine = DynamicBlockEngine::new(text, &doc, noon());
    let first = engine.execute_at_line(6).unwrap();
    let second = engine.execute_at_line(7).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first.text,
        "\
| ITEM  | TODO | Effort | TAGS |
| Alpha | TODO | 0:30   | :a:  |
| Beta  |      |        |      |
| Gamma | DONE |        |      |
"
    );
}

/* ------------------------------ End to end ------------------------------ */

#[test]
fn headline_with_planning_and_markup() {
    let text = "\
* TODO [#A] Write report :work:urgent:
SCHEDULED: <2024-03-01 Fri>
Some *bold* and /italic/ text with a [[file:notes.org][link]].
";
    let doc = parse_org_from_str(None, text);
    assert!(doc.section.is_none());
    assert_eq!(doc.children.len(), 1);

    let h = &doc.children[0];
    assert_eq!(h.level, 1);
    assert_eq!(h.todo_keyword.as_deref(), Some("TODO"));
    assert_eq!(h.todo_type, Some(TodoType::Todo));
    assert_eq!(h.priority, Some('A'));
    assert_eq!(h.tags, vec!["work", "urgent"]);
    assert_eq!(h.title_text(), "Write report");

    let scheduled = h
        .planning
        .as_ref()
        .and_then(|p| p.scheduled.as_ref())
        .expect("scheduled timestamp");
    assert!(scheduled.is_active());
    assert_eq!(scheduled.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());

    let section = h.section.as_ref().expect("section");
    let paragraph = section
        .elements()
        .iter()
        .find_map(|el| match &el.kind {
            ElementKind::Paragraph { children } => Some(children),
            _ => None,
        })
        .expect("paragraph");
    assert_eq!(
        outline(text, paragraph),
        vec![
            (ObjectType::PlainText, "Some "),
            (ObjectType::Bold, "*bold*"),
            (ObjectType::PlainText, " and "),
            (ObjectType::Italic, "/italic/"),
            (ObjectType::PlainText, " text with a "),
            (ObjectType::Link, "[[file:notes.org][link]]"),
            (ObjectType::PlainText, "."),
        ]
    );
    assert_eq!(plain_text(&paragraph[1..2]), "bold");
    assert_eq!(plain_text(&paragraph[3..4]), "italic");

    let ObjectKind::Link(link) = &paragraph[5].kind else {
        panic!("expected a link");
    };
    assert_eq!(link.link_type, "file");
    assert_eq!(link.path, "notes.org");
    assert_eq!(plain_text(&link.children), "link");
}

#[test]
fn document_survives_json_round_trip() {
    let text = "#+TITLE: Notes\n* TODO Task :x:\nSome =code= here.\n";
    let mut doc = parse_org_from_str(None, text);
    annotate_positions(&mut doc, text);
    let json = serde_json::to_string(&doc).unwrap();
    assert!(json.contains("\"type\":\"code\""));
    let back: OrgDocument = serde_json::from_str(&json).unwrap();
    assert_eq!(back, doc);
}
