//! Element/object taxonomy.
//!
//! Every node carries a half-open byte `range` into the source it was parsed from,
//! a `post_blank` count, and an optional line/column `position` filled in by
//! [`crate::position::annotate_positions`].
//!
//! Block-level constructs are [`OrgElement`]s, inline constructs are [`OrgObject`]s.
//! Headlines form their own tree ([`Headline`]) hanging off the [`OrgDocument`] root.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::path::PathBuf;

/* ------------------------------ Coordinates ------------------------------ */

/// Half-open byte interval `[start, end)` into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct SourceRange {
    pub start: usize,
    pub end: usize,
}

impl SourceRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "range start {start} past end {end}");
        Self { start, end }
    }

    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True when `offset` lies inside the range (end-exclusive).
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}

/// A single point in line/column form. Lines and columns are 0-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

/// Line/column form of a [`SourceRange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub start: Location,
    pub end: Location,
}

/* ------------------------------- Objects ------------------------------- */

/// Discriminator for inline objects, used by allow-lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectType {
    PlainText,
    Bold,
    Italic,
    Underline,
    StrikeThrough,
    Code,
    Verbatim,
    Link,
    Timestamp,
    Entity,
    LatexFragment,
    Subscript,
    Superscript,
    FootnoteReference,
    Target,
    RadioTarget,
    StatisticsCookie,
    LineBreak,
    InlineSrcBlock,
    InlineBabelCall,
    ExportSnippet,
    Macro,
    TableCell,
}

impl ObjectType {
    /// Every type the object parser can emit from free text.
    pub const ALL: &'static [ObjectType] = &[
        ObjectType::Bold,
        ObjectType::Italic,
        ObjectType::Underline,
        ObjectType::StrikeThrough,
        ObjectType::Code,
        ObjectType::Verbatim,
        ObjectType::Link,
        ObjectType::Timestamp,
        ObjectType::Entity,
        ObjectType::LatexFragment,
        ObjectType::Subscript,
        ObjectType::Superscript,
        ObjectType::FootnoteReference,
        ObjectType::Target,
        ObjectType::RadioTarget,
        ObjectType::StatisticsCookie,
        ObjectType::LineBreak,
        ObjectType::InlineSrcBlock,
        ObjectType::InlineBabelCall,
        ObjectType::ExportSnippet,
        ObjectType::Macro,
    ];
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgObject {
    #[serde(flatten)]
    pub kind: ObjectKind,
    pub range: SourceRange,
    /// Blanks (spaces and tabs) right after the object. They are not part of
    /// `range`; the following plain-text run owns them.
    #[serde(default)]
    pub post_blank: usize,
    pub position: Option<Position>,
}

impl OrgObject {
    pub fn new(kind: ObjectKind, range: SourceRange) -> Self {
        Self {
            kind,
            range,
            post_blank: 0,
            position: None,
        }
    }

    pub fn object_type(&self) -> ObjectType {
        self.kind.object_type()
    }

    /// Nested objects, empty for leaves.
    pub fn children(&self) -> &[OrgObject] {
        match &self.kind {
            ObjectKind::Bold { children }
            | ObjectKind::Italic { children }
            | ObjectKind::Underline { children }
            | ObjectKind::StrikeThrough { children }
            | ObjectKind::Subscript { children, .. }
            | ObjectKind::Superscript { children, .. }
            | ObjectKind::FootnoteReference { children, .. }
            | ObjectKind::RadioTarget { children, .. }
            | ObjectKind::TableCell { children } => children,
            ObjectKind::Link(link) => &link.children,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<OrgObject>> {
        match &mut self.kind {
            ObjectKind::Bold { children }
            | ObjectKind::Italic { children }
            | ObjectKind::Underline { children }
            | ObjectKind::StrikeThrough { children }
            | ObjectKind::Subscript { children, .. }
            | ObjectKind::Superscript { children, .. }
            | ObjectKind::FootnoteReference { children, .. }
            | ObjectKind::RadioTarget { children, .. }
            | ObjectKind::TableCell { children } => Some(children),
            ObjectKind::Link(link) => Some(&mut link.children),
            _ => None,
        }
    }
}

#[skip_serializing_none]
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ObjectKind {
    PlainText {
        value: String,
    },
    Bold {
        children: Vec<OrgObject>,
    },
    Italic {
        children: Vec<OrgObject>,
    },
    Underline {
        children: Vec<OrgObject>,
    },
    StrikeThrough {
        children: Vec<OrgObject>,
    },
    /// `=code=`; the value is kept verbatim, never parsed or unescaped.
    Code {
        value: String,
    },
    /// `~verbatim~`; the value is kept verbatim, never parsed or unescaped.
    Verbatim {
        value: String,
    },
    Link(Link),
    Timestamp(Timestamp),
    Entity {
        name: String,
        use_brackets: bool,
        latex: String,
        latex_math: bool,
        html: String,
        utf8: String,
    },
    LatexFragment {
        value: String,
    },
    Subscript {
        use_braces: bool,
        children: Vec<OrgObject>,
    },
    Superscript {
        use_braces: bool,
        children: Vec<OrgObject>,
    },
    FootnoteReference {
        label: Option<String>,
        reference_type: FootnoteReferenceType,
        children: Vec<OrgObject>,
    },
    Target {
        value: String,
    },
    RadioTarget {
        value: String,
        children: Vec<OrgObject>,
    },
    StatisticsCookie {
        value: String,
    },
    LineBreak,
    InlineSrcBlock {
        language: String,
        parameters: Option<String>,
        value: String,
    },
    InlineBabelCall {
        call: String,
        inside_header: Option<String>,
        arguments: Option<String>,
        end_header: Option<String>,
    },
    ExportSnippet {
        back_end: String,
        value: String,
    },
    Macro {
        key: String,
        args: Vec<String>,
    },
    TableCell {
        children: Vec<OrgObject>,
    },
}

impl ObjectKind {
    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectKind::PlainText { .. } => ObjectType::PlainText,
            ObjectKind::Bold { .. } => ObjectType::Bold,
            ObjectKind::Italic { .. } => ObjectType::Italic,
            ObjectKind::Underline { .. } => ObjectType::Underline,
            ObjectKind::StrikeThrough { .. } => ObjectType::StrikeThrough,
            ObjectKind::Code { .. } => ObjectType::Code,
            ObjectKind::Verbatim { .. } => ObjectType::Verbatim,
            ObjectKind::Link(_) => ObjectType::Link,
            ObjectKind::Timestamp(_) => ObjectType::Timestamp,
            ObjectKind::Entity { .. } => ObjectType::Entity,
            ObjectKind::LatexFragment { .. } => ObjectType::LatexFragment,
            ObjectKind::Subscript { .. } => ObjectType::Subscript,
            ObjectKind::Superscript { .. } => ObjectType::Superscript,
            ObjectKind::FootnoteReference { .. } => ObjectType::FootnoteReference,
            ObjectKind::Target { .. } => ObjectType::Target,
            ObjectKind::RadioTarget { .. } => ObjectType::RadioTarget,
            ObjectKind::StatisticsCookie { .. } => ObjectType::StatisticsCookie,
            ObjectKind::LineBreak => ObjectType::LineBreak,
            ObjectKind::InlineSrcBlock { .. } => ObjectType::InlineSrcBlock,
            ObjectKind::InlineBabelCall { .. } => ObjectType::InlineBabelCall,
            ObjectKind::ExportSnippet { .. } => ObjectType::ExportSnippet,
            ObjectKind::Macro { .. } => ObjectType::Macro,
            ObjectKind::TableCell { .. } => ObjectType::TableCell,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FootnoteReferenceType {
    Standard,
    Inline,
}

/// How the link was written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkFormat {
    /// `[[target][description]]`
    Bracket,
    /// `type:path` in running text
    Plain,
    /// `<type:path>`
    Angle,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// `https`, `file`, `cite`, `fuzzy`, `custom-id`, ...
    pub link_type: String,
    pub path: String,
    pub raw_link: String,
    pub format: LinkFormat,
    pub search_option: Option<String>,
    /// Description objects; empty when the link has no description.
    #[serde(default)]
    pub children: Vec<OrgObject>,
}

/* ------------------------------ Timestamps ------------------------------ */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimestampType {
    Active,
    Inactive,
    ActiveRange,
    InactiveRange,
}

/// An active `<...>` or inactive `[...]` timestamp, optionally a range.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    pub timestamp_type: TimestampType,
    pub raw_value: String,

    /// Start date; `time` is None for all-day timestamps.
    pub date: NaiveDate,
    pub day_name: Option<String>,
    pub time: Option<NaiveTime>,

    /// Range end: either `<a>--<b>` or a time range inside one timestamp.
    pub end: Option<TimestampEnd>,

    /// Optional repeater cookie (`+1w`, `++1m`, `.+2d`).
    pub repeater: Option<Repeater>,

    /// Optional warning cookie (`-2d`, `--1w`).
    pub warning: Option<Warning>,
}

impl Timestamp {
    pub fn is_active(&self) -> bool {
        matches!(
            self.timestamp_type,
            TimestampType::Active | TimestampType::ActiveRange
        )
    }

    pub fn is_range(&self) -> bool {
        matches!(
            self.timestamp_type,
            TimestampType::ActiveRange | TimestampType::InactiveRange
        )
    }

    /// Start as a datetime; all-day timestamps start at midnight.
    pub fn start_datetime(&self) -> NaiveDateTime {
        NaiveDateTime::new(self.date, self.time.unwrap_or(NaiveTime::MIN))
    }

    pub fn end_datetime(&self) -> Option<NaiveDateTime> {
        self.end.as_ref().map(|e| {
            NaiveDateTime::new(e.date, e.time.unwrap_or(NaiveTime::MIN))
        })
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampEnd {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeUnit {
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl TimeUnit {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'h' => Some(TimeUnit::Hour),
            'd' => Some(TimeUnit::Day),
            'w' => Some(TimeUnit::Week),
            'm' => Some(TimeUnit::Month),
            'y' => Some(TimeUnit::Year),
            _ => None,
        }
    }
}

/// `+` (cumulate), `++` (catch-up), `.+` (restart).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepeaterKind {
    Cumulate,
    CatchUp,
    Restart,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repeater {
    pub kind: RepeaterKind,
    pub value: u32,
    pub unit: TimeUnit,
}

/// `-` warns for every occurrence, `--` only for the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningKind {
    All,
    First,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub value: u32,
    pub unit: TimeUnit,
}

/// Planning line(s): SCHEDULED, DEADLINE, CLOSED.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Planning {
    pub scheduled: Option<Timestamp>,
    pub deadline: Option<Timestamp>,
    pub closed: Option<Timestamp>,
}

/* ------------------------------- Elements ------------------------------- */

/// `#+KEY:` lines attached to the element that follows them.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AffiliatedKeywords {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub caption: Vec<Vec<OrgObject>>,
    pub name: Option<String>,
    /// `#+ATTR_<BACKEND>:` values keyed by lowercase backend.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub header: Vec<String>,
    pub results: Option<String>,
    pub plot: Option<String>,
}

impl AffiliatedKeywords {
    pub fn is_empty(&self) -> bool {
        self.caption.is_empty()
            && self.name.is_none()
            && self.attributes.is_empty()
            && self.header.is_empty()
            && self.results.is_none()
            && self.plot.is_none()
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgElement {
    #[serde(flatten)]
    pub kind: ElementKind,
    pub range: SourceRange,
    /// Blank lines at the end of `range`.
    #[serde(default)]
    pub post_blank: usize,
    #[serde(default, skip_serializing_if = "AffiliatedKeywords::is_empty")]
    pub affiliated: AffiliatedKeywords,
    pub position: Option<Position>,
}

impl OrgElement {
    pub fn new(kind: ElementKind, range: SourceRange) -> Self {
        Self {
            kind,
            range,
            post_blank: 0,
            affiliated: AffiliatedKeywords::default(),
            position: None,
        }
    }

    /// Child elements of greater elements; empty for lesser elements.
    pub fn elements(&self) -> &[OrgElement] {
        match &self.kind {
            ElementKind::Section { children }
            | ElementKind::PlainList { children, .. }
            | ElementKind::Item { children, .. }
            | ElementKind::Drawer { children, .. }
            | ElementKind::QuoteBlock { children }
            | ElementKind::CenterBlock { children }
            | ElementKind::SpecialBlock { children, .. }
            | ElementKind::DynamicBlock { children, .. }
            | ElementKind::FootnoteDefinition { children, .. }
            | ElementKind::Table { children, .. } => children,
            ElementKind::InlineTask(task) => &task.children,
            _ => &[],
        }
    }

    pub fn elements_mut(&mut self) -> Option<&mut Vec<OrgElement>> {
        match &mut self.kind {
            ElementKind::Section { children }
            | ElementKind::PlainList { children, .. }
            | ElementKind::Item { children, .. }
            | ElementKind::Drawer { children, .. }
            | ElementKind::QuoteBlock { children }
            | ElementKind::CenterBlock { children }
            | ElementKind::SpecialBlock { children, .. }
            | ElementKind::DynamicBlock { children, .. }
            | ElementKind::FootnoteDefinition { children, .. }
            | ElementKind::Table { children, .. } => Some(children),
            ElementKind::InlineTask(task) => Some(&mut task.children),
            _ => None,
        }
    }

    /// Object sequences held directly by this element (not by child elements).
    pub fn objects_mut(&mut self) -> Vec<&mut Vec<OrgObject>> {
        let mut out: Vec<&mut Vec<OrgObject>> =
            self.affiliated.caption.iter_mut().collect::<Vec<_>>();
        match &mut self.kind {
            ElementKind::Paragraph { children }
            | ElementKind::VerseBlock { children }
            | ElementKind::TableRow { children, .. } => out.push(children),
            ElementKind::Item { tag: Some(tag), .. } => out.push(tag),
            ElementKind::InlineTask(task) => out.push(&mut task.title),
            _ => {}
        }
        out
    }

    /// Depth-first walk over this element and every nested element.
    pub fn walk<'a>(&'a self, out: &mut Vec<&'a OrgElement>) {
        out.push(self);
        for child in self.elements() {
            child.walk(out);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListType {
    Unordered,
    Ordered,
    Descriptive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Checkbox {
    Off,     // [ ]
    Trans,   // [-]
    On,      // [X]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TableType {
    Org,
    TableEl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TableRowType {
    Standard,
    Rule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClockStatus {
    Running,
    Closed,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    pub value: Timestamp,
    /// The `=> H:MM` cookie as written.
    pub duration: Option<String>,
    pub status: ClockStatus,
}

impl Clock {
    /// Logged minutes: the interval when closed, else the `=>` cookie.
    pub fn minutes(&self) -> Option<i64> {
        if let (ClockStatus::Closed, Some(end)) = (self.status, self.value.end_datetime()) {
            return Some((end - self.value.start_datetime()).num_minutes().max(0));
        }
        let (hours, mins) = self.duration.as_deref()?.trim().split_once(':')?;
        Some(hours.trim().parse::<i64>().ok()? * 60 + mins.trim().parse::<i64>().ok()?)
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineTask {
    pub level: usize,
    pub todo_keyword: Option<String>,
    pub todo_type: Option<TodoType>,
    pub priority: Option<char>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub raw_value: String,
    #[serde(default)]
    pub title: Vec<OrgObject>,
    #[serde(default)]
    pub children: Vec<OrgElement>,
}

#[skip_serializing_none]
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ElementKind {
    /* greater elements */
    Section {
        children: Vec<OrgElement>,
    },
    PlainList {
        list_type: ListType,
        children: Vec<OrgElement>,
    },
    Item {
        bullet: String,
        checkbox: Option<Checkbox>,
        counter: Option<u32>,
        tag: Option<Vec<OrgObject>>,
        children: Vec<OrgElement>,
    },
    Drawer {
        drawer_name: String,
        children: Vec<OrgElement>,
    },
    PropertyDrawer {
        properties: IndexMap<String, String>,
    },
    QuoteBlock {
        children: Vec<OrgElement>,
    },
    CenterBlock {
        children: Vec<OrgElement>,
    },
    SpecialBlock {
        block_type: String,
        parameters: Option<String>,
        children: Vec<OrgElement>,
    },
    DynamicBlock {
        block_name: String,
        arguments: Option<String>,
        children: Vec<OrgElement>,
    },
    FootnoteDefinition {
        label: String,
        children: Vec<OrgElement>,
    },
    InlineTask(Box<InlineTask>),

    /* lesser elements */
    Paragraph {
        children: Vec<OrgObject>,
    },
    Table {
        table_type: TableType,
        /// `table-row` elements; empty for table.el tables.
        children: Vec<OrgElement>,
        formulas: Vec<String>,
        /// Raw text for table.el tables.
        value: Option<String>,
    },
    TableRow {
        row_type: TableRowType,
        /// `table-cell` objects.
        children: Vec<OrgObject>,
    },
    SrcBlock {
        language: Option<String>,
        switches: Option<String>,
        parameters: Option<String>,
        value: String,
    },
    ExampleBlock {
        switches: Option<String>,
        value: String,
    },
    ExportBlock {
        back_end: String,
        value: String,
    },
    CommentBlock {
        value: String,
    },
    VerseBlock {
        children: Vec<OrgObject>,
    },
    Keyword {
        key: String,
        value: String,
    },
    Comment {
        value: String,
    },
    FixedWidth {
        value: String,
    },
    Planning(Planning),
    Clock(Clock),
    HorizontalRule,
    BabelCall {
        call: String,
        inside_header: Option<String>,
        arguments: Option<String>,
        end_header: Option<String>,
        value: String,
    },
    LatexEnvironment {
        value: String,
    },
}

/* ------------------------------ Headlines ------------------------------ */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TodoType {
    Todo,
    Done,
}

/// A headline with its section and child subtrees.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headline {
    /// Number of leading stars, at least 1.
    pub level: usize,
    pub todo_keyword: Option<String>,
    pub todo_type: Option<TodoType>,
    pub priority: Option<char>,
    #[serde(default)]
    pub commented: bool,
    #[serde(default)]
    pub archived: bool,
    /// Tags in order of first occurrence.
    #[serde(default)]
    pub tags: Vec<String>,
    pub raw_value: String,
    #[serde(default)]
    pub title: Vec<OrgObject>,
    pub planning: Option<Planning>,
    /// Property drawer directly under the headline (after planning).
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, String>,
    pub section: Option<OrgElement>,
    #[serde(default)]
    pub children: Vec<Headline>,
    /// Whole subtree, headline line included.
    pub range: SourceRange,
    #[serde(default)]
    pub post_blank: usize,
    pub position: Option<Position>,
}

impl Headline {
    pub fn new(level: usize, raw_value: String, range: SourceRange) -> Self {
        Self {
            level,
            todo_keyword: None,
            todo_type: None,
            priority: None,
            commented: false,
            archived: false,
            tags: vec![],
            raw_value,
            title: vec![],
            planning: None,
            properties: IndexMap::new(),
            section: None,
            children: vec![],
            range,
            post_blank: 0,
            position: None,
        }
    }

    /// Property lookup, case-insensitive on the key.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// `ID` property, falling back to `CUSTOM_ID`.
    pub fn id(&self) -> Option<&str> {
        self.property("ID").or_else(|| self.property("CUSTOM_ID"))
    }

    pub fn title_text(&self) -> String {
        plain_text(&self.title)
    }

    /// Clock entries logged directly under this headline (not its children).
    pub fn clocks(&self) -> Vec<&Clock> {
        let mut elements = Vec::new();
        if let Some(section) = &self.section {
            section.walk(&mut elements);
        }
        elements
            .into_iter()
            .filter_map(|e| match &e.kind {
                ElementKind::Clock(clock) => Some(clock),
                _ => None,
            })
            .collect()
    }

    /// Pre-order walk over this headline and its descendants.
    pub fn walk<'a>(&'a self, out: &mut Vec<&'a Headline>) {
        out.push(self);
        for c in &self.children {
            c.walk(out);
        }
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Headline> {
        if self.id() == Some(id) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_by_id(id))
    }
}

/* ------------------------------- Document ------------------------------- */

/// Parse root.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgDocument {
    /// Optional filesystem path if the document originates from disk.
    pub path: Option<PathBuf>,
    /// Single-valued `#+KEY:` settings (uppercase keys, last one wins).
    #[serde(default)]
    pub keywords: IndexMap<String, String>,
    /// Multi-valued `#+KEY:` settings such as `LATEX_HEADER`.
    #[serde(default)]
    pub keyword_lists: IndexMap<String, Vec<String>>,
    /// Content before the first headline.
    pub section: Option<OrgElement>,
    #[serde(default)]
    pub children: Vec<Headline>,
    pub range: SourceRange,
    pub position: Option<Position>,
}

impl OrgDocument {
    pub fn new(path: Option<PathBuf>, range: SourceRange) -> Self {
        Self {
            path,
            keywords: IndexMap::new(),
            keyword_lists: IndexMap::new(),
            section: None,
            children: vec![],
            range,
            position: None,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.keywords.get("TITLE").map(String::as_str)
    }

    /// `#+FILETAGS:` split into tags.
    pub fn file_tags(&self) -> Vec<String> {
        self.keywords
            .get("FILETAGS")
            .map(|v| {
                v.split([':', ' '])
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every headline in document order.
    pub fn headlines(&self) -> Vec<&Headline> {
        let mut out = Vec::new();
        for h in &self.children {
            h.walk(&mut out);
        }
        out
    }

    pub fn find_headline_by_id(&self, id: &str) -> Option<&Headline> {
        self.children.iter().find_map(|h| h.find_by_id(id))
    }

    /// Deepest headline whose subtree contains `offset`.
    pub fn headline_at(&self, offset: usize) -> Option<&Headline> {
        let mut current = self.children.iter().find(|h| h.range.contains(offset))?;
        while let Some(child) = current.children.iter().find(|h| h.range.contains(offset)) {
            current = child;
        }
        Some(current)
    }
}

/* ----------------------- Utility: plain text rendering ----------------------- */

/// Render a plain-text approximation of an object sequence (titles, cells).
pub fn plain_text(objects: &[OrgObject]) -> String {
    fn rec(xs: &[OrgObject], out: &mut String) {
        for x in xs {
            match &x.kind {
                ObjectKind::PlainText { value }
                | ObjectKind::Code { value }
                | ObjectKind::Verbatim { value }
                | ObjectKind::LatexFragment { value }
                | ObjectKind::Target { value }
                | ObjectKind::StatisticsCookie { value } => out.push_str(value),
                ObjectKind::Link(link) if link.children.is_empty() => out.push_str(&link.raw_link),
                ObjectKind::Entity { utf8, .. } => out.push_str(utf8),
                ObjectKind::Timestamp(ts) => out.push_str(&ts.raw_value),
                ObjectKind::InlineSrcBlock { value, .. } => out.push_str(value),
                ObjectKind::ExportSnippet { .. }
                | ObjectKind::InlineBabelCall { .. }
                | ObjectKind::Macro { .. } => {}
                ObjectKind::LineBreak => out.push('\n'),
                ObjectKind::FootnoteReference { .. } => {}
                _ => rec(x.children(), out),
            }
        }
    }
    let mut s = String::new();
    rec(objects, &mut s);
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str, start: usize) -> OrgObject {
        OrgObject::new(
            ObjectKind::PlainText { value: s.into() },
            SourceRange::new(start, start + s.len()),
        )
    }

    #[test]
    fn plain_text_flattens_nested_markup() {
        let bold = OrgObject::new(
            ObjectKind::Bold {
                children: vec![text("bold", 6)],
            },
            SourceRange::new(5, 11),
        );
        let objects = vec![text("Some ", 0), bold, text(" text", 11)];
        assert_eq!(plain_text(&objects), "Some bold text");
    }

    #[test]
    fn clock_minutes_prefers_interval_over_cookie() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let clock = Clock {
            value: Timestamp {
                timestamp_type: TimestampType::InactiveRange,
                raw_value: String::new(),
                date,
                day_name: None,
                time: NaiveTime::from_hms_opt(9, 0, 0),
                end: Some(TimestampEnd {
                    date,
                    time: NaiveTime::from_hms_opt(10, 30, 0),
                }),
                repeater: None,
                warning: None,
            },
            duration: Some("9:99".into()),
            status: ClockStatus::Closed,
        };
        assert_eq!(clock.minutes(), Some(90));
    }

    #[test]
    fn object_kind_serializes_with_type_tag() {
        let obj = text("hi", 0);
        let json = serde_json::to_value(&obj).unwrap();
        assert_eq!(json["type"], "plain-text");
        assert_eq!(json["value"], "hi");
        assert!(json.get("position").is_none());
    }
}
