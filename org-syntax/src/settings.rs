//! Parse-time configuration.

use crate::core::{ObjectType, TodoType};
use serde::{Deserialize, Serialize};

/* ----------------------------- Parse settings ----------------------------- */

/// Settings that influence parsing. Buffer-local `#+TODO:` lines are merged in by the parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseSettings {
    /// Ordered TODO sequences.
    /// Example: [["TODO","NEXT","WAIT","|","DONE","CANCELLED"]]
    pub todo_sequences: Vec<TodoSequence>,

    /// `#+KEY:` names collected into the document keyword-list map instead of the single-valued map.
    pub multi_valued_keywords: Vec<String>,

    pub objects: ObjectOptions,
}

impl Default for ParseSettings {
    fn default() -> Self {
        Self {
            todo_sequences: vec![TodoSequence::from_words("TODO | DONE")],
            multi_valued_keywords: [
                "LATEX_HEADER",
                "LATEX_HEADER_EXTRA",
                "HTML_HEAD",
                "HTML_HEAD_EXTRA",
                "BIBLIOGRAPHY",
                "CITE_EXPORT",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            objects: ObjectOptions::default(),
        }
    }
}

impl ParseSettings {
    /// Classify a headline's first word. `None` when it is not a configured keyword.
    pub fn todo_type_of(&self, word: &str) -> Option<TodoType> {
        self.todo_sequences.iter().find_map(|s| s.todo_type_of(word))
    }

    pub fn is_multi_valued(&self, key: &str) -> bool {
        self.multi_valued_keywords
            .iter()
            .any(|k| k.eq_ignore_ascii_case(key))
    }
}

/// TODO sequence definition; `|` splits undone/done sets in Org.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoSequence {
    /// The sequence items in order; include a literal "|" to mark divider.
    pub items: Vec<String>,
}

impl TodoSequence {
    /// Build from a `#+TODO:` value such as `TODO NEXT | DONE(d) CANCELLED(c@)`.
    /// Fast-access suffixes in parentheses are dropped.
    pub fn from_words(value: &str) -> Self {
        let items = value
            .split_whitespace()
            .map(|w| match w.find('(') {
                Some(i) if i > 0 && w.ends_with(')') => w[..i].to_string(),
                _ => w.to_string(),
            })
            .collect();
        Self { items }
    }

    /// With no divider the last keyword is the only done state.
    pub fn todo_type_of(&self, word: &str) -> Option<TodoType> {
        let divider = self.items.iter().position(|w| w == "|");
        let index = self.items.iter().position(|w| w == word && w != "|")?;
        let done = match divider {
            Some(d) => index > d,
            None => index + 1 == self.items.len(),
        };
        Some(if done { TodoType::Done } else { TodoType::Todo })
    }
}

/* ----------------------------- Object options ----------------------------- */

/// Controls what the inline object parser may produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectOptions {
    /// Allow-list of object types; `None` allows everything.
    pub restrict: Option<Vec<ObjectType>>,
    /// When false, container interiors are kept as one plain-text object.
    pub parse_nested: bool,
}

impl Default for ObjectOptions {
    fn default() -> Self {
        Self {
            restrict: None,
            parse_nested: true,
        }
    }
}

impl ObjectOptions {
    pub fn only(types: &[ObjectType]) -> Self {
        Self {
            restrict: Some(types.to_vec()),
            parse_nested: true,
        }
    }

    pub fn allows(&self, t: ObjectType) -> bool {
        self.restrict.as_ref().is_none_or(|r| r.contains(&t))
    }

    /// Same options with `t` removed from the allow-list.
    pub fn without(&self, t: ObjectType) -> Self {
        let base: Vec<ObjectType> = match &self.restrict {
            Some(r) => r.clone(),
            None => ObjectType::ALL.to_vec(),
        };
        Self {
            restrict: Some(base.into_iter().filter(|x| *x != t).collect()),
            parse_nested: self.parse_nested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divider_splits_todo_and_done() {
        let seq = TodoSequence::from_words("TODO NEXT(n) | DONE(d!) CANCELLED");
        assert_eq!(seq.items, vec!["TODO", "NEXT", "|", "DONE", "CANCELLED"]);
        assert_eq!(seq.todo_type_of("NEXT"), Some(TodoType::Todo));
        assert_eq!(seq.todo_type_of("CANCELLED"), Some(TodoType::Done));
        assert_eq!(seq.todo_type_of("|"), None);
        assert_eq!(seq.todo_type_of("WAIT"), None);
    }

    #[test]
    fn last_keyword_is_done_without_divider() {
        let seq = TodoSequence::from_words("OPEN REVIEW CLOSED");
        assert_eq!(seq.todo_type_of("REVIEW"), Some(TodoType::Todo));
        assert_eq!(seq.todo_type_of("CLOSED"), Some(TodoType::Done));
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let s: ParseSettings = serde_json::from_str(r#"{"objects":{"parse_nested":false}}"#).unwrap();
        assert_eq!(s.todo_type_of("DONE"), Some(TodoType::Done));
        assert!(s.is_multi_valued("latex_header"));
        assert!(!s.objects.parse_nested);
        assert!(s.objects.allows(ObjectType::Bold));
    }

    #[test]
    fn without_removes_one_type() {
        let opts = ObjectOptions::default().without(ObjectType::Link);
        assert!(!opts.allows(ObjectType::Link));
        assert!(opts.allows(ObjectType::Bold));
    }
}
