//! Org markup parsing engine.
//!
//! Text in, typed tree out: the element parser splits a buffer into headlines and
//! sections, the object parser handles inline markup, the position tracker maps
//! byte offsets to line/column, and the dynamic block engine regenerates
//! `columnview` and `clocktable` bodies from the parsed tree.

pub mod core;
pub mod dblock;
pub mod entities;
pub mod parser;
pub mod position;
pub mod settings;

pub mod storage {
    use super::core::OrgDocument;
    use anyhow::Result;
    use std::path::Path;

    /// Parsing a file from disk is kept apart from parsing text, so callers can
    /// swap in caching or remote sources.
    pub trait OrgParser {
        fn parse_file(&self, abs_path: &Path) -> Result<OrgDocument>;
    }
}

pub use dblock::{BlockReplacement, DynamicBlockEngine, DynamicBlockError};
pub use parser::{NomOrgParser, parse_org_from_str, parse_org_with_settings};
pub use position::{PositionTracker, annotate_positions};
pub use settings::ParseSettings;
