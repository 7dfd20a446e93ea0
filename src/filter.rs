use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};
use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::history::HistoryEntry;

const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// One include or exclude pattern.
///
/// `/…/` is a regex searched anywhere in the entry. Text containing glob
/// metacharacters is a glob over the whole entry. Anything else is a
/// literal that matches as a substring.
#[derive(Debug, Clone)]
pub enum Pattern {
    Glob(GlobMatcher),
    Regex(Regex),
}

impl Pattern {
    pub fn parse(raw: &str, case_sensitive: bool) -> Result<Self> {
        if let Some(body) = raw
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
        {
            let regex = RegexBuilder::new(body)
                .case_insensitive(!case_sensitive)
                .build()
                .with_context(|| format!("invalid regex pattern: {raw}"))?;
            debug!(pattern = raw, "regex pattern");
            return Ok(Self::Regex(regex));
        }

        let glob = if raw.contains(GLOB_META) {
            raw.to_string()
        } else {
            format!("*{}*", globset::escape(raw))
        };
        let matcher = GlobBuilder::new(&glob)
            .case_insensitive(!case_sensitive)
            .build()
            .with_context(|| format!("invalid glob pattern: {raw}"))?
            .compile_matcher();
        debug!(pattern = raw, glob, "glob pattern");
        Ok(Self::Glob(matcher))
    }

    pub fn is_match(&self, text: &str) -> bool {
        match self {
            Self::Glob(glob) => glob.is_match(text),
            Self::Regex(regex) => regex.is_match(text),
        }
    }
}

/// Entries must match every include pattern and none of the excludes.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl EntryFilter {
    pub fn new(include: &[String], exclude: &[String], case_sensitive: bool) -> Result<Self> {
        let parse_all = |patterns: &[String]| {
            patterns
                .iter()
                .map(|raw| Pattern::parse(raw, case_sensitive))
                .collect::<Result<Vec<_>>>()
        };
        Ok(Self {
            include: parse_all(include)?,
            exclude: parse_all(exclude)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn matches(&self, entry: &HistoryEntry) -> bool {
        let text = entry.raw_text.as_str();
        self.include.iter().all(|pattern| pattern.is_match(text))
            && !self.exclude.iter().any(|pattern| pattern.is_match(text))
    }
}
