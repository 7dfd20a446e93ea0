use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use tracing::{debug, info, trace};

use crate::error::HistfindError;
use crate::filter::EntryFilter;

/// `#<digits>` lines below this value are treated as commands, not
/// timestamps. 2010-01-01 00:00:00 UTC.
const MIN_REASONABLE_UNIXTIME: i64 = 1_262_304_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub raw_text: String,
    /// Position in the source file; higher is more recent.
    pub sequence_index: usize,
    pub timestamp: Option<DateTime<Utc>>,
}

impl HistoryEntry {
    pub fn timestamp_label(&self) -> Option<String> {
        self.timestamp.map(|ts| {
            DateTime::<Local>::from(ts)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
    }
}

/// `<local timestamp>   <command>`, or just the command when the history
/// file carries no timestamp for it.
impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.timestamp_label() {
            Some(label) => write!(f, "{label}   {}", self.raw_text),
            None => f.write_str(&self.raw_text),
        }
    }
}

/// Deduplicated, immutable snapshot of the shell history, ordered by
/// ascending `sequence_index`.
#[derive(Debug, Clone, Default)]
pub struct HistoryStore {
    entries: Vec<HistoryEntry>,
}

impl HistoryStore {
    pub fn load(path: &Path) -> Result<Self, HistfindError> {
        debug!(path = %path.display(), "reading history file");
        let file = File::open(path)
            .map_err(|err| HistfindError::load(path, "cannot open history file", err))?;
        let store = Self::from_reader(file)
            .map_err(|err| HistfindError::load(path, "cannot parse history file", err))?;
        info!(entries = store.len(), "history loaded");
        Ok(store)
    }

    pub fn from_reader(read: impl Read) -> io::Result<Self> {
        Ok(Self::from_parsed(parse_history(read)?))
    }

    /// Builds a store from plain command lines, oldest first.
    #[cfg(test)]
    pub fn from_commands<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_parsed(
            commands
                .into_iter()
                .map(|command| ParsedEntry {
                    text: command.into(),
                    timestamp: None,
                })
                .collect(),
        )
    }

    fn from_parsed(parsed: Vec<ParsedEntry>) -> Self {
        let total = parsed.len();
        let entries = dedup_keep_latest(
            parsed
                .into_iter()
                .enumerate()
                .map(|(sequence_index, entry)| HistoryEntry {
                    raw_text: entry.text,
                    sequence_index,
                    timestamp: entry.timestamp,
                })
                .collect(),
        );
        debug!(total, unique = entries.len(), "deduplicated history");
        Self { entries }
    }

    /// Keeps only the entries `filter` accepts. Runs after dedup, so an
    /// excluded command never brings back an older duplicate.
    pub fn retain_matching(&mut self, filter: &EntryFilter) {
        if filter.is_empty() {
            return;
        }
        let before = self.entries.len();
        self.entries.retain(|entry| filter.matches(entry));
        debug!(removed = before - self.entries.len(), "applied entry filter");
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `$HISTFILE` when set, else `~/.bash_history`.
pub fn default_history_path() -> Option<PathBuf> {
    if let Some(histfile) = std::env::var_os("HISTFILE").filter(|value| !value.is_empty()) {
        return Some(PathBuf::from(histfile));
    }
    dirs::home_dir().map(|home| home.join(".bash_history"))
}

/// Keeps only the most recent occurrence of each text. Input and output are
/// ordered by ascending `sequence_index`.
fn dedup_keep_latest(entries: Vec<HistoryEntry>) -> Vec<HistoryEntry> {
    let mut seen = HashSet::with_capacity(entries.len());
    let mut kept: Vec<HistoryEntry> = entries
        .into_iter()
        .rev()
        .filter(|entry| seen.insert(entry.raw_text.clone()))
        .collect();
    kept.reverse();
    kept
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedEntry {
    text: String,
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// No timestamp seen yet: every line is its own command.
    NoTimestamps,
    LastWasTimestamp,
    LastWasCommand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HistoryLine {
    Timestamp(DateTime<Utc>),
    Command(String),
}

impl HistoryLine {
    fn parse(line: &str) -> Self {
        if let Some(digits) = line.strip_prefix('#') {
            let all_digits = !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit());
            let timestamp = match digits.parse::<i64>() {
                Ok(unixtime) if all_digits && unixtime >= MIN_REASONABLE_UNIXTIME => {
                    DateTime::from_timestamp(unixtime, 0)
                }
                _ => None,
            };
            if let Some(ts) = timestamp {
                return HistoryLine::Timestamp(ts);
            }
        }
        HistoryLine::Command(line.to_string())
    }
}

/// Parses bash history, including the `#<unixtime>` framing written when
/// `HISTTIMEFORMAT` is set. Once the first timestamp appears, every line up
/// to the next timestamp belongs to the same (multi-line) entry.
fn parse_history(read: impl Read) -> io::Result<Vec<ParsedEntry>> {
    let mut parsed = Vec::new();
    let mut state = ParseState::NoTimestamps;
    let mut current_ts = None;
    let mut current_lines: Vec<String> = Vec::new();

    for (index, line) in BufReader::new(read).lines().enumerate() {
        let line_no = index + 1;
        let line =
            line.map_err(|err| io::Error::new(err.kind(), format!("line {line_no}: {err}")))?;
        let line = HistoryLine::parse(&line);
        trace!(line_no, ?state, ?line, "history line");

        state = match (state, line) {
            (ParseState::NoTimestamps, HistoryLine::Command(text)) => {
                push_entry(&mut parsed, text, None);
                ParseState::NoTimestamps
            }
            (ParseState::NoTimestamps, HistoryLine::Timestamp(ts)) => {
                current_ts = Some(ts);
                ParseState::LastWasTimestamp
            }
            (
                ParseState::LastWasTimestamp | ParseState::LastWasCommand,
                HistoryLine::Command(text),
            ) => {
                current_lines.push(text);
                ParseState::LastWasCommand
            }
            (ParseState::LastWasTimestamp, HistoryLine::Timestamp(_)) => {
                debug!(line_no, "ignoring consecutive timestamp line");
                ParseState::LastWasTimestamp
            }
            (ParseState::LastWasCommand, HistoryLine::Timestamp(ts)) => {
                push_entry(&mut parsed, current_lines.join("\n"), current_ts);
                current_lines.clear();
                current_ts = Some(ts);
                ParseState::LastWasTimestamp
            }
        };
    }

    if state == ParseState::LastWasCommand {
        push_entry(&mut parsed, current_lines.join("\n"), current_ts);
    }

    Ok(parsed)
}

fn push_entry(parsed: &mut Vec<ParsedEntry>, text: String, timestamp: Option<DateTime<Utc>>) {
    if text.trim().is_empty() {
        return;
    }
    parsed.push(ParsedEntry { text, timestamp });
}
