use tracing::{debug, trace};

use crate::history::{HistoryEntry, HistoryStore};
use crate::input::EditCommand;
use crate::matcher::{IncrementalRanker, MatchResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Running,
    Accepted(HistoryEntry),
    Cancelled,
}

/// The live search text and its edit cursor (a char index).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    text: String,
    cursor: usize,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let cursor = text.chars().count();
        Self { text, cursor }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn insert(&mut self, ch: char) {
        insert_char_at(&mut self.text, self.cursor, ch);
        self.cursor += 1;
    }

    fn delete_backward(&mut self) -> bool {
        if self.cursor > 0 && remove_char_at(&mut self.text, self.cursor - 1) {
            self.cursor -= 1;
            return true;
        }
        false
    }

    fn delete_forward(&mut self) -> bool {
        remove_char_at(&mut self.text, self.cursor)
    }

    fn clear(&mut self) -> bool {
        let changed = !self.text.is_empty();
        self.text.clear();
        self.cursor = 0;
        changed
    }

    fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.chars().count());
    }

    fn move_to_start(&mut self) {
        self.cursor = 0;
    }

    fn move_to_end(&mut self) {
        self.cursor = self.text.chars().count();
    }
}

pub struct SessionState {
    store: HistoryStore,
    ranker: IncrementalRanker,
    query: Query,
    ranked_matches: Vec<MatchResult>,
    selected_index: usize,
    viewport_offset: usize,
    visible_rows: usize,
    outcome: Outcome,
}

impl SessionState {
    pub fn new(store: HistoryStore, initial_query: &str, visible_rows: usize) -> Self {
        let mut state = Self {
            store,
            ranker: IncrementalRanker::default(),
            query: Query::new(initial_query),
            ranked_matches: Vec::new(),
            selected_index: 0,
            viewport_offset: 0,
            visible_rows: visible_rows.max(1),
            outcome: Outcome::Running,
        };
        state.rescore();
        state
    }

    /// Applies one command. Terminal states ignore further input.
    pub fn apply(&mut self, command: EditCommand) {
        if !self.is_running() {
            return;
        }
        trace!(?command, "apply");

        match command {
            EditCommand::InsertChar(ch) => {
                self.query.insert(ch);
                self.rescore();
            }
            EditCommand::DeleteCharBackward => {
                let changed = self.query.delete_backward();
                self.query_edited(changed);
            }
            EditCommand::DeleteCharForward => {
                let changed = self.query.delete_forward();
                self.query_edited(changed);
            }
            EditCommand::ClearQuery => {
                let changed = self.query.clear();
                self.query_edited(changed);
            }
            EditCommand::CursorLeft => self.query.move_left(),
            EditCommand::CursorRight => self.query.move_right(),
            EditCommand::CursorStart => self.query.move_to_start(),
            EditCommand::CursorEnd => self.query.move_to_end(),
            EditCommand::MoveSelectionUp => self.move_selection(-1),
            EditCommand::MoveSelectionDown => self.move_selection(1),
            EditCommand::PageUp => self.move_selection(-(self.visible_rows as isize)),
            EditCommand::PageDown => self.move_selection(self.visible_rows as isize),
            EditCommand::Accept => {
                if let Some(entry) = self.selected_entry().cloned() {
                    debug!(sequence_index = entry.sequence_index, "accepted");
                    self.outcome = Outcome::Accepted(entry);
                }
            }
            EditCommand::Cancel => {
                debug!("cancelled");
                self.outcome = Outcome::Cancelled;
            }
            EditCommand::NoOp => {}
        }
    }

    pub fn is_running(&self) -> bool {
        self.outcome == Outcome::Running
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn into_outcome(self) -> Outcome {
        self.outcome
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn ranked_matches(&self) -> &[MatchResult] {
        &self.ranked_matches
    }

    pub fn entry(&self, result: &MatchResult) -> &HistoryEntry {
        &self.store.entries()[result.entry]
    }

    pub fn total_entries(&self) -> usize {
        self.store.len()
    }

    pub fn selected_index(&self) -> usize {
        self.selected_index
    }

    pub fn selected_entry(&self) -> Option<&HistoryEntry> {
        self.ranked_matches
            .get(self.selected_index)
            .map(|result| self.entry(result))
    }

    #[cfg(test)]
    pub fn viewport_offset(&self) -> usize {
        self.viewport_offset
    }

    #[cfg(test)]
    pub fn visible_rows(&self) -> usize {
        self.visible_rows
    }

    /// Called by the renderer with the rows actually available on screen.
    pub fn set_visible_rows(&mut self, rows: usize) {
        self.visible_rows = rows.max(1);
        self.scroll_to_selection();
    }

    /// The slice of matches inside the viewport, paired with their index.
    pub fn visible_matches(&self) -> impl Iterator<Item = (usize, &MatchResult)> {
        self.ranked_matches
            .iter()
            .enumerate()
            .skip(self.viewport_offset)
            .take(self.visible_rows)
    }

    /// Every query edit puts the selection back on the best match; the
    /// ranking is only recomputed when the text actually changed.
    fn query_edited(&mut self, changed: bool) {
        if changed {
            self.rescore();
        } else {
            self.reset_selection();
        }
    }

    fn rescore(&mut self) {
        self.ranked_matches = self.ranker.rank(self.store.entries(), self.query.as_str());
        self.reset_selection();
        debug!(
            query = %self.query.as_str(),
            matches = self.ranked_matches.len(),
            "rescored"
        );
    }

    fn reset_selection(&mut self) {
        self.selected_index = 0;
        self.viewport_offset = 0;
    }

    fn move_selection(&mut self, delta: isize) {
        if self.ranked_matches.is_empty() {
            self.selected_index = 0;
            return;
        }

        let last = self.ranked_matches.len() - 1;
        self.selected_index = self.selected_index.saturating_add_signed(delta).min(last);
        self.scroll_to_selection();
    }

    fn scroll_to_selection(&mut self) {
        if self.selected_index < self.viewport_offset {
            self.viewport_offset = self.selected_index;
        } else if self.selected_index >= self.viewport_offset + self.visible_rows {
            self.viewport_offset = self.selected_index + 1 - self.visible_rows;
        }
    }
}

fn insert_char_at(value: &mut String, char_index: usize, ch: char) {
    let byte_index = byte_index_for_char(value, char_index);
    value.insert(byte_index, ch);
}

fn remove_char_at(value: &mut String, char_index: usize) -> bool {
    let start = byte_index_for_char(value, char_index);
    if start >= value.len() {
        return false;
    }
    let end = byte_index_for_char(value, char_index + 1);
    value.replace_range(start..end, "");
    true
}

fn byte_index_for_char(value: &str, char_index: usize) -> usize {
    value
        .char_indices()
        .nth(char_index)
        .map(|(index, _)| index)
        .unwrap_or(value.len())
}
