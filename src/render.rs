use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{List, ListItem, Paragraph};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::matcher::{MatchResult, MatchSpan};
use crate::session::SessionState;

/// Lines the UI needs besides the result rows: status and query.
pub const CHROME_HEIGHT: u16 = 2;
const PROMPT: &str = "> ";

const SELECTED_STYLE: Style = Style::new()
    .bg(Color::Rgb(42, 88, 116))
    .fg(Color::White)
    .add_modifier(Modifier::BOLD);
const MATCH_STYLE: Style = Style::new()
    .fg(Color::Yellow)
    .add_modifier(Modifier::BOLD);
const TIMESTAMP_STYLE: Style = Style::new().fg(Color::DarkGray);
const PROMPT_STYLE: Style = Style::new()
    .fg(Color::LightCyan)
    .add_modifier(Modifier::BOLD);

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    pub show_timestamps: bool,
}

pub fn draw_ui(frame: &mut Frame, state: &mut SessionState, options: RenderOptions) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    state.set_visible_rows(chunks[0].height as usize);

    draw_matches(frame, state, options, chunks[0]);
    draw_status_bar(frame, state, chunks[1]);
    draw_query_line(frame, state, chunks[2]);
}

fn draw_matches(frame: &mut Frame, state: &SessionState, options: RenderOptions, area: Rect) {
    if state.ranked_matches().is_empty() {
        let empty = Paragraph::new("No matching history entries")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem<'_>> = state
        .visible_matches()
        .map(|(index, result)| {
            let selected = index == state.selected_index();
            match_row(state, result, selected, options)
        })
        .collect();

    frame.render_widget(List::new(items), area);
}

fn match_row(
    state: &SessionState,
    result: &MatchResult,
    selected: bool,
    options: RenderOptions,
) -> ListItem<'static> {
    let entry = state.entry(result);
    let marker = if selected { "▸ " } else { "  " };
    let mut spans = vec![Span::raw(marker)];

    if options.show_timestamps {
        if let Some(label) = entry.timestamp_label() {
            spans.push(Span::styled(format!("{label} "), TIMESTAMP_STYLE));
        }
    }
    spans.extend(highlight_text(&entry.raw_text, &result.match_spans));

    let item = ListItem::new(Line::from(spans));
    if selected {
        item.style(SELECTED_STYLE)
    } else {
        item
    }
}

/// Splits `text` into styled runs, marking characters covered by `spans`.
/// Newlines render as `↵` so multi-line entries stay on one row.
fn highlight_text(text: &str, spans: &[MatchSpan]) -> Vec<Span<'static>> {
    let mut runs = Vec::new();
    let mut buffer = String::new();
    let mut buffer_matched = false;
    let mut pending = spans.iter().peekable();

    for (index, ch) in text.chars().enumerate() {
        while pending
            .peek()
            .is_some_and(|span| span.start + span.len <= index)
        {
            pending.next();
        }
        let matched = pending.peek().is_some_and(|span| span.start <= index);

        if matched != buffer_matched && !buffer.is_empty() {
            runs.push(styled_run(std::mem::take(&mut buffer), buffer_matched));
        }
        buffer_matched = matched;
        buffer.push(display_char(ch));
    }

    if !buffer.is_empty() {
        runs.push(styled_run(buffer, buffer_matched));
    }
    runs
}

fn styled_run(text: String, matched: bool) -> Span<'static> {
    if matched {
        Span::styled(text, MATCH_STYLE)
    } else {
        Span::raw(text)
    }
}

fn display_char(ch: char) -> char {
    match ch {
        '\n' => '↵',
        ch if ch.is_control() => ' ',
        ch => ch,
    }
}

fn draw_status_bar(frame: &mut Frame, state: &SessionState, area: Rect) {
    let text = format!(
        "  {}/{}  Enter accept · Esc cancel · ↑/↓ select",
        state.ranked_matches().len(),
        state.total_entries()
    );
    frame.render_widget(
        Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
        area,
    );
}

fn draw_query_line(frame: &mut Frame, state: &SessionState, area: Rect) {
    let query = state.query();
    let available = usize::from(area.width).saturating_sub(PROMPT.width());
    let (visible, cursor_column) = query_window(query.as_str(), query.cursor(), available);

    let line = Line::from(vec![
        Span::styled(PROMPT, PROMPT_STYLE),
        Span::styled(visible.to_string(), Style::default().fg(Color::White)),
    ]);
    frame.render_widget(Paragraph::new(line), area);

    let offset = u16::try_from(PROMPT.width() + cursor_column).unwrap_or(u16::MAX);
    let x = area
        .x
        .saturating_add(offset)
        .min(area.right().saturating_sub(1));
    frame.set_cursor_position((x, area.y));
}

/// Scrolls `text` horizontally so the cursor (a char index) fits in `width`
/// columns. Returns the visible tail and the cursor's column within it.
fn query_window(text: &str, cursor: usize, width: usize) -> (&str, usize) {
    let mut column: usize = text.chars().take(cursor).map(char_width).sum();
    let mut chars = text.char_indices().take(cursor);
    let mut start = 0;
    while column >= width.max(1) {
        let Some((index, ch)) = chars.next() else {
            break;
        };
        column -= char_width(ch);
        start = index + ch.len_utf8();
    }
    (&text[start..], column)
}

fn char_width(ch: char) -> usize {
    ch.width().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryStore;
    use crate::input::EditCommand;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use ratatui::buffer::Buffer;

    fn buffer_lines(buffer: &Buffer) -> Vec<String> {
        let area = buffer.area;
        (area.y..area.bottom())
            .map(|y| {
                let mut line = String::new();
                for x in area.x..area.right() {
                    line.push_str(buffer[(x, y)].symbol());
                }
                line.trim_end().to_string()
            })
            .collect()
    }

    fn render(state: &mut SessionState, width: u16, height: u16) -> Terminal<TestBackend> {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal
            .draw(|frame| draw_ui(frame, state, RenderOptions::default()))
            .unwrap();
        terminal
    }

    #[test]
    fn draws_rows_status_and_query() {
        let store = HistoryStore::from_commands(["git status", "git commit -m fix", "ls -la"]);
        let mut state = SessionState::new(store, "", 3);
        state.apply(EditCommand::InsertChar('g'));
        let terminal = render(&mut state, 60, 5);
        let lines = buffer_lines(terminal.backend().buffer());

        assert_eq!(lines[0], "▸ git commit -m fix");
        assert_eq!(lines[1], "  git status");
        assert_eq!(lines[2], "");
        assert!(lines[3].starts_with("  2/3"), "{lines:?}");
        assert_eq!(lines[4], "> g");
    }

    #[test]
    fn highlights_matched_characters_and_selection() {
        let store = HistoryStore::from_commands(["git commit"]);
        let mut state = SessionState::new(store, "gc", 1);
        let terminal = render(&mut state, 30, 3);
        let buffer = terminal.backend().buffer();

        // "▸ " occupies columns 0-1; text starts at column 2.
        assert!(buffer[(2, 0)].modifier.contains(Modifier::BOLD));
        assert_eq!(buffer[(2, 0)].fg, Color::Yellow);
        assert_eq!(buffer[(3, 0)].fg, Color::White);
        assert_eq!(buffer[(6, 0)].fg, Color::Yellow);
        assert_eq!(buffer[(3, 0)].bg, Color::Rgb(42, 88, 116));
    }

    #[test]
    fn shows_no_matches_indicator() {
        let mut state = SessionState::new(HistoryStore::default(), "", 3);
        let terminal = render(&mut state, 40, 5);
        let lines = buffer_lines(terminal.backend().buffer());
        assert!(lines.iter().any(|line| line.contains("No matching history entries")));
        assert!(lines[3].starts_with("  0/0"));
    }

    #[test]
    fn renderer_reports_available_rows() {
        let commands: Vec<String> = (0..10).map(|i| format!("cmd {i}")).collect();
        let store = HistoryStore::from_commands(commands.iter().map(String::as_str));
        let mut state = SessionState::new(store, "", 8);
        for _ in 0..5 {
            state.apply(EditCommand::MoveSelectionDown);
        }
        let terminal = render(&mut state, 30, 5);
        assert_eq!(state.visible_rows(), 3);
        assert_eq!(state.viewport_offset(), 3);
        let lines = buffer_lines(terminal.backend().buffer());
        assert_eq!(lines[2], "▸ cmd 4");
    }

    #[test]
    fn cursor_column_follows_display_width() {
        let mut state = SessionState::new(HistoryStore::default(), "日本", 1);
        let mut terminal = render(&mut state, 30, 3);
        terminal.backend_mut().assert_cursor_position((6, 2));

        state.apply(EditCommand::CursorLeft);
        terminal
            .draw(|frame| draw_ui(frame, &mut state, RenderOptions::default()))
            .unwrap();
        terminal.backend_mut().assert_cursor_position((4, 2));
    }

    #[test]
    fn long_query_scrolls_to_keep_cursor_visible() {
        let query = format!("{}XYZ", "a".repeat(40));
        let mut state = SessionState::new(HistoryStore::default(), &query, 1);
        let mut terminal = render(&mut state, 30, 3);
        let lines = buffer_lines(terminal.backend().buffer());
        assert!(lines[2].starts_with("> "), "{lines:?}");
        assert!(lines[2].ends_with("XYZ"), "{lines:?}");
        terminal.backend_mut().assert_cursor_position((29, 2));

        state.apply(EditCommand::CursorStart);
        terminal
            .draw(|frame| draw_ui(frame, &mut state, RenderOptions::default()))
            .unwrap();
        let lines = buffer_lines(terminal.backend().buffer());
        assert_eq!(lines[2], format!("> {}", "a".repeat(28)));
        terminal.backend_mut().assert_cursor_position((2, 2));
    }

    #[test]
    fn query_window_skips_whole_wide_chars() {
        assert_eq!(query_window("abc", 3, 10), ("abc", 3));
        assert_eq!(query_window("abcdef", 6, 4), ("def", 3));
        assert_eq!(query_window("日本語", 3, 4), ("語", 2));
        assert_eq!(query_window("abcdef", 0, 4), ("abcdef", 0));
    }

    #[test]
    fn multiline_entries_render_on_one_row() {
        let spans = highlight_text("for x\n\tdo", &[MatchSpan { start: 0, len: 1 }]);
        let text: String = spans.iter().map(|span| span.content.as_ref()).collect();
        assert_eq!(text, "for x↵ do");
        assert_eq!(spans[0].content, "f");
        assert_eq!(spans[0].style, MATCH_STYLE);
    }
}
