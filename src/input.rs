use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditCommand {
    InsertChar(char),
    DeleteCharBackward,
    DeleteCharForward,
    CursorLeft,
    CursorRight,
    CursorStart,
    CursorEnd,
    MoveSelectionUp,
    MoveSelectionDown,
    PageUp,
    PageDown,
    Accept,
    Cancel,
    ClearQuery,
    NoOp,
}

/// Maps a raw terminal event to an edit command. Pure; never fails.
pub fn decode(event: &Event) -> EditCommand {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => decode_key(key),
        _ => EditCommand::NoOp,
    }
}

fn decode_key(key: &KeyEvent) -> EditCommand {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c' | 'g') => EditCommand::Cancel,
            KeyCode::Char('u') => EditCommand::ClearQuery,
            KeyCode::Char('h') => EditCommand::DeleteCharBackward,
            KeyCode::Char('d') => EditCommand::DeleteCharForward,
            KeyCode::Char('p' | 'k') => EditCommand::MoveSelectionUp,
            KeyCode::Char('n' | 'j' | 'r') => EditCommand::MoveSelectionDown,
            KeyCode::Char('b') => EditCommand::CursorLeft,
            KeyCode::Char('f') => EditCommand::CursorRight,
            KeyCode::Char('a') => EditCommand::CursorStart,
            KeyCode::Char('e') => EditCommand::CursorEnd,
            _ => EditCommand::NoOp,
        };
    }

    match key.code {
        KeyCode::Esc => EditCommand::Cancel,
        KeyCode::Enter => EditCommand::Accept,
        KeyCode::Backspace => EditCommand::DeleteCharBackward,
        KeyCode::Delete => EditCommand::DeleteCharForward,
        KeyCode::Up => EditCommand::MoveSelectionUp,
        KeyCode::Down | KeyCode::Tab => EditCommand::MoveSelectionDown,
        KeyCode::PageUp => EditCommand::PageUp,
        KeyCode::PageDown => EditCommand::PageDown,
        KeyCode::Left => EditCommand::CursorLeft,
        KeyCode::Right => EditCommand::CursorRight,
        KeyCode::Home => EditCommand::CursorStart,
        KeyCode::End => EditCommand::CursorEnd,
        KeyCode::Char(ch)
            if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT =>
        {
            EditCommand::InsertChar(ch)
        }
        _ => EditCommand::NoOp,
    }
}
