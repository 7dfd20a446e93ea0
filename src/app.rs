use std::io::{self, IsTerminal, Stdout};

use anyhow::{Context, Result};
use crossterm::event;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use ratatui::backend::CrosstermBackend;
use ratatui::{Terminal, TerminalOptions, Viewport};
use tracing::{debug, warn};

use crate::error::HistfindError;
use crate::input;
use crate::render::{self, CHROME_HEIGHT, RenderOptions};
use crate::session::{Outcome, SessionState};

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

/// Raw mode for as long as the guard lives.
struct RawModeGuard;

impl RawModeGuard {
    fn acquire() -> Result<Self, HistfindError> {
        enable_raw_mode().map_err(|err| HistfindError::terminal("failed to enable raw mode", err))?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(err) = disable_raw_mode() {
            warn!(%err, "failed to disable raw mode");
        }
    }
}

/// Inline viewport below the prompt. Dropping it wipes the drawn region and
/// then releases raw mode, whichever way the session ends.
struct TerminalSession {
    terminal: TuiTerminal,
    _raw_mode: RawModeGuard,
}

impl TerminalSession {
    fn open(rows: u16) -> Result<Self, HistfindError> {
        if !io::stdout().is_terminal() {
            return Err(HistfindError::terminal(
                "stdout is not a terminal",
                io::Error::other("not a tty"),
            ));
        }

        let raw_mode = RawModeGuard::acquire()?;
        let backend = CrosstermBackend::new(io::stdout());
        let terminal = Terminal::with_options(
            backend,
            TerminalOptions {
                viewport: Viewport::Inline(rows.saturating_add(CHROME_HEIGHT)),
            },
        )
        .map_err(|err| HistfindError::terminal("failed to create terminal", err))?;

        Ok(Self {
            terminal,
            _raw_mode: raw_mode,
        })
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        if let Err(err) = self.terminal.clear() {
            warn!(%err, "failed to clear search region");
        }
        if let Err(err) = self.terminal.show_cursor() {
            warn!(%err, "failed to show cursor");
        }
    }
}

/// Runs the read-decode-apply-render loop until the session is accepted or
/// cancelled.
pub fn run_tui(mut state: SessionState, options: RenderOptions, rows: u16) -> Result<Outcome> {
    let mut session = TerminalSession::open(rows)?;
    run_loop(&mut session.terminal, &mut state, options)?;
    drop(session);
    debug!(outcome = ?state.outcome(), "session finished");
    Ok(state.into_outcome())
}

fn run_loop(
    terminal: &mut TuiTerminal,
    state: &mut SessionState,
    options: RenderOptions,
) -> Result<()> {
    while state.is_running() {
        terminal
            .draw(|frame| render::draw_ui(frame, state, options))
            .context("failed to draw search view")?;

        let event = event::read()
            .map_err(|err| HistfindError::terminal("failed to read terminal input", err))?;
        let command = input::decode(&event);
        debug!(?event, ?command, "input");
        state.apply(command);
    }
    Ok(())
}
