use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use tracing::info;

use crate::error::HistfindError;
use crate::history::HistoryEntry;
use crate::matcher::MatchResult;
use crate::session::Outcome;

/// Hands the session result to the caller: the accepted text verbatim (no
/// trailing newline), or an empty file on cancel. Always truncates.
pub fn write_outcome(outcome: &Outcome, destination: &Path) -> Result<(), HistfindError> {
    let write_err = |source| HistfindError::Write {
        path: destination.to_path_buf(),
        source,
    };

    let mut file = File::create(destination).map_err(write_err)?;
    match outcome {
        Outcome::Accepted(entry) => {
            file.write_all(entry.raw_text.as_bytes()).map_err(write_err)?;
            info!(bytes = entry.raw_text.len(), "wrote accepted command");
        }
        Outcome::Cancelled | Outcome::Running => {
            info!("no command selected; destination left empty");
        }
    }
    file.flush().map_err(write_err)
}

/// Prints ranked matches one per line, best match last so it sits next to
/// the prompt.
pub fn write_listing(
    entries: &[HistoryEntry],
    results: &[MatchResult],
    mut out: impl Write,
) -> io::Result<()> {
    for result in results.iter().rev() {
        writeln!(out, "{}", entries[result.entry])?;
    }
    out.flush()
}
