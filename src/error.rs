use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal conditions. Everything else (cancel, empty history, no matches)
/// is a normal session outcome.
#[derive(Debug, Error)]
pub enum HistfindError {
    #[error("failed to load history from {}: {reason}", .path.display())]
    Load {
        path: PathBuf,
        reason: String,
        #[source]
        source: io::Error,
    },

    #[error("terminal unavailable: {context}")]
    Terminal {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("failed to write result to {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl HistfindError {
    pub fn load(path: impl Into<PathBuf>, reason: impl Into<String>, source: io::Error) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.into(),
            source,
        }
    }

    pub fn terminal(context: &'static str, source: io::Error) -> Self {
        Self::Terminal { context, source }
    }
}
