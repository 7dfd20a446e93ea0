mod app;
mod config;
mod error;
mod filter;
mod history;
mod input;
mod logging;
mod matcher;
mod output;
mod render;
mod session;

use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use filter::EntryFilter;
use history::HistoryStore;
use render::RenderOptions;
use session::{Outcome, SessionState};

#[derive(Debug, Parser)]
#[command(
    name = "histfind",
    version,
    about = "Interactive fuzzy search over shell history"
)]
struct Cli {
    /// File that receives the accepted command line. Truncated on every run; left empty on cancel
    #[arg(required_unless_present = "list")]
    destination: Option<PathBuf>,

    /// History file. Defaults to $HISTFILE, then ~/.bash_history
    #[arg(short = 'f', long)]
    histfile: Option<PathBuf>,

    /// Initial query text
    #[arg(short, long, default_value = "")]
    query: String,

    /// Only keep entries matching this pattern (repeatable, all must match)
    #[arg(short, long)]
    include: Vec<String>,

    /// Hide entries matching this pattern (repeatable)
    #[arg(short, long)]
    exclude: Vec<String>,

    /// Match include/exclude patterns case-sensitively
    #[arg(short = 's', long)]
    case_sensitive: bool,

    /// Print matching entries instead of opening the interactive search
    #[arg(short, long)]
    list: bool,

    /// Override config path. If omitted, histfind checks ./histfind.toml and then ~/.config/histfind/config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of result rows to show
    #[arg(long)]
    height: Option<u16>,

    /// Write diagnostic logs to this file (filter with HISTFIND_LOG)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// Everything needed to load and rank history, resolved from CLI and config.
struct Search {
    histfile: PathBuf,
    filter: EntryFilter,
    query: String,
    rows: u16,
}

fn main() {
    if let Err(err) = run() {
        error!("{err:#}");
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_file.as_deref())?;

    let cwd = env::current_dir()?;
    let loaded = config::load(&cwd, cli.config.as_deref())?;
    if let Some(path) = &loaded.path {
        info!(path = %path.display(), "using config");
    }
    let history_config = &loaded.config.history;

    let histfile = cli
        .histfile
        .clone()
        .or_else(|| history_config.resolved_path())
        .or_else(history::default_history_path)
        .context("unable to locate a history file; pass --histfile")?;

    let include = [history_config.include.as_slice(), cli.include.as_slice()].concat();
    let exclude = [history_config.exclude.as_slice(), cli.exclude.as_slice()].concat();
    let filter = EntryFilter::new(
        &include,
        &exclude,
        cli.case_sensitive || history_config.case_sensitive,
    )?;

    let search = Search {
        histfile,
        filter,
        query: cli.query.clone(),
        rows: cli.height.unwrap_or(loaded.config.ui.height).max(1),
    };

    if cli.list {
        return list_matches(&search, io::stdout().lock());
    }

    let destination = cli
        .destination
        .as_deref()
        .context("a destination file is required unless --list is given")?;
    let options = RenderOptions {
        show_timestamps: loaded.config.ui.show_timestamps,
    };
    interactive_search(&search, destination, |state, rows| {
        app::run_tui(state, options, rows)
    })
}

fn load_history(search: &Search) -> Result<HistoryStore> {
    let mut store = HistoryStore::load(&search.histfile)?;
    store.retain_matching(&search.filter);
    if store.is_empty() {
        info!(path = %search.histfile.display(), "no history entries to search");
    }
    Ok(store)
}

/// Loads history, hands the session to `ui` and writes its outcome. The
/// destination is only touched once the session has finished.
fn interactive_search<F>(search: &Search, destination: &Path, ui: F) -> Result<()>
where
    F: FnOnce(SessionState, u16) -> Result<Outcome>,
{
    let store = load_history(search)?;
    let state = SessionState::new(store, &search.query, search.rows as usize);
    let outcome = ui(state, search.rows)?;
    output::write_outcome(&outcome, destination)?;
    Ok(())
}

fn list_matches(search: &Search, out: impl Write) -> Result<()> {
    let store = load_history(search)?;
    let results = matcher::rank(store.entries(), &search.query);
    output::write_listing(store.entries(), &results, out).context("failed to write listing")
}
