use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::app::sources::EpisodeStyle;

#[derive(Debug, Parser)]
#[command(
    name = "reelpick",
    version,
    about = "Resolve movies and episodes across embed providers and keep your place"
)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    pub fn is_interactive(&self) -> bool {
        matches!(self.command, None | Some(Command::Tui) | Some(Command::Open { .. }))
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Library screen with continue watching and watchlist
    Tui,
    /// Open the player screen for one title
    Open { title_id: String },
    /// Run a playback session without the TUI and print where it ended up
    Play(PlayArgs),
    /// Print every candidate URL for a request without any network access
    Resolve(ResolveArgs),
    Search {
        query: String,
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// List continue-watching entries
    Continue,
    Watchlist {
        #[command(subcommand)]
        action: Option<WatchlistAction>,
    },
    Sources {
        #[command(subcommand)]
        action: Option<SourcesAction>,
    },
    /// Forget continue-watching and watchlist entries (custom sources stay)
    Clear,
}

#[derive(Debug, Args)]
pub struct EpisodeArgs {
    #[arg(long, requires = "episode")]
    pub season: Option<u32>,
    #[arg(long, requires = "season")]
    pub episode: Option<u32>,
}

#[derive(Debug, Args)]
pub struct PlayArgs {
    pub title_id: String,
    #[command(flatten)]
    pub episode: EpisodeArgs,
    /// Switch to this provider once the session is running
    #[arg(long)]
    pub source: Option<String>,
    /// Do not launch the opener; only report URLs
    #[arg(long)]
    pub no_launch: bool,
    /// Seconds to wait for metadata, probes and the player
    #[arg(long, default_value_t = 20)]
    pub wait: u64,
}

#[derive(Debug, Args)]
pub struct ResolveArgs {
    pub title_id: String,
    /// Treat the title as a series even without an episode
    #[arg(long)]
    pub series: bool,
    #[command(flatten)]
    pub episode: EpisodeArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Movie,
    Series,
}

#[derive(Debug, Subcommand)]
pub enum WatchlistAction {
    List,
    /// Add the title, or remove it if already listed
    Toggle { title_id: String },
    Remove { title_id: String },
}

#[derive(Debug, Subcommand)]
pub enum SourcesAction {
    List,
    /// Store a custom provider; replaces one with the same name
    Add {
        name: String,
        #[arg(long)]
        movie: Option<String>,
        #[arg(long)]
        series: Option<String>,
        /// Episode path shape; defaults to the built-in table, then the generic shape
        #[arg(long, value_enum)]
        episode_style: Option<EpisodeStyle>,
    },
    Remove { name: String },
}
