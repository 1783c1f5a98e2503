mod display;
pub(crate) mod library;
mod media;
mod metadata;
mod playback;
mod probe;
pub(crate) mod sources;
mod tui;


use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::warn;

use crate::cli::{Cli, Command, KindArg, PlayArgs, ResolveArgs, SourcesAction, WatchlistAction};
use crate::config::Config;
use crate::db::Database;
use crate::error::MetadataError;
use crate::paths::database_file_path;

use self::display::{entry_episode_label, format_updated_at, truncate};
use self::library::{Library, Medium, WatchlistEntry};
use self::media::{EpisodeRef, MediaKind, MediaRequest};
use self::metadata::{MetadataService, OmdbProxyClient};
use self::playback::{Driver, ExternalPlayer, Player, SessionSnapshot};
use self::probe::CheckVideoProbe;
use self::sources::{SourceDescriptor, SourceRegistry, resolve_all, style_for};

pub fn run(cli: Cli, config: Config) -> Result<()> {
    let db = open_db()?;

    match cli.command {
        Some(Command::Tui) | None => tui::run_tui(&config, &db, None)?,
        Some(Command::Open { title_id }) => tui::run_tui(&config, &db, Some(title_id))?,
        Some(Command::Play(args)) => run_play(&config, &db, &args)?,
        Some(Command::Resolve(args)) => run_resolve(&config, &db, &args)?,
        Some(Command::Search { query, kind, page }) => run_search(&config, &query, kind, page)?,
        Some(Command::Continue) => run_continue(&config, &db),
        Some(Command::Watchlist { action }) => run_watchlist(&config, &db, action)?,
        Some(Command::Sources { action }) => run_sources(&config, &db, action)?,
        Some(Command::Clear) => {
            open_library(&config, &db).clear_all();
            println!("Cleared continue watching and watchlist.");
        }
    }

    Ok(())
}

impl From<KindArg> for MediaKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Movie => Self::Movie,
            KindArg::Series => Self::Series,
        }
    }
}

pub(crate) fn open_library<M: Medium>(config: &Config, medium: M) -> Library<M> {
    Library::with_capacities(
        medium,
        config.library.continue_capacity,
        config.library.watchlist_capacity,
    )
}

pub(crate) fn build_registry<M: Medium>(config: &Config, library: &Library<M>) -> SourceRegistry {
    SourceRegistry::new(library.custom_sources(), Some(&config.preferred_source))
}

pub(crate) fn build_driver<M: Medium>(
    config: &Config,
    library: Library<M>,
    player: Box<dyn Player>,
) -> Driver<M> {
    let registry = Arc::new(build_registry(config, &library));
    Driver::new(
        registry,
        library,
        Arc::new(OmdbProxyClient::new(&config.metadata)),
        Arc::new(CheckVideoProbe::new(&config.metadata, &config.probe)),
        player,
    )
}

/// IMDb-style ids are used as given; anything else is looked up by title.
pub(crate) fn resolve_title_arg(metadata: &dyn MetadataService, raw: &str) -> Result<String> {
    let raw = raw.trim();
    if looks_like_title_id(raw) {
        return Ok(raw.to_string());
    }
    let details = metadata
        .lookup_by_title(raw, None)
        .with_context(|| format!("no title matches \"{raw}\""))?;
    Ok(details.title_id)
}

fn looks_like_title_id(raw: &str) -> bool {
    raw.strip_prefix("tt")
        .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
}

fn run_play(config: &Config, db: &Database, args: &PlayArgs) -> Result<()> {
    let client = OmdbProxyClient::new(&config.metadata);
    let title_id = resolve_title_arg(&client, &args.title_id)?;
    let opener = if args.no_launch {
        ""
    } else {
        config.player.opener.as_str()
    };
    let mut driver = build_driver(
        config,
        open_library(config, db),
        Box::new(ExternalPlayer::new(opener)),
    );
    let wait = Duration::from_secs(args.wait.max(1));

    driver.open(&title_id);
    settle_or_warn(&mut driver, wait);

    if let (Some(season), Some(episode)) = (args.episode.season, args.episode.episode) {
        if driver.snapshot().season != Some(season) {
            driver.select_season(season);
            settle_or_warn(&mut driver, wait);
        }
        driver.select_episode(episode);
        settle_or_warn(&mut driver, wait);
    }
    if let Some(source) = args.source.as_deref() {
        driver.select_source(source);
        settle_or_warn(&mut driver, wait);
    }

    let snapshot = driver.snapshot();
    print_snapshot(&snapshot);
    if let (Some(season), Some(episode)) = (args.episode.season, args.episode.episode) {
        ensure_episode_honoured(&snapshot, season, episode)?;
    }
    Ok(())
}

/// A requested episode the session could not reach is an error, not a silent
/// fallback to whatever it is playing.
fn ensure_episode_honoured(snapshot: &SessionSnapshot, season: u32, episode: u32) -> Result<()> {
    if snapshot.kind == Some(MediaKind::Movie) {
        bail!("--season/--episode do not apply: this title is a movie");
    }
    if snapshot.episode != EpisodeRef::new(season, episode) {
        let reached = snapshot
            .episode
            .map_or_else(|| "no episode".to_string(), |ep| ep.to_string());
        bail!(
            "S{season}E{episode} is not available ({} season(s)); session is at {reached}",
            snapshot.season_count
        );
    }
    Ok(())
}

fn settle_or_warn<M: Medium>(driver: &mut Driver<M>, wait: Duration) {
    if !driver.settle(wait) {
        warn!(seconds = wait.as_secs(), "gave up waiting for outstanding work");
    }
}

fn print_snapshot(snapshot: &SessionSnapshot) {
    let title = snapshot.title.as_deref().unwrap_or("-");
    let id = snapshot.title_id.as_deref().unwrap_or("-");
    println!("Title:   {title} ({id})");
    if let Some(kind) = snapshot.kind {
        println!("Kind:    {kind}");
    }
    if let Some(episode) = snapshot.episode {
        println!("Episode: {episode} of {} season(s)", snapshot.season_count);
    }
    println!("Status:  {} ({})", snapshot.status_line, snapshot.status.label());
    println!(
        "Source:  {}",
        snapshot.active_source_name.as_deref().unwrap_or("-")
    );
    println!("URL:     {}", snapshot.active_url.as_deref().unwrap_or("-"));
    if snapshot.candidates.is_empty() {
        return;
    }

    println!();
    println!("{:<2} {:<14} {:<12} URL", "", "SOURCE", "PROBE");
    for candidate in &snapshot.candidates {
        println!(
            "{:<2} {:<14} {:<12} {}",
            if candidate.active { "*" } else { "" },
            truncate(&candidate.name, 14),
            candidate.probe.to_string(),
            candidate.url
        );
    }
}

fn run_resolve(config: &Config, db: &Database, args: &ResolveArgs) -> Result<()> {
    let library = open_library(config, db);
    let registry = build_registry(config, &library);
    let request = match (args.episode.season, args.episode.episode) {
        (Some(season), Some(episode)) => {
            let episode = EpisodeRef::new(season, episode)
                .context("season and episode numbers start at 1")?;
            MediaRequest::episode(args.title_id.trim(), episode)
        }
        _ if args.series => MediaRequest::series(args.title_id.trim()),
        _ => MediaRequest::movie(args.title_id.trim()),
    };

    let candidates = resolve_all(&registry, &request);
    if candidates.is_empty() {
        println!("No video sources available.");
        return Ok(());
    }
    let default = registry.default_source().map(SourceDescriptor::name);
    for candidate in candidates {
        let marker = if Some(candidate.source.name()) == default {
            "*"
        } else {
            ""
        };
        println!("{marker:<2} {:<14} {}", candidate.source.name(), candidate.url);
    }
    Ok(())
}

fn run_search(config: &Config, query: &str, kind: Option<KindArg>, page: u32) -> Result<()> {
    let client = OmdbProxyClient::new(&config.metadata);
    let page_number = page.max(1);
    let results = match client.search(query, page_number, kind.map(MediaKind::from)) {
        Ok(results) => results,
        Err(MetadataError::NotFound(detail)) => {
            println!("No results for \"{query}\": {detail}");
            return Ok(());
        }
        Err(err) => return Err(err).context("search failed"),
    };

    println!("{:<12} {:<44} {:<10} {:<6}", "ID", "TITLE", "YEAR", "KIND");
    for hit in &results.results {
        println!(
            "{:<12} {:<44} {:<10} {:<6}",
            hit.title_id,
            truncate(&hit.title, 44),
            hit.year.as_deref().unwrap_or("-"),
            hit.kind
        );
    }
    let pages = results.total_count.div_ceil(10).max(1);
    println!(
        "\nPage {page_number} of {pages} ({} results)",
        results.total_count
    );
    Ok(())
}

fn run_continue(config: &Config, db: &Database) {
    let entries = open_library(config, db).continue_watching();
    if entries.is_empty() {
        println!("Nothing to continue yet. Run `reelpick open <TITLE_ID>` first.");
        return;
    }

    println!(
        "{:<12} {:<40} {:<8} {:<8} {:<24}",
        "ID", "TITLE", "KIND", "EP", "UPDATED"
    );
    for entry in entries {
        println!(
            "{:<12} {:<40} {:<8} {:<8} {:<24}",
            entry.title_id,
            truncate(&entry.title, 40),
            entry.kind,
            entry_episode_label(&entry),
            format_updated_at(&entry.updated_at)
        );
    }
}

fn run_watchlist(config: &Config, db: &Database, action: Option<WatchlistAction>) -> Result<()> {
    let library = open_library(config, db);
    match action.unwrap_or(WatchlistAction::List) {
        WatchlistAction::List => {
            let items = library.watchlist();
            if items.is_empty() {
                println!("Watchlist is empty.");
                return Ok(());
            }
            println!("{:<12} {:<50}", "ID", "TITLE");
            for item in items {
                println!("{:<12} {:<50}", item.title_id, truncate(&item.title, 50));
            }
        }
        WatchlistAction::Toggle { title_id } => {
            let client = OmdbProxyClient::new(&config.metadata);
            let title_id = resolve_title_arg(&client, &title_id)?;
            if library.remove_from_watchlist(&title_id) {
                println!("Removed {title_id} from watchlist.");
                return Ok(());
            }
            let details = client
                .lookup_by_id(&title_id)
                .with_context(|| format!("could not fetch details for {title_id}"))?;
            let title = details.title.clone();
            library.toggle_watchlist(WatchlistEntry {
                title_id: details.title_id,
                title: details.title,
                poster_url: details.poster_url,
            });
            println!("Added {title} to watchlist.");
        }
        WatchlistAction::Remove { title_id } => {
            if library.remove_from_watchlist(title_id.trim()) {
                println!("Removed {} from watchlist.", title_id.trim());
            } else {
                println!("{} is not on the watchlist.", title_id.trim());
            }
        }
    }
    Ok(())
}

fn run_sources(config: &Config, db: &Database, action: Option<SourcesAction>) -> Result<()> {
    let library = open_library(config, db);
    match action.unwrap_or(SourcesAction::List) {
        SourcesAction::List => {
            let custom: Vec<String> = library
                .custom_sources()
                .iter()
                .map(|s| s.name().to_string())
                .collect();
            let registry = build_registry(config, &library);
            let default = registry.default_source().map(SourceDescriptor::name);
            println!(
                "{:<2} {:<14} {:<8} {:<22} {:<40}",
                "", "NAME", "ORIGIN", "EPISODE STYLE", "MOVIE / SERIES"
            );
            for source in registry.list_all() {
                let marker = if Some(source.name()) == default {
                    "*"
                } else {
                    ""
                };
                let origin = if custom.iter().any(|name| name == source.name()) {
                    "custom"
                } else {
                    "builtin"
                };
                println!(
                    "{marker:<2} {:<14} {origin:<8} {:<22} {} / {}",
                    source.name(),
                    format!("{:?}", style_for(source)),
                    source.movie_url_template().unwrap_or("-"),
                    source.series_url_template().unwrap_or("-"),
                );
            }
        }
        SourcesAction::Add {
            name,
            movie,
            series,
            episode_style,
        } => {
            let Some(mut source) =
                SourceDescriptor::new(&name, movie.as_deref(), series.as_deref())
            else {
                bail!("a source needs a name and at least one URL template");
            };
            if let Some(style) = episode_style {
                source = source.with_episode_style(style);
            }
            library.add_custom_source(source);
            println!("Saved custom source {}.", name.trim());
        }
        SourcesAction::Remove { name } => {
            if library.remove_custom_source(name.trim()) {
                println!("Removed custom source {}.", name.trim());
            } else {
                println!("No custom source named {}.", name.trim());
            }
        }
    }
    Ok(())
}

fn open_db() -> Result<Database> {
    let db_path = database_file_path()?;
    let db = Database::open(&db_path)?;
    db.migrate()?;
    Ok(db)
}
