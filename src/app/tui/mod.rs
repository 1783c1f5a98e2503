mod actions;
mod render;
mod terminal;

use std::io;
use std::sync::{Arc, mpsc};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::TableState;

use crate::config::Config;
use crate::db::Database;

use super::display::truncate;
use super::library::{ContinueWatchingEntry, Medium, WatchlistEntry};
use super::media::MediaKind;
use super::metadata::{MetadataService, SearchHit};
use super::playback::{Driver, ExternalPlayer};
use super::{build_driver, open_library};

use self::actions::{
    LibraryRow, SearchFetchResult, drain_search_results, library_rows, move_selection,
    spawn_search, status_error, status_info, sync_player_cursors,
};
use self::render::{draw_library, draw_player};
use self::terminal::TerminalGuard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LibraryTab {
    Continue,
    Watchlist,
    Search,
}

impl LibraryTab {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Continue => "CONTINUE",
            Self::Watchlist => "WATCHLIST",
            Self::Search => "SEARCH",
        }
    }

    pub(crate) fn move_left(self) -> Self {
        match self {
            Self::Continue => Self::Continue,
            Self::Watchlist => Self::Continue,
            Self::Search => Self::Watchlist,
        }
    }

    pub(crate) fn move_right(self) -> Self {
        match self {
            Self::Continue => Self::Watchlist,
            Self::Watchlist => Self::Search,
            Self::Search => Self::Search,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Screen {
    Library,
    Player,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum PlayerFocus {
    Sources,
    Episodes,
}

#[derive(Debug, Clone)]
pub(super) struct PendingDelete {
    pub(super) tab: LibraryTab,
    pub(super) title_id: String,
    pub(super) title: String,
}

#[derive(Debug, Default)]
pub(super) struct SearchState {
    pub(super) query: String,
    pub(super) page: u32,
    pub(super) total_count: u32,
    pub(super) results: Vec<SearchHit>,
    pub(super) loading: bool,
    pub(super) request_seq: u64,
}

/// Everything the TUI remembers between frames apart from the session itself.
pub(super) struct TuiState {
    pub(super) screen: Screen,
    pub(super) tab: LibraryTab,
    pub(super) continue_items: Vec<ContinueWatchingEntry>,
    pub(super) watchlist_items: Vec<WatchlistEntry>,
    pub(super) search: SearchState,
    pub(super) table_state: TableState,
    pub(super) focus: PlayerFocus,
    pub(super) source_state: TableState,
    pub(super) episode_state: TableState,
    pub(super) synced_active: Option<String>,
    pub(super) synced_episode: Option<(u32, u32)>,
    pub(super) status: String,
    pub(super) search_input: Option<String>,
    pub(super) pending_delete: Option<PendingDelete>,
}

impl TuiState {
    fn new() -> Self {
        Self {
            screen: Screen::Library,
            tab: LibraryTab::Continue,
            continue_items: Vec::new(),
            watchlist_items: Vec::new(),
            search: SearchState {
                page: 1,
                ..SearchState::default()
            },
            table_state: TableState::default(),
            focus: PlayerFocus::Sources,
            source_state: TableState::default(),
            episode_state: TableState::default(),
            synced_active: None,
            synced_episode: None,
            status: String::new(),
            search_input: None,
            pending_delete: None,
        }
    }

    fn rows(&self) -> Vec<LibraryRow> {
        library_rows(self)
    }

    fn refresh_library<M: Medium>(&mut self, driver: &Driver<M>) {
        self.continue_items = driver.library().continue_watching();
        self.watchlist_items = driver.library().watchlist();
        let len = self.rows().len();
        match (len, self.table_state.selected()) {
            (0, _) => self.table_state.select(None),
            (_, Some(selected)) => self.table_state.select(Some(selected.min(len - 1))),
            (_, None) => self.table_state.select(Some(0)),
        }
    }

    fn set_tab<M: Medium>(&mut self, tab: LibraryTab, driver: &Driver<M>) {
        self.tab = tab;
        self.table_state.select(None);
        self.refresh_library(driver);
    }
}

pub(crate) fn run_tui(config: &Config, db: &Database, initial: Option<String>) -> Result<()> {
    let mut driver = build_driver(
        config,
        open_library(config, db),
        Box::new(ExternalPlayer::new(&config.player.opener)),
    );
    let metadata = driver.metadata();

    let mut guard = TerminalGuard::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
        .context("failed to initialize terminal backend")?;
    terminal.clear()?;

    let mut state = TuiState::new();
    state.refresh_library(&driver);
    state.status = if state.continue_items.is_empty() {
        status_info("Nothing to continue yet. Press `s` to search for a title.")
    } else {
        status_info("Ready.")
    };
    if let Some(title_id) = initial {
        open_title(&mut state, &mut driver, &title_id);
    }

    let (search_tx, search_rx) = mpsc::channel::<SearchFetchResult>();

    loop {
        drain_search_results(&search_rx, &mut state);
        if driver.pump() && state.screen == Screen::Player {
            state.status = session_status(&driver);
        }
        let snapshot = driver.snapshot();
        sync_player_cursors(&mut state, &snapshot);
        let in_watchlist = driver.in_watchlist();

        terminal.draw(|frame| match state.screen {
            Screen::Library => draw_library(frame, &mut state),
            Screen::Player => draw_player(frame, &mut state, &snapshot, in_watchlist),
        })?;

        let poll = if driver.is_busy() || state.search.loading {
            Duration::from_millis(80)
        } else {
            Duration::from_millis(200)
        };
        if !event::poll(poll)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let keep_running = match state.screen {
            Screen::Library => {
                handle_library_key(key, &mut state, &mut driver, &metadata, &search_tx)
            }
            Screen::Player => handle_player_key(key, &mut state, &mut driver),
        };
        if !keep_running {
            break;
        }
    }

    driver.close();
    terminal.show_cursor()?;
    guard.leave()?;
    Ok(())
}

fn session_status<M: Medium>(driver: &Driver<M>) -> String {
    let snapshot = driver.snapshot();
    if snapshot.status.is_error() {
        status_error(&snapshot.status_line)
    } else {
        status_info(&snapshot.status_line)
    }
}

fn open_title<M: Medium>(state: &mut TuiState, driver: &mut Driver<M>, title_id: &str) {
    driver.open(title_id);
    state.screen = Screen::Player;
    state.focus = PlayerFocus::Sources;
    state.source_state.select(None);
    state.episode_state.select(None);
    state.synced_active = None;
    state.synced_episode = None;
    state.status = session_status(driver);
}

fn handle_library_key<M: Medium>(
    key: KeyEvent,
    state: &mut TuiState,
    driver: &mut Driver<M>,
    metadata: &Arc<dyn MetadataService>,
    search_tx: &mpsc::Sender<SearchFetchResult>,
) -> bool {
    if let Some(input) = state.search_input.as_mut() {
        match key.code {
            KeyCode::Esc => {
                state.search_input = None;
                state.status = status_info("Search canceled.");
            }
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Enter => {
                let query = input.trim().to_string();
                state.search_input = None;
                if query.is_empty() {
                    state.status = status_error("Search failed: empty query.");
                } else {
                    state.set_tab(LibraryTab::Search, driver);
                    spawn_search(state, metadata, query, 1, search_tx);
                }
            }
            KeyCode::Char(c) => input.push(c),
            _ => {}
        }
        return true;
    }

    if let Some(dialog) = state.pending_delete.clone() {
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                state.pending_delete = None;
                let library = driver.library();
                let removed = match dialog.tab {
                    LibraryTab::Continue => library.remove_continue_watching(&dialog.title_id),
                    LibraryTab::Watchlist => library.remove_from_watchlist(&dialog.title_id),
                    LibraryTab::Search => false,
                };
                state.status = if removed {
                    status_info(&format!("Removed: {}", dialog.title))
                } else {
                    status_error("Remove failed: entry no longer exists.")
                };
                state.refresh_library(driver);
            }
            KeyCode::Esc | KeyCode::Char('n') => {
                state.pending_delete = None;
                state.status = status_info("Remove canceled.");
            }
            _ => {}
        }
        return true;
    }

    let rows = state.rows();
    match key.code {
        KeyCode::Char('q') => return false,
        KeyCode::Char('s') | KeyCode::Char('/') => {
            state.search_input = Some(String::new());
            state.status = status_info("Type a title and press Enter. Esc cancels.");
        }
        KeyCode::Left => {
            let tab = state.tab.move_left();
            state.set_tab(tab, driver);
        }
        KeyCode::Right => {
            let tab = state.tab.move_right();
            state.set_tab(tab, driver);
        }
        KeyCode::Up => move_selection(&mut state.table_state, rows.len(), -1),
        KeyCode::Down => move_selection(&mut state.table_state, rows.len(), 1),
        KeyCode::PageDown if state.tab == LibraryTab::Search && !state.search.loading => {
            let pages = state.search.total_count.div_ceil(10).max(1);
            if state.search.page < pages {
                let query = state.search.query.clone();
                let page = state.search.page + 1;
                spawn_search(state, metadata, query, page, search_tx);
            }
        }
        KeyCode::PageUp if state.tab == LibraryTab::Search && !state.search.loading => {
            if state.search.page > 1 {
                let query = state.search.query.clone();
                let page = state.search.page - 1;
                spawn_search(state, metadata, query, page, search_tx);
            }
        }
        KeyCode::Char('d') => {
            if state.tab == LibraryTab::Search {
                state.status = status_error("Remove failed: search results are not stored.");
                return true;
            }
            let Some(row) = state.table_state.selected().and_then(|idx| rows.get(idx)) else {
                state.status = status_error("Remove failed: no entry selected.");
                return true;
            };
            state.pending_delete = Some(PendingDelete {
                tab: state.tab,
                title_id: row.title_id.clone(),
                title: row.title.clone(),
            });
            state.status = status_info("Confirm remove: y/Enter to remove, n/Esc to cancel.");
        }
        KeyCode::Enter => {
            let Some(row) = state.table_state.selected().and_then(|idx| rows.get(idx)) else {
                return true;
            };
            let title_id = row.title_id.clone();
            open_title(state, driver, &title_id);
        }
        _ => {}
    }
    true
}

fn handle_player_key<M: Medium>(
    key: KeyEvent,
    state: &mut TuiState,
    driver: &mut Driver<M>,
) -> bool {
    let snapshot = driver.snapshot();
    let is_series = snapshot.kind == Some(MediaKind::Series);

    match key.code {
        KeyCode::Char('q') => return false,
        KeyCode::Esc | KeyCode::Backspace => {
            driver.close();
            state.screen = Screen::Library;
            state.refresh_library(driver);
            state.status = status_info("Back to library.");
            return true;
        }
        KeyCode::Tab if is_series => {
            state.focus = match state.focus {
                PlayerFocus::Sources => PlayerFocus::Episodes,
                PlayerFocus::Episodes => PlayerFocus::Sources,
            };
            return true;
        }
        KeyCode::Up | KeyCode::Down => {
            let step = if key.code == KeyCode::Up { -1 } else { 1 };
            match state.focus {
                PlayerFocus::Sources => {
                    move_selection(&mut state.source_state, snapshot.candidates.len(), step)
                }
                PlayerFocus::Episodes => {
                    move_selection(&mut state.episode_state, snapshot.episodes.len(), step)
                }
            }
            return true;
        }
        KeyCode::Enter => match state.focus {
            PlayerFocus::Sources => {
                let Some(candidate) = state
                    .source_state
                    .selected()
                    .and_then(|idx| snapshot.candidates.get(idx))
                else {
                    return true;
                };
                if candidate.active {
                    state.status = status_info(&format!("Already using {}.", candidate.name));
                    return true;
                }
                driver.select_source(&candidate.name);
            }
            PlayerFocus::Episodes => {
                let Some((number, _)) = state
                    .episode_state
                    .selected()
                    .and_then(|idx| snapshot.episodes.get(idx))
                else {
                    return true;
                };
                driver.select_episode(*number);
            }
        },
        KeyCode::Char('n') if is_series => driver.select_next_episode(),
        KeyCode::Char('p') if is_series => driver.select_previous_episode(),
        KeyCode::Char(']') if is_series => {
            if let Some(season) = snapshot.season {
                driver.select_season(season + 1);
            }
        }
        KeyCode::Char('[') if is_series => {
            if let Some(season) = snapshot.season.filter(|s| *s > 1) {
                driver.select_season(season - 1);
            }
        }
        KeyCode::Char('w') => {
            let title = snapshot.title.clone().unwrap_or_default();
            state.status = match driver.toggle_watchlist() {
                Some(true) => status_info(&format!("Added to watchlist: {}", truncate(&title, 50))),
                Some(false) => {
                    status_info(&format!("Removed from watchlist: {}", truncate(&title, 50)))
                }
                None => status_error("Watchlist unavailable: title details are not loaded."),
            };
            return true;
        }
        _ => return true,
    }

    state.status = session_status(driver);
    true
}
