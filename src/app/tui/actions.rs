use std::sync::{Arc, mpsc};

use ratatui::widgets::TableState;
use tracing::debug;

use crate::error::MetadataError;

use super::super::display::{entry_episode_label, format_updated_at_short};
use super::super::metadata::{MetadataService, SearchPage};
use super::super::playback::SessionSnapshot;
use super::{LibraryTab, TuiState};

/// One line of the library table, whatever tab it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct LibraryRow {
    pub(super) title_id: String,
    pub(super) title: String,
    pub(super) detail: String,
    pub(super) when: String,
}

#[derive(Debug)]
pub(super) struct SearchFetchResult {
    pub(super) seq: u64,
    pub(super) query: String,
    pub(super) page: u32,
    pub(super) result: Result<SearchPage, MetadataError>,
}

pub(super) fn status_info(msg: &str) -> String {
    format!("INFO: {msg}")
}

pub(super) fn status_error(msg: &str) -> String {
    format!("ERROR: {msg}")
}

pub(super) fn library_rows(state: &TuiState) -> Vec<LibraryRow> {
    match state.tab {
        LibraryTab::Continue => state
            .continue_items
            .iter()
            .map(|entry| LibraryRow {
                title_id: entry.title_id.clone(),
                title: entry.title.clone(),
                detail: format!("{} {}", entry.kind, entry_episode_label(entry)),
                when: format_updated_at_short(&entry.updated_at),
            })
            .collect(),
        LibraryTab::Watchlist => state
            .watchlist_items
            .iter()
            .map(|entry| LibraryRow {
                title_id: entry.title_id.clone(),
                title: entry.title.clone(),
                detail: String::new(),
                when: String::new(),
            })
            .collect(),
        LibraryTab::Search => state
            .search
            .results
            .iter()
            .map(|hit| LibraryRow {
                title_id: hit.title_id.clone(),
                title: hit.title.clone(),
                detail: hit.kind.to_string(),
                when: hit.year.clone().unwrap_or_default(),
            })
            .collect(),
    }
}

/// Moves a table cursor by `step`, clamped to `len`. An empty table loses its
/// selection.
pub(super) fn move_selection(table_state: &mut TableState, len: usize, step: isize) {
    if len == 0 {
        table_state.select(None);
        return;
    }
    let next = match table_state.selected() {
        Some(selected) => selected.saturating_add_signed(step).min(len - 1),
        None => 0,
    };
    table_state.select(Some(next));
}

pub(super) fn spawn_search(
    state: &mut TuiState,
    metadata: &Arc<dyn MetadataService>,
    query: String,
    page: u32,
    tx: &mpsc::Sender<SearchFetchResult>,
) {
    state.search.request_seq += 1;
    state.search.loading = true;
    state.status = status_info(&format!("Searching for \"{query}\" (page {page})..."));

    let seq = state.search.request_seq;
    let metadata = Arc::clone(metadata);
    let tx = tx.clone();
    std::thread::spawn(move || {
        let result = metadata.search(&query, page, None);
        let _ = tx.send(SearchFetchResult {
            seq,
            query,
            page,
            result,
        });
    });
}

pub(super) fn drain_search_results(rx: &mpsc::Receiver<SearchFetchResult>, state: &mut TuiState) {
    while let Ok(fetched) = rx.try_recv() {
        if fetched.seq != state.search.request_seq {
            debug!(query = %fetched.query, "dropping superseded search results");
            continue;
        }
        state.search.loading = false;
        state.search.query = fetched.query;
        state.search.page = fetched.page;
        match fetched.result {
            Ok(page) => {
                state.status = status_info(&format!(
                    "{} results for \"{}\" (page {}).",
                    page.total_count, state.search.query, state.search.page
                ));
                state.search.total_count = page.total_count;
                state.search.results = page.results;
            }
            Err(MetadataError::NotFound(detail)) => {
                state.status = status_info(&format!("No results: {detail}"));
                state.search.total_count = 0;
                state.search.results.clear();
            }
            Err(err) => {
                state.status = status_error(&format!("Search failed: {err}"));
            }
        }
        if state.tab == LibraryTab::Search {
            let len = state.search.results.len();
            state.table_state.select((len > 0).then_some(0));
        }
    }
}

/// Keeps the player cursors on the active source and current episode
/// whenever the session moves them.
pub(super) fn sync_player_cursors(state: &mut TuiState, snapshot: &SessionSnapshot) {
    if state.synced_active != snapshot.active_source_name {
        state.synced_active = snapshot.active_source_name.clone();
        let active = snapshot.candidates.iter().position(|c| c.active);
        state
            .source_state
            .select(active.or((!snapshot.candidates.is_empty()).then_some(0)));
    }
    if state
        .source_state
        .selected()
        .is_some_and(|idx| idx >= snapshot.candidates.len())
    {
        state
            .source_state
            .select(snapshot.candidates.len().checked_sub(1));
    }

    let episode = snapshot.episode.map(|ep| (ep.season(), ep.episode()));
    if state.synced_episode != episode {
        state.synced_episode = episode;
        let position = episode.and_then(|(_, number)| {
            snapshot
                .episodes
                .iter()
                .position(|(candidate, _)| *candidate == number)
        });
        state.episode_state.select(position);
    }
    if state
        .episode_state
        .selected()
        .is_some_and(|idx| idx >= snapshot.episodes.len())
    {
        state.episode_state.select(snapshot.episodes.len().checked_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_selection_clamps_and_starts_at_top() {
        let mut table = TableState::default();
        move_selection(&mut table, 3, 1);
        assert_eq!(table.selected(), Some(0));
        move_selection(&mut table, 3, 5);
        assert_eq!(table.selected(), Some(2));
        move_selection(&mut table, 3, -9);
        assert_eq!(table.selected(), Some(0));
        move_selection(&mut table, 0, 1);
        assert_eq!(table.selected(), None);
    }

    #[test]
    fn status_prefixes_drive_styling() {
        assert_eq!(status_info("Ready."), "INFO: Ready.");
        assert_eq!(status_error("nope"), "ERROR: nope");
    }
}
