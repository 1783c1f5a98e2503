use chrono::{DateTime, Local, Utc};

use super::library::ContinueWatchingEntry;
use super::media::EpisodeRef;

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    s.chars().take(max.saturating_sub(3)).collect::<String>() + "..."
}

pub(crate) fn format_updated_at(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M %:z")
        .to_string()
}

/// Shorter form for table cells.
pub(crate) fn format_updated_at_short(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%m-%d %H:%M").to_string()
}

/// `S2E5` for series progress, `-` when there is no episode.
pub(crate) fn entry_episode_label(entry: &ContinueWatchingEntry) -> String {
    entry
        .season
        .zip(entry.episode)
        .and_then(|(season, episode)| EpisodeRef::new(season, episode))
        .map(|ep| ep.to_string())
        .unwrap_or_else(|| "-".to_string())
}
