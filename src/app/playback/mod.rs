//! Source selection for one open title.
//!
//! [`PlaybackSession`] is a synchronous state machine: every operation returns
//! the [`Effect`]s the caller must perform, and asynchronous completions are fed
//! back tagged with the [`Ticket`] they were issued under. Completions carrying
//! an outdated ticket are discarded, which is how superseded fetches, probe
//! batches and player loads are cancelled. [`Driver`] performs the effects on
//! worker threads and routes completions back to the owning thread.

mod driver;
mod player;
mod session;

pub(crate) use driver::Driver;
pub(crate) use player::{ExternalPlayer, Player, PlayerEvents};
pub(crate) use session::PlaybackSession;

use std::fmt;

use super::library::ProgressUpdate;
use super::media::{EpisodeRef, MediaKind};

/// Identity of one issued request. Tickets only grow, so any ticket other than
/// the latest one for its stream is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct Ticket(u64);

#[derive(Debug, Default)]
pub(super) struct TicketCounter(u64);

impl TicketCounter {
    pub(super) fn advance(&mut self) -> Ticket {
        self.0 += 1;
        Ticket(self.0)
    }

    pub(super) fn current(&self) -> Ticket {
        Ticket(self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProbeResult {
    pub(crate) batch: Ticket,
    pub(crate) source: String,
    pub(crate) available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LoadTicket {
    pub(crate) generation: Ticket,
    pub(crate) source: String,
    pub(crate) url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LoadOutcome {
    Loaded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlayerEvent {
    pub(crate) generation: Ticket,
    pub(crate) outcome: LoadOutcome,
}

/// Work requested by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Effect {
    FetchDetails {
        epoch: Ticket,
        title_id: String,
    },
    FetchSeason {
        epoch: Ticket,
        title_id: String,
        season: u32,
    },
    Probe {
        batch: Ticket,
        source: String,
        url: String,
    },
    /// Replace whatever the player slot holds; earlier load subscriptions are void.
    Load(LoadTicket),
    ClearPlayer,
    RecordProgress(ProgressUpdate),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SessionStatus {
    Idle,
    Resolving,
    ChoosingEpisode,
    NoEpisodes,
    Loading,
    Playing,
    NoSources,
    Unavailable(String),
}

impl SessionStatus {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::ChoosingEpisode => "choosing episode",
            Self::NoEpisodes => "no episodes",
            Self::Loading => "loading",
            Self::Playing => "playing",
            Self::NoSources => "no sources",
            Self::Unavailable(_) => "unavailable",
        }
    }

    pub(crate) fn is_error(&self) -> bool {
        matches!(self, Self::NoSources | Self::NoEpisodes | Self::Unavailable(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProbeState {
    Pending,
    Available,
    Unavailable,
}

impl fmt::Display for ProbeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Available => "available",
            Self::Unavailable => "unavailable",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CandidateView {
    pub(crate) name: String,
    pub(crate) url: String,
    pub(crate) probe: ProbeState,
    pub(crate) active: bool,
}

/// Everything a front-end needs to render the player panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SessionSnapshot {
    pub(crate) status: SessionStatus,
    pub(crate) status_line: String,
    pub(crate) title_id: Option<String>,
    pub(crate) title: Option<String>,
    pub(crate) kind: Option<MediaKind>,
    pub(crate) season_count: u32,
    pub(crate) season: Option<u32>,
    pub(crate) episode: Option<EpisodeRef>,
    pub(crate) episodes: Vec<(u32, String)>,
    pub(crate) active_source_name: Option<String>,
    pub(crate) active_url: Option<String>,
    pub(crate) candidates: Vec<CandidateView>,
}

#[cfg(test)]
impl SessionSnapshot {
    pub(crate) fn candidate_names(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.name.as_str()).collect()
    }
}
