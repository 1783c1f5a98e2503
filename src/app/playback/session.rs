use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{
    CandidateView, Effect, LoadOutcome, LoadTicket, PlayerEvent, ProbeResult, ProbeState,
    SessionSnapshot, SessionStatus, Ticket, TicketCounter,
};
use crate::app::library::{ProgressUpdate, WatchlistEntry};
use crate::app::media::{EpisodeRef, MediaKind, MediaRequest};
use crate::app::metadata::{EpisodeSummary, SeasonListing, TitleDetails};
use crate::app::sources::{ResolvedUrl, SourceRegistry, resolve_all};
use crate::error::{MetadataError, PlaybackError};

#[derive(Debug, Clone)]
struct PendingLoad {
    generation: Ticket,
    record_progress: bool,
}

/// Which source plays which title right now.
pub(crate) struct PlaybackSession {
    registry: Arc<SourceRegistry>,
    epochs: TicketCounter,
    batches: TicketCounter,
    generations: TicketCounter,
    status: SessionStatus,
    status_line: String,
    title_id: Option<String>,
    details: Option<TitleDetails>,
    season_count: u32,
    season: Option<u32>,
    episodes: Vec<EpisodeSummary>,
    request: Option<MediaRequest>,
    candidates: Vec<ResolvedUrl>,
    probes: HashMap<String, bool>,
    active: Option<String>,
    carried_source: Option<String>,
    pending_load: Option<PendingLoad>,
}

impl PlaybackSession {
    pub(crate) fn new(registry: Arc<SourceRegistry>) -> Self {
        Self {
            registry,
            epochs: TicketCounter::default(),
            batches: TicketCounter::default(),
            generations: TicketCounter::default(),
            status: SessionStatus::Idle,
            status_line: String::new(),
            title_id: None,
            details: None,
            season_count: 0,
            season: None,
            episodes: Vec::new(),
            request: None,
            candidates: Vec::new(),
            probes: HashMap::new(),
            active: None,
            carried_source: None,
            pending_load: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn status(&self) -> &SessionStatus {
        &self.status
    }

    #[cfg(test)]
    pub(crate) fn active_source(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub(crate) fn details(&self) -> Option<&TitleDetails> {
        self.details.as_ref()
    }

    /// Starts a new title, discarding whatever the session held before.
    pub(crate) fn open(&mut self, title_id: &str) -> Vec<Effect> {
        let mut effects = self.close();
        let title_id = title_id.trim();
        if title_id.is_empty() {
            self.status = SessionStatus::Unavailable("missing title id".to_string());
            self.status_line = "Could not fetch details for this title: missing title id".into();
            return effects;
        }

        let epoch = self.epochs.advance();
        self.title_id = Some(title_id.to_string());
        self.status = SessionStatus::Resolving;
        self.status_line = "Loading video sources...".to_string();
        debug!(title_id, ?epoch, "resolving title");
        effects.push(Effect::FetchDetails {
            epoch,
            title_id: title_id.to_string(),
        });
        effects
    }

    pub(crate) fn on_details(
        &mut self,
        epoch: Ticket,
        result: Result<TitleDetails, MetadataError>,
    ) -> Vec<Effect> {
        if epoch != self.epochs.current() || self.status != SessionStatus::Resolving {
            debug!(?epoch, "ignoring stale details");
            return Vec::new();
        }

        let details = match result {
            Ok(details) => details,
            Err(err) => {
                let err = PlaybackError::from(err);
                warn!(error = %err, "title details unavailable");
                self.status_line = capitalize(&err.to_string());
                self.status = SessionStatus::Unavailable(err.to_string());
                return Vec::new();
            }
        };

        let kind = details.kind;
        // The proxy may answer with its canonical id; later URLs use the one it returned.
        let title_id = details.title_id.clone();
        self.title_id = Some(title_id.clone());
        self.season_count = details.total_seasons.unwrap_or(1).max(1);
        self.details = Some(details);

        match kind {
            MediaKind::Movie => {
                self.request = Some(MediaRequest::movie(title_id));
                self.construct_candidates(None)
            }
            MediaKind::Series => {
                self.request = Some(MediaRequest::series(title_id));
                self.request_season(1)
            }
        }
    }

    pub(crate) fn select_season(&mut self, season: u32) -> Vec<Effect> {
        if !self.accepts_episode_navigation() {
            debug!(season, "season change ignored in current state");
            return Vec::new();
        }
        if season == 0 || season > self.season_count {
            debug!(season, count = self.season_count, "season out of range");
            return Vec::new();
        }
        self.request_season(season)
    }

    pub(crate) fn on_season(
        &mut self,
        epoch: Ticket,
        result: Result<SeasonListing, MetadataError>,
    ) -> Vec<Effect> {
        if epoch != self.epochs.current() || self.status != SessionStatus::ChoosingEpisode {
            debug!(?epoch, "ignoring stale season listing");
            return Vec::new();
        }
        let season = self.season.unwrap_or(1);

        let listing = match result {
            Ok(listing) => listing,
            // A missing season is not fatal; the viewer can still pick another one.
            Err(MetadataError::NotFound(detail)) => {
                debug!(season, %detail, "season has no listing");
                self.status = SessionStatus::NoEpisodes;
                self.status_line = "No episodes found for this season.".to_string();
                return Vec::new();
            }
            Err(err) => {
                warn!(season, error = %err, "season listing unavailable");
                self.status = SessionStatus::NoEpisodes;
                self.status_line = format!("Could not load season {season}: {err}");
                return Vec::new();
            }
        };

        self.episodes = listing.episodes;
        let Some(first) = self.episodes.first().map(|ep| ep.number) else {
            self.status = SessionStatus::NoEpisodes;
            self.status_line = "No episodes found for this season.".to_string();
            return Vec::new();
        };
        self.choose_episode(season, first)
    }

    pub(crate) fn select_episode(&mut self, episode: u32) -> Vec<Effect> {
        if !self.accepts_episode_navigation() || self.status == SessionStatus::ChoosingEpisode {
            debug!(episode, "episode change ignored in current state");
            return Vec::new();
        }
        let Some(season) = self.season else {
            return Vec::new();
        };
        if !self.episodes.iter().any(|ep| ep.number == episode) {
            debug!(season, episode, "episode not in season listing");
            return Vec::new();
        }
        self.choose_episode(season, episode)
    }

    /// Moves to the following episode, rolling into the next season when the
    /// current one is exhausted.
    pub(crate) fn select_next_episode(&mut self) -> Vec<Effect> {
        let Some(current) = self.current_episode() else {
            return Vec::new();
        };
        match self
            .episodes
            .iter()
            .find(|ep| ep.number > current.episode())
            .map(|ep| ep.number)
        {
            Some(next) => self.select_episode(next),
            None => self.select_season(current.season() + 1),
        }
    }

    pub(crate) fn select_previous_episode(&mut self) -> Vec<Effect> {
        let Some(current) = self.current_episode() else {
            return Vec::new();
        };
        match self
            .episodes
            .iter()
            .rev()
            .find(|ep| ep.number < current.episode())
            .map(|ep| ep.number)
        {
            Some(previous) => self.select_episode(previous),
            None => Vec::new(),
        }
    }

    /// Viewer picked a provider explicitly.
    pub(crate) fn select_source(&mut self, name: &str) -> Vec<Effect> {
        if !matches!(
            self.status,
            SessionStatus::Loading | SessionStatus::Playing | SessionStatus::NoSources
        ) {
            return Vec::new();
        }
        if !self.candidates.iter().any(|c| c.source.name() == name) {
            debug!(name, "source is not a candidate for this request");
            return Vec::new();
        }
        info!(source = name, "switching source on request");
        self.switch_to(name, true).into_iter().collect()
    }

    pub(crate) fn apply_probe(&mut self, result: ProbeResult) -> Vec<Effect> {
        if result.batch != self.batches.current() {
            debug!(source = %result.source, batch = ?result.batch, "ignoring stale probe");
            return Vec::new();
        }
        if !self.candidates.iter().any(|c| c.source.name() == result.source) {
            return Vec::new();
        }
        if result.available && self.probes.get(&result.source) == Some(&false) {
            // The player already failed this source; a reachable URL does not undo that.
            debug!(source = %result.source, "keeping load failure over late probe");
            return Vec::new();
        }
        self.probes.insert(result.source.clone(), result.available);

        let active_failed = !result.available
            && self.active.as_deref() == Some(result.source.as_str())
            && matches!(self.status, SessionStatus::Loading | SessionStatus::Playing);
        if active_failed {
            let err = PlaybackError::SourceUnreachable {
                provider: result.source,
            };
            info!(error = %err, "active source failed probe");
            return self.auto_advance();
        }
        Vec::new()
    }

    pub(crate) fn on_player_event(&mut self, event: PlayerEvent) -> Vec<Effect> {
        let Some(pending) = self
            .pending_load
            .as_ref()
            .filter(|p| p.generation == event.generation)
            .cloned()
        else {
            debug!(generation = ?event.generation, "ignoring stale player event");
            return Vec::new();
        };
        let Some(active) = self.active.clone() else {
            return Vec::new();
        };

        match event.outcome {
            LoadOutcome::Loaded => {
                if self.status != SessionStatus::Loading {
                    return Vec::new();
                }
                self.status = SessionStatus::Playing;
                self.status_line = format!("Video loaded from {active}{}", self.episode_suffix());
                if !pending.record_progress {
                    return Vec::new();
                }
                self.progress_update()
                    .map(Effect::RecordProgress)
                    .into_iter()
                    .collect()
            }
            LoadOutcome::Failed(reason) => {
                if !matches!(self.status, SessionStatus::Loading | SessionStatus::Playing) {
                    return Vec::new();
                }
                warn!(source = %active, %reason, "player failed to load source");
                self.probes.insert(active, false);
                self.auto_advance()
            }
        }
    }

    /// Returns the session to idle. Closing an idle session does nothing.
    pub(crate) fn close(&mut self) -> Vec<Effect> {
        if self.status == SessionStatus::Idle && self.title_id.is_none() {
            return Vec::new();
        }
        // Advancing every stream voids all in-flight completions.
        self.epochs.advance();
        self.batches.advance();
        self.generations.advance();
        self.status = SessionStatus::Idle;
        self.status_line.clear();
        self.title_id = None;
        self.details = None;
        self.season_count = 0;
        self.season = None;
        self.episodes.clear();
        self.request = None;
        self.candidates.clear();
        self.probes.clear();
        self.active = None;
        self.carried_source = None;
        self.pending_load = None;
        vec![Effect::ClearPlayer]
    }

    pub(crate) fn watchlist_entry(&self) -> Option<WatchlistEntry> {
        let details = self.details.as_ref()?;
        Some(WatchlistEntry {
            title_id: details.title_id.clone(),
            title: details.title.clone(),
            poster_url: details.poster_url.clone(),
        })
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        let active_url = self
            .active
            .as_deref()
            .and_then(|name| self.candidates.iter().find(|c| c.source.name() == name))
            .map(|c| c.url.clone());
        SessionSnapshot {
            status: self.status.clone(),
            status_line: self.status_line.clone(),
            title_id: self.title_id.clone(),
            title: self.details.as_ref().map(|d| d.title.clone()),
            kind: self.details.as_ref().map(|d| d.kind),
            season_count: self.season_count,
            season: self.season,
            episode: self.current_episode(),
            episodes: self
                .episodes
                .iter()
                .map(|ep| (ep.number, ep.title.clone()))
                .collect(),
            active_source_name: self.active.clone(),
            active_url,
            candidates: self
                .candidates
                .iter()
                .map(|c| CandidateView {
                    name: c.source.name().to_string(),
                    url: c.url.clone(),
                    probe: match self.probes.get(c.source.name()) {
                        None => ProbeState::Pending,
                        Some(true) => ProbeState::Available,
                        Some(false) => ProbeState::Unavailable,
                    },
                    active: self.active.as_deref() == Some(c.source.name()),
                })
                .collect(),
        }
    }

    fn accepts_episode_navigation(&self) -> bool {
        let is_series = self
            .details
            .as_ref()
            .is_some_and(|d| d.kind == MediaKind::Series);
        is_series
            && !matches!(
                self.status,
                SessionStatus::Idle | SessionStatus::Resolving | SessionStatus::Unavailable(_)
            )
    }

    fn current_episode(&self) -> Option<EpisodeRef> {
        self.request.as_ref().and_then(MediaRequest::chosen_episode)
    }

    fn request_season(&mut self, season: u32) -> Vec<Effect> {
        let Some(title_id) = self.title_id.clone() else {
            return Vec::new();
        };
        let mut effects = Vec::new();
        if let Some(active) = self.active.take() {
            self.carried_source = Some(active);
        }
        if !self.candidates.is_empty() || self.pending_load.is_some() {
            effects.push(Effect::ClearPlayer);
        }
        self.batches.advance();
        self.generations.advance();
        self.candidates.clear();
        self.probes.clear();
        self.pending_load = None;
        self.episodes.clear();
        self.request = Some(MediaRequest::series(title_id.clone()));

        let epoch = self.epochs.advance();
        self.season = Some(season);
        self.status = SessionStatus::ChoosingEpisode;
        self.status_line = format!("Loading episodes for season {season}...");
        effects.push(Effect::FetchSeason {
            epoch,
            title_id,
            season,
        });
        effects
    }

    fn choose_episode(&mut self, season: u32, episode: u32) -> Vec<Effect> {
        let (Some(title_id), Some(ep)) = (self.title_id.clone(), EpisodeRef::new(season, episode))
        else {
            return Vec::new();
        };
        let preferred = self.active.take().or_else(|| self.carried_source.take());
        self.request = Some(MediaRequest::episode(title_id, ep));
        self.construct_candidates(preferred)
    }

    fn construct_candidates(&mut self, preferred: Option<String>) -> Vec<Effect> {
        let batch = self.batches.advance();
        self.probes.clear();
        self.carried_source = None;
        self.candidates = match self.request.as_ref() {
            Some(request) => resolve_all(&self.registry, request),
            None => Vec::new(),
        };

        if self.candidates.is_empty() {
            self.generations.advance();
            self.active = None;
            self.pending_load = None;
            let err = PlaybackError::NoCandidateSource;
            info!(error = %err, "nothing can serve this request");
            self.status = SessionStatus::NoSources;
            self.status_line = "No video sources available.".to_string();
            return vec![Effect::ClearPlayer];
        }

        let registry_default = self
            .registry
            .default_source()
            .map(|s| s.name().to_string());
        let chosen = [preferred, registry_default]
            .into_iter()
            .flatten()
            .find(|name| self.candidates.iter().any(|c| c.source.name() == name.as_str()))
            .unwrap_or_else(|| self.candidates[0].source.name().to_string());

        debug!(
            candidates = self.candidates.len(),
            ?batch,
            active = %chosen,
            "constructed candidates"
        );

        let mut effects: Vec<Effect> = self.switch_to(&chosen, false).into_iter().collect();
        effects.extend(self.candidates.iter().map(|c| Effect::Probe {
            batch,
            source: c.source.name().to_string(),
            url: c.url.clone(),
        }));
        effects
    }

    fn switch_to(&mut self, name: &str, record_progress: bool) -> Option<Effect> {
        let url = self
            .candidates
            .iter()
            .find(|c| c.source.name() == name)?
            .url
            .clone();
        let generation = self.generations.advance();
        self.active = Some(name.to_string());
        self.pending_load = Some(PendingLoad {
            generation,
            record_progress,
        });
        self.status = SessionStatus::Loading;
        self.status_line = format!("Attempting to load from {name}{}...", self.episode_suffix());
        Some(Effect::Load(LoadTicket {
            generation,
            source: name.to_string(),
            url,
        }))
    }

    /// Moves off a failed active source to the next candidate, in registry
    /// order after the current one, that is not known to be unavailable.
    fn auto_advance(&mut self) -> Vec<Effect> {
        let current = self.active.clone().unwrap_or_default();
        let start = self
            .candidates
            .iter()
            .position(|c| c.source.name() == current)
            .map(|idx| idx + 1)
            .unwrap_or(0);
        let count = self.candidates.len();
        let next = (0..count)
            .map(|offset| &self.candidates[(start + offset) % count])
            .map(|c| c.source.name())
            .find(|name| *name != current && self.probes.get(*name) != Some(&false))
            .map(str::to_string);

        match next {
            Some(next) => {
                info!(from = %current, to = %next, "auto-advancing to next source");
                self.switch_to(&next, true).into_iter().collect()
            }
            None => {
                let err = PlaybackError::NoCandidateSource;
                warn!(source = %current, error = %err, "every candidate failed");
                self.status = SessionStatus::NoSources;
                self.status_line = "No video sources available.".to_string();
                Vec::new()
            }
        }
    }

    fn progress_update(&self) -> Option<ProgressUpdate> {
        let details = self.details.as_ref()?;
        let request = self.request.as_ref()?;
        let episode = request.chosen_episode();
        Some(ProgressUpdate {
            title_id: request.title_id().to_string(),
            title: details.title.clone(),
            poster_url: details.poster_url.clone(),
            kind: request.kind(),
            season: episode.map(EpisodeRef::season),
            episode: episode.map(EpisodeRef::episode),
        })
    }

    fn episode_suffix(&self) -> String {
        self.current_episode()
            .map(|ep| format!(" ({ep})"))
            .unwrap_or_default()
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::sources::SourceDescriptor;

    fn registry(preferred: Option<&str>) -> Arc<SourceRegistry> {
        Arc::new(SourceRegistry::from_sources(
            vec![
                SourceDescriptor::new("A", Some("https://a/"), Some("https://a/tv/"))
                    .expect("valid"),
                SourceDescriptor::new("B", Some("https://b/"), Some("https://b/tv/"))
                    .expect("valid"),
                SourceDescriptor::new("C", Some("https://c/"), None).expect("valid"),
            ],
            preferred,
        ))
    }

    fn movie(id: &str) -> TitleDetails {
        TitleDetails {
            title_id: id.to_string(),
            title: "A Movie".to_string(),
            kind: MediaKind::Movie,
            year: Some("2001".to_string()),
            plot: None,
            poster_url: Some("https://img/poster.jpg".to_string()),
            total_seasons: None,
        }
    }

    fn series(id: &str, seasons: u32) -> TitleDetails {
        TitleDetails {
            title_id: id.to_string(),
            title: "A Show".to_string(),
            kind: MediaKind::Series,
            year: None,
            plot: None,
            poster_url: None,
            total_seasons: Some(seasons),
        }
    }

    fn listing(season: u32, count: u32) -> SeasonListing {
        SeasonListing {
            season,
            episodes: (1..=count)
                .map(|number| EpisodeSummary {
                    number,
                    title: format!("Episode {number}"),
                })
                .collect(),
        }
    }

    fn details_epoch(effects: &[Effect]) -> Ticket {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::FetchDetails { epoch, .. } => Some(*epoch),
                _ => None,
            })
            .expect("details fetch requested")
    }

    fn season_epoch(effects: &[Effect]) -> Ticket {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::FetchSeason { epoch, .. } => Some(*epoch),
                _ => None,
            })
            .expect("season fetch requested")
    }

    fn load(effects: &[Effect]) -> Option<LoadTicket> {
        effects.iter().find_map(|e| match e {
            Effect::Load(ticket) => Some(ticket.clone()),
            _ => None,
        })
    }

    fn probe_batch(effects: &[Effect]) -> Ticket {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::Probe { batch, .. } => Some(*batch),
                _ => None,
            })
            .expect("probes dispatched")
    }

    fn open_movie(session: &mut PlaybackSession) -> Vec<Effect> {
        let effects = session.open("tt001");
        session.on_details(details_epoch(&effects), Ok(movie("tt001")))
    }

    #[test]
    fn movie_open_loads_default_and_probes_every_candidate() {
        let mut session = PlaybackSession::new(registry(Some("B")));
        let effects = open_movie(&mut session);

        let ticket = load(&effects).expect("load requested");
        assert_eq!(ticket.source, "B");
        assert_eq!(ticket.url, "https://b/tt001");
        let probed: Vec<&str> = effects
            .iter()
            .filter_map(|e| match e {
                Effect::Probe { source, .. } => Some(source.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(probed, vec!["A", "B", "C"]);
        assert!(matches!(effects[0], Effect::Load(_)));
        assert_eq!(session.status(), &SessionStatus::Loading);
    }

    #[test]
    fn series_candidates_skip_sources_without_series_template() {
        let mut session = PlaybackSession::new(registry(Some("C")));
        let effects = session.open("tt9");
        let effects = session.on_details(details_epoch(&effects), Ok(series("tt9", 2)));
        let effects = session.on_season(season_epoch(&effects), Ok(listing(1, 3)));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.candidate_names(), vec!["A", "B"]);
        let ticket = load(&effects).expect("load requested");
        assert_eq!(ticket.source, "A");
        assert_eq!(ticket.url, "https://a/tv/tt9-S1E1");
        assert_eq!(snapshot.episode, EpisodeRef::new(1, 1));
    }

    #[test]
    fn failed_active_probe_advances_to_available_alternative() {
        let mut session = PlaybackSession::new(registry(Some("A")));
        let effects = open_movie(&mut session);
        let batch = probe_batch(&effects);

        session.apply_probe(ProbeResult {
            batch,
            source: "B".to_string(),
            available: true,
        });
        let effects = session.apply_probe(ProbeResult {
            batch,
            source: "A".to_string(),
            available: false,
        });

        assert_eq!(load(&effects).map(|t| t.source), Some("B".to_string()));
        assert_eq!(session.active_source(), Some("B"));
    }

    #[test]
    fn auto_advance_skips_known_unavailable_sources() {
        let mut session = PlaybackSession::new(registry(Some("A")));
        let effects = open_movie(&mut session);
        let batch = probe_batch(&effects);

        session.apply_probe(ProbeResult {
            batch,
            source: "B".to_string(),
            available: false,
        });
        let effects = session.apply_probe(ProbeResult {
            batch,
            source: "A".to_string(),
            available: false,
        });
        assert_eq!(load(&effects).map(|t| t.source), Some("C".to_string()));
    }

    #[test]
    fn exhausted_candidates_stay_on_last_source_with_terminal_status() {
        let mut session = PlaybackSession::new(registry(Some("A")));
        let effects = open_movie(&mut session);
        let batch = probe_batch(&effects);

        for name in ["B", "C"] {
            session.apply_probe(ProbeResult {
                batch,
                source: name.to_string(),
                available: false,
            });
        }
        let effects = session.apply_probe(ProbeResult {
            batch,
            source: "A".to_string(),
            available: false,
        });

        assert!(effects.is_empty());
        assert_eq!(session.status(), &SessionStatus::NoSources);
        assert_eq!(session.active_source(), Some("A"));
        assert_eq!(session.snapshot().status_line, "No video sources available.");
    }

    #[test]
    fn stale_probe_batch_is_ignored_after_season_change() {
        let mut session = PlaybackSession::new(registry(None));
        let effects = session.open("tt9");
        let effects = session.on_details(details_epoch(&effects), Ok(series("tt9", 2)));
        let effects = session.on_season(season_epoch(&effects), Ok(listing(1, 2)));
        let old_batch = probe_batch(&effects);

        let effects = session.select_season(2);
        let effects = session.on_season(season_epoch(&effects), Ok(listing(2, 4)));
        let before = session.snapshot();
        assert_ne!(probe_batch(&effects), old_batch);

        let effects = session.apply_probe(ProbeResult {
            batch: old_batch,
            source: "A".to_string(),
            available: false,
        });
        assert!(effects.is_empty());
        assert_eq!(session.snapshot(), before);
    }

    #[test]
    fn episode_change_keeps_previous_source_when_still_a_candidate() {
        let mut session = PlaybackSession::new(registry(Some("A")));
        let effects = session.open("tt9");
        let effects = session.on_details(details_epoch(&effects), Ok(series("tt9", 1)));
        session.on_season(season_epoch(&effects), Ok(listing(1, 3)));
        session.select_source("B");

        let effects = session.select_episode(3);
        let ticket = load(&effects).expect("reloaded");
        assert_eq!(ticket.source, "B");
        assert_eq!(ticket.url, "https://b/tv/tt9-S1E3");
        assert!(session.snapshot().candidates.iter().all(|c| c.probe == ProbeState::Pending));
    }

    #[test]
    fn season_change_carries_source_across_the_listing_fetch() {
        let mut session = PlaybackSession::new(registry(Some("A")));
        let effects = session.open("tt9");
        let effects = session.on_details(details_epoch(&effects), Ok(series("tt9", 3)));
        session.on_season(season_epoch(&effects), Ok(listing(1, 3)));
        session.select_source("B");

        let effects = session.select_season(3);
        assert!(effects.contains(&Effect::ClearPlayer));
        assert_eq!(session.active_source(), None);
        let effects = session.on_season(season_epoch(&effects), Ok(listing(3, 2)));
        assert_eq!(load(&effects).map(|t| t.source), Some("B".to_string()));
    }

    #[test]
    fn next_episode_rolls_into_following_season() {
        let mut session = PlaybackSession::new(registry(None));
        let effects = session.open("tt9");
        let effects = session.on_details(details_epoch(&effects), Ok(series("tt9", 2)));
        session.on_season(season_epoch(&effects), Ok(listing(1, 2)));

        let effects = session.select_next_episode();
        assert_eq!(load(&effects).map(|t| t.url), Some("https://a/tv/tt9-S1E2".to_string()));
        let effects = session.select_next_episode();
        assert!(matches!(effects.last(), Some(Effect::FetchSeason { season: 2, .. })));
        assert!(session.select_next_episode().is_empty());
    }

    #[test]
    fn empty_season_surfaces_message_without_candidates() {
        let mut session = PlaybackSession::new(registry(None));
        let effects = session.open("tt9");
        let effects = session.on_details(details_epoch(&effects), Ok(series("tt9", 2)));
        let effects = session.on_season(season_epoch(&effects), Ok(listing(1, 0)));

        assert!(effects.is_empty());
        assert_eq!(session.status(), &SessionStatus::NoEpisodes);
        assert!(session.snapshot().candidates.is_empty());
        assert!(!session.select_season(2).is_empty());
    }

    #[test]
    fn failed_season_listing_keeps_season_navigation_open() {
        let mut session = PlaybackSession::new(registry(None));
        let effects = session.open("tt9");
        let effects = session.on_details(details_epoch(&effects), Ok(series("tt9", 3)));
        session.on_season(season_epoch(&effects), Ok(listing(1, 2)));

        let effects = session.select_season(2);
        let effects = session.on_season(
            season_epoch(&effects),
            Err(MetadataError::NotFound("Series or season not found!".to_string())),
        );
        assert!(effects.is_empty());
        assert_eq!(session.status(), &SessionStatus::NoEpisodes);
        assert_eq!(
            session.snapshot().status_line,
            "No episodes found for this season."
        );

        let effects = session.select_season(3);
        assert!(matches!(effects.last(), Some(Effect::FetchSeason { season: 3, .. })));
        let effects = session.on_season(
            season_epoch(&effects),
            Err(MetadataError::Transport("HTTP status 502".to_string())),
        );
        assert!(effects.is_empty());
        assert_eq!(session.status(), &SessionStatus::NoEpisodes);
        assert!(session.snapshot().status_line.starts_with("Could not load season 3"));

        let effects = session.select_season(1);
        let effects = session.on_season(season_epoch(&effects), Ok(listing(1, 2)));
        assert_eq!(load(&effects).map(|t| t.url), Some("https://a/tv/tt9-S1E1".to_string()));
    }

    #[test]
    fn late_available_probe_does_not_revive_a_failed_load() {
        let mut session = PlaybackSession::new(registry(Some("A")));
        let effects = open_movie(&mut session);
        let batch = probe_batch(&effects);
        let first = load(&effects).expect("initial load");

        session.on_player_event(PlayerEvent {
            generation: first.generation,
            outcome: LoadOutcome::Failed("opener exited 1".to_string()),
        });
        assert_eq!(session.active_source(), Some("B"));

        let effects = session.apply_probe(ProbeResult {
            batch,
            source: "A".to_string(),
            available: true,
        });
        assert!(effects.is_empty());
        assert_eq!(session.snapshot().candidates[0].probe, ProbeState::Unavailable);

        // B fails too; auto-advance must not go back to A.
        let effects = session.apply_probe(ProbeResult {
            batch,
            source: "B".to_string(),
            available: false,
        });
        assert_eq!(load(&effects).map(|t| t.source), Some("C".to_string()));
    }

    #[test]
    fn metadata_failure_is_terminal_until_reopened() {
        let mut session = PlaybackSession::new(registry(None));
        let effects = session.open("tt404");
        let effects = session.on_details(
            details_epoch(&effects),
            Err(MetadataError::NotFound("Incorrect IMDb ID.".to_string())),
        );
        assert!(effects.is_empty());
        assert!(matches!(session.status(), SessionStatus::Unavailable(_)));
        assert_eq!(
            session.snapshot().status_line,
            "Could not fetch details for this title: Incorrect IMDb ID."
        );
        assert!(session.select_season(1).is_empty());
    }

    #[test]
    fn no_candidates_reports_no_sources_without_loading() {
        let movie_only = Arc::new(SourceRegistry::from_sources(
            vec![SourceDescriptor::new("C", Some("https://c/"), None).expect("valid")],
            None,
        ));
        let mut session = PlaybackSession::new(movie_only);
        let effects = session.open("tt9");
        let effects = session.on_details(details_epoch(&effects), Ok(series("tt9", 1)));
        let effects = session.on_season(season_epoch(&effects), Ok(listing(1, 1)));

        assert!(load(&effects).is_none());
        assert_eq!(session.status(), &SessionStatus::NoSources);
        assert_eq!(session.active_source(), None);
    }

    #[test]
    fn explicit_switch_records_progress_only_after_confirmed_load() {
        let mut session = PlaybackSession::new(registry(Some("A")));
        let effects = open_movie(&mut session);
        let initial = load(&effects).expect("initial load");
        assert!(
            session
                .on_player_event(PlayerEvent {
                    generation: initial.generation,
                    outcome: LoadOutcome::Loaded,
                })
                .is_empty()
        );
        assert_eq!(session.status(), &SessionStatus::Playing);

        let effects = session.select_source("C");
        let switched = load(&effects).expect("switch load");
        let effects = session.on_player_event(PlayerEvent {
            generation: switched.generation,
            outcome: LoadOutcome::Loaded,
        });
        let Some(Effect::RecordProgress(update)) = effects.first() else {
            panic!("expected progress record, got {effects:?}");
        };
        assert_eq!(update.title_id, "tt001");
        assert_eq!(update.kind, MediaKind::Movie);
        assert_eq!(update.season, None);
    }

    #[test]
    fn events_from_superseded_load_are_ignored() {
        let mut session = PlaybackSession::new(registry(Some("A")));
        let effects = open_movie(&mut session);
        let first = load(&effects).expect("initial load");
        session.select_source("B");

        let effects = session.on_player_event(PlayerEvent {
            generation: first.generation,
            outcome: LoadOutcome::Failed("boom".to_string()),
        });
        assert!(effects.is_empty());
        assert_eq!(session.active_source(), Some("B"));
        assert_eq!(session.status(), &SessionStatus::Loading);
    }

    #[test]
    fn player_failure_marks_source_unavailable_and_advances() {
        let mut session = PlaybackSession::new(registry(Some("A")));
        let effects = open_movie(&mut session);
        let first = load(&effects).expect("initial load");

        let effects = session.on_player_event(PlayerEvent {
            generation: first.generation,
            outcome: LoadOutcome::Failed("opener exited 1".to_string()),
        });
        assert_eq!(load(&effects).map(|t| t.source), Some("B".to_string()));
        let snapshot = session.snapshot();
        assert_eq!(snapshot.candidates[0].probe, ProbeState::Unavailable);
    }

    #[test]
    fn close_is_idempotent_and_voids_in_flight_work() {
        let mut session = PlaybackSession::new(registry(None));
        assert!(session.close().is_empty());

        let effects = open_movie(&mut session);
        let batch = probe_batch(&effects);
        assert_eq!(session.close(), vec![Effect::ClearPlayer]);
        assert!(session.close().is_empty());
        assert_eq!(session.status(), &SessionStatus::Idle);

        let effects = session.apply_probe(ProbeResult {
            batch,
            source: "A".to_string(),
            available: false,
        });
        assert!(effects.is_empty());
        assert_eq!(session.active_source(), None);
    }

    #[test]
    fn details_for_superseded_open_are_ignored() {
        let mut session = PlaybackSession::new(registry(None));
        let first = session.open("tt001");
        let second = session.open("tt002");
        assert!(
            session
                .on_details(details_epoch(&first), Ok(movie("tt001")))
                .is_empty()
        );
        let effects = session.on_details(details_epoch(&second), Ok(movie("tt002")));
        assert_eq!(load(&effects).map(|t| t.url), Some("https://a/tt002".to_string()));
    }

    #[test]
    fn watchlist_entry_uses_fetched_details() {
        let mut session = PlaybackSession::new(registry(None));
        assert!(session.watchlist_entry().is_none());
        open_movie(&mut session);
        let entry = session.watchlist_entry().expect("details known");
        assert_eq!(entry.title_id, "tt001");
        assert_eq!(entry.poster_url.as_deref(), Some("https://img/poster.jpg"));
    }
}
