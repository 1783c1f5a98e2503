use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::{
    Effect, PlaybackSession, Player, PlayerEvent, PlayerEvents, ProbeResult, SessionSnapshot,
    Ticket,
};
use crate::app::library::{Library, Medium};
use crate::app::metadata::{MetadataService, SeasonListing, TitleDetails};
use crate::app::probe::AvailabilityProbe;
use crate::app::sources::SourceRegistry;
use crate::error::MetadataError;

/// Results coming back from worker threads and the player.
pub(crate) enum Completion {
    Details {
        epoch: Ticket,
        result: Result<TitleDetails, MetadataError>,
    },
    Season {
        epoch: Ticket,
        season: u32,
        result: Result<SeasonListing, MetadataError>,
    },
    Probe(ProbeResult),
    Player(PlayerEvent),
    PlayerDropped,
}

/// Owns a [`PlaybackSession`] and performs the effects it asks for.
///
/// Network work runs on short-lived threads; every completion is delivered
/// back here through one channel and applied on the owning thread, so the
/// session itself is never shared.
pub(crate) struct Driver<M: Medium> {
    session: PlaybackSession,
    library: Library<M>,
    metadata: Arc<dyn MetadataService>,
    probe: Arc<dyn AvailabilityProbe>,
    player: Box<dyn Player>,
    tx: mpsc::Sender<Completion>,
    rx: mpsc::Receiver<Completion>,
    in_flight: usize,
}

impl<M: Medium> Driver<M> {
    pub(crate) fn new(
        registry: Arc<SourceRegistry>,
        library: Library<M>,
        metadata: Arc<dyn MetadataService>,
        probe: Arc<dyn AvailabilityProbe>,
        player: Box<dyn Player>,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            session: PlaybackSession::new(registry),
            library,
            metadata,
            probe,
            player,
            tx,
            rx,
            in_flight: 0,
        }
    }

    pub(crate) fn library(&self) -> &Library<M> {
        &self.library
    }

    pub(crate) fn metadata(&self) -> Arc<dyn MetadataService> {
        Arc::clone(&self.metadata)
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.in_flight > 0
    }

    pub(crate) fn open(&mut self, title_id: &str) {
        info!(title_id, "opening title");
        let effects = self.session.open(title_id);
        self.execute(effects);
    }

    pub(crate) fn select_season(&mut self, season: u32) {
        let effects = self.session.select_season(season);
        self.execute(effects);
    }

    pub(crate) fn select_episode(&mut self, episode: u32) {
        let effects = self.session.select_episode(episode);
        self.execute(effects);
    }

    pub(crate) fn select_next_episode(&mut self) {
        let effects = self.session.select_next_episode();
        self.execute(effects);
    }

    pub(crate) fn select_previous_episode(&mut self) {
        let effects = self.session.select_previous_episode();
        self.execute(effects);
    }

    pub(crate) fn select_source(&mut self, name: &str) {
        let effects = self.session.select_source(name);
        self.execute(effects);
    }

    pub(crate) fn close(&mut self) {
        let effects = self.session.close();
        self.execute(effects);
    }

    /// Adds the open title to the watchlist, or removes it. Returns the new
    /// membership, or `None` when no title details are loaded.
    pub(crate) fn toggle_watchlist(&mut self) -> Option<bool> {
        let entry = self.session.watchlist_entry()?;
        Some(self.library.toggle_watchlist(entry))
    }

    pub(crate) fn in_watchlist(&self) -> bool {
        self.session
            .details()
            .is_some_and(|d| self.library.is_in_watchlist(&d.title_id))
    }

    /// Applies every completion that has already arrived. Returns whether
    /// anything was applied.
    pub(crate) fn pump(&mut self) -> bool {
        let mut applied = false;
        while let Ok(completion) = self.rx.try_recv() {
            self.apply(completion);
            applied = true;
        }
        applied
    }

    /// Blocks until no work is outstanding or the timeout elapses. Returns
    /// whether the driver went quiet.
    pub(crate) fn settle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!(in_flight = self.in_flight, "settle timed out");
                return false;
            }
            match self.rx.recv_timeout(remaining) {
                Ok(completion) => self.apply(completion),
                Err(mpsc::RecvTimeoutError::Timeout) => return false,
                Err(mpsc::RecvTimeoutError::Disconnected) => return false,
            }
        }
        self.pump();
        true
    }

    fn apply(&mut self, completion: Completion) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let effects = match completion {
            Completion::Details { epoch, result } => self.session.on_details(epoch, result),
            Completion::Season {
                epoch,
                season,
                result,
            } => {
                debug!(season, "season listing arrived");
                self.session.on_season(epoch, result)
            }
            Completion::Probe(result) => self.session.apply_probe(result),
            Completion::Player(event) => self.session.on_player_event(event),
            Completion::PlayerDropped => Vec::new(),
        };
        self.execute(effects);
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::FetchDetails { epoch, title_id } => {
                    let metadata = Arc::clone(&self.metadata);
                    self.spawn(move || Completion::Details {
                        epoch,
                        result: metadata.lookup_by_id(&title_id),
                    });
                }
                Effect::FetchSeason {
                    epoch,
                    title_id,
                    season,
                } => {
                    let metadata = Arc::clone(&self.metadata);
                    self.spawn(move || Completion::Season {
                        epoch,
                        season,
                        result: metadata.list_season(&title_id, season),
                    });
                }
                Effect::Probe { batch, source, url } => {
                    let probe = Arc::clone(&self.probe);
                    self.spawn(move || {
                        let available = probe.check(&url);
                        Completion::Probe(ProbeResult {
                            batch,
                            source,
                            available,
                        })
                    });
                }
                Effect::Load(ticket) => {
                    debug!(source = %ticket.source, url = %ticket.url, "loading source");
                    self.in_flight += 1;
                    let events = PlayerEvents::new(ticket.generation, self.tx.clone());
                    self.player.load(&ticket, events);
                }
                Effect::ClearPlayer => self.player.clear(),
                Effect::RecordProgress(update) => {
                    let entry = self.library.upsert_continue_watching(update);
                    debug!(title_id = %entry.title_id, "recorded continue watching entry");
                }
            }
        }
    }

    fn spawn<F>(&mut self, work: F)
    where
        F: FnOnce() -> Completion + Send + 'static,
    {
        self.in_flight += 1;
        let tx = self.tx.clone();
        std::thread::spawn(move || {
            let _ = tx.send(work());
        });
    }
}
