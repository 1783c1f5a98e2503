use std::process::{Command as ProcessCommand, Stdio};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use super::driver::Completion;
use super::{LoadOutcome, LoadTicket, PlayerEvent, Ticket};

/// The single player slot. A new `load` replaces whatever was there; only the
/// latest load may report back.
pub(crate) trait Player {
    fn load(&mut self, ticket: &LoadTicket, events: PlayerEvents);
    fn clear(&mut self);
}

/// One-shot reply handle for a load. Dropping it unanswered still releases the
/// driver's in-flight count, so a player may simply forget superseded loads.
pub(crate) struct PlayerEvents {
    generation: Ticket,
    tx: Option<mpsc::Sender<Completion>>,
}

impl PlayerEvents {
    pub(super) fn new(generation: Ticket, tx: mpsc::Sender<Completion>) -> Self {
        Self {
            generation,
            tx: Some(tx),
        }
    }

    pub(crate) fn generation(&self) -> Ticket {
        self.generation
    }

    pub(crate) fn loaded(self) {
        self.finish(LoadOutcome::Loaded);
    }

    pub(crate) fn failed(self, reason: impl Into<String>) {
        self.finish(LoadOutcome::Failed(reason.into()));
    }

    fn finish(mut self, outcome: LoadOutcome) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Completion::Player(PlayerEvent {
                generation: self.generation,
                outcome,
            }));
        }
    }
}

impl Drop for PlayerEvents {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Completion::PlayerDropped);
        }
    }
}

/// Hands URLs to an external opener (`xdg-open`, a browser, mpv...). The load
/// counts as confirmed once the opener exits successfully.
pub(crate) struct ExternalPlayer {
    opener: Vec<String>,
    current: Arc<Mutex<Option<Ticket>>>,
}

impl ExternalPlayer {
    pub(crate) fn new(opener: &str) -> Self {
        Self {
            opener: opener.split_whitespace().map(str::to_string).collect(),
            current: Arc::new(Mutex::new(None)),
        }
    }

    fn set_current(&self, generation: Option<Ticket>) {
        if let Ok(mut current) = self.current.lock() {
            *current = generation;
        }
    }
}

impl Player for ExternalPlayer {
    fn load(&mut self, ticket: &LoadTicket, events: PlayerEvents) {
        self.set_current(Some(ticket.generation));
        let Some((program, args)) = self.opener.split_first() else {
            debug!(url = %ticket.url, "no opener configured; treating load as confirmed");
            events.loaded();
            return;
        };

        let mut cmd = ProcessCommand::new(program);
        cmd.args(args)
            .arg(&ticket.url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(program = %program, error = %err, "failed to spawn opener");
                events.failed(format!("failed to spawn {program}: {err}"));
                return;
            }
        };

        let current = Arc::clone(&self.current);
        let source = ticket.source.clone();
        std::thread::spawn(move || {
            let status = child.wait();
            let still_current = current
                .lock()
                .map(|current| *current == Some(events.generation()))
                .unwrap_or(false);
            if !still_current {
                debug!(source = %source, "opener finished for a superseded load");
                return;
            }
            match status {
                Ok(status) if status.success() => events.loaded(),
                Ok(status) => events.failed(format!("opener exited with {status}")),
                Err(err) => events.failed(format!("failed to wait for opener: {err}")),
            }
        });
    }

    fn clear(&mut self) {
        self.set_current(None);
    }
}
