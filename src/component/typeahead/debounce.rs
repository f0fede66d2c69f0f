use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::actions::{Action, ActionSender};

/// Single-shot timer that delivers an action once the delay elapses without
/// being re-armed.
///
/// Every arm gets a fresh id. The action built for it carries that id so a
/// tick that was already queued when the timer got re-armed or cancelled can
/// be recognised and dropped with [`Debouncer::fire`].
#[derive(Debug, Default)]
pub(crate) struct Debouncer {
    armed: Option<(u64, CancellationToken)>,
    next_id: u64,
}

impl Debouncer {
    /// Cancel any pending tick and schedule a new one.
    pub fn arm<F>(&mut self, delay: Duration, tx: ActionSender, make_action: F) -> u64
    where
        F: FnOnce(u64) -> Action,
    {
        self.cancel();
        self.next_id += 1;
        let id = self.next_id;
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let action = make_action(id);
        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(delay) => tx.send(action),
            }
        });
        debug!(id, ?delay, "debounce armed");
        self.armed = Some((id, token));
        id
    }

    /// Returns whether a pending tick was cancelled.
    pub fn cancel(&mut self) -> bool {
        match self.armed.take() {
            Some((id, token)) => {
                token.cancel();
                debug!(id, "debounce cancelled");
                true
            }
            None => false,
        }
    }

    /// Consume the tick with the given id. False for ticks of superseded arms.
    pub fn fire(&mut self, id: u64) -> bool {
        match &self.armed {
            Some((armed_id, _)) if *armed_id == id => {
                self.armed = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
