//! Focus bookkeeping and detection of gestures outside a widget.
//!
//! Widgets never talk to each other directly. A widget that needs to know when
//! the user presses escape or leaves it subscribes to the [`GestureHub`] under
//! its own id and gets [`Action::OutsideGesture`] actions back through the
//! normal action channel. The subscription ends when the returned guard is
//! dropped, so a torn-down widget can not leak a handler.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, trace};

use crate::actions::{Action, ActionSender};

use crate::component::typeahead::FOCUS_SETTLE_DELAY;

/// Handle of a focusable element: the owning component and the element name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ElementRef {
    pub owner: u64,
    pub element: &'static str,
}

impl ElementRef {
    pub fn new(owner: u64, element: &'static str) -> Self {
        Self { owner, element }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Gesture {
    Escape,
    FocusOut,
}

#[derive(Clone, Default)]
pub struct GestureHub {
    subscribers: Arc<Mutex<HashMap<u64, ActionSender>>>,
}

impl std::fmt::Debug for GestureHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GestureHub")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl GestureHub {
    fn lock(&self) -> MutexGuard<'_, HashMap<u64, ActionSender>> {
        // the map stays consistent even if a holder panicked
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start delivering gestures for `owner` until the guard is dropped.
    pub fn subscribe(&self, owner: u64, tx: ActionSender) -> GestureSubscription {
        trace!(owner, "gesture subscription added");
        self.lock().insert(owner, tx);
        GestureSubscription {
            owner,
            hub: self.clone(),
        }
    }

    /// Deliver a gesture to a single subscriber, if it is still subscribed.
    pub fn notify(&self, owner: u64, gesture: Gesture) {
        if let Some(tx) = self.lock().get(&owner) {
            tx.send(Action::OutsideGesture { owner, gesture });
        }
    }

    /// Deliver a gesture to every subscriber.
    pub fn broadcast(&self, gesture: Gesture) {
        let subscribers = self.lock();
        debug!(%gesture, receivers = subscribers.len(), "broadcasting gesture");
        for (owner, tx) in subscribers.iter() {
            tx.send(Action::OutsideGesture {
                owner: *owner,
                gesture,
            });
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn unsubscribe(&self, owner: u64) {
        trace!(owner, "gesture subscription removed");
        self.lock().remove(&owner);
    }
}

/// Keeps a gesture subscription alive.
#[must_use]
#[derive(Debug)]
pub struct GestureSubscription {
    owner: u64,
    hub: GestureHub,
}

impl Drop for GestureSubscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.owner);
    }
}

/// Tracks which element holds keyboard focus.
///
/// Moving focus to an element of another owner counts as a focus-out for the
/// previous owner.
#[derive(Debug, Default)]
pub struct FocusManager {
    current: Option<ElementRef>,
    gestures: GestureHub,
}

impl FocusManager {
    pub fn new(gestures: GestureHub) -> Self {
        Self {
            current: None,
            gestures,
        }
    }

    pub fn set_focus(&mut self, target: ElementRef) {
        if let Some(previous) = self.current {
            if previous.owner != target.owner {
                self.gestures.notify(previous.owner, Gesture::FocusOut);
            }
        }
        debug!(owner = target.owner, element = target.element, "focus moved");
        self.current = Some(target);
    }

    pub fn focused_owner(&self) -> Option<u64> {
        self.current.map(|el| el.owner)
    }
}

/// Ask for focus to move to `target` once the screen had time to redraw.
///
/// The move is called off when the returned guard is dropped first.
#[must_use]
pub fn focus_after_settle(tx: ActionSender, target: ElementRef) -> DropGuard {
    let token = CancellationToken::new();
    let cancelled = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = cancelled.cancelled() => {
                trace!(owner = target.owner, element = target.element, "settle focus called off");
            }
            _ = tokio::time::sleep(FOCUS_SETTLE_DELAY) => tx.send(Action::Focus(target)),
        }
    });
    token.drop_guard()
}
