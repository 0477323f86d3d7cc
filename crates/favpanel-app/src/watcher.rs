// Navigation detection.
//
// The host is a single-page app: route changes rewrite the document in
// place. The watcher turns the raw host notifications into two actions,
// "schedule a (debounced) run" and "clear the panel right now". Until the
// host's app root exists it only waits for it to appear.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use favpanel_core::{Anchor, HostPage};

use crate::protocol::HostEvent;

/// Classes of host controls that navigate. A click on any element (or
/// ancestor) carrying one of these removes the panel immediately, ahead of
/// the host's own re-render.
pub const NAV_CONTROL_CLASSES: &[&str] = &[
    "btn",
    "btn-small",
    "btn-general",
    "nav-link",
    "game-card-link",
    "secondary-link",
    "open-review-link",
    "comments-link",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// `start` not called yet.
    Stopped,
    /// Waiting for the host app root to appear.
    AwaitingRoot,
    /// Root seen; history events, and mutations once a profile has
    /// rendered, schedule a run.
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchAction {
    Schedule,
    ClearFragment,
}

#[derive(Debug)]
pub struct NavigationWatcher {
    state: WatchState,
}

impl Default for NavigationWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationWatcher {
    pub fn new() -> Self {
        NavigationWatcher {
            state: WatchState::Stopped,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Begin watching. Idempotent: only the first call has any effect, and
    /// it always schedules the load-time run.
    pub fn start<P: HostPage + ?Sized>(&mut self, page: &P) -> Option<WatchAction> {
        if self.state != WatchState::Stopped {
            return None;
        }
        self.state = if page.contains(Anchor::AppRoot) {
            WatchState::Active
        } else {
            WatchState::AwaitingRoot
        };
        debug!(state = ?self.state, "navigation watcher started");
        Some(WatchAction::Schedule)
    }

    pub fn handle<P: HostPage + ?Sized>(&mut self, page: &P, event: &HostEvent) -> Option<WatchAction> {
        if self.state == WatchState::Stopped {
            return None;
        }

        match event {
            HostEvent::Mutation => {
                if self.state == WatchState::AwaitingRoot {
                    if !page.contains(Anchor::AppRoot) {
                        return None;
                    }
                    self.state = WatchState::Active;
                    debug!("app root appeared");
                }
                // A profile view is only worth a run once its stats block
                // has rendered.
                page.contains(Anchor::ProfileStats).then_some(WatchAction::Schedule)
            }
            HostEvent::HistoryPush | HostEvent::HistoryReplace | HostEvent::PopState => {
                Some(WatchAction::Schedule)
            }
            HostEvent::Click { classes } if is_navigation_control(classes.as_slice()) => {
                Some(WatchAction::ClearFragment)
            }
            HostEvent::Click { .. } | HostEvent::Shutdown => None,
        }
    }
}

/// Whether a click on an element with these classes (its own and its
/// ancestors') is a navigation.
pub fn is_navigation_control<S: AsRef<str>>(classes: &[S]) -> bool {
    classes
        .iter()
        .flat_map(|c| c.as_ref().split_whitespace())
        .any(|c| NAV_CONTROL_CLASSES.contains(&c))
}

// ---------------------------------------------------------------------------
// Debouncer
// ---------------------------------------------------------------------------

/// Trailing-edge debounce: each `schedule` pushes the deadline back, and
/// the run fires once the deadline passes with no further triggers.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Debouncer {
            delay,
            deadline: None,
        }
    }

    pub fn schedule(&mut self) {
        self.deadline = Some(Instant::now() + self.delay);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Mark the pending run as fired.
    pub fn clear(&mut self) {
        self.deadline = None;
    }

    /// Wait for the deadline. Pending forever when nothing is scheduled.
    pub async fn elapsed(&self) {
        sleep_until(self.deadline).await
    }
}

/// `sleep_until` for an optional deadline; `None` never completes.
pub(crate) async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
