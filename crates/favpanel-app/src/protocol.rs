// Messages flowing into and out of the engine.

use favpanel_core::Game;

/// Notifications from the host page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// Structural change somewhere in the document.
    Mutation,
    /// The host's client-side navigation entry point (`pushState`) ran.
    HistoryPush,
    /// `replaceState` ran.
    HistoryReplace,
    /// Browser back/forward.
    PopState,
    /// A click. `classes` holds the class lists of the clicked element and
    /// its ancestors, innermost first.
    Click { classes: Vec<String> },
    /// Stop the engine.
    Shutdown,
}

impl HostEvent {
    pub fn click<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        HostEvent::Click {
            classes: classes.into_iter().map(Into::into).collect(),
        }
    }
}

/// Result of one listing request, tagged with the session that issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchEvent {
    pub generation: u64,
    pub profile_id: String,
    /// Empty both when the profile has no qualifying games and when the
    /// request failed.
    pub games: Vec<Game>,
}

/// How a run ended. Every variant except `Mounted` leaves no panel on the
/// page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Mounted {
        profile_id: String,
        generation: u64,
        cards: usize,
    },
    /// Another run was in progress; this one was skipped.
    Busy,
    /// The current location is not a profile.
    NoProfile,
    /// Nothing to show (no qualifying games, or the request failed).
    Empty { profile_id: String },
    /// The user navigated to another profile before the panel could mount.
    Stale { profile_id: String },
    /// The mount anchors never appeared within the retry budget.
    MountTimeout { profile_id: String },
    /// The host page refused the insert.
    Aborted { profile_id: String, reason: String },
}

impl RunOutcome {
    pub fn is_mounted(&self) -> bool {
        matches!(self, RunOutcome::Mounted { .. })
    }
}
