// One attempt to show the panel for the current profile.
//
// A session starts when a debounced navigation fires and ends on exactly
// one terminal outcome (mounted, empty, stale, timeout, aborted) or when
// the user navigates away. Only one session is active at a time; further
// triggers while one is active are skipped. The generation counter tags
// every session so results from abandoned ones are discarded.

use tracing::{debug, info, warn};

use favpanel_core::page::current_profile_id;
use favpanel_core::render::{mount, Fragment, PanelRenderer};
use favpanel_core::HostPage;

use crate::protocol::{FetchEvent, RunOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub profile_id: String,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Begin {
    Started(Session),
    Busy,
    NoProfile,
}

/// A rendered panel waiting for its anchors.
#[derive(Debug, Clone)]
pub struct PendingMount {
    session: Session,
    fragment: Fragment,
    attempts: u32,
}

impl PendingMount {
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[derive(Debug)]
pub enum FetchVerdict {
    /// Result belongs to an abandoned session.
    Ignored,
    Finished(RunOutcome),
    Mount(PendingMount),
}

#[derive(Debug)]
pub enum MountStep {
    Done(RunOutcome),
    /// Anchors not there yet; try again after the retry interval.
    Retry(PendingMount),
    /// The session was abandoned while waiting.
    Dropped,
}

pub struct SessionController {
    renderer: PanelRenderer,
    generation: u64,
    active: Option<Session>,
    retry_limit: u32,
}

impl SessionController {
    pub fn new(renderer: PanelRenderer, retry_limit: u32) -> Self {
        SessionController {
            renderer,
            generation: 0,
            active: None,
            retry_limit,
        }
    }

    pub fn active(&self) -> Option<&Session> {
        self.active.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start a session for the profile on screen. Any panel already on the
    /// page is removed first.
    pub fn begin<P: HostPage + ?Sized>(&mut self, page: &mut P) -> Begin {
        if let Some(active) = &self.active {
            debug!(
                profile = %active.profile_id,
                generation = active.generation,
                "run skipped, session in progress"
            );
            return Begin::Busy;
        }

        let Some(profile_id) = current_profile_id(page) else {
            debug!(path = %page.location_path(), "not a profile page");
            return Begin::NoProfile;
        };

        let removed = page.remove_fragments();
        if removed > 0 {
            debug!(removed, "removed previous panel");
        }

        self.generation += 1;
        let session = Session {
            profile_id,
            generation: self.generation,
        };
        info!(
            "Started panel session for {} (gen: {})",
            session.profile_id, session.generation
        );
        self.active = Some(session.clone());
        Begin::Started(session)
    }

    /// Decide what to do with a finished listing request.
    pub fn accept_fetch<P: HostPage + ?Sized>(&mut self, page: &P, event: FetchEvent) -> FetchVerdict {
        let Some(session) = self.current(event.generation).cloned() else {
            debug!(
                generation = event.generation,
                current = self.generation,
                "discarding listing from abandoned session"
            );
            return FetchVerdict::Ignored;
        };

        if event.games.is_empty() {
            return FetchVerdict::Finished(self.finish(RunOutcome::Empty {
                profile_id: session.profile_id,
            }));
        }

        if !still_on_profile(page, &session) {
            return FetchVerdict::Finished(self.finish(RunOutcome::Stale {
                profile_id: session.profile_id,
            }));
        }

        let fragment = self.renderer.render(&session.profile_id, &event.games);
        FetchVerdict::Mount(PendingMount {
            session,
            fragment,
            attempts: 0,
        })
    }

    /// Try to insert the pending panel. The profile is re-checked on every
    /// attempt, and the attempt count is bounded by the retry limit.
    pub fn try_mount<P: HostPage + ?Sized>(&mut self, page: &mut P, mut pending: PendingMount) -> MountStep {
        if self.current(pending.session.generation).is_none() {
            return MountStep::Dropped;
        }

        let profile_id = pending.session.profile_id.clone();
        if !still_on_profile(page, &pending.session) {
            return MountStep::Done(self.finish(RunOutcome::Stale { profile_id }));
        }

        pending.attempts += 1;
        match mount(page, &pending.fragment) {
            Ok(()) => MountStep::Done(self.finish(RunOutcome::Mounted {
                profile_id,
                generation: pending.session.generation,
                cards: pending.fragment.cards,
            })),
            Err(e) if e.is_transient() => {
                if pending.attempts >= self.retry_limit {
                    MountStep::Done(self.finish(RunOutcome::MountTimeout { profile_id }))
                } else {
                    debug!(attempt = pending.attempts, reason = %e, "mount anchors not ready");
                    MountStep::Retry(pending)
                }
            }
            Err(e) => MountStep::Done(self.finish(RunOutcome::Aborted {
                profile_id,
                reason: e.to_string(),
            })),
        }
    }

    /// Drop the active session without an outcome. Returns it, if any.
    pub fn abandon(&mut self) -> Option<Session> {
        let session = self.active.take()?;
        debug!(
            profile = %session.profile_id,
            generation = session.generation,
            "abandoned panel session"
        );
        Some(session)
    }

    fn current(&self, generation: u64) -> Option<&Session> {
        self.active.as_ref().filter(|s| s.generation == generation)
    }

    fn finish(&mut self, outcome: RunOutcome) -> RunOutcome {
        self.active = None;
        match &outcome {
            RunOutcome::Mounted { profile_id, cards, .. } => {
                info!("Mounted panel for {} ({} games)", profile_id, cards)
            }
            RunOutcome::Empty { profile_id } => {
                info!("No favourites to show for {}", profile_id)
            }
            RunOutcome::Stale { profile_id } => {
                debug!(profile = %profile_id, "location changed, panel not mounted")
            }
            RunOutcome::MountTimeout { profile_id } => {
                warn!(profile = %profile_id, "mount anchors never appeared")
            }
            RunOutcome::Aborted { profile_id, reason } => {
                warn!(profile = %profile_id, %reason, "panel mount failed")
            }
            RunOutcome::Busy | RunOutcome::NoProfile => {}
        }
        outcome
    }
}

fn still_on_profile<P: HostPage + ?Sized>(page: &P, session: &Session) -> bool {
    current_profile_id(page).as_deref() == Some(session.profile_id.as_str())
}
