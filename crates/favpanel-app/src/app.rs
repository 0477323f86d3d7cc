// Engine: owns the host page and drives the watcher, session controller,
// fetch coordinator and timers from a single `tokio::select!` loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;
use tracing::{debug, info};

use favpanel_core::config::Config;
use favpanel_core::render::PanelRenderer;
use favpanel_core::HostPage;

use crate::fetch::{FetchCoordinator, ListingSource};
use crate::protocol::{FetchEvent, HostEvent, RunOutcome};
use crate::session::{Begin, FetchVerdict, MountStep, PendingMount, SessionController};
use crate::watcher::{sleep_until, Debouncer, NavigationWatcher, WatchAction};

pub struct Engine<P: HostPage> {
    page: P,
    watcher: NavigationWatcher,
    debounce: Debouncer,
    controller: SessionController,
    fetcher: FetchCoordinator,
    mount_retry: Duration,
    /// Panel waiting for its anchors, and when to try next.
    pending: Option<(PendingMount, Instant)>,
    outcome_tx: mpsc::Sender<RunOutcome>,
}

impl<P: HostPage> Engine<P> {
    pub fn new(
        page: P,
        config: &Config,
        source: Arc<dyn ListingSource>,
        outcome_tx: mpsc::Sender<RunOutcome>,
    ) -> Self {
        let renderer = PanelRenderer::new(config.site.clone());
        Engine {
            page,
            watcher: NavigationWatcher::new(),
            debounce: Debouncer::new(config.timing.debounce),
            controller: SessionController::new(renderer, config.timing.mount_retry_limit),
            fetcher: FetchCoordinator::new(source, config.site.clone()),
            mount_retry: config.timing.mount_retry,
            pending: None,
            outcome_tx,
        }
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    /// Run until `Shutdown` arrives or the host channel closes. Returns the
    /// page so callers can inspect what was left mounted.
    ///
    /// Listens on four sources using `tokio::select!`:
    /// 1. Host events (navigation signals, clicks)
    /// 2. Completion of the in-flight listing request
    /// 3. The debounce deadline
    /// 4. The mount retry deadline
    pub async fn run(mut self, mut host_rx: mpsc::Receiver<HostEvent>) -> anyhow::Result<P> {
        info!("Panel engine started");

        if let Some(action) = self.watcher.start(&self.page) {
            self.apply(action);
        }

        loop {
            let debounce_at = self.debounce.deadline();
            let retry_at = self.pending.as_ref().map(|(_, at)| *at);

            tokio::select! {
                // --- Host events ---
                event = host_rx.recv() => {
                    match event {
                        Some(HostEvent::Shutdown) => {
                            info!("Shutdown requested");
                            break;
                        }
                        Some(event) => {
                            if let Some(action) = self.watcher.handle(&self.page, &event) {
                                self.apply(action);
                            }
                        }
                        None => {
                            info!("Host channel closed, shutting down");
                            break;
                        }
                    }
                }

                // --- Listing request finished ---
                event = self.fetcher.completed() => {
                    self.on_fetch(event);
                }

                // --- Debounced run ---
                _ = sleep_until(debounce_at) => {
                    self.debounce.clear();
                    self.start_run();
                }

                // --- Mount retry ---
                _ = sleep_until(retry_at) => {
                    if let Some((pending, _)) = self.pending.take() {
                        self.attempt_mount(pending);
                    }
                }
            }
        }

        self.fetcher.cancel();
        info!("Panel engine stopped");
        Ok(self.page)
    }

    fn apply(&mut self, action: WatchAction) {
        match action {
            WatchAction::Schedule => self.debounce.schedule(),
            WatchAction::ClearFragment => {
                let removed = self.page.remove_fragments();
                if let Some(session) = self.controller.abandon() {
                    self.fetcher.cancel();
                    self.pending = None;
                    debug!(
                        profile = %session.profile_id,
                        generation = session.generation,
                        "navigation click, run abandoned"
                    );
                }
                debug!(removed, "navigation click, panel cleared");
            }
        }
    }

    fn start_run(&mut self) {
        match self.controller.begin(&mut self.page) {
            Begin::Started(session) => self.fetcher.dispatch(&session),
            Begin::Busy => self.report(RunOutcome::Busy),
            Begin::NoProfile => self.report(RunOutcome::NoProfile),
        }
    }

    fn on_fetch(&mut self, event: FetchEvent) {
        match self.controller.accept_fetch(&self.page, event) {
            FetchVerdict::Ignored => {}
            FetchVerdict::Finished(outcome) => self.report(outcome),
            FetchVerdict::Mount(pending) => self.attempt_mount(pending),
        }
    }

    fn attempt_mount(&mut self, pending: PendingMount) {
        match self.controller.try_mount(&mut self.page, pending) {
            MountStep::Done(outcome) => self.report(outcome),
            MountStep::Retry(pending) => {
                self.pending = Some((pending, Instant::now() + self.mount_retry));
            }
            MountStep::Dropped => {}
        }
    }

    /// Publish an outcome. Never blocks: when the consumer falls behind,
    /// the outcome is dropped.
    fn report(&self, outcome: RunOutcome) {
        match self.outcome_tx.try_send(outcome) {
            Ok(()) => {}
            Err(TrySendError::Full(outcome)) => {
                debug!(?outcome, "outcome channel full, dropping outcome");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
