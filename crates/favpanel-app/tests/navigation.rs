// End-to-end engine behaviour against the in-memory host page.
//
// Each test drives the engine the way the host SPA would: rewriting the
// document in place and emitting navigation signals, with listing
// responses scripted per profile. Time is virtual (`start_paused`).

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, LocalSet};
use url::Url;

use favpanel_app::{Engine, FetchError, HostEvent, ListingResponse, ListingSource, RunOutcome};
use favpanel_core::config::{config_from_str, Config};
use favpanel_core::dom::{DomPage, SharedDom};
use favpanel_core::page::FRAGMENT_ID;
use favpanel_core::HostPage;

// ---------------------------------------------------------------------------
// Scripted listing source
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct Scripted {
    status: u16,
    body: String,
    delay: Duration,
}

#[derive(Default)]
struct ScriptedSource {
    listings: HashMap<String, Scripted>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedSource {
    fn listing(mut self, profile: &str, body: String, delay_ms: u64) -> Self {
        self.listings.insert(
            profile.to_string(),
            Scripted {
                status: 200,
                body,
                delay: Duration::from_millis(delay_ms),
            },
        );
        self
    }

    fn failing(mut self, profile: &str, status: u16) -> Self {
        self.listings.insert(
            profile.to_string(),
            Scripted {
                status,
                body: listing(&[("x1", "80%")]),
                delay: Duration::ZERO,
            },
        );
        self
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListingSource for ScriptedSource {
    async fn get(&self, url: &Url) -> Result<ListingResponse, FetchError> {
        let profile = url
            .path_segments()
            .and_then(|mut s| s.nth(1))
            .unwrap_or_default()
            .to_string();
        self.requests.lock().unwrap().push(profile.clone());

        let Some(scripted) = self.listings.get(&profile).cloned() else {
            return Ok(ListingResponse {
                status: 404,
                body: String::new(),
            });
        };
        tokio::time::sleep(scripted.delay).await;
        Ok(ListingResponse {
            status: scripted.status,
            body: scripted.body,
        })
    }
}

/// Listing markup for `(slug, rating width)` pairs; `"0%"` renders no
/// rating container at all.
fn listing(items: &[(&str, &str)]) -> String {
    let mut html = String::from(r#"<html><body><div class="row">"#);
    for (slug, width) in items {
        let stars = if *width == "0%" {
            String::new()
        } else {
            format!(
                r#"<div class="star-ratings-static"><div class="stars-top" style="width: {width}"></div></div>"#
            )
        };
        html.push_str(&format!(
            r#"<div class="col-cus-5 px-1">
                 <a href="/games/{slug}/"><img class="card-img" src="https://images.example/{slug}.jpg"></a>
                 <div class="game-text-centered">Game {slug}</div>
                 {stars}
               </div>"#
        ));
    }
    html.push_str("</div></body></html>");
    html
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    dom: SharedDom,
    host_tx: mpsc::Sender<HostEvent>,
    outcomes: mpsc::Receiver<RunOutcome>,
    source: Arc<ScriptedSource>,
    engine: JoinHandle<anyhow::Result<SharedDom>>,
}

fn config() -> Config {
    config_from_str("[site]\nyear = 2024\n\n[timing]\nmount_retry_limit = 5\n").unwrap()
}

fn profile_page(path: &str) -> DomPage {
    let mut page = DomPage::new(path);
    page.render_profile().unwrap();
    page
}

/// Run a test body on a `LocalSet`; the engine and the host simulator
/// share the page through `Rc`.
async fn local<F: Future<Output = ()>>(body: F) {
    LocalSet::new().run_until(body).await
}

impl Harness {
    fn start(page: DomPage, source: ScriptedSource) -> Self {
        Self::with_outcome_capacity(page, source, 64)
    }

    fn with_outcome_capacity(page: DomPage, source: ScriptedSource, capacity: usize) -> Self {
        let dom = SharedDom::new(page);
        let source = Arc::new(source);
        let (host_tx, host_rx) = mpsc::channel(64);
        let (outcome_tx, outcomes) = mpsc::channel(capacity);

        let engine = Engine::new(dom.clone(), &config(), source.clone(), outcome_tx);
        let engine = tokio::task::spawn_local(engine.run(host_rx));

        Harness {
            dom,
            host_tx,
            outcomes,
            source,
            engine,
        }
    }

    async fn send(&self, event: HostEvent) {
        self.host_tx.send(event).await.unwrap();
    }

    /// Client-side navigation to a profile: history push, old view torn
    /// down, new view rendered in full.
    async fn visit(&self, path: &str) {
        self.dom.with_mut(|p| p.navigate(path));
        self.send(HostEvent::HistoryPush).await;
        self.dom.with_mut(|p| p.render_profile().unwrap());
        self.send(HostEvent::Mutation).await;
    }

    async fn next_outcome(&mut self) -> RunOutcome {
        tokio::time::timeout(Duration::from_secs(30), self.outcomes.recv())
            .await
            .expect("no outcome within 30s")
            .expect("engine stopped")
    }

    async fn settle(&self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    fn fragment_count(&self) -> usize {
        self.dom.fragment_count()
    }

    fn panel(&self) -> String {
        let mut panels = self.dom.with(|p| p.fragment_html());
        assert_eq!(panels.len(), 1, "expected exactly one panel");
        panels.remove(0)
    }

    async fn shutdown(self) -> SharedDom {
        self.send(HostEvent::Shutdown).await;
        self.engine.await.unwrap().unwrap()
    }
}

fn mounted(profile: &str, cards: usize) -> impl Fn(&RunOutcome) -> bool + '_ {
    move |outcome| {
        matches!(outcome, RunOutcome::Mounted { profile_id, cards: c, .. }
            if profile_id == profile && *c == cards)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn alice_panel_end_to_end() {
    local(async {
        let source = ScriptedSource::default().listing(
            "alice",
            listing(&[("g1", "80%"), ("g2", "0%"), ("g3", "100%")]),
            50,
        );
        let mut h = Harness::start(profile_page("/u/alice/"), source);

        let outcome = h.next_outcome().await;
        assert_eq!(
            outcome,
            RunOutcome::Mounted {
                profile_id: "alice".into(),
                generation: 1,
                cards: 3
            }
        );

        let panel = h.panel();
        assert!(panel.contains("Favorite Games of 2024"));
        assert!(panel.contains(
            r#"href="/u/alice/games/user-rating/type:played;release_year:2024;category:main_game,remake""#
        ));

        let g1 = panel.find("/games/g1/").unwrap();
        let g2 = panel.find("/games/g2/").unwrap();
        let g3 = panel.find("/games/g3/").unwrap();
        assert!(g1 < g2 && g2 < g3);

        assert_eq!(panel.matches("stars-top").count(), 2);
        assert!(panel[g1..g2].contains("width: 80%"));
        assert!(!panel[g2..g3].contains("stars-top"));
        assert!(panel[g3..].contains("width: 100%"));

        // Panel sits directly before the stats block in the profile column.
        h.dom.with(|p| {
            let content = p.first_with_classes(&["col", "pl-md-4"]).unwrap();
            let ids: Vec<Option<&str>> = p.children(content).into_iter().map(|c| p.id_of(c)).collect();
            assert_eq!(ids, vec![Some(FRAGMENT_ID), Some("profile-stats")]);
        });

        let dom = h.shutdown().await;
        assert_eq!(dom.fragment_count(), 1);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn burst_of_signals_runs_once() {
    local(async {
        let source = ScriptedSource::default().listing("alice", listing(&[("g1", "70%")]), 20);
        let mut h = Harness::start(profile_page("/u/alice/"), source);

        for _ in 0..10 {
            h.send(HostEvent::Mutation).await;
        }
        h.send(HostEvent::PopState).await;
        h.send(HostEvent::HistoryReplace).await;

        assert!(mounted("alice", 1)(&h.next_outcome().await));
        h.settle(1_000).await;
        assert_eq!(h.source.requests(), vec!["alice"]);
        assert!(h.outcomes.try_recv().is_err());
        assert_eq!(h.fragment_count(), 1);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn rerun_on_same_profile_keeps_single_panel() {
    local(async {
        let source = ScriptedSource::default().listing("alice", listing(&[("g1", "70%"), ("g2", "60%")]), 20);
        let mut h = Harness::start(profile_page("/u/alice/"), source);
        assert!(mounted("alice", 2)(&h.next_outcome().await));

        h.send(HostEvent::HistoryReplace).await;
        match h.next_outcome().await {
            RunOutcome::Mounted { generation, .. } => assert_eq!(generation, 2),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(h.fragment_count(), 1);
        assert_eq!(h.source.requests().len(), 2);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn more_than_five_games_shows_first_five() {
    local(async {
        let items: Vec<(String, &str)> = (1..=8).map(|i| (format!("g{i}"), "50%")).collect();
        let items: Vec<(&str, &str)> = items.iter().map(|(s, w)| (s.as_str(), *w)).collect();
        let source = ScriptedSource::default().listing("alice", listing(&items), 10);
        let mut h = Harness::start(profile_page("/u/alice/"), source);

        assert!(mounted("alice", 5)(&h.next_outcome().await));
        let panel = h.panel();
        assert!(panel.contains("/games/g5/"));
        assert!(!panel.contains("/games/g6/"));
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn navigation_click_clears_panel_before_debounce() {
    local(async {
        let source = ScriptedSource::default().listing("alice", listing(&[("g1", "70%")]), 10);
        let mut h = Harness::start(profile_page("/u/alice/"), source);
        assert!(h.next_outcome().await.is_mounted());

        h.send(HostEvent::click(["card-title", "game-card-link"])).await;
        h.settle(10).await;
        assert_eq!(h.fragment_count(), 0);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn navigation_click_clears_panel_with_undrained_outcomes() {
    local(async {
        let source = ScriptedSource::default().listing("alice", listing(&[("g1", "70%")]), 10);
        let h = Harness::with_outcome_capacity(profile_page("/u/alice/"), source, 1);

        // Load run fills the outcome channel; the rerun's outcome has
        // nowhere to go. Nobody reads either.
        h.settle(500).await;
        h.send(HostEvent::HistoryReplace).await;
        h.settle(500).await;
        assert_eq!(h.source.requests().len(), 2);
        assert_eq!(h.fragment_count(), 1);

        h.send(HostEvent::click(["nav-link"])).await;
        h.settle(10).await;
        assert_eq!(h.fragment_count(), 0);

        let dom = h.shutdown().await;
        assert_eq!(dom.fragment_count(), 0);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn plain_click_keeps_panel() {
    local(async {
        let source = ScriptedSource::default().listing("alice", listing(&[("g1", "70%")]), 10);
        let mut h = Harness::start(profile_page("/u/alice/"), source);
        assert!(h.next_outcome().await.is_mounted());

        h.send(HostEvent::click(["card", "game-cover"])).await;
        h.settle(500).await;
        assert_eq!(h.fragment_count(), 1);
        assert_eq!(h.source.requests().len(), 1);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn superseded_fetch_is_never_mounted() {
    local(async {
        let source = ScriptedSource::default()
            .listing("alice", listing(&[("a1", "90%")]), 1_000)
            .listing("bob", listing(&[("b1", "40%"), ("b2", "30%")]), 10);
        let mut h = Harness::start(profile_page("/u/alice/"), source);

        // Debounce has fired and alice's request is in flight.
        h.settle(150).await;
        assert_eq!(h.source.requests(), vec!["alice"]);

        h.send(HostEvent::click(["nav-link"])).await;
        h.visit("/u/bob/").await;

        assert!(mounted("bob", 2)(&h.next_outcome().await));
        h.settle(2_000).await;
        assert!(h.outcomes.try_recv().is_err());

        let panel = h.panel();
        assert!(panel.contains("/games/b1/"));
        assert!(!panel.contains("/games/a1/"));
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn location_change_during_fetch_is_stale() {
    local(async {
        let source = ScriptedSource::default()
            .listing("alice", listing(&[("a1", "90%")]), 500)
            .listing("bob", listing(&[("b1", "40%")]), 10);
        let mut h = Harness::start(profile_page("/u/alice/"), source);

        h.settle(150).await;
        h.visit("/u/bob/").await;

        // The guard is still held by alice's run.
        assert_eq!(h.next_outcome().await, RunOutcome::Busy);
        assert_eq!(
            h.next_outcome().await,
            RunOutcome::Stale {
                profile_id: "alice".into()
            }
        );
        assert_eq!(h.fragment_count(), 0);

        h.send(HostEvent::Mutation).await;
        assert!(mounted("bob", 1)(&h.next_outcome().await));
        assert!(!h.panel().contains("/games/a1/"));
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn empty_listing_releases_guard() {
    local(async {
        let source = ScriptedSource::default().listing(
            "alice",
            "<html><body><p>No games yet</p></body></html>".to_string(),
            10,
        );
        let mut h = Harness::start(profile_page("/u/alice/"), source);

        let empty = RunOutcome::Empty {
            profile_id: "alice".into(),
        };
        assert_eq!(h.next_outcome().await, empty);
        assert_eq!(h.fragment_count(), 0);

        h.send(HostEvent::PopState).await;
        assert_eq!(h.next_outcome().await, empty);
        assert_eq!(h.source.requests().len(), 2);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn failed_request_shows_nothing() {
    local(async {
        let source = ScriptedSource::default().failing("alice", 502);
        let mut h = Harness::start(profile_page("/u/alice/"), source);

        assert_eq!(
            h.next_outcome().await,
            RunOutcome::Empty {
                profile_id: "alice".into()
            }
        );
        assert_eq!(h.fragment_count(), 0);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn late_stats_block_mounts_after_retry() {
    local(async {
        let mut page = DomPage::new("/u/alice/");
        page.render_profile_shell().unwrap();
        let source = ScriptedSource::default().listing("alice", listing(&[("g1", "70%")]), 10);
        let mut h = Harness::start(page, source);

        h.settle(300).await;
        assert_eq!(h.fragment_count(), 0);
        h.dom.with_mut(|p| p.render_profile_stats().unwrap());

        assert!(mounted("alice", 1)(&h.next_outcome().await));
        assert_eq!(h.fragment_count(), 1);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn missing_stats_block_times_out_and_releases_guard() {
    local(async {
        let mut page = DomPage::new("/u/alice/");
        page.render_profile_shell().unwrap();
        let source = ScriptedSource::default().listing("alice", listing(&[("g1", "70%")]), 10);
        let mut h = Harness::start(page, source);

        assert_eq!(
            h.next_outcome().await,
            RunOutcome::MountTimeout {
                profile_id: "alice".into()
            }
        );
        assert_eq!(h.fragment_count(), 0);

        h.dom.with_mut(|p| p.render_profile_stats().unwrap());
        h.send(HostEvent::Mutation).await;
        assert!(mounted("alice", 1)(&h.next_outcome().await));
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn waits_for_app_root_then_runs() {
    local(async {
        let source = ScriptedSource::default().listing("alice", listing(&[("g1", "70%")]), 10);
        let mut h = Harness::start(DomPage::new("/"), source);

        assert_eq!(h.next_outcome().await, RunOutcome::NoProfile);

        h.dom.with_mut(|p| {
            p.set_location("/u/alice/");
            p.render_profile().unwrap();
        });
        h.send(HostEvent::Mutation).await;
        assert!(mounted("alice", 1)(&h.next_outcome().await));
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn leaving_profiles_reports_no_profile() {
    local(async {
        let source = ScriptedSource::default().listing("alice", listing(&[("g1", "70%")]), 10);
        let mut h = Harness::start(profile_page("/u/alice/"), source);
        assert!(h.next_outcome().await.is_mounted());

        h.send(HostEvent::click(["btn", "btn-general"])).await;
        h.dom.with_mut(|p| p.navigate("/games/hades/"));
        h.send(HostEvent::HistoryPush).await;

        assert_eq!(h.next_outcome().await, RunOutcome::NoProfile);
        assert_eq!(h.fragment_count(), 0);
        assert_eq!(h.source.requests(), vec!["alice"]);
    })
    .await;
}
