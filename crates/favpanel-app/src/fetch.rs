// Listing retrieval.
//
// `FetchCoordinator` keeps at most one listing request in flight. Starting
// a new one aborts the previous task, and the result of a request is
// tagged with the session generation that issued it so late results can
// be told apart from current ones.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use favpanel_core::config::SiteConfig;
use favpanel_core::parser::{has_listing_items, parse_listing};
use favpanel_core::{Game, ParseError};

use crate::protocol::FetchEvent;
use crate::session::Session;

const USER_AGENT: &str = concat!("favpanel/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("listing request returned status {0}")]
    Status(u16),

    #[error("invalid listing url: {0}")]
    Url(#[from] url::ParseError),

    #[error("failed to parse listing: {0}")]
    Parse(#[from] ParseError),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Transport(e.to_string())
    }
}

/// Raw response of a listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingResponse {
    pub status: u16,
    pub body: String,
}

impl ListingResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Something that can GET a listing page. Implementations add no auth.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn get(&self, url: &Url) -> Result<ListingResponse, FetchError>;
}

// ---------------------------------------------------------------------------
// HTTP source
// ---------------------------------------------------------------------------

pub struct HttpListingSource {
    client: reqwest::Client,
}

impl HttpListingSource {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(HttpListingSource { client })
    }
}

#[async_trait]
impl ListingSource for HttpListingSource {
    async fn get(&self, url: &Url) -> Result<ListingResponse, FetchError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(ListingResponse { status, body })
    }
}

/// Fetch and parse one listing page.
///
/// A body without any listing item marker is an empty listing, not an
/// error. Non-2xx statuses are errors.
pub async fn fetch_listing(source: &dyn ListingSource, url: &Url) -> Result<Vec<Game>, FetchError> {
    let response = source.get(url).await?;
    if !response.is_success() {
        return Err(FetchError::Status(response.status));
    }
    if !has_listing_items(&response.body) {
        debug!(%url, "listing has no items");
        return Ok(Vec::new());
    }
    Ok(parse_listing(&response.body, url)?)
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

struct InFlight {
    generation: u64,
    profile_id: String,
    handle: JoinHandle<Vec<Game>>,
}

pub struct FetchCoordinator {
    source: Arc<dyn ListingSource>,
    site: SiteConfig,
    in_flight: Option<InFlight>,
}

impl FetchCoordinator {
    pub fn new(source: Arc<dyn ListingSource>, site: SiteConfig) -> Self {
        FetchCoordinator {
            source,
            site,
            in_flight: None,
        }
    }

    /// Start the listing request for `session`, aborting any request still
    /// in flight. Failures are logged inside the task and surface as an
    /// empty result.
    pub fn dispatch(&mut self, session: &Session) {
        self.cancel();

        let source = Arc::clone(&self.source);
        let url = self.site.listing_url(&session.profile_id);
        let profile_id = session.profile_id.clone();

        let handle = tokio::spawn(async move {
            let url = match url {
                Ok(url) => url,
                Err(e) => {
                    warn!(profile = %profile_id, error = %e, "could not build listing url");
                    return Vec::new();
                }
            };
            match fetch_listing(source.as_ref(), &url).await {
                Ok(games) => {
                    debug!(profile = %profile_id, count = games.len(), "listing fetched");
                    games
                }
                Err(e) => {
                    warn!(profile = %profile_id, error = %e, "listing fetch failed");
                    Vec::new()
                }
            }
        });

        info!(
            "Dispatched listing request for {} (gen: {})",
            session.profile_id, session.generation
        );
        self.in_flight = Some(InFlight {
            generation: session.generation,
            profile_id: session.profile_id.clone(),
            handle,
        });
    }

    /// Abort the in-flight request, if any. Returns whether one was
    /// running.
    pub fn cancel(&mut self) -> bool {
        match self.in_flight.take() {
            Some(flight) if !flight.handle.is_finished() => {
                flight.handle.abort();
                debug!(
                    profile = %flight.profile_id,
                    generation = flight.generation,
                    "cancelled listing request"
                );
                true
            }
            _ => false,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Wait for the in-flight request to finish. Pending forever when
    /// nothing is in flight, so it can sit in a `select!` unconditionally.
    ///
    /// A panicking request task is reported as an empty result.
    pub async fn completed(&mut self) -> FetchEvent {
        let Some(flight) = self.in_flight.as_mut() else {
            return std::future::pending().await;
        };

        let games = match (&mut flight.handle).await {
            Ok(games) => games,
            Err(e) => {
                if !e.is_cancelled() {
                    warn!(profile = %flight.profile_id, error = %e, "listing task failed");
                }
                Vec::new()
            }
        };

        let event = FetchEvent {
            generation: flight.generation,
            profile_id: flight.profile_id.clone(),
            games,
        };
        self.in_flight = None;
        event
    }

    /// One-shot fetch outside any session.
    pub async fn fetch_now(&self, profile_id: &str) -> Result<Vec<Game>, FetchError> {
        let url = self.site.listing_url(profile_id)?;
        fetch_listing(self.source.as_ref(), &url).await
    }
}
