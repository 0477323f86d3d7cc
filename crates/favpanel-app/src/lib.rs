// Panel engine: watches host navigation, fetches the yearly listing for the
// profile on screen and keeps exactly one up-to-date panel mounted.
//
// Everything runs on one task (`app::Engine::run`); only the listing
// request is spawned, and it never touches the page.

pub mod app;
pub mod fetch;
pub mod protocol;
pub mod session;
pub mod watcher;

pub use app::Engine;
pub use fetch::{FetchCoordinator, FetchError, HttpListingSource, ListingResponse, ListingSource};
pub use protocol::{FetchEvent, HostEvent, RunOutcome};
pub use session::{Session, SessionController};
pub use watcher::{Debouncer, NavigationWatcher, WatchAction, WatchState};
