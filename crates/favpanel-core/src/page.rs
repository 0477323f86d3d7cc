// The host page as seen by the panel engine.
//
// The host's markup is an external schema. Implementations map each
// `Anchor` onto whatever selector the host currently uses; the engine only
// ever asks these questions.

use crate::error::MountError;
use crate::render::Fragment;

/// Fixed id of the injected panel node.
pub const FRAGMENT_ID: &str = "yearly-favorites-section";

/// Well-known structural points of the host page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Anchor {
    /// Root container the host application renders into (`.container`).
    AppRoot,
    /// Main profile column the panel is inserted into (`.col.pl-md-4`).
    ContentContainer,
    /// Profile stats block (`#profile-stats`). Its presence means a profile
    /// view has finished rendering.
    ProfileStats,
}

pub trait HostPage {
    /// Path component of the current location, e.g. `/u/alice/`.
    fn location_path(&self) -> String;

    fn contains(&self, anchor: Anchor) -> bool;

    /// Number of nodes carrying [`FRAGMENT_ID`].
    fn fragment_count(&self) -> usize;

    /// Remove every node carrying [`FRAGMENT_ID`]. Returns how many were
    /// removed.
    fn remove_fragments(&mut self) -> usize;

    /// Insert `fragment` as the sibling immediately before the stats marker
    /// inside the content container, tagged with [`FRAGMENT_ID`]. Performs
    /// no existence check for earlier fragments.
    fn insert_before_stats(&mut self, fragment: &Fragment) -> Result<(), MountError>;
}

/// Profile id from a location path: the second segment of `/u/{id}/...`.
pub fn profile_id_from_path(path: &str) -> Option<String> {
    let mut segments = path.trim_start_matches('/').split('/');
    match (segments.next(), segments.next()) {
        (Some("u"), Some(id)) if !id.is_empty() => Some(id.to_string()),
        _ => None,
    }
}

/// Profile id of the page's current location.
pub fn current_profile_id<P: HostPage + ?Sized>(page: &P) -> Option<String> {
    profile_id_from_path(&page.location_path())
}
