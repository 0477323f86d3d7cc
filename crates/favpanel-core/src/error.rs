// Error types shared by the parser, renderer and host page implementations.

use thiserror::Error;

/// Failure while turning a listing page into `Game` records.
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("invalid selector `{selector}`: {message}")]
    Selector { selector: String, message: String },

    /// One listing item lacks a field the panel needs. The item is skipped,
    /// the rest of the listing is kept.
    #[error("item {index} is missing {field}")]
    MalformedItem { index: usize, field: &'static str },
}

/// Failure while inserting the panel into the host page.
#[derive(Debug, Error, PartialEq)]
pub enum MountError {
    /// The content container or the stats marker is not on the page yet.
    /// Progressive rendering makes this transient; callers retry.
    #[error("mount anchors not present (content: {content}, stats: {stats})")]
    AnchorsMissing { content: bool, stats: bool },

    #[error("stats marker is not a child of the content container")]
    DetachedAnchor,

    #[error("host page error: {0}")]
    Host(String),
}

impl MountError {
    /// Whether waiting for the host to render more could fix this.
    pub fn is_transient(&self) -> bool {
        matches!(self, MountError::AnchorsMissing { .. } | MountError::DetachedAnchor)
    }
}
