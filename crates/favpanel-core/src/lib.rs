// Core of the yearly favourites panel: the game model, the listing parser,
// the panel renderer, the host page abstraction and configuration.
//
// Nothing in this crate performs I/O beyond reading the config file; the
// async engine lives in `favpanel-app`.

pub mod config;
pub mod dom;
pub mod error;
pub mod game;
pub mod page;
pub mod parser;
pub mod render;

pub use error::{MountError, ParseError};
pub use game::Game;
pub use page::{Anchor, HostPage};
