// A single favourite game as scraped from the filtered listing page.

use serde::Serialize;

/// Width the listing uses for "no rating".
pub const NO_RATING: &str = "0%";

/// One entry of the profile's rated-games listing.
///
/// Values are fixed at construction; the panel only ever reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Game {
    name: String,
    image_url: String,
    slug: String,
    rating_width: String,
}

impl Game {
    /// Build a game record. An empty `rating_width` is normalised to
    /// [`NO_RATING`].
    pub fn new(
        name: impl Into<String>,
        image_url: impl Into<String>,
        slug: impl Into<String>,
        rating_width: impl Into<String>,
    ) -> Self {
        let rating_width = rating_width.into();
        let rating_width = if rating_width.trim().is_empty() {
            NO_RATING.to_string()
        } else {
            rating_width.trim().to_string()
        };

        Game {
            name: name.into(),
            image_url: image_url.into(),
            slug: slug.into(),
            rating_width,
        }
    }

    /// Build a record for a game the user has not rated.
    pub fn unrated(
        name: impl Into<String>,
        image_url: impl Into<String>,
        slug: impl Into<String>,
    ) -> Self {
        Game::new(name, image_url, slug, NO_RATING)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image_url(&self) -> &str {
        &self.image_url
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// CSS width of the filled star layer, e.g. `"80%"`.
    pub fn rating_width(&self) -> &str {
        &self.rating_width
    }

    /// `false` when the listing had no rating block for this game.
    pub fn has_rating(&self) -> bool {
        self.rating_width != NO_RATING
    }
}
