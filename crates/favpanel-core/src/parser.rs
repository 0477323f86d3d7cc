// Listing page -> Game records.
//
// The filtered listing (`/u/{id}/games/user-rating/...`) renders one
// `.col-cus-5` card per game, already ordered by the user's rating. This
// module turns that markup into `Game`s in the same order.

use scraper::{ElementRef, Html, Selector};
use tracing::warn;
use url::Url;

use crate::error::ParseError;
use crate::game::{Game, NO_RATING};

/// Class carried by every listing item. Also the cheap pre-check marker:
/// a body without it cannot contain any item.
pub const ITEM_MARKER: &str = "col-cus-5";

struct ListingSelectors {
    item: Selector,
    link: Selector,
    image: Selector,
    name: Selector,
    rating: Selector,
    rating_top: Selector,
}

impl ListingSelectors {
    fn new() -> Result<Self, ParseError> {
        Ok(ListingSelectors {
            item: selector(".col-cus-5")?,
            link: selector("a")?,
            image: selector(".card-img")?,
            name: selector(".game-text-centered")?,
            rating: selector(".star-ratings-static")?,
            rating_top: selector(".stars-top")?,
        })
    }
}

fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::Selector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

/// Whether `body` can contain listing items at all.
pub fn has_listing_items(body: &str) -> bool {
    body.contains(ITEM_MARKER)
}

/// Parse a listing page. Relative links and image sources are resolved
/// against `base`.
///
/// Items missing a required field are skipped and logged; they never fail
/// the whole listing.
pub fn parse_listing(html: &str, base: &Url) -> Result<Vec<Game>, ParseError> {
    let selectors = ListingSelectors::new()?;
    let document = Html::parse_document(html);

    let mut games = Vec::new();
    for (index, item) in document.select(&selectors.item).enumerate() {
        match parse_item(item, index, &selectors, base) {
            Ok(game) => games.push(game),
            Err(e) => warn!(error = %e, "skipping malformed listing item"),
        }
    }

    Ok(games)
}

fn parse_item(
    item: ElementRef<'_>,
    index: usize,
    selectors: &ListingSelectors,
    base: &Url,
) -> Result<Game, ParseError> {
    let missing = |field| ParseError::MalformedItem { index, field };

    let name = item
        .select(&selectors.name)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| missing("name"))?;

    let image_url = item
        .select(&selectors.image)
        .next()
        .and_then(|el| el.value().attr("src"))
        .and_then(|src| base.join(src.trim()).ok())
        .ok_or_else(|| missing("image"))?;

    let href = item
        .select(&selectors.link)
        .next()
        .and_then(|el| el.value().attr("href"))
        .ok_or_else(|| missing("link"))?;
    let slug = slug_from_href(href, base).ok_or_else(|| missing("slug"))?;

    let rating_width = item
        .select(&selectors.rating)
        .next()
        .and_then(|stars| stars.select(&selectors.rating_top).next())
        .and_then(|top| top.value().attr("style"))
        .and_then(style_width)
        .unwrap_or_else(|| NO_RATING.to_string());

    Ok(Game::new(name, image_url.to_string(), slug, rating_width))
}

/// Game slug from a card link: `/games/{slug}/`, relative or absolute.
/// This is the fourth `/`-separated piece of the absolute URL.
pub fn slug_from_href(href: &str, base: &Url) -> Option<String> {
    let url = base.join(href.trim()).ok()?;
    url.path_segments()?
        .nth(1)
        .filter(|slug| !slug.is_empty())
        .map(str::to_string)
}

/// Value of the `width` declaration in an inline style attribute.
fn style_width(style: &str) -> Option<String> {
    style.split(';').find_map(|decl| {
        let (name, value) = decl.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("width") {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        } else {
            None
        }
    })
}
