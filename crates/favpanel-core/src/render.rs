// Panel markup and mounting.

use std::fmt::Write as _;

use crate::config::SiteConfig;
use crate::error::MountError;
use crate::game::Game;
use crate::page::HostPage;

/// The panel never shows more than this many games.
pub const MAX_CARDS: usize = 5;

const STAR_COUNT: usize = 5;

/// Rendered panel, ready to be inserted into the host page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub profile_id: String,
    pub cards: usize,
    pub html: String,
}

pub struct PanelRenderer {
    site: SiteConfig,
}

impl PanelRenderer {
    pub fn new(site: SiteConfig) -> Self {
        PanelRenderer { site }
    }

    pub fn title(&self) -> String {
        format!("Favorite Games of {}", self.site.year)
    }

    /// Build the panel for `profile_id` from the first [`MAX_CARDS`] games.
    pub fn render(&self, profile_id: &str, games: &[Game]) -> Fragment {
        let shown = &games[..games.len().min(MAX_CARDS)];

        let mut html = String::new();
        let _ = write!(
            html,
            concat!(
                r#"<div class="col pl-md-4"><div class="row"><div class="col">"#,
                r#"<h2 class="mb-0 profile-section-header" style="font-weight: bold;">{title} "#,
                r#"<a href="{href}" class="secondary-link subtitle-text" style="font-size: 0.9rem">See More</a>"#,
                r#"</h2></div></div>"#,
                r#"<div class="row mx-n1 mb-3 justify-content-center" id="yearly-favorites">"#,
            ),
            title = escape_html(&self.title()),
            href = escape_html(&self.site.listing_path(profile_id)),
        );

        for game in shown {
            render_card(&mut html, game);
        }

        html.push_str("</div></div>");

        Fragment {
            profile_id: profile_id.to_string(),
            cards: shown.len(),
            html,
        }
    }
}

fn render_card(html: &mut String, game: &Game) {
    let _ = write!(
        html,
        concat!(
            r#"<div class="col-cus-5 mb-2 px-1">"#,
            r#"<a href="/games/{slug}/" class="game-card-link">"#,
            r#"<div class="card mx-auto game-cover quick-access fade-played" style="width: auto">"#,
            r#"<div class="overflow-wrapper">"#,
            r#"<img class="lazy card-img height entered loaded" src="{src}" style="width: 100%; height: 100%" data-ll-status="loaded">"#,
            r#"<div class="overlay"></div></div>"#,
            r#"<div class="game-text-centered">{name}</div>"#,
        ),
        slug = escape_html(game.slug()),
        src = escape_html(game.image_url()),
        name = escape_html(game.name()),
    );

    if game.has_rating() {
        let stars = r#"<span class="star"></span>"#.repeat(STAR_COUNT);
        let _ = write!(
            html,
            concat!(
                r#"<div class="row star-ratings-static" style="position: absolute; bottom: -35px; right: 30px;">"#,
                r#"<div class="stars-top" style="width: {width}">{stars}</div>"#,
                r#"<div class="stars-bottom">{stars}</div>"#,
                r#"</div>"#,
            ),
            width = escape_html(game.rating_width()),
            stars = stars,
        );
    }

    html.push_str("</div></a></div>");
}

/// Insert `fragment` before the stats marker. No duplicate check; the
/// session controller clears earlier panels first.
pub fn mount<P: HostPage + ?Sized>(page: &mut P, fragment: &Fragment) -> Result<(), MountError> {
    page.insert_before_stats(fragment)
}

/// Escape text for use in element content and double-quoted attributes.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
