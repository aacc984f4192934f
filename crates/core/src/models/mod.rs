//! Shared domain models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One catalog entry, as returned by the remote API and mirrored locally.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Game {
    /// Remote identifier, also the local primary key.
    #[serde(default)]
    pub id: i64,
    /// URL-friendly name.
    #[serde(default)]
    pub slug: Option<String>,
    /// Human-readable title.
    #[serde(default)]
    pub name: Option<String>,
    /// Release date as sent by the API (`YYYY-MM-DD`).
    #[serde(default)]
    pub released: Option<String>,
    /// Cover image URL.
    #[serde(default)]
    pub background_image: Option<String>,
    /// Average user rating.
    #[serde(default)]
    pub rating: Option<f64>,
    /// Critic score.
    #[serde(default)]
    pub metacritic: Option<f64>,
    /// Genre tags in API order.
    #[serde(default)]
    pub genres: Option<Vec<Genre>>,
    /// Free-text description (HTML from the detail endpoint).
    #[serde(default)]
    pub description: Option<String>,
    /// Community page link.
    #[serde(default)]
    pub reddit_url: Option<String>,
    /// Community page name.
    #[serde(default)]
    pub reddit_name: Option<String>,
    /// External website.
    #[serde(default)]
    pub website: Option<String>,
    /// Local-only: the user marked this game as a favorite.
    #[serde(skip_deserializing, default)]
    pub favorite: bool,
    /// Local-only: the detail view was visited.
    #[serde(skip_deserializing, default)]
    pub opened: bool,
}

impl Game {
    /// Whether the identifier was actually assigned by the remote API.
    pub fn has_valid_id(&self) -> bool {
        self.id > 0
    }

    /// Parse `released` into a calendar date.
    pub fn release_date(&self) -> Option<NaiveDate> {
        self.released
            .as_deref()
            .and_then(|value| NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok())
    }

    /// Genre names joined by `separator`, skipping blanks.
    pub fn display_genres(&self, separator: &str) -> String {
        self.genres
            .iter()
            .flatten()
            .filter_map(|genre| genre.name.as_deref())
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// Title shown to the user, falling back to the slug and then the id.
    pub fn display_name(&self) -> String {
        match (self.name.as_deref(), self.slug.as_deref()) {
            (Some(name), _) if !name.is_empty() => name.to_string(),
            (_, Some(slug)) if !slug.is_empty() => slug.to_string(),
            _ => format!("#{}", self.id),
        }
    }
}

/// Genre tag embedded in a [`Game`].
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Genre {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub background_image: Option<String>,
}

/// Body of the paged list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GamePage {
    /// Games on this page.
    #[serde(default)]
    pub results: Vec<Game>,
    /// Total number of records matching the query on the server.
    #[serde(default)]
    pub count: u64,
}

/// Partial attributes merged into a stored record by
/// [`GameStore::update_by_id`](crate::store::GameStore::update_by_id).
///
/// `None` and empty strings leave the stored value untouched. `favorite` has
/// no absent state and is always written; `opened` only ever flips to true.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameUpdate {
    pub slug: Option<String>,
    pub name: Option<String>,
    pub released: Option<String>,
    pub background_image: Option<String>,
    pub rating: Option<f64>,
    pub metacritic: Option<f64>,
    pub genres: Option<Vec<Genre>>,
    pub description: Option<String>,
    pub reddit_url: Option<String>,
    pub reddit_name: Option<String>,
    pub website: Option<String>,
    pub favorite: bool,
    pub opened: bool,
}

impl GameUpdate {
    /// Update that only writes the favorite flag.
    pub fn favorite(favorite: bool) -> Self {
        Self {
            favorite,
            ..Self::default()
        }
    }
}

impl From<&Game> for GameUpdate {
    fn from(game: &Game) -> Self {
        Self {
            slug: game.slug.clone(),
            name: game.name.clone(),
            released: game.released.clone(),
            background_image: game.background_image.clone(),
            rating: game.rating,
            metacritic: game.metacritic,
            genres: game.genres.clone(),
            description: game.description.clone(),
            reddit_url: game.reddit_url.clone(),
            reddit_name: game.reddit_name.clone(),
            website: game.website.clone(),
            favorite: game.favorite,
            opened: game.opened,
        }
    }
}

/// Stable de-duplication by full record value; the first occurrence wins.
pub fn dedup_games(games: Vec<Game>) -> Vec<Game> {
    let mut unique: Vec<Game> = Vec::with_capacity(games.len());
    for game in games {
        if !unique.contains(&game) {
            unique.push(game);
        }
    }
    unique
}
