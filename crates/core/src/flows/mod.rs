//! Screen-level orchestration of the remote client and the local store.
//!
//! Each flow owns the in-memory data for one screen, receives its
//! [`CatalogSource`](crate::api::CatalogSource) and
//! [`GameStore`](crate::store::GameStore) at construction, and reports
//! changes through [`Observers`]. Network failures never reach the caller:
//! every flow falls back to the local store.

/// Detail screen flow.
pub mod detail;
/// Change notifications.
pub mod events;
/// Favorites screen flow.
pub mod favorites;
/// Paged list and search flow.
pub mod list;

#[cfg(test)]
pub(crate) mod fake;

use once_cell::sync::Lazy;
use regex::Regex;

pub use detail::{DetailOrigin, GameDetailsFlow};
pub use events::{FlowEvent, Observers};
pub use favorites::FavoritesFlow;
pub use list::{FetchOutcome, GamesListFlow};

/// Shortest search text sent to the server.
pub const MIN_SEARCH_LEN: usize = 4;

/// How a raw search box value affects the listing query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchInput {
    /// Empty text: drop any active search.
    Clear,
    /// Non-empty but shorter than [`MIN_SEARCH_LEN`]: treated as no search.
    TooShort,
    /// Text to send as the `search` parameter.
    Query(String),
}

impl SearchInput {
    /// Classify `text` after trimming and collapsing inner whitespace.
    pub fn classify(text: &str) -> Self {
        let normalized = normalize_search(text);
        if normalized.is_empty() {
            SearchInput::Clear
        } else if normalized.chars().count() < MIN_SEARCH_LEN {
            SearchInput::TooShort
        } else {
            SearchInput::Query(normalized)
        }
    }
}

fn normalize_search(text: &str) -> String {
    static WHITESPACE_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\s+").expect("invalid whitespace regex"));

    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}
