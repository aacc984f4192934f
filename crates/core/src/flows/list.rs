use std::{mem, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use super::{
    events::{FlowEvent, Observers},
    SearchInput,
};
use crate::{
    api::CatalogSource,
    error::{ApiError, FlowResult},
    models::{dedup_games, Game},
    store::GameStore,
};

/// How close to the end of the list a visible item must be to trigger the
/// next page.
pub const PREFETCH_DISTANCE: usize = 3;

/// Result of one fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A page arrived from the server.
    Loaded {
        /// Records on the page.
        received: usize,
    },
    /// The request failed and the list now mirrors the local store.
    Offline {
        /// Records restored from the store.
        cached: usize,
    },
    /// Nothing was requested: a fetch is in flight or no page remains.
    Skipped,
    /// The response arrived after a reset and was discarded.
    Stale,
}

#[derive(Debug, Clone)]
struct PageCursor {
    page: u32,
    has_next_page: bool,
    fetching: bool,
    search: Option<String>,
    generation: u64,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self {
            page: 1,
            has_next_page: false,
            fetching: false,
            search: None,
            generation: 0,
        }
    }
}

#[derive(Default)]
struct ListState {
    cursor: PageCursor,
    games: Vec<Game>,
}

/// Request issued for one fetch, captured under the lock.
struct PageRequest {
    page: u32,
    search: Option<String>,
    generation: u64,
}

/// Paged, searchable games list with offline fallback.
pub struct GamesListFlow {
    source: Arc<dyn CatalogSource>,
    store: GameStore,
    page_size: u32,
    state: Mutex<ListState>,
    observers: Observers,
}

impl GamesListFlow {
    /// Build an idle flow; call [`load_first_page`](Self::load_first_page) to start.
    pub fn new(source: Arc<dyn CatalogSource>, store: GameStore, page_size: u32) -> Self {
        Self {
            source,
            store,
            page_size: page_size.max(1),
            state: Mutex::new(ListState::default()),
            observers: Observers::default(),
        }
    }

    /// Register for change notifications.
    pub fn subscribe(&self) -> UnboundedReceiver<FlowEvent> {
        self.observers.subscribe()
    }

    /// Snapshot of the in-memory list.
    pub fn games(&self) -> Vec<Game> {
        self.state.lock().games.clone()
    }

    /// Number of games in memory.
    pub fn len(&self) -> usize {
        self.state.lock().games.len()
    }

    /// Whether the in-memory list is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Page that the next fetch will request.
    pub fn page(&self) -> u32 {
        self.state.lock().cursor.page
    }

    /// Whether the server reported more pages after the last one received.
    pub fn has_next_page(&self) -> bool {
        self.state.lock().cursor.has_next_page
    }

    /// Whether a fetch is in flight.
    pub fn is_fetching(&self) -> bool {
        self.state.lock().cursor.fetching
    }

    /// Active server-side search, if any.
    pub fn search_text(&self) -> Option<String> {
        self.state.lock().cursor.search.clone()
    }

    /// Games requested per page.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Clear the list, rewind to page 1 and fetch it. Any fetch still in
    /// flight is superseded and its response discarded.
    pub async fn load_first_page(&self) -> FlowResult<FetchOutcome> {
        let request = {
            let mut state = self.state.lock();
            state.games.clear();
            let cursor = &mut state.cursor;
            cursor.page = 1;
            cursor.has_next_page = false;
            cursor.generation += 1;
            cursor.fetching = true;
            PageRequest {
                page: cursor.page,
                search: cursor.search.clone(),
                generation: cursor.generation,
            }
        };
        self.observers.emit(FlowEvent::GamesChanged { len: 0 });
        self.fetch(request).await
    }

    /// Fetch the next page unless one is in flight or none remains.
    pub async fn load_next_page(&self) -> FlowResult<FetchOutcome> {
        let request = {
            let mut state = self.state.lock();
            let cursor = &mut state.cursor;
            if cursor.fetching || !cursor.has_next_page {
                return Ok(FetchOutcome::Skipped);
            }
            cursor.fetching = true;
            PageRequest {
                page: cursor.page,
                search: cursor.search.clone(),
                generation: cursor.generation,
            }
        };
        self.fetch(request).await
    }

    /// Called when the item at `index` is about to become visible; fetches
    /// the next page once the consumer is within [`PREFETCH_DISTANCE`] of the
    /// end.
    pub async fn item_will_display(&self, index: usize) -> FlowResult<FetchOutcome> {
        let near_end = {
            let state = self.state.lock();
            !state.games.is_empty()
                && index >= state.games.len().saturating_sub(PREFETCH_DISTANCE)
                && state.cursor.has_next_page
                && !state.cursor.fetching
        };
        if !near_end {
            return Ok(FetchOutcome::Skipped);
        }
        self.load_next_page().await
    }

    /// Apply the search box value. Text shorter than
    /// [`MIN_SEARCH_LEN`](super::MIN_SEARCH_LEN) counts as no search.
    pub async fn set_search_text(&self, text: &str) -> FlowResult<FetchOutcome> {
        let search = match SearchInput::classify(text) {
            SearchInput::Query(query) => Some(query),
            SearchInput::Clear => None,
            SearchInput::TooShort => {
                if self.state.lock().cursor.search.is_none() {
                    return Ok(FetchOutcome::Skipped);
                }
                None
            }
        };
        debug!(?search, "search changed");
        self.state.lock().cursor.search = search;
        self.load_first_page().await
    }

    /// Drop the active search and reload the unfiltered listing.
    pub async fn clear_search(&self) -> FlowResult<FetchOutcome> {
        self.state.lock().cursor.search = None;
        self.load_first_page().await
    }

    /// Mark the game at `index` as opened and return its id for the detail
    /// screen.
    pub fn open_game(&self, index: usize) -> Option<i64> {
        let mut state = self.state.lock();
        let game = state.games.get_mut(index)?;
        if !game.has_valid_id() {
            return None;
        }
        game.opened = true;
        Some(game.id)
    }

    async fn fetch(&self, request: PageRequest) -> FlowResult<FetchOutcome> {
        let result = self
            .source
            .list_games(request.page, self.page_size, request.search.as_deref())
            .await;

        match result {
            Ok(listing) => Ok(self.apply_page(&request, listing.results, listing.count)),
            Err(err) => self.fall_back(&request, err),
        }
    }

    fn apply_page(&self, request: &PageRequest, received: Vec<Game>, count: u64) -> FetchOutcome {
        let len = {
            let mut state = self.state.lock();
            if state.cursor.generation != request.generation {
                debug!(page = request.page, "discarding stale page");
                return FetchOutcome::Stale;
            }

            let fetched = u64::from(request.page) * u64::from(self.page_size);
            let cursor = &mut state.cursor;
            cursor.has_next_page = fetched < count;
            if cursor.has_next_page {
                cursor.page = request.page + 1;
            }
            cursor.fetching = false;

            let mut games = mem::take(&mut state.games);
            games.extend(received.iter().cloned());
            state.games = dedup_games(games);
            state.games.len()
        };

        info!(
            page = request.page,
            received = received.len(),
            total = count,
            "games page loaded"
        );
        if let Err(err) = self.store.save_batch(&received) {
            warn!("failed to persist games page {}: {err}", request.page);
            self.observers.emit(FlowEvent::StorageFailed {
                reason: err.to_string(),
            });
        }
        self.observers.emit(FlowEvent::GamesChanged { len });
        FetchOutcome::Loaded {
            received: received.len(),
        }
    }

    fn fall_back(&self, request: &PageRequest, err: ApiError) -> FlowResult<FetchOutcome> {
        if self.state.lock().cursor.generation != request.generation {
            debug!(page = request.page, "discarding stale failure: {err}");
            return Ok(FetchOutcome::Stale);
        }
        warn!(
            "failed to fetch games page {}, using local store: {err}",
            request.page
        );
        self.observers.emit(FlowEvent::NetworkFallback {
            reason: err.to_string(),
        });

        let cached = match self.store.fetch_all() {
            Ok(cached) => cached,
            Err(store_err) => {
                let mut state = self.state.lock();
                if state.cursor.generation == request.generation {
                    state.cursor.fetching = false;
                }
                return Err(store_err.into());
            }
        };

        let len = {
            let mut state = self.state.lock();
            if state.cursor.generation != request.generation {
                return Ok(FetchOutcome::Stale);
            }
            state.games = dedup_games(
                cached
                    .into_iter()
                    .filter(Game::has_valid_id)
                    .collect(),
            );
            state.cursor.fetching = false;
            state.games.len()
        };
        self.observers.emit(FlowEvent::GamesChanged { len });
        Ok(FetchOutcome::Offline { cached: len })
    }
}
