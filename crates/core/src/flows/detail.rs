use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

use super::events::{FlowEvent, Observers};
use crate::{
    api::CatalogSource,
    error::FlowResult,
    models::{Game, GameUpdate},
    store::GameStore,
};

/// Where the record shown by the detail flow came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailOrigin {
    /// Fresh copy from the server.
    Remote,
    /// The request failed; the stored copy is shown.
    Local,
    /// The request failed and the game was never stored.
    Missing,
}

#[derive(Default)]
struct DetailState {
    game: Option<Game>,
    fetching: bool,
}

/// Details of one game, with favorite toggling written through to the store.
pub struct GameDetailsFlow {
    source: Arc<dyn CatalogSource>,
    store: GameStore,
    game_id: i64,
    state: Mutex<DetailState>,
    observers: Observers,
}

impl GameDetailsFlow {
    /// Flow for `game_id`; nothing is fetched until [`load`](Self::load).
    pub fn new(source: Arc<dyn CatalogSource>, store: GameStore, game_id: i64) -> Self {
        Self {
            source,
            store,
            game_id,
            state: Mutex::new(DetailState::default()),
            observers: Observers::default(),
        }
    }

    /// Register for change notifications.
    pub fn subscribe(&self) -> UnboundedReceiver<FlowEvent> {
        self.observers.subscribe()
    }

    /// Identifier this flow was opened for.
    pub fn game_id(&self) -> i64 {
        self.game_id
    }

    /// Current record, if one has been loaded.
    pub fn game(&self) -> Option<Game> {
        self.state.lock().game.clone()
    }

    /// Whether a request is in flight.
    pub fn is_fetching(&self) -> bool {
        self.state.lock().fetching
    }

    /// Fetch the record, keeping the stored favorite flag, and persist it.
    /// Falls back to the stored copy when the request fails.
    pub async fn load(&self) -> FlowResult<DetailOrigin> {
        self.state.lock().fetching = true;
        let result = self.source.game_details(self.game_id).await;
        let loaded = match result {
            Ok(game) => self.merge_remote(game),
            Err(err) => {
                warn!("failed to fetch game {}, using local store: {err}", self.game_id);
                self.observers.emit(FlowEvent::NetworkFallback {
                    reason: err.to_string(),
                });
                self.store
                    .fetch_by_id(self.game_id)
                    .map(|game| match game {
                        Some(game) => (Some(game), DetailOrigin::Local),
                        None => (None, DetailOrigin::Missing),
                    })
                    .map_err(Into::into)
            }
        };

        let mut state = self.state.lock();
        state.fetching = false;
        let (game, origin) = loaded?;
        let changed = game.is_some();
        state.game = game;
        drop(state);

        if changed {
            self.observers.emit(FlowEvent::GameChanged { id: self.game_id });
        }
        Ok(origin)
    }

    fn merge_remote(&self, mut game: Game) -> FlowResult<(Option<Game>, DetailOrigin)> {
        let stored = self.store.fetch_by_id(self.game_id)?;
        game.favorite = stored.as_ref().map(|game| game.favorite).unwrap_or(false);
        game.opened = true;
        self.write_back(&game)?;
        Ok((Some(game), DetailOrigin::Remote))
    }

    /// Set the favorite flag and persist it. Returns `false` when no record
    /// is loaded.
    pub fn set_favorite(&self, favorite: bool) -> FlowResult<bool> {
        let game = {
            let mut state = self.state.lock();
            let Some(game) = state.game.as_mut() else {
                return Ok(false);
            };
            game.favorite = favorite;
            game.clone()
        };
        self.write_back(&game)?;
        self.observers.emit(FlowEvent::GameChanged { id: self.game_id });
        Ok(true)
    }

    /// Flip the favorite flag, returning the new value.
    pub fn toggle_favorite(&self) -> FlowResult<Option<bool>> {
        let Some(current) = self.state.lock().game.as_ref().map(|game| game.favorite) else {
            return Ok(None);
        };
        self.set_favorite(!current)?;
        Ok(Some(!current))
    }

    /// Write the in-memory record back to the store. The stored favorite flag
    /// takes precedence over the in-memory one and is copied back into it.
    pub fn persist(&self) -> FlowResult<()> {
        let Some(mut game) = self.game() else {
            return Ok(());
        };
        if let Some(stored) = self.store.fetch_by_id(self.game_id)? {
            game.favorite = stored.favorite;
            if let Some(current) = self.state.lock().game.as_mut() {
                current.favorite = stored.favorite;
            }
        }
        self.write_back(&game)
    }

    fn write_back(&self, game: &Game) -> FlowResult<()> {
        if self.store.update_by_id(self.game_id, &GameUpdate::from(game))? {
            return Ok(());
        }

        let mut stored = game.clone();
        stored.id = self.game_id;
        if let Err(err) = self.store.save_batch(std::slice::from_ref(&stored)) {
            self.observers.emit(FlowEvent::StorageFailed {
                reason: err.to_string(),
            });
            return Err(err.into());
        }
        debug!(game_id = self.game_id, "stored game first seen on detail screen");
        Ok(())
    }
}
