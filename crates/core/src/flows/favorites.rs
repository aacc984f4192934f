use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

use super::events::{FlowEvent, Observers};
use crate::{
    error::FlowResult,
    models::{Game, GameUpdate},
    store::GameStore,
};

#[derive(Default)]
struct FavoritesState {
    all: Vec<Game>,
    visible: Vec<Game>,
}

/// Locally flagged favorites with in-memory name filtering.
pub struct FavoritesFlow {
    store: GameStore,
    state: Mutex<FavoritesState>,
    observers: Observers,
}

impl FavoritesFlow {
    /// Empty flow; call [`load`](Self::load) to read the store.
    pub fn new(store: GameStore) -> Self {
        Self {
            store,
            state: Mutex::new(FavoritesState::default()),
            observers: Observers::default(),
        }
    }

    /// Register for change notifications.
    pub fn subscribe(&self) -> UnboundedReceiver<FlowEvent> {
        self.observers.subscribe()
    }

    /// Reload favorites from the store and drop any active filter.
    pub fn load(&self) -> FlowResult<usize> {
        let favorites = self.store.fetch_favorites()?;
        let len = {
            let mut state = self.state.lock();
            state.visible = favorites.clone();
            state.all = favorites;
            state.visible.len()
        };
        self.observers.emit(FlowEvent::FavoritesChanged { len });
        Ok(len)
    }

    /// Show only favorites whose name contains `text`, ignoring case. Empty
    /// text shows everything.
    pub fn filter(&self, text: &str) -> usize {
        let needle = text.trim().to_lowercase();
        let len = {
            let mut state = self.state.lock();
            state.visible = if needle.is_empty() {
                state.all.clone()
            } else {
                state
                    .all
                    .iter()
                    .filter(|game| {
                        game.name
                            .as_deref()
                            .map(|name| name.to_lowercase().contains(&needle))
                            .unwrap_or(false)
                    })
                    .cloned()
                    .collect()
            };
            state.visible.len()
        };
        self.observers.emit(FlowEvent::FavoritesChanged { len });
        len
    }

    /// Remove `id` from favorites. The stored row is kept with
    /// `favorite = false`. Returns whether the game was listed.
    pub fn unfavorite(&self, id: i64) -> FlowResult<bool> {
        self.store.update_by_id(id, &GameUpdate::favorite(false))?;

        let (listed, len) = {
            let mut state = self.state.lock();
            let before = state.all.len();
            state.all.retain(|game| game.id != id);
            state.visible.retain(|game| game.id != id);
            (state.all.len() != before, state.visible.len())
        };
        if listed {
            info!(game_id = id, "removed from favorites");
            self.observers.emit(FlowEvent::FavoritesChanged { len });
        }
        Ok(listed)
    }

    /// Visible favorites.
    pub fn games(&self) -> Vec<Game> {
        self.state.lock().visible.clone()
    }

    /// Number of visible favorites.
    pub fn len(&self) -> usize {
        self.state.lock().visible.len()
    }

    /// Whether no favorite is visible.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Screen title including the total number of favorites.
    pub fn title(&self) -> String {
        match self.state.lock().all.len() {
            0 => "Favorites".to_string(),
            count => format!("Favorites ({count})"),
        }
    }
}
