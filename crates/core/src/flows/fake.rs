//! In-memory [`CatalogSource`] used by the flow tests.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use tokio::sync::Notify;

use crate::{
    api::CatalogSource,
    error::{ApiError, ApiResult},
    models::{Game, GamePage},
};

pub(crate) fn game(id: i64, name: &str) -> Game {
    Game {
        id,
        slug: Some(name.to_lowercase().replace(' ', "-")),
        name: Some(name.to_string()),
        released: Some("2020-01-01".to_string()),
        background_image: Some(format!("https://media.example/{id}.jpg")),
        rating: Some(4.0),
        ..Game::default()
    }
}

/// `count` games with ids `1..=count`.
pub(crate) fn catalog(count: i64) -> Vec<Game> {
    (1..=count)
        .map(|id| game(id, &format!("Game {id}")))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ListRequest {
    pub page: u32,
    pub page_size: u32,
    pub search: Option<String>,
}

#[derive(Default)]
pub(crate) struct FakeCatalog {
    games: Vec<Game>,
    offline: AtomicBool,
    gated: AtomicBool,
    waiting: AtomicUsize,
    gate: Notify,
    list_requests: Mutex<Vec<ListRequest>>,
    detail_requests: Mutex<Vec<i64>>,
    details: Mutex<HashMap<i64, Game>>,
}

impl FakeCatalog {
    pub fn new(games: Vec<Game>) -> Self {
        Self {
            games,
            ..Self::default()
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make list requests wait until [`release`](Self::release) is called.
    pub fn hold_requests(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.gated.store(false, Ordering::SeqCst);
        self.gate.notify_waiters();
        self.gate.notify_one();
    }

    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    pub fn insert_detail(&self, game: Game) {
        self.details.lock().insert(game.id, game);
    }

    pub fn list_requests(&self) -> Vec<ListRequest> {
        self.list_requests.lock().clone()
    }

    pub fn detail_requests(&self) -> Vec<i64> {
        self.detail_requests.lock().clone()
    }

    fn unavailable() -> ApiError {
        ApiError::Status {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: "offline".to_string(),
        }
    }
}

#[async_trait]
impl CatalogSource for FakeCatalog {
    async fn list_games(
        &self,
        page: u32,
        page_size: u32,
        search: Option<&str>,
    ) -> ApiResult<GamePage> {
        self.list_requests.lock().push(ListRequest {
            page,
            page_size,
            search: search.map(str::to_string),
        });

        if self.gated.load(Ordering::SeqCst) {
            self.waiting.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            self.waiting.fetch_sub(1, Ordering::SeqCst);
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }

        let needle = search.map(str::to_lowercase);
        let matching: Vec<Game> = self
            .games
            .iter()
            .filter(|game| match needle.as_deref() {
                Some(needle) => game
                    .name
                    .as_deref()
                    .map(|name| name.to_lowercase().contains(needle))
                    .unwrap_or(false),
                None => true,
            })
            .cloned()
            .collect();

        let start = (page.saturating_sub(1) * page_size) as usize;
        let results = matching
            .iter()
            .skip(start)
            .take(page_size as usize)
            .cloned()
            .collect();
        Ok(GamePage {
            results,
            count: matching.len() as u64,
        })
    }

    async fn game_details(&self, game_id: i64) -> ApiResult<Game> {
        self.detail_requests.lock().push(game_id);
        if self.offline.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.details
            .lock()
            .get(&game_id)
            .cloned()
            .or_else(|| self.games.iter().find(|game| game.id == game_id).cloned())
            .ok_or(ApiError::Status {
                status: StatusCode::NOT_FOUND,
                body: String::new(),
            })
    }
}
