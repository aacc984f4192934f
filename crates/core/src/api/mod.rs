//! REST client for the remote games catalog.

/// `reqwest`-backed client.
pub mod client;
/// Request target descriptions.
pub mod endpoint;

use async_trait::async_trait;

use crate::{
    error::ApiResult,
    models::{Game, GamePage},
};

pub use client::ApiClient;
pub use endpoint::{Endpoint, GameDetailEndpoint, GamesEndpoint, HttpMethod};

/// Remote source of catalog records consumed by the flows.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch one page of the listing, optionally filtered server-side.
    async fn list_games(
        &self,
        page: u32,
        page_size: u32,
        search: Option<&str>,
    ) -> ApiResult<GamePage>;

    /// Fetch the full record for one game.
    async fn game_details(&self, game_id: i64) -> ApiResult<Game>;
}
