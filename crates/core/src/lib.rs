#![warn(clippy::all, missing_docs)]

//! Core logic for the games catalog client.
//!
//! This crate hosts the data models, configuration handling, the REST
//! client, the local SQLite mirror, and the screen flows that combine
//! them. Frontends only drive the flows and listen for their events.

pub mod api;
pub mod config;
pub mod error;
pub mod flows;
pub mod models;
pub mod store;

pub use api::{ApiClient, CatalogSource};
pub use config::AppConfig;
pub use error::{ApiError, FlowError, StoreError};
pub use flows::{
    DetailOrigin, FavoritesFlow, FetchOutcome, FlowEvent, GameDetailsFlow, GamesListFlow,
};
pub use models::{Game, GamePage, GameUpdate, Genre};
pub use store::GameStore;
