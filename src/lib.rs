//! Library crate for live-chess-back, exposing modules for binaries and integration tests.

/// Rules engine seam and FEN helpers.
pub mod chess;
/// Runtime configuration.
pub mod config;
/// Storage traits, entities and backends.
pub mod dao;
/// Wire payloads of the HTTP API.
pub mod dto;
/// Domain, service and HTTP errors.
pub mod error;
/// HTTP routers.
pub mod routes;
/// Business logic behind the routes and background tasks.
pub mod services;
/// Shared application state.
pub mod state;
