//! # Matchmaking Server Library
//!
//! This library provides the authoritative server for online rock-paper-scissors.
//! Anonymous clients announce themselves, wait in a queue, get paired into
//! matches, submit one move each and fetch the resolved result. The server owns
//! every piece of live state and mirrors player records to a document store.
//!
//! ## Core Responsibilities
//!
//! ### Matchmaking
//! Players are paired strictly first-come-first-served. A player is never in
//! the queue and in a match at the same time, and a match always has two
//! distinct participants.
//!
//! ### Move Resolution
//! The second move of a match resolves it into per-player outcomes. A match
//! resolves exactly once, even when both moves arrive concurrently.
//!
//! ### Result Delivery and Statistics
//! Resolved results are held until both participants have fetched them, then
//! each participant's win/loss/tie record is incremented exactly once.
//!
//! ### Liveness
//! Clients never say goodbye. A periodic watchdog treats players that stop
//! polling as gone and reclaims whatever they held:
//! - Queue positions
//! - Live matches (the opponent is released too)
//! - Results nobody will fetch, after a retention window
//!
//! ## Architecture Design
//!
//! ### Single Ownership Boundary
//! All live state sits behind one lock inside [`service::MatchmakingService`].
//! HTTP handlers and the watchdog both go through it, so pairing, resolution
//! and statistics updates never interleave.
//!
//! ### Document Store Mirror
//! The in-memory state is authoritative. Player documents (display name,
//! record, status, last seen) and a match archive are written through the
//! [`store::DocumentStore`] trait, with an in-memory and an HTTP backend.
//!
//! ## Module Organization
//!
//! - `directory`: player profiles, liveness timestamps and records
//! - `queue`: FIFO of players waiting for an opponent
//! - `registry`: active matches and move resolution
//! - `ledger`: resolved results awaiting both fetches
//! - `service`: the operations clients invoke
//! - `watchdog`: periodic liveness sweep
//! - `store`: document store trait and backends
//! - `http`: axum routes and JSON mapping
//! - `error`: error taxonomy shared by all of the above
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::service::{MatchmakingService, ServiceConfig};
//! use server::store::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     let service = Arc::new(MatchmakingService::new(store, ServiceConfig::default()));
//!
//!     // Reclaim silent players every two seconds
//!     server::watchdog::spawn_watchdog(Arc::clone(&service));
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     server::http::serve(listener, service).await?;
//!     Ok(())
//! }
//! ```

pub mod directory;
pub mod error;
pub mod http;
pub mod ledger;
pub mod queue;
pub mod registry;
pub mod service;
pub mod store;
pub mod watchdog;
