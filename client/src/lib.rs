//! # Game Client Library
//!
//! HTTP client for the rock-paper-scissors matchmaking server, used by the
//! command-line player and by the workspace integration tests.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! One method per server route:
//! - Announce (connect), reusing the player id on later calls
//! - Match polling, which also keeps the player alive on the server
//! - Move submission
//! - Result fetching
//!
//! ### Game Module (`game`)
//! Drives a full match from announce to result, polling at an interval that
//! stays under the server's watchdog period.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::{play_match, MatchSettings};
//! use client::network::RpsClient;
//! use shared::Move;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = RpsClient::new("127.0.0.1:3000");
//!     let report = play_match(&mut client, "alice", Move::Rock, &MatchSettings::default()).await?;
//!     println!("{:?}", report.outcome);
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod network;
