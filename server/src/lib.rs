//! # Kart Battle Authority
//!
//! Server-authoritative state for a small multiplayer kart battle. The host
//! owns every piece of gameplay state; clients only send intents and receive
//! change notifications.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative State
//! Lives, held items, item box availability, the lobby roster and the
//! win condition all live on the authority as replicated values. Each write
//! that changes a value notifies observers exactly once, and the session
//! forwards those notifications to clients as packets.
//!
//! ### Ingress Validation
//! Every remote request carries the caller identity supplied by the
//! transport. Ownership, host privilege, bounds, staleness and duplicate
//! checks happen before any mutation; rejected requests are dropped without
//! a reply.
//!
//! ### Arbitration
//! Simultaneous item box contacts, repeated item use and multi-contact
//! projectiles are resolved by latches set within a tick, so each resource
//! is granted or consumed at most once.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Tick Loop
//! Requests and physics contacts are queued as they arrive and applied at the
//! next tick boundary in arrival order. Timers (item box respawn, projectile
//! expiry) are advanced by the same loop, so the core never needs locks.
//!
//! ### Explicit Session Context
//! `session::Session` owns all state for one match. Components publish
//! lifecycle events on a session-scoped bus instead of global events.
//!
//! ## Module Organization
//!
//! - `replicated`: observable values and lists
//! - `validation`: request rejection reasons and checks
//! - `health`, `kart_items`, `items`, `item_box`, `projectile`: per-entity rules
//! - `game`, `lobby`, `join_code`, `spawner`: session-wide rules
//! - `timer`, `events`: tick-driven scheduling and the event bus
//! - `relay`: session bootstrap with direct-mode fallback
//! - `client_manager`, `network`: UDP transport glue
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new("127.0.0.1:8080", ServerConfig::default(), None).await?;
//!
//!     // Runs the receiver, sender and timeout tasks plus the tick loop
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod events;
pub mod game;
pub mod health;
pub mod item_box;
pub mod items;
pub mod join_code;
pub mod kart_items;
pub mod lobby;
pub mod network;
pub mod projectile;
pub mod relay;
pub mod replicated;
pub mod session;
pub mod spawner;
pub mod timer;
pub mod validation;
