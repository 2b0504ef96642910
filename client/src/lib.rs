//! # Kart Battle Client
//!
//! Headless client for the kart battle authority. It never owns gameplay
//! state: it sends intents and mirrors what the authority notifies.
//!
//! ## Module Organization
//!
//! ### Mirror Module (`mirror`)
//! Local copies of every replicated value (lives, held items, item boxes,
//! game over, winner, join code, roster) updated from notifications, with
//! local observers fired after each change.
//!
//! ### Join Code Module (`join_code`)
//! Normalizes and checks a user-entered code before any packet is sent.
//!
//! ### Bot Module (`bot`)
//! A scripted player that readies up, reports scene-ready, uses whatever item
//! it holds and occasionally reports crashes.
//!
//! ### Network Module (`network`)
//! UDP connection to the authority: connect handshake, heartbeats and
//! sequenced requests.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::bot::ScriptedPlayer;
//! use client::join_code::normalize;
//! use client::network::Client;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let code = normalize("ab12cd")?;
//!     let player = ScriptedPlayer::new(1, 0.05);
//!     let mut client = Client::new(
//!         "127.0.0.1:8080".parse()?,
//!         code,
//!         player,
//!         Duration::from_millis(500),
//!         0,
//!     )
//!     .await?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod join_code;
pub mod mirror;
pub mod network;
