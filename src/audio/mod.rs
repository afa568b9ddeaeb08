//! # Audio Module
//!
//! Everything that talks to the audio backend, plus the command-facing player.
//!
//! ### [`backend`] - Backend seams
//! - `AudioBackend` control protocol and `TrackSearch` capability traits
//! - Normalized lifecycle events and search results
//!
//! ### [`lavalink`] - Lavalink v4 node
//! - REST player updates and track loading
//! - Event WebSocket with reconnect backoff
//! - Voice credentials through songbird's gateway-only join
//!
//! ### [`resolver`] - Query resolution
//! - URL pass-through, search prefix for free text, first hit wins
//!
//! ### [`player`] - Music player
//! - Play / playlist / control entry points used by the commands
//! - Autoplay on first listener arrival
//!
//! ### [`track`] - Track and loop mode values

pub mod backend;
pub mod lavalink;
pub mod player;
pub mod resolver;
pub mod track;
