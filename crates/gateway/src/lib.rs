//! Real-time scoreboard fan-out gateway.
//!
//! The gateway sits between the scorebot API and browser clients watching
//! a competition scoreboard:
//!
//! ```text
//! scorebot API  --poll-->  Collection (tick)
//!                               ↓ diff per subscription (board-core)
//!                          Subscription fan-out
//!                               ↓ JSON update arrays
//!                          WebSocket clients
//! ```
//!
//! On every tick the collection pulls a fresh snapshot per subscribed
//! game, diffs it against the previous one and pushes the delta to every
//! connected client; new clients get the cached create stream so they can
//! paint the full board immediately. Tweets from an external feed are
//! filtered, buffered and merged into each snapshot until they expire.
//!
//! Slow consumers and a slow upstream stay bounded: the tick runs under a
//! deadline, client and tweet intake queues are bounded, and a failed or
//! timed-out client write drops that client.

pub mod channel;
pub mod collection;
pub mod config;
pub mod error;
pub mod source;
pub mod subscription;
pub mod tweets;
pub mod ws_server;

pub use channel::{ClientChannel, WsChannel};
pub use collection::{slugify, Collection};
pub use config::Config;
pub use error::{GatewayError, Result};
pub use source::{ScorebotClient, SnapshotSource};
pub use subscription::Subscription;
pub use tweets::{tweet_queue, FeedTweet, TweetBuffer, TweetFilter, TweetSender};
pub use ws_server::{create_router, AppState};
