//! Snapshot diffing engine for the scoreboard gateway.
//!
//! This crate turns an authoritative game snapshot into two parallel update
//! streams:
//!
//! - a *create* stream, which rebuilds the full board for a client that has
//!   nothing, and
//! - a *delta* stream, which mutates the view of a client that already holds
//!   the previous snapshot.
//!
//! Every entity is stamped with a segmented 64-bit fingerprint so the common
//! no-change case short-circuits to a handful of hash comparisons. The crate
//! is pure: no I/O, no async, no clocks. The gateway crate owns scheduling,
//! fan-out and the upstream/client seams.

pub mod game;
pub mod hash;
pub mod plan;

pub use game::{Game, Meta, Mode, Status, Tweet};
pub use hash::Hasher;
pub use plan::{Planner, Update};
