//! Game snapshot model and the per-entity compare procedures.
//!
//! A [`Game`] is parsed from one upstream snapshot document. Ingress is
//! lenient: unknown fields are ignored, missing fields parse as zero
//! values, and the small enums accept both their numeric codes and their
//! textual spellings. Teams are kept in canonical ascending-id order so
//! hashing and diffing are independent of upstream ordering.
//!
//! `compare` walks old and new snapshots together. A field whose entity
//! hash is unchanged is emitted as carry-over (create stream only); a
//! changed field is emitted to both streams. Containers short-circuit on
//! `hash` + `total` and otherwise re-match their children by id.

mod event;
mod host;
mod score;
mod team;
mod tweet;

pub use event::{Event, Events};
pub use host::{Host, Protocol, Service, State};
pub use score::{Score, ScoreFlag, ScoreTicket};
pub use team::{Beacon, Team};
pub use tweet::Tweet;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::hash::Hasher;
use crate::plan::{Planner, Update};

/// Children of a container that are matched by numeric id when the
/// container cannot be compared pairwise. One implementation per entity
/// kind; the remove-id format is part of the wire contract.
pub(crate) trait Entity {
    fn id(&self) -> u64;
    fn compare(&self, p: &mut Planner, old: Option<&Self>);
    fn remove_id(id: u64) -> String;
}

/// Match `old` and `new` children by id: present in new only compares
/// against nothing (all-new), present in both compares pairwise, present
/// in old only emits a remove. New children emit in source order, removes
/// follow in old order.
pub(crate) fn diff_by_id<T: Entity>(p: &mut Planner, old: &[T], new: &[T]) {
    let mut prev: HashMap<u64, &T> = old.iter().map(|e| (e.id(), e)).collect();
    for e in new {
        let was = prev.remove(&e.id());
        e.compare(p, was);
    }
    for e in old {
        if prev.remove(&e.id()).is_some() {
            p.remove(&T::remove_id(e.id()));
        }
    }
}

/// Game mode. Projection strings are part of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    RedVsBlue,
    BlueVsBlue,
    KingOfTheHill,
    Rush,
    ServerDefence,
    Unknown,
}

impl Mode {
    fn code(self) -> u8 {
        match self {
            Mode::RedVsBlue => 0,
            Mode::BlueVsBlue => 1,
            Mode::KingOfTheHill => 2,
            Mode::Rush => 3,
            Mode::ServerDefence => 4,
            Mode::Unknown => u8::MAX,
        }
    }

    fn from_code(v: u8) -> Self {
        match v {
            0 => Mode::RedVsBlue,
            1 => Mode::BlueVsBlue,
            2 => Mode::KingOfTheHill,
            3 => Mode::Rush,
            4 => Mode::ServerDefence,
            _ => Mode::Unknown,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Mode::RedVsBlue => "Red vs Blue",
            Mode::BlueVsBlue => "Blue vs Blue",
            Mode::KingOfTheHill => "King of the Hill",
            Mode::Rush => "Rush",
            Mode::ServerDefence => "Server Defence",
            Mode::Unknown => "Unknown",
        })
    }
}

impl<'de> Deserialize<'de> for Mode {
    fn deserialize<D: serde::Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(u8),
            Text(String),
        }
        Ok(match Raw::deserialize(de)? {
            Raw::Num(n) => Mode::from_code(n),
            Raw::Text(s) => match s.to_lowercase().as_str() {
                "red vs blue" => Mode::RedVsBlue,
                "blue vs blue" => Mode::BlueVsBlue,
                "king of the hill" => Mode::KingOfTheHill,
                "rush" => Mode::Rush,
                "server defence" => Mode::ServerDefence,
                _ => Mode::Unknown,
            },
        })
    }
}

/// Game lifecycle status. A game is active unless cancelled or completed;
/// only active games are addressable by slug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Stopped,
    Running,
    Paused,
    Cancelled,
    Completed,
    Unknown,
}

impl Status {
    fn code(self) -> u8 {
        match self {
            Status::Stopped => 0,
            Status::Running => 1,
            Status::Paused => 2,
            Status::Cancelled => 3,
            Status::Completed => 4,
            Status::Unknown => u8::MAX,
        }
    }

    fn from_code(v: u8) -> Self {
        match v {
            0 => Status::Stopped,
            1 => Status::Running,
            2 => Status::Paused,
            3 => Status::Cancelled,
            4 => Status::Completed,
            _ => Status::Unknown,
        }
    }

    pub fn is_active(self) -> bool {
        !matches!(self, Status::Cancelled | Status::Completed)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Status::Stopped => "Stopped",
            Status::Running => "Running",
            Status::Paused => "Paused",
            Status::Cancelled => "Cancelled",
            Status::Completed => "Completed",
            Status::Unknown => "Unknown",
        })
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: serde::Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(u8),
            Text(String),
        }
        Ok(match Raw::deserialize(de)? {
            Raw::Num(n) => Status::from_code(n),
            Raw::Text(s) => match s.to_lowercase().as_str() {
                "stopped" => Status::Stopped,
                "running" => Status::Running,
                "paused" => Status::Paused,
                "cancelled" => Status::Cancelled,
                "completed" => Status::Completed,
                _ => Status::Unknown,
            },
        })
    }
}

/// Game identification and timing, as returned by the game index.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,

    #[serde(skip)]
    pub(crate) hash: u64,
}

impl Meta {
    /// The `<span>…</span>` start/end block the board header shows.
    /// Empty when the start time is unset.
    pub fn time_span(&self) -> String {
        const FORMAT: &str = "%I:%M %b %-d %Y";
        let Some(start) = self.start else {
            return String::new();
        };
        match self.end {
            None => format!("<span>{}</span>", start.format(FORMAT)),
            Some(end) => format!(
                "<span>{}</span> to <span>{}</span>",
                start.format(FORMAT),
                end.format(FORMAT)
            ),
        }
    }

    pub(crate) fn hash_with(&mut self, h: &mut Hasher) -> u64 {
        if self.hash == 0 {
            h.hash(&self.id);
            h.hash(&self.mode.code());
            h.hash(&self.name);
            h.hash(&self.status.code());
            h.hash(&self.end.map_or(0, |t| t.timestamp()));
            h.hash(&self.start.map_or(0, |t| t.timestamp()));
            self.hash = h.segment();
        }
        self.hash
    }

    fn compare(&self, p: &mut Planner, old: Option<&Meta>) {
        if old.is_some_and(|o| o.hash == self.hash) {
            p.value("status-name", self.name.as_str(), "game-name");
            p.value("status-mode", self.mode.to_string(), "game-mode");
            p.value("status-status", self.status.to_string(), "game-status");
            return;
        }
        p.delta_value("status-name", self.name.as_str(), "game-name");
        p.delta_value("status-mode", self.mode.to_string(), "game-mode");
        p.delta_value("status-status", self.status.to_string(), "game-status");
    }
}

/// Flat wire shape of a snapshot document. Identification and timing live
/// at the top level upstream; we fold them into [`Meta`].
#[derive(Debug, Default, Deserialize)]
struct GameWire {
    #[serde(default)]
    name: String,
    #[serde(default)]
    mode: Mode,
    #[serde(default)]
    status: Status,
    #[serde(default)]
    start: Option<DateTime<Utc>>,
    #[serde(default)]
    end: Option<DateTime<Utc>>,
    #[serde(default)]
    credit: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    teams: Vec<Team>,
    #[serde(default)]
    events: Vec<Event>,
}

/// Root aggregate: one complete snapshot of one game.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "GameWire")]
pub struct Game {
    pub meta: Meta,
    pub teams: Vec<Team>,
    pub events: Events,
    pub tweets: Vec<Tweet>,
    pub credit: String,
    pub message: String,

    pub(crate) hash: u64,
    pub(crate) total: u64,
    pub(crate) tweets_hash: u64,
}

impl From<GameWire> for Game {
    fn from(w: GameWire) -> Self {
        Game {
            meta: Meta {
                id: 0,
                name: w.name,
                mode: w.mode,
                status: w.status,
                start: w.start,
                end: w.end,
                hash: 0,
            },
            teams: w.teams,
            events: Events::from_current(w.events),
            tweets: Vec::new(),
            credit: w.credit,
            message: w.message,
            hash: 0,
            total: 0,
            tweets_hash: 0,
        }
    }
}

impl Game {
    /// A snapshot with no name and no teams carries nothing worth
    /// serving.
    pub fn is_empty(&self) -> bool {
        self.meta.name.is_empty() && self.teams.is_empty()
    }

    /// Produce the `(create, delta)` streams describing this snapshot
    /// relative to `old` (or from nothing when `old` is `None`).
    ///
    /// The first call sorts teams into canonical order, rewrites relative
    /// logo paths against `assets` and stamps every entity; stamps are
    /// memoized for the lifetime of this instance.
    pub fn delta(&mut self, assets: &str, old: Option<&Game>) -> (Vec<Update>, Vec<Update>) {
        self.teams.sort_by_key(|t| t.id);
        if self.hash == 0 {
            let mut h = Hasher::new();
            h.hash(&self.credit);
            h.hash(&self.message);
            self.hash = h.segment();
            self.meta.hash_with(&mut h);
            for t in &mut self.teams {
                t.rewrite_logo(assets);
                t.hash_with(&mut h);
            }
            h.reset();
            self.events.hash_with(&mut h);
            h.reset();
            self.hash_tweets(&mut h);

            let mut total = self
                .hash
                .wrapping_add(self.meta.hash)
                .wrapping_add(self.events.hash())
                .wrapping_add(self.tweets_hash);
            for t in &self.teams {
                total = total.wrapping_add(t.total);
            }
            self.total = total;
        }
        let mut p = Planner::new();
        self.compare(&mut p, old);
        p.into_streams()
    }

    fn hash_tweets(&mut self, h: &mut Hasher) -> u64 {
        if self.tweets_hash == 0 {
            for t in &self.tweets {
                h.hash(&t.id);
            }
            self.tweets_hash = h.segment();
        }
        self.tweets_hash
    }

    fn compare(&mut self, p: &mut Planner, old: Option<&Game>) {
        p.push_scope("game");
        if old.is_some_and(|o| o.hash == self.hash) {
            p.value("status", "", "status");
            p.value("credit", self.credit.as_str(), "game-credit");
            p.value("message", self.message.as_str(), "game-message");
        } else {
            p.delta_value("status", "", "status");
            p.delta_value("credit", self.credit.as_str(), "game-credit");
            p.delta_value("message", self.message.as_str(), "game-message");
        }
        self.meta.compare(p, old.map(|o| &o.meta));
        self.events.compare(p, old.map(|o| &o.events));
        self.compare_tweets(p, old);
        match old {
            Some(o) if o.hash == self.hash && o.total == self.total => {
                // Canonical order and equal totals: same teams, same order.
                for (t, prev) in self.teams.iter().zip(&o.teams) {
                    t.compare(p, Some(prev));
                }
            }
            _ => diff_by_id(p, old.map_or(&[][..], |o| &o.teams[..]), &self.teams),
        }
        p.pop_prefix();
    }

    fn compare_tweets(&self, p: &mut Planner, old: Option<&Game>) {
        if let Some(o) = old.filter(|o| o.tweets_hash == self.tweets_hash) {
            for (t, prev) in self.tweets.iter().zip(&o.tweets) {
                t.compare(p, Some(prev));
            }
            return;
        }
        diff_by_id(p, old.map_or(&[][..], |o| &o.tweets[..]), &self.tweets);
    }
}
