//! Score blocks nested under a team.

use serde::Deserialize;

use crate::hash::Hasher;
use crate::plan::Planner;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Score {
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub health: i64,

    #[serde(skip)]
    pub(crate) hash: u64,
}

impl Score {
    pub(crate) fn hash_with(&mut self, h: &mut Hasher) -> u64 {
        if self.hash == 0 {
            h.hash(&self.total);
            h.hash(&self.health);
            self.hash = h.segment();
        }
        self.hash
    }

    pub(crate) fn compare(&self, p: &mut Planner, old: Option<&Score>) {
        if old.is_some_and(|o| o.hash == self.hash) {
            p.value("name-total", self.total, "score-total score");
            p.value("score-health", self.health, "score-health score");
            return;
        }
        p.delta_value("name-total", self.total, "score-total score");
        p.delta_value("score-health", self.health, "score-health score");
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoreFlag {
    #[serde(default)]
    pub open: u32,
    #[serde(default)]
    pub lost: u32,
    #[serde(default)]
    pub captured: u32,

    #[serde(skip)]
    pub(crate) hash: u64,
}

impl ScoreFlag {
    pub(crate) fn hash_with(&mut self, h: &mut Hasher) -> u64 {
        if self.hash == 0 {
            h.hash(&self.open);
            h.hash(&self.lost);
            h.hash(&self.captured);
            self.hash = h.segment();
        }
        self.hash
    }

    pub(crate) fn compare(&self, p: &mut Planner, old: Option<&ScoreFlag>) {
        if old.is_some_and(|o| o.hash == self.hash) {
            p.value("score-fopen", self.open, "score-flag-open score score-flag");
            p.value("score-flost", self.lost, "score-flag-lost score score-flag");
            p.value(
                "score-fcaptured",
                self.captured,
                "score-flag-captured score score-flag",
            );
            return;
        }
        p.delta_value("score-fopen", self.open, "score-flag-open score score-flag");
        p.delta_value("score-flost", self.lost, "score-flag-lost score score-flag");
        p.delta_value(
            "score-fcaptured",
            self.captured,
            "score-flag-captured score score-flag",
        );
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoreTicket {
    #[serde(default)]
    pub open: u32,
    #[serde(default)]
    pub closed: u32,

    #[serde(skip)]
    pub(crate) hash: u64,
}

impl ScoreTicket {
    pub(crate) fn hash_with(&mut self, h: &mut Hasher) -> u64 {
        if self.hash == 0 {
            h.hash(&self.open);
            h.hash(&self.closed);
            self.hash = h.segment();
        }
        self.hash
    }

    pub(crate) fn compare(&self, p: &mut Planner, old: Option<&ScoreTicket>) {
        if old.is_some_and(|o| o.hash == self.hash) {
            p.value("score-topen", self.open, "score-ticket-open score score-ticket");
            p.value(
                "score-tclosed",
                self.closed,
                "score-ticket-closed score score-ticket",
            );
            return;
        }
        p.delta_value("score-topen", self.open, "score-ticket-open score score-ticket");
        p.delta_value(
            "score-tclosed",
            self.closed,
            "score-ticket-closed score score-ticket",
        );
    }
}
