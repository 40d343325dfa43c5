//! Teams and their beacons.

use serde::Deserialize;

use super::{diff_by_id, Entity};
use crate::hash::Hasher;
use crate::plan::Planner;
use crate::game::host::Host;
use crate::game::score::{Score, ScoreFlag, ScoreTicket};

/// Placeholder logo path served when a team has none of its own.
const DEFAULT_LOGO: &str = "/image/team.png";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Team {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub logo: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub flags: ScoreFlag,
    #[serde(default)]
    pub hosts: Vec<Host>,
    #[serde(default)]
    pub score: Score,
    #[serde(default)]
    pub tickets: ScoreTicket,
    #[serde(default)]
    pub offense: bool,
    #[serde(default)]
    pub minimal: bool,
    #[serde(default)]
    pub beacons: Vec<Beacon>,

    #[serde(skip)]
    pub(crate) hash: u64,
    #[serde(skip)]
    pub(crate) total: u64,
}

impl Team {
    /// Resolve the logo once, before hashing: the placeholder (or an
    /// empty value) maps to the built-in image, anything else gets the
    /// assets prefix.
    pub(crate) fn rewrite_logo(&mut self, assets: &str) {
        if self.logo.is_empty() || self.logo == "default.png" {
            self.logo = DEFAULT_LOGO.to_owned();
        } else {
            self.logo = format!("{assets}{}", self.logo);
        }
    }

    pub(crate) fn hash_with(&mut self, h: &mut Hasher) -> u64 {
        if self.hash == 0 {
            h.hash(&self.id);
            h.hash(&self.name);
            h.hash(&self.logo);
            h.hash(&self.color);
            h.hash(&self.offense);
            h.hash(&self.minimal);
            self.hash = h.segment();
        }
        let mut total = self.hash;
        for host in &mut self.hosts {
            host.hash_with(h);
            total = total.wrapping_add(host.total);
        }
        for b in &mut self.beacons {
            total = total.wrapping_add(b.hash_with(h));
        }
        total = total.wrapping_add(self.flags.hash_with(h));
        total = total.wrapping_add(self.score.hash_with(h));
        total = total.wrapping_add(self.tickets.hash_with(h));
        self.total = total;
        self.hash
    }

    pub(crate) fn compare(&self, p: &mut Planner, old: Option<&Team>) {
        let id = format!("team-t{}", self.id);
        match old {
            Some(_) => p.value(&id, "", "team"),
            None => p.delta_value(&id, "", "team"),
        }
        p.push_scope(&id);
        if old.is_some_and(|o| o.hash == self.hash) {
            p.value("beacon", "", "team-beacon");
            p.value("beacon-con", "", "team-beacon-container");
            p.value("logo", "", "team-logo");
            p.value("name", "", "team-name");
            p.value("host", "", "team-host");
            p.value("score", "", "team-score");
            p.value("name-name", self.name.as_str(), "team-name-div");
            p.property("logo", self.color.as_str(), "background-color");
            p.property("logo", format!("url('{}')", self.logo), "background-image");
            p.property("", self.color.as_str(), "border-color");
            if self.offense {
                p.property("", "+offense", "class");
            } else {
                p.property("", "-offense", "class");
            }
            if self.minimal {
                p.property("", "+mini", "class");
            } else {
                p.property("", "-mini", "class");
            }
        } else {
            p.delta_value("beacon", "", "team-beacon");
            p.delta_value("beacon-con", "", "team-beacon-container");
            p.delta_value("logo", "", "team-logo");
            p.delta_value("name", "", "team-name");
            p.delta_value("host", "", "team-host");
            p.delta_value("score", "", "team-score");
            p.delta_value("name-name", self.name.as_str(), "team-name-div");
            p.delta_property("logo", self.color.as_str(), "background-color");
            p.delta_property("logo", format!("url('{}')", self.logo), "background-image");
            p.delta_property("", self.color.as_str(), "border-color");
            if self.offense {
                p.delta_property("", "+offense", "class");
            } else {
                p.delta_property("", "-offense", "class");
            }
            if self.minimal {
                p.delta_property("", "+mini", "class");
            } else {
                p.delta_property("", "-mini", "class");
            }
        }
        self.score.compare(p, old.map(|o| &o.score));
        self.flags.compare(p, old.map(|o| &o.flags));
        self.tickets.compare(p, old.map(|o| &o.tickets));
        match old {
            Some(o) if o.hash == self.hash && o.total == self.total => {
                for (host, prev) in self.hosts.iter().zip(&o.hosts) {
                    Entity::compare(host, p, Some(prev));
                }
                for (b, prev) in self.beacons.iter().zip(&o.beacons) {
                    Entity::compare(b, p, Some(prev));
                }
            }
            _ => {
                diff_by_id(p, old.map_or(&[][..], |o| &o.hosts[..]), &self.hosts);
                diff_by_id(p, old.map_or(&[][..], |o| &o.beacons[..]), &self.beacons);
            }
        }
        p.pop_prefix();
    }
}

impl Entity for Team {
    fn id(&self) -> u64 {
        self.id
    }

    fn compare(&self, p: &mut Planner, old: Option<&Self>) {
        Team::compare(self, p, old);
    }

    fn remove_id(id: u64) -> String {
        format!("team-t{id}")
    }
}

/// A beacon marks a foothold another team holds inside this team's
/// network.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Beacon {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub team: u64,
    #[serde(default)]
    pub color: String,

    #[serde(skip)]
    pub(crate) hash: u64,
}

impl Beacon {
    pub(crate) fn hash_with(&mut self, h: &mut Hasher) -> u64 {
        if self.hash == 0 {
            h.hash(&self.id);
            h.hash(&self.team);
            h.hash(&self.color);
            self.hash = h.segment();
        }
        self.hash
    }

    fn compare(&self, p: &mut Planner, old: Option<&Beacon>) {
        let id = format!("beacon-con-b{}", self.id);
        match old {
            Some(_) => p.value(&id, "", "beacon"),
            None => p.delta_value(&id, "", "beacon"),
        }
        p.push_scope(&id);
        if old.is_some_and(|o| o.hash == self.hash) {
            p.property("", self.team, "tid");
            p.property("", self.color.as_str(), "background");
        } else {
            p.delta_property("", self.team, "tid");
            p.delta_property("", self.color.as_str(), "background");
        }
        p.pop_prefix();
    }
}

impl Entity for Beacon {
    fn id(&self) -> u64 {
        self.id
    }

    fn compare(&self, p: &mut Planner, old: Option<&Self>) {
        Beacon::compare(self, p, old);
    }

    fn remove_id(id: u64) -> String {
        format!("beacon-con-b{id}")
    }
}
