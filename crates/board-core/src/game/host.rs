//! Hosts and the services they expose.

use serde::Deserialize;

use super::{diff_by_id, Entity};
use crate::hash::Hasher;
use crate::plan::Planner;

/// Service check state. Upstream spells this as a colour name, a short
/// code or a numeric level; unknown values degrade to red.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    Green,
    Yellow,
    #[default]
    Red,
}

impl State {
    fn code(self) -> u8 {
        match self {
            State::Green => 0,
            State::Yellow => 1,
            State::Red => 2,
        }
    }

    /// CSS class of the port cell.
    pub(crate) fn class(self) -> &'static str {
        match self {
            State::Red => "err",
            State::Yellow => "warn",
            State::Green => "port",
        }
    }

    /// Background colour shown for the service cell.
    pub(crate) fn color(self) -> &'static str {
        match self {
            State::Red => "rgb(255, 0, 0)",
            State::Yellow => "rgb(173, 164, 21)",
            State::Green => "rgb(40, 111, 36)",
        }
    }
}

impl<'de> Deserialize<'de> for State {
    fn deserialize<D: serde::Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(u8),
            Text(String),
        }
        Ok(match Raw::deserialize(de)? {
            Raw::Num(0) => State::Green,
            Raw::Num(1) => State::Yellow,
            Raw::Num(_) => State::Red,
            Raw::Text(s) => match s.to_lowercase().as_str() {
                "green" | "g" | "good" | "ok" => State::Green,
                "yellow" | "y" | "issue" => State::Yellow,
                _ => State::Red,
            },
        })
    }
}

/// Service transport protocol; unknown values degrade to tcp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Icmp,
}

impl Protocol {
    fn code(self) -> u8 {
        match self {
            Protocol::Tcp => 0,
            Protocol::Udp => 1,
            Protocol::Icmp => 2,
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
        })
    }
}

impl<'de> Deserialize<'de> for Protocol {
    fn deserialize<D: serde::Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(u8),
            Text(String),
        }
        Ok(match Raw::deserialize(de)? {
            Raw::Num(1) => Protocol::Udp,
            Raw::Num(2) => Protocol::Icmp,
            Raw::Num(_) => Protocol::Tcp,
            Raw::Text(s) => match s.to_lowercase().as_str() {
                "udp" | "u" => Protocol::Udp,
                "icmp" | "i" | "p" | "ping" => Protocol::Icmp,
                _ => Protocol::Tcp,
            },
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Service {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub port: u16,
    #[serde(default, rename = "status")]
    pub state: State,
    #[serde(default, rename = "bool")]
    pub bonus: bool,
    #[serde(default)]
    pub protocol: Protocol,

    #[serde(skip)]
    pub(crate) hash: u64,
}

impl Service {
    pub(crate) fn hash_with(&mut self, h: &mut Hasher) -> u64 {
        if self.hash == 0 {
            h.hash(&self.id);
            h.hash(&self.port);
            h.hash(&self.state.code());
            h.hash(&self.bonus);
            h.hash(&self.protocol.code());
            self.hash = h.segment();
        }
        self.hash
    }

    fn compare(&self, p: &mut Planner, old: Option<&Service>) {
        let id = format!("s{}", self.id);
        match old {
            Some(_) => p.value(&id, "", "service"),
            None => p.delta_value(&id, "", "service"),
        }
        p.push_scope(&id);
        if old.is_some_and(|o| o.hash == self.hash) {
            p.value("port", self.port, self.state.class());
            p.value("protocol", self.protocol.to_string(), "service-protocol");
            if self.bonus {
                p.property("", "+bonus", "class");
            } else {
                p.property("", "-bonus", "class");
            }
            p.property("", self.state.color(), "background-color");
            p.pop_prefix();
            return;
        }
        p.delta_value("port", self.port, self.state.class());
        p.delta_value("protocol", self.protocol.to_string(), "service-protocol");
        if self.bonus {
            p.delta_property("", "+bonus", "class");
        } else {
            p.delta_property("", "-bonus", "class");
        }
        p.delta_property("", self.state.color(), "background-color");
        p.pop_prefix();
    }
}

impl Entity for Service {
    fn id(&self) -> u64 {
        self.id
    }

    fn compare(&self, p: &mut Planner, old: Option<&Self>) {
        Service::compare(self, p, old);
    }

    fn remove_id(id: u64) -> String {
        format!("s{id}")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Host {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub services: Vec<Service>,

    #[serde(skip)]
    pub(crate) hash: u64,
    #[serde(skip)]
    pub(crate) total: u64,
}

impl Host {
    pub(crate) fn hash_with(&mut self, h: &mut Hasher) -> u64 {
        if self.hash == 0 {
            h.hash(&self.id);
            h.hash(&self.name);
            h.hash(&self.online);
            self.hash = h.segment();
        }
        self.total = self.hash;
        for s in &mut self.services {
            let sh = s.hash_with(h);
            self.total = self.total.wrapping_add(sh);
        }
        self.hash
    }

    fn compare(&self, p: &mut Planner, old: Option<&Host>) {
        let id = format!("host-h{}", self.id);
        match old {
            Some(_) => p.value(&id, "", "host"),
            None => p.delta_value(&id, "", "host"),
        }
        p.push_scope(&id);
        if old.is_some_and(|o| o.hash == self.hash) {
            p.value("name", self.name.as_str(), "host-name");
            if self.online {
                p.property("", "-offline", "class");
            } else {
                p.property("", "+offline", "class");
            }
        } else {
            p.delta_value("name", self.name.as_str(), "host-name");
            if self.online {
                p.delta_property("", "-offline", "class");
            } else {
                p.delta_property("", "+offline", "class");
            }
        }
        match old {
            Some(o) if o.hash == self.hash && o.total == self.total => {
                for (s, prev) in self.services.iter().zip(&o.services) {
                    Entity::compare(s, p, Some(prev));
                }
            }
            _ => diff_by_id(p, old.map_or(&[][..], |o| &o.services[..]), &self.services),
        }
        p.pop_prefix();
    }
}

impl Entity for Host {
    fn id(&self) -> u64 {
        self.id
    }

    fn compare(&self, p: &mut Planner, old: Option<&Self>) {
        Host::compare(self, p, old);
    }

    fn remove_id(id: u64) -> String {
        format!("host-h{id}")
    }
}
