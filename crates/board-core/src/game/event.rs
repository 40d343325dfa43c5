//! Game events and the highlighted window event.
//!
//! Events with a non-zero type promote to the single "window" slot — the
//! one event the board currently highlights. The window pointer survives
//! snapshot replacement: the new snapshot inherits it before its own
//! events are processed, and promoting a different event retracts the
//! outgoing one first.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::hash::Hasher;
use crate::plan::Planner;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub id: u64,
    /// Zero marks a non-window event.
    #[serde(default, rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct Events {
    pub current: Vec<Event>,
    pub window: Option<Event>,

    hash: u64,
}

impl Events {
    pub(crate) fn from_current(current: Vec<Event>) -> Self {
        Events {
            current,
            window: None,
            hash: 0,
        }
    }

    pub(crate) fn hash(&self) -> u64 {
        self.hash
    }

    pub(crate) fn hash_with(&mut self, h: &mut Hasher) -> u64 {
        if self.hash == 0 {
            for e in &self.current {
                h.hash(&e.id);
                h.hash(&e.kind);
                for (k, v) in &e.data {
                    h.hash(k);
                    h.hash(v);
                }
            }
            self.hash = h.segment();
        }
        self.hash
    }

    pub(crate) fn compare(&mut self, p: &mut Planner, old: Option<&Events>) {
        // The window carries over from the previous snapshot; promotions
        // below may replace it.
        if let Some(o) = old {
            self.window = o.window.clone();
        }
        if old.is_some_and(|o| o.hash == self.hash) {
            for e in &self.current {
                p.event(e.id, e.kind, &e.data);
            }
            return;
        }
        let old_list = old.map_or(&[][..], |o| &o.current[..]);
        let mut prev: std::collections::HashMap<u64, &Event> =
            old_list.iter().map(|e| (e.id, e)).collect();
        let mut window = self.window.take();
        for e in &self.current {
            let was = prev.remove(&e.id);
            if e.kind > 0 {
                promote(p, &mut window, e);
            }
            match was {
                Some(_) => p.event(e.id, e.kind, &e.data),
                None => p.delta_event(e.id, e.kind, &e.data),
            }
        }
        for e in old_list {
            if prev.remove(&e.id).is_some() {
                p.remove_event(e.id, e.kind);
            }
        }
        self.window = window;
    }
}

/// Promote `e` into the window slot, retracting the event it displaces.
fn promote(p: &mut Planner, window: &mut Option<Event>, e: &Event) {
    if let Some(w) = window {
        if w.id == e.id {
            return;
        }
        p.remove_event(w.id, w.kind);
    }
    *window = Some(e.clone());
}
