//! Update planning.
//!
//! The [`Planner`] accumulates the two parallel streams produced by a diff
//! pass: `create` holds everything a fresh client needs to paint the board
//! from nothing, `delta` holds only what changed since the previous
//! snapshot. Compare procedures route each emission through one of the
//! planner methods; carry-over records land in `create` only, changed
//! records land in both.
//!
//! Record ids are hierarchical, dash-joined strings scoped by a prefix
//! stack — `game-team-t10-name-total` is the score of team 10 inside the
//! `game` scope. Event records are the exception: clients address them by
//! raw event id, so no prefix is applied.

use std::collections::BTreeMap;

use serde::Serialize;

/// Wrapper records carry an empty value; the board script only needs
/// their id and class, so the field stays off the wire.
fn value_is_empty(v: &Option<String>) -> bool {
    v.as_ref().map_or(true, |s| s.is_empty())
}

/// One wire record. An array of these is what a client receives, both on
/// connect (the create stream) and on each tick with changes (the delta
/// stream).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Update {
    pub id: String,
    #[serde(skip_serializing_if = "value_is_empty")]
    pub value: Option<String>,
    /// Set when the record addresses a style/attribute instead of text
    /// content.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub class: String,
    pub event: bool,
    pub remove: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<BTreeMap<String, String>>,
}

impl Update {
    fn new(id: String) -> Self {
        Self {
            id,
            value: None,
            name: String::new(),
            class: String::new(),
            event: false,
            remove: false,
            data: None,
        }
    }
}

/// Values a planner can stringify into a record. Floats render with two
/// fractional digits; everything else uses its natural decimal/textual
/// form. No escaping is applied.
pub trait PlanValue {
    fn render(&self) -> String;
}

impl PlanValue for &str {
    fn render(&self) -> String {
        (*self).to_owned()
    }
}

impl PlanValue for String {
    fn render(&self) -> String {
        self.clone()
    }
}

macro_rules! decimal_plan_value {
    ($($t:ty),+) => {$(
        impl PlanValue for $t {
            fn render(&self) -> String {
                self.to_string()
            }
        }
    )+};
}

decimal_plan_value!(u8, u16, u32, u64, i8, i16, i32, i64, usize, isize, bool);

impl PlanValue for f32 {
    fn render(&self) -> String {
        format!("{self:.2}")
    }
}

impl PlanValue for f64 {
    fn render(&self) -> String {
        format!("{self:.2}")
    }
}

/// Accumulator for one diff pass.
#[derive(Debug, Default)]
pub struct Planner {
    prefix: String,
    stack: Vec<String>,
    create: Vec<Update>,
    delta: Vec<Update>,
}

impl Planner {
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently effective id prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Replace the effective prefix, remembering the previous one.
    pub fn push_prefix(&mut self, prefix: String) {
        self.stack
            .push(std::mem::replace(&mut self.prefix, prefix));
    }

    /// Enter a child scope: the new prefix is the current prefix joined
    /// with `local` the same way record ids are joined.
    pub fn push_scope(&mut self, local: &str) {
        let joined = if self.prefix.is_empty() {
            local.to_owned()
        } else {
            format!("{}-{}", self.prefix, local)
        };
        self.push_prefix(joined);
    }

    /// Restore the prefix that was in effect before the matching push.
    pub fn pop_prefix(&mut self) {
        if let Some(prev) = self.stack.pop() {
            self.prefix = prev;
        }
    }

    fn scoped(&self, local: &str) -> String {
        if local.is_empty() {
            self.prefix.clone()
        } else if self.prefix.is_empty() {
            local.to_owned()
        } else {
            format!("{}-{}", self.prefix, local)
        }
    }

    /// Carry-over emission: the element keeps this value, create only.
    pub fn value<V: PlanValue>(&mut self, id: &str, v: V, class: &str) {
        let mut u = Update::new(self.scoped(id));
        u.value = Some(v.render());
        u.class = class.to_owned();
        self.create.push(u);
    }

    /// Carry-over attribute emission, create only.
    pub fn property<V: PlanValue>(&mut self, id: &str, v: V, name: &str) {
        let mut u = Update::new(self.scoped(id));
        u.value = Some(v.render());
        u.name = name.to_owned();
        self.create.push(u);
    }

    /// Changed emission: identical record to both streams.
    pub fn delta_value<V: PlanValue>(&mut self, id: &str, v: V, class: &str) {
        let mut u = Update::new(self.scoped(id));
        u.value = Some(v.render());
        u.class = class.to_owned();
        self.delta.push(u.clone());
        self.create.push(u);
    }

    /// Changed attribute emission, both streams.
    pub fn delta_property<V: PlanValue>(&mut self, id: &str, v: V, name: &str) {
        let mut u = Update::new(self.scoped(id));
        u.value = Some(v.render());
        u.name = name.to_owned();
        self.delta.push(u.clone());
        self.create.push(u);
    }

    /// Delete the addressed element, delta only.
    pub fn remove(&mut self, id: &str) {
        let mut u = Update::new(self.scoped(id));
        u.remove = true;
        self.delta.push(u);
    }

    /// Carry-over event record, create only. Event ids are not prefixed.
    pub fn event(&mut self, id: u64, kind: u8, data: &BTreeMap<String, String>) {
        let mut u = Update::new(id.to_string());
        u.value = Some(kind.to_string());
        u.event = true;
        u.data = Some(data.clone());
        self.create.push(u);
    }

    /// Changed event record, both streams.
    pub fn delta_event(&mut self, id: u64, kind: u8, data: &BTreeMap<String, String>) {
        let mut u = Update::new(id.to_string());
        u.value = Some(kind.to_string());
        u.event = true;
        u.data = Some(data.clone());
        self.delta.push(u.clone());
        self.create.push(u);
    }

    /// Retract an event record, delta only.
    pub fn remove_event(&mut self, id: u64, kind: u8) {
        let mut u = Update::new(id.to_string());
        u.value = Some(kind.to_string());
        u.event = true;
        u.remove = true;
        self.delta.push(u);
    }

    /// Consume the planner, yielding `(create, delta)`.
    pub fn into_streams(self) -> (Vec<Update>, Vec<Update>) {
        (self.create, self.delta)
    }
}
