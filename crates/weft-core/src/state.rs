//! Observable state.
//!
//! Plain data enters the engine as a [`serde_json::Value`] and comes out as a
//! tracked node: [`State`] for objects, [`List`] for arrays. Every read through
//! a tracked node is recorded into the current tracking frame; every write
//! that actually changes something notifies the owning [`Runtime`].
//!
//! ```rust
//! use serde_json::json;
//! use weft_core::*;
//!
//! let rt = Runtime::new(MemoryHost::new());
//! let state = rt.state(json!({ "count": 0, "user": { "name": "Ada" } }))?;
//!
//! state.set("count", 1)?;
//! assert_eq!(state.get("count"), Some(json!(1)));
//!
//! let user = state.object("user").unwrap();
//! user.set("name", "Grace")?;
//! assert_eq!(state.to_value(), json!({ "count": 1, "user": { "name": "Grace" } }));
//! # Ok::<(), weft_core::Error>(())
//! ```
//!
//! [`Runtime`]: crate::Runtime

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value};
use smallvec::SmallVec;

use crate::tracking::{self, Dependency, PropKey};
use crate::{Error, List, Result};

/// Opaque, process-unique identity of a state node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(u64);

static NEXT_STATE_ID: AtomicU64 = AtomicU64::new(1);

impl StateId {
    fn next() -> Self {
        Self(NEXT_STATE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Receiver of write notifications; implemented by the runtime.
pub(crate) trait Notify {
    fn notify(&self, deps: &[Dependency]) -> Result<()>;
}

/// Identity and routing shared by objects and lists.
pub(crate) struct Core {
    pub(crate) id: StateId,
    /// Where this node was stored in its parent, if nested.
    pub(crate) address: Option<Dependency>,
    pub(crate) notifier: Weak<dyn Notify>,
}

impl Core {
    pub(crate) fn new(address: Option<Dependency>, notifier: Weak<dyn Notify>) -> Self {
        Self {
            id: StateId::next(),
            address,
            notifier,
        }
    }

    pub(crate) fn notify(&self, deps: &[Dependency]) -> Result<()> {
        match self.notifier.upgrade() {
            Some(notifier) => notifier.notify(deps),
            // runtime is gone; nothing left to update
            None => Ok(()),
        }
    }
}

/// One stored property or element.
#[derive(Clone)]
pub(crate) enum Slot {
    Plain(Value),
    Object(State),
    List(List),
}

impl Slot {
    pub(crate) fn wrap(value: Value, address: Dependency, notifier: &Weak<dyn Notify>) -> Self {
        match value {
            Value::Object(map) => Slot::Object(State::from_map(map, Some(address), notifier.clone())),
            Value::Array(items) => Slot::List(List::from_vec(items, Some(address), notifier.clone())),
            plain => Slot::Plain(plain),
        }
    }

    /// Plain copy of the slot, recording every nested read.
    pub(crate) fn read(&self) -> Value {
        match self {
            Slot::Plain(value) => value.clone(),
            Slot::Object(state) => state.read_all(),
            Slot::List(list) => Value::Array(list.values()),
        }
    }

    /// Plain copy of the slot without recording anything.
    pub(crate) fn to_value(&self) -> Value {
        match self {
            Slot::Plain(value) => value.clone(),
            Slot::Object(state) => state.to_value(),
            Slot::List(list) => list.to_value(),
        }
    }

    pub(crate) fn loosely_equals(&self, other: &Value) -> bool {
        loosely_equal(&self.to_value(), other)
    }
}

/// A tracked object.
///
/// Cloning the handle shares the node; identity is stable for the node's
/// lifetime.
#[derive(Clone)]
pub struct State(Rc<StateNode>);

struct StateNode {
    core: Core,
    fields: RefCell<BTreeMap<String, Slot>>,
}

impl State {
    pub(crate) fn from_map(
        map: Map<String, Value>,
        address: Option<Dependency>,
        notifier: Weak<dyn Notify>,
    ) -> Self {
        let core = Core::new(address, notifier);
        let fields = map
            .into_iter()
            .map(|(key, value)| {
                let slot = Slot::wrap(value, Dependency::new(core.id, PropKey::field(&key)), &core.notifier);
                (key, slot)
            })
            .collect();
        Self(Rc::new(StateNode {
            core,
            fields: RefCell::new(fields),
        }))
    }

    pub fn id(&self) -> StateId {
        self.0.core.id
    }

    /// The (parent identity, key) this node was stored under, if nested.
    pub fn address(&self) -> Option<&Dependency> {
        self.0.core.address.as_ref()
    }

    fn field_dep(&self, key: &str) -> Dependency {
        Dependency::new(self.id(), PropKey::field(key))
    }

    fn shape_dep(&self) -> Dependency {
        Dependency::new(self.id(), PropKey::Items)
    }

    /// Read a property as a plain value.
    pub fn get(&self, key: &str) -> Option<Value> {
        tracking::record(self.field_dep(key));
        let slot = self.0.fields.borrow().get(key).cloned();
        slot.map(|slot| slot.read())
    }

    /// Read a nested object property as a tracked handle.
    pub fn object(&self, key: &str) -> Option<State> {
        tracking::record(self.field_dep(key));
        match self.0.fields.borrow().get(key) {
            Some(Slot::Object(state)) => Some(state.clone()),
            _ => None,
        }
    }

    /// Read a nested array property as a tracked handle.
    pub fn list(&self, key: &str) -> Option<List> {
        tracking::record(self.field_dep(key));
        match self.0.fields.borrow().get(key) {
            Some(Slot::List(list)) => Some(list.clone()),
            _ => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        tracking::record(self.field_dep(key));
        self.0.fields.borrow().contains_key(key)
    }

    /// Property names; depends on properties being added or removed.
    pub fn keys(&self) -> Vec<String> {
        tracking::record(self.shape_dep());
        self.0.fields.borrow().keys().cloned().collect()
    }

    /// Write a property.
    ///
    /// Writing a value loosely equal to the current one does nothing. Otherwise
    /// the value is stored (objects and arrays are wrapped, addressed by this
    /// node and `key`) and every binding depending on the property runs before
    /// this call returns.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let added = {
            let fields = self.0.fields.borrow();
            match fields.get(key) {
                Some(old) if old.loosely_equals(&value) => return Ok(()),
                Some(_) => false,
                None => true,
            }
        };

        let dep = self.field_dep(key);
        let slot = Slot::wrap(value, dep.clone(), &self.0.core.notifier);
        self.0.fields.borrow_mut().insert(key.to_owned(), slot);
        log::trace!("write {dep}");

        let mut deps: SmallVec<[Dependency; 2]> = SmallVec::new();
        deps.push(dep);
        if added {
            deps.push(self.shape_dep());
        }
        self.0.core.notify(&deps)
    }

    /// Delete a property; notifies like a write when it existed.
    pub fn remove(&self, key: &str) -> Result<Option<Value>> {
        let Some(old) = self.0.fields.borrow_mut().remove(key) else {
            return Ok(None);
        };
        let dep = self.field_dep(key);
        log::trace!("delete {dep}");
        self.0.core.notify(&[dep, self.shape_dep()])?;
        Ok(Some(old.to_value()))
    }

    /// Plain copy of the whole node, untracked.
    pub fn to_value(&self) -> Value {
        let fields = self.0.fields.borrow();
        Value::Object(
            fields
                .iter()
                .map(|(key, slot)| (key.clone(), slot.to_value()))
                .collect(),
        )
    }

    /// Plain copy of the whole node, recording every property on the way.
    fn read_all(&self) -> Value {
        tracking::record(self.shape_dep());
        let fields: Vec<(String, Slot)> = self
            .0
            .fields
            .borrow()
            .iter()
            .map(|(key, slot)| (key.clone(), slot.clone()))
            .collect();
        let mut map = Map::new();
        for (key, slot) in fields {
            tracking::record(self.field_dep(&key));
            map.insert(key, slot.read());
        }
        Value::Object(map)
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("id", &self.id())
            .field("value", &self.to_value())
            .finish()
    }
}

/// A freshly wrapped value: either shape of tracked node.
#[derive(Clone, Debug)]
pub enum Tracked {
    Object(State),
    List(List),
}

impl Tracked {
    pub fn id(&self) -> StateId {
        match self {
            Tracked::Object(state) => state.id(),
            Tracked::List(list) => list.id(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Tracked::Object(state) => state.to_value(),
            Tracked::List(list) => list.to_value(),
        }
    }

    pub fn into_state(self) -> Result<State> {
        match self {
            Tracked::Object(state) => Ok(state),
            Tracked::List(_) => Err(Error::UnexpectedShape {
                expected: "object",
                found: "array",
            }),
        }
    }

    pub fn into_list(self) -> Result<List> {
        match self {
            Tracked::List(list) => Ok(list),
            Tracked::Object(_) => Err(Error::UnexpectedShape {
                expected: "array",
                found: "object",
            }),
        }
    }
}

pub(crate) fn wrap_with(value: Value, notifier: Weak<dyn Notify>) -> Result<Tracked> {
    match value {
        Value::Object(map) => Ok(Tracked::Object(State::from_map(map, None, notifier))),
        Value::Array(items) => Ok(Tracked::List(List::from_vec(items, None, notifier))),
        other => Err(Error::NotStructured {
            found: value_kind(&other),
        }),
    }
}

/// Plain value behind a tracked node; `unwrap(&rt.wrap(v)?) == v`.
pub fn unwrap(tracked: &Tracked) -> Value {
    tracked.to_value()
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Deep equality where numbers compare by numeric value (`1 == 1.0`).
pub fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| loosely_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| loosely_equal(x, y)))
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Nobody;
    impl Notify for Nobody {
        fn notify(&self, _deps: &[Dependency]) -> Result<()> {
            Ok(())
        }
    }

    fn detached(value: Value) -> Tracked {
        let weak: Weak<dyn Notify> = Weak::<Nobody>::new();
        wrap_with(value, weak).unwrap()
    }

    #[test]
    fn scalars_are_rejected() {
        let weak: Weak<dyn Notify> = Weak::<Nobody>::new();
        let err = wrap_with(json!(3), weak.clone()).unwrap_err();
        assert!(matches!(err, Error::NotStructured { found: "number" }));
        assert!(matches!(
            wrap_with(Value::Null, weak),
            Err(Error::NotStructured { found: "null" })
        ));
    }

    #[test]
    fn loose_equality_compares_numbers_numerically() {
        assert!(loosely_equal(&json!(1), &json!(1.0)));
        assert!(loosely_equal(&json!({"a": [1, 2]}), &json!({"a": [1.0, 2]})));
        assert!(!loosely_equal(&json!("1"), &json!(1)));
        assert!(!loosely_equal(&json!([1]), &json!([1, 2])));
    }

    #[test]
    fn reads_record_their_address() {
        let state = detached(json!({"a": 1, "b": 2})).into_state().unwrap();
        let (value, touched) = tracking::track(|| state.get("a"));
        assert_eq!(value, Some(json!(1)));
        assert_eq!(
            touched.as_slice(),
            &[Dependency::new(state.id(), PropKey::field("a"))]
        );
    }

    #[test]
    fn replaced_child_gets_new_identity_but_keeps_address() {
        let state = detached(json!({"todos": [1]})).into_state().unwrap();
        let before = state.list("todos").unwrap();
        state.set("todos", json!([1, 2])).unwrap();
        let after = state.list("todos").unwrap();

        assert_ne!(before.id(), after.id());
        assert_eq!(before.address(), after.address());
        assert_eq!(
            after.address(),
            Some(&Dependency::new(state.id(), PropKey::field("todos")))
        );
    }

    #[test]
    fn deep_get_depends_on_nested_fields() {
        let state = detached(json!({"user": {"name": "Ada"}})).into_state().unwrap();
        let user = state.object("user").unwrap();
        let (_, touched) = tracking::track(|| state.get("user"));
        assert!(touched.contains(&Dependency::new(user.id(), PropKey::field("name"))));
    }
}
