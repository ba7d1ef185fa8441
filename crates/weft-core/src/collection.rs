use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;
use smallvec::SmallVec;

use crate::state::{Core, Notify, Slot};
use crate::tracking::{self, Dependency, PropKey};
use crate::{Result, State, StateId};

/// A tracked array.
///
/// Reads depend on the whole collection; every structural mutation sends one
/// coarse notification for it (and for the address it is stored under when
/// nested). Per-item diffing is left to children reconciliation.
#[derive(Clone)]
pub struct List(Rc<ListNode>);

struct ListNode {
    core: Core,
    items: RefCell<Vec<Slot>>,
}

impl List {
    pub(crate) fn from_vec(
        items: Vec<Value>,
        address: Option<Dependency>,
        notifier: Weak<dyn Notify>,
    ) -> Self {
        let list = Self(Rc::new(ListNode {
            core: Core::new(address, notifier),
            items: RefCell::new(Vec::new()),
        }));
        let slots = list.wrap_items(items);
        *list.0.items.borrow_mut() = slots;
        list
    }

    pub fn id(&self) -> StateId {
        self.0.core.id
    }

    pub fn address(&self) -> Option<&Dependency> {
        self.0.core.address.as_ref()
    }

    fn items_dep(&self) -> Dependency {
        Dependency::new(self.id(), PropKey::Items)
    }

    fn wrap_items(&self, values: impl IntoIterator<Item = Value>) -> Vec<Slot> {
        let dep = self.items_dep();
        values
            .into_iter()
            .map(|value| Slot::wrap(value, dep.clone(), &self.0.core.notifier))
            .collect()
    }

    fn changed(&self) -> Result<()> {
        let mut deps: SmallVec<[Dependency; 2]> = SmallVec::new();
        deps.push(self.items_dep());
        if let Some(address) = &self.0.core.address {
            deps.push(address.clone());
        }
        log::trace!("mutate {}", self.items_dep());
        self.0.core.notify(&deps)
    }

    /// Apply `f` to the backing items, then notify once.
    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<Slot>) -> R) -> Result<R> {
        let out = f(&mut self.0.items.borrow_mut());
        self.changed()?;
        Ok(out)
    }

    fn slot(&self, index: usize) -> Option<Slot> {
        tracking::record(self.items_dep());
        self.0.items.borrow().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        tracking::record(self.items_dep());
        self.0.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index` as a plain value.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.slot(index).map(|slot| slot.read())
    }

    /// Element at `index` as a tracked object handle.
    pub fn object(&self, index: usize) -> Option<State> {
        match self.slot(index) {
            Some(Slot::Object(state)) => Some(state),
            _ => None,
        }
    }

    pub fn list(&self, index: usize) -> Option<List> {
        match self.slot(index) {
            Some(Slot::List(list)) => Some(list),
            _ => None,
        }
    }

    /// All elements as plain values.
    pub fn values(&self) -> Vec<Value> {
        tracking::record(self.items_dep());
        let slots = self.0.items.borrow().clone();
        slots.iter().map(Slot::read).collect()
    }

    /// Plain copy of the whole collection, untracked.
    pub fn to_value(&self) -> Value {
        Value::Array(self.0.items.borrow().iter().map(Slot::to_value).collect())
    }

    pub fn push(&self, value: impl Into<Value>) -> Result<()> {
        let slots = self.wrap_items([value.into()]);
        self.mutate(|items| items.extend(slots))
    }

    pub fn pop(&self) -> Result<Option<Value>> {
        self.mutate(|items| items.pop().map(|slot| slot.to_value()))
    }

    pub fn shift(&self) -> Result<Option<Value>> {
        self.mutate(|items| {
            if items.is_empty() {
                None
            } else {
                Some(items.remove(0).to_value())
            }
        })
    }

    /// Insert `values` at the front, keeping their order.
    pub fn unshift(&self, values: impl IntoIterator<Item = Value>) -> Result<()> {
        let slots = self.wrap_items(values);
        self.mutate(|items| {
            items.splice(0..0, slots);
        })
    }

    /// Remove `delete_count` elements from `start` and insert `inserted` in
    /// their place. Out-of-range arguments are clamped. Returns the removed
    /// elements.
    pub fn splice(
        &self,
        start: usize,
        delete_count: usize,
        inserted: impl IntoIterator<Item = Value>,
    ) -> Result<Vec<Value>> {
        let slots = self.wrap_items(inserted);
        self.mutate(|items| {
            let start = start.min(items.len());
            let end = start.saturating_add(delete_count).min(items.len());
            items
                .splice(start..end, slots)
                .map(|slot| slot.to_value())
                .collect()
        })
    }

    /// Sort with [`compare_values`].
    pub fn sort(&self) -> Result<()> {
        self.sort_by(compare_values)
    }

    /// Sort with `compare`. The comparator runs outside the list's borrow and
    /// sees it empty while sorting.
    pub fn sort_by(&self, mut compare: impl FnMut(&Value, &Value) -> Ordering) -> Result<()> {
        let taken = std::mem::take(&mut *self.0.items.borrow_mut());
        let mut keyed: Vec<(Value, Slot)> = taken
            .into_iter()
            .map(|slot| (slot.to_value(), slot))
            .collect();
        keyed.sort_by(|(a, _), (b, _)| compare(a, b));
        let sorted: Vec<Slot> = keyed.into_iter().map(|(_, slot)| slot).collect();
        self.mutate(|items| *items = sorted)
    }

    pub fn reverse(&self) -> Result<()> {
        self.mutate(|items| items.reverse())
    }

    /// Overwrite every element with `value`.
    pub fn fill(&self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let len = self.0.items.borrow().len();
        let slots = self.wrap_items(std::iter::repeat_n(value, len));
        self.mutate(|items| *items = slots)
    }

    /// Index assignment. Assigning an equal value is a no-op; assigning past
    /// the end pads with nulls.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if let Some(old) = self.0.items.borrow().get(index)
            && old.loosely_equals(&value)
        {
            return Ok(());
        }
        let mut slots = self.wrap_items([value]);
        self.mutate(|items| {
            if index >= items.len() {
                items.resize(index + 1, Slot::Plain(Value::Null));
            }
            if let Some(slot) = slots.pop() {
                items[index] = slot;
            }
        })
    }

    /// Length assignment: truncates or pads with nulls.
    pub fn set_len(&self, len: usize) -> Result<()> {
        if self.0.items.borrow().len() == len {
            return Ok(());
        }
        self.mutate(|items| items.resize(len, Slot::Plain(Value::Null)))
    }
}

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("List")
            .field("id", &self.id())
            .field("value", &self.to_value())
            .finish()
    }
}

/// Default ordering for [`List::sort`]: null, bools, numbers, strings, then
/// arrays and objects by their serialized text.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a)
            .cmp(&rank(b))
            .then_with(|| a.to_string().cmp(&b.to_string())),
    }
}
