use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::tracking::{Dependency, PropKey};
use crate::{DescriptorId, StateId};

/// Which update algorithm a binding runs.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BindingKind {
    /// Presence of a dynamic descriptor's rendering.
    Component,
    /// Element kind of a rendered element.
    Type,
    /// Whole attribute map.
    Attributes,
    /// One attribute, by name.
    Attribute(Rc<str>),
    /// Keyed child list.
    Children,
}

impl BindingKind {
    const COUNT: usize = 5;

    fn slot(&self) -> usize {
        match self {
            BindingKind::Component => 0,
            BindingKind::Type => 1,
            BindingKind::Attributes => 2,
            BindingKind::Attribute(_) => 3,
            BindingKind::Children => 4,
        }
    }

    /// Structural bindings survive unmounting of the owner's rendering.
    pub fn is_structural(&self) -> bool {
        matches!(self, BindingKind::Component)
    }
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingKind::Component => f.write_str("component"),
            BindingKind::Type => f.write_str("type"),
            BindingKind::Attributes => f.write_str("attributes"),
            BindingKind::Attribute(name) => write!(f, "attribute:{name}"),
            BindingKind::Children => f.write_str("children"),
        }
    }
}

pub type BindingId = u64;

/// A dependency address wired to one update algorithm of one descriptor.
pub struct Binding {
    pub id: BindingId,
    pub dependency: Dependency,
    pub descriptor: DescriptorId,
    pub kind: BindingKind,
    active: Cell<bool>,
}

impl Binding {
    /// False once the owner was unbound; queued notifications skip it.
    pub fn is_active(&self) -> bool {
        self.active.get()
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.id)
            .field("dependency", &format_args!("{}", self.dependency))
            .field("descriptor", &self.descriptor)
            .field("kind", &format_args!("{}", self.kind))
            .field("active", &self.is_active())
            .finish()
    }
}

type Bindings = SmallVec<[Rc<Binding>; 2]>;
type KindMap = HashMap<StateId, HashMap<PropKey, Bindings>>;

/// Dependency registry: one map per binding kind, each
/// `state -> key -> bindings` in registration order.
#[derive(Default)]
pub struct Registry {
    next_id: BindingId,
    maps: [KindMap; BindingKind::COUNT],
}

impl Registry {
    /// Register `(dep, kind)` for `descriptor`. Returns the new binding, or
    /// `None` when an identical one already exists.
    pub fn bind(
        &mut self,
        dep: Dependency,
        descriptor: DescriptorId,
        kind: BindingKind,
    ) -> Option<Rc<Binding>> {
        let list = self.maps[kind.slot()]
            .entry(dep.state)
            .or_default()
            .entry(dep.key.clone())
            .or_default();
        if list
            .iter()
            .any(|b| b.descriptor == descriptor && b.kind == kind)
        {
            return None;
        }

        let binding = Rc::new(Binding {
            id: self.next_id,
            dependency: dep,
            descriptor,
            kind,
            active: Cell::new(true),
        });
        self.next_id += 1;
        list.push(binding.clone());
        log::trace!(
            "bind {} -> {:?} ({})",
            binding.dependency,
            binding.descriptor,
            binding.kind
        );
        Some(binding)
    }

    /// Drop `binding` from its address and deactivate it.
    pub fn unbind(&mut self, binding: &Binding) {
        binding.active.set(false);
        let map = &mut self.maps[binding.kind.slot()];
        let Some(keys) = map.get_mut(&binding.dependency.state) else {
            return;
        };
        if let Some(list) = keys.get_mut(&binding.dependency.key) {
            list.retain(|b| b.id != binding.id);
            if list.is_empty() {
                keys.remove(&binding.dependency.key);
            }
        }
        if keys.is_empty() {
            map.remove(&binding.dependency.state);
        }
    }

    /// Bindings listening on any of `deps`, across kinds, in kind order then
    /// registration order. One update runs once per pass even when several of
    /// `deps` reach it.
    pub fn lookup(&self, deps: &[Dependency]) -> Vec<Rc<Binding>> {
        let mut out: Vec<Rc<Binding>> = Vec::new();
        for map in &self.maps {
            for dep in deps {
                let Some(list) = map.get(&dep.state).and_then(|keys| keys.get(&dep.key)) else {
                    continue;
                };
                for binding in list {
                    if !out
                        .iter()
                        .any(|b| b.descriptor == binding.descriptor && b.kind == binding.kind)
                    {
                        out.push(binding.clone());
                    }
                }
            }
        }
        out
    }

    /// Number of bindings at one address, all kinds.
    pub fn count_at(&self, dep: &Dependency) -> usize {
        self.maps
            .iter()
            .filter_map(|map| map.get(&dep.state).and_then(|keys| keys.get(&dep.key)))
            .map(|list| list.len())
            .sum()
    }

    /// Number of registered bindings owned by `descriptor`.
    pub fn count_owned_by(&self, descriptor: DescriptorId) -> usize {
        self.iter().filter(|b| b.descriptor == descriptor).count()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn iter(&self) -> impl Iterator<Item = &Rc<Binding>> {
        self.maps
            .iter()
            .flat_map(|map| map.values())
            .flat_map(|keys| keys.values())
            .flatten()
    }
}
