use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::{BTreeMap, HashSet};
use std::rc::{Rc, Weak};

use serde_json::Value;
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::attribute::is_event_name;
use crate::description::{AttrMap, Computation};
use crate::descriptor::{Descriptor, ElementShape, Shape};
use crate::state::{Notify, wrap_with};
use crate::tracking::{Dependency, untrack};
use crate::{
    AttrValue, Binding, BindingKind, Config, DescriptorId, DescriptorInfo, Description, Dyn, Element, Error,
    ErrorPolicy, Event, Host, List, MemoryHost, NodeId, Registry, Result, State, Tracked,
};

/// A render session.
///
/// Owns the dependency registry, the descriptor tree, and the host. State
/// wrapped through a runtime notifies that runtime only, so independent
/// sessions never share bindings.
pub struct Runtime<H: Host + 'static = MemoryHost> {
    inner: Rc<Inner<H>>,
}

pub(crate) struct Inner<H> {
    pub(crate) config: Config,
    pub(crate) host: RefCell<H>,
    pub(crate) registry: RefCell<Registry>,
    pub(crate) descriptors: RefCell<SlotMap<DescriptorId, Descriptor>>,
    running: RefCell<HashSet<(DescriptorId, BindingKind)>>,
    depth: Cell<usize>,
}

impl<H: Host + 'static> Runtime<H> {
    pub fn new(host: H) -> Self {
        Self::with_config(host, Config::default())
    }

    pub fn with_config(host: H, config: Config) -> Self {
        Self {
            inner: Rc::new(Inner {
                config,
                host: RefCell::new(host),
                registry: RefCell::new(Registry::default()),
                descriptors: RefCell::new(SlotMap::with_key()),
                running: RefCell::new(HashSet::new()),
                depth: Cell::new(0),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    fn notifier(&self) -> Weak<dyn Notify> {
        let weak: Weak<Inner<H>> = Rc::downgrade(&self.inner);
        weak
    }

    /// Turn an object or array into tracked state bound to this runtime.
    pub fn wrap(&self, value: Value) -> Result<Tracked> {
        wrap_with(value, self.notifier())
    }

    /// [`wrap`](Self::wrap) for objects.
    pub fn state(&self, value: Value) -> Result<State> {
        self.wrap(value)?.into_state()
    }

    /// [`wrap`](Self::wrap) for arrays.
    pub fn list(&self, value: Value) -> Result<List> {
        self.wrap(value)?.into_list()
    }

    /// Render `description` as the last child of `parent`.
    pub fn render(&self, description: impl Into<Description>, parent: NodeId) -> Result<DescriptorId> {
        self.inner.render(description.into(), parent)
    }

    /// Tear down a rendered tree: bindings, output nodes, and placeholder.
    /// A non-root descriptor is also dropped from its parent's children.
    pub fn unmount(&self, id: DescriptorId) -> Result<()> {
        {
            let mut descriptors = self.inner.descriptors.borrow_mut();
            if !descriptors.contains_key(id) {
                return Err(Error::UnknownDescriptor(id));
            }
            for (_, d) in descriptors.iter_mut() {
                d.children.retain(|child| *child != id);
            }
        }
        self.inner.delete(id)
    }

    /// Deliver `event` to the listener of `node`. Returns whether one ran.
    pub fn dispatch(&self, node: NodeId, event: &Event) -> Result<bool> {
        let handler = self.inner.host.borrow().listener(node, &event.name);
        match handler {
            Some(handler) => {
                log::debug!("dispatch {} to {node:?}", event.name);
                handler.call(event)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Inner<H> {
        &self.inner
    }

    pub fn host(&self) -> Ref<'_, H> {
        self.inner.host.borrow()
    }

    pub fn host_mut(&self) -> RefMut<'_, H> {
        self.inner.host.borrow_mut()
    }

    pub fn descriptor(&self, id: DescriptorId) -> Option<DescriptorInfo> {
        self.inner.descriptors.borrow().get(id).map(Descriptor::info)
    }

    pub fn descriptor_count(&self) -> usize {
        self.inner.descriptors.borrow().len()
    }

    /// Bindings currently registered, all addresses and kinds.
    pub fn binding_count(&self) -> usize {
        self.inner.registry.borrow().len()
    }

    /// Registered bindings owned by `id`.
    pub fn bindings_owned_by(&self, id: DescriptorId) -> usize {
        self.inner.registry.borrow().count_owned_by(id)
    }

    /// Registered bindings listening on `dep`.
    pub fn bindings_at(&self, dep: &Dependency) -> usize {
        self.inner.registry.borrow().count_at(dep)
    }
}

impl<H: Host> Notify for Inner<H> {
    fn notify(&self, deps: &[Dependency]) -> Result<()> {
        let bindings = self.registry.borrow().lookup(deps);
        if bindings.is_empty() {
            return Ok(());
        }

        let depth = self.depth.get();
        if depth >= self.config.max_update_depth {
            return Err(Error::UpdateDepthExceeded {
                limit: self.config.max_update_depth,
            });
        }
        self.depth.set(depth + 1);

        let mut result = Ok(());
        for binding in bindings {
            if !binding.is_active() {
                continue;
            }
            // re-entrant trigger of an update that is still running
            let running = (binding.descriptor, binding.kind.clone());
            if !self.running.borrow_mut().insert(running.clone()) {
                log::debug!("skip re-entrant binding {} ({})", binding.id, binding.kind);
                continue;
            }
            log::trace!(
                "run {} on {:?} for {}",
                binding.kind,
                binding.descriptor,
                binding.dependency
            );
            let outcome = self.run_update(binding.descriptor, &binding.kind);
            self.running.borrow_mut().remove(&running);

            if let Err(err) = outcome {
                match self.config.error_policy {
                    ErrorPolicy::Abort => {
                        result = Err(err);
                        break;
                    }
                    ErrorPolicy::LogAndContinue => {
                        log::error!("binding {} ({}) failed: {err}", binding.id, binding.kind);
                    }
                }
            }
        }

        self.depth.set(depth);
        result
    }
}

/// Evaluate a presence computation, following nested dynamic results.
pub(crate) fn resolve(f: &Computation<Option<Description>>) -> Option<Description> {
    let mut next = f();
    while let Some(Description::Dynamic(g)) = &next {
        let g = g.clone();
        next = g();
    }
    next
}

/// `key` only identifies siblings; it never reaches the host.
pub(crate) fn apply_attribute<H: Host + ?Sized>(host: &mut H, node: NodeId, name: &str, value: &AttrValue) {
    if name != "key" {
        host.set_attribute(node, name, value);
    }
}

pub(crate) type Resolved = (
    BTreeMap<String, AttrValue>,
    BTreeMap<String, Computation<AttrValue>>,
);

impl<H: Host> Inner<H> {
    pub(crate) fn descriptor(&self, id: DescriptorId) -> Result<Ref<'_, Descriptor>> {
        Ref::filter_map(self.descriptors.borrow(), |all| all.get(id))
            .map_err(|_| Error::UnknownDescriptor(id))
    }

    pub(crate) fn with_descriptor<R>(
        &self,
        id: DescriptorId,
        f: impl FnOnce(&mut Descriptor) -> R,
    ) -> Result<R> {
        let mut all = self.descriptors.borrow_mut();
        let descriptor = all.get_mut(id).ok_or(Error::UnknownDescriptor(id))?;
        Ok(f(descriptor))
    }

    fn render(&self, description: Description, parent: NodeId) -> Result<DescriptorId> {
        let id = self.create(description, parent);
        self.mount(id, None)?;
        Ok(id)
    }

    pub(crate) fn create(&self, source: Description, parent: NodeId) -> DescriptorId {
        self.descriptors
            .borrow_mut()
            .insert(Descriptor::new(source, parent))
    }

    /// Place a created descriptor into its parent output node, before
    /// `before` or at the end.
    pub(crate) fn mount(&self, id: DescriptorId, before: Option<NodeId>) -> Result<()> {
        let (source, parent) = {
            let d = self.descriptor(id)?;
            (d.source.clone(), d.parent)
        };

        match source {
            Description::Dynamic(f) => {
                let marker = {
                    let mut host = self.host.borrow_mut();
                    let marker = host.create_marker(id);
                    host.insert(parent, marker, before);
                    marker
                };
                self.with_descriptor(id, |d| d.marker = Some(marker))?;
                let rendered = self.evaluate_and_bind(id, BindingKind::Component, || resolve(&f));
                match rendered {
                    Some(description) => self.materialize(id, description, Some(marker)),
                    None => Ok(()),
                }
            }
            other => self.materialize(id, other, before),
        }
    }

    /// Create the output for `description` and record it on `id`.
    pub(crate) fn materialize(
        &self,
        id: DescriptorId,
        description: Description,
        before: Option<NodeId>,
    ) -> Result<()> {
        match description {
            Description::Text(text) => {
                let parent = self.descriptor(id)?.parent;
                let node = {
                    let mut host = self.host.borrow_mut();
                    let node = host.create_text(&text);
                    host.insert(parent, node, before);
                    node
                };
                self.with_descriptor(id, |d| {
                    d.node = Some(node);
                    d.shape = Some(Shape::Text(text));
                })
            }
            Description::Element(el) => self.materialize_element(id, el, before),
            Description::Dynamic(f) => {
                match self.evaluate_and_bind(id, BindingKind::Component, || resolve(&f)) {
                    Some(description) => self.materialize(id, description, before),
                    None => Ok(()),
                }
            }
        }
    }

    fn materialize_element(
        &self,
        id: DescriptorId,
        el: Rc<Element>,
        before: Option<NodeId>,
    ) -> Result<()> {
        let parent = self.descriptor(id)?.parent;

        let kind = match &el.kind {
            Dyn::Static(kind) => kind.clone(),
            Dyn::Dynamic(f) => self.evaluate_and_bind(id, BindingKind::Type, || f()),
        };
        let node = self.host.borrow_mut().create_element(&kind);

        let (attributes, computed) = self.resolve_attributes(id, &el.attributes);
        {
            let mut host = self.host.borrow_mut();
            for (name, value) in &attributes {
                apply_attribute(&mut *host, node, name, value);
            }
        }

        self.with_descriptor(id, |d| {
            d.node = Some(node);
            d.shape = Some(Shape::Element(ElementShape {
                source: el.clone(),
                kind: kind.clone(),
                attributes,
                computed,
            }));
        })?;

        let children = match &el.children {
            Dyn::Static(children) => children.clone(),
            Dyn::Dynamic(f) => self.evaluate_and_bind(id, BindingKind::Children, || f()),
        };
        for child in children {
            let child_id = self.create(child, node);
            self.with_descriptor(id, |d| d.children.push(child_id))?;
            self.mount(child_id, None)?;
        }

        self.host.borrow_mut().insert(parent, node, before);
        log::debug!("mounted <{kind}> for {id:?}");
        if let Some(hook) = &el.hooks.on_mount {
            hook(node);
        }
        Ok(())
    }

    pub(crate) fn resolve_attributes(&self, id: DescriptorId, attributes: &Dyn<AttrMap>) -> Resolved {
        let map = match attributes {
            Dyn::Static(map) => map.clone(),
            Dyn::Dynamic(f) => self.evaluate_and_bind(id, BindingKind::Attributes, || f()),
        };
        self.resolve_values(id, map)
    }

    /// Evaluate per-key computations; each becomes its own attribute binding,
    /// except listeners, which are read once untracked. Null values are
    /// dropped.
    pub(crate) fn resolve_values(&self, id: DescriptorId, map: AttrMap) -> Resolved {
        let mut values = BTreeMap::new();
        let mut computed = BTreeMap::new();
        for (name, value) in map {
            let value = match value {
                Dyn::Static(value) => value,
                Dyn::Dynamic(f) if is_event_name(&name) => untrack(|| f()),
                Dyn::Dynamic(f) => {
                    let kind = BindingKind::Attribute(Rc::from(name.as_str()));
                    let value = self.evaluate_and_bind(id, kind, || f());
                    computed.insert(name.clone(), f);
                    value
                }
            };
            if !value.is_null() {
                values.insert(name, value);
            }
        }
        (values, computed)
    }

    /// Anchor for a re-appearing dynamic rendering: its placeholder.
    pub(crate) fn anchor(&self, id: DescriptorId) -> Result<Option<NodeId>> {
        let (parent, marker) = {
            let d = self.descriptor(id)?;
            (d.parent, d.marker)
        };
        Ok(self.host.borrow().find_marker(parent, id).or(marker))
    }

    /// Unbind-and-delete the current rendering of `id`, keeping the
    /// descriptor, its placeholder, and its structural bindings.
    pub(crate) fn unmount_rendering(&self, id: DescriptorId) -> Result<()> {
        let (released, children, node, hook) = self.with_descriptor(id, |d| {
            let (structural, released): (SmallVec<[Rc<Binding>; 4]>, SmallVec<[Rc<Binding>; 4]>) =
                d.bindings.drain(..).partition(|b| b.kind.is_structural());
            d.bindings = structural;
            let hook = d
                .element()
                .and_then(|el| el.source.hooks.on_unmount.clone());
            d.shape = None;
            (
                released,
                std::mem::take(&mut d.children),
                d.node.take(),
                hook,
            )
        })?;

        {
            let mut registry = self.registry.borrow_mut();
            for binding in &released {
                registry.unbind(binding);
            }
        }
        if let (Some(hook), Some(node)) = (hook, node) {
            hook(node);
        }
        for child in children {
            if self.descriptors.borrow().contains_key(child) {
                self.delete(child)?;
            }
        }
        if let Some(node) = node {
            let mut host = self.host.borrow_mut();
            host.detach(node);
            host.discard(node);
        }
        Ok(())
    }

    /// Unbind-and-delete `id` entirely, placeholder included.
    pub(crate) fn delete(&self, id: DescriptorId) -> Result<()> {
        self.unmount_rendering(id)?;
        let Some(descriptor) = self.descriptors.borrow_mut().remove(id) else {
            return Ok(());
        };
        {
            let mut registry = self.registry.borrow_mut();
            for binding in &descriptor.bindings {
                registry.unbind(binding);
            }
        }
        if let Some(marker) = descriptor.marker {
            let mut host = self.host.borrow_mut();
            host.detach(marker);
            host.discard(marker);
        }
        log::debug!("deleted {id:?}");
        Ok(())
    }
}
