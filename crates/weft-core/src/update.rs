//! The five update algorithms, one per [`BindingKind`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use crate::descriptor::Shape;
use crate::runtime::{Inner, apply_attribute, resolve};
use crate::tracking::untrack;
use crate::{AttrValue, Binding, BindingKind, DescriptorId, Description, Dyn, Error, Host, NodeId, Result};

/// Identity of a child among its siblings.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChildKey {
    /// Explicit `key` attribute.
    Explicit(String),
    /// Content of a text leaf.
    Text(String),
    /// Position; identity does not survive reordering.
    Index(usize),
}

/// Key of `description` at `index`. Dynamic keys are evaluated eagerly,
/// without tracking.
pub fn child_key(description: &Description, index: usize) -> ChildKey {
    match description {
        Description::Text(text) => ChildKey::Text(text.clone()),
        Description::Element(el) => {
            let key = match &el.attributes {
                Dyn::Static(map) => map.get("key").map(Dyn::get_untracked),
                Dyn::Dynamic(f) => untrack(|| f()).get("key").map(Dyn::get_untracked),
            };
            match key.and_then(|k| k.as_text()) {
                Some(key) => ChildKey::Explicit(key),
                None => ChildKey::Index(index),
            }
        }
        Description::Dynamic(_) => ChildKey::Index(index),
    }
}

fn not_rendered(descriptor: DescriptorId, operation: &'static str) -> Error {
    Error::NotRendered {
        descriptor,
        operation,
    }
}

impl<H: Host> Inner<H> {
    pub(crate) fn run_update(&self, id: DescriptorId, kind: &BindingKind) -> Result<()> {
        match kind {
            BindingKind::Component => self.update_presence(id),
            BindingKind::Type => self.update_type(id),
            BindingKind::Attributes => self.update_attributes(id),
            BindingKind::Attribute(name) => self.update_attribute(id, name),
            BindingKind::Children => self.reconcile_children(id),
        }
    }

    /// Mount, unmount, patch, or replace the rendering of a dynamic
    /// descriptor.
    fn update_presence(&self, id: DescriptorId) -> Result<()> {
        let f = {
            let d = self.descriptor(id)?;
            let Description::Dynamic(f) = &d.source else {
                return Err(Error::StaticDescriptor { descriptor: id });
            };
            f.clone()
        };

        let next = self.evaluate_and_bind(id, BindingKind::Component, || resolve(&f));
        // the computation may have written state that re-rendered `id`
        let (node, text) = {
            let d = self.descriptor(id)?;
            let text = match &d.shape {
                Some(Shape::Text(text)) => Some(text.clone()),
                _ => None,
            };
            (d.node, text)
        };
        match (node, next) {
            (None, None) => Ok(()),
            (Some(_), None) => {
                log::debug!("unmount {id:?}");
                self.unmount_rendering(id)
            }
            (None, Some(description)) => {
                let anchor = self.anchor(id)?;
                self.materialize(id, description, anchor)
            }
            (Some(node), Some(Description::Text(new))) if text.is_some() => {
                if text.as_deref() != Some(new.as_str()) {
                    self.host.borrow_mut().set_text(node, &new);
                    self.with_descriptor(id, |d| d.shape = Some(Shape::Text(new)))?;
                }
                Ok(())
            }
            (Some(_), Some(description)) => {
                log::debug!("replace rendering of {id:?}");
                self.unmount_rendering(id)?;
                let anchor = self.anchor(id)?;
                self.materialize(id, description, anchor)
            }
        }
    }

    /// Swap the element node for one of the new kind, keeping attributes,
    /// children, and bindings.
    fn update_type(&self, id: DescriptorId) -> Result<()> {
        let (f, old_kind, old_node, attributes) = {
            let d = self.descriptor(id)?;
            let el = d.element().ok_or_else(|| not_rendered(id, "type"))?;
            let old_node = d.node.ok_or_else(|| not_rendered(id, "type"))?;
            let Dyn::Dynamic(f) = &el.source.kind else {
                return Ok(());
            };
            (f.clone(), el.kind.clone(), old_node, el.attributes.clone())
        };

        let kind = self.evaluate_and_bind(id, BindingKind::Type, || f());
        if kind == old_kind {
            return Ok(());
        }

        let node = {
            let mut host = self.host.borrow_mut();
            let node = host.create_element(&kind);
            for (name, value) in &attributes {
                apply_attribute(&mut *host, node, name, value);
            }
            for child in host.children(old_node) {
                host.insert(node, child, None);
            }
            host.replace(old_node, node);
            host.discard(old_node);
            node
        };

        let mut descriptors = self.descriptors.borrow_mut();
        let children = {
            let d = descriptors.get_mut(id).ok_or(Error::UnknownDescriptor(id))?;
            d.node = Some(node);
            if let Some(el) = d.element_mut() {
                el.kind = kind.clone();
            }
            d.children.clone()
        };
        for child in children {
            if let Some(c) = descriptors.get_mut(child) {
                c.parent = node;
            }
        }
        log::debug!("swapped <{old_kind}> for <{kind}> on {id:?}");
        Ok(())
    }

    /// Re-run the attribute map and hand only changed keys to the host.
    fn update_attributes(&self, id: DescriptorId) -> Result<()> {
        let (f, node, previous) = {
            let d = self.descriptor(id)?;
            let el = d.element().ok_or_else(|| not_rendered(id, "attributes"))?;
            let node = d.node.ok_or_else(|| not_rendered(id, "attributes"))?;
            let Dyn::Dynamic(f) = &el.source.attributes else {
                return Ok(());
            };
            (f.clone(), node, el.attributes.clone())
        };

        let map = self.evaluate_and_bind(id, BindingKind::Attributes, || f());
        let (values, computed) = self.resolve_values(id, map);

        let mut merged: BTreeMap<String, AttrValue> = previous
            .keys()
            .filter(|name| !values.contains_key(*name))
            .map(|name| (name.clone(), AttrValue::Null))
            .collect();
        merged.extend(values);

        let changed: Vec<(String, AttrValue)> = merged
            .into_iter()
            .filter(|(name, value)| previous.get(name).unwrap_or(&AttrValue::Null) != value)
            .collect();

        {
            let mut host = self.host.borrow_mut();
            for (name, value) in &changed {
                apply_attribute(&mut *host, node, name, value);
            }
        }
        let dropped = self.with_descriptor(id, |d| {
            let Some(el) = d.element_mut() else {
                return Vec::new();
            };
            for (name, value) in changed {
                if value.is_null() {
                    el.attributes.remove(&name);
                } else {
                    el.attributes.insert(name, value);
                }
            }
            let gone: HashSet<String> = el
                .computed
                .keys()
                .filter(|name| !computed.contains_key(*name))
                .cloned()
                .collect();
            el.computed = computed;
            if gone.is_empty() {
                return Vec::new();
            }

            let (dropped, kept): (Vec<Rc<Binding>>, Vec<Rc<Binding>>) =
                d.bindings.drain(..).partition(|b| {
                    matches!(&b.kind, BindingKind::Attribute(name) if gone.contains(&**name))
                });
            d.bindings.extend(kept);
            dropped
        })?;

        let mut registry = self.registry.borrow_mut();
        for binding in &dropped {
            registry.unbind(binding);
        }
        Ok(())
    }

    /// Re-run one attribute's computation.
    fn update_attribute(&self, id: DescriptorId, name: &Rc<str>) -> Result<()> {
        let (f, node, old) = {
            let d = self.descriptor(id)?;
            let el = d.element().ok_or_else(|| not_rendered(id, "attribute"))?;
            let node = d.node.ok_or_else(|| not_rendered(id, "attribute"))?;
            let Some(f) = el.computed.get(&**name) else {
                // dropped by a later bulk update
                return Ok(());
            };
            let old = el.attributes.get(&**name).cloned().unwrap_or(AttrValue::Null);
            (f.clone(), node, old)
        };

        let value = self.evaluate_and_bind(id, BindingKind::Attribute(name.clone()), || f());
        if value == old {
            return Ok(());
        }

        apply_attribute(&mut *self.host.borrow_mut(), node, name, &value);
        self.with_descriptor(id, |d| {
            if let Some(el) = d.element_mut() {
                if value.is_null() {
                    el.attributes.remove(&**name);
                } else {
                    el.attributes.insert(name.to_string(), value);
                }
            }
        })
    }

    /// Re-run the child list, reuse descriptors by key, and rebuild the
    /// parent's child node list in the new order.
    fn reconcile_children(&self, id: DescriptorId) -> Result<()> {
        let (f, node, previous) = {
            let d = self.descriptor(id)?;
            let el = d.element().ok_or_else(|| not_rendered(id, "children"))?;
            let node = d.node.ok_or_else(|| not_rendered(id, "children"))?;
            let Dyn::Dynamic(f) = &el.source.children else {
                return Ok(());
            };
            (f.clone(), node, d.children.clone())
        };

        let next = self.evaluate_and_bind(id, BindingKind::Children, || f());

        let mut by_key: HashMap<ChildKey, DescriptorId> = HashMap::with_capacity(previous.len());
        for (index, child) in previous.iter().enumerate() {
            let source = self.descriptor(*child)?.source.clone();
            let key = child_key(&source, index);
            if let Some(shadowed) = by_key.insert(key.clone(), *child) {
                log::warn!("duplicate child key {key:?}; {shadowed:?} will be recreated");
            }
        }

        let mut order: Vec<(DescriptorId, bool)> = Vec::with_capacity(next.len());
        for (index, description) in next.into_iter().enumerate() {
            match by_key.remove(&child_key(&description, index)) {
                Some(reused) => order.push((reused, false)),
                None => order.push((self.create(description, node), true)),
            }
        }

        let kept: HashSet<DescriptorId> = order.iter().map(|(child, _)| *child).collect();
        let mut removed = 0;
        for child in &previous {
            if !kept.contains(child) {
                self.delete(*child)?;
                removed += 1;
            }
        }

        {
            let mut host = self.host.borrow_mut();
            for child in host.children(node) {
                host.detach(child);
            }
        }
        self.with_descriptor(id, |d| {
            d.children = order.iter().map(|(child, _)| *child).collect();
        })?;

        let mut created = 0;
        for (child, fresh) in &order {
            if *fresh {
                self.mount(*child, None)?;
                created += 1;
            } else {
                self.reattach(*child, node)?;
            }
        }
        log::debug!(
            "reconciled {id:?}: {} kept, {created} created, {removed} removed",
            order.len() - created
        );
        Ok(())
    }

    fn reattach(&self, child: DescriptorId, parent: NodeId) -> Result<()> {
        let (node, marker) = {
            let d = self.descriptor(child)?;
            (d.node, d.marker)
        };
        let mut host = self.host.borrow_mut();
        for n in [node, marker].into_iter().flatten() {
            host.insert(parent, n, None);
        }
        Ok(())
    }
}
