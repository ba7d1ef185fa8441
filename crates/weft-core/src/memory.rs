use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use slotmap::SlotMap;

use crate::attribute::is_event_name;
use crate::{AttrValue, DescriptorId, Handler, Host, NodeId};

/// In-memory output tree.
///
/// Backs tests and demos; also a reference for what a real host has to do
/// with attribute specials.
pub struct MemoryHost {
    nodes: SlotMap<NodeId, HostNode>,
    root: NodeId,
    attribute_writes: usize,
}

struct HostNode {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

enum NodeData {
    Text(String),
    Element(ElementData),
    Marker(DescriptorId),
}

#[derive(Default)]
struct ElementData {
    kind: String,
    attributes: BTreeMap<String, String>,
    flags: BTreeSet<String>,
    style: BTreeMap<String, String>,
    value: Option<String>,
    listeners: BTreeMap<String, Handler>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    /// Empty tree with a single `#root` container.
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(HostNode::new(NodeData::Element(ElementData {
            kind: "#root".into(),
            ..ElementData::default()
        })));
        Self {
            nodes,
            root,
            attribute_writes: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    /// Total `set_attribute` calls received so far.
    pub fn attribute_writes(&self) -> usize {
        self.attribute_writes
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node).and_then(|n| n.parent)
    }

    pub fn kind(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node)?.data {
            NodeData::Element(el) => Some(&el.kind),
            NodeData::Text(_) => Some("#text"),
            NodeData::Marker(_) => Some("#marker"),
        }
    }

    pub fn is_marker(&self, node: NodeId) -> bool {
        matches!(
            self.nodes.get(node).map(|n| &n.data),
            Some(NodeData::Marker(_))
        )
    }

    /// Concatenated text of `node` and its descendants.
    pub fn text(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let Some(n) = self.nodes.get(node) else {
            return;
        };
        match &n.data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Element(_) => {
                for child in &n.children {
                    self.collect_text(*child, out);
                }
            }
            NodeData::Marker(_) => {}
        }
    }

    fn element(&self, node: NodeId) -> Option<&ElementData> {
        match &self.nodes.get(node)?.data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?.attributes.get(name).map(String::as_str)
    }

    pub fn flag(&self, node: NodeId, name: &str) -> bool {
        self.element(node).is_some_and(|el| el.flags.contains(name))
    }

    pub fn style(&self, node: NodeId) -> BTreeMap<String, String> {
        self.element(node)
            .map(|el| el.style.clone())
            .unwrap_or_default()
    }

    pub fn value(&self, node: NodeId) -> Option<&str> {
        self.element(node)?.value.as_deref()
    }

    /// Markup of the children of `node`; placeholders are invisible.
    pub fn markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        if let Some(n) = self.nodes.get(node) {
            for child in &n.children {
                self.write_node(*child, &mut out);
            }
        }
        out
    }

    /// Markup of `node` itself.
    pub fn outer_markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out);
        out
    }

    fn write_node(&self, node: NodeId, out: &mut String) {
        let Some(n) = self.nodes.get(node) else {
            return;
        };
        match &n.data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Marker(_) => {}
            NodeData::Element(el) => {
                let _ = write!(out, "<{}", el.kind);
                for (name, value) in &el.attributes {
                    let _ = write!(out, " {name}=\"{value}\"");
                }
                for flag in &el.flags {
                    let _ = write!(out, " {flag}");
                }
                if !el.style.is_empty() {
                    let style: Vec<String> =
                        el.style.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                    let _ = write!(out, " style=\"{}\"", style.join("; "));
                }
                if let Some(value) = &el.value {
                    let _ = write!(out, " value=\"{value}\"");
                }
                out.push('>');
                for child in &n.children {
                    self.write_node(*child, out);
                }
                let _ = write!(out, "</{}>", el.kind);
            }
        }
    }
}

impl HostNode {
    fn new(data: NodeData) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            data,
        }
    }
}

fn parse_style(text: &str) -> BTreeMap<String, String> {
    text.split(';')
        .filter_map(|decl| {
            let (k, v) = decl.split_once(':')?;
            let (k, v) = (k.trim(), v.trim());
            (!k.is_empty()).then(|| (k.to_owned(), v.to_owned()))
        })
        .collect()
}

impl Host for MemoryHost {
    fn create_text(&mut self, text: &str) -> NodeId {
        self.nodes.insert(HostNode::new(NodeData::Text(text.to_owned())))
    }

    fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(HostNode {
            data: NodeData::Text(current),
            ..
        }) = self.nodes.get_mut(node)
        {
            text.clone_into(current);
        }
    }

    fn create_element(&mut self, kind: &str) -> NodeId {
        self.nodes
            .insert(HostNode::new(NodeData::Element(ElementData {
                kind: kind.to_owned(),
                ..ElementData::default()
            })))
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &AttrValue) {
        self.attribute_writes += 1;
        let Some(HostNode {
            data: NodeData::Element(el),
            ..
        }) = self.nodes.get_mut(node)
        else {
            log::warn!("set_attribute({name}) on a non-element node");
            return;
        };

        if is_event_name(name) {
            let event = name[2..].to_ascii_lowercase();
            match value {
                AttrValue::Handler(handler) => {
                    el.listeners.insert(event, handler.clone());
                }
                _ => {
                    el.listeners.remove(&event);
                }
            }
            return;
        }

        match (name, value) {
            ("style", AttrValue::Style(map)) => el.style = map.clone(),
            ("style", AttrValue::Text(text)) => el.style = parse_style(text),
            ("style", _) => el.style.clear(),
            ("value", value) => el.value = value.as_text(),
            (_, AttrValue::Null) => {
                el.attributes.remove(name);
                el.flags.remove(name);
            }
            (_, AttrValue::Bool(on)) => {
                el.attributes.remove(name);
                if *on {
                    el.flags.insert(name.to_owned());
                } else {
                    el.flags.remove(name);
                }
            }
            (_, AttrValue::Handler(handler)) => {
                el.listeners.insert(name.to_owned(), handler.clone());
            }
            (_, value) => {
                el.flags.remove(name);
                el.attributes
                    .insert(name.to_owned(), value.as_text().unwrap_or_default());
            }
        }
    }

    fn create_marker(&mut self, owner: DescriptorId) -> NodeId {
        self.nodes.insert(HostNode::new(NodeData::Marker(owner)))
    }

    fn find_marker(&self, parent: NodeId, owner: DescriptorId) -> Option<NodeId> {
        self.nodes.get(parent)?.children.iter().copied().find(|child| {
            matches!(
                self.nodes.get(*child).map(|n| &n.data),
                Some(NodeData::Marker(id)) if *id == owner
            )
        })
    }

    fn insert(&mut self, parent: NodeId, node: NodeId, before: Option<NodeId>) {
        if !self.nodes.contains_key(parent) || !self.nodes.contains_key(node) {
            log::warn!("insert with a released node");
            return;
        }
        self.detach(node);
        let siblings = &mut self.nodes[parent].children;
        let at = before
            .and_then(|b| siblings.iter().position(|c| *c == b))
            .unwrap_or(siblings.len());
        siblings.insert(at, node);
        self.nodes[node].parent = Some(parent);
    }

    fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.nodes.get_mut(node).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.retain(|c| *c != node);
        }
    }

    fn replace(&mut self, old: NodeId, new: NodeId) {
        let Some(parent) = self.parent(old) else {
            return;
        };
        self.detach(new);
        if let Some(p) = self.nodes.get_mut(parent)
            && let Some(slot) = p.children.iter_mut().find(|c| **c == old)
        {
            *slot = new;
        }
        if let Some(n) = self.nodes.get_mut(old) {
            n.parent = None;
        }
        if let Some(n) = self.nodes.get_mut(new) {
            n.parent = Some(parent);
        }
    }

    fn discard(&mut self, node: NodeId) {
        self.detach(node);
        if let Some(n) = self.nodes.remove(node) {
            for child in n.children {
                if let Some(c) = self.nodes.get_mut(child) {
                    c.parent = None;
                }
            }
        }
    }

    fn children(&self, parent: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(parent)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn listener(&self, node: NodeId, event: &str) -> Option<Handler> {
        self.element(node)?.listeners.get(event).cloned()
    }
}
