use std::collections::BTreeMap;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::description::Computation;
use crate::{AttrValue, Binding, Description, Element, NodeId};

slotmap::new_key_type! {
    /// Stable id of one position in the render tree.
    pub struct DescriptorId;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    /// Description fixed at creation.
    Static,
    /// Description re-computed on update; owns a placeholder marker.
    Dynamic,
}

/// Last rendered output of a descriptor.
pub(crate) enum Shape {
    Text(String),
    Element(ElementShape),
}

pub(crate) struct ElementShape {
    pub(crate) source: Rc<Element>,
    pub(crate) kind: String,
    /// Values last handed to the host.
    pub(crate) attributes: BTreeMap<String, AttrValue>,
    /// Per-attribute computations, re-run by single attribute updates.
    pub(crate) computed: BTreeMap<String, Computation<AttrValue>>,
}

/// Live record of one rendered position.
pub(crate) struct Descriptor {
    pub(crate) source: Description,
    /// Output node this descriptor renders into.
    pub(crate) parent: NodeId,
    pub(crate) node: Option<NodeId>,
    pub(crate) marker: Option<NodeId>,
    pub(crate) shape: Option<Shape>,
    pub(crate) children: Vec<DescriptorId>,
    pub(crate) bindings: SmallVec<[Rc<Binding>; 4]>,
}

impl Descriptor {
    pub(crate) fn new(source: Description, parent: NodeId) -> Self {
        Self {
            source,
            parent,
            node: None,
            marker: None,
            shape: None,
            children: Vec::new(),
            bindings: SmallVec::new(),
        }
    }

    pub(crate) fn mode(&self) -> RenderMode {
        if self.source.is_dynamic() {
            RenderMode::Dynamic
        } else {
            RenderMode::Static
        }
    }

    pub(crate) fn element(&self) -> Option<&ElementShape> {
        match &self.shape {
            Some(Shape::Element(el)) => Some(el),
            _ => None,
        }
    }

    pub(crate) fn element_mut(&mut self) -> Option<&mut ElementShape> {
        match &mut self.shape {
            Some(Shape::Element(el)) => Some(el),
            _ => None,
        }
    }

    pub(crate) fn info(&self) -> DescriptorInfo {
        DescriptorInfo {
            mode: self.mode(),
            parent: self.parent,
            node: self.node,
            marker: self.marker,
            kind: match &self.shape {
                Some(Shape::Text(_)) => Some("#text".to_owned()),
                Some(Shape::Element(el)) => Some(el.kind.clone()),
                None => None,
            },
            attributes: self
                .element()
                .map(|el| el.attributes.clone())
                .unwrap_or_default(),
            children: self.children.clone(),
            bindings: self.bindings.len(),
        }
    }
}

/// Read-only snapshot of a descriptor, for tests and tooling.
#[derive(Clone, Debug)]
pub struct DescriptorInfo {
    pub mode: RenderMode,
    pub parent: NodeId,
    pub node: Option<NodeId>,
    pub marker: Option<NodeId>,
    /// Element kind, `#text` for leaves, `None` while nothing is rendered.
    pub kind: Option<String>,
    pub attributes: BTreeMap<String, AttrValue>,
    pub children: Vec<DescriptorId>,
    pub bindings: usize,
}

impl DescriptorInfo {
    pub fn is_rendered(&self) -> bool {
        self.node.is_some()
    }
}
