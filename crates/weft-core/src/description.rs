//! # Descriptions
//!
//! A description says what to render; it is plain data plus closures. Any of
//! an element's kind, attribute map, single attribute values, or children can
//! be a zero-argument computation ([`Dyn::Dynamic`]); the engine evaluates it
//! under tracking and re-runs only that part when the state it read changes.
//!
//! ```rust
//! use serde_json::json;
//! use weft_core::*;
//!
//! let rt = Runtime::new(MemoryHost::new());
//! let state = rt.state(json!({ "done": false, "items": ["a", "b"] }))?;
//!
//! let view = element("ul")
//!     .attr_fn("class", {
//!         let state = state.clone();
//!         move || if state.get("done") == Some(json!(true)) { "done" } else { "open" }
//!     })
//!     .children_fn({
//!         let state = state.clone();
//!         move || {
//!             let items = state.list("items").map(|l| l.values()).unwrap_or_default();
//!             items
//!                 .iter()
//!                 .map(|item| element("li").child(value_text(item)))
//!                 .collect::<Vec<_>>()
//!         }
//!     });
//!
//! let root = rt.host().root();
//! rt.render(view, root)?;
//! assert_eq!(rt.host().markup(root), r#"<ul class="open"><li>a</li><li>b</li></ul>"#);
//! # Ok::<(), weft_core::Error>(())
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::tracking::untrack;
use crate::{AttrValue, Event, Handler, NodeId, Result};

pub type Computation<T> = Rc<dyn Fn() -> T>;

/// A part of a description that is either fixed or computed.
pub enum Dyn<T> {
    Static(T),
    Dynamic(Computation<T>),
}

impl<T> Clone for Dyn<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Dyn::Static(value) => Dyn::Static(value.clone()),
            Dyn::Dynamic(f) => Dyn::Dynamic(f.clone()),
        }
    }
}

impl<T: Clone> Dyn<T> {
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Dyn::Dynamic(_))
    }

    /// Current value without recording any dependency.
    pub fn get_untracked(&self) -> T {
        match self {
            Dyn::Static(value) => value.clone(),
            Dyn::Dynamic(f) => untrack(|| f()),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Dyn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dyn::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Dyn::Dynamic(_) => f.write_str("Dynamic(<fn>)"),
        }
    }
}

pub type AttrMap = BTreeMap<String, Dyn<AttrValue>>;

/// What to render at one position.
#[derive(Clone)]
pub enum Description {
    /// A leaf text node.
    Text(String),
    Element(Rc<Element>),
    /// Re-evaluated when its reads change; `None` renders nothing.
    Dynamic(Computation<Option<Description>>),
}

impl Description {
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Description::Dynamic(_))
    }
}

impl fmt::Debug for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Description::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Description::Element(el) => f.debug_tuple("Element").field(&el.kind).finish(),
            Description::Dynamic(_) => f.write_str("Dynamic(<fn>)"),
        }
    }
}

impl From<&str> for Description {
    fn from(text: &str) -> Self {
        Description::Text(text.to_owned())
    }
}

impl From<String> for Description {
    fn from(text: String) -> Self {
        Description::Text(text)
    }
}

impl From<Element> for Description {
    fn from(el: Element) -> Self {
        Description::Element(Rc::new(el))
    }
}

pub type Hook = Rc<dyn Fn(NodeId)>;

/// Lifecycle callbacks of an element.
#[derive(Clone, Default)]
pub struct Hooks {
    /// After the element's node was inserted into its parent.
    pub on_mount: Option<Hook>,
    /// Before the element's node is detached for good.
    pub on_unmount: Option<Hook>,
}

/// Element description; built with [`element`] or [`element_fn`].
#[derive(Clone)]
pub struct Element {
    pub kind: Dyn<String>,
    pub attributes: Dyn<AttrMap>,
    pub children: Dyn<Vec<Description>>,
    pub hooks: Hooks,
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("kind", &self.kind)
            .field("attributes", &self.attributes)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

/// Element of a fixed kind.
pub fn element(kind: impl Into<String>) -> Element {
    Element::new(Dyn::Static(kind.into()))
}

/// Element whose kind is computed; a change swaps the node in place.
pub fn element_fn<S: Into<String>>(kind: impl Fn() -> S + 'static) -> Element {
    Element::new(Dyn::Dynamic(Rc::new(move || kind().into())))
}

pub fn text(text: impl Into<String>) -> Description {
    Description::Text(text.into())
}

/// Computed presence: rendered while `f` returns `Some`.
pub fn dynamic<D: Into<Description>>(f: impl Fn() -> Option<D> + 'static) -> Description {
    Description::Dynamic(Rc::new(move || f().map(Into::into)))
}

/// Computed text leaf; patched in place when the text changes.
pub fn dynamic_text<S: Into<String>>(f: impl Fn() -> S + 'static) -> Description {
    Description::Dynamic(Rc::new(move || Some(Description::Text(f().into()))))
}

impl Element {
    fn new(kind: Dyn<String>) -> Self {
        Self {
            kind,
            attributes: Dyn::Static(AttrMap::new()),
            children: Dyn::Static(Vec::new()),
            hooks: Hooks::default(),
        }
    }

    fn with_attr(mut self, name: String, value: Dyn<AttrValue>) -> Self {
        self.attributes = match self.attributes {
            Dyn::Static(mut map) => {
                map.insert(name, value);
                Dyn::Static(map)
            }
            // layered over the computed map
            Dyn::Dynamic(base) => Dyn::Dynamic(Rc::new(move || {
                let mut map = base();
                map.insert(name.clone(), value.clone());
                map
            })),
        };
        self
    }

    pub fn attr(self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.with_attr(name.into(), Dyn::Static(value.into()))
    }

    /// Attribute computed on its own; changes re-run only this attribute.
    pub fn attr_fn<V: Into<AttrValue>>(
        self,
        name: impl Into<String>,
        f: impl Fn() -> V + 'static,
    ) -> Self {
        self.with_attr(name.into(), Dyn::Dynamic(Rc::new(move || f().into())))
    }

    /// Whole attribute map computed at once. Attributes set before this call
    /// stay underneath the computed ones.
    pub fn attrs_fn(mut self, f: impl Fn() -> AttrMap + 'static) -> Self {
        self.attributes = match self.attributes {
            Dyn::Static(base) if base.is_empty() => Dyn::Dynamic(Rc::new(f)),
            Dyn::Static(base) => Dyn::Dynamic(Rc::new(move || {
                let mut map = base.clone();
                map.extend(f());
                map
            })),
            Dyn::Dynamic(base) => Dyn::Dynamic(Rc::new(move || {
                let mut map = base();
                map.extend(f());
                map
            })),
        };
        self
    }

    /// Identity among siblings for children reconciliation.
    pub fn key(self, key: impl Into<AttrValue>) -> Self {
        self.attr("key", key)
    }

    pub fn key_fn<V: Into<AttrValue>>(self, f: impl Fn() -> V + 'static) -> Self {
        self.attr_fn("key", f)
    }

    /// Listener for `event` (`"click"` attaches `onclick`).
    pub fn on(self, event: &str, f: impl Fn(&Event) -> Result<()> + 'static) -> Self {
        self.attr(format!("on{event}"), Handler::new(f))
    }

    pub fn child(mut self, child: impl Into<Description>) -> Self {
        let child = child.into();
        self.children = match self.children {
            Dyn::Static(mut list) => {
                list.push(child);
                Dyn::Static(list)
            }
            Dyn::Dynamic(base) => Dyn::Dynamic(Rc::new(move || {
                let mut list = base();
                list.push(child.clone());
                list
            })),
        };
        self
    }

    pub fn children(mut self, children: impl IntoChildren) -> Self {
        self.children = Dyn::Static(children.into_children());
        self
    }

    /// Child list computed at once and reconciled by key.
    pub fn children_fn<C: IntoChildren>(mut self, f: impl Fn() -> C + 'static) -> Self {
        self.children = Dyn::Dynamic(Rc::new(move || f().into_children()));
        self
    }

    pub fn on_mount(mut self, f: impl Fn(NodeId) + 'static) -> Self {
        self.hooks.on_mount = Some(Rc::new(f));
        self
    }

    pub fn on_unmount(mut self, f: impl Fn(NodeId) + 'static) -> Self {
        self.hooks.on_unmount = Some(Rc::new(f));
        self
    }

    pub fn build(self) -> Description {
        self.into()
    }
}

/// Normalization of child-list results.
pub trait IntoChildren {
    fn into_children(self) -> Vec<Description>;
}

impl IntoChildren for Description {
    fn into_children(self) -> Vec<Description> {
        vec![self]
    }
}

impl IntoChildren for Element {
    fn into_children(self) -> Vec<Description> {
        vec![self.into()]
    }
}

impl IntoChildren for String {
    fn into_children(self) -> Vec<Description> {
        vec![Description::Text(self)]
    }
}

impl IntoChildren for &str {
    fn into_children(self) -> Vec<Description> {
        vec![Description::Text(self.to_owned())]
    }
}

impl<T: Into<Description>> IntoChildren for Vec<T> {
    fn into_children(self) -> Vec<Description> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<T: Into<Description>> IntoChildren for Option<T> {
    fn into_children(self) -> Vec<Description> {
        self.map(Into::into).into_iter().collect()
    }
}
