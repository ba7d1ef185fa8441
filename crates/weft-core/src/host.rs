use crate::{AttrValue, DescriptorId, Handler};

slotmap::new_key_type! {
    /// Handle to an output node owned by a [`Host`].
    pub struct NodeId;
}

/// Output-node primitives the engine renders into.
///
/// Hosts own every node; the engine only holds [`NodeId`]s. Attribute
/// specials are the host's business: booleans become native flags, `style`
/// takes a structured map, `value` goes through a dedicated setter, and any
/// name with the `on` prefix attaches or detaches a listener.
pub trait Host {
    fn create_text(&mut self, text: &str) -> NodeId;

    fn set_text(&mut self, node: NodeId, text: &str);

    fn create_element(&mut self, kind: &str) -> NodeId;

    /// Set or, for [`AttrValue::Null`], clear a named attribute.
    fn set_attribute(&mut self, node: NodeId, name: &str, value: &AttrValue);

    /// Zero-width placeholder owned by `owner`.
    fn create_marker(&mut self, owner: DescriptorId) -> NodeId;

    /// Locate the placeholder of `owner` among the children of `parent`.
    fn find_marker(&self, parent: NodeId, owner: DescriptorId) -> Option<NodeId>;

    /// Insert `node` under `parent`, before `before` or at the end. A node
    /// that is already attached somewhere is moved.
    fn insert(&mut self, parent: NodeId, node: NodeId, before: Option<NodeId>);

    /// Remove `node` from its parent; no-op for a detached node.
    fn detach(&mut self, node: NodeId);

    /// Put `new` in place of `old` in `old`'s parent.
    fn replace(&mut self, old: NodeId, new: NodeId);

    /// Release a node that will never be attached again.
    fn discard(&mut self, node: NodeId);

    fn children(&self, parent: NodeId) -> Vec<NodeId>;

    /// Listener attached under `event` (without the `on` prefix).
    fn listener(&self, node: NodeId, event: &str) -> Option<Handler>;
}
