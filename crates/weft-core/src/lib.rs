//! # Reactive state and fine-grained updates
//!
//! weft renders declarative descriptions into a host output tree and keeps
//! that tree in sync with observed state without re-rendering. There are four
//! pieces:
//!
//! - `State` / `List`: tracked objects and arrays; reads are recorded,
//!   writes notify.
//! - `Registry`: which descriptor depends on which `(state, key)`, and
//!   through which update algorithm.
//! - descriptors: the live record of what has been rendered where.
//! - update algorithms: presence, element kind, attribute map, single
//!   attribute, and keyed children.
//!
//! ## State
//!
//! ```rust
//! use serde_json::json;
//! use weft_core::*;
//!
//! let rt = Runtime::new(MemoryHost::new());
//! let counter = rt.state(json!({ "count": 0 }))?;
//!
//! let root = rt.host().root();
//! rt.render(
//!     element("p").child(dynamic_text({
//!         let counter = counter.clone();
//!         move || format!("count = {}", value_text(&counter.get("count").unwrap_or_default()))
//!     })),
//!     root,
//! )?;
//! assert_eq!(rt.host().markup(root), "<p>count = 0</p>");
//!
//! // Only the text node is touched.
//! counter.set("count", 1)?;
//! assert_eq!(rt.host().markup(root), "<p>count = 1</p>");
//! # Ok::<(), weft_core::Error>(())
//! ```
//!
//! Every computation passed to the builder (`dynamic`, `attr_fn`,
//! `children_fn`, `element_fn`, ...) is run under tracking. The
//! `(state, key)` pairs it reads become bindings, and a later write to one of
//! them re-runs exactly the bound algorithms before `set` returns.
//!
//! ## Lists
//!
//! Array mutations (`push`, `splice`, `sort`, ...) notify the whole
//! collection once. Children computations reading a list are reconciled by
//! key: give children an explicit `.key(..)` whenever they can be reordered,
//! since unkeyed elements are matched by position.
//!
//! ## Cleanup
//!
//! Removing a rendering (a dynamic part turning `None`, a child dropped
//! from a list, `Runtime::unmount`) removes its bindings from the registry
//! and releases its output nodes.

pub mod attribute;
pub mod binding;
pub mod collection;
pub mod config;
pub mod description;
pub mod descriptor;
pub mod error;
pub mod host;
pub mod memory;
pub mod prelude;
pub mod registry;
pub mod runtime;
pub mod state;
pub mod tests;
pub mod tracking;
pub mod update;

pub use attribute::*;
pub use collection::*;
pub use config::*;
pub use description::*;
pub use descriptor::{DescriptorId, DescriptorInfo, RenderMode};
pub use error::*;
pub use host::*;
pub use memory::*;
pub use registry::*;
pub use runtime::Runtime;
pub use state::{State, StateId, Tracked, loosely_equal, unwrap};
pub use tracking::{Dependency, PropKey, untrack};
pub use update::{ChildKey, child_key};
