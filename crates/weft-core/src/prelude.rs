pub use crate::attribute::{AttrValue, Event, Handler, value_text};
pub use crate::config::{Config, ErrorPolicy};
pub use crate::description::{
    Description, Dyn, Element, IntoChildren, dynamic, dynamic_text, element, element_fn, text,
};
pub use crate::descriptor::{DescriptorId, DescriptorInfo, RenderMode};
pub use crate::error::{Error, Result};
pub use crate::host::{Host, NodeId};
pub use crate::memory::MemoryHost;
pub use crate::runtime::Runtime;
pub use crate::state::{State, Tracked, unwrap};
pub use crate::collection::List;
