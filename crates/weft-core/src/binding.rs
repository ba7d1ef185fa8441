use crate::runtime::Inner;
use crate::tracking;
use crate::{BindingKind, DescriptorId, Host};

impl<H: Host> Inner<H> {
    /// Run `computation` once under tracking and bind every dependency it
    /// read to `kind`'s update algorithm for `id`.
    ///
    /// Re-running the same computation for the same descriptor and kind binds
    /// nothing new. This is the only place bindings are created; update
    /// algorithms come back through here for every dynamic part they render.
    pub(crate) fn evaluate_and_bind<T>(
        &self,
        id: DescriptorId,
        kind: BindingKind,
        computation: impl FnOnce() -> T,
    ) -> T {
        let (value, touched) = tracking::track(computation);
        if touched.is_empty() {
            return value;
        }

        let mut registry = self.registry.borrow_mut();
        let mut descriptors = self.descriptors.borrow_mut();
        let Some(descriptor) = descriptors.get_mut(id) else {
            log::warn!("evaluated {kind} for a deleted descriptor {id:?}");
            return value;
        };
        for dep in touched {
            if let Some(binding) = registry.bind(dep, id, kind.clone()) {
                descriptor.bindings.push(binding);
            }
        }
        value
    }
}
